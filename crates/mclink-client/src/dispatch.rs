//! Command dispatch and response correlation.
//!
//! The device does not tag replies with sequence numbers: a reply is
//! identified only by its response code, which is derivable from the
//! command that provoked it ([`Command::response_keys`]). The dispatcher
//! therefore keeps at most one pending command per response code and
//! rejects colliding sends with [`ClientError::Busy`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use mclink_protocol::{Command, FirmwareErrorCode, FrameCodec};

use crate::error::ClientError;
use crate::events::Event;

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

struct PendingEntry {
    seq: u64,
    keys: &'static [u8],
    // Taken exactly once, by whichever of response/timeout/disconnect
    // gets there first.
    tx: Option<oneshot::Sender<Result<Event, ClientError>>>,
}

#[derive(Default)]
struct PendingTable {
    next_seq: u64,
    // Insertion order matters: untagged error frames resolve the oldest
    // pending command, because the device answers in order.
    entries: Vec<PendingEntry>,
}

/// Owns the single writer path and the pending-command table.
pub struct Dispatcher {
    writer: tokio::sync::Mutex<BoxedWriter>,
    pending: Mutex<PendingTable>,
    closed: AtomicBool,
}

impl Dispatcher {
    /// Create a dispatcher around the transport's write half.
    pub fn new(writer: BoxedWriter) -> Self {
        Dispatcher {
            writer: tokio::sync::Mutex::new(writer),
            pending: Mutex::new(PendingTable::default()),
            closed: AtomicBool::new(false),
        }
    }

    /// Send a command and wait for its response, up to `timeout`.
    ///
    /// Exactly one of {response event, [`ClientError::CommandTimeout`],
    /// [`ClientError::Disconnected`], [`ClientError::Busy`],
    /// [`ClientError::Firmware`]} is returned, and the pending entry is
    /// consumed exactly once.
    pub async fn send(&self, command: &Command, timeout: Duration) -> Result<Event, ClientError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ClientError::Disconnected);
        }

        let keys = command.response_keys();
        if keys.is_empty() {
            // Fire-and-forget command: nothing to correlate or wait for.
            self.write_command(command).await?;
            return Ok(Event::now(crate::events::EventBody::Ok));
        }

        let (seq, mut rx) = {
            let mut pending = self.pending.lock();
            let collision = pending
                .entries
                .iter()
                .any(|e| e.keys.iter().any(|k| keys.contains(k)));
            if collision {
                debug!(code = command.code(), "correlation key collision");
                return Err(ClientError::Busy);
            }
            let seq = pending.next_seq;
            pending.next_seq += 1;
            let (tx, rx) = oneshot::channel();
            pending.entries.push(PendingEntry {
                seq,
                keys,
                tx: Some(tx),
            });
            (seq, rx)
        };

        if let Err(err) = self.write_command(command).await {
            self.remove(seq);
            return Err(err);
        }

        match tokio::time::timeout(timeout, &mut rx).await {
            Ok(Ok(result)) => result,
            // Sender dropped without a value: the table was torn down.
            Ok(Err(_)) => Err(ClientError::Disconnected),
            Err(_) => {
                self.remove(seq);
                // The response may have won the race with the timer.
                if let Ok(result) = rx.try_recv() {
                    return result;
                }
                debug!(code = command.code(), "command timed out");
                Err(ClientError::CommandTimeout)
            }
        }
    }

    /// Send a command the device never answers (e.g. reboot).
    pub async fn send_no_response(&self, command: &Command) -> Result<(), ClientError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ClientError::Disconnected);
        }
        self.write_command(command).await
    }

    async fn write_command(&self, command: &Command) -> Result<(), ClientError> {
        let wire = FrameCodec::encode(&command.encode());
        let mut writer = self.writer.lock().await;
        writer.write_all(&wire).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Resolve the pending command expecting response code `code`, if any.
    /// Returns whether a command was waiting for it.
    pub fn resolve(&self, code: u8, event: &Event) -> bool {
        let tx = {
            let mut pending = self.pending.lock();
            match pending.entries.iter().position(|e| e.keys.contains(&code)) {
                Some(idx) => {
                    let mut entry = pending.entries.remove(idx);
                    entry.tx.take()
                }
                None => None,
            }
        };
        match tx {
            Some(tx) => {
                let _ = tx.send(Ok(event.clone()));
                true
            }
            None => false,
        }
    }

    /// Resolve the oldest pending command with a firmware error.
    ///
    /// Error frames carry no correlation tag on the wire; since the
    /// device answers commands in order, the error belongs to the oldest
    /// outstanding one. Returns whether a command was waiting.
    pub fn resolve_error(&self, code: FirmwareErrorCode) -> bool {
        let tx = {
            let mut pending = self.pending.lock();
            if pending.entries.is_empty() {
                return false;
            }
            let mut entry = pending.entries.remove(0);
            entry.tx.take()
        };
        match tx {
            Some(tx) => {
                warn!(%code, "device reported an error");
                let _ = tx.send(Err(ClientError::Firmware(code)));
                true
            }
            None => false,
        }
    }

    /// Fail every outstanding command with [`ClientError::Disconnected`]
    /// and refuse further sends.
    pub fn fail_all(&self) {
        self.closed.store(true, Ordering::Release);
        let entries = {
            let mut pending = self.pending.lock();
            std::mem::take(&mut pending.entries)
        };
        for mut entry in entries {
            if let Some(tx) = entry.tx.take() {
                let _ = tx.send(Err(ClientError::Disconnected));
            }
        }
    }

    /// Whether the dispatcher has been shut down.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Number of commands currently awaiting a response.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().entries.len()
    }

    fn remove(&self, seq: u64) {
        let mut pending = self.pending.lock();
        pending.entries.retain(|e| e.seq != seq);
    }
}
