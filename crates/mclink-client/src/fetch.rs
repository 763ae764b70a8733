//! Mailbox auto-fetch loop.
//!
//! A supervised repeating task that drains the device's offline message
//! queue. Each tick issues `SyncNextMessage` through the dispatcher until
//! the device answers `NoMoreMessages`; the retrieved messages reach
//! subscribers through the shared decode path (the reader publishes every
//! frame), in device order. The next tick is scheduled one interval after
//! the current tick *completes*, so a slow device cannot cause
//! overlapping fetches.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use mclink_protocol::Command;

use crate::dispatch::Dispatcher;
use crate::error::ClientError;
use crate::events::EventKind;

/// One started loop. Each call to [`MailboxPoller::start`] gets its own
/// flag and stop signal, so a loop that was stopped mid-fetch observes
/// only its own state and can never be revived by a later `start`.
struct ActiveLoop {
    running: Arc<AtomicBool>,
    stop_signal: Arc<Notify>,
    handle: JoinHandle<()>,
}

/// Periodically drains the device mailbox. `Stopped` until
/// [`MailboxPoller::start`] is called.
pub struct MailboxPoller {
    dispatcher: Arc<Dispatcher>,
    command_timeout: Duration,
    active: Mutex<Option<ActiveLoop>>,
}

impl MailboxPoller {
    /// Create a stopped poller.
    pub fn new(dispatcher: Arc<Dispatcher>, command_timeout: Duration) -> Self {
        MailboxPoller {
            dispatcher,
            command_timeout,
            active: Mutex::new(None),
        }
    }

    /// Move Stopped → Running. The first tick runs immediately; each
    /// subsequent tick runs `interval` after the previous one completes.
    /// A no-op if already running.
    pub fn start(&self, interval: Duration) {
        let mut active = self.active.lock();
        if let Some(current) = active.as_ref() {
            if current.running.load(Ordering::Acquire) {
                return;
            }
        }

        let running = Arc::new(AtomicBool::new(true));
        let stop_signal = Arc::new(Notify::new());
        let dispatcher = Arc::clone(&self.dispatcher);
        let loop_running = Arc::clone(&running);
        let loop_stop = Arc::clone(&stop_signal);
        let command_timeout = self.command_timeout;

        let handle = tokio::spawn(async move {
            debug!(interval_ms = interval.as_millis() as u64, "mailbox poller started");
            loop {
                if !loop_running.load(Ordering::Acquire) {
                    break;
                }

                match drain_mailbox(&dispatcher, command_timeout).await {
                    Ok(fetched) => {
                        if fetched > 0 {
                            trace!(fetched, "mailbox drained");
                        }
                    }
                    Err(err) => {
                        // Only a dead link stops the loop.
                        warn!(error = %err, "mailbox fetch failed, stopping poller");
                        loop_running.store(false, Ordering::Release);
                        break;
                    }
                }

                if !loop_running.load(Ordering::Acquire) {
                    break;
                }
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = loop_stop.notified() => break,
                }
            }
            debug!("mailbox poller stopped");
        });

        *active = Some(ActiveLoop {
            running,
            stop_signal,
            handle,
        });
    }

    /// Move Running → Stopped. Cancels any scheduled future tick; an
    /// in-flight fetch finishes naturally. A no-op if already stopped.
    pub fn stop(&self) {
        if let Some(current) = self.active.lock().take() {
            current.running.store(false, Ordering::Release);
            current.stop_signal.notify_waiters();
            drop(current.handle);
        }
    }

    /// Whether the poller is currently running.
    pub fn is_running(&self) -> bool {
        self.active
            .lock()
            .as_ref()
            .map(|current| current.running.load(Ordering::Acquire))
            .unwrap_or(false)
    }
}

impl Drop for MailboxPoller {
    fn drop(&mut self) {
        self.stop();
    }
}

/// One tick: pull messages until the queue is empty. Returns how many
/// messages arrived. Transient failures (timeout, a colliding foreground
/// sync) end the tick without ending the loop; a dead link is an error.
async fn drain_mailbox(
    dispatcher: &Dispatcher,
    command_timeout: Duration,
) -> Result<usize, ClientError> {
    let mut fetched = 0usize;
    loop {
        match dispatcher.send(&Command::SyncNextMessage, command_timeout).await {
            Ok(event) => match event.kind() {
                EventKind::NoMoreMessages => return Ok(fetched),
                EventKind::DirectMessage | EventKind::ChannelMessage => {
                    fetched += 1;
                }
                other => {
                    warn!(kind = ?other, "unexpected mailbox reply");
                    return Ok(fetched);
                }
            },
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => {
                warn!(error = %err, "mailbox sync failed, will retry next tick");
                return Ok(fetched);
            }
        }
    }
}
