//! The connection object.
//!
//! A [`CompanionClient`] owns one transport link and everything attached
//! to it: the reader task driving the frame codec, the dispatcher, the
//! event bus, the contact directory, and the mailbox poller. Two clients
//! share no state.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use mclink_protocol::{
    BatteryStatus, Command, ContactInfo, DeviceInfo, FrameCodec, Message, ProtocolError,
    PublicKey, PublicKeyPrefix, Push, Response, SelfInfo, TextType,
};

use crate::config::ClientConfig;
use crate::contacts::ContactDirectory;
use crate::dispatch::Dispatcher;
use crate::error::ClientError;
use crate::events::{Event, EventBody, EventFilter, EventBus, Subscription, SubscriptionId};
use crate::fetch::MailboxPoller;
use crate::transport::Transport;

/// Result of a message send: what the device promised to do with it.
#[derive(Debug, Clone, Copy)]
pub struct SendReceipt {
    /// Whether the message went out as a flood.
    pub is_flood: bool,
    /// ACK hash to watch for in acknowledgment events.
    pub expected_ack: u32,
    /// Device's estimate of the round-trip timeout in milliseconds.
    pub est_timeout_ms: u32,
}

/// A live connection to a companion radio.
pub struct CompanionClient {
    config: ClientConfig,
    dispatcher: Arc<Dispatcher>,
    bus: Arc<EventBus>,
    contacts: Arc<ContactDirectory>,
    poller: MailboxPoller,
    reader_task: Mutex<Option<JoinHandle<()>>>,
    self_info: Mutex<Option<SelfInfo>>,
}

impl CompanionClient {
    /// Open a client over a transport. Spawns the reader task; the
    /// device is not touched until the first command is sent (usually
    /// [`CompanionClient::app_start`]).
    pub fn open<T: Transport>(transport: T, config: ClientConfig) -> Self {
        let (reader, writer) = transport.split();

        let dispatcher = Arc::new(Dispatcher::new(Box::new(writer)));
        let bus = EventBus::new();
        let contacts = Arc::new(ContactDirectory::new());

        let reader_task = tokio::spawn(read_loop(
            reader,
            Arc::clone(&dispatcher),
            Arc::clone(&bus),
            Arc::clone(&contacts),
        ));

        let poller = MailboxPoller::new(Arc::clone(&dispatcher), config.command_timeout());

        CompanionClient {
            config,
            dispatcher,
            bus,
            contacts,
            poller,
            reader_task: Mutex::new(Some(reader_task)),
            self_info: Mutex::new(None),
        }
    }

    // ========================================================================
    // Command surface
    // ========================================================================

    /// Start the app session. The device answers with its self info,
    /// which is cached and returned.
    pub async fn app_start(&self) -> Result<SelfInfo, ClientError> {
        let event = self
            .request(Command::AppStart {
                app_version: self.config.app_version,
                app_name: self.config.app_name.clone(),
            })
            .await?;
        match event.body {
            EventBody::SelfInfo(info) => {
                *self.self_info.lock() = Some(info.clone());
                Ok(info)
            }
            _ => Err(unexpected(&event)),
        }
    }

    /// Query device firmware and hardware information.
    pub async fn device_query(&self) -> Result<DeviceInfo, ClientError> {
        let event = self
            .request(Command::DeviceQuery {
                app_version: self.config.app_version,
            })
            .await?;
        match event.body {
            EventBody::DeviceInfo(info) => Ok(info),
            _ => Err(unexpected(&event)),
        }
    }

    /// Fetch the device's contact table. The directory is updated as
    /// entries stream in; the call resolves when the listing completes
    /// and returns a snapshot.
    pub async fn get_contacts(&self, since: Option<u32>) -> Result<Vec<ContactInfo>, ClientError> {
        let event = self.request(Command::GetContacts { since }).await?;
        match event.body {
            EventBody::ContactsComplete { .. } => Ok(self.contacts.all()),
            _ => Err(unexpected(&event)),
        }
    }

    /// Send a plain text message to a contact.
    pub async fn send_direct_message(
        &self,
        recipient: PublicKeyPrefix,
        text: &str,
    ) -> Result<SendReceipt, ClientError> {
        self.routed_send(Command::SendDirectMessage {
            text_type: TextType::Plain,
            attempt: 0,
            timestamp: Utc::now().timestamp() as u32,
            recipient_prefix: recipient,
            text: text.to_string(),
        })
        .await
    }

    /// Send a plain text message to a channel.
    pub async fn send_channel_message(
        &self,
        channel_idx: u8,
        text: &str,
    ) -> Result<SendReceipt, ClientError> {
        self.routed_send(Command::SendChannelMessage {
            text_type: TextType::Plain,
            channel_idx,
            timestamp: Utc::now().timestamp() as u32,
            text: text.to_string(),
        })
        .await
    }

    /// Set the name the device advertises.
    pub async fn set_advert_name(&self, name: &str) -> Result<(), ClientError> {
        self.request_ok(Command::SetAdvertName {
            name: name.to_string(),
        })
        .await
    }

    /// Set the location the device advertises, in microdegrees.
    pub async fn set_advert_latlon(&self, lat: i32, lon: i32) -> Result<(), ClientError> {
        self.request_ok(Command::SetAdvertLatLon { lat, lon }).await
    }

    /// Set radio transmit power in dBm.
    pub async fn set_radio_tx_power(&self, power_dbm: u8) -> Result<(), ClientError> {
        self.request_ok(Command::SetRadioTxPower { power_dbm }).await
    }

    /// Read the device clock.
    pub async fn get_device_time(&self) -> Result<u32, ClientError> {
        let event = self.request(Command::GetDeviceTime).await?;
        match event.body {
            EventBody::CurrentTime { time_secs } => Ok(time_secs),
            _ => Err(unexpected(&event)),
        }
    }

    /// Set the device clock.
    pub async fn set_device_time(&self, time_secs: u32) -> Result<(), ClientError> {
        self.request_ok(Command::SetDeviceTime { time_secs }).await
    }

    /// Broadcast a self-advertisement, flooded or zero-hop.
    pub async fn send_self_advert(&self, flood: bool) -> Result<(), ClientError> {
        self.request_ok(Command::SendSelfAdvert { flood }).await
    }

    /// Query battery voltage and storage usage.
    pub async fn get_battery(&self) -> Result<BatteryStatus, ClientError> {
        let event = self.request(Command::GetBattery).await?;
        match event.body {
            EventBody::Battery(status) => Ok(status),
            _ => Err(unexpected(&event)),
        }
    }

    /// Pull one message from the device's offline queue. The reply is
    /// either a message event or `NoMoreMessages`.
    pub async fn sync_next_message(&self) -> Result<Event, ClientError> {
        self.request(Command::SyncNextMessage).await
    }

    /// Log in to a repeater or room server. The device acknowledges the
    /// routed send; the server's verdict arrives later as a
    /// [`crate::events::EventKind::LoginSuccess`] or
    /// [`crate::events::EventKind::LoginFail`] event.
    pub async fn send_login(
        &self,
        server: PublicKey,
        password: &str,
    ) -> Result<SendReceipt, ClientError> {
        self.routed_send(Command::SendLogin {
            public_key: server,
            password: password.to_string(),
        })
        .await
    }

    /// Request status from a repeater or room server. The report arrives
    /// later as a [`crate::events::EventKind::StatusResponse`] event.
    pub async fn send_status_request(
        &self,
        server: PublicKey,
    ) -> Result<SendReceipt, ClientError> {
        self.routed_send(Command::SendStatusRequest { public_key: server })
            .await
    }

    /// Log out of a repeater or room server.
    pub async fn logout(&self, server: PublicKey) -> Result<SendReceipt, ClientError> {
        self.routed_send(Command::Logout { public_key: server }).await
    }

    /// Reboot the device. Fire-and-forget; the device drops the link.
    pub async fn reboot(&self) -> Result<(), ClientError> {
        self.dispatcher.send_no_response(&Command::Reboot).await
    }

    /// Send an arbitrary command with an explicit deadline.
    pub async fn send(&self, command: &Command, timeout: Duration) -> Result<Event, ClientError> {
        self.dispatcher.send(command, timeout).await
    }

    // ========================================================================
    // Events, contacts, polling
    // ========================================================================

    /// Register a persistent event subscription.
    pub fn subscribe(&self, filter: EventFilter) -> Subscription {
        self.bus.subscribe(filter)
    }

    /// Remove a subscription. Idempotent.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.bus.unsubscribe(id)
    }

    /// Wait for the next event matching `filter`, up to `timeout`.
    pub async fn wait_for_event(&self, filter: EventFilter, timeout: Duration) -> Option<Event> {
        self.bus.wait_for_event(filter, timeout).await
    }

    /// The contact directory for this connection.
    pub fn contacts(&self) -> &ContactDirectory {
        &self.contacts
    }

    /// First contact whose name matches exactly.
    pub fn get_contact_by_name(&self, name: &str) -> Option<ContactInfo> {
        self.contacts.get_by_name(name)
    }

    /// The unique contact whose public key starts with a hex prefix.
    pub fn get_contact_by_key_prefix(
        &self,
        prefix: &str,
    ) -> Result<Option<ContactInfo>, ClientError> {
        self.contacts.get_by_key_prefix(prefix)
    }

    /// Cached self info from the last [`CompanionClient::app_start`].
    pub fn self_info(&self) -> Option<SelfInfo> {
        self.self_info.lock().clone()
    }

    /// Start draining the mailbox every `interval`. A no-op if already
    /// running.
    pub fn start_auto_fetch(&self, interval: Duration) {
        self.poller.start(interval);
    }

    /// Start auto-fetch with the configured default interval.
    pub fn start_auto_fetch_default(&self) {
        self.poller.start(self.config.fetch_interval());
    }

    /// Stop the mailbox poller; an in-flight fetch finishes naturally.
    pub fn stop_auto_fetch(&self) {
        self.poller.stop();
    }

    /// Whether the mailbox poller is running.
    pub fn auto_fetch_running(&self) -> bool {
        self.poller.is_running()
    }

    /// This connection's configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Tear down the connection: stops the poller, fails every pending
    /// command with [`ClientError::Disconnected`], publishes a disconnect
    /// event, and stops the reader.
    pub fn close(&self) {
        self.poller.stop();
        if !self.dispatcher.is_closed() {
            self.dispatcher.fail_all();
            self.bus.publish(&Event::now(EventBody::Disconnect));
        }
        if let Some(task) = self.reader_task.lock().take() {
            task.abort();
        }
        debug!("client closed");
    }

    async fn request(&self, command: Command) -> Result<Event, ClientError> {
        self.dispatcher
            .send(&command, self.config.command_timeout())
            .await
    }

    async fn request_ok(&self, command: Command) -> Result<(), ClientError> {
        let event = self.request(command).await?;
        match event.body {
            EventBody::Ok => Ok(()),
            _ => Err(unexpected(&event)),
        }
    }

    async fn routed_send(&self, command: Command) -> Result<SendReceipt, ClientError> {
        let event = self.request(command).await?;
        match event.body {
            EventBody::MessageSent {
                is_flood,
                expected_ack,
                est_timeout_ms,
            } => Ok(SendReceipt {
                is_flood,
                expected_ack,
                est_timeout_ms,
            }),
            _ => Err(unexpected(&event)),
        }
    }
}

impl Drop for CompanionClient {
    fn drop(&mut self) {
        self.close();
    }
}

fn unexpected(event: &Event) -> ClientError {
    ClientError::Protocol(ProtocolError::InvalidData(format!(
        "unexpected reply kind: {:?}",
        event.kind()
    )))
}

/// Reader task: pulls bytes, drives the codec, resolves pending commands,
/// and publishes every decoded frame as an event. Never awaits a
/// subscriber. On EOF or a read error it fails all pendings and publishes
/// a disconnect event.
async fn read_loop<R: AsyncRead + Unpin>(
    mut reader: R,
    dispatcher: Arc<Dispatcher>,
    bus: Arc<EventBus>,
    contacts: Arc<ContactDirectory>,
) {
    let mut codec = FrameCodec::new();
    let mut buf = [0u8; 1024];

    loop {
        match reader.read(&mut buf).await {
            Ok(0) => {
                debug!("device closed the link");
                break;
            }
            Ok(n) => {
                codec.push(&buf[..n]);
                while let Some(decoded) = codec.decode() {
                    match decoded {
                        Ok(frame) => handle_frame(&frame, &dispatcher, &bus, &contacts),
                        Err(err) => {
                            // Corrupt frame; the codec already resynced.
                            warn!(error = %err, "skipped corrupt frame");
                            bus.publish(&Event::now(EventBody::ProtocolError(err)));
                        }
                    }
                }
            }
            Err(err) => {
                warn!(error = %err, "read failed");
                break;
            }
        }
    }

    dispatcher.fail_all();
    bus.publish(&Event::now(EventBody::Disconnect));
}

fn handle_frame(
    frame: &[u8],
    dispatcher: &Dispatcher,
    bus: &EventBus,
    contacts: &ContactDirectory,
) {
    let msg = match Message::decode(frame) {
        Ok(msg) => msg,
        Err(err) => {
            warn!(error = %err, "undecodable frame");
            bus.publish(&Event::now(EventBody::ProtocolError(err)));
            return;
        }
    };

    let code = msg.code();

    // Directory maintenance happens before fan-out so subscribers
    // observing a contact event see it already applied.
    match &msg {
        Message::Response(Response::Contact(contact)) => contacts.upsert(contact.clone()),
        Message::Push(Push::NewAdvert(contact)) => contacts.upsert(contact.clone()),
        _ => {}
    }

    let event = Event::now(EventBody::from(msg));

    // A response is simultaneously the answer to a command and an
    // observable event.
    match event.body {
        EventBody::FirmwareError(err_code) => {
            dispatcher.resolve_error(err_code);
        }
        _ => {
            dispatcher.resolve(code, &event);
        }
    }

    bus.publish(&event);
}
