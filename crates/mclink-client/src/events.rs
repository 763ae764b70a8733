//! Typed events and the subscription bus.
//!
//! Every decoded frame becomes an [`Event`]: a receipt timestamp plus a
//! typed body. Subscribers register an [`EventFilter`] (an event kind and
//! a list of required attribute equalities) and receive matching events
//! through their own queue, so a slow consumer never stalls frame
//! decoding.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tracing::trace;

use mclink_protocol::{
    BatteryStatus, ChannelMessage, ContactInfo, DeviceInfo, DirectMessage, FirmwareErrorCode,
    Message, ProtocolError, PublicKey, PublicKeyPrefix, Push, Response, SelfInfo,
};

/// The kind of an event. One per [`EventBody`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Generic OK response.
    Ok,
    /// Firmware error response.
    FirmwareError,
    /// Start of a contact listing.
    ContactsStart,
    /// One contact record.
    ContactEntry,
    /// Contact listing finished.
    ContactsComplete,
    /// Self info from the device.
    SelfInfo,
    /// Outbound message accepted for transmission.
    MessageSent,
    /// Device clock reading.
    CurrentTime,
    /// Offline queue is empty.
    NoMoreMessages,
    /// Battery and storage report.
    Battery,
    /// Device info report.
    DeviceInfo,
    /// Direct message received.
    DirectMessage,
    /// Channel message received.
    ChannelMessage,
    /// Advertisement from a known contact.
    Advert,
    /// Advertisement from an unknown contact.
    NewAdvert,
    /// Path to a contact changed.
    PathUpdate,
    /// Delivery acknowledgment arrived.
    Acknowledgment,
    /// Device has messages waiting in its offline queue.
    MessageWaiting,
    /// Server login accepted.
    LoginSuccess,
    /// Server login rejected.
    LoginFail,
    /// Status reply from a repeater or room server.
    StatusResponse,
    /// Device debug log output.
    LogData,
    /// A corrupt frame was skipped.
    ProtocolError,
    /// The link went down.
    Disconnect,
}

/// Typed payload of an event. Closed set; one variant per event kind.
#[derive(Debug, Clone)]
pub enum EventBody {
    /// Generic OK response.
    Ok,
    /// Firmware error response.
    FirmwareError(FirmwareErrorCode),
    /// Start of a contact listing.
    ContactsStart {
        /// Number of contacts the device will send.
        total_count: u32,
    },
    /// One contact record.
    ContactEntry(ContactInfo),
    /// Contact listing finished.
    ContactsComplete {
        /// Most recent lastmod across the listing.
        most_recent_lastmod: u32,
    },
    /// Self info from the device.
    SelfInfo(SelfInfo),
    /// Outbound message accepted for transmission.
    MessageSent {
        /// Whether the message went out as a flood.
        is_flood: bool,
        /// ACK hash the device expects back.
        expected_ack: u32,
        /// Device's estimate of the round-trip timeout.
        est_timeout_ms: u32,
    },
    /// Device clock reading.
    CurrentTime {
        /// Unix timestamp in seconds.
        time_secs: u32,
    },
    /// Offline queue is empty.
    NoMoreMessages,
    /// Battery and storage report.
    Battery(BatteryStatus),
    /// Device info report.
    DeviceInfo(DeviceInfo),
    /// Direct message received.
    DirectMessage(DirectMessage),
    /// Channel message received.
    ChannelMessage(ChannelMessage),
    /// Advertisement from a known contact.
    Advert {
        /// Advertiser's public key.
        public_key: PublicKey,
    },
    /// Advertisement from an unknown contact.
    NewAdvert(ContactInfo),
    /// Path to a contact changed.
    PathUpdate {
        /// Contact's public key.
        public_key: PublicKey,
    },
    /// Delivery acknowledgment arrived.
    Acknowledgment {
        /// ACK hash that was confirmed.
        ack_hash: u32,
        /// Round-trip time in milliseconds.
        trip_time_ms: u32,
    },
    /// Device has messages waiting in its offline queue.
    MessageWaiting,
    /// Server login accepted.
    LoginSuccess {
        /// Whether the session has admin rights.
        is_admin: bool,
        /// Server's public key prefix.
        server_prefix: PublicKeyPrefix,
    },
    /// Server login rejected.
    LoginFail {
        /// Server's public key prefix.
        server_prefix: PublicKeyPrefix,
    },
    /// Status reply from a repeater or room server.
    StatusResponse {
        /// Server's public key prefix.
        server_prefix: PublicKeyPrefix,
        /// Raw status data.
        data: Vec<u8>,
    },
    /// Device debug log output.
    LogData {
        /// Raw log bytes.
        data: Vec<u8>,
    },
    /// A corrupt frame was skipped.
    ProtocolError(ProtocolError),
    /// The link went down.
    Disconnect,
}

/// One decoded event: a receipt timestamp plus a typed body.
#[derive(Debug, Clone)]
pub struct Event {
    /// When the host decoded the frame.
    pub received_at: DateTime<Utc>,
    /// Typed payload.
    pub body: EventBody,
}

impl Event {
    /// Create an event timestamped now.
    pub fn now(body: EventBody) -> Self {
        Event {
            received_at: Utc::now(),
            body,
        }
    }

    /// Get the kind of this event.
    pub fn kind(&self) -> EventKind {
        match &self.body {
            EventBody::Ok => EventKind::Ok,
            EventBody::FirmwareError(_) => EventKind::FirmwareError,
            EventBody::ContactsStart { .. } => EventKind::ContactsStart,
            EventBody::ContactEntry(_) => EventKind::ContactEntry,
            EventBody::ContactsComplete { .. } => EventKind::ContactsComplete,
            EventBody::SelfInfo(_) => EventKind::SelfInfo,
            EventBody::MessageSent { .. } => EventKind::MessageSent,
            EventBody::CurrentTime { .. } => EventKind::CurrentTime,
            EventBody::NoMoreMessages => EventKind::NoMoreMessages,
            EventBody::Battery(_) => EventKind::Battery,
            EventBody::DeviceInfo(_) => EventKind::DeviceInfo,
            EventBody::DirectMessage(_) => EventKind::DirectMessage,
            EventBody::ChannelMessage(_) => EventKind::ChannelMessage,
            EventBody::Advert { .. } => EventKind::Advert,
            EventBody::NewAdvert(_) => EventKind::NewAdvert,
            EventBody::PathUpdate { .. } => EventKind::PathUpdate,
            EventBody::Acknowledgment { .. } => EventKind::Acknowledgment,
            EventBody::MessageWaiting => EventKind::MessageWaiting,
            EventBody::LoginSuccess { .. } => EventKind::LoginSuccess,
            EventBody::LoginFail { .. } => EventKind::LoginFail,
            EventBody::StatusResponse { .. } => EventKind::StatusResponse,
            EventBody::LogData { .. } => EventKind::LogData,
            EventBody::ProtocolError(_) => EventKind::ProtocolError,
            EventBody::Disconnect => EventKind::Disconnect,
        }
    }

    /// Look up a named attribute for filter matching.
    ///
    /// Each event kind exposes a fixed attribute schema; unknown names
    /// return `None`, which never matches a filter.
    pub fn attribute(&self, name: &str) -> Option<AttrValue> {
        match (&self.body, name) {
            (EventBody::FirmwareError(code), "code") => Some(AttrValue::UInt(u8::from(*code) as u64)),

            (EventBody::ContactsStart { total_count }, "total_count") => {
                Some(AttrValue::UInt(*total_count as u64))
            }

            (EventBody::ContactEntry(c), "public_key") => Some(AttrValue::Str(c.public_key.to_hex())),
            (EventBody::ContactEntry(c), "name") => Some(AttrValue::Str(c.name.clone())),

            (EventBody::ContactsComplete { most_recent_lastmod }, "most_recent_lastmod") => {
                Some(AttrValue::UInt(*most_recent_lastmod as u64))
            }

            (EventBody::SelfInfo(info), "public_key") => {
                Some(AttrValue::Str(info.public_key.to_hex()))
            }
            (EventBody::SelfInfo(info), "name") => Some(AttrValue::Str(info.node_name.clone())),

            (EventBody::MessageSent { is_flood, .. }, "is_flood") => {
                Some(AttrValue::Bool(*is_flood))
            }
            (EventBody::MessageSent { expected_ack, .. }, "expected_ack") => {
                Some(AttrValue::UInt(*expected_ack as u64))
            }

            (EventBody::CurrentTime { time_secs }, "time_secs") => {
                Some(AttrValue::UInt(*time_secs as u64))
            }

            (EventBody::Battery(b), "battery_millivolts") => {
                Some(AttrValue::UInt(b.battery_millivolts as u64))
            }

            (EventBody::DeviceInfo(d), "firmware_version") => {
                Some(AttrValue::Str(d.firmware_version.clone()))
            }

            (EventBody::DirectMessage(m), "sender_prefix") => {
                Some(AttrValue::Str(m.sender_prefix.to_hex()))
            }
            (EventBody::DirectMessage(m), "text") => Some(AttrValue::Str(m.text.clone())),
            (EventBody::DirectMessage(m), "path_len") => Some(AttrValue::UInt(m.path_len as u64)),
            (EventBody::DirectMessage(m), "timestamp") => {
                Some(AttrValue::UInt(m.timestamp as u64))
            }

            (EventBody::ChannelMessage(m), "channel_idx") => {
                Some(AttrValue::UInt(m.channel_idx as u64))
            }
            (EventBody::ChannelMessage(m), "text") => Some(AttrValue::Str(m.text.clone())),
            (EventBody::ChannelMessage(m), "timestamp") => {
                Some(AttrValue::UInt(m.timestamp as u64))
            }

            (EventBody::Advert { public_key }, "public_key") => {
                Some(AttrValue::Str(public_key.to_hex()))
            }

            (EventBody::NewAdvert(c), "public_key") => Some(AttrValue::Str(c.public_key.to_hex())),
            (EventBody::NewAdvert(c), "name") => Some(AttrValue::Str(c.name.clone())),

            (EventBody::PathUpdate { public_key }, "public_key") => {
                Some(AttrValue::Str(public_key.to_hex()))
            }

            (EventBody::Acknowledgment { ack_hash, .. }, "ack_hash") => {
                Some(AttrValue::UInt(*ack_hash as u64))
            }
            (EventBody::Acknowledgment { trip_time_ms, .. }, "trip_time_ms") => {
                Some(AttrValue::UInt(*trip_time_ms as u64))
            }

            (EventBody::LoginSuccess { server_prefix, .. }, "server_prefix") => {
                Some(AttrValue::Str(server_prefix.to_hex()))
            }
            (EventBody::LoginSuccess { is_admin, .. }, "is_admin") => {
                Some(AttrValue::Bool(*is_admin))
            }

            (EventBody::LoginFail { server_prefix }, "server_prefix") => {
                Some(AttrValue::Str(server_prefix.to_hex()))
            }

            (EventBody::StatusResponse { server_prefix, .. }, "server_prefix") => {
                Some(AttrValue::Str(server_prefix.to_hex()))
            }

            _ => None,
        }
    }
}

impl From<Message> for EventBody {
    fn from(msg: Message) -> Self {
        match msg {
            Message::Response(resp) => match resp {
                Response::Ok => EventBody::Ok,
                Response::Error(code) => EventBody::FirmwareError(code),
                Response::ContactsStart { total_count } => EventBody::ContactsStart { total_count },
                Response::Contact(c) => EventBody::ContactEntry(c),
                Response::EndOfContacts {
                    most_recent_lastmod,
                } => EventBody::ContactsComplete {
                    most_recent_lastmod,
                },
                Response::SelfInfo(info) => EventBody::SelfInfo(info),
                Response::Sent {
                    is_flood,
                    expected_ack,
                    est_timeout_ms,
                } => EventBody::MessageSent {
                    is_flood,
                    expected_ack,
                    est_timeout_ms,
                },
                Response::CurrentTime { time_secs } => EventBody::CurrentTime { time_secs },
                Response::NoMoreMessages => EventBody::NoMoreMessages,
                Response::Battery(b) => EventBody::Battery(b),
                Response::DeviceInfo(d) => EventBody::DeviceInfo(d),
                Response::DirectMessageV2(m) | Response::DirectMessageV3(m) => {
                    EventBody::DirectMessage(m)
                }
                Response::ChannelMessageV2(m) | Response::ChannelMessageV3(m) => {
                    EventBody::ChannelMessage(m)
                }
            },
            Message::Push(push) => match push {
                Push::Advert { public_key } => EventBody::Advert { public_key },
                Push::NewAdvert(c) => EventBody::NewAdvert(c),
                Push::PathUpdated { public_key } => EventBody::PathUpdate { public_key },
                Push::SendConfirmed {
                    ack_hash,
                    trip_time_ms,
                } => EventBody::Acknowledgment {
                    ack_hash,
                    trip_time_ms,
                },
                Push::MessageWaiting => EventBody::MessageWaiting,
                Push::LoginSuccess {
                    is_admin,
                    server_prefix,
                    ..
                } => EventBody::LoginSuccess {
                    is_admin,
                    server_prefix,
                },
                Push::LoginFail { server_prefix } => EventBody::LoginFail { server_prefix },
                Push::StatusResponse {
                    server_prefix,
                    data,
                } => EventBody::StatusResponse {
                    server_prefix,
                    data,
                },
                Push::LogData { data } => EventBody::LogData { data },
            },
        }
    }
}

/// An attribute value used in equality filters.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    /// A string value.
    Str(String),
    /// An unsigned integer value.
    UInt(u64),
    /// A signed integer value.
    Int(i64),
    /// A boolean value.
    Bool(bool),
    /// A byte string value.
    Bytes(Vec<u8>),
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Str(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::Str(value)
    }
}

impl From<u64> for AttrValue {
    fn from(value: u64) -> Self {
        AttrValue::UInt(value)
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        AttrValue::Bool(value)
    }
}

/// A subscription's match criteria: an optional kind plus required
/// attribute equalities, evaluated in order.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Required event kind, or `None` to match any kind.
    pub kind: Option<EventKind>,
    /// Required attribute-name / expected-value pairs. All must hold.
    pub attributes: Vec<(String, AttrValue)>,
}

impl EventFilter {
    /// Match any event.
    pub fn any() -> Self {
        EventFilter::default()
    }

    /// Match events of one kind.
    pub fn kind(kind: EventKind) -> Self {
        EventFilter {
            kind: Some(kind),
            attributes: Vec::new(),
        }
    }

    /// Require an attribute to equal a value.
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    /// Check whether an event satisfies this filter.
    pub fn matches(&self, event: &Event) -> bool {
        if let Some(kind) = self.kind {
            if event.kind() != kind {
                return false;
            }
        }
        self.attributes
            .iter()
            .all(|(name, expected)| event.attribute(name).as_ref() == Some(expected))
    }
}

/// Identifier for a registered subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

enum SubscriptionSink {
    /// Persistent: events flow into the subscriber's queue until
    /// unsubscribed.
    Persistent(mpsc::UnboundedSender<Event>),
    /// One-shot: the sender is taken under the bus lock on first match,
    /// so it cannot fire twice even under racing publishes.
    OneShot(Option<oneshot::Sender<Event>>),
}

struct SubscriptionEntry {
    id: SubscriptionId,
    filter: EventFilter,
    sink: SubscriptionSink,
}

#[derive(Default)]
struct BusInner {
    next_id: u64,
    // Registration order is delivery order.
    entries: Vec<SubscriptionEntry>,
}

/// Fans decoded events out to subscribers.
///
/// Publishing never awaits: matching is done under a short lock and
/// delivery goes through per-subscription queues. A closed or dropped
/// receiver is pruned without affecting later subscriptions.
#[derive(Default)]
pub struct EventBus {
    inner: Mutex<BusInner>,
}

/// A persistent subscription's receiving half.
pub struct Subscription {
    id: SubscriptionId,
    rx: mpsc::UnboundedReceiver<Event>,
}

impl Subscription {
    /// This subscription's id, for [`EventBus::unsubscribe`].
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Receive the next matching event. Returns `None` once the
    /// subscription has been removed and its queue drained.
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    /// Take an already-queued event without waiting, if one is present.
    pub fn try_recv(&mut self) -> Option<Event> {
        self.rx.try_recv().ok()
    }
}

impl EventBus {
    /// Create an empty bus.
    pub fn new() -> Arc<Self> {
        Arc::new(EventBus::default())
    }

    /// Register a persistent subscription.
    pub fn subscribe(&self, filter: EventFilter) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.register(filter, SubscriptionSink::Persistent(tx));
        Subscription { id, rx }
    }

    /// Register a one-shot subscription. The receiver yields the first
    /// matching event, after which the subscription is gone.
    pub fn subscribe_oneshot(&self, filter: EventFilter) -> (SubscriptionId, oneshot::Receiver<Event>) {
        let (tx, rx) = oneshot::channel();
        let id = self.register(filter, SubscriptionSink::OneShot(Some(tx)));
        (id, rx)
    }

    fn register(&self, filter: EventFilter, sink: SubscriptionSink) -> SubscriptionId {
        let mut inner = self.inner.lock();
        let id = SubscriptionId(inner.next_id);
        inner.next_id += 1;
        inner.entries.push(SubscriptionEntry { id, filter, sink });
        id
    }

    /// Remove a subscription. Idempotent; unknown ids are a no-op.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        let mut inner = self.inner.lock();
        inner.entries.retain(|e| e.id != id);
    }

    /// Offer an event to every subscription, in registration order.
    ///
    /// Fired one-shots and subscriptions whose receiver has gone away are
    /// removed before `publish` returns.
    pub fn publish(&self, event: &Event) {
        let mut inner = self.inner.lock();
        trace!(kind = ?event.kind(), "publishing event");
        inner.entries.retain_mut(|entry| {
            if !entry.filter.matches(event) {
                return true;
            }
            match &mut entry.sink {
                SubscriptionSink::Persistent(tx) => tx.send(event.clone()).is_ok(),
                SubscriptionSink::OneShot(tx) => {
                    if let Some(tx) = tx.take() {
                        // A dropped receiver is an isolated failure.
                        let _ = tx.send(event.clone());
                    }
                    false
                }
            }
        });
    }

    /// Wait for the next event matching `filter`, up to `timeout`.
    ///
    /// Registers a transient one-shot subscription and removes it on the
    /// way out, whether it fired, timed out, or the wait was cancelled.
    pub async fn wait_for_event(
        &self,
        filter: EventFilter,
        timeout: std::time::Duration,
    ) -> Option<Event> {
        let (id, rx) = self.subscribe_oneshot(filter);
        let _cleanup = WaitCleanup { bus: self, id };
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(event)) => Some(event),
            _ => None,
        }
    }

    /// Number of live subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.inner.lock().entries.len()
    }
}

/// Unsubscribes the transient one-shot when the enclosing wait is
/// dropped, including a drop at the timeout await point.
struct WaitCleanup<'a> {
    bus: &'a EventBus,
    id: SubscriptionId,
}

impl Drop for WaitCleanup<'_> {
    fn drop(&mut self) {
        self.bus.unsubscribe(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mclink_protocol::TextType;

    fn direct_message_event(sender: [u8; 6], text: &str) -> Event {
        Event::now(EventBody::DirectMessage(DirectMessage {
            sender_prefix: PublicKeyPrefix::new(sender),
            path_len: 0,
            text_type: TextType::Plain,
            timestamp: 1_700_000_000,
            snr_x4: None,
            signature: Vec::new(),
            text: text.to_string(),
        }))
    }

    #[test]
    fn test_filter_kind_and_attribute() {
        let filter = EventFilter::kind(EventKind::DirectMessage).attr("sender_prefix", "a1b2c3d4e5f6");
        let matching = direct_message_event([0xA1, 0xB2, 0xC3, 0xD4, 0xE5, 0xF6], "hi");
        let wrong_sender = direct_message_event([0xFF, 0x00, 0xFF, 0x00, 0xFF, 0x00], "hi");
        let wrong_kind = Event::now(EventBody::NoMoreMessages);

        assert!(filter.matches(&matching));
        assert!(!filter.matches(&wrong_sender));
        assert!(!filter.matches(&wrong_kind));
    }

    #[test]
    fn test_filter_missing_attribute_never_matches() {
        let filter = EventFilter::any().attr("sender_prefix", "a1b2c3d4e5f6");
        assert!(!filter.matches(&Event::now(EventBody::Ok)));
    }

    #[test]
    fn test_publish_delivers_in_registration_order() {
        let bus = EventBus::new();
        let mut first = bus.subscribe(EventFilter::any());
        let mut second = bus.subscribe(EventFilter::any());

        bus.publish(&Event::now(EventBody::Ok));
        bus.publish(&Event::now(EventBody::NoMoreMessages));

        assert_eq!(first.try_recv().map(|e| e.kind()), Some(EventKind::Ok));
        assert_eq!(second.try_recv().map(|e| e.kind()), Some(EventKind::Ok));
        assert_eq!(
            first.try_recv().map(|e| e.kind()),
            Some(EventKind::NoMoreMessages)
        );
        assert_eq!(
            second.try_recv().map(|e| e.kind()),
            Some(EventKind::NoMoreMessages)
        );
    }

    #[test]
    fn test_non_matching_subscription_not_invoked() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe(EventFilter::kind(EventKind::Battery));
        bus.publish(&direct_message_event([1, 2, 3, 4, 5, 6], "x"));
        assert!(sub.try_recv().is_none());
    }

    #[test]
    fn test_oneshot_fires_at_most_once() {
        let bus = EventBus::new();
        let (_id, mut rx) = bus.subscribe_oneshot(EventFilter::kind(EventKind::Ok));

        bus.publish(&Event::now(EventBody::Ok));
        bus.publish(&Event::now(EventBody::Ok));

        assert!(rx.try_recv().is_ok());
        assert_eq!(bus.subscription_count(), 0);
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let bus = EventBus::new();
        let sub = bus.subscribe(EventFilter::any());
        let id = sub.id();
        bus.unsubscribe(id);
        bus.unsubscribe(id);
        assert_eq!(bus.subscription_count(), 0);
    }

    #[test]
    fn test_dropped_receiver_does_not_block_later_subscribers() {
        let bus = EventBus::new();
        let first = bus.subscribe(EventFilter::any());
        let mut second = bus.subscribe(EventFilter::any());
        drop(first);

        bus.publish(&Event::now(EventBody::Ok));
        assert_eq!(second.try_recv().map(|e| e.kind()), Some(EventKind::Ok));
        // The dead subscription was pruned during publish.
        assert_eq!(bus.subscription_count(), 1);
    }

    #[tokio::test]
    async fn test_wait_for_event_times_out_and_cleans_up() {
        let bus = EventBus::new();
        let got = bus
            .wait_for_event(
                EventFilter::kind(EventKind::Battery),
                std::time::Duration::from_millis(50),
            )
            .await;
        assert!(got.is_none());
        assert_eq!(bus.subscription_count(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_wait_removes_subscription() {
        let bus = EventBus::new();
        let mut wait = Box::pin(bus.wait_for_event(
            EventFilter::kind(EventKind::Battery),
            std::time::Duration::from_secs(60),
        ));
        // Poll once so the one-shot registers, then drop the future
        // before anything matches.
        tokio::select! {
            biased;
            _ = &mut wait => panic!("wait completed without a matching event"),
            _ = tokio::time::sleep(std::time::Duration::from_millis(20)) => {}
        }
        assert_eq!(bus.subscription_count(), 1);
        drop(wait);
        assert_eq!(bus.subscription_count(), 0);
    }

    #[tokio::test]
    async fn test_wait_for_event_receives_match() {
        let bus = EventBus::new();
        let waiter = {
            let bus = bus.clone();
            tokio::spawn(async move {
                bus.wait_for_event(
                    EventFilter::kind(EventKind::CurrentTime),
                    std::time::Duration::from_secs(5),
                )
                .await
            })
        };

        // Give the waiter a moment to register.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        bus.publish(&Event::now(EventBody::CurrentTime { time_secs: 99 }));

        let got = waiter.await.unwrap();
        match got {
            Some(event) => assert_eq!(event.attribute("time_secs"), Some(AttrValue::UInt(99))),
            None => panic!("wait_for_event missed the publish"),
        }
    }
}
