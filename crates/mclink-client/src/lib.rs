//! Host-side client for MeshCore-style companion radios.
//!
//! Connects over any byte-oriented duplex link (TCP here; serial or BLE
//! behind the same [`transport::Transport`] seam), frames the stream,
//! correlates command/response pairs, and fans decoded events out to
//! subscribers. A background poller can drain the device's offline
//! message queue without interfering with foreground commands.
//!
//! ```rust,ignore
//! use mclink_client::{ClientConfig, CompanionClient, TcpTransport};
//!
//! let transport = TcpTransport::connect("10.0.0.5:5000").await?;
//! let client = CompanionClient::open(transport, ClientConfig::default());
//! let me = client.app_start().await?;
//! println!("connected as {}", me.node_name);
//!
//! client.start_auto_fetch_default();
//! let battery = client.get_battery().await?;
//! ```

pub mod client;
pub mod config;
pub mod contacts;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod fetch;
pub mod transport;

pub use client::{CompanionClient, SendReceipt};
pub use config::ClientConfig;
pub use contacts::ContactDirectory;
pub use dispatch::Dispatcher;
pub use error::ClientError;
pub use events::{
    AttrValue, Event, EventBody, EventBus, EventFilter, EventKind, Subscription, SubscriptionId,
};
pub use fetch::MailboxPoller;
pub use transport::{TcpTransport, Transport};

// Protocol types appear throughout the public API.
pub use mclink_protocol as protocol;
