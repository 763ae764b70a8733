//! Client configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for a [`crate::CompanionClient`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// App name announced to the device on AppStart.
    pub app_name: String,

    /// Protocol version the app speaks.
    pub app_version: u8,

    /// Default deadline for a single command round-trip, in milliseconds.
    pub command_timeout_ms: u64,

    /// Default interval between mailbox polls, in milliseconds.
    pub fetch_interval_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            app_name: "mclink".to_string(),
            app_version: 3,
            command_timeout_ms: 5_000,
            fetch_interval_ms: 10_000,
        }
    }
}

impl ClientConfig {
    /// Default command deadline as a [`Duration`].
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    /// Default mailbox poll interval as a [`Duration`].
    pub fn fetch_interval(&self) -> Duration {
        Duration::from_millis(self.fetch_interval_ms)
    }
}
