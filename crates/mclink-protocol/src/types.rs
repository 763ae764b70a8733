//! Shared protocol types.

use crate::constants::*;

/// A 32-byte device public key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey(pub [u8; PUB_KEY_SIZE]);

impl PublicKey {
    /// Create a new public key from bytes.
    pub fn new(bytes: [u8; PUB_KEY_SIZE]) -> Self {
        PublicKey(bytes)
    }

    /// Create from a slice. Returns None if slice is wrong length.
    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        let bytes: [u8; PUB_KEY_SIZE] = slice.try_into().ok()?;
        Some(PublicKey(bytes))
    }

    /// Get the 6-byte prefix used to address protocol messages.
    pub fn prefix(&self) -> PublicKeyPrefix {
        PublicKeyPrefix::from(self)
    }

    /// Get the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; PUB_KEY_SIZE] {
        &self.0
    }

    /// Get the key as a lowercase hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl Default for PublicKey {
    fn default() -> Self {
        PublicKey([0u8; PUB_KEY_SIZE])
    }
}

impl AsRef<[u8]> for PublicKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// The leading 6 bytes of a public key, used where the full key is not
/// carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKeyPrefix(pub [u8; PUB_KEY_PREFIX_SIZE]);

impl PublicKeyPrefix {
    /// Create a new prefix from bytes.
    pub fn new(bytes: [u8; PUB_KEY_PREFIX_SIZE]) -> Self {
        PublicKeyPrefix(bytes)
    }

    /// Create from the first 6 bytes of a slice. Returns None if too short.
    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        if slice.len() < PUB_KEY_PREFIX_SIZE {
            return None;
        }
        let mut bytes = [0u8; PUB_KEY_PREFIX_SIZE];
        bytes.copy_from_slice(&slice[..PUB_KEY_PREFIX_SIZE]);
        Some(PublicKeyPrefix(bytes))
    }

    /// Get the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; PUB_KEY_PREFIX_SIZE] {
        &self.0
    }

    /// Get the prefix as a lowercase hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl Default for PublicKeyPrefix {
    fn default() -> Self {
        PublicKeyPrefix([0u8; PUB_KEY_PREFIX_SIZE])
    }
}

impl From<&PublicKey> for PublicKeyPrefix {
    fn from(key: &PublicKey) -> Self {
        let mut prefix = [0u8; PUB_KEY_PREFIX_SIZE];
        prefix.copy_from_slice(&key.0[..PUB_KEY_PREFIX_SIZE]);
        PublicKeyPrefix(prefix)
    }
}

/// A contact record as the device stores it.
#[derive(Debug, Clone)]
pub struct ContactInfo {
    /// Contact's public key. Primary key, unique per contact.
    pub public_key: PublicKey,
    /// Contact type (Chat, Repeater, RoomServer).
    pub contact_type: u8,
    /// Contact flags.
    pub flags: u8,
    /// Outbound path length (-1 if unknown/flood).
    pub out_path_len: i8,
    /// Outbound path data.
    pub out_path: [u8; MAX_PATH_SIZE],
    /// Advertised name (up to 31 chars).
    pub name: String,
    /// Timestamp of last advertisement.
    pub last_advert_timestamp: u32,
    /// GPS latitude (microdegrees).
    pub gps_lat: i32,
    /// GPS longitude (microdegrees).
    pub gps_lon: i32,
    /// Last modification timestamp.
    pub lastmod: u32,
}

impl Default for ContactInfo {
    fn default() -> Self {
        ContactInfo {
            public_key: PublicKey::default(),
            contact_type: ADV_TYPE_CHAT,
            flags: 0,
            out_path_len: -1,
            out_path: [0u8; MAX_PATH_SIZE],
            name: String::new(),
            last_advert_timestamp: 0,
            gps_lat: 0,
            gps_lon: 0,
            lastmod: 0,
        }
    }
}

impl ContactInfo {
    /// Get latitude as a floating point value.
    pub fn latitude(&self) -> f64 {
        self.gps_lat as f64 / 1_000_000.0
    }

    /// Get longitude as a floating point value.
    pub fn longitude(&self) -> f64 {
        self.gps_lon as f64 / 1_000_000.0
    }

    /// Check if the contact has a known direct path.
    pub fn has_direct_path(&self) -> bool {
        self.out_path_len >= 0
    }
}

/// Self/node information returned by CMD_APP_START.
#[derive(Debug, Clone, Default)]
pub struct SelfInfo {
    /// Node advertisement type.
    pub advert_type: u8,
    /// Current TX power in dBm.
    pub tx_power_dbm: u8,
    /// Maximum TX power supported.
    pub max_tx_power_dbm: u8,
    /// Node's public key.
    pub public_key: PublicKey,
    /// GPS latitude (microdegrees).
    pub gps_lat: i32,
    /// GPS longitude (microdegrees).
    pub gps_lon: i32,
    /// Radio frequency in kHz.
    pub freq_khz: u32,
    /// Radio bandwidth in Hz.
    pub bandwidth_hz: u32,
    /// Spreading factor.
    pub spreading_factor: u8,
    /// Coding rate.
    pub coding_rate: u8,
    /// Node name.
    pub node_name: String,
}

impl SelfInfo {
    /// Get frequency in MHz.
    pub fn frequency_mhz(&self) -> f64 {
        self.freq_khz as f64 / 1000.0
    }
}

/// Device information returned by CMD_DEVICE_QUERY.
#[derive(Debug, Clone, Default)]
pub struct DeviceInfo {
    /// Firmware version code.
    pub firmware_version_code: u8,
    /// Maximum contacts / 2.
    pub max_contacts_half: u8,
    /// Maximum group channels.
    pub max_group_channels: u8,
    /// BLE PIN code.
    pub ble_pin: u32,
    /// Firmware build date.
    pub build_date: String,
    /// Manufacturer name.
    pub manufacturer: String,
    /// Firmware version string.
    pub firmware_version: String,
}

impl DeviceInfo {
    /// Get the maximum number of contacts supported.
    pub fn max_contacts(&self) -> usize {
        (self.max_contacts_half as usize) * 2
    }
}

/// Battery and storage information.
#[derive(Debug, Clone, Copy)]
pub struct BatteryStatus {
    /// Battery voltage in millivolts.
    pub battery_millivolts: u16,
    /// Storage used in KB.
    pub storage_used_kb: u32,
    /// Total storage in KB.
    pub storage_total_kb: u32,
}

impl BatteryStatus {
    /// Get battery voltage in volts.
    pub fn battery_volts(&self) -> f32 {
        self.battery_millivolts as f32 / 1000.0
    }
}

/// Message type for text messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextType {
    /// Plain text message.
    Plain,
    /// CLI/command data.
    CliData,
    /// Signed plain text.
    SignedPlain,
    /// Unknown type.
    Unknown(u8),
}

impl From<u8> for TextType {
    fn from(value: u8) -> Self {
        match value {
            TXT_TYPE_PLAIN => TextType::Plain,
            TXT_TYPE_CLI_DATA => TextType::CliData,
            TXT_TYPE_SIGNED_PLAIN => TextType::SignedPlain,
            _ => TextType::Unknown(value),
        }
    }
}

impl From<TextType> for u8 {
    fn from(value: TextType) -> Self {
        match value {
            TextType::Plain => TXT_TYPE_PLAIN,
            TextType::CliData => TXT_TYPE_CLI_DATA,
            TextType::SignedPlain => TXT_TYPE_SIGNED_PLAIN,
            TextType::Unknown(v) => v,
        }
    }
}

/// A text message received from a contact.
#[derive(Debug, Clone)]
pub struct DirectMessage {
    /// Sender's public key prefix.
    pub sender_prefix: PublicKeyPrefix,
    /// Path length (0xFF = flood).
    pub path_len: u8,
    /// Message type.
    pub text_type: TextType,
    /// Sender's timestamp.
    pub timestamp: u32,
    /// SNR (scaled by 4, only in v3+ frames).
    pub snr_x4: Option<i8>,
    /// Signature bytes (for signed messages).
    pub signature: Vec<u8>,
    /// Message text.
    pub text: String,
}

impl DirectMessage {
    /// Get the SNR as a float (if available).
    pub fn snr(&self) -> Option<f32> {
        self.snr_x4.map(|s| s as f32 / 4.0)
    }

    /// Check if this message arrived by flood routing.
    pub fn is_flood(&self) -> bool {
        self.path_len == PATH_LEN_FLOOD
    }
}

/// A text message received from a channel.
#[derive(Debug, Clone)]
pub struct ChannelMessage {
    /// Channel index.
    pub channel_idx: u8,
    /// Path length (0xFF = flood).
    pub path_len: u8,
    /// Message type.
    pub text_type: TextType,
    /// Sender's timestamp.
    pub timestamp: u32,
    /// SNR (scaled by 4, only in v3+ frames).
    pub snr_x4: Option<i8>,
    /// Message text.
    pub text: String,
}

impl ChannelMessage {
    /// Get the SNR as a float (if available).
    pub fn snr(&self) -> Option<f32> {
        self.snr_x4.map(|s| s as f32 / 4.0)
    }

    /// Check if this message arrived by flood routing.
    pub fn is_flood(&self) -> bool {
        self.path_len == PATH_LEN_FLOOD
    }
}
