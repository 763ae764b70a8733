//! Protocol constants
//!
//! Command codes, response codes, push codes and fixed field sizes for the
//! companion serial protocol. Values match the device firmware.

// ============================================================================
// Framing
// ============================================================================

/// Start byte for host → device frames.
pub const FRAME_START_TX: u8 = b'<';
/// Start byte for device → host frames.
pub const FRAME_START_RX: u8 = b'>';
/// Maximum frame payload size. Anything larger is treated as corruption.
pub const MAX_FRAME_SIZE: usize = 1024;

// ============================================================================
// Command Codes (host → device)
// ============================================================================

/// Initial handshake command - starts the app connection.
pub const CMD_APP_START: u8 = 1;
/// Send a text message to a contact.
pub const CMD_SEND_TXT_MSG: u8 = 2;
/// Send a text message to a channel.
pub const CMD_SEND_CHANNEL_TXT_MSG: u8 = 3;
/// Get the list of contacts.
pub const CMD_GET_CONTACTS: u8 = 4;
/// Get the current device time.
pub const CMD_GET_DEVICE_TIME: u8 = 5;
/// Set the device time.
pub const CMD_SET_DEVICE_TIME: u8 = 6;
/// Send a self-advertisement packet.
pub const CMD_SEND_SELF_ADVERT: u8 = 7;
/// Set the advertisement name.
pub const CMD_SET_ADVERT_NAME: u8 = 8;
/// Sync the next message from the offline queue.
pub const CMD_SYNC_NEXT_MESSAGE: u8 = 10;
/// Set radio TX power.
pub const CMD_SET_RADIO_TX_POWER: u8 = 12;
/// Set advertisement latitude/longitude.
pub const CMD_SET_ADVERT_LATLON: u8 = 14;
/// Reboot the device.
pub const CMD_REBOOT: u8 = 19;
/// Get battery voltage and storage info.
pub const CMD_GET_BATT_AND_STORAGE: u8 = 20;
/// Query device information.
pub const CMD_DEVICE_QUERY: u8 = 22;
/// Log in to a repeater or room server.
pub const CMD_SEND_LOGIN: u8 = 26;
/// Request status from a repeater or room server.
pub const CMD_SEND_STATUS_REQ: u8 = 27;
/// Log out of a repeater or room server.
pub const CMD_LOGOUT: u8 = 29;

// ============================================================================
// Response Codes (device → host)
// ============================================================================

/// Generic OK response.
pub const RESP_CODE_OK: u8 = 0;
/// Generic error response (followed by error code).
pub const RESP_CODE_ERR: u8 = 1;
/// Start of contacts list.
pub const RESP_CODE_CONTACTS_START: u8 = 2;
/// A single contact entry.
pub const RESP_CODE_CONTACT: u8 = 3;
/// End of contacts list.
pub const RESP_CODE_END_OF_CONTACTS: u8 = 4;
/// Self info response (reply to CMD_APP_START).
pub const RESP_CODE_SELF_INFO: u8 = 5;
/// Message sent response (reply to CMD_SEND_TXT_MSG).
pub const RESP_CODE_SENT: u8 = 6;
/// Contact message received (legacy, ver < 3).
pub const RESP_CODE_CONTACT_MSG_RECV: u8 = 7;
/// Channel message received (legacy, ver < 3).
pub const RESP_CODE_CHANNEL_MSG_RECV: u8 = 8;
/// Current time response.
pub const RESP_CODE_CURR_TIME: u8 = 9;
/// No more messages in queue.
pub const RESP_CODE_NO_MORE_MESSAGES: u8 = 10;
/// Battery and storage info.
pub const RESP_CODE_BATT_AND_STORAGE: u8 = 12;
/// Device info response.
pub const RESP_CODE_DEVICE_INFO: u8 = 13;
/// Contact message received (ver >= 3).
pub const RESP_CODE_CONTACT_MSG_RECV_V3: u8 = 16;
/// Channel message received (ver >= 3).
pub const RESP_CODE_CHANNEL_MSG_RECV_V3: u8 = 17;

// ============================================================================
// Push Codes (unsolicited device → host)
// ============================================================================

/// Advertisement received.
pub const PUSH_CODE_ADVERT: u8 = 0x80;
/// Path to a contact was updated.
pub const PUSH_CODE_PATH_UPDATED: u8 = 0x81;
/// Message send confirmed (ACK received).
pub const PUSH_CODE_SEND_CONFIRMED: u8 = 0x82;
/// Message waiting in queue.
pub const PUSH_CODE_MSG_WAITING: u8 = 0x83;
/// Server login accepted.
pub const PUSH_CODE_LOGIN_SUCCESS: u8 = 0x85;
/// Server login rejected.
pub const PUSH_CODE_LOGIN_FAIL: u8 = 0x86;
/// Status response from server.
pub const PUSH_CODE_STATUS_RESPONSE: u8 = 0x87;
/// Firmware log line (for debugging).
pub const PUSH_CODE_LOG_DATA: u8 = 0x88;
/// New advertisement (when auto-add disabled).
pub const PUSH_CODE_NEW_ADVERT: u8 = 0x8A;

// ============================================================================
// Error Codes
// ============================================================================

/// Unsupported command.
pub const ERR_CODE_UNSUPPORTED_CMD: u8 = 1;
/// Contact/item not found.
pub const ERR_CODE_NOT_FOUND: u8 = 2;
/// Table (contacts, packets, etc.) is full.
pub const ERR_CODE_TABLE_FULL: u8 = 3;
/// Bad state for this operation.
pub const ERR_CODE_BAD_STATE: u8 = 4;
/// File I/O error.
pub const ERR_CODE_FILE_IO_ERROR: u8 = 5;
/// Illegal argument.
pub const ERR_CODE_ILLEGAL_ARG: u8 = 6;

// ============================================================================
// Text Types
// ============================================================================

/// Plain text message.
pub const TXT_TYPE_PLAIN: u8 = 0;
/// CLI/command data.
pub const TXT_TYPE_CLI_DATA: u8 = 1;
/// Signed plain text message.
pub const TXT_TYPE_SIGNED_PLAIN: u8 = 2;

// ============================================================================
// Advertisement Types
// ============================================================================

/// Chat node advertisement type.
pub const ADV_TYPE_CHAT: u8 = 1;
/// Repeater node advertisement type.
pub const ADV_TYPE_REPEATER: u8 = 2;
/// Room server advertisement type.
pub const ADV_TYPE_ROOM_SERVER: u8 = 3;

// ============================================================================
// Sizes
// ============================================================================

/// Size of a public key in bytes.
pub const PUB_KEY_SIZE: usize = 32;
/// Size of the public key prefix used to address messages.
pub const PUB_KEY_PREFIX_SIZE: usize = 6;
/// Maximum routing path size in bytes.
pub const MAX_PATH_SIZE: usize = 64;
/// Path length value meaning "flood" (no known direct path).
pub const PATH_LEN_FLOOD: u8 = 0xFF;
