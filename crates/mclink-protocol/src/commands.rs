//! Commands that can be sent to the companion device.

use crate::constants::*;
use crate::types::*;

/// Commands understood by the companion device.
///
/// [`Command::encode`] produces the frame payload; framing is applied by
/// [`crate::FrameCodec::encode`]. [`Command::response_keys`] names the
/// response codes the device can answer this command with, which the host
/// uses to correlate responses to in-flight commands.
#[derive(Debug, Clone)]
pub enum Command {
    /// Start the app connection and get self info.
    AppStart {
        /// Protocol version the app understands.
        app_version: u8,
        /// App name string.
        app_name: String,
    },

    /// Query device information.
    DeviceQuery {
        /// Protocol version the app understands.
        app_version: u8,
    },

    /// Send a text message to a contact.
    SendDirectMessage {
        /// Message type (plain, CLI data, etc.).
        text_type: TextType,
        /// Retry attempt number.
        attempt: u8,
        /// Message timestamp.
        timestamp: u32,
        /// Recipient's public key prefix.
        recipient_prefix: PublicKeyPrefix,
        /// Message text.
        text: String,
    },

    /// Send a text message to a channel.
    SendChannelMessage {
        /// Message type (should be Plain).
        text_type: TextType,
        /// Channel index.
        channel_idx: u8,
        /// Message timestamp.
        timestamp: u32,
        /// Message text.
        text: String,
    },

    /// Get the list of contacts.
    GetContacts {
        /// Optional 'since' filter (only return contacts modified after this time).
        since: Option<u32>,
    },

    /// Get the current device time.
    GetDeviceTime,

    /// Set the device time.
    SetDeviceTime {
        /// Unix timestamp in seconds.
        time_secs: u32,
    },

    /// Send a self-advertisement.
    SendSelfAdvert {
        /// Whether to flood (true) or zero-hop (false).
        flood: bool,
    },

    /// Set the advertisement name.
    SetAdvertName {
        /// New name.
        name: String,
    },

    /// Set advertisement latitude/longitude.
    SetAdvertLatLon {
        /// Latitude in microdegrees.
        lat: i32,
        /// Longitude in microdegrees.
        lon: i32,
    },

    /// Set radio TX power.
    SetRadioTxPower {
        /// TX power in dBm.
        power_dbm: u8,
    },

    /// Get battery and storage info.
    GetBattery,

    /// Sync the next message from the offline queue.
    SyncNextMessage,

    /// Log in to a repeater or room server. The routed login result
    /// arrives later as a push.
    SendLogin {
        /// Server's public key.
        public_key: PublicKey,
        /// Server password.
        password: String,
    },

    /// Request status from a repeater or room server. The status arrives
    /// later as a push.
    SendStatusRequest {
        /// Server's public key.
        public_key: PublicKey,
    },

    /// Log out of a repeater or room server.
    Logout {
        /// Server's public key.
        public_key: PublicKey,
    },

    /// Reboot the device. The device does not answer this command.
    Reboot,
}

impl Command {
    /// Get the command code for this command.
    pub fn code(&self) -> u8 {
        match self {
            Command::AppStart { .. } => CMD_APP_START,
            Command::DeviceQuery { .. } => CMD_DEVICE_QUERY,
            Command::SendDirectMessage { .. } => CMD_SEND_TXT_MSG,
            Command::SendChannelMessage { .. } => CMD_SEND_CHANNEL_TXT_MSG,
            Command::GetContacts { .. } => CMD_GET_CONTACTS,
            Command::GetDeviceTime => CMD_GET_DEVICE_TIME,
            Command::SetDeviceTime { .. } => CMD_SET_DEVICE_TIME,
            Command::SendSelfAdvert { .. } => CMD_SEND_SELF_ADVERT,
            Command::SetAdvertName { .. } => CMD_SET_ADVERT_NAME,
            Command::SetAdvertLatLon { .. } => CMD_SET_ADVERT_LATLON,
            Command::SetRadioTxPower { .. } => CMD_SET_RADIO_TX_POWER,
            Command::GetBattery => CMD_GET_BATT_AND_STORAGE,
            Command::SyncNextMessage => CMD_SYNC_NEXT_MESSAGE,
            Command::SendLogin { .. } => CMD_SEND_LOGIN,
            Command::SendStatusRequest { .. } => CMD_SEND_STATUS_REQ,
            Command::Logout { .. } => CMD_LOGOUT,
            Command::Reboot => CMD_REBOOT,
        }
    }

    /// Response codes the device uses to answer this command.
    ///
    /// These are the correlation keys for the pending-command table: the
    /// reply to a command is tagged with one of these codes, and no two
    /// commands sharing a code may be in flight at once. An empty slice
    /// means the command is fire-and-forget.
    pub fn response_keys(&self) -> &'static [u8] {
        match self {
            Command::AppStart { .. } => &[RESP_CODE_SELF_INFO],
            Command::DeviceQuery { .. } => &[RESP_CODE_DEVICE_INFO],
            Command::SendDirectMessage { .. } => &[RESP_CODE_SENT],
            Command::SendChannelMessage { .. } => &[RESP_CODE_SENT],
            Command::GetContacts { .. } => &[RESP_CODE_END_OF_CONTACTS],
            Command::GetDeviceTime => &[RESP_CODE_CURR_TIME],
            Command::SetDeviceTime { .. } => &[RESP_CODE_OK],
            Command::SendSelfAdvert { .. } => &[RESP_CODE_OK],
            Command::SetAdvertName { .. } => &[RESP_CODE_OK],
            Command::SetAdvertLatLon { .. } => &[RESP_CODE_OK],
            Command::SetRadioTxPower { .. } => &[RESP_CODE_OK],
            Command::GetBattery => &[RESP_CODE_BATT_AND_STORAGE],
            Command::SyncNextMessage => &[
                RESP_CODE_CONTACT_MSG_RECV,
                RESP_CODE_CHANNEL_MSG_RECV,
                RESP_CODE_CONTACT_MSG_RECV_V3,
                RESP_CODE_CHANNEL_MSG_RECV_V3,
                RESP_CODE_NO_MORE_MESSAGES,
            ],
            // These commands are routed over the mesh; the device
            // acknowledges the send, and the server's answer comes back
            // as a push.
            Command::SendLogin { .. } => &[RESP_CODE_SENT],
            Command::SendStatusRequest { .. } => &[RESP_CODE_SENT],
            Command::Logout { .. } => &[RESP_CODE_SENT],
            Command::Reboot => &[],
        }
    }

    /// Encode the command to a frame payload.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(64);

        match self {
            Command::AppStart {
                app_version,
                app_name,
            } => {
                buf.push(CMD_APP_START);
                buf.push(*app_version);
                // 6 reserved bytes before the name, space-padded.
                buf.extend_from_slice(b"      ");
                buf.extend_from_slice(app_name.as_bytes());
            }

            Command::DeviceQuery { app_version } => {
                buf.push(CMD_DEVICE_QUERY);
                buf.push(*app_version);
            }

            Command::SendDirectMessage {
                text_type,
                attempt,
                timestamp,
                recipient_prefix,
                text,
            } => {
                buf.push(CMD_SEND_TXT_MSG);
                buf.push((*text_type).into());
                buf.push(*attempt);
                buf.extend_from_slice(&timestamp.to_le_bytes());
                buf.extend_from_slice(recipient_prefix.as_bytes());
                buf.extend_from_slice(text.as_bytes());
            }

            Command::SendChannelMessage {
                text_type,
                channel_idx,
                timestamp,
                text,
            } => {
                buf.push(CMD_SEND_CHANNEL_TXT_MSG);
                buf.push((*text_type).into());
                buf.push(*channel_idx);
                buf.extend_from_slice(&timestamp.to_le_bytes());
                buf.extend_from_slice(text.as_bytes());
            }

            Command::GetContacts { since } => {
                buf.push(CMD_GET_CONTACTS);
                if let Some(since) = since {
                    buf.extend_from_slice(&since.to_le_bytes());
                }
            }

            Command::GetDeviceTime => {
                buf.push(CMD_GET_DEVICE_TIME);
            }

            Command::SetDeviceTime { time_secs } => {
                buf.push(CMD_SET_DEVICE_TIME);
                buf.extend_from_slice(&time_secs.to_le_bytes());
            }

            Command::SendSelfAdvert { flood } => {
                buf.push(CMD_SEND_SELF_ADVERT);
                if *flood {
                    buf.push(1);
                }
            }

            Command::SetAdvertName { name } => {
                buf.push(CMD_SET_ADVERT_NAME);
                buf.extend_from_slice(name.as_bytes());
            }

            Command::SetAdvertLatLon { lat, lon } => {
                buf.push(CMD_SET_ADVERT_LATLON);
                buf.extend_from_slice(&lat.to_le_bytes());
                buf.extend_from_slice(&lon.to_le_bytes());
                // Altitude field, unused.
                buf.extend_from_slice(&0u32.to_le_bytes());
            }

            Command::SetRadioTxPower { power_dbm } => {
                buf.push(CMD_SET_RADIO_TX_POWER);
                buf.push(*power_dbm);
            }

            Command::GetBattery => {
                buf.push(CMD_GET_BATT_AND_STORAGE);
            }

            Command::SyncNextMessage => {
                buf.push(CMD_SYNC_NEXT_MESSAGE);
            }

            Command::SendLogin {
                public_key,
                password,
            } => {
                buf.push(CMD_SEND_LOGIN);
                buf.extend_from_slice(public_key.as_bytes());
                buf.extend_from_slice(password.as_bytes());
            }

            Command::SendStatusRequest { public_key } => {
                buf.push(CMD_SEND_STATUS_REQ);
                buf.extend_from_slice(public_key.as_bytes());
            }

            Command::Logout { public_key } => {
                buf.push(CMD_LOGOUT);
                buf.extend_from_slice(public_key.as_bytes());
            }

            Command::Reboot => {
                buf.push(CMD_REBOOT);
                buf.extend_from_slice(b"reboot");
            }
        }

        buf
    }
}
