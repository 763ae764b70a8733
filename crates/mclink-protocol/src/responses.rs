//! Responses and push notifications from the companion device.

use crate::constants::*;
use crate::error::*;
use crate::types::*;

/// Responses received from the companion device.
#[derive(Debug, Clone)]
pub enum Response {
    /// Generic OK response.
    Ok,

    /// Error response from the device.
    Error(FirmwareErrorCode),

    /// Start of contacts list.
    ContactsStart {
        /// Total number of contacts that will follow.
        total_count: u32,
    },

    /// A single contact.
    Contact(ContactInfo),

    /// End of contacts list.
    EndOfContacts {
        /// Most recent lastmod timestamp.
        most_recent_lastmod: u32,
    },

    /// Self info (response to AppStart).
    SelfInfo(SelfInfo),

    /// Message accepted for transmission.
    Sent {
        /// Whether message was sent as flood.
        is_flood: bool,
        /// Expected ACK hash.
        expected_ack: u32,
        /// Estimated timeout in milliseconds.
        est_timeout_ms: u32,
    },

    /// Current time.
    CurrentTime {
        /// Unix timestamp in seconds.
        time_secs: u32,
    },

    /// No more messages in the offline queue.
    NoMoreMessages,

    /// Battery and storage info.
    Battery(BatteryStatus),

    /// Device info.
    DeviceInfo(DeviceInfo),

    /// Contact message from the offline queue (legacy v2).
    DirectMessageV2(DirectMessage),

    /// Contact message from the offline queue (v3+).
    DirectMessageV3(DirectMessage),

    /// Channel message from the offline queue (legacy v2).
    ChannelMessageV2(ChannelMessage),

    /// Channel message from the offline queue (v3+).
    ChannelMessageV3(ChannelMessage),
}

/// Push notifications from the device (unsolicited).
#[derive(Debug, Clone)]
pub enum Push {
    /// Advertisement received from a known contact.
    Advert {
        /// Advertiser's public key.
        public_key: PublicKey,
    },

    /// New advertisement (when auto-add is disabled).
    NewAdvert(ContactInfo),

    /// Path to a contact was updated.
    PathUpdated {
        /// Contact's public key.
        public_key: PublicKey,
    },

    /// Message delivery confirmed (ACK received).
    SendConfirmed {
        /// ACK hash that was confirmed.
        ack_hash: u32,
        /// Round-trip time in milliseconds.
        trip_time_ms: u32,
    },

    /// Message waiting in the offline queue.
    MessageWaiting,

    /// Login to a repeater or room server accepted.
    LoginSuccess {
        /// Whether the session has admin rights.
        is_admin: bool,
        /// Server's public key prefix.
        server_prefix: PublicKeyPrefix,
        /// Server clock at login (v7+ firmware).
        server_timestamp: Option<u32>,
        /// ACL permission bits (v7+ firmware).
        acl_permissions: Option<u8>,
        /// Firmware version level (v7+ firmware).
        firmware_ver_level: Option<u8>,
    },

    /// Login to a repeater or room server rejected.
    LoginFail {
        /// Server's public key prefix.
        server_prefix: PublicKeyPrefix,
    },

    /// Status response from a repeater or room server.
    StatusResponse {
        /// Server's public key prefix.
        server_prefix: PublicKeyPrefix,
        /// Status data.
        data: Vec<u8>,
    },

    /// Debug log data from the device.
    LogData {
        /// Raw log bytes.
        data: Vec<u8>,
    },
}

/// Either a response or a push notification.
#[derive(Debug, Clone)]
pub enum Message {
    /// A response to a command.
    Response(Response),
    /// An unsolicited push notification.
    Push(Push),
}

impl Message {
    /// Decode a message from a frame payload.
    pub fn decode(frame: &[u8]) -> Result<Self, ProtocolError> {
        if frame.is_empty() {
            return Err(ProtocolError::FrameTooShort {
                expected: 1,
                actual: 0,
            });
        }

        // Push notifications have the high bit set
        if frame[0] & 0x80 != 0 {
            Ok(Message::Push(Push::decode(frame)?))
        } else {
            Ok(Message::Response(Response::decode(frame)?))
        }
    }

    /// Get the code byte this message was tagged with on the wire.
    pub fn code(&self) -> u8 {
        match self {
            Message::Response(r) => r.code(),
            Message::Push(p) => p.code(),
        }
    }
}

impl Response {
    /// Get the response code for this response.
    pub fn code(&self) -> u8 {
        match self {
            Response::Ok => RESP_CODE_OK,
            Response::Error(_) => RESP_CODE_ERR,
            Response::ContactsStart { .. } => RESP_CODE_CONTACTS_START,
            Response::Contact(_) => RESP_CODE_CONTACT,
            Response::EndOfContacts { .. } => RESP_CODE_END_OF_CONTACTS,
            Response::SelfInfo(_) => RESP_CODE_SELF_INFO,
            Response::Sent { .. } => RESP_CODE_SENT,
            Response::CurrentTime { .. } => RESP_CODE_CURR_TIME,
            Response::NoMoreMessages => RESP_CODE_NO_MORE_MESSAGES,
            Response::Battery(_) => RESP_CODE_BATT_AND_STORAGE,
            Response::DeviceInfo(_) => RESP_CODE_DEVICE_INFO,
            Response::DirectMessageV2(_) => RESP_CODE_CONTACT_MSG_RECV,
            Response::DirectMessageV3(_) => RESP_CODE_CONTACT_MSG_RECV_V3,
            Response::ChannelMessageV2(_) => RESP_CODE_CHANNEL_MSG_RECV,
            Response::ChannelMessageV3(_) => RESP_CODE_CHANNEL_MSG_RECV_V3,
        }
    }

    /// Decode a response from a frame payload.
    pub fn decode(frame: &[u8]) -> Result<Self, ProtocolError> {
        if frame.is_empty() {
            return Err(ProtocolError::FrameTooShort {
                expected: 1,
                actual: 0,
            });
        }

        let code = frame[0];

        match code {
            RESP_CODE_OK => Ok(Response::Ok),

            RESP_CODE_ERR => {
                // Some firmwares send a bare ERR byte with no detail.
                let detail = if frame.len() >= 2 { frame[1] } else { 0 };
                Ok(Response::Error(FirmwareErrorCode::from(detail)))
            }

            RESP_CODE_CONTACTS_START => {
                if frame.len() < 5 {
                    return Err(ProtocolError::FrameTooShort {
                        expected: 5,
                        actual: frame.len(),
                    });
                }
                let total_count = u32::from_le_bytes([frame[1], frame[2], frame[3], frame[4]]);
                Ok(Response::ContactsStart { total_count })
            }

            RESP_CODE_CONTACT => {
                let contact = decode_contact(&frame[1..])?;
                Ok(Response::Contact(contact))
            }

            RESP_CODE_END_OF_CONTACTS => {
                if frame.len() < 5 {
                    return Err(ProtocolError::FrameTooShort {
                        expected: 5,
                        actual: frame.len(),
                    });
                }
                let most_recent_lastmod =
                    u32::from_le_bytes([frame[1], frame[2], frame[3], frame[4]]);
                Ok(Response::EndOfContacts {
                    most_recent_lastmod,
                })
            }

            RESP_CODE_SELF_INFO => {
                let info = decode_self_info(&frame[1..])?;
                Ok(Response::SelfInfo(info))
            }

            RESP_CODE_SENT => {
                if frame.len() < 10 {
                    return Err(ProtocolError::FrameTooShort {
                        expected: 10,
                        actual: frame.len(),
                    });
                }
                let is_flood = frame[1] != 0;
                let expected_ack = u32::from_le_bytes([frame[2], frame[3], frame[4], frame[5]]);
                let est_timeout_ms = u32::from_le_bytes([frame[6], frame[7], frame[8], frame[9]]);
                Ok(Response::Sent {
                    is_flood,
                    expected_ack,
                    est_timeout_ms,
                })
            }

            RESP_CODE_CURR_TIME => {
                if frame.len() < 5 {
                    return Err(ProtocolError::FrameTooShort {
                        expected: 5,
                        actual: frame.len(),
                    });
                }
                let time_secs = u32::from_le_bytes([frame[1], frame[2], frame[3], frame[4]]);
                Ok(Response::CurrentTime { time_secs })
            }

            RESP_CODE_NO_MORE_MESSAGES => Ok(Response::NoMoreMessages),

            RESP_CODE_BATT_AND_STORAGE => {
                if frame.len() < 11 {
                    return Err(ProtocolError::FrameTooShort {
                        expected: 11,
                        actual: frame.len(),
                    });
                }
                let battery_millivolts = u16::from_le_bytes([frame[1], frame[2]]);
                let storage_used_kb = u32::from_le_bytes([frame[3], frame[4], frame[5], frame[6]]);
                let storage_total_kb =
                    u32::from_le_bytes([frame[7], frame[8], frame[9], frame[10]]);
                Ok(Response::Battery(BatteryStatus {
                    battery_millivolts,
                    storage_used_kb,
                    storage_total_kb,
                }))
            }

            RESP_CODE_DEVICE_INFO => {
                let info = decode_device_info(&frame[1..])?;
                Ok(Response::DeviceInfo(info))
            }

            RESP_CODE_CONTACT_MSG_RECV => {
                let msg = decode_direct_message_v2(&frame[1..])?;
                Ok(Response::DirectMessageV2(msg))
            }

            RESP_CODE_CONTACT_MSG_RECV_V3 => {
                let msg = decode_direct_message_v3(&frame[1..])?;
                Ok(Response::DirectMessageV3(msg))
            }

            RESP_CODE_CHANNEL_MSG_RECV => {
                let msg = decode_channel_message_v2(&frame[1..])?;
                Ok(Response::ChannelMessageV2(msg))
            }

            RESP_CODE_CHANNEL_MSG_RECV_V3 => {
                let msg = decode_channel_message_v3(&frame[1..])?;
                Ok(Response::ChannelMessageV3(msg))
            }

            _ => Err(ProtocolError::UnknownResponse(code)),
        }
    }
}

impl Push {
    /// Get the push code for this notification.
    pub fn code(&self) -> u8 {
        match self {
            Push::Advert { .. } => PUSH_CODE_ADVERT,
            Push::NewAdvert(_) => PUSH_CODE_NEW_ADVERT,
            Push::PathUpdated { .. } => PUSH_CODE_PATH_UPDATED,
            Push::SendConfirmed { .. } => PUSH_CODE_SEND_CONFIRMED,
            Push::MessageWaiting => PUSH_CODE_MSG_WAITING,
            Push::LoginSuccess { .. } => PUSH_CODE_LOGIN_SUCCESS,
            Push::LoginFail { .. } => PUSH_CODE_LOGIN_FAIL,
            Push::StatusResponse { .. } => PUSH_CODE_STATUS_RESPONSE,
            Push::LogData { .. } => PUSH_CODE_LOG_DATA,
        }
    }

    /// Decode a push notification from a frame payload.
    pub fn decode(frame: &[u8]) -> Result<Self, ProtocolError> {
        if frame.is_empty() {
            return Err(ProtocolError::FrameTooShort {
                expected: 1,
                actual: 0,
            });
        }

        let code = frame[0];

        match code {
            PUSH_CODE_ADVERT => {
                if frame.len() < 1 + PUB_KEY_SIZE {
                    return Err(ProtocolError::FrameTooShort {
                        expected: 1 + PUB_KEY_SIZE,
                        actual: frame.len(),
                    });
                }
                let public_key = PublicKey::from_slice(&frame[1..1 + PUB_KEY_SIZE]).unwrap();
                Ok(Push::Advert { public_key })
            }

            PUSH_CODE_NEW_ADVERT => {
                let contact = decode_contact(&frame[1..])?;
                Ok(Push::NewAdvert(contact))
            }

            PUSH_CODE_PATH_UPDATED => {
                if frame.len() < 1 + PUB_KEY_SIZE {
                    return Err(ProtocolError::FrameTooShort {
                        expected: 1 + PUB_KEY_SIZE,
                        actual: frame.len(),
                    });
                }
                let public_key = PublicKey::from_slice(&frame[1..1 + PUB_KEY_SIZE]).unwrap();
                Ok(Push::PathUpdated { public_key })
            }

            PUSH_CODE_SEND_CONFIRMED => {
                if frame.len() < 9 {
                    return Err(ProtocolError::FrameTooShort {
                        expected: 9,
                        actual: frame.len(),
                    });
                }
                let ack_hash = u32::from_le_bytes([frame[1], frame[2], frame[3], frame[4]]);
                let trip_time_ms = u32::from_le_bytes([frame[5], frame[6], frame[7], frame[8]]);
                Ok(Push::SendConfirmed {
                    ack_hash,
                    trip_time_ms,
                })
            }

            PUSH_CODE_MSG_WAITING => Ok(Push::MessageWaiting),

            PUSH_CODE_LOGIN_SUCCESS => {
                if frame.len() < 8 {
                    return Err(ProtocolError::FrameTooShort {
                        expected: 8,
                        actual: frame.len(),
                    });
                }
                let is_admin = frame[1] != 0;
                let server_prefix =
                    PublicKeyPrefix::from_slice(&frame[2..2 + PUB_KEY_PREFIX_SIZE]).unwrap();

                // Optional fields added in v7 firmware.
                let (server_timestamp, acl_permissions, firmware_ver_level) = if frame.len() >= 14 {
                    let ts = u32::from_le_bytes([frame[8], frame[9], frame[10], frame[11]]);
                    (Some(ts), Some(frame[12]), Some(frame[13]))
                } else {
                    (None, None, None)
                };

                Ok(Push::LoginSuccess {
                    is_admin,
                    server_prefix,
                    server_timestamp,
                    acl_permissions,
                    firmware_ver_level,
                })
            }

            PUSH_CODE_LOGIN_FAIL => {
                if frame.len() < 8 {
                    return Err(ProtocolError::FrameTooShort {
                        expected: 8,
                        actual: frame.len(),
                    });
                }
                // frame[1] = reserved
                let server_prefix =
                    PublicKeyPrefix::from_slice(&frame[2..2 + PUB_KEY_PREFIX_SIZE]).unwrap();
                Ok(Push::LoginFail { server_prefix })
            }

            PUSH_CODE_STATUS_RESPONSE => {
                if frame.len() < 8 {
                    return Err(ProtocolError::FrameTooShort {
                        expected: 8,
                        actual: frame.len(),
                    });
                }
                // frame[1] = reserved
                let server_prefix =
                    PublicKeyPrefix::from_slice(&frame[2..2 + PUB_KEY_PREFIX_SIZE]).unwrap();
                let data = frame[8..].to_vec();
                Ok(Push::StatusResponse {
                    server_prefix,
                    data,
                })
            }

            PUSH_CODE_LOG_DATA => Ok(Push::LogData {
                data: frame[1..].to_vec(),
            }),

            _ => Err(ProtocolError::UnknownResponse(code)),
        }
    }
}

// ============================================================================
// Helper decode functions
// ============================================================================

fn decode_contact(data: &[u8]) -> Result<ContactInfo, ProtocolError> {
    // Minimum size: 32 (pubkey) + 1 (type) + 1 (flags) + 1 (path_len)
    //             + 64 (path) + 32 (name) + 4 (timestamp) = 135
    if data.len() < 135 {
        return Err(ProtocolError::FrameTooShort {
            expected: 135,
            actual: data.len(),
        });
    }

    let mut contact = ContactInfo::default();

    let mut i = 0;

    contact.public_key = PublicKey::from_slice(&data[i..i + PUB_KEY_SIZE]).unwrap();
    i += PUB_KEY_SIZE;

    contact.contact_type = data[i];
    i += 1;
    contact.flags = data[i];
    i += 1;
    contact.out_path_len = data[i] as i8;
    i += 1;

    contact.out_path.copy_from_slice(&data[i..i + MAX_PATH_SIZE]);
    i += MAX_PATH_SIZE;

    // Name (32 bytes, null-terminated)
    let name_bytes = &data[i..i + 32];
    let name_end = name_bytes.iter().position(|&b| b == 0).unwrap_or(32);
    contact.name = String::from_utf8_lossy(&name_bytes[..name_end]).to_string();
    i += 32;

    contact.last_advert_timestamp =
        u32::from_le_bytes([data[i], data[i + 1], data[i + 2], data[i + 3]]);
    i += 4;

    // Optional fields
    if data.len() >= i + 8 {
        contact.gps_lat = i32::from_le_bytes([data[i], data[i + 1], data[i + 2], data[i + 3]]);
        i += 4;
        contact.gps_lon = i32::from_le_bytes([data[i], data[i + 1], data[i + 2], data[i + 3]]);
        i += 4;

        if data.len() >= i + 4 {
            contact.lastmod = u32::from_le_bytes([data[i], data[i + 1], data[i + 2], data[i + 3]]);
        }
    }

    Ok(contact)
}

fn decode_self_info(data: &[u8]) -> Result<SelfInfo, ProtocolError> {
    // Minimum: 1 + 1 + 1 + 32 + 4 + 4 + 4 (feature bytes) + 4 + 4 + 1 + 1 = 57
    if data.len() < 57 {
        return Err(ProtocolError::FrameTooShort {
            expected: 57,
            actual: data.len(),
        });
    }

    let mut info = SelfInfo::default();
    let mut i = 0;

    info.advert_type = data[i];
    i += 1;
    info.tx_power_dbm = data[i];
    i += 1;
    info.max_tx_power_dbm = data[i];
    i += 1;
    info.public_key = PublicKey::from_slice(&data[i..i + PUB_KEY_SIZE]).unwrap();
    i += PUB_KEY_SIZE;
    info.gps_lat = i32::from_le_bytes([data[i], data[i + 1], data[i + 2], data[i + 3]]);
    i += 4;
    info.gps_lon = i32::from_le_bytes([data[i], data[i + 1], data[i + 2], data[i + 3]]);
    i += 4;
    // Feature bytes (multi-ack, location policy, telemetry, manual-add)
    i += 4;
    info.freq_khz = u32::from_le_bytes([data[i], data[i + 1], data[i + 2], data[i + 3]]);
    i += 4;
    info.bandwidth_hz = u32::from_le_bytes([data[i], data[i + 1], data[i + 2], data[i + 3]]);
    i += 4;
    info.spreading_factor = data[i];
    i += 1;
    info.coding_rate = data[i];
    i += 1;

    // Node name is the rest
    let name_bytes = &data[i..];
    let name_end = name_bytes
        .iter()
        .position(|&b| b == 0)
        .unwrap_or(name_bytes.len());
    info.node_name = String::from_utf8_lossy(&name_bytes[..name_end]).to_string();

    Ok(info)
}

fn decode_device_info(data: &[u8]) -> Result<DeviceInfo, ProtocolError> {
    // Minimum: 1 + 1 + 1 + 4 + 12 + 40 + 20 = 79
    if data.len() < 79 {
        return Err(ProtocolError::FrameTooShort {
            expected: 79,
            actual: data.len(),
        });
    }

    let mut info = DeviceInfo::default();
    let mut i = 0;

    info.firmware_version_code = data[i];
    i += 1;
    info.max_contacts_half = data[i];
    i += 1;
    info.max_group_channels = data[i];
    i += 1;
    info.ble_pin = u32::from_le_bytes([data[i], data[i + 1], data[i + 2], data[i + 3]]);
    i += 4;

    // Build date (12 bytes)
    let build_date = &data[i..i + 12];
    let end = build_date.iter().position(|&b| b == 0).unwrap_or(12);
    info.build_date = String::from_utf8_lossy(&build_date[..end]).to_string();
    i += 12;

    // Manufacturer (40 bytes)
    let manufacturer = &data[i..i + 40];
    let end = manufacturer.iter().position(|&b| b == 0).unwrap_or(40);
    info.manufacturer = String::from_utf8_lossy(&manufacturer[..end]).to_string();
    i += 40;

    // Firmware version (20 bytes)
    let firmware_version = &data[i..i + 20];
    let end = firmware_version.iter().position(|&b| b == 0).unwrap_or(20);
    info.firmware_version = String::from_utf8_lossy(&firmware_version[..end]).to_string();

    Ok(info)
}

fn decode_direct_message_v2(data: &[u8]) -> Result<DirectMessage, ProtocolError> {
    // 6 (prefix) + 1 (path_len) + 1 (txt_type) + 4 (timestamp) = 12
    if data.len() < 12 {
        return Err(ProtocolError::FrameTooShort {
            expected: 12,
            actual: data.len(),
        });
    }

    let sender_prefix = PublicKeyPrefix::from_slice(&data[0..6]).unwrap();
    let path_len = data[6];
    let text_type = TextType::from(data[7]);
    let timestamp = u32::from_le_bytes([data[8], data[9], data[10], data[11]]);

    // Signed messages carry a 4-byte signature before the text
    let (signature, text_start) = if text_type == TextType::SignedPlain && data.len() >= 16 {
        (data[12..16].to_vec(), 16)
    } else {
        (Vec::new(), 12)
    };

    let text = String::from_utf8_lossy(&data[text_start..]).to_string();

    Ok(DirectMessage {
        sender_prefix,
        path_len,
        text_type,
        timestamp,
        snr_x4: None,
        signature,
        text,
    })
}

fn decode_direct_message_v3(data: &[u8]) -> Result<DirectMessage, ProtocolError> {
    // 3 (snr + reserved) + 6 (prefix) + 1 (path_len) + 1 (txt_type) + 4 (timestamp) = 15
    if data.len() < 15 {
        return Err(ProtocolError::FrameTooShort {
            expected: 15,
            actual: data.len(),
        });
    }

    let snr_x4 = data[0] as i8;
    // data[1], data[2] = reserved
    let sender_prefix = PublicKeyPrefix::from_slice(&data[3..9]).unwrap();
    let path_len = data[9];
    let text_type = TextType::from(data[10]);
    let timestamp = u32::from_le_bytes([data[11], data[12], data[13], data[14]]);

    let (signature, text_start) = if text_type == TextType::SignedPlain && data.len() >= 19 {
        (data[15..19].to_vec(), 19)
    } else {
        (Vec::new(), 15)
    };

    let text = String::from_utf8_lossy(&data[text_start..]).to_string();

    Ok(DirectMessage {
        sender_prefix,
        path_len,
        text_type,
        timestamp,
        snr_x4: Some(snr_x4),
        signature,
        text,
    })
}

fn decode_channel_message_v2(data: &[u8]) -> Result<ChannelMessage, ProtocolError> {
    // 1 (channel_idx) + 1 (path_len) + 1 (txt_type) + 4 (timestamp) = 7
    if data.len() < 7 {
        return Err(ProtocolError::FrameTooShort {
            expected: 7,
            actual: data.len(),
        });
    }

    let channel_idx = data[0];
    let path_len = data[1];
    let text_type = TextType::from(data[2]);
    let timestamp = u32::from_le_bytes([data[3], data[4], data[5], data[6]]);
    let text = String::from_utf8_lossy(&data[7..]).to_string();

    Ok(ChannelMessage {
        channel_idx,
        path_len,
        text_type,
        timestamp,
        snr_x4: None,
        text,
    })
}

fn decode_channel_message_v3(data: &[u8]) -> Result<ChannelMessage, ProtocolError> {
    // 3 (snr + reserved) + 1 (channel_idx) + 1 (path_len) + 1 (txt_type) + 4 (timestamp) = 10
    if data.len() < 10 {
        return Err(ProtocolError::FrameTooShort {
            expected: 10,
            actual: data.len(),
        });
    }

    let snr_x4 = data[0] as i8;
    // data[1], data[2] = reserved
    let channel_idx = data[3];
    let path_len = data[4];
    let text_type = TextType::from(data[5]);
    let timestamp = u32::from_le_bytes([data[6], data[7], data[8], data[9]]);
    let text = String::from_utf8_lossy(&data[10..]).to_string();

    Ok(ChannelMessage {
        channel_idx,
        path_len,
        text_type,
        timestamp,
        snr_x4: Some(snr_x4),
        text,
    })
}
