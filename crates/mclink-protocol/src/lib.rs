//! Companion radio serial protocol.
//!
//! This crate implements the wire protocol spoken by MeshCore-style
//! companion radios over any byte-oriented link (serial, TCP, BLE
//! characteristic). Traffic is framed; every frame payload starts with a
//! single code byte identifying it:
//!
//! - **Commands** (host → device): `CMD_*` byte followed by the command body
//! - **Responses** (device → host): `RESP_CODE_*` byte, answering a command
//! - **Push notifications** (device → host): `PUSH_CODE_*` byte (0x80+),
//!   unsolicited
//!
//! # Framing
//!
//! ```text
//! host → device:  '<' len_lo len_hi payload[0..len]
//! device → host:  '>' len_lo len_hi payload[0..len]
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use mclink_protocol::{Command, FrameCodec, Message};
//!
//! let cmd = Command::GetBattery;
//! let wire = FrameCodec::encode(&cmd.encode());
//!
//! let mut codec = FrameCodec::new();
//! codec.push(&received);
//! while let Some(decoded) = codec.decode() {
//!     let msg = Message::decode(&decoded?)?;
//! }
//! ```

mod codec;
mod commands;
mod constants;
mod error;
mod responses;
mod types;

pub use codec::*;
pub use commands::*;
pub use constants::*;
pub use error::*;
pub use responses::*;
pub use types::*;
