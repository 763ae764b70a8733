//! Transport seam.
//!
//! A transport is any duplex byte channel that can be split into a read
//! half and a write half; it moves bytes and never interprets frame
//! content. TCP is provided here. Serial and BLE links satisfy the same
//! contract and plug in the same way.

use std::io;

use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};
use tracing::debug;

/// A duplex byte channel to a companion device.
pub trait Transport {
    /// The receive half.
    type Reader: AsyncRead + Send + Unpin + 'static;
    /// The send half.
    type Writer: AsyncWrite + Send + Unpin + 'static;

    /// Split into independently-owned halves.
    fn split(self) -> (Self::Reader, Self::Writer);
}

/// TCP transport, for devices exposing their serial console over a
/// network socket.
pub struct TcpTransport {
    stream: TcpStream,
}

impl TcpTransport {
    /// Connect to a device at `addr`.
    pub async fn connect(addr: impl ToSocketAddrs) -> io::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        if let Ok(peer) = stream.peer_addr() {
            debug!(%peer, "connected");
        }
        Ok(TcpTransport { stream })
    }
}

impl Transport for TcpTransport {
    type Reader = OwnedReadHalf;
    type Writer = OwnedWriteHalf;

    fn split(self) -> (Self::Reader, Self::Writer) {
        self.stream.into_split()
    }
}

/// In-process transport over [`tokio::io::DuplexStream`], used in tests.
impl Transport for tokio::io::DuplexStream {
    type Reader = ReadHalf<tokio::io::DuplexStream>;
    type Writer = WriteHalf<tokio::io::DuplexStream>;

    fn split(self) -> (Self::Reader, Self::Writer) {
        tokio::io::split(self)
    }
}
