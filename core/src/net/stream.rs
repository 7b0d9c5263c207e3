#![deny(unsafe_code)]
//! `embedded-io-async` adapter for connected sockets
//!
//! Lets TLS and MQTT clients written against `embedded-io-async` run on
//! a co-processor socket.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embedded_io_async::{ErrorType, Read, Write};
use ncp_hal::{NcpFs, NcpNet};

use super::socket::SocketHandle;
use super::Net;
use crate::error::{Error, Result};

/// Connected socket implementing `embedded-io-async` traits
///
/// # Example
///
/// ```ignore
/// let sock = net.socket(AddressFamily::Inet, SocketType::Stream, IpProtocol::Tcp)?;
/// net.connect(sock, broker).await?;
/// let mut stream = NetStream::new(&net, sock);
/// stream.write_all(b"hello").await?;
/// ```
pub struct NetStream<'a, 'd, N, M: RawMutex> {
    net: &'a Net<'d, N, M>,
    sock: SocketHandle,
}

impl<'a, 'd, N, M> NetStream<'a, 'd, N, M>
where
    N: NcpNet + NcpFs,
    M: RawMutex,
{
    /// Wrap a socket, usually one that is already connected
    pub fn new(net: &'a Net<'d, N, M>, sock: SocketHandle) -> Self {
        Self { net, sock }
    }

    pub fn handle(&self) -> SocketHandle {
        self.sock
    }

    /// Close the underlying socket
    ///
    /// # Errors
    ///
    /// Same as [`Net::close`].
    pub async fn close(self) -> Result<()> {
        self.net.close(self.sock).await
    }
}

impl<N, M: RawMutex> ErrorType for NetStream<'_, '_, N, M> {
    type Error = Error;
}

/// Blocks until data arrives, returns 0 once the peer closed and every
/// buffered byte was read.
impl<N, M> Read for NetStream<'_, '_, N, M>
where
    N: NcpNet + NcpFs,
    M: RawMutex,
{
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            match self.net.recv(self.sock, buf).await {
                Ok(0) => continue,
                Err(Error::Failed) if self.net.peer_closed(self.sock) => return Ok(0),
                other => return other,
            }
        }
    }
}

impl<N, M> Write for NetStream<'_, '_, N, M>
where
    N: NcpNet + NcpFs,
    M: RawMutex,
{
    async fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.net.send(self.sock, buf).await
    }

    async fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}
