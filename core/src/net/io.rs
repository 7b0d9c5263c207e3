#![deny(unsafe_code)]
//! Socket data transfer

use core::net::SocketAddrV4;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_time::{with_deadline, Duration, Instant};
use heapless::Vec;
use ncp_hal::net::ConnectionKind;
use ncp_hal::{NcpFs, NcpNet};

use super::socket::{SocketHandle, SocketStatus};
use super::Net;
use crate::config::MAX_CONNECTIONS;
use crate::error::{log_failure, Error, Result};

/// Where a datagram leaves from
enum Route {
    /// Connection slot owned by the socket
    Owned(u8),
    /// Connection of a peer of a listening socket
    Server,
}

impl<N, M> Net<'_, N, M>
where
    N: NcpNet + NcpFs,
    M: RawMutex,
{
    /// Send on a connected socket
    ///
    /// Returns the number of bytes accepted by the co-processor.
    ///
    /// # Errors
    ///
    /// Returns `Error::Failed` if the socket or its connection is not
    /// connected, otherwise the translated request failure.
    pub async fn send(&self, sock: SocketHandle, data: &[u8]) -> Result<usize> {
        let (id, timeout_ms) = self.with(|tables| {
            let socket = tables.socket(sock)?;
            let id = socket
                .connection
                .filter(|_| socket.status == SocketStatus::Connected)
                .ok_or(Error::Failed)?;
            if !tables.connection(id).is_some_and(|conn| conn.connected) {
                return Err(Error::Failed);
            }
            Ok((id, socket.options.send_timeout_ms))
        })
        .inspect_err(|_| error!("Socket {} is not connected", sock.raw()))?;

        self.call(
            self.ncp
                .send_data(id, data, timeout_ms.saturating_add(self.config.send_margin_ms))
                .await,
            "send_data",
        )
        .inspect_err(|err| log_failure(*err, "send_data"))
    }

    /// Receive from a connected socket
    ///
    /// Data buffered before the peer disconnected can still be read.
    /// Returns 0 when nothing arrived within the receive timeout.
    ///
    /// # Errors
    ///
    /// Returns `Error::Failed` if the socket is not connected or its
    /// connection is closed with nothing left to read.
    pub async fn recv(&self, sock: SocketHandle, buf: &mut [u8]) -> Result<usize> {
        let (id, recv_timeout_ms, recv_buf_size) = self
            .with(|tables| {
                let socket = tables.socket(sock)?;
                let id = socket
                    .connection
                    .filter(|_| socket.status == SocketStatus::Connected)
                    .ok_or(Error::Failed)?;
                let conn = tables.connection(id).ok_or(Error::Failed)?;
                if !conn.connected && conn.available == 0 {
                    return Err(Error::Failed);
                }
                Ok((id, socket.options.recv_timeout_ms, socket.options.recv_buf_size))
            })
            .inspect_err(|_| debug!("Socket {} has nothing to receive", sock.raw()))?;

        let received = self
            .wait_pull_data(id, buf, recv_timeout_ms, recv_buf_size)
            .await?;
        if received == 0 && !self.is_connected(id) {
            return Err(Error::Failed);
        }
        Ok(received)
    }

    /// Send a datagram on a UDP socket
    ///
    /// An `Allocated` socket claims a connection slot on first use. A
    /// listening socket answers the peer whose connection matches `dest`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Failed` for non-UDP sockets, when no slot is free,
    /// or when no peer of a listening socket matches `dest`.
    pub async fn sendto(&self, sock: SocketHandle, data: &[u8], dest: SocketAddrV4) -> Result<usize> {
        let (route, timeout_ms) = self.with(|tables| {
            let socket = tables.socket(sock)?;
            if socket.kind != ConnectionKind::Udp {
                error!("Socket {} is not UDP", sock.raw());
                return Err(Error::Failed);
            }
            let timeout_ms = socket
                .options
                .send_timeout_ms
                .saturating_add(self.config.send_margin_ms);
            let route = match (socket.status, socket.connection) {
                (SocketStatus::Allocated, _) => {
                    let id = tables.claim_free_connection(sock).ok_or_else(|| {
                        error!("No free connection for socket {}", sock.raw());
                        Error::Failed
                    })?;
                    if let Some(conn) = tables.connection_mut(id) {
                        conn.connected = true;
                        conn.remote = dest;
                    }
                    let socket = tables.socket_mut(sock)?;
                    socket.connection = Some(id);
                    socket.client = true;
                    socket.status = SocketStatus::Connected;
                    Route::Owned(id)
                }
                (SocketStatus::Connected, Some(id)) => Route::Owned(id),
                (SocketStatus::Listening, _) => Route::Server,
                _ => return Err(Error::Failed),
            };
            Ok((route, timeout_ms))
        })?;

        let result = match route {
            Route::Owned(id) => {
                self.call(
                    self.ncp.send_data_to(id, dest, data, timeout_ms).await,
                    "send_data_to",
                )
            }
            Route::Server => {
                let id = self.find_connection(dest).await.ok_or_else(|| {
                    error!("No connection to port {}", dest.port());
                    Error::Failed
                })?;
                self.call(self.ncp.send_data(id, data, timeout_ms).await, "send_data")
            }
        };
        result.inspect_err(|err| log_failure(*err, "sendto"))
    }

    /// Unclaimed live connection whose peer is `dest`
    ///
    /// Asks the co-processor for the peer of every candidate slot.
    async fn find_connection(&self, dest: SocketAddrV4) -> Option<u8> {
        let candidates: Vec<u8, MAX_CONNECTIONS> = self.with(|tables| {
            (0..MAX_CONNECTIONS as u8)
                .filter(|&id| tables.connection(id).is_some_and(|conn| conn.is_pending()))
                .collect()
        });
        for id in candidates {
            if let Ok(info) = self.call(self.ncp.socket_info(id).await, "socket_info") {
                if info.remote == dest {
                    return Some(id);
                }
            }
        }
        None
    }

    /// Receive a datagram on a UDP socket
    ///
    /// A `Bound` socket starts listening first. A listening socket waits,
    /// up to its receive timeout, for any unclaimed connection with
    /// buffered data. Returns the byte count and the sender, `(0, None)`
    /// on timeout.
    ///
    /// # Errors
    ///
    /// Returns `Error::Failed` for non-UDP or `Allocated` sockets, or when
    /// the socket is closed while waiting.
    pub async fn recvfrom(
        &self,
        sock: SocketHandle,
        buf: &mut [u8],
    ) -> Result<(usize, Option<SocketAddrV4>)> {
        let status = self.with(|tables| {
            let socket = tables.socket(sock)?;
            if socket.kind != ConnectionKind::Udp {
                error!("Socket {} is not UDP", sock.raw());
                return Err(Error::Failed);
            }
            Ok(socket.status)
        })?;

        match status {
            SocketStatus::Allocated => Err(Error::Failed),
            SocketStatus::Connected => {
                let received = self.recv(sock, buf).await?;
                let remote = self.with(|tables| {
                    let socket = tables.socket(sock).ok()?;
                    let conn = tables.connection(socket.connection?)?;
                    Some(conn.remote)
                });
                Ok((received, remote))
            }
            SocketStatus::Bound => {
                self.listen(sock, 0).await?;
                self.recv_unclaimed(sock, buf).await
            }
            SocketStatus::Listening => self.recv_unclaimed(sock, buf).await,
            _ => {
                debug!("Socket {} has nothing to receive", sock.raw());
                Ok((0, None))
            }
        }
    }

    async fn recv_unclaimed(
        &self,
        sock: SocketHandle,
        buf: &mut [u8],
    ) -> Result<(usize, Option<SocketAddrV4>)> {
        let (recv_timeout_ms, recv_buf_size) = self.with(|tables| {
            let options = &tables.socket(sock)?.options;
            Ok::<_, Error>((options.recv_timeout_ms, options.recv_buf_size))
        })?;
        let deadline = Instant::now() + Duration::from_millis(recv_timeout_ms.into());

        let (id, remote) = loop {
            let found = self.with(|tables| {
                if tables.socket(sock)?.status != SocketStatus::Listening {
                    return Err(Error::Failed);
                }
                Ok(tables
                    .connections
                    .iter()
                    .position(|conn| conn.is_pending() && conn.available > 0)
                    .map(|index| (index as u8, tables.connections[index].remote)))
            })?;
            if let Some(found) = found {
                break found;
            }
            if Instant::now() >= deadline {
                debug!("No datagram within {} ms", recv_timeout_ms);
                return Ok((0, None));
            }
            let _ = with_deadline(deadline, self.data_arrived.wait()).await;
        };

        let received = self
            .wait_pull_data(id, buf, recv_timeout_ms, recv_buf_size)
            .await?;
        Ok((received, Some(remote)))
    }

    /// Connection of `sock` is down and fully drained
    pub(crate) fn peer_closed(&self, sock: SocketHandle) -> bool {
        self.with(|tables| {
            let Some(id) = tables.socket(sock).ok().and_then(|socket| socket.connection) else {
                return true;
            };
            tables
                .connection(id)
                .map_or(true, |conn| !conn.connected && conn.available == 0)
        })
    }
}
