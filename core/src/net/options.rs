#![deny(unsafe_code)]
//! Socket options
//!
//! Options are stored on the socket and pushed to the co-processor when
//! the socket connects or listens. Afterwards only the two timeouts can
//! still change.

use embassy_sync::blocking_mutex::raw::RawMutex;
use ncp_hal::net::ConnectionKind;
use ncp_hal::{NcpFs, NcpNet};

use super::socket::{SocketHandle, SocketStatus, KEEPALIVE_MAX_SECS};
use super::Net;
use crate::credentials::SecTag;
use crate::error::{Error, Result};

/// Option value for [`Net::setsockopt`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SocketOption<'a> {
    /// SO_LINGER seconds, -1 disables lingering
    Linger(i32),
    /// TCP_NODELAY
    NoDelay(bool),
    /// SO_SNDTIMEO in milliseconds
    SendTimeout(u32),
    /// SO_RCVTIMEO in milliseconds
    RecvTimeout(u32),
    /// SO_RCVBUF in bytes
    RecvBufferSize(u32),
    /// SO_KEEPALIVE in seconds, 0 disables it
    KeepAlive(u32),
    /// Attach the credentials registered under these tags
    TlsSecTagList(&'a [SecTag]),
    /// SNI host name
    TlsHostname(&'a str),
    /// Comma separated ALPN protocol names
    TlsAlpnList(&'a str),
}

/// Option selector for [`Net::getsockopt`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OptionName {
    Linger,
    NoDelay,
    SendTimeout,
    RecvTimeout,
    RecvBufferSize,
    KeepAlive,
}

impl SocketOption<'_> {
    fn is_timeout(&self) -> bool {
        matches!(self, Self::SendTimeout(_) | Self::RecvTimeout(_))
    }

    fn is_tls(&self) -> bool {
        matches!(
            self,
            Self::TlsSecTagList(_) | Self::TlsHostname(_) | Self::TlsAlpnList(_)
        )
    }
}

impl<N, M> Net<'_, N, M>
where
    N: NcpNet + NcpFs,
    M: RawMutex,
{
    /// Set a socket option
    ///
    /// # Errors
    ///
    /// Returns `Error::Failed` if the value is out of range, a TLS option
    /// targets a non-TLS socket, a tag is not registered, or the socket
    /// already left `Allocated` and the option is not a timeout.
    pub fn setsockopt(&self, sock: SocketHandle, option: SocketOption<'_>) -> Result<()> {
        self.with(|tables| {
            let socket = tables.socket(sock)?;
            let (status, kind) = (socket.status, socket.kind);
            if status == SocketStatus::Reset {
                return Err(Error::Failed);
            }
            if status != SocketStatus::Allocated && !option.is_timeout() {
                error!(
                    "Socket {}: {:?} cannot change in {:?}",
                    sock.raw(),
                    option,
                    status
                );
                return Err(Error::Failed);
            }
            if option.is_tls() && kind != ConnectionKind::Ssl {
                error!("Socket {} is not a TLS socket", sock.raw());
                return Err(Error::Failed);
            }

            if let SocketOption::TlsSecTagList(tags) = option {
                let mut tls = tables.socket(sock)?.tls.clone();
                for &tag in tags {
                    let (kind, value) = tables.credentials.get(tag).ok_or_else(|| {
                        error!("Credential tag {} not registered", tag);
                        Error::Failed
                    })?;
                    tls.attach(kind, value);
                }
                tables.socket_mut(sock)?.tls = tls;
                return Ok(());
            }

            let socket = tables.socket_mut(sock)?;
            let options = &mut socket.options;
            match option {
                SocketOption::Linger(secs) if secs >= -1 => options.linger = secs,
                SocketOption::NoDelay(enable) => options.no_delay = enable,
                SocketOption::SendTimeout(ms) => options.send_timeout_ms = ms,
                SocketOption::RecvTimeout(ms) => options.recv_timeout_ms = ms,
                SocketOption::RecvBufferSize(size) => options.recv_buf_size = size,
                SocketOption::KeepAlive(secs) if secs <= KEEPALIVE_MAX_SECS => {
                    options.keepalive = secs
                }
                SocketOption::TlsHostname(name) => socket.tls.set_server_name(name),
                SocketOption::TlsAlpnList(list) => socket.tls.set_alpn(list),
                _ => {
                    error!("Socket {}: invalid {:?}", sock.raw(), option);
                    return Err(Error::Failed);
                }
            }
            Ok(())
        })
    }

    /// Read a socket option
    ///
    /// Boolean options read as 0 or 1.
    ///
    /// # Errors
    ///
    /// Returns `Error::Failed` for an out-of-range or `Reset` socket.
    pub fn getsockopt(&self, sock: SocketHandle, name: OptionName) -> Result<i64> {
        self.with(|tables| {
            let socket = tables.socket(sock)?;
            if socket.status == SocketStatus::Reset {
                return Err(Error::Failed);
            }
            let options = &socket.options;
            Ok(match name {
                OptionName::Linger => options.linger.into(),
                OptionName::NoDelay => options.no_delay.into(),
                OptionName::SendTimeout => options.send_timeout_ms.into(),
                OptionName::RecvTimeout => options.recv_timeout_ms.into(),
                OptionName::RecvBufferSize => options.recv_buf_size.into(),
                OptionName::KeepAlive => options.keepalive.into(),
            })
        })
    }
}
