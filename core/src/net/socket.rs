#![deny(unsafe_code)]
//! Socket table entries
//!
//! A socket is an application-visible descriptor. While connected it owns
//! one connection slot of the co-processor; otherwise it owns nothing but
//! its options and TLS parameters.

use heapless::{String, Vec};
use ncp_hal::net::ConnectionKind;

use crate::config::NetConfig;
use crate::credentials::{Credential, CredentialKind};

/// Maximum number of ALPN protocol names per socket
pub const ALPN_MAX_ENTRIES: usize = 3;

/// Longest ALPN protocol name, longer names are truncated
pub const ALPN_MAX_LEN: usize = 16;

/// Longest SNI host name, longer names are truncated
pub const SNI_MAX_LEN: usize = 16;

/// Longest accepted TCP keepalive in seconds
pub const KEEPALIVE_MAX_SECS: u32 = 7200;

/// Socket descriptor returned by [`crate::Net::socket`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SocketHandle(usize);

impl SocketHandle {
    /// Wrap a raw descriptor index
    pub const fn from_raw(raw: usize) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AddressFamily {
    Inet,
    /// Declared for completeness, every use returns `NotSupported`
    Inet6,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SocketType {
    Stream,
    Datagram,
    Raw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IpProtocol {
    Icmp,
    Tcp,
    Udp,
    /// TLS 1.2 over TCP, terminated on the co-processor
    Tls12,
}

/// Lifecycle state of a socket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SocketStatus {
    #[default]
    Reset,
    Allocated,
    Bound,
    Listening,
    Connected,
    Closing,
}

/// BSD socket options of one socket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SocketOptions {
    pub linger: i32,
    pub no_delay: bool,
    pub send_timeout_ms: u32,
    pub recv_timeout_ms: u32,
    pub recv_buf_size: u32,
    pub keepalive: u32,
}

impl SocketOptions {
    pub(crate) fn new(config: &NetConfig) -> Self {
        Self {
            linger: -1,
            no_delay: false,
            send_timeout_ms: config.send_timeout_ms,
            recv_timeout_ms: config.recv_timeout_ms,
            recv_buf_size: config.recv_buffer_size,
            keepalive: 0,
        }
    }
}

/// TLS material owned by a socket
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct TlsParams {
    pub ca_certificate: Option<Credential>,
    pub certificate: Option<Credential>,
    pub private_key: Option<Credential>,
    pub psk: Option<Credential>,
    pub psk_identity: Option<Credential>,
    pub alpn: Vec<String<ALPN_MAX_LEN>, ALPN_MAX_ENTRIES>,
    pub server_name: String<SNI_MAX_LEN>,
}

impl TlsParams {
    /// Certificate authentication bitmask: 1 verifies the server, 2
    /// authenticates the client
    pub(crate) fn auth_mode(&self) -> u8 {
        let mut mode = 0;
        if self.ca_certificate.is_some() {
            mode += 1;
        }
        if self.certificate.is_some() && self.private_key.is_some() {
            mode += 2;
        }
        mode
    }

    /// Attach a credential by its role
    pub(crate) fn attach(&mut self, kind: CredentialKind, value: Credential) {
        let slot = match kind {
            CredentialKind::CaCertificate => &mut self.ca_certificate,
            CredentialKind::ServerCertificate => &mut self.certificate,
            CredentialKind::PrivateKey => &mut self.private_key,
            CredentialKind::Psk => &mut self.psk,
            CredentialKind::PskIdentity => &mut self.psk_identity,
        };
        *slot = Some(value);
    }

    /// Replace the ALPN list from a comma separated string
    pub(crate) fn set_alpn(&mut self, list: &str) {
        self.alpn.clear();
        for name in list.split(',').map(str::trim).filter(|name| !name.is_empty()) {
            if self.alpn.push(truncated(name)).is_err() {
                break;
            }
        }
    }

    pub(crate) fn set_server_name(&mut self, name: &str) {
        self.server_name = truncated(name);
    }
}

/// Copy of `s` cut to the first `N` bytes on a character boundary
pub(crate) fn truncated<const N: usize>(s: &str) -> String<N> {
    let mut out = String::new();
    for c in s.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

/// One socket table entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Socket {
    pub status: SocketStatus,
    pub kind: ConnectionKind,
    /// Connection slot owned by this socket
    pub connection: Option<u8>,
    /// Bound as a server, the socket never owns a connection itself
    pub listener: bool,
    /// Opened by a local connect or sendto
    pub client: bool,
    pub local_port: u16,
    pub options: SocketOptions,
    pub tls: TlsParams,
}

impl Socket {
    /// Entry in `Reset` state
    pub(crate) fn reset(config: &NetConfig) -> Self {
        Self {
            status: SocketStatus::Reset,
            kind: ConnectionKind::Tcp,
            connection: None,
            listener: false,
            client: false,
            local_port: 0,
            options: SocketOptions::new(config),
            tls: TlsParams::default(),
        }
    }

    /// Freshly allocated entry with default options
    pub(crate) fn allocated(kind: ConnectionKind, config: &NetConfig) -> Self {
        Self {
            status: SocketStatus::Allocated,
            kind,
            ..Self::reset(config)
        }
    }
}
