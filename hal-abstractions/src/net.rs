#![deny(unsafe_code)]
//! Co-processor connection requests
//!
//! The co-processor owns a small, fixed pool of connection slots. Each
//! request addresses a slot by its id.

use core::future::Future;
use core::net::{Ipv4Addr, SocketAddrV4};

use heapless::{String, Vec};

use crate::NcpResult;

/// Longest SNTP server name the co-processor stores
pub const SNTP_SERVER_MAX_LEN: usize = 64;

/// Transport of a co-processor connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectionKind {
    Tcp,
    Udp,
    /// TCP with TLS terminated on the co-processor
    Ssl,
}

/// Parameters of an outgoing connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientConnection {
    /// Connection slot to open
    pub id: u8,
    pub kind: ConnectionKind,
    pub remote: SocketAddrV4,
    /// TCP keepalive in seconds, 0 disables it
    pub keepalive: u32,
}

/// TCP options applied to a slot before it connects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TcpOptions {
    /// SO_LINGER seconds, -1 disables lingering
    pub linger: i32,
    pub no_delay: bool,
    pub send_timeout_ms: u32,
    pub keepalive: u32,
}

/// Certificate-based TLS authentication of a slot
///
/// `mode` is a bitmask: bit 0 verifies the server against `ca_certificate`,
/// bit 1 authenticates the client with `certificate` and `private_key`.
/// Credentials are co-processor file names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SslAuth<'a> {
    pub mode: u8,
    pub certificate: Option<&'a str>,
    pub private_key: Option<&'a str>,
    pub ca_certificate: Option<&'a str>,
}

/// State of a connection slot as reported by the co-processor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SocketInfo {
    pub kind: ConnectionKind,
    pub remote: SocketAddrV4,
    pub local_port: u16,
    /// The connection was accepted by a local server
    pub server_side: bool,
}

/// ICMP echo parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingOptions {
    pub size: u16,
    pub count: u16,
    pub interval_ms: u32,
}

impl Default for PingOptions {
    fn default() -> Self {
        Self {
            size: 64,
            count: 4,
            interval_ms: 1000,
        }
    }
}

/// ICMP echo results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PingStats {
    pub average_ms: u32,
    pub received: u16,
    pub lost: u16,
}

/// SNTP client settings
///
/// `timezone` is either a whole-hour offset in -12..=14 or `HHmm` with
/// `HH` in -12..=14 and `mm` in 0..=59.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SntpConfig {
    pub enabled: bool,
    pub timezone: i16,
    pub servers: Vec<String<SNTP_SERVER_MAX_LEN>, 3>,
}

/// Date and time as formatted by the co-processor, `asctime` style
pub type SntpTime = String<32>;

/// Connection management on the co-processor
pub trait NcpNet {
    /// Open connection slot `conn.id` towards `conn.remote`
    fn start_client_connection(
        &self,
        conn: &ClientConnection,
    ) -> impl Future<Output = NcpResult<()>>;

    /// Close connection slot `id`
    fn stop_client_connection(&self, id: u8) -> impl Future<Output = NcpResult<()>>;

    /// Send on a connected slot, returns the number of bytes accepted
    fn send_data(
        &self,
        id: u8,
        data: &[u8],
        timeout_ms: u32,
    ) -> impl Future<Output = NcpResult<usize>>;

    /// Send a datagram to `remote` through slot `id`
    fn send_data_to(
        &self,
        id: u8,
        remote: SocketAddrV4,
        data: &[u8],
        timeout_ms: u32,
    ) -> impl Future<Output = NcpResult<usize>>;

    /// Pull up to `buf.len()` buffered bytes from slot `id`
    fn pull_data(
        &self,
        id: u8,
        buf: &mut [u8],
        timeout_ms: u32,
    ) -> impl Future<Output = NcpResult<usize>>;

    /// Query the state of slot `id`
    fn socket_info(&self, id: u8) -> impl Future<Output = NcpResult<SocketInfo>>;

    fn set_tcp_options(
        &self,
        id: u8,
        options: &TcpOptions,
    ) -> impl Future<Output = NcpResult<()>>;

    fn set_receive_buffer_len(&self, id: u8, len: u32) -> impl Future<Output = NcpResult<()>>;

    fn receive_buffer_len(&self, id: u8) -> impl Future<Output = NcpResult<u32>>;

    fn set_ssl_configuration(
        &self,
        id: u8,
        auth: &SslAuth<'_>,
    ) -> impl Future<Output = NcpResult<()>>;

    fn set_ssl_psk(
        &self,
        id: u8,
        psk: &str,
        identity: &str,
    ) -> impl Future<Output = NcpResult<()>>;

    /// Configure up to three ALPN protocol names
    fn set_ssl_alpn(&self, id: u8, protocols: &[&str]) -> impl Future<Output = NcpResult<()>>;

    fn set_ssl_server_name(&self, id: u8, name: &str) -> impl Future<Output = NcpResult<()>>;

    fn set_server_max_connections(&self, max: u8) -> impl Future<Output = NcpResult<()>>;

    /// Start the co-processor server on `port`
    fn start_server(
        &self,
        port: u16,
        kind: ConnectionKind,
        keepalive: u32,
    ) -> impl Future<Output = NcpResult<()>>;

    /// Stop the server, optionally dropping its accepted connections
    fn stop_server(&self, close_connections: bool) -> impl Future<Output = NcpResult<()>>;

    fn ping(
        &self,
        host: &str,
        options: &PingOptions,
    ) -> impl Future<Output = NcpResult<PingStats>>;

    /// Resolve `host` through the co-processor DNS client
    fn resolve(&self, host: &str) -> impl Future<Output = NcpResult<Ipv4Addr>>;

    fn sntp_config(&self) -> impl Future<Output = NcpResult<SntpConfig>>;

    fn set_sntp_config(&self, config: &SntpConfig) -> impl Future<Output = NcpResult<()>>;

    /// Current time kept by the SNTP client
    fn sntp_time(&self) -> impl Future<Output = NcpResult<SntpTime>>;

    /// Synchronization interval in seconds
    fn sntp_interval(&self) -> impl Future<Output = NcpResult<u16>>;

    fn set_sntp_interval(&self, seconds: u16) -> impl Future<Output = NcpResult<()>>;
}
