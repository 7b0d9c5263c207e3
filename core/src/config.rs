#![deny(unsafe_code)]
//! Driver configuration structures

use core::net::Ipv4Addr;

use ncp_hal::wifi::DhcpMode;

/// Number of hardware connection slots on the co-processor
pub const MAX_CONNECTIONS: usize = 5;

/// Socket descriptors, one more than the hardware slots so a listener can
/// coexist with a full set of accepted connections
pub const MAX_SOCKETS: usize = MAX_CONNECTIONS + 1;

/// TLS credential slots
pub const MAX_CREDENTIALS: usize = MAX_CONNECTIONS * 3;

/// Socket manager configuration
#[derive(Debug, Clone)]
pub struct NetConfig {
    /// Default receive timeout of new sockets in milliseconds
    pub recv_timeout_ms: u32,
    /// Default send timeout of new sockets in milliseconds
    pub send_timeout_ms: u32,
    /// Default and co-processor receive buffer size in bytes
    pub recv_buffer_size: u32,
    /// Deadline of a single pull request in milliseconds
    pub pull_timeout_ms: u32,
    /// Fallback re-check period of blocked accept and receive calls
    pub poll_period_ms: u32,
    /// How long connect waits for the slot to report connected
    pub connect_confirm_timeout_ms: u32,
    /// Stop attempts made by close before giving up
    pub close_retry_limit: u32,
    /// Back-off between failed stop attempts in milliseconds
    pub close_retry_delay_ms: u32,
    /// Added to the socket send timeout to form the request deadline
    pub send_margin_ms: u32,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            recv_timeout_ms: 5000,
            send_timeout_ms: 5000,
            recv_buffer_size: 2 * 3 * 1536,
            pull_timeout_ms: 100,
            poll_period_ms: 100,
            connect_confirm_timeout_ms: 1000,
            close_retry_limit: 50,
            close_retry_delay_ms: 100,
            send_margin_ms: 1000,
        }
    }
}

/// Wi-Fi manager configuration
#[derive(Debug, Clone)]
pub struct WifiConfig {
    /// Let the co-processor reconnect on its own after a drop
    pub auto_connect: bool,
    pub dhcp: DhcpMode,
    /// Use `dns_servers` instead of the DHCP provided ones
    pub manual_dns: bool,
    pub dns_servers: [Ipv4Addr; 3],
    /// ISO 3166 code, "00" for world-safe channels
    pub country_code: &'static str,
    /// Follow the country advertised by the access point
    pub adaptive_country_code: bool,
    pub hostname: &'static str,
    /// First three octets of the soft access point subnet
    pub ap_subnet: [u8; 3],
    /// Subnet used when the station network collides with `ap_subnet`
    pub ap_backup_subnet: [u8; 3],
    pub ap_netmask: Ipv4Addr,
    pub connect_timeout_ms: u32,
    pub got_ip_timeout_ms: u32,
    pub disconnect_timeout_ms: u32,
    pub station_disconnect_timeout_ms: u32,
    pub scan_timeout_ms: u32,
}

impl Default for WifiConfig {
    fn default() -> Self {
        Self {
            auto_connect: false,
            dhcp: DhcpMode::Station,
            manual_dns: false,
            dns_servers: [
                Ipv4Addr::new(208, 67, 222, 222),
                Ipv4Addr::new(8, 8, 8, 8),
                Ipv4Addr::new(0, 0, 0, 0),
            ],
            country_code: "00",
            adaptive_country_code: false,
            hostname: "ST67W61_WiFi",
            ap_subnet: [192, 168, 8],
            ap_backup_subnet: [192, 168, 9],
            ap_netmask: Ipv4Addr::new(255, 255, 255, 0),
            connect_timeout_ms: 10_000,
            got_ip_timeout_ms: 15_000,
            disconnect_timeout_ms: 5000,
            station_disconnect_timeout_ms: 5000,
            scan_timeout_ms: 10_000,
        }
    }
}

impl WifiConfig {
    /// Soft access point address inside `subnet`
    pub fn ap_address(subnet: [u8; 3]) -> Ipv4Addr {
        Ipv4Addr::new(subnet[0], subnet[1], subnet[2], 1)
    }
}

/// Complete driver configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub net: NetConfig,
    pub wifi: WifiConfig,
}
