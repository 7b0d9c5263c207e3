#![deny(unsafe_code)]
//! Co-processor Wi-Fi requests

use core::future::Future;
use core::net::Ipv4Addr;

use heapless::{String, Vec};

use crate::{MacAddress, NcpResult};

/// Maximum number of access points kept from a scan
pub const MAX_SCAN_RESULTS: usize = 50;

/// Maximum number of stations attached to the soft access point
pub const MAX_CONNECTED_STATIONS: usize = 4;

/// Security of an access point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Security {
    Open,
    Wep,
    WpaPsk,
    Wpa2Psk,
    WpaWpa2Psk,
    WpaEnterprise,
    Wpa3Sae,
    Wpa2Wpa3Sae,
    Unknown,
}

impl core::fmt::Display for Security {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Self::Open => "OPEN",
            Self::Wep => "WEP",
            Self::WpaPsk => "WPA",
            Self::Wpa2Psk => "WPA2",
            Self::WpaWpa2Psk => "WPA WPA2",
            Self::WpaEnterprise => "WPA EAP",
            Self::Wpa3Sae => "WPA3 SAE",
            Self::Wpa2Wpa3Sae => "WPA2 WPA3 SAE",
            Self::Unknown => "UNKNOWN",
        };
        f.write_str(name)
    }
}

/// Station association parameters
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConnectOptions {
    pub ssid: String<32>,
    pub password: String<64>,
    /// Restrict association to this access point
    pub bssid: Option<MacAddress>,
    /// Use WPS push-button instead of a password
    pub wps: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ScanType {
    #[default]
    Active,
    Passive,
}

/// Scan filter
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScanOptions {
    pub ssid: Option<String<32>>,
    pub bssid: Option<MacAddress>,
    /// 0 scans every channel
    pub channel: u8,
    pub scan_type: ScanType,
    /// 0 keeps up to [`MAX_SCAN_RESULTS`]
    pub max_results: u8,
}

/// One scanned access point
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPoint {
    pub ssid: String<32>,
    pub bssid: MacAddress,
    pub rssi: i16,
    pub channel: u8,
    pub security: Security,
}

pub type ScanResults = Vec<AccessPoint, MAX_SCAN_RESULTS>;

/// Association details of the station interface
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConnectInfo {
    pub ssid: String<32>,
    pub bssid: MacAddress,
    pub rssi: i16,
    pub channel: u8,
}

/// IPv4 configuration of the station interface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaIpConfig {
    pub ip: Ipv4Addr,
    pub gateway: Ipv4Addr,
    pub netmask: Ipv4Addr,
}

/// Which interfaces run a DHCP client or server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DhcpMode {
    Disabled,
    Station,
    SoftAp,
    Both,
}

impl DhcpMode {
    /// The station obtains its address through DHCP
    pub fn station_enabled(self) -> bool {
        matches!(self, Self::Station | Self::Both)
    }

    /// The soft access point serves addresses
    pub fn soft_ap_enabled(self) -> bool {
        matches!(self, Self::SoftAp | Self::Both)
    }
}

/// Address pool of the soft access point DHCP server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DhcpServerConfig {
    pub lease_time_min: u32,
    pub start: Ipv4Addr,
    pub end: Ipv4Addr,
}

/// DNS servers of the station interface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DnsConfig {
    /// `servers` override the DHCP provided ones
    pub manual: bool,
    pub servers: [Ipv4Addr; 3],
}

/// Regulatory domain
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CountryCode {
    /// Follow the country advertised by the access point
    pub adaptive: bool,
    pub code: String<3>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TwtSetupType {
    #[default]
    Request,
    Suggest,
    Demand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TwtFlowType {
    #[default]
    Announced,
    Unannounced,
}

/// Target wake time agreement requested from the access point
///
/// The wake interval is `wake_interval_mantissa * 2^wake_interval_exponent`
/// microseconds, the minimum wake duration counts 256 microsecond units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TwtSetup {
    pub setup_type: TwtSetupType,
    pub flow_type: TwtFlowType,
    pub wake_interval_exponent: u8,
    pub min_wake_duration: u8,
    pub wake_interval_mantissa: u16,
}

/// Which target wake time flows to end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TwtTeardown {
    All,
    Flow(u8),
}

/// Soft access point parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApConfig {
    pub ssid: String<32>,
    pub password: String<64>,
    pub channel: u8,
    pub security: Security,
    pub max_connections: u8,
    pub hidden: bool,
}

impl Default for ApConfig {
    fn default() -> Self {
        Self {
            ssid: String::new(),
            password: String::new(),
            channel: 1,
            security: Security::Open,
            max_connections: MAX_CONNECTED_STATIONS as u8,
            hidden: false,
        }
    }
}

/// A station attached to the soft access point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectedStation {
    pub mac: MacAddress,
    pub ip: Ipv4Addr,
}

pub type ConnectedStations = Vec<ConnectedStation, MAX_CONNECTED_STATIONS>;

/// Wi-Fi control on the co-processor
pub trait NcpWifi {
    /// Bring up the station interface
    fn activate_sta(&self) -> impl Future<Output = NcpResult<()>>;

    fn set_auto_connect(&self, enable: bool) -> impl Future<Output = NcpResult<()>>;

    fn set_dhcp(&self, mode: DhcpMode, enable: bool) -> impl Future<Output = NcpResult<()>>;

    fn dhcp(&self) -> impl Future<Output = NcpResult<DhcpMode>>;

    fn dhcp_server(&self) -> impl Future<Output = NcpResult<DhcpServerConfig>>;

    /// Lease time of the soft access point DHCP server, in minutes
    fn set_dhcp_server_lease(&self, lease_time_min: u32) -> impl Future<Output = NcpResult<()>>;

    fn dns(&self) -> impl Future<Output = NcpResult<DnsConfig>>;

    fn set_dns(
        &self,
        manual: bool,
        servers: &[Ipv4Addr; 3],
    ) -> impl Future<Output = NcpResult<()>>;

    fn set_country_code(
        &self,
        adaptive: bool,
        code: &str,
    ) -> impl Future<Output = NcpResult<()>>;

    fn country_code(&self) -> impl Future<Output = NcpResult<CountryCode>>;

    fn set_hostname(&self, name: &str) -> impl Future<Output = NcpResult<()>>;

    fn hostname(&self) -> impl Future<Output = NcpResult<String<32>>>;

    fn sta_ip(&self) -> impl Future<Output = NcpResult<StaIpConfig>>;

    fn set_sta_ip(&self, config: &StaIpConfig) -> impl Future<Output = NcpResult<()>>;

    fn sta_mac(&self) -> impl Future<Output = NcpResult<MacAddress>>;

    /// DTIM listen interval, 0 when disabled
    fn dtim(&self) -> impl Future<Output = NcpResult<u32>>;

    fn set_dtim(&self, dtim: u32) -> impl Future<Output = NcpResult<()>>;

    /// Start station association; completion is reported by events
    fn connect(&self, options: &ConnectOptions) -> impl Future<Output = NcpResult<()>>;

    /// Drop the station association, `restore` re-enables autoconnect
    fn disconnect(&self, restore: bool) -> impl Future<Output = NcpResult<()>>;

    /// Start a scan; completion is reported by [`crate::NcpEvent::WifiScanDone`]
    fn start_scan(&self, options: &ScanOptions) -> impl Future<Output = NcpResult<()>>;

    fn scan_results(&self) -> impl Future<Output = NcpResult<ScanResults>>;

    fn connect_info(&self) -> impl Future<Output = NcpResult<ConnectInfo>>;

    /// Soft access point address and netmask
    fn ap_ip(&self) -> impl Future<Output = NcpResult<(Ipv4Addr, Ipv4Addr)>>;

    fn set_ap_ip(
        &self,
        ip: Ipv4Addr,
        netmask: Ipv4Addr,
    ) -> impl Future<Output = NcpResult<()>>;

    /// Run station and soft access point concurrently
    fn set_dual_mode(&self) -> impl Future<Output = NcpResult<()>>;

    fn activate_ap(&self, config: &ApConfig) -> impl Future<Output = NcpResult<()>>;

    /// Stop the soft access point, `reconnect` resumes the station
    fn deactivate_ap(&self, reconnect: bool) -> impl Future<Output = NcpResult<()>>;

    /// Configuration of the running soft access point
    fn ap_config(&self) -> impl Future<Output = NcpResult<ApConfig>>;

    fn ap_mac(&self) -> impl Future<Output = NcpResult<MacAddress>>;

    fn connected_stations(&self) -> impl Future<Output = NcpResult<ConnectedStations>>;

    /// Kick a station from the soft access point
    fn disconnect_station(&self, mac: MacAddress) -> impl Future<Output = NcpResult<()>>;

    /// Negotiate a target wake time agreement for the station
    fn setup_twt(&self, params: &TwtSetup) -> impl Future<Output = NcpResult<()>>;

    /// Enter the negotiated target wake time schedule
    fn set_twt(&self) -> impl Future<Output = NcpResult<()>>;

    fn teardown_twt(&self, flows: TwtTeardown) -> impl Future<Output = NcpResult<()>>;
}
