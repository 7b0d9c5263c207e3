//! Scripted co-processor for unit tests
//!
//! `MockNcp` records every request by name and queues the events a real
//! co-processor would raise. The `run_*` helpers drive a future together
//! with a pump that feeds those events back to the driver, standing in
//! for the event-delivery task.

use core::cell::RefCell;
use core::future::Future;
use core::net::{Ipv4Addr, SocketAddrV4};
use std::collections::VecDeque;
use std::string::String as StdString;
use std::vec::Vec as StdVec;

use embassy_futures::block_on;
use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use heapless::String;
use ncp_hal::net::{
    ClientConnection, ConnectionKind, PingOptions, PingStats, SntpConfig, SntpTime, SocketInfo,
    SslAuth, TcpOptions,
};
use ncp_hal::wifi::{
    ApConfig, ConnectInfo, ConnectOptions, ConnectedStations, CountryCode, DhcpMode,
    DhcpServerConfig, DnsConfig, ScanOptions, ScanResults, StaIpConfig, TwtSetup, TwtTeardown,
};
use ncp_hal::{MacAddress, NcpError, NcpEvent, NcpFs, NcpNet, NcpResult, NcpWifi};

use crate::callbacks::{AppCallbacks, NetEvent, WifiEvent};
use crate::config::MAX_CONNECTIONS;
use crate::driver::Driver;
use crate::error::Error;
use crate::net::Net;
use crate::wifi::Wifi;

/// How the co-processor answers a station connect request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WifiScript {
    /// Associate, then report an address when `got_ip`
    Succeed { got_ip: bool },
    /// Fail association with a reason code
    Reason(u32),
    /// Start associating and never finish
    Silent,
}

pub(crate) struct MockState {
    pub calls: StdVec<&'static str>,
    failures: StdVec<(&'static str, NcpError)>,
    pub rx: [VecDeque<u8>; MAX_CONNECTIONS],
    pub peers: [SocketAddrV4; MAX_CONNECTIONS],
    /// Bytes handed to send requests, per connection
    pub sent: StdVec<(u8, StdVec<u8>)>,
    pub send_timeouts: StdVec<u32>,
    pub echo: bool,
    pub confirm_connect: bool,
    pub confirm_stop: bool,
    pub server_side: bool,
    pub last_connection: Option<ClientConnection>,
    pub tcp_options: Option<TcpOptions>,
    pub ssl_mode: Option<u8>,
    pub alpn: StdVec<StdString>,
    pub server_name: Option<StdString>,
    pub recv_buffer_len: u32,
    pub files: StdVec<(StdString, u32)>,
    pub sntp: SntpConfig,
    pub sntp_interval: u16,
    // Wi-Fi side
    pub wifi_script: WifiScript,
    pub confirm_disconnect: bool,
    pub confirm_station_kick: bool,
    pub dtim: u32,
    pub dtim_writes: StdVec<u32>,
    pub sta_ip: StaIpConfig,
    pub ap_ip: (Ipv4Addr, Ipv4Addr),
    pub ap_active: bool,
    pub stations: ConnectedStations,
    pub hostname: String<32>,
    pub scan_results: ScanResults,
    pub dhcp: DhcpMode,
    pub dhcp_server: DhcpServerConfig,
    pub dns: DnsConfig,
    pub country: CountryCode,
    pub ap_config: ApConfig,
    /// Agreement accepted by the access point
    pub twt: Option<TwtSetup>,
    pub twt_active: bool,
}

pub(crate) struct MockNcp {
    events: Channel<CriticalSectionRawMutex, NcpEvent, 64>,
    pub state: RefCell<MockState>,
}

impl MockNcp {
    pub(crate) const RESOLVED: Ipv4Addr = Ipv4Addr::new(93, 184, 216, 34);
    pub(crate) const STA_MAC: MacAddress = [0x02, 0x80, 0xe1, 0x00, 0x00, 0x01];
    pub(crate) const AP_MAC: MacAddress = [0x02, 0x80, 0xe1, 0x00, 0x00, 0x02];

    pub(crate) fn new() -> Self {
        let unspecified = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0);
        Self {
            events: Channel::new(),
            state: RefCell::new(MockState {
                calls: StdVec::new(),
                failures: StdVec::new(),
                rx: Default::default(),
                peers: [unspecified; MAX_CONNECTIONS],
                sent: StdVec::new(),
                send_timeouts: StdVec::new(),
                echo: false,
                confirm_connect: true,
                confirm_stop: true,
                server_side: true,
                last_connection: None,
                tcp_options: None,
                ssl_mode: None,
                alpn: StdVec::new(),
                server_name: None,
                recv_buffer_len: 2 * 3 * 1536,
                files: StdVec::new(),
                sntp: SntpConfig::default(),
                sntp_interval: 3600,
                wifi_script: WifiScript::Succeed { got_ip: true },
                confirm_disconnect: true,
                confirm_station_kick: true,
                dtim: 3,
                dtim_writes: StdVec::new(),
                sta_ip: StaIpConfig {
                    ip: Ipv4Addr::new(192, 168, 1, 20),
                    gateway: Ipv4Addr::new(192, 168, 1, 1),
                    netmask: Ipv4Addr::new(255, 255, 255, 0),
                },
                ap_ip: (Ipv4Addr::UNSPECIFIED, Ipv4Addr::UNSPECIFIED),
                ap_active: false,
                stations: ConnectedStations::new(),
                hostname: String::new(),
                scan_results: ScanResults::new(),
                dhcp: DhcpMode::Disabled,
                dhcp_server: DhcpServerConfig {
                    lease_time_min: 120,
                    start: Ipv4Addr::new(192, 168, 8, 2),
                    end: Ipv4Addr::new(192, 168, 8, 101),
                },
                dns: DnsConfig {
                    manual: false,
                    servers: [Ipv4Addr::UNSPECIFIED; 3],
                },
                country: CountryCode::default(),
                ap_config: ApConfig::default(),
                twt: None,
                twt_active: false,
            }),
        }
    }

    /// Fail the next request named `name` with `err`
    pub(crate) fn fail_next(&self, name: &'static str, err: NcpError) {
        self.state.borrow_mut().failures.push((name, err));
    }

    pub(crate) fn calls(&self) -> StdVec<&'static str> {
        self.state.borrow().calls.clone()
    }

    pub(crate) fn calls_named(&self, name: &str) -> usize {
        self.state.borrow().calls.iter().filter(|call| **call == name).count()
    }

    pub(crate) fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    /// Buffer `data` on connection `id` and announce it
    pub(crate) fn deliver(&self, id: u8, data: &[u8], remote: SocketAddrV4) {
        {
            let mut state = self.state.borrow_mut();
            state.rx[usize::from(id)].extend(data.iter().copied());
            state.peers[usize::from(id)] = remote;
        }
        self.emit(NcpEvent::SocketData {
            id,
            len: data.len() as u32,
            remote,
        });
    }

    pub(crate) fn emit(&self, event: NcpEvent) {
        let _ = self.events.try_send(event);
    }

    pub(crate) async fn next_event(&self) -> NcpEvent {
        self.events.receive().await
    }

    fn record(&self, name: &'static str) -> NcpResult<()> {
        let mut state = self.state.borrow_mut();
        state.calls.push(name);
        if let Some(index) = state.failures.iter().position(|(call, _)| *call == name) {
            let (_, err) = state.failures.remove(index);
            return Err(err);
        }
        Ok(())
    }
}

impl NcpNet for MockNcp {
    async fn start_client_connection(&self, conn: &ClientConnection) -> NcpResult<()> {
        self.record("start_client_connection")?;
        let confirm = {
            let mut state = self.state.borrow_mut();
            state.last_connection = Some(*conn);
            state.peers[usize::from(conn.id)] = conn.remote;
            state.confirm_connect
        };
        if confirm {
            self.emit(NcpEvent::SocketConnected(conn.id));
        }
        Ok(())
    }

    async fn stop_client_connection(&self, id: u8) -> NcpResult<()> {
        self.record("stop_client_connection")?;
        let confirm = {
            let mut state = self.state.borrow_mut();
            state.rx[usize::from(id)].clear();
            state.confirm_stop
        };
        if confirm {
            self.emit(NcpEvent::SocketDisconnected(id));
        }
        Ok(())
    }

    async fn send_data(&self, id: u8, data: &[u8], timeout_ms: u32) -> NcpResult<usize> {
        self.record("send_data")?;
        let (echo, peer) = {
            let mut state = self.state.borrow_mut();
            state.sent.push((id, data.to_vec()));
            state.send_timeouts.push(timeout_ms);
            (state.echo, state.peers[usize::from(id)])
        };
        if echo {
            self.deliver(id, data, peer);
        }
        Ok(data.len())
    }

    async fn send_data_to(
        &self,
        id: u8,
        remote: SocketAddrV4,
        data: &[u8],
        timeout_ms: u32,
    ) -> NcpResult<usize> {
        self.record("send_data_to")?;
        let mut state = self.state.borrow_mut();
        state.sent.push((id, data.to_vec()));
        state.send_timeouts.push(timeout_ms);
        state.peers[usize::from(id)] = remote;
        Ok(data.len())
    }

    async fn pull_data(&self, id: u8, buf: &mut [u8], _timeout_ms: u32) -> NcpResult<usize> {
        self.record("pull_data")?;
        let mut state = self.state.borrow_mut();
        let rx = &mut state.rx[usize::from(id)];
        let len = buf.len().min(rx.len());
        for (slot, byte) in buf.iter_mut().zip(rx.drain(..len)) {
            *slot = byte;
        }
        Ok(len)
    }

    async fn socket_info(&self, id: u8) -> NcpResult<SocketInfo> {
        self.record("socket_info")?;
        let state = self.state.borrow();
        Ok(SocketInfo {
            kind: ConnectionKind::Tcp,
            remote: state.peers[usize::from(id)],
            local_port: 0,
            server_side: state.server_side,
        })
    }

    async fn set_tcp_options(&self, _id: u8, options: &TcpOptions) -> NcpResult<()> {
        self.record("set_tcp_options")?;
        self.state.borrow_mut().tcp_options = Some(*options);
        Ok(())
    }

    async fn set_receive_buffer_len(&self, _id: u8, len: u32) -> NcpResult<()> {
        self.record("set_receive_buffer_len")?;
        self.state.borrow_mut().recv_buffer_len = len;
        Ok(())
    }

    async fn receive_buffer_len(&self, _id: u8) -> NcpResult<u32> {
        self.record("receive_buffer_len")?;
        Ok(self.state.borrow().recv_buffer_len)
    }

    async fn set_ssl_configuration(&self, _id: u8, auth: &SslAuth<'_>) -> NcpResult<()> {
        self.record("set_ssl_configuration")?;
        self.state.borrow_mut().ssl_mode = Some(auth.mode);
        Ok(())
    }

    async fn set_ssl_psk(&self, _id: u8, _psk: &str, _identity: &str) -> NcpResult<()> {
        self.record("set_ssl_psk")
    }

    async fn set_ssl_alpn(&self, _id: u8, protocols: &[&str]) -> NcpResult<()> {
        self.record("set_ssl_alpn")?;
        self.state.borrow_mut().alpn = protocols.iter().map(|name| name.to_string()).collect();
        Ok(())
    }

    async fn set_ssl_server_name(&self, _id: u8, name: &str) -> NcpResult<()> {
        self.record("set_ssl_server_name")?;
        self.state.borrow_mut().server_name = Some(name.to_string());
        Ok(())
    }

    async fn set_server_max_connections(&self, _max: u8) -> NcpResult<()> {
        self.record("set_server_max_connections")
    }

    async fn start_server(&self, _port: u16, _kind: ConnectionKind, _keepalive: u32) -> NcpResult<()> {
        self.record("start_server")
    }

    async fn stop_server(&self, _close_connections: bool) -> NcpResult<()> {
        self.record("stop_server")
    }

    async fn ping(&self, _host: &str, options: &PingOptions) -> NcpResult<PingStats> {
        self.record("ping")?;
        Ok(PingStats {
            average_ms: 12,
            received: options.count,
            lost: 0,
        })
    }

    async fn resolve(&self, _host: &str) -> NcpResult<Ipv4Addr> {
        self.record("resolve")?;
        Ok(Self::RESOLVED)
    }

    async fn sntp_config(&self) -> NcpResult<SntpConfig> {
        self.record("sntp_config")?;
        Ok(self.state.borrow().sntp.clone())
    }

    async fn set_sntp_config(&self, config: &SntpConfig) -> NcpResult<()> {
        self.record("set_sntp_config")?;
        self.state.borrow_mut().sntp = config.clone();
        Ok(())
    }

    async fn sntp_time(&self) -> NcpResult<SntpTime> {
        self.record("sntp_time")?;
        if !self.state.borrow().sntp.enabled {
            return Err(NcpError::Failed);
        }
        SntpTime::try_from("Thu Oct 16 09:30:00 2026").map_err(|_| NcpError::Failed)
    }

    async fn sntp_interval(&self) -> NcpResult<u16> {
        self.record("sntp_interval")?;
        Ok(self.state.borrow().sntp_interval)
    }

    async fn set_sntp_interval(&self, seconds: u16) -> NcpResult<()> {
        self.record("set_sntp_interval")?;
        self.state.borrow_mut().sntp_interval = seconds;
        Ok(())
    }
}

impl NcpFs for MockNcp {
    async fn file_size(&self, name: &str) -> NcpResult<u32> {
        self.record("file_size")?;
        let state = self.state.borrow();
        Ok(state
            .files
            .iter()
            .find(|(file, _)| file == name)
            .map_or(0, |(_, size)| *size))
    }

    async fn write_file(&self, name: &str) -> NcpResult<()> {
        self.record("write_file")?;
        self.state.borrow_mut().files.push((name.to_string(), 1024));
        Ok(())
    }
}

impl NcpWifi for MockNcp {
    async fn activate_sta(&self) -> NcpResult<()> {
        self.record("activate_sta")
    }

    async fn set_auto_connect(&self, _enable: bool) -> NcpResult<()> {
        self.record("set_auto_connect")
    }

    async fn set_dhcp(&self, mode: DhcpMode, enable: bool) -> NcpResult<()> {
        self.record("set_dhcp")?;
        let mut state = self.state.borrow_mut();
        let sta = state.dhcp.station_enabled();
        let ap = state.dhcp.soft_ap_enabled();
        let (sta, ap) = if enable {
            (sta || mode.station_enabled(), ap || mode.soft_ap_enabled())
        } else {
            (sta && !mode.station_enabled(), ap && !mode.soft_ap_enabled())
        };
        state.dhcp = match (sta, ap) {
            (false, false) => DhcpMode::Disabled,
            (true, false) => DhcpMode::Station,
            (false, true) => DhcpMode::SoftAp,
            (true, true) => DhcpMode::Both,
        };
        Ok(())
    }

    async fn dhcp(&self) -> NcpResult<DhcpMode> {
        self.record("dhcp")?;
        Ok(self.state.borrow().dhcp)
    }

    async fn dhcp_server(&self) -> NcpResult<DhcpServerConfig> {
        self.record("dhcp_server")?;
        Ok(self.state.borrow().dhcp_server)
    }

    async fn set_dhcp_server_lease(&self, lease_time_min: u32) -> NcpResult<()> {
        self.record("set_dhcp_server_lease")?;
        self.state.borrow_mut().dhcp_server.lease_time_min = lease_time_min;
        Ok(())
    }

    async fn dns(&self) -> NcpResult<DnsConfig> {
        self.record("dns")?;
        Ok(self.state.borrow().dns)
    }

    async fn set_dns(&self, manual: bool, servers: &[Ipv4Addr; 3]) -> NcpResult<()> {
        self.record("set_dns")?;
        self.state.borrow_mut().dns = DnsConfig {
            manual,
            servers: *servers,
        };
        Ok(())
    }

    async fn country_code(&self) -> NcpResult<CountryCode> {
        self.record("country_code")?;
        Ok(self.state.borrow().country.clone())
    }

    async fn set_country_code(&self, adaptive: bool, code: &str) -> NcpResult<()> {
        self.record("set_country_code")?;
        self.state.borrow_mut().country = CountryCode {
            adaptive,
            code: String::try_from(code).map_err(|_| NcpError::Failed)?,
        };
        Ok(())
    }

    async fn set_hostname(&self, name: &str) -> NcpResult<()> {
        self.record("set_hostname")?;
        self.state.borrow_mut().hostname = String::try_from(name).map_err(|_| NcpError::Failed)?;
        Ok(())
    }

    async fn hostname(&self) -> NcpResult<String<32>> {
        self.record("hostname")?;
        Ok(self.state.borrow().hostname.clone())
    }

    async fn sta_ip(&self) -> NcpResult<StaIpConfig> {
        self.record("sta_ip")?;
        Ok(self.state.borrow().sta_ip)
    }

    async fn set_sta_ip(&self, config: &StaIpConfig) -> NcpResult<()> {
        self.record("set_sta_ip")?;
        self.state.borrow_mut().sta_ip = *config;
        Ok(())
    }

    async fn sta_mac(&self) -> NcpResult<MacAddress> {
        self.record("sta_mac")?;
        Ok(Self::STA_MAC)
    }

    async fn dtim(&self) -> NcpResult<u32> {
        self.record("dtim")?;
        Ok(self.state.borrow().dtim)
    }

    async fn set_dtim(&self, dtim: u32) -> NcpResult<()> {
        self.record("set_dtim")?;
        let mut state = self.state.borrow_mut();
        state.dtim = dtim;
        state.dtim_writes.push(dtim);
        Ok(())
    }

    async fn connect(&self, _options: &ConnectOptions) -> NcpResult<()> {
        self.record("connect")?;
        let script = self.state.borrow().wifi_script;
        self.emit(NcpEvent::WifiConnecting);
        match script {
            WifiScript::Succeed { got_ip } => {
                self.emit(NcpEvent::WifiConnected);
                if got_ip {
                    self.emit(NcpEvent::WifiGotIp);
                }
            }
            WifiScript::Reason(code) => {
                self.emit(NcpEvent::WifiReason(code));
                self.emit(NcpEvent::WifiDisconnected);
            }
            WifiScript::Silent => {}
        }
        Ok(())
    }

    async fn disconnect(&self, _restore: bool) -> NcpResult<()> {
        self.record("disconnect")?;
        if self.state.borrow().confirm_disconnect {
            self.emit(NcpEvent::WifiDisconnected);
        }
        Ok(())
    }

    async fn start_scan(&self, _options: &ScanOptions) -> NcpResult<()> {
        self.record("start_scan")?;
        self.emit(NcpEvent::WifiScanDone);
        Ok(())
    }

    async fn scan_results(&self) -> NcpResult<ScanResults> {
        self.record("scan_results")?;
        Ok(self.state.borrow().scan_results.clone())
    }

    async fn connect_info(&self) -> NcpResult<ConnectInfo> {
        self.record("connect_info")?;
        Ok(ConnectInfo {
            ssid: String::try_from("lab").map_err(|_| NcpError::Failed)?,
            rssi: -42,
            channel: 6,
            ..ConnectInfo::default()
        })
    }

    async fn ap_ip(&self) -> NcpResult<(Ipv4Addr, Ipv4Addr)> {
        self.record("ap_ip")?;
        Ok(self.state.borrow().ap_ip)
    }

    async fn set_ap_ip(&self, ip: Ipv4Addr, netmask: Ipv4Addr) -> NcpResult<()> {
        self.record("set_ap_ip")?;
        self.state.borrow_mut().ap_ip = (ip, netmask);
        Ok(())
    }

    async fn set_dual_mode(&self) -> NcpResult<()> {
        self.record("set_dual_mode")
    }

    async fn activate_ap(&self, config: &ApConfig) -> NcpResult<()> {
        self.record("activate_ap")?;
        let mut state = self.state.borrow_mut();
        state.ap_active = true;
        state.ap_config = config.clone();
        Ok(())
    }

    async fn deactivate_ap(&self, _reconnect: bool) -> NcpResult<()> {
        self.record("deactivate_ap")?;
        self.state.borrow_mut().ap_active = false;
        Ok(())
    }

    async fn ap_config(&self) -> NcpResult<ApConfig> {
        self.record("ap_config")?;
        Ok(self.state.borrow().ap_config.clone())
    }

    async fn ap_mac(&self) -> NcpResult<MacAddress> {
        self.record("ap_mac")?;
        Ok(Self::AP_MAC)
    }

    async fn connected_stations(&self) -> NcpResult<ConnectedStations> {
        self.record("connected_stations")?;
        Ok(self.state.borrow().stations.clone())
    }

    async fn disconnect_station(&self, mac: MacAddress) -> NcpResult<()> {
        self.record("disconnect_station")?;
        let confirm = {
            let mut state = self.state.borrow_mut();
            state.stations.retain(|station| station.mac != mac);
            state.confirm_station_kick
        };
        if confirm {
            self.emit(NcpEvent::StationLeft(mac));
        }
        Ok(())
    }

    async fn setup_twt(&self, params: &TwtSetup) -> NcpResult<()> {
        self.record("setup_twt")?;
        self.state.borrow_mut().twt = Some(*params);
        Ok(())
    }

    async fn set_twt(&self) -> NcpResult<()> {
        self.record("set_twt")?;
        let mut state = self.state.borrow_mut();
        if state.twt.is_none() {
            return Err(NcpError::Failed);
        }
        state.twt_active = true;
        Ok(())
    }

    async fn teardown_twt(&self, _flows: TwtTeardown) -> NcpResult<()> {
        self.record("teardown_twt")?;
        let mut state = self.state.borrow_mut();
        state.twt = None;
        state.twt_active = false;
        Ok(())
    }
}

/// Callbacks recording everything they receive
#[derive(Default)]
pub(crate) struct Recorder {
    errors: RefCell<StdVec<(Error, &'static str)>>,
    wifi: RefCell<StdVec<WifiEvent>>,
    net: RefCell<StdVec<NetEvent>>,
    other: RefCell<StdVec<(&'static str, u16)>>,
}

impl Recorder {
    pub(crate) fn errors(&self) -> StdVec<(Error, &'static str)> {
        self.errors.borrow().clone()
    }

    pub(crate) fn wifi_events(&self) -> StdVec<WifiEvent> {
        self.wifi.borrow().clone()
    }

    pub(crate) fn net_events(&self) -> StdVec<NetEvent> {
        self.net.borrow().clone()
    }

    pub(crate) fn other_events(&self) -> StdVec<(&'static str, u16)> {
        self.other.borrow().clone()
    }
}

impl AppCallbacks for Recorder {
    fn wifi_event(&self, event: WifiEvent) {
        self.wifi.borrow_mut().push(event);
    }

    fn net_event(&self, event: NetEvent) {
        self.net.borrow_mut().push(event);
    }

    fn mqtt_event(&self, id: u16) {
        self.other.borrow_mut().push(("mqtt", id));
    }

    fn ble_event(&self, id: u16) {
        self.other.borrow_mut().push(("ble", id));
    }

    fn error(&self, status: Error, operation: &'static str) {
        self.errors.borrow_mut().push((status, operation));
    }
}

/// Drive `fut` while feeding co-processor events to `net`
pub(crate) fn run_net<F: Future>(
    net: &Net<'_, MockNcp, CriticalSectionRawMutex>,
    ncp: &MockNcp,
    fut: F,
) -> F::Output {
    block_on(async {
        let pump = async {
            loop {
                net.handle_event(ncp.next_event().await);
            }
        };
        match select(fut, pump).await {
            Either::First(output) => output,
            Either::Second(_) => unreachable!(),
        }
    })
}

/// Drive `fut` while feeding co-processor events to `wifi`
pub(crate) fn run_wifi<F: Future>(
    wifi: &Wifi<'_, MockNcp, CriticalSectionRawMutex>,
    ncp: &MockNcp,
    fut: F,
) -> F::Output {
    block_on(async {
        let pump = async {
            loop {
                wifi.handle_event(ncp.next_event().await).await;
            }
        };
        match select(fut, pump).await {
            Either::First(output) => output,
            Either::Second(_) => unreachable!(),
        }
    })
}

/// Drive `fut` while feeding co-processor events to `driver`
pub(crate) fn run_driver<F: Future>(
    driver: &Driver<'_, MockNcp, CriticalSectionRawMutex>,
    ncp: &MockNcp,
    fut: F,
) -> F::Output {
    block_on(async {
        let pump = async {
            loop {
                driver.handle_event(ncp.next_event().await).await;
            }
        };
        match select(fut, pump).await {
            Either::First(output) => output,
            Either::Second(_) => unreachable!(),
        }
    })
}
