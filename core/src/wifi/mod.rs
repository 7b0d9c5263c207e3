#![deny(unsafe_code)]
//! Wi-Fi station and soft access point manager
//!
//! Blocking calls (connect, disconnect, scan, station kick) mark the event
//! they expect, issue the request, then wait on the event group. The event
//! task updates the interface states, raises the matching bit only when
//! that event was expected, and forwards every event to the application.
//!
//! ```text
//! Off ─start─► Disconnected ─connect─► Connecting ─► Connected ─► GotIp
//!                   ▲                                    │           │
//!                   └───────────── Disconnected ─────────┴───────────┘
//! ```

mod reason;
mod soft_ap;
mod station;
mod twt;

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use ncp_hal::wifi::DhcpMode;
use ncp_hal::{MacAddress, NcpEvent, NcpResult, NcpWifi};

use crate::callbacks::{AppCallbacks, WifiEvent};
use crate::config::WifiConfig;
use crate::error::{self, log_failure, Error, Result};
use crate::event_group::EventGroup;

pub use reason::DisconnectReason;

const CONNECT: u32 = 1 << 0;
const GOT_IP: u32 = 1 << 1;
const DISCONNECT: u32 = 1 << 2;
const REASON: u32 = 1 << 3;
const STATION_LEFT: u32 = 1 << 4;
const SCAN_DONE: u32 = 1 << 5;
const ALL_EVENTS: u32 = CONNECT | GOT_IP | DISCONNECT | REASON | STATION_LEFT | SCAN_DONE;

/// Station interface state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StaState {
    #[default]
    Off,
    Disconnected,
    Connecting,
    Connected,
    GotIp,
}

impl StaState {
    /// Associated with an access point, with or without address
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Connected | Self::GotIp)
    }
}

impl core::fmt::Display for StaState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Off => write!(f, "Off"),
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
            Self::GotIp => write!(f, "Got IP"),
        }
    }
}

/// Soft access point state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ApState {
    #[default]
    Off,
    Running,
}

impl core::fmt::Display for ApState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Off => write!(f, "Off"),
            Self::Running => write!(f, "Running"),
        }
    }
}

#[derive(Debug, Default)]
struct WifiState {
    sta: StaState,
    ap: ApState,
    expect_connect: bool,
    expect_got_ip: bool,
    expect_disconnect: bool,
    expect_scan: bool,
    /// Station whose departure a kick is waiting for
    expect_station_left: Option<MacAddress>,
}

/// Wi-Fi manager bound to one co-processor
pub struct Wifi<'d, N, M: RawMutex> {
    ncp: &'d N,
    callbacks: &'d dyn AppCallbacks,
    config: WifiConfig,
    state: Mutex<M, RefCell<WifiState>>,
    events: EventGroup<M>,
}

impl<'d, N, M> Wifi<'d, N, M>
where
    N: NcpWifi,
    M: RawMutex,
{
    pub fn new(ncp: &'d N, callbacks: &'d dyn AppCallbacks, config: WifiConfig) -> Self {
        Self {
            ncp,
            callbacks,
            config,
            state: Mutex::new(RefCell::new(WifiState::default())),
            events: EventGroup::new(),
        }
    }

    /// Start the station interface and apply the configuration
    ///
    /// Applies auto-connect, DHCP, DNS, country code, host name and the
    /// soft access point address, in that order.
    ///
    /// # Errors
    ///
    /// Returns `Error::Failed` for a host name longer than 32 bytes,
    /// otherwise the translated failure of the first rejected request.
    pub async fn init(&self) -> Result<()> {
        self.with(|state| *state = WifiState::default());
        self.events.clear(ALL_EVENTS);
        let config = &self.config;
        if config.hostname.len() > 32 {
            error!("Host name too long");
            return Err(Error::Failed);
        }

        self.start_sta().await?;
        self.call(
            self.ncp.set_auto_connect(config.auto_connect).await,
            "set_auto_connect",
        )?;
        self.call(self.ncp.set_dhcp(DhcpMode::Both, false).await, "set_dhcp")?;
        self.call(self.ncp.set_dhcp(config.dhcp, true).await, "set_dhcp")?;
        self.call(
            self.ncp.set_dns(config.manual_dns, &config.dns_servers).await,
            "set_dns",
        )?;
        self.call(
            self.ncp
                .set_country_code(config.adaptive_country_code, config.country_code)
                .await,
            "set_country_code",
        )?;
        self.call(self.ncp.set_hostname(config.hostname).await, "set_hostname")?;
        self.call(
            self.ncp
                .set_ap_ip(WifiConfig::ap_address(config.ap_subnet), config.ap_netmask)
                .await,
            "set_ap_ip",
        )
        .inspect_err(|err| log_failure(*err, "set_ap_ip"))?;
        info!("Wi-Fi initialized");
        Ok(())
    }

    /// Forget every interface state
    pub fn deinit(&self) {
        self.with(|state| *state = WifiState::default());
        self.events.clear(ALL_EVENTS);
        info!("Wi-Fi deinitialized");
    }

    /// Activate the station interface
    ///
    /// # Errors
    ///
    /// Returns the translated request failure.
    pub async fn start_sta(&self) -> Result<()> {
        self.call(self.ncp.activate_sta().await, "activate_sta")
            .inspect_err(|err| log_failure(*err, "activate_sta"))?;
        self.with(|state| {
            state.sta = StaState::Disconnected;
            state.ap = ApState::Off;
        });
        Ok(())
    }

    pub fn sta_state(&self) -> StaState {
        self.with(|state| state.sta)
    }

    pub fn ap_state(&self) -> ApState {
        self.with(|state| state.ap)
    }

    /// Apply a Wi-Fi or soft access point event from the co-processor
    ///
    /// Must be called from the event-delivery task. Awaits only when an
    /// address is acquired while the soft access point runs, to resolve a
    /// subnet collision.
    pub async fn handle_event(&self, event: NcpEvent) {
        match event {
            NcpEvent::WifiConnected => {
                let expected = self.with(|state| {
                    state.sta = StaState::Connected;
                    core::mem::take(&mut state.expect_connect)
                });
                if expected {
                    self.events.set(CONNECT);
                }
                self.callbacks.wifi_event(WifiEvent::Connected);
            }
            NcpEvent::WifiGotIp => {
                let ap_running = self.with(|state| {
                    state.sta = StaState::GotIp;
                    state.ap == ApState::Running
                });
                self.callbacks.wifi_event(WifiEvent::GotIp);
                if ap_running {
                    if let Err(err) = self.check_subnet().await {
                        error!("Subnet check failed: {}", err);
                    }
                }
                if self.with(|state| core::mem::take(&mut state.expect_got_ip)) {
                    self.events.set(GOT_IP);
                }
            }
            NcpEvent::WifiDisconnected => {
                let expected = self.with(|state| {
                    state.sta = StaState::Disconnected;
                    core::mem::take(&mut state.expect_disconnect)
                });
                if expected {
                    self.events.set(DISCONNECT);
                }
                self.callbacks.wifi_event(WifiEvent::Disconnected);
            }
            NcpEvent::WifiConnecting => {
                self.with(|state| state.sta = StaState::Connecting);
                self.callbacks.wifi_event(WifiEvent::Connecting);
            }
            NcpEvent::WifiReason(code) => {
                let reason = DisconnectReason::from_code(code);
                warn!("Wi-Fi reason {}: {}", code, reason);
                if self.with(|state| state.expect_connect) {
                    self.events.set(REASON);
                }
                self.callbacks.wifi_event(WifiEvent::Reason(reason));
            }
            NcpEvent::WifiScanDone => {
                if self.with(|state| core::mem::take(&mut state.expect_scan)) {
                    self.events.set(SCAN_DONE);
                }
            }
            NcpEvent::StationJoined(mac) => {
                self.callbacks.wifi_event(WifiEvent::StationJoined(mac));
            }
            NcpEvent::StationLeft(mac) => {
                let expected = self.with(|state| {
                    if state.expect_station_left == Some(mac) {
                        state.expect_station_left = None;
                        true
                    } else {
                        false
                    }
                });
                if expected {
                    self.events.set(STATION_LEFT);
                }
                self.callbacks.wifi_event(WifiEvent::StationLeft(mac));
            }
            NcpEvent::StationIp { mac, ip } => {
                self.callbacks.wifi_event(WifiEvent::StationIp { mac, ip });
            }
            _ => {}
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut WifiState) -> R) -> R {
        self.state.lock(|state| f(&mut state.borrow_mut()))
    }

    fn call<T>(&self, result: NcpResult<T>, operation: &'static str) -> Result<T> {
        error::translate(self.callbacks, result, operation)
    }

    fn ensure_sta_on(&self) -> Result<()> {
        if self.sta_state() == StaState::Off {
            error!("Station interface is off");
            return Err(Error::Failed);
        }
        Ok(())
    }
}
