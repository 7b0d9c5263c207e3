#![deny(unsafe_code)]
//! Station interface operations

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_time::Duration;
use heapless::String;
use ncp_hal::wifi::{
    ConnectInfo, ConnectOptions, CountryCode, DnsConfig, ScanOptions, ScanResults, StaIpConfig,
};
use ncp_hal::{MacAddress, NcpWifi};

use super::{ApState, StaState, Wifi, CONNECT, DISCONNECT, GOT_IP, REASON, SCAN_DONE};
use crate::callbacks::WifiEvent;
use crate::error::{log_failure, Error, Result};

impl<N, M> Wifi<'_, N, M>
where
    N: NcpWifi,
    M: RawMutex,
{
    /// Connect the station to an access point
    ///
    /// DTIM power save is disabled for the attempt and restored on every
    /// exit path. Waits for association, then for an address when the
    /// station DHCP client is enabled.
    ///
    /// # Errors
    ///
    /// * `Error::Failed` if the station is off or the access point rejected
    ///   the association
    /// * `Error::Timeout` if association did not complete in time, the
    ///   station is then back to `Disconnected`
    /// * `Error::Timeout` if no address arrived in time, the station stays
    ///   `Connected`
    pub async fn connect(&self, options: &ConnectOptions) -> Result<()> {
        self.ensure_sta_on()?;
        if self.ap_state() == ApState::Running {
            warn!("A channel change will drop the soft access point stations");
        }

        let dtim = self.call(self.ncp.dtim().await, "dtim").ok();
        if let Err(err) = self.call(self.ncp.set_dtim(0).await, "set_dtim") {
            log_failure(err, "set_dtim");
        }

        let result = self.associate(options).await;

        if let Some(dtim) = dtim {
            if let Err(err) = self.call(self.ncp.set_dtim(dtim).await, "set_dtim") {
                log_failure(err, "set_dtim");
            }
        }
        result
    }

    async fn associate(&self, options: &ConnectOptions) -> Result<()> {
        let dhcp = self.config.dhcp.station_enabled();
        let mask = if options.wps {
            debug!("WPS enabled");
            CONNECT
        } else {
            CONNECT | REASON
        };

        self.events.clear(CONNECT | REASON | GOT_IP);
        self.with(|state| {
            state.expect_connect = true;
            state.expect_got_ip = dhcp;
        });
        if let Err(err) = self.call(self.ncp.connect(options).await, "connect") {
            log_failure(err, "connect");
            self.with(|state| {
                state.expect_connect = false;
                state.expect_got_ip = false;
            });
            return Err(err);
        }
        debug!("Connect request accepted");

        let timeout = Duration::from_millis(self.config.connect_timeout_ms.into());
        let bits = self.events.wait_any(mask, timeout).await;
        self.with(|state| state.expect_connect = false);

        if bits & CONNECT == 0 {
            self.with(|state| {
                state.sta = StaState::Disconnected;
                state.expect_got_ip = false;
            });
            self.events.clear(GOT_IP);
            if bits & REASON != 0 {
                error!("Connection to {} rejected", options.ssid.as_str());
                return Err(Error::Failed);
            }
            error!("Connection to {} timed out", options.ssid.as_str());
            if options.wps {
                // Resets the co-processor WPS state even though never connected
                if let Err(err) = self.call(self.ncp.disconnect(false).await, "disconnect") {
                    log_failure(err, "disconnect");
                }
            }
            return Err(Error::Timeout);
        }

        if dhcp {
            debug!("Waiting for DHCP");
            let timeout = Duration::from_millis(self.config.got_ip_timeout_ms.into());
            if self.events.wait_any(GOT_IP, timeout).await == 0 {
                self.with(|state| state.expect_got_ip = false);
                error!("No address from {}", options.ssid.as_str());
                return Err(Error::Timeout);
            }
        }
        info!("Connected to {}", options.ssid.as_str());
        Ok(())
    }

    /// Disconnect the station
    ///
    /// # Arguments
    ///
    /// * `restore` - Also clear the stored connection settings
    ///
    /// # Errors
    ///
    /// * `Error::Failed` unless the station is `Connected` or `GotIp`
    /// * `Error::Timeout` if the disconnect event did not arrive in time,
    ///   the state then follows that event whenever it comes
    pub async fn disconnect(&self, restore: bool) -> Result<()> {
        if !self.sta_state().is_connected() {
            error!("Station is not connected");
            return Err(Error::Failed);
        }

        self.events.clear(DISCONNECT);
        self.with(|state| state.expect_disconnect = true);
        let result = match self.call(self.ncp.disconnect(restore).await, "disconnect") {
            Ok(()) => {
                let timeout = Duration::from_millis(self.config.disconnect_timeout_ms.into());
                if self.events.wait_any(DISCONNECT, timeout).await == 0 {
                    error!("Disconnect timed out");
                    Err(Error::Timeout)
                } else {
                    info!("Station disconnected");
                    Ok(())
                }
            }
            Err(err) => Err(err),
        };
        self.with(|state| state.expect_disconnect = false);
        result
    }

    /// Scan for access points
    ///
    /// Results are cut to `options.max_results` when it is not 0. The
    /// application is told the number of results with `WifiEvent::ScanDone`.
    ///
    /// # Errors
    ///
    /// * `Error::Failed` if the station is off
    /// * `Error::Timeout` if the scan did not finish in time
    /// * Any translated request failure
    pub async fn scan(&self, options: &ScanOptions) -> Result<ScanResults> {
        self.ensure_sta_on()?;

        self.events.clear(SCAN_DONE);
        self.with(|state| state.expect_scan = true);
        if let Err(err) = self.call(self.ncp.start_scan(options).await, "start_scan") {
            self.with(|state| state.expect_scan = false);
            return Err(err);
        }
        let timeout = Duration::from_millis(self.config.scan_timeout_ms.into());
        if self.events.wait_any(SCAN_DONE, timeout).await == 0 {
            self.with(|state| state.expect_scan = false);
            error!("Scan timed out");
            return Err(Error::Timeout);
        }

        let mut results = self.call(self.ncp.scan_results().await, "scan_results")?;
        if options.max_results > 0 {
            results.truncate(usize::from(options.max_results));
        }
        if results.is_empty() {
            info!("No scan results");
        }
        for ap in &results {
            let [a, b, c, d, e, f] = ap.bssid;
            debug!(
                "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x} | channel {} | {:?} | RSSI {} | {}",
                a,
                b,
                c,
                d,
                e,
                f,
                ap.channel,
                ap.security,
                ap.rssi,
                ap.ssid.as_str()
            );
        }
        self.callbacks.wifi_event(WifiEvent::ScanDone(results.len()));
        Ok(results)
    }

    /// Details of the current association
    ///
    /// # Errors
    ///
    /// Returns `Error::Failed` unless the station is connected.
    pub async fn connect_info(&self) -> Result<ConnectInfo> {
        if !self.sta_state().is_connected() {
            return Err(Error::Failed);
        }
        self.call(self.ncp.connect_info().await, "connect_info")
            .inspect_err(|_| warn!("Connection information unavailable"))
    }

    pub async fn sta_ip(&self) -> Result<StaIpConfig> {
        self.call(self.ncp.sta_ip().await, "sta_ip")
    }

    /// Set a static station address
    pub async fn set_sta_ip(&self, config: &StaIpConfig) -> Result<()> {
        let [a, b, c, d] = config.ip.octets();
        debug!("Static address {}.{}.{}.{}", a, b, c, d);
        self.call(self.ncp.set_sta_ip(config).await, "set_sta_ip")
    }

    /// # Errors
    ///
    /// Returns `Error::Failed` while the station is off.
    pub async fn hostname(&self) -> Result<String<32>> {
        self.ensure_sta_on()?;
        self.call(self.ncp.hostname().await, "hostname")
    }

    /// # Errors
    ///
    /// Returns `Error::Failed` while the station is off or for a name
    /// longer than 32 bytes.
    pub async fn set_hostname(&self, name: &str) -> Result<()> {
        self.ensure_sta_on()?;
        if name.len() > 32 {
            error!("Host name too long");
            return Err(Error::Failed);
        }
        self.call(self.ncp.set_hostname(name).await, "set_hostname")
    }

    pub async fn sta_mac(&self) -> Result<MacAddress> {
        self.call(self.ncp.sta_mac().await, "sta_mac")
    }

    /// DTIM listen interval, 0 when power save is off
    pub async fn dtim(&self) -> Result<u32> {
        self.call(self.ncp.dtim().await, "dtim")
    }

    pub async fn set_dtim(&self, dtim: u32) -> Result<()> {
        self.call(self.ncp.set_dtim(dtim).await, "set_dtim")
    }

    /// DNS servers in use, configured or obtained through DHCP
    ///
    /// # Errors
    ///
    /// Returns the translated request failure. The co-processor only knows
    /// its servers once the station is connected.
    pub async fn dns(&self) -> Result<DnsConfig> {
        self.call(self.ncp.dns().await, "dns")
            .inspect_err(|_| error!("DNS servers unavailable, is the station connected?"))
    }

    pub async fn set_dns(&self, config: &DnsConfig) -> Result<()> {
        self.call(self.ncp.set_dns(config.manual, &config.servers).await, "set_dns")
    }

    pub async fn country_code(&self) -> Result<CountryCode> {
        self.call(self.ncp.country_code().await, "country_code")
    }

    /// # Errors
    ///
    /// Returns `Error::Failed` for a code that is empty or longer than
    /// 3 bytes, otherwise the translated request failure.
    pub async fn set_country_code(&self, adaptive: bool, code: &str) -> Result<()> {
        if code.is_empty() || code.len() > 3 {
            error!("Invalid country code");
            return Err(Error::Failed);
        }
        self.call(
            self.ncp.set_country_code(adaptive, code).await,
            "set_country_code",
        )
    }
}
