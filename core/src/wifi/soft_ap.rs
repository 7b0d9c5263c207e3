#![deny(unsafe_code)]
//! Soft access point operations

use core::net::Ipv4Addr;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_time::Duration;
use ncp_hal::wifi::{ApConfig, ConnectedStations, DhcpMode, DhcpServerConfig};
use ncp_hal::{MacAddress, NcpWifi};

use super::{ApState, Wifi, STATION_LEFT};
use crate::config::WifiConfig;
use crate::error::{log_failure, Error, Result};

/// Lease times the soft access point DHCP server accepts, in minutes
const LEASE_TIME_MIN: core::ops::RangeInclusive<u32> = 1..=2880;

impl<N, M> Wifi<'_, N, M>
where
    N: NcpWifi,
    M: RawMutex,
{
    /// Start the soft access point next to the station
    ///
    /// When the station is connected its subnet is checked first. If
    /// activation fails the manager falls back to station only.
    ///
    /// # Errors
    ///
    /// Returns the translated failure of dual mode setup or activation.
    pub async fn start_ap(&self, config: &ApConfig) -> Result<()> {
        if self.sta_state().is_connected() {
            if let Err(err) = self.check_subnet().await {
                error!("Subnet check failed: {}", err);
            }
        }

        self.call(self.ncp.set_dual_mode().await, "set_dual_mode")
            .inspect_err(|err| log_failure(*err, "set_dual_mode"))?;
        if let Err(err) = self.call(self.ncp.activate_ap(config).await, "activate_ap") {
            warn!("Soft access point failed to start, back to station only");
            if self.stop_ap().await.is_err() {
                warn!("Station only fallback failed");
            }
            return Err(err);
        }
        self.with(|state| state.ap = ApState::Running);
        info!(
            "Soft access point {} started on channel {}",
            config.ssid.as_str(),
            config.channel
        );
        Ok(())
    }

    /// Stop the soft access point
    ///
    /// Connected stations are kicked first, then the station interface is
    /// allowed to reconnect.
    ///
    /// # Errors
    ///
    /// Returns the translated failure of a kick or of the deactivation.
    pub async fn stop_ap(&self) -> Result<()> {
        if let Ok(stations) = self.call(self.ncp.connected_stations().await, "connected_stations") {
            if !stations.is_empty() {
                warn!("Disconnecting {} stations before stopping", stations.len());
            }
            for station in &stations {
                self.call(
                    self.ncp.disconnect_station(station.mac).await,
                    "disconnect_station",
                )
                .inspect_err(|_| error!("Failed to disconnect station"))?;
            }
        }
        self.call(self.ncp.deactivate_ap(true).await, "deactivate_ap")
            .inspect_err(|err| log_failure(*err, "deactivate_ap"))?;
        self.with(|state| state.ap = ApState::Off);
        info!("Soft access point stopped");
        Ok(())
    }

    /// Kick one station off the soft access point
    ///
    /// Waits for the matching station-left event.
    ///
    /// # Errors
    ///
    /// Returns `Error::Timeout` if the station did not leave in time,
    /// otherwise the translated request failure.
    pub async fn disconnect_station(&self, mac: MacAddress) -> Result<()> {
        self.events.clear(STATION_LEFT);
        self.with(|state| state.expect_station_left = Some(mac));
        let result = match self.call(self.ncp.disconnect_station(mac).await, "disconnect_station") {
            Ok(()) => {
                let timeout =
                    Duration::from_millis(self.config.station_disconnect_timeout_ms.into());
                if self.events.wait_any(STATION_LEFT, timeout).await == 0 {
                    error!("Station disconnect timed out");
                    Err(Error::Timeout)
                } else {
                    debug!("Station disconnected");
                    Ok(())
                }
            }
            Err(err) => Err(err),
        };
        self.with(|state| state.expect_station_left = None);
        result
    }

    /// Soft access point address and netmask
    pub async fn ap_ip(&self) -> Result<(Ipv4Addr, Ipv4Addr)> {
        self.call(self.ncp.ap_ip().await, "ap_ip")
    }

    pub async fn connected_stations(&self) -> Result<ConnectedStations> {
        self.call(self.ncp.connected_stations().await, "connected_stations")
    }

    /// Configuration of the running soft access point
    ///
    /// # Errors
    ///
    /// Returns `Error::Failed` unless the soft access point is running.
    pub async fn ap_config(&self) -> Result<ApConfig> {
        if self.ap_state() != ApState::Running {
            error!("Soft access point is not started");
            return Err(Error::Failed);
        }
        self.call(self.ncp.ap_config().await, "ap_config")
    }

    pub async fn ap_mac(&self) -> Result<MacAddress> {
        self.call(self.ncp.ap_mac().await, "ap_mac")
    }

    /// Interfaces running a DHCP client or server
    pub async fn dhcp(&self) -> Result<DhcpMode> {
        self.call(self.ncp.dhcp().await, "dhcp")
    }

    /// Lease time and address pool of the soft access point DHCP server
    pub async fn dhcp_server(&self) -> Result<DhcpServerConfig> {
        self.call(self.ncp.dhcp_server().await, "dhcp_server")
    }

    /// Enable or disable DHCP on the interfaces in `mode`
    ///
    /// Enabling the soft access point server also applies
    /// `lease_time_min`. The server only takes a new lease time while the
    /// access point is down, so a running one is stopped and restarted
    /// around it.
    ///
    /// # Errors
    ///
    /// Returns `Error::Failed` for a lease time outside 1..=2880 minutes,
    /// otherwise the translated failure of the first rejected request.
    pub async fn set_dhcp(
        &self,
        mode: DhcpMode,
        enable: bool,
        lease_time_min: u32,
    ) -> Result<()> {
        let serve = enable && mode.soft_ap_enabled();
        if serve && !LEASE_TIME_MIN.contains(&lease_time_min) {
            error!("Lease time {} outside 1..=2880 minutes", lease_time_min);
            return Err(Error::Failed);
        }
        self.call(self.ncp.set_dhcp(mode, enable).await, "set_dhcp")?;
        if !serve {
            return Ok(());
        }

        let running = self.ap_state() == ApState::Running;
        if running {
            self.call(self.ncp.deactivate_ap(true).await, "deactivate_ap")?;
        }
        self.call(
            self.ncp.set_dhcp_server_lease(lease_time_min).await,
            "set_dhcp_server_lease",
        )
        .inspect_err(|_| error!("DHCP server configuration failed"))?;
        if running {
            self.call(self.ncp.set_dual_mode().await, "set_dual_mode")
                .inspect_err(|_| error!("Soft access point failed to restart"))?;
        }
        Ok(())
    }

    /// Move the soft access point off the station subnet
    ///
    /// The co-processor cannot route when the station gateway is the soft
    /// access point address. A running access point is stopped, moved to
    /// the backup subnet and restarted.
    pub(super) async fn check_subnet(&self) -> Result<()> {
        let sta = self.call(self.ncp.sta_ip().await, "sta_ip")?;
        let (ap_ip, netmask) = self.call(self.ncp.ap_ip().await, "ap_ip")?;
        if sta.gateway != ap_ip {
            return Ok(());
        }

        let [a, b, c, d] = ap_ip.octets();
        warn!(
            "Station gateway {}.{}.{}.{} is the soft access point address, moving it",
            a, b, c, d
        );
        let running = self.ap_state() == ApState::Running;
        if running {
            self.call(self.ncp.deactivate_ap(false).await, "deactivate_ap")?;
        }
        let backup = WifiConfig::ap_address(self.config.ap_backup_subnet);
        self.call(self.ncp.set_ap_ip(backup, netmask).await, "set_ap_ip")?;
        if running {
            self.call(self.ncp.set_dual_mode().await, "set_dual_mode")?;
        }
        Ok(())
    }
}
