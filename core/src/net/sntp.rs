#![deny(unsafe_code)]
//! SNTP client of the co-processor

use embassy_sync::blocking_mutex::raw::RawMutex;
use ncp_hal::net::{SntpConfig, SntpTime};
use ncp_hal::{NcpFs, NcpNet};

use super::Net;
use crate::error::{Error, Result};

/// Shortest synchronization interval the co-processor accepts, in seconds
pub const MIN_SNTP_INTERVAL_S: u16 = 15;

/// Whole hours in -12..=14, or `HHmm` with a non-zero `HH` in that range
fn timezone_valid(timezone: i16) -> bool {
    const HOURS: core::ops::RangeInclusive<i16> = -12..=14;
    if HOURS.contains(&timezone) {
        return true;
    }
    let hours = timezone / 100;
    hours != 0 && HOURS.contains(&hours) && (timezone % 100).abs() < 60
}

impl<N, M> Net<'_, N, M>
where
    N: NcpNet + NcpFs,
    M: RawMutex,
{
    pub async fn sntp_config(&self) -> Result<SntpConfig> {
        self.ensure_ready()?;
        self.call(self.ncp.sntp_config().await, "sntp_config")
    }

    /// Enable or disable the SNTP client
    ///
    /// # Errors
    ///
    /// Returns `Error::Failed` before [`Net::init`], without any server
    /// or for an out-of-range timezone.
    pub async fn set_sntp_config(&self, config: &SntpConfig) -> Result<()> {
        self.ensure_ready()?;
        if config.servers.is_empty() {
            error!("At least one SNTP server is required");
            return Err(Error::Failed);
        }
        if !timezone_valid(config.timezone) {
            error!("Invalid timezone {}", config.timezone);
            return Err(Error::Failed);
        }
        self.call(self.ncp.set_sntp_config(config).await, "set_sntp_config")?;
        debug!(
            "SNTP {} with {} servers",
            if config.enabled { "enabled" } else { "disabled" },
            config.servers.len()
        );
        Ok(())
    }

    /// Current date and time kept by the SNTP client
    pub async fn time(&self) -> Result<SntpTime> {
        self.ensure_ready()?;
        self.call(self.ncp.sntp_time().await, "sntp_time")
    }

    /// Synchronization interval in seconds
    pub async fn sntp_interval(&self) -> Result<u16> {
        self.ensure_ready()?;
        self.call(self.ncp.sntp_interval().await, "sntp_interval")
    }

    /// # Errors
    ///
    /// Returns `Error::Failed` before [`Net::init`] or below
    /// [`MIN_SNTP_INTERVAL_S`].
    pub async fn set_sntp_interval(&self, seconds: u16) -> Result<()> {
        self.ensure_ready()?;
        if seconds < MIN_SNTP_INTERVAL_S {
            error!("SNTP interval {} s is below {} s", seconds, MIN_SNTP_INTERVAL_S);
            return Err(Error::Failed);
        }
        self.call(self.ncp.set_sntp_interval(seconds).await, "set_sntp_interval")
    }
}
