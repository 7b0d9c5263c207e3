#![deny(unsafe_code)]
//! Target wake time power save of the station
//!
//! An agreement is negotiated with [`Wifi::setup_twt`], entered with
//! [`Wifi::set_twt`] and ended with [`Wifi::teardown_twt`]. Only access
//! points supporting Wi-Fi 6 accept one.

use embassy_sync::blocking_mutex::raw::RawMutex;
use ncp_hal::wifi::{TwtSetup, TwtTeardown};
use ncp_hal::NcpWifi;

use super::Wifi;
use crate::error::{Error, Result};

impl<N, M> Wifi<'_, N, M>
where
    N: NcpWifi,
    M: RawMutex,
{
    /// Negotiate a target wake time agreement with the access point
    ///
    /// # Errors
    ///
    /// Returns `Error::Failed` unless the station is connected, otherwise
    /// the translated request failure.
    pub async fn setup_twt(&self, params: &TwtSetup) -> Result<()> {
        if !self.sta_state().is_connected() {
            error!("Target wake time needs a connected station");
            return Err(Error::Failed);
        }
        self.call(self.ncp.setup_twt(params).await, "setup_twt")?;
        debug!(
            "Target wake time requested, interval {} * 2^{} us",
            params.wake_interval_mantissa, params.wake_interval_exponent
        );
        Ok(())
    }

    pub async fn set_twt(&self) -> Result<()> {
        self.call(self.ncp.set_twt().await, "set_twt")
    }

    pub async fn teardown_twt(&self, flows: TwtTeardown) -> Result<()> {
        self.call(self.ncp.teardown_twt(flows).await, "teardown_twt")
    }
}
