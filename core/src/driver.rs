#![deny(unsafe_code)]
//! Top-level driver object
//!
//! Binds the socket and Wi-Fi managers to one co-processor, one set of
//! application callbacks and one configuration. The application owns the
//! driver and hands every co-processor event to [`Driver::handle_event`]
//! from a single event-delivery task.

use embassy_sync::blocking_mutex::raw::RawMutex;
use ncp_hal::{Ncp, NcpEvent};

use crate::callbacks::AppCallbacks;
use crate::config::Config;
use crate::error::Result;
use crate::net::Net;
use crate::wifi::Wifi;

pub struct Driver<'d, N, M: RawMutex> {
    pub net: Net<'d, N, M>,
    pub wifi: Wifi<'d, N, M>,
    callbacks: &'d dyn AppCallbacks,
}

impl<'d, N, M> Driver<'d, N, M>
where
    N: Ncp,
    M: RawMutex,
{
    pub fn new(ncp: &'d N, callbacks: &'d dyn AppCallbacks, config: Config) -> Self {
        Self {
            net: Net::new(ncp, callbacks, config.net),
            wifi: Wifi::new(ncp, callbacks, config.wifi),
            callbacks,
        }
    }

    /// Initialize Wi-Fi, then the socket manager
    ///
    /// # Errors
    ///
    /// Returns the first failure, the socket manager is not initialized
    /// when Wi-Fi fails.
    pub async fn init(&self) -> Result<()> {
        self.wifi.init().await?;
        self.net.init().await?;
        info!("Driver ready");
        Ok(())
    }

    pub fn deinit(&self) {
        self.net.deinit();
        self.wifi.deinit();
    }

    /// Route one co-processor event to its manager
    pub async fn handle_event(&self, event: NcpEvent) {
        match event {
            NcpEvent::SocketData { .. }
            | NcpEvent::SocketConnected(_)
            | NcpEvent::SocketDisconnected(_) => self.net.handle_event(event),
            NcpEvent::Mqtt(id) => self.callbacks.mqtt_event(id),
            NcpEvent::Ble(id) => self.callbacks.ble_event(id),
            _ => self.wifi.handle_event(event).await,
        }
    }
}
