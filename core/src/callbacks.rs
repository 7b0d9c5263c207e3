#![deny(unsafe_code)]
//! Application callback interface
//!
//! The application registers one [`AppCallbacks`] implementation when the
//! driver is created. Callbacks run on the event-delivery task and must
//! not block.

use core::net::{Ipv4Addr, SocketAddrV4};

use ncp_hal::MacAddress;

use crate::error::Error;
use crate::wifi::DisconnectReason;

/// Wi-Fi notifications forwarded to the application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiEvent {
    Connected,
    GotIp,
    Disconnected,
    Connecting,
    /// Association failure reported by the firmware
    Reason(DisconnectReason),
    /// Scan finished with this many results
    ScanDone(usize),
    StationJoined(MacAddress),
    StationLeft(MacAddress),
    StationIp { mac: MacAddress, ip: Ipv4Addr },
}

/// Socket notifications forwarded to the application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetEvent {
    /// Data is buffered on connection slot `id`
    DataAvailable {
        id: u8,
        len: u32,
        remote: SocketAddrV4,
    },
    Connected(u8),
    Disconnected(u8),
}

/// Per-feature application hooks
///
/// Every method has an empty default, implement only what is needed.
pub trait AppCallbacks {
    fn wifi_event(&self, _event: WifiEvent) {}

    fn net_event(&self, _event: NetEvent) {}

    fn mqtt_event(&self, _id: u16) {}

    fn ble_event(&self, _id: u16) {}

    /// Called whenever a co-processor request fails
    ///
    /// Diagnostic only, the failure is still returned to the caller.
    fn error(&self, _status: Error, _operation: &'static str) {}
}

/// Callbacks that ignore every event
pub struct NoCallbacks;

impl AppCallbacks for NoCallbacks {}
