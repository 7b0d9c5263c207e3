#![deny(unsafe_code)]
//! Asynchronous co-processor events

use core::net::{Ipv4Addr, SocketAddrV4};

use crate::MacAddress;

/// Unsolicited notification from the co-processor
///
/// Connection ids index the co-processor's fixed pool of hardware
/// connection slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NcpEvent {
    /// `len` bytes are buffered on the co-processor for connection `id`
    SocketData {
        id: u8,
        len: u32,
        remote: SocketAddrV4,
    },
    /// Connection `id` is established
    SocketConnected(u8),
    /// Connection `id` was closed
    SocketDisconnected(u8),
    /// Station associated with the access point
    WifiConnected,
    /// Station obtained an IP address
    WifiGotIp,
    /// Station lost its association
    WifiDisconnected,
    /// Station association in progress
    WifiConnecting,
    /// Station association failed with a firmware reason code
    WifiReason(u32),
    /// Scan completed, results can be fetched
    WifiScanDone,
    /// A station joined the soft access point
    StationJoined(MacAddress),
    /// A station left the soft access point
    StationLeft(MacAddress),
    /// The soft access point leased an address to a station
    StationIp { mac: MacAddress, ip: Ipv4Addr },
    /// MQTT event, forwarded untouched
    Mqtt(u16),
    /// BLE event, forwarded untouched
    Ble(u16),
}
