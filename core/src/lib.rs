//! Host-side driver for an ST67W6X network co-processor
//!
//! The co-processor runs the Wi-Fi stack and the TCP/IP stack. This crate
//! keeps the host view of it consistent: a BSD-style socket layer mapped
//! onto the co-processor's connection slots, the station and soft access
//! point state machines, and the TLS credential store. Requests go through
//! the [`ncp_hal`] traits; events come back through
//! [`Driver::handle_event`].
//!
//! It has NO hardware dependencies.
//!
//! # Example
//!
//! ```ignore
//! static CALLBACKS: NoCallbacks = NoCallbacks;
//!
//! let driver: Driver<'_, _, CriticalSectionRawMutex> =
//!     Driver::new(&transport, &CALLBACKS, Config::default());
//! driver.init().await?;
//! driver.wifi.connect(&options).await?;
//!
//! let sock = driver.net.socket(AddressFamily::Inet, SocketType::Stream, IpProtocol::Tcp)?;
//! driver.net.connect(sock, broker).await?;
//! ```

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]
#![deny(warnings)]

// Must come first so the logging macros are visible to every module
#[macro_use]
mod fmt;

pub mod callbacks;
pub mod config;
pub mod credentials;
mod driver;
pub mod error;
mod event_group;
pub mod net;
pub mod wifi;

#[cfg(test)]
mod test_helper;

pub use callbacks::{AppCallbacks, NetEvent, NoCallbacks, WifiEvent};
pub use config::Config;
pub use driver::Driver;
pub use error::{Error, Result};
pub use net::Net;
pub use wifi::Wifi;

pub use ncp_hal;
