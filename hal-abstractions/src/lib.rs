//! Network co-processor abstraction traits
//!
//! This crate defines the RPC surface of the network co-processor (NCP)
//! as seen by the host driver. The AT-command transport implements these
//! traits; `ncp-core` consumes them.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  NcpNet / NcpWifi / NcpFs   ┌──────────────┐
//! │   ncp-core   │ ──────────────────────────► │ AT transport │
//! │              │ ◄────────────────────────── │  (SPI link)  │
//! └──────────────┘          NcpEvent           └──────────────┘
//! ```
//!
//! Requests are awaited one at a time by the caller. Events are delivered
//! by a dedicated event task, which hands each [`NcpEvent`] to the driver.

#![no_std]
#![deny(unsafe_code)]
#![deny(warnings)]

pub mod error;
pub mod event;
pub mod fs;
pub mod net;
pub mod wifi;

pub use error::{NcpError, NcpResult};
pub use event::NcpEvent;
pub use fs::NcpFs;
pub use net::NcpNet;
pub use wifi::NcpWifi;

/// Everything the driver needs from the co-processor
///
/// Blanket-implemented for any type providing the three feature traits.
pub trait Ncp: NcpNet + NcpWifi + NcpFs {}

impl<T: NcpNet + NcpWifi + NcpFs> Ncp for T {}

/// 48-bit hardware address
pub type MacAddress = [u8; 6];
