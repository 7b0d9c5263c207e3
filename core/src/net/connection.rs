#![deny(unsafe_code)]
//! Connection table entries
//!
//! One entry per co-processor connection slot. `owner` is the ownership
//! map between slots and sockets: a slot is claimed by at most one socket
//! and a live slot without owner is waiting to be accepted.

use core::net::{Ipv4Addr, SocketAddrV4};

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::signal::Signal;

use super::socket::SocketHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Connection {
    pub connected: bool,
    pub remote: SocketAddrV4,
    /// Bytes announced by the co-processor and not pulled yet
    pub available: u32,
    pub owner: Option<SocketHandle>,
    /// Given up by the host, ignored by accept until the co-processor
    /// reports it closed
    pub abandoned: bool,
}

impl Default for Connection {
    fn default() -> Self {
        Self {
            connected: false,
            remote: SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0),
            available: 0,
            owner: None,
            abandoned: false,
        }
    }
}

impl Connection {
    /// Can be claimed by an outgoing connection
    pub(crate) fn is_free(&self) -> bool {
        !self.connected && self.owner.is_none()
    }

    /// Live and waiting for accept
    pub(crate) fn is_pending(&self) -> bool {
        self.connected && self.owner.is_none() && !self.abandoned
    }
}

/// Wake-up channels of one connection slot
pub(crate) struct ConnectionSignals<M: RawMutex> {
    /// Binary "data available" semaphore
    pub data: Signal<M, ()>,
    /// Raised on every connected/disconnected event
    pub state: Signal<M, ()>,
}

impl<M: RawMutex> ConnectionSignals<M> {
    pub(crate) fn new() -> Self {
        Self {
            data: Signal::new(),
            state: Signal::new(),
        }
    }

    pub(crate) fn reset(&self) {
        self.data.reset();
        self.state.reset();
    }
}
