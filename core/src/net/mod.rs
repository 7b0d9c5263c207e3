#![deny(unsafe_code)]
//! Socket and connection manager
//!
//! Maps application socket descriptors onto the co-processor's fixed pool
//! of connection slots.
//!
//! # Architecture
//!
//! ```text
//! Socket table (MAX_SOCKETS)         Connection table (MAX_CONNECTIONS)
//! ┌───────────────────────┐          ┌────────────────────────────────┐
//! │ status, options, TLS  │──owns──► │ connected, remote, available,  │
//! │ connection: Some(id)  │ ◄─owner─ │ owner: Some(socket)            │
//! └───────────────────────┘          └────────────────────────────────┘
//!                                      ▲ SocketData / Connected /
//!                                      │ Disconnected events
//! ```
//!
//! Both tables and the credential store sit behind one blocking mutex that
//! is never held across an `.await`. Each connection slot has a data
//! signal (a binary semaphore paired with the `available` byte counter)
//! and a state signal raised on connect and disconnect events.
//!
//! A socket descriptor must be driven by one task at a time. Operations
//! on different descriptors may run concurrently.
//!
//! # Example
//!
//! ```ignore
//! let sock = net.socket(AddressFamily::Inet, SocketType::Stream, IpProtocol::Tcp)?;
//! net.connect(sock, SocketAddrV4::new(Ipv4Addr::new(203, 0, 113, 5), 7)).await?;
//! net.send(sock, b"PING").await?;
//! let n = net.recv(sock, &mut buf).await?;
//! net.close(sock).await?;
//! ```

mod connection;
mod io;
mod lifecycle;
mod options;
mod pull;
mod sntp;
pub mod socket;
mod stream;
mod tls;

use core::cell::RefCell;
use core::net::{Ipv4Addr, SocketAddrV4};

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::signal::Signal;
use ncp_hal::net::{ConnectionKind, PingOptions, PingStats, SocketInfo};
use ncp_hal::{NcpEvent, NcpFs, NcpNet, NcpResult};

use crate::callbacks::{AppCallbacks, NetEvent};
use crate::config::{NetConfig, MAX_CONNECTIONS, MAX_SOCKETS};
use crate::credentials::CredentialStore;
use crate::error::{self, log_failure, Error, Result};

use connection::{Connection, ConnectionSignals};
use socket::Socket;

pub use options::{OptionName, SocketOption};
pub use sntp::MIN_SNTP_INTERVAL_S;
pub use socket::{AddressFamily, IpProtocol, SocketHandle, SocketStatus, SocketType};
pub use stream::NetStream;

/// Shared bookkeeping, guarded by [`Net::tables`]
pub(crate) struct Tables {
    ready: bool,
    sockets: [Socket; MAX_SOCKETS],
    connections: [Connection; MAX_CONNECTIONS],
    credentials: CredentialStore,
    /// Rotating allocation cursor
    next_socket: usize,
}

impl Tables {
    fn new(config: &NetConfig) -> Self {
        Self {
            ready: false,
            sockets: core::array::from_fn(|_| Socket::reset(config)),
            connections: [Connection::default(); MAX_CONNECTIONS],
            credentials: CredentialStore::new(),
            next_socket: 0,
        }
    }

    fn socket(&self, sock: SocketHandle) -> Result<&Socket> {
        self.sockets.get(sock.raw()).ok_or(Error::Failed)
    }

    fn socket_mut(&mut self, sock: SocketHandle) -> Result<&mut Socket> {
        self.sockets.get_mut(sock.raw()).ok_or(Error::Failed)
    }

    fn connection(&self, id: u8) -> Option<&Connection> {
        self.connections.get(usize::from(id))
    }

    fn connection_mut(&mut self, id: u8) -> Option<&mut Connection> {
        self.connections.get_mut(usize::from(id))
    }

    /// Take the first `Reset` socket at or after the rotation cursor
    fn allocate(&mut self, kind: ConnectionKind, config: &NetConfig) -> Result<SocketHandle> {
        if !self.ready {
            return Err(Error::Failed);
        }
        for offset in 0..MAX_SOCKETS {
            let index = (self.next_socket + offset) % MAX_SOCKETS;
            if self.sockets[index].status == SocketStatus::Reset {
                self.sockets[index] = Socket::allocated(kind, config);
                self.next_socket = (index + 1) % MAX_SOCKETS;
                return Ok(SocketHandle::from_raw(index));
            }
        }
        Err(Error::Failed)
    }

    /// Claim an idle connection slot for `owner`
    fn claim_free_connection(&mut self, owner: SocketHandle) -> Option<u8> {
        let (id, conn) = self
            .connections
            .iter_mut()
            .enumerate()
            .find(|(_, conn)| conn.is_free())?;
        conn.owner = Some(owner);
        conn.abandoned = false;
        u8::try_from(id).ok()
    }

    /// Return a socket to `Reset`, dropping its TLS material
    fn reset_socket(&mut self, sock: SocketHandle, config: &NetConfig) {
        if let Ok(socket) = self.socket_mut(sock) {
            *socket = Socket::reset(config);
        }
    }
}

/// Socket manager bound to one co-processor
pub struct Net<'d, N, M: RawMutex> {
    ncp: &'d N,
    callbacks: &'d dyn AppCallbacks,
    config: NetConfig,
    tables: Mutex<M, RefCell<Tables>>,
    signals: [ConnectionSignals<M>; MAX_CONNECTIONS],
    /// Raised when a slot goes live or a socket changes state
    accept_ready: Signal<M, ()>,
    /// Raised on every data event, wakes unconnected UDP receivers
    data_arrived: Signal<M, ()>,
}

impl<'d, N, M> Net<'d, N, M>
where
    N: NcpNet + NcpFs,
    M: RawMutex,
{
    /// Create an uninitialized manager
    ///
    /// No socket can be allocated before [`Net::init`] succeeds.
    pub fn new(ncp: &'d N, callbacks: &'d dyn AppCallbacks, config: NetConfig) -> Self {
        Self {
            ncp,
            callbacks,
            tables: Mutex::new(RefCell::new(Tables::new(&config))),
            config,
            signals: core::array::from_fn(|_| ConnectionSignals::new()),
            accept_ready: Signal::new(),
            data_arrived: Signal::new(),
        }
    }

    /// Reset every table and configure the co-processor receive buffers
    ///
    /// # Errors
    ///
    /// Returns the translated failure of the first rejected request.
    pub async fn init(&self) -> Result<()> {
        self.clear();
        let size = self.config.recv_buffer_size;
        for id in 0..MAX_CONNECTIONS as u8 {
            self.call(self.ncp.set_receive_buffer_len(id, size).await, "set_receive_buffer_len")
                .inspect_err(|err| log_failure(*err, "set_receive_buffer_len"))?;
            let actual = self
                .call(self.ncp.receive_buffer_len(id).await, "receive_buffer_len")
                .inspect_err(|err| log_failure(*err, "receive_buffer_len"))?;
            if actual != size {
                warn!(
                    "Connection {}: receive buffer is {} bytes instead of {}",
                    id, actual, size
                );
            }
        }
        self.with(|tables| tables.ready = true);
        info!("Net initialized, {} sockets", MAX_SOCKETS);
        Ok(())
    }

    /// Drop every socket, connection and credential
    pub fn deinit(&self) {
        self.clear();
        info!("Net deinitialized");
    }

    fn clear(&self) {
        self.with(|tables| *tables = Tables::new(&self.config));
        self.signals.iter().for_each(ConnectionSignals::reset);
        self.accept_ready.reset();
        self.data_arrived.reset();
    }

    /// Current lifecycle state of `sock`
    ///
    /// # Errors
    ///
    /// Returns `Error::Failed` for an out-of-range handle.
    pub fn status(&self, sock: SocketHandle) -> Result<SocketStatus> {
        self.with(|tables| tables.socket(sock).map(|socket| socket.status))
    }

    /// Apply a socket event from the co-processor
    ///
    /// Must be called from the event-delivery task for every
    /// `SocketData`, `SocketConnected` and `SocketDisconnected` event.
    pub fn handle_event(&self, event: NcpEvent) {
        match event {
            NcpEvent::SocketData { id, len, remote } => self.on_data(id, len, remote),
            NcpEvent::SocketConnected(id) => self.on_link(id, true),
            NcpEvent::SocketDisconnected(id) => self.on_link(id, false),
            _ => {}
        }
    }

    fn on_data(&self, id: u8, len: u32, remote: SocketAddrV4) {
        let known = self.with(|tables| match tables.connection_mut(id) {
            Some(conn) => {
                conn.available = conn.available.saturating_add(len);
                conn.remote = remote;
                true
            }
            None => false,
        });
        if !known {
            warn!("Data event for unknown connection {}", id);
            return;
        }
        trace!("Connection {}: {} bytes available", id, len);
        self.signals[usize::from(id)].data.signal(());
        self.data_arrived.signal(());
        self.callbacks
            .net_event(NetEvent::DataAvailable { id, len, remote });
    }

    fn on_link(&self, id: u8, connected: bool) {
        let known = self.with(|tables| match tables.connection_mut(id) {
            Some(conn) => {
                conn.connected = connected;
                if !connected {
                    conn.abandoned = false;
                }
                true
            }
            None => false,
        });
        if !known {
            warn!("Link event for unknown connection {}", id);
            return;
        }
        let signals = &self.signals[usize::from(id)];
        signals.state.signal(());
        if connected {
            debug!("Connection {} up", id);
            self.accept_ready.signal(());
            self.callbacks.net_event(NetEvent::Connected(id));
        } else {
            debug!("Connection {} down", id);
            // Wake a reader blocked on a connection that will not deliver
            signals.data.signal(());
            self.callbacks.net_event(NetEvent::Disconnected(id));
        }
    }

    /// Ping `host` from the co-processor
    ///
    /// # Errors
    ///
    /// Returns `Error::Failed` before [`Net::init`], otherwise the
    /// translated request failure.
    pub async fn ping(&self, host: &str, options: &PingOptions) -> Result<PingStats> {
        self.ensure_ready()?;
        let stats = self.call(self.ncp.ping(host, options).await, "ping")?;
        info!(
            "Ping {}: {} received, {} lost, average {} ms",
            host, stats.received, stats.lost, stats.average_ms
        );
        Ok(stats)
    }

    /// Resolve `host` to an IPv4 address
    ///
    /// # Errors
    ///
    /// Returns `Error::Failed` before [`Net::init`], otherwise the
    /// translated request failure.
    pub async fn resolve(&self, host: &str) -> Result<Ipv4Addr> {
        self.ensure_ready()?;
        self.call(self.ncp.resolve(host).await, "resolve")
    }

    /// Co-processor view of connection slot `id`
    ///
    /// # Errors
    ///
    /// Returns `Error::Failed` for an out-of-range slot.
    pub async fn connection_status(&self, id: u8) -> Result<SocketInfo> {
        if usize::from(id) >= MAX_CONNECTIONS {
            return Err(Error::Failed);
        }
        self.call(self.ncp.socket_info(id).await, "socket_info")
    }

    fn ensure_ready(&self) -> Result<()> {
        if self.with(|tables| tables.ready) {
            Ok(())
        } else {
            Err(Error::Failed)
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut Tables) -> R) -> R {
        self.tables.lock(|tables| f(&mut tables.borrow_mut()))
    }

    fn call<T>(&self, result: NcpResult<T>, operation: &'static str) -> Result<T> {
        error::translate(self.callbacks, result, operation)
    }

    fn is_connected(&self, id: u8) -> bool {
        self.with(|tables| tables.connection(id).is_some_and(|conn| conn.connected))
    }
}
