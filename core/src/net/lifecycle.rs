#![deny(unsafe_code)]
//! Socket lifecycle: allocation, binding, connection setup and teardown

use core::net::SocketAddrV4;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_time::{with_timeout, Duration, Timer};
use heapless::Vec;
use ncp_hal::net::{ClientConnection, ConnectionKind, TcpOptions};
use ncp_hal::{NcpFs, NcpNet};

use super::socket::{
    AddressFamily, IpProtocol, SocketHandle, SocketOptions, SocketStatus, SocketType, TlsParams,
};
use super::Net;
use crate::config::{MAX_CONNECTIONS, MAX_SOCKETS};
use crate::error::{log_failure, Error, Result};

impl<N, M> Net<'_, N, M>
where
    N: NcpNet + NcpFs,
    M: RawMutex,
{
    /// Allocate a socket descriptor
    ///
    /// Slots are handed out round-robin so a descriptor that was just
    /// closed is reused last, leaving the co-processor time to release its
    /// connection.
    ///
    /// # Arguments
    ///
    /// * `family` - Only `Inet` is supported
    /// * `ty`, `proto` - `Stream`/`Tcp`, `Datagram`/`Udp` or `Stream`/`Tls12`
    ///
    /// # Errors
    ///
    /// * `Error::NotSupported` for IPv6
    /// * `Error::Failed` for other combinations or when every slot is in use
    pub fn socket(
        &self,
        family: AddressFamily,
        ty: SocketType,
        proto: IpProtocol,
    ) -> Result<SocketHandle> {
        if family != AddressFamily::Inet {
            error!("Address family {:?} not supported", family);
            return Err(Error::NotSupported);
        }
        let kind = match (ty, proto) {
            (SocketType::Stream, IpProtocol::Tcp) => ConnectionKind::Tcp,
            (SocketType::Datagram, IpProtocol::Udp) => ConnectionKind::Udp,
            (SocketType::Stream, IpProtocol::Tls12) => ConnectionKind::Ssl,
            _ => {
                error!("Unsupported socket type {:?} / {:?}", ty, proto);
                return Err(Error::Failed);
            }
        };
        let sock = self
            .with(|tables| tables.allocate(kind, &self.config))
            .inspect_err(|_| error!("No free socket"))?;
        debug!("Socket {} allocated", sock.raw());
        Ok(sock)
    }

    /// Bind an allocated socket to a local port, making it a server
    ///
    /// # Errors
    ///
    /// Returns `Error::Failed` unless the socket is `Allocated`.
    pub fn bind(&self, sock: SocketHandle, local: SocketAddrV4) -> Result<()> {
        self.with(|tables| {
            let socket = tables.socket_mut(sock)?;
            if socket.status != SocketStatus::Allocated {
                error!("Socket {} cannot be bound in {:?}", sock.raw(), socket.status);
                return Err(Error::Failed);
            }
            socket.local_port = local.port();
            socket.listener = true;
            socket.status = SocketStatus::Bound;
            Ok(())
        })
    }

    /// Open a client connection
    ///
    /// Claims a free connection slot, pushes TLS and TCP settings, starts
    /// the connection and waits for the co-processor to confirm it.
    ///
    /// # Errors
    ///
    /// * `Error::Failed` if the socket is not `Allocated` or no slot is free
    /// * `Error::Timeout` if the connection is not confirmed in time
    /// * Any translated request failure
    ///
    /// On failure the slot is released and the socket stays `Allocated`.
    pub async fn connect(&self, sock: SocketHandle, remote: SocketAddrV4) -> Result<()> {
        let (id, kind, options, tls) = self.with(|tables| {
            let socket = tables.socket(sock)?;
            if socket.status != SocketStatus::Allocated {
                error!("Socket {} cannot connect in {:?}", sock.raw(), socket.status);
                return Err(Error::Failed);
            }
            let (kind, options, tls) = (socket.kind, socket.options, socket.tls.clone());
            let id = tables.claim_free_connection(sock).ok_or_else(|| {
                error!("No free connection for socket {}", sock.raw());
                Error::Failed
            })?;
            let socket = tables.socket_mut(sock)?;
            socket.connection = Some(id);
            socket.client = true;
            Ok((id, kind, options, tls))
        })?;

        let signals = &self.signals[usize::from(id)];
        signals.state.reset();
        if let Err(err) = self.open_connection(id, kind, remote, &options, &tls).await {
            log_failure(err, "connect");
            self.release_claim(sock, id);
            return Err(err);
        }

        let confirmed = with_timeout(
            Duration::from_millis(self.config.connect_confirm_timeout_ms.into()),
            async {
                while !self.is_connected(id) {
                    signals.state.wait().await;
                }
            },
        )
        .await;
        if confirmed.is_err() {
            error!("Connection {} not confirmed", id);
            if let Err(err) =
                self.call(self.ncp.stop_client_connection(id).await, "stop_client_connection")
            {
                log_failure(err, "stop_client_connection");
            }
            // A late connect event must not surface the slot to accept
            self.abandon(id);
            self.release_claim(sock, id);
            return Err(Error::Timeout);
        }

        self.with(|tables| {
            if let Some(conn) = tables.connection_mut(id) {
                conn.remote = remote;
            }
            if let Ok(socket) = tables.socket_mut(sock) {
                socket.status = SocketStatus::Connected;
            }
        });
        info!("Socket {} connected on connection {}", sock.raw(), id);
        Ok(())
    }

    async fn open_connection(
        &self,
        id: u8,
        kind: ConnectionKind,
        remote: SocketAddrV4,
        options: &SocketOptions,
        tls: &TlsParams,
    ) -> Result<()> {
        if kind == ConnectionKind::Ssl {
            self.configure_tls(id, tls).await?;
        }
        let tcp = TcpOptions {
            linger: options.linger,
            no_delay: options.no_delay,
            send_timeout_ms: options.send_timeout_ms,
            keepalive: options.keepalive,
        };
        self.call(self.ncp.set_tcp_options(id, &tcp).await, "set_tcp_options")?;
        self.call(
            self.ncp.set_receive_buffer_len(id, options.recv_buf_size).await,
            "set_receive_buffer_len",
        )?;
        let conn = ClientConnection {
            id,
            kind,
            remote,
            keepalive: options.keepalive,
        };
        self.call(
            self.ncp.start_client_connection(&conn).await,
            "start_client_connection",
        )
    }

    fn abandon(&self, id: u8) {
        self.with(|tables| {
            if let Some(conn) = tables.connection_mut(id) {
                conn.abandoned = true;
            }
        });
    }

    fn release_claim(&self, sock: SocketHandle, id: u8) {
        self.with(|tables| {
            if let Some(conn) = tables.connection_mut(id) {
                if conn.owner == Some(sock) {
                    conn.owner = None;
                }
            }
            if let Ok(socket) = tables.socket_mut(sock) {
                socket.connection = None;
                socket.client = false;
            }
        });
    }

    /// Start the co-processor server for a bound socket
    ///
    /// # Arguments
    ///
    /// * `backlog` - Maximum simultaneous connections, 0 for the hardware
    ///   maximum
    ///
    /// # Errors
    ///
    /// Returns `Error::Failed` unless the socket is a `Bound` server or if
    /// `backlog` exceeds the number of connection slots.
    pub async fn listen(&self, sock: SocketHandle, backlog: usize) -> Result<()> {
        let (port, kind, keepalive) = self.with(|tables| {
            let socket = tables.socket(sock)?;
            if !socket.listener || socket.status != SocketStatus::Bound {
                error!("Socket {} is not a bound server", sock.raw());
                return Err(Error::Failed);
            }
            Ok((socket.local_port, socket.kind, socket.options.keepalive))
        })?;
        if backlog > MAX_CONNECTIONS {
            error!("Backlog {} above {}", backlog, MAX_CONNECTIONS);
            return Err(Error::Failed);
        }
        let backlog = if backlog == 0 { MAX_CONNECTIONS } else { backlog };

        self.call(
            self.ncp.set_server_max_connections(backlog as u8).await,
            "set_server_max_connections",
        )
        .inspect_err(|err| log_failure(*err, "set_server_max_connections"))?;
        self.call(self.ncp.start_server(port, kind, keepalive).await, "start_server")
            .inspect_err(|err| log_failure(*err, "start_server"))?;

        self.with(|tables| {
            let socket = tables.socket_mut(sock)?;
            socket.status = SocketStatus::Listening;
            Ok::<_, Error>(())
        })?;
        info!("Socket {} listening on port {}", sock.raw(), port);
        Ok(())
    }

    /// Wait for an incoming connection on a listening socket
    ///
    /// Returns a new socket owning the connection and the peer address.
    /// The wait ends early with `Error::Failed` when the listener leaves
    /// `Listening`, which is how [`Net::shutdown`] cancels it.
    ///
    /// # Errors
    ///
    /// * `Error::Failed` if the socket is not listening, no descriptor is
    ///   free, or the wait was cancelled
    /// * `Error::UnexpectedResponse` if the co-processor does not report the
    ///   connection as server side
    pub async fn accept(&self, sock: SocketHandle) -> Result<(SocketHandle, SocketAddrV4)> {
        let (kind, recv_timeout_ms) = self.with(|tables| {
            let socket = tables.socket(sock)?;
            if socket.status != SocketStatus::Listening {
                error!("Socket {} is not listening", sock.raw());
                return Err(Error::Failed);
            }
            Ok((socket.kind, socket.options.recv_timeout_ms))
        })?;
        let new = self.with(|tables| tables.allocate(kind, &self.config))?;

        let poll = Duration::from_millis(self.config.poll_period_ms.into());
        let id = loop {
            let claimed = self.with(|tables| {
                match tables.socket(sock) {
                    Ok(socket) if socket.status == SocketStatus::Listening => {}
                    _ => return Err(Error::Failed),
                }
                let Some((id, conn)) = tables
                    .connections
                    .iter_mut()
                    .enumerate()
                    .find(|(_, conn)| conn.is_pending())
                else {
                    return Ok(None);
                };
                conn.owner = Some(new);
                Ok(u8::try_from(id).ok())
            });
            match claimed {
                Ok(Some(id)) => break id,
                Ok(None) => {
                    let _ = with_timeout(poll, self.accept_ready.wait()).await;
                }
                Err(err) => {
                    debug!("Accept on socket {} cancelled", sock.raw());
                    self.with(|tables| tables.reset_socket(new, &self.config));
                    return Err(err);
                }
            }
        };

        let info = self.call(self.ncp.socket_info(id).await, "socket_info");
        if let Ok(info) = &info {
            if !info.server_side {
                error!("Connection {} is not a server connection", id);
                self.with(|tables| {
                    if let Some(conn) = tables.connection_mut(id) {
                        conn.owner = None;
                        conn.abandoned = true;
                    }
                    tables.reset_socket(new, &self.config);
                });
                return Err(Error::UnexpectedResponse);
            }
        }

        let remote = self.with(|tables| {
            let conn = tables.connection_mut(id).ok_or(Error::Failed)?;
            if let Ok(info) = &info {
                conn.remote = info.remote;
            }
            let remote = conn.remote;
            let socket = tables.socket_mut(new)?;
            socket.connection = Some(id);
            socket.listener = false;
            socket.client = false;
            socket.options.recv_timeout_ms = recv_timeout_ms;
            socket.status = SocketStatus::Connected;
            Ok::<_, Error>(remote)
        })?;
        info!("Socket {} accepted connection {} as socket {}", sock.raw(), id, new.raw());
        Ok((new, remote))
    }

    /// Close a socket and release its connection slot
    ///
    /// The socket is marked `Closing` first so blocked calls referencing
    /// it give up. A live connection is stopped with bounded retries.
    /// TLS material, the byte counter and both table entries are released
    /// whatever the outcome.
    ///
    /// # Errors
    ///
    /// * `Error::Failed` for an out-of-range or `Reset` socket
    /// * `Error::Timeout` if the co-processor never reported the connection
    ///   closed
    pub async fn close(&self, sock: SocketHandle) -> Result<()> {
        let id = self.with(|tables| {
            let socket = tables.socket_mut(sock)?;
            if socket.status == SocketStatus::Reset {
                error!("Socket {} is not open", sock.raw());
                return Err(Error::Failed);
            }
            socket.status = SocketStatus::Closing;
            Ok(socket.connection)
        })?;
        self.accept_ready.signal(());

        let mut result = Ok(());
        if let Some(id) = id {
            result = self.stop_connection(id).await;
            self.signals[usize::from(id)].reset();
            self.with(|tables| {
                if let Some(conn) = tables.connection_mut(id) {
                    *conn = Default::default();
                }
            });
        }
        self.with(|tables| tables.reset_socket(sock, &self.config));
        debug!("Socket {} closed", sock.raw());
        result
    }

    /// Stop connection `id` until it reports disconnected
    async fn stop_connection(&self, id: u8) -> Result<()> {
        let signals = &self.signals[usize::from(id)];
        let delay = Duration::from_millis(self.config.close_retry_delay_ms.into());
        for _ in 0..self.config.close_retry_limit {
            if !self.is_connected(id) {
                return Ok(());
            }
            signals.state.reset();
            match self.call(self.ncp.stop_client_connection(id).await, "stop_client_connection") {
                Ok(()) => {
                    if !self.is_connected(id) {
                        return Ok(());
                    }
                    let _ = with_timeout(delay, signals.state.wait()).await;
                }
                Err(err) => {
                    log_failure(err, "stop_client_connection");
                    Timer::after(delay).await;
                }
            }
        }
        if self.is_connected(id) {
            error!("Connection {} did not close", id);
            return Err(Error::Timeout);
        }
        Ok(())
    }

    /// Stop a server socket
    ///
    /// With `close_connections`, every accepted connection is closed
    /// first. A socket that is a connection rather than a server is left
    /// untouched.
    ///
    /// # Errors
    ///
    /// Returns the first close failure or the translated `stop_server`
    /// failure. `Error::Busy` means the request can be retried.
    pub async fn shutdown(&self, sock: SocketHandle, close_connections: bool) -> Result<()> {
        let listener = self.with(|tables| {
            let socket = tables.socket_mut(sock)?;
            if socket.status == SocketStatus::Reset {
                return Err(Error::Failed);
            }
            if socket.listener {
                socket.status = SocketStatus::Closing;
            }
            Ok(socket.listener)
        })?;
        if !listener {
            warn!("Socket {} is not a server", sock.raw());
            return Ok(());
        }
        self.accept_ready.signal(());

        if close_connections {
            let accepted: Vec<SocketHandle, MAX_SOCKETS> = self.with(|tables| {
                tables
                    .sockets
                    .iter()
                    .enumerate()
                    .filter(|(index, socket)| {
                        *index != sock.raw()
                            && socket.status != SocketStatus::Reset
                            && !socket.listener
                            && !socket.client
                            && socket.connection.is_some()
                    })
                    .map(|(index, _)| SocketHandle::from_raw(index))
                    .collect()
            });
            let mut result = Ok(());
            for handle in accepted {
                if let Err(err) = self.close(handle).await {
                    error!("Failed to close socket {}", handle.raw());
                    result = Err(err);
                }
            }
            result?;
        }

        self.call(self.ncp.stop_server(close_connections).await, "stop_server")
            .inspect_err(|err| log_failure(*err, "stop_server"))?;
        self.with(|tables| tables.reset_socket(sock, &self.config));
        info!("Server socket {} shut down", sock.raw());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NetConfig;
    use crate::test_helper::{run_net, MockNcp, Recorder};
    use core::net::Ipv4Addr;
    use embassy_futures::block_on;
    use embassy_futures::join::join;
    use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
    use ncp_hal::{NcpError, NcpEvent};

    type TestNet<'a> = Net<'a, MockNcp, CriticalSectionRawMutex>;

    const PEER: SocketAddrV4 = SocketAddrV4::new(Ipv4Addr::new(203, 0, 113, 5), 7);
    const LOCAL: SocketAddrV4 = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 8080);

    fn ready(net: &TestNet<'_>) {
        block_on(net.init()).unwrap();
    }

    fn tcp(net: &TestNet<'_>) -> SocketHandle {
        net.socket(AddressFamily::Inet, SocketType::Stream, IpProtocol::Tcp)
            .unwrap()
    }

    fn listening(net: &TestNet<'_>, ncp: &MockNcp) -> SocketHandle {
        let server = tcp(net);
        net.bind(server, LOCAL).unwrap();
        run_net(net, ncp, net.listen(server, 0)).unwrap();
        server
    }

    #[test]
    fn test_socket_exhaustion_and_rotation() {
        let ncp = MockNcp::new();
        let callbacks = Recorder::default();
        let net = TestNet::new(&ncp, &callbacks, NetConfig::default());
        ready(&net);

        let handles: std::vec::Vec<_> = (0..MAX_SOCKETS).map(|_| tcp(&net)).collect();
        for (index, handle) in handles.iter().enumerate() {
            assert_eq!(handle.raw(), index);
        }
        assert_eq!(
            net.socket(AddressFamily::Inet, SocketType::Stream, IpProtocol::Tcp),
            Err(Error::Failed)
        );

        run_net(&net, &ncp, net.close(handles[2])).unwrap();
        assert_eq!(tcp(&net).raw(), 2);

        run_net(&net, &ncp, net.close(handles[0])).unwrap();
        run_net(&net, &ncp, net.close(handles[4])).unwrap();
        assert_eq!(tcp(&net).raw(), 4);
        assert_eq!(tcp(&net).raw(), 0);
    }

    #[test]
    fn test_unsupported_socket_types() {
        let ncp = MockNcp::new();
        let callbacks = Recorder::default();
        let net = TestNet::new(&ncp, &callbacks, NetConfig::default());
        ready(&net);

        assert_eq!(
            net.socket(AddressFamily::Inet6, SocketType::Stream, IpProtocol::Tcp),
            Err(Error::NotSupported)
        );
        assert_eq!(
            net.socket(AddressFamily::Inet, SocketType::Datagram, IpProtocol::Tcp),
            Err(Error::Failed)
        );
        assert_eq!(
            net.socket(AddressFamily::Inet, SocketType::Raw, IpProtocol::Icmp),
            Err(Error::Failed)
        );
    }

    #[test]
    fn test_bind_and_listen_state_errors() {
        let ncp = MockNcp::new();
        let callbacks = Recorder::default();
        let net = TestNet::new(&ncp, &callbacks, NetConfig::default());
        ready(&net);

        let sock = tcp(&net);
        assert_eq!(run_net(&net, &ncp, net.listen(sock, 0)), Err(Error::Failed));
        net.bind(sock, LOCAL).unwrap();
        assert_eq!(net.bind(sock, LOCAL), Err(Error::Failed));
        assert_eq!(
            run_net(&net, &ncp, net.listen(sock, MAX_CONNECTIONS + 1)),
            Err(Error::Failed)
        );
        assert_eq!(net.status(sock), Ok(SocketStatus::Bound));

        run_net(&net, &ncp, net.listen(sock, 2)).unwrap();
        assert_eq!(net.status(sock), Ok(SocketStatus::Listening));
        assert_eq!(ncp.calls_named("start_server"), 1);
    }

    #[test]
    fn test_connect_and_close() {
        let ncp = MockNcp::new();
        let callbacks = Recorder::default();
        let net = TestNet::new(&ncp, &callbacks, NetConfig::default());
        ready(&net);

        let sock = tcp(&net);
        run_net(&net, &ncp, net.connect(sock, PEER)).unwrap();
        assert_eq!(net.status(sock), Ok(SocketStatus::Connected));
        let id = net.with(|tables| tables.sockets[sock.raw()].connection).unwrap();
        let conn = net.with(|tables| tables.connections[usize::from(id)]);
        assert_eq!(conn.owner, Some(sock));
        assert_eq!(conn.remote, PEER);
        assert_eq!(ncp.state.borrow().last_connection.unwrap().remote, PEER);

        run_net(&net, &ncp, net.close(sock)).unwrap();
        assert_eq!(net.status(sock), Ok(SocketStatus::Reset));
        assert_eq!(ncp.calls_named("stop_client_connection"), 1);
        assert!(net.with(|tables| tables.connections[usize::from(id)].is_free()));
    }

    #[test]
    fn test_connect_failure_keeps_socket_allocated() {
        let ncp = MockNcp::new();
        let callbacks = Recorder::default();
        let net = TestNet::new(&ncp, &callbacks, NetConfig::default());
        ready(&net);

        let sock = tcp(&net);
        ncp.fail_next("start_client_connection", ncp_hal::NcpError::Failed);
        assert_eq!(run_net(&net, &ncp, net.connect(sock, PEER)), Err(Error::Failed));
        assert_eq!(net.status(sock), Ok(SocketStatus::Allocated));
        assert!(net.with(|tables| tables.connections.iter().all(|conn| conn.is_free())));
        assert_eq!(
            callbacks.errors(),
            std::vec![(Error::Failed, "start_client_connection")]
        );

        run_net(&net, &ncp, net.connect(sock, PEER)).unwrap();
    }

    #[test]
    fn test_connect_not_confirmed_times_out() {
        let ncp = MockNcp::new();
        ncp.state.borrow_mut().confirm_connect = false;
        let callbacks = Recorder::default();
        let config = NetConfig {
            connect_confirm_timeout_ms: 50,
            ..NetConfig::default()
        };
        let net = TestNet::new(&ncp, &callbacks, config);
        ready(&net);

        let sock = tcp(&net);
        assert_eq!(run_net(&net, &ncp, net.connect(sock, PEER)), Err(Error::Timeout));
        assert_eq!(net.status(sock), Ok(SocketStatus::Allocated));
        assert_eq!(ncp.calls_named("stop_client_connection"), 1);
        assert!(net.with(|tables| tables.connections.iter().all(|conn| conn.is_free())));
    }

    #[test]
    fn test_late_confirmation_after_timeout() {
        let ncp = MockNcp::new();
        {
            let mut state = ncp.state.borrow_mut();
            state.confirm_connect = false;
            state.confirm_stop = false;
        }
        ncp.fail_next("stop_client_connection", NcpError::Failed);
        let callbacks = Recorder::default();
        let config = NetConfig {
            connect_confirm_timeout_ms: 50,
            ..NetConfig::default()
        };
        let net = TestNet::new(&ncp, &callbacks, config);
        ready(&net);
        let server = listening(&net, &ncp);

        let sock = tcp(&net);
        assert_eq!(run_net(&net, &ncp, net.connect(sock, PEER)), Err(Error::Timeout));
        assert_eq!(
            callbacks.errors(),
            std::vec![(Error::Failed, "stop_client_connection")]
        );
        let id = ncp.state.borrow().last_connection.map(|conn| conn.id).unwrap();

        net.handle_event(NcpEvent::SocketConnected(id));
        assert!(!net.with(|tables| tables.connections[usize::from(id)].is_pending()));
        assert!(!net.with(|tables| tables.connections[usize::from(id)].is_free()));

        ncp.emit(NcpEvent::SocketConnected(id + 1));
        let (accepted, _) = run_net(&net, &ncp, net.accept(server)).unwrap();
        assert_eq!(
            net.with(|tables| tables.sockets[accepted.raw()].connection),
            Some(id + 1)
        );

        net.handle_event(NcpEvent::SocketDisconnected(id));
        assert!(net.with(|tables| tables.connections[usize::from(id)].is_free()));
    }

    #[test]
    fn test_connection_exclusivity() {
        let ncp = MockNcp::new();
        let callbacks = Recorder::default();
        let net = TestNet::new(&ncp, &callbacks, NetConfig::default());
        ready(&net);

        let socks: std::vec::Vec<_> = (0..MAX_SOCKETS).map(|_| tcp(&net)).collect();
        for sock in &socks[..MAX_CONNECTIONS] {
            run_net(&net, &ncp, net.connect(*sock, PEER)).unwrap();
        }
        assert_eq!(
            run_net(&net, &ncp, net.connect(socks[MAX_CONNECTIONS], PEER)),
            Err(Error::Failed)
        );

        let owners: std::vec::Vec<_> =
            net.with(|tables| tables.connections.iter().map(|conn| conn.owner).collect());
        for sock in &socks[..MAX_CONNECTIONS] {
            assert_eq!(owners.iter().filter(|owner| **owner == Some(*sock)).count(), 1);
        }
    }

    #[test]
    fn test_close_invalid_socket_fails() {
        let ncp = MockNcp::new();
        let callbacks = Recorder::default();
        let net = TestNet::new(&ncp, &callbacks, NetConfig::default());
        ready(&net);

        assert_eq!(
            run_net(&net, &ncp, net.close(SocketHandle::from_raw(0))),
            Err(Error::Failed)
        );
        assert_eq!(
            run_net(&net, &ncp, net.close(SocketHandle::from_raw(MAX_SOCKETS + 3))),
            Err(Error::Failed)
        );
    }

    #[test]
    fn test_close_gives_up_after_retries() {
        let ncp = MockNcp::new();
        let callbacks = Recorder::default();
        let config = NetConfig {
            close_retry_limit: 3,
            close_retry_delay_ms: 10,
            ..NetConfig::default()
        };
        let net = TestNet::new(&ncp, &callbacks, config);
        ready(&net);

        let sock = tcp(&net);
        run_net(&net, &ncp, net.connect(sock, PEER)).unwrap();
        ncp.state.borrow_mut().confirm_stop = false;

        assert_eq!(run_net(&net, &ncp, net.close(sock)), Err(Error::Timeout));
        assert_eq!(ncp.calls_named("stop_client_connection"), 3);
        assert_eq!(net.status(sock), Ok(SocketStatus::Reset));
        assert!(net.with(|tables| tables.connections.iter().all(|conn| conn.is_free())));
    }

    #[test]
    fn test_accept_and_shutdown() {
        let ncp = MockNcp::new();
        let callbacks = Recorder::default();
        let net = TestNet::new(&ncp, &callbacks, NetConfig::default());
        ready(&net);
        let server = listening(&net, &ncp);

        ncp.state.borrow_mut().peers[3] = PEER;
        ncp.emit(NcpEvent::SocketConnected(3));
        let (accepted, remote) = run_net(&net, &ncp, net.accept(server)).unwrap();
        assert_eq!(remote, PEER);
        assert_ne!(accepted, server);
        assert_eq!(net.status(accepted), Ok(SocketStatus::Connected));
        assert_eq!(
            net.with(|tables| tables.connections[3].owner),
            Some(accepted)
        );

        run_net(&net, &ncp, net.shutdown(server, true)).unwrap();
        assert_eq!(net.status(server), Ok(SocketStatus::Reset));
        assert_eq!(net.status(accepted), Ok(SocketStatus::Reset));
        assert_eq!(ncp.calls_named("stop_client_connection"), 1);
        assert_eq!(ncp.calls_named("stop_server"), 1);
    }

    #[test]
    fn test_accept_rejects_client_side_connection() {
        let ncp = MockNcp::new();
        let callbacks = Recorder::default();
        let net = TestNet::new(&ncp, &callbacks, NetConfig::default());
        ready(&net);
        let server = listening(&net, &ncp);

        ncp.state.borrow_mut().server_side = false;
        ncp.emit(NcpEvent::SocketConnected(1));
        assert_eq!(
            run_net(&net, &ncp, net.accept(server)),
            Err(Error::UnexpectedResponse)
        );
        let open = net.with(|tables| {
            tables
                .sockets
                .iter()
                .filter(|socket| socket.status != SocketStatus::Reset)
                .count()
        });
        assert_eq!(open, 1);
        assert!(!net.with(|tables| tables.connections[1].is_pending()));

        // The rejected slot no longer blocks the next client
        ncp.state.borrow_mut().server_side = true;
        ncp.emit(NcpEvent::SocketConnected(2));
        let (accepted, _) = run_net(&net, &ncp, net.accept(server)).unwrap();
        assert_eq!(
            net.with(|tables| tables.sockets[accepted.raw()].connection),
            Some(2)
        );
    }

    #[test]
    fn test_shutdown_cancels_accept() {
        let ncp = MockNcp::new();
        let callbacks = Recorder::default();
        let net = TestNet::new(&ncp, &callbacks, NetConfig::default());
        ready(&net);
        let server = listening(&net, &ncp);

        let (accepted, stopped) = run_net(
            &net,
            &ncp,
            join(net.accept(server), async {
                Timer::after_millis(50).await;
                net.shutdown(server, false).await
            }),
        );
        assert_eq!(accepted, Err(Error::Failed));
        assert_eq!(stopped, Ok(()));
        assert!(net.with(|tables| tables
            .sockets
            .iter()
            .all(|socket| socket.status == SocketStatus::Reset)));
    }

    #[test]
    fn test_shutdown_ignores_client_socket() {
        let ncp = MockNcp::new();
        let callbacks = Recorder::default();
        let net = TestNet::new(&ncp, &callbacks, NetConfig::default());
        ready(&net);

        let sock = tcp(&net);
        run_net(&net, &ncp, net.shutdown(sock, true)).unwrap();
        assert_eq!(net.status(sock), Ok(SocketStatus::Allocated));
        assert_eq!(ncp.calls_named("stop_server"), 0);
    }
}
