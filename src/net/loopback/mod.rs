/*!
 * Loopback Socket Stack
 * In-memory AF_INET sockets (stream and datagram) matched by port
 *
 * Lock order: two socket locks are only held together in ascending
 * `SocketId` order, and any socket lock comes before a map shard. No socket
 * lock is taken while a shard guard is alive, and release never holds two
 * socket locks.
 */

mod socket;

pub use socket::Transport;

use self::socket::{Datagram, SocketInner, SocketObject};
use crate::config::LoopbackConfig;
use crate::core::cancel::{CancelToken, WakerRegistration};
use crate::core::errors::{QueueError, SocketError, SocketResult};
use crate::core::limits::EPHEMERAL_PORT_START;
use crate::core::types::{Domain, Protocol, SocketId, SocketType};
use crate::monitoring::span_operation;
use crate::net::address::{InetAddr, SocketAddress, AF_INET};
use crate::net::layer::{Accepted, SocketLayer, SocketState};
use crate::net::queue::QueueHead;
use ahash::RandomState;
use crossbeam_queue::SegQueue;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::MutexGuard;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, trace};

const EPHEMERAL_PORT_COUNT: u32 = (u16::MAX - EPHEMERAL_PORT_START) as u32 + 1;

/// Lock two distinct sockets in ascending id order
fn lock_pair<'a>(
    first: &'a SocketObject,
    second: &'a SocketObject,
) -> (MutexGuard<'a, SocketInner>, MutexGuard<'a, SocketInner>) {
    if first.id < second.id {
        let a = first.lock();
        let b = second.lock();
        (a, b)
    } else {
        let b = second.lock();
        let a = first.lock();
        (a, b)
    }
}

/// Wake `obj`'s waiters when `cancel` fires, for as long as the
/// registration lives
fn watch_cancel<'c>(obj: &Arc<SocketObject>, cancel: &'c CancelToken) -> WakerRegistration<'c> {
    let weak = Arc::downgrade(obj);
    cancel.register(Arc::new(move || {
        if let Some(obj) = weak.upgrade() {
            // Orders the wakeup after a waiter's flag check
            let _inner = obj.lock();
            obj.notify();
        }
    }))
}

/// Socket counts by state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopbackStats {
    pub live_sockets: usize,
    pub bound_ports: usize,
    pub listening: usize,
    pub connected: usize,
    pub buffered_bytes: usize,
}

/// In-memory socket layer
///
/// Sockets live in a sharded map; ids of released sockets are recycled
/// through a lock-free free list.
pub struct LoopbackStack {
    sockets: DashMap<SocketId, Arc<SocketObject>, RandomState>,
    ports: DashMap<(Transport, u16), SocketId, RandomState>,
    next_id: AtomicU32,
    free_ids: SegQueue<SocketId>,
    live: AtomicUsize,
    next_ephemeral: AtomicU32,
    config: LoopbackConfig,
}

impl LoopbackStack {
    pub fn new(config: LoopbackConfig) -> Self {
        info!(
            max_sockets = config.max_sockets,
            max_backlog = config.max_backlog,
            rcvbuf_entries = config.rcvbuf_entries,
            "loopback socket stack initialized"
        );
        Self {
            sockets: DashMap::with_hasher(RandomState::new()),
            ports: DashMap::with_hasher(RandomState::new()),
            next_id: AtomicU32::new(1),
            free_ids: SegQueue::new(),
            live: AtomicUsize::new(0),
            next_ephemeral: AtomicU32::new(0),
            config,
        }
    }

    /// Socket objects allocated and not yet released
    #[inline]
    pub fn live_sockets(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    #[inline]
    pub fn config(&self) -> &LoopbackConfig {
        &self.config
    }

    /// Local address a socket is bound to, if any
    pub fn local_address(&self, sock: SocketId) -> Option<SocketAddress> {
        let obj = self.get(sock).ok()?;
        let addr = obj.local_address();
        (!addr.is_empty()).then_some(addr)
    }

    pub fn stats(&self) -> LoopbackStats {
        let mut stats = LoopbackStats {
            live_sockets: self.live_sockets(),
            bound_ports: self.ports.len(),
            ..LoopbackStats::default()
        };
        let sockets: Vec<_> = self
            .sockets
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        for obj in sockets {
            let inner = obj.lock();
            match inner.state {
                SocketState::Listening => stats.listening += 1,
                SocketState::Connected => stats.connected += 1,
                _ => {}
            }
            stats.buffered_bytes += inner.buffered() + inner.datagrams.bytes();
        }
        stats
    }

    fn get(&self, sock: SocketId) -> SocketResult<Arc<SocketObject>> {
        self.sockets
            .get(&sock)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(SocketError::NotFound(sock))
    }

    fn deadline(&self) -> Option<Instant> {
        self.config.block_timeout().map(|timeout| Instant::now() + timeout)
    }

    /// Create and register a fresh, unbound socket object
    fn spawn(&self, transport: Transport) -> SocketResult<Arc<SocketObject>> {
        let max = self.config.max_sockets;
        self.live
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |live| {
                (live < max).then_some(live + 1)
            })
            .map_err(|_| {
                debug!(max_sockets = max, "socket table exhausted");
                SocketError::Exhausted
            })?;

        let id = match self.free_ids.pop() {
            Some(recycled) => {
                trace!(sock = recycled, "recycled socket id");
                recycled
            }
            None => self.next_id.fetch_add(1, Ordering::SeqCst),
        };

        let obj = Arc::new(SocketObject::new(id, transport, self.config.rcvbuf_entries));
        self.sockets.insert(id, Arc::clone(&obj));
        Ok(obj)
    }

    /// Register `sock` on a specific port
    fn claim_port(&self, transport: Transport, port: u16, sock: SocketId) -> SocketResult<()> {
        match self.ports.entry((transport, port)) {
            Entry::Occupied(_) => {
                debug!(port, sock, "address in use");
                Err(SocketError::AddressInUse)
            }
            Entry::Vacant(slot) => {
                slot.insert(sock);
                Ok(())
            }
        }
    }

    /// Register `sock` on the next free ephemeral port
    fn claim_ephemeral(&self, transport: Transport, sock: SocketId) -> SocketResult<u16> {
        for _ in 0..EPHEMERAL_PORT_COUNT {
            let offset = self.next_ephemeral.fetch_add(1, Ordering::Relaxed) % EPHEMERAL_PORT_COUNT;
            let port = EPHEMERAL_PORT_START + offset as u16;
            if self.claim_port(transport, port, sock).is_ok() {
                trace!(port, sock, "ephemeral port assigned");
                return Ok(port);
            }
        }
        Err(SocketError::AddressInUse)
    }

    /// Bind `obj` to `addr` under its lock; port 0 picks an ephemeral port
    fn bind_locked(
        &self,
        obj: &SocketObject,
        inner: &mut SocketInner,
        addr: InetAddr,
    ) -> SocketResult<InetAddr> {
        if inner.state != SocketState::Unbound {
            return Err(SocketError::InvalidState);
        }
        let port = match addr.port {
            0 => self.claim_ephemeral(obj.transport, obj.id)?,
            port => {
                self.claim_port(obj.transport, port, obj.id)?;
                port
            }
        };
        let local = InetAddr::new(addr.ip, port);
        inner.local = Some(local);
        inner.owns_port = true;
        inner.state = SocketState::Bound;
        Ok(local)
    }

    fn connect_stream(&self, obj: &SocketObject, target: InetAddr) -> SocketResult<()> {
        let local = {
            let mut inner = obj.lock();
            let state = inner.state;
            match state {
                SocketState::Unbound => {
                    self.bind_locked(obj, &mut inner, InetAddr::new(Ipv4Addr::LOCALHOST, 0))?
                }
                SocketState::Bound => inner.local.ok_or(SocketError::InvalidState)?,
                _ => return Err(SocketError::InvalidState),
            }
        };

        let listener = self
            .ports
            .get(&(Transport::Stream, target.port))
            .map(|entry| *entry.value())
            .ok_or(SocketError::ConnectionRefused)?;
        if listener == obj.id {
            return Err(SocketError::ConnectionRefused);
        }
        let listener = self.get(listener).map_err(|_| SocketError::ConnectionRefused)?;

        // Server-side end, handed to whoever accepts it
        let server = self.spawn(Transport::Stream)?;
        {
            let mut server_inner = server.lock();
            server_inner.state = SocketState::Connected;
            server_inner.local = Some(target);
            server_inner.peer = Some(local);
            server_inner.peer_sock = Some(obj.id);
        }

        let linked = {
            let (mut inner, mut listening) = lock_pair(obj, &listener);
            // Our lock was dropped above; a racing connect, listen or close
            // may have moved the socket on
            if inner.released || inner.state != SocketState::Bound {
                Err(SocketError::InvalidState)
            } else if listening.released || listening.state != SocketState::Listening {
                Err(SocketError::ConnectionRefused)
            } else {
                match listening.backlog.enqueue(server.id, 0) {
                    Ok(()) => {
                        inner.state = SocketState::Connected;
                        inner.peer = Some(target);
                        inner.peer_sock = Some(server.id);
                        Ok(())
                    }
                    Err(_) => Err(SocketError::ConnectionRefused),
                }
            }
        };
        if let Err(err) = linked {
            debug!(sock = obj.id, %target, ?err, "connect failed");
            server.lock().peer_sock = None;
            self.release(server.id);
            return Err(err);
        }
        listener.notify();

        debug!(sock = obj.id, server = server.id, %local, %target, "stream connected");
        Ok(())
    }

    fn write_stream(&self, obj: &SocketObject, buf: &[u8]) -> SocketResult<usize> {
        let peer_id = {
            let inner = obj.lock();
            if inner.state != SocketState::Connected || inner.peer_closed {
                return Err(SocketError::NotConnected);
            }
            inner.peer_sock.ok_or(SocketError::NotConnected)?
        };
        if buf.is_empty() {
            return Ok(0);
        }

        let peer = self.get(peer_id).map_err(|_| SocketError::NotConnected)?;
        {
            let mut peer_inner = peer.lock();
            // A recycled id no longer points back at us
            if peer_inner.released || peer_inner.peer_sock != Some(obj.id) {
                return Err(SocketError::NotConnected);
            }
            peer_inner
                .segments
                .enqueue(buf.to_vec(), buf.len())
                .map_err(|err| match err {
                    QueueError::AllocationFailure { .. } => SocketError::NoBufferSpace,
                    QueueError::Empty => SocketError::InvalidState,
                })?;
        }
        peer.notify();
        trace!(sock = obj.id, peer = peer_id, len = buf.len(), "stream segment queued");
        Ok(buf.len())
    }

    fn read_stream(
        &self,
        obj: &Arc<SocketObject>,
        buf: &mut [u8],
        cancel: &CancelToken,
    ) -> SocketResult<usize> {
        let deadline = self.deadline();
        let _watch = watch_cancel(obj, cancel);
        let mut inner = obj.lock();
        if inner.state != SocketState::Connected {
            return Err(SocketError::NotConnected);
        }
        loop {
            if inner.released {
                return Err(SocketError::Interrupted);
            }
            if let Some(n) = inner.read_stream(buf) {
                return Ok(n);
            }
            if cancel.is_cancelled() {
                debug!(sock = obj.id, "blocked read cancelled");
                return Err(SocketError::Interrupted);
            }
            obj.wait(&mut inner, deadline)?;
        }
    }

    fn send_datagram(&self, obj: &SocketObject, buf: &[u8], target: InetAddr) -> SocketResult<usize> {
        let from = {
            let mut inner = obj.lock();
            match inner.local {
                Some(local) => local,
                None => self.bind_locked(obj, &mut inner, InetAddr::new(Ipv4Addr::LOCALHOST, 0))?,
            }
        };

        let receiver = self
            .ports
            .get(&(Transport::Datagram, target.port))
            .map(|entry| *entry.value());
        let Some(receiver) = receiver.and_then(|id| self.get(id).ok()) else {
            trace!(sock = obj.id, %target, "datagram dropped: no receiver");
            return Ok(buf.len());
        };

        let queued = {
            let mut inner = receiver.lock();
            !inner.released
                && inner
                    .datagrams
                    .enqueue(
                        Datagram {
                            from,
                            payload: buf.to_vec(),
                        },
                        buf.len(),
                    )
                    .is_ok()
        };
        if queued {
            receiver.notify();
        } else {
            trace!(sock = obj.id, %target, "datagram dropped: receive queue full");
        }
        Ok(buf.len())
    }

    fn recv_datagram(
        &self,
        obj: &Arc<SocketObject>,
        buf: &mut [u8],
        cancel: &CancelToken,
    ) -> SocketResult<(usize, SocketAddress)> {
        let deadline = self.deadline();
        let _watch = watch_cancel(obj, cancel);
        let mut inner = obj.lock();
        if inner.state == SocketState::Unbound {
            return Err(SocketError::InvalidState);
        }
        loop {
            if inner.released {
                return Err(SocketError::Interrupted);
            }
            if let Ok((datagram, _)) = inner.datagrams.dequeue() {
                // Excess bytes of a datagram are discarded
                let n = datagram.payload.len().min(buf.len());
                buf[..n].copy_from_slice(&datagram.payload[..n]);
                return Ok((n, SocketAddress::from(datagram.from)));
            }
            if cancel.is_cancelled() {
                debug!(sock = obj.id, "blocked recvfrom cancelled");
                return Err(SocketError::Interrupted);
            }
            obj.wait(&mut inner, deadline)?;
        }
    }
}

impl SocketLayer for LoopbackStack {
    fn alloc(
        &self,
        domain: Domain,
        socket_type: SocketType,
        protocol: Protocol,
    ) -> SocketResult<SocketId> {
        if domain != AF_INET {
            return Err(SocketError::UnsupportedFamily(domain));
        }
        let transport =
            Transport::from_socket_type(socket_type).ok_or(SocketError::UnsupportedType(socket_type))?;
        if protocol != 0 && protocol != transport.protocol() {
            return Err(SocketError::UnsupportedProtocol(protocol));
        }

        let obj = self.spawn(transport)?;
        debug!(sock = obj.id, ?transport, "socket allocated");
        Ok(obj.id)
    }

    fn release(&self, sock: SocketId) {
        let Some((_, obj)) = self.sockets.remove(&sock) else {
            return;
        };
        let span = span_operation("loopback_release");
        let _guard = span.enter();

        let (peer, backlog, port) = {
            let mut inner = obj.lock();
            inner.released = true;
            let port = inner
                .owns_port
                .then_some(inner.local)
                .flatten()
                .map(|local| local.port);
            (inner.peer_sock.take(), inner.drain_backlog(), port)
        };
        obj.notify();

        if let Some(port) = port {
            self.ports.remove_if(&(obj.transport, port), |_, owner| *owner == sock);
        }

        if let Some(peer) = peer.and_then(|id| self.get(id).ok()) {
            let mut inner = peer.lock();
            if inner.peer_sock == Some(sock) {
                inner.peer_closed = true;
            }
            drop(inner);
            peer.notify();
        }

        // Connections nobody accepted go down with the listener
        let pending = backlog.len();
        for server in backlog {
            self.release(server);
        }

        self.live.fetch_sub(1, Ordering::AcqRel);
        self.free_ids.push(sock);
        span.record_items_processed(pending);
        span.record_result(true);
        debug!(sock, pending, "socket released");
    }

    fn connect(&self, sock: SocketId, addr: &SocketAddress) -> SocketResult<()> {
        let target = InetAddr::decode(addr.as_bytes())?;
        let obj = self.get(sock)?;
        match obj.transport {
            Transport::Stream => self.connect_stream(&obj, target),
            Transport::Datagram => {
                let mut inner = obj.lock();
                if inner.state == SocketState::Unbound {
                    self.bind_locked(&obj, &mut inner, InetAddr::new(Ipv4Addr::LOCALHOST, 0))?;
                }
                inner.peer = Some(target);
                inner.state = SocketState::Connected;
                debug!(sock, %target, "datagram peer set");
                Ok(())
            }
        }
    }

    fn bind(&self, sock: SocketId, addr: &SocketAddress) -> SocketResult<()> {
        let addr = InetAddr::decode(addr.as_bytes())?;
        let obj = self.get(sock)?;
        let mut inner = obj.lock();
        let local = self.bind_locked(&obj, &mut inner, addr)?;
        debug!(sock, %local, "socket bound");
        Ok(())
    }

    fn listen(&self, sock: SocketId, backlog: i32) -> SocketResult<()> {
        let obj = self.get(sock)?;
        if obj.transport != Transport::Stream {
            return Err(SocketError::InvalidState);
        }
        let mut inner = obj.lock();
        let state = inner.state;
        match state {
            SocketState::Bound => {
                let limit = usize::try_from(backlog)
                    .unwrap_or(0)
                    .clamp(1, self.config.max_backlog.max(1));
                inner.backlog = QueueHead::with_limit(limit);
                inner.state = SocketState::Listening;
                debug!(sock, backlog = limit, "socket listening");
                Ok(())
            }
            // Repeated listen keeps the existing backlog
            SocketState::Listening => Ok(()),
            _ => Err(SocketError::InvalidState),
        }
    }

    fn accept(&self, sock: SocketId, cancel: &CancelToken) -> SocketResult<Accepted> {
        let obj = self.get(sock)?;
        let deadline = self.deadline();
        let server = {
            let _watch = watch_cancel(&obj, cancel);
            let mut inner = obj.lock();
            if inner.state != SocketState::Listening {
                return Err(SocketError::InvalidState);
            }
            loop {
                if inner.released {
                    return Err(SocketError::Interrupted);
                }
                if let Ok((server, _)) = inner.backlog.dequeue() {
                    break server;
                }
                if cancel.is_cancelled() {
                    debug!(sock, "blocked accept cancelled");
                    return Err(SocketError::Interrupted);
                }
                obj.wait(&mut inner, deadline)?;
            }
        };

        let server_obj = self.get(server).map_err(|_| SocketError::Interrupted)?;
        let peer = server_obj.lock().peer.map(SocketAddress::from).unwrap_or_default();
        debug!(listener = sock, sock = server, "connection accepted");
        Ok(Accepted { sock: server, peer })
    }

    fn read(&self, sock: SocketId, buf: &mut [u8], cancel: &CancelToken) -> SocketResult<usize> {
        let obj = self.get(sock)?;
        match obj.transport {
            Transport::Stream => self.read_stream(&obj, buf, cancel),
            Transport::Datagram => self.recv_datagram(&obj, buf, cancel).map(|(n, _)| n),
        }
    }

    fn write(&self, sock: SocketId, buf: &[u8]) -> SocketResult<usize> {
        let obj = self.get(sock)?;
        match obj.transport {
            Transport::Stream => self.write_stream(&obj, buf),
            Transport::Datagram => {
                let peer = obj.lock().peer.ok_or(SocketError::NotConnected)?;
                self.send_datagram(&obj, buf, peer)
            }
        }
    }

    fn recvfrom(
        &self,
        sock: SocketId,
        buf: &mut [u8],
        cancel: &CancelToken,
    ) -> SocketResult<(usize, SocketAddress)> {
        let obj = self.get(sock)?;
        match obj.transport {
            Transport::Stream => {
                let n = self.read_stream(&obj, buf, cancel)?;
                let peer = obj.lock().peer.map(SocketAddress::from).unwrap_or_default();
                Ok((n, peer))
            }
            Transport::Datagram => self.recv_datagram(&obj, buf, cancel),
        }
    }

    fn sendto(&self, sock: SocketId, buf: &[u8], addr: &SocketAddress) -> SocketResult<usize> {
        let obj = self.get(sock)?;
        match obj.transport {
            // Connected streams ignore the destination
            Transport::Stream => self.write_stream(&obj, buf),
            Transport::Datagram => {
                let target = InetAddr::decode(addr.as_bytes())?;
                self.send_datagram(&obj, buf, target)
            }
        }
    }

    fn state(&self, sock: SocketId) -> Option<SocketState> {
        let obj = self.get(sock).ok()?;
        let state = obj.lock().state;
        Some(state)
    }
}

impl std::fmt::Debug for LoopbackStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopbackStack")
            .field("live_sockets", &self.live_sockets())
            .field("bound_ports", &self.ports.len())
            .field("config", &self.config)
            .finish()
    }
}
