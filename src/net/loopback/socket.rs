/*!
 * Loopback Socket Objects
 * Per-socket state, receive queues and the wait/notify plumbing
 */

use crate::core::errors::{SocketError, SocketResult};
use crate::core::types::SocketId;
use crate::net::address::{
    InetAddr, SocketAddress, IPPROTO_TCP, IPPROTO_UDP, SOCK_DGRAM, SOCK_STREAM,
};
use crate::net::layer::SocketState;
use crate::net::queue::QueueHead;
use parking_lot::{Condvar, Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Transport selected by the socket type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transport {
    Stream,
    Datagram,
}

impl Transport {
    pub fn from_socket_type(socket_type: i32) -> Option<Self> {
        match socket_type {
            SOCK_STREAM => Some(Self::Stream),
            SOCK_DGRAM => Some(Self::Datagram),
            _ => None,
        }
    }

    /// IPPROTO number accepted besides 0
    pub fn protocol(self) -> i32 {
        match self {
            Self::Stream => IPPROTO_TCP,
            Self::Datagram => IPPROTO_UDP,
        }
    }
}

/// One queued datagram with its source address
pub(super) struct Datagram {
    pub from: InetAddr,
    pub payload: Vec<u8>,
}

/// Mutable socket state, only touched under the socket's mutex
pub(super) struct SocketInner {
    pub state: SocketState,
    pub local: Option<InetAddr>,
    pub peer: Option<InetAddr>,
    /// Socket on the other end of a stream connection
    pub peer_sock: Option<SocketId>,
    /// Whether `local.port` is registered in the port map under this socket
    pub owns_port: bool,
    pub peer_closed: bool,
    pub released: bool,
    /// Server-side sockets waiting for accept
    pub backlog: QueueHead<SocketId>,
    pub segments: QueueHead<Vec<u8>>,
    /// Unread tail of the segment a short read split
    pending: Option<(Vec<u8>, usize)>,
    pub datagrams: QueueHead<Datagram>,
}

impl SocketInner {
    fn new(rcvbuf_entries: usize) -> Self {
        Self {
            state: SocketState::Unbound,
            local: None,
            peer: None,
            peer_sock: None,
            owns_port: false,
            peer_closed: false,
            released: false,
            backlog: QueueHead::with_limit(0),
            segments: QueueHead::with_limit(rcvbuf_entries),
            pending: None,
            datagrams: QueueHead::with_limit(rcvbuf_entries),
        }
    }

    /// Copy buffered stream bytes into `buf`
    ///
    /// `None` means nothing is buffered and the peer is still open, so the
    /// caller has to wait. Zero means end of stream.
    pub fn read_stream(&mut self, buf: &mut [u8]) -> Option<usize> {
        let mut copied = 0;
        while copied < buf.len() {
            let (segment, offset) = match self.pending.take() {
                Some(pending) => pending,
                None => match self.segments.dequeue() {
                    Ok((segment, _)) => (segment, 0),
                    Err(_) => break,
                },
            };

            let available = &segment[offset..];
            let n = available.len().min(buf.len() - copied);
            buf[copied..copied + n].copy_from_slice(&available[..n]);
            copied += n;

            if offset + n < segment.len() {
                self.pending = Some((segment, offset + n));
            }
        }

        if copied > 0 || buf.is_empty() || self.peer_closed {
            Some(copied)
        } else {
            None
        }
    }

    /// Bytes readable without blocking
    pub fn buffered(&self) -> usize {
        let pending = self
            .pending
            .as_ref()
            .map(|(segment, offset)| segment.len() - offset)
            .unwrap_or(0);
        pending + self.segments.bytes()
    }

    /// Drain every backlog entry, handing back the server-side socket ids
    pub fn drain_backlog(&mut self) -> Vec<SocketId> {
        let mut drained = Vec::with_capacity(self.backlog.len());
        while let Ok((sock, _)) = self.backlog.dequeue() {
            drained.push(sock);
        }
        drained
    }
}

/// A socket object of the loopback stack
pub(super) struct SocketObject {
    pub id: SocketId,
    pub transport: Transport,
    inner: Mutex<SocketInner>,
    ready: Condvar,
}

impl SocketObject {
    pub fn new(id: SocketId, transport: Transport, rcvbuf_entries: usize) -> Self {
        Self {
            id,
            transport,
            inner: Mutex::new(SocketInner::new(rcvbuf_entries)),
            ready: Condvar::new(),
        }
    }

    #[inline]
    pub fn lock(&self) -> MutexGuard<'_, SocketInner> {
        self.inner.lock()
    }

    /// Block until notified, or fail with `TimedOut` once `deadline` passes
    pub fn wait(
        &self,
        inner: &mut MutexGuard<'_, SocketInner>,
        deadline: Option<Instant>,
    ) -> SocketResult<()> {
        match deadline {
            Some(deadline) => {
                if self.ready.wait_until(inner, deadline).timed_out() {
                    return Err(SocketError::TimedOut);
                }
            }
            None => self.ready.wait(inner),
        }
        Ok(())
    }

    #[inline]
    pub fn notify(&self) {
        self.ready.notify_all();
    }

    /// Local address as user space sees it
    pub fn local_address(&self) -> SocketAddress {
        self.lock()
            .local
            .map(SocketAddress::from)
            .unwrap_or_default()
    }
}
