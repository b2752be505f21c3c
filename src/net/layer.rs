/*!
 * Socket Layer Interface
 * The delegate primitives the syscall gateway forwards to
 */

use super::address::SocketAddress;
use crate::core::cancel::CancelToken;
use crate::core::errors::SocketResult;
use crate::core::types::{Domain, Protocol, SocketId, SocketType};
use serde::{Deserialize, Serialize};

/// Externally visible socket states
///
/// `Unbound -> Bound -> Listening`, or `Unbound/Bound -> Connected`.
/// Accepted sockets start out `Connected`; listeners stay `Listening`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SocketState {
    Unbound,
    Bound,
    Listening,
    Connected,
}

/// A connection popped off a listener's backlog
///
/// The caller owns `sock` and must release it through the layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accepted {
    pub sock: SocketId,
    pub peer: SocketAddress,
}

/// Transport implementation behind the socket syscalls
///
/// The gateway validates arguments and descriptor kinds, then calls exactly
/// one of these. State-machine enforcement and blocking belong to the
/// implementation; the blocking calls watch the caller's `CancelToken`.
#[cfg_attr(test, mockall::automock)]
pub trait SocketLayer: Send + Sync {
    /// Allocate a new, unbound socket object
    fn alloc(&self, domain: Domain, socket_type: SocketType, protocol: Protocol)
        -> SocketResult<SocketId>;

    /// Destroy a socket object; waiters on it are woken with `Interrupted`
    fn release(&self, sock: SocketId);

    fn connect(&self, sock: SocketId, addr: &SocketAddress) -> SocketResult<()>;

    fn bind(&self, sock: SocketId, addr: &SocketAddress) -> SocketResult<()>;

    /// Backlog is advisory; implementations may clamp it
    fn listen(&self, sock: SocketId, backlog: i32) -> SocketResult<()>;

    /// Block until a pending connection can be popped
    ///
    /// Fails with `Interrupted` once `cancel` fires while waiting.
    fn accept(&self, sock: SocketId, cancel: &CancelToken) -> SocketResult<Accepted>;

    /// Read up to `buf.len()` bytes; 0 means the peer has closed
    fn read(&self, sock: SocketId, buf: &mut [u8], cancel: &CancelToken) -> SocketResult<usize>;

    fn write(&self, sock: SocketId, buf: &[u8]) -> SocketResult<usize>;

    /// Like `read`, also reporting the sender's address
    fn recvfrom(
        &self,
        sock: SocketId,
        buf: &mut [u8],
        cancel: &CancelToken,
    ) -> SocketResult<(usize, SocketAddress)>;

    fn sendto(&self, sock: SocketId, buf: &[u8], addr: &SocketAddress) -> SocketResult<usize>;

    /// Current state, or `None` once released
    fn state(&self, sock: SocketId) -> Option<SocketState>;
}
