/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 */

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// Re-export the gateway's four-category error from the syscalls module
pub use crate::syscalls::{ErrorCategory, GatewayError, GatewayResult};

/// Socket-layer (delegate) failures
#[derive(Error, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum SocketError {
    #[error("Socket {0} does not exist")]
    #[diagnostic(
        code(socket::not_found),
        help("The socket was released or never allocated.")
    )]
    NotFound(u32),

    #[error("Address family {0} not supported")]
    #[diagnostic(code(socket::unsupported_family), help("Only AF_INET is available."))]
    UnsupportedFamily(i32),

    #[error("Socket type {0} not supported")]
    #[diagnostic(
        code(socket::unsupported_type),
        help("Use SOCK_STREAM or SOCK_DGRAM.")
    )]
    UnsupportedType(i32),

    #[error("Protocol {0} not supported for this socket type")]
    #[diagnostic(
        code(socket::unsupported_protocol),
        help("Pass 0 to select the default protocol.")
    )]
    UnsupportedProtocol(i32),

    #[error("Malformed socket address")]
    #[diagnostic(
        code(socket::bad_address),
        help("Addresses must be sockaddr_in with family AF_INET.")
    )]
    BadAddress,

    #[error("Address already in use")]
    #[diagnostic(code(socket::address_in_use))]
    AddressInUse,

    #[error("Connection refused")]
    #[diagnostic(
        code(socket::connection_refused),
        help("No listener on the target port, or its backlog is full.")
    )]
    ConnectionRefused,

    #[error("Operation invalid in current socket state")]
    #[diagnostic(
        code(socket::invalid_state),
        help("Sockets move Unbound -> Bound -> Listening, or Unbound/Bound -> Connected.")
    )]
    InvalidState,

    #[error("Socket is not connected")]
    #[diagnostic(code(socket::not_connected))]
    NotConnected,

    #[error("Receive buffer full")]
    #[diagnostic(code(socket::no_buffer_space))]
    NoBufferSpace,

    #[error("Blocking call interrupted")]
    #[diagnostic(
        code(socket::interrupted),
        help("The socket or its peer was released while the call was waiting.")
    )]
    Interrupted,

    #[error("Blocking call timed out")]
    #[diagnostic(code(socket::timed_out))]
    TimedOut,

    #[error("Socket table exhausted")]
    #[diagnostic(
        code(socket::exhausted),
        help("Close unused sockets or raise GATEWAY_MAX_SOCKETS.")
    )]
    Exhausted,
}

/// Generic queue failures
#[derive(Error, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum QueueError {
    /// Queue holds no entries; an expected outcome, not a fault
    #[error("Queue is empty")]
    #[diagnostic(code(queue::empty))]
    Empty,

    #[error("Queue entry allocation failed (limit {limit})")]
    #[diagnostic(
        code(queue::allocation_failure),
        help("The queue's entry budget is exhausted; dequeue before enqueueing more.")
    )]
    AllocationFailure { limit: usize },
}

pub type SocketResult<T> = Result<T, SocketError>;

pub type QueueResult<T> = Result<T, QueueError>;
