/*!
 * Syscalls Module
 * Socket system call gateway
 */

mod args;
mod executor;
mod network;
mod numbers;
mod types;

// Re-export public API
pub use args::{SyscallArgs, SyscallContext, UserPtr};
pub use executor::SocketGateway;
pub use numbers::{
    SyscallNumber, SYS_ACCEPT, SYS_BIND, SYS_CONNECT, SYS_LISTEN, SYS_RECV, SYS_RECVFROM,
    SYS_SEND, SYS_SENDTO, SYS_SOCKET,
};
pub use types::{ErrorCategory, GatewayError, GatewayResult};
