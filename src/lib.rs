/*!
 * Socket Gateway Library
 * BSD-style socket syscalls over a pluggable socket layer
 */

pub mod config;
pub mod core;
pub mod monitoring;
pub mod net;
pub mod process;
pub mod syscalls;

// Re-exports
pub use config::{GatewayConfig, LoopbackConfig};
pub use crate::core::cancel::CancelToken;
pub use crate::core::errors::{QueueError, QueueResult, SocketError, SocketResult};
pub use crate::core::limits::SYSCALL_FAILURE;
pub use monitoring::{init_tracing, GatewayMetrics, MetricsSnapshot};
pub use net::{
    Accepted, InetAddr, LoopbackStack, QueueHead, SocketAddress, SocketLayer, SocketState,
    AF_INET, SOCK_DGRAM, SOCK_STREAM,
};
pub use process::{FileTable, Process};
pub use syscalls::{
    ErrorCategory, GatewayError, GatewayResult, SocketGateway, SyscallArgs, SyscallNumber,
};
