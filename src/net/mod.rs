/*!
 * Network Module
 * Socket-layer interface, address encoding, the generic FIFO queue and the
 * in-memory loopback stack
 */

pub mod address;
pub mod layer;
pub mod loopback;
pub mod queue;

pub use address::{
    InetAddr, SocketAddress, AF_INET, IPPROTO_TCP, IPPROTO_UDP, SOCKADDR_IN_LEN, SOCK_DGRAM,
    SOCK_STREAM,
};
#[cfg(test)]
pub use layer::MockSocketLayer;
pub use layer::{Accepted, SocketLayer, SocketState};
pub use loopback::{LoopbackStack, LoopbackStats, Transport};
pub use queue::QueueHead;
