/*!
 * Descriptor-kind checks
 *
 * A valid descriptor that is not a socket must be rejected before the
 * socket layer is consulted. The mock below has no expectations, so any
 * delegate call panics the test.
 */

use mockall::mock;
use pretty_assertions::assert_eq;
use socket_gateway::core::types::{Domain, Protocol, SocketId, SocketType};
use socket_gateway::process::FileKind;
use socket_gateway::syscalls::{
    SYS_ACCEPT, SYS_BIND, SYS_CONNECT, SYS_LISTEN, SYS_RECV, SYS_RECVFROM, SYS_SEND, SYS_SENDTO,
};
use socket_gateway::{
    Accepted, CancelToken, ErrorCategory, GatewayConfig, GatewayError, SocketAddress,
    SocketGateway, SocketLayer, SocketResult, SocketState, SyscallArgs, SyscallNumber,
};
use std::sync::Arc;

mock! {
    pub Layer {}

    impl SocketLayer for Layer {
        fn alloc(&self, domain: Domain, socket_type: SocketType, protocol: Protocol) -> SocketResult<SocketId>;
        fn release(&self, sock: SocketId);
        fn connect(&self, sock: SocketId, addr: &SocketAddress) -> SocketResult<()>;
        fn bind(&self, sock: SocketId, addr: &SocketAddress) -> SocketResult<()>;
        fn listen(&self, sock: SocketId, backlog: i32) -> SocketResult<()>;
        fn accept(&self, sock: SocketId, cancel: &CancelToken) -> SocketResult<Accepted>;
        fn read(&self, sock: SocketId, buf: &mut [u8], cancel: &CancelToken) -> SocketResult<usize>;
        fn write(&self, sock: SocketId, buf: &[u8]) -> SocketResult<usize>;
        fn recvfrom(&self, sock: SocketId, buf: &mut [u8], cancel: &CancelToken) -> SocketResult<(usize, SocketAddress)>;
        fn sendto(&self, sock: SocketId, buf: &[u8], addr: &SocketAddress) -> SocketResult<usize>;
        fn state(&self, sock: SocketId) -> Option<SocketState>;
    }
}

fn strict_gateway() -> SocketGateway {
    let layer: Arc<dyn SocketLayer> = Arc::new(MockLayer::new());
    SocketGateway::new(layer, GatewayConfig::default())
}

#[test]
fn test_console_descriptors_are_not_sockets() {
    let gw = strict_gateway();
    let proc = gw.spawn_process().unwrap();

    for fd in 0..3u64 {
        let calls: [(u32, Vec<u64>); 8] = [
            (SYS_CONNECT, vec![fd, 0, 16]),
            (SYS_BIND, vec![fd, 0, 16]),
            (SYS_LISTEN, vec![fd, 1]),
            (SYS_ACCEPT, vec![fd, 0, 0]),
            (SYS_RECV, vec![fd, 0, 8]),
            (SYS_SEND, vec![fd, 0, 8]),
            (SYS_RECVFROM, vec![fd, 0, 8, 0, 0]),
            (SYS_SENDTO, vec![fd, 0, 8, 0, 16]),
        ];
        for (number, regs) in calls {
            assert_eq!(gw.dispatch(&proc, number, SyscallArgs::from_slice(&regs)), -1);
        }
    }
    assert_eq!(gw.metrics().failures(ErrorCategory::DescriptorKind), 24);
}

#[test]
fn test_pipe_and_inode_descriptors_rejected() {
    let gw = strict_gateway();
    let proc = gw.spawn_process().unwrap();
    let pipe = proc.fdalloc(gw.files().alloc(FileKind::Pipe).unwrap()).unwrap();
    let inode = proc.fdalloc(gw.files().alloc(FileKind::Inode).unwrap()).unwrap();

    for fd in [pipe, inode] {
        let err = gw
            .invoke(&proc, SyscallNumber::Send, SyscallArgs::from_slice(&[fd as u64, 0, 4]))
            .unwrap_err();
        assert_eq!(err, GatewayError::WrongDescriptorKind { fd });
    }
}

#[test]
fn test_arguments_checked_before_kind() {
    let gw = strict_gateway();
    let proc = gw.spawn_process().unwrap();
    let end = gw.config().user_memory_size as u64;

    // fd 1 is the console, but the bad pointer is reported first
    let err = gw
        .invoke(&proc, SyscallNumber::Connect, SyscallArgs::from_slice(&[1, end, 16]))
        .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::ArgumentValidation);
}
