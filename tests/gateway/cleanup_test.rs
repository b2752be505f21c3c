/*!
 * Resource exhaustion and cleanup
 *
 * When file or descriptor allocation fails after the socket layer has
 * created an object, the object is released and every count returns to
 * its pre-call value.
 */

use crate::common::*;
use pretty_assertions::assert_eq;
use socket_gateway::syscalls::{SYS_ACCEPT, SYS_CONNECT, SYS_RECV};
use socket_gateway::{ErrorCategory, GatewayConfig, LoopbackConfig, SyscallArgs, SyscallNumber};

#[test]
fn test_socket_with_full_descriptor_table() {
    let (gw, stack) = gateway_with(GatewayConfig {
        nofile: 4,
        ..GatewayConfig::default()
    });
    let proc = gw.spawn_process().unwrap();
    assert_eq!(stream_socket(&gw, &proc), 3);

    let live = stack.live_sockets();
    let open = gw.files().open_files();
    assert_eq!(stream_socket(&gw, &proc), -1);
    assert_eq!(stack.live_sockets(), live);
    assert_eq!(gw.files().open_files(), open);
    assert_eq!(gw.metrics().failures(ErrorCategory::ResourceExhaustion), 1);
}

#[test]
fn test_socket_with_full_file_table() {
    // One console file per process plus one socket
    let (gw, stack) = gateway_with(GatewayConfig {
        nfile: 2,
        ..GatewayConfig::default()
    });
    let proc = gw.spawn_process().unwrap();
    assert_eq!(stream_socket(&gw, &proc), 3);

    assert_eq!(stream_socket(&gw, &proc), -1);
    assert_eq!(stack.live_sockets(), 1);
    assert_eq!(gw.files().open_files(), 2);
    assert_eq!(proc.fds().open_count(), 4);
}

#[test]
fn test_socket_table_exhaustion_is_resource_category() {
    let (gw, stack) = gateway_with(GatewayConfig {
        loopback: LoopbackConfig {
            max_sockets: 1,
            ..LoopbackConfig::default()
        },
        ..GatewayConfig::default()
    });
    let proc = gw.spawn_process().unwrap();
    assert_eq!(stream_socket(&gw, &proc), 3);

    let err = gw
        .invoke(&proc, SyscallNumber::Socket, SyscallArgs::from_slice(&[2, 1, 0]))
        .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::ResourceExhaustion);
    assert_eq!(stack.live_sockets(), 1);
}

#[test]
fn test_accept_with_full_descriptor_table_drops_connection() {
    let (gw, stack) = gateway_with(GatewayConfig {
        nofile: 4,
        ..GatewayConfig::default()
    });
    let server = gw.spawn_process().unwrap();
    let client = gw.spawn_process().unwrap();
    let listen_fd = listening_socket(&gw, &server, 9200);

    let fd = stream_socket(&gw, &client) as u64;
    put_addr(&client, 9200);
    assert_eq!(call(&gw, &client, SYS_CONNECT, &[fd, ADDR, SOCKADDR_LEN]), 0);
    assert_eq!(stack.live_sockets(), 3);

    let open = gw.files().open_files();
    assert_eq!(call(&gw, &server, SYS_ACCEPT, &[listen_fd, 0, 0]), -1);
    assert_eq!(stack.live_sockets(), 2);
    assert_eq!(gw.files().open_files(), open);

    // The client sees the dropped connection as end of stream
    assert_eq!(call(&gw, &client, SYS_RECV, &[fd, BUF, 8]), 0);
}

#[test]
fn test_failed_calls_never_leak() {
    let (gw, stack) = gateway_with(GatewayConfig {
        nofile: 5,
        nfile: 4,
        ..GatewayConfig::default()
    });
    let proc = gw.spawn_process().unwrap();

    let mut opened = 0;
    for _ in 0..10 {
        if stream_socket(&gw, &proc) >= 0 {
            opened += 1;
        }
    }
    assert_eq!(opened, 2);
    assert_eq!(stack.live_sockets(), 2);
    assert_eq!(gw.files().open_files(), 3);

    proc.exit();
    assert_eq!(stack.live_sockets(), 0);
    assert_eq!(gw.files().open_files(), 0);
}
