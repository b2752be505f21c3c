/*!
 * End-to-end stream scenarios through the syscall boundary
 */

use crate::common::*;
use pretty_assertions::assert_eq;
use socket_gateway::syscalls::{SYS_ACCEPT, SYS_BIND, SYS_CONNECT, SYS_LISTEN, SYS_RECV, SYS_SEND};
use socket_gateway::{InetAddr, SocketLayer, SocketState};
use std::thread;

#[test]
fn test_listen_accept_send_recv() {
    let (gw, stack) = gateway();
    let server = gw.spawn_process().unwrap();
    let client = gw.spawn_process().unwrap();

    assert_eq!(stream_socket(&gw, &server), 3);
    put_addr(&server, 8080);
    assert_eq!(call(&gw, &server, SYS_BIND, &[3, ADDR, SOCKADDR_LEN]), 0);
    assert_eq!(call(&gw, &server, SYS_LISTEN, &[3, 5]), 0);

    assert_eq!(stream_socket(&gw, &client), 3);
    put_addr(&client, 8080);
    assert_eq!(call(&gw, &client, SYS_CONNECT, &[3, ADDR, SOCKADDR_LEN]), 0);

    assert_eq!(call(&gw, &server, SYS_ACCEPT, &[3, 0, 0]), 4);

    assert!(server.poke(BUF as usize, b"hi"));
    assert_eq!(call(&gw, &server, SYS_SEND, &[4, BUF, 2]), 2);

    assert_eq!(call(&gw, &client, SYS_RECV, &[3, BUF, 64]), 2);
    assert_eq!(client.peek(BUF as usize, 2).unwrap(), b"hi".to_vec());
    assert_eq!(stack.live_sockets(), 3);
}

#[test]
fn test_accept_leaves_listener_usable() {
    let (gw, stack) = gateway();
    let server = gw.spawn_process().unwrap();
    let listen_fd = listening_socket(&gw, &server, 8081);

    let mut accepted = Vec::new();
    for _ in 0..2 {
        let client = gw.spawn_process().unwrap();
        let fd = stream_socket(&gw, &client) as u64;
        put_addr(&client, 8081);
        assert_eq!(call(&gw, &client, SYS_CONNECT, &[fd, ADDR, SOCKADDR_LEN]), 0);
        accepted.push(call(&gw, &server, SYS_ACCEPT, &[listen_fd, 0, 0]));
    }

    assert_eq!(accepted, vec![4, 5]);
    let listener = server.file(listen_fd as usize).unwrap().socket().unwrap();
    assert_eq!(stack.state(listener), Some(SocketState::Listening));
    for fd in accepted {
        let sock = server.file(fd as usize).unwrap().socket().unwrap();
        assert_ne!(sock, listener);
        assert_eq!(stack.state(sock), Some(SocketState::Connected));
    }
}

#[test]
fn test_accept_with_null_addrlen_leaves_address_buffer() {
    let (gw, _stack) = gateway();
    let server = gw.spawn_process().unwrap();
    let client = gw.spawn_process().unwrap();
    let listen_fd = listening_socket(&gw, &server, 8082);

    let fd = stream_socket(&gw, &client) as u64;
    put_addr(&client, 8082);
    assert_eq!(call(&gw, &client, SYS_CONNECT, &[fd, ADDR, SOCKADDR_LEN]), 0);

    let somebuf = 0x800u64;
    assert!(server.poke(somebuf as usize, &[0x5A; 16]));
    let new_fd = call(&gw, &server, SYS_ACCEPT, &[listen_fd, somebuf, 0]);
    assert!(new_fd > listen_fd as i64);
    assert_eq!(server.peek(somebuf as usize, 16).unwrap(), vec![0x5A; 16]);
}

#[test]
fn test_accept_reports_peer_address() {
    let (gw, stack) = gateway();
    let server = gw.spawn_process().unwrap();
    let client = gw.spawn_process().unwrap();
    let listen_fd = listening_socket(&gw, &server, 8083);

    let fd = stream_socket(&gw, &client) as u64;
    put_addr(&client, 8083);
    assert_eq!(call(&gw, &client, SYS_CONNECT, &[fd, ADDR, SOCKADDR_LEN]), 0);

    put_addrlen(&server, 16);
    assert!(call(&gw, &server, SYS_ACCEPT, &[listen_fd, ADDR, ADDRLEN]) > 0);
    assert_eq!(read_addrlen(&server), 16);

    let raw = server.peek(ADDR as usize, 16).unwrap();
    let peer = InetAddr::decode(&raw).unwrap();
    let client_sock = client.file(fd as usize).unwrap().socket().unwrap();
    let client_local = stack.local_address(client_sock).unwrap();
    assert_eq!(peer, InetAddr::decode(client_local.as_bytes()).unwrap());
}

#[test]
fn test_peer_close_reads_end_of_stream() {
    let (gw, _stack) = gateway();
    let server = gw.spawn_process().unwrap();
    let client = gw.spawn_process().unwrap();
    let listen_fd = listening_socket(&gw, &server, 8084);

    let fd = stream_socket(&gw, &client) as u64;
    put_addr(&client, 8084);
    assert_eq!(call(&gw, &client, SYS_CONNECT, &[fd, ADDR, SOCKADDR_LEN]), 0);
    let conn = call(&gw, &server, SYS_ACCEPT, &[listen_fd, 0, 0]) as u64;

    assert!(client.fileclose(fd as usize));
    assert_eq!(call(&gw, &server, SYS_RECV, &[conn, BUF, 16]), 0);
    assert_eq!(call(&gw, &server, SYS_SEND, &[conn, BUF, 1]), -1);
}

#[test]
fn test_process_exit_releases_sockets() {
    let (gw, stack) = gateway();
    let server = gw.spawn_process().unwrap();
    listening_socket(&gw, &server, 8085);
    stream_socket(&gw, &server);
    assert_eq!(stack.live_sockets(), 2);

    assert_eq!(server.exit(), 5);
    assert_eq!(stack.live_sockets(), 0);
}

#[test]
fn test_concurrent_clients() {
    let (gw, stack) = gateway();
    let server = gw.spawn_process().unwrap();
    let listen_fd = listening_socket(&gw, &server, 8086);

    let clients: Vec<_> = (0..4u8)
        .map(|i| {
            let gw = gw.clone();
            thread::spawn(move || {
                let client = gw.spawn_process().unwrap();
                let fd = stream_socket(&gw, &client) as u64;
                put_addr(&client, 8086);
                assert_eq!(call(&gw, &client, SYS_CONNECT, &[fd, ADDR, SOCKADDR_LEN]), 0);
                assert!(client.poke(BUF as usize, &[i]));
                assert_eq!(call(&gw, &client, SYS_SEND, &[fd, BUF, 1]), 1);
                // Hold the connection open until the server has read
                assert_eq!(call(&gw, &client, SYS_RECV, &[fd, BUF, 1]), 1);
            })
        })
        .collect();

    let mut seen = Vec::new();
    for _ in 0..4 {
        let conn = call(&gw, &server, SYS_ACCEPT, &[listen_fd, 0, 0]);
        assert!(conn > 0);
        assert_eq!(call(&gw, &server, SYS_RECV, &[conn as u64, BUF, 1]), 1);
        seen.push(server.peek(BUF as usize, 1).unwrap()[0]);
        assert_eq!(call(&gw, &server, SYS_SEND, &[conn as u64, BUF, 1]), 1);
    }
    for client in clients {
        client.join().unwrap();
    }

    seen.sort_unstable();
    assert_eq!(seen, vec![0, 1, 2, 3]);
    assert_eq!(stack.stats().listening, 1);
}
