/*!
 * Blocking accept and recv
 */

use crate::common::*;
use pretty_assertions::assert_eq;
use socket_gateway::syscalls::{SYS_ACCEPT, SYS_CONNECT, SYS_RECV, SYS_SEND};
use socket_gateway::{ErrorCategory, GatewayConfig, LoopbackConfig};
use std::thread;
use std::time::{Duration, Instant};

#[test]
fn test_accept_waits_for_connect() {
    let (gw, _stack) = gateway();
    let server = gw.spawn_process().unwrap();
    let listen_fd = listening_socket(&gw, &server, 9400);

    let acceptor = {
        let gw = gw.clone();
        let server = server.clone();
        thread::spawn(move || call(&gw, &server, SYS_ACCEPT, &[listen_fd, 0, 0]))
    };
    thread::sleep(Duration::from_millis(50));

    let client = gw.spawn_process().unwrap();
    let fd = stream_socket(&gw, &client) as u64;
    put_addr(&client, 9400);
    assert_eq!(call(&gw, &client, SYS_CONNECT, &[fd, ADDR, SOCKADDR_LEN]), 0);

    assert_eq!(acceptor.join().unwrap(), 4);
}

#[test]
fn test_recv_waits_for_send() {
    let (gw, _stack) = gateway();
    let server = gw.spawn_process().unwrap();
    let client = gw.spawn_process().unwrap();
    let listen_fd = listening_socket(&gw, &server, 9401);

    let fd = stream_socket(&gw, &client) as u64;
    put_addr(&client, 9401);
    assert_eq!(call(&gw, &client, SYS_CONNECT, &[fd, ADDR, SOCKADDR_LEN]), 0);
    let conn = call(&gw, &server, SYS_ACCEPT, &[listen_fd, 0, 0]) as u64;

    let reader = {
        let gw = gw.clone();
        let client = client.clone();
        thread::spawn(move || {
            let n = call(&gw, &client, SYS_RECV, &[fd, BUF, 32]);
            (n, client.peek(BUF as usize, 4).unwrap())
        })
    };
    thread::sleep(Duration::from_millis(50));

    assert!(server.poke(BUF as usize, b"pong"));
    assert_eq!(call(&gw, &server, SYS_SEND, &[conn, BUF, 4]), 4);
    assert_eq!(reader.join().unwrap(), (4, b"pong".to_vec()));
}

#[test]
fn test_block_timeout_fails_call() {
    let (gw, _stack) = gateway_with(GatewayConfig {
        loopback: LoopbackConfig {
            block_timeout_ms: Some(30),
            ..LoopbackConfig::default()
        },
        ..GatewayConfig::default()
    });
    let server = gw.spawn_process().unwrap();
    let listen_fd = listening_socket(&gw, &server, 9402);

    let started = Instant::now();
    assert_eq!(call(&gw, &server, SYS_ACCEPT, &[listen_fd, 0, 0]), -1);
    assert!(started.elapsed() >= Duration::from_millis(30));
    assert_eq!(gw.metrics().failures(ErrorCategory::Delegate), 1);
}

#[test]
fn test_other_descriptors_usable_while_blocked() {
    let (gw, _stack) = gateway();
    let server = gw.spawn_process().unwrap();
    let listen_fd = listening_socket(&gw, &server, 9403);

    let acceptor = {
        let gw = gw.clone();
        let server = server.clone();
        thread::spawn(move || call(&gw, &server, SYS_ACCEPT, &[listen_fd, 0, 0]))
    };
    thread::sleep(Duration::from_millis(20));

    // The blocked accept holds no descriptor-table lock
    assert_eq!(stream_socket(&gw, &server), 4);

    let client = gw.spawn_process().unwrap();
    let fd = stream_socket(&gw, &client) as u64;
    put_addr(&client, 9403);
    assert_eq!(call(&gw, &client, SYS_CONNECT, &[fd, ADDR, SOCKADDR_LEN]), 0);
    assert_eq!(acceptor.join().unwrap(), 5);
}

#[test]
fn test_kill_interrupts_blocked_accept() {
    let (gw, stack) = gateway();
    let server = gw.spawn_process().unwrap();
    let listen_fd = listening_socket(&gw, &server, 9404);

    let acceptor = {
        let gw = gw.clone();
        let server = server.clone();
        thread::spawn(move || call(&gw, &server, SYS_ACCEPT, &[listen_fd, 0, 0]))
    };
    thread::sleep(Duration::from_millis(50));
    server.kill();

    assert_eq!(acceptor.join().unwrap(), -1);
    assert!(server.is_killed());
    assert_eq!(gw.metrics().failures(ErrorCategory::Delegate), 1);
    // Only the listener remains; no connection was fabricated
    assert_eq!(stack.live_sockets(), 1);
}

#[test]
fn test_kill_interrupts_blocked_recv() {
    let (gw, _stack) = gateway();
    let server = gw.spawn_process().unwrap();
    let client = gw.spawn_process().unwrap();
    let listen_fd = listening_socket(&gw, &server, 9405);

    let fd = stream_socket(&gw, &client) as u64;
    put_addr(&client, 9405);
    assert_eq!(call(&gw, &client, SYS_CONNECT, &[fd, ADDR, SOCKADDR_LEN]), 0);
    assert_eq!(call(&gw, &server, SYS_ACCEPT, &[listen_fd, 0, 0]), 4);

    let reader = {
        let gw = gw.clone();
        let client = client.clone();
        thread::spawn(move || call(&gw, &client, SYS_RECV, &[fd, BUF, 32]))
    };
    thread::sleep(Duration::from_millis(50));
    client.kill();

    assert_eq!(reader.join().unwrap(), -1);
}

#[test]
fn test_kill_leaves_other_processes_blocked() {
    let (gw, _stack) = gateway_with(GatewayConfig {
        loopback: LoopbackConfig {
            block_timeout_ms: Some(150),
            ..LoopbackConfig::default()
        },
        ..GatewayConfig::default()
    });
    let server = gw.spawn_process().unwrap();
    let bystander = gw.spawn_process().unwrap();
    let listen_fd = listening_socket(&gw, &server, 9406);

    let acceptor = {
        let gw = gw.clone();
        let server = server.clone();
        thread::spawn(move || {
            let started = Instant::now();
            (call(&gw, &server, SYS_ACCEPT, &[listen_fd, 0, 0]), started.elapsed())
        })
    };
    thread::sleep(Duration::from_millis(20));
    bystander.kill();

    // Runs into the block timeout instead of returning early
    let (result, waited) = acceptor.join().unwrap();
    assert_eq!(result, -1);
    assert!(waited >= Duration::from_millis(150));
}
