/*!
 * Shared helpers for gateway integration tests
 */

#![allow(dead_code)]

use socket_gateway::syscalls::{SYS_BIND, SYS_LISTEN, SYS_SOCKET};
use socket_gateway::{
    GatewayConfig, InetAddr, LoopbackStack, Process, SocketGateway, SyscallArgs, AF_INET,
    SOCK_DGRAM, SOCK_STREAM,
};
use std::sync::Arc;

pub const ADDR: u64 = 0x100;
pub const ADDRLEN: u64 = 0x200;
pub const BUF: u64 = 0x400;
pub const SOCKADDR_LEN: u64 = 16;

pub fn gateway() -> (SocketGateway, Arc<LoopbackStack>) {
    SocketGateway::with_loopback(GatewayConfig::default())
}

pub fn gateway_with(config: GatewayConfig) -> (SocketGateway, Arc<LoopbackStack>) {
    SocketGateway::with_loopback(config)
}

pub fn call(gateway: &SocketGateway, process: &Process, number: u32, regs: &[u64]) -> i64 {
    gateway.dispatch(process, number, SyscallArgs::from_slice(regs))
}

/// Write a loopback sockaddr_in at `ADDR`
pub fn put_addr(process: &Process, port: u16) {
    assert!(process.poke(ADDR as usize, &InetAddr::loopback(port).encode()));
}

pub fn put_addrlen(process: &Process, len: i32) {
    assert!(process.poke(ADDRLEN as usize, &len.to_le_bytes()));
}

pub fn read_addrlen(process: &Process) -> i32 {
    let raw = process.peek(ADDRLEN as usize, 4).unwrap();
    i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]])
}

pub fn stream_socket(gateway: &SocketGateway, process: &Process) -> i64 {
    call(gateway, process, SYS_SOCKET, &[AF_INET as u64, SOCK_STREAM as u64, 0])
}

pub fn datagram_socket(gateway: &SocketGateway, process: &Process) -> i64 {
    call(gateway, process, SYS_SOCKET, &[AF_INET as u64, SOCK_DGRAM as u64, 0])
}

/// socket + bind + listen on `port`, returning the listening fd
pub fn listening_socket(gateway: &SocketGateway, process: &Process, port: u16) -> u64 {
    let fd = stream_socket(gateway, process);
    assert!(fd >= 0);
    put_addr(process, port);
    assert_eq!(call(gateway, process, SYS_BIND, &[fd as u64, ADDR, SOCKADDR_LEN]), 0);
    assert_eq!(call(gateway, process, SYS_LISTEN, &[fd as u64, 5]), 0);
    fd as u64
}
