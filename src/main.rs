/*!
 * Socket Gateway - Demo Entry Point
 *
 * Drives the syscall gateway the way user programs would:
 * - a server process binds, listens and accepts
 * - a client process connects and receives a greeting
 * - two datagram sockets exchange one message
 */

use anyhow::{bail, Context, Result};
use socket_gateway::syscalls::{
    SYS_ACCEPT, SYS_BIND, SYS_CONNECT, SYS_LISTEN, SYS_RECV, SYS_RECVFROM, SYS_SEND, SYS_SENDTO,
    SYS_SOCKET,
};
use socket_gateway::{
    init_tracing, GatewayConfig, InetAddr, Process, SocketGateway, SyscallArgs, AF_INET,
    SOCK_DGRAM, SOCK_STREAM, SYSCALL_FAILURE,
};
use std::sync::mpsc;
use std::thread;
use tracing::info;

const SERVER_PORT: u16 = 7070;
const DATAGRAM_PORT: u16 = 7071;

// User-memory layout shared by both demo processes
const ADDR_BUF: u64 = 0x100;
const ADDRLEN_BUF: u64 = 0x200;
const DATA_BUF: u64 = 0x400;

/// Issue one syscall and fail loudly on the boundary sentinel
fn syscall(gateway: &SocketGateway, process: &Process, number: u32, regs: &[u64]) -> Result<i64> {
    let ret = gateway.dispatch(process, number, SyscallArgs::from_slice(regs));
    if ret == SYSCALL_FAILURE {
        bail!("syscall {} failed for pid {}", number, process.pid());
    }
    Ok(ret)
}

/// Place a sockaddr_in in user memory and return its length
fn write_addr(process: &Process, port: u16) -> Result<u64> {
    let raw = InetAddr::loopback(port).encode();
    if !process.poke(ADDR_BUF as usize, &raw) {
        bail!("address buffer outside user memory");
    }
    Ok(raw.len() as u64)
}

fn stream_demo(gateway: &SocketGateway) -> Result<()> {
    let server = gateway.spawn_process()?;
    let listen_fd = syscall(gateway, &server, SYS_SOCKET, &[AF_INET as u64, SOCK_STREAM as u64, 0])? as u64;
    let addrlen = write_addr(&server, SERVER_PORT)?;
    syscall(gateway, &server, SYS_BIND, &[listen_fd, ADDR_BUF, addrlen])?;
    syscall(gateway, &server, SYS_LISTEN, &[listen_fd, 5])?;
    info!(fd = listen_fd, port = SERVER_PORT, "server listening");

    let (ready_tx, ready_rx) = mpsc::channel();
    let client_gateway = gateway.clone();
    let client = thread::spawn(move || -> Result<Vec<u8>> {
        let gateway = client_gateway;
        let client = gateway.spawn_process()?;
        let fd = syscall(&gateway, &client, SYS_SOCKET, &[AF_INET as u64, SOCK_STREAM as u64, 0])? as u64;
        let addrlen = write_addr(&client, SERVER_PORT)?;
        syscall(&gateway, &client, SYS_CONNECT, &[fd, ADDR_BUF, addrlen])?;
        ready_tx.send(()).context("server went away")?;

        let n = syscall(&gateway, &client, SYS_RECV, &[fd, DATA_BUF, 64])? as usize;
        let data = client
            .peek(DATA_BUF as usize, n)
            .context("receive buffer outside user memory")?;
        client.exit();
        Ok(data)
    });

    ready_rx.recv().context("client failed before connecting")?;
    server.poke(ADDRLEN_BUF as usize, &16i32.to_le_bytes());
    let conn_fd = syscall(gateway, &server, SYS_ACCEPT, &[listen_fd, ADDR_BUF, ADDRLEN_BUF])? as u64;
    let peer = server
        .peek(ADDR_BUF as usize, 16)
        .and_then(|raw| InetAddr::decode(&raw).ok())
        .context("accept returned no peer address")?;
    info!(fd = conn_fd, %peer, "connection accepted");

    server.poke(DATA_BUF as usize, b"hi");
    let sent = syscall(gateway, &server, SYS_SEND, &[conn_fd, DATA_BUF, 2])?;

    let received = client
        .join()
        .map_err(|_| anyhow::anyhow!("client thread panicked"))??;
    info!(sent, received = %String::from_utf8_lossy(&received), "stream exchange complete");
    server.exit();
    Ok(())
}

fn datagram_demo(gateway: &SocketGateway) -> Result<()> {
    let process = gateway.spawn_process()?;
    let rx = syscall(gateway, &process, SYS_SOCKET, &[AF_INET as u64, SOCK_DGRAM as u64, 0])? as u64;
    let tx = syscall(gateway, &process, SYS_SOCKET, &[AF_INET as u64, SOCK_DGRAM as u64, 0])? as u64;
    let addrlen = write_addr(&process, DATAGRAM_PORT)?;
    syscall(gateway, &process, SYS_BIND, &[rx, ADDR_BUF, addrlen])?;

    process.poke(DATA_BUF as usize, b"datagram");
    syscall(gateway, &process, SYS_SENDTO, &[tx, DATA_BUF, 8, ADDR_BUF, addrlen])?;

    // No interest in the sender: a null addrlen skips the address copy-out
    let n = syscall(gateway, &process, SYS_RECVFROM, &[rx, DATA_BUF, 64, 0, 0])? as usize;
    let data = process
        .peek(DATA_BUF as usize, n)
        .context("receive buffer outside user memory")?;
    info!(bytes = n, payload = %String::from_utf8_lossy(&data), "datagram received");
    process.exit();
    Ok(())
}

fn main() -> Result<()> {
    init_tracing();
    info!("Socket gateway demo starting...");

    let config = GatewayConfig::from_env();
    let (gateway, stack) = SocketGateway::with_loopback(config);

    stream_demo(&gateway)?;
    datagram_demo(&gateway)?;

    let snapshot = gateway.metrics().snapshot();
    info!(
        total_calls = snapshot.total_calls(),
        live_sockets = stack.live_sockets(),
        "demo finished"
    );
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}
