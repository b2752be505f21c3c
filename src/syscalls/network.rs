/*!
 * Network Syscalls
 * socket, connect, bind, listen, accept, recv, send, recvfrom, sendto
 *
 * Each handler validates every argument first, then checks that the
 * descriptor is a socket, then makes exactly one socket-layer call. A
 * failure before the delegate call leaves no trace; a failure after a new
 * socket object exists releases it through its guard.
 */

use super::args::{SyscallContext, UserPtr};
use super::executor::SocketGateway;
use super::types::{GatewayError, GatewayResult};
use crate::core::guard::SocketGuard;
use crate::core::types::{Fd, SocketId};
use crate::net::SocketAddress;
use crate::process::{File, FileKind};
use std::sync::Arc;
use tracing::{debug, trace};

/// The socket behind a descriptor, or a descriptor-kind failure
fn socket_of(fd: Fd, file: &File) -> GatewayResult<SocketId> {
    file.socket().ok_or_else(|| {
        trace!(fd, kind = file.kind().name(), "descriptor is not a socket");
        GatewayError::WrongDescriptorKind { fd }
    })
}

impl SocketGateway {
    /// Wrap a fresh socket object in a file and install it in the caller's table
    ///
    /// The guard, then the file, own the object at every step, so any
    /// failure here releases it. Returns the descriptor and the file it
    /// now refers to.
    fn install_socket(
        &self,
        ctx: &SyscallContext<'_>,
        sock: SocketId,
    ) -> GatewayResult<(Fd, Arc<File>)> {
        let guard = SocketGuard::new(sock, Arc::clone(&self.layer), ctx.pid());
        let file = self.files.alloc(FileKind::Socket(guard))?;
        let fd = ctx.process().fdalloc(Arc::clone(&file))?;
        Ok((fd, file))
    }

    /// Copy a peer address out through an optional addrlen/addr pair
    ///
    /// Writes at most `*addrlen` bytes and stores the full address length
    /// back into `*addrlen`.
    fn copy_out_address(
        &self,
        ctx: &SyscallContext<'_>,
        addr: Option<&UserPtr>,
        addrlen: Option<&UserPtr>,
        peer: &SocketAddress,
    ) -> GatewayResult<()> {
        let (Some(addr), Some(addrlen)) = (addr, addrlen) else {
            return Ok(());
        };
        let n = peer.len().min(addr.len());
        ctx.copy_out(addr, &peer.as_bytes()[..n])?;
        ctx.write_int(addrlen, i32::try_from(peer.len()).unwrap_or(i32::MAX))
    }

    /// Resolve the optional `(addr, addrlen)` output pair of accept/recvfrom
    ///
    /// A null addrlen means the caller does not want the address; the
    /// address pointer is then not examined at all.
    fn optional_address_out(
        &self,
        ctx: &SyscallContext<'_>,
        addr_arg: usize,
        addrlen_arg: usize,
    ) -> GatewayResult<(Option<UserPtr>, Option<UserPtr>)> {
        let Some(addrlen) = ctx.argaddrlen_opt(addrlen_arg)? else {
            return Ok((None, None));
        };
        let len = ctx.read_int(&addrlen)?;
        let addr = ctx.argptr(addr_arg, len)?;
        Ok((Some(addr), Some(addrlen)))
    }

    /// `socket(domain, type, protocol) -> fd`
    pub fn sys_socket(&self, ctx: &SyscallContext<'_>) -> GatewayResult<usize> {
        let domain = ctx.argint(0)?;
        let socket_type = ctx.argint(1)?;
        let protocol = ctx.argint(2)?;

        let sock = self.layer.alloc(domain, socket_type, protocol)?;
        let (fd, _) = self.install_socket(ctx, sock)?;
        debug!(pid = ctx.pid(), fd, sock, domain, socket_type, "socket created");
        Ok(fd)
    }

    /// `connect(fd, addr, addrlen) -> 0`
    pub fn sys_connect(&self, ctx: &SyscallContext<'_>) -> GatewayResult<usize> {
        let (fd, file) = ctx.argfd(0)?;
        let addrlen = ctx.argint(2)?;
        let addr = ctx.argptr(1, addrlen)?;
        let sock = socket_of(fd, &file)?;

        let addr = SocketAddress::from_bytes(ctx.copy_in(&addr)?);
        self.layer.connect(sock, &addr)?;
        Ok(0)
    }

    /// `bind(fd, addr, addrlen) -> 0`
    pub fn sys_bind(&self, ctx: &SyscallContext<'_>) -> GatewayResult<usize> {
        let (fd, file) = ctx.argfd(0)?;
        let addrlen = ctx.argint(2)?;
        let addr = ctx.argptr(1, addrlen)?;
        let sock = socket_of(fd, &file)?;

        let addr = SocketAddress::from_bytes(ctx.copy_in(&addr)?);
        self.layer.bind(sock, &addr)?;
        Ok(0)
    }

    /// `listen(fd, backlog) -> 0`
    pub fn sys_listen(&self, ctx: &SyscallContext<'_>) -> GatewayResult<usize> {
        let (fd, file) = ctx.argfd(0)?;
        let backlog = ctx.argint(1)?;
        let sock = socket_of(fd, &file)?;

        self.layer.listen(sock, backlog)?;
        Ok(0)
    }

    /// `accept(fd, addr?, addrlen?) -> new fd`
    pub fn sys_accept(&self, ctx: &SyscallContext<'_>) -> GatewayResult<usize> {
        let (fd, file) = ctx.argfd(0)?;
        let (addr, addrlen) = self.optional_address_out(ctx, 1, 2)?;
        let sock = socket_of(fd, &file)?;

        let accepted = self.layer.accept(sock, ctx.process().cancel_token())?;
        let (new_fd, installed) = self.install_socket(ctx, accepted.sock)?;

        if let Err(err) = self.copy_out_address(ctx, addr.as_ref(), addrlen.as_ref(), &accepted.peer) {
            // Another thread may already have closed and reused the slot
            ctx.process().fileclose_if(new_fd, &installed);
            return Err(err);
        }

        debug!(pid = ctx.pid(), listener = fd, fd = new_fd, sock = accepted.sock, "connection accepted");
        Ok(new_fd)
    }

    /// `recv(fd, buf, n) -> bytes received`
    pub fn sys_recv(&self, ctx: &SyscallContext<'_>) -> GatewayResult<usize> {
        let (fd, file) = ctx.argfd(0)?;
        let n = ctx.argint(2)?;
        let buf = ctx.argptr(1, n)?;
        let sock = socket_of(fd, &file)?;

        let mut data = vec![0u8; buf.len()];
        let got = self.layer.read(sock, &mut data, ctx.process().cancel_token())?;
        ctx.copy_out(&buf, &data[..got])?;
        Ok(got)
    }

    /// `send(fd, buf, n) -> bytes sent`
    pub fn sys_send(&self, ctx: &SyscallContext<'_>) -> GatewayResult<usize> {
        let (fd, file) = ctx.argfd(0)?;
        let n = ctx.argint(2)?;
        let buf = ctx.argptr(1, n)?;
        let sock = socket_of(fd, &file)?;

        let data = ctx.copy_in(&buf)?;
        Ok(self.layer.write(sock, &data)?)
    }

    /// `recvfrom(fd, buf, n, addr?, addrlen?) -> bytes received`
    pub fn sys_recvfrom(&self, ctx: &SyscallContext<'_>) -> GatewayResult<usize> {
        let (fd, file) = ctx.argfd(0)?;
        let n = ctx.argint(2)?;
        let buf = ctx.argptr(1, n)?;
        let (addr, addrlen) = self.optional_address_out(ctx, 3, 4)?;
        let sock = socket_of(fd, &file)?;

        let mut data = vec![0u8; buf.len()];
        let (got, from) = self.layer.recvfrom(sock, &mut data, ctx.process().cancel_token())?;
        ctx.copy_out(&buf, &data[..got])?;
        self.copy_out_address(ctx, addr.as_ref(), addrlen.as_ref(), &from)?;
        Ok(got)
    }

    /// `sendto(fd, buf, n, addr, addrlen) -> bytes sent`
    ///
    /// Unlike recvfrom, the address is mandatory.
    pub fn sys_sendto(&self, ctx: &SyscallContext<'_>) -> GatewayResult<usize> {
        let (fd, file) = ctx.argfd(0)?;
        let n = ctx.argint(2)?;
        let buf = ctx.argptr(1, n)?;
        let addrlen = ctx.argint(4)?;
        let addr = ctx.argptr(3, addrlen)?;
        let sock = socket_of(fd, &file)?;

        let data = ctx.copy_in(&buf)?;
        let addr = SocketAddress::from_bytes(ctx.copy_in(&addr)?);
        Ok(self.layer.sendto(sock, &data, &addr)?)
    }
}
