/*!
 * Syscall Arguments
 * Validated fetch of integers, user pointers and descriptors
 *
 * Every handler receives a [`SyscallContext`] naming the calling process
 * and its raw argument registers. Nothing here trusts a register value:
 * integers are range-checked, pointer+length pairs must lie inside the
 * caller's address space, and descriptors must name an open slot. Only a
 * [`UserPtr`] produced by `argptr` can be copied through.
 */

use super::types::{GatewayError, GatewayResult};
use crate::core::limits::{ADDRLEN_SIZE, SYSCALL_ARG_COUNT};
use crate::core::types::{Fd, Pid, Size, UserAddr};
use crate::process::{File, Process};
use std::sync::Arc;
use tracing::debug;

/// Raw argument registers of one syscall invocation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyscallArgs([u64; SYSCALL_ARG_COUNT]);

impl SyscallArgs {
    pub const fn new(regs: [u64; SYSCALL_ARG_COUNT]) -> Self {
        Self(regs)
    }

    /// Build from up to six values; missing registers are zero
    pub fn from_slice(values: &[u64]) -> Self {
        let mut regs = [0u64; SYSCALL_ARG_COUNT];
        for (reg, value) in regs.iter_mut().zip(values) {
            *reg = *value;
        }
        Self(regs)
    }

    /// Encode a signed int the way a 64-bit register carries it
    #[inline]
    pub const fn int(value: i32) -> u64 {
        value as i64 as u64
    }

    #[inline]
    pub fn raw(&self, n: usize) -> Option<u64> {
        self.0.get(n).copied()
    }
}

/// A user pointer whose `[addr, addr + len)` range has been validated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserPtr {
    index: usize,
    addr: UserAddr,
    len: Size,
}

impl UserPtr {
    #[inline]
    pub fn addr(&self) -> UserAddr {
        self.addr
    }

    #[inline]
    pub fn len(&self) -> Size {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Explicit calling context: the process plus its argument registers
pub struct SyscallContext<'p> {
    process: &'p Process,
    args: SyscallArgs,
}

impl<'p> SyscallContext<'p> {
    pub fn new(process: &'p Process, args: SyscallArgs) -> Self {
        Self { process, args }
    }

    #[inline]
    pub fn process(&self) -> &'p Process {
        self.process
    }

    #[inline]
    pub fn pid(&self) -> Pid {
        self.process.pid()
    }

    fn reg(&self, n: usize) -> GatewayResult<u64> {
        self.args
            .raw(n)
            .ok_or_else(|| GatewayError::invalid_argument(n, "no such register"))
    }

    /// Fetch argument `n` as a 32-bit signed integer
    pub fn argint(&self, n: usize) -> GatewayResult<i32> {
        let raw = self.reg(n)? as i64;
        i32::try_from(raw).map_err(|_| {
            debug!(pid = self.pid(), arg = n, raw, "integer argument out of range");
            GatewayError::invalid_argument(n, "int out of range")
        })
    }

    fn argaddr(&self, n: usize) -> GatewayResult<UserAddr> {
        let raw = self.reg(n)?;
        UserAddr::try_from(raw).map_err(|_| GatewayError::invalid_argument(n, "address too wide"))
    }

    /// Fetch argument `n` as a pointer to `size` bytes of user memory
    ///
    /// Fails for a negative size or any part of the range outside the
    /// caller's address space.
    pub fn argptr(&self, n: usize, size: i32) -> GatewayResult<UserPtr> {
        let addr = self.argaddr(n)?;
        let len = Size::try_from(size).map_err(|_| {
            debug!(pid = self.pid(), arg = n, size, "negative pointer length");
            GatewayError::invalid_argument(n, "negative length")
        })?;

        if !self.process.memory().contains(addr, len) {
            debug!(pid = self.pid(), arg = n, addr, len, "pointer outside address space");
            return Err(GatewayError::invalid_argument(n, "pointer out of range"));
        }

        Ok(UserPtr { index: n, addr, len })
    }

    /// Like `argptr`, but a zero register means "not supplied"
    pub fn argptr_opt(&self, n: usize, size: i32) -> GatewayResult<Option<UserPtr>> {
        if self.reg(n)? == 0 {
            return Ok(None);
        }
        self.argptr(n, size).map(Some)
    }

    /// Optional pointer to an `int` address length
    pub fn argaddrlen_opt(&self, n: usize) -> GatewayResult<Option<UserPtr>> {
        self.argptr_opt(n, ADDRLEN_SIZE as i32)
    }

    /// Fetch argument `n` as an open descriptor and the file behind it
    pub fn argfd(&self, n: usize) -> GatewayResult<(Fd, Arc<File>)> {
        let raw = self.argint(n)?;
        let fd = Fd::try_from(raw).map_err(|_| GatewayError::invalid_argument(n, "negative fd"))?;

        let fds = self.process.fds();
        if fd >= fds.capacity() {
            return Err(GatewayError::invalid_argument(n, "fd out of range"));
        }
        let file = fds
            .get(fd)
            .cloned()
            .ok_or_else(|| GatewayError::invalid_argument(n, "empty fd slot"))?;
        Ok((fd, file))
    }

    /// Copy the bytes a validated pointer covers into the kernel
    pub fn copy_in(&self, ptr: &UserPtr) -> GatewayResult<Vec<u8>> {
        self.process
            .memory()
            .read(ptr.addr, ptr.len)
            .map(<[u8]>::to_vec)
            .ok_or_else(|| GatewayError::invalid_argument(ptr.index, "copy-in fault"))
    }

    /// Copy `data` out through a validated pointer
    ///
    /// `data` must fit the validated length.
    pub fn copy_out(&self, ptr: &UserPtr, data: &[u8]) -> GatewayResult<()> {
        if data.len() > ptr.len || !self.process.memory().write(ptr.addr, data) {
            return Err(GatewayError::invalid_argument(ptr.index, "copy-out fault"));
        }
        Ok(())
    }

    /// Read the `int` a validated pointer refers to
    pub fn read_int(&self, ptr: &UserPtr) -> GatewayResult<i32> {
        if ptr.len < ADDRLEN_SIZE {
            return Err(GatewayError::invalid_argument(ptr.index, "short int pointer"));
        }
        self.process
            .memory()
            .read_i32(ptr.addr)
            .ok_or_else(|| GatewayError::invalid_argument(ptr.index, "copy-in fault"))
    }

    pub fn write_int(&self, ptr: &UserPtr, value: i32) -> GatewayResult<()> {
        if ptr.len < ADDRLEN_SIZE || !self.process.memory().write_i32(ptr.addr, value) {
            return Err(GatewayError::invalid_argument(ptr.index, "copy-out fault"));
        }
        Ok(())
    }
}
