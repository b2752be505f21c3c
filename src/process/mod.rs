/*!
 * Process Module
 * The calling-process context every gateway operation receives explicitly
 */

mod fd;
mod file;
mod memory;

pub use fd::FdTable;
pub use file::{File, FileKind, FileTable};
pub use memory::AddressSpace;

use crate::core::cancel::CancelToken;
use crate::core::limits::CONSOLE_FDS;
use crate::core::types::{Fd, Pid, Size, UserAddr};
use crate::syscalls::GatewayResult;
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;
use tracing::info;

/// A user process as seen by the syscall layer
///
/// Holds the address space syscall arguments point into and the
/// descriptor table they index. Several threads may issue syscalls on
/// the same process; each table is locked only for the duration of a
/// single lookup or update, never across a blocking delegate call.
pub struct Process {
    pid: Pid,
    memory: Mutex<AddressSpace>,
    fds: Mutex<FdTable>,
    killed: CancelToken,
}

impl Process {
    /// Create a process with console files on descriptors 0, 1 and 2
    pub fn new(pid: Pid, files: &FileTable, memory_size: Size, nofile: usize) -> GatewayResult<Self> {
        let mut fds = FdTable::new(nofile);
        if nofile >= CONSOLE_FDS {
            let console = files.alloc(FileKind::Console)?;
            for _ in 0..CONSOLE_FDS {
                fds.fdalloc(Arc::clone(&console))?;
            }
        }

        info!(pid, memory_size, nofile, "process created");
        Ok(Self {
            pid,
            memory: Mutex::new(AddressSpace::new(memory_size)),
            fds: Mutex::new(fds),
            killed: CancelToken::new(),
        })
    }

    #[inline]
    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Lock the address space
    pub fn memory(&self) -> MutexGuard<'_, AddressSpace> {
        self.memory.lock()
    }

    /// Lock the descriptor table
    pub fn fds(&self) -> MutexGuard<'_, FdTable> {
        self.fds.lock()
    }

    /// Install a file in the lowest free descriptor
    pub fn fdalloc(&self, file: Arc<File>) -> GatewayResult<Fd> {
        self.fds.lock().fdalloc(file)
    }

    /// Look up the file behind a descriptor
    pub fn file(&self, fd: Fd) -> Option<Arc<File>> {
        self.fds.lock().get(fd).cloned()
    }

    /// Drop the descriptor's reference to its file
    pub fn fileclose(&self, fd: Fd) -> bool {
        // Take the file out first so its release runs without the table lock
        let file = self.fds.lock().close(fd);
        file.is_some()
    }

    /// Close `fd` only if it still refers to `file`
    pub fn fileclose_if(&self, fd: Fd, file: &Arc<File>) -> bool {
        let closed = self.fds.lock().close_if(fd, file);
        closed.is_some()
    }

    /// Copy bytes into user memory (test and loader helper)
    pub fn poke(&self, addr: UserAddr, data: &[u8]) -> bool {
        self.memory.lock().write(addr, data)
    }

    /// Copy bytes out of user memory (test and loader helper)
    pub fn peek(&self, addr: UserAddr, len: Size) -> Option<Vec<u8>> {
        self.memory.lock().read(addr, len).map(<[u8]>::to_vec)
    }

    /// Mark the process killed; its blocked accept/recv calls fail
    pub fn kill(&self) {
        self.killed.cancel();
        info!(pid = self.pid, "process killed");
    }

    pub fn is_killed(&self) -> bool {
        self.killed.is_cancelled()
    }

    /// Token blocking delegate calls wait against
    #[inline]
    pub fn cancel_token(&self) -> &CancelToken {
        &self.killed
    }

    /// Close every descriptor; returns how many were open
    pub fn exit(&self) -> usize {
        // Swap the table out so socket releases run without the lock held
        let mut table = std::mem::replace(&mut *self.fds.lock(), FdTable::new(0));
        let count = table.close_all();
        info!(pid = self.pid, closed = count, "process exited");
        count
    }
}

impl std::fmt::Debug for Process {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Process")
            .field("pid", &self.pid)
            .field("killed", &self.is_killed())
            .finish()
    }
}
