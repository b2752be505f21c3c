/*!
 * Open Files
 * Reference-counted file objects and the system-wide file table
 */

use crate::core::guard::SocketGuard;
use crate::core::types::SocketId;
use crate::syscalls::{GatewayError, GatewayResult};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

/// What an open file refers to
#[derive(Debug)]
pub enum FileKind {
    /// Console device bound to descriptors 0-2
    Console,
    Pipe,
    Inode,
    /// Socket object; released when the last reference to the file drops
    Socket(SocketGuard),
}

impl FileKind {
    pub fn name(&self) -> &'static str {
        match self {
            FileKind::Console => "console",
            FileKind::Pipe => "pipe",
            FileKind::Inode => "inode",
            FileKind::Socket(_) => "socket",
        }
    }
}

/// Open file shared by every descriptor that refers to it
///
/// `Arc<File>` plays the role of the file reference count: dropping the
/// last `Arc` closes the file and frees its file-table slot.
pub struct File {
    kind: FileKind,
    slot: FileSlot,
}

impl File {
    #[inline]
    pub fn kind(&self) -> &FileKind {
        &self.kind
    }

    /// Socket handle, or `None` when the file is some other kind
    #[inline]
    pub fn socket(&self) -> Option<SocketId> {
        match &self.kind {
            FileKind::Socket(guard) => Some(guard.sock()),
            _ => None,
        }
    }

    #[inline]
    pub fn is_socket(&self) -> bool {
        matches!(self.kind, FileKind::Socket(_))
    }

    /// Position of this file in the file table's allocation order
    #[inline]
    pub fn serial(&self) -> u64 {
        self.slot.serial
    }
}

impl fmt::Debug for File {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("File")
            .field("kind", &self.kind.name())
            .field("serial", &self.slot.serial)
            .finish()
    }
}

/// Occupancy token for one file-table entry
struct FileSlot {
    serial: u64,
    open: Arc<AtomicUsize>,
}

impl Drop for FileSlot {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::AcqRel);
        trace!(serial = self.serial, "file table slot freed");
    }
}

/// System-wide table of open files (`ftable`)
#[derive(Clone)]
pub struct FileTable {
    capacity: usize,
    open: Arc<AtomicUsize>,
    serial: Arc<AtomicUsize>,
}

impl FileTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            open: Arc::new(AtomicUsize::new(0)),
            serial: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Allocate a file of the given kind (`filealloc`)
    ///
    /// When the table is full the kind is dropped, which releases any
    /// socket object it carries.
    pub fn alloc(&self, kind: FileKind) -> GatewayResult<Arc<File>> {
        let reserved = self
            .open
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |open| {
                (open < self.capacity).then_some(open + 1)
            });

        if reserved.is_err() {
            debug!(capacity = self.capacity, kind = kind.name(), "file table full");
            return Err(GatewayError::resource_exhausted("file table full"));
        }

        let serial = self.serial.fetch_add(1, Ordering::Relaxed) as u64;
        Ok(Arc::new(File {
            kind,
            slot: FileSlot {
                serial,
                open: Arc::clone(&self.open),
            },
        }))
    }

    /// Files currently open system-wide
    #[inline]
    pub fn open_files(&self) -> usize {
        self.open.load(Ordering::Acquire)
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl fmt::Debug for FileTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileTable")
            .field("open", &self.open_files())
            .field("capacity", &self.capacity)
            .finish()
    }
}
