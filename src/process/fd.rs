/*!
 * Descriptor Table
 * Per-process mapping from small integers to open files
 */

use super::file::File;
use crate::core::types::Fd;
use crate::syscalls::{GatewayError, GatewayResult};
use std::sync::Arc;
use tracing::trace;

/// Per-process open-file table (`ofile`)
pub struct FdTable {
    slots: Vec<Option<Arc<File>>>,
}

impl FdTable {
    pub fn new(nofile: usize) -> Self {
        Self {
            slots: vec![None; nofile],
        }
    }

    /// Install `file` in the lowest free slot (`fdalloc`)
    ///
    /// Consumes the reference: on failure it is dropped here, so a file
    /// whose only reference was this one is closed before returning.
    pub fn fdalloc(&mut self, file: Arc<File>) -> GatewayResult<Fd> {
        match self.slots.iter().position(Option::is_none) {
            Some(fd) => {
                trace!(fd, serial = file.serial(), "descriptor installed");
                self.slots[fd] = Some(file);
                Ok(fd)
            }
            None => Err(GatewayError::resource_exhausted("no free fd")),
        }
    }

    pub fn get(&self, fd: Fd) -> Option<&Arc<File>> {
        self.slots.get(fd).and_then(Option::as_ref)
    }

    /// Empty the slot (`fileclose` on the descriptor's reference)
    pub fn close(&mut self, fd: Fd) -> Option<Arc<File>> {
        self.slots.get_mut(fd).and_then(Option::take)
    }

    /// Empty the slot only while it still holds `file`
    pub fn close_if(&mut self, fd: Fd, file: &Arc<File>) -> Option<Arc<File>> {
        let slot = self.slots.get_mut(fd)?;
        if matches!(slot, Some(current) if Arc::ptr_eq(current, file)) {
            slot.take()
        } else {
            None
        }
    }

    /// Table size (`NOFILE`)
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn open_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Drop every reference (process exit)
    pub fn close_all(&mut self) -> usize {
        let mut closed = 0;
        for slot in &mut self.slots {
            if slot.take().is_some() {
                closed += 1;
            }
        }
        closed
    }
}
