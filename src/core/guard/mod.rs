/*!
 * RAII Resource Guards
 *
 * Scoped ownership of kernel objects that must be released exactly once.
 *
 * A socket object allocated for `socket` or `accept` is wrapped in a
 * [`SocketGuard`] immediately. If any later step fails (file-table or
 * descriptor-slot allocation, copy-out), dropping the guard returns the
 * object to the socket layer, so the create path has no manual unwind.
 *
 * ## Example
 *
 * ```ignore
 * let guard = SocketGuard::new(layer.alloc(AF_INET, SOCK_STREAM, 0)?, layer.clone(), pid);
 * let file = files.alloc(FileKind::Socket(guard))?; // guard released on Err
 * let fd = process.fdalloc(file)?;                   // file (and socket) released on Err
 * ```
 */

mod socket;
mod traits;

pub use socket::SocketGuard;
pub use traits::{Guard, GuardDrop};

use crate::core::types::Pid;
use std::time::Instant;

/// Result type for guard operations
pub type GuardResult<T> = Result<T, GuardError>;

/// Errors that can occur during guard operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GuardError {
    #[error("Resource already released")]
    AlreadyReleased,
}

/// Guard metadata for observability
#[derive(Debug, Clone)]
pub struct GuardMetadata {
    pub resource_type: &'static str,
    pub creation_time: Instant,
    pub pid: Option<Pid>,
}

impl GuardMetadata {
    #[inline]
    pub fn new(resource_type: &'static str) -> Self {
        Self {
            resource_type,
            creation_time: Instant::now(),
            pid: None,
        }
    }

    #[inline]
    pub fn with_pid(mut self, pid: Pid) -> Self {
        self.pid = Some(pid);
        self
    }

    #[inline]
    pub fn lifetime_micros(&self) -> u64 {
        self.creation_time.elapsed().as_micros() as u64
    }
}
