/*!
 * Socket Object Guards
 *
 * RAII ownership of a socket-layer object with automatic release
 */

use super::traits::{Guard, GuardDrop};
use super::{GuardError, GuardMetadata, GuardResult};
use crate::core::types::{Pid, SocketId};
use crate::net::SocketLayer;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// Owns one socket object; releases it through the layer on drop
pub struct SocketGuard {
    sock: SocketId,
    layer: Arc<dyn SocketLayer>,
    metadata: GuardMetadata,
    active: bool,
}

impl SocketGuard {
    pub fn new(sock: SocketId, layer: Arc<dyn SocketLayer>, pid: Pid) -> Self {
        trace!(pid, sock, "socket object acquired");
        Self {
            sock,
            layer,
            metadata: GuardMetadata::new("socket").with_pid(pid),
            active: true,
        }
    }

    #[inline]
    pub fn sock(&self) -> SocketId {
        self.sock
    }

    #[inline]
    pub fn layer(&self) -> &Arc<dyn SocketLayer> {
        &self.layer
    }
}

impl Guard for SocketGuard {
    fn resource_type(&self) -> &'static str {
        "socket"
    }

    fn metadata(&self) -> &GuardMetadata {
        &self.metadata
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn release(&mut self) -> GuardResult<()> {
        if !self.active {
            return Err(GuardError::AlreadyReleased);
        }

        self.active = false;
        self.layer.release(self.sock);
        debug!(
            sock = self.sock,
            pid = ?self.metadata.pid,
            lifetime_micros = self.metadata.lifetime_micros(),
            "socket object released"
        );
        Ok(())
    }
}

impl GuardDrop for SocketGuard {
    fn on_drop(&mut self) {
        if self.active {
            // Only fails when inactive, which was just ruled out
            let _ = self.release();
        }
    }
}

impl Drop for SocketGuard {
    fn drop(&mut self) {
        self.on_drop();
    }
}

impl fmt::Debug for SocketGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocketGuard")
            .field("sock", &self.sock)
            .field("active", &self.active)
            .finish()
    }
}
