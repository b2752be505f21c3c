/*!
 * Syscall Executor
 * Entry point for socket syscalls: dispatch, tracing, metrics and the
 * collapse of every failure to the boundary sentinel
 */

use super::args::{SyscallArgs, SyscallContext};
use super::numbers::SyscallNumber;
use super::types::{ErrorCategory, GatewayResult};
use crate::config::GatewayConfig;
use crate::core::limits::SYSCALL_FAILURE;
use crate::core::types::{Pid, SyscallRet};
use crate::monitoring::{span_syscall, GatewayMetrics};
use crate::net::{LoopbackStack, SocketLayer};
use crate::process::{FileTable, Process};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// Socket syscall gateway
///
/// Owns the system-wide file table and forwards validated calls to a
/// [`SocketLayer`]. Cloning shares all state.
#[derive(Clone)]
pub struct SocketGateway {
    pub(super) layer: Arc<dyn SocketLayer>,
    pub(super) files: FileTable,
    pub(super) metrics: Arc<GatewayMetrics>,
    config: Arc<GatewayConfig>,
    next_pid: Arc<AtomicU32>,
}

impl SocketGateway {
    pub fn new(layer: Arc<dyn SocketLayer>, config: GatewayConfig) -> Self {
        info!(
            nofile = config.nofile,
            nfile = config.nfile,
            "socket gateway initialized"
        );
        Self {
            layer,
            files: FileTable::new(config.nfile),
            metrics: Arc::new(GatewayMetrics::new()),
            config: Arc::new(config),
            next_pid: Arc::new(AtomicU32::new(1)),
        }
    }

    /// Gateway backed by an in-memory loopback stack built from `config`
    pub fn with_loopback(config: GatewayConfig) -> (Self, Arc<LoopbackStack>) {
        let stack = Arc::new(LoopbackStack::new(config.loopback.clone()));
        let layer: Arc<dyn SocketLayer> = stack.clone();
        (Self::new(layer, config), stack)
    }

    pub fn with_metrics(mut self, metrics: Arc<GatewayMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Create a process sized by the gateway configuration
    pub fn spawn_process(&self) -> GatewayResult<Arc<Process>> {
        let pid: Pid = self.next_pid.fetch_add(1, Ordering::Relaxed);
        let process = Process::new(
            pid,
            &self.files,
            self.config.user_memory_size,
            self.config.nofile,
        )?;
        Ok(Arc::new(process))
    }

    #[inline]
    pub fn layer(&self) -> &Arc<dyn SocketLayer> {
        &self.layer
    }

    #[inline]
    pub fn files(&self) -> &FileTable {
        &self.files
    }

    #[inline]
    pub fn metrics(&self) -> &Arc<GatewayMetrics> {
        &self.metrics
    }

    #[inline]
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Handle a trapped syscall and produce the raw return register
    ///
    /// Unknown numbers and every error category yield `-1`.
    pub fn dispatch(&self, process: &Process, number: u32, args: SyscallArgs) -> SyscallRet {
        match SyscallNumber::try_from(number) {
            Ok(call) => self.execute(process, call, args),
            Err(number) => {
                warn!(pid = process.pid(), number, "unknown syscall");
                self.metrics.record_unknown();
                SYSCALL_FAILURE
            }
        }
    }

    /// Run one socket syscall, collapsing the result to the boundary contract
    pub fn execute(&self, process: &Process, call: SyscallNumber, args: SyscallArgs) -> SyscallRet {
        let span = span_syscall(call.name(), process.pid());
        let _guard = span.enter();
        if call.may_block() {
            trace!(pid = process.pid(), syscall = call.name(), "syscall may block");
        }

        match self.invoke(process, call, args) {
            Ok(ret) => {
                self.metrics.record_success(call);
                span.record_return(ret);
                ret
            }
            Err(err) => {
                let category = err.category();
                self.metrics.record_failure(call, category);
                span.record_error(category.as_str(), &err.to_string());
                if category == ErrorCategory::Delegate {
                    warn!(pid = process.pid(), syscall = call.name(), error = %err, "socket layer failed");
                } else {
                    debug!(
                        pid = process.pid(),
                        syscall = call.name(),
                        category = category.as_str(),
                        error = %err,
                        "syscall rejected"
                    );
                }
                err.to_raw()
            }
        }
    }

    /// Run one socket syscall keeping the discriminated error
    pub fn invoke(
        &self,
        process: &Process,
        call: SyscallNumber,
        args: SyscallArgs,
    ) -> GatewayResult<SyscallRet> {
        let ctx = SyscallContext::new(process, args);
        let ret = match call {
            SyscallNumber::Socket => self.sys_socket(&ctx)?,
            SyscallNumber::Connect => self.sys_connect(&ctx)?,
            SyscallNumber::Bind => self.sys_bind(&ctx)?,
            SyscallNumber::Listen => self.sys_listen(&ctx)?,
            SyscallNumber::Accept => self.sys_accept(&ctx)?,
            SyscallNumber::Recv => self.sys_recv(&ctx)?,
            SyscallNumber::Send => self.sys_send(&ctx)?,
            SyscallNumber::Recvfrom => self.sys_recvfrom(&ctx)?,
            SyscallNumber::Sendto => self.sys_sendto(&ctx)?,
        };
        // Descriptors and byte counts are bounded by NOFILE and i32 lengths
        Ok(ret as SyscallRet)
    }
}

impl std::fmt::Debug for SocketGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketGateway")
            .field("files", &self.files)
            .field("config", &self.config)
            .finish()
    }
}
