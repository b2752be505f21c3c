/*!
 * Monitoring
 * Structured tracing and gateway metrics
 */

mod metrics;
mod tracer;

pub use metrics::{GatewayMetrics, MetricsSnapshot, SyscallCounters};
pub use tracer::{
    generate_trace_id, init_tracing, span_operation, span_syscall, OperationSpan, SyscallSpan,
};
