/*!
 * Structured Tracing
 * Syscall and operation spans using the tracing crate
 *
 * Features:
 * - Trace ID per syscall for correlating blocked calls with their wakeups
 * - JSON-formatted logs for structured parsing
 * - Slow-call warnings for syscalls that blocked in the socket layer
 */

use crate::core::limits::{SLOW_OPERATION_THRESHOLD, SLOW_SYSCALL_THRESHOLD};
use std::time::Instant;
use tracing::{debug, info, span, warn, Level};
use tracing_subscriber::{
    fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};
use uuid::Uuid;

/// Initialize structured tracing
///
/// Environment variables:
/// - RUST_LOG: Set log level (default: info)
/// - GATEWAY_TRACE_JSON: Enable JSON output (default: false)
///
/// Calling it again after a subscriber is installed is a no-op.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let use_json = std::env::var("GATEWAY_TRACE_JSON")
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = if use_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_thread_names(true)
                    .compact(),
            )
            .try_init()
    };

    if installed.is_ok() {
        info!(json = use_json, "structured tracing initialized");
    }
}

/// Generate a unique trace ID for request correlation
pub fn generate_trace_id() -> String {
    Uuid::new_v4().to_string()
}

/// Span covering one syscall from argument fetch to return value
pub struct SyscallSpan {
    span: tracing::Span,
    start: Instant,
    syscall_name: &'static str,
    trace_id: String,
}

impl SyscallSpan {
    pub fn new(syscall_name: &'static str, pid: u32) -> Self {
        let trace_id = generate_trace_id();

        let span = span!(
            Level::DEBUG,
            "syscall",
            trace_id = %trace_id,
            syscall = syscall_name,
            pid = pid,
            duration_us = tracing::field::Empty,
            result = tracing::field::Empty,
            error = tracing::field::Empty,
            category = tracing::field::Empty,
            return_value = tracing::field::Empty,
        );

        Self {
            span,
            start: Instant::now(),
            syscall_name,
            trace_id,
        }
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    pub fn record_return(&self, value: i64) {
        self.span.record("return_value", value);
        self.span.record("result", "success");
    }

    pub fn record_error(&self, category: &'static str, error: &str) {
        self.span.record("category", category);
        self.span.record("error", error);
        self.span.record("result", "error");
    }

    /// Enter the span context
    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }
}

impl Drop for SyscallSpan {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        let _entered = self.span.enter();
        self.span.record("duration_us", duration.as_micros() as u64);

        if duration > SLOW_SYSCALL_THRESHOLD {
            // Usually a blocking accept/recv; worth seeing at default level
            warn!(
                trace_id = %self.trace_id,
                syscall = self.syscall_name,
                duration_ms = duration.as_millis() as u64,
                slow = true,
                "slow syscall detected"
            );
        } else {
            debug!(
                syscall = self.syscall_name,
                duration_us = duration.as_micros() as u64,
                "syscall completed"
            );
        }
    }
}

/// Span for internal operations (socket-layer work, cleanup)
pub struct OperationSpan {
    span: tracing::Span,
    start: Instant,
}

impl OperationSpan {
    pub fn new(operation: &'static str) -> Self {
        let span = span!(
            Level::DEBUG,
            "operation",
            operation = operation,
            duration_us = tracing::field::Empty,
            result = tracing::field::Empty,
            items_processed = tracing::field::Empty,
        );

        Self {
            span,
            start: Instant::now(),
        }
    }

    pub fn record_result(&self, success: bool) {
        self.span
            .record("result", if success { "success" } else { "error" });
    }

    pub fn record_items_processed(&self, count: usize) {
        self.span.record("items_processed", count as u64);
    }

    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }
}

impl Drop for OperationSpan {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        let _entered = self.span.enter();
        self.span.record("duration_us", duration.as_micros() as u64);

        if duration > SLOW_OPERATION_THRESHOLD {
            warn!(
                duration_ms = duration.as_millis() as u64,
                slow = true,
                "slow operation detected"
            );
        }
    }
}

/// Helper to create a syscall span
#[inline]
pub fn span_syscall(name: &'static str, pid: u32) -> SyscallSpan {
    SyscallSpan::new(name, pid)
}

/// Helper to create an operation span
#[inline]
pub fn span_operation(name: &'static str) -> OperationSpan {
    OperationSpan::new(name)
}
