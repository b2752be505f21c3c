/*!
 * System Limits and Constants
 *
 * Centralized location for gateway-wide limits and magic numbers.
 * Values marked [XV6-COMPAT] match the host kernel's param.h.
 */

use std::time::Duration;

// =============================================================================
// SYSCALL BOUNDARY
// =============================================================================

/// Failure sentinel returned for every error category
pub const SYSCALL_FAILURE: i64 = -1;

/// Number of argument registers available to a syscall
pub const SYSCALL_ARG_COUNT: usize = 6;

// =============================================================================
// FILE LIMITS
// =============================================================================

/// Open files per process [XV6-COMPAT]
pub const NOFILE: usize = 16;

/// Open files system-wide [XV6-COMPAT]
pub const NFILE: usize = 100;

/// Descriptors 0, 1 and 2 are bound to the console at process creation
pub const CONSOLE_FDS: usize = 3;

// =============================================================================
// MEMORY LIMITS
// =============================================================================

/// Default simulated user address space (64KB)
pub const DEFAULT_USER_MEMORY: usize = 64 * 1024;

/// Size of the `int` that addrlen pointers refer to
pub const ADDRLEN_SIZE: usize = std::mem::size_of::<i32>();

// =============================================================================
// SOCKET LIMITS
// =============================================================================

/// Live socket objects in the loopback stack
pub const DEFAULT_MAX_SOCKETS: usize = 64;

/// Upper clamp for listen backlog
pub const DEFAULT_MAX_BACKLOG: usize = 16;

/// Queued receive entries per socket before senders are refused
pub const DEFAULT_RCVBUF_ENTRIES: usize = 256;

/// First ephemeral port handed to auto-bound sockets [LINUX-COMPAT]
pub const EPHEMERAL_PORT_START: u16 = 49152;

/// Blocking syscalls wait forever unless configured otherwise
pub const DEFAULT_BLOCK_TIMEOUT: Option<Duration> = None;

// =============================================================================
// OBSERVABILITY
// =============================================================================

/// Syscalls slower than this are logged at warn level
pub const SLOW_SYSCALL_THRESHOLD: Duration = Duration::from_millis(10);

/// Operations slower than this are logged at warn level
pub const SLOW_OPERATION_THRESHOLD: Duration = Duration::from_millis(100);
