/*!
 * Core Types
 * Common types used across the gateway
 */

/// Process ID type
pub type Pid = u32;

/// File descriptor type (index into a process's open-file table)
pub type Fd = usize;

/// Kernel-side socket object handle, issued by the socket layer
pub type SocketId = u32;

/// User virtual address
pub type UserAddr = usize;

/// Size type for memory operations
pub type Size = usize;

/// Raw integer returned across the syscall boundary
pub type SyscallRet = i64;

/// Socket address family (`AF_*`)
pub type Domain = i32;

/// Socket type (`SOCK_*`)
pub type SocketType = i32;

/// Transport protocol number (0 selects the family default)
pub type Protocol = i32;
