/*!
 * Syscall Types Module
 * Error categories and results shared by every socket syscall
 */

mod errors;

pub use errors::{ErrorCategory, GatewayError, GatewayResult};
