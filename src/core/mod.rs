/*!
 * Core Module
 * Fundamental gateway types, limits and error handling
 */

pub mod cancel;
pub mod data_structures;
pub mod errors;
pub mod guard;
pub mod limits;
pub mod types;

// Re-export for convenience
pub use cancel::{CancelToken, WakerRegistration};
pub use data_structures::InlineString;
pub use errors::*;
pub use guard::{Guard, GuardDrop, GuardError, GuardMetadata, GuardResult, SocketGuard};
pub use types::*;
