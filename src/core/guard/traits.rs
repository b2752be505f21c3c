/*!
 * Guard Traits
 *
 * Core abstractions for RAII resource guards
 */

use super::{GuardMetadata, GuardResult};

/// Core guard trait
pub trait Guard: Send {
    /// Resource type name for logging/debugging
    fn resource_type(&self) -> &'static str;

    fn metadata(&self) -> &GuardMetadata;

    /// Check if guard still owns its resource
    fn is_active(&self) -> bool;

    /// Release the resource now
    ///
    /// Returns `Err` if already released
    fn release(&mut self) -> GuardResult<()>;
}

/// Guards with custom cleanup on drop
///
/// Separates Drop logic for better testability
pub trait GuardDrop: Guard {
    /// Perform cleanup on drop
    ///
    /// Must not panic. Log errors instead.
    fn on_drop(&mut self);
}
