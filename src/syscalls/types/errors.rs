/*!
 * Gateway Error Types
 * Four-category failure taxonomy for the socket syscall gateway
 */

use crate::core::data_structures::InlineString;
use crate::core::errors::SocketError;
use crate::core::limits::SYSCALL_FAILURE;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which of the four failure categories an error belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Malformed integer or out-of-range pointer+length pair
    ArgumentValidation,
    /// Valid descriptor that does not refer to a socket
    DescriptorKind,
    /// Socket object, file, or descriptor-slot allocation failed
    ResourceExhaustion,
    /// Failure reported by the socket layer itself
    Delegate,
}

impl ErrorCategory {
    pub const ALL: [ErrorCategory; 4] = [
        ErrorCategory::ArgumentValidation,
        ErrorCategory::DescriptorKind,
        ErrorCategory::ResourceExhaustion,
        ErrorCategory::Delegate,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ArgumentValidation => "argument_validation",
            Self::DescriptorKind => "descriptor_kind",
            Self::ResourceExhaustion => "resource_exhaustion",
            Self::Delegate => "delegate",
        }
    }
}

/// Gateway operation errors
///
/// Every variant collapses to [`SYSCALL_FAILURE`] at the syscall boundary;
/// the variants exist so tests and future boundary protocols can tell the
/// causes apart.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(rename_all = "snake_case", tag = "error_type", content = "details")]
pub enum GatewayError {
    #[error("Invalid argument {index}: {reason}")]
    #[diagnostic(
        code(gateway::invalid_argument),
        help("Arguments are checked before any delegate call; nothing was modified.")
    )]
    InvalidArgument { index: usize, reason: InlineString },

    #[error("Descriptor {fd} is not a socket")]
    #[diagnostic(code(gateway::wrong_descriptor_kind))]
    WrongDescriptorKind { fd: usize },

    #[error("Resource exhausted: {0}")]
    #[diagnostic(
        code(gateway::resource_exhausted),
        help("Any partially acquired socket object has already been released.")
    )]
    ResourceExhausted(InlineString),

    #[error("Socket layer failure: {0}")]
    #[diagnostic(code(gateway::delegate))]
    Delegate(SocketError),
}

impl GatewayError {
    #[inline]
    pub fn invalid_argument(index: usize, reason: impl Into<InlineString>) -> Self {
        Self::InvalidArgument {
            index,
            reason: reason.into(),
        }
    }

    #[inline]
    pub fn resource_exhausted(what: impl Into<InlineString>) -> Self {
        Self::ResourceExhausted(what.into())
    }

    #[inline]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidArgument { .. } => ErrorCategory::ArgumentValidation,
            Self::WrongDescriptorKind { .. } => ErrorCategory::DescriptorKind,
            Self::ResourceExhausted(_) => ErrorCategory::ResourceExhaustion,
            Self::Delegate(_) => ErrorCategory::Delegate,
        }
    }

    /// The value user space sees: always the single failure sentinel
    #[inline]
    pub const fn to_raw(&self) -> i64 {
        SYSCALL_FAILURE
    }
}

impl From<SocketError> for GatewayError {
    fn from(err: SocketError) -> Self {
        match err {
            SocketError::Exhausted => Self::resource_exhausted("socket table full"),
            other => Self::Delegate(other),
        }
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;
