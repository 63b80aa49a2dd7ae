//! Handler failures and their classification

use crate::host::HostError;

/// Failure raised by a registered address handler
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HandlerError {
    /// Fewer arguments than the handler needs
    #[error("Expected {expected} argument(s), got {got}")]
    Arity { expected: usize, got: usize },

    /// Argument present but of the wrong type
    #[error("Argument {index} must be {expected}")]
    BadArgument { index: usize, expected: &'static str },

    /// The requested capability does not exist on this target
    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error(transparent)]
    Host(#[from] HostError),

    #[error("{0}")]
    Failed(String),
}

/// Coarse classification used at dispatch boundaries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Argument count or type mismatch
    Arity,
    /// Capability not available on the target (unknown or unobservable property)
    Unsupported,
    /// Target object no longer exists
    TargetGone,
    Other,
}

impl HandlerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            HandlerError::Arity { .. } | HandlerError::BadArgument { .. } => ErrorKind::Arity,
            HandlerError::Unsupported(_) => ErrorKind::Unsupported,
            HandlerError::Host(host) => match host {
                HostError::InvalidValue(_) => ErrorKind::Arity,
                HostError::UnknownProperty(_)
                | HostError::UnknownMethod(_)
                | HostError::NotListenable(_)
                | HostError::ReadOnly(_) => ErrorKind::Unsupported,
                HostError::TargetDestroyed | HostError::HookNotFound => ErrorKind::TargetGone,
                HostError::NotApplicable(_) => ErrorKind::Other,
            },
            HandlerError::Failed(_) => ErrorKind::Other,
        }
    }

    /// Errors that a wildcard fan-out skips without logging
    pub fn is_expected_in_fan_out(&self) -> bool {
        matches!(self.kind(), ErrorKind::Arity | ErrorKind::Unsupported)
    }
}
