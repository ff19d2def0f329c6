//! Error types for the amsibridge library.
//!
//! Provider-level failures are reported as [`ProviderFault`] and wrapped by
//! [`AmsiError`] with the operation that produced them. The library never
//! panics on provider failure; all errors are returned as `Result` values.

use crate::core::types::ScanVerdict;
use thiserror::Error;

/// A failure reported by a [`Provider`](crate::core::Provider) call.
#[derive(Debug, Error)]
pub enum ProviderFault {
    /// The provider returned a non-zero status code.
    #[error("provider returned status {status} ({status:#010x})")]
    Status {
        /// The raw status code.
        status: i32,
    },

    /// The call could not be carried out at all.
    #[error("{operation} failed: {message}")]
    Call {
        /// Name of the provider primitive.
        operation: &'static str,
        /// Human-readable description.
        message: String,
        /// Lower-level cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl ProviderFault {
    /// Creates a `Status` fault.
    pub fn status(status: i32) -> Self {
        Self::Status { status }
    }

    /// Creates a `Call` fault without a lower-level cause.
    pub fn call(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Call {
            operation,
            message: message.into(),
            source: None,
        }
    }

    /// Creates a `Call` fault wrapping a lower-level cause.
    pub fn call_with_source(
        operation: &'static str,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Call {
            operation,
            message: source.to_string(),
            source: Some(Box::new(source)),
        }
    }

    /// Returns the raw status code, if the provider returned one.
    pub fn status_code(&self) -> Option<i32> {
        match self {
            Self::Status { status } => Some(*status),
            Self::Call { .. } => None,
        }
    }
}

/// The main error type for scan operations.
#[derive(Debug, Error)]
pub enum AmsiError {
    /// A required argument was missing or malformed.
    #[error("invalid argument '{argument}': {reason}")]
    InvalidArgument {
        /// Name of the offending argument.
        argument: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// The provider connection could not be initialized.
    #[error("failed to initialize scan provider for application '{application_name}': {source}")]
    ProviderInitialization {
        /// The identity the context was initialized with.
        application_name: String,
        /// The underlying provider failure.
        #[source]
        source: ProviderFault,
    },

    /// A scan session could not be opened.
    #[error("failed to open a scan session: {source}")]
    SessionOpen {
        /// The underlying provider failure.
        #[source]
        source: ProviderFault,
    },

    /// The scan primitive failed.
    #[error("failed to scan '{content_name}': {source}")]
    ScanFailed {
        /// Name of the content being scanned.
        content_name: String,
        /// The underlying provider failure.
        #[source]
        source: ProviderFault,
    },

    /// Administrative policy on this machine does not allow scanning.
    #[error("admin policy does not allow scanning '{content_name}' (verdict {verdict})")]
    PolicyBlocked {
        /// Name of the content being scanned.
        content_name: String,
        /// The verdict returned by the provider.
        verdict: ScanVerdict,
    },

    /// The content does not fit the provider's length parameter or the configured limit.
    #[error("content size {size} bytes exceeds maximum {max} bytes")]
    ContentTooLarge {
        /// Actual content size in bytes.
        size: u64,
        /// Maximum allowed size in bytes.
        max: u64,
    },

    /// The context has already been disposed.
    #[error("scan context has been released")]
    ContextReleased,

    /// Reading or repositioning a stream failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An internal error occurred.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl AmsiError {
    /// Creates an `InvalidArgument` error.
    pub fn invalid_argument(argument: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            argument,
            reason: reason.into(),
        }
    }

    /// Creates an `Internal` error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns the raw provider status code carried by this error, if any.
    ///
    /// For `PolicyBlocked` this is the verdict code.
    pub fn status(&self) -> Option<i32> {
        match self {
            Self::ProviderInitialization { source, .. }
            | Self::SessionOpen { source }
            | Self::ScanFailed { source, .. } => source.status_code(),
            Self::PolicyBlocked { verdict, .. } => Some(verdict.code()),
            _ => None,
        }
    }

    /// Returns the content name if this error is associated with one.
    pub fn content_name(&self) -> Option<&str> {
        match self {
            Self::ScanFailed { content_name, .. } | Self::PolicyBlocked { content_name, .. } => {
                Some(content_name)
            }
            _ => None,
        }
    }

    /// Returns `true` if scanning was refused by administrative policy.
    pub fn is_policy_blocked(&self) -> bool {
        matches!(self, Self::PolicyBlocked { .. })
    }

    /// Returns `true` if the error was caused by the caller's input.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument { .. } | Self::ContentTooLarge { .. } | Self::ContextReleased
        )
    }
}

/// A specialized `Result` type for scan operations.
pub type AmsiResult<T> = Result<T, AmsiError>;
