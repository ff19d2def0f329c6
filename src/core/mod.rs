//! Core types and traits for the amsibridge library.
//!
//! - [`types`] - Verdict codes, outcomes and opaque handles
//! - [`traits`] - The `Provider` call interface
//! - [`error`] - Structured error types
//! - [`result`] - Scan report structure

pub mod error;
pub mod result;
pub mod traits;
pub mod types;

pub use error::{AmsiError, AmsiResult, ProviderFault};
pub use result::ScanReport;
pub use traits::{ArcProvider, BoxedProvider, Provider};
pub use types::{ContextHandle, ScanOutcome, ScanVerdict, SessionHandle};
