//! # Amsibridge
//!
//! A session-safe client for the Windows Anti-Malware Scan Interface (AMSI).
//!
//! ## Overview
//!
//! An application hands a buffer or stream to the system's antimalware
//! provider and gets back a verdict. Amsibridge takes care of the protocol
//! around that call:
//!
//! - One provider connection per application identity, released exactly once
//! - A fresh session opened and closed around every scan, on every exit path
//! - Raw verdict codes classified into `Clean`, `Infected` or `PolicyBlocked`
//! - Administrative blocks surfaced as errors, never as "clean"
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use amsibridge::ScanContext;
//!
//! fn main() -> Result<(), amsibridge::AmsiError> {
//!     let context = ScanContext::system(Some("my-service"))?;
//!
//!     if !context.is_available() {
//!         eprintln!("no working antimalware provider");
//!     }
//!
//!     if context.has_malware(b"uploaded bytes", "upload.bin")? {
//!         println!("Malware detected!");
//!     }
//!
//!     context.dispose();
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `default` - Includes tokio runtime support
//! - `tokio-runtime` - `SharedScanContext`, an async facade over a context
//!
//! ## Architecture
//!
//! - **Core**: Verdicts, outcomes, handles, the `Provider` trait and errors
//! - **Backends**: The Windows AMSI provider and a mock provider for tests
//! - **Context**: Connection lifecycle, sessions and scanning
//! - **Audit**: Structured lifecycle and scan events

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod audit;
pub mod backends;
pub mod context;
pub mod core;

/// The EICAR anti-malware test string. Every compliant provider detects it.
pub const EICAR_TEST_STRING: &str =
    r"X5O!P%@AP[4\PZX54(P^)7CC)7}$EICAR-STANDARD-ANTIVIRUS-TEST-FILE!$H+H*";

// Re-export commonly used types at the crate root
pub use crate::core::{
    AmsiError, AmsiResult, ContextHandle, Provider, ProviderFault, ScanOutcome, ScanReport,
    ScanVerdict, SessionHandle,
};

pub use crate::context::{ScanContext, ScanContextConfig};

#[cfg(feature = "tokio-runtime")]
pub use crate::context::SharedScanContext;

#[cfg(windows)]
pub use crate::backends::AmsiProvider;

/// Prelude module for convenient imports.
///
/// ```rust
/// use amsibridge::prelude::*;
/// ```
pub mod prelude {
    pub use crate::core::{
        AmsiError, AmsiResult, Provider, ProviderFault, ScanOutcome, ScanReport, ScanVerdict,
    };
    pub use crate::context::{ScanContext, ScanContextConfig};

    #[cfg(feature = "tokio-runtime")]
    pub use crate::context::SharedScanContext;

    #[cfg(windows)]
    pub use crate::backends::AmsiProvider;
}
