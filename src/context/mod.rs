//! Provider connection lifecycle and scanning.
//!
//! - [`ScanContext`] - one provider connection and the scans made through it
//! - [`ScanContextConfig`] - construction options
//! - `SharedScanContext` - async facade (requires `tokio-runtime`)

mod config;
mod scan_context;
mod session;

#[cfg(feature = "tokio-runtime")]
mod shared;

pub use config::{ScanContextConfig, DEFAULT_PROBE_CONTENT_NAME, MAX_PROVIDER_BUFFER};
pub use scan_context::ScanContext;

#[cfg(feature = "tokio-runtime")]
pub use shared::SharedScanContext;
