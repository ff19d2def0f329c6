//! Provider implementations.
//!
//! This module contains implementations of the `Provider` trait.
//!
//! ## Available Backends
//!
//! - [`mock`] - A scripted in-process provider for testing
//! - `amsi` - The Windows system provider (Windows only)
//!
//! ## Implementing a Custom Backend
//!
//! ```rust,ignore
//! use amsibridge::core::{ContextHandle, Provider, ProviderFault, ScanVerdict, SessionHandle};
//!
//! #[derive(Debug)]
//! pub struct MyProvider;
//!
//! impl Provider for MyProvider {
//!     fn initialize(&self, application_name: &str) -> Result<ContextHandle, ProviderFault> {
//!         todo!()
//!     }
//!     // ...
//! }
//! ```

pub mod mock;

#[cfg(windows)]
pub mod amsi;

pub use mock::{MockFault, MockProvider, Primitive};

#[cfg(windows)]
pub use amsi::AmsiProvider;
