//! Core traits for the amsibridge library.
//!
//! This module defines the `Provider` trait: the narrow call interface to a
//! native scanning provider. Every primitive follows the provider's status
//! convention (zero is success); non-zero statuses surface as
//! [`ProviderFault::Status`].

use crate::core::error::ProviderFault;
use crate::core::types::{ContextHandle, ScanVerdict, SessionHandle};

use std::fmt::Debug;
use std::sync::Arc;

/// The call interface of a malware scanning provider.
///
/// # Implementation Notes
///
/// - Implementations must be `Send + Sync`; [`ScanContext`](crate::ScanContext)
///   serializes session and scan calls per context handle, so providers need
///   not be reentrant on a single handle.
/// - Release primitives take their handle by value. A handle passed to
///   `uninitialize` or `close_session` is never used again.
/// - Report failures as `ProviderFault`. A panic inside a primitive is caught
///   by [`ScanContext`](crate::ScanContext) and surfaces as a
///   [`ProviderFault::Call`] naming the primitive.
pub trait Provider: Send + Sync + Debug {
    /// Opens a connection to the provider for the given application identity.
    fn initialize(&self, application_name: &str) -> Result<ContextHandle, ProviderFault>;

    /// Releases a provider connection.
    fn uninitialize(&self, context: ContextHandle) -> Result<(), ProviderFault>;

    /// Opens a scan session on a connection.
    fn open_session(&self, context: &ContextHandle) -> Result<SessionHandle, ProviderFault>;

    /// Closes a scan session.
    fn close_session(
        &self,
        context: &ContextHandle,
        session: SessionHandle,
    ) -> Result<(), ProviderFault>;

    /// Scans a string.
    fn scan_string(
        &self,
        context: &ContextHandle,
        text: &str,
        content_name: &str,
        session: &SessionHandle,
    ) -> Result<ScanVerdict, ProviderFault>;

    /// Scans a complete buffer. The buffer length is `bytes.len()`.
    fn scan_buffer(
        &self,
        context: &ContextHandle,
        bytes: &[u8],
        content_name: &str,
        session: &SessionHandle,
    ) -> Result<ScanVerdict, ProviderFault>;
}

macro_rules! forward_provider {
    ($($ty:ty),*) => {
        $(
            impl<P: Provider + ?Sized> Provider for $ty {
                fn initialize(&self, application_name: &str) -> Result<ContextHandle, ProviderFault> {
                    (**self).initialize(application_name)
                }

                fn uninitialize(&self, context: ContextHandle) -> Result<(), ProviderFault> {
                    (**self).uninitialize(context)
                }

                fn open_session(&self, context: &ContextHandle) -> Result<SessionHandle, ProviderFault> {
                    (**self).open_session(context)
                }

                fn close_session(
                    &self,
                    context: &ContextHandle,
                    session: SessionHandle,
                ) -> Result<(), ProviderFault> {
                    (**self).close_session(context, session)
                }

                fn scan_string(
                    &self,
                    context: &ContextHandle,
                    text: &str,
                    content_name: &str,
                    session: &SessionHandle,
                ) -> Result<ScanVerdict, ProviderFault> {
                    (**self).scan_string(context, text, content_name, session)
                }

                fn scan_buffer(
                    &self,
                    context: &ContextHandle,
                    bytes: &[u8],
                    content_name: &str,
                    session: &SessionHandle,
                ) -> Result<ScanVerdict, ProviderFault> {
                    (**self).scan_buffer(context, bytes, content_name, session)
                }
            }
        )*
    };
}

forward_provider!(&P, Box<P>, Arc<P>);

/// A boxed provider for type-erased storage.
pub type BoxedProvider = Box<dyn Provider>;

/// An arc-wrapped provider for shared ownership.
pub type ArcProvider = Arc<dyn Provider>;
