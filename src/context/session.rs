//! Scoped scan sessions.

use crate::audit;
use crate::core::{AmsiError, ContextHandle, Provider, ProviderFault, ScanVerdict, SessionHandle};

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

/// Runs a provider call, reporting a panic inside it as a `Call` fault.
pub(crate) fn guarded<T>(
    operation: &'static str,
    call: impl FnOnce() -> Result<T, ProviderFault>,
) -> Result<T, ProviderFault> {
    panic::catch_unwind(AssertUnwindSafe(call)).unwrap_or_else(|payload| {
        Err(ProviderFault::call(
            operation,
            format!("provider panicked: {}", panic_message(payload.as_ref())),
        ))
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic payload"
    }
}

/// An open scan session.
///
/// Borrows the parent context's handle, so it cannot outlive the context.
/// The session is closed with the same context handle when dropped.
pub(crate) struct Session<'a, P: Provider + ?Sized> {
    provider: &'a P,
    context: &'a ContextHandle,
    // `None` only once `drop` has closed it.
    handle: Option<SessionHandle>,
    application_name: &'a str,
}

impl<'a, P: Provider + ?Sized> Session<'a, P> {
    /// Opens a session on the given context.
    pub(crate) fn open(
        provider: &'a P,
        context: &'a ContextHandle,
        application_name: &'a str,
    ) -> Result<Self, AmsiError> {
        let handle = guarded("open_session", || provider.open_session(context))
            .map_err(|source| AmsiError::SessionOpen { source })?;

        tracing::trace!(session = handle.as_raw().get(), "Scan session opened");

        Ok(Self {
            provider,
            context,
            handle: Some(handle),
            application_name,
        })
    }

    /// Scans a string within this session.
    pub(crate) fn scan_string(
        &self,
        text: &str,
        content_name: &str,
    ) -> Result<ScanVerdict, ProviderFault> {
        let handle = self.handle("scan_string")?;
        guarded("scan_string", || {
            self.provider
                .scan_string(self.context, text, content_name, handle)
        })
    }

    /// Scans a buffer within this session.
    pub(crate) fn scan_buffer(
        &self,
        bytes: &[u8],
        content_name: &str,
    ) -> Result<ScanVerdict, ProviderFault> {
        let handle = self.handle("scan_buffer")?;
        guarded("scan_buffer", || {
            self.provider
                .scan_buffer(self.context, bytes, content_name, handle)
        })
    }

    fn handle(&self, operation: &'static str) -> Result<&SessionHandle, ProviderFault> {
        self.handle
            .as_ref()
            .ok_or_else(|| ProviderFault::call(operation, "session is closed"))
    }
}

impl<P: Provider + ?Sized> Drop for Session<'_, P> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let raw = handle.as_raw().get();
            let (provider, context) = (self.provider, self.context);
            match guarded("close_session", || provider.close_session(context, handle)) {
                Ok(()) => tracing::trace!(session = raw, "Scan session closed"),
                Err(fault) => audit::emit_teardown_failed(self.application_name, "session", &fault),
            }
        }
    }
}
