//! Windows Anti-Malware Scan Interface backend.
//!
//! Binds the six `amsi.dll` entry points and exposes them through the
//! [`Provider`] trait. Every entry point returns an `HRESULT`; anything other
//! than `S_OK` becomes [`ProviderFault::Status`].
//!
//! # Requirements
//!
//! - Windows 10 / Server 2016 or later
//! - A registered antimalware provider (Microsoft Defender or third party)

#![allow(unsafe_code)]

use crate::core::{ContextHandle, Provider, ProviderFault, ScanVerdict, SessionHandle};

use std::ffi::{c_void, OsStr};
use std::num::NonZeroUsize;
use std::os::windows::ffi::OsStrExt;
use std::ptr;

type HResult = i32;
type HAmsiContext = *mut c_void;
type HAmsiSession = *mut c_void;

const S_OK: HResult = 0;

#[link(name = "amsi")]
extern "system" {
    fn AmsiInitialize(app_name: *const u16, amsi_context: *mut HAmsiContext) -> HResult;
    fn AmsiUninitialize(amsi_context: HAmsiContext);
    fn AmsiOpenSession(amsi_context: HAmsiContext, amsi_session: *mut HAmsiSession) -> HResult;
    fn AmsiCloseSession(amsi_context: HAmsiContext, amsi_session: HAmsiSession);
    fn AmsiScanString(
        amsi_context: HAmsiContext,
        string: *const u16,
        content_name: *const u16,
        amsi_session: HAmsiSession,
        result: *mut i32,
    ) -> HResult;
    fn AmsiScanBuffer(
        amsi_context: HAmsiContext,
        buffer: *const c_void,
        length: u32,
        content_name: *const u16,
        amsi_session: HAmsiSession,
        result: *mut i32,
    ) -> HResult;
}

/// The system AMSI provider.
///
/// Stateless: all state lives in the handles it hands out.
#[derive(Debug, Clone, Copy, Default)]
pub struct AmsiProvider;

impl AmsiProvider {
    /// Creates the provider.
    pub fn new() -> Self {
        Self
    }
}

/// Encodes a string as a NUL-terminated UTF-16 buffer.
fn wide(operation: &'static str, value: &str) -> Result<Vec<u16>, ProviderFault> {
    if value.contains('\0') {
        return Err(ProviderFault::call(
            operation,
            "string arguments may not contain NUL characters",
        ));
    }
    Ok(OsStr::new(value)
        .encode_wide()
        .chain(std::iter::once(0))
        .collect())
}

fn check(status: HResult) -> Result<(), ProviderFault> {
    if status == S_OK {
        Ok(())
    } else {
        Err(ProviderFault::status(status))
    }
}

fn handle_from(operation: &'static str, raw: *mut c_void) -> Result<NonZeroUsize, ProviderFault> {
    NonZeroUsize::new(raw as usize)
        .ok_or_else(|| ProviderFault::call(operation, "provider returned a null handle"))
}

impl Provider for AmsiProvider {
    fn initialize(&self, application_name: &str) -> Result<ContextHandle, ProviderFault> {
        let name = wide("initialize", application_name)?;
        let mut context: HAmsiContext = ptr::null_mut();
        // SAFETY: `name` is NUL-terminated and outlives the call; `context` is a valid out pointer.
        check(unsafe { AmsiInitialize(name.as_ptr(), &mut context) })?;
        Ok(ContextHandle::from_raw(handle_from("initialize", context)?))
    }

    fn uninitialize(&self, context: ContextHandle) -> Result<(), ProviderFault> {
        // SAFETY: the handle came from `AmsiInitialize` and is consumed here.
        unsafe { AmsiUninitialize(context.as_raw().get() as HAmsiContext) };
        Ok(())
    }

    fn open_session(&self, context: &ContextHandle) -> Result<SessionHandle, ProviderFault> {
        let mut session: HAmsiSession = ptr::null_mut();
        // SAFETY: the context handle is live; `session` is a valid out pointer.
        check(unsafe { AmsiOpenSession(context.as_raw().get() as HAmsiContext, &mut session) })?;
        Ok(SessionHandle::from_raw(handle_from("open_session", session)?))
    }

    fn close_session(
        &self,
        context: &ContextHandle,
        session: SessionHandle,
    ) -> Result<(), ProviderFault> {
        // SAFETY: both handles are live and the session handle is consumed here.
        unsafe {
            AmsiCloseSession(
                context.as_raw().get() as HAmsiContext,
                session.as_raw().get() as HAmsiSession,
            )
        };
        Ok(())
    }

    fn scan_string(
        &self,
        context: &ContextHandle,
        text: &str,
        content_name: &str,
        session: &SessionHandle,
    ) -> Result<ScanVerdict, ProviderFault> {
        let text = wide("scan_string", text)?;
        let content_name = wide("scan_string", content_name)?;
        let mut result = 0i32;
        // SAFETY: strings are NUL-terminated and outlive the call; handles are live.
        check(unsafe {
            AmsiScanString(
                context.as_raw().get() as HAmsiContext,
                text.as_ptr(),
                content_name.as_ptr(),
                session.as_raw().get() as HAmsiSession,
                &mut result,
            )
        })?;
        Ok(ScanVerdict::new(result))
    }

    fn scan_buffer(
        &self,
        context: &ContextHandle,
        bytes: &[u8],
        content_name: &str,
        session: &SessionHandle,
    ) -> Result<ScanVerdict, ProviderFault> {
        let length = u32::try_from(bytes.len())
            .map_err(|e| ProviderFault::call_with_source("scan_buffer", e))?;
        let content_name = wide("scan_buffer", content_name)?;
        let mut result = 0i32;
        // SAFETY: `bytes` is valid for `length` bytes; handles are live.
        check(unsafe {
            AmsiScanBuffer(
                context.as_raw().get() as HAmsiContext,
                bytes.as_ptr().cast(),
                length,
                content_name.as_ptr(),
                session.as_raw().get() as HAmsiSession,
                &mut result,
            )
        })?;
        Ok(ScanVerdict::new(result))
    }
}
