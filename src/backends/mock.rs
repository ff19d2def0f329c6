//! Mock provider for testing.
//!
//! This module provides a configurable in-process provider that can be used
//! in tests to simulate verdicts and provider failures without a real
//! scanning engine. It counts every primitive call and tracks live handles
//! so tests can assert session pairing and single release.

use crate::core::{ContextHandle, Provider, ProviderFault, ScanVerdict, SessionHandle};
use crate::EICAR_TEST_STRING;

use std::collections::{HashMap, HashSet};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// `E_INVALIDARG`, returned for unknown or already released handles.
pub const E_INVALIDARG: i32 = 0x8007_0057_u32 as i32;

/// A provider primitive, used to count calls and inject failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    /// `initialize`
    Initialize,
    /// `uninitialize`
    Uninitialize,
    /// `open_session`
    OpenSession,
    /// `close_session`
    CloseSession,
    /// `scan_string`
    ScanString,
    /// `scan_buffer`
    ScanBuffer,
}

impl Primitive {
    const ALL: [Primitive; 6] = [
        Self::Initialize,
        Self::Uninitialize,
        Self::OpenSession,
        Self::CloseSession,
        Self::ScanString,
        Self::ScanBuffer,
    ];

    fn index(self) -> usize {
        self as usize
    }

    /// Returns the primitive's name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Initialize => "initialize",
            Self::Uninitialize => "uninitialize",
            Self::OpenSession => "open_session",
            Self::CloseSession => "close_session",
            Self::ScanString => "scan_string",
            Self::ScanBuffer => "scan_buffer",
        }
    }
}

/// A failure the mock injects into a primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFault {
    /// Return the given non-zero status.
    Status(i32),
    /// Fail the call itself, as if the provider were unreachable.
    Unreachable,
    /// Panic inside the call.
    Panic,
}

impl MockFault {
    fn into_fault(self, primitive: Primitive) -> ProviderFault {
        match self {
            Self::Status(status) => ProviderFault::status(status),
            Self::Panic => panic!("simulated provider panic in {}", primitive.name()),
            Self::Unreachable => ProviderFault::call_with_source(
                primitive.name(),
                std::io::Error::new(
                    std::io::ErrorKind::NotConnected,
                    "simulated provider failure",
                ),
            ),
        }
    }
}

/// A mock provider for testing purposes.
///
/// Content is matched by BLAKE3 digest. The EICAR test string is registered
/// as detected out of the box, so a fresh mock behaves like a working
/// provider for availability probes.
///
/// # Examples
///
/// ```rust
/// use amsibridge::backends::{MockFault, MockProvider, Primitive};
/// use amsibridge::core::ScanVerdict;
///
/// // Everything not registered is clean
/// let provider = MockProvider::new();
///
/// // Every buffer is detected
/// let provider = MockProvider::new().with_default_verdict(ScanVerdict::DETECTED);
///
/// // Session opens fail with a status code
/// let provider = MockProvider::new().with_fault(Primitive::OpenSession, MockFault::Status(-1));
/// ```
#[derive(Debug)]
pub struct MockProvider {
    /// Verdicts keyed by BLAKE3 digest of the scanned content.
    responses: RwLock<HashMap<String, ScanVerdict>>,
    /// Verdict for content not in the response map.
    default_verdict: RwLock<ScanVerdict>,
    /// Injected failures per primitive.
    faults: RwLock<HashMap<Primitive, MockFault>>,
    /// Call counters, indexed by `Primitive`.
    calls: [AtomicU64; 6],
    next_handle: AtomicUsize,
    live_contexts: Mutex<HashSet<usize>>,
    live_sessions: Mutex<HashSet<usize>>,
    application_names: Mutex<Vec<String>>,
    content_names: Mutex<Vec<String>>,
}

impl MockProvider {
    /// Creates a new mock provider that reports unknown content as clean.
    pub fn new() -> Self {
        let provider = Self {
            responses: RwLock::new(HashMap::new()),
            default_verdict: RwLock::new(ScanVerdict::new(ScanVerdict::NOT_DETECTED)),
            faults: RwLock::new(HashMap::new()),
            calls: Default::default(),
            next_handle: AtomicUsize::new(1),
            live_contexts: Mutex::new(HashSet::new()),
            live_sessions: Mutex::new(HashSet::new()),
            application_names: Mutex::new(Vec::new()),
            content_names: Mutex::new(Vec::new()),
        };
        provider.add_response(
            EICAR_TEST_STRING.as_bytes(),
            ScanVerdict::new(ScanVerdict::DETECTED),
        );
        provider
    }

    /// Sets the verdict for content not in the response map.
    pub fn with_default_verdict(self, code: i32) -> Self {
        self.set_default_verdict(code);
        self
    }

    /// Adds a verdict for specific content.
    pub fn with_response(self, content: impl AsRef<[u8]>, code: i32) -> Self {
        self.add_response(content.as_ref(), ScanVerdict::new(code));
        self
    }

    /// Injects a failure into a primitive.
    pub fn with_fault(self, primitive: Primitive, fault: MockFault) -> Self {
        self.set_fault(primitive, fault);
        self
    }

    /// Sets the verdict for content not in the response map.
    pub fn set_default_verdict(&self, code: i32) {
        *write(&self.default_verdict) = ScanVerdict::new(code);
    }

    /// Adds a verdict for specific content (mutable version).
    pub fn add_response(&self, content: &[u8], verdict: ScanVerdict) {
        write(&self.responses).insert(digest(content), verdict);
    }

    /// Clears all configured responses, including the EICAR registration.
    pub fn clear_responses(&self) {
        write(&self.responses).clear();
    }

    /// Injects a failure into a primitive (mutable version).
    pub fn set_fault(&self, primitive: Primitive, fault: MockFault) {
        write(&self.faults).insert(primitive, fault);
    }

    /// Removes an injected failure.
    pub fn clear_fault(&self, primitive: Primitive) {
        write(&self.faults).remove(&primitive);
    }

    /// Returns how many times a primitive was called.
    pub fn call_count(&self, primitive: Primitive) -> u64 {
        self.calls[primitive.index()].load(Ordering::Relaxed)
    }

    /// Returns the total number of primitive calls.
    pub fn total_calls(&self) -> u64 {
        Primitive::ALL.iter().map(|p| self.call_count(*p)).sum()
    }

    /// Returns the number of sessions opened and not yet closed.
    pub fn live_session_count(&self) -> usize {
        lock(&self.live_sessions).len()
    }

    /// Returns the number of contexts initialized and not yet released.
    pub fn live_context_count(&self) -> usize {
        lock(&self.live_contexts).len()
    }

    /// Returns the application names passed to `initialize`, in call order.
    pub fn application_names(&self) -> Vec<String> {
        lock(&self.application_names).clone()
    }

    /// Returns the content names passed to the scan primitives, in call order.
    pub fn content_names(&self) -> Vec<String> {
        lock(&self.content_names).clone()
    }

    fn enter(&self, primitive: Primitive) -> Result<(), ProviderFault> {
        self.calls[primitive.index()].fetch_add(1, Ordering::Relaxed);
        let fault = read(&self.faults).get(&primitive).copied();
        match fault {
            Some(fault) => Err(fault.into_fault(primitive)),
            None => Ok(()),
        }
    }

    fn allocate(&self) -> NonZeroUsize {
        let raw = self.next_handle.fetch_add(1, Ordering::Relaxed);
        NonZeroUsize::new(raw).unwrap_or(NonZeroUsize::MIN)
    }

    fn check_handles(
        &self,
        context: &ContextHandle,
        session: &SessionHandle,
    ) -> Result<(), ProviderFault> {
        if !lock(&self.live_contexts).contains(&context.as_raw().get())
            || !lock(&self.live_sessions).contains(&session.as_raw().get())
        {
            return Err(ProviderFault::status(E_INVALIDARG));
        }
        Ok(())
    }

    fn lookup(&self, content: &[u8]) -> ScanVerdict {
        read(&self.responses)
            .get(&digest(content))
            .copied()
            .unwrap_or_else(|| *read(&self.default_verdict))
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl Provider for MockProvider {
    fn initialize(&self, application_name: &str) -> Result<ContextHandle, ProviderFault> {
        lock(&self.application_names).push(application_name.to_string());
        self.enter(Primitive::Initialize)?;
        if application_name.is_empty() {
            return Err(ProviderFault::status(E_INVALIDARG));
        }

        let raw = self.allocate();
        lock(&self.live_contexts).insert(raw.get());
        Ok(ContextHandle::from_raw(raw))
    }

    fn uninitialize(&self, context: ContextHandle) -> Result<(), ProviderFault> {
        self.enter(Primitive::Uninitialize)?;
        if !lock(&self.live_contexts).remove(&context.as_raw().get()) {
            return Err(ProviderFault::status(E_INVALIDARG));
        }
        Ok(())
    }

    fn open_session(&self, context: &ContextHandle) -> Result<SessionHandle, ProviderFault> {
        self.enter(Primitive::OpenSession)?;
        if !lock(&self.live_contexts).contains(&context.as_raw().get()) {
            return Err(ProviderFault::status(E_INVALIDARG));
        }

        let raw = self.allocate();
        lock(&self.live_sessions).insert(raw.get());
        Ok(SessionHandle::from_raw(raw))
    }

    fn close_session(
        &self,
        context: &ContextHandle,
        session: SessionHandle,
    ) -> Result<(), ProviderFault> {
        self.enter(Primitive::CloseSession)?;
        if !lock(&self.live_contexts).contains(&context.as_raw().get()) {
            return Err(ProviderFault::status(E_INVALIDARG));
        }
        if !lock(&self.live_sessions).remove(&session.as_raw().get()) {
            return Err(ProviderFault::status(E_INVALIDARG));
        }
        Ok(())
    }

    fn scan_string(
        &self,
        context: &ContextHandle,
        text: &str,
        content_name: &str,
        session: &SessionHandle,
    ) -> Result<ScanVerdict, ProviderFault> {
        lock(&self.content_names).push(content_name.to_string());
        self.enter(Primitive::ScanString)?;
        self.check_handles(context, session)?;
        Ok(self.lookup(text.as_bytes()))
    }

    fn scan_buffer(
        &self,
        context: &ContextHandle,
        bytes: &[u8],
        content_name: &str,
        session: &SessionHandle,
    ) -> Result<ScanVerdict, ProviderFault> {
        lock(&self.content_names).push(content_name.to_string());
        self.enter(Primitive::ScanBuffer)?;
        self.check_handles(context, session)?;
        Ok(self.lookup(bytes))
    }
}

fn digest(content: &[u8]) -> String {
    blake3::hash(content).to_hex().to_string()
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
