//! The scan context: one provider connection and the scans made through it.

use crate::audit;
use crate::context::config::ScanContextConfig;
use crate::context::session::{guarded, Session};
use crate::core::{
    AmsiError, AmsiResult, ContextHandle, Provider, ScanOutcome, ScanReport, ScanVerdict,
};
use crate::EICAR_TEST_STRING;

use std::io::{Read, Seek, SeekFrom};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

#[cfg(windows)]
use crate::backends::AmsiProvider;

/// An initialized connection to a scanning provider.
///
/// Each scan opens its own session, scans, and closes the session before
/// returning, on success and on failure. Open/scan/close sequences on one
/// context are serialized, so a context can be shared between threads.
///
/// The provider connection is released by [`dispose`](Self::dispose) or,
/// failing that, when the context is dropped. Release happens once.
///
/// # Example
///
/// ```rust
/// use amsibridge::backends::MockProvider;
/// use amsibridge::ScanContext;
///
/// let context = ScanContext::new(MockProvider::new(), Some("uploads"))?;
/// assert!(context.is_available());
/// assert!(!context.has_malware(b"quarterly report", "report.txt")?);
/// context.dispose();
/// # Ok::<(), amsibridge::AmsiError>(())
/// ```
#[derive(Debug)]
pub struct ScanContext<P: Provider> {
    provider: P,
    application_name: String,
    config: ScanContextConfig,
    handle: Mutex<Option<ContextHandle>>,
}

#[cfg(windows)]
impl ScanContext<AmsiProvider> {
    /// Connects to the system AMSI provider.
    pub fn system(application_name: Option<&str>) -> AmsiResult<Self> {
        Self::new(AmsiProvider::new(), application_name)
    }
}

impl<P: Provider> ScanContext<P> {
    /// Initializes a provider connection under the given application name.
    ///
    /// A missing or blank name is replaced with a generated UUID.
    pub fn new(provider: P, application_name: Option<&str>) -> AmsiResult<Self> {
        let mut config = ScanContextConfig::new();
        config.application_name = application_name.map(str::to_string);
        Self::with_config(provider, config)
    }

    /// Initializes a provider connection with the given configuration.
    pub fn with_config(provider: P, config: ScanContextConfig) -> AmsiResult<Self> {
        let application_name = config.resolve_application_name();
        if application_name.contains('\0') {
            return Err(AmsiError::invalid_argument(
                "application_name",
                "may not contain NUL characters",
            ));
        }
        validate_content_name("probe_content_name", &config.probe_content_name)?;

        let handle = guarded("initialize", || provider.initialize(&application_name)).map_err(
            |source| AmsiError::ProviderInitialization {
                application_name: application_name.clone(),
                source,
            },
        )?;

        audit::emit_context_initialized(&application_name);

        Ok(Self {
            provider,
            application_name,
            config,
            handle: Mutex::new(Some(handle)),
        })
    }

    /// The application identity this context was initialized with.
    pub fn application_name(&self) -> &str {
        &self.application_name
    }

    /// The configuration this context was created with.
    pub fn config(&self) -> &ScanContextConfig {
        &self.config
    }

    /// The underlying provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Returns `true` once the provider connection has been released.
    pub fn is_released(&self) -> bool {
        self.lock_handle().is_none()
    }

    /// Checks that the provider is reachable and detects the EICAR test string.
    ///
    /// Never fails: any error, including a provider panic, is logged and
    /// reported as `false`.
    pub fn is_available(&self) -> bool {
        let checked = panic::catch_unwind(AssertUnwindSafe(|| self.probe()))
            .unwrap_or_else(|_| Err(AmsiError::internal("availability check panicked")));

        match checked {
            Ok(ScanOutcome::Infected) => true,
            Ok(outcome) => {
                tracing::debug!(
                    application_name = %self.application_name,
                    outcome = %outcome,
                    "Provider did not detect the EICAR test string"
                );
                false
            }
            Err(err) => {
                tracing::debug!(
                    application_name = %self.application_name,
                    error = %err,
                    "Availability probe failed"
                );
                false
            }
        }
    }

    /// Scans the EICAR test string and returns the classified outcome.
    ///
    /// A working provider returns [`ScanOutcome::Infected`].
    pub fn probe(&self) -> AmsiResult<ScanOutcome> {
        let content_name = self.config.probe_content_name.as_str();
        let guard = self.lock_handle();
        let context = guard.as_ref().ok_or(AmsiError::ContextReleased)?;

        let session = Session::open(&self.provider, context, &self.application_name)?;
        let verdict = session
            .scan_string(EICAR_TEST_STRING, content_name)
            .map_err(|source| AmsiError::ScanFailed {
                content_name: content_name.to_string(),
                source,
            });
        drop(session);

        Ok(verdict?.classify())
    }

    /// Scans a buffer and returns the classified outcome.
    ///
    /// An empty buffer is `Clean` without contacting the provider.
    pub fn scan(&self, bytes: &[u8], content_name: &str) -> AmsiResult<ScanOutcome> {
        Ok(self
            .verdict(bytes, content_name)?
            .map(|verdict| verdict.classify())
            .unwrap_or(ScanOutcome::Clean))
    }

    /// Returns `true` if the provider detects malware in the buffer.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` - `content_name` is blank or contains NUL.
    /// - `ContentTooLarge` - the buffer exceeds the configured maximum.
    /// - `SessionOpen` / `ScanFailed` - the provider call failed.
    /// - `PolicyBlocked` - administrative policy prevented the scan.
    pub fn has_malware(&self, bytes: &[u8], content_name: &str) -> AmsiResult<bool> {
        let Some(verdict) = self.verdict(bytes, content_name)? else {
            return Ok(false);
        };

        match verdict.classify() {
            ScanOutcome::Infected => Ok(true),
            ScanOutcome::Clean => Ok(false),
            ScanOutcome::PolicyBlocked => Err(AmsiError::PolicyBlocked {
                content_name: content_name.to_string(),
                verdict,
            }),
        }
    }

    /// Scans the remainder of a seekable stream.
    ///
    /// The stream is buffered completely, then returned to the position it
    /// had on entry, whatever the verdict.
    pub fn has_malware_in_stream<S>(&self, stream: &mut S, content_name: &str) -> AmsiResult<bool>
    where
        S: Read + Seek + ?Sized,
    {
        validate_content_name("content_name", content_name)?;

        let position = stream.stream_position()?;
        let mut buffer = Vec::new();
        let read = stream.read_to_end(&mut buffer);
        stream.seek(SeekFrom::Start(position))?;
        read?;

        self.has_malware(&buffer, content_name)
    }

    /// Scans the remainder of a reader that cannot seek.
    ///
    /// The reader is consumed.
    pub fn has_malware_in_reader<R>(&self, reader: &mut R, content_name: &str) -> AmsiResult<bool>
    where
        R: Read + ?Sized,
    {
        validate_content_name("content_name", content_name)?;

        let mut buffer = Vec::new();
        reader.read_to_end(&mut buffer)?;
        self.has_malware(&buffer, content_name)
    }

    /// Scans a buffer and records the result.
    ///
    /// Unlike [`has_malware`](Self::has_malware), a policy-blocked verdict is
    /// recorded in the report's outcome rather than returned as an error.
    pub fn scan_report(&self, bytes: &[u8], content_name: &str) -> AmsiResult<ScanReport> {
        let start = Instant::now();
        let verdict = self.verdict(bytes, content_name)?;
        let report = ScanReport::new(bytes, content_name, verdict, start.elapsed());

        audit::emit_scan_completed(&report);
        Ok(report)
    }

    /// Releases the provider connection.
    ///
    /// Idempotent. Release failures are logged and never returned.
    pub fn dispose(&self) {
        let Some(handle) = self.lock_handle().take() else {
            return;
        };

        match guarded("uninitialize", || self.provider.uninitialize(handle)) {
            Ok(()) => audit::emit_context_released(&self.application_name),
            Err(fault) => audit::emit_teardown_failed(&self.application_name, "context", &fault),
        }
    }

    /// Runs one open/scan/close sequence and returns the raw verdict.
    ///
    /// Returns `None` for an empty buffer, which is never sent.
    fn verdict(&self, bytes: &[u8], content_name: &str) -> AmsiResult<Option<ScanVerdict>> {
        validate_content_name("content_name", content_name)?;

        let guard = self.lock_handle();
        let context = guard.as_ref().ok_or(AmsiError::ContextReleased)?;

        if bytes.is_empty() {
            return Ok(None);
        }

        let size = bytes.len() as u64;
        if size > self.config.max_content_size {
            return Err(AmsiError::ContentTooLarge {
                size,
                max: self.config.max_content_size,
            });
        }

        let session = Session::open(&self.provider, context, &self.application_name)?;
        let verdict = session
            .scan_buffer(bytes, content_name)
            .map_err(|source| AmsiError::ScanFailed {
                content_name: content_name.to_string(),
                source,
            });
        drop(session);
        let verdict = verdict?;

        tracing::debug!(
            content_name = %content_name,
            size,
            verdict = verdict.code(),
            "Buffer scanned"
        );
        if verdict.classify().is_policy_blocked() {
            audit::emit_policy_blocked(content_name, verdict);
        }

        Ok(Some(verdict))
    }

    fn lock_handle(&self) -> MutexGuard<'_, Option<ContextHandle>> {
        self.handle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<P: Provider> Drop for ScanContext<P> {
    fn drop(&mut self) {
        self.dispose();
    }
}

pub(crate) fn validate_content_name(
    argument: &'static str,
    content_name: &str,
) -> AmsiResult<()> {
    if content_name.trim().is_empty() {
        return Err(AmsiError::invalid_argument(argument, "may not be empty"));
    }
    if content_name.contains('\0') {
        return Err(AmsiError::invalid_argument(
            argument,
            "may not contain NUL characters",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{MockFault, MockProvider, Primitive};
    use std::io::{self, Cursor};
    use std::sync::Arc;

    fn context(provider: &MockProvider) -> ScanContext<&MockProvider> {
        ScanContext::new(provider, Some("tests")).unwrap()
    }

    /// A seekable stream whose reads fail once `fail_at` is reached.
    struct BrokenStream {
        inner: Cursor<Vec<u8>>,
        fail_at: u64,
    }

    impl Read for BrokenStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let position = self.inner.position();
            if position >= self.fail_at {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "device detached"));
            }
            let allowed = ((self.fail_at - position) as usize).min(buf.len());
            self.inner.read(&mut buf[..allowed])
        }
    }

    impl Seek for BrokenStream {
        fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
            self.inner.seek(pos)
        }
    }

    #[test]
    fn test_is_available_with_working_provider() {
        let provider = MockProvider::new();
        let ctx = context(&provider);

        assert!(ctx.is_available());
        assert_eq!(provider.call_count(Primitive::ScanString), 1);
        assert_eq!(provider.call_count(Primitive::OpenSession), 1);
        assert_eq!(provider.call_count(Primitive::CloseSession), 1);
        assert_eq!(provider.content_names(), vec!["EICAR"]);
    }

    #[test]
    fn test_is_available_never_fails() {
        let provider =
            MockProvider::new().with_fault(Primitive::ScanString, MockFault::Unreachable);
        assert!(!context(&provider).is_available());

        let provider =
            MockProvider::new().with_fault(Primitive::OpenSession, MockFault::Status(-1));
        assert!(!context(&provider).is_available());

        // A provider that does not recognise EICAR is not working.
        let provider = MockProvider::new();
        provider.clear_responses();
        let ctx = context(&provider);
        assert!(!ctx.is_available());
        assert_eq!(ctx.probe().unwrap(), ScanOutcome::Clean);

        ctx.dispose();
        assert!(!ctx.is_available());
    }

    #[test]
    fn test_is_available_survives_provider_panics() {
        for primitive in [Primitive::ScanString, Primitive::OpenSession] {
            let provider = MockProvider::new().with_fault(primitive, MockFault::Panic);
            let ctx = context(&provider);

            assert!(!ctx.is_available(), "{}", primitive.name());
            assert_eq!(provider.live_session_count(), 0);

            // The context stays usable afterwards.
            provider.clear_fault(primitive);
            assert!(ctx.is_available(), "{}", primitive.name());
        }
    }

    #[test]
    fn test_initialization_failure() {
        let provider =
            MockProvider::new().with_fault(Primitive::Initialize, MockFault::Status(-2147024891));
        let err = ScanContext::new(&provider, Some("tests")).unwrap_err();

        assert!(matches!(err, AmsiError::ProviderInitialization { .. }));
        assert_eq!(err.status(), Some(-2147024891));
        assert_eq!(provider.call_count(Primitive::Uninitialize), 0);
    }

    #[test]
    fn test_blank_application_name_is_generated() {
        let provider = MockProvider::new();
        let first = ScanContext::new(&provider, None).unwrap();
        let second = ScanContext::new(&provider, Some("  ")).unwrap();

        assert!(uuid::Uuid::parse_str(first.application_name()).is_ok());
        assert!(uuid::Uuid::parse_str(second.application_name()).is_ok());
        assert_ne!(first.application_name(), second.application_name());
        assert_eq!(
            provider.application_names(),
            vec![
                first.application_name().to_string(),
                second.application_name().to_string()
            ]
        );
    }

    #[test]
    fn test_empty_buffer_skips_provider() {
        let provider = MockProvider::new();
        let ctx = context(&provider);

        assert!(!ctx.has_malware(&[], "empty.bin").unwrap());
        assert_eq!(ctx.scan(&[], "empty.bin").unwrap(), ScanOutcome::Clean);
        assert_eq!(provider.call_count(Primitive::OpenSession), 0);
        assert_eq!(provider.call_count(Primitive::ScanBuffer), 0);
    }

    #[test]
    fn test_invalid_content_name() {
        let provider = MockProvider::new();
        let ctx = context(&provider);
        let calls = provider.total_calls();

        for name in ["", "   ", "a\0b"] {
            let err = ctx.has_malware(b"data", name).unwrap_err();
            assert!(matches!(
                err,
                AmsiError::InvalidArgument {
                    argument: "content_name",
                    ..
                }
            ));
        }

        let mut stream = Cursor::new(b"data".to_vec());
        assert!(ctx.has_malware_in_stream(&mut stream, "").is_err());
        assert_eq!(stream.position(), 0);
        assert_eq!(provider.total_calls(), calls);
    }

    #[test]
    fn test_verdict_boundaries() {
        let cases = [
            (32768, Some(true)),
            (32767, Some(false)),
            (16383, Some(false)),
            (16384, None),
            (20479, None),
            (20480, Some(false)),
        ];

        for (code, expected) in cases {
            let provider = MockProvider::new().with_default_verdict(code);
            let ctx = context(&provider);
            let result = ctx.has_malware(b"payload", "payload.bin");

            match expected {
                Some(infected) => assert_eq!(result.unwrap(), infected, "code {code}"),
                None => {
                    let err = result.unwrap_err();
                    assert!(err.is_policy_blocked(), "code {code}");
                    assert_eq!(err.status(), Some(code));
                    assert_eq!(err.content_name(), Some("payload.bin"));
                }
            }
        }
    }

    #[test]
    fn test_scan_returns_tri_state() {
        let provider = MockProvider::new()
            .with_response(b"blocked", 16500)
            .with_response(b"infected", 32768);
        let ctx = context(&provider);

        assert_eq!(ctx.scan(b"blocked", "a").unwrap(), ScanOutcome::PolicyBlocked);
        assert_eq!(ctx.scan(b"infected", "b").unwrap(), ScanOutcome::Infected);
        assert_eq!(ctx.scan(b"anything", "c").unwrap(), ScanOutcome::Clean);
    }

    #[test]
    fn test_stream_position_is_restored() {
        for code in [1, 16384, 32768] {
            let provider = MockProvider::new().with_default_verdict(code);
            let ctx = context(&provider);

            let mut stream = Cursor::new(b"header|body".to_vec());
            stream.set_position(7);
            let _ = ctx.has_malware_in_stream(&mut stream, "body.bin");
            assert_eq!(stream.position(), 7, "code {code}");
        }
    }

    #[test]
    fn test_stream_position_is_restored_on_read_error() {
        let provider = MockProvider::new();
        let ctx = context(&provider);

        let mut stream = BrokenStream {
            inner: Cursor::new(b"header|body that never arrives".to_vec()),
            fail_at: 12,
        };
        stream.seek(SeekFrom::Start(7)).unwrap();

        let err = ctx.has_malware_in_stream(&mut stream, "body.bin").unwrap_err();
        assert!(matches!(&err, AmsiError::Io(io) if io.kind() == io::ErrorKind::BrokenPipe));
        assert_eq!(stream.stream_position().unwrap(), 7);
        assert_eq!(provider.call_count(Primitive::OpenSession), 0);
        assert_eq!(provider.call_count(Primitive::ScanBuffer), 0);
    }

    #[test]
    fn test_stream_scans_from_current_position() {
        let provider = MockProvider::new().with_response(b"body", 32768);
        let ctx = context(&provider);

        let mut stream = Cursor::new(b"header|body".to_vec());
        stream.set_position(7);
        assert!(ctx.has_malware_in_stream(&mut stream, "body.bin").unwrap());

        let mut reader: &[u8] = b"body";
        assert!(ctx.has_malware_in_reader(&mut reader, "body.bin").unwrap());
        assert!(reader.is_empty());
    }

    #[test]
    fn test_session_pairing_on_scan_failure() {
        let provider =
            MockProvider::new().with_fault(Primitive::ScanBuffer, MockFault::Status(-2147467259));
        let ctx = context(&provider);

        let err = ctx.has_malware(b"payload", "payload.bin").unwrap_err();
        assert!(matches!(err, AmsiError::ScanFailed { .. }));
        assert_eq!(err.status(), Some(-2147467259));
        assert_eq!(err.content_name(), Some("payload.bin"));

        provider.set_fault(Primitive::ScanBuffer, MockFault::Unreachable);
        let err = ctx.has_malware(b"payload", "payload.bin").unwrap_err();
        assert!(std::error::Error::source(&err).is_some());

        provider.clear_fault(Primitive::ScanBuffer);
        ctx.has_malware(b"payload", "payload.bin").unwrap();

        assert_eq!(provider.call_count(Primitive::OpenSession), 3);
        assert_eq!(provider.call_count(Primitive::CloseSession), 3);
        assert_eq!(provider.live_session_count(), 0);
    }

    #[test]
    fn test_scan_panic_is_scan_failure() {
        let provider = MockProvider::new().with_fault(Primitive::ScanBuffer, MockFault::Panic);
        let ctx = context(&provider);

        let err = ctx.has_malware(b"payload", "payload.bin").unwrap_err();
        assert!(matches!(err, AmsiError::ScanFailed { .. }));
        assert_eq!(err.content_name(), Some("payload.bin"));
        let source = std::error::Error::source(&err).unwrap().to_string();
        assert!(source.contains("scan_buffer"), "{source}");
        assert!(source.contains("provider panicked"), "{source}");

        assert_eq!(provider.call_count(Primitive::OpenSession), 1);
        assert_eq!(provider.call_count(Primitive::CloseSession), 1);
        assert_eq!(provider.live_session_count(), 0);

        provider.clear_fault(Primitive::ScanBuffer);
        assert!(!ctx.has_malware(b"payload", "payload.bin").unwrap());
    }

    #[test]
    fn test_session_open_failure() {
        let provider =
            MockProvider::new().with_fault(Primitive::OpenSession, MockFault::Status(-3));
        let ctx = context(&provider);

        let err = ctx.has_malware(b"payload", "payload.bin").unwrap_err();
        assert!(matches!(err, AmsiError::SessionOpen { .. }));
        assert_eq!(provider.call_count(Primitive::ScanBuffer), 0);
        assert_eq!(provider.call_count(Primitive::CloseSession), 0);
    }

    #[test]
    fn test_content_too_large() {
        let provider = MockProvider::new();
        let config = ScanContextConfig::new()
            .with_application_name("tests")
            .with_max_content_size(4);
        let ctx = ScanContext::with_config(&provider, config).unwrap();

        let err = ctx.has_malware(b"12345", "big.bin").unwrap_err();
        assert!(matches!(err, AmsiError::ContentTooLarge { size: 5, max: 4 }));
        assert_eq!(provider.call_count(Primitive::OpenSession), 0);
        assert!(!ctx.has_malware(b"1234", "small.bin").unwrap());
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let provider = MockProvider::new();
        let ctx = context(&provider);

        ctx.dispose();
        ctx.dispose();
        assert!(ctx.is_released());
        drop(ctx);

        assert_eq!(provider.call_count(Primitive::Uninitialize), 1);
        assert_eq!(provider.live_context_count(), 0);
    }

    #[test]
    fn test_drop_releases_context() {
        let provider = Arc::new(MockProvider::new());
        {
            let _ctx = ScanContext::new(Arc::clone(&provider), Some("tests")).unwrap();
            assert_eq!(provider.live_context_count(), 1);
        }
        assert_eq!(provider.call_count(Primitive::Uninitialize), 1);
        assert_eq!(provider.live_context_count(), 0);
    }

    #[test]
    fn test_teardown_failure_is_swallowed() {
        let provider =
            MockProvider::new().with_fault(Primitive::Uninitialize, MockFault::Unreachable);
        let ctx = context(&provider);

        ctx.dispose();
        ctx.dispose();
        assert!(ctx.is_released());
        assert_eq!(provider.call_count(Primitive::Uninitialize), 1);
    }

    #[test]
    fn test_operations_after_dispose() {
        let provider = MockProvider::new();
        let ctx = context(&provider);
        ctx.dispose();

        assert!(matches!(
            ctx.has_malware(b"payload", "payload.bin"),
            Err(AmsiError::ContextReleased)
        ));
        assert!(matches!(ctx.probe(), Err(AmsiError::ContextReleased)));
        assert_eq!(provider.call_count(Primitive::OpenSession), 0);
    }

    #[test]
    fn test_scan_report() {
        let provider = MockProvider::new().with_response(b"blocked", 16384);
        let ctx = context(&provider);

        let report = ctx.scan_report(b"blocked", "blocked.ps1").unwrap();
        assert!(report.is_policy_blocked());
        assert_eq!(report.verdict, Some(ScanVerdict::new(16384)));
        assert_eq!(report.content_name, "blocked.ps1");

        let report = ctx.scan_report(b"", "empty.ps1").unwrap();
        assert!(report.is_clean());
        assert_eq!(report.verdict, None);
    }

    #[test]
    fn test_concurrent_scans_pair_sessions() {
        let provider = Arc::new(MockProvider::new().with_response(b"bad", 32768));
        let ctx = ScanContext::new(Arc::clone(&provider), Some("tests")).unwrap();

        std::thread::scope(|scope| {
            for i in 0..8 {
                let ctx = &ctx;
                scope.spawn(move || {
                    for _ in 0..25 {
                        let payload: &[u8] = if i % 2 == 0 { b"bad" } else { b"good" };
                        assert_eq!(ctx.has_malware(payload, "item").unwrap(), i % 2 == 0);
                    }
                });
            }
        });

        assert_eq!(provider.call_count(Primitive::OpenSession), 200);
        assert_eq!(provider.call_count(Primitive::CloseSession), 200);
        assert_eq!(provider.live_session_count(), 0);
    }
}
