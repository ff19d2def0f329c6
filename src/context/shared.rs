//! Async facade over a shared scan context.
//!
//! Provider calls block, so each open/scan/close sequence runs on tokio's
//! blocking pool. Sequences are still serialized by the context's lock.

use crate::context::scan_context::{validate_content_name, ScanContext};
use crate::core::{AmsiError, AmsiResult, Provider, ScanOutcome};

use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};

/// A cloneable, async handle to a [`ScanContext`].
///
/// # Example
///
/// ```rust
/// use amsibridge::backends::MockProvider;
/// use amsibridge::{ScanContext, SharedScanContext};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), amsibridge::AmsiError> {
/// let shared = SharedScanContext::new(ScanContext::new(MockProvider::new(), Some("uploads"))?);
/// assert!(shared.is_available().await);
/// assert!(!shared.has_malware(b"hello".to_vec(), "hello.txt").await?);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct SharedScanContext<P: Provider + 'static> {
    inner: Arc<ScanContext<P>>,
}

impl<P: Provider + 'static> Clone for SharedScanContext<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P: Provider + 'static> SharedScanContext<P> {
    /// Wraps a context for shared async use.
    pub fn new(context: ScanContext<P>) -> Self {
        Self {
            inner: Arc::new(context),
        }
    }

    /// The wrapped context.
    pub fn inner(&self) -> &Arc<ScanContext<P>> {
        &self.inner
    }

    /// See [`ScanContext::is_available`].
    pub async fn is_available(&self) -> bool {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || inner.is_available())
            .await
            .unwrap_or(false)
    }

    /// See [`ScanContext::scan`].
    pub async fn scan(&self, bytes: Vec<u8>, content_name: impl Into<String>) -> AmsiResult<ScanOutcome> {
        let content_name = content_name.into();
        self.run(move |ctx| ctx.scan(&bytes, &content_name)).await
    }

    /// See [`ScanContext::has_malware`].
    pub async fn has_malware(&self, bytes: Vec<u8>, content_name: impl Into<String>) -> AmsiResult<bool> {
        let content_name = content_name.into();
        self.run(move |ctx| ctx.has_malware(&bytes, &content_name)).await
    }

    /// Buffers an async reader to its end, then scans the buffer.
    pub async fn has_malware_in_async_reader<R>(
        &self,
        reader: &mut R,
        content_name: impl Into<String>,
    ) -> AmsiResult<bool>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let content_name = content_name.into();
        validate_content_name("content_name", &content_name)?;

        let mut buffer = Vec::new();
        reader.read_to_end(&mut buffer).await?;
        self.has_malware(buffer, content_name).await
    }

    async fn run<T, F>(&self, f: F) -> AmsiResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&ScanContext<P>) -> AmsiResult<T> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || f(&inner))
            .await
            .map_err(|e| AmsiError::internal(format!("scan task failed: {e}")))?
    }
}

impl<P: Provider + 'static> From<ScanContext<P>> for SharedScanContext<P> {
    fn from(context: ScanContext<P>) -> Self {
        Self::new(context)
    }
}
