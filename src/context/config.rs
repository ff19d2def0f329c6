//! Scan context configuration.

/// Largest buffer the provider's 32-bit length parameter can describe.
pub const MAX_PROVIDER_BUFFER: u64 = u32::MAX as u64;

/// Content name used by the availability probe.
pub const DEFAULT_PROBE_CONTENT_NAME: &str = "EICAR";

/// Configuration for a [`ScanContext`](crate::ScanContext).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanContextConfig {
    /// Application identity passed to the provider. A missing or blank name
    /// is replaced with a generated UUID.
    pub application_name: Option<String>,

    /// Content name reported for the availability probe.
    pub probe_content_name: String,

    /// Maximum buffer size to send to the provider.
    pub max_content_size: u64,
}

impl Default for ScanContextConfig {
    fn default() -> Self {
        Self {
            application_name: None,
            probe_content_name: DEFAULT_PROBE_CONTENT_NAME.to_string(),
            max_content_size: MAX_PROVIDER_BUFFER,
        }
    }
}

impl ScanContextConfig {
    /// Creates a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the application name.
    pub fn with_application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = Some(name.into());
        self
    }

    /// Sets the probe content name.
    pub fn with_probe_content_name(mut self, name: impl Into<String>) -> Self {
        self.probe_content_name = name.into();
        self
    }

    /// Sets the maximum content size. Values above the provider's limit are clamped.
    pub fn with_max_content_size(mut self, size: u64) -> Self {
        self.max_content_size = size.min(MAX_PROVIDER_BUFFER);
        self
    }

    /// Returns the application name to initialize with, generating one if needed.
    pub(crate) fn resolve_application_name(&self) -> String {
        match self.application_name.as_deref() {
            Some(name) if !name.trim().is_empty() => name.to_string(),
            _ => uuid::Uuid::new_v4().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ScanContextConfig::default();
        assert_eq!(config.application_name, None);
        assert_eq!(config.probe_content_name, "EICAR");
        assert_eq!(config.max_content_size, u32::MAX as u64);
    }

    #[test]
    fn test_config_builder() {
        let config = ScanContextConfig::new()
            .with_application_name("uploads")
            .with_probe_content_name("probe")
            .with_max_content_size(u64::MAX);

        assert_eq!(config.resolve_application_name(), "uploads");
        assert_eq!(config.probe_content_name, "probe");
        assert_eq!(config.max_content_size, MAX_PROVIDER_BUFFER);
    }

    #[test]
    fn test_blank_name_generates_identity() {
        let config = ScanContextConfig::new().with_application_name("   ");
        let first = config.resolve_application_name();
        let second = config.resolve_application_name();

        assert!(uuid::Uuid::parse_str(&first).is_ok());
        assert_ne!(first, second);
    }
}
