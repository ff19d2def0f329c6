//! Scan report structures.
//!
//! This module defines `ScanReport`, a serializable record of a single
//! scan: what was scanned, the raw verdict, its classification, and timing.

use crate::core::types::{ScanOutcome, ScanVerdict};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The complete record of one scan operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    /// Unique identifier for this report.
    pub id: String,

    /// Content name passed to the provider.
    pub content_name: String,

    /// Size of the scanned content in bytes.
    pub size: u64,

    /// BLAKE3 digest of the content, hex encoded.
    pub blake3: String,

    /// Raw verdict code. `None` when nothing was sent to the provider.
    pub verdict: Option<ScanVerdict>,

    /// Classified outcome.
    pub outcome: ScanOutcome,

    /// When the scan started.
    pub started_at: DateTime<Utc>,

    /// When the scan completed.
    pub completed_at: DateTime<Utc>,

    /// How long the scan took.
    #[serde(with = "duration_serde")]
    pub duration: Duration,
}

impl ScanReport {
    /// Creates a report for content that was scanned (or skipped) just now.
    pub fn new(
        content: &[u8],
        content_name: impl Into<String>,
        verdict: Option<ScanVerdict>,
        duration: Duration,
    ) -> Self {
        let now = Utc::now();
        let outcome = verdict
            .map(|v| v.classify())
            .unwrap_or(ScanOutcome::Clean);
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            content_name: content_name.into(),
            size: content.len() as u64,
            blake3: blake3::hash(content).to_hex().to_string(),
            verdict,
            outcome,
            started_at: now - chrono::Duration::from_std(duration).unwrap_or_default(),
            completed_at: now,
            duration,
        }
    }

    /// Returns `true` if the content is clean.
    pub fn is_clean(&self) -> bool {
        self.outcome.is_clean()
    }

    /// Returns `true` if the content is infected.
    pub fn is_infected(&self) -> bool {
        self.outcome.is_infected()
    }

    /// Returns `true` if the provider refused to scan by policy.
    pub fn is_policy_blocked(&self) -> bool {
        self.outcome.is_policy_blocked()
    }

    /// Serializes the report as JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Serde helper for Duration serialization.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
