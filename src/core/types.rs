//! Core types used throughout the amsibridge library.
//!
//! This module defines the raw verdict code returned by the provider, the
//! tri-state outcome it classifies into, and the opaque handle types that
//! tie provider resources to a single owner.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroUsize;

/// The outcome of a scan after classifying the provider's verdict.
///
/// - `Clean`: no threat detected
/// - `Infected`: the provider detected malware
/// - `PolicyBlocked`: administrative policy prevented the scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanOutcome {
    /// No threat was detected.
    Clean,

    /// The provider detected malware.
    Infected,

    /// Scanning is disabled by administrative policy. This is neither clean
    /// nor infected; the content was not inspected.
    PolicyBlocked,
}

impl ScanOutcome {
    /// Returns `true` if the outcome indicates clean content.
    pub fn is_clean(&self) -> bool {
        matches!(self, Self::Clean)
    }

    /// Returns `true` if the outcome indicates detected malware.
    pub fn is_infected(&self) -> bool {
        matches!(self, Self::Infected)
    }

    /// Returns `true` if scanning was refused by policy.
    pub fn is_policy_blocked(&self) -> bool {
        matches!(self, Self::PolicyBlocked)
    }

    /// Returns the outcome as a lowercase label for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Clean => "clean",
            Self::Infected => "infected",
            Self::PolicyBlocked => "policy_blocked",
        }
    }
}

impl fmt::Display for ScanOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raw verdict code returned by the provider's scan primitives.
///
/// See the `AMSI_RESULT` enumeration in the Windows SDK.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScanVerdict(i32);

impl ScanVerdict {
    /// `AMSI_RESULT_CLEAN`.
    pub const CLEAN: i32 = 0;
    /// `AMSI_RESULT_NOT_DETECTED`.
    pub const NOT_DETECTED: i32 = 1;
    /// First code of the `AMSI_RESULT_BLOCKED_BY_ADMIN` range.
    pub const BLOCKED_BY_ADMIN_START: i32 = 16384;
    /// Last code of the `AMSI_RESULT_BLOCKED_BY_ADMIN` range (inclusive).
    pub const BLOCKED_BY_ADMIN_END: i32 = 20479;
    /// `AMSI_RESULT_DETECTED`; any code at or above this is a detection.
    pub const DETECTED: i32 = 32768;

    /// Wraps a raw verdict code.
    pub const fn new(code: i32) -> Self {
        Self(code)
    }

    /// Returns the raw verdict code.
    pub const fn code(&self) -> i32 {
        self.0
    }

    /// Classifies the verdict code into an outcome.
    pub const fn classify(&self) -> ScanOutcome {
        if self.0 >= Self::DETECTED {
            ScanOutcome::Infected
        } else if self.0 >= Self::BLOCKED_BY_ADMIN_START && self.0 <= Self::BLOCKED_BY_ADMIN_END {
            ScanOutcome::PolicyBlocked
        } else {
            ScanOutcome::Clean
        }
    }
}

impl From<i32> for ScanVerdict {
    fn from(code: i32) -> Self {
        Self(code)
    }
}

impl fmt::Display for ScanVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque handle to an initialized provider connection.
///
/// Not `Clone`: `Provider::uninitialize` consumes it, so a handle is released
/// at most once.
#[derive(Debug, PartialEq, Eq)]
pub struct ContextHandle(NonZeroUsize);

impl ContextHandle {
    /// Wraps a raw handle value returned by a provider.
    pub const fn from_raw(raw: NonZeroUsize) -> Self {
        Self(raw)
    }

    /// Returns the raw handle value.
    pub const fn as_raw(&self) -> NonZeroUsize {
        self.0
    }
}

/// Opaque handle to an open scan session.
///
/// Not `Clone`: `Provider::close_session` consumes it.
#[derive(Debug, PartialEq, Eq)]
pub struct SessionHandle(NonZeroUsize);

impl SessionHandle {
    /// Wraps a raw handle value returned by a provider.
    pub const fn from_raw(raw: NonZeroUsize) -> Self {
        Self(raw)
    }

    /// Returns the raw handle value.
    pub const fn as_raw(&self) -> NonZeroUsize {
        self.0
    }
}
