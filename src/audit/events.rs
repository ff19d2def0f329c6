//! Audit event emission functions.

use crate::core::{ProviderFault, ScanReport, ScanVerdict};

const TARGET: &str = "amsibridge::audit";

/// Emits an audit event for a successfully initialized context.
pub fn emit_context_initialized(application_name: &str) {
    tracing::info!(
        target: TARGET,
        event_type = "context_initialized",
        application_name = %application_name,
        "Scan context initialized"
    );
}

/// Emits an audit event for a released context.
pub fn emit_context_released(application_name: &str) {
    tracing::info!(
        target: TARGET,
        event_type = "context_released",
        application_name = %application_name,
        "Scan context released"
    );
}

/// Emits an audit event for a release primitive whose failure was swallowed.
pub fn emit_teardown_failed(application_name: &str, resource: &str, fault: &ProviderFault) {
    tracing::warn!(
        target: TARGET,
        event_type = "teardown_failed",
        application_name = %application_name,
        resource = %resource,
        status = ?fault.status_code(),
        error = %fault,
        "Failed to release provider resource"
    );
}

/// Emits an audit event for a completed scan.
pub fn emit_scan_completed(report: &ScanReport) {
    tracing::info!(
        target: TARGET,
        event_type = "scan_completed",
        scan_id = %report.id,
        content_name = %report.content_name,
        content_hash_blake3 = %report.blake3,
        size = report.size,
        verdict = ?report.verdict.map(|v| v.code()),
        outcome = %report.outcome,
        duration_ms = report.duration.as_millis() as u64,
        "Scan completed"
    );
}

/// Emits an audit event for a scan refused by administrative policy.
pub fn emit_policy_blocked(content_name: &str, verdict: ScanVerdict) {
    tracing::warn!(
        target: TARGET,
        event_type = "policy_blocked",
        content_name = %content_name,
        verdict = verdict.code(),
        "Admin policy does not allow scanning"
    );
}
