//! Structured audit logging.
//!
//! This module emits lifecycle and scan events using the `tracing` crate on
//! the `amsibridge::audit` target. Events can be captured by any tracing
//! subscriber.

mod events;

pub use events::{
    emit_context_initialized, emit_context_released, emit_policy_blocked, emit_scan_completed,
    emit_teardown_failed,
};
