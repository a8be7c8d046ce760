//! Scheduling pipeline library.
//!
//! Exposes the `aps` module — the six-stage decade-plan-to-work-order
//! pipeline — for use by the `pipeline_run` binary and integration tests.

pub mod aps;
