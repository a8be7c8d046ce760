//! Pipeline configuration, loaded from the environment with sane defaults.
//!
//! Each field reads its own `env::var`, falls back to a parsed default on
//! missing/invalid input, never panics on a malformed environment.

use std::env;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Merge stage: maximum gap between two rows' intervals still
    /// considered contiguous (default 0).
    pub merge_gap_tolerance: chrono::Duration,
    /// Split stage: shift duration used when ShiftConfig reference data is
    /// absent (default 8h).
    pub default_shift_duration: chrono::Duration,
    /// TimeCorrect: bounded loop limit for maintenance-window resolution
    /// (default 8).
    pub max_maintenance_iterations: u32,
    /// TimeCorrect: sanity horizon beyond which a correction is abandoned
    /// (default 7 days).
    pub sanity_horizon: chrono::Duration,
    /// Soft deadline for an entire pipeline run, checked at each stage
    /// boundary (default 300s).
    pub soft_deadline: Duration,
    /// WorkOrderGen: attempts before falling back to a random sequence
    /// (default 3).
    pub allocation_retry_attempts: u32,
    /// Per-run algorithm toggles, carried over from the source system's
    /// scheduling-task parameters. Disabling a stage makes it a pass-through.
    pub merge_enabled: bool,
    pub split_enabled: bool,
    pub correction_enabled: bool,
    pub parallel_enabled: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            merge_gap_tolerance: chrono::Duration::zero(),
            default_shift_duration: chrono::Duration::hours(8),
            max_maintenance_iterations: 8,
            sanity_horizon: chrono::Duration::days(7),
            soft_deadline: Duration::from_secs(300),
            allocation_retry_attempts: 3,
            merge_enabled: true,
            split_enabled: true,
            correction_enabled: true,
            parallel_enabled: true,
        }
    }
}

impl PipelineConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        cfg.merge_gap_tolerance = env::var("APS_MERGE_GAP_TOLERANCE_SECS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .map(chrono::Duration::seconds)
            .unwrap_or(cfg.merge_gap_tolerance);

        cfg.default_shift_duration = env::var("APS_DEFAULT_SHIFT_HOURS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|v| *v > 0)
            .map(chrono::Duration::hours)
            .unwrap_or(cfg.default_shift_duration);

        cfg.max_maintenance_iterations = env::var("APS_MAX_MAINTENANCE_ITERATIONS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(cfg.max_maintenance_iterations);

        cfg.sanity_horizon = env::var("APS_SANITY_HORIZON_DAYS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|v| *v > 0)
            .map(chrono::Duration::days)
            .unwrap_or(cfg.sanity_horizon);

        cfg.soft_deadline = env::var("APS_SOFT_DEADLINE_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|v| *v > 0)
            .map(Duration::from_secs)
            .unwrap_or(cfg.soft_deadline);

        cfg.allocation_retry_attempts = env::var("APS_ALLOCATION_RETRY_ATTEMPTS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(cfg.allocation_retry_attempts);

        cfg.merge_enabled = env::var("APS_MERGE_ENABLED")
            .ok()
            .and_then(|v| v.parse::<bool>().ok())
            .unwrap_or(cfg.merge_enabled);

        cfg.split_enabled = env::var("APS_SPLIT_ENABLED")
            .ok()
            .and_then(|v| v.parse::<bool>().ok())
            .unwrap_or(cfg.split_enabled);

        cfg.correction_enabled = env::var("APS_CORRECTION_ENABLED")
            .ok()
            .and_then(|v| v.parse::<bool>().ok())
            .unwrap_or(cfg.correction_enabled);

        cfg.parallel_enabled = env::var("APS_PARALLEL_ENABLED")
            .ok()
            .and_then(|v| v.parse::<bool>().ok())
            .unwrap_or(cfg.parallel_enabled);

        cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_values() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.max_maintenance_iterations, 8);
        assert_eq!(cfg.default_shift_duration, chrono::Duration::hours(8));
        assert_eq!(cfg.soft_deadline, Duration::from_secs(300));
    }
}
