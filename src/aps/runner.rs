//! Pipeline Runner: composes the six stages, owns reference-data fetch,
//! cancellation, the soft deadline, and per-stage metrics aggregation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::aps::config::PipelineConfig;
use crate::aps::errors::{StageError, StageMetrics};
use crate::aps::model::WorkOrderPair;
use crate::aps::reference::{MaintenanceWindow, ReferenceDataProvider};
use crate::aps::sequence::SequenceAllocator;
use crate::aps::{merge, parallel_split, preprocess, split, time_correct, work_order_gen};

/// Terminal status of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Completed,
    Cancelled,
    Failed,
}

/// A cooperative cancellation flag shared across stages. Checked at
/// stage boundaries, not per-record.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunMetrics {
    pub stages: Vec<StageSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageSummary {
    pub stage: String,
    pub input_count: usize,
    pub output_count: usize,
    pub error_count: usize,
}

impl From<&StageMetrics> for StageSummary {
    fn from(m: &StageMetrics) -> Self {
        Self {
            stage: m.stage.to_string(),
            input_count: m.input_count,
            output_count: m.output_count,
            error_count: m.error_count,
        }
    }
}

pub struct RunResult {
    pub status: RunStatus,
    pub work_orders: Vec<WorkOrderPair>,
    pub metrics: RunMetrics,
    pub errors: Vec<StageError>,
}

/// Composes the six pipeline stages over one import batch. Dependencies
/// (`ReferenceDataProvider`, `SequenceAllocator`) are injected rather than
/// reached for through a global — see module design notes.
pub struct PipelineRunner<'a> {
    reference: &'a dyn ReferenceDataProvider,
    allocator: &'a dyn SequenceAllocator,
    config: PipelineConfig,
}

impl<'a> PipelineRunner<'a> {
    pub fn new(
        reference: &'a dyn ReferenceDataProvider,
        allocator: &'a dyn SequenceAllocator,
        config: PipelineConfig,
    ) -> Self {
        Self {
            reference,
            allocator,
            config,
        }
    }

    pub fn run(&self, import_batch_id: &str, token: &CancellationToken) -> Result<RunResult> {
        let deadline = Instant::now() + self.config.soft_deadline;
        let mut metrics = RunMetrics::default();
        let mut all_errors: Vec<StageError> = Vec::new();

        let rows = self
            .reference
            .get_decade_plans(import_batch_id)
            .context("fetching decade plans")?;
        info!(batch = import_batch_id, rows = rows.len(), "pipeline run starting");

        if rows.is_empty() {
            return Ok(RunResult {
                status: RunStatus::Completed,
                work_orders: Vec::new(),
                metrics,
                errors: all_errors,
            });
        }

        macro_rules! check_cancel {
            ($stage:expr) => {
                if token.is_cancelled() {
                    warn!(stage = $stage, "pipeline run cancelled");
                    return Ok(RunResult {
                        status: RunStatus::Cancelled,
                        work_orders: Vec::new(),
                        metrics,
                        errors: all_errors,
                    });
                }
                if Instant::now() > deadline {
                    error!(stage = $stage, "pipeline run exceeded soft deadline");
                    bail!("soft deadline exceeded during stage {}", $stage);
                }
            };
        }

        let preprocessed = preprocess::process(rows);
        metrics.stages.push(StageSummary::from(&preprocessed.metrics));
        all_errors.extend(preprocessed.errors);
        check_cancel!("preprocess");

        let merged = if self.config.merge_enabled {
            let out = merge::process(preprocessed.records, self.config.merge_gap_tolerance);
            metrics.stages.push(StageSummary::from(&out.metrics));
            all_errors.extend(out.errors);
            out.records
        } else {
            preprocessed.records
        };
        check_cancel!("merge");

        let shift_config = self
            .reference
            .get_shift_config()
            .context("fetching shift config")?;
        let shift_duration = shift_config
            .first()
            .map(|s| s.duration())
            .unwrap_or(self.config.default_shift_duration);

        let split_records = if self.config.split_enabled {
            let out = split::process(merged, shift_duration);
            metrics.stages.push(StageSummary::from(&out.metrics));
            all_errors.extend(out.errors);
            out.records
        } else {
            merged
        };
        check_cancel!("split");

        let maintenance_windows = self
            .reference
            .get_maintenance_plans()
            .context("fetching maintenance plans")?;
        let maintenance_by_machine = group_maintenance_by_machine(maintenance_windows);

        let time_correct_inputs = time_correct::TimeCorrectInputs {
            maintenance_by_machine: &maintenance_by_machine,
            shifts: &shift_config,
            max_maintenance_iterations: self.config.max_maintenance_iterations,
            sanity_horizon: self.config.sanity_horizon,
        };
        let corrected_records = if self.config.correction_enabled {
            let out = time_correct::process(split_records, &time_correct_inputs);
            metrics.stages.push(StageSummary::from(&out.metrics));
            all_errors.extend(out.errors);
            out.records
        } else {
            split_records
        };
        check_cancel!("time_correct");

        let relations = self
            .reference
            .get_machine_relations()
            .context("fetching machine relations")?;
        let fanned_out_records = if self.config.parallel_enabled {
            let out = parallel_split::process(corrected_records, &relations);
            metrics.stages.push(StageSummary::from(&out.metrics));
            all_errors.extend(out.errors);
            out.records
        } else {
            corrected_records
        };
        check_cancel!("parallel_split");

        let generated = work_order_gen::process(fanned_out_records, self.allocator, &self.config);
        metrics.stages.push(StageSummary::from(&generated.metrics));
        all_errors.extend(generated.errors);

        info!(
            work_orders = generated.records.len(),
            errors = all_errors.len(),
            "pipeline run completed"
        );

        Ok(RunResult {
            status: RunStatus::Completed,
            work_orders: generated.records,
            metrics,
            errors: all_errors,
        })
    }
}

fn group_maintenance_by_machine(
    windows: Vec<MaintenanceWindow>,
) -> HashMap<String, Vec<MaintenanceWindow>> {
    let mut grouped: HashMap<String, Vec<MaintenanceWindow>> = HashMap::new();
    for w in windows {
        grouped.entry(w.machine_code.clone()).or_default().push(w);
    }
    grouped
}
