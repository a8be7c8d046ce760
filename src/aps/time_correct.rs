//! TimeCorrect: avoid per-machine maintenance windows, then align to the
//! shift calendar, all while preserving record duration. The hardest
//! stage: maintenance resolution can shift a window far enough that a
//! second maintenance window now overlaps it, so resolution runs in a
//! bounded loop rather than a single pass.

use std::collections::HashMap;

use chrono::{Duration, NaiveDateTime, NaiveTime};
use tracing::{debug, warn};

use crate::aps::errors::{StageError, StageOutput};
use crate::aps::model::PipelineRecord;
use crate::aps::reference::{MaintenanceWindow, ShiftConfig};

fn shift_window_on(day: chrono::NaiveDate, shift: &ShiftConfig) -> (NaiveDateTime, NaiveDateTime) {
    let start_dt = day.and_time(shift.start_time);
    let end_dt = if shift.end_time > shift.start_time {
        day.and_time(shift.end_time)
    } else {
        (day + Duration::days(1)).and_time(shift.end_time)
    };
    (start_dt, end_dt)
}

fn is_within_any_shift(t: NaiveDateTime, shifts: &[ShiftConfig]) -> bool {
    if shifts.is_empty() {
        return true;
    }
    for shift in shifts {
        for day_offset in [-1i64, 0] {
            let day = t.date() + Duration::days(day_offset);
            let (start_dt, end_dt) = shift_window_on(day, shift);
            if start_dt <= t && t < end_dt {
                return true;
            }
        }
    }
    false
}

fn next_shift_start_at_or_after(t: NaiveDateTime, shifts: &[ShiftConfig]) -> NaiveDateTime {
    if shifts.is_empty() {
        return t;
    }
    let mut best: Option<NaiveDateTime> = None;
    for shift in shifts {
        for day_offset in [-1i64, 0, 1] {
            let day = t.date() + Duration::days(day_offset);
            let (start_dt, _) = shift_window_on(day, shift);
            if start_dt >= t {
                best = Some(match best {
                    Some(b) => b.min(start_dt),
                    None => start_dt,
                });
            }
        }
    }
    best.unwrap_or(t)
}

/// Resolves maintenance-window overlaps for one record against one
/// machine's windows, bounded by `max_iterations`. Returns the corrected
/// (start, end) and whether any shift was applied.
fn resolve_maintenance(
    mut start: NaiveDateTime,
    duration: Duration,
    windows: &[MaintenanceWindow],
    max_iterations: u32,
) -> (NaiveDateTime, NaiveDateTime, bool, bool) {
    let mut end = start + duration;
    let mut resolved = false;
    let mut exhausted = false;

    for _ in 0..max_iterations {
        let hit = windows.iter().find(|w| w.overlaps(start, end));
        match hit {
            Some(w) => {
                start = w.maint_end_time;
                end = start + duration;
                resolved = true;
            }
            None => return (start, end, resolved, false),
        }
    }

    if windows.iter().any(|w| w.overlaps(start, end)) {
        exhausted = true;
    }
    (start, end, resolved, exhausted)
}

pub struct TimeCorrectInputs<'a> {
    pub maintenance_by_machine: &'a HashMap<String, Vec<MaintenanceWindow>>,
    pub shifts: &'a [ShiftConfig],
    pub max_maintenance_iterations: u32,
    pub sanity_horizon: Duration,
}

pub fn process(records: Vec<PipelineRecord>, inputs: &TimeCorrectInputs) -> StageOutput<PipelineRecord> {
    let input_count = records.len();
    let mut errors = Vec::new();
    let mut warned_count = 0usize;

    // Step 1: per-record maintenance avoidance + shift alignment, independent of other records.
    let mut corrected: Vec<(usize, PipelineRecord, bool)> = records
        .into_iter()
        .enumerate()
        .map(|(idx, mut record)| {
            let original_start = record.planned_start;
            let original_end = record.planned_end;
            let duration = record.duration();

            let empty = Vec::new();
            let windows = record
                .primary_maker()
                .and_then(|m| inputs.maintenance_by_machine.get(m))
                .unwrap_or(&empty);
            let mut sorted_windows = windows.clone();
            sorted_windows.sort_by_key(|w| w.maint_start_time);

            let (mut start, mut end, maint_resolved, exhausted) = resolve_maintenance(
                record.planned_start,
                duration,
                &sorted_windows,
                inputs.max_maintenance_iterations,
            );

            if exhausted {
                errors.push(StageError::ConstraintViolation {
                    work_order_nr: record.work_order_nr.clone(),
                    reason: "maintenance resolution exceeded max iterations".into(),
                });
                warned_count += 1;
                record.provenance.correction_failed = true;
                return (idx, record, false);
            }

            let mut shift_aligned = false;
            if !is_within_any_shift(start, inputs.shifts) {
                start = next_shift_start_at_or_after(start, inputs.shifts);
                end = start + duration;
                shift_aligned = true;
            }

            let total_drift = (start - original_start).num_seconds().abs();
            if Duration::seconds(total_drift) > inputs.sanity_horizon {
                warn!(
                    work_order_nr = %record.work_order_nr,
                    drift_secs = total_drift,
                    "time correction exceeded sanity horizon, reverting"
                );
                errors.push(StageError::ConstraintViolation {
                    work_order_nr: record.work_order_nr.clone(),
                    reason: "correction drift exceeded sanity horizon, reverted".into(),
                });
                warned_count += 1;
                record.provenance.correction_failed = true;
                return (idx, record, false);
            }

            let was_corrected = maint_resolved || shift_aligned;
            if was_corrected {
                record.provenance.original_planned_start = Some(original_start);
                record.provenance.original_planned_end = Some(original_end);
                record.provenance.maintenance_conflict_resolved = maint_resolved;
                record.provenance.shift_aligned = shift_aligned;
                record.provenance.time_corrected = true;
                record.planned_start = start;
                record.planned_end = end;
            }
            (idx, record, was_corrected)
        })
        .collect();

    // Step 2: per-machine overlap resolution in chronological order.
    let mut by_machine: HashMap<String, Vec<usize>> = HashMap::new();
    for (pos, (_, record, _)) in corrected.iter().enumerate() {
        if let Some(m) = record.primary_maker() {
            by_machine.entry(m.to_string()).or_default().push(pos);
        }
    }

    for (_, positions) in by_machine.iter_mut() {
        positions.sort_by_key(|&p| (corrected[p].1.planned_start, corrected[p].0));
        for w in 1..positions.len() {
            let prev_end = corrected[positions[w - 1]].1.planned_end;
            let cur = &mut corrected[positions[w]].1;
            if cur.planned_start < prev_end {
                let duration = cur.duration();
                if cur.provenance.original_planned_start.is_none() {
                    cur.provenance.original_planned_start = Some(cur.planned_start);
                    cur.provenance.original_planned_end = Some(cur.planned_end);
                }
                cur.planned_start = prev_end;
                cur.planned_end = prev_end + duration;
                cur.provenance.time_corrected = true;
                corrected[positions[w]].2 = true;
            }
        }
    }

    // Step 3: reassemble final order — uncorrected records keep their slot,
    // corrected records fill their slots sorted by (planned_start, original index).
    let mut corrected_positions: Vec<usize> = corrected
        .iter()
        .enumerate()
        .filter(|(_, (_, _, was_corrected))| *was_corrected)
        .map(|(pos, _)| pos)
        .collect();

    let mut corrected_sorted = corrected_positions.clone();
    corrected_sorted.sort_by_key(|&p| (corrected[p].1.planned_start, corrected[p].0));

    corrected_positions.sort();

    let mut final_records: Vec<Option<PipelineRecord>> = vec![None; corrected.len()];
    for (pos, (_, record, was_corrected)) in corrected.iter().enumerate() {
        if !*was_corrected {
            final_records[pos] = Some(record.clone());
        }
    }
    for (slot, source_pos) in corrected_positions.into_iter().zip(corrected_sorted.into_iter()) {
        final_records[slot] = Some(corrected[source_pos].1.clone());
    }

    let output: Vec<PipelineRecord> = final_records.into_iter().flatten().collect();

    debug!(
        input = input_count,
        output = output.len(),
        errors = errors.len(),
        warned = warned_count,
        "time_correct complete"
    );
    StageOutput::with_warnings("time_correct", input_count, output, errors, warned_count)
}
