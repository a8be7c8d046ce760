//! Merge: combine rows with identical (article, machine set) whose
//! intervals are contiguous within a configurable gap tolerance.

use std::collections::HashMap;

use chrono::Duration;
use tracing::debug;

use crate::aps::errors::{StageError, StageOutput};
use crate::aps::model::PipelineRecord;

/// Grouping key: article plus the exact ordered machine assignment, since
/// two rows with the same article but different machine sets must not merge.
fn group_key(record: &PipelineRecord) -> (String, Vec<String>, Vec<String>) {
    (
        record.article_nr.clone(),
        record.maker_codes.clone(),
        record.feeder_codes.clone(),
    )
}

fn contiguous(a: &PipelineRecord, b: &PipelineRecord, gap_tolerance: Duration) -> bool {
    let gap = b.planned_start - a.planned_end;
    gap >= Duration::zero() && gap <= gap_tolerance
}

fn merge_pair(base: PipelineRecord, next: PipelineRecord) -> PipelineRecord {
    let mut merged_from = base.provenance.merged_from.clone();
    if merged_from.is_empty() {
        merged_from.push(base.work_order_nr.clone());
    }
    merged_from.push(next.work_order_nr.clone());

    let mut record = base;
    record.final_quantity += next.final_quantity;
    record.quantity_total += next.quantity_total;
    record.planned_start = record.planned_start.min(next.planned_start);
    record.planned_end = record.planned_end.max(next.planned_end);
    record.provenance.merged_from = merged_from;
    record
}

/// Merges contiguous, compatible rows, preserving input order of the
/// resulting (possibly merged) records by the position of each group's
/// first member.
pub fn process(records: Vec<PipelineRecord>, gap_tolerance: Duration) -> StageOutput<PipelineRecord> {
    let input_count = records.len();
    let mut groups: HashMap<(String, Vec<String>, Vec<String>), Vec<PipelineRecord>> = HashMap::new();
    let mut group_order: Vec<(String, Vec<String>, Vec<String>)> = Vec::new();

    for record in records {
        let key = group_key(&record);
        if !groups.contains_key(&key) {
            group_order.push(key.clone());
        }
        groups.entry(key).or_default().push(record);
    }

    let mut output = Vec::with_capacity(input_count);
    for key in group_order {
        let Some(mut bucket) = groups.remove(&key) else {
            continue;
        };
        bucket.sort_by_key(|r| r.planned_start);

        let mut merged: Vec<PipelineRecord> = Vec::new();
        for record in bucket {
            let extend = matches!(merged.last(), Some(prev) if contiguous(prev, &record, gap_tolerance));
            if extend {
                let taken = merged.pop().expect("just matched Some(prev) above");
                merged.push(merge_pair(taken, record));
            } else {
                merged.push(record);
            }
        }
        output.extend(merged);
    }

    debug!(input = input_count, output = output.len(), "merge complete");
    StageOutput::new("merge", input_count, output, Vec::<StageError>::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Timelike};

    fn rec(nr: &str, start_h: u32, end_h: u32, qty: u32) -> PipelineRecord {
        let d = NaiveDate::from_ymd_opt(2024, 8, 1).unwrap();
        PipelineRecord {
            work_order_nr: nr.into(),
            article_nr: "PA001".into(),
            package_type: "box".into(),
            specification: "spec".into(),
            quantity_total: qty,
            final_quantity: qty,
            maker_codes: vec!["JJ01".into()],
            feeder_codes: vec!["WS01".into()],
            planned_start: d.and_hms_opt(start_h, 0, 0).unwrap(),
            planned_end: d.and_hms_opt(end_h, 0, 0).unwrap(),
            production_unit: "line1".into(),
            validation_status: "VALID".into(),
            process_flags: Default::default(),
            provenance: Default::default(),
        }
    }

    #[test]
    fn scenario_e_merges_contiguous_rows() {
        let rows = vec![rec("W001", 8, 12, 500), rec("W002", 12, 16, 500)];
        let out = process(rows, Duration::zero());
        assert_eq!(out.records.len(), 1);
        let merged = &out.records[0];
        assert_eq!(merged.final_quantity, 1000);
        assert_eq!(merged.provenance.merged_from, vec!["W001", "W002"]);
        assert_eq!(merged.planned_start.hour(), 8);
        assert_eq!(merged.planned_end.hour(), 16);
    }

    #[test]
    fn non_contiguous_rows_pass_through_unchanged() {
        let rows = vec![rec("W001", 8, 12, 500), rec("W002", 13, 17, 500)];
        let out = process(rows, Duration::zero());
        assert_eq!(out.records.len(), 2);
    }

    #[test]
    fn different_machine_sets_never_merge() {
        let mut b = rec("W002", 12, 16, 500);
        b.maker_codes = vec!["JJ02".into()];
        let out = process(vec![rec("W001", 8, 12, 500), b], Duration::zero());
        assert_eq!(out.records.len(), 2);
    }

    #[test]
    fn gap_within_tolerance_still_merges() {
        let rows = vec![rec("W001", 8, 12, 500), rec("W002", 13, 17, 500)];
        let out = process(rows, Duration::hours(1));
        assert_eq!(out.records.len(), 1);
    }
}
