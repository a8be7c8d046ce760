//! WorkOrderGen: emit paired HWS/HJB work orders with sequenced plan IDs
//! and InputBatch links, the last stage before MES dispatch.

use std::collections::HashMap;

use rand::Rng;
use tracing::warn;

use crate::aps::config::PipelineConfig;
use crate::aps::errors::{StageError, StageOutput};
use crate::aps::model::{FeedingOrder, InputBatch, OrderType, PackingOrder, PipelineRecord, ProcessFlags, WorkOrderPair};
use crate::aps::sequence::SequenceAllocator;

fn allocate_with_retry(
    allocator: &dyn SequenceAllocator,
    order_type: OrderType,
    plan_date: chrono::NaiveDate,
    attempts: u32,
) -> Result<(u64, bool, Option<String>), StageError> {
    let mut last_err = None;
    for _ in 0..attempts.max(1) {
        match allocator.next_sequence(order_type, plan_date) {
            Ok(seq) => return Ok((seq, false, None)),
            Err(e) => last_err = Some(e.to_string()),
        }
    }
    warn!(
        ?order_type,
        %plan_date,
        "sequence allocator exhausted retries, falling back to random sequence"
    );
    let fallback: u64 = rand::thread_rng().gen_range(1..=999_999_999);
    Ok((
        fallback,
        true,
        Some(last_err.unwrap_or_else(|| "sequence-fallback".to_string())),
    ))
}

fn plan_id(order_type: OrderType, seq: u64) -> String {
    format!("{}{:09}", order_type.prefix(), seq)
}

/// Assigns within-day execution order per `(plan_date, production_line)`
/// by ascending `planned_start`, ties broken by stable input order.
fn assign_sequences(records: &[PipelineRecord]) -> Vec<u32> {
    let mut groups: HashMap<(chrono::NaiveDate, &str), Vec<usize>> = HashMap::new();
    for (idx, record) in records.iter().enumerate() {
        let line = record.primary_maker().unwrap_or("");
        groups
            .entry((record.plan_date(), line))
            .or_default()
            .push(idx);
    }

    let mut sequences = vec![0u32; records.len()];
    for (_, mut indices) in groups {
        indices.sort_by_key(|&idx| (records[idx].planned_start, idx));
        for (seq, idx) in indices.into_iter().enumerate() {
            sequences[idx] = seq as u32 + 1;
        }
    }
    sequences
}

pub fn process(
    records: Vec<PipelineRecord>,
    allocator: &dyn SequenceAllocator,
    config: &PipelineConfig,
) -> StageOutput<WorkOrderPair> {
    let input_count = records.len();
    let mut errors = Vec::new();
    let execution_sequences = assign_sequences(&records);

    let mut pairs = Vec::with_capacity(records.len());
    for (record, exec_sequence) in records.into_iter().zip(execution_sequences) {
        if record.maker_codes.len() > 1 {
            errors.push(StageError::ConstraintViolation {
                work_order_nr: record.work_order_nr.clone(),
                reason: format!(
                    "record carries {} maker codes but was never fanned out (parallel_split disabled or skipped)",
                    record.maker_codes.len()
                ),
            });
            continue;
        }

        let plan_date = record.plan_date();
        let process_flags = record.process_flags;

        let (hws_seq, hws_backup, hws_reason) = match allocate_with_retry(
            allocator,
            OrderType::Hws,
            plan_date,
            config.allocation_retry_attempts,
        ) {
            Ok(v) => v,
            Err(e) => {
                errors.push(e);
                continue;
            }
        };
        let (hjb_seq, hjb_backup, hjb_reason) = match allocate_with_retry(
            allocator,
            OrderType::Hjb,
            plan_date,
            config.allocation_retry_attempts,
        ) {
            Ok(v) => v,
            Err(e) => {
                errors.push(e);
                continue;
            }
        };

        let hws_plan_id = plan_id(OrderType::Hws, hws_seq);
        let hjb_plan_id = plan_id(OrderType::Hjb, hjb_seq);

        let is_whole_batch = record.provenance.split_from.is_none();
        let is_last_one = if is_whole_batch {
            true
        } else {
            record.provenance.is_last_one
        };
        let batch_sequence = record.provenance.batch_sequence.unwrap_or(1);

        let feeding = FeedingOrder {
            plan_id: hws_plan_id.clone(),
            production_line: record.feeder_codes.join(","),
            material_code: record.article_nr.clone(),
            batch_code: String::new(),
            quantity: None,
            plan_start_time: record.planned_start,
            plan_end_time: record.planned_end,
            sequence: exec_sequence,
            shift: String::new(),
            process_flags,
            is_outsourcing: false,
            plan_date,
            is_backup: hws_backup,
            backup_reason: hws_reason,
            order_status: "PLANNED".to_string(),
        };

        let packing = PackingOrder {
            plan_id: hjb_plan_id,
            production_line: record.primary_maker().unwrap_or_default().to_string(),
            material_code: record.article_nr.clone(),
            batch_code: String::new(),
            quantity: record.final_quantity,
            plan_start_time: record.planned_start,
            plan_end_time: record.planned_end,
            sequence: exec_sequence,
            shift: String::new(),
            process_flags,
            is_outsourcing: false,
            plan_date,
            is_backup: hjb_backup,
            backup_reason: hjb_reason,
            order_status: "PLANNED".to_string(),
            input_batch: InputBatch {
                input_plan_id: hws_plan_id,
                input_batch_code: format!("{}-B{}", record.work_order_nr, batch_sequence),
                input_quantity: record.final_quantity,
                batch_sequence,
                is_whole_batch,
                is_main_channel: true,
                is_deleted: false,
                is_last_one,
                input_material_code: record.article_nr,
                input_bom_revision: String::new(),
                tiled: false,
            },
        };

        pairs.push(WorkOrderPair { feeding, packing });
    }

    tracing::debug!(
        input = input_count,
        output = pairs.len(),
        errors = errors.len(),
        "work_order_gen complete"
    );
    StageOutput::new("work_order_gen", input_count, pairs, errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aps::sequence::InMemorySequenceAllocator;
    use chrono::NaiveDate;

    fn rec(nr: &str, maker: &str, qty: u32) -> PipelineRecord {
        let d = NaiveDate::from_ymd_opt(2024, 8, 1).unwrap();
        PipelineRecord {
            work_order_nr: nr.into(),
            article_nr: "PA001".into(),
            package_type: "box".into(),
            specification: "spec".into(),
            quantity_total: qty,
            final_quantity: qty,
            maker_codes: vec![maker.into()],
            feeder_codes: vec!["WS01".into()],
            planned_start: d.and_hms_opt(8, 0, 0).unwrap(),
            planned_end: d.and_hms_opt(16, 0, 0).unwrap(),
            production_unit: "line1".into(),
            validation_status: "VALID".into(),
            process_flags: Default::default(),
            provenance: Default::default(),
        }
    }

    #[test]
    fn scenario_a_emits_one_matched_pair() {
        let allocator = InMemorySequenceAllocator::new();
        let config = PipelineConfig::default();
        let out = process(vec![rec("W001", "JJ01", 1000)], &allocator, &config);
        assert_eq!(out.records.len(), 1);
        let pair = &out.records[0];
        assert_eq!(pair.feeding.plan_id, "HWS000000001");
        assert_eq!(pair.packing.plan_id, "HJB000000001");
        assert_eq!(pair.packing.input_batch.input_plan_id, "HWS000000001");
        assert_eq!(pair.packing.quantity, 1000);
        assert!(pair.packing.input_batch.is_last_one);
    }

    #[test]
    fn sequence_numbers_are_dense_and_increasing_per_day() {
        let allocator = InMemorySequenceAllocator::new();
        let config = PipelineConfig::default();
        let records = vec![rec("W001", "JJ01", 500), rec("W002", "JJ01", 500)];
        let out = process(records, &allocator, &config);
        assert_eq!(out.records[0].feeding.plan_id, "HWS000000001");
        assert_eq!(out.records[1].feeding.plan_id, "HWS000000002");
    }

    #[test]
    fn multi_maker_record_is_rejected_not_silently_truncated() {
        let allocator = InMemorySequenceAllocator::new();
        let config = PipelineConfig::default();
        let mut r = rec("W001", "JJ01", 900);
        r.maker_codes = vec!["JJ01".into(), "JJ02".into(), "JJ03".into()];
        let out = process(vec![r], &allocator, &config);
        assert_eq!(out.records.len(), 0);
        assert_eq!(out.errors.len(), 1);
    }

    #[test]
    fn split_records_carry_batch_sequence_and_last_one_flag() {
        let allocator = InMemorySequenceAllocator::new();
        let config = PipelineConfig::default();
        let mut r1 = rec("W001", "JJ01", 333);
        r1.provenance.split_from = Some("W001".into());
        r1.provenance.batch_sequence = Some(1);
        r1.provenance.is_last_one = false;
        let mut r2 = rec("W001", "JJ01", 333);
        r2.provenance.split_from = Some("W001".into());
        r2.provenance.batch_sequence = Some(2);
        r2.provenance.is_last_one = true;

        let out = process(vec![r1, r2], &allocator, &config);
        assert!(!out.records[0].packing.input_batch.is_last_one);
        assert!(out.records[1].packing.input_batch.is_last_one);
        assert!(!out.records[0].packing.input_batch.is_whole_batch);
    }
}
