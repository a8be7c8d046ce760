//! End-to-end tests driving the full scheduling pipeline through
//! `PipelineRunner`, covering the literal scenarios A-E and the
//! cross-cutting pairing, sequencing, and overlap invariants.

use aps_scheduling_pipeline::aps::invariants::{check_input_plan_id_resolves, check_no_overlap, check_sequence_density};
use aps_scheduling_pipeline::aps::model::DecadePlanRow;
use aps_scheduling_pipeline::aps::reference::{InMemoryReferenceData, MaintenanceWindow, ShiftConfig};
use aps_scheduling_pipeline::aps::sequence::InMemorySequenceAllocator;
use aps_scheduling_pipeline::aps::{CancellationToken, PipelineConfig, PipelineRunner, RunStatus};
use chrono::{NaiveDate, NaiveTime};

fn full_day_shift() -> Vec<ShiftConfig> {
    vec![ShiftConfig {
        shift_name: "all_day".into(),
        start_time: NaiveTime::from_hms_opt(0, 0, 0).unwrap(),
        end_time: NaiveTime::from_hms_opt(23, 59, 59).unwrap(),
    }]
}

fn eight_hour_shift() -> Vec<ShiftConfig> {
    vec![ShiftConfig {
        shift_name: "morning".into(),
        start_time: NaiveTime::from_hms_opt(0, 0, 0).unwrap(),
        end_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
    }]
}

fn row(nr: &str, article: &str, makers: Vec<&str>, qty: u32, start_h: u32, end_h: u32) -> DecadePlanRow {
    let d = NaiveDate::from_ymd_opt(2024, 8, 1).unwrap();
    DecadePlanRow {
        work_order_nr: nr.into(),
        article_nr: article.into(),
        package_type: "box".into(),
        specification: "spec".into(),
        quantity_total: qty,
        final_quantity: qty,
        maker_codes: makers.into_iter().map(String::from).collect(),
        feeder_codes: vec!["WS01".into()],
        planned_start: d.and_hms_opt(start_h, 0, 0).unwrap(),
        planned_end: d.and_hms_opt(end_h, 0, 0).unwrap(),
        production_unit: "line1".into(),
        validation_status: "VALID".into(),
    }
}

#[test]
fn scenario_a_pass_through() {
    let reference = InMemoryReferenceData::new()
        .with_decade_plans("batch", vec![row("W001", "PA001", vec!["JJ01"], 1000, 8, 16)])
        .with_shift_config(full_day_shift());
    let allocator = InMemorySequenceAllocator::new();
    let runner = PipelineRunner::new(&reference, &allocator, PipelineConfig::default());
    let token = CancellationToken::new();

    let result = runner.run("batch", &token).unwrap();
    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(result.work_orders.len(), 1);

    let pair = &result.work_orders[0];
    assert_eq!(pair.feeding.plan_id, "HWS000000001");
    assert_eq!(pair.packing.plan_id, "HJB000000001");
    assert_eq!(pair.packing.quantity, 1000);
    assert_eq!(pair.packing.input_batch.input_plan_id, "HWS000000001");
    assert_eq!(pair.feeding.plan_start_time, pair.packing.plan_start_time);
    assert_eq!(pair.feeding.plan_end_time, pair.packing.plan_end_time);
}

#[test]
fn scenario_b_maintenance_shift() {
    let d = NaiveDate::from_ymd_opt(2024, 8, 1).unwrap();
    let reference = InMemoryReferenceData::new()
        .with_decade_plans("batch", vec![row("W001", "PA001", vec!["JJ01"], 1000, 8, 16)])
        .with_shift_config(full_day_shift())
        .with_maintenance_plans(vec![MaintenanceWindow {
            machine_code: "JJ01".into(),
            maint_start_time: d.and_hms_opt(10, 0, 0).unwrap(),
            maint_end_time: d.and_hms_opt(12, 0, 0).unwrap(),
        }]);
    let allocator = InMemorySequenceAllocator::new();
    let runner = PipelineRunner::new(&reference, &allocator, PipelineConfig::default());
    let token = CancellationToken::new();

    let result = runner.run("batch", &token).unwrap();
    let pair = &result.work_orders[0];
    assert_eq!(pair.packing.plan_start_time, d.and_hms_opt(12, 0, 0).unwrap());
    assert_eq!(pair.packing.plan_end_time, d.and_hms_opt(20, 0, 0).unwrap());
}

#[test]
fn scenario_c_parallel_fan_out() {
    let reference = InMemoryReferenceData::new()
        .with_decade_plans(
            "batch",
            vec![row("W001", "PA001", vec!["JJ01", "JJ02", "JJ03"], 900, 8, 16)],
        )
        .with_shift_config(full_day_shift());
    let allocator = InMemorySequenceAllocator::new();
    let runner = PipelineRunner::new(&reference, &allocator, PipelineConfig::default());
    let token = CancellationToken::new();

    let result = runner.run("batch", &token).unwrap();
    assert_eq!(result.work_orders.len(), 3);
    for pair in &result.work_orders {
        assert_eq!(pair.packing.quantity, 300);
    }
}

#[test]
fn scenario_d_split_by_duration() {
    let reference = InMemoryReferenceData::new()
        .with_decade_plans("batch", vec![row("W001", "PA001", vec!["JJ01"], 1000, 0, 24)])
        .with_shift_config(eight_hour_shift());
    let allocator = InMemorySequenceAllocator::new();
    let runner = PipelineRunner::new(&reference, &allocator, PipelineConfig::default());
    let token = CancellationToken::new();

    let result = runner.run("batch", &token).unwrap();
    assert_eq!(result.work_orders.len(), 3);
    let last = result
        .work_orders
        .iter()
        .max_by_key(|p| p.packing.input_batch.batch_sequence)
        .unwrap();
    assert!(last.packing.input_batch.is_last_one);
    let total: u32 = result.work_orders.iter().map(|p| p.packing.quantity).sum();
    assert_eq!(total, 1000);
}

#[test]
fn scenario_e_merge_contiguous() {
    let reference = InMemoryReferenceData::new()
        .with_decade_plans(
            "batch",
            vec![
                row("W001", "PA001", vec!["JJ01"], 500, 8, 12),
                row("W002", "PA001", vec!["JJ01"], 500, 12, 16),
            ],
        )
        .with_shift_config(full_day_shift());
    let allocator = InMemorySequenceAllocator::new();
    let runner = PipelineRunner::new(&reference, &allocator, PipelineConfig::default());
    let token = CancellationToken::new();

    let result = runner.run("batch", &token).unwrap();
    assert_eq!(result.work_orders.len(), 1);
    assert_eq!(result.work_orders[0].packing.quantity, 1000);
}

#[test]
fn invariants_hold_across_a_multi_record_run() {
    let reference = InMemoryReferenceData::new()
        .with_decade_plans(
            "batch",
            vec![
                row("W001", "PA001", vec!["JJ01"], 1000, 8, 16),
                row("W002", "PA002", vec!["JJ02", "JJ03"], 600, 8, 16),
            ],
        )
        .with_shift_config(full_day_shift());
    let allocator = InMemorySequenceAllocator::new();
    let runner = PipelineRunner::new(&reference, &allocator, PipelineConfig::default());
    let token = CancellationToken::new();

    let result = runner.run("batch", &token).unwrap();
    assert!(check_input_plan_id_resolves(&result.work_orders).is_empty());
    assert!(check_sequence_density(&result.work_orders).is_empty());
    assert!(check_no_overlap(&result.work_orders).is_empty());
    assert_eq!(result.work_orders.len(), 3);
}

#[test]
fn empty_input_completes_with_empty_output() {
    let reference = InMemoryReferenceData::new().with_shift_config(full_day_shift());
    let allocator = InMemorySequenceAllocator::new();
    let runner = PipelineRunner::new(&reference, &allocator, PipelineConfig::default());
    let token = CancellationToken::new();

    let result = runner.run("missing-batch", &token).unwrap();
    assert_eq!(result.status, RunStatus::Completed);
    assert!(result.work_orders.is_empty());
}
