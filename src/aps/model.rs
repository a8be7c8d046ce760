//! Core Data Model
//!
//! Closed record types for the scheduling pipeline. Replaces the dict-as-record
//! pattern from the source system with a typed `PipelineRecord` carrying an
//! explicit `Provenance` sub-structure, so post-stage invariants are checkable
//! at compile time rather than by probing optional dictionary keys.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Packer or feeder machine order type, mirrors the MES `HWS`/`HJB` prefixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderType {
    /// Feeding order (tobacco shred feeder).
    Hws,
    /// Packing order (cigarette packer).
    Hjb,
}

impl OrderType {
    pub fn prefix(&self) -> &'static str {
        match self {
            OrderType::Hws => "HWS",
            OrderType::Hjb => "HJB",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            OrderType::Hws => "公斤",
            OrderType::Hjb => "箱",
        }
    }
}

/// A single row of a decade (10-day) production plan, as delivered by the
/// plan-ingest subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecadePlanRow {
    pub work_order_nr: String,
    pub article_nr: String,
    pub package_type: String,
    pub specification: String,
    pub quantity_total: u32,
    pub final_quantity: u32,
    pub maker_codes: Vec<String>,
    pub feeder_codes: Vec<String>,
    pub planned_start: NaiveDateTime,
    pub planned_end: NaiveDateTime,
    pub production_unit: String,
    pub validation_status: String,
}

impl DecadePlanRow {
    pub fn duration(&self) -> chrono::Duration {
        self.planned_end - self.planned_start
    }
}

/// Process-control flags copied through to the emitted work orders.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessFlags {
    pub is_vaccum: bool,
    pub is_sh93: bool,
    pub is_hdt: bool,
    pub is_flavor: bool,
}

/// Provenance accumulated as a record passes through the pipeline stages.
///
/// Fields are additive: a stage that does not touch a record leaves its
/// provenance untouched; a stage that does touch it sets the relevant fields
/// and, for anything it corrects, preserves the prior value under the
/// matching `original_*` field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub merged_from: Vec<String>,
    pub split_from: Option<String>,
    pub time_corrected: bool,
    pub original_planned_start: Option<NaiveDateTime>,
    pub original_planned_end: Option<NaiveDateTime>,
    pub maintenance_conflict_resolved: bool,
    pub shift_aligned: bool,
    pub correction_failed: bool,
    pub sync_group_id: Option<String>,
    pub parallel_index: Option<usize>,
    pub feeder_fallback: bool,
    pub batch_sequence: Option<u32>,
    pub is_last_one: bool,
}

/// A record as it is carried through the pipeline stages. Append-only between
/// stages: stages return a new `PipelineRecord` with updated fields rather
/// than mutating one in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRecord {
    pub work_order_nr: String,
    pub article_nr: String,
    pub package_type: String,
    pub specification: String,
    pub quantity_total: u32,
    pub final_quantity: u32,
    pub maker_codes: Vec<String>,
    pub feeder_codes: Vec<String>,
    pub planned_start: NaiveDateTime,
    pub planned_end: NaiveDateTime,
    pub production_unit: String,
    pub validation_status: String,
    pub process_flags: ProcessFlags,
    pub provenance: Provenance,
}

impl PipelineRecord {
    pub fn duration(&self) -> chrono::Duration {
        self.planned_end - self.planned_start
    }

    pub fn plan_date(&self) -> NaiveDate {
        self.planned_start.date()
    }

    /// First maker code, the record's "primary machine" per spec.
    pub fn primary_maker(&self) -> Option<&str> {
        self.maker_codes.first().map(String::as_str)
    }
}

impl From<DecadePlanRow> for PipelineRecord {
    fn from(row: DecadePlanRow) -> Self {
        Self {
            work_order_nr: row.work_order_nr,
            article_nr: row.article_nr,
            package_type: row.package_type,
            specification: row.specification,
            quantity_total: row.quantity_total,
            final_quantity: row.final_quantity,
            maker_codes: row.maker_codes,
            feeder_codes: row.feeder_codes,
            planned_start: row.planned_start,
            planned_end: row.planned_end,
            production_unit: row.production_unit,
            validation_status: row.validation_status,
            process_flags: ProcessFlags::default(),
            provenance: Provenance::default(),
        }
    }
}

/// Identity fields shared by both MES wire order variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedingOrder {
    pub plan_id: String,
    pub production_line: String,
    pub material_code: String,
    pub batch_code: String,
    pub quantity: Option<String>,
    pub plan_start_time: NaiveDateTime,
    pub plan_end_time: NaiveDateTime,
    pub sequence: u32,
    pub shift: String,
    pub process_flags: ProcessFlags,
    pub is_outsourcing: bool,
    pub plan_date: NaiveDate,
    pub is_backup: bool,
    pub backup_reason: Option<String>,
    pub order_status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputBatch {
    pub input_plan_id: String,
    pub input_batch_code: String,
    pub input_quantity: u32,
    pub batch_sequence: u32,
    pub is_whole_batch: bool,
    pub is_main_channel: bool,
    pub is_deleted: bool,
    pub is_last_one: bool,
    pub input_material_code: String,
    pub input_bom_revision: String,
    pub tiled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackingOrder {
    pub plan_id: String,
    pub production_line: String,
    pub material_code: String,
    pub batch_code: String,
    pub quantity: u32,
    pub plan_start_time: NaiveDateTime,
    pub plan_end_time: NaiveDateTime,
    pub sequence: u32,
    pub shift: String,
    pub process_flags: ProcessFlags,
    pub is_outsourcing: bool,
    pub plan_date: NaiveDate,
    pub is_backup: bool,
    pub backup_reason: Option<String>,
    pub order_status: String,
    pub input_batch: InputBatch,
}

/// A coordinated pair of orders emitted by WorkOrderGen for one record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkOrderPair {
    pub feeding: FeedingOrder,
    pub packing: PackingOrder,
}
