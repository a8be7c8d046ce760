//! MES wire-format serialization.
//!
//! The domain types in `model.rs` carry typed fields (`NaiveDateTime`,
//! `bool`, `u32`). The MES dispatcher expects a specific JSON shape with
//! its own field names, timestamp formatting, and the HWS-string /
//! HJB-integer `quantity` typing asymmetry. This module is the one place
//! that asymmetry is allowed to leak through `#[serde(rename = "...")]`
//! wrapper DTOs, kept separate so the domain types stay uniform.

use chrono::NaiveDate;
use serde::Serialize;

use crate::aps::model::{FeedingOrder, PackingOrder};

const MES_TIMESTAMP_FMT: &str = "%Y-%m-%dT%H:%M:%S";
const MES_DATE_FMT: &str = "%Y-%m-%d";

#[derive(Debug, Serialize)]
pub struct InputBatchWire {
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

#[derive(Debug, Serialize)]
pub struct FeedingOrderWire {
    pub plan_id: String,
    pub production_line: String,
    pub material_code: String,
    pub batch_code: String,
    pub quantity: Option<String>,
    pub plan_start_time: String,
    pub plan_end_time: String,
    pub sequence: u32,
    pub shift: String,
    pub is_vaccum: bool,
    pub is_sh93: bool,
    pub is_hdt: bool,
    pub is_flavor: bool,
    pub is_outsourcing: bool,
    pub is_backup: bool,
    pub unit: &'static str,
    pub plan_date: String,
}

#[derive(Debug, Serialize)]
pub struct PackingOrderWire {
    pub plan_id: String,
    pub production_line: String,
    pub material_code: String,
    pub batch_code: String,
    pub quantity: u32,
    pub plan_start_time: String,
    pub plan_end_time: String,
    pub sequence: u32,
    pub shift: String,
    pub is_vaccum: bool,
    pub is_sh93: bool,
    pub is_hdt: bool,
    pub is_flavor: bool,
    pub is_outsourcing: bool,
    pub is_backup: bool,
    pub unit: &'static str,
    pub plan_date: String,
    #[serde(rename = "InputBatch")]
    pub input_batch: InputBatchWire,
}

fn fmt_date(d: NaiveDate) -> String {
    d.format(MES_DATE_FMT).to_string()
}

impl FeedingOrder {
    pub fn to_mes_wire(&self) -> FeedingOrderWire {
        FeedingOrderWire {
            plan_id: self.plan_id.clone(),
            production_line: self.production_line.clone(),
            material_code: self.material_code.clone(),
            batch_code: self.batch_code.clone(),
            quantity: self.quantity.clone(),
            plan_start_time: self.plan_start_time.format(MES_TIMESTAMP_FMT).to_string(),
            plan_end_time: self.plan_end_time.format(MES_TIMESTAMP_FMT).to_string(),
            sequence: self.sequence,
            shift: self.shift.clone(),
            is_vaccum: self.process_flags.is_vaccum,
            is_sh93: self.process_flags.is_sh93,
            is_hdt: self.process_flags.is_hdt,
            is_flavor: self.process_flags.is_flavor,
            is_outsourcing: self.is_outsourcing,
            is_backup: self.is_backup,
            unit: "公斤",
            plan_date: fmt_date(self.plan_date),
        }
    }
}

impl PackingOrder {
    pub fn to_mes_wire(&self) -> PackingOrderWire {
        PackingOrderWire {
            plan_id: self.plan_id.clone(),
            production_line: self.production_line.clone(),
            material_code: self.material_code.clone(),
            batch_code: self.batch_code.clone(),
            quantity: self.quantity,
            plan_start_time: self.plan_start_time.format(MES_TIMESTAMP_FMT).to_string(),
            plan_end_time: self.plan_end_time.format(MES_TIMESTAMP_FMT).to_string(),
            sequence: self.sequence,
            shift: self.shift.clone(),
            is_vaccum: self.process_flags.is_vaccum,
            is_sh93: self.process_flags.is_sh93,
            is_hdt: self.process_flags.is_hdt,
            is_flavor: self.process_flags.is_flavor,
            is_outsourcing: self.is_outsourcing,
            is_backup: self.is_backup,
            unit: "箱",
            plan_date: fmt_date(self.plan_date),
            input_batch: InputBatchWire {
                input_plan_id: self.input_batch.input_plan_id.clone(),
                input_batch_code: self.input_batch.input_batch_code.clone(),
                input_quantity: self.input_batch.input_quantity,
                batch_sequence: self.input_batch.batch_sequence,
                is_whole_batch: self.input_batch.is_whole_batch,
                is_main_channel: self.input_batch.is_main_channel,
                is_deleted: self.input_batch.is_deleted,
                is_last_one: self.input_batch.is_last_one,
                input_material_code: self.input_batch.input_material_code.clone(),
                input_bom_revision: self.input_batch.input_bom_revision.clone(),
                tiled: self.input_batch.tiled,
            },
        }
    }
}
