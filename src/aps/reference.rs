//! Reference-data contracts: machine speeds, feeder/packer relations,
//! shift calendars, and maintenance windows. Read-only within a run.
//!
//! One trait for the contract, a simple `HashMap`-backed struct for
//! tests and fixtures.

use std::collections::HashMap;

use anyhow::Result;
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::aps::model::DecadePlanRow;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineSpeed {
    pub machine_code: String,
    pub article_nr: String,
    pub speed: f64,
    pub efficiency_rate: f64,
}

impl MachineSpeed {
    /// Boxes/hour actually achievable once machine efficiency is applied.
    pub fn effective_throughput(&self) -> f64 {
        self.speed * (self.efficiency_rate / 100.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShiftConfig {
    pub shift_name: String,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

impl ShiftConfig {
    /// Duration of this slot. Overnight slots (end <= start) wrap past
    /// midnight, e.g. evening 16:00-00:00.
    pub fn duration(&self) -> chrono::Duration {
        if self.end_time > self.start_time {
            self.end_time - self.start_time
        } else {
            (self.end_time + chrono::Duration::days(1)) - self.start_time
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceWindow {
    pub machine_code: String,
    pub maint_start_time: chrono::NaiveDateTime,
    pub maint_end_time: chrono::NaiveDateTime,
}

impl MaintenanceWindow {
    pub fn overlaps(&self, start: chrono::NaiveDateTime, end: chrono::NaiveDateTime) -> bool {
        start < self.maint_end_time && self.maint_start_time < end
    }
}

/// Read-only reference data a pipeline run pulls once at each stage's
/// entry and holds for the stage's duration.
pub trait ReferenceDataProvider: Send + Sync {
    fn get_decade_plans(&self, import_batch_id: &str) -> Result<Vec<DecadePlanRow>>;
    fn get_machine_speeds(&self) -> Result<Vec<MachineSpeed>>;
    /// feeder_code -> ordered list of reachable packer codes, priority order.
    fn get_machine_relations(&self) -> Result<HashMap<String, Vec<String>>>;
    fn get_shift_config(&self) -> Result<Vec<ShiftConfig>>;
    fn get_maintenance_plans(&self) -> Result<Vec<MaintenanceWindow>>;
}

/// Fixture / test implementation: all tables supplied up front, no I/O.
#[derive(Debug, Clone, Default)]
pub struct InMemoryReferenceData {
    pub decade_plans: HashMap<String, Vec<DecadePlanRow>>,
    pub machine_speeds: Vec<MachineSpeed>,
    pub machine_relations: HashMap<String, Vec<String>>,
    pub shift_config: Vec<ShiftConfig>,
    pub maintenance_plans: Vec<MaintenanceWindow>,
}

impl InMemoryReferenceData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_decade_plans(mut self, batch_id: impl Into<String>, rows: Vec<DecadePlanRow>) -> Self {
        self.decade_plans.insert(batch_id.into(), rows);
        self
    }

    pub fn with_shift_config(mut self, shifts: Vec<ShiftConfig>) -> Self {
        self.shift_config = shifts;
        self
    }

    pub fn with_maintenance_plans(mut self, windows: Vec<MaintenanceWindow>) -> Self {
        self.maintenance_plans = windows;
        self
    }

    pub fn with_machine_relations(mut self, relations: HashMap<String, Vec<String>>) -> Self {
        self.machine_relations = relations;
        self
    }
}

impl ReferenceDataProvider for InMemoryReferenceData {
    fn get_decade_plans(&self, import_batch_id: &str) -> Result<Vec<DecadePlanRow>> {
        Ok(self
            .decade_plans
            .get(import_batch_id)
            .cloned()
            .unwrap_or_default())
    }

    fn get_machine_speeds(&self) -> Result<Vec<MachineSpeed>> {
        Ok(self.machine_speeds.clone())
    }

    fn get_machine_relations(&self) -> Result<HashMap<String, Vec<String>>> {
        Ok(self.machine_relations.clone())
    }

    fn get_shift_config(&self) -> Result<Vec<ShiftConfig>> {
        Ok(self.shift_config.clone())
    }

    fn get_maintenance_plans(&self) -> Result<Vec<MaintenanceWindow>> {
        Ok(self.maintenance_plans.clone())
    }
}
