//! Preprocess: normalize, validate, and drop malformed decade-plan rows.

use tracing::debug;

use crate::aps::errors::{StageError, StageOutput};
use crate::aps::model::{DecadePlanRow, PipelineRecord};

fn split_codes(raw: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    raw.split(|c| c == ',' || c == ';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter(|s| seen.insert(s.to_string()))
        .map(str::to_string)
        .collect()
}

/// Normalizes maker/feeder code lists that may arrive as delimited strings
/// rather than already-split sequences.
pub fn normalize_codes(codes: &[String]) -> Vec<String> {
    if codes.len() == 1 && (codes[0].contains(',') || codes[0].contains(';')) {
        split_codes(&codes[0])
    } else {
        let mut seen = std::collections::HashSet::new();
        codes
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .filter(|s| seen.insert(s.clone()))
            .collect()
    }
}

pub fn process(rows: Vec<DecadePlanRow>) -> StageOutput<PipelineRecord> {
    let input_count = rows.len();
    let mut records = Vec::with_capacity(rows.len());
    let mut errors = Vec::new();

    for row in rows {
        if row.article_nr.trim().is_empty() {
            errors.push(StageError::Validation {
                work_order_nr: row.work_order_nr.clone(),
                reason: "article_nr is empty".into(),
            });
            continue;
        }
        if row.planned_end <= row.planned_start {
            errors.push(StageError::Validation {
                work_order_nr: row.work_order_nr.clone(),
                reason: "planned_end must be after planned_start".into(),
            });
            continue;
        }

        let maker_codes = normalize_codes(&row.maker_codes);
        let feeder_codes = normalize_codes(&row.feeder_codes);
        if maker_codes.is_empty() || feeder_codes.is_empty() {
            errors.push(StageError::Validation {
                work_order_nr: row.work_order_nr.clone(),
                reason: "maker_codes and feeder_codes must both be non-empty".into(),
            });
            continue;
        }

        let record = PipelineRecord::from(DecadePlanRow {
            maker_codes,
            feeder_codes,
            ..row
        });
        records.push(record);
    }

    debug!(valid = records.len(), dropped = errors.len(), "preprocess complete");
    StageOutput::new("preprocess", input_count, records, errors)
}
