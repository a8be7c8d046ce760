//! ParallelSplit: fan multi-machine records out into one sub-record per
//! machine, bound together by a shared sync group with identical windows.

use std::collections::HashMap;

use rayon::prelude::*;
use tracing::debug;
use uuid::Uuid;

use crate::aps::errors::{StageError, StageOutput};
use crate::aps::model::PipelineRecord;

fn prorate(quantity: u32, n: u32) -> Vec<u32> {
    let base = quantity / n;
    let remainder = quantity % n;
    (0..n)
        .map(|i| if i == n - 1 { base + remainder } else { base })
        .collect()
}

/// Chooses a feeder for packer `m` via the feeder->packer relation table,
/// preferring the first feeder whose relation lists `m`. Falls back to the
/// parent's first feeder, flagging `feeder_fallback`, when none match.
fn choose_feeder<'a>(
    m: &str,
    relations: &'a HashMap<String, Vec<String>>,
    parent_feeders: &'a [String],
) -> (String, bool) {
    let mut candidates: Vec<&String> = relations
        .iter()
        .filter(|(_, packers)| packers.iter().any(|p| p == m))
        .map(|(feeder, _)| feeder)
        .collect();
    candidates.sort();
    match candidates.first() {
        Some(feeder) => ((*feeder).clone(), false),
        None => (
            parent_feeders
                .first()
                .cloned()
                .unwrap_or_default(),
            true,
        ),
    }
}

/// Fans out one record into its per-machine sub-records. Pure function of
/// a single record plus the shared relation table, so it is safe to run
/// across worker threads with no coordination beyond the final merge.
fn fan_out_one(record: PipelineRecord, relations: &HashMap<String, Vec<String>>) -> Vec<PipelineRecord> {
    if record.maker_codes.len() <= 1 {
        return vec![record];
    }

    let sync_group_id = Uuid::new_v4().to_string();
    let n = record.maker_codes.len() as u32;
    let quantity_shares = prorate(record.quantity_total, n);
    let final_shares = prorate(record.final_quantity, n);

    record
        .maker_codes
        .iter()
        .enumerate()
        .map(|(i, m)| {
            let (feeder, fallback) = choose_feeder(m, relations, &record.feeder_codes);
            let mut sub = record.clone();
            sub.maker_codes = vec![m.clone()];
            sub.feeder_codes = vec![feeder];
            sub.quantity_total = quantity_shares[i];
            sub.final_quantity = final_shares[i];
            sub.provenance.sync_group_id = Some(sync_group_id.clone());
            sub.provenance.parallel_index = Some(i);
            sub.provenance.feeder_fallback = fallback;
            sub
        })
        .collect()
}

/// Partitions the record set by `article_nr` (machine is already
/// exclusive per record at this stage) and fans each partition out on a
/// rayon worker. Partitions
/// are independent: no sync_group_id or feeder choice depends on another
/// record, so per-partition order doesn't matter as long as the final
/// merge restores input order.
pub fn process(
    records: Vec<PipelineRecord>,
    relations: &HashMap<String, Vec<String>>,
) -> StageOutput<PipelineRecord> {
    let input_count = records.len();

    let mut by_article: HashMap<String, Vec<(usize, PipelineRecord)>> = HashMap::new();
    for (idx, record) in records.into_iter().enumerate() {
        by_article.entry(record.article_nr.clone()).or_default().push((idx, record));
    }

    let mut partitions: Vec<(String, Vec<(usize, PipelineRecord)>)> = by_article.into_iter().collect();

    let mut expanded: Vec<(usize, Vec<PipelineRecord>)> = partitions
        .par_iter_mut()
        .flat_map(|(_, bucket)| {
            std::mem::take(bucket)
                .into_par_iter()
                .map(|(idx, record)| (idx, fan_out_one(record, relations)))
                .collect::<Vec<_>>()
        })
        .collect();

    expanded.sort_by_key(|(idx, _)| *idx);
    let output: Vec<PipelineRecord> = expanded.into_iter().flat_map(|(_, subs)| subs).collect();

    debug!(input = input_count, output = output.len(), "parallel_split complete");
    StageOutput::new("parallel_split", input_count, output, Vec::<StageError>::new())
}
