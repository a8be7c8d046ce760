//! Split: break rows whose duration exceeds one shift into shift-sized
//! sub-records, pro-rating quantities with remainder absorbed by the last.

use chrono::Duration;
use tracing::debug;

use crate::aps::errors::{StageError, StageOutput};
use crate::aps::model::PipelineRecord;

/// Splits `quantity` into `n` integer shares, the last absorbing the
/// remainder so the sum is preserved exactly.
fn prorate(quantity: u32, n: u32) -> Vec<u32> {
    let base = quantity / n;
    let remainder = quantity % n;
    (0..n)
        .map(|i| if i == n - 1 { base + remainder } else { base })
        .collect()
}

pub fn process(records: Vec<PipelineRecord>, shift_duration: Duration) -> StageOutput<PipelineRecord> {
    let input_count = records.len();
    let mut output = Vec::with_capacity(input_count);

    for record in records {
        let duration = record.duration();
        if duration <= shift_duration || shift_duration <= Duration::zero() {
            output.push(record);
            continue;
        }

        let full_shifts = duration.num_seconds() / shift_duration.num_seconds();
        let remainder_secs = duration.num_seconds() % shift_duration.num_seconds();
        let n = if remainder_secs > 0 {
            full_shifts + 1
        } else {
            full_shifts
        } as u32;

        let quantity_shares = prorate(record.quantity_total, n);
        let final_shares = prorate(record.final_quantity, n);

        let mut start = record.planned_start;
        for i in 0..n {
            let this_duration = if i == n - 1 && remainder_secs > 0 {
                Duration::seconds(remainder_secs)
            } else {
                shift_duration
            };
            let end = start + this_duration;

            let mut sub = record.clone();
            sub.quantity_total = quantity_shares[i as usize];
            sub.final_quantity = final_shares[i as usize];
            sub.planned_start = start;
            sub.planned_end = end;
            sub.provenance.split_from = Some(record.work_order_nr.clone());
            sub.provenance.batch_sequence = Some(i + 1);
            sub.provenance.is_last_one = i == n - 1;
            output.push(sub);

            start = end;
        }
    }

    debug!(input = input_count, output = output.len(), "split complete");
    StageOutput::new("split", input_count, output, Vec::<StageError>::new())
}
