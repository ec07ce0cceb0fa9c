// Result Aggregator
// All-or-nothing validation of per-file results and grouping by transect

use crate::error::{PipelineError, PipelineResult};
use crate::execution::output::Output;
use crate::raw::RawFileRecord;

use std::collections::HashMap;

/// Validate per-file results and group them by transect.
///
/// Any record flagged as failed fails the whole call with `PartialFailure`
/// naming `process`; nothing is passed through. Groups appear in order of first
/// appearance of their transect and keep input order inside a group.
pub fn process_output_transects(process: &str, records: Vec<RawFileRecord>) -> PipelineResult<Vec<Output>> {
    let failed: Vec<&RawFileRecord> = records.iter().filter(|r| r.error).collect();
    if !failed.is_empty() {
        for record in &failed {
            tracing::error!(
                process,
                file = %record.path,
                reason = record.error_message.as_deref().unwrap_or("unknown"),
                "file failed"
            );
        }
        return Err(PipelineError::PartialFailure {
            process: process.to_string(),
            failed: failed.len(),
            total: records.len(),
        });
    }

    Ok(group_by_transect(records))
}

/// Group records by transect without validation
pub fn group_by_transect(records: Vec<RawFileRecord>) -> Vec<Output> {
    let mut index: HashMap<Option<u32>, usize> = HashMap::new();
    let mut outputs: Vec<Output> = Vec::new();

    for record in records {
        let key = record.transect_num;
        match index.get(&key) {
            Some(&i) => outputs[i].data.push(record),
            None => {
                index.insert(key, outputs.len());
                outputs.push(Output::new(key, vec![record]));
            }
        }
    }

    outputs
}

/// Re-group already aggregated outputs by the same transect key
pub fn regroup(outputs: Vec<Output>) -> Vec<Output> {
    group_by_transect(outputs.into_iter().flat_map(|o| o.data).collect())
}
