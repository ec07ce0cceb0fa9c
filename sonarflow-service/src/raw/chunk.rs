// Weekly Chunker
// Groups raw files into batches of seven distinct julian days

use crate::error::{PipelineError, PipelineResult};
use crate::raw::record::RawFileRecord;

use serde::Serialize;
use std::collections::BTreeMap;

/// Number of distinct days per batch
pub const WEEK_LENGTH_DAYS: usize = 7;

/// Records whose julian days fall in one window of distinct day values
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklyBatch {
    /// Position in ascending day order
    pub index: usize,
    /// Distinct day values covered, ascending; empty for the undated batch
    pub days: Vec<u32>,
    pub records: Vec<RawFileRecord>,
}

impl WeeklyBatch {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn first_day(&self) -> Option<u32> {
        self.days.first().copied()
    }

    pub fn last_day(&self) -> Option<u32> {
        self.days.last().copied()
    }
}

/// Split records into weekly batches
pub fn chunk_weekly(records: Vec<RawFileRecord>) -> Vec<WeeklyBatch> {
    group_by_day_windows(records, WEEK_LENGTH_DAYS)
}

/// Split records into batches of `days_per_batch` distinct day values.
///
/// Windows follow the rank of the distinct days present, not calendar arithmetic:
/// the i-th batch holds the i-th through (i + n - 1)-th distinct day however far
/// apart they are. Records without a julian day end up in one trailing batch.
pub fn chunk_by_distinct_days(
    records: Vec<RawFileRecord>,
    days_per_batch: usize,
) -> PipelineResult<Vec<WeeklyBatch>> {
    if days_per_batch == 0 {
        return Err(PipelineError::stage(
            "chunk",
            "batches must cover at least one day",
        ));
    }
    Ok(group_by_day_windows(records, days_per_batch))
}

fn group_by_day_windows(records: Vec<RawFileRecord>, days_per_batch: usize) -> Vec<WeeklyBatch> {
    let mut by_day: BTreeMap<u32, Vec<RawFileRecord>> = BTreeMap::new();
    let mut undated = Vec::new();

    for record in records {
        match record.jday {
            Some(day) => by_day.entry(day).or_default().push(record),
            None => undated.push(record),
        }
    }

    let days: Vec<u32> = by_day.keys().copied().collect();
    let mut batches: Vec<WeeklyBatch> = days
        .chunks(days_per_batch)
        .enumerate()
        .map(|(index, window)| WeeklyBatch {
            index,
            days: window.to_vec(),
            records: window
                .iter()
                .flat_map(|day| by_day.remove(day).unwrap_or_default())
                .collect(),
        })
        .collect();

    if !undated.is_empty() {
        tracing::warn!(
            count = undated.len(),
            "raw files without a julian day collected into a trailing batch"
        );
        batches.push(WeeklyBatch {
            index: batches.len(),
            days: Vec::new(),
            records: undated,
        });
    }

    batches
}
