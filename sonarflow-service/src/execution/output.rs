// Stage Outputs
// The value threaded from one stage into the next

use crate::raw::{RawFileRecord, WeeklyBatch};

use serde::Serialize;
use std::fmt;

/// Records of one transect, as produced by aggregation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Output {
    pub transect: Option<u32>,
    pub data: Vec<RawFileRecord>,
}

impl Output {
    pub fn new(transect: Option<u32>, data: Vec<RawFileRecord>) -> Self {
        Self { transect, data }
    }
}

/// Value passed between stages
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum StageOutput {
    /// Weekly batches of raw files (pipeline input)
    Batches(Vec<WeeklyBatch>),
    /// Flat list of raw file records
    Records(Vec<RawFileRecord>),
    /// A single aggregated output
    Output(Output),
    /// One aggregated output per transect
    Outputs(Vec<Output>),
}

/// Shape of a [`StageOutput`], used by stages to declare what they consume and produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputKind {
    Batches,
    Records,
    Output,
    Outputs,
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputKind::Batches => "batches",
            OutputKind::Records => "records",
            OutputKind::Output => "output",
            OutputKind::Outputs => "outputs",
        };
        write!(f, "{}", name)
    }
}

impl StageOutput {
    pub fn kind(&self) -> OutputKind {
        match self {
            StageOutput::Batches(_) => OutputKind::Batches,
            StageOutput::Records(_) => OutputKind::Records,
            StageOutput::Output(_) => OutputKind::Output,
            StageOutput::Outputs(_) => OutputKind::Outputs,
        }
    }

    /// Total number of file records carried
    pub fn record_count(&self) -> usize {
        match self {
            StageOutput::Batches(batches) => batches.iter().map(WeeklyBatch::len).sum(),
            StageOutput::Records(records) => records.len(),
            StageOutput::Output(output) => output.data.len(),
            StageOutput::Outputs(outputs) => outputs.iter().map(|o| o.data.len()).sum(),
        }
    }

    /// Flatten every shape into its records, keeping batch and group order
    pub fn into_records(self) -> Vec<RawFileRecord> {
        match self {
            StageOutput::Batches(batches) => batches.into_iter().flat_map(|b| b.records).collect(),
            StageOutput::Records(records) => records,
            StageOutput::Output(output) => output.data,
            StageOutput::Outputs(outputs) => outputs.into_iter().flat_map(|o| o.data).collect(),
        }
    }

    /// View aggregated shapes as a list of outputs
    pub fn into_outputs(self) -> Option<Vec<Output>> {
        match self {
            StageOutput::Output(output) => Some(vec![output]),
            StageOutput::Outputs(outputs) => Some(outputs),
            _ => None,
        }
    }

    /// Short human-readable description for progress reporting
    pub fn summary(&self) -> String {
        match self {
            StageOutput::Batches(batches) => {
                format!("{} weekly batches, {} files", batches.len(), self.record_count())
            }
            StageOutput::Records(records) => format!("{} files", records.len()),
            StageOutput::Output(output) => match output.transect {
                Some(t) => format!("transect {}: {} files", t, output.data.len()),
                None => format!("1 output, {} files", output.data.len()),
            },
            StageOutput::Outputs(outputs) => {
                format!("{} transect outputs, {} files", outputs.len(), self.record_count())
            }
        }
    }
}
