// Conversion Module
// Narrow interface to the external raw-to-dataset conversion tooling

pub mod command;

pub use command::{CommandConverter, DEFAULT_CONVERTER_PROGRAM};

use crate::error::PipelineResult;

use serde::Serialize;

/// A structured dataset written by the converter
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConvertedDataset {
    /// Location of the written store
    pub path: String,
    /// Raw or converted inputs it was produced from
    pub sources: Vec<String>,
}

/// Raw file conversion and dataset combination.
///
/// Both calls may be slow and may fail; stages turn `convert` failures into
/// per-record error flags instead of aborting the run.
#[async_trait::async_trait]
pub trait Converter: Send + Sync {
    async fn convert(
        &self,
        local_path: &str,
        sonar_model: &str,
        out_path: &str,
    ) -> PipelineResult<ConvertedDataset>;

    async fn combine(
        &self,
        inputs: &[ConvertedDataset],
        output_path: &str,
    ) -> PipelineResult<ConvertedDataset>;
}
