// Open Raw Stage
// Downloads raw files into the working directory and converts each one

use crate::convert::Converter;
use crate::error::PipelineResult;
use crate::execution::aggregate::process_output_transects;
use crate::execution::output::{OutputKind, StageOutput};
use crate::raw::RawFileRecord;
use crate::stages::paths::working_dir_for;
use crate::stages::registry::{StageContext, StageFunction};
use crate::storage::{is_file_present, join_path, FileSystem};

use std::sync::Arc;

pub const MODULE: &str = "sonarflow.stages.open_raw";
pub const NAME: &str = "open_raw";

pub struct OpenRaw;

#[async_trait::async_trait]
impl StageFunction for OpenRaw {
    fn accepts(&self) -> &'static [OutputKind] {
        &[OutputKind::Batches, OutputKind::Records, OutputKind::Outputs]
    }

    fn produces(&self) -> OutputKind {
        OutputKind::Outputs
    }

    async fn run(&self, ctx: &StageContext, input: StageOutput) -> PipelineResult<StageOutput> {
        let working_dir = working_dir_for(ctx.fs.as_ref(), &ctx.stage, &ctx.config, &ctx.dataset).await?;
        let records = input.into_records();
        tracing::info!(
            stage = %ctx.stage.name,
            files = records.len(),
            working_dir = %working_dir,
            runner = %ctx.runner.label(),
            "opening raw files"
        );

        let job = FileJob {
            fs: Arc::clone(&ctx.fs),
            converter: Arc::clone(&ctx.converter),
            working_dir: Arc::new(working_dir),
            sonar_model: Arc::new(ctx.dataset.sonar_model.clone()),
            use_offline: ctx.config.use_offline,
        };

        let results = ctx
            .runner
            .map(records, |record| job.clone().process(record))
            .await?;

        Ok(StageOutput::Outputs(process_output_transects(&ctx.process_name, results)?))
    }
}

/// Per-file work, cloned into every submitted job
#[derive(Clone)]
struct FileJob {
    fs: Arc<dyn FileSystem>,
    converter: Arc<dyn Converter>,
    working_dir: Arc<String>,
    sonar_model: Arc<String>,
    use_offline: bool,
}

impl FileJob {
    /// Never fails: problems are recorded on the returned record
    async fn process(self, record: RawFileRecord) -> RawFileRecord {
        let downloaded = match self.download(&record).await {
            Ok(record) => record,
            Err(e) => return record.failed(e.to_string()),
        };
        match self.convert(&downloaded).await {
            Ok(record) => record,
            Err(e) => downloaded.failed(e.to_string()),
        }
    }

    async fn download(&self, record: &RawFileRecord) -> PipelineResult<RawFileRecord> {
        let local_path = join_path(&self.working_dir, record.file_name());
        if self.use_offline && is_file_present(self.fs.as_ref(), &local_path).await {
            tracing::debug!(file = %local_path, "reusing downloaded raw file");
        } else {
            tracing::debug!(file = %record.path, to = %local_path, "downloading raw file");
            let data = self.fs.read(&record.path).await?;
            self.fs.write(&local_path, &data).await?;
        }
        Ok(record.with_local_path(local_path))
    }

    async fn convert(&self, record: &RawFileRecord) -> PipelineResult<RawFileRecord> {
        let local_path = record.local_path.as_deref().unwrap_or(&record.path);
        let out_path = join_path(&self.working_dir, &format!("{}.zarr", record.file_stem()));
        if self.use_offline && is_file_present(self.fs.as_ref(), &out_path).await {
            tracing::debug!(file = %out_path, "reusing converted file");
            return Ok(record.with_out_path(out_path));
        }
        let converted = self.converter.convert(local_path, &self.sonar_model, &out_path).await?;
        Ok(record.with_out_path(converted.path))
    }
}
