// Combine Stage
// Merges the converted files of each transect into one product

use crate::convert::{ConvertedDataset, Converter};
use crate::error::{PipelineError, PipelineResult};
use crate::execution::aggregate::process_output_transects;
use crate::execution::output::{Output, OutputKind, StageOutput};
use crate::raw::RawFileRecord;
use crate::stages::paths::{output_file_name, working_dir_for};
use crate::stages::registry::{StageContext, StageFunction};
use crate::storage::{is_file_present, join_path, make_temp_folder, FileSystem};

use std::sync::Arc;

pub const MODULE: &str = "sonarflow.stages.combine";
pub const NAME: &str = "combine";

pub struct Combine;

#[async_trait::async_trait]
impl StageFunction for Combine {
    fn accepts(&self) -> &'static [OutputKind] {
        &[OutputKind::Output, OutputKind::Outputs]
    }

    fn produces(&self) -> OutputKind {
        OutputKind::Outputs
    }

    async fn run(&self, ctx: &StageContext, input: StageOutput) -> PipelineResult<StageOutput> {
        let groups: Vec<Output> = input
            .into_outputs()
            .unwrap_or_default()
            .into_iter()
            .filter(|group| !group.data.is_empty())
            .collect();
        if groups.is_empty() {
            return Err(PipelineError::stage(&ctx.stage.name, "no converted files to combine"));
        }

        let base = output_base(ctx).await?;
        let mut jobs = Vec::with_capacity(groups.len());
        for group in groups {
            let name = output_file_name(&group.data, &ctx.dataset)?;
            jobs.push((join_path(&base, &name), group.data));
        }
        tracing::info!(
            stage = %ctx.stage.name,
            transects = jobs.len(),
            base = %base,
            "combining transects"
        );

        let fs = Arc::clone(&ctx.fs);
        let converter = Arc::clone(&ctx.converter);
        let use_offline = ctx.config.use_offline;
        let results = ctx
            .runner
            .map(jobs, |(path, records)| {
                combine_group(Arc::clone(&fs), Arc::clone(&converter), use_offline, path, records)
            })
            .await?;

        Ok(StageOutput::Outputs(process_output_transects(&ctx.process_name, results)?))
    }
}

/// Combined products go to the stage override, then the dataset output
/// location, then the stage working directory
async fn output_base(ctx: &StageContext) -> PipelineResult<String> {
    match (&ctx.config.out_path, &ctx.dataset.output.urlpath) {
        (None, Some(urlpath)) => make_temp_folder(ctx.fs.as_ref(), urlpath).await,
        _ => working_dir_for(ctx.fs.as_ref(), &ctx.stage, &ctx.config, &ctx.dataset).await,
    }
}

async fn combine_group(
    fs: Arc<dyn FileSystem>,
    converter: Arc<dyn Converter>,
    use_offline: bool,
    path: String,
    records: Vec<RawFileRecord>,
) -> RawFileRecord {
    // Groups are filtered non-empty before jobs are built
    let first = match records.first() {
        Some(first) => first.clone(),
        None => return RawFileRecord::new(path, "").failed("empty transect"),
    };
    let combined = first.derived(path.clone());

    if use_offline && is_file_present(fs.as_ref(), &path).await {
        tracing::debug!(file = %path, "reusing combined file");
        return combined;
    }

    let inputs: Vec<ConvertedDataset> = records
        .iter()
        .map(|record| ConvertedDataset {
            path: record.out_path.clone().unwrap_or_else(|| record.path.clone()),
            sources: vec![record.path.clone()],
        })
        .collect();

    match converter.combine(&inputs, &path).await {
        Ok(dataset) => first.derived(dataset.path),
        Err(e) => combined.failed(e.to_string()),
    }
}
