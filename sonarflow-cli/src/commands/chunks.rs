use crate::output;

use std::path::PathBuf;

use clap::Args;
use color_eyre::Result;

use sonarflow_service::{club_raw_files, ConfigLoader, LocalFileSystem};

/// Show how a dataset's raw files split into weekly batches
#[derive(Args, Debug)]
pub struct ChunksArgs {
    /// Path to the dataset YAML file
    pub dataset: PathBuf,

    /// List every file in each batch
    #[arg(long, short = 'f')]
    pub files: bool,

    /// Print the batches as JSON on stdout
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(args: ChunksArgs) -> Result<()> {
    if !args.dataset.exists() {
        color_eyre::eyre::bail!("Dataset file not found: {}", args.dataset.display());
    }

    let dataset = ConfigLoader::dataset_from_file(&args.dataset)?;
    output::status("Discovering", &dataset.args.urlpath);

    let batches = club_raw_files(&dataset, &LocalFileSystem::new()).await?;
    tracing::debug!(dataset = %dataset.name, batches = batches.len(), "dataset chunked");

    if args.json {
        println!("{}", serde_json::to_string_pretty(&batches)?);
        return Ok(());
    }

    let total: usize = batches.iter().map(|b| b.len()).sum();
    output::header(&format!(
        "Dataset '{}': {} files in {} weekly batches",
        dataset.name,
        total,
        batches.len()
    ));

    for batch in &batches {
        let days = match (batch.first_day(), batch.last_day()) {
            (Some(first), Some(last)) if first == last => format!("day {}", first),
            (Some(first), Some(last)) => format!("days {}-{} ({} distinct)", first, last, batch.days.len()),
            _ => "undated".to_string(),
        };
        output::batch_row(batch.index, &days, batch.len());
        if args.files {
            for record in &batch.records {
                output::dim(&format!("          {}", record.path));
            }
        }
    }

    if batches.is_empty() {
        output::warning("No raw files matched");
    }

    Ok(())
}
