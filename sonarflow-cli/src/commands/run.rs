use crate::output;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use color_eyre::Result;

use sonarflow_service::convert::DEFAULT_CONVERTER_PROGRAM;
use sonarflow_service::execution::events::LogLevel;
use sonarflow_service::{
    progress_channel, CommandConverter, ConfigLoader, ExecutionEvent, LocalFileSystem,
    PipelineExecutor, StageRegistry, TokioClusterProvider,
};

/// Run a recipe against a dataset
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to the recipe YAML file
    pub recipe: PathBuf,

    /// Path to the dataset YAML file
    pub dataset: PathBuf,

    /// Conversion program (looked up on PATH)
    #[arg(long, value_name = "PROGRAM", default_value = DEFAULT_CONVERTER_PROGRAM)]
    pub converter: String,

    /// Argument passed to the converter before its subcommand (can be repeated)
    #[arg(long = "converter-arg", value_name = "ARG")]
    pub converter_args: Vec<String>,

    /// Run the recipe once per weekly batch instead of once for all files
    #[arg(long)]
    pub per_batch: bool,

    /// Workers per connected remote scheduler
    #[arg(long, value_name = "N", default_value_t = 3)]
    pub remote_workers: usize,

    /// Print the final stage output as JSON on stdout
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(args: RunArgs) -> Result<()> {
    for path in [&args.recipe, &args.dataset] {
        if !path.exists() {
            color_eyre::eyre::bail!("File not found: {}", path.display());
        }
    }

    output::status("Loading", &format!("{}", args.recipe.display()));
    let recipe = ConfigLoader::recipe_from_file(&args.recipe)?;
    let dataset = Arc::new(ConfigLoader::dataset_from_file(&args.dataset)?);
    output::info(&format!(
        "Recipe '{}': {} processes, {} stages; dataset '{}' ({})",
        recipe.name,
        recipe.pipeline.len(),
        recipe.stage_count(),
        dataset.name,
        dataset.sonar_model
    ));

    let converter = CommandConverter::locate(&args.converter)?.with_args(args.converter_args.clone());

    let (tx, mut rx) = progress_channel();
    let executor = PipelineExecutor::new(
        Arc::new(StageRegistry::with_builtin_stages()),
        Arc::new(TokioClusterProvider::new(args.remote_workers)),
        Arc::new(LocalFileSystem::new()),
        Arc::new(converter),
    )
    .with_progress(tx);

    let per_batch = args.per_batch;
    tracing::debug!(
        recipe = %args.recipe.display(),
        dataset = %args.dataset.display(),
        per_batch,
        converter = %args.converter,
        "starting run"
    );
    let exec_handle = tokio::spawn(async move {
        if per_batch {
            executor.run_per_batch(&recipe, dataset).await
        } else {
            executor.run(&recipe, dataset).await.map(|run| vec![run])
        }
    });

    while let Some(event) = rx.recv().await {
        match &event {
            ExecutionEvent::PipelineStarted {
                pipeline_name,
                total_stages,
                input_summary,
            } => {
                println!();
                output::header(&format!(
                    "Recipe '{}' ({} stages) on {}",
                    pipeline_name, total_stages, input_summary
                ));
            }

            ExecutionEvent::PipelineCompleted {
                success, duration, ..
            } => {
                if *success {
                    output::success(&format!(
                        "Recipe completed successfully in {:.2}s",
                        duration.as_secs_f64()
                    ));
                } else {
                    output::failure(&format!("Recipe failed after {:.2}s", duration.as_secs_f64()));
                }
            }

            ExecutionEvent::BackendReady { address, ownership } => {
                output::backend(&ownership.to_string(), address);
            }

            ExecutionEvent::BackendClosed { address } => {
                output::dim(&format!("  Closed local cluster {}", address));
            }

            ExecutionEvent::StageStarted {
                process_name,
                stage_name,
                task_runner,
            } => {
                output::stage_header(process_name, stage_name, task_runner);
            }

            ExecutionEvent::StageCompleted {
                stage_name,
                summary,
                duration,
                ..
            } => {
                output::dim_success(&format!(
                    "  Stage '{}' OK: {} ({:.2}s)",
                    stage_name,
                    summary,
                    duration.as_secs_f64()
                ));
            }

            ExecutionEvent::StageFailed {
                stage_name, message, ..
            } => {
                output::failure(&format!("Stage '{}' failed: {}", stage_name, message));
            }

            ExecutionEvent::Log { level, message, .. } => match level {
                LogLevel::Error => output::error(message),
                LogLevel::Warning => output::warning(message),
                LogLevel::Info => output::info(message),
                LogLevel::Debug => output::dim(message),
            },
        }
    }

    let runs = match exec_handle.await? {
        Ok(runs) => runs,
        Err(e) => {
            tracing::debug!(error = ?e, "run failed");
            println!();
            output::error(&e.to_string());
            if e.is_resumable() {
                output::info("Rerun with use_offline: true to skip files that already finished");
            }
            std::process::exit(1);
        }
    };

    if args.json {
        let outputs: Vec<_> = runs.iter().map(|run| &run.output).collect();
        println!("{}", serde_json::to_string_pretty(&outputs)?);
    }

    Ok(())
}
