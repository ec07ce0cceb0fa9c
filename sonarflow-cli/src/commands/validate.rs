use crate::output;

use std::path::PathBuf;

use clap::Args;
use color_eyre::Result;

use sonarflow_service::raw::render_urlpath;
use sonarflow_service::stages::check_chain;
use sonarflow_service::{ConfigLoader, FilePattern, OutputKind, ParseError, StageRegistry};

/// Validate a recipe, and optionally the dataset it will run on
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Path to the recipe YAML file
    pub recipe: PathBuf,

    /// Path to a dataset YAML file to check as well
    #[arg(long, value_name = "FILE")]
    pub dataset: Option<PathBuf>,
}

fn report_parse_error(e: &ParseError) -> ! {
    output::error(&format!("Parse error: {}", e.message));
    if !e.context.is_empty() {
        output::dim(&e.context);
    }
    if let Some(suggestion) = &e.suggestion {
        output::info(&format!("  Suggestion: {}", suggestion));
    }
    std::process::exit(1);
}

pub fn execute(args: ValidateArgs) -> Result<()> {
    if !args.recipe.exists() {
        color_eyre::eyre::bail!("Recipe file not found: {}", args.recipe.display());
    }

    // Step 1: Parse the recipe
    output::status("Validating", &format!("{}", args.recipe.display()));
    let recipe = match ConfigLoader::recipe_from_file(&args.recipe) {
        Ok(recipe) => recipe,
        Err(e) => report_parse_error(&e),
    };
    output::check(&format!(
        "Structure: {} processes, {} stages",
        recipe.pipeline.len(),
        recipe.stage_count()
    ));

    // Step 2: Every stage must be registered and fit the one before it
    let registry = StageRegistry::with_builtin_stages();
    let resolved = match registry.resolve_recipe(&recipe) {
        Ok(resolved) => resolved,
        Err(e) => {
            output::error(&e.to_string());
            output::info(&format!("  Available stages: {}", registry.references().join(", ")));
            std::process::exit(1);
        }
    };
    if let Err(e) = check_chain(&resolved, OutputKind::Batches) {
        output::error(&e.to_string());
        std::process::exit(1);
    }
    output::check("All stages resolved");

    match (&recipe.scheduler_address, recipe.use_local_dask) {
        (Some(address), false) => output::check(&format!("Backend: remote scheduler at {}", address)),
        (_, true) => output::check(&format!("Backend: local cluster with {} workers", recipe.n_workers)),
        (None, false) => output::check("Backend: sequential"),
    }

    // Step 3: Dataset (optional)
    if let Some(dataset_path) = &args.dataset {
        output::status("Validating", &format!("{}", dataset_path.display()));
        let dataset = match ConfigLoader::dataset_from_file(dataset_path) {
            Ok(dataset) => dataset,
            Err(e) => report_parse_error(&e),
        };

        if let Err(e) = FilePattern::new(&dataset.raw_regex) {
            output::error(&e.to_string());
            std::process::exit(1);
        }
        output::check("raw_regex compiles");

        match render_urlpath(&dataset.args.urlpath, &dataset.args.parameters) {
            Ok(urlpath) => output::check(&format!("Raw files: {}", urlpath)),
            Err(e) => {
                output::error(&e.to_string());
                std::process::exit(1);
            }
        }
    }

    println!();
    output::success("Recipe is valid");

    Ok(())
}
