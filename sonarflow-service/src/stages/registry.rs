// Stage Registry
// Maps (module, name) references in recipes to stage functions

use crate::config::{Dataset, Recipe, Stage};
use crate::convert::Converter;
use crate::error::{PipelineError, PipelineResult};
use crate::execution::cluster::TaskRunner;
use crate::execution::output::{OutputKind, StageOutput};
use crate::stages::options::StageRuntimeConfig;
use crate::stages::{combine, open_raw};
use crate::storage::FileSystem;

use std::collections::HashMap;
use std::sync::Arc;

/// Everything a stage function gets besides its input
pub struct StageContext {
    pub dataset: Arc<Dataset>,
    pub process_name: String,
    pub stage: Stage,
    pub config: StageRuntimeConfig,
    pub runner: TaskRunner,
    pub fs: Arc<dyn FileSystem>,
    pub converter: Arc<dyn Converter>,
}

/// A processing step a recipe can reference
#[async_trait::async_trait]
pub trait StageFunction: Send + Sync {
    /// Input shapes this stage can consume
    fn accepts(&self) -> &'static [OutputKind];

    /// Shape of the value it returns
    fn produces(&self) -> OutputKind;

    async fn run(&self, ctx: &StageContext, input: StageOutput) -> PipelineResult<StageOutput>;
}

/// A recipe stage bound to its function
#[derive(Clone)]
pub struct ResolvedStage {
    pub process_name: String,
    pub stage: Stage,
    pub function: Arc<dyn StageFunction>,
}

/// Registry of stage functions, filled at startup
#[derive(Default, Clone)]
pub struct StageRegistry {
    functions: HashMap<(String, String), Arc<dyn StageFunction>>,
}

impl StageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with `open_raw` and `combine` available
    pub fn with_builtin_stages() -> Self {
        let mut registry = Self::new();
        registry.register(open_raw::MODULE, open_raw::NAME, Arc::new(open_raw::OpenRaw));
        registry.register(combine::MODULE, combine::NAME, Arc::new(combine::Combine));
        registry
    }

    /// Add or replace a stage function
    pub fn register(
        &mut self,
        module: impl Into<String>,
        name: impl Into<String>,
        function: Arc<dyn StageFunction>,
    ) {
        self.functions.insert((module.into(), name.into()), function);
    }

    pub fn contains(&self, module: &str, name: &str) -> bool {
        self.functions
            .contains_key(&(module.to_string(), name.to_string()))
    }

    /// Registered references as `module.name`, sorted
    pub fn references(&self) -> Vec<String> {
        let mut refs: Vec<String> = self
            .functions
            .keys()
            .map(|(module, name)| format!("{}.{}", module, name))
            .collect();
        refs.sort();
        refs
    }

    pub fn resolve(&self, stage: &Stage) -> PipelineResult<Arc<dyn StageFunction>> {
        self.functions
            .get(&(stage.module.clone(), stage.name.clone()))
            .cloned()
            .ok_or_else(|| PipelineError::StageNotFound {
                module: stage.module.clone(),
                name: stage.name.clone(),
            })
    }

    /// Resolve every stage of a recipe in execution order, failing on the first
    /// unknown reference
    pub fn resolve_recipe(&self, recipe: &Recipe) -> PipelineResult<Vec<ResolvedStage>> {
        let mut resolved = Vec::with_capacity(recipe.stage_count());
        for process in &recipe.pipeline {
            for stage in &process.stages {
                resolved.push(ResolvedStage {
                    process_name: process.name.clone(),
                    stage: stage.clone(),
                    function: self.resolve(stage)?,
                });
            }
        }
        Ok(resolved)
    }
}

impl ResolvedStage {
    /// Reject an input shape the stage does not declare
    pub fn check_input(&self, input: &StageOutput) -> PipelineResult<()> {
        let accepted = self.function.accepts();
        if accepted.contains(&input.kind()) {
            return Ok(());
        }
        Err(PipelineError::StageInput {
            stage: self.stage.name.clone(),
            expected: join_kinds(accepted),
            found: input.kind().to_string(),
        })
    }
}

/// Check that every stage accepts what the one before it produces, starting from
/// the pipeline input shape
pub fn check_chain(stages: &[ResolvedStage], input: OutputKind) -> PipelineResult<()> {
    let mut current = input;
    for resolved in stages {
        let accepted = resolved.function.accepts();
        if !accepted.contains(&current) {
            return Err(PipelineError::StageInput {
                stage: resolved.stage.name.clone(),
                expected: join_kinds(accepted),
                found: current.to_string(),
            });
        }
        current = resolved.function.produces();
    }
    Ok(())
}

fn join_kinds(kinds: &[OutputKind]) -> String {
    kinds
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" or ")
}
