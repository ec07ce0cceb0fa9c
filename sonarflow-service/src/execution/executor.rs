// Pipeline Executor
// Drives processes and stages in order, threading each output into the next stage

use crate::config::{Dataset, Recipe};
use crate::convert::Converter;
use crate::error::PipelineResult;
use crate::execution::backend::BackendManager;
use crate::execution::cluster::ClusterProvider;
use crate::execution::events::{EventSender, ExecutionEvent, ProgressSender};
use crate::execution::output::{OutputKind, StageOutput};
use crate::raw::{club_raw_files, WeeklyBatch};
use crate::stages::options::StageRuntimeConfig;
use crate::stages::registry::{check_chain, ResolvedStage, StageContext, StageRegistry};
use crate::storage::FileSystem;

use std::sync::Arc;
use std::time::{Duration, Instant};

/// What one stage did during a run
#[derive(Debug, Clone)]
pub struct StageReport {
    pub process_name: String,
    pub stage_name: String,
    pub task_runner: String,
    pub summary: String,
    pub duration: Duration,
}

/// Result of a pipeline run
#[derive(Debug, Clone)]
pub struct PipelineRun {
    /// Output of the last stage (the input if the recipe has no stages)
    pub output: StageOutput,
    pub stages: Vec<StageReport>,
    pub duration: Duration,
}

/// Pipeline executor
pub struct PipelineExecutor {
    registry: Arc<StageRegistry>,
    provider: Arc<dyn ClusterProvider>,
    fs: Arc<dyn FileSystem>,
    converter: Arc<dyn Converter>,
    /// Progress event sender
    event_tx: Option<ProgressSender>,
}

impl PipelineExecutor {
    pub fn new(
        registry: Arc<StageRegistry>,
        provider: Arc<dyn ClusterProvider>,
        fs: Arc<dyn FileSystem>,
        converter: Arc<dyn Converter>,
    ) -> Self {
        Self {
            registry,
            provider,
            fs,
            converter,
            event_tx: None,
        }
    }

    /// Set progress event sender
    pub fn with_progress(mut self, tx: ProgressSender) -> Self {
        self.event_tx = Some(tx);
        self
    }

    /// Discover and chunk the dataset's raw files, then run the recipe on all batches
    pub async fn run(&self, recipe: &Recipe, dataset: Arc<Dataset>) -> PipelineResult<PipelineRun> {
        let batches = self.gather(&dataset).await?;
        self.execute(recipe, dataset, StageOutput::Batches(batches)).await
    }

    /// Run the recipe once per weekly batch, sharing one compute backend
    pub async fn run_per_batch(
        &self,
        recipe: &Recipe,
        dataset: Arc<Dataset>,
    ) -> PipelineResult<Vec<PipelineRun>> {
        let batches = self.gather(&dataset).await?;
        let resolved = self.prepare(recipe, OutputKind::Batches)?;

        let mut backend = BackendManager::new(Arc::clone(&self.provider));
        let mut runs = Vec::with_capacity(batches.len());
        let mut failure = None;
        for batch in batches {
            let input = StageOutput::Batches(vec![batch]);
            match self.run_once(recipe, &resolved, &dataset, input, &mut backend).await {
                Ok(run) => runs.push(run),
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        let teardown = self.teardown(&mut backend).await;
        match (failure, teardown) {
            (Some(e), Err(close_err)) => {
                tracing::warn!(error = %close_err, "failed to close local cluster after error");
                Err(e)
            }
            (Some(e), Ok(())) | (None, Err(e)) => Err(e),
            (None, Ok(())) => Ok(runs),
        }
    }

    /// Run every stage of `recipe` on `input`
    pub async fn execute(
        &self,
        recipe: &Recipe,
        dataset: Arc<Dataset>,
        input: StageOutput,
    ) -> PipelineResult<PipelineRun> {
        let resolved = self.prepare(recipe, input.kind())?;
        let mut backend = BackendManager::new(Arc::clone(&self.provider));

        let result = self.run_once(recipe, &resolved, &dataset, input, &mut backend).await;
        let teardown = self.teardown(&mut backend).await;

        match (result, teardown) {
            (Ok(run), Ok(())) => Ok(run),
            (Err(e), Err(close_err)) => {
                tracing::warn!(error = %close_err, "failed to close local cluster after error");
                Err(e)
            }
            (Err(e), Ok(())) | (Ok(_), Err(e)) => Err(e),
        }
    }

    async fn gather(&self, dataset: &Dataset) -> PipelineResult<Vec<WeeklyBatch>> {
        let batches = club_raw_files(dataset, self.fs.as_ref()).await?;
        let files: usize = batches.iter().map(WeeklyBatch::len).sum();
        self.event_tx.send_event(ExecutionEvent::info(
            format!("dataset '{}': {} files in {} weekly batches", dataset.name, files, batches.len()),
            None,
        ));
        if batches.is_empty() {
            self.event_tx.send_event(ExecutionEvent::warning(
                format!("no raw files found for '{}'", dataset.args.urlpath),
                None,
            ));
        }
        Ok(batches)
    }

    /// Resolve all stages before anything runs
    fn prepare(
        &self,
        recipe: &Recipe,
        input: OutputKind,
    ) -> PipelineResult<Vec<ResolvedStage>> {
        let resolved = self.registry.resolve_recipe(recipe)?;
        check_chain(&resolved, input)?;
        Ok(resolved)
    }

    async fn run_once(
        &self,
        recipe: &Recipe,
        resolved: &[ResolvedStage],
        dataset: &Arc<Dataset>,
        input: StageOutput,
        backend: &mut BackendManager,
    ) -> PipelineResult<PipelineRun> {
        let start = Instant::now();
        self.event_tx.send_event(ExecutionEvent::pipeline_started(
            &recipe.name,
            resolved.len(),
            input.summary(),
        ));
        tracing::info!(recipe = %recipe.name, stages = resolved.len(), input = %input.summary(), "pipeline started");

        let result = self.run_stages(recipe, resolved, dataset, input, backend).await;
        let duration = start.elapsed();
        self.event_tx.send_event(ExecutionEvent::pipeline_completed(
            &recipe.name,
            result.is_ok(),
            duration,
        ));

        let (output, stages) = result?;
        tracing::info!(recipe = %recipe.name, ?duration, output = %output.summary(), "pipeline completed");
        Ok(PipelineRun {
            output,
            stages,
            duration,
        })
    }

    async fn run_stages(
        &self,
        recipe: &Recipe,
        resolved: &[ResolvedStage],
        dataset: &Arc<Dataset>,
        input: StageOutput,
        backend: &mut BackendManager,
    ) -> PipelineResult<(StageOutput, Vec<StageReport>)> {
        let mut data = input;
        let mut reports = Vec::with_capacity(resolved.len());

        for entry in resolved {
            let stage_name = entry.stage.name.clone();
            let config = StageRuntimeConfig::merge(&recipe.stage_options, &entry.stage.options)?;

            let had_backend = backend.handle().is_some();
            let runner = backend.configure(recipe, &config).await?;
            if !had_backend {
                if let Some(handle) = backend.handle() {
                    self.event_tx.send_event(ExecutionEvent::BackendReady {
                        address: handle.address().to_string(),
                        ownership: handle.ownership(),
                    });
                }
            }

            entry.check_input(&data)?;

            let task_runner = runner.label();
            self.event_tx.send_event(ExecutionEvent::stage_started(
                &entry.process_name,
                &stage_name,
                &task_runner,
            ));
            tracing::info!(process = %entry.process_name, stage = %stage_name, runner = %task_runner, "executing stage");

            let ctx = StageContext {
                dataset: Arc::clone(dataset),
                process_name: entry.process_name.clone(),
                stage: entry.stage.clone(),
                config,
                runner,
                fs: Arc::clone(&self.fs),
                converter: Arc::clone(&self.converter),
            };

            let start = Instant::now();
            let output = match entry.function.run(&ctx, data).await {
                Ok(output) => output,
                Err(e) => {
                    tracing::error!(process = %entry.process_name, stage = %stage_name, error = %e, "stage failed");
                    self.event_tx.send_event(ExecutionEvent::stage_failed(
                        &entry.process_name,
                        &stage_name,
                        e.to_string(),
                    ));
                    return Err(e);
                }
            };
            let duration = start.elapsed();

            let summary = output.summary();
            self.event_tx.send_event(ExecutionEvent::stage_completed(
                &entry.process_name,
                &stage_name,
                &summary,
                duration,
            ));
            tracing::info!(stage = %stage_name, output = %summary, ?duration, "completed stage");

            reports.push(StageReport {
                process_name: entry.process_name.clone(),
                stage_name,
                task_runner,
                summary,
                duration,
            });
            data = output;
        }

        Ok((data, reports))
    }

    async fn teardown(&self, backend: &mut BackendManager) -> PipelineResult<()> {
        if let Some(address) = backend.shutdown().await? {
            self.event_tx.send_event(ExecutionEvent::BackendClosed { address });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DatasetArgs, OutputConfig, Process, Stage, StageOptions};
    use crate::error::PipelineError;
    use crate::execution::backend::tests::CountingProvider;
    use crate::execution::backend::Ownership;
    use crate::execution::events::progress_channel;
    use crate::raw::RawFileRecord;
    use crate::stages::registry::StageFunction;
    use crate::testing::{MemoryFileSystem, ScriptedConverter};

    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Appends its name to every record's `visited` field
    struct Mark {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl StageFunction for Mark {
        fn accepts(&self) -> &'static [OutputKind] {
            &[OutputKind::Batches, OutputKind::Records]
        }

        fn produces(&self) -> OutputKind {
            OutputKind::Records
        }

        async fn run(&self, ctx: &StageContext, input: StageOutput) -> PipelineResult<StageOutput> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(PipelineError::stage(&ctx.stage.name, "boom"));
            }
            let name = ctx.stage.name.clone();
            let records = ctx
                .runner
                .map(input.into_records(), move |mut record: RawFileRecord| {
                    let name = name.clone();
                    async move {
                        let visited = record
                            .fields
                            .get("visited")
                            .and_then(|v| v.as_str())
                            .map(|v| format!("{},{}", v, name))
                            .unwrap_or(name);
                        record.fields.insert("visited".to_string(), visited.into());
                        record
                    }
                })
                .await?;
            Ok(StageOutput::Records(records))
        }
    }

    fn dataset() -> Arc<Dataset> {
        Arc::new(Dataset {
            name: "test".to_string(),
            sonar_model: "EK60".to_string(),
            raw_regex: String::new(),
            args: DatasetArgs {
                urlpath: "/raw/*.raw".to_string(),
                parameters: BTreeMap::new(),
                transect: None,
                raw_json_path: None,
            },
            output: OutputConfig::default(),
        })
    }

    fn recipe(stages: &[&str], use_local_dask: bool) -> Recipe {
        Recipe {
            name: "weekly".to_string(),
            scheduler_address: None,
            use_local_dask,
            n_workers: 3,
            stage_options: StageOptions::new(),
            pipeline: vec![Process {
                name: "main".to_string(),
                stages: stages.iter().map(|name| Stage::new(*name, "test")).collect(),
            }],
        }
    }

    struct Harness {
        executor: PipelineExecutor,
        provider: Arc<CountingProvider>,
        calls: Arc<AtomicUsize>,
    }

    fn harness(failing: &[&str]) -> Harness {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = StageRegistry::new();
        for name in ["first", "second", "third", "broken"] {
            registry.register(
                "test",
                name,
                Arc::new(Mark {
                    calls: Arc::clone(&calls),
                    fail: failing.contains(&name),
                }),
            );
        }
        let provider = Arc::new(CountingProvider::default());
        let executor = PipelineExecutor::new(
            Arc::new(registry),
            provider.clone(),
            Arc::new(MemoryFileSystem::default()),
            Arc::new(ScriptedConverter::default()),
        );
        Harness {
            executor,
            provider,
            calls,
        }
    }

    fn records() -> StageOutput {
        StageOutput::Records(vec![
            RawFileRecord::new("/raw/a.raw", "EK60"),
            RawFileRecord::new("/raw/b.raw", "EK60"),
        ])
    }

    #[tokio::test]
    async fn test_output_threads_through_stages() {
        let h = harness(&[]);
        let run = h
            .executor
            .execute(&recipe(&["first", "second", "third"], false), dataset(), records())
            .await
            .unwrap();

        let records = run.output.into_records();
        assert_eq!(records[0].fields["visited"], "first,second,third");
        assert_eq!(run.stages.len(), 3);
        assert_eq!(run.stages[2].task_runner, "sequential");
    }

    #[tokio::test]
    async fn test_local_cluster_shared_and_closed_once() {
        let h = harness(&[]);
        let run = h
            .executor
            .execute(&recipe(&["first", "second", "third"], true), dataset(), records())
            .await
            .unwrap();

        assert_eq!(h.provider.creates.load(Ordering::SeqCst), 1);
        assert_eq!(h.provider.closed_count(), 1);
        assert!(run.stages.iter().all(|s| s.task_runner.starts_with("distributed")));
        assert_eq!(run.output.record_count(), 2);
    }

    #[tokio::test]
    async fn test_failure_halts_and_still_closes_local_cluster() {
        let h = harness(&["second"]);
        let err = h
            .executor
            .execute(&recipe(&["first", "second", "third"], true), dataset(), records())
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Stage { .. }));
        assert_eq!(h.calls.load(Ordering::SeqCst), 2);
        assert_eq!(h.provider.closed_count(), 1);
    }

    #[tokio::test]
    async fn test_unknown_stage_fails_before_anything_runs() {
        let h = harness(&[]);
        let err = h
            .executor
            .execute(&recipe(&["first", "missing"], true), dataset(), records())
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::StageNotFound { .. }));
        assert_eq!(h.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.provider.creates.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_recipe_returns_input() {
        let h = harness(&[]);
        let run = h.executor.execute(&recipe(&[], false), dataset(), records()).await.unwrap();
        assert_eq!(run.output, records());
        assert!(run.stages.is_empty());
    }

    #[tokio::test]
    async fn test_progress_events() {
        let (tx, mut rx) = progress_channel();
        let h = harness(&[]);
        let executor = h.executor.with_progress(tx);

        executor
            .execute(&recipe(&["first", "second"], true), dataset(), records())
            .await
            .unwrap();
        drop(executor);

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }

        assert!(matches!(events[0], ExecutionEvent::PipelineStarted { total_stages: 2, .. }));
        assert!(matches!(
            events[1],
            ExecutionEvent::BackendReady { ownership: Ownership::Local, .. }
        ));
        let completed: Vec<&str> = events
            .iter()
            .filter_map(|e| match e {
                ExecutionEvent::StageCompleted { stage_name, .. } => Some(stage_name.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(completed, vec!["first", "second"]);
        assert!(matches!(
            events[events.len() - 2],
            ExecutionEvent::PipelineCompleted { success: true, .. }
        ));
        assert!(matches!(events.last(), Some(ExecutionEvent::BackendClosed { .. })));
    }

    #[tokio::test]
    async fn test_dropped_observer_does_not_affect_run() {
        let (tx, rx) = progress_channel();
        drop(rx);
        let h = harness(&[]);
        let executor = h.executor.with_progress(tx);
        assert!(executor
            .execute(&recipe(&["first"], false), dataset(), records())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_open_raw_then_combine_from_disk() {
        let temp = tempfile::tempdir().unwrap();
        let raw_dir = temp.path().join("raw");
        std::fs::create_dir_all(&raw_dir).unwrap();
        for name in ["D20170115-T030000.raw", "D20170115-T040000.raw", "D20170123-T010000.raw"] {
            std::fs::write(raw_dir.join(name), b"raw").unwrap();
        }

        let dataset = Arc::new(Dataset {
            name: "ooi".to_string(),
            sonar_model: "EK60".to_string(),
            raw_regex: r"D(?P<date>\d{8})-T(?P<time>\d{6})".to_string(),
            args: DatasetArgs {
                urlpath: format!("{}/*.raw", raw_dir.display()),
                parameters: BTreeMap::new(),
                transect: None,
                raw_json_path: None,
            },
            output: OutputConfig {
                urlpath: Some(temp.path().join("out").to_string_lossy().to_string()),
            },
        });
        let recipe = Recipe {
            name: "convert-and-combine".to_string(),
            scheduler_address: None,
            use_local_dask: true,
            n_workers: 2,
            stage_options: StageOptions::new(),
            pipeline: vec![Process {
                name: "echodata".to_string(),
                stages: vec![
                    Stage::new("open_raw", "sonarflow.stages.open_raw"),
                    Stage::new("combine", "sonarflow.stages.combine"),
                ],
            }],
        };

        let converter = Arc::new(ScriptedConverter::default());
        let executor = PipelineExecutor::new(
            Arc::new(StageRegistry::with_builtin_stages()),
            Arc::new(crate::execution::cluster::TokioClusterProvider::default()),
            Arc::new(crate::storage::LocalFileSystem::new()),
            converter.clone(),
        );

        let run = executor.run(&recipe, dataset).await.unwrap();
        let outputs = run.output.into_outputs().unwrap();
        assert_eq!(outputs.len(), 1);
        assert!(outputs[0].data[0].path.ends_with("D20170115-T030000.zarr"));
        assert_eq!(converter.converted().len(), 3);
        assert_eq!(converter.combined()[0].1.len(), 3);
        assert!(temp.path().join("out/open_raw/D20170123-T010000.raw").is_file());
    }
}
