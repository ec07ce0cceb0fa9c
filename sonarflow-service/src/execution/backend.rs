// Compute Backend Manager
// Chooses how each stage runs and owns the lifetime of the run's cluster

use crate::config::Recipe;
use crate::error::PipelineResult;
use crate::execution::cluster::{Cluster, ClusterProvider, TaskRunner};
use crate::stages::options::{StageRuntimeConfig, TaskRunnerKind};

use std::fmt;
use std::sync::Arc;

/// Who is responsible for closing a cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// Created by this run; closed when the run ends
    Local,
    /// Supplied by the caller through `scheduler_address`; never closed here
    External,
}

impl fmt::Display for Ownership {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ownership::Local => write!(f, "local"),
            Ownership::External => write!(f, "external"),
        }
    }
}

/// A live cluster client tagged with its ownership
#[derive(Debug, Clone)]
pub struct ComputeHandle {
    cluster: Arc<dyn Cluster>,
    ownership: Ownership,
}

impl ComputeHandle {
    pub fn new(cluster: Arc<dyn Cluster>, ownership: Ownership) -> Self {
        Self { cluster, ownership }
    }

    pub fn cluster(&self) -> Arc<dyn Cluster> {
        Arc::clone(&self.cluster)
    }

    pub fn address(&self) -> &str {
        self.cluster.scheduler_address()
    }

    pub fn ownership(&self) -> Ownership {
        self.ownership
    }
}

/// Holds at most one cluster for a run and decides each stage's task runner
pub struct BackendManager {
    provider: Arc<dyn ClusterProvider>,
    handle: Option<ComputeHandle>,
}

impl BackendManager {
    pub fn new(provider: Arc<dyn ClusterProvider>) -> Self {
        Self {
            provider,
            handle: None,
        }
    }

    /// Run with a cluster the caller already connected
    pub fn with_handle(mut self, handle: ComputeHandle) -> Self {
        self.handle = Some(handle);
        self
    }

    pub fn handle(&self) -> Option<&ComputeHandle> {
        self.handle.as_ref()
    }

    /// Pick the task runner for one stage.
    ///
    /// A remote scheduler wins whenever it is configured and local clusters are
    /// off. Otherwise a local cluster is used for stages that name no runner of
    /// their own or ask for `distributed`. Connections and clusters are created
    /// once and reused.
    pub async fn configure(
        &mut self,
        recipe: &Recipe,
        config: &StageRuntimeConfig,
    ) -> PipelineResult<TaskRunner> {
        if let Some(address) = recipe.scheduler_address.as_deref() {
            if !recipe.use_local_dask {
                let handle = match &self.handle {
                    Some(handle) => handle.clone(),
                    None => {
                        let cluster = self.provider.connect(address).await?;
                        self.store(ComputeHandle::new(cluster, Ownership::External))
                    }
                };
                return Ok(TaskRunner::Distributed(handle));
            }
        }

        let wants_cluster = matches!(config.task_runner, None | Some(TaskRunnerKind::Distributed));
        if recipe.use_local_dask && wants_cluster {
            let handle = match &self.handle {
                Some(handle) => handle.clone(),
                None => {
                    let cluster = self.provider.create_local_cluster(recipe.n_workers).await?;
                    self.store(ComputeHandle::new(cluster, Ownership::Local))
                }
            };
            return Ok(TaskRunner::Distributed(handle));
        }

        match (config.task_runner, &self.handle) {
            (Some(TaskRunnerKind::Distributed), Some(handle)) => {
                Ok(TaskRunner::Distributed(handle.clone()))
            }
            (Some(TaskRunnerKind::Distributed), None) => {
                tracing::warn!(
                    recipe = %recipe.name,
                    "distributed task runner requested but no cluster is configured, running sequentially"
                );
                Ok(TaskRunner::Sequential)
            }
            _ => Ok(TaskRunner::Sequential),
        }
    }

    fn store(&mut self, handle: ComputeHandle) -> ComputeHandle {
        tracing::info!(
            address = handle.address(),
            ownership = %handle.ownership(),
            "compute backend ready"
        );
        self.handle = Some(handle.clone());
        handle
    }

    /// Release the run's cluster.
    ///
    /// Only a locally created cluster is closed; its address is returned. An
    /// external connection is dropped without closing the remote cluster.
    pub async fn shutdown(&mut self) -> PipelineResult<Option<String>> {
        match self.handle.take() {
            Some(handle) if handle.ownership() == Ownership::Local => {
                let address = handle.address().to_string();
                handle.cluster().close().await?;
                tracing::info!(address = %address, "closed local cluster");
                Ok(Some(address))
            }
            Some(handle) => {
                tracing::debug!(address = handle.address(), "leaving external cluster running");
                Ok(None)
            }
            None => Ok(None),
        }
    }
}
