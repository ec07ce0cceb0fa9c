// Cluster Backends
// Distributed execution clients and the task runners stages dispatch through

use crate::error::{PipelineError, PipelineResult};
use crate::execution::backend::ComputeHandle;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::{oneshot, Semaphore};

/// Unit of work submitted to a cluster
pub type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// A connected distributed execution client
#[async_trait::async_trait]
pub trait Cluster: Send + Sync + fmt::Debug {
    fn scheduler_address(&self) -> &str;

    fn n_workers(&self) -> usize;

    /// Queue a job; it runs once a worker is free
    fn submit(&self, job: Job) -> PipelineResult<()>;

    async fn close(&self) -> PipelineResult<()>;

    fn is_closed(&self) -> bool;
}

/// Creates and connects clusters for the backend manager
#[async_trait::async_trait]
pub trait ClusterProvider: Send + Sync {
    /// Connect to a caller-supplied scheduler
    async fn connect(&self, address: &str) -> PipelineResult<Arc<dyn Cluster>>;

    /// Start a cluster owned by this run
    async fn create_local_cluster(&self, n_workers: usize) -> PipelineResult<Arc<dyn Cluster>>;
}

/// Cluster whose workers are tasks on the current tokio runtime
#[derive(Debug)]
pub struct TokioCluster {
    address: String,
    n_workers: usize,
    permits: Arc<Semaphore>,
    closed: AtomicBool,
}

impl TokioCluster {
    pub fn new(address: impl Into<String>, n_workers: usize) -> Self {
        let n_workers = n_workers.max(1);
        Self {
            address: address.into(),
            n_workers,
            permits: Arc::new(Semaphore::new(n_workers)),
            closed: AtomicBool::new(false),
        }
    }
}

#[async_trait::async_trait]
impl Cluster for TokioCluster {
    fn scheduler_address(&self) -> &str {
        &self.address
    }

    fn n_workers(&self) -> usize {
        self.n_workers
    }

    fn submit(&self, job: Job) -> PipelineResult<()> {
        if self.is_closed() {
            return Err(PipelineError::Backend(format!(
                "cluster at {} is closed",
                self.address
            )));
        }
        let permits = Arc::clone(&self.permits);
        tokio::spawn(async move {
            if let Ok(_permit) = permits.acquire_owned().await {
                job.await;
            }
        });
        Ok(())
    }

    async fn close(&self) -> PipelineResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(PipelineError::Backend(format!(
                "cluster at {} was already closed",
                self.address
            )));
        }
        self.permits.close();
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Default provider: local clusters run on the tokio runtime, remote
/// schedulers are checked for reachability over TCP before use
#[derive(Debug, Clone)]
pub struct TokioClusterProvider {
    remote_workers: usize,
}

impl TokioClusterProvider {
    pub fn new(remote_workers: usize) -> Self {
        Self { remote_workers }
    }
}

impl Default for TokioClusterProvider {
    fn default() -> Self {
        Self::new(crate::config::models::DEFAULT_LOCAL_WORKERS)
    }
}

/// Strip a `tcp://` style scheme from a scheduler address
fn socket_address(address: &str) -> &str {
    address
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(address)
        .trim_end_matches('/')
}

#[async_trait::async_trait]
impl ClusterProvider for TokioClusterProvider {
    async fn connect(&self, address: &str) -> PipelineResult<Arc<dyn Cluster>> {
        TcpStream::connect(socket_address(address))
            .await
            .map_err(|e| PipelineError::backend_connection(address, e.to_string()))?;
        tracing::info!(address, "connected to scheduler");
        Ok(Arc::new(TokioCluster::new(address, self.remote_workers)))
    }

    async fn create_local_cluster(&self, n_workers: usize) -> PipelineResult<Arc<dyn Cluster>> {
        let address = format!("inproc://local-cluster/{}-workers", n_workers);
        tracing::info!(n_workers, address = %address, "started local cluster");
        Ok(Arc::new(TokioCluster::new(address, n_workers)))
    }
}

/// How a stage executes its per-item work
#[derive(Debug, Clone)]
pub enum TaskRunner {
    /// One item at a time on the orchestrating task
    Sequential,
    /// Fan out through the run's cluster
    Distributed(ComputeHandle),
}

impl TaskRunner {
    pub fn label(&self) -> String {
        match self {
            TaskRunner::Sequential => "sequential".to_string(),
            TaskRunner::Distributed(handle) => format!("distributed ({})", handle.address()),
        }
    }

    pub fn is_distributed(&self) -> bool {
        matches!(self, TaskRunner::Distributed(_))
    }

    /// Apply `task` to every item and return results in item order.
    ///
    /// Returns only after every item finished; the caller never observes partial
    /// results.
    pub async fn map<T, R, F, Fut>(&self, items: Vec<T>, task: F) -> PipelineResult<Vec<R>>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> Fut,
        Fut: Future<Output = R> + Send + 'static,
    {
        match self {
            TaskRunner::Sequential => {
                let mut results = Vec::with_capacity(items.len());
                for item in items {
                    results.push(task(item).await);
                }
                Ok(results)
            }
            TaskRunner::Distributed(handle) => {
                let cluster = handle.cluster();
                let mut pending = Vec::with_capacity(items.len());
                for item in items {
                    let (tx, rx) = oneshot::channel();
                    let fut = task(item);
                    cluster.submit(Box::pin(async move {
                        let _ = tx.send(fut.await);
                    }))?;
                    pending.push(rx);
                }

                let mut results = Vec::with_capacity(pending.len());
                for rx in pending {
                    let result = rx.await.map_err(|_| {
                        PipelineError::Backend(format!(
                            "a job on {} ended without a result",
                            cluster.scheduler_address()
                        ))
                    })?;
                    results.push(result);
                }
                Ok(results)
            }
        }
    }
}
