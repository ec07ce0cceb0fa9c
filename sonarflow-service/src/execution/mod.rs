// Execution Module
// Orchestration loop, compute backends, result aggregation and progress events

pub mod aggregate;
pub mod backend;
pub mod cluster;
pub mod events;
pub mod executor;
pub mod output;

pub use aggregate::{group_by_transect, process_output_transects, regroup};
pub use backend::{BackendManager, ComputeHandle, Ownership};
pub use cluster::{Cluster, ClusterProvider, Job, TaskRunner, TokioCluster, TokioClusterProvider};
pub use events::{progress_channel, EventSender, ExecutionEvent, LogLevel, ProgressReceiver, ProgressSender};
pub use executor::{PipelineExecutor, PipelineRun, StageReport};
pub use output::{Output, OutputKind, StageOutput};
