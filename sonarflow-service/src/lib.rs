// Sonarflow Service Library
// Orchestration engine for staged processing of echosounder raw file batches

pub mod config;
pub mod convert;
pub mod error;
pub mod execution;
pub mod raw;
pub mod stages;
pub mod storage;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use error::{PipelineError, PipelineResult};

// Re-export configuration types
pub use config::{ConfigLoader, Dataset, ParseError, ParseErrorKind, Process, Recipe, Stage};

// Re-export raw file handling
pub use raw::{
    chunk_weekly, club_raw_files, parse_file_path, FilePattern, RawFileRecord, WeeklyBatch,
};

// Re-export execution types
pub use execution::{
    progress_channel, BackendManager, ComputeHandle, ExecutionEvent, Output, OutputKind,
    Ownership, PipelineExecutor, PipelineRun, ProgressReceiver, ProgressSender, StageOutput,
    StageReport, TaskRunner, TokioClusterProvider,
};

// Re-export stage and collaborator types
pub use convert::{CommandConverter, ConvertedDataset, Converter};
pub use stages::{StageContext, StageFunction, StageRegistry, StageRuntimeConfig};
pub use storage::{FileSystem, LocalFileSystem};
