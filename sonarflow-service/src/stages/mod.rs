// Stages Module
// Stage functions, their registry and runtime options

pub mod combine;
pub mod open_raw;
pub mod options;
pub mod paths;
pub mod registry;

pub use options::{StageRuntimeConfig, TaskRunnerKind};
pub use paths::{output_file_name, working_dir_for, working_dir_location, DEFAULT_WORKING_DIR};
pub use registry::{check_chain, ResolvedStage, StageContext, StageFunction, StageRegistry};
