// Configuration Models
// Dataset and recipe definitions consumed read-only by the engine

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Free-form stage execution options (`task_runner`, `use_offline`, `out_path`, ...)
pub type StageOptions = BTreeMap<String, serde_yaml::Value>;

/// Local cluster size used when a recipe does not set `n_workers`
pub const DEFAULT_LOCAL_WORKERS: usize = 3;

/// Where raw files come from and where products go
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub name: String,
    /// Instrument model recorded on every raw file (e.g. `EK60`)
    pub sonar_model: String,
    /// Regex with named groups; `date` and `time` drive temporal classification
    pub raw_regex: String,
    pub args: DatasetArgs,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetArgs {
    /// Raw file location; may contain `{{ name }}` placeholders and `*`/`?` wildcards
    pub urlpath: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, serde_yaml::Value>,
    #[serde(default)]
    pub transect: Option<TransectArgs>,
    /// Pre-built raw file manifest replacing discovery
    #[serde(default)]
    pub raw_json_path: Option<String>,
}

/// Transect listing: a text file of raw file names, numbered by its own file name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransectArgs {
    pub file: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub urlpath: Option<String>,
}

/// Ordered processes plus cluster directives for one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub name: String,
    #[serde(default)]
    pub scheduler_address: Option<String>,
    #[serde(default)]
    pub use_local_dask: bool,
    #[serde(default = "default_local_workers")]
    pub n_workers: usize,
    /// Defaults merged under every stage's own options
    #[serde(default)]
    pub stage_options: StageOptions,
    pub pipeline: Vec<Process>,
}

fn default_local_workers() -> usize {
    DEFAULT_LOCAL_WORKERS
}

impl Recipe {
    /// Total number of stages across all processes
    pub fn stage_count(&self) -> usize {
        self.pipeline.iter().map(|p| p.stages.len()).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Process {
    pub name: String,
    pub stages: Vec<Stage>,
}

/// A named reference to a registered stage function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    pub name: String,
    pub module: String,
    #[serde(default)]
    pub options: StageOptions,
}

impl Stage {
    pub fn new(name: impl Into<String>, module: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            module: module.into(),
            options: StageOptions::new(),
        }
    }

    pub fn with_option(mut self, key: impl Into<String>, value: serde_yaml::Value) -> Self {
        self.options.insert(key.into(), value);
        self
    }
}
