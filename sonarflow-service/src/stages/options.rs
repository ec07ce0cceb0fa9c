// Stage Runtime Options
// Typed view of the merged recipe and stage option maps

use crate::config::{ParseError, StageOptions};
use crate::error::PipelineResult;

use serde_yaml::Value;
use std::fmt;

/// Execution backend override a stage may request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskRunnerKind {
    Sequential,
    Distributed,
}

impl TaskRunnerKind {
    fn parse(value: &Value) -> PipelineResult<Self> {
        match value.as_str().map(str::to_ascii_lowercase).as_deref() {
            Some("sequential") => Ok(Self::Sequential),
            Some("distributed") | Some("dask") => Ok(Self::Distributed),
            _ => Err(ParseError::invalid_value(format!(
                "task_runner must be 'sequential' or 'distributed', got {}",
                describe(value)
            ))
            .with_suggestion("Use task_runner: sequential or task_runner: distributed")
            .into()),
        }
    }
}

impl fmt::Display for TaskRunnerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskRunnerKind::Sequential => write!(f, "sequential"),
            TaskRunnerKind::Distributed => write!(f, "distributed"),
        }
    }
}

/// Options a stage runs with after recipe defaults and stage overrides are merged
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageRuntimeConfig {
    pub task_runner: Option<TaskRunnerKind>,
    /// Reuse downloaded and converted files left by an earlier run
    pub use_offline: bool,
    pub out_path: Option<String>,
    /// Keys this engine does not interpret, kept as given
    pub extra: StageOptions,
}

impl StageRuntimeConfig {
    /// Merge `overrides` over `defaults` and interpret the known keys
    pub fn merge(defaults: &StageOptions, overrides: &StageOptions) -> PipelineResult<Self> {
        let mut merged = normalize_aliases(defaults.clone());
        merged.extend(normalize_aliases(overrides.clone()));
        Self::from_options(merged)
    }

    pub fn from_options(options: StageOptions) -> PipelineResult<Self> {
        let mut options = normalize_aliases(options);
        let task_runner = match options.remove("task_runner") {
            None | Some(Value::Null) => None,
            Some(value) => Some(TaskRunnerKind::parse(&value)?),
        };

        let use_offline = match options.remove("use_offline") {
            None | Some(Value::Null) => false,
            Some(Value::Bool(flag)) => flag,
            Some(other) => {
                return Err(ParseError::invalid_value(format!(
                    "use_offline must be a boolean, got {}",
                    describe(&other)
                ))
                .into())
            }
        };

        let out_path = match options.remove("out_path") {
            None | Some(Value::Null) => None,
            Some(Value::String(path)) => Some(path),
            Some(other) => {
                return Err(ParseError::invalid_value(format!(
                    "out_path must be a string, got {}",
                    describe(&other)
                ))
                .into())
            }
        };

        Ok(Self {
            task_runner,
            use_offline,
            out_path,
            extra: options,
        })
    }
}

/// Rename `use_raw_offline` to `use_offline` within one option layer.
/// `use_offline` wins when a layer sets both.
fn normalize_aliases(mut options: StageOptions) -> StageOptions {
    if let Some(value) = options.remove("use_raw_offline") {
        options.entry("use_offline".to_string()).or_insert(value);
    }
    options
}

fn describe(value: &Value) -> String {
    serde_yaml::to_string(value)
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|_| format!("{:?}", value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(yaml: &str) -> StageOptions {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_stage_overrides_recipe_defaults() {
        let defaults = options("use_offline: true\nout_path: /defaults\nretries: 2");
        let overrides = options("out_path: /stage\ntask_runner: sequential");

        let config = StageRuntimeConfig::merge(&defaults, &overrides).unwrap();
        assert!(config.use_offline);
        assert_eq!(config.out_path.as_deref(), Some("/stage"));
        assert_eq!(config.task_runner, Some(TaskRunnerKind::Sequential));
        assert_eq!(config.extra.get("retries"), Some(&Value::from(2)));
    }

    #[test]
    fn test_raw_offline_alias() {
        let config = StageRuntimeConfig::merge(&StageOptions::new(), &options("use_raw_offline: true")).unwrap();
        assert!(config.use_offline);
        assert!(config.extra.is_empty());
    }

    #[test]
    fn test_stage_alias_overrides_recipe_default() {
        let config =
            StageRuntimeConfig::merge(&options("use_offline: true"), &options("use_raw_offline: false")).unwrap();
        assert!(!config.use_offline);

        let config =
            StageRuntimeConfig::merge(&options("use_raw_offline: true"), &options("use_offline: false")).unwrap();
        assert!(!config.use_offline);

        let config =
            StageRuntimeConfig::merge(&options("use_raw_offline: false"), &options("use_raw_offline: true")).unwrap();
        assert!(config.use_offline);
        assert!(config.extra.is_empty());
    }

    #[test]
    fn test_empty_options() {
        let config = StageRuntimeConfig::merge(&StageOptions::new(), &StageOptions::new()).unwrap();
        assert_eq!(config, StageRuntimeConfig::default());
    }

    #[test]
    fn test_invalid_task_runner() {
        let err = StageRuntimeConfig::from_options(options("task_runner: threads")).unwrap_err();
        assert!(err.to_string().contains("task_runner"));
    }

    #[test]
    fn test_invalid_offline_flag() {
        assert!(StageRuntimeConfig::from_options(options("use_offline: maybe")).is_err());
    }
}
