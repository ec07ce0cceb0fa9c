use crate::config::error::{ParseError, ParseResult};
use crate::config::models::{Dataset, Recipe};

use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

/// Loads dataset and recipe YAML documents
pub struct ConfigLoader;

impl ConfigLoader {
    pub fn dataset_from_file<P: AsRef<Path>>(path: P) -> ParseResult<Dataset> {
        Self::from_file(path)
    }

    pub fn recipe_from_file<P: AsRef<Path>>(path: P) -> ParseResult<Recipe> {
        Self::from_file(path)
    }

    pub fn dataset_from_str(content: &str) -> ParseResult<Dataset> {
        Self::from_str(content)
    }

    pub fn recipe_from_str(content: &str) -> ParseResult<Recipe> {
        Self::from_str(content)
    }

    fn from_file<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> ParseResult<T> {
        let path = path.as_ref();
        let content =
            fs::read_to_string(path).map_err(|e| ParseError::io(&path.display().to_string(), &e))?;
        Self::from_str(&content)
    }

    fn from_str<T: DeserializeOwned>(content: &str) -> ParseResult<T> {
        serde_yaml::from_str(content).map_err(|e| ParseError::from_yaml_error(&e, content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::error::ParseErrorKind;
    use crate::config::models::DEFAULT_LOCAL_WORKERS;

    #[test]
    fn test_parse_recipe() {
        let yaml = r#"
name: weekly-sv
use_local_dask: true
stage_options:
  use_offline: true
pipeline:
  - name: convert
    stages:
      - name: open_raw
        module: sonarflow.stages.open_raw
  - name: combine
    stages:
      - name: combine
        module: sonarflow.stages.combine
        options:
          out_path: /tmp/combined
"#;
        let recipe = ConfigLoader::recipe_from_str(yaml).unwrap();
        assert_eq!(recipe.name, "weekly-sv");
        assert!(recipe.use_local_dask);
        assert!(recipe.scheduler_address.is_none());
        assert_eq!(recipe.n_workers, DEFAULT_LOCAL_WORKERS);
        assert_eq!(recipe.pipeline.len(), 2);
        assert_eq!(recipe.stage_count(), 2);
        assert!(recipe.pipeline[1].stages[0].options.contains_key("out_path"));
    }

    #[test]
    fn test_parse_dataset() {
        let yaml = r#"
name: ooi-2017
sonar_model: EK60
raw_regex: "(?P<instrument>EK60)_(?P<date>\\d{4}-\\d{2}-\\d{2})T(?P<time>\\d{2}:\\d{2}:\\d{2})"
args:
  urlpath: "/data/{{ year }}/*.raw"
  parameters:
    year: 2017
  transect:
    file: /data/x0001_files.txt
output:
  urlpath: /data/out
"#;
        let dataset = ConfigLoader::dataset_from_str(yaml).unwrap();
        assert_eq!(dataset.sonar_model, "EK60");
        assert_eq!(dataset.args.parameters.len(), 1);
        assert_eq!(
            dataset.args.transect.as_ref().map(|t| t.file.as_str()),
            Some("/data/x0001_files.txt")
        );
        assert_eq!(dataset.output.urlpath.as_deref(), Some("/data/out"));
    }

    #[test]
    fn test_missing_field_has_location_and_help() {
        let yaml = "name: broken\npipeline:\n  - name: convert\n    stages:\n      - name: open_raw\n";
        let err = ConfigLoader::recipe_from_str(yaml).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::YamlSyntax);
        assert!(err.message.contains("module"));
        assert!(err.suggestion.is_some());
    }

    #[test]
    fn test_missing_file() {
        let err = ConfigLoader::recipe_from_file("/nonexistent/recipe.yaml").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::IoError);
    }
}
