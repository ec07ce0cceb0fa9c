// Stage Paths
// Working directory and product file naming shared by the built-in stages

use crate::config::{Dataset, Stage};
use crate::error::{PipelineError, PipelineResult};
use crate::raw::RawFileRecord;
use crate::stages::options::StageRuntimeConfig;
use crate::storage::{join_path, make_temp_folder, FileSystem};

/// Base directory used when neither the stage nor the dataset names an output location
pub const DEFAULT_WORKING_DIR: &str = "sonarflow_working_dir";

/// Where a stage writes, before it is created
pub fn working_dir_location(stage: &Stage, config: &StageRuntimeConfig, dataset: &Dataset) -> String {
    if let Some(out_path) = &config.out_path {
        return out_path.clone();
    }
    match &dataset.output.urlpath {
        Some(urlpath) => join_path(urlpath, &stage.name),
        None => join_path(DEFAULT_WORKING_DIR, &stage.name),
    }
}

/// Create the stage's working directory and return its resolved location
pub async fn working_dir_for(
    fs: &dyn FileSystem,
    stage: &Stage,
    config: &StageRuntimeConfig,
    dataset: &Dataset,
) -> PipelineResult<String> {
    make_temp_folder(fs, &working_dir_location(stage, config, dataset)).await
}

/// File name of a combined product, taken from the first record of a group:
/// `x0007-D20170115-T030000.zarr` with a transect listing, `D20170115-T030000.zarr`
/// without
pub fn output_file_name(records: &[RawFileRecord], dataset: &Dataset) -> PipelineResult<String> {
    let first = records
        .first()
        .ok_or_else(|| PipelineError::stage("combine", "there must be at least one raw file record"))?;
    let datetime = first.datetime.ok_or_else(|| {
        PipelineError::stage(
            "combine",
            format!("'{}' has no timestamp to name its output after", first.path),
        )
    })?;
    let date_name = datetime.format("D%Y%m%d-T%H%M%S").to_string();

    if dataset.args.transect.is_none() {
        return Ok(format!("{}.zarr", date_name));
    }
    let transect = first.transect_num.ok_or_else(|| {
        PipelineError::stage("combine", format!("'{}' has no transect number", first.path))
    })?;
    Ok(format!("x{:04}-{}.zarr", transect, date_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DatasetArgs, OutputConfig, TransectArgs};

    use chrono::NaiveDate;
    use std::collections::BTreeMap;

    fn dataset(output: Option<&str>, transect: bool) -> Dataset {
        Dataset {
            name: "test".to_string(),
            sonar_model: "EK60".to_string(),
            raw_regex: String::new(),
            args: DatasetArgs {
                urlpath: "/raw/*.raw".to_string(),
                parameters: BTreeMap::new(),
                transect: transect.then(|| TransectArgs {
                    file: "/listings/x0007_file.txt".to_string(),
                }),
                raw_json_path: None,
            },
            output: OutputConfig {
                urlpath: output.map(String::from),
            },
        }
    }

    fn stamped() -> RawFileRecord {
        let mut record = RawFileRecord::new("/raw/a.raw", "EK60").with_transect(7);
        record.datetime = NaiveDate::from_ymd_opt(2017, 1, 15).and_then(|d| d.and_hms_opt(3, 0, 0));
        record
    }

    #[test]
    fn test_working_dir_precedence() {
        let stage = Stage::new("open_raw", "sonarflow.stages.open_raw");
        let mut config = StageRuntimeConfig::default();

        assert_eq!(
            working_dir_location(&stage, &config, &dataset(None, false)),
            "sonarflow_working_dir/open_raw"
        );
        assert_eq!(
            working_dir_location(&stage, &config, &dataset(Some("s3://bucket/out"), false)),
            "s3://bucket/out/open_raw"
        );

        config.out_path = Some("/scratch/raw".to_string());
        assert_eq!(
            working_dir_location(&stage, &config, &dataset(Some("s3://bucket/out"), false)),
            "/scratch/raw"
        );
    }

    #[test]
    fn test_output_file_name() {
        let records = vec![stamped()];
        assert_eq!(
            output_file_name(&records, &dataset(None, true)).unwrap(),
            "x0007-D20170115-T030000.zarr"
        );
        assert_eq!(
            output_file_name(&records, &dataset(None, false)).unwrap(),
            "D20170115-T030000.zarr"
        );
    }

    #[test]
    fn test_output_file_name_needs_timestamp() {
        let records = vec![RawFileRecord::new("/raw/a.raw", "EK60")];
        assert!(output_file_name(&records, &dataset(None, false)).is_err());
        assert!(output_file_name(&[], &dataset(None, false)).is_err());
    }

    #[tokio::test]
    async fn test_working_dir_is_created() {
        let temp = tempfile::tempdir().unwrap();
        let out = temp.path().to_string_lossy().to_string();
        let fs = crate::storage::LocalFileSystem::new();
        let stage = Stage::new("open_raw", "sonarflow.stages.open_raw");

        let dir = working_dir_for(&fs, &stage, &StageRuntimeConfig::default(), &dataset(Some(&out), false))
            .await
            .unwrap();
        assert!(std::path::Path::new(&dir).is_dir());
        assert!(dir.ends_with("open_raw"));
    }
}
