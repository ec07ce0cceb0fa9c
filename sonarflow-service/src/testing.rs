// Test Doubles
// In-memory filesystem and scripted converter shared by unit tests

use crate::convert::{ConvertedDataset, Converter};
use crate::error::{PipelineError, PipelineResult};
use crate::storage::FileSystem;

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::io;
use std::sync::Mutex;

/// Filesystem kept in memory; directories are tracked explicitly
#[derive(Default)]
pub struct MemoryFileSystem {
    files: Mutex<BTreeMap<String, Vec<u8>>>,
    dirs: Mutex<BTreeSet<String>>,
    reads: Mutex<Vec<String>>,
}

impl MemoryFileSystem {
    pub fn with_files(files: &[(&str, &str)]) -> Self {
        let fs = Self::default();
        for (path, content) in files {
            fs.files
                .lock()
                .unwrap()
                .insert(path.to_string(), content.as_bytes().to_vec());
        }
        fs
    }

    pub fn add_dir(&self, path: &str) {
        self.dirs.lock().unwrap().insert(path.trim_end_matches('/').to_string());
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.lock().unwrap().contains_key(path)
    }

    pub fn reads(&self) -> Vec<String> {
        self.reads.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl FileSystem for MemoryFileSystem {
    async fn read(&self, path: &str) -> PipelineResult<Vec<u8>> {
        self.reads.lock().unwrap().push(path.to_string());
        self.files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| PipelineError::storage(path, io::Error::from(io::ErrorKind::NotFound)))
    }

    async fn write(&self, path: &str, data: &[u8]) -> PipelineResult<()> {
        self.files.lock().unwrap().insert(path.to_string(), data.to_vec());
        Ok(())
    }

    async fn exists(&self, path: &str) -> bool {
        self.contains(path) || self.dirs.lock().unwrap().contains(path.trim_end_matches('/'))
    }

    async fn is_dir(&self, path: &str) -> bool {
        self.dirs.lock().unwrap().contains(path.trim_end_matches('/'))
    }

    async fn make_dir(&self, path: &str) -> PipelineResult<()> {
        self.add_dir(path);
        Ok(())
    }
}

/// Converter that records its calls and fails for chosen inputs
#[derive(Default)]
pub struct ScriptedConverter {
    pub failing: HashSet<String>,
    pub converted: Mutex<Vec<String>>,
    pub combined: Mutex<Vec<(String, Vec<String>)>>,
}

impl ScriptedConverter {
    pub fn failing_on(paths: &[&str]) -> Self {
        Self {
            failing: paths.iter().map(|p| p.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn converted(&self) -> Vec<String> {
        self.converted.lock().unwrap().clone()
    }

    pub fn combined(&self) -> Vec<(String, Vec<String>)> {
        self.combined.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Converter for ScriptedConverter {
    async fn convert(
        &self,
        local_path: &str,
        _sonar_model: &str,
        out_path: &str,
    ) -> PipelineResult<ConvertedDataset> {
        if self.failing.contains(local_path) {
            return Err(PipelineError::Convert(format!("cannot parse {}", local_path)));
        }
        self.converted.lock().unwrap().push(local_path.to_string());
        Ok(ConvertedDataset {
            path: out_path.to_string(),
            sources: vec![local_path.to_string()],
        })
    }

    async fn combine(
        &self,
        inputs: &[ConvertedDataset],
        output_path: &str,
    ) -> PipelineResult<ConvertedDataset> {
        if self.failing.contains(output_path) {
            return Err(PipelineError::Convert(format!("cannot combine into {}", output_path)));
        }
        let sources: Vec<String> = inputs.iter().map(|i| i.path.clone()).collect();
        self.combined
            .lock()
            .unwrap()
            .push((output_path.to_string(), sources.clone()));
        Ok(ConvertedDataset {
            path: output_path.to_string(),
            sources,
        })
    }
}
