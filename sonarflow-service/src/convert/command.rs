// Command Converter
// Runs an external conversion program for convert and combine calls

use crate::convert::{ConvertedDataset, Converter};
use crate::error::{PipelineError, PipelineResult};

use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// Program looked up on PATH when none is configured
pub const DEFAULT_CONVERTER_PROGRAM: &str = "sonar-convert";

/// Converter that shells out to a program with the interface
///
/// ```text
/// <program> convert --sonar-model <model> --input <raw> --output <store>
/// <program> combine --output <store> <input-store>...
/// ```
#[derive(Debug, Clone)]
pub struct CommandConverter {
    program: PathBuf,
    extra_args: Vec<String>,
}

impl CommandConverter {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            extra_args: Vec::new(),
        }
    }

    /// Find a converter program on PATH
    pub fn locate(name: &str) -> PipelineResult<Self> {
        let candidate = Path::new(name);
        if candidate.is_file() {
            return Ok(Self::new(candidate));
        }
        which::which(name)
            .map(Self::new)
            .map_err(|e| PipelineError::Convert(format!("converter '{}' not found: {}", name, e)))
    }

    /// Arguments passed before the subcommand (e.g. a script path for an interpreter)
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.extra_args = args;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    async fn run(&self, args: &[&str]) -> PipelineResult<()> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.extra_args);
        cmd.args(args);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        tracing::debug!(program = %self.program.display(), ?args, "running converter");

        let output = cmd.output().await.map_err(|e| {
            PipelineError::Convert(format!(
                "failed to spawn '{}': {}",
                self.program.display(),
                e
            ))
        })?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        Err(PipelineError::Convert(match output.status.code() {
            Some(code) => format!("'{}' exited with code {}: {}", args.join(" "), code, stderr),
            None => format!("'{}' was terminated: {}", args.join(" "), stderr),
        }))
    }
}

#[async_trait::async_trait]
impl Converter for CommandConverter {
    async fn convert(
        &self,
        local_path: &str,
        sonar_model: &str,
        out_path: &str,
    ) -> PipelineResult<ConvertedDataset> {
        self.run(&[
            "convert",
            "--sonar-model",
            sonar_model,
            "--input",
            local_path,
            "--output",
            out_path,
        ])
        .await?;
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
        let mut args = vec!["combine", "--output", output_path];
        args.extend(inputs.iter().map(|input| input.path.as_str()));
        self.run(&args).await?;
        Ok(ConvertedDataset {
            path: output_path.to_string(),
            sources: inputs.iter().map(|input| input.path.clone()).collect(),
        })
    }
}
