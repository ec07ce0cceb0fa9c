// Execution Events
// Progress reporting and event types for pipeline runs

use crate::execution::backend::Ownership;

use std::time::Duration;
use tokio::sync::mpsc;

/// Sender for execution progress events
pub type ProgressSender = mpsc::UnboundedSender<ExecutionEvent>;

/// Receiver for execution progress events
pub type ProgressReceiver = mpsc::UnboundedReceiver<ExecutionEvent>;

/// Create a new progress channel
pub fn progress_channel() -> (ProgressSender, ProgressReceiver) {
    mpsc::unbounded_channel()
}

/// Events emitted during a pipeline run
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    /// Pipeline run started
    PipelineStarted {
        pipeline_name: String,
        total_stages: usize,
        input_summary: String,
    },

    /// Pipeline run finished (successfully or not)
    PipelineCompleted {
        pipeline_name: String,
        success: bool,
        duration: Duration,
    },

    /// A cluster connection became available to stages
    BackendReady {
        address: String,
        ownership: Ownership,
    },

    /// A locally created cluster was shut down
    BackendClosed { address: String },

    /// Stage execution started
    StageStarted {
        process_name: String,
        stage_name: String,
        task_runner: String,
    },

    /// Stage execution completed with the value it returned
    StageCompleted {
        process_name: String,
        stage_name: String,
        summary: String,
        duration: Duration,
    },

    /// Stage raised; the run stops here
    StageFailed {
        process_name: String,
        stage_name: String,
        message: String,
    },

    /// Log message (info, warning, error)
    Log {
        level: LogLevel,
        message: String,
        stage_name: Option<String>,
    },
}

/// Log level for log events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl ExecutionEvent {
    pub fn pipeline_started(
        name: impl Into<String>,
        total_stages: usize,
        input_summary: impl Into<String>,
    ) -> Self {
        Self::PipelineStarted {
            pipeline_name: name.into(),
            total_stages,
            input_summary: input_summary.into(),
        }
    }

    pub fn pipeline_completed(name: impl Into<String>, success: bool, duration: Duration) -> Self {
        Self::PipelineCompleted {
            pipeline_name: name.into(),
            success,
            duration,
        }
    }

    pub fn stage_started(
        process_name: impl Into<String>,
        stage_name: impl Into<String>,
        task_runner: impl Into<String>,
    ) -> Self {
        Self::StageStarted {
            process_name: process_name.into(),
            stage_name: stage_name.into(),
            task_runner: task_runner.into(),
        }
    }

    pub fn stage_completed(
        process_name: impl Into<String>,
        stage_name: impl Into<String>,
        summary: impl Into<String>,
        duration: Duration,
    ) -> Self {
        Self::StageCompleted {
            process_name: process_name.into(),
            stage_name: stage_name.into(),
            summary: summary.into(),
            duration,
        }
    }

    pub fn stage_failed(
        process_name: impl Into<String>,
        stage_name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::StageFailed {
            process_name: process_name.into(),
            stage_name: stage_name.into(),
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>, stage_name: Option<String>) -> Self {
        Self::Log {
            level: LogLevel::Info,
            message: message.into(),
            stage_name,
        }
    }

    pub fn warning(message: impl Into<String>, stage_name: Option<String>) -> Self {
        Self::Log {
            level: LogLevel::Warning,
            message: message.into(),
            stage_name,
        }
    }
}

/// Helper trait for sending events, ignoring errors (fire-and-forget)
pub trait EventSender {
    fn send_event(&self, event: ExecutionEvent);
}

impl EventSender for ProgressSender {
    fn send_event(&self, event: ExecutionEvent) {
        let _ = self.send(event);
    }
}

impl EventSender for Option<ProgressSender> {
    fn send_event(&self, event: ExecutionEvent) {
        if let Some(sender) = self {
            let _ = sender.send(event);
        }
    }
}
