//! Records exchanged with the remote device-testing service

use std::fmt;

/// One page of a listing plus the token for the next one
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_token: Option<String>,
}

impl<T> Page<T> {
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_token: None,
        }
    }
}

/// A resource only ever looked up by name: projects, device pools, network
/// profiles, VPCE configurations, suites and tests
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedResource {
    pub arn: String,
    pub name: String,
}

impl NamedResource {
    pub fn new(arn: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            arn: arn.into(),
            name: name.into(),
        }
    }
}

/// Processing state of an upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadStatus {
    Initialized,
    Processing,
    Succeeded,
    Failed,
    Unknown(String),
}

impl UploadStatus {
    pub fn parse(s: &str) -> Self {
        match s {
            "INITIALIZED" => UploadStatus::Initialized,
            "PROCESSING" => UploadStatus::Processing,
            "SUCCEEDED" => UploadStatus::Succeeded,
            "FAILED" => UploadStatus::Failed,
            other => UploadStatus::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            UploadStatus::Initialized => "INITIALIZED",
            UploadStatus::Processing => "PROCESSING",
            UploadStatus::Succeeded => "SUCCEEDED",
            UploadStatus::Failed => "FAILED",
            UploadStatus::Unknown(s) => s,
        }
    }

    /// Anything other than INITIALIZED or PROCESSING ends polling
    pub fn is_terminal(&self) -> bool {
        !matches!(self, UploadStatus::Initialized | UploadStatus::Processing)
    }
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether an upload belongs to the account or is shared by the service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadCategory {
    Private,
    Curated,
    Other(String),
}

impl UploadCategory {
    pub fn parse(s: &str) -> Self {
        match s {
            "PRIVATE" => UploadCategory::Private,
            "CURATED" => UploadCategory::Curated,
            other => UploadCategory::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub arn: String,
    pub name: String,
    pub upload_type: Option<String>,
    pub category: Option<UploadCategory>,
    pub status: UploadStatus,
    /// Pre-signed URL the file bytes are PUT to
    pub url: Option<String>,
    pub metadata: Option<String>,
}

/// Execution state of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    Pending,
    PendingConcurrency,
    PendingDevice,
    Processing,
    Scheduling,
    Preparing,
    Running,
    Completed,
    Stopping,
    Unknown(String),
}

impl RunStatus {
    pub fn parse(s: &str) -> Self {
        match s {
            "PENDING" => RunStatus::Pending,
            "PENDING_CONCURRENCY" => RunStatus::PendingConcurrency,
            "PENDING_DEVICE" => RunStatus::PendingDevice,
            "PROCESSING" => RunStatus::Processing,
            "SCHEDULING" => RunStatus::Scheduling,
            "PREPARING" => RunStatus::Preparing,
            "RUNNING" => RunStatus::Running,
            "COMPLETED" => RunStatus::Completed,
            "STOPPING" => RunStatus::Stopping,
            other => RunStatus::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            RunStatus::Pending => "PENDING",
            RunStatus::PendingConcurrency => "PENDING_CONCURRENCY",
            RunStatus::PendingDevice => "PENDING_DEVICE",
            RunStatus::Processing => "PROCESSING",
            RunStatus::Scheduling => "SCHEDULING",
            RunStatus::Preparing => "PREPARING",
            RunStatus::Running => "RUNNING",
            RunStatus::Completed => "COMPLETED",
            RunStatus::Stopping => "STOPPING",
            RunStatus::Unknown(s) => s,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a completed run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunResult {
    Pending,
    Passed,
    Warned,
    Failed,
    Skipped,
    Errored,
    Stopped,
    Unknown(String),
}

impl RunResult {
    pub fn parse(s: &str) -> Self {
        match s {
            "PENDING" => RunResult::Pending,
            "PASSED" => RunResult::Passed,
            "WARNED" => RunResult::Warned,
            "FAILED" => RunResult::Failed,
            "SKIPPED" => RunResult::Skipped,
            "ERRORED" => RunResult::Errored,
            "STOPPED" => RunResult::Stopped,
            other => RunResult::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            RunResult::Pending => "PENDING",
            RunResult::Passed => "PASSED",
            RunResult::Warned => "WARNED",
            RunResult::Failed => "FAILED",
            RunResult::Skipped => "SKIPPED",
            RunResult::Errored => "ERRORED",
            RunResult::Stopped => "STOPPED",
            RunResult::Unknown(s) => s,
        }
    }
}

impl fmt::Display for RunResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Test outcome tallies reported for runs and jobs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Counters {
    pub total: i32,
    pub passed: i32,
    pub failed: i32,
    pub warned: i32,
    pub errored: i32,
    pub stopped: i32,
    pub skipped: i32,
}

impl fmt::Display for Counters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Total: {}, passed: {}, warned: {}, errored: {}, failed: {}, skipped: {}, stopped: {}",
            self.total,
            self.passed,
            self.warned,
            self.errored,
            self.failed,
            self.skipped,
            self.stopped
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    pub arn: String,
    pub name: Option<String>,
    pub status: RunStatus,
    pub result: Option<RunResult>,
    pub counters: Option<Counters>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub arn: String,
    pub name: String,
    pub counters: Option<Counters>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub arn: String,
    pub name: String,
    pub artifact_type: String,
    pub extension: String,
    pub url: String,
}
