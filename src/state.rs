use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;

/// What a later cleanup invocation needs to know about a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoverableState {
    pub invocation_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_arn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_folder: Option<String>,
    pub saved_at: DateTime<Utc>,
}

impl RecoverableState {
    pub fn new(invocation_id: impl Into<String>) -> Self {
        Self {
            invocation_id: invocation_id.into(),
            project_arn: None,
            artifact_folder: None,
            saved_at: Utc::now(),
        }
    }
}

/// Storage for state shared between the run and cleanup invocations
#[async_trait::async_trait]
pub trait StateStore: Send + Sync {
    /// Replace the stored state
    async fn save(&self, state: &RecoverableState) -> Result<()>;

    /// Read the stored state
    async fn load(&self) -> Result<RecoverableState>;
}

/// JSON file implementation of StateStore
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait::async_trait]
impl StateStore for FileStateStore {
    async fn save(&self, state: &RecoverableState) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create state directory")?;
        }

        let mut state = state.clone();
        state.saved_at = Utc::now();
        let json = serde_json::to_string_pretty(&state).context("Failed to serialize state")?;

        fs::write(&self.path, json)
            .await
            .with_context(|| format!("Failed to write state file {}", self.path.display()))?;

        Ok(())
    }

    async fn load(&self) -> Result<RecoverableState> {
        let contents = fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read state file {}", self.path.display()))?;

        let state: RecoverableState =
            serde_json::from_str(&contents).context("Failed to parse state file")?;

        Ok(state)
    }
}
