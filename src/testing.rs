//! Scripted in-memory doubles of the remote service used across unit and
//! integration tests

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Mutex;

use crate::service::{
    Artifact, DeviceFarm, Job, NamedResource, Page, Run, RunResult, RunStatus, Transfer, Upload,
    UploadCategory, UploadStatus,
};
use crate::settings::RunSettings;
use crate::state::{RecoverableState, StateStore};

pub const PROJECT_ARN: &str = "arn:aws:devicefarm:us-west-2:account-id:project:project-id";
pub const RUN_ARN: &str = "arn:aws:devicefarm:us-west-2:account-id:run:project-id/run-id";

/// Serve `pages[token]`, using the page index as continuation token
fn serve<T: Clone>(pages: &[Vec<T>], token: Option<String>) -> Page<T> {
    let index: usize = token.and_then(|t| t.parse().ok()).unwrap_or(0);
    let items = pages.get(index).cloned().unwrap_or_default();
    let next_token = (index + 1 < pages.len()).then(|| (index + 1).to_string());
    Page { items, next_token }
}

pub fn run(status: RunStatus, result: Option<RunResult>) -> Run {
    Run {
        arn: RUN_ARN.to_string(),
        name: Some("test-run".to_string()),
        status,
        result,
        counters: None,
    }
}

pub fn upload(arn: &str, name: &str, status: UploadStatus) -> Upload {
    Upload {
        arn: arn.to_string(),
        name: name.to_string(),
        upload_type: None,
        category: Some(UploadCategory::Private),
        status,
        url: Some(format!("https://uploads.example.com/{}", name)),
        metadata: None,
    }
}

#[derive(Default)]
pub struct FakeDeviceFarm {
    pub projects: Vec<Vec<NamedResource>>,
    pub device_pools: Vec<Vec<NamedResource>>,
    pub network_profiles: Vec<Vec<NamedResource>>,
    pub vpce_configurations: Vec<Vec<NamedResource>>,
    /// Pages of existing uploads, keyed by upload type ("" for untyped listings)
    pub uploads: HashMap<String, Vec<Vec<Upload>>>,
    /// Arn handed out for each created upload name
    pub upload_arns: HashMap<String, String>,
    /// Statuses returned by successive GetUpload calls, keyed by arn
    pub upload_statuses: Mutex<HashMap<String, VecDeque<UploadStatus>>>,
    /// Runs returned by successive GetRun calls; the last one repeats
    pub run_script: Mutex<VecDeque<Run>>,
    pub jobs: Vec<Job>,
    pub suites: HashMap<String, Vec<NamedResource>>,
    pub tests: HashMap<String, Vec<NamedResource>>,
    /// When set, jobs, suites and tests are listed this many per page
    pub hierarchy_page_size: Option<usize>,
    /// Pages of artifacts keyed by category
    pub artifacts: HashMap<String, Vec<Vec<Artifact>>>,

    pub calls: Mutex<Vec<String>>,
    pub created: Mutex<Vec<(String, String)>>,
    pub deleted: Mutex<Vec<String>>,
    pub scheduled: Mutex<Option<RunSettings>>,
}

impl FakeDeviceFarm {
    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    /// Number of recorded calls whose name starts with `prefix`
    pub fn count(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    pub fn script_upload(&self, arn: &str, statuses: Vec<UploadStatus>) {
        self.upload_statuses
            .lock()
            .unwrap()
            .insert(arn.to_string(), statuses.into());
    }

    pub fn script_run(&self, runs: Vec<Run>) {
        *self.run_script.lock().unwrap() = runs.into();
    }

    fn hierarchy_pages<T: Clone>(&self, items: &[T]) -> Vec<Vec<T>> {
        match self.hierarchy_page_size {
            Some(size) => items.chunks(size).map(<[T]>::to_vec).collect(),
            None => vec![items.to_vec()],
        }
    }
}

#[async_trait]
impl DeviceFarm for FakeDeviceFarm {
    async fn list_projects(&self, next_token: Option<String>) -> Result<Page<NamedResource>> {
        self.record("ListProjects");
        Ok(serve(&self.projects, next_token))
    }

    async fn list_device_pools(
        &self,
        _project_arn: &str,
        next_token: Option<String>,
    ) -> Result<Page<NamedResource>> {
        self.record("ListDevicePools");
        Ok(serve(&self.device_pools, next_token))
    }

    async fn list_network_profiles(
        &self,
        _project_arn: &str,
        next_token: Option<String>,
    ) -> Result<Page<NamedResource>> {
        self.record("ListNetworkProfiles");
        Ok(serve(&self.network_profiles, next_token))
    }

    async fn list_vpce_configurations(
        &self,
        next_token: Option<String>,
    ) -> Result<Page<NamedResource>> {
        self.record("ListVPCEConfigurations");
        Ok(serve(&self.vpce_configurations, next_token))
    }

    async fn list_uploads(
        &self,
        _project_arn: &str,
        upload_type: Option<&str>,
        next_token: Option<String>,
    ) -> Result<Page<Upload>> {
        self.record(format!("ListUploads:{}", upload_type.unwrap_or_default()));
        let pages = self
            .uploads
            .get(upload_type.unwrap_or_default())
            .cloned()
            .unwrap_or_default();
        Ok(serve(&pages, next_token))
    }

    async fn create_upload(
        &self,
        _project_arn: &str,
        name: &str,
        upload_type: &str,
    ) -> Result<Upload> {
        self.record("CreateUpload");
        self.created
            .lock()
            .unwrap()
            .push((name.to_string(), upload_type.to_string()));
        let arn = self
            .upload_arns
            .get(name)
            .cloned()
            .ok_or_else(|| anyhow!("unexpected upload {}", name))?;
        let mut created = upload(&arn, name, UploadStatus::Initialized);
        created.upload_type = Some(upload_type.to_string());
        Ok(created)
    }

    async fn get_upload(&self, arn: &str) -> Result<Upload> {
        self.record("GetUpload");
        let status = self
            .upload_statuses
            .lock()
            .unwrap()
            .get_mut(arn)
            .and_then(|script| script.pop_front())
            .unwrap_or(UploadStatus::Succeeded);
        Ok(upload(arn, "uploaded", status))
    }

    async fn delete_upload(&self, arn: &str) -> Result<()> {
        self.record("DeleteUpload");
        self.deleted.lock().unwrap().push(arn.to_string());
        Ok(())
    }

    async fn schedule_run(&self, settings: &RunSettings) -> Result<Run> {
        self.record("ScheduleRun");
        *self.scheduled.lock().unwrap() = Some(settings.clone());
        Ok(run(RunStatus::Scheduling, None))
    }

    async fn get_run(&self, _arn: &str) -> Result<Run> {
        self.record("GetRun");
        let mut script = self.run_script.lock().unwrap();
        let next = if script.len() > 1 {
            script.pop_front()
        } else {
            script.front().cloned()
        };
        next.ok_or_else(|| anyhow!("no run scripted"))
    }

    async fn list_jobs(&self, _run_arn: &str, next_token: Option<String>) -> Result<Page<Job>> {
        self.record("ListJobs");
        Ok(serve(&self.hierarchy_pages(&self.jobs), next_token))
    }

    async fn list_suites(
        &self,
        job_arn: &str,
        next_token: Option<String>,
    ) -> Result<Page<NamedResource>> {
        self.record("ListSuites");
        let suites = self.suites.get(job_arn).cloned().unwrap_or_default();
        Ok(serve(&self.hierarchy_pages(&suites), next_token))
    }

    async fn list_tests(
        &self,
        suite_arn: &str,
        next_token: Option<String>,
    ) -> Result<Page<NamedResource>> {
        self.record("ListTests");
        let tests = self.tests.get(suite_arn).cloned().unwrap_or_default();
        Ok(serve(&self.hierarchy_pages(&tests), next_token))
    }

    async fn list_artifacts(
        &self,
        _run_arn: &str,
        category: &str,
        next_token: Option<String>,
    ) -> Result<Page<Artifact>> {
        self.record(format!("ListArtifacts:{}", category));
        let pages = self.artifacts.get(category).cloned().unwrap_or_default();
        Ok(serve(&pages, next_token))
    }
}

#[derive(Default)]
pub struct FakeTransfer {
    /// Payloads served by GET, keyed by URL
    pub payloads: HashMap<String, Vec<u8>>,
    /// When set, every PUT fails with this message
    pub put_error: Option<String>,
    pub puts: Mutex<Vec<(String, Vec<u8>)>>,
    pub gets: Mutex<Vec<String>>,
}

#[async_trait]
impl Transfer for FakeTransfer {
    async fn put(&self, url: &str, file: &Path) -> Result<()> {
        if let Some(message) = &self.put_error {
            return Err(anyhow!("{}", message));
        }
        let body = tokio::fs::read(file).await?;
        self.puts.lock().unwrap().push((url.to_string(), body));
        Ok(())
    }

    async fn get(&self, url: &str) -> Result<Vec<u8>> {
        self.gets.lock().unwrap().push(url.to_string());
        self.payloads
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow!("404 Not Found: {}", url))
    }
}

/// Keeps every saved state so tests can inspect the sequence of saves
#[derive(Default)]
pub struct MemoryStateStore {
    pub saves: Mutex<Vec<RecoverableState>>,
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn save(&self, state: &RecoverableState) -> Result<()> {
        self.saves.lock().unwrap().push(state.clone());
        Ok(())
    }

    async fn load(&self) -> Result<RecoverableState> {
        self.saves
            .lock()
            .unwrap()
            .last()
            .cloned()
            .ok_or_else(|| anyhow!("no state saved"))
    }
}
