//! Contracts for talking to the remote device-testing service

pub mod aws;
pub mod http;
pub mod model;

use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;

use crate::settings::RunSettings;
pub use aws::AwsDeviceFarm;
pub use http::HttpTransfer;
pub use model::{
    Artifact, Counters, Job, NamedResource, Page, Run, RunResult, RunStatus, Upload,
    UploadCategory, UploadStatus,
};

/// Request/response contract of the device-testing service
///
/// Listing operations return a single page; pass the previous page's
/// `next_token` to get the following one. See [`crate::paging`] for turning
/// these into streams.
#[async_trait]
pub trait DeviceFarm: Send + Sync {
    async fn list_projects(&self, next_token: Option<String>) -> Result<Page<NamedResource>>;

    async fn list_device_pools(
        &self,
        project_arn: &str,
        next_token: Option<String>,
    ) -> Result<Page<NamedResource>>;

    async fn list_network_profiles(
        &self,
        project_arn: &str,
        next_token: Option<String>,
    ) -> Result<Page<NamedResource>>;

    /// VPCE configurations belong to the account, not to a project
    async fn list_vpce_configurations(
        &self,
        next_token: Option<String>,
    ) -> Result<Page<NamedResource>>;

    async fn list_uploads(
        &self,
        project_arn: &str,
        upload_type: Option<&str>,
        next_token: Option<String>,
    ) -> Result<Page<Upload>>;

    /// Create an upload record; the returned upload carries the transfer URL
    async fn create_upload(&self, project_arn: &str, name: &str, upload_type: &str)
    -> Result<Upload>;

    async fn get_upload(&self, arn: &str) -> Result<Upload>;

    async fn delete_upload(&self, arn: &str) -> Result<()>;

    /// Submit a run built from fully resolved settings
    async fn schedule_run(&self, settings: &RunSettings) -> Result<Run>;

    async fn get_run(&self, arn: &str) -> Result<Run>;

    async fn list_jobs(&self, run_arn: &str, next_token: Option<String>) -> Result<Page<Job>>;

    async fn list_suites(
        &self,
        job_arn: &str,
        next_token: Option<String>,
    ) -> Result<Page<NamedResource>>;

    async fn list_tests(
        &self,
        suite_arn: &str,
        next_token: Option<String>,
    ) -> Result<Page<NamedResource>>;

    async fn list_artifacts(
        &self,
        run_arn: &str,
        category: &str,
        next_token: Option<String>,
    ) -> Result<Page<Artifact>>;
}

/// Binary transfers against pre-signed URLs
#[async_trait]
pub trait Transfer: Send + Sync {
    /// PUT the file's contents as `application/octet-stream`, streamed from disk
    async fn put(&self, url: &str, file: &Path) -> Result<()>;

    /// GET the full payload
    async fn get(&self, url: &str) -> Result<Vec<u8>>;
}
