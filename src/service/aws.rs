use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_devicefarm::Client as DeviceFarmClient;
use aws_sdk_devicefarm::types::{
    ArtifactCategory, BillingMethod, ExecutionConfiguration, ScheduleRunConfiguration,
    ScheduleRunTest, TestType, UploadType,
};
use aws_sdk_devicefarm::types::{
    Artifact as SdkArtifact, Counters as SdkCounters, Job as SdkJob, Run as SdkRun,
    Upload as SdkUpload,
};
use std::sync::Arc;

use super::DeviceFarm;
use super::model::{
    Artifact, Counters, Job, NamedResource, Page, Run, RunResult, RunStatus, Upload,
    UploadCategory, UploadStatus,
};
use crate::error::RunnerError;
use crate::settings::RunSettings;

/// DeviceFarm implementation backed by the AWS SDK
#[derive(Clone)]
pub struct AwsDeviceFarm {
    client: Arc<DeviceFarmClient>,
}

impl AwsDeviceFarm {
    pub fn new(aws_config: &SdkConfig) -> Self {
        Self {
            client: Arc::new(DeviceFarmClient::new(aws_config)),
        }
    }
}

fn named(
    arn: Option<&str>,
    name: Option<&str>,
    operation: &'static str,
) -> Result<NamedResource> {
    let arn = arn.ok_or(RunnerError::malformed(operation, "arn"))?;
    let name = name.ok_or(RunnerError::malformed(operation, "name"))?;
    Ok(NamedResource::new(arn, name))
}

fn next_token(token: Option<&str>) -> Option<String> {
    token.filter(|t| !t.is_empty()).map(str::to_string)
}

fn convert_counters(counters: &SdkCounters) -> Counters {
    Counters {
        total: counters.total().unwrap_or_default(),
        passed: counters.passed().unwrap_or_default(),
        failed: counters.failed().unwrap_or_default(),
        warned: counters.warned().unwrap_or_default(),
        errored: counters.errored().unwrap_or_default(),
        stopped: counters.stopped().unwrap_or_default(),
        skipped: counters.skipped().unwrap_or_default(),
    }
}

fn convert_upload(upload: Option<&SdkUpload>, operation: &'static str) -> Result<Upload> {
    let upload = upload.ok_or(RunnerError::malformed(operation, "upload"))?;
    let arn = upload
        .arn()
        .ok_or(RunnerError::malformed(operation, "upload.arn"))?;
    let status = upload
        .status()
        .ok_or(RunnerError::malformed(operation, "upload.status"))?;

    Ok(Upload {
        arn: arn.to_string(),
        name: upload.name().unwrap_or_default().to_string(),
        upload_type: upload.r#type().map(|t| t.as_str().to_string()),
        category: upload.category().map(|c| UploadCategory::parse(c.as_str())),
        status: UploadStatus::parse(status.as_str()),
        url: upload.url().map(str::to_string),
        metadata: upload.metadata().map(str::to_string),
    })
}

fn convert_run(run: Option<&SdkRun>, operation: &'static str) -> Result<Run> {
    let run = run.ok_or(RunnerError::malformed(operation, "run"))?;
    let arn = run.arn().ok_or(RunnerError::malformed(operation, "run.arn"))?;

    Ok(Run {
        arn: arn.to_string(),
        name: run.name().map(str::to_string),
        // A freshly scheduled run may come back without a status
        status: run
            .status()
            .map(|s| RunStatus::parse(s.as_str()))
            .unwrap_or(RunStatus::Pending),
        result: run.result().map(|r| RunResult::parse(r.as_str())),
        counters: run.counters().map(convert_counters),
    })
}

fn convert_job(job: &SdkJob) -> Result<Job> {
    let arn = job.arn().ok_or(RunnerError::malformed("ListJobs", "arn"))?;
    let name = job.name().ok_or(RunnerError::malformed("ListJobs", "name"))?;
    Ok(Job {
        arn: arn.to_string(),
        name: name.to_string(),
        counters: job.counters().map(convert_counters),
    })
}

fn convert_artifact(artifact: &SdkArtifact) -> Result<Artifact> {
    let arn = artifact
        .arn()
        .ok_or(RunnerError::malformed("ListArtifacts", "arn"))?;
    let url = artifact
        .url()
        .ok_or(RunnerError::malformed("ListArtifacts", "url"))?;

    Ok(Artifact {
        arn: arn.to_string(),
        name: artifact.name().unwrap_or_default().to_string(),
        artifact_type: artifact
            .r#type()
            .map(|t| t.as_str().to_string())
            .unwrap_or_default(),
        extension: artifact.extension().unwrap_or_default().to_string(),
        url: url.to_string(),
    })
}

/// Build the SDK test block from resolved settings
fn build_test(settings: &RunSettings) -> Result<ScheduleRunTest> {
    let test = &settings.test;
    ScheduleRunTest::builder()
        .r#type(TestType::from(test.test_type.as_str()))
        .set_test_package_arn(test.test_package_arn.clone())
        .set_test_spec_arn(test.test_spec_arn.clone())
        .set_filter(test.filter.clone())
        .set_parameters(test.parameters.clone())
        .build()
        .context("Invalid test settings")
}

fn build_configuration(settings: &RunSettings) -> Option<ScheduleRunConfiguration> {
    settings.configuration.as_ref().map(|c| {
        ScheduleRunConfiguration::builder()
            .set_extra_data_package_arn(c.extra_data_package_arn.clone())
            .set_network_profile_arn(c.network_profile_arn.clone())
            .set_locale(c.locale.clone())
            .set_vpce_configuration_arns(c.vpce_configuration_arns.clone())
            .set_auxiliary_apps(c.auxiliary_apps.clone())
            .set_billing_method(c.billing_method.as_deref().map(BillingMethod::from))
            .build()
    })
}

fn build_execution_configuration(settings: &RunSettings) -> Option<ExecutionConfiguration> {
    settings.execution_configuration.as_ref().map(|e| {
        ExecutionConfiguration::builder()
            .set_job_timeout_minutes(e.job_timeout_minutes)
            .set_accounts_cleanup(e.accounts_cleanup)
            .set_app_packages_cleanup(e.app_packages_cleanup)
            .set_video_capture(e.video_capture)
            .set_skip_app_resign(e.skip_app_resign)
            .build()
    })
}

#[async_trait]
impl DeviceFarm for AwsDeviceFarm {
    async fn list_projects(&self, next: Option<String>) -> Result<Page<NamedResource>> {
        let response = self
            .client
            .list_projects()
            .set_next_token(next)
            .send()
            .await
            .context("Failed to list projects")?;

        let items = response
            .projects()
            .iter()
            .map(|p| named(p.arn(), p.name(), "ListProjects"))
            .collect::<Result<Vec<_>>>()?;

        Ok(Page {
            items,
            next_token: next_token(response.next_token()),
        })
    }

    async fn list_device_pools(
        &self,
        project_arn: &str,
        next: Option<String>,
    ) -> Result<Page<NamedResource>> {
        let response = self
            .client
            .list_device_pools()
            .arn(project_arn)
            .set_next_token(next)
            .send()
            .await
            .context("Failed to list device pools")?;

        let items = response
            .device_pools()
            .iter()
            .map(|d| named(d.arn(), d.name(), "ListDevicePools"))
            .collect::<Result<Vec<_>>>()?;

        Ok(Page {
            items,
            next_token: next_token(response.next_token()),
        })
    }

    async fn list_network_profiles(
        &self,
        project_arn: &str,
        next: Option<String>,
    ) -> Result<Page<NamedResource>> {
        let response = self
            .client
            .list_network_profiles()
            .arn(project_arn)
            .set_next_token(next)
            .send()
            .await
            .context("Failed to list network profiles")?;

        let items = response
            .network_profiles()
            .iter()
            .map(|n| named(n.arn(), n.name(), "ListNetworkProfiles"))
            .collect::<Result<Vec<_>>>()?;

        Ok(Page {
            items,
            next_token: next_token(response.next_token()),
        })
    }

    async fn list_vpce_configurations(
        &self,
        next: Option<String>,
    ) -> Result<Page<NamedResource>> {
        let response = self
            .client
            .list_vpce_configurations()
            .set_next_token(next)
            .send()
            .await
            .context("Failed to list VPCE configurations")?;

        let items = response
            .vpce_configurations()
            .iter()
            .map(|v| {
                named(
                    v.arn(),
                    v.vpce_configuration_name(),
                    "ListVPCEConfigurations",
                )
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Page {
            items,
            next_token: next_token(response.next_token()),
        })
    }

    async fn list_uploads(
        &self,
        project_arn: &str,
        upload_type: Option<&str>,
        next: Option<String>,
    ) -> Result<Page<Upload>> {
        let response = self
            .client
            .list_uploads()
            .arn(project_arn)
            .set_type(upload_type.map(UploadType::from))
            .set_next_token(next)
            .send()
            .await
            .context("Failed to list uploads")?;

        let items = response
            .uploads()
            .iter()
            .map(|u| convert_upload(Some(u), "ListUploads"))
            .collect::<Result<Vec<_>>>()?;

        Ok(Page {
            items,
            next_token: next_token(response.next_token()),
        })
    }

    async fn create_upload(
        &self,
        project_arn: &str,
        name: &str,
        upload_type: &str,
    ) -> Result<Upload> {
        let response = self
            .client
            .create_upload()
            .project_arn(project_arn)
            .name(name)
            .r#type(UploadType::from(upload_type))
            .send()
            .await
            .with_context(|| format!("Failed to create upload {}", name))?;

        convert_upload(response.upload(), "CreateUpload")
    }

    async fn get_upload(&self, arn: &str) -> Result<Upload> {
        let response = self
            .client
            .get_upload()
            .arn(arn)
            .send()
            .await
            .with_context(|| format!("Failed to get upload {}", arn))?;

        convert_upload(response.upload(), "GetUpload")
    }

    async fn delete_upload(&self, arn: &str) -> Result<()> {
        self.client
            .delete_upload()
            .arn(arn)
            .send()
            .await
            .with_context(|| format!("Failed to delete upload {}", arn))?;
        Ok(())
    }

    async fn schedule_run(&self, settings: &RunSettings) -> Result<Run> {
        let response = self
            .client
            .schedule_run()
            .project_arn(&settings.project_arn)
            .set_app_arn(settings.app_arn.clone())
            .set_device_pool_arn(settings.device_pool_arn.clone())
            .set_name(settings.name.clone())
            .test(build_test(settings)?)
            .set_configuration(build_configuration(settings))
            .set_execution_configuration(build_execution_configuration(settings))
            .send()
            .await
            .context("Failed to schedule run")?;

        convert_run(response.run(), "ScheduleRun")
    }

    async fn get_run(&self, arn: &str) -> Result<Run> {
        let response = self
            .client
            .get_run()
            .arn(arn)
            .send()
            .await
            .with_context(|| format!("Failed to get run {}", arn))?;

        convert_run(response.run(), "GetRun")
    }

    async fn list_jobs(&self, run_arn: &str, next: Option<String>) -> Result<Page<Job>> {
        let response = self
            .client
            .list_jobs()
            .arn(run_arn)
            .set_next_token(next)
            .send()
            .await
            .context("Failed to list jobs")?;

        let items = response
            .jobs()
            .iter()
            .map(convert_job)
            .collect::<Result<Vec<_>>>()?;

        Ok(Page {
            items,
            next_token: next_token(response.next_token()),
        })
    }

    async fn list_suites(
        &self,
        job_arn: &str,
        next: Option<String>,
    ) -> Result<Page<NamedResource>> {
        let response = self
            .client
            .list_suites()
            .arn(job_arn)
            .set_next_token(next)
            .send()
            .await
            .context("Failed to list suites")?;

        let items = response
            .suites()
            .iter()
            .map(|s| named(s.arn(), s.name(), "ListSuites"))
            .collect::<Result<Vec<_>>>()?;

        Ok(Page {
            items,
            next_token: next_token(response.next_token()),
        })
    }

    async fn list_tests(
        &self,
        suite_arn: &str,
        next: Option<String>,
    ) -> Result<Page<NamedResource>> {
        let response = self
            .client
            .list_tests()
            .arn(suite_arn)
            .set_next_token(next)
            .send()
            .await
            .context("Failed to list tests")?;

        let items = response
            .tests()
            .iter()
            .map(|t| named(t.arn(), t.name(), "ListTests"))
            .collect::<Result<Vec<_>>>()?;

        Ok(Page {
            items,
            next_token: next_token(response.next_token()),
        })
    }

    async fn list_artifacts(
        &self,
        run_arn: &str,
        category: &str,
        next: Option<String>,
    ) -> Result<Page<Artifact>> {
        let response = self
            .client
            .list_artifacts()
            .arn(run_arn)
            .r#type(ArtifactCategory::from(category))
            .set_next_token(next)
            .send()
            .await
            .with_context(|| format!("Failed to list {} artifacts", category))?;

        let items = response
            .artifacts()
            .iter()
            .map(convert_artifact)
            .collect::<Result<Vec<_>>>()?;

        Ok(Page {
            items,
            next_token: next_token(response.next_token()),
        })
    }
}
