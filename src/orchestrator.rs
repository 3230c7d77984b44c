//! End-to-end flow of one test run
//!
//! ```text
//! ResolvingIdentifiers -> UploadingFiles -> Scheduling -> Polling -> CollectingResults -> Done
//!          \__________________\_______________\____________\______________\______> Failed
//! ```
//!
//! Any error aborts the flow at the stage it happened in and becomes the single
//! failure message of the [`Report`]. A completed run whose result is not
//! PASSED is a failure too, but a reported one rather than an error.

use anyhow::Result;
use derive_builder::Builder;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::config::{
    CONSOLE_DOMAIN, DEFAULT_REGION, DEFAULT_RUN_POLL_INTERVAL, DEFAULT_UPLOAD_POLL_INTERVAL,
};
use crate::error::{ResourceKind, RunnerError};
use crate::resolve::IdentifierResolver;
use crate::results::{ArtifactSelection, ResultCollector};
use crate::schedule::RunScheduler;
use crate::service::{DeviceFarm, Run, RunResult, Transfer};
use crate::settings::RunSettings;
use crate::state::{RecoverableState, StateStore};
use crate::telemetry::TelemetrySink;
use crate::upload::{FileKind, UploadCoordinator};

/// Everything one invocation needs besides its collaborators
#[derive(Debug, Clone, Builder)]
pub struct RunConfig {
    pub settings: RunSettings,
    /// `None` skips result collection entirely
    #[builder(default)]
    pub artifact_selection: Option<ArtifactSelection>,
    #[builder(default = "DEFAULT_UPLOAD_POLL_INTERVAL")]
    pub upload_poll_interval: Duration,
    #[builder(default = "DEFAULT_RUN_POLL_INTERVAL")]
    pub run_poll_interval: Duration,
    /// Prefix of every upload name created by this invocation
    #[builder(setter(into))]
    pub invocation_id: String,
    #[builder(setter(into), default = "DEFAULT_REGION.to_string()")]
    pub region: String,
    /// Parent of the artifact folder
    #[builder(setter(into), default = "PathBuf::from(\".\")")]
    pub output_dir: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ResolvingIdentifiers,
    UploadingFiles,
    Scheduling,
    Polling,
    CollectingResults,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Stage::ResolvingIdentifiers => "resolving identifiers",
            Stage::UploadingFiles => "uploading files",
            Stage::Scheduling => "scheduling",
            Stage::Polling => "polling",
            Stage::CollectingResults => "collecting results",
            Stage::Done => "done",
            Stage::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Values reported once the run has completed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutputs {
    pub arn: String,
    pub status: String,
    pub result: Option<String>,
    pub console_url: String,
    pub artifact_folder: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    /// The run completed with a result other than PASSED
    RunResult(String),
    /// The flow was aborted by an error
    Error(String),
}

impl Failure {
    pub fn message(&self) -> &str {
        match self {
            Failure::RunResult(message) | Failure::Error(message) => message,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    /// Last stage reached; `Failed` when an error aborted the flow
    pub stage: Stage,
    pub outputs: Option<RunOutputs>,
    pub failure: Option<Failure>,
}

impl Report {
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

/// `(project segment, run segment)` of a run identifier such as
/// `arn:aws:devicefarm:us-west-2:123:run:{project}/{run}`
pub fn run_segments(run_arn: &str) -> Option<(&str, &str)> {
    let resource = run_arn.split(':').nth(6)?;
    let (project, run) = resource.split_once('/')?;
    (!project.is_empty() && !run.is_empty()).then_some((project, run))
}

/// Console page of a run
pub fn console_url(region: &str, run_arn: &str) -> Option<String> {
    let (project, run) = run_segments(run_arn)?;
    Some(format!(
        "https://{}.console.{}/devicefarm/home#/mobile/projects/{}/runs/{}",
        region, CONSOLE_DOMAIN, project, run
    ))
}

pub struct Orchestrator {
    service: Arc<dyn DeviceFarm>,
    transfer: Arc<dyn Transfer>,
    state: Arc<dyn StateStore>,
    telemetry: TelemetrySink,
}

impl Orchestrator {
    pub fn new(
        service: Arc<dyn DeviceFarm>,
        transfer: Arc<dyn Transfer>,
        state: Arc<dyn StateStore>,
        telemetry: TelemetrySink,
    ) -> Self {
        Self {
            service,
            transfer,
            state,
            telemetry,
        }
    }

    /// Run the whole flow; never returns an error, see [`Report`]
    pub async fn run(&self, config: RunConfig) -> Report {
        let mut report = Report {
            stage: Stage::ResolvingIdentifiers,
            outputs: None,
            failure: None,
        };

        match self.execute(config, &mut report).await {
            Ok(run) => {
                report.stage = Stage::Done;
                let result = run.result.as_ref().map(RunResult::as_str);
                if result != Some(RunResult::Passed.as_str()) {
                    let result = result.unwrap_or("undefined").to_string();
                    warn!("Run did not pass: {}", result);
                    report.failure = Some(Failure::RunResult(result));
                }
            }
            Err(e) => {
                let message = format!("{:#}", e);
                error!("Failed while {}: {}", report.stage, message);
                report.stage = Stage::Failed;
                report.failure = Some(Failure::Error(message));
            }
        }

        report
    }

    async fn execute(&self, config: RunConfig, report: &mut Report) -> Result<Run> {
        let RunConfig {
            mut settings,
            artifact_selection,
            upload_poll_interval,
            run_poll_interval,
            invocation_id,
            region,
            output_dir,
        } = config;

        // 1. Resolve names to identifiers
        report.stage = Stage::ResolvingIdentifiers;
        self.resolve_identifiers(&mut settings, &invocation_id).await?;

        // 2. Upload local files
        report.stage = Stage::UploadingFiles;
        let uploads = UploadCoordinator::new(
            Arc::clone(&self.service),
            Arc::clone(&self.transfer),
            &invocation_id,
            upload_poll_interval,
            self.telemetry.clone(),
        );
        Self::upload_files(&uploads, &mut settings).await?;

        // 3. Submit the run and record where its artifacts will go
        report.stage = Stage::Scheduling;
        let scheduler = RunScheduler::new(
            Arc::clone(&self.service),
            run_poll_interval,
            self.telemetry.clone(),
        );
        let scheduled = scheduler.submit(&settings).await?;
        let (_, run_segment) =
            run_segments(&scheduled.arn).ok_or(RunnerError::malformed("ScheduleRun", "run.arn"))?;
        let artifact_folder = output_dir.join(run_segment);

        let mut state = RecoverableState::new(&invocation_id);
        state.project_arn = Some(settings.project_arn.clone());
        state.artifact_folder = Some(artifact_folder.to_string_lossy().into_owned());
        self.state.save(&state).await?;

        // 4. Wait for completion
        report.stage = Stage::Polling;
        let run = scheduler
            .wait_for_completion(settings.display_name(), &scheduled.arn)
            .await?;

        info!(
            "{} run result is {}.",
            settings.display_name(),
            run.result.as_ref().map(RunResult::as_str).unwrap_or("undefined")
        );
        let console_url =
            console_url(&region, &run.arn).ok_or(RunnerError::malformed("GetRun", "run.arn"))?;
        info!("{}", console_url);
        info!("{}.", run.counters.clone().unwrap_or_default());

        report.outputs = Some(RunOutputs {
            arn: run.arn.clone(),
            status: run.status.to_string(),
            result: run.result.as_ref().map(|r| r.to_string()),
            console_url,
            artifact_folder: artifact_folder.clone(),
        });

        // 5. Download artifacts
        if let Some(selection) = artifact_selection {
            report.stage = Stage::CollectingResults;
            let collector = ResultCollector::new(
                Arc::clone(&self.service),
                Arc::clone(&self.transfer),
                self.telemetry.clone(),
            );
            collector
                .collect(&run.arn, &artifact_folder, &selection)
                .await?;
        }

        Ok(run)
    }

    /// Project first, since the other lookups are scoped by it
    async fn resolve_identifiers(
        &self,
        settings: &mut RunSettings,
        invocation_id: &str,
    ) -> Result<()> {
        let resolver = IdentifierResolver::new(Arc::clone(&self.service));

        settings.project_arn = resolver.resolve_project(&settings.project_arn).await?;
        info!("Project ARN being used: {}.", settings.project_arn);

        let mut state = RecoverableState::new(invocation_id);
        state.project_arn = Some(settings.project_arn.clone());
        self.state.save(&state).await?;

        let project_arn = settings.project_arn.clone();

        if let Some(pool) = settings.device_pool_arn.as_mut().filter(|p| !p.is_empty()) {
            *pool = resolver
                .resolve(ResourceKind::DevicePool, &project_arn, pool)
                .await?;
            info!("Device Pool ARN being used: {}.", pool);
        }

        if let Some(configuration) = settings.configuration.as_mut() {
            if let Some(profile) = configuration
                .network_profile_arn
                .as_mut()
                .filter(|p| !p.is_empty())
            {
                *profile = resolver
                    .resolve(ResourceKind::NetworkProfile, &project_arn, profile)
                    .await?;
                info!("Network Profile ARN being used: {}.", profile);
            }

            if let Some(vpce) = configuration.vpce_configuration_arns.as_mut() {
                *vpce = resolver.resolve_vpce_configurations(vpce).await?;
                info!("VPCE Configuration ARNs being used: {}.", vpce.join(","));
            }
        }

        Ok(())
    }

    /// Upload the four optional files concurrently; the first failure wins
    async fn upload_files(uploads: &UploadCoordinator, settings: &mut RunSettings) -> Result<()> {
        let project_arn = settings.project_arn.as_str();
        let test_family = Some(settings.test.test_type.as_str());

        info!("Uploading files");
        let (app, test_package, test_spec, extra_data) = tokio::try_join!(
            uploads.upload_file(project_arn, settings.app_arn.as_deref(), FileKind::App, None),
            uploads.upload_file(
                project_arn,
                settings.test.test_package_arn.as_deref(),
                FileKind::TestPackage,
                test_family,
            ),
            uploads.upload_file(
                project_arn,
                settings.test.test_spec_arn.as_deref(),
                FileKind::TestSpec,
                test_family,
            ),
            uploads.upload_file(
                project_arn,
                settings.extra_data_package(),
                FileKind::ExternalData,
                None,
            ),
        )?;

        if app.is_some() {
            settings.app_arn = app;
        }
        if test_package.is_some() {
            settings.test.test_package_arn = test_package;
        }
        if test_spec.is_some() {
            settings.test.test_spec_arn = test_spec;
        }
        if let (Some(arn), Some(configuration)) = (extra_data, settings.configuration.as_mut()) {
            configuration.extra_data_package_arn = Some(arn);
        }

        Ok(())
    }
}
