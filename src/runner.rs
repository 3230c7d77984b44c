//! High-level runner API for Device Farm test runs.
//!
//! This module wires the AWS configuration, service clients, state storage and
//! progress rendering around the orchestrator. It is the primary API for
//! external users and for the CLI.

use anyhow::{Context, Result};
use aws_config::{BehaviorVersion, Region};
use indicatif::{HumanBytes, MultiProgress, ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::cleanup::Cleaner;
use crate::orchestrator::{Orchestrator, RunConfigBuilder};
use crate::results::ArtifactSelection;
use crate::service::{AwsDeviceFarm, DeviceFarm, HttpTransfer, Transfer};
use crate::settings::RunSettings;
use crate::state::{FileStateStore, StateStore};
use crate::telemetry::{ProgressStats, TelemetryEvent, TelemetrySink};

pub use crate::cleanup::CleanupSummary;
pub use crate::orchestrator::{Failure, Report, RunOutputs, Stage};

/// Where the run settings document comes from
#[derive(Debug, Clone)]
pub enum SettingsSource {
    File(PathBuf),
    Json(String),
}

impl SettingsSource {
    async fn load(&self) -> Result<RunSettings> {
        match self {
            SettingsSource::File(path) => RunSettings::load(path).await,
            SettingsSource::Json(json) => RunSettings::from_json(json),
        }
    }
}

/// Arguments for a test run
#[derive(Debug, Clone)]
pub struct RunArgs {
    pub settings: SettingsSource,
    /// Overrides the `name` of the settings document
    pub run_name: Option<String>,
    /// Comma-separated artifact types, `ALL`, or empty for none
    pub artifact_types: String,
    pub upload_poll_interval: Duration,
    pub run_poll_interval: Duration,
    pub invocation_id: String,
    pub region: String,
    pub output_dir: PathBuf,
    pub state_file: PathBuf,
    pub quiet: bool,
}

/// Arguments for cleaning up after an interrupted run
#[derive(Debug, Clone)]
pub struct CleanupArgs {
    pub region: String,
    pub state_file: PathBuf,
}

async fn load_aws_config(region: &str) -> aws_config::SdkConfig {
    aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(region.to_string()))
        .load()
        .await
}

/// Run the tests described by the settings document
///
/// Resolves names, uploads local files, schedules the run, waits for it and
/// downloads the requested artifacts. Failures of the flow are part of the
/// returned [`Report`]; only setup problems (unreadable settings, bad
/// arguments) are returned as errors.
///
/// # Example
///
/// ```no_run
/// use devicefarm_runner::runner::{RunArgs, SettingsSource, run_tests};
/// use std::time::Duration;
///
/// # async fn example() -> anyhow::Result<()> {
/// let args = RunArgs {
///     settings: SettingsSource::File("run-settings.json".into()),
///     run_name: None,
///     artifact_types: "ALL".to_string(),
///     upload_poll_interval: Duration::from_secs(1),
///     run_poll_interval: Duration::from_secs(30),
///     invocation_id: "1234".to_string(),
///     region: "us-west-2".to_string(),
///     output_dir: ".".into(),
///     state_file: ".devicefarm-runner-state.json".into(),
///     quiet: true,
/// };
///
/// let report = run_tests(args).await?;
/// if let Some(outputs) = &report.outputs {
///     println!("{} finished with {:?}", outputs.arn, outputs.result);
/// }
/// # Ok(())
/// # }
/// ```
pub async fn run_tests(args: RunArgs) -> Result<Report> {
    let mut settings = args.settings.load().await?;
    if let Some(name) = args.run_name {
        settings.name = Some(name);
    }

    let config = RunConfigBuilder::default()
        .settings(settings)
        .artifact_selection(ArtifactSelection::parse(&args.artifact_types))
        .upload_poll_interval(args.upload_poll_interval)
        .run_poll_interval(args.run_poll_interval)
        .invocation_id(args.invocation_id)
        .region(args.region.clone())
        .output_dir(args.output_dir)
        .build()
        .context("Invalid run configuration")?;

    let aws_config = load_aws_config(&args.region).await;
    let service: Arc<dyn DeviceFarm> = Arc::new(AwsDeviceFarm::new(&aws_config));
    let transfer: Arc<dyn Transfer> = Arc::new(HttpTransfer::new());
    let state: Arc<dyn StateStore> = Arc::new(FileStateStore::new(args.state_file));

    let (telemetry_tx, telemetry_rx) = mpsc::unbounded_channel::<TelemetryEvent>();
    let orchestrator =
        Orchestrator::new(service, transfer, state, TelemetrySink::new(telemetry_tx));
    let progress = setup_progress_tracking(args.quiet, telemetry_rx);

    let report = orchestrator.run(config).await;

    // Dropping the last sender closes the channel so the progress task ends
    drop(orchestrator);
    if let Some(handle) = progress {
        let _ = handle.await;
    }

    Ok(report)
}

/// Delete unfinished uploads and the artifact folder recorded by a run
pub async fn run_cleanup(args: CleanupArgs) -> Result<CleanupSummary> {
    let state = FileStateStore::new(args.state_file).load().await?;

    let aws_config = load_aws_config(&args.region).await;
    let service: Arc<dyn DeviceFarm> = Arc::new(AwsDeviceFarm::new(&aws_config));

    Cleaner::new(service).cleanup(&state).await
}

fn style(template: &str, fallback: fn() -> ProgressStyle) -> ProgressStyle {
    ProgressStyle::with_template(template).unwrap_or_else(|_| fallback())
}

/// Render upload, run and artifact progress from telemetry events
fn setup_progress_tracking(
    quiet: bool,
    mut telemetry_rx: mpsc::UnboundedReceiver<TelemetryEvent>,
) -> Option<tokio::task::JoinHandle<()>> {
    if quiet {
        return None;
    }

    let multi_progress = MultiProgress::new();

    let uploads_bar = multi_progress.add(ProgressBar::new_spinner());
    uploads_bar.set_style(style(
        "[{elapsed_precise}] Uploads:   {spinner} {msg}",
        ProgressStyle::default_spinner,
    ));

    let run_bar = multi_progress.add(ProgressBar::new_spinner());
    run_bar.set_style(style(
        "[{elapsed_precise}] Run:       {spinner} {msg}",
        ProgressStyle::default_spinner,
    ));

    let artifacts_bar = multi_progress.add(ProgressBar::new(0));
    artifacts_bar.set_style(
        style(
            "[{elapsed_precise}] Artifacts: [{bar:30.cyan/blue}] {pos}/{len} | {msg}",
            ProgressStyle::default_bar,
        )
        .progress_chars("=>-"),
    );

    Some(tokio::spawn(async move {
        let mut stats = ProgressStats::new();

        while let Some(event) = telemetry_rx.recv().await {
            stats.update(&event);

            uploads_bar.set_message(format!(
                "{}/{} processed",
                stats.uploads_completed, stats.uploads_started
            ));
            uploads_bar.tick();
            if let Some(status) = &stats.run_status {
                run_bar.set_message(format!("{} (poll {})", status, stats.run_polls));
                run_bar.tick();
            }
            artifacts_bar.set_length(stats.artifacts_total as u64);
            artifacts_bar.set_position(stats.artifacts_downloaded as u64);
            artifacts_bar.set_message(HumanBytes(stats.bytes_downloaded).to_string());
        }

        uploads_bar.finish();
        run_bar.finish();
        artifacts_bar.finish();
    }))
}
