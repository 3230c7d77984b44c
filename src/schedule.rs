use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::service::{DeviceFarm, Run, RunStatus};
use crate::settings::RunSettings;
use crate::telemetry::{TelemetryEvent, TelemetrySink};

/// Submits a run and waits for it to complete
pub struct RunScheduler {
    service: Arc<dyn DeviceFarm>,
    poll_interval: Duration,
    telemetry: TelemetrySink,
}

impl RunScheduler {
    pub fn new(
        service: Arc<dyn DeviceFarm>,
        poll_interval: Duration,
        telemetry: TelemetrySink,
    ) -> Self {
        Self {
            service,
            poll_interval,
            telemetry,
        }
    }

    /// Schedule the run once, then poll until its status is COMPLETED
    pub async fn schedule_run(&self, settings: &RunSettings) -> Result<Run> {
        let scheduled = self.submit(settings).await?;
        self.wait_for_completion(settings.display_name(), &scheduled.arn)
            .await
    }

    /// Submit the run request; a failed submission is not retried
    pub async fn submit(&self, settings: &RunSettings) -> Result<Run> {
        info!("{} run is being scheduled...", settings.display_name());
        self.service.schedule_run(settings).await
    }

    /// Poll the run at a fixed interval until its status is COMPLETED
    ///
    /// There is no deadline: a stopping run still ends up COMPLETED, and
    /// anything longer is for the calling process to cut short.
    pub async fn wait_for_completion(&self, name: &str, run_arn: &str) -> Result<Run> {
        loop {
            let run = self.service.get_run(run_arn).await?;
            self.telemetry.emit(TelemetryEvent::RunStatusChanged {
                status: run.status.to_string(),
            });

            if run.status == RunStatus::Completed {
                info!("{} run is {}.", name, run.status);
                return Ok(run);
            }

            info!("{} run is {}...", name, run.status);
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
