use tokio::sync::mpsc;

/// Progress events sent from the pipeline to whoever renders progress
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelemetryEvent {
    /// A local file started transferring to the service
    UploadStarted { name: String },
    /// Polled status of an upload being processed
    UploadStatusChanged { name: String, status: String },
    /// An upload reached a terminal status
    UploadCompleted { name: String, status: String },
    /// Polled status of the run
    RunStatusChanged { status: String },
    /// Artifacts selected for download
    ArtifactsDiscovered { count: usize },
    /// One artifact was written to disk
    ArtifactDownloaded { bytes: u64 },
}

/// Optional sending half of the telemetry channel
///
/// Components hold one of these so they can run with or without a listener.
#[derive(Debug, Clone, Default)]
pub struct TelemetrySink {
    tx: Option<mpsc::UnboundedSender<TelemetryEvent>>,
}

impl TelemetrySink {
    pub fn new(tx: mpsc::UnboundedSender<TelemetryEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn emit(&self, event: TelemetryEvent) {
        if let Some(tx) = &self.tx {
            // Receiver gone means nobody is rendering progress any more
            let _ = tx.send(event);
        }
    }
}

/// Statistics aggregated from telemetry events
#[derive(Debug, Default, Clone)]
pub struct ProgressStats {
    pub uploads_started: usize,
    pub uploads_completed: usize,
    pub upload_polls: usize,
    pub run_polls: usize,
    pub run_status: Option<String>,
    pub artifacts_total: usize,
    pub artifacts_downloaded: usize,
    pub bytes_downloaded: u64,
}

impl ProgressStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update stats with a telemetry event
    pub fn update(&mut self, event: &TelemetryEvent) {
        match event {
            TelemetryEvent::UploadStarted { .. } => {
                self.uploads_started += 1;
            }
            TelemetryEvent::UploadStatusChanged { .. } => {
                self.upload_polls += 1;
            }
            TelemetryEvent::UploadCompleted { .. } => {
                self.uploads_completed += 1;
            }
            TelemetryEvent::RunStatusChanged { status } => {
                self.run_polls += 1;
                self.run_status = Some(status.clone());
            }
            TelemetryEvent::ArtifactsDiscovered { count } => {
                self.artifacts_total += count;
            }
            TelemetryEvent::ArtifactDownloaded { bytes } => {
                self.artifacts_downloaded += 1;
                self.bytes_downloaded += bytes;
            }
        }
    }
}
