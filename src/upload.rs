//! Upload coordination
//!
//! Each optional file reference in the run settings ends up as an upload
//! identifier: identifiers pass through, existing local files are uploaded and
//! polled until processed, and anything else is looked up by name among the
//! project's existing uploads.

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::error::RunnerError;
use crate::resolve::IdentifierResolver;
use crate::service::{DeviceFarm, Transfer, UploadStatus};
use crate::settings::is_arn;
use crate::telemetry::{TelemetryEvent, TelemetrySink};

/// Role of a file in the run, as declared by the settings field it came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    App,
    TestPackage,
    TestSpec,
    ExternalData,
}

impl FileKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FileKind::App => "APP",
            FileKind::TestPackage => "TEST_PACKAGE",
            FileKind::TestSpec => "TEST_SPEC",
            FileKind::ExternalData => "EXTERNAL_DATA",
        }
    }
}

/// Upload type the service expects for a file
///
/// Apps are typed by extension; other files are prefixed with the test
/// family (e.g. `APPIUM_NODE_TEST_PACKAGE`) when one is given.
pub fn effective_upload_type(kind: FileKind, test_family: Option<&str>, path: &str) -> String {
    match kind {
        FileKind::App => {
            let extension = Path::new(path)
                .extension()
                .and_then(|e| e.to_str())
                .map(str::to_lowercase);
            match extension.as_deref() {
                Some("ipa") => "IOS_APP".to_string(),
                Some("apk") => "ANDROID_APP".to_string(),
                _ => "WEB_APP".to_string(),
            }
        }
        _ => match test_family.filter(|f| !f.is_empty()) {
            Some(family) => format!("{}_{}", family, kind.as_str()),
            None => kind.as_str().to_string(),
        },
    }
}

pub struct UploadCoordinator {
    service: Arc<dyn DeviceFarm>,
    transfer: Arc<dyn Transfer>,
    resolver: IdentifierResolver,
    invocation_id: String,
    poll_interval: Duration,
    telemetry: TelemetrySink,
}

impl UploadCoordinator {
    pub fn new(
        service: Arc<dyn DeviceFarm>,
        transfer: Arc<dyn Transfer>,
        invocation_id: impl Into<String>,
        poll_interval: Duration,
        telemetry: TelemetrySink,
    ) -> Self {
        Self {
            resolver: IdentifierResolver::new(Arc::clone(&service)),
            service,
            transfer,
            invocation_id: invocation_id.into(),
            poll_interval,
            telemetry,
        }
    }

    /// Turn a file reference into an upload identifier
    ///
    /// Returns `None` when no reference was given.
    pub async fn upload_file(
        &self,
        project_arn: &str,
        reference: Option<&str>,
        kind: FileKind,
        test_family: Option<&str>,
    ) -> Result<Option<String>> {
        let Some(reference) = reference.filter(|r| !r.is_empty()) else {
            return Ok(None);
        };
        if is_arn(reference) {
            return Ok(Some(reference.to_string()));
        }

        let upload_type = effective_upload_type(kind, test_family, reference);

        let exists = tokio::fs::try_exists(reference).await.unwrap_or(false);
        if !exists {
            info!(
                "Upload file: {} was not found locally, checking Device Farm for an existing upload...",
                reference
            );
            let arn = self
                .resolver
                .resolve_upload(project_arn, Some(&upload_type), reference)
                .await?;
            return Ok(Some(arn));
        }

        let arn = self
            .upload_local_file(project_arn, Path::new(reference), &upload_type)
            .await?;
        Ok(Some(arn))
    }

    /// Create the upload, PUT the bytes, then poll until processed
    async fn upload_local_file(
        &self,
        project_arn: &str,
        path: &Path,
        upload_type: &str,
    ) -> Result<String> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let name = format!("{}_{}", self.invocation_id, file_name);

        let created = self
            .service
            .create_upload(project_arn, &name, upload_type)
            .await?;
        let url = created
            .url
            .as_deref()
            .ok_or(RunnerError::malformed("CreateUpload", "upload.url"))?;

        info!("Upload of {} starting...", created.name);
        self.telemetry.emit(TelemetryEvent::UploadStarted {
            name: created.name.clone(),
        });

        if let Err(e) = self.transfer.put(url, path).await {
            error!("Upload of {} failed.", created.name);
            return Err(RunnerError::transfer(url, e));
        }
        info!("Upload of {} complete.", created.name);

        let upload = loop {
            let upload = self.service.get_upload(&created.arn).await?;
            if upload.status.is_terminal() {
                break upload;
            }
            info!("{} upload status is {}...", created.name, upload.status);
            self.telemetry.emit(TelemetryEvent::UploadStatusChanged {
                name: created.name.clone(),
                status: upload.status.to_string(),
            });
            tokio::time::sleep(self.poll_interval).await;
        };

        info!("{} upload status is {}.", created.name, upload.status);
        self.telemetry.emit(TelemetryEvent::UploadCompleted {
            name: created.name.clone(),
            status: upload.status.to_string(),
        });

        if upload.status == UploadStatus::Failed {
            return Err(RunnerError::UploadFailed {
                status: upload.status.to_string(),
                metadata: upload.metadata,
            }
            .into());
        }

        Ok(created.arn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeDeviceFarm, FakeTransfer, PROJECT_ARN, upload};
    use std::collections::HashMap;
    use tempfile::TempDir;

    const UPLOAD_ARN: &str = "arn:aws:devicefarm:us-west-2:account-id:upload:project-id/arn-1";

    fn coordinator(
        fake: &Arc<FakeDeviceFarm>,
        transfer: &Arc<FakeTransfer>,
    ) -> UploadCoordinator {
        UploadCoordinator::new(
            Arc::clone(fake) as Arc<dyn DeviceFarm>,
            Arc::clone(transfer) as Arc<dyn Transfer>,
            "42",
            Duration::from_millis(500),
            TelemetrySink::disabled(),
        )
    }

    fn write_file(dir: &TempDir, name: &str, contents: &[u8]) -> String {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path.to_str().unwrap().to_string()
    }

    fn fake_with_upload(name: &str) -> FakeDeviceFarm {
        FakeDeviceFarm {
            upload_arns: HashMap::from([(name.to_string(), UPLOAD_ARN.to_string())]),
            ..Default::default()
        }
    }

    #[test]
    fn test_effective_upload_type() {
        assert_eq!(effective_upload_type(FileKind::App, None, "a/b/App.IPA"), "IOS_APP");
        assert_eq!(
            effective_upload_type(FileKind::App, Some("APPIUM_NODE"), "app.apk"),
            "ANDROID_APP"
        );
        assert_eq!(effective_upload_type(FileKind::App, None, "site.zip"), "WEB_APP");
        assert_eq!(effective_upload_type(FileKind::App, None, "noext"), "WEB_APP");
        assert_eq!(
            effective_upload_type(FileKind::TestPackage, Some("APPIUM_NODE"), "tests.zip"),
            "APPIUM_NODE_TEST_PACKAGE"
        );
        assert_eq!(
            effective_upload_type(FileKind::TestSpec, Some("APPIUM_NODE"), "spec.yml"),
            "APPIUM_NODE_TEST_SPEC"
        );
        assert_eq!(
            effective_upload_type(FileKind::ExternalData, None, "data.zip"),
            "EXTERNAL_DATA"
        );
    }

    #[tokio::test]
    async fn test_absent_and_empty_references() {
        let fake = Arc::new(FakeDeviceFarm::default());
        let transfer = Arc::new(FakeTransfer::default());
        let coordinator = coordinator(&fake, &transfer);

        for reference in [None, Some("")] {
            let result = coordinator
                .upload_file(PROJECT_ARN, reference, FileKind::App, None)
                .await
                .unwrap();
            assert_eq!(result, None);
        }
        assert!(fake.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_arn_reference_is_returned_unchanged() {
        let fake = Arc::new(FakeDeviceFarm::default());
        let transfer = Arc::new(FakeTransfer::default());

        let result = coordinator(&fake, &transfer)
            .upload_file(PROJECT_ARN, Some(UPLOAD_ARN), FileKind::TestSpec, Some("APPIUM_NODE"))
            .await
            .unwrap();

        assert_eq!(result.as_deref(), Some(UPLOAD_ARN));
        assert!(fake.calls.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_upload_polls_until_succeeded() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "app-debug.apk", b"apk-bytes");

        let fake = Arc::new(fake_with_upload("42_app-debug.apk"));
        fake.script_upload(
            UPLOAD_ARN,
            vec![
                UploadStatus::Initialized,
                UploadStatus::Processing,
                UploadStatus::Succeeded,
            ],
        );
        let transfer = Arc::new(FakeTransfer::default());

        let result = coordinator(&fake, &transfer)
            .upload_file(PROJECT_ARN, Some(&path), FileKind::App, None)
            .await
            .unwrap();

        assert_eq!(result.as_deref(), Some(UPLOAD_ARN));
        assert_eq!(fake.count("GetUpload"), 3);
        assert_eq!(
            fake.created.lock().unwrap().as_slice(),
            &[("42_app-debug.apk".to_string(), "ANDROID_APP".to_string())]
        );
        let puts = transfer.puts.lock().unwrap();
        assert_eq!(puts.len(), 1);
        assert_eq!(puts[0].0, "https://uploads.example.com/42_app-debug.apk");
        assert_eq!(puts[0].1, b"apk-bytes");
    }

    #[tokio::test(start_paused = true)]
    async fn test_upload_waits_one_interval_between_polls() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "tests.zip", b"zip");

        let fake = Arc::new(fake_with_upload("42_tests.zip"));
        fake.script_upload(
            UPLOAD_ARN,
            vec![UploadStatus::Processing, UploadStatus::Succeeded],
        );
        let transfer = Arc::new(FakeTransfer::default());

        let start = tokio::time::Instant::now();
        coordinator(&fake, &transfer)
            .upload_file(PROJECT_ARN, Some(&path), FileKind::TestPackage, Some("APPIUM_NODE"))
            .await
            .unwrap();

        assert_eq!(start.elapsed(), Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_upload_reports_status_and_metadata() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "app.ipa", b"ipa");

        let fake = Arc::new(fake_with_upload("42_app.ipa"));
        fake.script_upload(UPLOAD_ARN, vec![UploadStatus::Processing, UploadStatus::Failed]);
        let transfer = Arc::new(FakeTransfer::default());

        let err = coordinator(&fake, &transfer)
            .upload_file(PROJECT_ARN, Some(&path), FileKind::App, None)
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Upload failed: FAILED undefined");
        assert_eq!(fake.created.lock().unwrap()[0].1, "IOS_APP");
    }

    #[tokio::test]
    async fn test_transfer_failure_skips_polling() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "app.apk", b"apk");

        let fake = Arc::new(fake_with_upload("42_app.apk"));
        let transfer = Arc::new(FakeTransfer {
            put_error: Some("fake error".to_string()),
            ..Default::default()
        });

        let err = coordinator(&fake, &transfer)
            .upload_file(PROJECT_ARN, Some(&path), FileKind::App, None)
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "fake error");
        assert!(matches!(
            err.downcast_ref::<RunnerError>(),
            Some(RunnerError::Transfer { .. })
        ));
        assert_eq!(fake.count("GetUpload"), 0);
    }

    #[tokio::test]
    async fn test_missing_local_file_falls_back_to_name_lookup() {
        let mut fake = FakeDeviceFarm::default();
        fake.uploads.insert(
            "IOS_APP".to_string(),
            vec![
                vec![upload("arn:other", "other.ipa", UploadStatus::Succeeded)],
                vec![upload("arn:existing", "missing/app.ipa", UploadStatus::Succeeded)],
            ],
        );
        let fake = Arc::new(fake);
        let transfer = Arc::new(FakeTransfer::default());

        let result = coordinator(&fake, &transfer)
            .upload_file(PROJECT_ARN, Some("missing/app.ipa"), FileKind::App, None)
            .await
            .unwrap();

        assert_eq!(result.as_deref(), Some("arn:existing"));
        assert_eq!(fake.count("CreateUpload"), 0);
    }

    #[tokio::test]
    async fn test_missing_local_file_without_remote_match() {
        let fake = Arc::new(FakeDeviceFarm::default());
        let transfer = Arc::new(FakeTransfer::default());

        let err = coordinator(&fake, &transfer)
            .upload_file(PROJECT_ARN, Some("aws-devicefarm-sample-app.app"), FileKind::App, None)
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "No Upload with name \"aws-devicefarm-sample-app.app\" was found."
        );
        assert_eq!(fake.count("ListUploads:WEB_APP"), 1);
    }
}
