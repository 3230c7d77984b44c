//! Cleanup after a cancelled or failed invocation
//!
//! Uploads created by an invocation are named `{invocation id}_{file name}`.
//! Those that never finished processing are deleted, and the local artifact
//! folder is removed.

use anyhow::{Context, Result};
use futures::TryStreamExt;
use futures::future::try_join_all;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::paging::pages;
use crate::service::{DeviceFarm, Upload, UploadCategory, UploadStatus};
use crate::state::RecoverableState;

/// Upload left behind by the given invocation
fn is_abandoned(upload: &Upload, invocation_id: &str) -> bool {
    upload.category == Some(UploadCategory::Private)
        && upload.name.starts_with(&format!("{}_", invocation_id))
        && upload.status != UploadStatus::Succeeded
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanupSummary {
    pub deleted_uploads: Vec<String>,
    pub removed_folder: Option<String>,
}

pub struct Cleaner {
    service: Arc<dyn DeviceFarm>,
}

impl Cleaner {
    pub fn new(service: Arc<dyn DeviceFarm>) -> Self {
        Self { service }
    }

    pub async fn cleanup(&self, state: &RecoverableState) -> Result<CleanupSummary> {
        let mut summary = CleanupSummary::default();

        match state.project_arn.as_deref() {
            Some(project_arn) => {
                summary.deleted_uploads = self
                    .delete_abandoned_uploads(project_arn, &state.invocation_id)
                    .await?;
            }
            None => info!("No project recorded, skipping upload cleanup"),
        }

        if let Some(folder) = state.artifact_folder.as_deref() {
            if tokio::fs::try_exists(folder).await.unwrap_or(false) {
                tokio::fs::remove_dir_all(Path::new(folder))
                    .await
                    .with_context(|| format!("Failed to remove {}", folder))?;
                info!("Removed artifact folder {}", folder);
                summary.removed_folder = Some(folder.to_string());
            }
        }

        Ok(summary)
    }

    async fn delete_abandoned_uploads(
        &self,
        project_arn: &str,
        invocation_id: &str,
    ) -> Result<Vec<String>> {
        let service = self.service.as_ref();
        let mut uploads = pages(move |token| service.list_uploads(project_arn, None, token));

        let mut deleted = Vec::new();
        while let Some(page) = uploads.try_next().await? {
            let abandoned: Vec<Upload> = page
                .into_iter()
                .filter(|upload| is_abandoned(upload, invocation_id))
                .collect();

            try_join_all(abandoned.iter().map(|upload| async move {
                info!("Deleting {} upload: {}", upload.status, upload.arn);
                service
                    .delete_upload(&upload.arn)
                    .await
                    .with_context(|| format!("Failed to delete upload {}", upload.arn))
            }))
            .await?;

            deleted.extend(abandoned.into_iter().map(|upload| upload.arn));
        }

        Ok(deleted)
    }
}
