use anyhow::Result;
use async_trait::async_trait;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use std::path::Path;
use url::Url;

use super::Transfer;
use crate::error::RunnerError;

/// Transfer implementation over HTTPS pre-signed URLs
#[derive(Clone, Default)]
pub struct HttpTransfer {
    http_client: reqwest::Client,
}

impl HttpTransfer {
    pub fn new() -> Self {
        Self {
            http_client: reqwest::Client::new(),
        }
    }

    fn parse_url(url: &str) -> Result<Url> {
        Url::parse(url).map_err(|e| {
            RunnerError::Transfer {
                url: url.to_string(),
                message: format!("Invalid transfer URL: {}", e),
            }
            .into()
        })
    }
}

#[async_trait]
impl Transfer for HttpTransfer {
    async fn put(&self, url: &str, file: &Path) -> Result<()> {
        let target = Self::parse_url(url)?;

        let read_error = |e: std::io::Error| RunnerError::Transfer {
            url: url.to_string(),
            message: format!("Failed to read {}: {}", file.display(), e),
        };
        let body = tokio::fs::File::open(file).await.map_err(read_error)?;
        let length = body.metadata().await.map_err(read_error)?.len();

        // Pre-signed PUTs reject chunked bodies, so the length is sent up front
        self.http_client
            .put(target)
            .header(CONTENT_TYPE, "application/octet-stream")
            .header(CONTENT_LENGTH, length)
            .body(body)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| RunnerError::Transfer {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        Ok(())
    }

    async fn get(&self, url: &str) -> Result<Vec<u8>> {
        let target = Self::parse_url(url)?;

        let response = self
            .http_client
            .get(target)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| RunnerError::Transfer {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let bytes = response.bytes().await.map_err(|e| RunnerError::Transfer {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        Ok(bytes.to_vec())
    }
}
