//! Run settings document
//!
//! The JSON shape follows the ScheduleRun request: every `*Arn` field may hold
//! either a canonical identifier or something to resolve (a name, or for
//! upload fields a local path). The pipeline rewrites the fields in place as
//! they are resolved.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::ARN_PREFIX;

/// True when the value is already a canonical identifier
pub fn is_arn(value: &str) -> bool {
    value.starts_with(ARN_PREFIX)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub project_arn: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_arn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_pool_arn: Option<String>,
    pub test: TestSettings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration: Option<RunConfiguration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_configuration: Option<ExecutionSettings>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSettings {
    /// Test framework family, e.g. `APPIUM_NODE` or `INSTRUMENTATION`
    #[serde(rename = "type")]
    pub test_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_package_arn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_spec_arn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunConfiguration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_data_package_arn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_profile_arn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vpce_configuration_arns: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auxiliary_apps: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing_method: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_timeout_minutes: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accounts_cleanup: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_packages_cleanup: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_capture: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_app_resign: Option<bool>,
}

impl RunSettings {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse run settings")
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read run settings from {}", path.display()))?;
        Self::from_json(&contents)
    }

    /// Name used in log lines; the service names unnamed runs after the app
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Unnamed")
    }

    pub fn network_profile(&self) -> Option<&str> {
        self.configuration
            .as_ref()
            .and_then(|c| c.network_profile_arn.as_deref())
            .filter(|v| !v.is_empty())
    }

    pub fn vpce_configurations(&self) -> Option<&[String]> {
        self.configuration
            .as_ref()
            .and_then(|c| c.vpce_configuration_arns.as_deref())
    }

    pub fn extra_data_package(&self) -> Option<&str> {
        self.configuration
            .as_ref()
            .and_then(|c| c.extra_data_package_arn.as_deref())
    }
}
