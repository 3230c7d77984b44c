use std::fmt;

use thiserror::Error;

/// Kind of remote resource looked up by name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Project,
    DevicePool,
    NetworkProfile,
    VpceConfiguration,
    Upload,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ResourceKind::Project => "Project",
            ResourceKind::DevicePool => "Device Pool",
            ResourceKind::NetworkProfile => "Network Profile",
            ResourceKind::VpceConfiguration => "VPCE Configuration",
            ResourceKind::Upload => "Upload",
        };
        f.write_str(label)
    }
}

/// Failures with a meaning of their own, as opposed to plain transport errors
///
/// These travel inside `anyhow::Error`; use `downcast_ref::<RunnerError>()`
/// to tell them apart.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// Every page was searched and no resource carried the requested name
    #[error("No {kind} with name \"{name}\" was found.")]
    NotFound { kind: ResourceKind, name: String },

    /// Moving bytes to or from a pre-signed URL failed
    #[error("{message}")]
    Transfer { url: String, message: String },

    /// The service finished processing an upload and rejected it
    #[error("Upload failed: {status} {}", metadata.as_deref().unwrap_or("undefined"))]
    UploadFailed {
        status: String,
        metadata: Option<String>,
    },

    /// A response lacked a field the pipeline depends on
    #[error("Malformed {operation} response: missing {field}")]
    MalformedResponse {
        operation: &'static str,
        field: &'static str,
    },
}

impl RunnerError {
    pub fn not_found(kind: ResourceKind, name: impl Into<String>) -> Self {
        RunnerError::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub fn malformed(operation: &'static str, field: &'static str) -> Self {
        RunnerError::MalformedResponse { operation, field }
    }

    /// Wrap a failed transfer, keeping an existing `Transfer` error as is
    pub fn transfer(url: &str, error: anyhow::Error) -> anyhow::Error {
        if matches!(
            error.downcast_ref::<RunnerError>(),
            Some(RunnerError::Transfer { .. })
        ) {
            return error;
        }
        RunnerError::Transfer {
            url: url.to_string(),
            message: error.to_string(),
        }
        .into()
    }
}
