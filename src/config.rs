//! Configuration constants for the test runner
//!
//! This module centralizes all tunable parameters and constants used throughout
//! the application.

use std::time::Duration;

// ============================================================================
// Identifiers
// ============================================================================

/// Prefix that distinguishes a canonical resource identifier from a human name
pub const ARN_PREFIX: &str = "arn:";

/// Region used when neither the CLI nor the environment supplies one.
///
/// Device Farm is only offered in us-west-2.
pub const DEFAULT_REGION: &str = "us-west-2";

/// Host suffix of the AWS management console
pub const CONSOLE_DOMAIN: &str = "aws.amazon.com";

// ============================================================================
// Polling Configuration
// ============================================================================

pub const DEFAULT_UPLOAD_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Interval between run status checks
///
/// Runs on physical devices take minutes at best, so polling every 30 seconds
/// keeps API usage low without delaying the result noticeably.
pub const DEFAULT_RUN_POLL_INTERVAL: Duration = Duration::from_secs(30);

// ============================================================================
// Artifact Configuration
// ============================================================================

/// Artifact categories queried after a run completes
pub const ARTIFACT_CATEGORIES: [&str; 3] = ["SCREENSHOT", "FILE", "LOG"];

/// Artifact type selector meaning "every artifact of every category"
pub const ALL_ARTIFACTS: &str = "ALL";

// ============================================================================
// State Configuration
// ============================================================================

pub const DEFAULT_STATE_FILE: &str = ".devicefarm-runner-state.json";
