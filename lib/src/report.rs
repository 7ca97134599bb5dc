//! Payloads sent back to the job tracking service, and the error
//! taxonomy that maps onto them.

use serde::{Deserialize, Serialize};

use crate::job::Step;

/// The operation identifier used by the dispatcher to route job
/// events to [`crate::handler::RebootJobHandler`].
pub const OPERATION: &str = "reboot";

/// Machine readable failure codes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorCode {
    /// Malformed dispatcher event, or a job state we don't know how to continue.
    #[serde(rename = "ERR_UNEXPECTED")]
    Unexpected,
    /// The reboot command could not be launched.
    #[serde(rename = "ERR_SYSTEM_CALL_FAILED")]
    SystemCallFailed,
}

impl ErrorCode {
    /// The code as sent on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Unexpected => "ERR_UNEXPECTED",
            ErrorCode::SystemCallFailed => "ERR_SYSTEM_CALL_FAILED",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure which terminates the current job invocation.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// The event was undeliverable or the job is in a state we can't act on.
    #[error("job in unexpected state")]
    Unexpected,
    /// Invoking the reboot command failed.
    #[error("{0:#}")]
    SystemCallFailed(anyhow::Error),
}

impl JobError {
    /// The code reported for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            JobError::Unexpected => ErrorCode::Unexpected,
            JobError::SystemCallFailed(_) => ErrorCode::SystemCallFailed,
        }
    }

    /// Render the failure payload.
    pub fn report(&self) -> Report {
        Report::failure(self.code(), self.to_string())
    }
}

/// A single status update for a job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    /// Always [`OPERATION`].
    pub operation: String,
    /// The step reached; set for progress and success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<Step>,
    /// Set for failures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ErrorCode>,
    /// Human readable failure description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Report {
    fn new() -> Self {
        Self {
            operation: OPERATION.to_owned(),
            step: None,
            error_code: None,
            error: None,
        }
    }

    /// Progress towards `step`.
    pub fn progress(step: Step) -> Self {
        Self {
            step: Some(step),
            ..Self::new()
        }
    }

    /// The reboot completed.
    pub fn success() -> Self {
        Self::progress(Step::Executed)
    }

    /// The job failed.
    pub fn failure(code: ErrorCode, error: impl Into<String>) -> Self {
        Self {
            error_code: Some(code),
            error: Some(error.into()),
            ..Self::new()
        }
    }
}
