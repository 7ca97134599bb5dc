//! The job object handed to us by the dispatcher.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::report::Report;

/// Execution status of a job as tracked by the remote service.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Not yet picked up by the device.
    Queued,
    /// Picked up, and at least one progress report was sent.
    InProgress,
    /// Terminal success.
    Succeeded,
    /// Terminal failure.
    Failed,
    /// Terminal; the device did not report in time.
    TimedOut,
    /// Terminal; the device rejected the job.
    Rejected,
    /// The job was removed.
    Removed,
    /// The job was canceled.
    Canceled,
    /// Any other dispatcher-defined value.
    #[serde(other)]
    Unknown,
}

/// Free-form details the device attaches to its status updates.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StatusDetails {
    /// The last step reported; kept in its raw form since the dispatcher
    /// doesn't validate it.
    #[serde(default)]
    pub step: Option<String>,
}

/// The `status` object of a job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct JobExecutionStatus {
    /// Status as tracked remotely.
    pub status: JobStatus,
    /// Device supplied details.
    #[serde(default)]
    pub status_details: StatusDetails,
}

/// A step value not in the set we write.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown reboot step: {0:?}")]
pub struct UnknownStep(pub String);

/// The sub-stage of a reboot operation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Step {
    /// Nothing has happened yet.
    None,
    /// The reboot command was issued.
    Started,
    /// The device came back up.
    Executed,
}

impl Step {
    /// Parse the raw step from a job's status details. An empty
    /// string is the same as an absent step.
    pub fn parse(raw: Option<&str>) -> std::result::Result<Self, UnknownStep> {
        match raw {
            None | Some("") => Ok(Step::None),
            Some("started") => Ok(Step::Started),
            Some("executed") => Ok(Step::Executed),
            Some(o) => Err(UnknownStep(o.to_owned())),
        }
    }
}

/// A job as delivered by the dispatcher. The handler only reads its
/// status, and reports back through it.
///
/// Reporting is fire-and-forget from the handler's point of view: an
/// error returned here is logged and otherwise dropped.
pub trait Job: std::fmt::Debug + Send + Sync {
    /// Identifier, used for logging.
    fn job_id(&self) -> &str;
    /// Current execution status.
    fn status(&self) -> &JobExecutionStatus;
    /// Send a progress update.
    fn in_progress(&self, report: &Report) -> Result<()>;
    /// Mark the job as succeeded.
    fn succeeded(&self, report: &Report) -> Result<()>;
    /// Mark the job as failed.
    fn failed(&self, report: &Report) -> Result<()>;
}

/// The serialized form of a job event, as read from the local transport.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct JobDocument {
    /// Identifier assigned by the tracking service.
    pub job_id: String,
    /// The operation to route on; see [`crate::report::OPERATION`].
    pub operation: String,
    /// Current execution status.
    pub status: JobExecutionStatus,
}
