//! The reboot job step handler.
//!
//! A reboot job goes through two invocations: the first reports the
//! `started` step and launches the reboot; after the device comes back,
//! the dispatcher redelivers the job with step `started` and we report
//! it as `executed`.

use std::sync::Arc;

use anyhow::Result;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::instrument::WithSubscriber;

use crate::job::{Job, JobStatus, Step};
use crate::reboot::Rebooter;
use crate::report::{ErrorCode, JobError, Report};

/// The result of a single [`RebootJobHandler::handle`] invocation.
#[derive(Debug)]
pub enum Handled {
    /// Progress was reported and the reboot task was launched. It resolves
    /// to an error if the reboot command failed; that failure has already
    /// been reported to the job.
    Rebooting(JoinHandle<Result<()>>),
    /// The reboot was reported as executed.
    Succeeded,
    /// A failure was reported.
    Failed(ErrorCode),
    /// The event was in error and carried no job to report to.
    Unreportable,
}

#[derive(Debug, Clone, Copy)]
enum ReportKind {
    InProgress,
    Succeeded,
    Failed,
}

/// Send a report, logging rather than propagating transmission errors.
fn send(job: &dyn Job, kind: ReportKind, report: &Report) {
    let r = match kind {
        ReportKind::InProgress => job.in_progress(report),
        ReportKind::Succeeded => job.succeeded(report),
        ReportKind::Failed => job.failed(report),
    };
    if let Err(e) = r {
        tracing::error!(job = job.job_id(), "Failed to send {kind:?} report: {e:#}");
    }
}

fn report_failure(job: &dyn Job, err: &JobError) -> Handled {
    send(job, ReportKind::Failed, &err.report());
    Handled::Failed(err.code())
}

/// Reacts to lifecycle events of jobs for the `reboot` operation.
///
/// The handler keeps no state between invocations.
#[derive(Debug)]
pub struct RebootJobHandler<R> {
    rebooter: Arc<R>,
    runtime: Handle,
    dispatch: tracing::Dispatch,
}

impl<R: Rebooter + 'static> RebootJobHandler<R> {
    /// Create a handler which launches reboots via `rebooter` as tasks on
    /// `runtime`. Logs go to the dispatcher current at construction time.
    pub fn new(rebooter: R, runtime: Handle) -> Self {
        Self {
            rebooter: Arc::new(rebooter),
            runtime,
            dispatch: tracing::dispatcher::get_default(|d| d.clone()),
        }
    }

    /// Log through `dispatch` instead.
    pub fn with_dispatch(mut self, dispatch: tracing::Dispatch) -> Self {
        self.dispatch = dispatch;
        self
    }

    /// Handle a job event. `error` is set when the dispatcher failed to
    /// deliver or parse the event, in which case `job` may be missing.
    ///
    /// Exactly one report is sent to the job, and this never blocks on
    /// the reboot command.
    pub fn handle(&self, error: Option<anyhow::Error>, job: Option<Arc<dyn Job>>) -> Handled {
        tracing::dispatcher::with_default(&self.dispatch, || self.handle_event(error, job))
    }

    fn handle_event(&self, error: Option<anyhow::Error>, job: Option<Arc<dyn Job>>) -> Handled {
        tracing::debug!(job = ?job, "Received new job event");
        let job = match (error, job) {
            (None, Some(job)) => job,
            (Some(e), job) => {
                tracing::error!("Error in job event: {e:#}");
                return match job {
                    Some(job) => report_failure(&*job, &JobError::Unexpected),
                    None => Handled::Unreportable,
                };
            }
            (None, None) => {
                tracing::error!("Received job event without a job");
                return Handled::Unreportable;
            }
        };

        let status = job.status();
        let step = Step::parse(status.status_details.step.as_deref());
        match (status.status, step) {
            (JobStatus::Queued, _) | (_, Ok(Step::None)) => {
                tracing::info!(job = job.job_id(), "Rebooting system");
                send(&*job, ReportKind::InProgress, &Report::progress(Step::Started));
                Handled::Rebooting(self.spawn_reboot(job))
            }
            (_, Ok(Step::Started)) => {
                tracing::info!(job = job.job_id(), "Reporting successful system reboot");
                send(&*job, ReportKind::Succeeded, &Report::success());
                Handled::Succeeded
            }
            (_, Ok(step @ Step::Executed)) => {
                tracing::warn!(job = job.job_id(), ?step, "Unexpected job state, failing");
                report_failure(&*job, &JobError::Unexpected)
            }
            (_, Err(e)) => {
                tracing::warn!(job = job.job_id(), "Unexpected job state, failing: {e}");
                report_failure(&*job, &JobError::Unexpected)
            }
        }
    }

    /// Launch the reboot; any failure is reported to the same `job`.
    fn spawn_reboot(&self, job: Arc<dyn Job>) -> JoinHandle<Result<()>> {
        let rebooter = Arc::clone(&self.rebooter);
        let task = async move {
            match rebooter.reboot().await {
                Ok(()) => Ok(()),
                Err(e) => {
                    tracing::error!(job = job.job_id(), "Reboot failed: {e:#}");
                    let err = JobError::SystemCallFailed(e);
                    send(&*job, ReportKind::Failed, &err.report());
                    Err(err.into())
                }
            }
        };
        self.runtime
            .spawn(task.with_subscriber(self.dispatch.clone()))
    }
}
