//! A [`Job`] which writes its reports using the json-lines format, for
//! relaying to the tracking service by whatever process supervises us.
//! For more information see <https://jsonlines.org/>.

use std::io::Write;
use std::sync::Mutex;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::job::{Job, JobDocument, JobExecutionStatus};
use crate::report::Report;

/// A single line of output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(
    tag = "type",
    rename_all = "PascalCase",
    rename_all_fields = "camelCase"
)]
pub enum Event {
    /// A progress update.
    InProgress {
        /// The job this is for.
        job_id: String,
        /// The payload.
        report: Report,
    },
    /// The job succeeded.
    Succeeded {
        /// The job this is for.
        job_id: String,
        /// The payload.
        report: Report,
    },
    /// The job failed.
    Failed {
        /// The job this is for.
        job_id: String,
        /// The payload.
        report: Report,
    },
}

/// A job read from a [`JobDocument`], reporting to a writer.
#[derive(Debug)]
pub struct JsonLinesJob<W> {
    job_id: String,
    status: JobExecutionStatus,
    out: Mutex<W>,
}

impl<W: Write> JsonLinesJob<W> {
    /// Wrap `doc`, writing reports to `out`.
    pub fn new(doc: JobDocument, out: W) -> Self {
        Self {
            job_id: doc.job_id,
            status: doc.status,
            out: Mutex::new(out),
        }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn emit(&self, event: Event) -> Result<()> {
        let mut out = self
            .out
            .lock()
            .map_err(|_| anyhow::anyhow!("Report writer lock poisoned"))?;
        serde_json::to_writer(&mut *out, &event)?;
        out.write_all(b"\n")?;
        out.flush()
            .with_context(|| format!("Writing report for {}", self.job_id))
    }
}

impl<W: Write + Send + std::fmt::Debug> Job for JsonLinesJob<W> {
    fn job_id(&self) -> &str {
        &self.job_id
    }

    fn status(&self) -> &JobExecutionStatus {
        &self.status
    }

    fn in_progress(&self, report: &Report) -> Result<()> {
        self.emit(Event::InProgress {
            job_id: self.job_id.clone(),
            report: report.clone(),
        })
    }

    fn succeeded(&self, report: &Report) -> Result<()> {
        self.emit(Event::Succeeded {
            job_id: self.job_id.clone(),
            report: report.clone(),
        })
    }

    fn failed(&self, report: &Report) -> Result<()> {
        self.emit(Event::Failed {
            job_id: self.job_id.clone(),
            report: report.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{JobStatus, Step};
    use crate::report::ErrorCode;

    #[test]
    fn test_emit() -> Result<()> {
        let doc: JobDocument = serde_json::from_str(
            r#"{"jobId": "j1", "operation": "reboot", "status": {"status": "QUEUED"}}"#,
        )?;
        let job = JsonLinesJob::new(doc, Vec::new());
        assert_eq!(job.job_id(), "j1");
        assert_eq!(job.status().status, JobStatus::Queued);
        job.in_progress(&Report::progress(Step::Started))?;
        job.failed(&Report::failure(ErrorCode::SystemCallFailed, "oops"))?;
        let out = String::from_utf8(job.into_inner())?;
        let mut lines = out.lines();
        assert_eq!(
            lines.next().unwrap(),
            r#"{"type":"InProgress","jobId":"j1","report":{"operation":"reboot","step":"started"}}"#
        );
        let ev: Event = serde_json::from_str(lines.next().unwrap())?;
        assert_eq!(
            ev,
            Event::Failed {
                job_id: "j1".into(),
                report: Report::failure(ErrorCode::SystemCallFailed, "oops"),
            }
        );
        assert!(lines.next().is_none());
        Ok(())
    }
}
