//! Integration tests for reboot-agent-lib.

use std::io::Write;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use reboot_agent_lib::config::RebootConfiguration;
use reboot_agent_lib::jsonl::{Event, JsonLinesJob};
use reboot_agent_lib::reboot::CommandRebooter;
use reboot_agent_lib::{ErrorCode, Handled, Job, JobDocument, RebootJobHandler, Report, Step};
use tokio::runtime::Handle;

#[derive(Debug, Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }
    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl SharedBuf {
    fn events(&self) -> Vec<Event> {
        let buf = self.0.lock().unwrap();
        std::str::from_utf8(&buf)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }
}

fn handler(command: &[&str]) -> Result<RebootJobHandler<CommandRebooter>> {
    let config = RebootConfiguration {
        command: Some(command.iter().map(|&s| s.to_owned()).collect()),
    };
    Ok(RebootJobHandler::new(
        CommandRebooter::new(&config)?,
        Handle::current(),
    ))
}

fn job(json: &str) -> (Arc<dyn Job>, SharedBuf) {
    let doc: JobDocument = serde_json::from_str(json).unwrap();
    let out = SharedBuf::default();
    (Arc::new(JsonLinesJob::new(doc, out.clone())), out)
}

const QUEUED: &str = r#"{"jobId": "j1", "operation": "reboot",
    "status": {"status": "QUEUED", "statusDetails": {}}}"#;

fn started() -> Event {
    Event::InProgress {
        job_id: "j1".into(),
        report: Report::progress(Step::Started),
    }
}

async fn reboot_task(h: Handled) -> Result<()> {
    match h {
        Handled::Rebooting(t) => t.await?,
        o => panic!("Expected reboot, not {o:?}"),
    }
}

#[tokio::test]
async fn test_reboot_launched() -> Result<()> {
    let h = handler(&["true", "-r"])?;
    let (job, out) = job(QUEUED);
    reboot_task(h.handle(None, Some(job))).await?;
    assert_eq!(out.events(), [started()]);
    Ok(())
}

#[tokio::test]
async fn test_reboot_command_fails() -> Result<()> {
    for command in [&["false"][..], &["/nonexistent/shutdown", "-r"]] {
        let h = handler(command)?;
        let (job, out) = job(QUEUED);
        assert!(reboot_task(h.handle(None, Some(job))).await.is_err());
        let events = out.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], started());
        let Event::Failed { job_id, report } = &events[1] else {
            panic!("Expected failure, not {:?}", events[1]);
        };
        assert_eq!(job_id, "j1");
        assert_eq!(report.error_code, Some(ErrorCode::SystemCallFailed));
        let error = report.error.as_deref().unwrap();
        assert!(error.starts_with("Initiating reboot: "), "{error}");
    }
    Ok(())
}

#[tokio::test]
async fn test_full_lifecycle() -> Result<()> {
    let h = handler(&["true"])?;
    let (j, out) = job(QUEUED);
    reboot_task(h.handle(None, Some(j))).await?;
    assert_eq!(out.events(), [started()]);

    // After the reboot, the dispatcher redelivers the job with our step
    let (j, out) = job(
        r#"{"jobId": "j1", "operation": "reboot",
            "status": {"status": "IN_PROGRESS", "statusDetails": {"step": "started"}}}"#,
    );
    assert!(matches!(h.handle(None, Some(j)), Handled::Succeeded));
    assert_eq!(
        out.events(),
        [Event::Succeeded {
            job_id: "j1".into(),
            report: Report::success(),
        }]
    );

    // Anything after that is unexpected
    let (j, out) = job(
        r#"{"jobId": "j1", "operation": "reboot",
            "status": {"status": "IN_PROGRESS", "statusDetails": {"step": "executed"}}}"#,
    );
    assert!(matches!(
        h.handle(None, Some(j)),
        Handled::Failed(ErrorCode::Unexpected)
    ));
    assert_eq!(
        out.events(),
        [Event::Failed {
            job_id: "j1".into(),
            report: Report::failure(ErrorCode::Unexpected, "job in unexpected state"),
        }]
    );
    Ok(())
}
