//! # Reboot agent CLI
//!
//! Command line entrypoint for handling `reboot` job events.

use std::ffi::OsString;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use fn_error_context::context;
use tokio::runtime::Handle;

use crate::config::RebootConfiguration;
use crate::handler::{Handled, RebootJobHandler};
use crate::job::{Job, JobDocument};
use crate::jsonl::JsonLinesJob;
use crate::reboot::CommandRebooter;
use crate::report::OPERATION;

/// Options for locating the configuration
#[derive(Debug, Parser, PartialEq, Eq)]
pub(crate) struct ConfigOpts {
    /// Read configuration from this file only, instead of merging the
    /// fragments in `reboot-agent/` under /usr/lib, /etc and /run.
    #[clap(long)]
    pub(crate) config: Option<PathBuf>,
}

impl ConfigOpts {
    fn load(&self) -> Result<RebootConfiguration> {
        match self.config.as_deref() {
            Some(p) => crate::config::load_config_file(p),
            None => crate::config::load_config(),
        }
    }
}

/// Handle a single job event
#[derive(Debug, Parser, PartialEq, Eq)]
pub(crate) struct HandleJobOpts {
    /// Path to the JSON job document; `-` reads standard input.
    #[clap(long, default_value = "-")]
    pub(crate) job: PathBuf,

    /// The dispatcher failed to deliver the event; this is the error it gave.
    #[clap(long)]
    pub(crate) delivery_error: Option<String>,

    #[clap(flatten)]
    pub(crate) config: ConfigOpts,
}

/// React to lifecycle events of `reboot` jobs.
///
/// Reports are written to standard output as JSON lines, and logs
/// to standard error.
#[derive(Debug, Parser, PartialEq, Eq)]
#[clap(name = "reboot-agent")]
#[clap(rename_all = "kebab-case")]
pub(crate) enum Opt {
    /// Handle one job event, launching a reboot or reporting its completion.
    ///
    /// A job in the `QUEUED` state, or without a step, is moved to the
    /// `started` step and the system is rebooted. When the job is
    /// delivered again with step `started`, it is reported as `executed`.
    HandleJob(HandleJobOpts),
    /// Print the effective configuration.
    PrintConfig(ConfigOpts),
}

#[context("Reading job document")]
fn read_job(path: &Path) -> Result<Vec<u8>> {
    if path.as_os_str() == "-" {
        let mut buf = Vec::new();
        std::io::stdin().lock().read_to_end(&mut buf)?;
        Ok(buf)
    } else {
        Ok(std::fs::read(path)?)
    }
}

/// Handle the job event, writing its reports to `out`.
async fn handle_job<W>(opts: HandleJobOpts, out: W) -> Result<()>
where
    W: Write + Send + std::fmt::Debug + 'static,
{
    let config = opts.config.load()?;
    let rebooter = CommandRebooter::new(&config)?;
    let buf = read_job(&opts.job)?;
    let (error, job) = match serde_json::from_slice::<JobDocument>(&buf) {
        Ok(doc) => {
            anyhow::ensure!(
                doc.operation == OPERATION,
                "Unhandled operation {:?} in job {}",
                doc.operation,
                doc.job_id
            );
            let job: Arc<dyn Job> = Arc::new(JsonLinesJob::new(doc, out));
            (opts.delivery_error.map(anyhow::Error::msg), Some(job))
        }
        Err(e) => (Some(anyhow::Error::new(e).context("Parsing job document")), None),
    };
    let handler = RebootJobHandler::new(rebooter, Handle::current());
    match handler.handle(error, job) {
        Handled::Rebooting(task) => task.await.context("Joining reboot task")?,
        Handled::Succeeded => Ok(()),
        Handled::Failed(code) => anyhow::bail!("Job failed: {code}"),
        Handled::Unreportable => anyhow::bail!("Job event could not be reported"),
    }
}

fn print_config(opts: ConfigOpts) -> Result<()> {
    let config = opts.load()?;
    print!("{}", config.resolved().to_toml()?);
    Ok(())
}

/// Parse the provided arguments and execute.
/// Calls [`clap::Error::exit`] on failure, printing the error message and aborting the program.
pub async fn run_from_iter<I>(args: I) -> Result<()>
where
    I: IntoIterator,
    I::Item: Into<OsString> + Clone,
{
    run_from_opt(Opt::parse_from(args)).await
}

/// Internal (non-generic/monomorphized) primary CLI entrypoint
async fn run_from_opt(opt: Opt) -> Result<()> {
    match opt {
        Opt::HandleJob(opts) => handle_job(opts, std::io::stdout()).await,
        Opt::PrintConfig(opts) => print_config(opts),
    }
}

#[test]
fn test_parse_args() {
    let o = Opt::try_parse_from(["reboot-agent", "handle-job"]).unwrap();
    assert_eq!(
        o,
        Opt::HandleJob(HandleJobOpts {
            job: PathBuf::from("-"),
            delivery_error: None,
            config: ConfigOpts { config: None },
        })
    );
    let o = Opt::try_parse_from([
        "reboot-agent",
        "handle-job",
        "--job",
        "/run/job.json",
        "--delivery-error",
        "timeout",
        "--config",
        "/etc/agent.toml",
    ])
    .unwrap();
    let o = match o {
        Opt::HandleJob(o) => o,
        o => panic!("Expected handle-job opts, not {o:?}"),
    };
    assert_eq!(o.job.to_str(), Some("/run/job.json"));
    assert_eq!(o.delivery_error.as_deref(), Some("timeout"));
    assert_eq!(o.config.config.unwrap().to_str(), Some("/etc/agent.toml"));

    assert!(Opt::try_parse_from(["reboot-agent", "print-config", "--job", "x"]).is_err());
}

#[cfg(test)]
#[derive(Debug, Clone, Default)]
struct SharedBuf(Arc<std::sync::Mutex<Vec<u8>>>);

#[cfg(test)]
impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }
    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
impl SharedBuf {
    fn take(&self) -> String {
        String::from_utf8(std::mem::take(&mut *self.0.lock().unwrap())).unwrap()
    }
}

#[tokio::test]
async fn test_handle_job_started() -> Result<()> {
    let td = tempfile::tempdir()?;
    let job = td.path().join("job.json");
    std::fs::write(
        &job,
        r#"{"jobId": "j1", "operation": "reboot",
            "status": {"status": "IN_PROGRESS", "statusDetails": {"step": "started"}}}"#,
    )?;
    let config = td.path().join("config.toml");
    // Must never be run here
    std::fs::write(&config, "[reboot]\ncommand = [\"false\"]\n")?;
    let out = SharedBuf::default();
    let run = |extra: &[&str]| {
        let mut v = vec!["reboot-agent", "handle-job", "--job"];
        v.push(job.to_str().unwrap());
        v.push("--config");
        v.push(config.to_str().unwrap());
        v.extend_from_slice(extra);
        let opts = match Opt::try_parse_from(v).unwrap() {
            Opt::HandleJob(o) => o,
            o => panic!("Expected handle-job opts, not {o:?}"),
        };
        handle_job(opts, out.clone())
    };
    run(&[]).await?;
    assert_eq!(
        out.take(),
        "{\"type\":\"Succeeded\",\"jobId\":\"j1\",\"report\":{\"operation\":\"reboot\",\"step\":\"executed\"}}\n"
    );

    let e = run(&["--delivery-error", "timeout"]).await.unwrap_err();
    assert_eq!(e.to_string(), "Job failed: ERR_UNEXPECTED");
    assert!(out.take().contains("\"errorCode\":\"ERR_UNEXPECTED\""));

    std::fs::write(
        &job,
        r#"{"jobId": "j1", "operation": "install", "status": {"status": "QUEUED"}}"#,
    )?;
    let e = run(&[]).await.unwrap_err();
    assert!(e.to_string().contains("Unhandled operation"));

    std::fs::write(&job, "{")?;
    let e = run(&[]).await.unwrap_err();
    assert!(e.to_string().contains("could not be reported"));
    assert_eq!(out.take(), "");
    Ok(())
}
