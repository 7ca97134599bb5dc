use std::ffi::OsStr;
use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::process::Command;

/// A described external command.
#[derive(Debug)]
pub(crate) struct Task {
    description: String,
    pub(crate) cmd: Command,
}

impl Task {
    pub(crate) fn new(description: impl AsRef<str>, exe: impl AsRef<OsStr>) -> Self {
        let description = description.as_ref().to_string();
        let mut cmd = Command::new(exe);
        // Default to noninteractive
        cmd.stdin(Stdio::null());
        Self { description, cmd }
    }

    pub(crate) fn args<S: AsRef<OsStr>>(mut self, args: impl IntoIterator<Item = S>) -> Self {
        self.cmd.args(args);
        self
    }

    /// Run the command, returning an error if it could not be spawned or
    /// does not exit successfully.
    pub(crate) async fn run(self) -> Result<()> {
        let description = self.description;
        let mut cmd = self.cmd;
        tracing::debug!("exec: {cmd:?}");
        let st = cmd
            .status()
            .await
            .with_context(|| format!("Spawning {description} failed"))?;
        if !st.success() {
            anyhow::bail!("Task {description} failed: {st:?}");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run() -> Result<()> {
        Task::new("Testing true", "true").run().await?;
        let e = Task::new("Testing false", "false").run().await.unwrap_err();
        assert!(format!("{e:#}").starts_with("Task Testing false failed"));
        let e = Task::new("Testing missing", "/nonexistent/reboot-agent-test")
            .args(["-r"])
            .run()
            .await
            .unwrap_err();
        assert!(format!("{e:#}").starts_with("Spawning Testing missing failed"));
        Ok(())
    }
}
