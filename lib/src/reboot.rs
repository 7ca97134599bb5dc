//! Handling of system restarts/reboot

use std::future::Future;
use std::io::Write;

use anyhow::Result;
use fn_error_context::context;

use crate::config::RebootConfiguration;
use crate::task::Task;

/// Something which can restart the host.
pub trait Rebooter: std::fmt::Debug + Send + Sync {
    /// Launch the reboot. Resolves once the request has been handed off
    /// to the system; the host going down is not awaited.
    fn reboot(&self) -> impl Future<Output = Result<()>> + Send;
}

/// Reboots by running an external command, by default
/// `sudo /sbin/shutdown -r`.
#[derive(Debug, Clone)]
pub struct CommandRebooter {
    argv: Vec<String>,
}

impl CommandRebooter {
    /// Use the command from the given configuration.
    pub fn new(config: &RebootConfiguration) -> Result<Self> {
        let argv = config.command();
        anyhow::ensure!(!argv.is_empty(), "Empty reboot command");
        Ok(Self { argv })
    }
}

impl Rebooter for CommandRebooter {
    async fn reboot(&self) -> Result<()> {
        run_reboot_command(&self.argv).await
    }
}

#[context("Initiating reboot")]
async fn run_reboot_command(argv: &[String]) -> Result<()> {
    // Flush output streams
    let _ = std::io::stdout().flush();
    let _ = std::io::stderr().flush();
    let (exe, args) = argv
        .split_first()
        .ok_or_else(|| anyhow::anyhow!("Empty reboot command"))?;
    Task::new("Rebooting system", exe).args(args).run().await?;
    tracing::debug!("Initiated reboot");
    Ok(())
}
