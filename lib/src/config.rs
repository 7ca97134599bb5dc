//! # Configuration for the reboot agent
//!
//! TOML drop-in fragments found in `reboot-agent/` under the usual systemd
//! bases (e.g. /etc/reboot-agent/10-custom.toml) are merged in order, later
//! fragments overriding earlier ones.

use std::path::Path;

use anyhow::{Context, Result};
use fn_error_context::context;
use serde::{Deserialize, Serialize};

const SYSTEMD_CONVENTIONAL_BASES: &[&str] = &["/usr/lib", "/usr/local/lib", "/etc", "/run"];
const CONFIG_DIR: &str = "reboot-agent";

/// The command used when none is configured.
pub const DEFAULT_REBOOT_COMMAND: &[&str] = &["sudo", "/sbin/shutdown", "-r"];

/// The toplevel config entry.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub(crate) struct ConfigurationToplevel {
    pub(crate) reboot: Option<RebootConfiguration>,
}

/// The serialized [reboot] section
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename = "reboot", rename_all = "kebab-case")]
pub struct RebootConfiguration {
    /// The reboot command and its arguments.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<String>>,
}

impl RebootConfiguration {
    /// Apply any values in other, overriding any existing values in `self`.
    fn merge(&mut self, other: Self) {
        fn mergeopt<T>(s: &mut Option<T>, o: Option<T>) {
            if let Some(o) = o {
                *s = Some(o);
            }
        }
        mergeopt(&mut self.command, other.command);
    }

    /// The effective reboot command.
    pub fn command(&self) -> Vec<String> {
        match self.command.as_ref() {
            Some(c) => c.clone(),
            None => DEFAULT_REBOOT_COMMAND
                .iter()
                .map(|&s| s.to_owned())
                .collect(),
        }
    }

    /// Fill in defaults, e.g. for display.
    pub fn resolved(&self) -> Self {
        Self {
            command: Some(self.command()),
        }
    }

    fn validate(self) -> Result<Self> {
        if let Some(c) = self.command.as_ref() {
            anyhow::ensure!(!c.is_empty(), "reboot.command must not be empty");
        }
        Ok(self)
    }

    /// Serialize as a complete configuration file.
    pub fn to_toml(&self) -> Result<String> {
        let toplevel = ConfigurationToplevel {
            reboot: Some(self.clone()),
        };
        Ok(toml::to_string(&toplevel)?)
    }
}

fn parse_fragment(buf: &str, path: &Path) -> Result<ConfigurationToplevel> {
    let mut unused = std::collections::BTreeSet::new();
    let de = toml::Deserializer::new(buf);
    let c: ConfigurationToplevel = serde_ignored::deserialize(de, |path| {
        unused.insert(path.to_string());
    })
    .with_context(|| format!("Parsing {path:?}"))?;
    for key in unused {
        tracing::warn!("{path:?}: Unknown key {key}");
    }
    Ok(c)
}

/// Load a single configuration file.
#[context("Loading configuration from {path:?}")]
pub fn load_config_file(path: &Path) -> Result<RebootConfiguration> {
    let buf = std::fs::read_to_string(path)?;
    parse_fragment(&buf, path)?
        .reboot
        .unwrap_or_default()
        .validate()
}

/// Load the configuration, merging all found configuration fragments.
/// Built-in defaults apply when there are none.
#[context("Loading configuration")]
pub fn load_config() -> Result<RebootConfiguration> {
    let fragments = liboverdrop::scan(SYSTEMD_CONVENTIONAL_BASES, CONFIG_DIR, &["toml"], true);
    let mut config = RebootConfiguration::default();
    for (_name, path) in fragments {
        let buf = std::fs::read_to_string(&path)?;
        if let Some(reboot) = parse_fragment(&buf, &path)?.reboot {
            tracing::debug!("Merging reboot config: {reboot:?}");
            config.merge(reboot);
        }
    }
    config.validate()
}
