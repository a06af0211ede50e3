//! External base-station lifecycle
//!
//! The controller only needs three operations from the base station it
//! moves around: persist the channel number, start, and stop. Each call
//! blocks until the external side has finished.
//!
//! [`ScriptedBaseStation`] drives an OpenBTS-style install: the channel goes
//! into the `GSM.Radio.C0` row of the SQLite config store, and start/stop
//! are shell scripts that run to completion.

use crate::error::{HandoffError, HandoffResult};
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// Config key holding the C0 ARFCN
pub const CHANNEL_CONFIG_KEY: &str = "GSM.Radio.C0";

/// Default SQLite configuration store
pub const DEFAULT_CONFIG_DB: &str = "/etc/OpenBTS/OpenBTS.db";

/// Default start script
pub const DEFAULT_START_SCRIPT: &str = "~/ddpOpenBTS/runOpenBTS.sh";

/// Default stop script
pub const DEFAULT_STOP_SCRIPT: &str = "~/ddpOpenBTS/quitOpenBTS.sh";

/// Lifecycle control of the external system
pub trait BaseStation: Send {
    /// Persist the channel selection. Negative channels are rejected.
    fn write_channel_config(&mut self, arfcn: i64) -> HandoffResult<()>;

    /// Start the external system, returning once it is up
    fn start(&mut self) -> HandoffResult<()>;

    /// Stop the external system, returning once it has terminated
    fn stop(&mut self) -> HandoffResult<()>;
}

/// Base station controlled through scripts and a SQLite config store
#[derive(Debug, Clone)]
pub struct ScriptedBaseStation {
    db_path: PathBuf,
    start_script: PathBuf,
    stop_script: PathBuf,
}

impl ScriptedBaseStation {
    pub fn new(db_path: impl AsRef<Path>, start_script: &str, stop_script: &str) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
            start_script: expand_home(start_script),
            stop_script: expand_home(stop_script),
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn start_script(&self) -> &Path {
        &self.start_script
    }

    pub fn stop_script(&self) -> &Path {
        &self.stop_script
    }

    /// Channel number currently stored in the config database
    pub fn stored_channel(&self) -> HandoffResult<String> {
        let conn = Connection::open(&self.db_path)?;
        let value = conn.query_row(
            "SELECT valuestring FROM config WHERE keystring = ?1",
            params![CHANNEL_CONFIG_KEY],
            |row| row.get::<_, String>(0),
        )?;
        Ok(value)
    }

    fn run_script(&self, script: &Path) -> HandoffResult<()> {
        debug!("running {}", script.display());
        let status = Command::new(script).status().map_err(|e| {
            HandoffError::ExternalLifecycleFailed(format!("{}: {}", script.display(), e))
        })?;

        if status.success() {
            Ok(())
        } else {
            Err(HandoffError::ExternalLifecycleFailed(format!(
                "{} exited with {}",
                script.display(),
                status
            )))
        }
    }
}

impl Default for ScriptedBaseStation {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIG_DB, DEFAULT_START_SCRIPT, DEFAULT_STOP_SCRIPT)
    }
}

impl BaseStation for ScriptedBaseStation {
    fn write_channel_config(&mut self, arfcn: i64) -> HandoffResult<()> {
        if arfcn < 0 {
            return Err(HandoffError::NegativeChannelNumber {
                arfcn,
                down_hz: None,
            });
        }

        // The stored value is text
        let value = arfcn.to_string();
        let conn = Connection::open(&self.db_path)?;
        let updated = conn.execute(
            "UPDATE config SET valuestring = ?1 WHERE keystring = ?2",
            params![value, CHANNEL_CONFIG_KEY],
        )?;

        if updated == 0 {
            return Err(HandoffError::ConfigWriteFailed(format!(
                "no {} row in {}",
                CHANNEL_CONFIG_KEY,
                self.db_path.display()
            )));
        }

        debug!("{} = {} in {}", CHANNEL_CONFIG_KEY, arfcn, self.db_path.display());
        Ok(())
    }

    fn start(&mut self) -> HandoffResult<()> {
        let script = self.start_script.clone();
        self.run_script(&script)
    }

    fn stop(&mut self) -> HandoffResult<()> {
        let script = self.stop_script.clone();
        self.run_script(&script)
    }
}

/// Expand a leading `~/` to `$HOME`
pub fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), std::env::var_os("HOME")) {
        (Some(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => PathBuf::from(path),
    }
}
