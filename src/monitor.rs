//! The privileged-helper boundary.
//!
//! The worker never opens the flow log or re-reads configuration behind its
//! own authority; those requests cross this interface. [`DirectMonitor`]
//! performs them in-process for single-process deployments; a privilege-
//! separated helper implements the same trait over its own transport. When
//! `closed()` resolves the helper is gone and the worker exits cleanly.

use crate::config::Config;

use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::future::Future;
use std::path::PathBuf;

pub trait Monitor {
    /// Opens (creating if necessary) the flow log for reading and appending.
    fn open_log(&mut self) -> Result<File>;

    /// Produces a refreshed configuration.
    fn reconfigure(&mut self) -> Result<Config>;

    /// Resolves when the helper has gone away.
    fn closed(&mut self) -> impl Future<Output = ()> + Send + '_;
}

/// In-process stand-in for the privileged helper.
#[derive(Debug)]
pub struct DirectMonitor {
    config_path: PathBuf,
    defines: Vec<(String, String)>,
    log_path: PathBuf,
}

impl DirectMonitor {
    pub fn new(config_path: PathBuf, defines: Vec<(String, String)>, log_path: PathBuf) -> Self {
        DirectMonitor {
            config_path,
            defines,
            log_path,
        }
    }
}

impl Monitor for DirectMonitor {
    fn open_log(&mut self) -> Result<File> {
        OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&self.log_path)
            .with_context(|| format!("opening flow log {}", self.log_path.display()))
    }

    fn reconfigure(&mut self) -> Result<Config> {
        let config = Config::from_file(&self.config_path, &self.defines)?;
        self.log_path = config.logfile.clone();
        Ok(config)
    }

    fn closed(&mut self) -> impl Future<Output = ()> + Send + '_ {
        std::future::pending()
    }
}
