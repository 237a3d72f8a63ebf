//! Detached worker process launch and typed handle.
//!
//! The worker's stdout and stderr share one log file. On Unix the child gets
//! its own process group so hangup and interrupt signals aimed at the invoking
//! terminal do not reach it, and the handle never kills the child on drop.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use chrono::{DateTime, Utc};
use tokio::process::{Child, Command};

use crate::config::{LogMode, WorkerConfig};

use super::SupervisorError;

/// Observed state of a launched worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerStatus {
    Running,
    Exited(ExitStatus),
}

impl fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerStatus::Running => write!(f, "running"),
            WorkerStatus::Exited(status) => write!(f, "exited ({status})"),
        }
    }
}

/// Handle to a launched worker process.
///
/// Dropping the handle leaves the process running.
#[derive(Debug)]
pub struct WorkerHandle {
    child: Child,
    pid: u32,
    command_line: String,
    log_file: PathBuf,
    started_at: DateTime<Utc>,
}

impl WorkerHandle {
    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn command_line(&self) -> &str {
        &self.command_line
    }

    pub fn log_file(&self) -> &Path {
        &self.log_file
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Non-blocking status query
    pub fn try_status(&mut self) -> io::Result<WorkerStatus> {
        Ok(match self.child.try_wait()? {
            Some(status) => WorkerStatus::Exited(status),
            None => WorkerStatus::Running,
        })
    }

    /// Wait for the worker to exit. Cancel safe.
    pub async fn wait(&mut self) -> io::Result<ExitStatus> {
        self.child.wait().await
    }
}

/// Open the worker log file according to `mode`, creating it if needed
pub fn open_log_file(path: &Path, mode: LogMode) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.create(true);
    match mode {
        LogMode::Truncate => options.write(true).truncate(true),
        LogMode::Append => options.append(true),
    };
    options.open(path)
}

/// Spawn the worker described by `config` as a detached background process
pub fn launch(config: &WorkerConfig) -> Result<WorkerHandle, SupervisorError> {
    let log_err = |source| SupervisorError::LogFile {
        path: config.log_file.clone(),
        source,
    };
    let stdout = open_log_file(&config.log_file, config.log_mode).map_err(log_err)?;
    let stderr = stdout.try_clone().map_err(log_err)?;

    let command_line = config.command_line();

    let mut cmd = Command::new(&config.command);
    cmd.args(&config.args)
        .envs(&config.env)
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::from(stderr))
        .kill_on_drop(false);

    if let Some(dir) = &config.working_dir {
        cmd.current_dir(dir);
    }

    #[cfg(unix)]
    cmd.process_group(0);

    let spawn_err = |source| SupervisorError::Spawn {
        command: command_line.clone(),
        source,
    };
    let child = cmd.spawn().map_err(spawn_err)?;
    let pid = child
        .id()
        .ok_or_else(|| spawn_err(io::Error::other("worker exited before its pid was read")))?;

    tracing::info!(
        pid,
        command = %command_line,
        log_file = %config.log_file.display(),
        "Worker launched"
    );

    Ok(WorkerHandle {
        child,
        pid,
        command_line,
        log_file: config.log_file.clone(),
        started_at: Utc::now(),
    })
}
