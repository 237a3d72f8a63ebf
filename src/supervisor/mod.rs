//! Background worker supervision.
//!
//! The supervisor launches the worker as a detached child, prints a single
//! confirmation line, then idles forever so the invoking session stays
//! occupied. The idle loop only ends when its shutdown future resolves. A
//! worker that exits is logged and recorded in the heartbeat file but never
//! restarted.

mod worker;

pub use worker::{launch, open_log_file, WorkerHandle, WorkerStatus};

use std::future::Future;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use crate::config::{AppConfig, SupervisorConfig, WorkerConfig};
use crate::heartbeat::Heartbeat;

/// Supervisor startup error
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("Failed to open worker log file {}: {source}", path.display())]
    LogFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to start worker `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write confirmation: {0}")]
    Acknowledge(#[source] io::Error),
}

pub struct Supervisor {
    worker: WorkerConfig,
    timing: SupervisorConfig,
}

impl Supervisor {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            worker: config.worker.clone(),
            timing: config.supervisor.clone(),
        }
    }

    /// Launch, acknowledge on stdout, then idle until `shutdown` resolves.
    ///
    /// The worker is left running when this returns.
    pub async fn run<F>(&self, shutdown: F) -> Result<(), SupervisorError>
    where
        F: Future<Output = ()>,
    {
        let worker = self.launch()?;

        let mut stdout = io::stdout();
        self.acknowledge(&worker, &mut stdout)
            .map_err(SupervisorError::Acknowledge)?;

        let worker = self.idle(worker, shutdown).await;
        tracing::info!(pid = worker.pid(), "Supervisor stopping, worker left running");

        Ok(())
    }

    pub fn launch(&self) -> Result<WorkerHandle, SupervisorError> {
        launch(&self.worker)
    }

    /// Write the one-line confirmation telling the operator where logs go
    pub fn acknowledge<W: Write>(&self, worker: &WorkerHandle, out: &mut W) -> io::Result<()> {
        writeln!(
            out,
            "Bot started in background (pid {}). Check {} for logs.",
            worker.pid(),
            worker.log_file().display()
        )?;
        out.flush()
    }

    /// Idle until `shutdown` resolves. Never returns on its own.
    ///
    /// Worker exit is observed once and recorded; it does not end the loop.
    /// On shutdown the heartbeat is marked `detached`, since the worker keeps
    /// running with nobody watching it.
    pub async fn idle<F>(&self, mut worker: WorkerHandle, shutdown: F) -> WorkerHandle
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let tick = self.tick();
        let mut heartbeat = Heartbeat::running(worker.pid(), worker.started_at());
        self.record(&heartbeat);

        tracing::info!(
            pid = worker.pid(),
            tick_secs = tick.as_secs(),
            "Supervisor idling"
        );

        let mut exited = false;
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Shutdown signal received");
                    heartbeat.mark_detached();
                    self.record(&heartbeat);
                    break;
                }
                result = worker.wait(), if !exited => {
                    exited = true;
                    match result {
                        Ok(status) => {
                            tracing::warn!(
                                pid = worker.pid(),
                                %status,
                                command = %worker.command_line(),
                                log_file = %worker.log_file().display(),
                                "Worker exited, it will not be restarted"
                            );
                            heartbeat.mark_exited(status.code());
                            self.record(&heartbeat);
                        }
                        Err(e) => {
                            tracing::error!(pid = worker.pid(), error = %e, "Lost track of worker");
                        }
                    }
                }
                _ = tokio::time::sleep(tick) => {
                    heartbeat.touch();
                    self.record(&heartbeat);
                }
            }
        }

        worker
    }

    /// Idle tick: the heartbeat interval when heartbeats are on, else the long idle interval
    fn tick(&self) -> Duration {
        let secs = if self.worker.heartbeat_file.is_some() {
            self.timing.heartbeat_interval_secs
        } else {
            self.timing.idle_interval_secs
        };
        Duration::from_secs(secs)
    }

    fn record(&self, heartbeat: &Heartbeat) {
        let Some(path) = &self.worker.heartbeat_file else {
            return;
        };
        if let Err(e) = heartbeat.write(path) {
            tracing::warn!(path = %path.display(), error = %e, "Failed to write heartbeat");
        }
    }
}
