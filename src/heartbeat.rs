//! Worker heartbeat file.
//!
//! The supervisor rewrites this small JSON document on every idle tick with the
//! worker's observed state. The liveness server reads it to answer
//! `/health/worker`. It is the only channel between the two processes.
//!
//! Each write goes to its own uniquely named temp file in the same directory,
//! which is then renamed over the target. A reader never observes a partially
//! written document, and concurrent supervisors sharing one path never collide.

use std::io::{self, Write};
use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Observed worker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Running,
    Exited,
    /// The supervisor stopped and left the worker running unwatched
    Detached,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heartbeat {
    pub pid: u32,
    pub state: WorkerState,
    /// Exit code, if the worker exited normally
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Verdict derived from a heartbeat at a given instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Alive,
    Exited,
    Stale,
    Detached,
}

impl Heartbeat {
    pub fn running(pid: u32, started_at: DateTime<Utc>) -> Self {
        Self {
            pid,
            state: WorkerState::Running,
            exit_code: None,
            started_at,
            updated_at: Utc::now(),
        }
    }

    /// Mark the heartbeat as current
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn mark_exited(&mut self, exit_code: Option<i32>) {
        self.state = WorkerState::Exited;
        self.exit_code = exit_code;
        self.touch();
    }

    /// Record that supervision ended while the worker was still running
    pub fn mark_detached(&mut self) {
        if self.state == WorkerState::Running {
            self.state = WorkerState::Detached;
        }
        self.touch();
    }

    pub fn freshness(&self, now: DateTime<Utc>, stale_after: Duration) -> Freshness {
        match self.state {
            WorkerState::Exited => Freshness::Exited,
            WorkerState::Detached => Freshness::Detached,
            WorkerState::Running if now - self.updated_at > stale_after => Freshness::Stale,
            WorkerState::Running => Freshness::Alive,
        }
    }

    pub fn write(&self, path: &Path) -> io::Result<()> {
        let json = serde_json::to_vec_pretty(self)?;
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&json)?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }

    /// Read the heartbeat. Returns `Ok(None)` when the file does not exist.
    pub fn read(path: &Path) -> io::Result<Option<Self>> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        let heartbeat = serde_json::from_slice(&bytes)?;
        Ok(Some(heartbeat))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_freshness() {
        let now = Utc::now();
        let stale_after = Duration::seconds(90);

        let mut hb = Heartbeat::running(42, now);
        hb.updated_at = now - Duration::seconds(10);
        assert_eq!(hb.freshness(now, stale_after), Freshness::Alive);

        hb.updated_at = now - Duration::seconds(120);
        assert_eq!(hb.freshness(now, stale_after), Freshness::Stale);

        hb.mark_exited(Some(1));
        assert_eq!(hb.freshness(now, stale_after), Freshness::Exited);
        assert_eq!(hb.exit_code, Some(1));
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hb.json");

        assert_eq!(Heartbeat::read(&path).unwrap(), None);

        let hb = Heartbeat::running(7, Utc::now());
        hb.write(&path).unwrap();

        let loaded = Heartbeat::read(&path).unwrap().unwrap();
        assert_eq!(loaded.pid, 7);
        assert_eq!(loaded.state, WorkerState::Running);

        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1, "temp file left behind");
    }

    #[cfg(unix)]
    #[test]
    fn test_concurrent_writers_share_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hb.json");
        Heartbeat::running(1, Utc::now()).write(&path).unwrap();

        std::thread::scope(|s| {
            for pid in [100, 200] {
                let path = &path;
                s.spawn(move || {
                    let mut hb = Heartbeat::running(pid, Utc::now());
                    for _ in 0..500 {
                        hb.touch();
                        hb.write(path).unwrap();
                    }
                });
            }
            s.spawn(|| {
                for _ in 0..2000 {
                    let hb = Heartbeat::read(&path).unwrap().unwrap();
                    assert_eq!(hb.state, WorkerState::Running);
                }
            });
        });

        let last = Heartbeat::read(&path).unwrap().unwrap();
        assert!(last.pid == 100 || last.pid == 200);
    }

    #[test]
    fn test_detached_only_replaces_running() {
        let now = Utc::now();
        let mut hb = Heartbeat::running(7, now);
        hb.mark_detached();
        assert_eq!(hb.state, WorkerState::Detached);
        assert_eq!(hb.freshness(now, Duration::seconds(90)), Freshness::Detached);

        let mut exited = Heartbeat::running(7, now);
        exited.mark_exited(Some(0));
        exited.mark_detached();
        assert_eq!(exited.state, WorkerState::Exited);
    }

    #[test]
    fn test_read_garbage_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hb.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(Heartbeat::read(&path).is_err());
    }

    #[test]
    fn test_exited_serializes_exit_code() {
        let mut hb = Heartbeat::running(7, Utc::now());
        let json = serde_json::to_value(&hb).unwrap();
        assert!(json.get("exit_code").is_none());

        hb.mark_exited(Some(0));
        let json = serde_json::to_value(&hb).unwrap();
        assert_eq!(json["state"], "exited");
        assert_eq!(json["exit_code"], 0);
    }
}
