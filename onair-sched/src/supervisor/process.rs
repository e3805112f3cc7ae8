//! One managed external process
//!
//! There is no crash notification: a process that died is only noticed
//! when its handle is probed, and the next start treats it as stopped.

use crate::error::{Error, Result};
use onair_common::events::{ProcessKind, ProcessState};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

/// Bound on reaping a process after it was force-killed
const KILL_WAIT: Duration = Duration::from_secs(2);

pub(crate) struct ManagedProcess {
    pub kind: ProcessKind,
    pub state: ProcessState,
    child: Option<Child>,
}

impl ManagedProcess {
    pub fn new(kind: ProcessKind) -> Self {
        Self {
            kind,
            state: ProcessState::Stopped,
            child: None,
        }
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(|c| c.id())
    }

    /// Liveness probe; marks the process crashed if its child exited
    pub fn probe(&mut self) -> ProcessState {
        if let Some(child) = self.child.as_mut() {
            match child.try_wait() {
                Ok(None) => {}
                Ok(Some(status)) => {
                    warn!(process = self.kind.as_str(), %status, "Managed process exited unexpectedly");
                    self.child = None;
                    self.state = ProcessState::Crashed;
                }
                Err(e) => {
                    warn!(process = self.kind.as_str(), error = %e, "Failed to probe managed process");
                    self.child = None;
                    self.state = ProcessState::Crashed;
                }
            }
        } else if self.state == ProcessState::Running {
            self.state = ProcessState::Crashed;
        }
        self.state
    }

    /// Spawn `command` and wait out the start grace period
    ///
    /// A process that exits during the grace period failed to start.
    pub async fn start(&mut self, command: &[String], grace: Duration) -> Result<()> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| Error::ProcessStart(format!("{}: empty command", self.kind.as_str())))?;

        self.state = ProcessState::Starting;
        let spawned = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn();
        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                self.state = ProcessState::Stopped;
                return Err(Error::ProcessStart(format!(
                    "{}: failed to spawn {}: {}",
                    self.kind.as_str(),
                    program,
                    e
                )));
            }
        };

        debug!(process = self.kind.as_str(), pid = ?child.id(), "Spawned, waiting for start grace");

        let exited = match tokio::time::timeout(grace, child.wait()).await {
            Err(_) => {
                info!(process = self.kind.as_str(), pid = ?child.id(), "Managed process running");
                self.child = Some(child);
                self.state = ProcessState::Running;
                return Ok(());
            }
            Ok(Ok(status)) => format!("exited during start ({})", status),
            Ok(Err(e)) => e.to_string(),
        };

        self.state = ProcessState::Stopped;
        Err(Error::ProcessStart(format!("{}: {}", self.kind.as_str(), exited)))
    }

    /// Graceful stop, then force-kill after `timeout`
    ///
    /// Returns true if the process exited on the graceful request. Never
    /// waits longer than `timeout` plus a short reap bound.
    pub async fn stop(&mut self, timeout: Duration) -> bool {
        let Some(mut child) = self.child.take() else {
            self.state = ProcessState::Stopped;
            return true;
        };

        self.state = ProcessState::Stopping;
        request_termination(&child);

        let graceful = match tokio::time::timeout(timeout, child.wait()).await {
            Ok(_) => {
                info!(process = self.kind.as_str(), "Managed process stopped");
                true
            }
            Err(_) => {
                warn!(
                    process = self.kind.as_str(),
                    timeout_ms = timeout.as_millis() as u64,
                    "Managed process ignored termination request, killing"
                );
                let _ = child.start_kill();
                let _ = tokio::time::timeout(KILL_WAIT, child.wait()).await;
                false
            }
        };

        self.state = ProcessState::Stopped;
        graceful
    }
}

#[cfg(unix)]
fn request_termination(child: &Child) {
    if let Some(pid) = child.id() {
        // SAFETY: kill(2) with a pid we own; no memory is touched
        let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
        if rc != 0 {
            debug!(pid, "SIGTERM delivery failed");
        }
    }
}

#[cfg(not(unix))]
fn request_termination(_child: &Child) {}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".to_string(), "-c".to_string(), script.to_string()]
    }

    #[tokio::test]
    async fn test_start_and_graceful_stop() {
        let mut process = ManagedProcess::new(ProcessKind::PlaylistEngine);
        process.start(&sh("sleep 30"), Duration::from_millis(200)).await.unwrap();
        assert!(process.pid().is_some());
        assert_eq!(process.probe(), ProcessState::Running);

        assert!(process.stop(Duration::from_secs(5)).await);
        assert!(process.pid().is_none());
        assert_eq!(process.state, ProcessState::Stopped);
    }

    #[tokio::test]
    async fn test_exit_during_grace_is_start_failure() {
        let mut process = ManagedProcess::new(ProcessKind::BroadcastServer);
        let result = process.start(&sh("exit 3"), Duration::from_secs(2)).await;
        assert!(matches!(result, Err(Error::ProcessStart(_))));
        assert_eq!(process.state, ProcessState::Stopped);
    }

    #[tokio::test]
    async fn test_stubborn_process_is_killed_within_bound() {
        let mut process = ManagedProcess::new(ProcessKind::VideoPipeline);
        process
            .start(&sh("trap '' TERM; while true; do sleep 1; done"), Duration::from_millis(200))
            .await
            .unwrap();

        let started = std::time::Instant::now();
        assert!(!process.stop(Duration::from_millis(300)).await);
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_missing_program() {
        let mut process = ManagedProcess::new(ProcessKind::BroadcastServer);
        let result = process
            .start(&["/nonexistent/onair-binary".to_string()], Duration::from_millis(100))
            .await;
        assert!(matches!(result, Err(Error::ProcessStart(_))));
    }
}
