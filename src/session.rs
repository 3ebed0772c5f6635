//! Long-lived interactive CLI sessions
//!
//! A [`CliSession`] owns a spawned Claude CLI process whose stdout/stderr
//! are delivered to the caller as they arrive (per-stream FIFO, no ordering
//! guarantee across streams). Stdin is closed immediately after spawn: a
//! programmatic invocation must never leave the CLI blocked waiting for
//! interactive input that will not arrive.

use crate::error::DetectError;
use crate::exec::{self, CommandSpec};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command as TokioCommand};
use tokio::sync::mpsc;

/// Grace period between the terminate request and the forced tree kill.
pub const TERMINATE_GRACE: Duration = Duration::from_secs(5);

/// One chunk of session output, delivered in arrival order per stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutput {
    Stdout(Vec<u8>),
    Stderr(Vec<u8>),
}

/// Handle to a running interactive session. The caller owns its lifetime:
/// dropping the handle does not kill the process; call [`CliSession::terminate`]
/// or [`CliSession::kill`].
#[derive(Debug)]
pub struct CliSession {
    child: Child,
    pid: Option<u32>,
    output: mpsc::UnboundedReceiver<SessionOutput>,
    #[cfg(windows)]
    _job: exec::JobObjectHandle,
}

impl CliSession {
    /// Spawn a session from an argv-style spec.
    ///
    /// The child is placed in its own process group (Unix) or Job Object
    /// (Windows) so that later termination reaches the entire tree, and two
    /// background tasks start pumping stdout/stderr into the output channel.
    pub(crate) fn spawn(spec: &CommandSpec) -> Result<Self, DetectError> {
        let mut cmd: TokioCommand = spec.to_tokio_command();
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        #[cfg(unix)]
        unsafe {
            cmd.pre_exec(|| {
                libc::setpgid(0, 0);
                Ok(())
            });
        }

        #[cfg(windows)]
        let job = exec::JobObjectHandle::create()?;

        let mut child = cmd.spawn().map_err(|e| DetectError::ExecutionFailed {
            reason: format!(
                "Failed to spawn session '{}': {}",
                spec.program.to_string_lossy(),
                e
            ),
        })?;

        #[cfg(windows)]
        job.assign(&child)?;

        // Closed immediately: the CLI otherwise blocks waiting for
        // interactive input in a programmatic invocation.
        drop(child.stdin.take());

        let pid = child.id();

        let (tx, rx) = mpsc::unbounded_channel();

        if let Some(mut stdout) = child.stdout.take() {
            let tx = tx.clone();
            tokio::spawn(async move {
                let mut buf = vec![0u8; 8192];
                loop {
                    match stdout.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            if tx.send(SessionOutput::Stdout(buf[..n].to_vec())).is_err() {
                                break;
                            }
                        }
                    }
                }
            });
        }

        if let Some(mut stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut buf = vec![0u8; 8192];
                loop {
                    match stderr.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            if tx.send(SessionOutput::Stderr(buf[..n].to_vec())).is_err() {
                                break;
                            }
                        }
                    }
                }
            });
        }

        tracing::debug!(
            target: "claude_scout::session",
            program = %spec.program.to_string_lossy(),
            pid = pid,
            "spawned interactive session"
        );

        Ok(Self {
            child,
            pid,
            output: rx,
            #[cfg(windows)]
            _job: job,
        })
    }

    /// OS process id, when the process has not been reaped yet.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Receive the next output chunk. `None` once both streams reached EOF.
    pub async fn next_output(&mut self) -> Option<SessionOutput> {
        self.output.recv().await
    }

    /// Whether the process has exited (without blocking).
    pub fn has_exited(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(Some(_)))
    }

    /// Wait for the session to exit and return its exit code.
    pub async fn wait(&mut self) -> Result<Option<i32>, DetectError> {
        let status = self
            .child
            .wait()
            .await
            .map_err(|e| DetectError::ExecutionFailed {
                reason: format!("Failed to wait for session: {e}"),
            })?;
        Ok(status.code())
    }

    /// Cooperative shutdown: request graceful termination, wait up to
    /// `grace`, then force-kill the entire process tree if it has not
    /// exited.
    pub async fn terminate(&mut self, grace: Duration) -> Result<(), DetectError> {
        let Some(pid) = self.pid else {
            // Already reaped.
            return Ok(());
        };

        exec::request_terminate(pid);

        let deadline = tokio::time::Instant::now() + grace;
        loop {
            if self.has_exited() {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        tracing::debug!(
            target: "claude_scout::session",
            pid = pid,
            grace_secs = grace.as_secs(),
            "grace period elapsed, force-killing session tree"
        );

        self.kill().await
    }

    /// Force-kill the entire process tree immediately and reap the child.
    pub async fn kill(&mut self) -> Result<(), DetectError> {
        if let Some(pid) = self.pid {
            exec::kill_tree(pid);
        }
        let _ = self.child.wait().await;
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_session_streams_stdout() {
        let spec = CommandSpec::new("sh").args(["-c", "printf hello; printf world >&2"]);
        let mut session = CliSession::spawn(&spec).unwrap();

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        while let Some(chunk) = session.next_output().await {
            match chunk {
                SessionOutput::Stdout(bytes) => stdout.extend(bytes),
                SessionOutput::Stderr(bytes) => stderr.extend(bytes),
            }
        }

        assert_eq!(stdout, b"hello");
        assert_eq!(stderr, b"world");
        assert_eq!(session.wait().await.unwrap(), Some(0));
    }

    #[tokio::test]
    async fn test_session_terminate_kills_tree() {
        // The child spawns its own grandchild; terminate must reach both.
        let spec = CommandSpec::new("sh").args(["-c", "sleep 60 & sleep 60"]);
        let mut session = CliSession::spawn(&spec).unwrap();
        let pid = session.pid().expect("session should have a pid");

        session
            .terminate(Duration::from_secs(2))
            .await
            .expect("terminate should succeed");

        // killpg reached the whole group, so the leader must be gone.
        use nix::sys::signal::kill;
        use nix::unistd::Pid;
        assert!(kill(Pid::from_raw(pid as i32), None).is_err());
    }

    #[tokio::test]
    async fn test_session_wait_reports_exit_code() {
        let spec = CommandSpec::new("sh").args(["-c", "exit 7"]);
        let mut session = CliSession::spawn(&spec).unwrap();
        assert_eq!(session.wait().await.unwrap(), Some(7));
    }
}
