//! Interactive session lifecycle
//!
//! Spawns a fake CLI in a blocking "serve" mode (which forks its own child,
//! so the session is a small process tree), consumes streamed output, then
//! exercises cooperative termination and the forced kill path. Process death
//! is asserted through the system process table, not just the child handle.

#![cfg(unix)]

mod test_support;

use claude_scout::detect::PlatformDetector;
use claude_scout::detect::unix::UnixDetector;
use claude_scout::session::SessionOutput;
use claude_scout::types::{DetectionResult, ExecutionMode, HostPlatform};
use std::time::Duration;
use sysinfo::{Pid, ProcessesToUpdate, System};
use tempfile::TempDir;
use test_support::write_fake_cli;
use tokio::time::timeout;

fn restored_detector(cli_path: &std::path::Path) -> UnixDetector {
    let mut detector = UnixDetector::new(None);
    let result = DetectionResult::found(
        HostPlatform::current(),
        ExecutionMode::Native,
        cli_path.to_string_lossy().to_string(),
        None,
        Some("1.0.33".to_string()),
        "user-configured",
    );
    assert!(detector.restore(&result));
    detector
}

fn process_listed(pid: u32) -> bool {
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::All, true);
    system.process(Pid::from_u32(pid)).is_some()
}

/// Output arrives over the channel while the session runs, before any exit.
#[tokio::test]
async fn test_session_streams_output_while_running() {
    let install = TempDir::new().unwrap();
    let fake = write_fake_cli(install.path(), "1.0.33");
    let detector = restored_detector(&fake);

    let mut session = detector
        .start_session(None, &["serve".to_string()])
        .await
        .unwrap();

    // The serve mode prints a banner and then blocks; the banner must be
    // delivered without waiting for process exit.
    let first = timeout(Duration::from_secs(10), session.next_output())
        .await
        .expect("banner should arrive while the session is still running")
        .expect("stream should not be closed yet");
    match first {
        SessionOutput::Stdout(bytes) => {
            assert_eq!(String::from_utf8_lossy(&bytes).trim(), "ready");
        }
        SessionOutput::Stderr(bytes) => {
            panic!("unexpected stderr: {}", String::from_utf8_lossy(&bytes));
        }
    }
    assert!(!session.has_exited());

    session.kill().await.unwrap();
}

/// Cooperative terminate brings down the whole tree within the grace period;
/// afterwards the leader is no longer listed as running.
#[tokio::test]
async fn test_terminate_kills_process_tree_within_grace() {
    let install = TempDir::new().unwrap();
    let fake = write_fake_cli(install.path(), "1.0.33");
    let detector = restored_detector(&fake);

    let mut session = detector
        .start_session(None, &["serve".to_string()])
        .await
        .unwrap();
    let pid = session.pid().expect("running session has a pid");

    // Wait for the banner so the tree (including the forked child) exists.
    let _ = timeout(Duration::from_secs(10), session.next_output())
        .await
        .expect("session should produce output");
    assert!(process_listed(pid));

    session.terminate(Duration::from_secs(5)).await.unwrap();

    assert!(
        !process_listed(pid),
        "session leader {pid} still listed after terminate"
    );
}

/// The forced kill path works without a preceding terminate request.
#[tokio::test]
async fn test_kill_without_grace_reaps_the_session() {
    let install = TempDir::new().unwrap();
    let fake = write_fake_cli(install.path(), "1.0.33");
    let detector = restored_detector(&fake);

    let mut session = detector
        .start_session(None, &["serve".to_string()])
        .await
        .unwrap();
    let pid = session.pid().expect("running session has a pid");

    session.kill().await.unwrap();

    assert!(!process_listed(pid), "session {pid} still listed after kill");
}

/// A session that exits on its own reports its exit code and closes the
/// output stream.
#[tokio::test]
async fn test_session_natural_exit() {
    let install = TempDir::new().unwrap();
    let fake = write_fake_cli(install.path(), "1.0.33");
    let detector = restored_detector(&fake);

    let mut session = detector
        .start_session(None, &["--version".to_string()])
        .await
        .unwrap();

    let mut stdout = Vec::new();
    while let Some(chunk) = session.next_output().await {
        if let SessionOutput::Stdout(bytes) = chunk {
            stdout.extend(bytes);
        }
    }

    assert_eq!(
        String::from_utf8_lossy(&stdout).trim(),
        "1.0.33 (Claude Code)"
    );
    assert_eq!(session.wait().await.unwrap(), Some(0));
}
