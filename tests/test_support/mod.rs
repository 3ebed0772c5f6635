//! Shared helpers for integration tests

#![allow(dead_code)]

use std::path::{Path, PathBuf};

/// Scoped environment override: sets a variable for the test body and
/// restores the previous value on drop. Tests using this must run under
/// `#[serial]` since the process environment is global.
pub struct EnvGuard {
    key: String,
    previous: Option<String>,
}

impl EnvGuard {
    pub fn set(key: &str, value: &str) -> Self {
        let previous = std::env::var(key).ok();
        unsafe { std::env::set_var(key, value) };
        Self {
            key: key.to_string(),
            previous,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        unsafe {
            match &self.previous {
                Some(value) => std::env::set_var(&self.key, value),
                None => std::env::remove_var(&self.key),
            }
        }
    }
}

/// Whether a real Claude CLI is reachable from this test process. Tests
/// that assert a not-found outcome skip when one is installed.
pub fn claude_on_path() -> bool {
    which::which("claude").is_ok() || which::which("claude-code").is_ok()
}

/// Write an executable stand-in for the Claude CLI.
///
/// The script answers `--version` with the given version string, echoes any
/// other arguments, and supports a `serve` mode that blocks (for session
/// lifecycle tests).
#[cfg(unix)]
pub fn write_fake_cli(dir: &Path, version: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("claude");
    let script = format!(
        "#!/bin/sh\n\
         if [ \"$1\" = \"--version\" ]; then\n\
         \x20 echo \"{version} (Claude Code)\"\n\
         \x20 exit 0\n\
         fi\n\
         if [ \"$1\" = \"serve\" ]; then\n\
         \x20 echo ready\n\
         \x20 sleep 600 &\n\
         \x20 sleep 600\n\
         \x20 exit 0\n\
         fi\n\
         echo \"ran: $@\"\n"
    );
    std::fs::write(&path, script).unwrap();

    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();

    path
}

/// Lay out a fake nvm installation under `home`: an `nvm.sh` that prepends
/// its managed node bin directory to PATH, plus a fake CLI inside it.
#[cfg(unix)]
pub fn write_fake_nvm(home: &Path, node_version: &str, cli_version: &str) -> PathBuf {
    let nvm_dir = home.join(".nvm");
    let bin_dir = nvm_dir
        .join("versions")
        .join("node")
        .join(format!("v{node_version}"))
        .join("bin");
    std::fs::create_dir_all(&bin_dir).unwrap();

    let cli = write_fake_cli(&bin_dir, cli_version);

    std::fs::write(
        nvm_dir.join("nvm.sh"),
        format!("export PATH=\"$HOME/.nvm/versions/node/v{node_version}/bin:$PATH\"\n"),
    )
    .unwrap();

    cli
}
