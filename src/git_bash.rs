//! Git Bash (POSIX emulation on Windows) location and execution
//!
//! Git Bash is the execution environment for the Windows-native detector.
//! Location runs an ordered search: a PATH lookup (via the sibling `git`
//! binary, since `bash.exe` on PATH may be the WSL launcher in System32),
//! then fixed well-known install directories, then the Git for Windows
//! registry key. Commands run through `bash.exe -c` with a PATH scrubbed of
//! WSL mount entries so the two execution modes never resolve each other's
//! binaries.

use crate::error::DetectError;
use crate::exec::{self, CommandSpec};
use crate::types::{ExecutionOptions, ProcessResult};
use std::path::{Path, PathBuf};

/// Result of locating a Git Bash installation.
#[derive(Debug, Clone, Default)]
pub struct GitBashInstallation {
    pub available: bool,
    pub bash_path: Option<PathBuf>,
    /// `bash --version` first line, when the binary answered.
    pub version: Option<String>,
}

/// Locate Git Bash, trying PATH, well-known directories, then the registry.
pub async fn locate() -> GitBashInstallation {
    if !cfg!(target_os = "windows") {
        return GitBashInstallation::default();
    }

    for candidate in candidate_bash_paths() {
        if candidate.is_file()
            && let Some(version) = bash_version(&candidate).await
        {
            tracing::debug!(
                target: "claude_scout::git_bash",
                bash = %candidate.display(),
                "located Git Bash"
            );
            return GitBashInstallation {
                available: true,
                bash_path: Some(candidate),
                version: Some(version),
            };
        }
    }

    if let Some(install_root) = registry_install_path().await {
        let candidate = install_root.join("bin").join("bash.exe");
        if candidate.is_file() {
            let version = bash_version(&candidate).await;
            return GitBashInstallation {
                available: true,
                bash_path: Some(candidate),
                version,
            };
        }
    }

    GitBashInstallation::default()
}

/// Ordered candidate locations for `bash.exe`, PATH-derived first.
fn candidate_bash_paths() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    // `git.exe` on PATH points into the Git install; its sibling layout is
    // stable (<root>\cmd\git.exe or <root>\bin\git.exe).
    if let Ok(git) = which::which("git") {
        if let Some(root) = git.parent().and_then(Path::parent) {
            candidates.push(root.join("bin").join("bash.exe"));
        }
    }

    for program_files in ["C:\\Program Files", "C:\\Program Files (x86)"] {
        candidates.push(
            Path::new(program_files)
                .join("Git")
                .join("bin")
                .join("bash.exe"),
        );
    }

    if let Ok(local_app_data) = std::env::var("LOCALAPPDATA") {
        candidates.push(
            Path::new(&local_app_data)
                .join("Programs")
                .join("Git")
                .join("bin")
                .join("bash.exe"),
        );
    }

    candidates
}

/// Read the Git for Windows install root from the registry, checking the
/// 64-bit view first and then the 32-bit view.
async fn registry_install_path() -> Option<PathBuf> {
    for extra_args in [&[][..], &["/reg:32"][..]] {
        let spec = CommandSpec::new("reg")
            .args([
                "query",
                "HKEY_LOCAL_MACHINE\\SOFTWARE\\GitForWindows",
                "/v",
                "InstallPath",
            ])
            .args(extra_args.iter().copied());

        let Ok(result) = exec::run(&spec, &ExecutionOptions::probe()).await else {
            continue;
        };
        if !result.success() {
            continue;
        }

        // Output line shape: "    InstallPath    REG_SZ    C:\Program Files\Git"
        for line in result.stdout.lines() {
            if let Some(idx) = line.find("REG_SZ") {
                let value = line[idx + "REG_SZ".len()..].trim();
                if !value.is_empty() {
                    return Some(PathBuf::from(value));
                }
            }
        }
    }

    None
}

async fn bash_version(bash: &Path) -> Option<String> {
    let spec = CommandSpec::new(bash).arg("--version");
    let result = exec::run(&spec, &ExecutionOptions::probe()).await.ok()?;
    if result.success() {
        result.first_line().map(str::to_string)
    } else {
        None
    }
}

/// Strip PATH entries that resolve into a WSL distribution.
///
/// When WSL is installed, Windows PATH often carries `\\wsl$\...` shares and
/// Git Bash inherits `/mnt/<drive>/...` conversions; either one would let a
/// Git Bash lookup resolve to a Linux binary that cannot run here.
#[must_use]
pub fn sanitized_path(inherited: &str) -> String {
    let separator = if cfg!(target_os = "windows") { ';' } else { ':' };

    inherited
        .split(separator)
        .filter(|entry| !is_wsl_mount_entry(entry))
        .collect::<Vec<_>>()
        .join(&separator.to_string())
}

fn is_wsl_mount_entry(entry: &str) -> bool {
    let lower = entry.trim().to_lowercase();
    lower.starts_with("/mnt/")
        || lower.contains("\\\\wsl$")
        || lower.contains("\\\\wsl.localhost")
        || lower.contains("wsl.localhost\\")
}

/// Run a command line inside Git Bash non-interactively.
pub async fn run_command(
    bash: &Path,
    command_line: &str,
    options: &ExecutionOptions,
) -> Result<ProcessResult, DetectError> {
    let inherited = std::env::var("PATH").unwrap_or_default();
    let spec = CommandSpec::new(bash)
        .args(["-c", command_line])
        .env("PATH", sanitized_path(&inherited));
    exec::run(&spec, options).await
}

/// Classify which world a resolved CLI path belongs to, for diagnostics.
#[must_use]
pub fn classify_path_environment(path: &str) -> &'static str {
    let trimmed = path.trim();
    let has_drive = {
        let mut chars = trimmed.chars();
        matches!(
            (chars.next(), chars.next()),
            (Some(c), Some(':')) if c.is_ascii_alphabetic()
        )
    };

    if has_drive || trimmed.contains('\\') {
        "windows"
    } else if trimmed.starts_with('/') {
        "unix"
    } else {
        "ambiguous"
    }
}
