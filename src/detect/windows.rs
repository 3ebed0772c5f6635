//! Windows-native detector (Git Bash execution environment)
//!
//! Git Bash is located before anything else; its absence is a dedicated
//! subsystem failure, distinct from "Git Bash works but the CLI is not
//! installed". All probing and execution then happens inside `bash.exe -c`
//! with a PATH scrubbed of WSL mounts.

use crate::detect::{
    CLI_COMMAND_NAMES, PlatformDetector, VERSION_MANAGERS, extract_version, install_suggestions,
    subsystem_suggestions,
};
use crate::error::DetectError;
use crate::exec::{self, CommandSpec};
use crate::git_bash::{self, classify_path_environment, sanitized_path};
use crate::session::CliSession;
use crate::types::{
    CLI_TIMEOUT, DetectionResult, ErrorKind, ExecutionMode, ExecutionOptions, HostPlatform,
    ProcessResult,
};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
struct DetectedCli {
    path: String,
    version: Option<String>,
}

/// Detector for Windows hosts without (or not using) WSL.
#[derive(Debug)]
pub struct WindowsDetector {
    override_path: Option<String>,
    bash: Option<PathBuf>,
    detected: Option<DetectedCli>,
}

impl WindowsDetector {
    #[must_use]
    pub fn new(override_path: Option<String>) -> Self {
        Self {
            override_path,
            bash: None,
            detected: None,
        }
    }

    /// Git Bash path, located lazily when a cached detection was restored.
    async fn bash_path(&self) -> Result<PathBuf, DetectError> {
        if let Some(bash) = &self.bash {
            return Ok(bash.clone());
        }

        let install = git_bash::locate().await;
        install
            .bash_path
            .ok_or_else(|| DetectError::SubsystemUnavailable {
                reason: "Git Bash is not available on this host".to_string(),
            })
    }

    /// Spell a path the way bash accepts it (`C:\x` → `C:/x`).
    fn unix_form(path: &str) -> String {
        path.replace('\\', "/")
    }

    /// Run `<path> --version` inside Git Bash, returning the version.
    async fn probe_version(bash: &Path, path: &str) -> Option<String> {
        let line = format!("\"{}\" --version", Self::unix_form(path));
        let result = git_bash::run_command(bash, &line, &ExecutionOptions::probe())
            .await
            .ok()?;
        if result.success() {
            Some(extract_version(&result.stdout).unwrap_or_default())
        } else {
            None
        }
    }

    /// Canonicalize a Windows path for display without the `\\?\` prefix
    /// `std::fs::canonicalize` produces.
    fn resolve_display_path(path: &str) -> Option<String> {
        #[cfg(windows)]
        {
            dunce::canonicalize(path)
                .ok()
                .map(|p| p.to_string_lossy().to_string())
        }
        #[cfg(not(windows))]
        {
            let _ = path;
            None
        }
    }

    fn accept(&self, path: String, version: Option<String>, method: &str) -> DetectionResult {
        DetectionResult::found(
            HostPlatform::Windows,
            ExecutionMode::Native,
            path.clone(),
            Self::resolve_display_path(&path),
            version.filter(|v| !v.is_empty()),
            method,
        )
        .with_metadata("environment", "Windows native (Git Bash)")
        .with_metadata("pathEnvironment", classify_path_environment(&path))
    }

    async fn probe_shell_lookup(&self, bash: &Path) -> Option<(String, Option<String>, String)> {
        for name in CLI_COMMAND_NAMES {
            let line = format!("command -v {name}");
            let Ok(result) = git_bash::run_command(bash, &line, &ExecutionOptions::probe()).await
            else {
                continue;
            };
            if !result.success() {
                continue;
            }
            let Some(candidate) = result.first_line().map(str::to_string) else {
                continue;
            };

            if let Some(version) = Self::probe_version(bash, &candidate).await {
                return Some((candidate, Some(version), "shell".to_string()));
            }
        }
        None
    }

    async fn probe_version_managers(
        &self,
        bash: &Path,
    ) -> Option<(String, Option<String>, String)> {
        for manager in &VERSION_MANAGERS {
            let Ok(result) =
                git_bash::run_command(bash, manager.lookup, &ExecutionOptions::probe()).await
            else {
                continue;
            };
            if !result.success() {
                continue;
            }
            let Some(candidate) = result.first_line().map(str::to_string) else {
                continue;
            };

            if let Some(version) = Self::probe_version(bash, &candidate).await {
                tracing::debug!(
                    target: "claude_scout::detect",
                    manager = manager.name,
                    path = %candidate,
                    "CLI found through version manager in Git Bash"
                );
                return Some((candidate, Some(version), manager.name.to_string()));
            }
        }
        None
    }

    async fn probe_user_override(&self, bash: &Path) -> Option<(String, Option<String>, String)> {
        let configured = self.override_path.as_deref()?;
        let version = Self::probe_version(bash, configured).await?;
        Some((
            configured.to_string(),
            Some(version),
            "user-configured".to_string(),
        ))
    }

    fn effective_options(options: &ExecutionOptions) -> ExecutionOptions {
        let mut options = options.clone();
        options.timeout = Some(options.timeout.unwrap_or(CLI_TIMEOUT));
        options
    }

    /// Argv-safe bash invocation: the CLI path and arguments travel as
    /// discrete `"$0" "$@"` parameters, never concatenated into the -c line.
    fn bash_exec_spec(
        bash: &Path,
        cli_path: &str,
        args: &[String],
        working_dir: Option<&Path>,
    ) -> CommandSpec {
        let inherited = std::env::var("PATH").unwrap_or_default();
        let mut spec = CommandSpec::new(bash)
            .args(["-c", "exec \"$0\" \"$@\""])
            .arg(Self::unix_form(cli_path))
            .args(args.iter().cloned())
            .env("PATH", sanitized_path(&inherited));

        if let Some(dir) = working_dir {
            spec = spec.cwd(dir);
        }

        spec
    }

    fn detected(&self) -> Result<&DetectedCli, DetectError> {
        self.detected.as_ref().ok_or_else(|| DetectError::NotDetected {
            reason: "execute called before a successful detection".to_string(),
        })
    }
}

#[async_trait]
impl PlatformDetector for WindowsDetector {
    fn platform(&self) -> HostPlatform {
        HostPlatform::Windows
    }

    fn execution_mode(&self) -> ExecutionMode {
        ExecutionMode::Native
    }

    async fn detect(&mut self) -> DetectionResult {
        let install = git_bash::locate().await;
        let Some(bash) = install.bash_path else {
            self.detected = None;
            return DetectionResult::not_found(
                HostPlatform::Windows,
                ExecutionMode::Native,
                ErrorKind::SubsystemUnavailable,
                "Git Bash is not installed; the CLI cannot be probed or executed natively",
                None,
                subsystem_suggestions(ExecutionMode::Native),
            );
        };
        self.bash = Some(bash.clone());

        let outcome = match self.probe_shell_lookup(&bash).await {
            Some(found) => Some(found),
            None => match self.probe_version_managers(&bash).await {
                Some(found) => Some(found),
                None => self.probe_user_override(&bash).await,
            },
        };

        match outcome {
            Some((path, version, method)) => {
                self.detected = Some(DetectedCli {
                    path: path.clone(),
                    version: version.clone(),
                });
                let mut result = self.accept(path, version, &method);
                if let Some(shell_version) = &install.version {
                    result = result.with_metadata("gitBashVersion", shell_version);
                }
                result
            }
            None => {
                self.detected = None;
                DetectionResult::not_found(
                    HostPlatform::Windows,
                    ExecutionMode::Native,
                    ErrorKind::NotFound,
                    "Claude CLI not found in Git Bash after exhausting the detection pipeline",
                    None,
                    install_suggestions(HostPlatform::Windows),
                )
            }
        }
    }

    async fn verify(&self, path: &str) -> bool {
        let Ok(bash) = self.bash_path().await else {
            return false;
        };
        Self::probe_version(&bash, path).await.is_some()
    }

    async fn execute(
        &self,
        args: &[String],
        working_dir: Option<&Path>,
        options: &ExecutionOptions,
    ) -> Result<ProcessResult, DetectError> {
        let detected = self.detected()?;
        let bash = self.bash_path().await?;
        let spec = Self::bash_exec_spec(&bash, &detected.path, args, working_dir);
        exec::run(&spec, &Self::effective_options(options)).await
    }

    async fn start_session(
        &self,
        working_dir: Option<&Path>,
        args: &[String],
    ) -> Result<CliSession, DetectError> {
        let detected = self.detected()?;
        let bash = self.bash_path().await?;
        let spec = Self::bash_exec_spec(&bash, &detected.path, args, working_dir);
        CliSession::spawn(&spec)
    }

    fn is_available(&self) -> bool {
        self.detected.is_some()
    }

    fn version(&self) -> Result<String, DetectError> {
        self.detected()?
            .version
            .clone()
            .ok_or_else(|| DetectError::NotDetected {
                reason: "no version captured during detection".to_string(),
            })
    }

    fn restore(&mut self, result: &DetectionResult) -> bool {
        if !result.success
            || result.execution_mode != ExecutionMode::Native
            || result.platform != HostPlatform::Windows
        {
            return false;
        }
        let Some(path) = result.cli_path.clone() else {
            return false;
        };
        self.detected = Some(DetectedCli {
            path,
            version: result.version.clone(),
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unix_form() {
        assert_eq!(
            WindowsDetector::unix_form("C:\\Users\\dev\\claude.exe"),
            "C:/Users/dev/claude.exe"
        );
        assert_eq!(WindowsDetector::unix_form("/usr/bin/claude"), "/usr/bin/claude");
    }

    #[test]
    fn test_bash_exec_spec_is_argv_safe() {
        let spec = WindowsDetector::bash_exec_spec(
            Path::new("C:\\Program Files\\Git\\bin\\bash.exe"),
            "C:\\Users\\dev\\claude.exe",
            &["--print".to_string(), "hi there; rm -rf /".to_string()],
            None,
        );

        let args: Vec<String> = spec
            .args
            .iter()
            .map(|a| a.to_string_lossy().to_string())
            .collect();

        // The -c line is a fixed trampoline; user data rides as discrete argv.
        assert_eq!(args[0], "-c");
        assert_eq!(args[1], "exec \"$0\" \"$@\"");
        assert_eq!(args[2], "C:/Users/dev/claude.exe");
        assert_eq!(args[4], "hi there; rm -rf /");
    }

    #[test]
    fn test_execute_before_detect_fails_fast() {
        let detector = WindowsDetector::new(None);
        assert!(matches!(
            detector.detected(),
            Err(DetectError::NotDetected { .. })
        ));
    }

    #[test]
    fn test_restore_requires_windows_native_success() {
        let mut detector = WindowsDetector::new(None);

        let unix_native = DetectionResult::found(
            HostPlatform::Linux,
            ExecutionMode::Native,
            "/usr/bin/claude",
            None,
            None,
            "shell",
        );
        assert!(!detector.restore(&unix_native));

        let windows_native = DetectionResult::found(
            HostPlatform::Windows,
            ExecutionMode::Native,
            "C:\\Users\\dev\\AppData\\Roaming\\npm\\claude.cmd",
            None,
            Some("1.0.40".to_string()),
            "shell",
        );
        assert!(detector.restore(&windows_native));
        assert_eq!(detector.version().unwrap(), "1.0.40");
    }
}
