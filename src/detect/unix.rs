//! Unix-native detector (macOS and Linux)
//!
//! Probe order: version managers (a shim is the most specific install),
//! login-shell PATH lookup, direct invocation, then the user-configured
//! override. Lookups run through the user's login shell with an augmented
//! PATH because GUI-launched processes inherit a truncated environment.

use crate::detect::{
    CLI_COMMAND_NAMES, PlatformDetector, VERSION_MANAGERS, extract_version, install_suggestions,
    provenance_from_path,
};
use crate::error::DetectError;
use crate::exec::{self, CommandSpec};
use crate::session::CliSession;
use crate::types::{
    CLI_TIMEOUT, DetectionResult, ErrorKind, ExecutionMode, ExecutionOptions, HostPlatform,
    ProcessResult,
};
use async_trait::async_trait;
use std::path::Path;

/// Ordered probe steps for the Unix pipeline.
const PROBE_STEPS: [ProbeStep; 4] = [
    ProbeStep::VersionManagers,
    ProbeStep::PathLookup,
    ProbeStep::DirectProbe,
    ProbeStep::UserOverride,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProbeStep {
    VersionManagers,
    PathLookup,
    DirectProbe,
    UserOverride,
}

#[derive(Debug, Clone)]
struct DetectedCli {
    path: String,
    version: Option<String>,
}

/// Detector for Unix-like hosts where the CLI runs natively.
#[derive(Debug)]
pub struct UnixDetector {
    platform: HostPlatform,
    override_path: Option<String>,
    detected: Option<DetectedCli>,
}

impl UnixDetector {
    #[must_use]
    pub fn new(override_path: Option<String>) -> Self {
        Self {
            platform: HostPlatform::current(),
            override_path,
            detected: None,
        }
    }

    /// Options for lookup probes: login shell + augmented PATH.
    fn lookup_options() -> ExecutionOptions {
        let options = ExecutionOptions::probe().with_login_shell();
        #[cfg(unix)]
        let options = options.with_env("PATH", exec::augmented_path());
        options
    }

    /// Options for direct binary probes: augmented PATH, no shell.
    fn direct_options() -> ExecutionOptions {
        let options = ExecutionOptions::probe();
        #[cfg(unix)]
        let options = options.with_env("PATH", exec::augmented_path());
        options
    }

    /// Run `<path> --version` and return the extracted version on success.
    async fn probe_version(&self, path: &str) -> Option<String> {
        let spec = CommandSpec::new(path).arg("--version");
        let result = exec::run(&spec, &Self::direct_options()).await.ok()?;
        if result.success() {
            Some(extract_version(&result.stdout).unwrap_or_default())
        } else {
            None
        }
    }

    async fn resolve_symlinks(path: &str) -> Option<String> {
        tokio::fs::canonicalize(path)
            .await
            .ok()
            .map(|p| p.to_string_lossy().to_string())
    }

    fn environment_label(&self) -> &'static str {
        match self.platform {
            HostPlatform::MacOs => "macOS native",
            _ => "Linux native",
        }
    }

    /// Assemble a successful result for a verified candidate path.
    async fn accept(
        &self,
        cli_path: &str,
        version: Option<String>,
        method: &str,
        manager: Option<&str>,
    ) -> DetectionResult {
        let resolved = Self::resolve_symlinks(cli_path).await;

        let mut result = DetectionResult::found(
            self.platform,
            ExecutionMode::Native,
            cli_path,
            resolved.clone(),
            version.filter(|v| !v.is_empty()),
            method,
        )
        .with_metadata("environment", self.environment_label());

        // Provenance: which managed install owns this binary.
        let provenance_path = resolved.as_deref().unwrap_or(cli_path);
        match (manager, provenance_from_path(provenance_path)) {
            (_, Some((owner, node_version))) => {
                result = result.with_metadata("packageManager", owner);
                if let Some(node) = node_version {
                    result = result.with_metadata("nodeVersion", node);
                }
            }
            (Some(owner), None) => {
                result = result.with_metadata("packageManager", owner);
            }
            (None, None) => {}
        }

        result
    }

    async fn run_step(&self, step: ProbeStep) -> Option<DetectionResult> {
        match step {
            ProbeStep::VersionManagers => self.probe_version_managers().await,
            ProbeStep::PathLookup => self.probe_path_lookup().await,
            ProbeStep::DirectProbe => self.probe_direct().await,
            ProbeStep::UserOverride => self.probe_user_override().await,
        }
    }

    async fn probe_version_managers(&self) -> Option<DetectionResult> {
        for manager in &VERSION_MANAGERS {
            let Ok(result) = exec::run_line(manager.lookup, &Self::lookup_options()).await else {
                continue;
            };
            if !result.success() {
                continue;
            }
            let Some(candidate) = result.first_line().map(str::to_string) else {
                continue;
            };

            // A shim the manager reports but cannot actually run is skipped.
            if let Some(version) = self.probe_version(&candidate).await {
                tracing::debug!(
                    target: "claude_scout::detect",
                    manager = manager.name,
                    path = %candidate,
                    "CLI found through version manager"
                );
                return Some(
                    self.accept(&candidate, Some(version), manager.name, Some(manager.name))
                        .await,
                );
            }
        }
        None
    }

    async fn probe_path_lookup(&self) -> Option<DetectionResult> {
        for name in CLI_COMMAND_NAMES {
            let Ok(result) =
                exec::run_line(&format!("command -v {name}"), &Self::lookup_options()).await
            else {
                continue;
            };
            if !result.success() {
                continue;
            }
            let Some(candidate) = result.first_line().map(str::to_string) else {
                continue;
            };

            if let Some(version) = self.probe_version(&candidate).await {
                tracing::debug!(
                    target: "claude_scout::detect",
                    path = %candidate,
                    "CLI found on login-shell PATH"
                );
                return Some(self.accept(&candidate, Some(version), "shell", None).await);
            }
        }
        None
    }

    async fn probe_direct(&self) -> Option<DetectionResult> {
        for name in CLI_COMMAND_NAMES {
            let spec = CommandSpec::new(name).arg("--version");
            let Ok(result) = exec::run(&spec, &Self::direct_options()).await else {
                continue;
            };
            if !result.success() {
                continue;
            }

            let version = extract_version(&result.stdout);
            // Pin down where the bare command actually lives, when possible.
            let cli_path = which::which(name)
                .map(|p| p.to_string_lossy().to_string())
                .unwrap_or_else(|_| name.to_string());

            tracing::debug!(
                target: "claude_scout::detect",
                command = name,
                path = %cli_path,
                "CLI answered a direct invocation"
            );
            return Some(self.accept(&cli_path, version, "direct", None).await);
        }
        None
    }

    async fn probe_user_override(&self) -> Option<DetectionResult> {
        let configured = self.override_path.as_deref()?;
        if !Path::new(configured).exists() {
            tracing::debug!(
                target: "claude_scout::detect",
                path = configured,
                "configured override path does not exist"
            );
            return None;
        }

        let version = self.probe_version(configured).await?;
        Some(
            self.accept(configured, Some(version), "user-configured", None)
                .await,
        )
    }

    fn effective_options(options: &ExecutionOptions) -> ExecutionOptions {
        let mut options = options.clone();
        options.timeout = Some(options.timeout.unwrap_or(CLI_TIMEOUT));
        options
    }

    fn detected(&self) -> Result<&DetectedCli, DetectError> {
        self.detected.as_ref().ok_or_else(|| DetectError::NotDetected {
            reason: "execute called before a successful detection".to_string(),
        })
    }
}

#[async_trait]
impl PlatformDetector for UnixDetector {
    fn platform(&self) -> HostPlatform {
        self.platform
    }

    fn execution_mode(&self) -> ExecutionMode {
        ExecutionMode::Native
    }

    async fn detect(&mut self) -> DetectionResult {
        for step in PROBE_STEPS {
            if let Some(result) = self.run_step(step).await {
                self.detected = result.cli_path.as_ref().map(|path| DetectedCli {
                    path: path.clone(),
                    version: result.version.clone(),
                });
                return result;
            }
        }

        self.detected = None;
        DetectionResult::not_found(
            self.platform,
            ExecutionMode::Native,
            ErrorKind::NotFound,
            "Claude CLI not found after exhausting the detection pipeline",
            None,
            install_suggestions(self.platform),
        )
    }

    async fn verify(&self, path: &str) -> bool {
        self.probe_version(path).await.is_some()
    }

    async fn execute(
        &self,
        args: &[String],
        working_dir: Option<&Path>,
        options: &ExecutionOptions,
    ) -> Result<ProcessResult, DetectError> {
        let detected = self.detected()?;

        let mut spec = CommandSpec::new(&detected.path).args(args.iter().cloned());
        if let Some(dir) = working_dir {
            spec = spec.cwd(dir);
        }

        exec::run(&spec, &Self::effective_options(options)).await
    }

    async fn start_session(
        &self,
        working_dir: Option<&Path>,
        args: &[String],
    ) -> Result<CliSession, DetectError> {
        let detected = self.detected()?;

        let mut spec = CommandSpec::new(&detected.path).args(args.iter().cloned());
        if let Some(dir) = working_dir {
            spec = spec.cwd(dir);
        }

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
        if !result.success || result.execution_mode != ExecutionMode::Native {
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
