//! Detection manager: the facade the rest of the application talks to
//!
//! Selects exactly one platform detector at construction (never switched at
//! runtime), consults the on-disk cache before probing, and owns "the
//! current result". Constructed explicitly by the application's composition
//! root and passed to callers — there is no global singleton.

use crate::cache::DetectionCache;
use crate::detect::PlatformDetector;
use crate::detect::unix::UnixDetector;
use crate::detect::windows::WindowsDetector;
use crate::detect::wsl::WslDetector;
use crate::error::DetectError;
use crate::exec;
use crate::session::CliSession;
use crate::types::{
    DetectionResult, ExecutionOptions, HostPlatform, OutputEncoding, ProcessResult,
};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Configuration injected by the composition root.
#[derive(Debug, Clone, Default)]
pub struct ManagerConfig {
    /// User-configured absolute CLI path; re-verified before use, never
    /// trusted blindly.
    pub override_path: Option<String>,
    /// Windows only: `Some(true)` forces the WSL detector, `Some(false)`
    /// forces Git Bash, `None` picks WSL when it is present.
    pub prefer_wsl: Option<bool>,
    /// Preferred WSL distribution, probed before the enumeration order.
    pub wsl_distro: Option<String>,
    /// Alternate cache file (tests, secondary profiles).
    pub cache_path: Option<PathBuf>,
}

/// Diagnostic snapshot combining the last result with platform metadata.
#[derive(Debug, Clone, Serialize)]
pub struct DetectionStats {
    pub platform: HostPlatform,
    pub execution_mode: crate::types::ExecutionMode,
    pub detected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_result: Option<DetectionResult>,
    pub cache_file: String,
}

/// One known installation, for settings UIs that list choices.
#[derive(Debug, Clone, Serialize)]
pub struct InstallationInfo {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub source: String,
}

/// Facade over detection and execution of the Claude CLI.
pub struct CliManager {
    detector: Box<dyn PlatformDetector>,
    cache: DetectionCache,
    config: ManagerConfig,
    last: Option<DetectionResult>,
}

impl CliManager {
    /// Build the manager, selecting the platform detector for this host.
    #[must_use]
    pub fn new(config: ManagerConfig) -> Self {
        let detector = build_detector(&config);
        let cache = match &config.cache_path {
            Some(path) => DetectionCache::with_path(path.clone()),
            None => DetectionCache::new(),
        };

        tracing::debug!(
            target: "claude_scout::manager",
            platform = HostPlatform::current().as_str(),
            mode = detector.execution_mode().as_str(),
            "detector selected"
        );

        Self {
            detector,
            cache,
            config,
            last: None,
        }
    }

    /// Detect the CLI, consulting the cache first. Produces a fresh
    /// [`DetectionResult`] per call; cache hits report
    /// `detection_method == "cache"`.
    pub async fn detect(&mut self) -> DetectionResult {
        if let Some(mut hit) = self.cache.get() {
            // Failure entries short-circuit too (their TTL is short); a
            // success entry must also re-arm the detector for execution.
            if !hit.success || self.detector.restore(&hit) {
                hit.detection_method = Some("cache".to_string());
                self.last = Some(hit.clone());
                tracing::debug!(target: "claude_scout::manager", "detection served from cache");
                return hit;
            }
        }

        self.run_pipeline().await
    }

    /// Clear the on-disk cache, then run the full pipeline. Used when the
    /// user changes configuration and a fresh probe must be guaranteed.
    pub async fn redetect(&mut self) -> DetectionResult {
        self.cache.clear();
        self.run_pipeline().await
    }

    async fn run_pipeline(&mut self) -> DetectionResult {
        let result = self.detector.detect().await;
        self.cache.put(&result);
        self.last = Some(result.clone());

        if result.success {
            tracing::info!(
                target: "claude_scout::manager",
                path = result.cli_path.as_deref().unwrap_or(""),
                method = result.detection_method.as_deref().unwrap_or(""),
                "Claude CLI detected"
            );
        } else {
            tracing::info!(
                target: "claude_scout::manager",
                kind = ?result.error.as_ref().map(|e| e.kind),
                "Claude CLI detection failed"
            );
        }

        result
    }

    /// The last result, successful or not.
    #[must_use]
    pub fn last_result(&self) -> Option<&DetectionResult> {
        self.last.as_ref()
    }

    fn require_detected(&self) -> Result<&DetectionResult, DetectError> {
        match &self.last {
            Some(result) if result.success => Ok(result),
            Some(_) => Err(DetectError::NotDetected {
                reason: "last detection failed; fix the installation or call redetect".to_string(),
            }),
            None => Err(DetectError::NotDetected {
                reason: "execute called before detect; run detection first".to_string(),
            }),
        }
    }

    /// Invoke the detected CLI with pass-through arguments. Fails fast when
    /// no successful detection is held — no lazy detection.
    pub async fn execute(
        &self,
        args: &[String],
        working_dir: Option<&Path>,
        options: &ExecutionOptions,
    ) -> Result<ProcessResult, DetectError> {
        self.require_detected()?;
        self.detector.execute(args, working_dir, options).await
    }

    /// Spawn a long-lived interactive session of the detected CLI.
    pub async fn start_session(
        &self,
        working_dir: Option<&Path>,
        args: &[String],
    ) -> Result<CliSession, DetectError> {
        self.require_detected()?;
        self.detector.start_session(working_dir, args).await
    }

    /// Re-check that a path is runnable in the active execution environment.
    pub async fn verify(&self, path: &str) -> bool {
        self.detector.verify(path).await
    }

    /// Version of the detected CLI.
    pub fn version(&self) -> Result<String, DetectError> {
        self.require_detected()?;
        self.detector.version()
    }

    /// Diagnostics for support bundles and status panes.
    #[must_use]
    pub fn detection_stats(&self) -> DetectionStats {
        DetectionStats {
            platform: self.detector.platform(),
            execution_mode: self.detector.execution_mode(),
            detected: self.last.as_ref().is_some_and(|r| r.success),
            last_result: self.last.clone(),
            cache_file: self.cache.path().display().to_string(),
        }
    }

    /// Known installations, de-duplicated by resolved path, with the user
    /// override appended when it is not already discovered (re-verified
    /// first).
    pub async fn list_installations(&self) -> Vec<InstallationInfo> {
        let mut installations = Vec::new();

        if let Some(result) = self.last.as_ref().filter(|r| r.success)
            && let Some(path) = result.cli_path.clone()
        {
            installations.push(InstallationInfo {
                path,
                resolved_path: result.resolved_path.clone(),
                version: result.version.clone(),
                source: result
                    .detection_method
                    .clone()
                    .unwrap_or_else(|| "detected".to_string()),
            });
        }

        if let Some(configured) = self.config.override_path.clone() {
            let already_known = installations.iter().any(|install| {
                install.path == configured
                    || install.resolved_path.as_deref() == Some(configured.as_str())
            });

            if !already_known && self.detector.verify(&configured).await {
                installations.push(InstallationInfo {
                    path: configured,
                    resolved_path: None,
                    version: None,
                    source: "user-configured".to_string(),
                });
            }
        }

        installations
    }
}

/// Pick the one detector for this host. On Windows the WSL detector wins
/// when WSL is present (or explicitly requested); everything else is
/// native.
fn build_detector(config: &ManagerConfig) -> Box<dyn PlatformDetector> {
    match HostPlatform::current() {
        HostPlatform::Windows => {
            let use_wsl = config.prefer_wsl.unwrap_or_else(wsl_present);
            if use_wsl {
                Box::new(WslDetector::new(
                    config.override_path.clone(),
                    config.wsl_distro.clone(),
                ))
            } else {
                Box::new(WindowsDetector::new(config.override_path.clone()))
            }
        }
        HostPlatform::MacOs | HostPlatform::Linux => {
            Box::new(UnixDetector::new(config.override_path.clone()))
        }
    }
}

/// Synchronous WSL presence check for the construction-time decision
/// (`wsl.exe -l -q` succeeding with at least one distribution).
fn wsl_present() -> bool {
    if !cfg!(target_os = "windows") {
        return false;
    }

    match std::process::Command::new("wsl").args(["-l", "-q"]).output() {
        Ok(output) if output.status.success() => {
            let text = exec::decode_output(&output.stdout, OutputEncoding::Auto);
            text.lines().any(|line| !line.trim().is_empty())
        }
        _ => false,
    }
}
