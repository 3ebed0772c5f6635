//! WSL detector (Windows hosts routing the CLI through a distribution)
//!
//! Distributions are probed in enumeration order (preferred distro first
//! when configured) and the first distribution with a runnable CLI wins.
//! A lookup that prints a path does not guarantee the binary actually runs
//! in that shell configuration, so every candidate is verified by running
//! `--version` through the invocation-variant ladder before being accepted.

use crate::detect::{
    PlatformDetector, extract_version, install_suggestions, provenance_from_path,
    subsystem_suggestions,
};
use crate::error::DetectError;
use crate::exec::{self, CommandSpec};
use crate::session::CliSession;
use crate::types::{
    CLI_TIMEOUT, DetectionResult, ErrorKind, ExecutionMode, ExecutionOptions, HostPlatform,
    ProcessResult,
};
use crate::wsl::{self, WslDistribution};
use crate::wslpath::{self, PathKind};
use async_trait::async_trait;
use std::path::Path;

/// Per-distribution lookup commands, tried in order. Each prints a candidate
/// path on success.
const LOOKUP_COMMANDS: [(&str, &str, &str); 4] = [
    // (label, shell, command line)
    ("which", "sh", "command -v claude"),
    ("login-shell", "bash", "command -v claude"),
    (
        "nvm",
        "bash",
        "export NVM_DIR=\"$HOME/.nvm\"; [ -s \"$NVM_DIR/nvm.sh\" ] || exit 1; . \"$NVM_DIR/nvm.sh\" >/dev/null 2>&1; command -v claude",
    ),
    (
        "filesystem",
        "sh",
        "ls -1 \"$HOME\"/.nvm/versions/node/*/bin/claude \"$HOME\"/.local/bin/claude \"$HOME\"/.claude/local/claude /usr/local/bin/claude 2>/dev/null | head -n 1",
    ),
];

#[derive(Debug, Clone)]
struct DetectedWslCli {
    distro: String,
    path: String,
    version: Option<String>,
}

/// Detector for Windows hosts with a Linux subsystem.
#[derive(Debug)]
pub struct WslDetector {
    override_path: Option<String>,
    preferred_distro: Option<String>,
    detected: Option<DetectedWslCli>,
}

impl WslDetector {
    #[must_use]
    pub fn new(override_path: Option<String>, preferred_distro: Option<String>) -> Self {
        Self {
            override_path,
            preferred_distro,
            detected: None,
        }
    }

    /// Enumeration order: the configured distro first, then the manager's
    /// listing order.
    fn probe_order(&self, mut distros: Vec<WslDistribution>) -> Vec<WslDistribution> {
        if let Some(preferred) = &self.preferred_distro
            && let Some(idx) = distros.iter().position(|d| &d.name == preferred)
        {
            let preferred = distros.remove(idx);
            distros.insert(0, preferred);
        }
        distros
    }

    /// Run one lookup command in a distribution and return the printed path.
    async fn lookup_candidate(distro: &str, shell: &str, line: &str) -> Option<String> {
        let flag = if shell == "bash" { "-lc" } else { "-c" };
        let argv = vec![shell.to_string(), flag.to_string(), line.to_string()];
        let result = wsl::run_in_distro_direct(distro, &argv, &ExecutionOptions::probe())
            .await
            .ok()?;
        if !result.success() {
            return None;
        }
        result
            .first_line()
            .filter(|line| line.starts_with('/'))
            .map(str::to_string)
    }

    /// Verify a candidate path actually runs `--version` in this distro,
    /// through the variant ladder, and return the version string.
    async fn verify_in_distro(distro: &str, path: &str) -> Option<String> {
        let command_line = format!("\"{path}\" --version");
        let result = wsl::run_in_distro(distro, &command_line, &ExecutionOptions::probe())
            .await
            .ok()?;
        if result.success() {
            Some(extract_version(&result.stdout).unwrap_or_default())
        } else {
            None
        }
    }

    /// Probe one distribution through the lookup ladder plus the override.
    async fn probe_distro(&self, distro: &str) -> Option<(String, Option<String>, String)> {
        for (label, shell, line) in LOOKUP_COMMANDS {
            let Some(candidate) = Self::lookup_candidate(distro, shell, line).await else {
                continue;
            };

            if let Some(version) = Self::verify_in_distro(distro, &candidate).await {
                tracing::debug!(
                    target: "claude_scout::detect",
                    distro = distro,
                    lookup = label,
                    path = %candidate,
                    "CLI found in WSL distribution"
                );
                return Some((candidate, Some(version).filter(|v| !v.is_empty()), label.to_string()));
            }
        }

        if let Some(configured) = self.override_path.as_deref()
            && let Some(version) = Self::verify_in_distro(distro, configured).await
        {
            return Some((
                configured.to_string(),
                Some(version).filter(|v| !v.is_empty()),
                "user-configured".to_string(),
            ));
        }

        None
    }

    /// Build the `wsl.exe` spec that re-targets the owning distribution.
    fn wsl_spec(
        detected: &DetectedWslCli,
        args: &[String],
        working_dir: Option<&Path>,
    ) -> Result<CommandSpec, DetectError> {
        let mut spec = CommandSpec::new("wsl").args(["-d", detected.distro.as_str()]);

        if let Some(dir) = working_dir {
            let translated = translate_working_dir(dir)?;
            spec = spec.arg("--cd").arg(translated);
        }

        Ok(spec
            .arg("--exec")
            .arg(&detected.path)
            .args(args.iter().cloned()))
    }

    fn effective_options(options: &ExecutionOptions) -> ExecutionOptions {
        let mut options = options.clone();
        options.timeout = Some(options.timeout.unwrap_or(CLI_TIMEOUT));
        options
    }

    fn detected(&self) -> Result<&DetectedWslCli, DetectError> {
        self.detected.as_ref().ok_or_else(|| DetectError::NotDetected {
            reason: "execute called before a successful detection".to_string(),
        })
    }
}

/// A Windows working directory must become a `/mnt/...` path before it can
/// be handed to the subsystem; a path that is already WSL-shaped passes
/// through, anything else is rejected.
fn translate_working_dir(dir: &Path) -> Result<String, DetectError> {
    let raw = dir.to_string_lossy();
    match wslpath::detect_path_kind(&raw) {
        PathKind::Windows => wslpath::windows_to_wsl(&raw),
        PathKind::Wsl => Ok(raw.to_string()),
        PathKind::Unknown => Err(DetectError::InvalidConfiguration {
            reason: format!("working directory '{raw}' cannot be mapped into WSL"),
        }),
    }
}

#[async_trait]
impl PlatformDetector for WslDetector {
    fn platform(&self) -> HostPlatform {
        HostPlatform::Windows
    }

    fn execution_mode(&self) -> ExecutionMode {
        ExecutionMode::Wsl
    }

    async fn detect(&mut self) -> DetectionResult {
        let distros = match wsl::list_distributions().await {
            Ok(distros) if !distros.is_empty() => distros,
            Ok(_) => {
                self.detected = None;
                return DetectionResult::not_found(
                    HostPlatform::Windows,
                    ExecutionMode::Wsl,
                    ErrorKind::SubsystemUnavailable,
                    "WSL is installed but no distributions are available",
                    None,
                    subsystem_suggestions(ExecutionMode::Wsl),
                );
            }
            Err(e) => {
                self.detected = None;
                return DetectionResult::not_found(
                    HostPlatform::Windows,
                    ExecutionMode::Wsl,
                    ErrorKind::SubsystemUnavailable,
                    "WSL is not available on this host",
                    Some(e.to_string()),
                    subsystem_suggestions(ExecutionMode::Wsl),
                );
            }
        };

        let probe_order = self.probe_order(distros);
        let names: Vec<String> = probe_order.iter().map(|d| d.name.clone()).collect();

        for distro in &probe_order {
            if let Some((path, version, method)) = self.probe_distro(&distro.name).await {
                self.detected = Some(DetectedWslCli {
                    distro: distro.name.clone(),
                    path: path.clone(),
                    version: version.clone(),
                });

                let mut result = DetectionResult::found(
                    HostPlatform::Windows,
                    ExecutionMode::Wsl,
                    path.clone(),
                    None,
                    version,
                    format!("wsl:{method}"),
                )
                .with_distro(distro.name.clone())
                .with_metadata("environment", format!("WSL: {}", distro.name));

                if let Some((owner, node)) = provenance_from_path(&path) {
                    result = result.with_metadata("packageManager", owner);
                    if let Some(node) = node {
                        result = result.with_metadata("nodeVersion", node);
                    }
                }

                return result;
            }
        }

        self.detected = None;
        DetectionResult::not_found(
            HostPlatform::Windows,
            ExecutionMode::Wsl,
            ErrorKind::NotFound,
            format!(
                "Claude CLI not found in any WSL distribution ({})",
                names.join(", ")
            ),
            None,
            install_suggestions(HostPlatform::Windows),
        )
    }

    async fn verify(&self, path: &str) -> bool {
        // Verification targets the owning distro once detection has run,
        // otherwise the configured or default distribution.
        let distro = match &self.detected {
            Some(detected) => Some(detected.distro.clone()),
            None => match &self.preferred_distro {
                Some(preferred) => Some(preferred.clone()),
                None => wsl::list_distributions()
                    .await
                    .ok()
                    .and_then(|distros| distros.into_iter().next().map(|d| d.name)),
            },
        };

        match distro {
            Some(distro) => Self::verify_in_distro(&distro, path).await.is_some(),
            None => false,
        }
    }

    async fn execute(
        &self,
        args: &[String],
        working_dir: Option<&Path>,
        options: &ExecutionOptions,
    ) -> Result<ProcessResult, DetectError> {
        let detected = self.detected()?;
        let spec = Self::wsl_spec(detected, args, working_dir)?;
        exec::run(&spec, &Self::effective_options(options)).await
    }

    async fn start_session(
        &self,
        working_dir: Option<&Path>,
        args: &[String],
    ) -> Result<CliSession, DetectError> {
        let detected = self.detected()?;
        let spec = Self::wsl_spec(detected, args, working_dir)?;
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
        if !result.success || result.execution_mode != ExecutionMode::Wsl {
            return false;
        }
        let (Some(path), Some(distro)) = (result.cli_path.clone(), result.distro.clone()) else {
            return false;
        };
        self.detected = Some(DetectedWslCli {
            distro,
            path,
            version: result.version.clone(),
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn distro(name: &str, is_default: bool) -> WslDistribution {
        WslDistribution {
            name: name.to_string(),
            version: Some(2),
            state: crate::wsl::DistroState::Running,
            is_default,
        }
    }

    #[test]
    fn test_probe_order_prefers_configured_distro() {
        let detector = WslDetector::new(None, Some("Debian".to_string()));
        let ordered = detector.probe_order(vec![distro("Ubuntu", true), distro("Debian", false)]);
        assert_eq!(ordered[0].name, "Debian");
        assert_eq!(ordered[1].name, "Ubuntu");
    }

    #[test]
    fn test_probe_order_keeps_enumeration_order_without_preference() {
        let detector = WslDetector::new(None, None);
        let ordered = detector.probe_order(vec![distro("Ubuntu", true), distro("Debian", false)]);
        assert_eq!(ordered[0].name, "Ubuntu");
        assert_eq!(ordered[1].name, "Debian");
    }

    #[test]
    fn test_lookup_commands_order() {
        let labels: Vec<&str> = LOOKUP_COMMANDS.iter().map(|(label, _, _)| *label).collect();
        assert_eq!(labels, ["which", "login-shell", "nvm", "filesystem"]);
    }

    #[test]
    fn test_translate_working_dir() {
        assert_eq!(
            translate_working_dir(Path::new("C:\\Users\\dev\\proj")).unwrap(),
            "/mnt/c/Users/dev/proj"
        );
        assert_eq!(
            translate_working_dir(Path::new("/mnt/c/Users/dev")).unwrap(),
            "/mnt/c/Users/dev"
        );
        assert!(translate_working_dir(Path::new("relative/dir")).is_err());
    }

    #[test]
    fn test_restore_requires_distro() {
        let mut detector = WslDetector::new(None, None);

        let missing_distro = DetectionResult::found(
            HostPlatform::Windows,
            ExecutionMode::Wsl,
            "/usr/local/bin/claude",
            None,
            None,
            "wsl:which",
        );
        assert!(!detector.restore(&missing_distro));

        let complete = missing_distro.clone().with_distro("Ubuntu-22.04");
        assert!(detector.restore(&complete));
        assert!(detector.is_available());
    }

    #[test]
    fn test_wsl_spec_targets_owning_distro() {
        let detected = DetectedWslCli {
            distro: "Debian".to_string(),
            path: "/home/dev/.local/bin/claude".to_string(),
            version: None,
        };
        let spec = WslDetector::wsl_spec(
            &detected,
            &["--print".to_string(), "hello".to_string()],
            Some(Path::new("C:\\work")),
        )
        .unwrap();

        let args: Vec<String> = spec
            .args
            .iter()
            .map(|a| a.to_string_lossy().to_string())
            .collect();
        assert_eq!(
            args,
            [
                "-d",
                "Debian",
                "--cd",
                "/mnt/c/work",
                "--exec",
                "/home/dev/.local/bin/claude",
                "--print",
                "hello"
            ]
        );
    }
}
