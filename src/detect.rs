//! Platform detector contract and shared probing machinery
//!
//! One detector exists per host situation (Unix-native, Windows via Git
//! Bash, Windows via WSL). Each runs an ordered probe pipeline and returns
//! on the first success; pipeline exhaustion produces a structured failure
//! with platform-specific installation suggestions. Probe steps are an
//! explicit ordered list with uniform outcome signaling, so the pipelines
//! stay testable and extensible.

pub mod unix;
pub mod windows;
pub mod wsl;

use crate::error::DetectError;
use crate::session::CliSession;
use crate::types::{DetectionResult, ExecutionMode, ExecutionOptions, HostPlatform, ProcessResult};
use async_trait::async_trait;
use std::path::Path;

/// Command names the CLI may be installed under, in lookup order.
pub const CLI_COMMAND_NAMES: [&str; 2] = ["claude", "claude-code"];

/// Common contract implemented by the three platform detectors.
///
/// Detectors are stateful: a successful [`detect`](PlatformDetector::detect)
/// records the invocable path (and owning WSL distribution, where relevant)
/// that later [`execute`](PlatformDetector::execute) calls reuse. Calling an
/// execution method before a successful detection is a programming error and
/// fails fast.
#[async_trait]
pub trait PlatformDetector: Send + Sync {
    /// Host platform this detector serves.
    fn platform(&self) -> HostPlatform;

    /// How this detector wraps invocations.
    fn execution_mode(&self) -> ExecutionMode;

    /// Run the ordered probe pipeline. Always returns a result; failures are
    /// encoded in the result, never raised.
    async fn detect(&mut self) -> DetectionResult;

    /// Check that `path` is actually runnable (`--version` succeeds) in this
    /// detector's execution environment.
    async fn verify(&self, path: &str) -> bool;

    /// Invoke the detected CLI with pass-through arguments.
    async fn execute(
        &self,
        args: &[String],
        working_dir: Option<&Path>,
        options: &ExecutionOptions,
    ) -> Result<ProcessResult, DetectError>;

    /// Spawn a long-lived interactive session of the detected CLI.
    async fn start_session(
        &self,
        working_dir: Option<&Path>,
        args: &[String],
    ) -> Result<CliSession, DetectError>;

    /// Whether a successful detection is currently held.
    fn is_available(&self) -> bool;

    /// Version captured at detection time; errors before a successful detect.
    fn version(&self) -> Result<String, DetectError>;

    /// Restore detector state from a previously cached successful result, so
    /// execution can proceed without re-probing. Returns `false` when the
    /// result does not carry what this detector needs.
    fn restore(&mut self, result: &DetectionResult) -> bool;
}

// ============================================================================
// Version managers
// ============================================================================

/// A Node version manager that may own the CLI shim.
///
/// `lookup` is a POSIX shell snippet that exits non-zero when the manager is
/// absent and otherwise prints the CLI path the manager resolves. Probed in
/// declaration order: `nvm` owns the large majority of real installs, the
/// rest are general-purpose fallbacks.
#[derive(Debug, Clone, Copy)]
pub struct VersionManager {
    pub name: &'static str,
    pub lookup: &'static str,
}

pub const VERSION_MANAGERS: [VersionManager; 5] = [
    VersionManager {
        name: "nvm",
        lookup: "export NVM_DIR=\"$HOME/.nvm\"; [ -s \"$NVM_DIR/nvm.sh\" ] || exit 1; . \"$NVM_DIR/nvm.sh\" >/dev/null 2>&1; command -v claude",
    },
    VersionManager {
        name: "fnm",
        lookup: "command -v fnm >/dev/null 2>&1 || exit 1; eval \"$(fnm env 2>/dev/null)\"; command -v claude",
    },
    VersionManager {
        name: "volta",
        lookup: "command -v volta >/dev/null 2>&1 || exit 1; volta which claude 2>/dev/null",
    },
    VersionManager {
        name: "asdf",
        lookup: "command -v asdf >/dev/null 2>&1 || exit 1; asdf which claude 2>/dev/null",
    },
    VersionManager {
        name: "n",
        lookup: "command -v n >/dev/null 2>&1 || exit 1; command -v claude",
    },
];

/// Extract version-manager provenance from a symlink-resolved install path.
///
/// Returns the owning manager and, when the path encodes it, the managed
/// Node.js version (`~/.nvm/versions/node/v20.11.0/bin/claude` → `20.11.0`).
#[must_use]
pub fn provenance_from_path(resolved: &str) -> Option<(&'static str, Option<String>)> {
    let normalized = resolved.replace('\\', "/");

    if let Some(rest) = substr_after(&normalized, "/.nvm/versions/node/") {
        return Some(("nvm", node_version_segment(rest)));
    }
    if normalized.contains("/fnm/") || normalized.contains("/.fnm/") {
        let version = substr_after(&normalized, "/node-versions/").and_then(node_version_segment);
        return Some(("fnm", version));
    }
    if normalized.contains("/.volta/") || normalized.contains("/volta/") {
        return Some(("volta", None));
    }
    if let Some(rest) = substr_after(&normalized, "/.asdf/installs/nodejs/") {
        return Some(("asdf", node_version_segment(rest)));
    }
    if let Some(rest) = substr_after(&normalized, "/n/versions/node/") {
        return Some(("n", node_version_segment(rest)));
    }

    None
}

fn substr_after<'a>(haystack: &'a str, needle: &str) -> Option<&'a str> {
    haystack
        .find(needle)
        .map(|idx| &haystack[idx + needle.len()..])
}

/// First path segment, stripped of a leading `v`: `v20.11.0/bin/...` → `20.11.0`.
fn node_version_segment(rest: &str) -> Option<String> {
    let segment = rest.split('/').next()?.trim_start_matches('v');
    if segment.is_empty() {
        None
    } else {
        Some(segment.to_string())
    }
}

// ============================================================================
// Shared probing helpers
// ============================================================================

/// Pull a version number out of `claude --version` output.
///
/// The CLI prints shapes like `1.0.33 (Claude Code)` or `claude 2.1.0`;
/// the first whitespace token starting with a digit wins.
#[must_use]
pub fn extract_version(output: &str) -> Option<String> {
    output
        .split_whitespace()
        .map(|token| token.trim_start_matches('v'))
        .find(|token| token.starts_with(|c: char| c.is_ascii_digit()))
        .map(str::to_string)
}

/// Platform-specific installation suggestions for a NotFound outcome.
#[must_use]
pub fn install_suggestions(platform: HostPlatform) -> Vec<String> {
    let mut suggestions = vec!["npm install -g @anthropic-ai/claude-code".to_string()];

    match platform {
        HostPlatform::MacOs | HostPlatform::Linux => {
            suggestions.push("curl -fsSL https://claude.ai/install.sh | bash".to_string());
            suggestions.push(
                "If installed through a version manager (nvm, fnm, ...), open a new login shell and retry".to_string(),
            );
        }
        HostPlatform::Windows => {
            suggestions.push("irm https://claude.ai/install.ps1 | iex".to_string());
            suggestions.push(
                "Or install inside WSL: wsl -e npm install -g @anthropic-ai/claude-code"
                    .to_string(),
            );
        }
    }

    suggestions.push("Set an explicit CLI path in the application settings".to_string());
    suggestions
}

/// Suggestions for a host whose execution subsystem itself is missing.
#[must_use]
pub fn subsystem_suggestions(mode: ExecutionMode) -> Vec<String> {
    match mode {
        ExecutionMode::Wsl => vec![
            "Install WSL: wsl --install (then restart)".to_string(),
            "Install a distribution: wsl --install -d Ubuntu".to_string(),
            "Or install Git for Windows and use native mode: https://gitforwindows.org".to_string(),
        ],
        ExecutionMode::Native => vec![
            "Install Git for Windows (provides Git Bash): https://gitforwindows.org".to_string(),
            "winget install Git.Git".to_string(),
            "Or enable WSL: wsl --install".to_string(),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_manager_priority_order() {
        let names: Vec<&str> = VERSION_MANAGERS.iter().map(|m| m.name).collect();
        assert_eq!(names, ["nvm", "fnm", "volta", "asdf", "n"]);
    }

    #[test]
    fn test_version_manager_lookups_guard_absence() {
        // Every non-nvm lookup must bail out when its manager is missing,
        // otherwise it would shadow the plain PATH lookup step.
        for manager in VERSION_MANAGERS.iter().filter(|m| m.name != "nvm") {
            assert!(
                manager.lookup.contains("|| exit 1"),
                "{} lookup must guard on manager presence",
                manager.name
            );
        }
        assert!(VERSION_MANAGERS[0].lookup.contains("nvm.sh\" ] || exit 1"));
    }

    #[test]
    fn test_provenance_nvm_with_node_version() {
        let (manager, node) = provenance_from_path(
            "/Users/dev/.nvm/versions/node/v20.11.0/bin/claude",
        )
        .unwrap();
        assert_eq!(manager, "nvm");
        assert_eq!(node.as_deref(), Some("20.11.0"));
    }

    #[test]
    fn test_provenance_fnm() {
        let (manager, node) = provenance_from_path(
            "/home/dev/.local/share/fnm/node-versions/v22.2.0/installation/bin/claude",
        )
        .unwrap();
        assert_eq!(manager, "fnm");
        assert_eq!(node.as_deref(), Some("22.2.0"));
    }

    #[test]
    fn test_provenance_volta_without_version() {
        let (manager, node) = provenance_from_path("/home/dev/.volta/bin/claude").unwrap();
        assert_eq!(manager, "volta");
        assert!(node.is_none());
    }

    #[test]
    fn test_provenance_asdf_and_n() {
        let (manager, node) =
            provenance_from_path("/home/dev/.asdf/installs/nodejs/21.1.0/bin/claude").unwrap();
        assert_eq!(manager, "asdf");
        assert_eq!(node.as_deref(), Some("21.1.0"));

        let (manager, node) =
            provenance_from_path("/usr/local/n/versions/node/18.19.0/bin/claude").unwrap();
        assert_eq!(manager, "n");
        assert_eq!(node.as_deref(), Some("18.19.0"));
    }

    #[test]
    fn test_provenance_unmanaged_path() {
        assert!(provenance_from_path("/usr/local/bin/claude").is_none());
        assert!(provenance_from_path("/opt/homebrew/bin/claude").is_none());
    }

    #[test]
    fn test_extract_version() {
        assert_eq!(
            extract_version("1.0.33 (Claude Code)").as_deref(),
            Some("1.0.33")
        );
        assert_eq!(extract_version("claude 2.1.0").as_deref(), Some("2.1.0"));
        assert_eq!(extract_version("claude v2.1.0").as_deref(), Some("2.1.0"));
        assert!(extract_version("no digits here").is_none());
        assert!(extract_version("").is_none());
    }

    #[test]
    fn test_install_suggestions_are_platform_specific_and_nonempty() {
        for platform in [HostPlatform::MacOs, HostPlatform::Linux, HostPlatform::Windows] {
            let suggestions = install_suggestions(platform);
            assert!(!suggestions.is_empty());
            assert!(suggestions[0].contains("npm install"));
        }
        assert!(
            install_suggestions(HostPlatform::Windows)
                .iter()
                .any(|s| s.contains("wsl"))
        );
    }

    #[test]
    fn test_subsystem_suggestions_nonempty() {
        assert!(!subsystem_suggestions(ExecutionMode::Wsl).is_empty());
        assert!(!subsystem_suggestions(ExecutionMode::Native).is_empty());
    }
}
