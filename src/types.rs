//! Shared data model for detection results and execution options
//!
//! Everything that crosses the facade boundary (detection results, process
//! results, execution options) lives here so that the cache, the detectors,
//! and the CLI all serialize the same shapes.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Default timeout for cheap probing commands (version checks, `which`).
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// Default timeout for real Claude CLI invocations.
pub const CLI_TIMEOUT: Duration = Duration::from_secs(300);

/// Host platform the process is running on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HostPlatform {
    MacOs,
    Linux,
    Windows,
}

impl HostPlatform {
    /// The platform of the running process.
    #[must_use]
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            Self::MacOs
        } else if cfg!(target_os = "windows") {
            Self::Windows
        } else {
            Self::Linux
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::MacOs => "macos",
            Self::Linux => "linux",
            Self::Windows => "windows",
        }
    }
}

/// How Claude CLI invocations must be wrapped on this host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionMode {
    /// Spawn the CLI directly (or through Git Bash on Windows).
    Native,
    /// Route every invocation through `wsl.exe` into a distribution.
    Wsl,
}

impl ExecutionMode {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Native => "native",
            Self::Wsl => "wsl",
        }
    }
}

/// Serializable error classification carried inside a failed [`DetectionResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    NotFound,
    SubsystemUnavailable,
    PermissionDenied,
    ExecutionFailed,
    InvalidConfiguration,
}

/// Structured failure details for an unsuccessful detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionFailure {
    pub kind: ErrorKind,
    pub message: String,
    /// Raw diagnostic detail (last stderr, step trace), not user-facing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Outcome of one detection attempt.
///
/// Invariants:
/// - `success == true` implies `cli_path` is present and was verified
///   executable at detection time.
/// - `execution_mode == Wsl` implies `distro` is present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionResult {
    pub success: bool,
    pub platform: HostPlatform,
    pub execution_mode: ExecutionMode,
    /// Path or bare command name to invoke.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cli_path: Option<String>,
    /// Realpath after symlink resolution, when it differs from `cli_path`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Which probing step succeeded ("shell", "direct", "nvm", "cache", ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detection_method: Option<String>,
    /// WSL distribution hosting the CLI when `execution_mode == Wsl`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distro: Option<String>,
    /// Open provenance map (packageManager, nodeVersion, environment, ...).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<DetectionFailure>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
}

impl DetectionResult {
    /// Build a successful result. `resolved_path` collapses to `None` when it
    /// equals `cli_path`.
    #[must_use]
    pub fn found(
        platform: HostPlatform,
        execution_mode: ExecutionMode,
        cli_path: impl Into<String>,
        resolved_path: Option<String>,
        version: Option<String>,
        detection_method: impl Into<String>,
    ) -> Self {
        let cli_path = cli_path.into();
        let resolved_path = resolved_path.filter(|r| *r != cli_path);
        Self {
            success: true,
            platform,
            execution_mode,
            cli_path: Some(cli_path),
            resolved_path,
            version,
            detection_method: Some(detection_method.into()),
            distro: None,
            metadata: HashMap::new(),
            error: None,
            suggestions: Vec::new(),
        }
    }

    /// Build a failed result carrying the error classification and
    /// actionable installation suggestions.
    #[must_use]
    pub fn not_found(
        platform: HostPlatform,
        execution_mode: ExecutionMode,
        kind: ErrorKind,
        message: impl Into<String>,
        detail: Option<String>,
        suggestions: Vec<String>,
    ) -> Self {
        Self {
            success: false,
            platform,
            execution_mode,
            cli_path: None,
            resolved_path: None,
            version: None,
            detection_method: None,
            distro: None,
            metadata: HashMap::new(),
            error: Some(DetectionFailure {
                kind,
                message: message.into(),
                detail,
            }),
            suggestions,
        }
    }

    /// Attach a metadata entry (builder-style).
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Attach the owning WSL distribution (builder-style).
    #[must_use]
    pub fn with_distro(mut self, distro: impl Into<String>) -> Self {
        self.distro = Some(distro.into());
        self
    }

    /// The path preferred for de-duplication: resolved path when known,
    /// otherwise the invocable path.
    #[must_use]
    pub fn canonical_path(&self) -> Option<&str> {
        self.resolved_path.as_deref().or(self.cli_path.as_deref())
    }
}

/// How captured output bytes are decoded into strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputEncoding {
    /// Lossy UTF-8 (the default).
    #[default]
    Utf8,
    /// Explicit UTF-16LE decoding (some Windows tool output).
    Utf16Le,
    /// Sniff for UTF-16LE null-byte patterns, fall back to UTF-8.
    Auto,
}

/// Configuration accepted by every execution entry point.
///
/// All fields are optional with documented defaults: [`PROBE_TIMEOUT`] unless
/// overridden, inherited working directory and environment, UTF-8 decoding,
/// no login-shell wrapping.
#[derive(Debug, Clone, Default)]
pub struct ExecutionOptions {
    pub timeout: Option<Duration>,
    pub working_dir: Option<PathBuf>,
    pub env: HashMap<String, String>,
    pub output_encoding: OutputEncoding,
    /// Wrap the command through the user's interactive login shell so that
    /// version-manager PATH mutations from shell init files are honored.
    pub use_login_shell: bool,
}

impl ExecutionOptions {
    /// Options for cheap probing commands.
    #[must_use]
    pub fn probe() -> Self {
        Self {
            timeout: Some(PROBE_TIMEOUT),
            ..Self::default()
        }
    }

    /// Options for real CLI invocations (longer timeout).
    #[must_use]
    pub fn cli() -> Self {
        Self {
            timeout: Some(CLI_TIMEOUT),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_login_shell(mut self) -> Self {
        self.use_login_shell = true;
        self
    }

    #[must_use]
    pub fn with_encoding(mut self, encoding: OutputEncoding) -> Self {
        self.output_encoding = encoding;
        self
    }

    /// The effective timeout for this call.
    #[must_use]
    pub fn effective_timeout(&self) -> Duration {
        self.timeout.unwrap_or(PROBE_TIMEOUT)
    }
}

/// Terminal outcome of a one-shot command.
///
/// A non-zero exit or a timeout is a normal `ProcessResult`, never an error:
/// probing pipelines inspect `success()` and move on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessResult {
    /// Exit code; `None` when killed by signal or timed out.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    /// Terminating signal on Unix, when applicable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal: Option<i32>,
    pub timed_out: bool,
}

impl ProcessResult {
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == Some(0) && !self.timed_out
    }

    /// First non-empty trimmed stdout line, if any.
    #[must_use]
    pub fn first_line(&self) -> Option<&str> {
        self.stdout.lines().map(str::trim).find(|l| !l.is_empty())
    }
}
