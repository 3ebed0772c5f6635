//! WSL (Windows Subsystem for Linux) detection and execution
//!
//! Lists installed distributions by parsing `wsl.exe -l -v` and executes
//! commands inside a named distribution. The listing output may be UTF-16LE
//! depending on the host locale, so raw bytes are normalized before parsing;
//! a listing line that cannot be parsed is skipped, never fatal.

use crate::error::DetectError;
use crate::exec::{self, CommandSpec};
use crate::types::{ExecutionOptions, OutputEncoding, ProcessResult};
use serde::{Deserialize, Serialize};

/// Run state of a WSL distribution as reported by the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DistroState {
    Running,
    Stopped,
    Unknown,
}

/// One installed WSL distribution. Discovered from the manager's listing,
/// never created by this crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WslDistribution {
    pub name: String,
    /// WSL version (1 or 2) when the listing reports it.
    pub version: Option<u32>,
    pub state: DistroState,
    pub is_default: bool,
}

/// Check if WSL is usable on this host: Windows, `wsl.exe` present, and at
/// least one distribution installed.
pub async fn is_wsl_available() -> bool {
    if !cfg!(target_os = "windows") {
        return false;
    }

    match list_distributions().await {
        Ok(distros) => !distros.is_empty(),
        Err(_) => false,
    }
}

/// Enumerate installed distributions via `wsl.exe -l -v`.
///
/// Returns `SubsystemUnavailable` when `wsl.exe` itself cannot run; an empty
/// list when it runs but reports nothing usable.
pub async fn list_distributions() -> Result<Vec<WslDistribution>, DetectError> {
    if !cfg!(target_os = "windows") {
        return Err(DetectError::SubsystemUnavailable {
            reason: "WSL is only available on Windows".to_string(),
        });
    }

    let options = ExecutionOptions::probe().with_encoding(OutputEncoding::Auto);
    let result = exec::run(&CommandSpec::new("wsl").args(["-l", "-v"]), &options)
        .await
        .map_err(|e| DetectError::SubsystemUnavailable {
            reason: format!("Failed to execute wsl.exe: {e}"),
        })?;

    if !result.success() {
        return Err(DetectError::SubsystemUnavailable {
            reason: format!(
                "wsl.exe -l -v failed (exit code {:?}): {}",
                result.exit_code,
                result.stderr.trim()
            ),
        });
    }

    Ok(parse_distro_listing(&result.stdout))
}

/// Parse the text of a `wsl -l -v` listing.
///
/// Expected shape (locale-dependent header, `*` marking the default):
///
/// ```text
///   NAME            STATE           VERSION
/// * Ubuntu-22.04    Running         2
///   Debian          Stopped         2
/// ```
///
/// The header row is skipped, the default marker may be attached or
/// detached, state words are matched loosely (localized synonyms reduce to
/// their running/stopped stems), and unparsable lines are dropped.
#[must_use]
pub fn parse_distro_listing(text: &str) -> Vec<WslDistribution> {
    let mut distros = Vec::new();

    for line in text.lines() {
        let line = line.trim().trim_matches('\u{feff}');
        if line.is_empty() {
            continue;
        }

        // Header row: column titles, wherever the manager put them.
        let upper = line.to_uppercase();
        if upper.contains("NAME") && (upper.contains("STATE") || upper.contains("VERSION")) {
            continue;
        }

        let (is_default, rest) = match line.strip_prefix('*') {
            Some(rest) => (true, rest.trim_start()),
            None => (false, line),
        };

        let mut fields = rest.split_whitespace();
        let Some(name) = fields.next() else {
            continue;
        };
        // Defensive: a name made of control characters means the encoding
        // normalization failed for this locale; skip rather than report
        // garbage.
        if name.chars().any(char::is_control) {
            continue;
        }

        let state_field = fields.next();
        let version = fields.next().and_then(|v| v.parse::<u32>().ok());

        let state = match state_field {
            Some(word) => {
                let word = word.to_lowercase();
                if word.contains("run") {
                    DistroState::Running
                } else if word.contains("stop") || word.contains("install") {
                    DistroState::Stopped
                } else {
                    DistroState::Unknown
                }
            }
            None => DistroState::Unknown,
        };

        // "(Default)" suffix style used by some wsl.exe builds.
        let is_default = is_default || rest.to_lowercase().contains("(default)");

        distros.push(WslDistribution {
            name: name.to_string(),
            version,
            state,
            is_default,
        });
    }

    distros
}

/// Invocation variants tried in order by [`run_in_distro`].
///
/// The same logical command can fail for different reasons in a WSL distro:
/// no interactive shell init (version-manager shims missing from PATH), a
/// profile that only login shells read, or an nvm install that only an
/// explicit activation exposes. Each variant addresses one of those.
fn invocation_variants(command_line: &str) -> Vec<(&'static str, Vec<String>)> {
    vec![
        (
            "direct",
            vec!["sh".into(), "-c".into(), command_line.to_string()],
        ),
        (
            "login-shell",
            vec!["bash".into(), "-lc".into(), command_line.to_string()],
        ),
        (
            "profile",
            vec![
                "bash".into(),
                "-c".into(),
                format!(". ~/.profile >/dev/null 2>&1; {command_line}"),
            ],
        ),
        (
            "nvm",
            vec![
                "bash".into(),
                "-c".into(),
                format!(
                    "export NVM_DIR=\"$HOME/.nvm\"; [ -s \"$NVM_DIR/nvm.sh\" ] && . \"$NVM_DIR/nvm.sh\"; {command_line}"
                ),
            ],
        ),
    ]
}

/// Execute a command line inside a named distribution, trying the variant
/// ladder until one succeeds.
///
/// Returns the first successful [`ProcessResult`], or the last variant's
/// failed result when nothing succeeds — a failed command is an ordinary
/// result here, so callers can treat it as "try the next probing step".
pub async fn run_in_distro(
    distro: &str,
    command_line: &str,
    options: &ExecutionOptions,
) -> Result<ProcessResult, DetectError> {
    let mut last: Option<ProcessResult> = None;

    for (variant, argv) in invocation_variants(command_line) {
        let spec = CommandSpec::new("wsl")
            .args(["-d", distro, "--"])
            .args(argv);

        let result = exec::run(&spec, options).await?;
        if result.success() {
            tracing::debug!(
                target: "claude_scout::wsl",
                distro = distro,
                variant = variant,
                "command succeeded in distribution"
            );
            return Ok(result);
        }
        last = Some(result);
    }

    Ok(last.unwrap_or(ProcessResult {
        exit_code: None,
        stdout: String::new(),
        stderr: String::new(),
        signal: None,
        timed_out: false,
    }))
}

/// Run a single invocation (no variant ladder) inside a distribution.
pub async fn run_in_distro_direct(
    distro: &str,
    argv: &[String],
    options: &ExecutionOptions,
) -> Result<ProcessResult, DetectError> {
    let spec = CommandSpec::new("wsl")
        .args(["-d", distro, "--"])
        .args(argv.iter().cloned());
    exec::run(&spec, options).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::decode_output;

    #[test]
    fn test_parse_listing_with_header_and_default_marker() {
        let text = "  NAME            STATE           VERSION\n\
                    * Ubuntu-22.04    Running         2\n\
                    \x20 Debian          Stopped         2\n";
        let distros = parse_distro_listing(text);
        assert_eq!(distros.len(), 2);

        assert_eq!(distros[0].name, "Ubuntu-22.04");
        assert!(distros[0].is_default);
        assert_eq!(distros[0].state, DistroState::Running);
        assert_eq!(distros[0].version, Some(2));

        assert_eq!(distros[1].name, "Debian");
        assert!(!distros[1].is_default);
        assert_eq!(distros[1].state, DistroState::Stopped);
    }

    #[test]
    fn test_parse_listing_crlf_line_endings() {
        let text = "  NAME    STATE      VERSION\r\n* Ubuntu  Running    2\r\n";
        let distros = parse_distro_listing(text);
        assert_eq!(distros.len(), 1);
        assert_eq!(distros[0].name, "Ubuntu");
    }

    #[test]
    fn test_parse_listing_state_synonyms() {
        let text = "  NAME     STATE        VERSION\n\
                    \x20 One      running      2\n\
                    \x20 Two      Installing   2\n\
                    \x20 Three    Mystery      1\n";
        let distros = parse_distro_listing(text);
        assert_eq!(distros[0].state, DistroState::Running);
        assert_eq!(distros[1].state, DistroState::Stopped);
        assert_eq!(distros[2].state, DistroState::Unknown);
        assert_eq!(distros[2].version, Some(1));
    }

    #[test]
    fn test_parse_listing_skips_blank_and_unparsable_lines() {
        let text = "  NAME  STATE  VERSION\n\n   \n  Ubuntu  Running  2\n";
        let distros = parse_distro_listing(text);
        assert_eq!(distros.len(), 1);
    }

    #[test]
    fn test_parse_listing_name_only_line() {
        // Quiet-style output (no state columns) still yields names.
        let text = "Ubuntu-22.04\nDebian\n";
        let distros = parse_distro_listing(text);
        assert_eq!(distros.len(), 2);
        assert_eq!(distros[0].state, DistroState::Unknown);
    }

    #[test]
    fn test_utf16le_listing_round_trip_has_clean_names() {
        // Simulate the 16-bit-per-character output some locales produce:
        // encode a listing as UTF-16LE and push it through the same
        // normalization the live path uses.
        let listing = "  NAME    STATE    VERSION\n* Ubuntu  Running  2\n";
        let raw: Vec<u8> = listing
            .encode_utf16()
            .flat_map(u16::to_le_bytes)
            .collect();
        assert!(raw.iter().filter(|&&b| b == 0).count() > raw.len() / 3);

        let text = decode_output(&raw, OutputEncoding::Auto);
        let distros = parse_distro_listing(&text);
        assert_eq!(distros.len(), 1);
        assert_eq!(distros[0].name, "Ubuntu");
        assert!(
            distros[0].name.chars().all(|c| !c.is_control()),
            "distro names must contain no control characters"
        );
    }

    #[test]
    fn test_invocation_variants_order() {
        let variants = invocation_variants("which claude");
        let names: Vec<&str> = variants.iter().map(|(name, _)| *name).collect();
        assert_eq!(names, ["direct", "login-shell", "profile", "nvm"]);
        // Every variant carries the original command line.
        for (_, argv) in &variants {
            assert!(argv.last().unwrap().contains("which claude"));
        }
    }

    #[cfg(not(target_os = "windows"))]
    #[tokio::test]
    async fn test_wsl_unavailable_off_windows() {
        assert!(!is_wsl_available().await);
        assert!(matches!(
            list_distributions().await,
            Err(DetectError::SubsystemUnavailable { .. })
        ));
    }
}
