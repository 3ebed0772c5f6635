//! Command-line interface for claude-scout
//!
//! A thin layer over [`CliManager`]: detection, re-detection, one-shot
//! execution, installation listing, diagnostics, and path translation.

use crate::manager::{CliManager, ManagerConfig};
use crate::types::ExecutionOptions;
use crate::wslpath;
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "claude-scout",
    version,
    about = "Locate, verify and run the Claude CLI across native, WSL and Git Bash environments"
)]
pub struct Cli {
    /// Explicit CLI path to try after the automatic probes
    #[arg(long, global = true, value_name = "PATH")]
    pub cli_path: Option<String>,

    /// Preferred WSL distribution (Windows)
    #[arg(long, global = true, value_name = "NAME")]
    pub distro: Option<String>,

    /// Verbose logging (claude_scout=debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the detection pipeline (cache-first) and report the outcome
    Detect {
        /// Emit the result as JSON
        #[arg(long)]
        json: bool,
        /// Bypass and clear the cache before probing
        #[arg(long)]
        fresh: bool,
    },
    /// Clear the cache and run a guaranteed-fresh detection
    Redetect {
        /// Emit the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the invocable path of the detected CLI
    Which,
    /// Run the detected CLI with pass-through arguments
    Run {
        /// Working directory for the invocation
        #[arg(long, value_name = "DIR")]
        cwd: Option<PathBuf>,
        /// Arguments passed to the CLI verbatim
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// List known installations (detected + configured override)
    List {
        #[arg(long)]
        json: bool,
    },
    /// Show detection diagnostics
    Stats {
        #[arg(long)]
        json: bool,
    },
    /// Translate a path between Windows and WSL spellings
    Translate { path: String },
}

/// Initialize tracing for the binary: compact format, env-filter driven,
/// `-v` bumping this crate to debug.
pub fn init_tracing(verbose: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| {
            if verbose {
                EnvFilter::try_new("claude_scout=debug,info")
            } else {
                EnvFilter::try_new("claude_scout=info,warn")
            }
        })
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

/// Print a detection outcome (human or JSON form) and map it to an exit
/// code.
fn report_detection(result: &crate::types::DetectionResult, json: bool) -> Result<i32> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(i32::from(!result.success));
    }

    if result.success {
        println!(
            "Claude CLI {} at {} ({})",
            result.version.as_deref().unwrap_or("(unknown version)"),
            result.cli_path.as_deref().unwrap_or("?"),
            result.detection_method.as_deref().unwrap_or("?"),
        );
        if let Some(distro) = &result.distro {
            println!("WSL distribution: {distro}");
        }
        Ok(0)
    } else {
        if let Some(error) = &result.error {
            eprintln!("Detection failed: {}", error.message);
        }
        if !result.suggestions.is_empty() {
            eprintln!("Suggestions:");
            for suggestion in &result.suggestions {
                eprintln!("  - {suggestion}");
            }
        }
        Ok(1)
    }
}

impl Cli {
    fn manager_config(&self) -> ManagerConfig {
        ManagerConfig {
            override_path: self.cli_path.clone(),
            prefer_wsl: None,
            wsl_distro: self.distro.clone(),
            cache_path: None,
        }
    }

    /// Execute the selected subcommand. Returns the process exit code.
    pub async fn run(self) -> Result<i32> {
        match &self.command {
            Command::Detect { json, fresh } => {
                let mut manager = CliManager::new(self.manager_config());
                let result = if *fresh {
                    manager.redetect().await
                } else {
                    manager.detect().await
                };
                report_detection(&result, *json)
            }

            Command::Redetect { json } => {
                let mut manager = CliManager::new(self.manager_config());
                let result = manager.redetect().await;
                report_detection(&result, *json)
            }

            Command::Which => {
                let mut manager = CliManager::new(self.manager_config());
                let result = manager.detect().await;
                match result.cli_path {
                    Some(path) if result.success => {
                        println!("{path}");
                        Ok(0)
                    }
                    _ => {
                        eprintln!("Claude CLI not found");
                        Ok(1)
                    }
                }
            }

            Command::Run { cwd, args } => {
                let mut manager = CliManager::new(self.manager_config());
                let result = manager.detect().await;
                if !result.success {
                    eprintln!(
                        "Cannot run: {}",
                        result
                            .error
                            .map(|e| e.message)
                            .unwrap_or_else(|| "detection failed".to_string())
                    );
                    return Ok(1);
                }

                let outcome = manager
                    .execute(args, cwd.as_deref(), &ExecutionOptions::cli())
                    .await?;

                print!("{}", outcome.stdout);
                eprint!("{}", outcome.stderr);
                if outcome.timed_out {
                    eprintln!("(command timed out)");
                }
                Ok(outcome.exit_code.unwrap_or(1))
            }

            Command::List { json } => {
                let mut manager = CliManager::new(self.manager_config());
                let _ = manager.detect().await;
                let installations = manager.list_installations().await;

                if *json {
                    println!("{}", serde_json::to_string_pretty(&installations)?);
                } else if installations.is_empty() {
                    println!("No installations found");
                } else {
                    for install in &installations {
                        let version = install
                            .version
                            .as_deref()
                            .map(|v| format!(" ({v})"))
                            .unwrap_or_default();
                        println!("{}{}  [{}]", install.path, version, install.source);
                    }
                }
                Ok(0)
            }

            Command::Stats { json } => {
                let mut manager = CliManager::new(self.manager_config());
                let _ = manager.detect().await;
                let stats = manager.detection_stats();

                if *json {
                    println!("{}", serde_json::to_string_pretty(&stats)?);
                } else {
                    println!("platform:  {}", stats.platform.as_str());
                    println!("mode:      {}", stats.execution_mode.as_str());
                    println!("detected:  {}", stats.detected);
                    println!("cache:     {}", stats.cache_file);
                }
                Ok(0)
            }

            Command::Translate { path } => match wslpath::smart_convert(path) {
                Ok(converted) => {
                    println!("{converted}");
                    Ok(0)
                }
                Err(e) => {
                    eprintln!("{e}");
                    Ok(1)
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parses() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_collects_trailing_args() {
        let cli = Cli::parse_from([
            "claude-scout",
            "run",
            "--cwd",
            "/tmp",
            "--",
            "--print",
            "hello",
        ]);
        match cli.command {
            Command::Run { cwd, args } => {
                assert_eq!(cwd.as_deref(), Some(std::path::Path::new("/tmp")));
                assert_eq!(args, ["--print", "hello"]);
            }
            other => panic!("expected run, got {other:?}"),
        }
    }

    #[test]
    fn test_global_flags() {
        let cli = Cli::parse_from([
            "claude-scout",
            "--cli-path",
            "/opt/claude/bin/claude",
            "detect",
            "--json",
        ]);
        assert_eq!(cli.cli_path.as_deref(), Some("/opt/claude/bin/claude"));
        assert!(matches!(cli.command, Command::Detect { json: true, .. }));
    }
}
