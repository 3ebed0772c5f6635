//! claude-scout - cross-platform detection and execution of the Claude CLI
//!
//! Given an unknown host environment (macOS, Linux, Windows with Git Bash,
//! Windows with WSL), this crate determines whether the Claude CLI is
//! installed, the exact invocable path, which execution environment must
//! wrap invocations, and how to launch one-shot commands and long-lived
//! interactive sessions there — tolerating locale/encoding anomalies,
//! competing Node version managers, symlink indirection, and partial
//! failures at every probing step.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use claude_scout::{CliManager, ManagerConfig, ExecutionOptions};
//!
//! # async fn example() -> Result<(), claude_scout::DetectError> {
//! let mut manager = CliManager::new(ManagerConfig::default());
//!
//! let detection = manager.detect().await;
//! if detection.success {
//!     let output = manager
//!         .execute(&["--version".to_string()], None, &ExecutionOptions::cli())
//!         .await?;
//!     println!("{}", output.stdout);
//! } else {
//!     for suggestion in &detection.suggestions {
//!         eprintln!("try: {suggestion}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Detection results are cached on disk with a short TTL (long for
//! successes, short for failures); `redetect` clears the cache for a
//! guaranteed fresh probe. Deleting the cache file at any time is safe.

pub mod cache;
pub mod cli;
pub mod detect;
pub mod error;
pub mod exec;
pub mod git_bash;
pub mod manager;
pub mod ring_buffer;
pub mod session;
pub mod types;
pub mod wsl;
pub mod wslpath;

pub use cache::DetectionCache;
pub use detect::PlatformDetector;
pub use error::DetectError;
pub use manager::{CliManager, DetectionStats, InstallationInfo, ManagerConfig};
pub use session::{CliSession, SessionOutput};
pub use types::{
    DetectionResult, ErrorKind, ExecutionMode, ExecutionOptions, HostPlatform, ProcessResult,
};
