//! Command execution primitive
//!
//! All process execution goes through [`CommandSpec`] to ensure argv-style
//! invocation. Shell wrapping is never implicit: callers that need a shell
//! (or the user's login shell, so that version-manager PATH mutations from
//! shell init files are honored) construct one explicitly via
//! [`shell_spec`] / [`login_shell_spec`].
//!
//! [`run`] waits for completion and captures both streams through bounded
//! ring buffers. A non-zero exit or a timeout is a normal [`ProcessResult`],
//! not an error — probing pipelines inspect `success()` and move on.

use crate::error::DetectError;
use crate::ring_buffer::RingBuffer;
use crate::types::{ExecutionOptions, OutputEncoding, ProcessResult};
use std::collections::HashMap;
use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command as TokioCommand;
use tokio::time::timeout;

/// Maximum bytes retained from stdout of a one-shot command.
pub const STDOUT_CAP_BYTES: usize = 2 * 1024 * 1024;

/// Maximum bytes retained from stderr of a one-shot command.
pub const STDERR_CAP_BYTES: usize = 256 * 1024;

// ============================================================================
// CommandSpec - argv-style process specification
// ============================================================================

/// Specification for a command to execute.
///
/// Arguments are `Vec<OsString>` elements, never concatenated shell strings,
/// so user data crossing this boundary cannot be interpreted by a shell.
#[derive(Debug, Clone, Default)]
pub struct CommandSpec {
    /// The program to execute
    pub program: OsString,
    /// Arguments as discrete elements (NOT shell strings)
    pub args: Vec<OsString>,
    /// Optional working directory
    pub cwd: Option<PathBuf>,
    /// Optional environment overrides
    pub env: Option<HashMap<OsString, OsString>>,
}

impl CommandSpec {
    /// Create a new `CommandSpec` with the given program.
    #[must_use]
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: None,
        }
    }

    /// Add a single argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the working directory.
    #[must_use]
    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Set an environment variable.
    #[must_use]
    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.env
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Convert into a `tokio::process::Command` for async execution.
    #[must_use]
    pub fn to_tokio_command(&self) -> TokioCommand {
        let mut cmd = TokioCommand::new(&self.program);
        cmd.args(&self.args);

        if let Some(ref cwd) = self.cwd {
            cmd.current_dir(cwd);
        }

        if let Some(ref env) = self.env {
            for (key, value) in env {
                cmd.env(key, value);
            }
        }

        cmd
    }
}

// ============================================================================
// Shell wrapping - explicit, never implicit
// ============================================================================

/// Wrap a command line in the platform's non-interactive shell
/// (`sh -c` on Unix, `cmd /C` on Windows).
#[must_use]
pub fn shell_spec(command_line: &str) -> CommandSpec {
    if cfg!(target_os = "windows") {
        CommandSpec::new("cmd").args(["/C", command_line])
    } else {
        CommandSpec::new("sh").args(["-c", command_line])
    }
}

/// Wrap a command line in the user's interactive login shell.
///
/// GUI-launched processes on macOS and Linux do not inherit a login shell's
/// environment, so PATH mutations performed by version managers in shell
/// init files are invisible to them. Running probes through `$SHELL -l -c`
/// restores that environment. On Windows there is no login-shell concept and
/// this degrades to [`shell_spec`].
#[must_use]
pub fn login_shell_spec(command_line: &str) -> CommandSpec {
    if cfg!(target_os = "windows") {
        return shell_spec(command_line);
    }

    let shell = std::env::var("SHELL").unwrap_or_else(|_| "/bin/bash".to_string());
    CommandSpec::new(shell).args(["-l", "-c", command_line])
}

/// PATH with well-known installation directories prepended.
///
/// GUI-launched processes often start with a truncated PATH; lookups
/// (`which`, `command -v`) run with this augmented value so that Homebrew,
/// user-local, and npm-global installs are visible.
#[cfg(unix)]
#[must_use]
pub fn augmented_path() -> String {
    let mut entries: Vec<String> = Vec::new();

    if let Some(home) = dirs::home_dir() {
        for rel in [
            ".claude/local",
            ".local/bin",
            ".npm-global/bin",
            ".yarn/bin",
            ".bun/bin",
        ] {
            entries.push(home.join(rel).to_string_lossy().to_string());
        }
    }

    for fixed in ["/opt/homebrew/bin", "/usr/local/bin", "/usr/bin", "/bin"] {
        entries.push(fixed.to_string());
    }

    if let Ok(inherited) = std::env::var("PATH") {
        for entry in inherited.split(':') {
            if !entry.is_empty() && !entries.iter().any(|e| e == entry) {
                entries.push(entry.to_string());
            }
        }
    }

    entries.join(":")
}

// ============================================================================
// Output decoding
// ============================================================================

/// Decode captured output bytes according to the requested encoding.
///
/// `Auto` sniffs for UTF-16LE (null-byte-heavy output emitted by some
/// Windows tools under certain locales) and transcodes before falling back
/// to lossy UTF-8.
#[must_use]
pub fn decode_output(raw: &[u8], encoding: OutputEncoding) -> String {
    match encoding {
        OutputEncoding::Utf8 => String::from_utf8_lossy(raw).to_string(),
        OutputEncoding::Utf16Le => decode_utf16le(raw),
        OutputEncoding::Auto => {
            if looks_like_utf16le(raw) {
                decode_utf16le(raw)
            } else {
                String::from_utf8_lossy(raw).to_string()
            }
        }
    }
}

/// Heuristic: ASCII text encoded as UTF-16LE has a null in every odd
/// position, so sample the first few odd bytes.
fn looks_like_utf16le(raw: &[u8]) -> bool {
    raw.len() >= 4
        && raw.len() % 2 == 0
        && raw
            .iter()
            .skip(1)
            .step_by(2)
            .take(10)
            .filter(|&&b| b == 0x00)
            .count()
            >= 5
}

fn decode_utf16le(raw: &[u8]) -> String {
    let units: Vec<u16> = raw
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    String::from_utf16_lossy(&units)
}

// ============================================================================
// One-shot execution
// ============================================================================

/// Run a command line through the (optionally login) shell.
///
/// Convenience wrapper over [`run`] for callers that hold a command line
/// rather than discrete argv elements (version-manager activation snippets,
/// `command -v` probes).
pub async fn run_line(
    command_line: &str,
    options: &ExecutionOptions,
) -> Result<ProcessResult, DetectError> {
    let spec = if options.use_login_shell {
        login_shell_spec(command_line)
    } else {
        shell_spec(command_line)
    };
    run(&spec, options).await
}

/// Execute a command to completion, capturing both streams.
///
/// - Non-zero exit: `Ok` with the exit code — never an error.
/// - Timeout: the whole process tree is killed and `Ok` is returned with
///   `timed_out = true` and `exit_code = None`.
/// - `Err` is reserved for spawn failures (program missing, permission
///   denied) and pipe plumbing failures.
pub async fn run(
    spec: &CommandSpec,
    options: &ExecutionOptions,
) -> Result<ProcessResult, DetectError> {
    let mut cmd = spec.to_tokio_command();

    if let Some(dir) = &options.working_dir {
        cmd.current_dir(dir);
    }
    for (key, value) in &options.env {
        cmd.env(key, value);
    }

    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    configure_process_group(&mut cmd);

    #[cfg(windows)]
    let job = JobObjectHandle::create()?;

    let mut child = cmd.spawn().map_err(|e| spawn_error(spec, &e))?;

    #[cfg(windows)]
    job.assign(&child)?;

    let child_id = child.id();

    let mut stdout_pipe = child
        .stdout
        .take()
        .ok_or_else(|| DetectError::ExecutionFailed {
            reason: "Failed to capture stdout".to_string(),
        })?;
    let mut stderr_pipe = child
        .stderr
        .take()
        .ok_or_else(|| DetectError::ExecutionFailed {
            reason: "Failed to capture stderr".to_string(),
        })?;

    let mut stdout_buffer = RingBuffer::new(STDOUT_CAP_BYTES);
    let mut stderr_buffer = RingBuffer::new(STDERR_CAP_BYTES);

    let duration = options.effective_timeout();

    let read_future = async {
        let mut stdout_buf = vec![0u8; 8192];
        let mut stderr_buf = vec![0u8; 8192];
        let mut stdout_done = false;
        let mut stderr_done = false;

        while !(stdout_done && stderr_done) {
            tokio::select! {
                result = stdout_pipe.read(&mut stdout_buf), if !stdout_done => {
                    match result {
                        Ok(0) => stdout_done = true,
                        Ok(n) => stdout_buffer.write(&stdout_buf[..n]),
                        Err(e) => {
                            return Err(DetectError::ExecutionFailed {
                                reason: format!("Failed to read stdout: {e}"),
                            });
                        }
                    }
                }
                result = stderr_pipe.read(&mut stderr_buf), if !stderr_done => {
                    match result {
                        Ok(0) => stderr_done = true,
                        Ok(n) => stderr_buffer.write(&stderr_buf[..n]),
                        Err(e) => {
                            return Err(DetectError::ExecutionFailed {
                                reason: format!("Failed to read stderr: {e}"),
                            });
                        }
                    }
                }
            }
        }

        child.wait().await.map_err(|e| DetectError::ExecutionFailed {
            reason: format!("Failed to wait for process: {e}"),
        })
    };

    let status = match timeout(duration, read_future).await {
        Ok(result) => Some(result?),
        Err(_) => {
            // Timed out: kill the whole tree, then reap the child so it does
            // not linger as a zombie.
            if let Some(pid) = child_id {
                kill_tree(pid);
            }
            let _ = timeout(Duration::from_millis(500), child.wait()).await;

            tracing::debug!(
                target: "claude_scout::exec",
                program = %spec.program.to_string_lossy(),
                timeout_secs = duration.as_secs(),
                "command timed out"
            );

            None
        }
    };

    let stdout = decode_output(&stdout_buffer.into_bytes(), options.output_encoding);
    let stderr = decode_output(&stderr_buffer.into_bytes(), options.output_encoding);

    match status {
        Some(status) => Ok(ProcessResult {
            exit_code: status.code(),
            stdout,
            stderr,
            signal: exit_signal(&status),
            timed_out: false,
        }),
        None => Ok(ProcessResult {
            exit_code: None,
            stdout,
            stderr,
            signal: None,
            timed_out: true,
        }),
    }
}

fn spawn_error(spec: &CommandSpec, e: &io::Error) -> DetectError {
    let program = spec.program.to_string_lossy();
    if e.kind() == io::ErrorKind::PermissionDenied {
        DetectError::PermissionDenied {
            reason: format!("'{program}' is not executable: {e}"),
        }
    } else {
        DetectError::ExecutionFailed {
            reason: format!("Failed to spawn process '{program}': {e}"),
        }
    }
}

/// Put the child into its own process group (Unix) or hide the console
/// window (Windows) so that tree-wide termination is possible and probe
/// commands never flash a console.
fn configure_process_group(cmd: &mut TokioCommand) {
    #[cfg(unix)]
    unsafe {
        cmd.pre_exec(|| {
            libc::setpgid(0, 0);
            Ok(())
        });
    }

    #[cfg(windows)]
    {
        const CREATE_NO_WINDOW: u32 = 0x0800_0000;
        cmd.creation_flags(CREATE_NO_WINDOW);
    }

    #[cfg(not(any(unix, windows)))]
    {
        let _ = cmd;
    }
}

#[cfg(unix)]
fn exit_signal(status: &std::process::ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn exit_signal(_status: &std::process::ExitStatus) -> Option<i32> {
    None
}

// ============================================================================
// Process-tree termination
// ============================================================================

/// Forcibly kill a process and everything it spawned.
///
/// On Unix the child was placed in its own process group at spawn, so
/// `killpg` reaches the whole tree. On Windows the Job Object assigned at
/// spawn kills the tree when the process is terminated.
pub(crate) fn kill_tree(pid: u32) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{Signal, killpg};
        use nix::unistd::Pid;
        let _ = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL);
    }

    #[cfg(windows)]
    {
        use windows::Win32::Foundation::CloseHandle;
        use windows::Win32::System::Threading::{OpenProcess, PROCESS_TERMINATE, TerminateProcess};

        unsafe {
            if let Ok(handle) = OpenProcess(PROCESS_TERMINATE, false, pid) {
                let _ = TerminateProcess(handle, 1);
                let _ = CloseHandle(handle);
            }
        }
    }

    #[cfg(not(any(unix, windows)))]
    {
        let _ = pid;
    }
}

/// Request graceful termination of a process tree.
///
/// Sends SIGTERM to the process group on Unix; Windows has no graceful
/// equivalent, so this is a no-op there and callers proceed to the bounded
/// grace wait followed by [`kill_tree`].
pub(crate) fn request_terminate(pid: u32) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{Signal, killpg};
        use nix::unistd::Pid;
        let _ = killpg(Pid::from_raw(pid as i32), Signal::SIGTERM);
    }

    #[cfg(not(unix))]
    {
        let _ = pid;
    }
}

// ============================================================================
// Windows Job Objects
// ============================================================================

/// RAII wrapper for a Windows Job Object configured with
/// `JOB_OBJECT_LIMIT_KILL_ON_JOB_CLOSE`: closing the handle (drop) kills
/// every process assigned to the job.
#[cfg(windows)]
pub(crate) struct JobObjectHandle {
    handle: windows::Win32::Foundation::HANDLE,
}

// SAFETY: Windows HANDLEs are opaque kernel object references usable from
// any thread.
#[cfg(windows)]
unsafe impl Send for JobObjectHandle {}

#[cfg(windows)]
impl JobObjectHandle {
    pub(crate) fn create() -> Result<Self, DetectError> {
        use windows::Win32::System::JobObjects::{
            CreateJobObjectW, JOB_OBJECT_LIMIT_KILL_ON_JOB_CLOSE,
            JOBOBJECT_EXTENDED_LIMIT_INFORMATION, JobObjectExtendedLimitInformation,
            SetInformationJobObject,
        };

        unsafe {
            let job = CreateJobObjectW(None, None).map_err(|e| DetectError::ExecutionFailed {
                reason: format!("Failed to create Job Object: {e}"),
            })?;

            let mut info: JOBOBJECT_EXTENDED_LIMIT_INFORMATION = std::mem::zeroed();
            info.BasicLimitInformation.LimitFlags = JOB_OBJECT_LIMIT_KILL_ON_JOB_CLOSE;

            SetInformationJobObject(
                job,
                JobObjectExtendedLimitInformation,
                (&raw const info).cast(),
                std::mem::size_of::<JOBOBJECT_EXTENDED_LIMIT_INFORMATION>() as u32,
            )
            .map_err(|e| DetectError::ExecutionFailed {
                reason: format!("Failed to configure Job Object: {e}"),
            })?;

            Ok(Self { handle: job })
        }
    }

    pub(crate) fn assign(&self, child: &tokio::process::Child) -> Result<(), DetectError> {
        use windows::Win32::Foundation::CloseHandle;
        use windows::Win32::System::JobObjects::AssignProcessToJobObject;
        use windows::Win32::System::Threading::{OpenProcess, PROCESS_ALL_ACCESS};

        if let Some(pid) = child.id() {
            unsafe {
                let process_handle = OpenProcess(PROCESS_ALL_ACCESS, false, pid).map_err(|e| {
                    DetectError::ExecutionFailed {
                        reason: format!("Failed to open process for job assignment: {e}"),
                    }
                })?;

                AssignProcessToJobObject(self.handle, process_handle).map_err(|e| {
                    let _ = CloseHandle(process_handle);
                    DetectError::ExecutionFailed {
                        reason: format!("Failed to assign process to Job Object: {e}"),
                    }
                })?;

                let _ = CloseHandle(process_handle);
            }
        }

        Ok(())
    }
}

#[cfg(windows)]
impl Drop for JobObjectHandle {
    fn drop(&mut self) {
        use windows::Win32::Foundation::CloseHandle;
        unsafe {
            let _ = CloseHandle(self.handle);
        }
    }
}
