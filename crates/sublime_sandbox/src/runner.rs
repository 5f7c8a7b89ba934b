//! Bounded Process Runner: spawns a toolchain binary under the supervisor.
//!
//! The command line always has the shape
//! `<supervisor> -m <memory_mb> -t <time_s> <tool> [<flags>] <path>`.
//! The supervisor enforces both ceilings and forwards the tool's exit status
//! and streams unchanged.
//!
//! ## Watchdog
//! The runner does not trust the supervisor to terminate. It polls the child
//! and kills it once `time_limit + WATCHDOG_GRACE` has elapsed, so a call can
//! never block indefinitely.
//!
//! ## Outcome mapping
//! - spawn or wait errors, or a failing success reader -> `InternalFailure`
//! - non-zero exit, signal death, watchdog kill or output past
//!   `MAX_CAPTURE_BYTES` on either stream -> `ToolFailure`
//! - clean exit -> whatever the caller's success reader produces

use crate::outcome::{Outcome, SandboxError, Stage};
use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Memory ceiling handed to the supervisor, in megabytes.
pub const MEMORY_LIMIT_MB: u64 = 32;

/// Wall-clock ceiling handed to the supervisor, in seconds.
pub const TIME_LIMIT_SECS: u64 = 5;

/// Extra time the supervisor gets before the watchdog steps in.
pub const WATCHDOG_GRACE: Duration = Duration::from_secs(1);

/// Per-stream cap on captured output (1 MB).
/// Anything beyond is drained and discarded, and the run counts as failed.
pub const MAX_CAPTURE_BYTES: u64 = 1024 * 1024;

/// How long to wait for pipe readers once the child is gone.
const READER_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Resource ceilings for a single external invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ceilings {
    pub memory_limit_mb: u64,
    pub time_limit: Duration,
}

impl Default for Ceilings {
    fn default() -> Self {
        Self {
            memory_limit_mb: MEMORY_LIMIT_MB,
            time_limit: Duration::from_secs(TIME_LIMIT_SECS),
        }
    }
}

impl Ceilings {
    /// Point at which the watchdog kills the supervisor.
    pub fn deadline(&self) -> Duration {
        self.time_limit + WATCHDOG_GRACE
    }
}

/// Which captured stream explains a tool failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticStream {
    Stdout,
    Stderr,
}

/// Streams and status captured from one finished invocation.
#[derive(Debug, Clone)]
pub struct CapturedOutput {
    pub stdout: String,
    pub stderr: String,
    pub status: Option<ExitStatus>,
    pub timed_out: bool,
    /// A stream went past `MAX_CAPTURE_BYTES`; its text is cut short.
    pub truncated: bool,
}

/// A tool to run on one input file.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub stage: Stage,
    pub tool: String,
    pub flags: Vec<String>,
    pub input: PathBuf,
    pub diagnostics: DiagnosticStream,
}

impl Invocation {
    pub fn new(stage: Stage, tool: impl Into<String>, input: impl Into<PathBuf>) -> Self {
        Self {
            stage,
            tool: tool.into(),
            flags: Vec::new(),
            input: input.into(),
            diagnostics: DiagnosticStream::Stderr,
        }
    }

    pub fn with_flag(mut self, flag: impl Into<String>) -> Self {
        self.flags.push(flag.into());
        self
    }

    pub fn with_diagnostics(mut self, diagnostics: DiagnosticStream) -> Self {
        self.diagnostics = diagnostics;
        self
    }
}

/// Runs toolchain binaries through the supervising wrapper.
#[derive(Debug, Clone)]
pub struct BoundedRunner {
    supervisor: PathBuf,
    work_dir: PathBuf,
    ceilings: Ceilings,
}

impl BoundedRunner {
    pub fn new(supervisor: impl Into<PathBuf>, work_dir: impl Into<PathBuf>, ceilings: Ceilings) -> Self {
        Self {
            supervisor: supervisor.into(),
            work_dir: work_dir.into(),
            ceilings,
        }
    }

    /// Arguments passed to the supervisor, in order.
    pub fn command_args(&self, invocation: &Invocation) -> Vec<String> {
        let mut args = vec![
            "-m".to_string(),
            self.ceilings.memory_limit_mb.to_string(),
            "-t".to_string(),
            self.ceilings.time_limit.as_secs().max(1).to_string(),
            invocation.tool.clone(),
        ];
        args.extend(invocation.flags.iter().cloned());
        args.push(invocation.input.to_string_lossy().into_owned());
        args
    }

    /// Run `invocation` once.
    ///
    /// `on_success` is the caller's success predicate: it receives the
    /// captured streams of a clean exit and either produces the operation's
    /// text or reports why the sandbox could not.
    pub fn run<F>(&self, invocation: &Invocation, on_success: F) -> Outcome
    where
        F: FnOnce(CapturedOutput) -> Result<String, SandboxError>,
    {
        let captured = match self.spawn_and_wait(invocation) {
            Ok(captured) => captured,
            Err(cause) => {
                warn!("[{}] {} could not run: {}", invocation.stage, invocation.tool, cause);
                return Outcome::InternalFailure { cause };
            }
        };

        let clean_exit = !captured.timed_out
            && !captured.truncated
            && captured.status.is_some_and(|s| s.success());
        if clean_exit {
            return match on_success(captured) {
                Ok(stdout) => Outcome::Success { stdout },
                Err(cause) => Outcome::InternalFailure { cause },
            };
        }

        let diagnostic = failure_diagnostic(invocation.diagnostics, &captured, self.ceilings);
        info!(
            "[{}] {} failed ({})",
            invocation.stage,
            invocation.tool,
            describe_status(&captured)
        );
        Outcome::ToolFailure {
            stage: invocation.stage,
            diagnostic,
        }
    }

    fn spawn_and_wait(&self, invocation: &Invocation) -> Result<CapturedOutput, SandboxError> {
        let program = self.supervisor.to_string_lossy().into_owned();
        let args = self.command_args(invocation);
        debug!("[{}] Spawning {} {}", invocation.stage, program, args.join(" "));

        let mut child = Command::new(&self.supervisor)
            .args(&args)
            .current_dir(&self.work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| SandboxError::Spawn {
                program: program.clone(),
                source,
            })?;

        let stdout_rx = spawn_reader(child.stdout.take());
        let stderr_rx = spawn_reader(child.stderr.take());

        let (status, timed_out) = match wait_with_deadline(&mut child, self.ceilings.deadline()) {
            Ok(waited) => waited,
            Err(source) => {
                kill_and_reap(&mut child);
                return Err(SandboxError::Wait { program, source });
            }
        };

        if timed_out {
            warn!(
                "[{}] {} exceeded {:.1}s, killed by watchdog",
                invocation.stage,
                invocation.tool,
                self.ceilings.deadline().as_secs_f64()
            );
        }

        let stdout = collect_reader(stdout_rx);
        let stderr = collect_reader(stderr_rx);
        let truncated = stdout.truncated || stderr.truncated;
        if truncated {
            warn!(
                "[{}] {} wrote more than {} bytes, output cut short",
                invocation.stage, invocation.tool, MAX_CAPTURE_BYTES
            );
        }

        Ok(CapturedOutput {
            stdout: stdout.text,
            stderr: stderr.text,
            status,
            timed_out,
            truncated,
        })
    }
}

/// Poll until the child exits or `deadline` passes. On expiry the child is
/// killed and reaped, and the reaped status is returned with `timed_out`.
fn wait_with_deadline(
    child: &mut Child,
    deadline: Duration,
) -> std::io::Result<(Option<ExitStatus>, bool)> {
    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok((Some(status), false));
        }
        if start.elapsed() >= deadline {
            let status = kill_and_reap(child);
            return Ok((status, true));
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

fn kill_and_reap(child: &mut Child) -> Option<ExitStatus> {
    let _ = child.kill();
    child.wait().ok()
}

#[derive(Debug, Default)]
struct StreamCapture {
    text: String,
    truncated: bool,
}

/// Drain a pipe on its own thread so a chatty child never blocks on a full pipe.
fn spawn_reader<R>(pipe: Option<R>) -> mpsc::Receiver<StreamCapture>
where
    R: Read + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let Some(mut pipe) = pipe else {
            let _ = tx.send(StreamCapture::default());
            return;
        };
        let _ = tx.send(capture_stream(&mut pipe, MAX_CAPTURE_BYTES));
    });
    rx
}

/// Keep the first `limit` bytes of `pipe`, then drain the rest.
fn capture_stream<R: Read>(pipe: &mut R, limit: u64) -> StreamCapture {
    let mut buf = Vec::new();
    let _ = pipe.by_ref().take(limit).read_to_end(&mut buf);
    let discarded = std::io::copy(pipe, &mut std::io::sink()).unwrap_or(0);
    StreamCapture {
        text: String::from_utf8_lossy(&buf).into_owned(),
        truncated: discarded > 0,
    }
}

/// A grandchild may keep the pipe open after the child is gone; do not wait forever.
fn collect_reader(rx: mpsc::Receiver<StreamCapture>) -> StreamCapture {
    rx.recv_timeout(READER_JOIN_TIMEOUT).unwrap_or_default()
}

fn describe_status(captured: &CapturedOutput) -> String {
    if captured.timed_out {
        return "time limit exceeded".to_string();
    }
    if captured.truncated {
        return "output limit exceeded".to_string();
    }
    match captured.status {
        Some(status) => status.to_string(),
        None => "unknown exit status".to_string(),
    }
}

fn failure_diagnostic(stream: DiagnosticStream, captured: &CapturedOutput, ceilings: Ceilings) -> String {
    // An overflowing stream can be the diagnostic one; never echo it back.
    let text = if captured.truncated {
        ""
    } else {
        match stream {
            DiagnosticStream::Stdout => captured.stdout.trim_end(),
            DiagnosticStream::Stderr => captured.stderr.trim_end(),
        }
    };

    let mut notices = Vec::new();
    if captured.timed_out {
        notices.push(format!(
            "time limit exceeded ({}s)",
            ceilings.time_limit.as_secs().max(1)
        ));
    }
    if captured.truncated {
        notices.push(format!("output limit exceeded ({} bytes)", MAX_CAPTURE_BYTES));
    }

    if notices.is_empty() {
        return if text.is_empty() {
            describe_status(captured)
        } else {
            text.to_string()
        };
    }

    if text.is_empty() {
        notices.join("\n")
    } else {
        format!("{}\n{}", text, notices.join("\n"))
    }
}
