//! Pipeline Tests
//!
//! Drive the real pipeline against shell-script stand-ins for the supervisor,
//! the asm2bf compiler and the brainfuck interpreter.
//!
//! - `timeout`: checks the `-m <mb> -t <s>` prefix, then execs the tool
//! - `bfmake`: copies `<x>.asm` to `<x>.b` (with a `tiny` line under `-t`),
//!   fails on "syntax error", writes nothing on "skip output", and always
//!   litters an `error42.log` in its working directory
//! - `bfi`: prints every `print <text>` line, fails on "crash", and
//!   writes 2,000,000 bytes of `A` on "flood"
#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use sublime_sandbox::runner::MAX_CAPTURE_BYTES;
use sublime_sandbox::{
    Ceilings, Outcome, OutcomeKind, Pipeline, SandboxError, SandboxPipeline, Stage,
    ToolchainConfig, SAFETY_PREFIX,
};
use tempfile::TempDir;

const SUPERVISOR: &str = r#"#!/bin/sh
[ "$1" = "-m" ] || exit 90
[ "$3" = "-t" ] || exit 91
shift 4
exec "$@"
"#;

const HANGING_SUPERVISOR: &str = "#!/bin/sh\nexec sleep 30\n";

const COMPILER: &str = r#"#!/bin/sh
tiny=""
if [ "$1" = "-t" ]; then tiny=1; shift; fi
src="$1"
echo "littered" > error42.log
if grep -q "syntax error" "$src"; then
  echo "bfmake: syntax error in input"
  exit 1
fi
if grep -q "skip output" "$src"; then exit 0; fi
out="${src%.asm}.b"
if [ -n "$tiny" ]; then echo "tiny" > "$out"; else : > "$out"; fi
cat "$src" >> "$out"
"#;

const INTERPRETER: &str = r#"#!/bin/sh
if grep -q "crash" "$1"; then
  echo "bfi: tape overflow" >&2
  exit 2
fi
if grep -q "flood" "$1"; then
  head -c 2000000 /dev/zero | tr '\0' A
  exit 0
fi
sed -n 's/^print //p' "$1"
"#;

struct Scripts {
    supervisor: PathBuf,
    hanging_supervisor: PathBuf,
    compiler: PathBuf,
    interpreter: PathBuf,
}

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Scripts are written once per test binary, before any test spawns a
/// process, so no fork can inherit a script that is still open for writing.
fn scripts() -> &'static Scripts {
    static SCRIPTS: OnceLock<Scripts> = OnceLock::new();
    SCRIPTS.get_or_init(|| {
        let dir = PathBuf::from(env!("CARGO_TARGET_TMPDIR"))
            .join(format!("sublime-fake-toolchain-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        Scripts {
            supervisor: write_script(&dir, "timeout", SUPERVISOR),
            hanging_supervisor: write_script(&dir, "timeout-hang", HANGING_SUPERVISOR),
            compiler: write_script(&dir, "bfmake", COMPILER),
            interpreter: write_script(&dir, "bfi", INTERPRETER),
        }
    })
}

struct Harness {
    pipeline: SandboxPipeline,
    scratch: TempDir,
    work: TempDir,
}

impl Harness {
    fn new() -> Self {
        Self::with_supervisor(&scripts().supervisor, Ceilings::default())
    }

    fn with_supervisor(supervisor: &Path, ceilings: Ceilings) -> Self {
        let scripts = scripts();
        let scratch = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let pipeline = SandboxPipeline::new(ToolchainConfig {
            supervisor: supervisor.to_path_buf(),
            compiler: scripts.compiler.to_string_lossy().into_owned(),
            interpreter: scripts.interpreter.to_string_lossy().into_owned(),
            work_dir: work.path().to_path_buf(),
            scratch_dir: scratch.path().to_path_buf(),
            ceilings,
        });
        Self {
            pipeline,
            scratch,
            work,
        }
    }

    fn assert_clean(&self) {
        let leftovers: Vec<_> = std::fs::read_dir(self.scratch.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert!(leftovers.is_empty(), "scratch files left behind: {:?}", leftovers);

        let logs: Vec<_> = std::fs::read_dir(self.work.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.starts_with("error") && name.ends_with(".log"))
            .collect();
        assert!(logs.is_empty(), "toolchain error logs left behind: {:?}", logs);
    }
}

fn expect_success(outcome: Outcome) -> String {
    match outcome {
        Outcome::Success { stdout } => stdout,
        other => panic!("expected success, got {:?}", other),
    }
}

fn expect_tool_failure(outcome: Outcome) -> (Stage, String) {
    match outcome {
        Outcome::ToolFailure { stage, diagnostic } => (stage, diagnostic),
        other => panic!("expected tool failure, got {:?}", other),
    }
}

// =============================================================================
// COMPILE
// =============================================================================

#[test]
fn test_compile_success_prefixes_source() {
    let harness = Harness::new();

    let compiled = expect_success(harness.pipeline.compile("mov r1, 65\nout r1\n"));

    assert!(compiled.starts_with(SAFETY_PREFIX), "got: {:?}", compiled);
    assert!(compiled.ends_with("mov r1, 65\nout r1\n"));
    harness.assert_clean();
}

#[test]
fn test_compile_tiny_marker_passes_flag() {
    let harness = Harness::new();

    let compiled = expect_success(harness.pipeline.compile(";-t\nmov r1, 1\n"));

    assert!(compiled.starts_with("tiny\n"), "got: {:?}", compiled);
    assert!(compiled["tiny\n".len()..].starts_with(SAFETY_PREFIX));
    harness.assert_clean();
}

#[test]
fn test_compile_error_is_tool_failure_with_stdout() {
    let harness = Harness::new();

    let (stage, diagnostic) = expect_tool_failure(harness.pipeline.compile("syntax error here"));

    assert_eq!(stage, Stage::Compile);
    assert_eq!(diagnostic, "bfmake: syntax error in input");
    harness.assert_clean();
}

#[test]
fn test_compile_missing_artifact_is_internal_failure() {
    let harness = Harness::new();

    match harness.pipeline.compile("skip output") {
        Outcome::InternalFailure {
            cause: SandboxError::ReadOutput { path, .. },
        } => assert_eq!(path.extension().unwrap(), "b"),
        other => panic!("expected read failure, got {:?}", other),
    }
    harness.assert_clean();
}

#[test]
fn test_unwritable_scratch_dir_is_internal_failure() {
    let scripts = scripts();
    let work = tempfile::tempdir().unwrap();
    let pipeline = SandboxPipeline::new(ToolchainConfig {
        supervisor: scripts.supervisor.clone(),
        compiler: scripts.compiler.to_string_lossy().into_owned(),
        interpreter: scripts.interpreter.to_string_lossy().into_owned(),
        work_dir: work.path().to_path_buf(),
        scratch_dir: work.path().join("does-not-exist"),
        ceilings: Ceilings::default(),
    });

    match pipeline.compile("out 1") {
        Outcome::InternalFailure {
            cause: SandboxError::WriteInput { .. },
        } => {}
        other => panic!("expected write failure, got {:?}", other),
    }
    match pipeline.execute("+") {
        Outcome::InternalFailure {
            cause: SandboxError::WriteInput { .. },
        } => {}
        other => panic!("expected write failure, got {:?}", other),
    }
}

// =============================================================================
// EXECUTE
// =============================================================================

#[test]
fn test_execute_success_returns_stdout() {
    let harness = Harness::new();

    let output = expect_success(harness.pipeline.execute("print hello\n+++\nprint world\n"));

    assert_eq!(output, "hello\nworld\n");
    harness.assert_clean();
}

#[test]
fn test_execute_is_not_prefixed() {
    let harness = Harness::new();

    // The interpreter sees the program verbatim: the first line is printed.
    let output = expect_success(harness.pipeline.execute("print first\n"));

    assert_eq!(output, "first\n");
}

#[test]
fn test_execute_crash_is_tool_failure_with_stderr() {
    let harness = Harness::new();

    let (stage, diagnostic) = expect_tool_failure(harness.pipeline.execute("crash"));

    assert_eq!(stage, Stage::Execute);
    assert_eq!(diagnostic, "bfi: tape overflow");
    harness.assert_clean();
}

#[test]
fn test_execute_output_past_capture_limit_is_tool_failure() {
    let harness = Harness::new();

    let (stage, diagnostic) = expect_tool_failure(harness.pipeline.execute("flood"));

    assert_eq!(stage, Stage::Execute);
    assert_eq!(
        diagnostic,
        format!("output limit exceeded ({} bytes)", MAX_CAPTURE_BYTES)
    );
    harness.assert_clean();
}

#[test]
fn test_compile_and_execute_flood_reports_execute_stage() {
    let harness = Harness::new();

    let outcome = harness.pipeline.compile_and_execute("flood");

    assert_eq!(outcome.kind(), OutcomeKind::ToolFailure(Stage::Execute));
    harness.assert_clean();
}

// =============================================================================
// COMPILE AND EXECUTE
// =============================================================================

#[test]
fn test_round_trip_is_deterministic() {
    let harness = Harness::new();
    let source = "print 42\n";

    let compiled = expect_success(harness.pipeline.compile(source));
    let two_step = expect_success(harness.pipeline.execute(&compiled));
    let one_step = expect_success(harness.pipeline.compile_and_execute(source));

    assert_eq!(two_step, "42\n");
    assert_eq!(one_step, two_step);
    harness.assert_clean();
}

#[test]
fn test_compile_failure_short_circuits() {
    let harness = Harness::new();

    let alone = harness.pipeline.compile("syntax error").kind();
    let combined = harness.pipeline.compile_and_execute("syntax error").kind();

    assert_eq!(alone, OutcomeKind::ToolFailure(Stage::Compile));
    assert_eq!(combined, alone);
    harness.assert_clean();
}

#[test]
fn test_execute_failure_after_successful_compile() {
    let harness = Harness::new();

    assert!(harness.pipeline.compile("crash").is_success());
    let (stage, diagnostic) = expect_tool_failure(harness.pipeline.compile_and_execute("crash"));

    assert_eq!(stage, Stage::Execute);
    assert_eq!(diagnostic, "bfi: tape overflow");
    harness.assert_clean();
}

// =============================================================================
// CEILINGS AND CONCURRENCY
// =============================================================================

#[test]
fn test_hanging_supervisor_is_killed_by_watchdog() {
    let ceilings = Ceilings {
        memory_limit_mb: 32,
        time_limit: Duration::from_secs(1),
    };
    let harness = Harness::with_supervisor(&scripts().hanging_supervisor, ceilings);

    let start = Instant::now();
    let (stage, diagnostic) = expect_tool_failure(harness.pipeline.compile("out 1"));

    assert!(
        start.elapsed() < Duration::from_secs(10),
        "watchdog took {:?}",
        start.elapsed()
    );
    assert_eq!(stage, Stage::Compile);
    assert!(diagnostic.contains("time limit exceeded"), "got: {}", diagnostic);
    harness.assert_clean();
}

#[test]
fn test_concurrent_requests_do_not_collide() {
    let harness = Arc::new(Harness::new());

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let harness = Arc::clone(&harness);
            std::thread::spawn(move || {
                let source = format!("print request-{}\n", i);
                let output = expect_success(harness.pipeline.compile_and_execute(&source));
                assert_eq!(output, format!("request-{}\n", i));
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    harness.assert_clean();
}
