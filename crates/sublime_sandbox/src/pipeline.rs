//! Build/Run Pipeline: compile asm2bf, interpret brainfuck, or both.
//!
//! Each operation allocates its own scratch set, writes its input, runs one
//! bounded toolchain process, reads what it needs back, and releases the
//! scratch set on every exit path (the set is an RAII guard).

use crate::outcome::{Outcome, SandboxError, Stage};
use crate::runner::{BoundedRunner, Ceilings, DiagnosticStream, Invocation};
use crate::scratch::{ScratchSpace, PROGRAM_SUFFIX, SOURCE_SUFFIX};
use std::path::PathBuf;
use tracing::{debug, info};

/// Prepended to every compiler input. Disables the capability names that
/// would let preprocessor code reach outside the sandbox.
pub const SAFETY_PREFIX: &str = "#io=nil;getfenv=nil;package=nil;os=nil;\n";

/// Source starting with this marker is compiled in tiny mode.
pub const TINY_MARKER: &str = ";-t";

/// Compiler flag selected by [`TINY_MARKER`].
pub const TINY_FLAG: &str = "-t";

/// The three operations the orchestrator can dispatch to.
pub trait Pipeline: Send + Sync {
    /// Compile asm2bf `source`; success carries the brainfuck text.
    fn compile(&self, source: &str) -> Outcome;

    /// Interpret brainfuck `program`; success carries its stdout.
    fn execute(&self, program: &str) -> Outcome;

    /// Compile, then interpret the result. Stops at the first failure, so a
    /// compile-stage failure here is exactly what `compile` alone returns.
    fn compile_and_execute(&self, source: &str) -> Outcome {
        match self.compile(source) {
            Outcome::Success { stdout: program } => self.execute(&program),
            failed => failed,
        }
    }
}

impl<P: Pipeline + ?Sized> Pipeline for &P {
    fn compile(&self, source: &str) -> Outcome {
        (**self).compile(source)
    }

    fn execute(&self, program: &str) -> Outcome {
        (**self).execute(program)
    }

    fn compile_and_execute(&self, source: &str) -> Outcome {
        (**self).compile_and_execute(source)
    }
}

/// A single compile request: user source plus the flag derived from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileRequest<'a> {
    pub source: &'a str,
    pub tiny: bool,
}

impl<'a> CompileRequest<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            tiny: source.starts_with(TINY_MARKER),
        }
    }

    /// Text written to the compiler input file. Always starts with the prefix.
    pub fn guarded_source(&self) -> String {
        let mut text = String::with_capacity(SAFETY_PREFIX.len() + self.source.len());
        text.push_str(SAFETY_PREFIX);
        text.push_str(self.source);
        text
    }
}

/// Toolchain binaries and directories (plain data, no behavior).
#[derive(Debug, Clone)]
pub struct ToolchainConfig {
    pub supervisor: PathBuf,
    pub compiler: String,
    pub interpreter: String,
    pub work_dir: PathBuf,
    pub scratch_dir: PathBuf,
    pub ceilings: Ceilings,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            supervisor: PathBuf::from("./timeout"),
            compiler: "bfmake".to_string(),
            interpreter: "bfi".to_string(),
            work_dir: PathBuf::from("."),
            scratch_dir: std::env::temp_dir(),
            ceilings: Ceilings::default(),
        }
    }
}

/// [`Pipeline`] backed by the real toolchain under the supervisor.
#[derive(Debug, Clone)]
pub struct SandboxPipeline {
    scratch: ScratchSpace,
    runner: BoundedRunner,
    compiler: String,
    interpreter: String,
}

impl SandboxPipeline {
    pub fn new(config: ToolchainConfig) -> Self {
        Self {
            scratch: ScratchSpace::new(config.scratch_dir, config.work_dir.clone()),
            runner: BoundedRunner::new(config.supervisor, config.work_dir, config.ceilings),
            compiler: config.compiler,
            interpreter: config.interpreter,
        }
    }
}

impl Pipeline for SandboxPipeline {
    fn compile(&self, source: &str) -> Outcome {
        let request = CompileRequest::new(source);
        let mut artifacts = self.scratch.allocate();
        let source_path = artifacts.path(SOURCE_SUFFIX);
        let program_path = artifacts.path(PROGRAM_SUFFIX);

        info!("Running as {}{{.b|.asm}}.", artifacts.base_path().display());

        if let Err(source) = std::fs::write(&source_path, request.guarded_source()) {
            return Outcome::InternalFailure {
                cause: SandboxError::WriteInput {
                    path: source_path,
                    source,
                },
            };
        }

        let mut invocation = Invocation::new(Stage::Compile, self.compiler.as_str(), &source_path)
            .with_diagnostics(DiagnosticStream::Stdout);
        if request.tiny {
            debug!("Tiny mode requested, passing {}", TINY_FLAG);
            invocation = invocation.with_flag(TINY_FLAG);
        }

        let outcome = self.runner.run(&invocation, |_| {
            std::fs::read_to_string(&program_path).map_err(|source| SandboxError::ReadOutput {
                path: program_path.clone(),
                source,
            })
        });

        artifacts.release();
        outcome
    }

    fn execute(&self, program: &str) -> Outcome {
        let mut artifacts = self.scratch.allocate();
        let program_path = artifacts.path(PROGRAM_SUFFIX);

        if let Err(source) = std::fs::write(&program_path, program) {
            return Outcome::InternalFailure {
                cause: SandboxError::WriteInput {
                    path: program_path,
                    source,
                },
            };
        }

        let invocation = Invocation::new(Stage::Execute, self.interpreter.as_str(), &program_path)
            .with_diagnostics(DiagnosticStream::Stderr);
        let outcome = self.runner.run(&invocation, |captured| Ok(captured.stdout));

        artifacts.release();
        outcome
    }
}
