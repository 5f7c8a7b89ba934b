//! Sandboxed asm2bf/brainfuck toolchain for Sublime.
//!
//! - [`scratch`]: unique temporary paths with guaranteed cleanup
//! - [`runner`]: bounded external processes with a three-way outcome
//! - [`pipeline`]: compile, execute and compile-then-execute

pub mod outcome;
pub mod pipeline;
pub mod runner;
pub mod scratch;

pub use outcome::{Outcome, OutcomeKind, SandboxError, Stage};
pub use pipeline::{
    CompileRequest, Pipeline, SandboxPipeline, ToolchainConfig, SAFETY_PREFIX, TINY_FLAG,
    TINY_MARKER,
};
pub use runner::{BoundedRunner, CapturedOutput, Ceilings, DiagnosticStream, Invocation};
pub use scratch::{ScratchArtifacts, ScratchSpace};
