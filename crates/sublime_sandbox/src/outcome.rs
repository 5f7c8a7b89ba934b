//! Three-way result of a sandboxed toolchain call.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Pipeline step that ran the external tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Compile,
    Execute,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Compile => "compile",
            Stage::Execute => "execute",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Failures that are the sandbox's own fault rather than the user's code.
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("failed to write {}: {source}", path.display())]
    WriteInput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read {}: {source}", path.display())]
    ReadOutput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to wait for {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result of one pipeline operation. Never retried.
#[derive(Debug)]
pub enum Outcome {
    /// The tool exited cleanly; `stdout` is the operation's product.
    Success { stdout: String },
    /// The tool rejected the input or crashed on it.
    ToolFailure { stage: Stage, diagnostic: String },
    /// The sandbox itself could not do its job.
    InternalFailure { cause: SandboxError },
}

impl Outcome {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            Outcome::Success { .. } => OutcomeKind::Success,
            Outcome::ToolFailure { stage, .. } => OutcomeKind::ToolFailure(*stage),
            Outcome::InternalFailure { .. } => OutcomeKind::InternalFailure,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }
}

/// Payload-free summary of an [`Outcome`], convenient for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    Success,
    ToolFailure(Stage),
    InternalFailure,
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutcomeKind::Success => write!(f, "success"),
            OutcomeKind::ToolFailure(stage) => write!(f, "{} failure", stage),
            OutcomeKind::InternalFailure => write!(f, "internal failure"),
        }
    }
}
