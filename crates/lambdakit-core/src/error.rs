//! Error types for lambdakit-core.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::compile::CompileError;

/// Result type for lambdakit-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// A stage of the build state machine.
///
/// The first three stages run once per build; the remaining four run once
/// per candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Provisioning,
    Materializing,
    Discovering,
    Resolving,
    Synthesizing,
    Compiling,
    Packaging,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Provisioning => "provisioning",
            Self::Materializing => "materializing",
            Self::Discovering => "discovering",
            Self::Resolving => "resolving",
            Self::Synthesizing => "synthesizing",
            Self::Compiling => "compiling",
            Self::Packaging => "packaging",
        };
        f.write_str(name)
    }
}

/// Errors that can occur while building lambdas.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing directory, malformed configuration, or conflicting candidates.
    #[error("configuration error: {0}")]
    Config(String),

    /// The build environment could not be set up.
    #[error("provisioning failed: {0}")]
    Provision(String),

    /// A source file could not be written into the workspace.
    #[error("failed to materialize {path}: {message}")]
    Materialize { path: String, message: String },

    /// The source tree could not be scanned for candidates.
    #[error("discovery error: {0}")]
    Discovery(String),

    /// No single exported entry function was found.
    #[error("handler resolution failed: {0}")]
    HandlerResolution(String),

    /// The bridge file could not be written.
    #[error("failed to write bridge file {}: {message}", path.display())]
    Synthesis { path: PathBuf, message: String },

    /// The toolchain exited with a non-zero status.
    #[error("{0}")]
    Compile(CompileError),

    /// The artifact manifest could not be assembled.
    #[error("packaging failed: {0}")]
    Packaging(String),

    /// The build was aborted by the caller.
    #[error("build aborted")]
    Aborted,

    /// The overall build deadline passed.
    #[error("build deadline exceeded")]
    DeadlineExceeded,

    /// Stopped because another candidate failed first.
    #[error("cancelled after another candidate failed")]
    Cancelled,

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A failure attributed to one candidate and stage.
    #[error("{stage} failed for {entrypoint}: {source}")]
    Candidate {
        entrypoint: String,
        stage: Stage,
        source: Box<Error>,
    },
}

impl Error {
    /// Attribute this error to a candidate and stage.
    ///
    /// Errors that are already attributed are returned unchanged.
    pub fn in_candidate(self, entrypoint: &str, stage: Stage) -> Self {
        match self {
            Self::Candidate { .. } => self,
            other => Self::Candidate {
                entrypoint: entrypoint.to_string(),
                stage,
                source: Box::new(other),
            },
        }
    }

    /// The underlying error with any candidate attribution removed.
    pub fn root(&self) -> &Error {
        match self {
            Self::Candidate { source, .. } => source.root(),
            other => other,
        }
    }

    /// The stage this error was attributed to, if any.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Candidate { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// The candidate entrypoint this error was attributed to, if any.
    pub fn entrypoint(&self) -> Option<&str> {
        match self {
            Self::Candidate { entrypoint, .. } => Some(entrypoint),
            _ => None,
        }
    }

    /// Whether this error only records that a sibling candidate failed.
    pub fn is_cancellation(&self) -> bool {
        matches!(self.root(), Self::Cancelled)
    }

    /// Render the error together with a recovery hint for terminal output.
    pub fn with_hint(&self) -> String {
        let hint = match self.root() {
            Self::Config(_) => Some(
                "check --entrypoint, lambdaBaseDir and lambdaFileName against the source tree",
            ),
            Self::Provision(_) => {
                Some("make sure `go` and `git` are installed or pass --go/--git explicitly")
            }
            Self::HandlerResolution(_) => Some(
                "each lambda file must declare exactly one exported top-level function, e.g. `func Handler(...)`",
            ),
            Self::Compile(_) => Some(
                "dependencies must be vendored next to the entrypoint (`go mod vendor`); no network fetch happens",
            ),
            Self::DeadlineExceeded => Some("raise the limit with --timeout"),
            _ => None,
        };

        match hint {
            Some(hint) => format!("{self}\n  hint: {hint}"),
            None => self.to_string(),
        }
    }
}
