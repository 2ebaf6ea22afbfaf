use std::fmt;
use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

use super::context::CancelKind;

/// Comprehensive error type for driving the engine
#[derive(Error, Debug)]
pub enum Error {
    #[error("no suitable terraform binary at {path:?}: {reason}")]
    NoSuitableBinary { path: PathBuf, reason: String },

    #[error("working directory {path:?} is unusable: {reason}")]
    NoWorkingDir { path: PathBuf, reason: String },

    #[error("manual setting of env var {name:?} detected")]
    ManualEnvVar { name: String },

    #[error("option {option} is not supported by \"terraform {command}\"")]
    InvalidOption {
        option: &'static str,
        command: &'static str,
    },

    #[error("{feature} requires terraform version in range [{min_inclusive}, {max_exclusive}), found {actual}")]
    VersionMismatch {
        feature: String,
        actual: String,
        min_inclusive: String,
        max_exclusive: String,
    },

    #[error("unable to parse version output: {reason}")]
    VersionParse { output: String, reason: String },

    #[error("{0}")]
    Context(CancelKind),

    #[error("{source} ({kind})")]
    Cancelled {
        kind: CancelKind,
        #[source]
        source: Box<Error>,
    },

    #[error("failed to start {binary:?}: {source}")]
    Spawn {
        binary: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Exit(#[from] ExitError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("unable to decode engine output as JSON: {source}")]
    Decode {
        raw: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("unexpected engine output: {0}")]
    UnexpectedOutput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a decode error that keeps the undecodable bytes around
    pub fn decode(raw: &[u8], source: serde_json::Error) -> Self {
        Self::Decode {
            raw: String::from_utf8_lossy(raw).into_owned(),
            source,
        }
    }

    /// The exit error carried by this error, looking through classification
    /// and cancellation wrappers.
    pub fn exit_error(&self) -> Option<&ExitError> {
        match self {
            Self::Exit(exit) => Some(exit),
            Self::Engine(engine) => Some(&engine.exit),
            Self::Cancelled { source, .. } => source.exit_error(),
            _ => None,
        }
    }

    /// The cancellation kind, if the call was cut short by its scope.
    pub fn cancel_kind(&self) -> Option<CancelKind> {
        match self {
            Self::Context(kind) | Self::Cancelled { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_kind().is_some()
    }

    /// The classified engine failure, if any.
    pub fn engine_kind(&self) -> Option<&EngineErrorKind> {
        match self {
            Self::Engine(engine) => Some(&engine.kind),
            Self::Cancelled { source, .. } => source.engine_kind(),
            _ => None,
        }
    }
}

/// Convenient result type for engine calls
pub type Result<T> = std::result::Result<T, Error>;

/// A non-zero exit of the engine with everything needed to diagnose it.
#[derive(Debug, Clone)]
pub struct ExitError {
    /// Full argument vector, binary first.
    pub args: Vec<String>,
    pub pid: Option<u32>,
    pub status: ExitStatus,
    /// Tail of the captured standard error.
    pub stderr: String,
}

impl ExitError {
    pub fn code(&self) -> Option<i32> {
        self.status.code()
    }
}

impl std::error::Error for ExitError {}

impl fmt::Display for ExitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.args.join(" "), self.status)?;
        let excerpt = self.stderr.trim();
        if !excerpt.is_empty() {
            write!(f, "\n\n{excerpt}")?;
        }
        Ok(())
    }
}

/// Engine failure recognised from its error output.
#[derive(Debug, Clone, Error)]
#[error("{kind}")]
pub struct EngineError {
    pub kind: EngineErrorKind,
    #[source]
    pub exit: ExitError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineErrorKind {
    NoInit,
    NoConfig,
    ConfigInvalid,
    NoWorkspace { name: String },
    WorkspaceExists { name: String },
    CliUsage,
    MissingVar { name: String },
    StateLocked(LockInfo),
    StatePlanRead,
    LockIdInvalid,
    UnsupportedEngineVersion { constraint: Option<String> },
    Unparsed,
}

/// Lock holder details printed by the engine when the state is locked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockInfo {
    pub id: String,
    pub path: String,
    pub operation: String,
    pub who: String,
    pub version: String,
    pub created: String,
}

impl fmt::Display for EngineErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoInit => f.write_str("terraform init must be run in the working directory"),
            Self::NoConfig => f.write_str("no configuration files found"),
            Self::ConfigInvalid => f.write_str("configuration is invalid"),
            Self::NoWorkspace { name } => write!(f, "workspace {name:?} does not exist"),
            Self::WorkspaceExists { name } => write!(f, "workspace {name:?} already exists"),
            Self::CliUsage => f.write_str("terraform rejected its command line"),
            Self::MissingVar { name } => write!(f, "variable {name:?} was required but not supplied"),
            Self::StateLocked(info) if info.id.is_empty() => f.write_str("state is locked"),
            Self::StateLocked(info) => write!(
                f,
                "state is locked: id {}, held by {} since {}",
                info.id, info.who, info.created
            ),
            Self::StatePlanRead => f.write_str("unable to read the given file as a state or plan"),
            Self::LockIdInvalid => f.write_str("lock ID does not match an existing lock"),
            Self::UnsupportedEngineVersion { constraint: Some(c) } => {
                write!(f, "terraform core version not supported by configuration: {c}")
            }
            Self::UnsupportedEngineVersion { constraint: None } => {
                f.write_str("terraform core version not supported by configuration")
            }
            Self::Unparsed => f.write_str("terraform exited with an unrecognised error"),
        }
    }
}
