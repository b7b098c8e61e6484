//! Shared error type across gmx crates.

use std::io;

use thiserror::Error;

/// Error classes reported to operators (stable API).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bind/accept/connect failure.
    Transport,
    /// Malformed or truncated wire data.
    Protocol,
    /// A program name matched more than one process.
    Ambiguous,
    /// Bad operator input (pattern, config, unknown process).
    BadInput,
    /// Anything else.
    Internal,
}

impl ErrorKind {
    /// String representation used in diagnostics.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Transport => "TRANSPORT",
            ErrorKind::Protocol => "PROTOCOL",
            ErrorKind::Ambiguous => "AMBIGUOUS",
            ErrorKind::BadInput => "BAD_INPUT",
            ErrorKind::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, GmxError>;

/// Unified error type used by core, agent and client.
#[derive(Debug, Error)]
pub enum GmxError {
    #[error("io: {0}")]
    Io(#[from] io::Error),
    #[error("malformed message: {0}")]
    Malformed(String),
    #[error("encode failed: {0}")]
    Encode(String),
    #[error("invalid config: {0}")]
    Config(String),
    #[error("unable to connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: io::Error,
    },
    #[error("unable to listen on {endpoint}: {source}")]
    Bind {
        endpoint: String,
        #[source]
        source: io::Error,
    },
    #[error("no instrumented process named {0}")]
    UnknownProcess(String),
    #[error("ambiguous process name {name}: candidates {pids:?}, select one by pid")]
    Ambiguous { name: String, pids: Vec<u32> },
    #[error("unable to compile pattern {pattern}: {reason}")]
    BadPattern { pattern: String, reason: String },
    #[error("server did not return a keys list")]
    MissingKeys,
    #[error("unsupported config version")]
    UnsupportedVersion,
    #[error("the process-wide agent is already started")]
    AlreadyStarted,
}

impl GmxError {
    /// Map an error onto its operator-facing class.
    pub fn kind(&self) -> ErrorKind {
        match self {
            GmxError::Io(_) | GmxError::Connect { .. } | GmxError::Bind { .. } => {
                ErrorKind::Transport
            }
            GmxError::Malformed(_) | GmxError::MissingKeys => ErrorKind::Protocol,
            GmxError::Ambiguous { .. } => ErrorKind::Ambiguous,
            GmxError::Config(_)
            | GmxError::UnknownProcess(_)
            | GmxError::BadPattern { .. }
            | GmxError::UnsupportedVersion
            | GmxError::AlreadyStarted => ErrorKind::BadInput,
            GmxError::Encode(_) => ErrorKind::Internal,
        }
    }
}
