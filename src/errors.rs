//! Error types shared across the daemon.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all domain failure modes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// Process enumeration or lookup failure in the process source.
    Discovery(String),
    /// One or more subscriber callbacks failed during discovery dispatch.
    Subscriber(String),
    /// Target process unavailable, access denied, or injector failure.
    Injection(String),
    /// Modification enumeration failure.
    Repository(String),
    /// A modification resolution chain terminated with a failure.
    Resolution(String),
    /// A modification compilation chain terminated with a failure.
    Compilation(String),
    /// Suspend or resume of the resource streaming subsystem failed.
    Streaming(String),
    /// Session wiring failure (missing runtime, closed worker queue).
    Session(String),
    /// File-system or process-spawn I/O failure.
    Io(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Discovery(msg) => write!(f, "discovery: {msg}"),
            Self::Subscriber(msg) => write!(f, "subscriber: {msg}"),
            Self::Injection(msg) => write!(f, "injection: {msg}"),
            Self::Repository(msg) => write!(f, "repository: {msg}"),
            Self::Resolution(msg) => write!(f, "resolution: {msg}"),
            Self::Compilation(msg) => write!(f, "compilation: {msg}"),
            Self::Streaming(msg) => write!(f, "streaming: {msg}"),
            Self::Session(msg) => write!(f, "session: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
