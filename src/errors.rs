//! Error types for srcstrap.
//!
//! Every pipeline stage returns [`Result`] so callers (the orchestrator and the
//! tests) can tell configuration mistakes apart from I/O and tool failures
//! without parsing log text.

use thiserror::Error;

/// The main error type for package acquisition and build operations.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Descriptor or settings problems: unknown archive suffix, unresolved
    /// placeholder, malformed catalog, duplicate package name.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A requested package name is not in the registry.
    #[error("No such package: {0}")]
    UnknownPackage(String),

    /// File I/O operation failures
    #[error("I/O operation failed: {0}")]
    Io(#[from] std::io::Error),

    /// Download failures (transport error or non-2xx status)
    #[error("Network error: {0}")]
    Network(String),

    /// An external tool could not be started at all.
    #[error("Failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// An external tool exited with a status that is not tolerated.
    #[error("Command exited with status {status}: {command}")]
    CommandFailed { command: String, status: i32 },

    /// Patch application failures (missing target, backup rename)
    #[error("Patch failed: {0}")]
    Patch(String),

    /// Blocking task or runtime failures
    #[error("Concurrency error: {0}")]
    Concurrency(String),
}

/// A type alias for Results that use BootstrapError.
pub type Result<T> = std::result::Result<T, BootstrapError>;

impl BootstrapError {
    /// Creates a new Config error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        BootstrapError::Config(msg.into())
    }

    /// Creates a new Network error with the URL that failed.
    pub fn network<S1, S2>(url: S1, msg: S2) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        BootstrapError::Network(format!("{}: {}", url.into(), msg.into()))
    }

    /// Creates a new Patch error for a target file.
    pub fn patch<S1, S2>(file: S1, msg: S2) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        BootstrapError::Patch(format!("{}: {}", file.into(), msg.into()))
    }

    /// Returns true for configuration errors.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            BootstrapError::Config(_) | BootstrapError::UnknownPackage(_)
        )
    }

    /// Process exit code for a run that ended with this error.
    ///
    /// A failing tool's own status is propagated when it fits in an exit code;
    /// everything else maps to `1`.
    pub fn exit_code(&self) -> i32 {
        match self {
            BootstrapError::CommandFailed { status, .. } if (1..=255).contains(status) => *status,
            _ => 1,
        }
    }

    /// Returns the error category as a string for logging.
    pub fn category(&self) -> &'static str {
        match self {
            BootstrapError::Config(_) => "config",
            BootstrapError::UnknownPackage(_) => "unknown_package",
            BootstrapError::Io(_) => "io",
            BootstrapError::Network(_) => "network",
            BootstrapError::Spawn { .. } => "spawn",
            BootstrapError::CommandFailed { .. } => "command_failed",
            BootstrapError::Patch(_) => "patch",
            BootstrapError::Concurrency(_) => "concurrency",
        }
    }
}

impl From<config::ConfigError> for BootstrapError {
    fn from(err: config::ConfigError) -> Self {
        BootstrapError::Config(err.to_string())
    }
}

impl From<toml::de::Error> for BootstrapError {
    fn from(err: toml::de::Error) -> Self {
        BootstrapError::Config(format!("invalid catalog: {err}"))
    }
}

impl From<regex::Error> for BootstrapError {
    fn from(err: regex::Error) -> Self {
        BootstrapError::Config(format!("invalid patch pattern: {err}"))
    }
}

impl From<validator::ValidationErrors> for BootstrapError {
    fn from(err: validator::ValidationErrors) -> Self {
        BootstrapError::Config(err.to_string())
    }
}

impl From<tokio::task::JoinError> for BootstrapError {
    fn from(err: tokio::task::JoinError) -> Self {
        BootstrapError::Concurrency(format!("Task join error: {}", err))
    }
}
