//! Error types for Burrow

use thiserror::Error;

/// Exit code used when the configuration or the command line is invalid
pub const EXIT_CONFIG: i32 = 2;

/// Exit code used when container setup fails
pub const EXIT_SETUP: i32 = 126;

/// Exit code used when the user command could not be started
pub const EXIT_NOT_STARTED: i32 = 127;

/// Burrow error types
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Error message
        message: String,
    },

    /// Malformed `host:container` volume mapping
    #[error("Invalid volume mapping '{mapping}': {reason}")]
    InvalidVolume {
        /// The mapping as given by the user
        mapping: String,
        /// Why it was rejected
        reason: String,
    },

    /// Namespace operation failed
    #[error("Namespace error: {message}")]
    Namespace {
        /// Error message
        message: String,
    },

    /// Root filesystem could not be materialized
    #[error("Root filesystem error: {message}")]
    Materialize {
        /// Error message
        message: String,
    },

    /// Mount or unmount failed
    #[error("Mount error: {message}")]
    Mount {
        /// Error message
        message: String,
    },

    /// Root switch failed
    #[error("Pivot error: {message}")]
    Pivot {
        /// Error message
        message: String,
    },

    /// Permission denied
    #[error("Permission denied: {operation}")]
    PermissionDenied {
        /// Operation that was denied
        operation: String,
    },

    /// The user command could not be started
    #[error("Failed to start '{program}': {source}")]
    CommandStart {
        /// Program that was executed
        program: String,
        /// Underlying spawn error
        #[source]
        source: std::io::Error,
    },

    /// System error from nix
    #[error("System error: {0}")]
    System(#[from] nix::Error),
}

/// Category an [`Error`] belongs to
///
/// Setup errors abort the launch; runtime errors come from the user command
/// and are surfaced through the exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad arguments or configuration, nothing was attempted
    Configuration,
    /// Isolation setup failed, the container is unusable
    Setup,
    /// The user command failed to start
    Runtime,
}

impl Error {
    /// Shorthand for [`Error::InvalidConfig`]
    pub fn config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Classify this error
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidConfig { .. } | Self::InvalidVolume { .. } => ErrorKind::Configuration,
            Self::CommandStart { .. } => ErrorKind::Runtime,
            Self::Io(_)
            | Self::Namespace { .. }
            | Self::Materialize { .. }
            | Self::Mount { .. }
            | Self::Pivot { .. }
            | Self::PermissionDenied { .. }
            | Self::System(_) => ErrorKind::Setup,
        }
    }

    /// Process exit code matching this error's kind
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self.kind() {
            ErrorKind::Configuration => EXIT_CONFIG,
            ErrorKind::Setup => EXIT_SETUP,
            ErrorKind::Runtime => EXIT_NOT_STARTED,
        }
    }
}

/// Result type alias for Burrow operations
pub type Result<T> = std::result::Result<T, Error>;
