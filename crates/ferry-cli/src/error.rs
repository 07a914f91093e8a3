//! CLI-specific error types and exit codes.

use ferry_core::ConfigError;
use thiserror::Error;

/// CLI-specific error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Argument or input file problem.
    #[error("Invalid arguments: {0}")]
    Arguments(String),

    /// IO error (destination not writable, etc.).
    #[error("IO error: {0}")]
    Io(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// At least one upload did not complete.
    #[error("{failed} of {total} uploads failed")]
    UploadsFailed {
        /// Items that ended in `error`.
        failed: usize,
        /// Items submitted.
        total: usize,
    },

    /// Interrupted before every upload finished.
    #[error("Interrupted: {cancelled} uploads cancelled")]
    Interrupted {
        /// Items that ended in `cancelled`.
        cancelled: usize,
    },
}

impl CliError {
    /// Map error to appropriate exit code.
    ///
    /// Exit codes follow Unix conventions:
    /// - 1: General error (an upload failed)
    /// - 2: Misuse of shell command (invalid arguments)
    /// - 130: Terminated by Ctrl-C
    /// - 64-78: Reserved for specific error categories (see sysexits.h)
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::UploadsFailed { .. } => 1,
            Self::Arguments(_) => 2, // EX_USAGE
            Self::Io(_) => 74,       // EX_IOERR
            Self::Config(_) => 78,   // EX_CONFIG
            Self::Interrupted { .. } => 130,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(CliError::Arguments("x".into()).exit_code(), 2);
        assert_eq!(CliError::Io("x".into()).exit_code(), 74);
        assert_eq!(CliError::UploadsFailed { failed: 1, total: 3 }.exit_code(), 1);
        assert_eq!(CliError::Interrupted { cancelled: 2 }.exit_code(), 130);
    }

    #[test]
    fn test_config_error_mapping() {
        let err: CliError = ConfigError::InvalidConcurrency {
            value: "zero".to_string(),
        }
        .into();
        assert_eq!(err.exit_code(), 78);
        assert!(err.to_string().contains("zero"));
    }
}
