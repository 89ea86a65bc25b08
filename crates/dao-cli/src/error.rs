//! CLI error types.

use thiserror::Error;

use dao_provision::ProvisionError;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// Config file could not be loaded or is invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// Invalid argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The pipeline failed.
    #[error("pipeline error: {0}")]
    Pipeline(#[from] ProvisionError),

    /// Output formatting error.
    #[error("format error: {0}")]
    Format(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_error_keeps_source_message() {
        let err = CliError::from(ProvisionError::Plan("cycle".into()));
        assert_eq!(err.to_string(), "pipeline error: invalid deployment plan: cycle");
    }

    #[test]
    fn from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        assert!(matches!(CliError::from(io_err), CliError::Io(_)));
    }
}
