//! Error types for the provisioning pipeline.
//!
//! The first four variants are the pipeline's failure taxonomy. Which of them
//! abort a run and which degrade it is decided per stage, see
//! [`crate::plan::FailurePolicy`].

use thiserror::Error;

/// Result type alias for provisioning operations.
pub type ProvisionResult<T> = Result<T, ProvisionError>;

/// Errors that can occur while provisioning an organization.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// A unit construction or creation call reverted.
    #[error("deployment of {unit} failed: {reason}")]
    Deployment {
        /// Unit being deployed or configured
        unit: String,
        /// Revert reason or local validation message
        reason: String,
    },

    /// A registration or proxied call was rejected by the controller.
    #[error("permission denied for {target}: {reason}")]
    Permission {
        /// Scheme or call target involved
        target: String,
        /// Revert reason
        reason: String,
    },

    /// A `start()` call was attempted before its wiring preconditions held.
    #[error("activation of {unit} failed: {reason}")]
    Activation {
        /// Unit being started
        unit: String,
        /// Missing precondition or revert reason
        reason: String,
    },

    /// Two dependent units reference mismatched parameter hashes.
    #[error("configuration mismatch: {0}")]
    Configuration(String),

    /// The stage graph is malformed or a stage ran without its inputs.
    #[error("invalid deployment plan: {0}")]
    Plan(String),

    /// The pipeline configuration failed validation.
    #[error("invalid pipeline config: {0}")]
    InvalidConfig(String),

    /// A string could not be parsed as an address or hash.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// The manifest recorder could not persist the manifest.
    #[error("manifest recorder error: {0}")]
    Recorder(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProvisionError {
    /// Creates a deployment error.
    #[must_use]
    pub fn deployment(unit: impl std::fmt::Display, reason: impl std::fmt::Display) -> Self {
        Self::Deployment {
            unit: unit.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Creates a permission error.
    #[must_use]
    pub fn permission(target: impl std::fmt::Display, reason: impl std::fmt::Display) -> Self {
        Self::Permission {
            target: target.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Creates an activation error.
    #[must_use]
    pub fn activation(unit: impl std::fmt::Display, reason: impl std::fmt::Display) -> Self {
        Self::Activation {
            unit: unit.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Short label for the error class, used as a structured log field.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Deployment { .. } => "deployment",
            Self::Permission { .. } => "permission",
            Self::Activation { .. } => "activation",
            Self::Configuration(_) => "configuration",
            Self::Plan(_) => "plan",
            Self::InvalidConfig(_) => "invalid_config",
            Self::InvalidAddress(_) => "invalid_address",
            Self::Recorder(_) => "recorder",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let err = ProvisionError::deployment("Reserve", "market maker not deployed");
        assert_eq!(
            err.to_string(),
            "deployment of Reserve failed: market maker not deployed"
        );

        let err = ProvisionError::permission("0xabc", "caller lacks generic call");
        assert_eq!(
            err.to_string(),
            "permission denied for 0xabc: caller lacks generic call"
        );

        let err = ProvisionError::activation("UBIScheme", "not registered");
        assert_eq!(err.to_string(), "activation of UBIScheme failed: not registered");
    }

    #[test]
    fn kind_labels() {
        assert_eq!(ProvisionError::Configuration("x".into()).kind(), "configuration");
        assert_eq!(ProvisionError::Plan("cycle".into()).kind(), "plan");
        assert_eq!(ProvisionError::activation("a", "b").kind(), "activation");
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err = ProvisionError::from(io);
        assert!(matches!(err, ProvisionError::Io(_)));
    }
}
