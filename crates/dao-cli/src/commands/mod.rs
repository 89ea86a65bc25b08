//! CLI command implementations.
//!
//! - [`plan`] - Stage order and failure policies
//! - [`deploy`] - Full pipeline run against the simulated chain

pub mod deploy;
pub mod plan;

pub use deploy::DeployCommand;
pub use plan::PlanCommand;

use std::path::Path;

use dao_provision::PipelineConfig;
use tracing::debug;

use crate::error::CliError;

/// Loads the config file at `path`, or the defaults when no path is given.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_config(path: Option<&Path>) -> Result<PipelineConfig, CliError> {
    match path {
        Some(path) => PipelineConfig::load(path)
            .map_err(|e| CliError::Config(format!("{}: {e}", path.display()))),
        None => {
            debug!("no config file given, using defaults");
            Ok(PipelineConfig::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn missing_path_uses_defaults() {
        let config = load_config(None).expect("defaults");
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn partial_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        write!(file, r#"{{"network": {{"name": "fuse", "id": 122}}}}"#).expect("write");
        let config = load_config(Some(file.path())).expect("load");
        assert_eq!(config.network.name, "fuse");
        assert_eq!(config.network.id, 122);
        assert_eq!(config.ubi, PipelineConfig::default().ubi);
    }

    #[test]
    fn unreadable_file_is_config_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let result = load_config(Some(&dir.path().join("missing.json")));
        assert!(matches!(result, Err(CliError::Config(msg)) if msg.contains("missing.json")));
    }
}
