//! Deploy command implementation.
//!
//! Runs the full pipeline against an in-memory [`SimulatedChain`] and writes
//! the manifest to a JSON file.

use std::io::Write;
use std::sync::Arc;

use dao_provision::{
    DeployContext, JsonFileRecorder, Pipeline, PipelineConfig, PipelineReport, SimulatedChain,
};
use tracing::info;

use crate::cli::DeployArgs;
use crate::error::CliError;
use crate::output::OutputFormat;

/// Deploy command executor.
#[derive(Debug)]
pub struct DeployCommand {
    config: PipelineConfig,
    founders: Option<u32>,
}

impl DeployCommand {
    /// Create a deploy command, applying command-line overrides to `config`.
    #[must_use]
    pub fn new(mut config: PipelineConfig, args: &DeployArgs) -> Self {
        if let Some(name) = &args.network {
            config.network.name.clone_from(name);
        }
        if let Some(id) = args.network_id {
            config.network.id = id;
        }
        if let Some(out) = &args.out {
            config.manifest.path.clone_from(out);
        }
        if let Some(tag) = &args.tag {
            config.manifest.tag.clone_from(tag);
        }
        Self {
            config,
            founders: args.founders,
        }
    }

    /// Effective config after overrides.
    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn founder_count(&self) -> Result<u32, CliError> {
        let count = match self.founders {
            Some(n) => n,
            None => u32::try_from(self.config.organization.allocations.len()).map_err(|_| {
                CliError::InvalidArgument("too many founder allocations".to_string())
            })?,
        };
        if count == 0 {
            return Err(CliError::InvalidArgument(
                "at least one founder is required".to_string(),
            ));
        }
        Ok(count)
    }

    /// Runs the pipeline and returns its report.
    ///
    /// # Errors
    ///
    /// Returns an error if the founder count is invalid or a fatal stage fails.
    pub async fn run(&self) -> Result<PipelineReport, CliError> {
        let founders = self.founder_count()?;
        let network = self.config.network.info();
        let ctx = DeployContext::new(
            Arc::new(SimulatedChain::new()),
            network,
            SimulatedChain::signers(founders),
        );
        let recorder = JsonFileRecorder::new(self.config.manifest.path.clone());
        let report = Pipeline::new(ctx, self.config.clone(), recorder).run().await?;
        info!(
            run_id = %report.run_id,
            path = %self.config.manifest.path.display(),
            tag = %self.config.manifest.tag,
            "manifest written"
        );
        Ok(report)
    }

    /// Execute the deploy command.
    ///
    /// # Errors
    ///
    /// Returns an error if the run or output fails.
    pub async fn execute<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
    ) -> Result<(), CliError> {
        let report = self.run().await?;
        format.write(writer, &report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Format;

    fn args(out: std::path::PathBuf) -> DeployArgs {
        DeployArgs {
            network: Some("staging".to_string()),
            network_id: Some(4448),
            out: Some(out),
            tag: Some("test".to_string()),
            founders: None,
        }
    }

    #[test]
    fn overrides_replace_config_values() {
        let cmd = DeployCommand::new(PipelineConfig::default(), &args("out.json".into()));
        assert_eq!(cmd.config().network.name, "staging");
        assert_eq!(cmd.config().network.id, 4448);
        assert_eq!(cmd.config().manifest.tag, "test");
        assert_eq!(cmd.config().manifest.path, std::path::PathBuf::from("out.json"));
    }

    #[test]
    fn zero_founders_is_rejected() {
        let mut deploy = args("out.json".into());
        deploy.founders = Some(0);
        let cmd = DeployCommand::new(PipelineConfig::default(), &deploy);
        assert!(matches!(cmd.founder_count(), Err(CliError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn deploy_writes_manifest_under_tag_and_network() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("deployment.json");
        let cmd = DeployCommand::new(PipelineConfig::default(), &args(path.clone()));

        let mut out = Vec::new();
        cmd.execute(&mut out, &OutputFormat::new(Format::Json))
            .await
            .expect("deploy");

        let report: serde_json::Value = serde_json::from_slice(&out).expect("report json");
        assert_eq!(report["network"]["name"], "staging");

        let raw = std::fs::read_to_string(&path).expect("manifest");
        let manifest: serde_json::Value = serde_json::from_str(&raw).expect("manifest json");
        assert!(manifest["test"]["staging"]["Reserve"].is_string());
        assert_eq!(manifest["test"]["staging"]["networkId"], 4448);
    }

    #[tokio::test]
    async fn founder_count_mismatch_fails_the_run() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut deploy = args(dir.path().join("deployment.json"));
        deploy.founders = Some(2);
        let result = DeployCommand::new(PipelineConfig::default(), &deploy).run().await;
        assert!(matches!(result, Err(CliError::Pipeline(_))));
        assert!(!dir.path().join("deployment.json").exists());
    }
}
