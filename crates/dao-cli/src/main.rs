//! DAO provisioning binary entrypoint.

use std::io;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use dao_cli::cli::{Cli, Commands};
use dao_cli::commands::{DeployCommand, PlanCommand, load_config};
use dao_cli::output::OutputFormat;

fn init_tracing(json: bool) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), dao_cli::CliError> {
    let format = OutputFormat::new(cli.format);
    let config = load_config(cli.config.as_deref())?;
    let mut stdout = io::stdout().lock();

    match cli.command {
        Commands::Plan => {
            let cmd = PlanCommand::new(config);
            cmd.execute(&mut stdout, &format)?;
        }
        Commands::Deploy(args) => {
            let cmd = DeployCommand::new(config, &args);
            cmd.execute(&mut stdout, &format).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dao_cli::cli::Format;

    #[test]
    fn cli_parses_plan() {
        let cli = Cli::parse_from(["dao-provision", "plan"]);
        assert!(matches!(cli.command, Commands::Plan));
        assert!(cli.config.is_none());
        assert!(!cli.log_json);
    }

    #[test]
    fn cli_parses_deploy_overrides() {
        let cli = Cli::parse_from([
            "dao-provision",
            "deploy",
            "--network",
            "fuse",
            "--network-id",
            "122",
            "--out",
            "releases/fuse.json",
            "--tag",
            "v2",
            "--founders",
            "5",
        ]);
        let Commands::Deploy(args) = cli.command else {
            unreachable!("expected deploy command");
        };
        assert_eq!(args.network.as_deref(), Some("fuse"));
        assert_eq!(args.network_id, Some(122));
        assert_eq!(args.out, Some("releases/fuse.json".into()));
        assert_eq!(args.tag.as_deref(), Some("v2"));
        assert_eq!(args.founders, Some(5));
    }

    #[test]
    fn cli_respects_global_flags() {
        let cli = Cli::parse_from([
            "dao-provision",
            "--format",
            "json",
            "--log-json",
            "--config",
            "dao.json",
            "plan",
        ]);
        assert_eq!(cli.format, Format::Json);
        assert!(cli.log_json);
        assert_eq!(cli.config, Some("dao.json".into()));
    }

    #[test]
    fn cli_rejects_unknown_command() {
        assert!(Cli::try_parse_from(["dao-provision", "destroy"]).is_err());
    }

    #[tokio::test]
    async fn run_plan_with_defaults() {
        let cli = Cli::parse_from(["dao-provision", "plan"]);
        assert!(run(cli).await.is_ok());
    }

    #[tokio::test]
    async fn run_with_missing_config_fails() {
        let cli = Cli::parse_from(["dao-provision", "--config", "/nonexistent/dao.json", "plan"]);
        assert!(run(cli).await.is_err());
    }
}
