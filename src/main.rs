//! Binary entry point for the edgeboot CLI.

mod cli;

use std::io::{self, Write};
use std::process;

use clap::Parser;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use edgeboot::janitor::{DEFAULT_CLEANUP_DELAY, Janitor, JanitorError};
use edgeboot::{
    ConfigError, ConfigGenerator, DeployOrchestrator, DeploymentConfig, DomainSource,
    IspFingerprint, OsSpawner, ProvisionError, RenderError, StartupError, SubscriptionBuilder,
    SubscriptionError, TunnelDescriptor, WorkDir, WorkDirError,
};

use cli::{Cli, Command, RenderCommand};

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("provisioner setup failed: {0}")]
    Provision(#[from] ProvisionError),
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error("render failed: {0}")]
    Render(#[from] RenderError),
    #[error("subscription failed: {0}")]
    Subscription(#[from] SubscriptionError),
    #[error(transparent)]
    Workdir(#[from] WorkDirError),
    #[error("no tunnel domain: pass --domain or set ARGO_DOMAIN")]
    MissingDomain,
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    setup_logging(cli.verbose);
    let exit_code = match dispatch(cli.command).await {
        Ok(()) => 0,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

fn setup_logging(verbose: bool) {
    let fallback = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr)
        .init();
}

async fn dispatch(command: Command) -> Result<(), CliError> {
    match command {
        Command::Up => run_up().await,
        Command::Render(args) => {
            let config = DeploymentConfig::load()?;
            let output = render_output(&args, &config)?;
            writeln!(io::stdout(), "{output}")?;
            Ok(())
        }
    }
}

async fn run_up() -> Result<(), CliError> {
    let config = DeploymentConfig::load()?;
    let provisioner = edgeboot::BinaryProvisioner::new()?;
    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_signal(cancel.clone()));

    let mut orchestrator =
        DeployOrchestrator::new(config, provisioner, OsSpawner).with_cancellation(cancel.clone());
    let report = match orchestrator.execute().await {
        Ok(report) => report,
        Err(err) if orchestrator.keeps_serving_after(&err) => {
            error!(
                error = %err,
                running = ?orchestrator.supervisor().running_roles(),
                "startup incomplete; running children kept until shutdown"
            );
            cancel.cancelled().await;
            orchestrator.shutdown();
            return Ok(());
        }
        Err(err) => {
            orchestrator.shutdown();
            return Err(err.into());
        }
    };
    writeln!(io::stdout(), "{}", report.subscription.document())?;
    info!(hostname = %report.tunnel, running = report.running.len(), "deployment ready");

    let workdir = WorkDir::open(orchestrator.config().workdir())?;
    match Janitor::new(&workdir)
        .sweep_after(DEFAULT_CLEANUP_DELAY, &cancel)
        .await
    {
        Ok(summary) => info!(removed = summary.removed_count(), "footprint removed"),
        Err(JanitorError::Cancelled) => {}
        Err(err) => warn!(error = %err, "footprint cleanup incomplete"),
    }

    cancel.cancelled().await;
    orchestrator.shutdown();
    Ok(())
}

async fn cancel_on_signal(cancel: CancellationToken) {
    let interrupt = tokio::signal::ctrl_c();
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };
    tokio::select! {
        result = interrupt => {
            if let Err(err) = result {
                warn!(error = %err, "Ctrl-C handler unavailable");
            }
        }
        () = terminate => {}
    }
    info!("shutdown requested");
    cancel.cancel();
}

fn render_output(args: &RenderCommand, config: &DeploymentConfig) -> Result<String, CliError> {
    if !args.subscription {
        return Ok(ConfigGenerator::new(config).proxy_json()?);
    }
    let domain = args
        .domain
        .as_deref()
        .or_else(|| config.tunnel().domain())
        .ok_or(CliError::MissingDomain)?;
    let tunnel = TunnelDescriptor::new(domain, DomainSource::Static);
    let record = SubscriptionBuilder::new(config).build(&tunnel, &IspFingerprint::unknown())?;
    Ok(record.document().to_owned())
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}

#[cfg(test)]
mod main_tests;
