//! Working-directory janitor for edgeboot.
//!
//! This binary deletes the tunnel log, the proxy configuration, and the
//! downloaded binaries from a deployment's working directory, then verifies
//! none of them remain.

use std::io::Write as _;
use std::time::Duration;

use camino::Utf8PathBuf;
use clap::Parser;
use edgeboot::config::DEFAULT_WORKDIR;
use edgeboot::janitor::Janitor;
use edgeboot::workdir::WorkDir;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Parser)]
#[command(
    name = "edgeboot-janitor",
    about = "Remove the on-disk footprint of an edgeboot deployment"
)]
struct Cli {
    /// Working directory of the deployment.
    #[arg(long, env = "FILE_PATH", default_value = DEFAULT_WORKDIR)]
    workdir: Utf8PathBuf,
    /// Seconds to wait before sweeping.
    #[arg(long, default_value_t = 0)]
    delay: u64,
}

#[tokio::main]
async fn main() -> Result<(), String> {
    let cli = Cli::parse();
    let workdir = WorkDir::open(&cli.workdir).map_err(|err| err.to_string())?;
    let summary = Janitor::new(&workdir)
        .sweep_after(Duration::from_secs(cli.delay), &CancellationToken::new())
        .await
        .map_err(|err| err.to_string())?;
    writeln!(
        std::io::stdout(),
        "janitor sweep complete: removed={}, already_absent={}",
        summary.removed_count(),
        summary.missing
    )
    .map_err(|err| err.to_string())?;
    Ok(())
}
