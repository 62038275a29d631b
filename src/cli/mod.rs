//! Command-line interface definitions for the `edgeboot` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::{Parser, Subcommand};

/// Top-level CLI for the `edgeboot` binary.
#[derive(Debug, Parser)]
#[command(
    name = "edgeboot",
    about = "Provision a proxy stack behind a reverse tunnel and publish subscription links",
    arg_required_else_help = true
)]
pub(crate) struct Cli {
    /// Log at debug level unless `RUST_LOG` says otherwise.
    #[arg(long, short, global = true)]
    pub(crate) verbose: bool,
    /// Subcommand to run.
    #[command(subcommand)]
    pub(crate) command: Command,
}

/// Subcommands of the `edgeboot` binary.
#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// Download, configure, and launch the stack, then publish its links.
    #[command(
        name = "up",
        about = "Download, configure, and launch the stack, then publish its links"
    )]
    Up,
    /// Print generated configuration without downloading or launching.
    #[command(
        name = "render",
        about = "Print generated configuration without downloading or launching"
    )]
    Render(RenderCommand),
}

/// Arguments for the `edgeboot render` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct RenderCommand {
    /// Print the base64 subscription document instead of the proxy
    /// configuration.
    ///
    /// The node label uses the `Unknown` fingerprint because no network
    /// lookup is made.
    #[arg(long)]
    pub(crate) subscription: bool,
    /// Tunnel hostname to embed in the subscription; defaults to the
    /// configured `ARGO_DOMAIN`.
    #[arg(long, value_name = "HOST", requires = "subscription")]
    pub(crate) domain: Option<String>,
}
