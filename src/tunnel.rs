//! Tunnel credential classification and client arguments.

use std::fmt;

use camino::Utf8Path;

use crate::config::TunnelSettings;
use crate::workdir::files;

/// Marker identifying a credential JSON document.
pub const SECRET_MARKER: &str = "TunnelSecret";

const TOKEN_MIN_LEN: usize = 120;
const TOKEN_MAX_LEN: usize = 250;

/// How the tunnel client authenticates.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TunnelMode {
    /// Connector token passed on the command line.
    Token(String),
    /// Credential document plus a generated routing file.
    RoutingFile,
    /// Anonymous tunnel with a provider-assigned hostname.
    Ephemeral,
}

/// Returns `true` for connector-token shaped strings: 120 to 250 ASCII
/// alphanumerics or `=`.
#[must_use]
pub fn is_token_shaped(credential: &str) -> bool {
    (TOKEN_MIN_LEN..=TOKEN_MAX_LEN).contains(&credential.len())
        && credential
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '=')
}

impl TunnelMode {
    /// Classifies the configured credential. Routing-file mode also needs a
    /// domain to route; without one the client falls back to an ephemeral
    /// tunnel.
    #[must_use]
    pub fn classify(settings: &TunnelSettings) -> Self {
        match settings.credential() {
            Some(credential) if is_token_shaped(credential) => Self::Token(credential.to_owned()),
            Some(credential)
                if credential.contains(SECRET_MARKER) && settings.domain().is_some() =>
            {
                Self::RoutingFile
            }
            _ => Self::Ephemeral,
        }
    }

    /// Client arguments for this mode. `workdir` is where the routing file
    /// and the ephemeral log live; `port` is the local edge listener.
    #[must_use]
    pub fn client_args(&self, workdir: &Utf8Path, port: u16) -> Vec<String> {
        let mut args: Vec<String> = ["tunnel", "--edge-ip-version", "auto"]
            .into_iter()
            .map(String::from)
            .collect();
        match self {
            Self::Token(token) => {
                args.extend(
                    ["--no-autoupdate", "--protocol", "http2", "run", "--token"]
                        .into_iter()
                        .map(String::from),
                );
                args.push(token.clone());
            }
            Self::RoutingFile => {
                args.push(String::from("--config"));
                args.push(workdir.join(files::TUNNEL_ROUTING).to_string());
                args.push(String::from("run"));
            }
            Self::Ephemeral => {
                args.extend(
                    ["--no-autoupdate", "--protocol", "http2", "--logfile"]
                        .into_iter()
                        .map(String::from),
                );
                args.push(workdir.join(files::TUNNEL_LOG).to_string());
                args.extend(["--loglevel", "info", "--url"].into_iter().map(String::from));
                args.push(format!("http://localhost:{port}"));
            }
        }
        args
    }
}

/// How the public hostname was obtained.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DomainSource {
    /// Pre-registered domain from configuration.
    Static,
    /// Hostname scraped from the ephemeral tunnel log.
    LogScraped,
}

/// Resolved public hostname of the tunnel.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TunnelDescriptor {
    hostname: String,
    source: DomainSource,
}

impl TunnelDescriptor {
    /// Creates a descriptor.
    #[must_use]
    pub fn new(hostname: impl Into<String>, source: DomainSource) -> Self {
        Self {
            hostname: hostname.into(),
            source,
        }
    }

    /// Public hostname.
    #[must_use]
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// How the hostname was obtained.
    #[must_use]
    pub const fn source(&self) -> DomainSource {
        self.source
    }
}

impl fmt::Display for TunnelDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hostname)
    }
}
