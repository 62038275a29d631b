//! Subscription link rendering.
//!
//! [`SubscriptionBuilder::build`] is pure: identical configuration, tunnel,
//! and fingerprint always produce byte-identical output.

mod fingerprint;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;
use thiserror::Error;

use crate::config::DeploymentConfig;
use crate::render::{TROJAN_PATH, VLESS_PATH, VMESS_PATH};
use crate::tunnel::TunnelDescriptor;
use crate::workdir::{WorkDir, WorkDirError, files};

pub use fingerprint::{IspFingerprint, IspLookup};

/// Early-data hint appended to every WebSocket path.
const EARLY_DATA: &str = "?ed=2560";
const FINGERPRINT: &str = "firefox";

/// Errors raised while building or persisting a subscription.
#[derive(Debug, Error)]
pub enum SubscriptionError {
    /// The VMess descriptor could not be encoded.
    #[error("failed to encode vmess descriptor: {0}")]
    Encode(String),
    /// Writing the subscription files failed.
    #[error(transparent)]
    Persist(#[from] WorkDirError),
}

/// Rendered connection URIs plus the combined base64 document.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SubscriptionRecord {
    vless: String,
    vmess: String,
    trojan: String,
    text: String,
    document: String,
}

impl SubscriptionRecord {
    /// First-protocol URI.
    #[must_use]
    pub fn vless(&self) -> &str {
        &self.vless
    }

    /// Second-protocol URI (`vmess://` + base64 JSON).
    #[must_use]
    pub fn vmess(&self) -> &str {
        &self.vmess
    }

    /// Third-protocol URI.
    #[must_use]
    pub fn trojan(&self) -> &str {
        &self.trojan
    }

    /// URIs in document order.
    #[must_use]
    pub fn uris(&self) -> [&str; 3] {
        [&self.vless, &self.vmess, &self.trojan]
    }

    /// Plain text with the URIs separated by blank lines.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Base64 of [`Self::text`], as served to clients.
    #[must_use]
    pub fn document(&self) -> &str {
        &self.document
    }

    /// Writes the document to `sub.txt` and the URIs, one per line, to
    /// `list.txt`.
    ///
    /// # Errors
    ///
    /// Returns [`SubscriptionError::Persist`] when a write fails.
    pub fn persist(&self, workdir: &WorkDir) -> Result<(), SubscriptionError> {
        workdir.write(files::SUBSCRIPTION, &self.document)?;
        let mut list = self.uris().join("\n");
        list.push('\n');
        workdir.write(files::NODE_LIST, list)?;
        Ok(())
    }
}

#[derive(Serialize)]
struct VmessDescriptor<'a> {
    v: &'static str,
    ps: &'a str,
    add: &'a str,
    port: String,
    id: &'a str,
    aid: &'static str,
    scy: &'static str,
    net: &'static str,
    #[serde(rename = "type")]
    kind: &'static str,
    host: &'a str,
    path: String,
    tls: &'static str,
    sni: &'a str,
    alpn: &'static str,
    fp: &'static str,
}

/// Renders subscription links for one deployment.
#[derive(Clone, Copy, Debug)]
pub struct SubscriptionBuilder<'a> {
    config: &'a DeploymentConfig,
}

impl<'a> SubscriptionBuilder<'a> {
    /// Creates a builder for `config`.
    #[must_use]
    pub const fn new(config: &'a DeploymentConfig) -> Self {
        Self { config }
    }

    /// Node label: `{name}-{fingerprint}` when a name is configured,
    /// otherwise the fingerprint alone.
    #[must_use]
    pub fn display_label(&self, fingerprint: &IspFingerprint) -> String {
        match self.config.node_name() {
            Some(name) => format!("{name}-{fingerprint}"),
            None => fingerprint.as_str().to_owned(),
        }
    }

    /// Renders the three URIs and the combined document.
    ///
    /// # Errors
    ///
    /// Returns [`SubscriptionError::Encode`] if the VMess descriptor cannot be
    /// serialized.
    pub fn build(
        &self,
        tunnel: &TunnelDescriptor,
        fingerprint: &IspFingerprint,
    ) -> Result<SubscriptionRecord, SubscriptionError> {
        let label = self.display_label(fingerprint);
        let uuid = self.config.uuid();
        let edge = self.config.edge();
        let host = tunnel.hostname();
        let endpoint = format!("{}:{}", edge.host(), edge.port());

        let vless = format!(
            "vless://{uuid}@{endpoint}?encryption=none&security=tls&sni={host}&fp={FINGERPRINT}\
             &type=ws&host={host}&path={}#{label}",
            encode_path(VLESS_PATH)
        );

        let descriptor = VmessDescriptor {
            v: "2",
            ps: &label,
            add: edge.host(),
            port: edge.port().to_string(),
            id: uuid,
            aid: "0",
            scy: "none",
            net: "ws",
            kind: "none",
            host,
            path: format!("{VMESS_PATH}{EARLY_DATA}"),
            tls: "tls",
            sni: host,
            alpn: "",
            fp: FINGERPRINT,
        };
        let json = serde_json::to_string(&descriptor)
            .map_err(|err| SubscriptionError::Encode(err.to_string()))?;
        let vmess = format!("vmess://{}", STANDARD.encode(json));

        let trojan = format!(
            "trojan://{uuid}@{endpoint}?security=tls&sni={host}&fp={FINGERPRINT}\
             &type=ws&host={host}&path={}#{label}",
            encode_path(TROJAN_PATH)
        );

        let text = format!("{vless}\n\n{vmess}\n\n{trojan}\n");
        let document = STANDARD.encode(&text);

        Ok(SubscriptionRecord {
            vless,
            vmess,
            trojan,
            text,
            document,
        })
    }
}

/// Percent-encodes a WebSocket path with the early-data hint, e.g.
/// `/vless-argo` becomes `%2Fvless-argo%3Fed%3D2560`.
fn encode_path(path: &str) -> String {
    format!("{path}{EARLY_DATA}")
        .replace('/', "%2F")
        .replace('?', "%3F")
        .replace('=', "%3D")
}

#[cfg(test)]
mod tests;
