//! Best-effort registration with a remote aggregator.
//!
//! None of these calls can fail startup: every path returns an
//! [`UploadOutcome`] and logs instead of propagating errors.

use std::fmt;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use reqwest::StatusCode;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::UploadTarget;
use crate::workdir::{WorkDir, files};

const UPLOAD_TIMEOUT: Duration = Duration::from_secs(10);
const NODE_SCHEMES: [&str; 5] = ["vless://", "vmess://", "trojan://", "hysteria2://", "tuic://"];

/// Result of a best-effort registration call.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum UploadOutcome {
    /// Nothing to do for the current configuration.
    Skipped,
    /// The remote accepted the payload.
    Accepted,
    /// The remote already knew the payload (HTTP 400).
    AlreadyRegistered,
    /// The remote rejected the payload with another status.
    Rejected(u16),
    /// The request did not complete.
    Failed(String),
}

impl UploadOutcome {
    /// Returns `true` for accepted or already-registered payloads.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Accepted | Self::AlreadyRegistered)
    }
}

impl fmt::Display for UploadOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skipped => f.write_str("skipped"),
            Self::Accepted => f.write_str("accepted"),
            Self::AlreadyRegistered => f.write_str("already registered"),
            Self::Rejected(status) => write!(f, "rejected with HTTP {status}"),
            Self::Failed(message) => write!(f, "failed: {message}"),
        }
    }
}

/// Lines of `text` that are proxy node URIs.
#[must_use]
pub fn node_uris(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| NODE_SCHEMES.iter().any(|scheme| line.starts_with(scheme)))
        .map(str::to_owned)
        .collect()
}

#[derive(Serialize)]
struct NodesPayload<'a> {
    nodes: &'a [String],
}

#[derive(Serialize)]
struct SubscriptionPayload<'a> {
    subscription: [&'a str; 1],
}

#[derive(Serialize)]
struct KeepalivePayload<'a> {
    url: &'a str,
}

/// Client for the aggregator and keep-alive endpoints.
#[derive(Clone, Debug)]
pub struct UploadClient {
    client: Option<reqwest::Client>,
    target: UploadTarget,
}

impl UploadClient {
    /// Creates a client for `target` with a short request timeout.
    #[must_use]
    pub fn new(target: UploadTarget) -> Self {
        let client = reqwest::Client::builder()
            .timeout(UPLOAD_TIMEOUT)
            .build()
            .map_err(|err| warn!(error = %err, "upload client unavailable"))
            .ok();
        Self { client, target }
    }

    /// Publishes this deployment. With a project URL the subscription URL
    /// `{project}/{sub_path}` is registered; without one the node URIs from
    /// `list.txt` are uploaded instead.
    pub async fn publish(&self, workdir: &WorkDir, sub_path: &str) -> UploadOutcome {
        let Some(aggregator) = self.target.aggregator() else {
            return UploadOutcome::Skipped;
        };

        let outcome = if let Some(project) = self.target.project_url() {
            let url = format!("{project}/{sub_path}");
            self.post(
                &format!("{aggregator}/api/add-subscriptions"),
                &SubscriptionPayload {
                    subscription: [&url],
                },
            )
            .await
        } else {
            let nodes = match workdir.read_to_string(files::NODE_LIST) {
                Ok(Some(list)) => node_uris(&list),
                Ok(None) => Vec::new(),
                Err(err) => {
                    warn!(error = %err, "failed to read node list");
                    Vec::new()
                }
            };
            if nodes.is_empty() {
                return UploadOutcome::Skipped;
            }
            self.post(
                &format!("{aggregator}/api/add-nodes"),
                &NodesPayload { nodes: &nodes },
            )
            .await
        };

        info!(%outcome, "aggregator registration finished");
        outcome
    }

    /// Removes nodes listed in a previous run's base64 subscription document.
    pub async fn delete_stale_nodes(&self, previous_document: &str) -> UploadOutcome {
        let Some(aggregator) = self.target.aggregator() else {
            return UploadOutcome::Skipped;
        };
        let Ok(decoded) = STANDARD.decode(previous_document.trim()) else {
            warn!("previous subscription is not valid base64");
            return UploadOutcome::Skipped;
        };
        let nodes = node_uris(&String::from_utf8_lossy(&decoded));
        if nodes.is_empty() {
            return UploadOutcome::Skipped;
        }

        let outcome = self
            .post(
                &format!("{aggregator}/api/delete-nodes"),
                &NodesPayload { nodes: &nodes },
            )
            .await;
        info!(count = nodes.len(), %outcome, "stale node deletion finished");
        outcome
    }

    /// Registers the project URL with the keep-alive service when enabled.
    pub async fn register_keepalive(&self) -> UploadOutcome {
        let Some(project) = self.target.project_url() else {
            return UploadOutcome::Skipped;
        };
        if !self.target.auto_access() {
            return UploadOutcome::Skipped;
        }
        let outcome = self
            .post(self.target.keepalive_url(), &KeepalivePayload { url: project })
            .await;
        info!(%outcome, "keep-alive registration finished");
        outcome
    }

    async fn post(&self, url: &str, payload: &impl Serialize) -> UploadOutcome {
        let Some(client) = self.client.as_ref() else {
            return UploadOutcome::Failed(String::from("HTTP client unavailable"));
        };
        match client.post(url).json(payload).send().await {
            Ok(response) => match response.status() {
                status if status.is_success() => UploadOutcome::Accepted,
                StatusCode::BAD_REQUEST => UploadOutcome::AlreadyRegistered,
                status => {
                    warn!(%url, %status, "registration rejected");
                    UploadOutcome::Rejected(status.as_u16())
                }
            },
            Err(err) => {
                warn!(%url, error = %err, "registration request failed");
                UploadOutcome::Failed(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{UploadOutcome, node_uris};

    #[test]
    fn node_uris_keep_known_schemes_only() {
        let text = "vless://a\n\nvmess://b\nhttp://c\n  trojan://d  \nhysteria2://e\ntuic://f\n";

        assert_eq!(
            node_uris(text),
            vec!["vless://a", "vmess://b", "trojan://d", "hysteria2://e", "tuic://f"]
        );
    }

    #[test]
    fn duplicate_registration_counts_as_success() {
        assert!(UploadOutcome::AlreadyRegistered.is_success());
        assert!(!UploadOutcome::Rejected(500).is_success());
        assert!(!UploadOutcome::Skipped.is_success());
    }
}
