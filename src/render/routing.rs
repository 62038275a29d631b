//! Static tunnel credential and routing file.

use camino::Utf8Path;
use serde::{Deserialize, Serialize};

use super::RenderError;

/// Parsed tunnel credential document.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TunnelCredential {
    raw: String,
    tunnel_id: String,
}

#[derive(Deserialize)]
struct CredentialFields {
    #[serde(rename = "TunnelID")]
    tunnel_id: String,
}

impl TunnelCredential {
    /// Parses a credential JSON document, extracting its `TunnelID`.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Credential`] when the document is not JSON or
    /// lacks a tunnel identifier.
    pub fn parse(raw: &str) -> Result<Self, RenderError> {
        let fields: CredentialFields =
            serde_json::from_str(raw).map_err(|err| RenderError::Credential(err.to_string()))?;
        if fields.tunnel_id.trim().is_empty() {
            return Err(RenderError::Credential(String::from(
                "TunnelID must not be empty",
            )));
        }
        Ok(Self {
            raw: raw.to_owned(),
            tunnel_id: fields.tunnel_id,
        })
    }

    /// Tunnel identifier.
    #[must_use]
    pub fn tunnel_id(&self) -> &str {
        &self.tunnel_id
    }

    /// Original document, written verbatim next to the routing file.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

/// Routing file mapping the static hostname to the edge listener.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct RoutingFile {
    tunnel: String,
    #[serde(rename = "credentials-file")]
    credentials_file: String,
    protocol: &'static str,
    ingress: Vec<IngressRule>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
struct IngressRule {
    #[serde(skip_serializing_if = "Option::is_none")]
    hostname: Option<String>,
    service: String,
    #[serde(rename = "originRequest", skip_serializing_if = "Option::is_none")]
    origin_request: Option<OriginRequest>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
struct OriginRequest {
    #[serde(rename = "noTLSVerify")]
    no_tls_verify: bool,
}

impl RoutingFile {
    /// Routes `hostname` to the local edge listener on `port`; everything
    /// else gets a 404.
    #[must_use]
    pub fn new(
        credential: &TunnelCredential,
        credentials_path: &Utf8Path,
        hostname: &str,
        port: u16,
    ) -> Self {
        Self {
            tunnel: credential.tunnel_id().to_owned(),
            credentials_file: credentials_path.to_string(),
            protocol: "http2",
            ingress: vec![
                IngressRule {
                    hostname: Some(hostname.to_owned()),
                    service: format!("http://localhost:{port}"),
                    origin_request: Some(OriginRequest {
                        no_tls_verify: true,
                    }),
                },
                IngressRule {
                    hostname: None,
                    service: String::from("http_status:404"),
                    origin_request: None,
                },
            ],
        }
    }

    /// Serializes the routing file as YAML.
    ///
    /// # Errors
    ///
    /// Returns [`serde_yaml::Error`] if serialization fails.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}
