//! Configuration generation for the supervised binaries.
//!
//! Every document is built as typed data and serialized through
//! `serde_json` or `serde_yaml`.

mod monitor;
mod proxy;
mod routing;

use camino::Utf8PathBuf;
use thiserror::Error;
use tracing::info;

use crate::config::{DeploymentConfig, MonitorVariant};
use crate::tunnel::TunnelMode;
use crate::workdir::{WorkDir, WorkDirError, files};

pub use monitor::AgentConfig;
pub use proxy::{
    PLAIN_PORT, ProxyInboundSpec, TROJAN_PATH, TROJAN_WS_PORT, VLESS_PATH, VLESS_WS_PORT,
    VMESS_PATH, VMESS_WS_PORT,
};
pub use routing::{RoutingFile, TunnelCredential};

/// Errors raised while rendering or writing generated files.
#[derive(Debug, Error)]
pub enum RenderError {
    /// A document could not be serialized.
    #[error("failed to serialize {document}: {message}")]
    Serialize {
        /// Document name.
        document: &'static str,
        /// Underlying error message.
        message: String,
    },
    /// The tunnel credential is not a usable credential document.
    #[error("invalid tunnel credential: {0}")]
    Credential(String),
    /// A generated file could not be written.
    #[error(transparent)]
    Write(#[from] WorkDirError),
}

impl RenderError {
    fn serialize(document: &'static str, err: &impl std::fmt::Display) -> Self {
        Self::Serialize {
            document,
            message: err.to_string(),
        }
    }
}

/// Paths of the files written by [`ConfigGenerator::generate`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GeneratedFiles {
    /// Proxy engine configuration.
    pub proxy_config: Utf8PathBuf,
    /// Monitoring agent configuration, for the v1 agent.
    pub agent_config: Option<Utf8PathBuf>,
    /// Tunnel routing file, for routing-file mode.
    pub routing_file: Option<Utf8PathBuf>,
}

/// Produces every configuration document a deployment needs.
#[derive(Clone, Copy, Debug)]
pub struct ConfigGenerator<'a> {
    config: &'a DeploymentConfig,
}

impl<'a> ConfigGenerator<'a> {
    /// Creates a generator for `config`.
    #[must_use]
    pub const fn new(config: &'a DeploymentConfig) -> Self {
        Self { config }
    }

    /// Proxy engine topology.
    #[must_use]
    pub fn proxy_spec(&self) -> ProxyInboundSpec {
        ProxyInboundSpec::new(self.config.uuid(), self.config.tunnel().port())
    }

    /// Serialized proxy engine configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Serialize`] if serialization fails.
    pub fn proxy_json(&self) -> Result<String, RenderError> {
        self.proxy_spec()
            .to_json()
            .map_err(|err| RenderError::serialize(files::PROXY_CONFIG, &err))
    }

    /// Agent configuration; only the v1 agent reads a file.
    #[must_use]
    pub fn agent_config(&self) -> Option<AgentConfig> {
        self.config
            .monitor()
            .filter(|monitor| monitor.variant() == MonitorVariant::V1)
            .map(|monitor| AgentConfig::new(monitor, self.config.uuid()))
    }

    /// Credential and routing file for routing-file mode.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Credential`] when the credential cannot be
    /// parsed.
    pub fn routing(
        &self,
        workdir: &WorkDir,
    ) -> Result<Option<(TunnelCredential, RoutingFile)>, RenderError> {
        let tunnel = self.config.tunnel();
        if TunnelMode::classify(tunnel) != TunnelMode::RoutingFile {
            return Ok(None);
        }
        let (Some(raw), Some(domain)) = (tunnel.credential(), tunnel.domain()) else {
            return Ok(None);
        };
        let credential = TunnelCredential::parse(raw)?;
        let routing = RoutingFile::new(
            &credential,
            &workdir.join(files::TUNNEL_CREDENTIAL),
            domain,
            tunnel.port(),
        );
        Ok(Some((credential, routing)))
    }

    /// Writes every applicable document into `workdir`.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError`] when a document cannot be rendered or written.
    pub fn generate(&self, workdir: &WorkDir) -> Result<GeneratedFiles, RenderError> {
        workdir.write(files::PROXY_CONFIG, self.proxy_json()?)?;
        info!(path = %workdir.join(files::PROXY_CONFIG), "proxy configuration written");

        let agent_config = match self.agent_config() {
            Some(agent) => {
                let yaml = agent
                    .to_yaml()
                    .map_err(|err| RenderError::serialize(files::AGENT_CONFIG, &err))?;
                workdir.write(files::AGENT_CONFIG, yaml)?;
                info!(tls = agent.tls(), "monitoring agent configuration written");
                Some(workdir.join(files::AGENT_CONFIG))
            }
            None => None,
        };

        let routing_file = match self.routing(workdir)? {
            Some((credential, routing)) => {
                workdir.write(files::TUNNEL_CREDENTIAL, credential.raw())?;
                let yaml = routing
                    .to_yaml()
                    .map_err(|err| RenderError::serialize(files::TUNNEL_ROUTING, &err))?;
                workdir.write(files::TUNNEL_ROUTING, yaml)?;
                info!(tunnel = credential.tunnel_id(), "tunnel routing file written");
                Some(workdir.join(files::TUNNEL_ROUTING))
            }
            None => None,
        };

        Ok(GeneratedFiles {
            proxy_config: workdir.join(files::PROXY_CONFIG),
            agent_config,
            routing_file,
        })
    }
}
