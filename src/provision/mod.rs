//! Binary selection and concurrent download.
//!
//! [`BinarySet::plan`] is a pure function of the deployment configuration and
//! host architecture. [`BinaryProvisioner`] fetches the whole set
//! concurrently and only succeeds when every download succeeds.

use std::fmt;
use std::os::unix::fs::PermissionsExt;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use futures::future::try_join_all;
use thiserror::Error;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::arch::Architecture;
use crate::config::{DeploymentConfig, MonitorVariant};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);
const EXECUTABLE_MODE: u32 = 0o755;

/// Role a provisioned binary plays in the stack.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum BinaryRole {
    /// Legacy monitoring agent configured through flags.
    MonitorAgentV0,
    /// Monitoring agent configured through `config.yaml`.
    MonitorAgentV1,
    /// Multi-protocol proxy engine.
    ProxyEngine,
    /// Reverse tunnel client.
    TunnelClient,
}

impl BinaryRole {
    /// Path segment of the binary on the download host.
    #[must_use]
    pub const fn remote_name(self) -> &'static str {
        match self {
            Self::MonitorAgentV0 => "agent",
            Self::MonitorAgentV1 => "v1",
            Self::ProxyEngine => "web",
            Self::TunnelClient => "bot",
        }
    }

    /// File name inside the working directory.
    #[must_use]
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::MonitorAgentV0 => "npm",
            Self::MonitorAgentV1 => "php",
            Self::ProxyEngine => "web",
            Self::TunnelClient => "bot",
        }
    }

    /// Human-readable label used in logs and errors.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::MonitorAgentV0 => "monitoring-agent-v0",
            Self::MonitorAgentV1 => "monitoring-agent-v1",
            Self::ProxyEngine => "proxy-engine",
            Self::TunnelClient => "tunnel-client",
        }
    }

    /// Returns `true` for either monitoring agent generation.
    #[must_use]
    pub const fn is_monitor(self) -> bool {
        matches!(self, Self::MonitorAgentV0 | Self::MonitorAgentV1)
    }

    /// Every role, in launch order.
    pub const ALL: [Self; 4] = [
        Self::MonitorAgentV0,
        Self::MonitorAgentV1,
        Self::ProxyEngine,
        Self::TunnelClient,
    ];
}

impl fmt::Display for BinaryRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One binary to download.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BinarySpec {
    role: BinaryRole,
    path: Utf8PathBuf,
    url: String,
}

impl BinarySpec {
    /// Role of the binary.
    #[must_use]
    pub const fn role(&self) -> BinaryRole {
        self.role
    }

    /// Local target path.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Source URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Ordered set of binaries required by a deployment.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct BinarySet {
    binaries: Vec<BinarySpec>,
}

impl BinarySet {
    /// Selects binaries for `config` on `arch`: the monitoring agent first
    /// (when enabled), then the proxy engine and the tunnel client.
    #[must_use]
    pub fn plan(config: &DeploymentConfig, arch: Architecture) -> Self {
        let expanded = config
            .binary_source()
            .replace("{arch}", arch.download_tag());
        let base = expanded.trim_end_matches('/');

        let monitor = config.monitor().map(|monitor| match monitor.variant() {
            MonitorVariant::V0 { .. } => BinaryRole::MonitorAgentV0,
            MonitorVariant::V1 => BinaryRole::MonitorAgentV1,
        });

        let binaries = monitor
            .into_iter()
            .chain([BinaryRole::ProxyEngine, BinaryRole::TunnelClient])
            .map(|role| BinarySpec {
                role,
                path: config.workdir().join(role.file_name()),
                url: format!("{base}/{}", role.remote_name()),
            })
            .collect();

        Self { binaries }
    }

    /// Iterates over the planned binaries in order.
    pub fn iter(&self) -> impl Iterator<Item = &BinarySpec> {
        self.binaries.iter()
    }

    /// Looks up the binary for `role`.
    #[must_use]
    pub fn get(&self, role: BinaryRole) -> Option<&BinarySpec> {
        self.binaries.iter().find(|spec| spec.role == role)
    }

    /// Planned source URLs in order.
    #[must_use]
    pub fn urls(&self) -> Vec<&str> {
        self.binaries.iter().map(BinarySpec::url).collect()
    }

    /// Number of planned binaries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.binaries.len()
    }

    /// Returns `true` when nothing is planned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.binaries.is_empty()
    }
}

/// Errors raised while provisioning binaries.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ProvisionError {
    /// The HTTP client could not be constructed.
    #[error("failed to build download client: {0}")]
    Client(String),
    /// The request failed before a response arrived or mid-stream.
    #[error("download of {role} from {url} failed: {message}")]
    Download {
        /// Role of the binary.
        role: BinaryRole,
        /// Source URL.
        url: String,
        /// Underlying error message.
        message: String,
    },
    /// The server responded with a non-success status.
    #[error("download of {role} from {url} returned HTTP {status}")]
    Status {
        /// Role of the binary.
        role: BinaryRole,
        /// Source URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },
    /// Writing the file or setting its permissions failed.
    #[error("failed to write {role} to {path}: {message}")]
    Io {
        /// Role of the binary.
        role: BinaryRole,
        /// Target path.
        path: Utf8PathBuf,
        /// Underlying error message.
        message: String,
    },
}

impl ProvisionError {
    /// Role of the binary that failed, when known.
    #[must_use]
    pub const fn role(&self) -> Option<BinaryRole> {
        match self {
            Self::Client(_) => None,
            Self::Download { role, .. } | Self::Status { role, .. } | Self::Io { role, .. } => {
                Some(*role)
            }
        }
    }
}

/// Downloads a [`BinarySet`] into the working directory.
#[derive(Clone, Debug)]
pub struct BinaryProvisioner {
    client: reqwest::Client,
}

impl BinaryProvisioner {
    /// Creates a provisioner with bounded connect and transfer timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Client`] when the HTTP client cannot be built.
    pub fn new() -> Result<Self, ProvisionError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(DOWNLOAD_TIMEOUT)
            .build()
            .map_err(|err| ProvisionError::Client(err.to_string()))?;
        Ok(Self { client })
    }

    /// Downloads every binary concurrently and marks each executable.
    ///
    /// On failure, files written by this call are removed so no partial set
    /// is left behind for a later launch.
    ///
    /// # Errors
    ///
    /// Returns the first [`ProvisionError`] observed, tagged with its role.
    pub async fn provision(&self, set: &BinarySet) -> Result<(), ProvisionError> {
        info!(count = set.len(), "downloading binaries");
        let downloads = set.iter().map(|spec| self.fetch(spec));
        match try_join_all(downloads).await {
            Ok(_) => {
                info!("all binaries provisioned");
                Ok(())
            }
            Err(err) => {
                for spec in set.iter() {
                    discard(spec.path()).await;
                }
                Err(err)
            }
        }
    }

    async fn fetch(&self, spec: &BinarySpec) -> Result<(), ProvisionError> {
        let download_err = |err: reqwest::Error| ProvisionError::Download {
            role: spec.role,
            url: spec.url.clone(),
            message: err.to_string(),
        };
        let io_err = |err: std::io::Error| ProvisionError::Io {
            role: spec.role,
            path: spec.path.clone(),
            message: err.to_string(),
        };

        debug!(role = %spec.role, url = %spec.url, "requesting binary");
        let mut response = self
            .client
            .get(&spec.url)
            .send()
            .await
            .map_err(download_err)?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProvisionError::Status {
                role: spec.role,
                url: spec.url.clone(),
                status: status.as_u16(),
            });
        }

        let mut file = File::create(&spec.path).await.map_err(io_err)?;
        while let Some(chunk) = response.chunk().await.map_err(download_err)? {
            file.write_all(&chunk).await.map_err(io_err)?;
        }
        file.flush().await.map_err(io_err)?;
        drop(file);

        fs::set_permissions(
            &spec.path,
            std::fs::Permissions::from_mode(EXECUTABLE_MODE),
        )
        .await
        .map_err(io_err)?;

        info!(role = %spec.role, path = %spec.path, "binary downloaded");
        Ok(())
    }
}

async fn discard(path: &Utf8Path) {
    match fs::remove_file(path).await {
        Ok(()) => debug!(%path, "removed partial binary"),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => warn!(%path, error = %err, "failed to remove partial binary"),
    }
}

#[cfg(test)]
mod tests;
