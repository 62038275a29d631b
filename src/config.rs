//! Configuration loading via `ortho-config`.
//!
//! [`Settings`] mirrors the raw, layered inputs (defaults, `edgeboot.toml`,
//! environment variables). It is converted exactly once into the immutable
//! [`DeploymentConfig`] which every other component receives by reference.

use std::ffi::OsString;

use camino::{Utf8Path, Utf8PathBuf};
use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

/// UUID shared by every proxy listener when none is configured.
pub const DEFAULT_UUID: &str = "9afd1229-b893-40c1-84dd-51e7ce204913";
/// Preferred edge address advertised in subscription links.
pub const DEFAULT_EDGE_HOST: &str = "cdns.doon.eu.org";
/// Preferred edge port advertised in subscription links.
pub const DEFAULT_EDGE_PORT: u16 = 443;
/// Local port of the edge listener that the tunnel forwards to.
pub const DEFAULT_TUNNEL_PORT: u16 = 8001;
/// Working directory for binaries, generated files, and logs.
pub const DEFAULT_WORKDIR: &str = "./tmp";
/// Path segment under which the subscription document is served.
pub const DEFAULT_SUB_PATH: &str = "sub";
/// Port of the external HTTP gateway.
pub const DEFAULT_SERVER_PORT: u16 = 3000;
/// Download location template; `{arch}` expands to `arm64` or `amd64`.
pub const DEFAULT_BINARY_SOURCE: &str = "https://{arch}.ssss.nyc.mn";
/// Keep-alive registration endpoint.
pub const DEFAULT_KEEPALIVE_URL: &str = "https://oooo.serv00.net/add-url";
/// Network metadata endpoint used for the ISP fingerprint.
pub const DEFAULT_ISP_LOOKUP_URL: &str = "https://speed.cloudflare.com/meta";

const TLS_PORTS: [u16; 6] = [443, 8443, 2096, 2087, 2083, 2053];

/// Returns `true` when `port` is one of the well-known TLS ports used by
/// monitoring dashboards.
#[must_use]
pub fn is_tls_port(port: u16) -> bool {
    TLS_PORTS.contains(&port)
}

/// Raw deployment settings derived from configuration files and environment
/// variables. Environment names are unprefixed (`UUID`, `ARGO_DOMAIN`, ...).
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(discovery(
    app_name = "edgeboot",
    env_var = "EDGEBOOT_CONFIG_PATH",
    config_file_name = "edgeboot.toml",
    dotfile_name = ".edgeboot.toml",
    project_file_name = "edgeboot.toml"
))]
pub struct Settings {
    /// Credential shared by every proxy listener.
    #[ortho_config(default = DEFAULT_UUID.to_owned())]
    pub uuid: String,
    /// Pre-registered tunnel hostname.
    pub argo_domain: Option<String>,
    /// Tunnel credential: a connector token or a credential JSON document.
    pub argo_auth: Option<String>,
    /// Local port of the edge listener.
    #[ortho_config(default = DEFAULT_TUNNEL_PORT)]
    pub argo_port: u16,
    /// Monitoring dashboard address (`host` or `host:port`).
    pub nezha_server: Option<String>,
    /// Monitoring dashboard port; selects the legacy agent when set.
    pub nezha_port: Option<String>,
    /// Monitoring agent secret.
    pub nezha_key: Option<String>,
    /// Preferred edge address for clients.
    #[ortho_config(default = DEFAULT_EDGE_HOST.to_owned())]
    pub cfip: String,
    /// Preferred edge port for clients.
    #[ortho_config(default = DEFAULT_EDGE_PORT)]
    pub cfport: u16,
    /// Node display name prefix.
    pub name: Option<String>,
    /// Working directory.
    #[ortho_config(default = DEFAULT_WORKDIR.to_owned())]
    pub file_path: String,
    /// Subscription path segment.
    #[ortho_config(default = DEFAULT_SUB_PATH.to_owned())]
    pub sub_path: String,
    /// Aggregator base URL.
    pub upload_url: Option<String>,
    /// Public base URL of this deployment.
    pub project_url: Option<String>,
    /// Whether to register the project URL with the keep-alive service.
    #[ortho_config(default = false)]
    pub auto_access: bool,
    /// Gateway port; takes precedence over `port`.
    pub server_port: Option<u16>,
    /// Fallback gateway port used by most hosting platforms.
    pub port: Option<u16>,
    /// Binary download URL template.
    #[ortho_config(default = DEFAULT_BINARY_SOURCE.to_owned())]
    pub binary_source: String,
    /// Keep-alive registration endpoint.
    #[ortho_config(default = DEFAULT_KEEPALIVE_URL.to_owned())]
    pub keepalive_url: String,
    /// Network metadata endpoint.
    #[ortho_config(default = DEFAULT_ISP_LOOKUP_URL.to_owned())]
    pub isp_lookup_url: String,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
}

impl FieldMetadata {
    const fn new(description: &'static str, env_var: &'static str, toml_key: &'static str) -> Self {
        Self {
            description,
            env_var,
            toml_key,
        }
    }

    fn missing(&self) -> ConfigError {
        ConfigError::MissingField(format!(
            "missing {}: set {} or add {} to edgeboot.toml",
            self.description, self.env_var, self.toml_key
        ))
    }

    fn invalid(&self, detail: impl std::fmt::Display) -> ConfigError {
        ConfigError::Invalid(format!(
            "invalid {} ({detail}): check {} or {} in edgeboot.toml",
            self.description, self.env_var, self.toml_key
        ))
    }
}

const UUID_FIELD: FieldMetadata = FieldMetadata::new("proxy UUID", "UUID", "uuid");
const EDGE_HOST_FIELD: FieldMetadata = FieldMetadata::new("preferred edge address", "CFIP", "cfip");
const SUB_PATH_FIELD: FieldMetadata = FieldMetadata::new("subscription path", "SUB_PATH", "sub_path");
const WORKDIR_FIELD: FieldMetadata = FieldMetadata::new("working directory", "FILE_PATH", "file_path");
const MONITOR_PORT_FIELD: FieldMetadata =
    FieldMetadata::new("monitoring port", "NEZHA_PORT", "nezha_port");
const BINARY_SOURCE_FIELD: FieldMetadata =
    FieldMetadata::new("binary source", "BINARY_SOURCE", "binary_source");

impl Settings {
    /// Loads settings without attempting to parse CLI arguments. Values merge
    /// defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([OsString::from("edgeboot")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Validates the settings and freezes them into a [`DeploymentConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a required value is blank or malformed.
    pub fn into_deployment(self) -> Result<DeploymentConfig, ConfigError> {
        let monitor_port = match non_empty(self.nezha_port) {
            Some(raw) => Some(
                raw.trim()
                    .parse::<u16>()
                    .map_err(|err| MONITOR_PORT_FIELD.invalid(err))?,
            ),
            None => None,
        };

        let mut builder = DeploymentConfig::builder()
            .uuid(self.uuid)
            .tunnel_port(self.argo_port)
            .edge(self.cfip, self.cfport)
            .workdir(self.file_path)
            .sub_path(self.sub_path)
            .server_port(self.server_port.or(self.port).unwrap_or(DEFAULT_SERVER_PORT))
            .auto_access(self.auto_access)
            .binary_source(self.binary_source)
            .keepalive_url(self.keepalive_url)
            .isp_lookup_url(self.isp_lookup_url);

        if let Some(domain) = non_empty(self.argo_domain) {
            builder = builder.tunnel_domain(domain);
        }
        if let Some(credential) = non_empty(self.argo_auth) {
            builder = builder.tunnel_credential(credential);
        }
        if let (Some(server), Some(key)) = (non_empty(self.nezha_server), non_empty(self.nezha_key))
        {
            builder = builder.monitor(server, monitor_port, key);
        }
        if let Some(name) = non_empty(self.name) {
            builder = builder.node_name(name);
        }
        if let Some(url) = non_empty(self.upload_url) {
            builder = builder.aggregator(url);
        }
        if let Some(url) = non_empty(self.project_url) {
            builder = builder.project_url(url);
        }

        builder.build()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|raw| !raw.trim().is_empty())
}

/// Tunnel identity and local forwarding port.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TunnelSettings {
    domain: Option<String>,
    credential: Option<String>,
    port: u16,
}

impl TunnelSettings {
    /// Pre-registered hostname, if any.
    #[must_use]
    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    /// Raw tunnel credential, if any.
    #[must_use]
    pub fn credential(&self) -> Option<&str> {
        self.credential.as_deref()
    }

    /// Local port of the edge listener.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Hostname usable without scraping logs. A static tunnel needs both a
    /// domain and a credential.
    #[must_use]
    pub fn static_domain(&self) -> Option<&str> {
        self.credential.as_ref()?;
        self.domain()
    }
}

/// Monitoring agent generation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MonitorVariant {
    /// Legacy agent configured through CLI flags; carries the dashboard port.
    V0 {
        /// Dashboard port.
        port: u16,
    },
    /// Current agent configured through a YAML file.
    V1,
}

/// Monitoring agent endpoint and credentials.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MonitorSettings {
    server: String,
    key: String,
    variant: MonitorVariant,
}

impl MonitorSettings {
    /// Dashboard address as configured.
    #[must_use]
    pub fn server(&self) -> &str {
        &self.server
    }

    /// Agent secret.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Agent generation selected by the presence of a monitoring port.
    #[must_use]
    pub const fn variant(&self) -> MonitorVariant {
        self.variant
    }

    /// Whether the agent should talk TLS to the dashboard. The port is the
    /// explicit monitoring port for v0, or the suffix after the last `:` of
    /// the server address for v1.
    #[must_use]
    pub fn tls_enabled(&self) -> bool {
        match self.variant {
            MonitorVariant::V0 { port } => is_tls_port(port),
            MonitorVariant::V1 => self
                .server
                .rsplit_once(':')
                .and_then(|(_, port)| port.parse::<u16>().ok())
                .is_some_and(is_tls_port),
        }
    }
}

/// Preferred edge address advertised to clients.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EdgeAddress {
    host: String,
    port: u16,
}

impl EdgeAddress {
    /// Edge host or IP.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Edge port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }
}

/// Remote registration targets.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct UploadTarget {
    aggregator: Option<String>,
    project_url: Option<String>,
    auto_access: bool,
    keepalive_url: String,
}

impl UploadTarget {
    /// Aggregator base URL without a trailing slash.
    #[must_use]
    pub fn aggregator(&self) -> Option<&str> {
        self.aggregator.as_deref()
    }

    /// Public base URL of the deployment without a trailing slash.
    #[must_use]
    pub fn project_url(&self) -> Option<&str> {
        self.project_url.as_deref()
    }

    /// Whether keep-alive registration is requested.
    #[must_use]
    pub const fn auto_access(&self) -> bool {
        self.auto_access
    }

    /// Keep-alive endpoint.
    #[must_use]
    pub fn keepalive_url(&self) -> &str {
        &self.keepalive_url
    }
}

/// Immutable snapshot of every tunable parameter.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DeploymentConfig {
    uuid: String,
    tunnel: TunnelSettings,
    monitor: Option<MonitorSettings>,
    edge: EdgeAddress,
    node_name: Option<String>,
    workdir: Utf8PathBuf,
    sub_path: String,
    server_port: u16,
    upload: UploadTarget,
    binary_source: String,
    isp_lookup_url: String,
}

impl DeploymentConfig {
    /// Starts a builder populated with defaults.
    #[must_use]
    pub fn builder() -> DeploymentConfigBuilder {
        DeploymentConfigBuilder::new()
    }

    /// Loads and validates configuration from files and the environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load() -> Result<Self, ConfigError> {
        Settings::load_without_cli_args()?.into_deployment()
    }

    /// Shared listener credential.
    #[must_use]
    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    /// Tunnel settings.
    #[must_use]
    pub const fn tunnel(&self) -> &TunnelSettings {
        &self.tunnel
    }

    /// Monitoring agent settings; `None` when the agent is disabled.
    #[must_use]
    pub const fn monitor(&self) -> Option<&MonitorSettings> {
        self.monitor.as_ref()
    }

    /// Preferred edge address.
    #[must_use]
    pub const fn edge(&self) -> &EdgeAddress {
        &self.edge
    }

    /// Node display name prefix.
    #[must_use]
    pub fn node_name(&self) -> Option<&str> {
        self.node_name.as_deref()
    }

    /// Working directory.
    #[must_use]
    pub fn workdir(&self) -> &Utf8Path {
        &self.workdir
    }

    /// Subscription path segment.
    #[must_use]
    pub fn sub_path(&self) -> &str {
        &self.sub_path
    }

    /// Gateway port.
    #[must_use]
    pub const fn server_port(&self) -> u16 {
        self.server_port
    }

    /// Registration targets.
    #[must_use]
    pub const fn upload(&self) -> &UploadTarget {
        &self.upload
    }

    /// Binary download URL template.
    #[must_use]
    pub fn binary_source(&self) -> &str {
        &self.binary_source
    }

    /// Network metadata endpoint.
    #[must_use]
    pub fn isp_lookup_url(&self) -> &str {
        &self.isp_lookup_url
    }
}

/// Builder for [`DeploymentConfig`].
#[derive(Clone, Debug)]
pub struct DeploymentConfigBuilder {
    uuid: String,
    tunnel_domain: Option<String>,
    tunnel_credential: Option<String>,
    tunnel_port: u16,
    monitor: Option<(String, Option<u16>, String)>,
    edge_host: String,
    edge_port: u16,
    node_name: Option<String>,
    workdir: String,
    sub_path: String,
    server_port: u16,
    aggregator: Option<String>,
    project_url: Option<String>,
    auto_access: bool,
    binary_source: String,
    keepalive_url: String,
    isp_lookup_url: String,
}

impl Default for DeploymentConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DeploymentConfigBuilder {
    /// Creates a builder populated with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            uuid: DEFAULT_UUID.to_owned(),
            tunnel_domain: None,
            tunnel_credential: None,
            tunnel_port: DEFAULT_TUNNEL_PORT,
            monitor: None,
            edge_host: DEFAULT_EDGE_HOST.to_owned(),
            edge_port: DEFAULT_EDGE_PORT,
            node_name: None,
            workdir: DEFAULT_WORKDIR.to_owned(),
            sub_path: DEFAULT_SUB_PATH.to_owned(),
            server_port: DEFAULT_SERVER_PORT,
            aggregator: None,
            project_url: None,
            auto_access: false,
            binary_source: DEFAULT_BINARY_SOURCE.to_owned(),
            keepalive_url: DEFAULT_KEEPALIVE_URL.to_owned(),
            isp_lookup_url: DEFAULT_ISP_LOOKUP_URL.to_owned(),
        }
    }

    /// Sets the listener UUID.
    #[must_use]
    pub fn uuid(mut self, value: impl Into<String>) -> Self {
        self.uuid = value.into();
        self
    }

    /// Sets the pre-registered tunnel hostname.
    #[must_use]
    pub fn tunnel_domain(mut self, value: impl Into<String>) -> Self {
        self.tunnel_domain = Some(value.into());
        self
    }

    /// Sets the tunnel credential.
    #[must_use]
    pub fn tunnel_credential(mut self, value: impl Into<String>) -> Self {
        self.tunnel_credential = Some(value.into());
        self
    }

    /// Sets the edge listener port.
    #[must_use]
    pub const fn tunnel_port(mut self, value: u16) -> Self {
        self.tunnel_port = value;
        self
    }

    /// Enables the monitoring agent. A `port` selects the legacy agent.
    #[must_use]
    pub fn monitor(
        mut self,
        server: impl Into<String>,
        port: Option<u16>,
        key: impl Into<String>,
    ) -> Self {
        self.monitor = Some((server.into(), port, key.into()));
        self
    }

    /// Sets the preferred edge address.
    #[must_use]
    pub fn edge(mut self, host: impl Into<String>, port: u16) -> Self {
        self.edge_host = host.into();
        self.edge_port = port;
        self
    }

    /// Sets the node display name prefix.
    #[must_use]
    pub fn node_name(mut self, value: impl Into<String>) -> Self {
        self.node_name = Some(value.into());
        self
    }

    /// Sets the working directory.
    #[must_use]
    pub fn workdir(mut self, value: impl Into<String>) -> Self {
        self.workdir = value.into();
        self
    }

    /// Sets the subscription path segment.
    #[must_use]
    pub fn sub_path(mut self, value: impl Into<String>) -> Self {
        self.sub_path = value.into();
        self
    }

    /// Sets the gateway port.
    #[must_use]
    pub const fn server_port(mut self, value: u16) -> Self {
        self.server_port = value;
        self
    }

    /// Sets the aggregator base URL.
    #[must_use]
    pub fn aggregator(mut self, value: impl Into<String>) -> Self {
        self.aggregator = Some(value.into());
        self
    }

    /// Sets the public project URL.
    #[must_use]
    pub fn project_url(mut self, value: impl Into<String>) -> Self {
        self.project_url = Some(value.into());
        self
    }

    /// Toggles keep-alive registration.
    #[must_use]
    pub const fn auto_access(mut self, value: bool) -> Self {
        self.auto_access = value;
        self
    }

    /// Sets the binary download URL template.
    #[must_use]
    pub fn binary_source(mut self, value: impl Into<String>) -> Self {
        self.binary_source = value.into();
        self
    }

    /// Sets the keep-alive endpoint.
    #[must_use]
    pub fn keepalive_url(mut self, value: impl Into<String>) -> Self {
        self.keepalive_url = value.into();
        self
    }

    /// Sets the network metadata endpoint.
    #[must_use]
    pub fn isp_lookup_url(mut self, value: impl Into<String>) -> Self {
        self.isp_lookup_url = value.into();
        self
    }

    /// Validates the collected values and builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the UUID is malformed or a required value
    /// is blank.
    pub fn build(self) -> Result<DeploymentConfig, ConfigError> {
        let uuid = self.uuid.trim().to_owned();
        if uuid.is_empty() {
            return Err(UUID_FIELD.missing());
        }
        Uuid::parse_str(&uuid).map_err(|err| UUID_FIELD.invalid(err))?;
        if self.edge_host.trim().is_empty() {
            return Err(EDGE_HOST_FIELD.missing());
        }
        if self.workdir.trim().is_empty() {
            return Err(WORKDIR_FIELD.missing());
        }
        let sub_path = self.sub_path.trim().trim_matches('/').to_owned();
        if sub_path.is_empty() {
            return Err(SUB_PATH_FIELD.missing());
        }
        if self.binary_source.trim().is_empty() {
            return Err(BINARY_SOURCE_FIELD.missing());
        }

        let monitor = self.monitor.map(|(server, port, key)| MonitorSettings {
            server,
            key,
            variant: port.map_or(MonitorVariant::V1, |value| MonitorVariant::V0 { port: value }),
        });

        Ok(DeploymentConfig {
            uuid,
            tunnel: TunnelSettings {
                domain: self.tunnel_domain,
                credential: self.tunnel_credential,
                port: self.tunnel_port,
            },
            monitor,
            edge: EdgeAddress {
                host: self.edge_host,
                port: self.edge_port,
            },
            node_name: self.node_name,
            workdir: Utf8PathBuf::from(self.workdir),
            sub_path,
            server_port: self.server_port,
            upload: UploadTarget {
                aggregator: self.aggregator.map(trim_trailing_slash),
                project_url: self.project_url.map(trim_trailing_slash),
                auto_access: self.auto_access,
                keepalive_url: self.keepalive_url,
            },
            binary_source: self.binary_source,
            isp_lookup_url: self.isp_lookup_url,
        })
    }
}

fn trim_trailing_slash(value: String) -> String {
    value.trim_end_matches('/').to_owned()
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Indicates a configuration field holds a malformed value.
    #[error("invalid configuration field: {0}")]
    Invalid(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(443, true)]
    #[case(8443, true)]
    #[case(2096, true)]
    #[case(2087, true)]
    #[case(2083, true)]
    #[case(2053, true)]
    #[case(80, false)]
    #[case(5555, false)]
    #[case(4430, false)]
    fn tls_port_classification_is_exact(#[case] port: u16, #[case] expected: bool) {
        assert_eq!(is_tls_port(port), expected);
    }

    #[rstest]
    #[case(Some(443), "dash.example.com", MonitorVariant::V0 { port: 443 }, true)]
    #[case(Some(5555), "dash.example.com", MonitorVariant::V0 { port: 5555 }, false)]
    #[case(None, "dash.example.com:8443", MonitorVariant::V1, true)]
    #[case(None, "dash.example.com:8008", MonitorVariant::V1, false)]
    #[case(None, "dash.example.com", MonitorVariant::V1, false)]
    fn monitor_variant_and_tls_follow_port(
        #[case] port: Option<u16>,
        #[case] server: &str,
        #[case] variant: MonitorVariant,
        #[case] tls: bool,
    ) {
        let config = DeploymentConfig::builder()
            .monitor(server, port, "secret")
            .build()
            .unwrap_or_else(|err| panic!("build config: {err}"));
        let monitor = config
            .monitor()
            .unwrap_or_else(|| panic!("monitor should be enabled"));

        assert_eq!(monitor.variant(), variant);
        assert_eq!(monitor.tls_enabled(), tls);
    }

    #[test]
    fn static_domain_requires_credential() {
        let without = DeploymentConfig::builder()
            .tunnel_domain("edge.example.com")
            .build()
            .unwrap_or_else(|err| panic!("build config: {err}"));
        let with = DeploymentConfig::builder()
            .tunnel_domain("edge.example.com")
            .tunnel_credential("token")
            .build()
            .unwrap_or_else(|err| panic!("build config: {err}"));

        assert_eq!(without.tunnel().static_domain(), None);
        assert_eq!(with.tunnel().static_domain(), Some("edge.example.com"));
    }

    #[test]
    fn build_rejects_malformed_uuid() {
        let err = DeploymentConfig::builder()
            .uuid("not-a-uuid")
            .build()
            .expect_err("malformed uuid should fail");

        assert!(
            matches!(err, ConfigError::Invalid(ref message) if message.contains("UUID")),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn build_normalises_paths_and_urls() {
        let config = DeploymentConfig::builder()
            .sub_path("/feed/")
            .aggregator("https://agg.example.com/")
            .project_url("https://app.example.com/")
            .build()
            .unwrap_or_else(|err| panic!("build config: {err}"));

        assert_eq!(config.sub_path(), "feed");
        assert_eq!(config.upload().aggregator(), Some("https://agg.example.com"));
        assert_eq!(config.upload().project_url(), Some("https://app.example.com"));
    }

    fn settings() -> Settings {
        Settings {
            uuid: DEFAULT_UUID.to_owned(),
            argo_domain: Some(String::new()),
            argo_auth: None,
            argo_port: DEFAULT_TUNNEL_PORT,
            nezha_server: Some("dash.example.com".to_owned()),
            nezha_port: Some(" ".to_owned()),
            nezha_key: Some("secret".to_owned()),
            cfip: DEFAULT_EDGE_HOST.to_owned(),
            cfport: DEFAULT_EDGE_PORT,
            name: Some(String::new()),
            file_path: DEFAULT_WORKDIR.to_owned(),
            sub_path: DEFAULT_SUB_PATH.to_owned(),
            upload_url: None,
            project_url: None,
            auto_access: false,
            server_port: None,
            port: Some(8080),
            binary_source: DEFAULT_BINARY_SOURCE.to_owned(),
            keepalive_url: DEFAULT_KEEPALIVE_URL.to_owned(),
            isp_lookup_url: DEFAULT_ISP_LOOKUP_URL.to_owned(),
        }
    }

    #[test]
    fn settings_treat_blank_values_as_absent() {
        let config = settings()
            .into_deployment()
            .unwrap_or_else(|err| panic!("convert settings: {err}"));

        assert_eq!(config.tunnel().domain(), None);
        assert_eq!(config.node_name(), None);
        assert_eq!(config.server_port(), 8080);
        assert_eq!(
            config.monitor().map(MonitorSettings::variant),
            Some(MonitorVariant::V1)
        );
    }

    #[test]
    fn settings_reject_non_numeric_monitor_port() {
        let mut raw = settings();
        raw.nezha_port = Some("abc".to_owned());

        let err = raw.into_deployment().expect_err("port should be rejected");

        assert!(
            matches!(err, ConfigError::Invalid(ref message) if message.contains("NEZHA_PORT")),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn monitor_requires_server_and_key() {
        let mut raw = settings();
        raw.nezha_key = None;

        let config = raw
            .into_deployment()
            .unwrap_or_else(|err| panic!("convert settings: {err}"));

        assert!(config.monitor().is_none());
    }
}
