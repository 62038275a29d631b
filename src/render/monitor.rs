//! Monitoring agent (v1) configuration file.

use serde::Serialize;

use crate::config::MonitorSettings;

const IP_REPORT_PERIOD_SECS: u32 = 1800;
const REPORT_DELAY_SECS: u32 = 4;

/// Agent configuration. Key names and order are dictated by the agent.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[expect(
    clippy::struct_excessive_bools,
    reason = "the agent configuration schema is a flat list of feature toggles"
)]
pub struct AgentConfig {
    client_secret: String,
    debug: bool,
    disable_auto_update: bool,
    disable_command_execute: bool,
    disable_force_update: bool,
    disable_nat: bool,
    disable_send_query: bool,
    gpu: bool,
    insecure_tls: bool,
    ip_report_period: u32,
    report_delay: u32,
    server: String,
    skip_connection_count: bool,
    skip_procs_count: bool,
    temperature: bool,
    tls: bool,
    use_gitee_to_upgrade: bool,
    use_ipv6_country_code: bool,
    uuid: String,
}

impl AgentConfig {
    /// Builds the agent configuration for `monitor`, identifying the host by
    /// the shared `uuid`.
    #[must_use]
    pub fn new(monitor: &MonitorSettings, uuid: &str) -> Self {
        Self {
            client_secret: monitor.key().to_owned(),
            debug: false,
            disable_auto_update: true,
            disable_command_execute: false,
            disable_force_update: true,
            disable_nat: false,
            disable_send_query: false,
            gpu: false,
            insecure_tls: true,
            ip_report_period: IP_REPORT_PERIOD_SECS,
            report_delay: REPORT_DELAY_SECS,
            server: monitor.server().to_owned(),
            skip_connection_count: true,
            skip_procs_count: true,
            temperature: false,
            tls: monitor.tls_enabled(),
            use_gitee_to_upgrade: false,
            use_ipv6_country_code: false,
            uuid: uuid.to_owned(),
        }
    }

    /// Whether the agent connects over TLS.
    #[must_use]
    pub const fn tls(&self) -> bool {
        self.tls
    }

    /// Serializes the configuration as YAML.
    ///
    /// # Errors
    ///
    /// Returns [`serde_yaml::Error`] if serialization fails.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}
