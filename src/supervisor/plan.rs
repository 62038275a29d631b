//! Launch plan derived from the configuration and the provisioned binaries.

use std::time::Duration;

use camino::Utf8PathBuf;

use super::{LaunchSpec, Readiness};
use crate::config::{DeploymentConfig, MonitorVariant};
use crate::provision::{BinaryRole, BinarySet};
use crate::tunnel::TunnelMode;
use crate::workdir::files;

const AGENT_REPORT_DELAY: &str = "4";

/// Settle intervals for children without a probeable port.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LaunchTimings {
    /// Delay after starting the monitoring agent.
    pub agent_settle: Duration,
    /// Delay after starting the tunnel client.
    pub tunnel_settle: Duration,
}

impl Default for LaunchTimings {
    fn default() -> Self {
        Self {
            agent_settle: Duration::from_secs(1),
            tunnel_settle: Duration::from_secs(2),
        }
    }
}

/// Ordered launch specs: monitoring agent, proxy engine, tunnel client.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LaunchPlan {
    specs: Vec<LaunchSpec>,
    workdir: Utf8PathBuf,
    tunnel_port: u16,
    tunnel_settle: Duration,
}

impl LaunchPlan {
    /// Builds the plan for every binary present in `binaries`. Config and log
    /// paths live in the configured working directory, next to the binaries.
    #[must_use]
    pub fn new(config: &DeploymentConfig, binaries: &BinarySet, timings: LaunchTimings) -> Self {
        let workdir = config.workdir();
        let mut specs = Vec::with_capacity(binaries.len());

        if let Some(monitor) = config.monitor() {
            let (role, args) = match monitor.variant() {
                MonitorVariant::V0 { port } => {
                    let mut args = vec![
                        String::from("-s"),
                        format!("{}:{port}", monitor.server()),
                        String::from("-p"),
                        monitor.key().to_owned(),
                    ];
                    if monitor.tls_enabled() {
                        args.push(String::from("--tls"));
                    }
                    args.extend(
                        [
                            "--disable-auto-update",
                            "--report-delay",
                            AGENT_REPORT_DELAY,
                            "--skip-conn",
                            "--skip-procs",
                        ]
                        .into_iter()
                        .map(String::from),
                    );
                    (BinaryRole::MonitorAgentV0, args)
                }
                MonitorVariant::V1 => (
                    BinaryRole::MonitorAgentV1,
                    vec![
                        String::from("-c"),
                        workdir.join(files::AGENT_CONFIG).to_string(),
                    ],
                ),
            };
            if let Some(binary) = binaries.get(role) {
                specs.push(LaunchSpec {
                    role,
                    program: binary.path().to_path_buf(),
                    args,
                    readiness: Readiness::Settle(timings.agent_settle),
                });
            }
        }

        if let Some(binary) = binaries.get(BinaryRole::ProxyEngine) {
            specs.push(LaunchSpec {
                role: BinaryRole::ProxyEngine,
                program: binary.path().to_path_buf(),
                args: vec![
                    String::from("-c"),
                    workdir.join(files::PROXY_CONFIG).to_string(),
                ],
                readiness: Readiness::TcpPort(config.tunnel().port()),
            });
        }

        if let Some(binary) = binaries.get(BinaryRole::TunnelClient) {
            let mode = TunnelMode::classify(config.tunnel());
            specs.push(LaunchSpec {
                role: BinaryRole::TunnelClient,
                program: binary.path().to_path_buf(),
                args: mode.client_args(workdir, config.tunnel().port()),
                readiness: Readiness::Settle(timings.tunnel_settle),
            });
        }

        Self {
            specs,
            workdir: workdir.to_path_buf(),
            tunnel_port: config.tunnel().port(),
            tunnel_settle: timings.tunnel_settle,
        }
    }

    /// Specs in launch order.
    #[must_use]
    pub fn specs(&self) -> &[LaunchSpec] {
        &self.specs
    }

    /// Spec for `role`, if planned.
    #[must_use]
    pub fn spec(&self, role: BinaryRole) -> Option<&LaunchSpec> {
        self.specs.iter().find(|spec| spec.role == role)
    }

    /// Tunnel client spec forced into ephemeral mode, used when relaunching
    /// during hostname discovery. `None` when no tunnel client is planned.
    #[must_use]
    pub fn ephemeral_tunnel(&self) -> Option<LaunchSpec> {
        self.spec(BinaryRole::TunnelClient).map(|spec| LaunchSpec {
            role: BinaryRole::TunnelClient,
            program: spec.program.clone(),
            args: TunnelMode::Ephemeral.client_args(&self.workdir, self.tunnel_port),
            readiness: Readiness::Settle(self.tunnel_settle),
        })
    }
}
