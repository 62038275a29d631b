//! End-to-end startup sequence.
//!
//! [`DeployOrchestrator::execute`] runs the stages in a fixed order:
//! working-directory preparation, binary provisioning, configuration
//! rendering, process launch, hostname discovery, subscription rendering,
//! and best-effort publication. Critical stages abort with a
//! [`StartupError`]; publication steps only log.

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::arch::Architecture;
use crate::config::DeploymentConfig;
use crate::provision::{BinaryProvisioner, BinaryRole, BinarySet, ProvisionError};
use crate::render::{ConfigGenerator, RenderError};
use crate::resolver::{ResolveError, ResolverPolicy, ResolverState, TunnelDomainResolver};
use crate::subscription::{
    IspLookup, SubscriptionBuilder, SubscriptionError, SubscriptionRecord,
};
use crate::supervisor::{
    LaunchError, LaunchPlan, LaunchTimings, ProcessSpawner, ProcessSupervisor,
};
use crate::tunnel::TunnelDescriptor;
use crate::upload::{UploadClient, UploadOutcome};
use crate::workdir::{WorkDir, WorkDirError, files};

/// Config file name kept when stale files are purged.
const LOCAL_CONFIG_FILE: &str = "edgeboot.toml";

/// Errors that abort the startup sequence.
#[derive(Debug, Error)]
pub enum StartupError {
    /// The working directory could not be prepared.
    #[error("failed to prepare working directory: {0}")]
    Workdir(#[from] WorkDirError),
    /// A binary download failed.
    #[error("failed to provision binaries: {0}")]
    Provision(#[from] ProvisionError),
    /// A configuration document could not be written.
    #[error("failed to render configuration: {0}")]
    Render(#[from] RenderError),
    /// The proxy engine or tunnel client failed to start.
    #[error("failed to launch stack: {0}")]
    Launch(LaunchError),
    /// The tunnel hostname could not be discovered.
    #[error("failed to resolve tunnel hostname: {0}")]
    Resolve(ResolveError),
    /// The subscription could not be rendered or saved.
    #[error("failed to build subscription: {0}")]
    Subscription(#[from] SubscriptionError),
    /// Shutdown was requested before startup finished.
    #[error("startup cancelled")]
    Cancelled,
}

impl From<LaunchError> for StartupError {
    fn from(err: LaunchError) -> Self {
        match err {
            LaunchError::Cancelled { .. } => Self::Cancelled,
            other => Self::Launch(other),
        }
    }
}

impl From<ResolveError> for StartupError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::Cancelled => Self::Cancelled,
            other => Self::Resolve(other),
        }
    }
}

/// Outcome of a successful startup.
#[derive(Clone, Debug)]
pub struct StartupReport {
    /// Resolved public hostname.
    pub tunnel: TunnelDescriptor,
    /// Rendered subscription.
    pub subscription: SubscriptionRecord,
    /// Files removed from the previous run.
    pub purged: Vec<String>,
    /// Roles left running.
    pub running: Vec<BinaryRole>,
    /// Resolver state history.
    pub resolution: Vec<ResolverState>,
    /// Stale node deletion result.
    pub stale_nodes: UploadOutcome,
    /// Aggregator registration result.
    pub publish: UploadOutcome,
    /// Keep-alive registration result.
    pub keepalive: UploadOutcome,
}

/// Drives one deployment from an empty directory to a published
/// subscription.
pub struct DeployOrchestrator<S: ProcessSpawner> {
    config: DeploymentConfig,
    provisioner: BinaryProvisioner,
    supervisor: ProcessSupervisor<S>,
    architecture: Architecture,
    timings: LaunchTimings,
    policy: ResolverPolicy,
    cancel: CancellationToken,
}

impl<S: ProcessSpawner> DeployOrchestrator<S> {
    /// Creates an orchestrator for the host architecture.
    #[must_use]
    pub fn new(config: DeploymentConfig, provisioner: BinaryProvisioner, spawner: S) -> Self {
        Self {
            config,
            provisioner,
            supervisor: ProcessSupervisor::new(spawner),
            architecture: Architecture::detect(),
            timings: LaunchTimings::default(),
            policy: ResolverPolicy::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Overrides the detected architecture.
    #[must_use]
    pub const fn with_architecture(mut self, architecture: Architecture) -> Self {
        self.architecture = architecture;
        self
    }

    /// Overrides the settle intervals used at launch.
    #[must_use]
    pub const fn with_timings(mut self, timings: LaunchTimings) -> Self {
        self.timings = timings;
        self
    }

    /// Overrides the hostname discovery policy.
    #[must_use]
    pub const fn with_policy(mut self, policy: ResolverPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Replaces the supervisor, e.g. to shorten readiness probes.
    #[must_use]
    pub fn with_supervisor(mut self, supervisor: ProcessSupervisor<S>) -> Self {
        self.supervisor = supervisor;
        self
    }

    /// Shares `cancel` with the caller so a shutdown signal aborts startup.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Configuration in use.
    #[must_use]
    pub const fn config(&self) -> &DeploymentConfig {
        &self.config
    }

    /// Supervisor holding the launched children.
    #[must_use]
    pub const fn supervisor(&self) -> &ProcessSupervisor<S> {
        &self.supervisor
    }

    /// Runs the startup sequence. Children launched before a failure or a
    /// cancellation stay tracked and keep running; call [`Self::shutdown`]
    /// to stop them.
    ///
    /// # Errors
    ///
    /// Returns [`StartupError`] when a critical stage fails or the
    /// cancellation token fires.
    pub async fn execute(&mut self) -> Result<StartupReport, StartupError> {
        let cancel = self.cancel.clone();
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(StartupError::Cancelled),
            outcome = self.run(&cancel) => outcome,
        };
        if let Err(err) = &result {
            error!(error = %err, "startup aborted");
        }
        result
    }

    /// Returns `true` when the process should keep serving after `err`:
    /// startup was not cancelled and at least one child is still running,
    /// e.g. a healthy proxy engine whose tunnel hostname was never found.
    #[must_use]
    pub fn keeps_serving_after(&self, err: &StartupError) -> bool {
        !matches!(err, StartupError::Cancelled) && !self.supervisor.running_roles().is_empty()
    }

    /// Stops every supervised child. Returns how many stopped cleanly.
    pub fn shutdown(&mut self) -> usize {
        let stopped = self.supervisor.terminate_all();
        info!(stopped, "supervised processes stopped");
        stopped
    }

    async fn run(&mut self, cancel: &CancellationToken) -> Result<StartupReport, StartupError> {
        info!(
            arch = %self.architecture,
            workdir = %self.config.workdir(),
            "starting deployment"
        );
        let workdir = WorkDir::open(self.config.workdir())?;
        let uploader = UploadClient::new(self.config.upload().clone());

        let previous = match workdir.read_to_string(files::SUBSCRIPTION) {
            Ok(document) => document,
            Err(err) => {
                warn!(error = %err, "previous subscription unreadable");
                None
            }
        };
        let stale_nodes = match previous {
            Some(document) => uploader.delete_stale_nodes(&document).await,
            None => UploadOutcome::Skipped,
        };
        let purged = workdir.purge_stale(&[files::ENV_FILE, LOCAL_CONFIG_FILE])?;
        if !purged.is_empty() {
            info!(count = purged.len(), "stale files removed");
        }

        let binaries = BinarySet::plan(&self.config, self.architecture);
        self.provisioner.provision(&binaries).await?;

        let generated = ConfigGenerator::new(&self.config).generate(&workdir)?;
        info!(
            agent = generated.agent_config.is_some(),
            routing = generated.routing_file.is_some(),
            "configuration rendered"
        );

        let plan = LaunchPlan::new(&self.config, &binaries, self.timings);
        self.supervisor.launch_stack(&plan, cancel).await?;

        let mut resolver = TunnelDomainResolver::new(
            self.config.tunnel().static_domain(),
            plan.ephemeral_tunnel(),
            self.policy,
        );
        let tunnel = resolver
            .resolve(&mut self.supervisor, &workdir, cancel)
            .await?;

        let fingerprint = IspLookup::new(self.config.isp_lookup_url())
            .fingerprint()
            .await;
        let subscription = SubscriptionBuilder::new(&self.config).build(&tunnel, &fingerprint)?;
        subscription.persist(&workdir)?;
        info!(hostname = %tunnel, path = %workdir.join(files::SUBSCRIPTION), "subscription saved");

        let publish = uploader.publish(&workdir, self.config.sub_path()).await;
        let keepalive = uploader.register_keepalive().await;

        Ok(StartupReport {
            tunnel,
            subscription,
            purged,
            running: self.supervisor.running_roles(),
            resolution: resolver.history().to_vec(),
            stale_nodes,
            publish,
            keepalive,
        })
    }
}
