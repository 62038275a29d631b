//! Core library for the edgeboot deployment orchestrator.
//!
//! The crate downloads a proxy engine, a reverse tunnel client, and an
//! optional monitoring agent, renders their configuration, supervises them
//! as child processes, discovers the tunnel's public hostname, and publishes
//! subscription links (detect → provision → render → launch → resolve →
//! subscribe → upload).

pub mod arch;
pub mod config;
pub mod deploy;
pub mod janitor;
pub mod provision;
pub mod render;
pub mod resolver;
pub mod subscription;
pub mod supervisor;
pub mod test_support;
pub mod tunnel;
pub mod upload;
pub mod workdir;

pub use arch::Architecture;
pub use config::{ConfigError, DeploymentConfig, DeploymentConfigBuilder, Settings};
pub use deploy::{DeployOrchestrator, StartupError, StartupReport};
pub use janitor::{Janitor, JanitorError, SweepSummary};
pub use provision::{BinaryProvisioner, BinaryRole, BinarySet, ProvisionError};
pub use render::{ConfigGenerator, GeneratedFiles, RenderError};
pub use resolver::{ResolveError, ResolverPolicy, ResolverState, TunnelDomainResolver};
pub use subscription::{
    IspFingerprint, IspLookup, SubscriptionBuilder, SubscriptionError, SubscriptionRecord,
};
pub use supervisor::{
    LaunchError, LaunchPlan, LaunchSpec, LaunchTimings, OsSpawner, ProcessSpawner,
    ProcessSupervisor, Readiness,
};
pub use tunnel::{DomainSource, TunnelDescriptor, TunnelMode};
pub use upload::{UploadClient, UploadOutcome};
pub use workdir::{WorkDir, WorkDirError};
