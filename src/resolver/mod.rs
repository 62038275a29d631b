//! Public hostname discovery for the tunnel.
//!
//! A static domain resolves immediately. Otherwise the tunnel client's log is
//! polled for a provider-assigned hostname; when none appears, the client is
//! restarted in ephemeral mode and the log is scanned again. Attempts are
//! bounded and every wait can be cancelled.

use std::sync::LazyLock;
use std::time::{Duration, Instant};

use regex::Regex;
use thiserror::Error;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::provision::BinaryRole;
use crate::supervisor::{LaunchError, LaunchSpec, ProcessSpawner, ProcessSupervisor};
use crate::tunnel::{DomainSource, TunnelDescriptor};
use crate::workdir::{WorkDir, files};

static HOSTNAME_PATTERN: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"https?://([^ ]*trycloudflare\.com)/?"));

/// Resolver state; the full history is kept for diagnostics.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ResolverState {
    /// Nothing attempted yet.
    Init,
    /// A configured domain was accepted without log interaction.
    StaticResolved,
    /// Scanning the log during the given attempt.
    LogScanning {
        /// One-based attempt number.
        attempt: u32,
    },
    /// Restarting the tunnel client after the given attempt failed.
    Retrying {
        /// One-based attempt number that failed.
        attempt: u32,
    },
    /// A hostname was found.
    Resolved,
    /// Every attempt failed.
    Exhausted,
}

/// Timing and retry bounds for log-based discovery.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ResolverPolicy {
    /// Total scan attempts, including the first.
    pub max_attempts: u32,
    /// How long each attempt polls the log.
    pub scan_window: Duration,
    /// Delay between log polls.
    pub scan_interval: Duration,
    /// Delay after stopping the tunnel client.
    pub terminate_cooldown: Duration,
    /// Delay after relaunching the tunnel client.
    pub relaunch_cooldown: Duration,
}

impl Default for ResolverPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            scan_window: Duration::from_secs(10),
            scan_interval: Duration::from_millis(500),
            terminate_cooldown: Duration::from_secs(3),
            relaunch_cooldown: Duration::from_secs(3),
        }
    }
}

/// Errors raised by hostname discovery.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ResolveError {
    /// No hostname appeared within the attempt budget.
    #[error("no tunnel hostname found after {attempts} attempts")]
    Exhausted {
        /// Attempts made.
        attempts: u32,
    },
    /// Shutdown was requested while resolving.
    #[error("tunnel hostname resolution cancelled")]
    Cancelled,
    /// The hostname pattern failed to compile.
    #[error("invalid hostname pattern: {0}")]
    Pattern(String),
}

/// Returns the first provider-assigned hostname mentioned in `log`.
///
/// # Errors
///
/// Returns [`ResolveError::Pattern`] if the pattern cannot be compiled.
pub fn scan_log(log: &str) -> Result<Option<String>, ResolveError> {
    let pattern = HOSTNAME_PATTERN
        .as_ref()
        .map_err(|err| ResolveError::Pattern(err.to_string()))?;
    Ok(log.lines().find_map(|line| {
        pattern
            .captures(line)
            .and_then(|captures| captures.get(1))
            .map(|host| host.as_str().to_owned())
    }))
}

/// Bounded state machine resolving the tunnel's public hostname.
#[derive(Clone, Debug)]
pub struct TunnelDomainResolver {
    static_domain: Option<String>,
    relaunch: Option<LaunchSpec>,
    policy: ResolverPolicy,
    history: Vec<ResolverState>,
}

impl TunnelDomainResolver {
    /// Creates a resolver. `relaunch` is the ephemeral tunnel client spec
    /// used for retries; without it a failed scan is final.
    #[must_use]
    pub fn new(
        static_domain: Option<&str>,
        relaunch: Option<LaunchSpec>,
        policy: ResolverPolicy,
    ) -> Self {
        Self {
            static_domain: static_domain.map(str::to_owned),
            relaunch,
            policy,
            history: vec![ResolverState::Init],
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ResolverState {
        self.history
            .last()
            .copied()
            .unwrap_or(ResolverState::Init)
    }

    /// Every state entered so far, in order.
    #[must_use]
    pub fn history(&self) -> &[ResolverState] {
        &self.history
    }

    /// Resolves the hostname, restarting the tunnel client through
    /// `supervisor` between failed scans of the log in `workdir`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Exhausted`] once the attempt budget is spent
    /// and [`ResolveError::Cancelled`] when `cancel` fires.
    pub async fn resolve<S: ProcessSpawner>(
        &mut self,
        supervisor: &mut ProcessSupervisor<S>,
        workdir: &WorkDir,
        cancel: &CancellationToken,
    ) -> Result<TunnelDescriptor, ResolveError> {
        if let Some(domain) = self.static_domain.clone() {
            self.enter(ResolverState::StaticResolved);
            self.enter(ResolverState::Resolved);
            info!(hostname = %domain, "using configured tunnel domain");
            return Ok(TunnelDescriptor::new(domain, DomainSource::Static));
        }

        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            self.enter(ResolverState::LogScanning { attempt });
            if let Some(hostname) = self.scan(workdir, cancel).await? {
                self.enter(ResolverState::Resolved);
                info!(%hostname, attempt, "tunnel hostname discovered");
                return Ok(TunnelDescriptor::new(hostname, DomainSource::LogScraped));
            }

            let Some(relaunch) = self.relaunch.clone() else {
                warn!(attempt, "no tunnel client to restart");
                return Err(self.exhaust(attempt));
            };
            if attempt >= max_attempts {
                return Err(self.exhaust(attempt));
            }

            self.enter(ResolverState::Retrying { attempt });
            warn!(attempt, max_attempts, "tunnel hostname not found, restarting tunnel client");
            if let Err(err) = workdir.remove(files::TUNNEL_LOG) {
                warn!(error = %err, "failed to remove tunnel log");
            }
            if let Err(err) = supervisor.terminate(BinaryRole::TunnelClient) {
                warn!(error = %err, "failed to stop tunnel client");
            }
            pause(self.policy.terminate_cooldown, cancel).await?;
            match supervisor.launch(&relaunch, cancel).await {
                Ok(()) => {}
                Err(LaunchError::Cancelled { .. }) => return Err(ResolveError::Cancelled),
                Err(err) => warn!(error = %err, attempt, "tunnel client relaunch failed"),
            }
            pause(self.policy.relaunch_cooldown, cancel).await?;
            attempt += 1;
        }
    }

    fn enter(&mut self, state: ResolverState) {
        debug!(?state, "resolver transition");
        self.history.push(state);
    }

    fn exhaust(&mut self, attempts: u32) -> ResolveError {
        self.enter(ResolverState::Exhausted);
        ResolveError::Exhausted { attempts }
    }

    async fn scan(
        &self,
        workdir: &WorkDir,
        cancel: &CancellationToken,
    ) -> Result<Option<String>, ResolveError> {
        let deadline = Instant::now() + self.policy.scan_window;
        loop {
            match workdir.read_to_string(files::TUNNEL_LOG) {
                Ok(Some(log)) => {
                    if let Some(hostname) = scan_log(&log)? {
                        return Ok(Some(hostname));
                    }
                }
                Ok(None) => {}
                Err(err) => warn!(error = %err, "failed to read tunnel log"),
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            pause(self.policy.scan_interval, cancel).await?;
        }
    }
}

async fn pause(delay: Duration, cancel: &CancellationToken) -> Result<(), ResolveError> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(ResolveError::Cancelled),
        () = sleep(delay) => Ok(()),
    }
}
