//! Launch and lifetime tracking for the provisioned binaries.
//!
//! Children are spawned through the [`ProcessSpawner`] seam so tests can
//! script process behaviour. After each launch the supervisor waits for a
//! readiness signal: a TCP probe on the child's listening port, or a short
//! settle delay when the child exposes nothing to probe.

mod os;
mod plan;

use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

use camino::Utf8PathBuf;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::provision::BinaryRole;

pub use os::{OsChild, OsSpawner};
pub use plan::{LaunchPlan, LaunchTimings};

const PROBE_CONNECT_TIMEOUT: Duration = Duration::from_secs(1);
const DEFAULT_READINESS_TIMEOUT: Duration = Duration::from_secs(15);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Readiness signal awaited after spawning a child.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Readiness {
    /// Poll until a TCP connection to this loopback port succeeds.
    TcpPort(u16),
    /// Wait a fixed interval, then require the child to still be alive.
    Settle(Duration),
}

/// Everything needed to start one child.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LaunchSpec {
    /// Role of the child.
    pub role: BinaryRole,
    /// Executable path.
    pub program: Utf8PathBuf,
    /// Arguments.
    pub args: Vec<String>,
    /// Readiness signal awaited after spawning.
    pub readiness: Readiness,
}

impl LaunchSpec {
    /// Shell-like rendering for logs and assertions.
    #[must_use]
    pub fn command_string(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.program.to_string());
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

/// Errors raised while launching or stopping children.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum LaunchError {
    /// The OS refused to start the process.
    #[error("failed to spawn {role} ({program}): {message}")]
    Spawn {
        /// Role of the child.
        role: BinaryRole,
        /// Executable path.
        program: String,
        /// Underlying error message.
        message: String,
    },
    /// The child exited before it became ready.
    #[error("{role} exited before becoming ready")]
    ExitedEarly {
        /// Role of the child.
        role: BinaryRole,
    },
    /// The readiness probe never succeeded.
    #[error("{role} did not accept connections on port {port} within {timeout_secs}s")]
    ReadinessTimeout {
        /// Role of the child.
        role: BinaryRole,
        /// Probed port.
        port: u16,
        /// Probe budget in seconds.
        timeout_secs: u64,
    },
    /// Querying the child's status failed.
    #[error("failed to query {role} status: {message}")]
    Status {
        /// Role of the child.
        role: BinaryRole,
        /// Underlying error message.
        message: String,
    },
    /// Shutdown was requested while waiting for readiness. The child stays
    /// registered so [`ProcessSupervisor::terminate_all`] reaches it.
    #[error("launch of {role} cancelled")]
    Cancelled {
        /// Role of the child.
        role: BinaryRole,
    },
    /// Stopping the child failed.
    #[error("failed to terminate {role}: {message}")]
    Terminate {
        /// Role of the child.
        role: BinaryRole,
        /// Underlying error message.
        message: String,
    },
}

/// A running child process.
pub trait ChildProcess {
    /// OS process identifier, when known.
    fn id(&self) -> Option<u32>;

    /// Returns `true` once the child has exited.
    ///
    /// # Errors
    ///
    /// Returns [`LaunchError::Status`] when the status cannot be queried.
    fn has_exited(&mut self) -> Result<bool, LaunchError>;

    /// Stops the child and reaps it. Stopping an exited child succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`LaunchError::Terminate`] when the signal cannot be delivered.
    fn terminate(&mut self) -> Result<(), LaunchError>;
}

/// Starts children.
pub trait ProcessSpawner {
    /// Child handle type.
    type Child: ChildProcess;

    /// Spawns `spec` detached from the orchestrator's stdio.
    ///
    /// # Errors
    ///
    /// Returns [`LaunchError::Spawn`] when the process cannot be started.
    fn spawn(&self, spec: &LaunchSpec) -> Result<Self::Child, LaunchError>;
}

/// Owned reference to a spawned child.
#[derive(Debug)]
pub struct ProcessHandle<C> {
    role: BinaryRole,
    child: C,
    launched_at: Instant,
}

impl<C: ChildProcess> ProcessHandle<C> {
    fn new(role: BinaryRole, child: C) -> Self {
        Self {
            role,
            child,
            launched_at: Instant::now(),
        }
    }

    /// Role of the child.
    #[must_use]
    pub const fn role(&self) -> BinaryRole {
        self.role
    }

    /// OS process identifier, when known.
    #[must_use]
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Time since launch.
    #[must_use]
    pub fn uptime(&self) -> Duration {
        self.launched_at.elapsed()
    }

    /// Returns `true` once the child has exited.
    ///
    /// # Errors
    ///
    /// Propagates [`ChildProcess::has_exited`] failures.
    pub fn has_exited(&mut self) -> Result<bool, LaunchError> {
        self.child.has_exited()
    }

    /// Stops the child.
    ///
    /// # Errors
    ///
    /// Propagates [`ChildProcess::terminate`] failures.
    pub fn terminate(&mut self) -> Result<(), LaunchError> {
        self.child.terminate()
    }
}

/// Launches children in order and keeps at most one handle per role.
pub struct ProcessSupervisor<S: ProcessSpawner> {
    spawner: S,
    handles: Vec<ProcessHandle<S::Child>>,
    probe: ReadinessProbe,
}

#[derive(Clone, Copy, Debug)]
struct ReadinessProbe {
    timeout: Duration,
    poll_interval: Duration,
}

impl<S: ProcessSpawner> ProcessSupervisor<S> {
    /// Creates a supervisor with default readiness settings.
    pub const fn new(spawner: S) -> Self {
        Self {
            spawner,
            handles: Vec::new(),
            probe: ReadinessProbe {
                timeout: DEFAULT_READINESS_TIMEOUT,
                poll_interval: DEFAULT_POLL_INTERVAL,
            },
        }
    }

    /// Overrides how long a port probe may take.
    #[must_use]
    pub const fn with_readiness_timeout(mut self, readiness_timeout: Duration) -> Self {
        self.probe.timeout = readiness_timeout;
        self
    }

    /// Overrides the interval between readiness polls.
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.probe.poll_interval = poll_interval;
        self
    }

    /// Underlying spawner.
    #[must_use]
    pub const fn spawner(&self) -> &S {
        &self.spawner
    }

    /// Returns `true` when a handle for `role` is held.
    #[must_use]
    pub fn is_running(&self, role: BinaryRole) -> bool {
        self.handles.iter().any(|handle| handle.role == role)
    }

    /// Roles with a live handle, in launch order.
    #[must_use]
    pub fn running_roles(&self) -> Vec<BinaryRole> {
        self.handles.iter().map(|handle| handle.role).collect()
    }

    /// OS process identifier of the child holding `role`.
    #[must_use]
    pub fn pid(&self, role: BinaryRole) -> Option<u32> {
        self.handles
            .iter()
            .find(|handle| handle.role == role)
            .and_then(ProcessHandle::id)
    }

    /// Spawns `spec` and waits for its readiness signal. Any existing child
    /// with the same role is stopped first.
    ///
    /// The child is registered before readiness is awaited, so dropping this
    /// future part-way still leaves it reachable by [`Self::terminate_all`].
    ///
    /// # Errors
    ///
    /// Returns [`LaunchError`] when spawning fails or the child never becomes
    /// ready; a child that is not ready is stopped before returning. Returns
    /// [`LaunchError::Cancelled`] when `cancel` fires during the wait.
    pub async fn launch(
        &mut self,
        spec: &LaunchSpec,
        cancel: &CancellationToken,
    ) -> Result<(), LaunchError> {
        let role = spec.role;
        if let Err(err) = self.terminate(role) {
            warn!(%role, error = %err, "failed to stop previous instance");
        }

        info!(%role, command = %spec.command_string(), "launching");
        let child = self.spawner.spawn(spec)?;
        self.handles.push(ProcessHandle::new(role, child));

        let probe = self.probe;
        let Some(handle) = self.handles.last_mut() else {
            return Ok(());
        };
        let ready = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(LaunchError::Cancelled { role }),
            ready = probe.wait(&mut *handle, spec.readiness) => ready,
        };

        match ready {
            Ok(()) => {
                info!(%role, pid = ?handle.id(), "ready");
                Ok(())
            }
            Err(err @ LaunchError::Cancelled { .. }) => Err(err),
            Err(err) => {
                if let Err(stop_err) = self.terminate(role) {
                    warn!(%role, error = %stop_err, "failed to stop unready child");
                }
                Err(err)
            }
        }
    }

    /// Launches every spec of `plan` in order. A monitoring agent failure is
    /// logged and skipped; any other failure aborts the sequence.
    ///
    /// # Errors
    ///
    /// Returns the first [`LaunchError`] from the proxy engine or tunnel
    /// client, or [`LaunchError::Cancelled`] for any role.
    pub async fn launch_stack(
        &mut self,
        plan: &LaunchPlan,
        cancel: &CancellationToken,
    ) -> Result<(), LaunchError> {
        for spec in plan.specs() {
            match self.launch(spec, cancel).await {
                Ok(()) => {}
                Err(err @ LaunchError::Cancelled { .. }) => return Err(err),
                Err(err) if spec.role.is_monitor() => {
                    warn!(role = %spec.role, error = %err, "monitoring agent unavailable");
                }
                Err(err) => {
                    error!(role = %spec.role, error = %err, "launch failed");
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    /// Stops the child holding `role`. Returns `false` when none was held.
    ///
    /// # Errors
    ///
    /// Returns [`LaunchError::Terminate`] when the child could not be
    /// stopped; its handle is released regardless.
    pub fn terminate(&mut self, role: BinaryRole) -> Result<bool, LaunchError> {
        let Some(position) = self.handles.iter().position(|handle| handle.role == role) else {
            return Ok(false);
        };
        let mut handle = self.handles.remove(position);
        handle.terminate()?;
        info!(%role, uptime_ms = handle.uptime().as_millis(), "terminated");
        Ok(true)
    }

    /// Stops every child in reverse launch order, logging failures.
    /// Returns how many children were stopped cleanly.
    pub fn terminate_all(&mut self) -> usize {
        let mut stopped = 0;
        while let Some(mut handle) = self.handles.pop() {
            match handle.terminate() {
                Ok(()) => stopped += 1,
                Err(err) => warn!(role = %handle.role, error = %err, "failed to terminate"),
            }
        }
        stopped
    }

}

impl ReadinessProbe {
    async fn wait<C: ChildProcess>(
        self,
        handle: &mut ProcessHandle<C>,
        readiness: Readiness,
    ) -> Result<(), LaunchError> {
        let role = handle.role;
        match readiness {
            Readiness::Settle(delay) => {
                sleep(delay).await;
                if handle.has_exited()? {
                    return Err(LaunchError::ExitedEarly { role });
                }
                Ok(())
            }
            Readiness::TcpPort(port) => {
                let deadline = Instant::now() + self.timeout;
                while Instant::now() <= deadline {
                    if handle.has_exited()? {
                        return Err(LaunchError::ExitedEarly { role });
                    }
                    let connect = timeout(
                        PROBE_CONNECT_TIMEOUT,
                        TcpStream::connect((Ipv4Addr::LOCALHOST, port)),
                    )
                    .await;
                    if matches!(connect, Ok(Ok(_))) {
                        return Ok(());
                    }
                    sleep(self.poll_interval).await;
                }
                Err(LaunchError::ReadinessTimeout {
                    role,
                    port,
                    timeout_secs: self.timeout.as_secs(),
                })
            }
        }
    }
}
