//! Test support utilities shared across unit and integration tests.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::env;
use std::ffi::OsString;
use std::rc::Rc;

use camino::Utf8PathBuf;
use tokio::sync::{Mutex, MutexGuard};

use crate::provision::BinaryRole;
use crate::supervisor::{ChildProcess, LaunchError, LaunchSpec, ProcessSpawner};

/// Scripted behaviour for one spawned child.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ChildScript {
    spawn_error: Option<String>,
    exits_immediately: bool,
    terminate_error: Option<String>,
    writes: Vec<(Utf8PathBuf, String)>,
}

impl ChildScript {
    /// A child that keeps running until terminated.
    #[must_use]
    pub fn running() -> Self {
        Self::default()
    }

    /// A child that has already exited when first polled.
    #[must_use]
    pub fn exits_immediately() -> Self {
        Self {
            exits_immediately: true,
            ..Self::default()
        }
    }

    /// A spawn attempt that fails with `message`.
    #[must_use]
    pub fn spawn_fails(message: impl Into<String>) -> Self {
        Self {
            spawn_error: Some(message.into()),
            ..Self::default()
        }
    }

    /// Makes termination of this child fail with `message`.
    #[must_use]
    pub fn terminate_fails(mut self, message: impl Into<String>) -> Self {
        self.terminate_error = Some(message.into());
        self
    }

    /// Writes `contents` to `path` when the child is spawned, the way a real
    /// tunnel client writes its log.
    #[must_use]
    pub fn writes(mut self, path: impl Into<Utf8PathBuf>, contents: impl Into<String>) -> Self {
        self.writes.push((path.into(), contents.into()));
        self
    }
}

/// Records a single launch made through [`ScriptedSpawner`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LaunchInvocation {
    /// Role of the child.
    pub role: BinaryRole,
    /// Shell-like rendering of the command.
    pub command: String,
}

/// Process spawner that replays scripted child behaviour per role in FIFO
/// order. Roles without a queued script spawn a running child.
#[derive(Clone, Debug, Default)]
pub struct ScriptedSpawner {
    scripts: Rc<RefCell<HashMap<BinaryRole, VecDeque<ChildScript>>>>,
    launches: Rc<RefCell<Vec<LaunchInvocation>>>,
    terminations: Rc<RefCell<Vec<BinaryRole>>>,
}

impl ScriptedSpawner {
    /// Creates a spawner with no queued scripts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `script` for the next spawn of `role`.
    pub fn push(&self, role: BinaryRole, script: ChildScript) {
        self.scripts
            .borrow_mut()
            .entry(role)
            .or_default()
            .push_back(script);
    }

    /// Returns a snapshot of all launches recorded so far.
    #[must_use]
    pub fn launches(&self) -> Vec<LaunchInvocation> {
        self.launches.borrow().clone()
    }

    /// Number of spawn attempts for `role`.
    #[must_use]
    pub fn launch_count(&self, role: BinaryRole) -> usize {
        self.launches
            .borrow()
            .iter()
            .filter(|launch| launch.role == role)
            .count()
    }

    /// Roles terminated so far, in order.
    #[must_use]
    pub fn terminations(&self) -> Vec<BinaryRole> {
        self.terminations.borrow().clone()
    }
}

/// Child produced by [`ScriptedSpawner`].
#[derive(Debug)]
pub struct ScriptedChild {
    role: BinaryRole,
    exited: bool,
    terminate_error: Option<String>,
    terminations: Rc<RefCell<Vec<BinaryRole>>>,
}

impl ProcessSpawner for ScriptedSpawner {
    type Child = ScriptedChild;

    fn spawn(&self, spec: &LaunchSpec) -> Result<Self::Child, LaunchError> {
        self.launches.borrow_mut().push(LaunchInvocation {
            role: spec.role,
            command: spec.command_string(),
        });
        let script = self
            .scripts
            .borrow_mut()
            .get_mut(&spec.role)
            .and_then(VecDeque::pop_front)
            .unwrap_or_default();

        if let Some(message) = script.spawn_error {
            return Err(LaunchError::Spawn {
                role: spec.role,
                program: spec.program.to_string(),
                message,
            });
        }
        for (path, contents) in &script.writes {
            std::fs::write(path, contents).map_err(|err| LaunchError::Spawn {
                role: spec.role,
                program: spec.program.to_string(),
                message: format!("scripted write to {path} failed: {err}"),
            })?;
        }

        Ok(ScriptedChild {
            role: spec.role,
            exited: script.exits_immediately,
            terminate_error: script.terminate_error,
            terminations: Rc::clone(&self.terminations),
        })
    }
}

impl ChildProcess for ScriptedChild {
    fn id(&self) -> Option<u32> {
        None
    }

    fn has_exited(&mut self) -> Result<bool, LaunchError> {
        Ok(self.exited)
    }

    fn terminate(&mut self) -> Result<(), LaunchError> {
        self.terminations.borrow_mut().push(self.role);
        if let Some(message) = self.terminate_error.clone() {
            return Err(LaunchError::Terminate {
                role: self.role,
                message,
            });
        }
        self.exited = true;
        Ok(())
    }
}

/// Variables read by [`crate::DeploymentConfig::load`], cleared by
/// [`EnvGuard::deployment`] so the host environment cannot leak into a test.
pub const DEPLOYMENT_ENV: [&str; 21] = [
    "EDGEBOOT_CONFIG_PATH",
    "UUID",
    "ARGO_DOMAIN",
    "ARGO_AUTH",
    "ARGO_PORT",
    "NEZHA_SERVER",
    "NEZHA_PORT",
    "NEZHA_KEY",
    "CFIP",
    "CFPORT",
    "NAME",
    "FILE_PATH",
    "SUB_PATH",
    "UPLOAD_URL",
    "PROJECT_URL",
    "AUTO_ACCESS",
    "SERVER_PORT",
    "PORT",
    "BINARY_SOURCE",
    "KEEPALIVE_URL",
    "ISP_LOOKUP_URL",
];

static ENV_LOCK: Mutex<()> = Mutex::const_new(());

/// Deployment environment held for the lifetime of a test. Concurrent
/// guards queue on a shared lock; dropping the guard restores every
/// variable it touched.
pub struct EnvGuard {
    saved: HashMap<&'static str, Option<OsString>>,
    _lock: MutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Clears [`DEPLOYMENT_ENV`] and then applies `overrides`. Keys outside
    /// that list are ignored.
    pub async fn deployment(overrides: &[(&str, &str)]) -> Self {
        let lock = ENV_LOCK.lock().await;
        let saved: HashMap<&'static str, Option<OsString>> = DEPLOYMENT_ENV
            .iter()
            .map(|key| (*key, env::var_os(key)))
            .collect();

        for key in DEPLOYMENT_ENV {
            let value = overrides
                .iter()
                .rev()
                .find_map(|(name, value)| (*name == key).then_some(*value));
            // SAFETY: every mutation happens while `ENV_LOCK` is held.
            unsafe {
                match value {
                    Some(value) => env::set_var(key, value),
                    None => env::remove_var(key),
                }
            }
        }

        Self { saved, _lock: lock }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, value) in self.saved.drain() {
            // SAFETY: `_lock` is still held while fields drop after this body.
            unsafe {
                match value {
                    Some(value) => env::set_var(key, value),
                    None => env::remove_var(key),
                }
            }
        }
    }
}
