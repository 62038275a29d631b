//! Spawner backed by real OS processes.

use std::io;
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, Stdio};

use super::{ChildProcess, LaunchError, LaunchSpec, ProcessSpawner};
use crate::provision::BinaryRole;

/// Spawns children in their own process group with stdio discarded.
#[derive(Clone, Copy, Debug, Default)]
pub struct OsSpawner;

/// Child started by [`OsSpawner`]. Dropping a running child kills and
/// reaps it.
#[derive(Debug)]
pub struct OsChild {
    role: BinaryRole,
    child: Child,
}

impl ProcessSpawner for OsSpawner {
    type Child = OsChild;

    fn spawn(&self, spec: &LaunchSpec) -> Result<Self::Child, LaunchError> {
        let child = Command::new(spec.program.as_std_path())
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .process_group(0)
            .spawn()
            .map_err(|err| LaunchError::Spawn {
                role: spec.role,
                program: spec.program.to_string(),
                message: err.to_string(),
            })?;
        Ok(OsChild {
            role: spec.role,
            child,
        })
    }
}

impl ChildProcess for OsChild {
    fn id(&self) -> Option<u32> {
        Some(self.child.id())
    }

    fn has_exited(&mut self) -> Result<bool, LaunchError> {
        self.child
            .try_wait()
            .map(|status| status.is_some())
            .map_err(|err| LaunchError::Status {
                role: self.role,
                message: err.to_string(),
            })
    }

    fn terminate(&mut self) -> Result<(), LaunchError> {
        let terminate_err = |err: &io::Error| LaunchError::Terminate {
            role: self.role,
            message: err.to_string(),
        };
        match self.child.kill() {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::InvalidInput => {}
            Err(err) => return Err(terminate_err(&err)),
        }
        self.child
            .wait()
            .map(drop)
            .map_err(|err| terminate_err(&err))
    }
}

impl Drop for OsChild {
    fn drop(&mut self) {
        if matches!(self.child.try_wait(), Ok(None)) {
            self.child.kill().ok();
            self.child.wait().ok();
        }
    }
}
