//! Delayed removal of the deployment's on-disk footprint.
//!
//! Once the stack is running the downloaded binaries, the proxy
//! configuration, and the tunnel log are no longer needed on disk. The
//! janitor deletes them after a grace period and then verifies that nothing
//! from the footprint remains. Subscription files and agent or tunnel
//! configuration are left in place.

use std::time::Duration;

use thiserror::Error;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::provision::BinaryRole;
use crate::workdir::{WorkDir, WorkDirError, files};

/// Grace period before the footprint is removed.
pub const DEFAULT_CLEANUP_DELAY: Duration = Duration::from_secs(90);

/// Summary of janitor work.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SweepSummary {
    /// Files deleted during the sweep, in footprint order.
    pub removed: Vec<String>,
    /// Footprint entries that were already absent.
    pub missing: usize,
}

impl SweepSummary {
    /// Number of files deleted.
    #[must_use]
    pub fn removed_count(&self) -> usize {
        self.removed.len()
    }
}

/// Errors returned by the janitor.
#[derive(Debug, Error)]
pub enum JanitorError {
    /// A file could not be removed.
    #[error(transparent)]
    Remove(#[from] WorkDirError),
    /// Files remain after the sweep.
    #[error("files remain after janitor sweep: {}", remaining.join(", "))]
    NotClean {
        /// Names still present.
        remaining: Vec<String>,
    },
    /// Shutdown was requested before the grace period elapsed.
    #[error("janitor sweep cancelled")]
    Cancelled,
}

/// Removes the deployment footprint from a working directory.
#[derive(Debug)]
pub struct Janitor<'a> {
    workdir: &'a WorkDir,
}

impl<'a> Janitor<'a> {
    /// Creates a janitor for `workdir`.
    #[must_use]
    pub const fn new(workdir: &'a WorkDir) -> Self {
        Self { workdir }
    }

    /// Names the sweep deletes.
    #[must_use]
    pub fn targets() -> Vec<&'static str> {
        [files::TUNNEL_LOG, files::PROXY_CONFIG]
            .into_iter()
            .chain(BinaryRole::ALL.iter().map(|role| role.file_name()))
            .collect()
    }

    /// Deletes every footprint file, then verifies none remain.
    ///
    /// # Errors
    ///
    /// Returns [`JanitorError::Remove`] when a deletion fails and
    /// [`JanitorError::NotClean`] when a target is still present afterwards.
    pub fn sweep(&self) -> Result<SweepSummary, JanitorError> {
        let mut summary = SweepSummary::default();
        for name in Self::targets() {
            if self.workdir.remove(name)? {
                debug!(%name, "removed");
                summary.removed.push(name.to_owned());
            } else {
                summary.missing += 1;
            }
        }

        let remaining: Vec<String> = Self::targets()
            .into_iter()
            .filter(|name| self.workdir.exists(name))
            .map(str::to_owned)
            .collect();
        if !remaining.is_empty() {
            return Err(JanitorError::NotClean { remaining });
        }

        info!(
            removed = summary.removed_count(),
            missing = summary.missing,
            workdir = %self.workdir.path(),
            "janitor sweep complete"
        );
        Ok(summary)
    }

    /// Waits `delay`, then sweeps.
    ///
    /// # Errors
    ///
    /// Returns [`JanitorError::Cancelled`] when `cancel` fires first, or any
    /// error from [`Self::sweep`].
    pub async fn sweep_after(
        &self,
        delay: Duration,
        cancel: &CancellationToken,
    ) -> Result<SweepSummary, JanitorError> {
        debug!(delay_secs = delay.as_secs(), "janitor scheduled");
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(JanitorError::Cancelled),
            () = sleep(delay) => self.sweep(),
        }
    }
}
