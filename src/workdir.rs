//! Capability-scoped access to the deployment working directory.
//!
//! Generated configuration, tunnel logs, and subscription files all live in a
//! single flat directory shared with the supervised binaries.

use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use thiserror::Error;

/// Well-known file names inside the working directory.
pub mod files {
    /// Proxy engine configuration.
    pub const PROXY_CONFIG: &str = "config.json";
    /// Monitoring agent (v1) configuration.
    pub const AGENT_CONFIG: &str = "config.yaml";
    /// Raw tunnel credential document.
    pub const TUNNEL_CREDENTIAL: &str = "tunnel.json";
    /// Tunnel routing file.
    pub const TUNNEL_ROUTING: &str = "tunnel.yml";
    /// Ephemeral tunnel log scraped for the public hostname.
    pub const TUNNEL_LOG: &str = "boot.log";
    /// Base64 subscription document.
    pub const SUBSCRIPTION: &str = "sub.txt";
    /// Plain node URIs, one per line.
    pub const NODE_LIST: &str = "list.txt";
    /// Operator environment file preserved across restarts.
    pub const ENV_FILE: &str = ".env";
}

/// Errors raised while touching the working directory.
#[derive(Debug, Error)]
pub enum WorkDirError {
    /// The directory could not be created or opened.
    #[error("failed to open working directory {path}: {message}")]
    Open {
        /// Directory path.
        path: Utf8PathBuf,
        /// Underlying error message.
        message: String,
    },
    /// A file operation failed.
    #[error("failed to {action} {name} in working directory: {message}")]
    File {
        /// Operation that failed.
        action: &'static str,
        /// File name relative to the working directory.
        name: String,
        /// Underlying error message.
        message: String,
    },
}

impl WorkDirError {
    fn file(action: &'static str, name: &str, err: &io::Error) -> Self {
        Self::File {
            action,
            name: name.to_owned(),
            message: err.to_string(),
        }
    }
}

/// Handle to the working directory.
#[derive(Debug)]
pub struct WorkDir {
    root: Utf8PathBuf,
    dir: Dir,
}

impl WorkDir {
    /// Opens `path`, creating it and any missing parents first.
    ///
    /// # Errors
    ///
    /// Returns [`WorkDirError::Open`] when the directory cannot be created or
    /// opened.
    pub fn open(path: &Utf8Path) -> Result<Self, WorkDirError> {
        let open_err = |err: io::Error| WorkDirError::Open {
            path: path.to_path_buf(),
            message: err.to_string(),
        };
        Dir::create_ambient_dir_all(path, ambient_authority()).map_err(open_err)?;
        let dir = Dir::open_ambient_dir(path, ambient_authority()).map_err(open_err)?;
        Ok(Self {
            root: path.to_path_buf(),
            dir,
        })
    }

    /// Path the directory was opened from.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.root
    }

    /// Path of `name` inside the directory, as handed to child processes.
    #[must_use]
    pub fn join(&self, name: &str) -> Utf8PathBuf {
        self.root.join(name)
    }

    /// Returns `true` when `name` exists.
    #[must_use]
    pub fn exists(&self, name: &str) -> bool {
        self.dir.exists(name)
    }

    /// Writes `contents` to `name`, replacing any previous file.
    ///
    /// # Errors
    ///
    /// Returns [`WorkDirError::File`] when the write fails.
    pub fn write(&self, name: &str, contents: impl AsRef<[u8]>) -> Result<(), WorkDirError> {
        self.dir
            .write(name, contents)
            .map_err(|err| WorkDirError::file("write", name, &err))
    }

    /// Reads `name`, returning `None` when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`WorkDirError::File`] for failures other than a missing file.
    pub fn read_to_string(&self, name: &str) -> Result<Option<String>, WorkDirError> {
        match self.dir.read_to_string(name) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(WorkDirError::file("read", name, &err)),
        }
    }

    /// Removes `name`, returning `false` when it was already absent.
    ///
    /// # Errors
    ///
    /// Returns [`WorkDirError::File`] for failures other than a missing file.
    pub fn remove(&self, name: &str) -> Result<bool, WorkDirError> {
        match self.dir.remove_file(name) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(WorkDirError::file("remove", name, &err)),
        }
    }

    /// Deletes every regular file left over from a previous run except the
    /// names listed in `keep`. Returns the removed names.
    ///
    /// # Errors
    ///
    /// Returns [`WorkDirError::File`] when the directory cannot be listed or
    /// a file cannot be removed.
    pub fn purge_stale(&self, keep: &[&str]) -> Result<Vec<String>, WorkDirError> {
        let entries = self
            .dir
            .entries()
            .map_err(|err| WorkDirError::file("list", ".", &err))?;

        let mut removed = Vec::new();
        for item in entries {
            let entry = item.map_err(|err| WorkDirError::file("list", ".", &err))?;
            let name = entry
                .file_name()
                .map_err(|err| WorkDirError::file("inspect", ".", &err))?;
            let is_file = entry
                .file_type()
                .map_err(|err| WorkDirError::file("inspect", &name, &err))?
                .is_file();
            if !is_file || keep.contains(&name.as_str()) {
                continue;
            }
            if self.remove(&name)? {
                removed.push(name);
            }
        }
        removed.sort();
        Ok(removed)
    }
}
