//! Per-job scratch directories.
//!
//! Each run gets a working directory holding its hostfile and links to the
//! datasets the model reads. The directory is removed when the scratch
//! guard drops, so cleanup happens on success, failure, and cancellation
//! alike — no exit path can leak hostfiles or dangling dataset links.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{LaunchError, LaunchResult};

/// RAII guard over one job's working directory.
#[derive(Debug)]
pub struct JobScratch {
    root: PathBuf,
}

impl JobScratch {
    /// Create the scratch directory for a job under `base`.
    pub fn create(base: &Path, job_id: &str) -> LaunchResult<Self> {
        let root = base.join(job_id);
        std::fs::create_dir_all(&root).map_err(LaunchError::Scratch)?;
        debug!(path = ?root, "scratch directory created");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where the job's hostfile lives.
    pub fn hostfile_path(&self) -> PathBuf {
        self.root.join("hostfile")
    }

    /// Link a dataset into the scratch directory under `name`.
    #[cfg(unix)]
    pub fn link_dataset(&self, name: &str, target: &Path) -> LaunchResult<PathBuf> {
        let link = self.root.join(name);
        std::os::unix::fs::symlink(target, &link).map_err(LaunchError::Scratch)?;
        debug!(?link, ?target, "dataset linked");
        Ok(link)
    }
}

impl Drop for JobScratch {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.root) {
            // Already gone is fine; anything else deserves a trace.
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = ?self.root, error = %e, "failed to remove scratch directory");
            }
        } else {
            debug!(path = ?self.root, "scratch directory removed");
        }
    }
}
