//! Scratch space for one ensemble job.
//!
//! Every intermediate stem a backend writes is tracked here and removed when
//! the space is released. Release never fails: problems are logged and
//! returned in a [`ReleaseReport`]. Dropping an unreleased space releases it.

use std::{
    fs, io,
    path::{Path, PathBuf},
};
use tracing::{debug, info, warn};

use crate::error::Result;

/// What a release actually did.
#[derive(Clone, Debug, Default)]
pub struct ReleaseReport {
    pub removed: Vec<PathBuf>,
    pub already_missing: Vec<PathBuf>,
    pub failures: Vec<(PathBuf, String)>,
    pub dir_removed: bool,
}

impl ReleaseReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.dir_removed
    }
}

#[derive(Debug)]
pub struct ScratchSpace {
    dir: PathBuf,
    artifacts: Vec<PathBuf>,
    released: bool,
}

/// Creates a fresh scratch directory under `base_output_dir`.
pub fn acquire_scratch(base_output_dir: &Path) -> Result<ScratchSpace> {
    ScratchSpace::acquire(base_output_dir)
}

impl ScratchSpace {
    pub fn acquire(base_output_dir: &Path) -> Result<Self> {
        fs::create_dir_all(base_output_dir)?;
        let dir = tempfile::Builder::new()
            .prefix(".ensemble-")
            .tempdir_in(base_output_dir)?
            .keep();
        debug!("Acquired scratch space {:?}", dir);
        Ok(Self {
            dir,
            artifacts: Vec::new(),
            released: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    pub fn track(&mut self, artifact: impl Into<PathBuf>) {
        let artifact = artifact.into();
        if !self.artifacts.contains(&artifact) {
            self.artifacts.push(artifact);
        }
    }

    /// Tracks every file currently in the scratch directory, including ones a
    /// backend wrote but never reported. Returns how many were newly tracked.
    pub fn track_contents(&mut self) -> io::Result<usize> {
        let before = self.artifacts.len();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                self.track(entry.path());
            }
        }
        let adopted = self.artifacts.len() - before;
        if adopted > 0 {
            debug!("Tracking {} unreported file(s) in {:?}", adopted, self.dir);
        }
        Ok(adopted)
    }

    pub fn tracked(&self) -> &[PathBuf] {
        &self.artifacts
    }

    /// Deletes every tracked artifact, then the directory if it is empty.
    pub fn release(mut self) -> ReleaseReport {
        self.release_inner()
    }

    fn release_inner(&mut self) -> ReleaseReport {
        let mut report = ReleaseReport::default();
        if self.released {
            return report;
        }
        self.released = true;

        for artifact in self.artifacts.drain(..) {
            match fs::remove_file(&artifact) {
                Ok(()) => {
                    debug!("Removed temporary file {:?}", artifact);
                    report.removed.push(artifact);
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    report.already_missing.push(artifact);
                }
                Err(e) => {
                    warn!("Failed to remove temporary file {:?}: {}", artifact, e);
                    report.failures.push((artifact, e.to_string()));
                }
            }
        }

        match fs::read_dir(&self.dir) {
            Ok(mut entries) => {
                if entries.next().is_none() {
                    match fs::remove_dir(&self.dir) {
                        Ok(()) => {
                            info!("Removed scratch directory {:?}", self.dir);
                            report.dir_removed = true;
                        }
                        Err(e) => {
                            warn!("Failed to remove scratch directory {:?}: {}", self.dir, e);
                            report.failures.push((self.dir.clone(), e.to_string()));
                        }
                    }
                } else {
                    let remaining = fs::read_dir(&self.dir).map(|d| d.count()).unwrap_or(0);
                    warn!(
                        "Could not remove scratch directory {:?}, {} files remain",
                        self.dir, remaining
                    );
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                report.dir_removed = true;
            }
            Err(e) => {
                warn!("Failed to inspect scratch directory {:?}: {}", self.dir, e);
                report.failures.push((self.dir.clone(), e.to_string()));
            }
        }

        report
    }
}

impl Drop for ScratchSpace {
    fn drop(&mut self) {
        if !self.released {
            self.release_inner();
        }
    }
}
