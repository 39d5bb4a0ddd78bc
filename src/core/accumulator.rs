use std::path::PathBuf;

use crate::types::{Role, StemArtifact};

/// Stems collected per role across every model of one job.
///
/// Only the orchestrator loop pushes; buckets are read once it has finished.
#[derive(Debug, Default)]
pub struct RoleBuckets {
    vocal: Vec<StemArtifact>,
    instrumental: Vec<StemArtifact>,
}

impl RoleBuckets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, role: Role, artifact: StemArtifact) {
        match role {
            Role::Vocal => self.vocal.push(artifact),
            Role::Instrumental => self.instrumental.push(artifact),
        }
    }

    pub fn bucket(&self, role: Role) -> &[StemArtifact] {
        match role {
            Role::Vocal => &self.vocal,
            Role::Instrumental => &self.instrumental,
        }
    }

    /// Paths in a bucket, in the order they were accumulated.
    pub fn paths(&self, role: Role) -> Vec<PathBuf> {
        self.bucket(role).iter().map(|a| a.path.clone()).collect()
    }

    pub fn len(&self, role: Role) -> usize {
        self.bucket(role).len()
    }
}
