//! Per-repo package index.

use pository_core::{PackageLocation, PackageMetadata};
use serde::{Deserialize, Serialize};

/// The ordered sequence of packages stored in one repo.
///
/// Invariant: at most one entry per
/// `(distribution, component, architecture, name, version)`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RepoIndex {
    pub packages: Vec<PackageMetadata>,
}

impl RepoIndex {
    /// Replace the entry with the same key, or append.
    pub fn upsert(&mut self, meta: PackageMetadata) {
        let loc = meta.location();
        match self.packages.iter_mut().find(|p| p.matches_location(&loc)) {
            Some(existing) => *existing = meta,
            None => self.packages.push(meta),
        }
    }

    /// Remove the entry for `loc`. Returns whether anything was removed.
    pub fn remove(&mut self, loc: &PackageLocation) -> bool {
        let before = self.packages.len();
        self.packages.retain(|p| !p.matches_location(loc));
        self.packages.len() != before
    }

    /// Look up the entry for `loc`.
    pub fn find(&self, loc: &PackageLocation) -> Option<&PackageMetadata> {
        self.packages.iter().find(|p| p.matches_location(loc))
    }
}
