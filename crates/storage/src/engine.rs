//! The package store.

use crate::error::{StorageError, StorageResult};
use crate::events::{EventBus, IndexChanged};
use crate::index::RepoIndex;
use bytes::Bytes;
use dashmap::DashMap;
use pository_core::{ControlFields, PackageLocation, PackageMetadata};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::instrument;
use uuid::Uuid;

const INDEX_FILE: &str = "index.json";
const PACKAGE_FILE: &str = "package.deb";
const METADATA_FILE: &str = "metadata.json";

/// Filters for [`PackageStore::list_packages`]. Unset fields match all.
#[derive(Clone, Debug, Default)]
pub struct PackageFilters {
    pub repo: Option<String>,
    pub distribution: Option<String>,
    pub component: Option<String>,
    pub architecture: Option<String>,
    pub name: Option<String>,
    pub version: Option<String>,
}

impl PackageFilters {
    fn matches(&self, meta: &PackageMetadata) -> bool {
        fn check(filter: &Option<String>, value: &str) -> bool {
            filter.as_deref().is_none_or(|f| f == value)
        }
        check(&self.repo, &meta.repo)
            && check(&self.distribution, &meta.distribution)
            && check(&self.component, &meta.component)
            && check(&self.architecture, &meta.architecture)
            && check(&self.name, &meta.name)
            && check(&self.version, &meta.version)
    }
}

/// Aggregate figures over every stored package.
#[derive(Clone, Copy, Debug, Default)]
pub struct StorageStats {
    pub total_size: u64,
    pub package_count: u64,
}

/// Owner of the data tree.
///
/// Concurrent uploads to the same location serialize on a per-location
/// mutex (last writer wins); the per-repo index is guarded by a per-repo
/// mutex spanning the read-modify-write sequence. Distinct locations and
/// repos proceed in parallel.
pub struct PackageStore {
    data_root: PathBuf,
    index_cache: DashMap<String, Arc<RepoIndex>>,
    locks: DashMap<String, Arc<Mutex<()>>>,
    events: EventBus,
}

impl PackageStore {
    /// Open (and create if needed) the data tree at `data_root`.
    pub async fn new(data_root: impl AsRef<Path>) -> StorageResult<Self> {
        let data_root = data_root.as_ref().to_path_buf();
        fs::create_dir_all(&data_root).await?;
        Ok(Self {
            data_root,
            index_cache: DashMap::new(),
            locks: DashMap::new(),
            events: EventBus::default(),
        })
    }

    /// Index change subscriptions.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    fn lock_for(&self, key: String) -> Arc<Mutex<()>> {
        self.locks
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn repo_dir(&self, repo: &str) -> StorageResult<PathBuf> {
        Ok(self.data_root.join(safe_component(repo)?))
    }

    fn package_dir(&self, loc: &PackageLocation) -> StorageResult<PathBuf> {
        let mut dir = self.repo_dir(&loc.repo)?;
        for part in [
            &loc.distribution,
            &loc.component,
            &loc.architecture,
            &loc.name,
            &loc.version,
        ] {
            dir.push(safe_component(part)?);
        }
        Ok(dir)
    }

    /// Persist a package: artifact, metadata, index entry, in that order.
    ///
    /// A repeated upload of the same bytes is a no-op beyond refreshing the
    /// timestamp; different bytes replace the artifact and its index entry.
    #[instrument(skip(self, bytes, control), fields(size = bytes.len()))]
    pub async fn store_package(
        &self,
        loc: &PackageLocation,
        bytes: Bytes,
        uploader_key_id: &str,
        control: Option<ControlFields>,
    ) -> StorageResult<PackageMetadata> {
        let loc_lock = self.lock_for(format!("loc:{loc}"));
        let _loc_guard = loc_lock.lock().await;

        let dir = self.package_dir(loc)?;
        fs::create_dir_all(&dir).await?;

        let sha256 = hex::encode(Sha256::digest(&bytes));
        let deb_path = dir.join(PACKAGE_FILE);
        write_atomic(&deb_path, &bytes).await?;

        let mut control = control.unwrap_or_default();
        if control.description.is_none() {
            match pository_deb::extract_control_fallback(&deb_path).await {
                Ok(summary) => control.fill_missing_from(summary.fields),
                Err(e) => tracing::debug!(location = %loc, error = %e, "control enrichment skipped"),
            }
        }

        let meta = PackageMetadata {
            repo: loc.repo.clone(),
            distribution: loc.distribution.clone(),
            component: loc.component.clone(),
            architecture: loc.architecture.clone(),
            name: loc.name.clone(),
            version: loc.version.clone(),
            size: bytes.len() as u64,
            sha256,
            mime: pository_core::DEB_MIME.to_string(),
            uploaded_at: OffsetDateTime::now_utc(),
            uploader_key_id: uploader_key_id.to_string(),
            control,
        };
        write_atomic(&dir.join(METADATA_FILE), &pretty_json(&meta)?).await?;

        let repo_lock = self.lock_for(format!("repo:{}", loc.repo));
        let _repo_guard = repo_lock.lock().await;
        let mut index = (*self.load_index_locked(&loc.repo).await?).clone();
        index.upsert(meta.clone());
        self.persist_index_locked(&loc.repo, index).await?;

        Ok(meta)
    }

    /// Absolute path of the stored artifact, if present.
    pub async fn get_package_file(&self, loc: &PackageLocation) -> StorageResult<Option<PathBuf>> {
        let path = self.package_dir(loc)?.join(PACKAGE_FILE);
        if fs::try_exists(&path).await? {
            Ok(Some(path))
        } else {
            Ok(None)
        }
    }

    /// Stored metadata for one location, if present.
    pub async fn get_package_metadata(
        &self,
        loc: &PackageLocation,
    ) -> StorageResult<Option<PackageMetadata>> {
        let path = self.package_dir(loc)?.join(METADATA_FILE);
        match fs::read(&path).await {
            Ok(data) => Ok(Some(serde_json::from_slice(&data)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove an artifact, its index entry, and any parent directories
    /// left empty. Returns whether anything existed.
    #[instrument(skip(self))]
    pub async fn delete_package(&self, loc: &PackageLocation) -> StorageResult<bool> {
        let loc_lock = self.lock_for(format!("loc:{loc}"));
        let _loc_guard = loc_lock.lock().await;

        let dir = self.package_dir(loc)?;
        let existed = fs::try_exists(&dir).await?;
        if existed {
            fs::remove_dir_all(&dir).await?;
        }

        let repo_lock = self.lock_for(format!("repo:{}", loc.repo));
        let removed = {
            let _repo_guard = repo_lock.lock().await;
            let mut index = (*self.load_index_locked(&loc.repo).await?).clone();
            let removed = index.remove(loc);
            if removed {
                self.persist_index_locked(&loc.repo, index).await?;
            }
            removed
        };

        self.prune_empty_parents(&dir).await;
        Ok(existed || removed)
    }

    /// All index entries matching `filters`, across all repos unless
    /// `filters.repo` narrows to one.
    pub async fn list_packages(
        &self,
        filters: &PackageFilters,
    ) -> StorageResult<Vec<PackageMetadata>> {
        let repos = match &filters.repo {
            Some(repo) => vec![repo.clone()],
            None => self.discover_repos().await?,
        };

        let mut result = Vec::new();
        for repo in repos {
            let index = self.load_index(&repo).await?;
            result.extend(
                index
                    .packages
                    .iter()
                    .filter(|m| filters.matches(m))
                    .cloned(),
            );
        }
        Ok(result)
    }

    /// The full index of one repo.
    pub async fn repo_index(&self, repo: &str) -> StorageResult<Arc<RepoIndex>> {
        self.load_index(repo).await
    }

    /// Total bytes and package count across every repo.
    pub async fn get_storage_stats(&self) -> StorageResult<StorageStats> {
        let mut stats = StorageStats::default();
        for repo in self.discover_repos().await? {
            let index = self.load_index(&repo).await?;
            for meta in &index.packages {
                stats.total_size += meta.size;
                stats.package_count += 1;
            }
        }
        Ok(stats)
    }

    /// Verify read and write access to the data root.
    pub async fn is_ready(&self) -> bool {
        let probe = self
            .data_root
            .join(format!(".readyz-probe.{}", Uuid::new_v4()));
        let outcome = async {
            fs::write(&probe, b"ok").await?;
            fs::read(&probe).await?;
            fs::remove_file(&probe).await
        }
        .await;
        outcome.is_ok()
    }

    async fn discover_repos(&self) -> StorageResult<Vec<String>> {
        let mut repos = Vec::new();
        let mut entries = fs::read_dir(&self.data_root).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                repos.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        repos.sort();
        Ok(repos)
    }

    async fn load_index(&self, repo: &str) -> StorageResult<Arc<RepoIndex>> {
        if let Some(cached) = self.index_cache.get(repo) {
            return Ok(cached.clone());
        }
        let repo_lock = self.lock_for(format!("repo:{repo}"));
        let _repo_guard = repo_lock.lock().await;
        self.load_index_locked(repo).await
    }

    /// Load a repo index with the repo mutex held, running the self-heal
    /// pass on first load.
    async fn load_index_locked(&self, repo: &str) -> StorageResult<Arc<RepoIndex>> {
        if let Some(cached) = self.index_cache.get(repo) {
            return Ok(cached.clone());
        }

        let path = self.repo_dir(repo)?.join(INDEX_FILE);
        let mut index: RepoIndex = match fs::read(&path).await {
            Ok(data) => {
                serde_json::from_slice(&data).map_err(|source| StorageError::IndexCorrupt {
                    repo: repo.to_string(),
                    source,
                })?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => RepoIndex::default(),
            Err(e) => return Err(e.into()),
        };

        let healed = self.self_heal(&mut index).await;
        if healed {
            self.persist_index_locked(repo, index.clone()).await?;
        } else {
            self.index_cache
                .insert(repo.to_string(), Arc::new(index.clone()));
        }
        Ok(Arc::new(index))
    }

    /// Backfill control fields for entries missing a description.
    /// Best-effort: individual failures are logged and skipped.
    async fn self_heal(&self, index: &mut RepoIndex) -> bool {
        let mut healed = false;
        for meta in index.packages.iter_mut() {
            if meta.control.description.is_some() {
                continue;
            }
            let Ok(dir) = self.package_dir(&meta.location()) else {
                continue;
            };
            match pository_deb::extract_control_fallback(&dir.join(PACKAGE_FILE)).await {
                Ok(summary) => {
                    meta.control.fill_missing_from(summary.fields);
                    if meta.control.description.is_some() {
                        healed = true;
                        if let Ok(data) = pretty_json(meta) {
                            let _ = write_atomic(&dir.join(METADATA_FILE), &data).await;
                        }
                    }
                }
                Err(e) => {
                    tracing::debug!(package = %meta.name, error = %e, "self-heal extraction failed");
                }
            }
        }
        healed
    }

    /// Write the index to disk, then update the cache. Callers must hold
    /// the repo mutex.
    async fn persist_index_locked(&self, repo: &str, index: RepoIndex) -> StorageResult<()> {
        let dir = self.repo_dir(repo)?;
        fs::create_dir_all(&dir).await?;
        write_atomic(&dir.join(INDEX_FILE), &pretty_json(&index)?).await?;
        self.index_cache.insert(repo.to_string(), Arc::new(index));
        self.events.emit(IndexChanged {
            repo: repo.to_string(),
        });
        Ok(())
    }

    /// Walk upward from a deleted package directory, removing each parent
    /// that has become empty, stopping at the data root.
    async fn prune_empty_parents(&self, dir: &Path) {
        let mut current = dir.parent();
        while let Some(candidate) = current {
            if candidate == self.data_root || !candidate.starts_with(&self.data_root) {
                break;
            }
            if fs::remove_dir(candidate).await.is_err() {
                break;
            }
            current = candidate.parent();
        }
    }
}

/// Reject components that could escape the data tree. Locations are
/// sanitized at construction; this guards direct string entry points.
fn safe_component(s: &str) -> StorageResult<&str> {
    if s.is_empty()
        || s == "."
        || s.contains("..")
        || s.contains('/')
        || s.contains('\\')
    {
        return Err(StorageError::UnsafePath(s.to_string()));
    }
    Ok(s)
}

/// Pretty-printed JSON for human inspection of on-disk state.
fn pretty_json<T: serde::Serialize>(value: &T) -> StorageResult<Vec<u8>> {
    let mut data = serde_json::to_vec_pretty(value)?;
    data.push(b'\n');
    Ok(data)
}

/// Write via a temporary sibling, fsync, then rename into place. The
/// temporary file is removed on failure so aborted writes leave nothing
/// behind.
async fn write_atomic(path: &Path, data: &[u8]) -> StorageResult<()> {
    let temp_suffix = format!(".tmp.{}", Uuid::new_v4());
    let temp_path = path.with_file_name(
        path.file_name()
            .map(|n| format!("{}{}", n.to_string_lossy(), temp_suffix))
            .unwrap_or_else(|| temp_suffix.clone()),
    );

    let result = async {
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(data).await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(&temp_path, path).await
    }
    .await;

    if result.is_err() {
        let _ = fs::remove_file(&temp_path).await;
    }
    result.map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_component_rejects_traversal() {
        assert!(safe_component("default").is_ok());
        assert!(safe_component("").is_err());
        assert!(safe_component(".").is_err());
        assert!(safe_component("..").is_err());
        assert!(safe_component("a/b").is_err());
        assert!(safe_component("a\\b").is_err());
    }

    #[tokio::test]
    async fn write_atomic_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("file.json");
        write_atomic(&target, b"{}").await.unwrap();
        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["file.json"]);
    }
}
