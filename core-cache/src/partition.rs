//! # Cache Partition Manager
//!
//! Named, durable key → response stores, one per resource class.
//!
//! ## Layout
//!
//! ```text
//! <host cache dir>/<cache_directory>/
//!   static-v2/
//!     <sha256(key)>.body
//!     <sha256(key)>.meta.json
//!   images/
//!   audio/
//! ```
//!
//! The metadata sidecar is written after the body and removed before it, so
//! an entry is visible only once its body is complete. Replacing an entry
//! removes the old sidecar first; a reader sees a miss until the new one
//! lands, never old metadata over a half-written body.
//!
//! Keys are absolute URLs in their parsed, serialized form (see
//! [`Partition::key_for`]), the same form the interceptor looks up.
//!
//! ## Versioning
//!
//! A partition belongs to a kind when its name equals the kind's base name
//! or starts with `<base>-`. [`CacheStore::activate`] deletes every owned
//! partition that is not live under the current [`VersionTable`]; names of
//! unknown kinds are never touched.

use crate::config::VersionTable;
use crate::error::{CacheError, Result};
use crate::stored::{EntryMeta, StoredResponse};
use bridge_traits::error::BridgeError;
use bridge_traits::storage::FileSystemAccess;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use url::Url;

const BODY_SUFFIX: &str = ".body";
const META_SUFFIX: &str = ".meta.json";

/// Resource class served by a partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartitionKind {
    Static,
    Image,
    Audio,
}

impl PartitionKind {
    pub const ALL: [PartitionKind; 3] = [
        PartitionKind::Static,
        PartitionKind::Image,
        PartitionKind::Audio,
    ];

    pub fn base_name(&self) -> &'static str {
        match self {
            PartitionKind::Static => "static",
            PartitionKind::Image => "images",
            PartitionKind::Audio => "audio",
        }
    }

    /// Kind owning a partition name, if any.
    pub fn owning(name: &str) -> Option<PartitionKind> {
        PartitionKind::ALL.into_iter().find(|kind| {
            let base = kind.base_name();
            name == base
                || name
                    .strip_prefix(base)
                    .is_some_and(|rest| rest.starts_with('-'))
        })
    }
}

impl fmt::Display for PartitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.base_name())
    }
}

/// Outcome of a stale-partition sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub deleted: Vec<String>,
    pub failed: Vec<String>,
    pub kept: Vec<String>,
}

/// Owner of every partition under one root directory.
pub struct CacheStore {
    fs: Arc<dyn FileSystemAccess>,
    root: PathBuf,
    versions: VersionTable,
}

impl CacheStore {
    pub fn new(fs: Arc<dyn FileSystemAccess>, root: impl Into<PathBuf>, versions: VersionTable) -> Self {
        Self {
            fs,
            root: root.into(),
            versions,
        }
    }

    /// Store rooted at `<host cache dir>/<directory>`.
    pub async fn in_cache_directory(
        fs: Arc<dyn FileSystemAccess>,
        directory: &str,
        versions: VersionTable,
    ) -> Result<Self> {
        let root = fs.get_cache_directory().await?.join(directory);
        fs.create_dir_all(&root).await?;
        Ok(Self::new(fs, root, versions))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn versions(&self) -> &VersionTable {
        &self.versions
    }

    /// Live partition name for `kind`.
    pub fn name_of(&self, kind: PartitionKind) -> String {
        self.versions.partition_name(kind)
    }

    /// Open (creating if needed) the live partition for `kind`.
    pub async fn open(&self, kind: PartitionKind) -> Result<Partition> {
        let name = self.name_of(kind);
        let dir = self.root.join(&name);
        self.fs.create_dir_all(&dir).await?;

        Ok(Partition {
            name,
            kind,
            dir,
            fs: Arc::clone(&self.fs),
        })
    }

    /// Names of every partition currently on disk, sorted.
    pub async fn partition_names(&self) -> Result<Vec<String>> {
        let entries = match self.fs.list_directory(&self.root).await {
            Ok(entries) => entries,
            Err(BridgeError::NotFound(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        for path in entries {
            if !self.fs.metadata(&path).await?.is_directory {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                names.push(name.to_string());
            }
        }

        names.sort();
        Ok(names)
    }

    /// Delete every owned partition whose name is not in `active`.
    ///
    /// Best effort: a partition that fails to delete is logged and reported
    /// in [`SweepReport::failed`]; the sweep carries on.
    #[instrument(skip(self, active), fields(root = %self.root.display()))]
    pub async fn sweep(&self, active: &HashSet<String>) -> Result<SweepReport> {
        let mut report = SweepReport::default();

        for name in self.partition_names().await? {
            if active.contains(&name) || PartitionKind::owning(&name).is_none() {
                report.kept.push(name);
                continue;
            }

            match self.fs.delete_dir_all(&self.root.join(&name)).await {
                Ok(()) | Err(BridgeError::NotFound(_)) => {
                    debug!(partition = %name, "Deleted stale partition");
                    report.deleted.push(name);
                }
                Err(e) => {
                    warn!(partition = %name, error = %e, "Failed to delete stale partition");
                    report.failed.push(name);
                }
            }
        }

        info!(
            deleted = report.deleted.len(),
            failed = report.failed.len(),
            kept = report.kept.len(),
            "Partition sweep finished"
        );
        Ok(report)
    }

    /// Sweep everything that is not live under the current version table.
    ///
    /// Must run before any partition is opened for the session.
    pub async fn activate(&self) -> Result<SweepReport> {
        self.sweep(&self.versions.active_names()).await
    }

    /// Remove a whole partition by name. Returns whether it existed.
    #[instrument(skip(self))]
    pub async fn delete_partition(&self, name: &str) -> Result<bool> {
        if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
            return Err(CacheError::InvalidPartitionName(name.to_string()));
        }

        let dir = self.root.join(name);
        if !self.fs.exists(&dir).await? {
            return Ok(false);
        }

        match self.fs.delete_dir_all(&dir).await {
            Ok(()) => Ok(true),
            Err(BridgeError::NotFound(_)) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// Handle to one live partition.
#[derive(Clone)]
pub struct Partition {
    name: String,
    kind: PartitionKind,
    dir: PathBuf,
    fs: Arc<dyn FileSystemAccess>,
}

impl fmt::Debug for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Partition")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("dir", &self.dir)
            .finish()
    }
}

impl Partition {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> PartitionKind {
        self.kind
    }

    /// Normalized key for `url`.
    ///
    /// `https://CDN.example.com/My Episode.mp3` and
    /// `https://cdn.example.com/My%20Episode.mp3` map to the same key.
    pub fn key_for(url: &str) -> Result<String> {
        Url::parse(url)
            .map(|parsed| parsed.as_str().to_string())
            .map_err(|e| CacheError::InvalidUrl {
                url: url.to_string(),
                message: e.to_string(),
            })
    }

    fn stem(key: &str) -> String {
        hex::encode(Sha256::digest(key.as_bytes()))
    }

    fn body_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}{}", Self::stem(key), BODY_SUFFIX))
    }

    fn meta_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}{}", Self::stem(key), META_SUFFIX))
    }

    async fn read_meta(&self, path: &Path, key: &str) -> Result<Option<EntryMeta>> {
        let raw = match self.fs.read_file(path).await {
            Ok(raw) => raw,
            Err(BridgeError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        serde_json::from_slice(&raw)
            .map(Some)
            .map_err(|e| CacheError::CorruptEntry {
                key: key.to_string(),
                message: e.to_string(),
            })
    }

    /// Look up the entry stored under `key`.
    pub async fn match_key(&self, key: &str) -> Result<Option<StoredResponse>> {
        let Some(meta) = self.read_meta(&self.meta_path(key), key).await? else {
            return Ok(None);
        };
        if meta.key != key {
            return Ok(None);
        }

        match self.fs.read_file(&self.body_path(key)).await {
            Ok(body) => Ok(Some(meta.into_stored(body))),
            Err(BridgeError::NotFound(_)) => {
                warn!(partition = %self.name, "Entry metadata without body");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Store `response` under `key`, replacing any previous entry.
    pub async fn put(&self, key: &str, response: &StoredResponse) -> Result<()> {
        let meta = serde_json::to_vec(&response.meta(key)).map_err(|e| CacheError::CorruptEntry {
            key: key.to_string(),
            message: e.to_string(),
        })?;

        self.fs.create_dir_all(&self.dir).await?;
        match self.fs.delete_file(&self.meta_path(key)).await {
            Ok(()) | Err(BridgeError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }
        self.fs
            .write_file(&self.body_path(key), response.body.clone())
            .await?;
        self.fs
            .write_file(&self.meta_path(key), Bytes::from(meta))
            .await?;

        debug!(partition = %self.name, bytes = response.len(), "Stored entry");
        Ok(())
    }

    /// Remove the entry under `key`. Returns whether one existed.
    pub async fn delete(&self, key: &str) -> Result<bool> {
        let existed = match self.fs.delete_file(&self.meta_path(key)).await {
            Ok(()) => true,
            Err(BridgeError::NotFound(_)) => false,
            Err(e) => return Err(e.into()),
        };

        match self.fs.delete_file(&self.body_path(key)).await {
            Ok(()) | Err(BridgeError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }

        Ok(existed)
    }

    /// Same visibility rule as [`Partition::match_key`], without reading the body.
    pub async fn contains(&self, key: &str) -> Result<bool> {
        match self.read_meta(&self.meta_path(key), key).await? {
            Some(meta) if meta.key == key => Ok(self.fs.exists(&self.body_path(key)).await?),
            _ => Ok(false),
        }
    }

    async fn meta_files(&self) -> Result<Vec<PathBuf>> {
        let entries = match self.fs.list_directory(&self.dir).await {
            Ok(entries) => entries,
            Err(BridgeError::NotFound(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        Ok(entries
            .into_iter()
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.ends_with(META_SUFFIX))
            })
            .collect())
    }

    /// Keys of every entry, oldest first.
    pub async fn keys(&self) -> Result<Vec<String>> {
        let mut metas = Vec::new();
        for path in self.meta_files().await? {
            let label = path.display().to_string();
            if let Some(meta) = self.read_meta(&path, &label).await? {
                metas.push(meta);
            }
        }

        metas.sort_by(|a, b| a.stored_at.cmp(&b.stored_at).then_with(|| a.key.cmp(&b.key)));
        Ok(metas.into_iter().map(|meta| meta.key).collect())
    }

    pub async fn len(&self) -> Result<usize> {
        Ok(self.meta_files().await?.len())
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owning_kind() {
        assert_eq!(PartitionKind::owning("static-v1"), Some(PartitionKind::Static));
        assert_eq!(PartitionKind::owning("images"), Some(PartitionKind::Image));
        assert_eq!(PartitionKind::owning("audio-v0.001"), Some(PartitionKind::Audio));
        assert_eq!(PartitionKind::owning("audiobooks"), None);
        assert_eq!(PartitionKind::owning("image-proxy-cache-v1"), None);
        assert_eq!(PartitionKind::owning("static"), Some(PartitionKind::Static));
    }

    #[test]
    fn test_key_for_normalizes() {
        assert_eq!(
            Partition::key_for("https://CDN.example.com:443/My Episode.mp3").unwrap(),
            "https://cdn.example.com/My%20Episode.mp3"
        );
        assert_eq!(
            Partition::key_for("https://cdn.example.com").unwrap(),
            "https://cdn.example.com/"
        );
        assert!(matches!(
            Partition::key_for("not a url"),
            Err(CacheError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_stem_is_stable_hex() {
        let stem = Partition::stem("https://cdn.example.com/ep1.mp3");
        assert_eq!(stem.len(), 64);
        assert_eq!(stem, Partition::stem("https://cdn.example.com/ep1.mp3"));
        assert_ne!(stem, Partition::stem("https://cdn.example.com/ep2.mp3"));
    }
}
