//! Cache configuration: partition versions, proxy, static manifest

use crate::error::{CacheError, Result};
use crate::partition::PartitionKind;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Proxy used when a direct audio fetch fails. The origin URL is appended verbatim.
pub const DEFAULT_PROXY_PREFIX: &str = "https://proxy.thisanimus.com/?url=";

/// Document served for offline navigations.
pub const DEFAULT_FALLBACK_DOCUMENT: &str = "/index.html";

/// Build identifiers for each partition kind.
///
/// Bumping a version renames the live partition; the previous one is removed
/// by the next activation sweep. `static` is always versioned, `images` and
/// `audio` are unversioned when their entry is `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VersionTable {
    pub static_version: String,
    pub image_version: Option<String>,
    pub audio_version: Option<String>,
}

impl Default for VersionTable {
    fn default() -> Self {
        Self {
            static_version: format!("v{}", env!("CARGO_PKG_VERSION")),
            image_version: None,
            audio_version: None,
        }
    }
}

impl VersionTable {
    pub fn new(static_version: impl Into<String>) -> Self {
        Self {
            static_version: static_version.into(),
            image_version: None,
            audio_version: None,
        }
    }

    /// Version every partition with the same identifier.
    pub fn uniform(version: impl Into<String>) -> Self {
        let version = version.into();
        Self {
            static_version: version.clone(),
            image_version: Some(version.clone()),
            audio_version: Some(version),
        }
    }

    pub fn with_image_version(mut self, version: impl Into<String>) -> Self {
        self.image_version = Some(version.into());
        self
    }

    pub fn with_audio_version(mut self, version: impl Into<String>) -> Self {
        self.audio_version = Some(version.into());
        self
    }

    pub fn version_of(&self, kind: PartitionKind) -> Option<&str> {
        match kind {
            PartitionKind::Static => Some(self.static_version.as_str()),
            PartitionKind::Image => self.image_version.as_deref(),
            PartitionKind::Audio => self.audio_version.as_deref(),
        }
    }

    /// Live partition name for `kind`.
    pub fn partition_name(&self, kind: PartitionKind) -> String {
        match self.version_of(kind) {
            Some(version) => format!("{}-{}", kind.base_name(), version),
            None => kind.base_name().to_string(),
        }
    }

    /// Names that survive the activation sweep.
    pub fn active_names(&self) -> HashSet<String> {
        PartitionKind::ALL
            .iter()
            .map(|kind| self.partition_name(*kind))
            .collect()
    }
}

/// Configuration for the offline cache worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub versions: VersionTable,

    /// Prefix prepended to an audio URL for the proxied retry
    pub proxy_prefix: String,

    /// Paths stored at install time and always routed to the static partition
    pub static_manifest: Vec<String>,

    /// Path (relative to the request origin) served for offline documents
    pub fallback_document: String,

    /// Directory under the host cache directory holding all partitions
    pub cache_directory: String,

    /// Capacity of the worker's inbound message queue
    pub queue_depth: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            versions: VersionTable::default(),
            proxy_prefix: DEFAULT_PROXY_PREFIX.to_string(),
            static_manifest: vec![
                DEFAULT_FALLBACK_DOCUMENT.to_string(),
                "/manifest.json".to_string(),
            ],
            fallback_document: DEFAULT_FALLBACK_DOCUMENT.to_string(),
            cache_directory: "offline".to_string(),
            queue_depth: 64,
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_versions(mut self, versions: VersionTable) -> Self {
        self.versions = versions;
        self
    }

    pub fn with_proxy_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.proxy_prefix = prefix.into();
        self
    }

    pub fn with_static_manifest<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.static_manifest = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_fallback_document(mut self, path: impl Into<String>) -> Self {
        self.fallback_document = path.into();
        self
    }

    pub fn with_cache_directory(mut self, dir: impl Into<String>) -> Self {
        self.cache_directory = dir.into();
        self
    }

    pub fn with_queue_depth(mut self, depth: usize) -> Self {
        self.queue_depth = depth;
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(CacheError::InvalidConfig(msg));

        if self.versions.static_version.trim().is_empty() {
            return invalid("static partition version cannot be empty".to_string());
        }

        for kind in PartitionKind::ALL {
            let name = self.versions.partition_name(kind);
            if name.contains(['/', '\\']) {
                return invalid(format!("partition name {} is not a single path segment", name));
            }
        }

        if self.proxy_prefix.is_empty() {
            return invalid("proxy_prefix cannot be empty".to_string());
        }

        if !self.fallback_document.starts_with('/') {
            return invalid("fallback_document must be an absolute path".to_string());
        }

        if let Some(path) = self.static_manifest.iter().find(|p| !p.starts_with('/')) {
            return invalid(format!("manifest entry {} must be an absolute path", path));
        }

        if self.cache_directory.trim().is_empty() {
            return invalid("cache_directory cannot be empty".to_string());
        }

        if self.queue_depth == 0 {
            return invalid("queue_depth must be at least 1".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_names() {
        let versions = VersionTable::new("v2").with_image_version("v1");

        assert_eq!(versions.partition_name(PartitionKind::Static), "static-v2");
        assert_eq!(versions.partition_name(PartitionKind::Image), "images-v1");
        assert_eq!(versions.partition_name(PartitionKind::Audio), "audio");

        let active = versions.active_names();
        assert_eq!(active.len(), 3);
        assert!(active.contains("audio"));
    }

    #[test]
    fn test_uniform_versions() {
        let versions = VersionTable::uniform("v0.001");
        assert_eq!(versions.partition_name(PartitionKind::Audio), "audio-v0.001");
        assert_eq!(versions.partition_name(PartitionKind::Image), "images-v0.001");
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = CacheConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.proxy_prefix, DEFAULT_PROXY_PREFIX);
        assert!(config
            .static_manifest
            .contains(&DEFAULT_FALLBACK_DOCUMENT.to_string()));
    }

    #[test]
    fn test_validation_errors() {
        let config = CacheConfig::default().with_queue_depth(0);
        assert!(matches!(
            config.validate(),
            Err(CacheError::InvalidConfig(_))
        ));

        let config = CacheConfig::default().with_static_manifest(["style.css"]);
        assert!(config.validate().is_err());

        let config = CacheConfig::default().with_versions(VersionTable::new("a/b"));
        assert!(config.validate().is_err());

        let config = CacheConfig::default().with_fallback_document("index.html");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserialize_partial_config() {
        let config: CacheConfig = serde_json::from_str(
            r#"{"versions": {"static_version": "v9", "audio_version": "v9"}, "queue_depth": 8}"#,
        )
        .unwrap();

        assert_eq!(config.versions.partition_name(PartitionKind::Audio), "audio-v9");
        assert_eq!(config.queue_depth, 8);
        assert_eq!(config.fallback_document, DEFAULT_FALLBACK_DOCUMENT);
    }
}
