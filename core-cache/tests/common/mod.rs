//! Shared fixtures for core-cache integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse, RetryPolicy};
use bridge_traits::network::{NetworkInfo, NetworkMonitor};
use bridge_traits::storage::{FileMetadata, FileSystemAccess};
use bytes::Bytes;
use core_cache::{
    AudioCacheController, CacheClient, CacheStore, CacheWorker, RequestInterceptor,
    StaticManifest, VersionTable,
};
use mockall::mock;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub const PROXY: &str = "https://proxy.test/?url=";

mock! {
    pub Http {}

    #[async_trait]
    impl HttpClient for Http {
        async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
        async fn execute_with_retry(&self, request: HttpRequest, policy: RetryPolicy) -> BridgeResult<HttpResponse>;
        async fn is_connected(&self) -> bool;
    }
}

mock! {
    pub Monitor {}

    #[async_trait]
    impl NetworkMonitor for Monitor {
        async fn get_network_info(&self) -> BridgeResult<NetworkInfo>;
        async fn is_connected(&self) -> bool;
        async fn is_metered(&self) -> bool;
    }
}

#[derive(Debug, Clone)]
enum Node {
    Dir,
    File(Bytes),
}

/// In-memory `FileSystemAccess` with the same NotFound contract as the
/// desktop implementation.
#[derive(Default)]
pub struct MemoryFileSystem {
    nodes: Mutex<BTreeMap<PathBuf, Node>>,
    undeletable: Mutex<HashSet<PathBuf>>,
    unwritable_suffix: Mutex<Option<String>>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `delete_dir_all(path)` fail with an I/O error.
    pub fn fail_deletes_of(&self, path: impl Into<PathBuf>) {
        self.undeletable.lock().unwrap().insert(path.into());
    }

    /// Make `write_file` fail for every path whose name ends with `suffix`.
    pub fn fail_writes_ending_with(&self, suffix: &str) {
        *self.unwritable_suffix.lock().unwrap() = Some(suffix.to_string());
    }

    /// Drop every file under `dir` whose name ends with `suffix`.
    pub fn remove_files_ending_with(&self, dir: &Path, suffix: &str) -> usize {
        let mut nodes = self.nodes.lock().unwrap();
        let doomed: Vec<PathBuf> = nodes
            .iter()
            .filter(|(path, node)| {
                path.starts_with(dir)
                    && matches!(node, Node::File(_))
                    && path.to_string_lossy().ends_with(suffix)
            })
            .map(|(path, _)| path.clone())
            .collect();
        for path in &doomed {
            nodes.remove(path);
        }
        doomed.len()
    }

    pub fn file_count_under(&self, dir: &Path) -> usize {
        self.nodes
            .lock()
            .unwrap()
            .iter()
            .filter(|(path, node)| path.starts_with(dir) && matches!(node, Node::File(_)))
            .count()
    }

    fn not_found(path: &Path) -> BridgeError {
        BridgeError::NotFound(path.display().to_string())
    }
}

#[async_trait]
impl FileSystemAccess for MemoryFileSystem {
    async fn get_cache_directory(&self) -> BridgeResult<PathBuf> {
        Ok(PathBuf::from("/mem/cache"))
    }

    async fn get_data_directory(&self) -> BridgeResult<PathBuf> {
        Ok(PathBuf::from("/mem/data"))
    }

    async fn exists(&self, path: &Path) -> BridgeResult<bool> {
        Ok(self.nodes.lock().unwrap().contains_key(path))
    }

    async fn metadata(&self, path: &Path) -> BridgeResult<FileMetadata> {
        match self.nodes.lock().unwrap().get(path) {
            Some(Node::Dir) => Ok(FileMetadata {
                size: 0,
                created_at: None,
                modified_at: None,
                is_directory: true,
            }),
            Some(Node::File(data)) => Ok(FileMetadata {
                size: data.len() as u64,
                created_at: None,
                modified_at: None,
                is_directory: false,
            }),
            None => Err(Self::not_found(path)),
        }
    }

    async fn create_dir_all(&self, path: &Path) -> BridgeResult<()> {
        let mut nodes = self.nodes.lock().unwrap();
        for ancestor in path.ancestors() {
            if ancestor.as_os_str().is_empty() {
                continue;
            }
            nodes.entry(ancestor.to_path_buf()).or_insert(Node::Dir);
        }
        Ok(())
    }

    async fn read_file(&self, path: &Path) -> BridgeResult<Bytes> {
        match self.nodes.lock().unwrap().get(path) {
            Some(Node::File(data)) => Ok(data.clone()),
            _ => Err(Self::not_found(path)),
        }
    }

    async fn write_file(&self, path: &Path, data: Bytes) -> BridgeResult<()> {
        if let Some(suffix) = self.unwritable_suffix.lock().unwrap().as_deref() {
            if path.to_string_lossy().ends_with(suffix) {
                return Err(BridgeError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "no space left on device",
                )));
            }
        }

        let mut nodes = self.nodes.lock().unwrap();
        let parent_is_dir = path
            .parent()
            .is_some_and(|parent| matches!(nodes.get(parent), Some(Node::Dir)));
        if !parent_is_dir {
            return Err(Self::not_found(path));
        }
        nodes.insert(path.to_path_buf(), Node::File(data));
        Ok(())
    }

    async fn delete_file(&self, path: &Path) -> BridgeResult<()> {
        let mut nodes = self.nodes.lock().unwrap();
        match nodes.get(path) {
            Some(Node::File(_)) => {
                nodes.remove(path);
                Ok(())
            }
            _ => Err(Self::not_found(path)),
        }
    }

    async fn delete_dir_all(&self, path: &Path) -> BridgeResult<()> {
        if self.undeletable.lock().unwrap().contains(path) {
            return Err(BridgeError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "permission denied",
            )));
        }

        let mut nodes = self.nodes.lock().unwrap();
        if !matches!(nodes.get(path), Some(Node::Dir)) {
            return Err(Self::not_found(path));
        }
        nodes.retain(|candidate, _| !candidate.starts_with(path));
        Ok(())
    }

    async fn list_directory(&self, path: &Path) -> BridgeResult<Vec<PathBuf>> {
        let nodes = self.nodes.lock().unwrap();
        if !matches!(nodes.get(path), Some(Node::Dir)) {
            return Err(Self::not_found(path));
        }
        Ok(nodes
            .keys()
            .filter(|candidate| candidate.parent() == Some(path))
            .cloned()
            .collect())
    }
}

pub fn root() -> PathBuf {
    PathBuf::from("/mem/cache/offline")
}

pub fn store_with(fs: Arc<MemoryFileSystem>, versions: VersionTable) -> Arc<CacheStore> {
    Arc::new(CacheStore::new(fs, root(), versions))
}

pub fn store(fs: Arc<MemoryFileSystem>) -> Arc<CacheStore> {
    store_with(fs, VersionTable::new("v1"))
}

pub fn audio_body(len: usize) -> Bytes {
    Bytes::from((0..len).map(|i| (i % 256) as u8).collect::<Vec<u8>>())
}

pub fn ok_audio(len: usize) -> HttpResponse {
    HttpResponse::new(200, audio_body(len))
        .with_header("Content-Type", "audio/mpeg")
        .with_header("Content-Length", len.to_string())
}

pub fn manifest() -> StaticManifest {
    StaticManifest::new(["/index.html", "/assets/css/style.css"])
}

/// Worker over `store` with `http`, plus a client bound to it.
pub fn spawn_worker(store: Arc<CacheStore>, http: Arc<dyn HttpClient>) -> CacheClient {
    let controller = Arc::new(AudioCacheController::new(
        Arc::clone(&store),
        Arc::clone(&http),
        PROXY,
    ));
    let interceptor = Arc::new(RequestInterceptor::new(store, http, manifest(), "/index.html"));
    let (worker, handle) = CacheWorker::new(controller, interceptor, 16);
    worker.spawn();
    CacheClient::new(handle)
}
