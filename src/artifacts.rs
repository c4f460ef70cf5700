// Artifact registry: opaque references, containment, and lifecycle
//
// Callers never see filesystem paths. Each produced file gets a generated
// token, and resolution only succeeds for tokens whose stored path still
// lies inside the staging root.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::downloader::{Artifact, FetchError};

/// One registered artifact, tracked for eviction decisions.
#[derive(Debug, Clone)]
struct ArtifactEntry {
    path: PathBuf,
    size: u64,
    created_at: Instant,
}

/// Maps opaque tokens to staged files and enforces the disk budget.
pub struct ArtifactStore {
    root: PathBuf,
    ttl: Duration,
    size_budget: u64,
    entries: RwLock<HashMap<String, ArtifactEntry>>,
}

impl ArtifactStore {
    pub fn new(root: PathBuf, ttl: Duration, size_budget: u64) -> Self {
        Self {
            root,
            ttl,
            size_budget,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Issue a token for a freshly produced artifact and enforce the size
    /// budget while holding the table lock.
    pub async fn register(&self, artifact: &Artifact) -> Result<String, FetchError> {
        let size = tokio::fs::metadata(&artifact.path)
            .await
            .map_err(|e| FetchError::Download(format!("artifact not readable: {e}")))?
            .len();

        let token = Uuid::new_v4().to_string();
        let victims = {
            let mut entries = self.entries.write().await;
            entries.insert(
                token.clone(),
                ArtifactEntry {
                    path: artifact.path.clone(),
                    size,
                    created_at: Instant::now(),
                },
            );
            Self::collect_victims(&mut entries, self.ttl, self.size_budget)
        };
        self.delete_victims(victims).await;

        Ok(token)
    }

    /// Resolve a token back to a servable path. Unknown tokens, paths that
    /// escaped the staging root, and vanished files all read as not-found;
    /// the caller learns nothing about the filesystem layout.
    pub async fn resolve(&self, reference: &str) -> Result<PathBuf, FetchError> {
        let path = {
            let entries = self.entries.read().await;
            entries
                .get(reference)
                .map(|e| e.path.clone())
                .ok_or_else(|| FetchError::NotFound("unknown artifact reference".to_string()))?
        };

        if !Self::is_contained(&self.root, &path) {
            warn!(reference, path = %path.display(), "artifact path escaped staging root");
            return Err(FetchError::NotFound("unknown artifact reference".to_string()));
        }
        if tokio::fs::metadata(&path).await.is_err() {
            return Err(FetchError::NotFound("artifact no longer exists".to_string()));
        }
        Ok(path)
    }

    /// Drop expired and over-budget entries and delete their files.
    /// Returns the number of artifacts removed.
    pub async fn evict(&self) -> usize {
        let victims = {
            let mut entries = self.entries.write().await;
            Self::collect_victims(&mut entries, self.ttl, self.size_budget)
        };
        let count = victims.len();
        self.delete_victims(victims).await;
        count
    }

    /// Periodic sweep so TTLs are honored even when no downloads arrive.
    pub async fn sweep_loop(self: Arc<Self>, interval: Duration) {
        loop {
            tokio::time::sleep(interval).await;
            let removed = self.evict().await;
            if removed > 0 {
                debug!(removed, "swept expired artifacts");
            }
        }
    }

    fn collect_victims(
        entries: &mut HashMap<String, ArtifactEntry>,
        ttl: Duration,
        size_budget: u64,
    ) -> Vec<ArtifactEntry> {
        let now = Instant::now();
        let mut victims = Vec::new();

        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, e)| now.duration_since(e.created_at) > ttl)
            .map(|(k, _)| k.clone())
            .collect();
        for key in expired {
            if let Some(entry) = entries.remove(&key) {
                victims.push(entry);
            }
        }

        // Over budget: shed oldest first. The newest entry is kept so a
        // download link handed out moments ago stays resolvable.
        let mut total: u64 = entries.values().map(|e| e.size).sum();
        while total > size_budget && entries.len() > 1 {
            let oldest = entries
                .iter()
                .min_by_key(|(_, e)| e.created_at)
                .map(|(k, _)| k.clone());
            match oldest {
                Some(key) => {
                    if let Some(entry) = entries.remove(&key) {
                        total = total.saturating_sub(entry.size);
                        victims.push(entry);
                    }
                }
                None => break,
            }
        }

        victims
    }

    async fn delete_victims(&self, victims: Vec<ArtifactEntry>) {
        for entry in victims {
            if !Self::is_contained(&self.root, &entry.path) {
                continue;
            }
            // Artifacts live in per-request directories; remove the whole
            // directory so intermediates from failed muxes go with it.
            let target = match entry.path.parent() {
                Some(parent) if parent != self.root && parent.starts_with(&self.root) => {
                    parent.to_path_buf()
                }
                _ => entry.path.clone(),
            };
            debug!(target = %target.display(), "evicting artifact");
            let result = if target.is_dir() {
                tokio::fs::remove_dir_all(&target).await
            } else {
                tokio::fs::remove_file(&target).await
            };
            if let Err(e) = result {
                warn!(target = %target.display(), error = %e, "failed to delete evicted artifact");
            }
        }
    }

    fn is_contained(root: &Path, path: &Path) -> bool {
        path.starts_with(root)
            && !path
                .components()
                .any(|c| matches!(c, Component::ParentDir))
    }

    #[cfg(test)]
    async fn insert_raw(&self, token: &str, path: PathBuf) {
        self.entries.write().await.insert(
            token.to_string(),
            ArtifactEntry {
                path,
                size: 0,
                created_at: Instant::now(),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn staged_artifact(root: &Path, name: &str, bytes: &[u8]) -> Artifact {
        let dir = root.join(Uuid::new_v4().to_string());
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let path = dir.join(name);
        tokio::fs::write(&path, bytes).await.unwrap();
        Artifact {
            path,
            has_embedded_audio: true,
        }
    }

    fn store(root: &Path, ttl: Duration, budget: u64) -> ArtifactStore {
        ArtifactStore::new(root.to_path_buf(), ttl, budget)
    }

    #[tokio::test]
    async fn register_then_resolve_roundtrip() {
        let root = tempfile::tempdir().unwrap();
        let store = store(root.path(), Duration::from_secs(60), u64::MAX);
        let artifact = staged_artifact(root.path(), "output.mp4", b"bytes").await;

        let token = store.register(&artifact).await.unwrap();
        let resolved = store.resolve(&token).await.unwrap();
        assert_eq!(resolved, artifact.path);
    }

    #[tokio::test]
    async fn unknown_reference_is_not_found() {
        let root = tempfile::tempdir().unwrap();
        let store = store(root.path(), Duration::from_secs(60), u64::MAX);

        let err = store.resolve("no-such-token").await.unwrap_err();
        assert!(matches!(err, FetchError::NotFound(_)));
    }

    #[tokio::test]
    async fn literal_paths_are_not_references() {
        let root = tempfile::tempdir().unwrap();
        let store = store(root.path(), Duration::from_secs(60), u64::MAX);

        // A raw path is just an unknown token, even if the file exists.
        let err = store.resolve("/etc/passwd").await.unwrap_err();
        assert!(matches!(err, FetchError::NotFound(_)));
    }

    #[tokio::test]
    async fn entries_outside_the_root_never_resolve() {
        let root = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        let escaped = outside.path().join("secret.txt");
        tokio::fs::write(&escaped, b"secret").await.unwrap();

        let store = store(root.path(), Duration::from_secs(60), u64::MAX);
        store.insert_raw("tampered", escaped).await;

        let err = store.resolve("tampered").await.unwrap_err();
        assert!(matches!(err, FetchError::NotFound(_)));
    }

    #[tokio::test]
    async fn vanished_files_read_as_not_found() {
        let root = tempfile::tempdir().unwrap();
        let store = store(root.path(), Duration::from_secs(60), u64::MAX);
        let artifact = staged_artifact(root.path(), "output.mp4", b"bytes").await;

        let token = store.register(&artifact).await.unwrap();
        tokio::fs::remove_file(&artifact.path).await.unwrap();

        let err = store.resolve(&token).await.unwrap_err();
        assert!(matches!(err, FetchError::NotFound(_)));
    }

    #[tokio::test]
    async fn expired_artifacts_are_swept_with_their_directories() {
        let root = tempfile::tempdir().unwrap();
        let store = store(root.path(), Duration::ZERO, u64::MAX);
        let artifact = staged_artifact(root.path(), "output.mp4", b"bytes").await;
        let request_dir = artifact.path.parent().unwrap().to_path_buf();

        let token = store.register(&artifact).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(store.evict().await >= 1);

        assert!(!request_dir.exists());
        let err = store.resolve(&token).await.unwrap_err();
        assert!(matches!(err, FetchError::NotFound(_)));
    }

    #[tokio::test]
    async fn size_budget_sheds_oldest_but_keeps_newest() {
        let root = tempfile::tempdir().unwrap();
        let store = store(root.path(), Duration::from_secs(3600), 10);
        let old = staged_artifact(root.path(), "output.mp4", &[0u8; 8]).await;
        let old_token = store.register(&old).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        let new = staged_artifact(root.path(), "output.mp4", &[0u8; 8]).await;
        let new_token = store.register(&new).await.unwrap();

        assert!(store.resolve(&old_token).await.is_err());
        assert!(store.resolve(&new_token).await.is_ok());
        assert!(!old.path.exists());
        assert!(new.path.exists());
    }
}
