use std::path::PathBuf;

/// Collects every temp path created during one request and deletes them all
/// once the response is ready, on every exit path.
///
/// Deletion failures are logged, never raised, and never stop the remaining
/// deletions. Draining the list makes a second call a no-op, so cleanup runs
/// effectively once per request.
#[derive(Debug, Default)]
pub struct TempFileTracker {
    paths: Vec<PathBuf>,
}

impl TempFileTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, path: PathBuf) {
        self.paths.push(path);
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub async fn cleanup(&mut self) {
        for path in self.paths.drain(..) {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => tracing::debug!("Removed temp file {:?}", path),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!("Failed to remove temp file {:?}: {}", path, e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cleanup_removes_all_registered_paths() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.png");
        let b = dir.path().join("b.pdf");
        tokio::fs::write(&a, b"a").await.unwrap();
        tokio::fs::write(&b, b"b").await.unwrap();

        let mut tracker = TempFileTracker::new();
        tracker.register(a.clone());
        tracker.register(b.clone());
        tracker.cleanup().await;

        assert!(!a.exists());
        assert!(!b.exists());
        assert!(tracker.is_empty());
    }

    #[tokio::test]
    async fn test_cleanup_tolerates_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let existing = dir.path().join("real.png");
        tokio::fs::write(&existing, b"x").await.unwrap();

        let mut tracker = TempFileTracker::new();
        tracker.register(dir.path().join("never-created.png"));
        tracker.register(existing.clone());
        tracker.cleanup().await;

        // the missing entry must not stop the rest
        assert!(!existing.exists());
    }

    #[tokio::test]
    async fn test_cleanup_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("once.png");
        tokio::fs::write(&path, b"x").await.unwrap();

        let mut tracker = TempFileTracker::new();
        tracker.register(path);
        tracker.cleanup().await;
        tracker.cleanup().await;
        assert_eq!(tracker.len(), 0);
    }
}
