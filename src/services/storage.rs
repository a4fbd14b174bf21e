use anyhow::Result;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

/// Local-disk temp storage for per-request artifacts.
///
/// Every path is unique, randomized and timestamped, so concurrent requests
/// never touch each other's files and no locking is needed.
pub struct TempStorage {
    upload_dir: PathBuf,
}

impl TempStorage {
    pub fn new(upload_dir: PathBuf) -> Self {
        Self { upload_dir }
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    pub async fn ensure_dir(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.upload_dir).await?;
        Ok(())
    }

    fn unique_name(&self, label: &str) -> PathBuf {
        let name = format!(
            "{}_{}_{}",
            Utc::now().format("%Y%m%d%H%M%S%3f"),
            Uuid::new_v4(),
            label
        );
        self.upload_dir.join(name)
    }

    /// Persists one uploaded file under a fresh temp name.
    pub async fn store_upload(&self, sanitized_filename: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.unique_name(sanitized_filename);
        tokio::fs::write(&path, bytes).await?;
        Ok(path)
    }

    /// Reserves a fresh path for the generated output document.
    pub fn output_path(&self, extension: &str) -> PathBuf {
        self.unique_name(&format!("output.{}", extension))
    }

    pub async fn delete_file(&self, path: &Path) -> Result<()> {
        tokio::fs::remove_file(path).await?;
        Ok(())
    }

    /// Removes files older than `max_age` left behind by crashed requests.
    /// Returns the number of files removed.
    pub async fn sweep_stale(&self, max_age: Duration) -> Result<usize> {
        let mut removed = 0;
        let mut entries = tokio::fs::read_dir(&self.upload_dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let metadata = match entry.metadata().await {
                Ok(m) if m.is_file() => m,
                _ => continue,
            };

            let age = metadata
                .modified()
                .ok()
                .and_then(|modified| modified.elapsed().ok());

            if age.is_some_and(|age| age > max_age) {
                match tokio::fs::remove_file(entry.path()).await {
                    Ok(()) => removed += 1,
                    Err(e) => {
                        tracing::warn!("Failed to remove stale file {:?}: {}", entry.path(), e);
                    }
                }
            }
        }

        Ok(removed)
    }
}
