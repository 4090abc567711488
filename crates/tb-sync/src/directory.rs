//! Backup to a directory kept in sync by another tool.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{SyncError, SyncProvider};

/// File name of the backup inside the sync directory.
pub const BACKUP_FILE_NAME: &str = "timebank-backup.json";

const DEFAULT_NAME: &str = "directory";

/// Provider writing one JSON file into a directory.
///
/// The file's modification time dates the backup. The provider counts as
/// signed in while the directory exists.
#[derive(Debug, Clone)]
pub struct DirectorySyncProvider {
    name: String,
    dir: PathBuf,
}

impl DirectorySyncProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            dir: dir.into(),
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn backup_path(&self) -> PathBuf {
        self.dir.join(BACKUP_FILE_NAME)
    }
}

async fn read_optional(path: &Path) -> Result<Option<String>, SyncError> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(Some(content)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

#[async_trait]
impl SyncProvider for DirectorySyncProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn is_authenticated(&self) -> bool {
        tokio::fs::metadata(&self.dir)
            .await
            .is_ok_and(|meta| meta.is_dir())
    }

    async fn download(&self) -> Result<Option<String>, SyncError> {
        let content = read_optional(&self.backup_path()).await?;
        Ok(content.filter(|c| !c.trim().is_empty()))
    }

    async fn upload(&self, json: &str) -> Result<(), SyncError> {
        let path = self.backup_path();
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &path).await?;
        tracing::debug!(path = %path.display(), bytes = json.len(), "backup file written");
        Ok(())
    }

    async fn last_modified(&self) -> Result<Option<DateTime<Utc>>, SyncError> {
        match tokio::fs::metadata(self.backup_path()).await {
            Ok(meta) => Ok(Some(DateTime::<Utc>::from(meta.modified()?))),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}
