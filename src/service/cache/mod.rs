use std::collections::BTreeMap;
use std::path::PathBuf;

use snafu::{Location, ResultExt, Snafu};
use tokio::sync::Mutex;
use tracing::instrument;

use crate::model::{FileId, ScriptData};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CacheError {
    #[snafu(display("could not create the cache directory `{}`", path.display()))]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("could not write the cache file `{}`", path.display()))]
    Write {
        path: PathBuf,
        source: std::io::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("could not serialize the cached scripts"))]
    Serialize {
        source: serde_json::Error,
        #[snafu(implicit)]
        location: Location,
    },
}

/// A local mirror of `{file id -> script}` kept in a single JSON file.
///
/// The server copy wins on conflict, this only serves as a read-through cache and for crash recovery.
#[derive(Debug)]
pub struct LocalCache {
    path: PathBuf,
    entries: Mutex<BTreeMap<FileId, ScriptData>>,
}

impl LocalCache {
    /// Reads the cache file at `path`. A missing or unreadable file starts an empty cache.
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match tokio::fs::read_to_string(&path).await {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|error| {
                tracing::warn!(path = %path.display(), %error, "discarding unreadable script cache");
                BTreeMap::new()
            }),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(error) => {
                tracing::warn!(path = %path.display(), %error, "could not read the script cache");
                BTreeMap::new()
            }
        };

        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    pub async fn get(&self, file_id: FileId) -> Option<ScriptData> {
        self.entries.lock().await.get(&file_id).cloned()
    }

    #[instrument(skip(self, data))]
    pub async fn put(&self, file_id: FileId, data: ScriptData) -> Result<(), CacheError> {
        let mut entries = self.entries.lock().await;
        entries.insert(file_id, data);
        self.persist(&entries).await
    }

    /// Writes to a sibling temp file first so a crash never leaves a truncated cache behind.
    async fn persist(&self, entries: &BTreeMap<FileId, ScriptData>) -> Result<(), CacheError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .context(CreateDirSnafu { path: parent })?;
        }

        let json = serde_json::to_vec_pretty(entries).context(SerializeSnafu)?;
        let tmp_path = self.path.with_extension("tmp");

        tokio::fs::write(&tmp_path, json)
            .await
            .context(WriteSnafu { path: &tmp_path })?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .context(WriteSnafu { path: &self.path })?;

        tracing::debug!(path = %self.path.display(), entries = entries.len(), "script cache written");

        Ok(())
    }
}
