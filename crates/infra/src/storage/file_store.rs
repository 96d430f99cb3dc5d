//! Directory-backed key-value store, the secondary salvage target.
//!
//! Each key is one file. Writes go to a temporary sibling first and are then
//! renamed into place, so a crash never leaves a half-written value behind.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracelane_core::client::KeyValueStore;
use tracelane_domain::{Result, TracelaneError};

pub struct FileKeyValueStore {
    dir: PathBuf,
}

impl FileKeyValueStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file_name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{file_name}.json"))
    }
}

#[async_trait]
impl KeyValueStore for FileKeyValueStore {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        fs::create_dir_all(&self.dir).await.map_err(|e| io_error("create store dir", &e))?;
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value).await.map_err(|e| io_error("write value", &e))?;
        fs::rename(&tmp, &path).await.map_err(|e| io_error("replace value", &e))
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error("read value", &e)),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error("delete value", &e)),
        }
    }
}

fn io_error(operation: &str, err: &std::io::Error) -> TracelaneError {
    TracelaneError::Database(format!("file store failed to {operation}: {err}"))
}
