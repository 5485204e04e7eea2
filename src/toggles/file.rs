use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use super::{KeyValueStore, ToggleError};

/// JSON object on disk. Writes go to a sibling temp file that is then renamed over it.
pub struct FileKvStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileKvStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    async fn read_all(&self) -> Result<BTreeMap<String, Value>, ToggleError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) if raw.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(raw) => serde_json::from_str(&raw).map_err(|e| {
                ToggleError::Storage(format!("{} is not a json object: {e}", self.path.display()))
            }),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(err) => Err(ToggleError::Storage(format!(
                "failed to read {}: {err}",
                self.path.display()
            ))),
        }
    }

    async fn write_all(&self, entries: &BTreeMap<String, Value>) -> Result<(), ToggleError> {
        let body = serde_json::to_vec_pretty(entries)
            .map_err(|e| ToggleError::Storage(e.to_string()))?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, body).await.map_err(|e| {
            ToggleError::Storage(format!("failed to write {}: {e}", tmp.display()))
        })?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(|e| {
            ToggleError::Storage(format!("failed to replace {}: {e}", self.path.display()))
        })
    }
}

#[async_trait]
impl KeyValueStore for FileKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, ToggleError> {
        let _guard = self.lock.lock().await;
        Ok(self.read_all().await?.get(key).map(|value| match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }))
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), ToggleError> {
        let _guard = self.lock.lock().await;
        let mut entries = self.read_all().await?;
        // Flags are written as JSON booleans so the file stays readable by hand.
        let value = match value {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            other => Value::String(other.to_string()),
        };
        entries.insert(key.to_string(), value);
        self.write_all(&entries).await
    }
}
