use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("snapshot I/O failed for {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("snapshot {path} is not a JSON object of strings")]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// String key/value store shared with other modules as `dyn KvStore`.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    /// Insert or replace; returns the previous value.
    fn put(&self, key: &str, value: String) -> Option<String>;

    fn delete(&self, key: &str) -> Option<String>;

    /// Keys starting with `prefix`, sorted.
    fn keys_with_prefix(&self, prefix: &str) -> Vec<String>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    data: RwLock<BTreeMap<String, String>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: BTreeMap<String, String>) -> Self {
        Self {
            data: RwLock::new(entries),
        }
    }

    /// Merge a JSON snapshot into the store. A missing file loads nothing.
    pub async fn load_snapshot(&self, path: &Path) -> Result<usize, StoreError> {
        let raw = match tokio::fs::read(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(source) => {
                return Err(StoreError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let entries: BTreeMap<String, String> =
            serde_json::from_slice(&raw).map_err(|source| StoreError::Format {
                path: path.to_path_buf(),
                source,
            })?;
        let n = entries.len();
        self.data.write().extend(entries);
        Ok(n)
    }

    /// Write the whole store as a JSON object, creating parent directories.
    pub async fn save_snapshot(&self, path: &Path) -> Result<usize, StoreError> {
        let io = |source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        };
        let (body, n) = {
            let data = self.data.read();
            let body = serde_json::to_vec_pretty(&*data).map_err(|source| StoreError::Format {
                path: path.to_path_buf(),
                source,
            })?;
            (body, data.len())
        };
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io)?;
        }
        tokio::fs::write(path, body).await.map_err(io)?;
        Ok(n)
    }
}

impl KvStore for InMemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.data.read().get(key).cloned()
    }

    fn put(&self, key: &str, value: String) -> Option<String> {
        self.data.write().insert(key.to_string(), value)
    }

    fn delete(&self, key: &str) -> Option<String> {
        self.data.write().remove(key)
    }

    fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.data
            .read()
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect()
    }

    fn len(&self) -> usize {
        self.data.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_delete() {
        let store = InMemoryStore::new();
        assert_eq!(store.put("a", "1".into()), None);
        assert_eq!(store.put("a", "2".into()), Some("1".into()));
        assert_eq!(store.get("a").as_deref(), Some("2"));
        assert_eq!(store.delete("a").as_deref(), Some("2"));
        assert!(store.is_empty());
    }

    #[test]
    fn prefix_scan_is_sorted_and_bounded() {
        let store = InMemoryStore::new();
        for k in ["settings/b", "settings/a", "settingz", "other"] {
            store.put(k, String::new());
        }
        assert_eq!(store.keys_with_prefix("settings/"), vec!["settings/a", "settings/b"]);
    }

    #[tokio::test]
    async fn snapshot_survives_a_restart() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("data").join("kv.json");

        let first = InMemoryStore::new();
        first.put("k", "v".into());
        assert_eq!(first.save_snapshot(&path).await.unwrap(), 1);

        let second = InMemoryStore::new();
        assert_eq!(second.load_snapshot(&path).await.unwrap(), 1);
        assert_eq!(second.get("k").as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn missing_snapshot_loads_nothing_and_garbage_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let store = InMemoryStore::new();
        assert_eq!(store.load_snapshot(&tmp.path().join("none.json")).await.unwrap(), 0);

        let bad = tmp.path().join("bad.json");
        std::fs::write(&bad, "[1,2]").unwrap();
        assert!(matches!(
            store.load_snapshot(&bad).await,
            Err(StoreError::Format { .. })
        ));
    }
}
