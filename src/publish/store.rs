use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Mutex, PoisonError, RwLock};

/// The last accepted pick set, as persisted and broadcast.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedResults {
    /// RFC 3339 acceptance time.
    pub at: String,
    #[serde(rename = "P2")]
    pub p2: String,
    #[serde(rename = "P3")]
    pub p3: String,
    #[serde(rename = "P4")]
    pub p4: String,
    #[serde(rename = "P5")]
    pub p5: String,
    pub source: String,
}

/// Owned "last known results" with an atomic replace.
///
/// Readers never observe a half-applied update: the document is persisted
/// before the in-memory value changes, and ingests are serialized.
pub struct StateStore {
    path: Option<PathBuf>,
    state: RwLock<Option<PublishedResults>>,
    ingest: Mutex<()>,
    subscribers: Mutex<Vec<Sender<PublishedResults>>>,
}

impl StateStore {
    /// Store persisted at `path`, loading the document if one exists.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let state = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            match serde_json::from_str(&contents) {
                Ok(results) => Some(results),
                Err(e) => {
                    log::warn!(
                        "store: ignoring unreadable {}: {}",
                        path.display(),
                        e
                    );
                    None
                }
            }
        } else {
            None
        };

        Ok(Self {
            path: Some(path),
            state: RwLock::new(state),
            ingest: Mutex::new(()),
            subscribers: Mutex::new(Vec::new()),
        })
    }

    /// Store without persistence.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: RwLock::new(None),
            ingest: Mutex::new(()),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn latest(&self) -> Option<PublishedResults> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Persists `results`, swaps them in and notifies subscribers.
    ///
    /// On a persistence error nothing changes.
    pub fn replace(&self, results: PublishedResults) -> Result<()> {
        let _ingest = self.ingest.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(path) = &self.path {
            persist(path, &results)?;
        }

        *self.state.write().unwrap_or_else(PoisonError::into_inner) = Some(results.clone());

        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|tx| tx.send(results.clone()).is_ok());
        Ok(())
    }

    /// Receives every accepted result from now on.
    pub fn subscribe(&self) -> Receiver<PublishedResults> {
        let (tx, rx) = mpsc::channel();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }
}

/// Writes `<path>.tmp` and renames it over `path`.
fn persist(path: &Path, results: &PublishedResults) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let json = serde_json::to_string_pretty(results)?;
    fs::write(&tmp, json).with_context(|| format!("Failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("Failed to move {} into place", tmp.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn results(p2: &str) -> PublishedResults {
        PublishedResults {
            at: "2026-10-15T10:11:00+09:00".into(),
            p2: p2.into(),
            p3: "345".into(),
            p4: "6789".into(),
            p5: "01234".into(),
            source: "test".into(),
        }
    }

    #[test]
    fn test_replace_persists_and_reloads() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data").join("results.json");

        let store = StateStore::open(&path).unwrap();
        assert_eq!(store.latest(), None);
        store.replace(results("12")).unwrap();

        assert!(path.exists());
        assert!(!dir.path().join("data").join("results.json.tmp").exists());

        let reopened = StateStore::open(&path).unwrap();
        assert_eq!(reopened.latest(), Some(results("12")));
    }

    #[test]
    fn test_persisted_json_keys() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("results.json");
        StateStore::open(&path).unwrap().replace(results("07")).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["P2"], "07");
        assert_eq!(json["source"], "test");
    }

    #[test]
    fn test_unreadable_document_starts_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("results.json");
        fs::write(&path, "{ not json").unwrap();

        assert_eq!(StateStore::open(&path).unwrap().latest(), None);
    }

    #[test]
    fn test_subscribers_notified() {
        let store = StateStore::in_memory();
        let rx = store.subscribe();
        let dropped = store.subscribe();
        drop(dropped);

        store.replace(results("12")).unwrap();
        assert_eq!(rx.try_recv().unwrap(), results("12"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_persist_failure_leaves_state() {
        let dir = tempdir().unwrap();
        // A directory where the file should be makes the rename fail
        let path = dir.path().join("results.json");
        fs::create_dir_all(path.join("occupied")).unwrap();

        let store = StateStore::open(&path);
        // Reading a directory fails too; build the store without loading
        assert!(store.is_err());

        let store = StateStore {
            path: Some(path),
            ..StateStore::in_memory()
        };
        assert!(store.replace(results("12")).is_err());
        assert_eq!(store.latest(), None);
    }

    #[test]
    fn test_concurrent_replaces_leave_one_whole_document() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("results.json");
        let store = Arc::new(StateStore::open(&path).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || store.replace(results(&format!("{:02}", i))).unwrap())
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let on_disk: PublishedResults =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(Some(on_disk), store.latest());
    }
}
