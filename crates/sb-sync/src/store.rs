//! Settings persistence and change notification
//!
//! The aggregate is always loaded and saved whole. Every successful save is
//! broadcast to subscribers; dropping a [`Subscription`] unsubscribes.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;

use sb_core::types::{Settings, STORAGE_KEY};

use crate::error::StoreError;

const CHANNEL_CAPACITY: usize = 16;

/// Replace `path` with `text` through a uniquely named temp file in the same
/// directory, so readers only ever see a complete document and concurrent
/// writers never share a temp file.
pub(crate) async fn write_atomic(path: &Path, text: String) -> io::Result<()> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let dir = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => parent.to_path_buf(),
            None => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(text.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| e.error)?;
        Ok(())
    })
    .await
    .map_err(io::Error::other)?
}

/// Receives the new aggregate after each save.
pub struct Subscription {
    rx: broadcast::Receiver<Arc<Settings>>,
}

impl Subscription {
    /// Next saved aggregate, or None once the store is gone.
    ///
    /// A slow subscriber that fell behind skips straight to newer values;
    /// only the latest aggregate matters to consumers.
    pub async fn recv(&mut self) -> Option<Arc<Settings>> {
        loop {
            match self.rx.recv().await {
                Ok(settings) => return Some(settings),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    log::debug!("settings subscriber lagged, skipped {skipped} update(s)");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn load(&self) -> Result<Settings, StoreError>;

    /// Replace the whole aggregate and notify subscribers.
    async fn save(&self, settings: &Settings) -> Result<(), StoreError>;

    fn subscribe(&self) -> Subscription;
}

#[async_trait]
impl<S: SettingsStore + ?Sized> SettingsStore for Arc<S> {
    async fn load(&self) -> Result<Settings, StoreError> {
        (**self).load().await
    }

    async fn save(&self, settings: &Settings) -> Result<(), StoreError> {
        (**self).save(settings).await
    }

    fn subscribe(&self) -> Subscription {
        (**self).subscribe()
    }
}

// =============================================================================
// In-memory store
// =============================================================================

pub struct MemoryStore {
    state: Mutex<Settings>,
    tx: broadcast::Sender<Arc<Settings>>,
}

impl MemoryStore {
    pub fn new(initial: Settings) -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            state: Mutex::new(initial),
            tx,
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn load(&self) -> Result<Settings, StoreError> {
        Ok(self.state.lock().await.clone())
    }

    async fn save(&self, settings: &Settings) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        *state = settings.clone();
        // No subscribers is fine
        let _ = self.tx.send(Arc::new(settings.clone()));
        Ok(())
    }

    fn subscribe(&self) -> Subscription {
        Subscription {
            rx: self.tx.subscribe(),
        }
    }
}

// =============================================================================
// JSON file store
// =============================================================================

/// Key/value JSON document holding the aggregate under one key.
///
/// Other keys in the document are preserved on save. Writes go through a
/// temporary file and a rename, so readers never see half a document.
pub struct JsonFileStore {
    path: PathBuf,
    key: String,
    tx: broadcast::Sender<Arc<Settings>>,
    /// Serialises read-modify-write of the document within this process.
    write_lock: Mutex<()>,
    /// Last aggregate seen on disk, used to detect writes by other processes.
    last_seen: Mutex<Option<Settings>>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_key(path, STORAGE_KEY)
    }

    pub fn with_key(path: impl Into<PathBuf>, key: impl Into<String>) -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            path: path.into(),
            key: key.into(),
            tx,
            write_lock: Mutex::new(()),
            last_seen: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_document(&self) -> Result<Map<String, Value>, StoreError> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        if text.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str(&text)? {
            Value::Object(map) => Ok(map),
            other => Err(StoreError::Malformed(format!(
                "expected a JSON object in '{}', found {}",
                self.path.display(),
                json_kind(&other)
            ))),
        }
    }

    async fn write_document(&self, doc: &Map<String, Value>) -> Result<(), StoreError> {
        let mut text = serde_json::to_string_pretty(doc)?;
        text.push('\n');

        write_atomic(&self.path, text)
            .await
            .map_err(|source| StoreError::Write {
                path: self.path.clone(),
                source,
            })
    }

    fn decode(&self, doc: &Map<String, Value>) -> Result<Settings, StoreError> {
        match doc.get(&self.key) {
            None | Some(Value::Null) => Ok(Settings::default()),
            Some(value) => Ok(Settings::deserialize(value)?),
        }
    }

    /// Re-read the file and notify subscribers if another writer changed it.
    pub async fn poll_external_change(&self) -> Result<bool, StoreError> {
        let doc = self.read_document().await?;
        let settings = self.decode(&doc)?;

        let mut last_seen = self.last_seen.lock().await;
        if last_seen.as_ref() == Some(&settings) {
            return Ok(false);
        }
        let first_look = last_seen.is_none();
        *last_seen = Some(settings.clone());
        drop(last_seen);

        if first_look {
            return Ok(false);
        }
        log::info!("settings in '{}' changed on disk", self.path.display());
        let _ = self.tx.send(Arc::new(settings));
        Ok(true)
    }

    /// Poll the file for writes made by other processes.
    pub fn spawn_watcher(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(err) = store.poll_external_change().await {
                    log::warn!("failed to poll '{}': {err}", store.path.display());
                }
            }
        })
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[async_trait]
impl SettingsStore for JsonFileStore {
    async fn load(&self) -> Result<Settings, StoreError> {
        let doc = self.read_document().await?;
        let settings = self.decode(&doc)?;
        *self.last_seen.lock().await = Some(settings.clone());
        Ok(settings)
    }

    async fn save(&self, settings: &Settings) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;

        let mut doc = self.read_document().await?;
        doc.insert(self.key.clone(), serde_json::to_value(settings)?);
        self.write_document(&doc).await?;

        *self.last_seen.lock().await = Some(settings.clone());
        let _ = self.tx.send(Arc::new(settings.clone()));
        Ok(())
    }

    fn subscribe(&self) -> Subscription {
        Subscription {
            rx: self.tx.subscribe(),
        }
    }
}
