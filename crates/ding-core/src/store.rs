//! Persistence seams.
//!
//! The scheduler always reads the full task set, mutates in memory
//! and writes the full set back; no partial-update API exists. The
//! checkpoint (`last_checked_at`) is the boundary up to which missed
//! due times have already been reconciled.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::models::{Settings, Task};

#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn load_tasks(&self) -> Result<Vec<Task>, CoreError>;
    async fn replace_tasks(&self, tasks: &[Task]) -> Result<(), CoreError>;
}

#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Loads settings with defaults merged over any missing fields.
    async fn load_settings(&self) -> Result<Settings, CoreError>;
    async fn save_settings(&self, settings: &Settings) -> Result<(), CoreError>;
}

#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn last_checked_at(&self) -> Result<Option<DateTime<Utc>>, CoreError>;
    async fn set_last_checked_at(&self, at: DateTime<Utc>) -> Result<(), CoreError>;
}

/// Composed store trait the scheduler runs against.
pub trait Store: TaskStore + SettingsStore + CheckpointStore {}

impl<T: TaskStore + SettingsStore + CheckpointStore> Store for T {}

/// On-disk document. One JSON snapshot holds everything; fields are
/// defaulted so older documents keep loading.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreDocument {
    #[serde(default)]
    tasks: Vec<Task>,
    #[serde(default)]
    settings: Settings,
    #[serde(default)]
    last_checked_at: Option<DateTime<Utc>>,
}

/// Single-file JSON store. Writes go through a temp file and rename
/// so a crashed pass never leaves a torn document.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_document(&self) -> Result<StoreDocument, CoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StoreDocument::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_document(&self, doc: &StoreDocument) -> Result<(), CoreError> {
        let bytes = serde_json::to_vec_pretty(doc)?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl TaskStore for JsonFileStore {
    async fn load_tasks(&self) -> Result<Vec<Task>, CoreError> {
        Ok(self.read_document().await?.tasks)
    }

    async fn replace_tasks(&self, tasks: &[Task]) -> Result<(), CoreError> {
        let mut doc = self.read_document().await?;
        doc.tasks = tasks.to_vec();
        self.write_document(&doc).await
    }
}

#[async_trait]
impl SettingsStore for JsonFileStore {
    async fn load_settings(&self) -> Result<Settings, CoreError> {
        Ok(self.read_document().await?.settings)
    }

    async fn save_settings(&self, settings: &Settings) -> Result<(), CoreError> {
        let mut doc = self.read_document().await?;
        doc.settings = settings.clone();
        self.write_document(&doc).await
    }
}

#[async_trait]
impl CheckpointStore for JsonFileStore {
    async fn last_checked_at(&self) -> Result<Option<DateTime<Utc>>, CoreError> {
        Ok(self.read_document().await?.last_checked_at)
    }

    async fn set_last_checked_at(&self, at: DateTime<Utc>) -> Result<(), CoreError> {
        let mut doc = self.read_document().await?;
        doc.last_checked_at = Some(at);
        self.write_document(&doc).await
    }
}

/// In-memory store for tests and ephemeral hosts.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<StoreDocument>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: Settings) -> Self {
        let store = Self::new();
        store.inner.lock().expect("store poisoned").settings = settings;
        store
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn load_tasks(&self) -> Result<Vec<Task>, CoreError> {
        Ok(self.inner.lock().expect("store poisoned").tasks.clone())
    }

    async fn replace_tasks(&self, tasks: &[Task]) -> Result<(), CoreError> {
        self.inner.lock().expect("store poisoned").tasks = tasks.to_vec();
        Ok(())
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn load_settings(&self) -> Result<Settings, CoreError> {
        Ok(self.inner.lock().expect("store poisoned").settings.clone())
    }

    async fn save_settings(&self, settings: &Settings) -> Result<(), CoreError> {
        self.inner.lock().expect("store poisoned").settings = settings.clone();
        Ok(())
    }
}

#[async_trait]
impl CheckpointStore for MemoryStore {
    async fn last_checked_at(&self) -> Result<Option<DateTime<Utc>>, CoreError> {
        Ok(self.inner.lock().expect("store poisoned").last_checked_at)
    }

    async fn set_last_checked_at(&self, at: DateTime<Utc>) -> Result<(), CoreError> {
        self.inner.lock().expect("store poisoned").last_checked_at = Some(at);
        Ok(())
    }
}
