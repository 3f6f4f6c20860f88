//! Deployment history log
//!
//! Append-only record of deployment attempts. Records are never edited; a
//! retry produces a new record. Every mutation republishes the full,
//! newest-first list to subscribers.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info};

use crate::errors::DeployError;
use crate::filesys::file::File;
use crate::models::deployment::{DeploymentRecord, NewDeploymentRecord};
use crate::utils::generate_uuid;

/// Durable key-value storage for history records, keyed by record id
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Every stored record, in no particular order
    async fn load_all(&self) -> Result<Vec<DeploymentRecord>, DeployError>;

    /// Insert a record under its id
    async fn put(&self, record: &DeploymentRecord) -> Result<(), DeployError>;

    /// Delete a record, returning whether it existed
    async fn delete(&self, id: &str) -> Result<bool, DeployError>;
}

/// History store backed by a single JSON file
#[derive(Debug)]
pub struct JsonFileHistoryStore {
    file: File,
}

impl JsonFileHistoryStore {
    pub fn new(file: File) -> Self {
        Self { file }
    }

    async fn read(&self) -> Result<BTreeMap<String, DeploymentRecord>, DeployError> {
        self.file
            .read_json_or_default()
            .await
            .map_err(|e| DeployError::StorageError(format!("Failed to read history: {}", e)))
    }
}

#[async_trait]
impl HistoryStore for JsonFileHistoryStore {
    async fn load_all(&self) -> Result<Vec<DeploymentRecord>, DeployError> {
        Ok(self.read().await?.into_values().collect())
    }

    async fn put(&self, record: &DeploymentRecord) -> Result<(), DeployError> {
        let mut records = self.read().await?;
        records.insert(record.id.clone(), record.clone());
        self.file.write_json(&records).await
    }

    async fn delete(&self, id: &str) -> Result<bool, DeployError> {
        let mut records = self.read().await?;
        if records.remove(id).is_none() {
            return Ok(false);
        }
        self.file.write_json(&records).await?;
        Ok(true)
    }
}

/// Volatile history store
#[derive(Debug, Default)]
pub struct MemoryHistoryStore {
    records: RwLock<BTreeMap<String, DeploymentRecord>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn load_all(&self) -> Result<Vec<DeploymentRecord>, DeployError> {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        Ok(records.values().cloned().collect())
    }

    async fn put(&self, record: &DeploymentRecord) -> Result<(), DeployError> {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        records.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool, DeployError> {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        Ok(records.remove(id).is_some())
    }
}

/// The history log
pub struct DeploymentHistory {
    store: Arc<dyn HistoryStore>,
    write_lock: Mutex<()>,
    tx: watch::Sender<Vec<DeploymentRecord>>,
}

impl DeploymentHistory {
    /// Open the log over a store, loading what it already holds
    pub async fn open(store: Arc<dyn HistoryStore>) -> Result<Self, DeployError> {
        let mut records = store.load_all().await?;
        sort_newest_first(&mut records);
        debug!("Loaded {} history records", records.len());

        let (tx, _rx) = watch::channel(records);
        Ok(Self {
            store,
            write_lock: Mutex::new(()),
            tx,
        })
    }

    /// In-memory log, for tests and one-shot runs
    pub async fn in_memory() -> Result<Self, DeployError> {
        Self::open(Arc::new(MemoryHistoryStore::new())).await
    }

    /// Store a new record, assigning its id and creation time
    pub async fn append(&self, new: NewDeploymentRecord) -> Result<DeploymentRecord, DeployError> {
        let _guard = self.write_lock.lock().await;

        let record = new.into_record(generate_uuid(), Utc::now());
        self.store.put(&record).await?;

        let mut records = self.tx.borrow().clone();
        records.insert(0, record.clone());
        sort_newest_first(&mut records);
        self.tx.send_replace(records);

        info!(
            "Recorded {} deployment of {} ({})",
            record.status, record.name, record.id
        );
        Ok(record)
    }

    /// All records, newest first
    pub fn list(&self) -> Vec<DeploymentRecord> {
        self.tx.borrow().clone()
    }

    /// Delete a record by id
    pub async fn remove(&self, id: &str) -> Result<(), DeployError> {
        let _guard = self.write_lock.lock().await;

        if !self.store.delete(id).await? {
            return Err(DeployError::NotFound(format!("deployment record {}", id)));
        }

        let mut records = self.tx.borrow().clone();
        records.retain(|r| r.id != id);
        self.tx.send_replace(records);

        info!("Removed deployment record {}", id);
        Ok(())
    }

    /// Observe the full list after every change
    pub fn subscribe(&self) -> watch::Receiver<Vec<DeploymentRecord>> {
        self.tx.subscribe()
    }
}

// Stable, so records with equal timestamps keep insertion order
fn sort_newest_first(records: &mut [DeploymentRecord]) {
    records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}
