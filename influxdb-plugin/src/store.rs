//! TimeSeriesStore trait and implementations.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Mutex,
};

use async_trait::async_trait;

use crate::error::StoreError;
use crate::series::Series;

// ------------------------------------------------------------------ //
//  Trait                                                              //
// ------------------------------------------------------------------ //

/// The operations the plugin needs from a time-series database.
#[async_trait]
pub trait TimeSeriesStore: Send + Sync {
    /// Name of the target database.
    fn database(&self) -> &str;

    /// Health check.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Create the target database. Succeeds when it already exists.
    async fn create_database(&self) -> Result<(), StoreError>;

    /// Write `series`, returning how many points were sent. Series without
    /// a line-protocol form are not counted.
    async fn write(&self, series: &[Series]) -> Result<usize, StoreError>;
}

// ------------------------------------------------------------------ //
//  MemoryStore (for tests)                                            //
// ------------------------------------------------------------------ //

/// In-memory test double that keeps written series for inspection. Writes fail
/// with [`StoreError::DatabaseNotFound`] until the database is created.
#[derive(Debug)]
pub struct MemoryStore {
    database: String,
    online: AtomicBool,
    created: AtomicBool,
    points: Mutex<Vec<Series>>,
}

impl MemoryStore {
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            online: AtomicBool::new(true),
            created: AtomicBool::new(false),
            points: Mutex::new(Vec::new()),
        }
    }

    /// Start with the database already provisioned.
    pub fn provisioned(database: impl Into<String>) -> Self {
        let store = Self::new(database);
        store.created.store(true, Ordering::SeqCst);
        store
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn is_provisioned(&self) -> bool {
        self.created.load(Ordering::SeqCst)
    }

    /// Non-destructive snapshot of the series written so far.
    pub fn snapshot(&self) -> Vec<Series> {
        self.lock_points().clone()
    }

    /// Consume all series written so far.
    pub fn drain(&self) -> Vec<Series> {
        self.lock_points().drain(..).collect()
    }

    fn lock_points(&self) -> std::sync::MutexGuard<'_, Vec<Series>> {
        // A panic while holding the lock cannot leave the Vec half-written.
        self.points.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Offline)
        }
    }
}

#[async_trait]
impl TimeSeriesStore for MemoryStore {
    fn database(&self) -> &str {
        &self.database
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.check_online()
    }

    async fn create_database(&self) -> Result<(), StoreError> {
        self.check_online()?;
        self.created.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn write(&self, series: &[Series]) -> Result<usize, StoreError> {
        self.check_online()?;
        if !self.is_provisioned() {
            return Err(StoreError::DatabaseNotFound {
                database: self.database.clone(),
            });
        }
        let writable: Vec<Series> = series
            .iter()
            .filter(|s| s.to_line_protocol().is_some())
            .cloned()
            .collect();
        let written = writable.len();
        self.lock_points().extend(writable);
        Ok(written)
    }
}
