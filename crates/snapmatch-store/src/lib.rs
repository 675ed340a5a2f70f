//! snapmatch-store — Event persistence.
//!
//! [`EventRepository`] is the seam the service layer depends on;
//! [`SqliteEventRepository`] is the embedded implementation.

pub mod sqlite;

pub use sqlite::SqliteEventRepository;

use async_trait::async_trait;
use snapmatch_core::Event;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("event {0} already exists")]
    Duplicate(String),
    #[error("event {0} not found")]
    NotFound(String),
    #[error("corrupt event record {id}: {message}")]
    Corrupt { id: String, message: String },
    #[error("database error: {0}")]
    Database(#[from] tokio_rusqlite::Error),
    #[error("failed to prepare database directory: {0}")]
    Io(#[from] std::io::Error),
}

/// Create / read / update access to event records. Updates rewrite the
/// whole record; the last writer wins.
#[async_trait]
pub trait EventRepository: Send + Sync {
    /// Persist a new event. Fails with [`StoreError::Duplicate`] if the id is taken.
    async fn insert(&self, event: &Event) -> Result<(), StoreError>;

    async fn get(&self, id: &str) -> Result<Option<Event>, StoreError>;

    /// All events in creation order.
    async fn list(&self) -> Result<Vec<Event>, StoreError>;

    /// Replace an existing record. Fails with [`StoreError::NotFound`] if absent.
    async fn update(&self, event: &Event) -> Result<(), StoreError>;
}
