//! SQLite-backed event repository via `tokio-rusqlite`.
//!
//! One connection, driven on its own thread; calls are serialized.

use crate::{EventRepository, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, ErrorCode, OptionalExtension, Row};
use snapmatch_core::Event;
use std::path::Path;
use tokio_rusqlite::Connection;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS events (
    id            TEXT PRIMARY KEY NOT NULL,
    name          TEXT NOT NULL,
    date          TEXT NOT NULL,
    location      TEXT NOT NULL,
    images        TEXT NOT NULL DEFAULT '[]',
    created_at    TEXT NOT NULL,
    last_modified TEXT
);
";

const SELECT_COLUMNS: &str =
    "SELECT id, name, date, location, images, created_at, last_modified FROM events";

/// Columns as stored, before parsing.
struct EventRow {
    id: String,
    name: String,
    date: String,
    location: String,
    images: String,
    created_at: String,
    last_modified: Option<String>,
}

impl EventRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            date: row.get(2)?,
            location: row.get(3)?,
            images: row.get(4)?,
            created_at: row.get(5)?,
            last_modified: row.get(6)?,
        })
    }

    fn into_event(self) -> Result<Event, StoreError> {
        let corrupt = |message: String| StoreError::Corrupt {
            id: self.id.clone(),
            message,
        };
        let date = NaiveDate::parse_from_str(&self.date, "%Y-%m-%d")
            .map_err(|e| corrupt(format!("date: {e}")))?;
        let images: Vec<String> =
            serde_json::from_str(&self.images).map_err(|e| corrupt(format!("images: {e}")))?;
        let created_at = parse_timestamp(&self.created_at).map_err(|e| corrupt(format!("created_at: {e}")))?;
        let last_modified = self
            .last_modified
            .as_deref()
            .map(parse_timestamp)
            .transpose()
            .map_err(|e| corrupt(format!("last_modified: {e}")))?;

        Ok(Event {
            id: self.id.clone(),
            name: self.name.clone(),
            date,
            location: self.location.clone(),
            images,
            created_at,
            last_modified,
        })
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw).map(|dt| dt.with_timezone(&Utc))
}

/// Parameters shared by insert and update.
struct EventParams {
    id: String,
    name: String,
    date: String,
    location: String,
    images: String,
    created_at: String,
    last_modified: Option<String>,
}

impl EventParams {
    fn from_event(event: &Event) -> Self {
        Self {
            id: event.id.clone(),
            name: event.name.clone(),
            date: event.date.format("%Y-%m-%d").to_string(),
            location: event.location.clone(),
            // Serializing a Vec<String> cannot fail.
            images: serde_json::to_string(&event.images).unwrap_or_else(|_| "[]".into()),
            created_at: event.created_at.to_rfc3339(),
            last_modified: event.last_modified.map(|t| t.to_rfc3339()),
        }
    }
}

/// Event repository stored in a single SQLite database file.
#[derive(Clone)]
pub struct SqliteEventRepository {
    conn: Connection,
}

impl SqliteEventRepository {
    /// Open (or create) the database at `path`, creating parent directories.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).await?;
        tracing::info!(path = %path.display(), "event database opened");
        Self::init(conn).await
    }

    /// Private in-memory database, for tests and ephemeral runs.
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().await?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl EventRepository for SqliteEventRepository {
    async fn insert(&self, event: &Event) -> Result<(), StoreError> {
        let p = EventParams::from_event(event);
        let id = p.id.clone();
        let inserted = self
            .conn
            .call(move |conn| {
                let result = conn.execute(
                    "INSERT INTO events (id, name, date, location, images, created_at, last_modified)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![p.id, p.name, p.date, p.location, p.images, p.created_at, p.last_modified],
                );
                match result {
                    Ok(_) => Ok(true),
                    Err(rusqlite::Error::SqliteFailure(e, _))
                        if e.code == ErrorCode::ConstraintViolation =>
                    {
                        Ok(false)
                    }
                    Err(e) => Err(e.into()),
                }
            })
            .await?;

        if !inserted {
            return Err(StoreError::Duplicate(id));
        }
        tracing::debug!(id = %id, "event inserted");
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Event>, StoreError> {
        let id = id.to_string();
        let row = self
            .conn
            .call(move |conn| {
                let row = conn
                    .query_row(
                        &format!("{SELECT_COLUMNS} WHERE id = ?1"),
                        params![id],
                        EventRow::from_row,
                    )
                    .optional()?;
                Ok(row)
            })
            .await?;
        row.map(EventRow::into_event).transpose()
    }

    async fn list(&self) -> Result<Vec<Event>, StoreError> {
        let rows = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} ORDER BY rowid"))?;
                let rows = stmt
                    .query_map([], EventRow::from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;
        rows.into_iter().map(EventRow::into_event).collect()
    }

    async fn update(&self, event: &Event) -> Result<(), StoreError> {
        let p = EventParams::from_event(event);
        let id = p.id.clone();
        let changed = self
            .conn
            .call(move |conn| {
                let changed = conn.execute(
                    "UPDATE events
                     SET name = ?2, date = ?3, location = ?4, images = ?5,
                         created_at = ?6, last_modified = ?7
                     WHERE id = ?1",
                    params![p.id, p.name, p.date, p.location, p.images, p.created_at, p.last_modified],
                )?;
                Ok(changed)
            })
            .await?;

        if changed == 0 {
            return Err(StoreError::NotFound(id));
        }
        tracing::debug!(id = %id, "event updated");
        Ok(())
    }
}
