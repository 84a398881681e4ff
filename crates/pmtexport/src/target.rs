//! Target metadata store.
//!
//! The target is a flat document store: each document is an ordered list of
//! named items, one of which (`id`) is the join key shared with the source
//! store. The SQLite implementation keeps documents and items in two tables
//! with an index on the record id so lookups stay cheap on re-runs.

use std::path::Path;

use pmtexport_core::record::{RecordKind, TargetDocument};
use pmtexport_core::source::ItemValue;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};

use crate::error::Error;

pub type NoteId = i64;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Unable to encode item value: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// Write access to the target store.
///
/// Stores without transactions keep the default no-op `begin`, `commit`
/// and `rollback`.
pub trait TargetStore {
    /// Every document whose `id` item equals `id`.
    fn find_by_id(&self, id: &str) -> Result<Vec<NoteId>, StoreError>;

    fn delete(&mut self, note: NoteId) -> Result<(), StoreError>;

    fn create(&mut self, document: &TargetDocument) -> Result<NoteId, StoreError>;

    fn begin(&mut self) -> Result<(), StoreError> {
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), StoreError> {
        Ok(())
    }
}

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS store_info (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS documents (
        note_id INTEGER PRIMARY KEY AUTOINCREMENT,
        form TEXT NOT NULL,
        record_id TEXT,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS items (
        note_id INTEGER NOT NULL,
        position INTEGER NOT NULL,
        name TEXT NOT NULL,
        value TEXT NOT NULL,
        PRIMARY KEY (note_id, position),
        FOREIGN KEY (note_id) REFERENCES documents(note_id) ON DELETE CASCADE
    );

    CREATE INDEX IF NOT EXISTS idx_documents_record_id ON documents(record_id);
"#;

pub struct SqliteTargetStore {
    conn: Connection,
}

impl SqliteTargetStore {
    /// Open the store at `path`, provisioning schema and title when the file
    /// does not exist yet.
    pub fn open(path: &Path) -> Result<Self, Error> {
        let exists = path.exists();
        let conn = Connection::open(path).map_err(|e| connect_error(path, e.to_string()))?;

        let store = Self { conn };
        store
            .init_schema()
            .map_err(|e| connect_error(path, e.to_string()))?;

        if !exists {
            let title = store
                .provision()
                .map_err(|e| connect_error(path, e.to_string()))?;
            log::info!("Created target database {}: {title}", path.display());
        }

        Ok(store)
    }

    /// Open an existing store read-only.
    pub fn open_existing(path: &Path) -> Result<Self, Error> {
        if !path.exists() {
            return Err(connect_error(path, "store does not exist".to_string()));
        }
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .map_err(|e| connect_error(path, e.to_string()))?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_schema()?;
        store.provision()?;
        Ok(store)
    }

    pub fn init_schema(&self) -> Result<(), StoreError> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    fn provision(&self) -> Result<String, StoreError> {
        let title = format!("OpenNTF Projects {}", chrono::Local::now().format("%Y-%m-%d"));
        self.conn.execute(
            "INSERT OR IGNORE INTO store_info (key, value) VALUES ('title', ?1)",
            [&title],
        )?;
        Ok(title)
    }

    pub fn title(&self) -> Result<Option<String>, StoreError> {
        let title = self
            .conn
            .query_row("SELECT value FROM store_info WHERE key = 'title'", [], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(title)
    }

    /// Load a document with its items in stored order.
    pub fn load(&self, note: NoteId) -> Result<Option<TargetDocument>, StoreError> {
        let form: Option<String> = self
            .conn
            .query_row(
                "SELECT form FROM documents WHERE note_id = ?1",
                [note],
                |row| row.get(0),
            )
            .optional()?;

        let Some(form) = form else {
            return Ok(None);
        };

        let mut stmt = self
            .conn
            .prepare("SELECT name, value FROM items WHERE note_id = ?1 ORDER BY position")?;
        let rows = stmt.query_map([note], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut document = TargetDocument::new(RecordKind::from_form(&form));
        for row in rows {
            let (name, value) = row?;
            let value: ItemValue = serde_json::from_str(&value)?;
            document.push(&name, value);
        }

        Ok(Some(document))
    }

    /// Number of documents per form, ordered by form name.
    pub fn count_by_form(&self) -> Result<Vec<(String, i64)>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT form, COUNT(*) FROM documents GROUP BY form ORDER BY form")?;
        let counts = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(counts)
    }

    pub fn count_documents(&self) -> Result<i64, StoreError> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        Ok(count)
    }
}

impl TargetStore for SqliteTargetStore {
    fn find_by_id(&self, id: &str) -> Result<Vec<NoteId>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT note_id FROM documents WHERE record_id = ?1 ORDER BY note_id")?;
        let notes = stmt
            .query_map([id], |row| row.get(0))?
            .collect::<Result<Vec<NoteId>, _>>()?;
        Ok(notes)
    }

    fn delete(&mut self, note: NoteId) -> Result<(), StoreError> {
        self.conn
            .execute("DELETE FROM items WHERE note_id = ?1", [note])?;
        self.conn
            .execute("DELETE FROM documents WHERE note_id = ?1", [note])?;
        Ok(())
    }

    fn create(&mut self, document: &TargetDocument) -> Result<NoteId, StoreError> {
        self.conn.execute(
            "INSERT INTO documents (form, record_id, created_at) VALUES (?1, ?2, ?3)",
            params![
                document.kind.form(),
                document.id(),
                chrono::Utc::now().to_rfc3339()
            ],
        )?;
        let note = self.conn.last_insert_rowid();

        let mut stmt = self.conn.prepare(
            "INSERT INTO items (note_id, position, name, value) VALUES (?1, ?2, ?3, ?4)",
        )?;
        for (position, (name, value)) in document.items.iter().enumerate() {
            let value = serde_json::to_string(value)?;
            stmt.execute(params![note, position as i64, name, value])?;
        }

        Ok(note)
    }

    fn begin(&mut self) -> Result<(), StoreError> {
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), StoreError> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("ROLLBACK")?;
        }
        Ok(())
    }
}

fn connect_error(path: &Path, reason: String) -> Error {
    Error::StoreConnect {
        store: "target",
        location: path.display().to_string(),
        reason,
    }
}
