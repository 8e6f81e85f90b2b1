//! SQLite-backed encoding store.

use facedb_core::codec::{self, CodecError};
use facedb_core::{Embedding, EncodingStore, FaceRecord, RecordId};
use rusqlite::{params, Connection, OpenFlags};
use std::path::{Path, PathBuf};
use thiserror::Error;

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS faces (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    label     TEXT NOT NULL,
    embedding BLOB NOT NULL
);
";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot encode embedding: {0}")]
    Encode(#[source] CodecError),
    #[error("record {id} has a corrupt embedding: {source}")]
    CorruptRecord {
        id: RecordId,
        #[source]
        source: CodecError,
    },
}

/// Face store over a single `faces` table.
pub struct SqliteStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Open (or create) the database at `path`, creating parent directories.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        let store = Self::init(conn, Some(path.to_path_buf()))?;
        tracing::info!(path = %path.display(), records = store.count()?, "opened face store");
        Ok(store)
    }

    /// Open an existing database without creating files, directories or schema.
    /// Writes through the returned store fail.
    pub fn open_read_only(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        tracing::debug!(path = %path.display(), "opened face store read-only");
        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    /// Private in-memory database, mainly for tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?, None)
    }

    fn init(conn: Connection, path: Option<PathBuf>) -> Result<Self, StoreError> {
        conn.pragma_update(None, "synchronous", "FULL")?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self { conn, path })
    }

    /// Database file path, `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn count(&self) -> Result<u64, StoreError> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM faces", [], |row| row.get(0))?;
        Ok(n.max(0) as u64)
    }

    /// Close the connection, surfacing any error that a plain drop would swallow.
    pub fn close(self) -> Result<(), StoreError> {
        let path = self.path;
        self.conn.close().map_err(|(_, e)| StoreError::Sqlite(e))?;
        tracing::info!(path = ?path, "closed face store");
        Ok(())
    }
}

impl EncodingStore for SqliteStore {
    type Error = StoreError;

    fn append(&mut self, label: &str, embedding: &Embedding) -> Result<RecordId, StoreError> {
        let blob = codec::encode_embedding(embedding).map_err(StoreError::Encode)?;
        // Single autocommit statement: either the row is durable or nothing is written.
        self.conn.execute(
            "INSERT INTO faces (label, embedding) VALUES (?1, ?2)",
            params![label, blob],
        )?;
        let id = self.conn.last_insert_rowid();
        tracing::debug!(id, label, bytes = blob.len(), "appended face record");
        Ok(id)
    }

    fn scan_all(&self) -> Result<Vec<FaceRecord>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, label, embedding FROM faces ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, RecordId>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Vec<u8>>(2)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (id, label, blob) = row?;
            let embedding = codec::decode_embedding(&blob)
                .map_err(|source| StoreError::CorruptRecord { id, source })?;
            records.push(FaceRecord {
                id,
                label,
                embedding,
            });
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emb(values: &[f32]) -> Embedding {
        Embedding::new(values.to_vec())
    }

    #[test]
    fn test_append_then_scan_contains_record_once() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.append("Alice", &emb(&[0.1, 0.2])).unwrap();
        let id = store.append("Bob", &emb(&[0.3, 0.4])).unwrap();

        let records = store.scan_all().unwrap();
        let bobs: Vec<_> = records.iter().filter(|r| r.id == id).collect();
        assert_eq!(bobs.len(), 1);
        assert_eq!(bobs[0].label, "Bob");
        assert_eq!(bobs[0].embedding.values, vec![0.3, 0.4]);
    }

    #[test]
    fn test_scan_is_insertion_ordered() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        for (i, label) in ["c", "a", "b"].iter().enumerate() {
            store.append(label, &emb(&[i as f32])).unwrap();
        }
        let labels: Vec<String> = store.scan_all().unwrap().into_iter().map(|r| r.label).collect();
        assert_eq!(labels, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_ids_are_unique_and_increasing() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let a = store.append("same", &emb(&[1.0])).unwrap();
        let b = store.append("same", &emb(&[1.0])).unwrap();
        assert!(b > a);
        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn test_empty_store_scans_empty() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.scan_all().unwrap().is_empty());
        assert_eq!(store.count().unwrap(), 0);
        assert!(store.path().is_none());
    }

    #[test]
    fn test_scan_rereads_current_state() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let before = store.scan_all().unwrap();
        store.append("late", &emb(&[0.5])).unwrap();
        assert!(before.is_empty());
        assert_eq!(store.scan_all().unwrap().len(), 1);
    }

    #[test]
    fn test_records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("faces.db");

        {
            let mut store = SqliteStore::open(&path).unwrap();
            store.append("Alice", &emb(&[0.25, -1.5, 3.0])).unwrap();
            store.close().unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        let records = store.scan_all().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].label, "Alice");
        assert_eq!(records[0].embedding.values, vec![0.25, -1.5, 3.0]);
        assert_eq!(store.path(), Some(path.as_path()));
    }

    #[test]
    fn test_read_only_open_reads_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("faces.db");
        {
            let mut store = SqliteStore::open(&path).unwrap();
            store.append("Alice", &emb(&[0.5, 0.5])).unwrap();
            store.close().unwrap();
        }

        let mut store = SqliteStore::open_read_only(&path).unwrap();
        assert_eq!(store.scan_all().unwrap().len(), 1);
        assert!(store.append("Bob", &emb(&[1.0, 1.0])).is_err());
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_read_only_open_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("faces.db");

        assert!(SqliteStore::open_read_only(&path).is_err());
        assert!(!path.exists());
        assert!(!path.parent().unwrap().exists());
    }

    #[test]
    fn test_corrupt_blob_is_reported_with_id() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .conn
            .execute(
                "INSERT INTO faces (label, embedding) VALUES ('mallory', x'090000')",
                [],
            )
            .unwrap();

        match store.scan_all() {
            Err(StoreError::CorruptRecord { id, source }) => {
                assert_eq!(id, 1);
                assert_eq!(source, CodecError::UnsupportedVersion(9));
            }
            other => panic!("expected CorruptRecord, got {other:?}"),
        }
    }

    #[test]
    fn test_stored_blob_uses_versioned_layout() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.append("Alice", &emb(&[1.0])).unwrap();
        let blob: Vec<u8> = store
            .conn
            .query_row("SELECT embedding FROM faces", [], |row| row.get(0))
            .unwrap();
        assert_eq!(blob, vec![1, 1, 0, 0, 0, 0x00, 0x00, 0x80, 0x3F]);
    }
}
