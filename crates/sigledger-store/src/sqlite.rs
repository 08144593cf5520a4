//! SQLite implementation of the RecordStore trait.
//!
//! This is the primary storage backend. It uses rusqlite with bundled
//! SQLite, wrapped in async via tokio::spawn_blocking. Each signer's record
//! is one row holding the CBOR-encoded [`SignerRecord`].

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use sigledger_core::{Address, SignerRecord};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::RecordStore;

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a blocking operation on the connection off the async runtime.
    async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(|e| {
                StoreError::Database(rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_LOCKED),
                    Some(format!("mutex poisoned: {}", e)),
                ))
            })?;
            f(&conn)
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("spawn_blocking failed: {}", e)))?
    }
}

fn encode_record(record: &SignerRecord) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(record, &mut buf)
        .map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(buf)
}

fn decode_record(bytes: &[u8]) -> Result<SignerRecord> {
    ciborium::from_reader(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn address_from_blob(bytes: Vec<u8>) -> Result<Address> {
    Address::try_from(bytes.as_slice())
        .map_err(|_| StoreError::InvalidData(format!("signer blob of {} bytes", bytes.len())))
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn get(&self, signer: &Address) -> Result<Option<SignerRecord>> {
        let key = *signer;
        self.run(move |conn| {
            let blob: Option<Vec<u8>> = conn
                .query_row(
                    "SELECT record FROM signer_records WHERE signer = ?1",
                    params![key.as_bytes().as_slice()],
                    |row| row.get(0),
                )
                .optional()?;

            let Some(blob) = blob else {
                return Ok(None);
            };

            let record = decode_record(&blob)?;
            if record.signer != key {
                return Err(StoreError::InvalidData(format!(
                    "record under {} belongs to {}",
                    key, record.signer
                )));
            }
            Ok(Some(record))
        })
        .await
    }

    async fn set(&self, signer: &Address, record: &SignerRecord) -> Result<()> {
        let key = *signer;
        let blob = encode_record(record)?;
        let count = record.len() as i64;
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO signer_records (signer, record, message_count, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(signer) DO UPDATE SET
                    record = excluded.record,
                    message_count = excluded.message_count,
                    updated_at = excluded.updated_at",
                params![key.as_bytes().as_slice(), blob, count, migration::now_millis()],
            )?;
            tracing::debug!(signer = %key, messages = count, "stored signer record");
            Ok(())
        })
        .await
    }

    async fn signers(&self) -> Result<Vec<Address>> {
        self.run(|conn| {
            let mut stmt = conn.prepare("SELECT signer FROM signer_records ORDER BY signer")?;
            let blobs = stmt
                .query_map([], |row| row.get::<_, Vec<u8>>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            blobs.into_iter().map(address_from_blob).collect()
        })
        .await
    }
}
