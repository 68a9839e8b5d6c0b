use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};

use super::{
    AuthCapability, BackendError, BackendResult, BlobStore, CreateNoteInput, GraphApi, NoteRecord,
};

const DB_FILE: &str = "notes.db";
const BLOB_DIR: &str = "blobs";

/// Single-user provider backed by an SQLite catalog and a blob directory.
///
/// Layout under the data directory:
/// - notes.db  (the notes table)
/// - blobs/    (one file per storage key)
///
/// rusqlite::Connection is not Sync, so every call opens its own connection
/// inside a blocking task.
pub struct LocalBackend {
    db_path: PathBuf,
    blob_dir: PathBuf,
    username: Option<String>,
}

impl LocalBackend {
    /// Open (or create) the catalog and blob directory under `data_dir`.
    pub fn open(data_dir: &Path, username: Option<String>) -> BackendResult<Self> {
        let blob_dir = data_dir.join(BLOB_DIR);
        std::fs::create_dir_all(&blob_dir)?;

        let db_path = data_dir.join(DB_FILE);
        let conn = Connection::open(&db_path)?;
        init_schema(&conn)?;

        log::debug!("✅ Notes schema initialized at {}", db_path.display());

        Ok(LocalBackend {
            db_path,
            blob_dir,
            username,
        })
    }

    /// Run a closure against a fresh connection on the blocking pool.
    async fn with_connection<T, F>(&self, f: F) -> BackendResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> BackendResult<T> + Send + 'static,
    {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let conn = Connection::open(&db_path)?;
            f(&conn)
        })
        .await?
    }

    fn blob_path(&self, key: &str) -> BackendResult<PathBuf> {
        validate_key(key)?;
        Ok(self.blob_dir.join(key))
    }
}

fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS notes (
            id              TEXT PRIMARY KEY,
            name            TEXT NOT NULL,
            description     TEXT NOT NULL,
            image           TEXT,
            created_at      INTEGER NOT NULL,
            updated_at      INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_notes_created_at
         ON notes(created_at ASC)",
        [],
    )?;

    Ok(())
}

/// Keys name a single file in the blob directory.
fn validate_key(key: &str) -> BackendResult<()> {
    let bad = key.is_empty()
        || key == "."
        || key == ".."
        || key.contains('/')
        || key.contains('\\')
        || key.contains('\0');
    if bad {
        return Err(BackendError::InvalidKey(key.to_string()));
    }
    Ok(())
}

fn note_from_row(row: &Row<'_>) -> rusqlite::Result<NoteRecord> {
    let created_at: i64 = row.get(4)?;
    Ok(NoteRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        image: row.get(3)?,
        created_at: Utc.timestamp_opt(created_at, 0).single(),
    })
}

#[async_trait]
impl GraphApi for LocalBackend {
    async fn list_notes(&self) -> BackendResult<Vec<NoteRecord>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, description, image, created_at FROM notes
                 ORDER BY created_at ASC, rowid ASC",
            )?;
            let notes = stmt
                .query_map([], note_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(notes)
        })
        .await
    }

    async fn create_note(&self, input: &CreateNoteInput) -> BackendResult<NoteRecord> {
        let input = input.clone();
        self.with_connection(move |conn| {
            let id = uuid::Uuid::new_v4().to_string();
            let now = Utc::now().timestamp();
            conn.execute(
                "INSERT INTO notes (id, name, description, image, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                params![&id, &input.name, &input.description, &input.image, now],
            )?;
            log::info!("📝 Created note {} ({})", id, input.name);
            Ok(NoteRecord {
                id,
                name: input.name,
                description: input.description,
                image: input.image,
                created_at: Utc.timestamp_opt(now, 0).single(),
            })
        })
        .await
    }

    async fn delete_note(&self, id: &str) -> BackendResult<NoteRecord> {
        let id = id.to_string();
        self.with_connection(move |conn| {
            let note = conn
                .query_row(
                    "SELECT id, name, description, image, created_at FROM notes WHERE id = ?1",
                    params![&id],
                    note_from_row,
                )
                .optional()?
                .ok_or_else(|| BackendError::NotFound(format!("note {}", id)))?;
            conn.execute("DELETE FROM notes WHERE id = ?1", params![&id])?;
            log::info!("🗑️  Deleted note {}", id);
            Ok(note)
        })
        .await
    }
}

#[async_trait]
impl BlobStore for LocalBackend {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> BackendResult<()> {
        let path = self.blob_path(key)?;
        let size = bytes.len();
        tokio::fs::write(&path, bytes).await?;
        log::info!("📸 Stored {:.1}KB blob at {}", size as f64 / 1024.0, path.display());
        Ok(())
    }

    async fn get_url(&self, key: &str) -> BackendResult<String> {
        let path = self.blob_path(key)?;
        if !tokio::fs::try_exists(&path).await? {
            return Err(BackendError::NotFound(format!("blob {}", key)));
        }
        url::Url::from_file_path(&path)
            .map(|url| url.to_string())
            .map_err(|_| BackendError::Storage(format!("not an absolute path: {}", path.display())))
    }
}

#[async_trait]
impl AuthCapability for LocalBackend {
    async fn sign_out(&self) -> BackendResult<()> {
        log::info!("👋 Local session closed");
        Ok(())
    }

    fn username(&self) -> Option<String> {
        self.username.clone()
    }
}

// Implement Debug for better error messages
impl std::fmt::Debug for LocalBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalBackend")
            .field("db_path", &self.db_path)
            .field("blob_dir", &self.blob_dir)
            .finish()
    }
}
