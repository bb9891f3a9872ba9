use crate::catalog::CatalogSnapshot;
use crate::command::CommandOutcome;
use crate::model::{Key, Language, LanguageId, Timestamp, Translation, TranslationRequest};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row, Transaction};
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

/// File name of the catalog database inside the data directory.
pub const DATABASE_FILE_NAME: &str = "catalog.db";

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS languages (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        parent_id TEXT,
        created_at TEXT NOT NULL,
        created_by TEXT
    );
    CREATE TABLE IF NOT EXISTS keys (
        id TEXT PRIMARY KEY,
        key TEXT NOT NULL UNIQUE,
        description TEXT,
        created_at TEXT NOT NULL,
        created_by TEXT
    );
    CREATE TABLE IF NOT EXISTS translations (
        id TEXT PRIMARY KEY,
        key_id TEXT NOT NULL,
        language_id TEXT NOT NULL,
        value TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        created_by TEXT,
        UNIQUE (key_id, language_id)
    );
    CREATE TABLE IF NOT EXISTS translation_requests (
        id TEXT PRIMARY KEY,
        key_id TEXT NOT NULL,
        language_id TEXT NOT NULL,
        translation TEXT NOT NULL,
        comment TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        created_by TEXT
    );
";

/// SQLite-backed catalog storage.
///
/// The in-memory catalog stays the read model; this holds the durable copy.
/// Every applied command is written as its delta inside one transaction.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the database at `database_path` and ensure the schema
    pub fn new(database_path: &str) -> Result<Self> {
        let conn = Connection::open(database_path)
            .context(format!("Failed to open database at {}", database_path))?;
        Self::from_connection(conn)
    }

    /// Volatile database, mostly for tests
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)
            .context("Failed to create catalog tables")?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("Database connection lock poisoned"))
    }

    /// Read every stored record
    pub fn load(&self) -> Result<CatalogSnapshot> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            "SELECT id, name, parent_id, created_at, created_by FROM languages ORDER BY id",
        )?;
        let languages = stmt
            .query_map([], |row| {
                Ok(Language {
                    id: LanguageId::from(row.get::<_, String>(0)?),
                    name: row.get(1)?,
                    parent_id: row.get::<_, Option<String>>(2)?.map(LanguageId::from),
                    created_at: timestamp(row, 3)?,
                    created_by: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to load languages")?;

        let mut stmt =
            conn.prepare("SELECT id, key, description, created_at, created_by FROM keys")?;
        let keys = stmt
            .query_map([], |row| {
                Ok(Key {
                    id: parsed(row, 0)?,
                    key: row.get(1)?,
                    description: row.get(2)?,
                    created_at: timestamp(row, 3)?,
                    created_by: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to load keys")?;

        let mut stmt = conn.prepare(
            "SELECT id, key_id, language_id, value, created_at, updated_at, created_by
             FROM translations",
        )?;
        let translations = stmt
            .query_map([], |row| {
                Ok(Translation {
                    id: parsed(row, 0)?,
                    key_id: parsed(row, 1)?,
                    language_id: LanguageId::from(row.get::<_, String>(2)?),
                    value: row.get(3)?,
                    created_at: timestamp(row, 4)?,
                    updated_at: timestamp(row, 5)?,
                    created_by: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to load translations")?;

        let mut stmt = conn.prepare(
            "SELECT id, key_id, language_id, translation, comment, created_at, updated_at, created_by
             FROM translation_requests",
        )?;
        let requests = stmt
            .query_map([], |row| {
                Ok(TranslationRequest {
                    id: parsed(row, 0)?,
                    key_id: parsed(row, 1)?,
                    language_id: LanguageId::from(row.get::<_, String>(2)?),
                    translation: row.get(3)?,
                    comment: row.get(4)?,
                    created_at: timestamp(row, 5)?,
                    updated_at: timestamp(row, 6)?,
                    created_by: row.get(7)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to load translation requests")?;

        info!(
            "Loaded catalog: {} keys, {} languages, {} translations, {} requests",
            keys.len(),
            languages.len(),
            translations.len(),
            requests.len()
        );

        Ok(CatalogSnapshot {
            keys,
            languages,
            translations,
            requests,
        })
    }

    /// Write the delta of one applied command. Nothing is written on error.
    pub fn persist(&self, outcome: &CommandOutcome) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().context("Failed to begin transaction")?;

        write_outcome(&tx, outcome)?;

        tx.commit().context("Failed to commit transaction")?;
        debug!("Persisted {}", outcome_label(outcome));
        Ok(())
    }
}

fn write_outcome(tx: &Transaction<'_>, outcome: &CommandOutcome) -> Result<()> {
    match outcome {
        CommandOutcome::LanguageCreated(language) => {
            tx.execute(
                "INSERT INTO languages (id, name, parent_id, created_at, created_by)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    language.id.as_str(),
                    language.name,
                    language.parent_id.as_ref().map(LanguageId::as_str),
                    language.created_at.to_rfc3339(),
                    language.created_by
                ],
            )
            .context("Failed to insert language")?;
        }
        CommandOutcome::LanguageUpdated(language) => {
            tx.execute(
                "UPDATE languages SET name = ?1, parent_id = ?2 WHERE id = ?3",
                params![
                    language.name,
                    language.parent_id.as_ref().map(LanguageId::as_str),
                    language.id.as_str()
                ],
            )
            .context("Failed to update language")?;
        }
        CommandOutcome::LanguageDeleted {
            deleted, orphaned, ..
        } => {
            for id in deleted {
                tx.execute(
                    "DELETE FROM translations WHERE language_id = ?1",
                    params![id.as_str()],
                )
                .context("Failed to delete translations of language")?;
                tx.execute(
                    "DELETE FROM translation_requests WHERE language_id = ?1",
                    params![id.as_str()],
                )
                .context("Failed to delete translation requests of language")?;
                tx.execute("DELETE FROM languages WHERE id = ?1", params![id.as_str()])
                    .context("Failed to delete language")?;
            }
            for id in orphaned {
                tx.execute(
                    "UPDATE languages SET parent_id = NULL WHERE id = ?1",
                    params![id.as_str()],
                )
                .context("Failed to orphan language")?;
            }
        }
        CommandOutcome::KeyCreated(key) => {
            tx.execute(
                "INSERT INTO keys (id, key, description, created_at, created_by)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    key.id.to_string(),
                    key.key,
                    key.description,
                    key.created_at.to_rfc3339(),
                    key.created_by
                ],
            )
            .context("Failed to insert key")?;
        }
        CommandOutcome::KeyRenamed(key) => {
            tx.execute(
                "UPDATE keys SET key = ?1 WHERE id = ?2",
                params![key.key, key.id.to_string()],
            )
            .context("Failed to rename key")?;
        }
        CommandOutcome::KeyUpdated(key) => {
            tx.execute(
                "UPDATE keys SET description = ?1 WHERE id = ?2",
                params![key.description, key.id.to_string()],
            )
            .context("Failed to update key")?;
        }
        CommandOutcome::KeyDeleted { id, .. } => {
            let id = id.to_string();
            tx.execute("DELETE FROM translations WHERE key_id = ?1", params![id])
                .context("Failed to delete translations of key")?;
            tx.execute(
                "DELETE FROM translation_requests WHERE key_id = ?1",
                params![id],
            )
            .context("Failed to delete translation requests of key")?;
            tx.execute("DELETE FROM keys WHERE id = ?1", params![id])
                .context("Failed to delete key")?;
        }
        CommandOutcome::TranslationSaved { translation, .. } => {
            tx.execute(
                "INSERT INTO translations (id, key_id, language_id, value, created_at, updated_at, created_by)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT (key_id, language_id)
                 DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![
                    translation.id.to_string(),
                    translation.key_id.to_string(),
                    translation.language_id.as_str(),
                    translation.value,
                    translation.created_at.to_rfc3339(),
                    translation.updated_at.to_rfc3339(),
                    translation.created_by
                ],
            )
            .context("Failed to save translation")?;
        }
        CommandOutcome::TranslationDeleted { id } => {
            tx.execute(
                "DELETE FROM translations WHERE id = ?1",
                params![id.to_string()],
            )
            .context("Failed to delete translation")?;
        }
        CommandOutcome::TranslationRequestCreated(request) => {
            tx.execute(
                "INSERT INTO translation_requests
                 (id, key_id, language_id, translation, comment, created_at, updated_at, created_by)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    request.id.to_string(),
                    request.key_id.to_string(),
                    request.language_id.as_str(),
                    request.translation,
                    request.comment,
                    request.created_at.to_rfc3339(),
                    request.updated_at.to_rfc3339(),
                    request.created_by
                ],
            )
            .context("Failed to insert translation request")?;
        }
        CommandOutcome::TranslationRequestUpdated(request) => {
            tx.execute(
                "UPDATE translation_requests SET translation = ?1, comment = ?2, updated_at = ?3
                 WHERE id = ?4",
                params![
                    request.translation,
                    request.comment,
                    request.updated_at.to_rfc3339(),
                    request.id.to_string()
                ],
            )
            .context("Failed to update translation request")?;
        }
    }
    Ok(())
}

fn outcome_label(outcome: &CommandOutcome) -> &'static str {
    match outcome {
        CommandOutcome::LanguageCreated(_) => "language creation",
        CommandOutcome::LanguageUpdated(_) => "language update",
        CommandOutcome::LanguageDeleted { .. } => "language deletion",
        CommandOutcome::KeyCreated(_) => "key creation",
        CommandOutcome::KeyRenamed(_) => "key rename",
        CommandOutcome::KeyUpdated(_) => "key update",
        CommandOutcome::KeyDeleted { .. } => "key deletion",
        CommandOutcome::TranslationSaved { .. } => "translation",
        CommandOutcome::TranslationDeleted { .. } => "translation deletion",
        CommandOutcome::TranslationRequestCreated(_) => "translation request",
        CommandOutcome::TranslationRequestUpdated(_) => "translation request update",
    }
}

fn timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<Timestamp> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parsed<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
