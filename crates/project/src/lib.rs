use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection, Transaction};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

mod context;
pub use context::*;
mod director;
pub use director::*;
mod projects;
pub use projects::*;
mod prompts;
pub use prompts::*;
mod settings;
pub use settings::*;
mod stage;
pub use stage::*;
mod versions;
pub use versions::*;
mod working_copy;
pub use working_copy::*;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage failure: {0}")]
    Storage(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid JSON content: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Document(#[from] timeline::TimelineError),
    #[error("invalid artifact key: {0}")]
    InvalidKey(String),
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
    #[error("no active project selected")]
    NoActiveProject,
    #[error("no active scene selected")]
    NoActiveScene,
}

pub type Result<T, E = StoreError> = std::result::Result<T, E>;

pub fn app_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(std::env::temp_dir);
    base.join("sft_console")
}

pub fn default_db_path() -> PathBuf {
    app_data_dir().join("console.sqlite3")
}

pub(crate) fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

pub(crate) fn millis_to_utc(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().unwrap_or_default()
}

pub struct ProjectDb {
    conn: Connection,
    path: PathBuf,
}

impl ProjectDb {
    pub fn open_or_create(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "cache_size", "-20000")?;
        Self::init(conn, path.to_path_buf())
    }

    /// Throwaway store, mostly for tests and dry runs.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Self::init(conn, PathBuf::from(":memory:"))
    }

    fn init(conn: Connection, path: PathBuf) -> Result<Self> {
        apply_migrations(&conn)?;
        let db = Self { conn, path };
        db.ensure_default_settings()?;
        tracing::debug!(target: "store", "opened store at {}", db.path.display());
        Ok(db)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn begin_tx(&self) -> Result<Transaction<'_>> {
        Ok(self.conn.unchecked_transaction()?)
    }
}

const MIGRATIONS: &[(&str, &str)] = &[
    ("V0001__init", include_str!("../migrations/V0001__init.sql")),
    ("V0002__settings", include_str!("../migrations/V0002__settings.sql")),
    (
        "V0003__version_history",
        include_str!("../migrations/V0003__version_history.sql"),
    ),
];

fn apply_migrations(conn: &Connection) -> Result<()> {
    for (name, sql) in MIGRATIONS {
        conn.execute_batch(sql)?;
        conn.execute(
            "INSERT OR IGNORE INTO migrations(name, applied_at) VALUES(?1, strftime('%s','now'))",
            params![name],
        )?;
    }
    Ok(())
}
