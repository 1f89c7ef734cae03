use crate::errors::{DashError, DashResult};
use crate::prefs::KeyValueStore;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};

pub type DbPool = Arc<Mutex<Connection>>;

pub fn init_db(data_dir: &Path) -> DashResult<DbPool> {
    std::fs::create_dir_all(data_dir)?;
    let db_path = data_dir.join("trade_dash.db");
    let conn = Connection::open(&db_path)?;

    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

    let schema = include_str!("../migrations/001_init.sql");
    conn.execute_batch(schema)?;

    tracing::info!("database initialized at {}", db_path.display());
    Ok(Arc::new(Mutex::new(conn)))
}

/// Preference persistence on SQLite. Reads and writes are rare (startup and
/// user edits), so a single locked connection is enough.
#[derive(Clone)]
pub struct SqliteStore {
    db: DbPool,
}

impl SqliteStore {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> DashResult<Option<String>> {
        let conn = self.db.lock().map_err(|e| DashError::Database(format!("lock: {e}")))?;
        let value = conn
            .query_row(
                "SELECT value FROM preferences WHERE key = ?1",
                rusqlite::params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> DashResult<()> {
        let conn = self.db.lock().map_err(|e| DashError::Database(format!("lock poisoned: {e}")))?;
        conn.execute(
            "INSERT OR REPLACE INTO preferences (key, value, updated_at) VALUES (?1, ?2, datetime('now'))",
            rusqlite::params![key, value],
        )?;
        Ok(())
    }
}
