// src/db.rs
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, Row};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::APP_CONFIG_DIR;
use crate::session::CompletedSession;

const DB_FILE_NAME: &str = "train_now.sqlite";
const DATA_DIR_ENV_VAR: &str = "TRAIN_NOW_DATA_DIR";

// Custom Error type for DB operations
#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database connection failed")]
    Connection(#[from] rusqlite::Error),
    #[error("Failed to get application data directory")]
    DataDir,
    #[error("I/O error accessing database file")]
    Io(#[from] std::io::Error),
    #[error("Database query failed: {0}")]
    QueryFailed(rusqlite::Error),
    #[error("Database insert failed: {0}")]
    InsertFailed(rusqlite::Error),
}

/// A finished session as stored locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub id: i64,
    pub program_name: String,
    pub completed_on: NaiveDate,
    pub recorded_at: DateTime<Utc>,
    /// (exercise name, note) in program order.
    pub notes: Vec<(String, String)>,
}

/// Gets the path to the SQLite database file within the app's data directory.
/// Creates the directory if it doesn't exist.
pub fn get_db_path() -> Result<PathBuf, DbError> {
    let app_dir = match std::env::var(DATA_DIR_ENV_VAR) {
        Ok(dir) => PathBuf::from(dir),
        Err(_) => dirs::data_dir().ok_or(DbError::DataDir)?.join(APP_CONFIG_DIR),
    };
    if !app_dir.exists() {
        std::fs::create_dir_all(&app_dir)?;
    }
    Ok(app_dir.join(DB_FILE_NAME))
}

/// Opens a connection to the SQLite database.
pub fn open_db<P: AsRef<Path>>(path: P) -> Result<Connection, DbError> {
    let conn = Connection::open(path).map_err(DbError::Connection)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;
    Ok(conn)
}

/// Initializes the database tables if they don't exist.
pub fn init_db(conn: &Connection) -> Result<(), DbError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS completions (
            date TEXT PRIMARY KEY NOT NULL    -- YYYY-MM-DD, one row per day
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS sessions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            program_name TEXT NOT NULL,
            completed_on TEXT NOT NULL,        -- YYYY-MM-DD
            recorded_at TEXT NOT NULL          -- RFC3339
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS session_notes (
            session_id INTEGER NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
            position INTEGER NOT NULL,
            exercise_name TEXT NOT NULL,
            note TEXT NOT NULL,
            PRIMARY KEY (session_id, exercise_name)
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_sessions_completed_on ON sessions(completed_on)",
        [],
    )?;

    Ok(())
}

/// Marks `date` as a training day. Returns `false` if it was already marked.
pub fn add_completion(conn: &Connection, date: NaiveDate) -> Result<bool, DbError> {
    let rows = conn
        .execute(
            "INSERT OR IGNORE INTO completions (date) VALUES (?1)",
            params![date],
        )
        .map_err(DbError::InsertFailed)?;
    Ok(rows == 1)
}

/// All training days, oldest first.
pub fn list_completions(conn: &Connection) -> Result<Vec<NaiveDate>, DbError> {
    let mut stmt = conn
        .prepare("SELECT date FROM completions ORDER BY date ASC")
        .map_err(DbError::QueryFailed)?;
    let dates = stmt
        .query_map([], |row| row.get(0))
        .map_err(DbError::QueryFailed)?
        .collect::<Result<Vec<NaiveDate>, _>>()
        .map_err(DbError::QueryFailed)?;
    Ok(dates)
}

/// Stores a finished session with its notes and marks its day, in one transaction.
pub fn record_session(conn: &mut Connection, session: &CompletedSession) -> Result<i64, DbError> {
    let tx = conn.transaction().map_err(DbError::Connection)?;

    add_completion(&tx, session.completed_on)?;

    tx.execute(
        "INSERT INTO sessions (program_name, completed_on, recorded_at) VALUES (?1, ?2, ?3)",
        params![session.program_name, session.completed_on, Utc::now()],
    )
    .map_err(DbError::InsertFailed)?;
    let session_id = tx.last_insert_rowid();

    for (position, (exercise_name, note)) in session.notes.iter().enumerate() {
        tx.execute(
            "INSERT INTO session_notes (session_id, position, exercise_name, note)
             VALUES (?1, ?2, ?3, ?4)",
            params![session_id, position as i64, exercise_name, note],
        )
        .map_err(DbError::InsertFailed)?;
    }

    tx.commit().map_err(DbError::Connection)?;
    Ok(session_id)
}

fn map_row_to_session(row: &Row) -> Result<SessionRecord, rusqlite::Error> {
    Ok(SessionRecord {
        id: row.get(0)?,
        program_name: row.get(1)?,
        completed_on: row.get(2)?,
        recorded_at: row.get(3)?,
        notes: Vec::new(),
    })
}

/// Most recent sessions first, with their notes.
pub fn list_sessions(conn: &Connection, limit: u32) -> Result<Vec<SessionRecord>, DbError> {
    let mut stmt = conn
        .prepare(
            "SELECT id, program_name, completed_on, recorded_at FROM sessions
             ORDER BY completed_on DESC, id DESC LIMIT ?1",
        )
        .map_err(DbError::QueryFailed)?;
    let mut sessions = stmt
        .query_map(params![limit], map_row_to_session)
        .map_err(DbError::QueryFailed)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(DbError::QueryFailed)?;

    let mut notes_stmt = conn
        .prepare(
            "SELECT exercise_name, note FROM session_notes
             WHERE session_id = ?1 ORDER BY position ASC",
        )
        .map_err(DbError::QueryFailed)?;
    for session in &mut sessions {
        session.notes = notes_stmt
            .query_map(params![session.id], |row| Ok((row.get(0)?, row.get(1)?)))
            .map_err(DbError::QueryFailed)?
            .collect::<Result<Vec<(String, String)>, _>>()
            .map_err(DbError::QueryFailed)?;
    }
    Ok(sessions)
}
