//! SQLite-backed session row store.
//!
//! A dedicated worker thread owns the connection; async callers submit
//! closures over an mpsc channel and await the result on a oneshot. The
//! stats engine only reads through [`Database::completed_timestamps_between`];
//! all writes go through the session service.

use std::{
    convert::TryFrom,
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use log::{error, info};
use rusqlite::{params, Connection, Row};
use tokio::sync::oneshot;

mod migrations;

use crate::models::{Session, SessionStatus};
use migrations::run_migrations;

type DbTask = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum DbCommand {
    Execute(DbTask),
    Shutdown,
}

struct DatabaseInner {
    sender: mpsc::Sender<DbCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for DatabaseInner {
    fn drop(&mut self) {
        let mut guard = match self.worker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(handle) = guard.take() {
            if let Err(err) = self.sender.send(DbCommand::Shutdown) {
                error!("Failed to send shutdown to DB thread: {err}");
            }
            if let Err(join_err) = handle.join() {
                error!("Failed to join DB thread: {join_err:?}");
            }
        }
    }
}

fn to_i64(value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|_| anyhow!("value {value} exceeds SQLite INTEGER range"))
}

fn to_u64(value: i64, field: &str) -> Result<u64> {
    u64::try_from(value).map_err(|_| anyhow!("{field} contains negative value {value}"))
}

fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field} '{value}'"))
}

fn parse_optional_datetime(value: Option<String>, field: &str) -> Result<Option<DateTime<Utc>>> {
    match value {
        Some(raw) => parse_datetime(&raw, field).map(Some),
        None => Ok(None),
    }
}

fn status_from_str(value: &str) -> Result<SessionStatus> {
    match value {
        "created" => Ok(SessionStatus::Created),
        "running" => Ok(SessionStatus::Running),
        "paused" => Ok(SessionStatus::Paused),
        "completed" => Ok(SessionStatus::Completed),
        "canceled" => Ok(SessionStatus::Canceled),
        other => Err(anyhow!("unknown session status '{other}'")),
    }
}

const SESSION_COLUMNS: &str = "id, title, status, planned_duration_sec, started_at, \
     last_resumed_at, paused_total_sec, completed_at, created_at, updated_at";

fn row_to_session(row: &Row<'_>) -> Result<Session> {
    let status: String = row.get("status")?;
    let planned_duration_sec: i64 = row.get("planned_duration_sec")?;
    let started_at: Option<String> = row.get("started_at")?;
    let last_resumed_at: Option<String> = row.get("last_resumed_at")?;
    let paused_total_sec: i64 = row.get("paused_total_sec")?;
    let completed_at: Option<String> = row.get("completed_at")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;

    Ok(Session {
        id: row.get("id")?,
        title: row.get("title")?,
        status: status_from_str(&status)?,
        planned_duration_sec: to_u64(planned_duration_sec, "planned_duration_sec")?,
        started_at: parse_optional_datetime(started_at, "started_at")?,
        last_resumed_at: parse_optional_datetime(last_resumed_at, "last_resumed_at")?,
        paused_total_sec: to_u64(paused_total_sec, "paused_total_sec")?,
        completed_at: parse_optional_datetime(completed_at, "completed_at")?,
        created_at: parse_datetime(&created_at, "created_at")?,
        updated_at: parse_datetime(&updated_at, "updated_at")?,
    })
}

#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
    db_path: Arc<PathBuf>,
}

impl Database {
    pub fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }

        let (command_tx, command_rx) = mpsc::channel::<DbCommand>();
        let (ready_tx, ready_rx) = mpsc::channel();
        let path_for_thread = db_path.clone();

        let worker = thread::Builder::new()
            .name("focus-sprint-db".into())
            .spawn(move || {
                let mut conn = match Connection::open(&path_for_thread) {
                    Ok(connection) => connection,
                    Err(err) => {
                        let _ = ready_tx.send(
                            Err(anyhow::Error::new(err).context("failed to open SQLite database")),
                        );
                        return;
                    }
                };

                if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
                    error!("Failed to enable WAL mode: {err}");
                }
                if let Err(err) = conn.pragma_update(None, "foreign_keys", "ON") {
                    error!("Failed to enable foreign keys: {err}");
                }

                let init_result =
                    run_migrations(&mut conn).context("failed to run database migrations");
                if ready_tx.send(init_result).is_err() {
                    error!("DB initialization receiver dropped before ready signal");
                    return;
                }

                while let Ok(command) = command_rx.recv() {
                    match command {
                        DbCommand::Execute(task) => {
                            task(&mut conn);
                        }
                        DbCommand::Shutdown => break,
                    }
                }

                info!("Database thread shutting down");
            })
            .with_context(|| "failed to spawn database worker thread")?;

        ready_rx
            .recv()
            .context("database worker exited before signaling readiness")??;

        info!("Database initialized at {}", db_path.as_path().display());

        Ok(Self {
            inner: Arc::new(DatabaseInner {
                sender: command_tx,
                worker: Mutex::new(Some(worker)),
            }),
            db_path: Arc::new(db_path),
        })
    }

    pub fn path(&self) -> &Path {
        self.db_path.as_path()
    }

    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let sender = self.inner.sender.clone();
        let (reply_tx, reply_rx) = oneshot::channel();

        let command = DbCommand::Execute(Box::new(move |conn| {
            let result = task(conn);
            if reply_tx.send(result).is_err() {
                error!("DB caller dropped before receiving result");
            }
        }));

        sender
            .send(command)
            .map_err(|err| anyhow!("failed to send command to DB thread: {err}"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("database thread terminated unexpectedly"))?
    }

    pub async fn insert_session(&self, session: &Session) -> Result<()> {
        let record = session.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO sessions (id, title, status, planned_duration_sec, started_at, \
                     last_resumed_at, paused_total_sec, completed_at, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    record.id,
                    record.title,
                    record.status.as_str(),
                    to_i64(record.planned_duration_sec)?,
                    record.started_at.as_ref().map(|dt| dt.to_rfc3339()),
                    record.last_resumed_at.as_ref().map(|dt| dt.to_rfc3339()),
                    to_i64(record.paused_total_sec)?,
                    record.completed_at.as_ref().map(|dt| dt.to_rfc3339()),
                    record.created_at.to_rfc3339(),
                    record.updated_at.to_rfc3339(),
                ],
            )
            .with_context(|| "failed to insert session")?;
            Ok(())
        })
        .await
    }

    pub async fn get_session(&self, session_id: &str) -> Result<Session> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1"
            ))?;

            let mut rows = stmt.query(params![session_id])?;
            match rows.next()? {
                Some(row) => row_to_session(row),
                None => Err(anyhow!("session {session_id} not found")),
            }
        })
        .await
    }

    /// The newest non-terminal session, if any. This is the row the service
    /// recovers into its in-memory snapshot on startup.
    pub async fn get_active_session(&self) -> Result<Option<Session>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM sessions
                 WHERE status IN ('created', 'running', 'paused')
                 ORDER BY created_at DESC
                 LIMIT 1"
            ))?;

            let mut rows = stmt.query([])?;
            let session = match rows.next()? {
                Some(row) => Some(row_to_session(row)?),
                None => None,
            };
            Ok(session)
        })
        .await
    }

    /// created/paused -> running. `started_at` is only written on the first
    /// start; later resumes leave it untouched.
    pub async fn start_session_row(
        &self,
        session_id: &str,
        resumed_at: DateTime<Utc>,
    ) -> Result<()> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            conn.execute(
                "UPDATE sessions
                 SET status = 'running',
                     started_at = COALESCE(started_at, ?1),
                     last_resumed_at = ?1,
                     updated_at = ?1
                 WHERE id = ?2",
                params![resumed_at.to_rfc3339(), session_id],
            )
            .with_context(|| "failed to mark session running")?;
            Ok(())
        })
        .await
    }

    /// running -> paused, with the live delta already folded into
    /// `paused_total_sec` by the caller.
    pub async fn pause_session_row(
        &self,
        session_id: &str,
        paused_total_sec: u64,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            conn.execute(
                "UPDATE sessions
                 SET status = 'paused',
                     paused_total_sec = ?1,
                     last_resumed_at = NULL,
                     updated_at = ?2
                 WHERE id = ?3",
                params![to_i64(paused_total_sec)?, updated_at.to_rfc3339(), session_id],
            )
            .with_context(|| "failed to mark session paused")?;
            Ok(())
        })
        .await
    }

    pub async fn complete_session_row(
        &self,
        session_id: &str,
        paused_total_sec: u64,
        completed_at: DateTime<Utc>,
    ) -> Result<()> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            conn.execute(
                "UPDATE sessions
                 SET status = 'completed',
                     paused_total_sec = ?1,
                     completed_at = ?2,
                     last_resumed_at = NULL,
                     updated_at = ?2
                 WHERE id = ?3",
                params![
                    to_i64(paused_total_sec)?,
                    completed_at.to_rfc3339(),
                    session_id
                ],
            )
            .with_context(|| "failed to mark session completed")?;
            Ok(())
        })
        .await
    }

    pub async fn cancel_session_row(
        &self,
        session_id: &str,
        paused_total_sec: u64,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            conn.execute(
                "UPDATE sessions
                 SET status = 'canceled',
                     paused_total_sec = ?1,
                     last_resumed_at = NULL,
                     updated_at = ?2
                 WHERE id = ?3",
                params![to_i64(paused_total_sec)?, updated_at.to_rfc3339(), session_id],
            )
            .with_context(|| "failed to mark session canceled")?;
            Ok(())
        })
        .await
    }

    /// Completion instants inside an inclusive absolute-time window. RFC3339
    /// text with a fixed UTC offset compares lexicographically, so the range
    /// filter runs directly on the stored column.
    pub async fn completed_timestamps_between(
        &self,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<Vec<DateTime<Utc>>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT completed_at FROM sessions
                 WHERE status = 'completed'
                   AND completed_at IS NOT NULL
                   AND completed_at >= ?1
                   AND completed_at <= ?2
                 ORDER BY completed_at ASC",
            )?;

            let mut rows = stmt.query(params![
                window_start.to_rfc3339(),
                window_end.to_rfc3339()
            ])?;
            let mut timestamps = Vec::new();
            while let Some(row) = rows.next()? {
                let raw: String = row.get(0)?;
                timestamps.push(parse_datetime(&raw, "completed_at")?);
            }

            Ok(timestamps)
        })
        .await
    }
}
