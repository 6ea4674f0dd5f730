//! Session lifecycle orchestration over the row store.
//!
//! The service keeps an in-memory snapshot of the single active session,
//! persists every transition through [`Database`], and runs a ticker task
//! that applies the completion transition once the countdown reaches zero.
//! Consumers observe transitions over a broadcast channel.

use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use log::{error, info};
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
    time,
};
use uuid::Uuid;

use crate::{
    clock,
    db::Database,
    models::{Session, SessionStatus},
};

pub const DEFAULT_FOCUS_SECONDS: u64 = 25 * 60;

const DEFAULT_TITLE: &str = "Focus Session";
const EVENT_CHANNEL_CAPACITY: usize = 32;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub default_duration_sec: u64,
    pub tick_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_duration_sec: DEFAULT_FOCUS_SECONDS,
            tick_interval: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone)]
pub enum SessionEvent {
    Created(Session),
    StateChanged(Session),
    Completed(Session),
    Canceled(Session),
}

#[derive(Clone)]
pub struct SessionService {
    db: Database,
    config: SessionConfig,
    active: Arc<Mutex<Option<Session>>>,
    ticker: Arc<Mutex<Option<JoinHandle<()>>>>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionService {
    pub fn new(db: Database, config: SessionConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            db,
            config,
            active: Arc::new(Mutex::new(None)),
            ticker: Arc::new(Mutex::new(None)),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Recover the newest non-terminal session into the snapshot on startup.
    /// A session that was running when the process died keeps counting down.
    pub async fn load_active(&self) -> Result<Option<Session>> {
        let recovered = self.db.get_active_session().await?;

        {
            let mut guard = self.active.lock().await;
            *guard = recovered.clone();
        }

        if let Some(session) = &recovered {
            info!("Recovered active session {} ({})", session.id, session.status.as_str());
            if session.status == SessionStatus::Running {
                self.spawn_ticker().await;
            }
        }

        Ok(recovered)
    }

    pub async fn active_session(&self) -> Option<Session> {
        self.active.lock().await.clone()
    }

    pub async fn remaining_seconds(&self, now: DateTime<Utc>) -> Option<u64> {
        self.active
            .lock()
            .await
            .as_ref()
            .map(|session| clock::remaining_seconds(session, now))
    }

    /// Insert a fresh `created` session. The title is trimmed; an empty one
    /// falls back to the default. Only one non-terminal session may exist.
    pub async fn create_session(
        &self,
        title: &str,
        planned_duration_sec: Option<u64>,
    ) -> Result<Session> {
        let planned_duration_sec = planned_duration_sec.unwrap_or(self.config.default_duration_sec);
        if planned_duration_sec == 0 {
            return Err(anyhow!("planned_duration_sec must be greater than zero"));
        }

        let mut guard = self.active.lock().await;
        if guard.is_some() {
            return Err(anyhow!("a session is already active"));
        }

        let trimmed = title.trim();
        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4().to_string(),
            title: if trimmed.is_empty() { DEFAULT_TITLE.into() } else { trimmed.into() },
            status: SessionStatus::Created,
            planned_duration_sec,
            started_at: None,
            last_resumed_at: None,
            paused_total_sec: 0,
            completed_at: None,
            created_at: now,
            updated_at: now,
        };

        self.db.insert_session(&session).await?;
        *guard = Some(session.clone());
        drop(guard);

        info!("Created session {} ({}s planned)", session.id, session.planned_duration_sec);
        let _ = self.events.send(SessionEvent::Created(session.clone()));
        Ok(session)
    }

    /// created/paused -> running. Starting an already running session is a
    /// no-op returning the current snapshot.
    pub async fn start(&self) -> Result<Session> {
        let mut guard = self.active.lock().await;
        let session = guard
            .as_mut()
            .ok_or_else(|| anyhow!("no active session to start"))?;

        match session.status {
            SessionStatus::Running => return Ok(session.clone()),
            SessionStatus::Created | SessionStatus::Paused => {}
            SessionStatus::Completed | SessionStatus::Canceled => {
                return Err(anyhow!("session {} is already finished", session.id));
            }
        }

        let now = Utc::now();
        if session.started_at.is_none() {
            session.started_at = Some(now);
        }
        session.last_resumed_at = Some(now);
        session.status = SessionStatus::Running;
        session.updated_at = now;
        let snapshot = session.clone();
        drop(guard);

        self.db.start_session_row(&snapshot.id, now).await?;
        self.spawn_ticker().await;

        info!("Session {} running", snapshot.id);
        let _ = self.events.send(SessionEvent::StateChanged(snapshot.clone()));
        Ok(snapshot)
    }

    /// running -> paused, folding the live delta into the persisted
    /// baseline. Pausing a session that is not running (including the
    /// tolerated running-without-resume-timestamp state) is a no-op.
    pub async fn pause(&self) -> Result<Session> {
        let mut guard = self.active.lock().await;
        let session = guard
            .as_mut()
            .ok_or_else(|| anyhow!("no active session to pause"))?;

        let resumed_at = match (session.status, session.last_resumed_at) {
            (SessionStatus::Running, Some(resumed_at)) => resumed_at,
            _ => return Ok(session.clone()),
        };

        let now = Utc::now();
        session.paused_total_sec = session
            .paused_total_sec
            .saturating_add(clock::run_delta_seconds(resumed_at, now));
        session.status = SessionStatus::Paused;
        session.last_resumed_at = None;
        session.updated_at = now;
        let snapshot = session.clone();
        drop(guard);

        self.db
            .pause_session_row(&snapshot.id, snapshot.paused_total_sec, now)
            .await?;
        self.cancel_ticker().await;

        info!(
            "Session {} paused at {}s elapsed",
            snapshot.id, snapshot.paused_total_sec
        );
        let _ = self.events.send(SessionEvent::StateChanged(snapshot.clone()));
        Ok(snapshot)
    }

    /// Any non-terminal status -> completed. The final running delta is
    /// folded into the baseline so elapsed time freezes at this instant.
    pub async fn complete(&self) -> Result<Session> {
        let now = Utc::now();
        let finished = {
            let mut guard = self.active.lock().await;
            let session = guard
                .as_mut()
                .ok_or_else(|| anyhow!("no active session to complete"))?;
            finalize(session, SessionStatus::Completed, now);
            let finished = session.clone();
            *guard = None;
            finished
        };

        self.db
            .complete_session_row(&finished.id, finished.paused_total_sec, now)
            .await?;
        self.cancel_ticker().await;

        info!(
            "Session {} completed with {}s elapsed",
            finished.id, finished.paused_total_sec
        );
        let _ = self.events.send(SessionEvent::Completed(finished.clone()));
        Ok(finished)
    }

    /// Any non-terminal status -> canceled.
    pub async fn cancel(&self) -> Result<Session> {
        let now = Utc::now();
        let canceled = {
            let mut guard = self.active.lock().await;
            let session = guard
                .as_mut()
                .ok_or_else(|| anyhow!("no active session to cancel"))?;
            finalize(session, SessionStatus::Canceled, now);
            let canceled = session.clone();
            *guard = None;
            canceled
        };

        self.db
            .cancel_session_row(&canceled.id, canceled.paused_total_sec, now)
            .await?;
        self.cancel_ticker().await;

        info!("Session {} canceled", canceled.id);
        let _ = self.events.send(SessionEvent::Canceled(canceled.clone()));
        Ok(canceled)
    }

    async fn spawn_ticker(&self) {
        let mut ticker_guard = self.ticker.lock().await;
        if let Some(handle) = ticker_guard.take() {
            handle.abort();
        }

        let active = self.active.clone();
        let db = self.db.clone();
        let events = self.events.clone();
        let tick_interval = self.config.tick_interval;

        let handle = tokio::spawn(async move {
            let mut interval = time::interval(tick_interval);
            loop {
                interval.tick().await;
                let now = Utc::now();

                let finished = {
                    let mut guard = active.lock().await;
                    let session = match guard.as_mut() {
                        Some(session) if session.status == SessionStatus::Running => session,
                        _ => break,
                    };

                    if clock::remaining_seconds(session, now) > 0 {
                        continue;
                    }

                    // Status check above plus the lock make this transition
                    // fire at most once.
                    finalize(session, SessionStatus::Completed, now);
                    let finished = session.clone();
                    *guard = None;
                    finished
                };

                if let Err(err) = db
                    .complete_session_row(&finished.id, finished.paused_total_sec, now)
                    .await
                {
                    error!(
                        "Failed to persist auto-completion for session {}: {err}",
                        finished.id
                    );
                }

                info!(
                    "Session {} completed after reaching its planned duration",
                    finished.id
                );
                let _ = events.send(SessionEvent::Completed(finished));
                break;
            }
        });

        *ticker_guard = Some(handle);
    }

    async fn cancel_ticker(&self) {
        if let Some(handle) = self.ticker.lock().await.take() {
            handle.abort();
        }
    }
}

/// Apply a terminal transition in place: fold any live running delta into
/// the baseline, clear the resume timestamp, stamp `completed_at` when
/// completing.
fn finalize(session: &mut Session, status: SessionStatus, now: DateTime<Utc>) {
    if session.status == SessionStatus::Running {
        if let Some(resumed_at) = session.last_resumed_at {
            session.paused_total_sec = session
                .paused_total_sec
                .saturating_add(clock::run_delta_seconds(resumed_at, now));
        }
    }
    session.status = status;
    session.last_resumed_at = None;
    if status == SessionStatus::Completed {
        session.completed_at = Some(now);
    }
    session.updated_at = now;
}
