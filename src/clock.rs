//! Pure elapsed/remaining time accounting over a session snapshot.
//!
//! All temporal inputs arrive as explicit parameters, so the functions here
//! are deterministic and side-effect free. Callers poll
//! [`remaining_seconds`] against a fresh `now` to detect countdown
//! completion; triggering the completion transition at most once is the
//! caller's job, not this module's.

use chrono::{DateTime, Utc};

use crate::models::{Session, SessionStatus};

/// Whole seconds elapsed between a resume boundary and `now`, floored at
/// zero so clock skew never yields a negative delta, and floored to whole
/// seconds so no fractional second is ever credited.
pub fn run_delta_seconds(last_resumed_at: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    (now - last_resumed_at).num_seconds().max(0) as u64
}

/// Elapsed active seconds for `session` as observed at `now`.
///
/// A `Running` session without `last_resumed_at` can arise from a partially
/// applied external update; it is tolerated by reporting the persisted
/// baseline with no live delta. Terminal sessions report their frozen
/// baseline: the service folds the final running delta into
/// `paused_total_sec` when it applies a terminal transition.
pub fn elapsed_seconds(session: &Session, now: DateTime<Utc>) -> u64 {
    match session.status {
        SessionStatus::Created => 0,
        SessionStatus::Paused | SessionStatus::Completed | SessionStatus::Canceled => {
            session.paused_total_sec
        }
        SessionStatus::Running => match session.last_resumed_at {
            Some(resumed_at) => session
                .paused_total_sec
                .saturating_add(run_delta_seconds(resumed_at, now)),
            None => session.paused_total_sec,
        },
    }
}

/// Seconds left until the planned duration is spent. Never negative;
/// reaches exactly zero once the planned duration has elapsed.
pub fn remaining_seconds(session: &Session, now: DateTime<Utc>) -> u64 {
    session
        .planned_duration_sec
        .saturating_sub(elapsed_seconds(session, now))
}
