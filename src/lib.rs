//! focus-sprint backend: pomodoro session lifecycle over a SQLite row store
//! plus timezone-aware completion statistics.
//!
//! The two cores — [`clock`] for pause/resume time accounting and [`stats`]
//! for calendar bucketing — are pure functions over explicit temporal
//! inputs. [`session::SessionService`] and [`db::Database`] supply the
//! orchestration and persistence around them.

pub mod clock;
pub mod db;
pub mod models;
pub mod session;
pub mod settings;
pub mod stats;

pub use db::Database;
pub use models::{Session, SessionStatus, StatsBar, StatsRange, StatsSummary};
pub use session::{SessionConfig, SessionEvent, SessionService, DEFAULT_FOCUS_SECONDS};
pub use settings::SettingsStore;
pub use stats::completed_session_stats;

/// Initialize logging (reads RUST_LOG env var).
pub fn init_logging() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();
}
