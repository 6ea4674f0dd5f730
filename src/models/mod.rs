mod session;
mod stats;

pub use session::{Session, SessionStatus};
pub use stats::{StatsBar, StatsRange, StatsSummary};
