pub mod service;

pub use service::{SessionConfig, SessionEvent, SessionService, DEFAULT_FOCUS_SECONDS};
