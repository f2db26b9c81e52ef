//! Application State and System Status
//!
//! Shared state for the rowing monitor, written by the impulse processing
//! loop and read by the API handlers.

use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::types::{Metrics, SessionState};

// ============================================================================
// Application State
// ============================================================================

/// Shared application state accessible from API handlers and the
/// processing loop.
///
/// Wrapped in `Arc<RwLock<>>` for access across the async runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppState {
    /// System uptime (not serialized)
    #[serde(skip, default = "Instant::now")]
    pub uptime: Instant,

    /// Current system status
    pub status: SystemStatus,

    /// Name of the impulse source being processed
    pub source_name: Option<String>,

    /// Impulses processed since startup
    pub impulses_processed: u64,

    /// Time of the latest published snapshot
    pub last_update: Option<chrono::DateTime<chrono::Utc>>,

    /// Latest published metrics snapshot
    pub latest_metrics: Metrics,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            uptime: Instant::now(),
            status: SystemStatus::Initializing,
            source_name: None,
            impulses_processed: 0,
            last_update: None,
            latest_metrics: Metrics::default(),
        }
    }
}

impl AppState {
    /// Store a new snapshot and derive the status from it.
    pub fn publish(&mut self, metrics: Metrics) {
        self.status = match metrics.session_state {
            Some(SessionState::Rowing) => SystemStatus::Rowing,
            Some(SessionState::Paused) => SystemStatus::Paused,
            Some(SessionState::WaitingForStart) | None => SystemStatus::Idle,
        };
        self.latest_metrics = metrics;
        self.last_update = Some(chrono::Utc::now());
    }

    pub fn uptime_secs(&self) -> u64 {
        self.uptime.elapsed().as_secs()
    }
}

// ============================================================================
// Commands
// ============================================================================

/// Requests from the API towards the processing loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    /// Start a new session, keeping heart-rate values
    Reset,
}

// ============================================================================
// System Status
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SystemStatus {
    /// System is starting up
    Initializing,
    /// Source connected, no session in progress
    Idle,
    Rowing,
    Paused,
    /// Source exhausted or failed
    SourceEnded,
}

impl std::fmt::Display for SystemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SystemStatus::Initializing => write!(f, "Initializing"),
            SystemStatus::Idle => write!(f, "Idle"),
            SystemStatus::Rowing => write!(f, "Rowing"),
            SystemStatus::Paused => write!(f, "Paused"),
            SystemStatus::SourceEnded => write!(f, "Source Ended"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state() {
        let state = AppState::default();
        assert_eq!(state.status, SystemStatus::Initializing);
        assert_eq!(state.impulses_processed, 0);
        assert!(state.last_update.is_none());
    }

    #[test]
    fn test_publish_derives_status() {
        let mut state = AppState::default();
        state.publish(Metrics {
            session_state: Some(SessionState::Rowing),
            ..Metrics::default()
        });
        assert_eq!(state.status, SystemStatus::Rowing);
        assert!(state.last_update.is_some());

        state.publish(Metrics::default());
        assert_eq!(state.status, SystemStatus::Idle);
    }
}
