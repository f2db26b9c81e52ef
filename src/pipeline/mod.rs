//! Processing Pipeline Module
//!
//! ```text
//! ImpulseSource (file replay | stdin)
//!        │ dt
//!        ▼
//! ProcessingLoop ── RowingEngine ── Metrics
//!        │                            │
//!        ├── AppState (REST)          ├── MetricsFeed (web socket)
//!        └── FtmsPeripheral (notifier)
//! ```
//!
//! The API talks back to the loop only through `mpsc` channels, so the
//! engine has a single owner.

mod state;
pub mod processing_loop;
pub mod source;

pub use processing_loop::{LoopChannels, ProcessingLoop, SessionStats};
pub use state::*;
