// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod config;
pub mod dispatch;
pub mod feed;
pub mod filter;
pub mod metrics;
pub mod notify;
pub mod orchestrator;
pub mod score;
pub mod shutdown;
pub mod source;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::feed::{Fetcher, Item};
pub use crate::notify::{Notifier, Story};
pub use crate::orchestrator::{Application, CycleReport, Orchestrator, Settings};
pub use crate::score::{Score, Scorer, ScoringMode};
pub use crate::source::Source;
pub use crate::store::{DedupStore, Snapshot, StoreError};
