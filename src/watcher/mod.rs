//! Filesystem watching and rebuild orchestration.
//!
//! # Architecture
//!
//! ```text
//! WatchTree
//!   - notify::RecommendedWatcher
//!   - dynamic, growing set of directory subscriptions
//!         | raw events (mpsc, single consumer)
//! RebuildOrchestrator
//!   - name filter -> fingerprint dedup -> Builder -> publish
//!         |
//! served root  <- read concurrently by the HTTP layer
//! ```

mod error;
mod rebuild;
mod tree;

pub use error::WatchError;
pub use rebuild::RebuildOrchestrator;
pub use tree::WatchTree;
