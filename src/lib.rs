//! Watch a documentation source tree, rebuild derived output on real content
//! changes, and serve the result over HTTP with live request counters.
//!
//! The pipeline: [`watcher::WatchTree`] emits raw filesystem events to the
//! single-consumer [`watcher::RebuildOrchestrator`], which deduplicates by
//! content fingerprint, invokes the external [`builder::Builder`], and
//! publishes the output tree through [`publish`]. The [`serve`] layer reads
//! the published tree concurrently and records counters per response class.

pub mod builder;
pub mod config;
pub mod fingerprint;
pub mod logging;
pub mod publish;
pub mod serve;
pub mod watcher;

pub use builder::{BuildError, Builder, CommandBuilder};
pub use config::Settings;
pub use fingerprint::{FingerprintCache, file_digest};
pub use publish::{PublishError, publish, reset_served_root};
pub use serve::{ServeState, StatsRegistry};
pub use watcher::{RebuildOrchestrator, WatchError, WatchTree};
