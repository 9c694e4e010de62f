// ilog Kernel
//
// Indexed, append-only log persisted on an ordered key-value store.

pub mod adapters;
pub mod config;
pub mod invariants;
pub mod log;
pub mod replay;

pub use config::LogConfig;
pub use log::{Index, IndexedLog, LogError, EMPTY_INDEX};
