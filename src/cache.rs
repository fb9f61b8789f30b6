//! Refreshable values: stale-tolerant snapshots and renewable session tokens.

pub mod refresher;
pub mod snapshot;
pub mod token;
