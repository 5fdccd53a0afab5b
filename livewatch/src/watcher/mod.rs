//! Popular livestream watching.

mod dedup;
mod service;

pub use dedup::ExpiringKeyCache;
pub use service::{PopularLivestreamWatcher, WatcherConfig};
