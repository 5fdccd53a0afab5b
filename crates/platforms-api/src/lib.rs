//! Shared contract for streaming platform integrations.
//!
//! This crate defines everything a platform integration and the monitoring
//! core agree on: the identity types tying channels and streams to a
//! provider, the mutable [`LivestreamModel`] state record, the
//! [`PlatformApi`] capability contract each platform implements, the
//! name-keyed [`ApiRegistry`], and the [`ParallelQueryExecutor`], the one
//! concurrency primitive every provider integration fans out through.

pub mod error;
pub mod executor;
pub mod identity;
pub mod livestream;
pub mod provider;
pub mod query;
pub mod registry;

pub use error::{ApiError, Result};
pub use executor::{ParallelQueryExecutor, QueryExecutorConfig};
pub use identity::{ChannelIdentifier, UniqueStreamKey};
pub use livestream::LivestreamModel;
pub use provider::{PlatformApi, TopStreamsPage, TopStreamsQuery};
pub use query::{FailedQuery, LivestreamQueryResult};
pub use registry::ApiRegistry;
