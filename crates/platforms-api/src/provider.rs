//! Platform capability contract.
//!
//! Every streaming platform integration implements [`PlatformApi`]. The
//! monitoring core never talks to a platform any other way: capability
//! flags describe what the platform can do, and optional operations
//! default to [`ApiError::NotSupported`] so integrations only implement
//! what their platform actually offers.

use async_trait::async_trait;

use crate::error::{ApiError, Result};
use crate::identity::ChannelIdentifier;
use crate::livestream::LivestreamModel;

/// Query parameters for a top-streams page.
#[derive(Debug, Clone, Default)]
pub struct TopStreamsQuery {
    /// Number of results to skip.
    pub skip: usize,
    /// Maximum number of results to return.
    pub take: usize,
    /// Restrict results to one game/category.
    pub game: Option<String>,
}

impl TopStreamsQuery {
    /// Build the query for page `page_index` (0-based) of `page_size` results.
    pub fn page(page_index: usize, page_size: usize) -> Self {
        Self {
            skip: page_index * page_size,
            take: page_size,
            game: None,
        }
    }

    /// Restrict the query to one game/category.
    pub fn with_game(mut self, game: impl Into<String>) -> Self {
        self.game = Some(game.into());
        self
    }
}

/// One page of top-streams results.
///
/// Providers return streams ordered by descending viewer count; callers
/// that page rely on that ordering only as a performance heuristic, never
/// for correctness.
#[derive(Debug, Default)]
pub struct TopStreamsPage {
    pub streams: Vec<LivestreamModel>,
    pub has_next_page: bool,
}

/// Capability contract implemented by every streaming platform integration.
///
/// Implementations are thin REST translators; the monitoring core owns all
/// concurrency, reconciliation and notification policy. Every method that
/// performs network I/O is an async boundary, and [`query_channel`] must
/// return a freshly constructed model on every call: callers may discard
/// late results after a timeout, so returned models must never alias
/// previously shared state.
///
/// [`query_channel`]: PlatformApi::query_channel
#[async_trait]
pub trait PlatformApi: Send + Sync {
    /// Registry key for this platform, e.g. `"twitchtv"`.
    fn name(&self) -> &str;

    /// Whether the platform exposes a top/popular streams listing.
    fn has_top_streams_support(&self) -> bool {
        false
    }

    /// Whether the platform exposes a chat for its streams.
    fn has_chat_support(&self) -> bool {
        false
    }

    /// Whether the platform reports viewer counts for recorded videos.
    fn has_vod_viewer_support(&self) -> bool {
        false
    }

    /// Whether the platform can list online channels in one call.
    ///
    /// When `true`, [`query_online_channels`] is used first during a
    /// refresh and only channels absent from its result are queried
    /// individually.
    ///
    /// [`query_online_channels`]: PlatformApi::query_online_channels
    fn has_bulk_online_lookup(&self) -> bool {
        false
    }

    /// Whether the platform can enumerate the channels an account follows.
    fn has_follow_import(&self) -> bool {
        false
    }

    /// Whether the integration currently holds valid credentials.
    fn is_authorized(&self) -> bool;

    /// Acquire or refresh credentials. Returns `true` once authorized.
    ///
    /// Authorization failures surface synchronously to the caller since
    /// they require user action.
    async fn authorize(&self) -> Result<bool>;

    /// Query the current state of a single channel.
    ///
    /// Returns a model with `live == false` when the channel exists but is
    /// not broadcasting. A missing channel is [`ApiError::ChannelNotFound`].
    async fn query_channel(&self, channel: &ChannelIdentifier) -> Result<LivestreamModel>;

    /// Bulk lookup: which of the given channels are online right now.
    ///
    /// Only returns models for channels that are currently live; absence
    /// from the result does not distinguish offline from nonexistent.
    async fn query_online_channels(
        &self,
        _channels: &[ChannelIdentifier],
    ) -> Result<Vec<LivestreamModel>> {
        Err(ApiError::not_supported(
            self.name().to_string(),
            "bulk online lookup",
        ))
    }

    /// Fetch one page of the platform-wide top streams listing.
    async fn get_top_streams(&self, _query: &TopStreamsQuery) -> Result<TopStreamsPage> {
        Err(ApiError::not_supported(
            self.name().to_string(),
            "top streams",
        ))
    }

    /// Enumerate the channels followed by the given account.
    async fn get_followed_channels(&self, _user_name: &str) -> Result<Vec<ChannelIdentifier>> {
        Err(ApiError::not_supported(
            self.name().to_string(),
            "follow import",
        ))
    }

    /// Provider-side bookkeeping when a channel starts being monitored.
    async fn add_channel(&self, _channel: &ChannelIdentifier) -> Result<()> {
        Ok(())
    }

    /// Provider-side bookkeeping when a channel stops being monitored.
    async fn remove_channel(&self, _channel: &ChannelIdentifier) -> Result<()> {
        Ok(())
    }
}
