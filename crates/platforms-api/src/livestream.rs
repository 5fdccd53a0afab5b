//! Livestream state record.

use std::hash::{Hash, Hasher};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::{ChannelIdentifier, UniqueStreamKey};

/// Thumbnail urls for a livestream, smallest to largest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThumbnailUrls {
    pub small: Option<String>,
    pub medium: Option<String>,
    pub large: Option<String>,
}

/// Mutable per-stream state record.
///
/// One model per produced livestream. Identity is the
/// [`UniqueStreamKey`] derived from the owning channel's provider and the
/// stream id; mutable fields never affect equality, hashing or set
/// membership. The owning [`ChannelIdentifier`] is immutable after
/// construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LivestreamModel {
    /// Provider-scoped stream id. For offline channels (no active broadcast)
    /// integrations conventionally reuse the channel id here.
    id: String,
    /// Channel this stream belongs to.
    channel: ChannelIdentifier,
    pub display_name: String,
    pub description: String,
    pub game: String,
    pub viewers: u64,
    /// Broadcast start time; `None` whenever the stream is offline.
    pub start_time: Option<DateTime<Utc>>,
    pub live: bool,
    pub thumbnail_urls: ThumbnailUrls,
    pub language: Option<String>,
    pub broadcaster_language: Option<String>,
    /// User opt-out: suppresses "went live" alerts for this stream.
    pub dont_notify: bool,
    pub last_live_time: Option<DateTime<Utc>>,
    pub is_chat_disabled: bool,
}

impl LivestreamModel {
    /// Create an offline model for a stream of the given channel.
    pub fn new(id: impl Into<String>, channel: ChannelIdentifier) -> Self {
        let id = id.into();
        let display_name = channel.display_name_or_id().to_string();
        Self {
            id,
            channel,
            display_name,
            description: String::new(),
            game: String::new(),
            viewers: 0,
            start_time: None,
            live: false,
            thumbnail_urls: ThumbnailUrls::default(),
            language: None,
            broadcaster_language: None,
            dont_notify: false,
            last_live_time: None,
            is_chat_disabled: false,
        }
    }

    /// Provider-scoped stream id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The owning channel.
    pub fn channel(&self) -> &ChannelIdentifier {
        &self.channel
    }

    /// Identity key for equality and deduplication.
    pub fn stream_key(&self) -> UniqueStreamKey {
        UniqueStreamKey::new(self.channel.provider(), &self.id)
    }

    /// How long the stream has been broadcasting, `Some` only while live.
    pub fn uptime(&self, now: DateTime<Utc>) -> Option<Duration> {
        if !self.live {
            return None;
        }
        self.start_time.map(|started| now - started)
    }

    /// Atomic offline transition.
    ///
    /// Clears `live`, `viewers` and `start_time` as one unit. Callers that
    /// share the model with concurrent readers must invoke this under the
    /// lock that guards those readers so the transition is never observed
    /// half-applied.
    pub fn offline(&mut self) {
        self.live = false;
        self.viewers = 0;
        self.start_time = None;
    }

    /// Update mutable display fields from a freshly queried model.
    ///
    /// Identity (`id`, owning channel) and the user-owned `dont_notify`
    /// flag are never touched.
    pub fn refresh_from(&mut self, other: &LivestreamModel) {
        self.display_name = other.display_name.clone();
        self.description = other.description.clone();
        self.game = other.game.clone();
        self.viewers = other.viewers;
        self.start_time = other.start_time;
        self.live = other.live;
        self.thumbnail_urls = other.thumbnail_urls.clone();
        self.language = other.language.clone();
        self.broadcaster_language = other.broadcaster_language.clone();
        self.is_chat_disabled = other.is_chat_disabled;
        if let Some(t) = other.last_live_time {
            self.last_live_time = Some(t);
        }
    }
}

impl PartialEq for LivestreamModel {
    fn eq(&self, other: &Self) -> bool {
        self.stream_key() == other.stream_key()
    }
}

impl Eq for LivestreamModel {}

impl Hash for LivestreamModel {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.stream_key().hash(state);
    }
}

impl std::fmt::Display for LivestreamModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.display_name, self.stream_key())
    }
}
