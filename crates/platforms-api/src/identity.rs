//! Identity types tying channels and livestreams to a provider.

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Identifies a monitored channel on one provider.
///
/// Equality and hashing consider only `(provider, channel_id)`; both are
/// immutable after construction. `display_name` is a mutable cache of the
/// last known human-readable name and `imported_by` records which account
/// import brought the channel in; neither affects identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelIdentifier {
    provider: String,
    channel_id: String,
    pub display_name: Option<String>,
    pub imported_by: Option<String>,
}

impl ChannelIdentifier {
    /// Create a new channel identifier.
    pub fn new(provider: impl Into<String>, channel_id: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            channel_id: channel_id.into(),
            display_name: None,
            imported_by: None,
        }
    }

    /// Set the cached display name.
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    /// Record the account import this channel came from.
    pub fn with_imported_by(mut self, imported_by: impl Into<String>) -> Self {
        self.imported_by = Some(imported_by.into());
        self
    }

    /// Provider name this channel belongs to.
    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// Provider-scoped channel id.
    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    /// Best human-readable name available: the cached display name, or the
    /// raw channel id when none has been seen yet.
    pub fn display_name_or_id(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.channel_id)
    }
}

impl PartialEq for ChannelIdentifier {
    fn eq(&self, other: &Self) -> bool {
        self.provider == other.provider && self.channel_id == other.channel_id
    }
}

impl Eq for ChannelIdentifier {}

impl Hash for ChannelIdentifier {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.provider.hash(state);
        self.channel_id.hash(state);
    }
}

impl std::fmt::Display for ChannelIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.provider, self.channel_id)
    }
}

/// Identifies one produced livestream on one provider.
///
/// Distinct from [`ChannelIdentifier`]: a channel is the monitored source,
/// while a stream is a concrete broadcast session. Some providers allow a
/// channel to produce several concurrent livestreams. Stream ids are
/// compared case-insensitively.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UniqueStreamKey {
    provider: String,
    stream_id: String,
}

impl UniqueStreamKey {
    /// Create a new stream key.
    pub fn new(provider: impl Into<String>, stream_id: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            stream_id: stream_id.into(),
        }
    }

    /// Provider name the stream belongs to.
    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// Provider-scoped stream id.
    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }
}

impl PartialEq for UniqueStreamKey {
    fn eq(&self, other: &Self) -> bool {
        self.provider == other.provider && self.stream_id.eq_ignore_ascii_case(&other.stream_id)
    }
}

impl Eq for UniqueStreamKey {}

impl Hash for UniqueStreamKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.provider.hash(state);
        self.stream_id.to_ascii_lowercase().hash(state);
    }
}

impl std::fmt::Display for UniqueStreamKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.provider, self.stream_id)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_channel_identity_ignores_mutable_fields() {
        let a = ChannelIdentifier::new("twitchtv", "shroud").with_display_name("Shroud");
        let b = ChannelIdentifier::new("twitchtv", "shroud").with_imported_by("someone");
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn test_channel_identity_distinguishes_provider() {
        let a = ChannelIdentifier::new("twitchtv", "shroud");
        let b = ChannelIdentifier::new("youtube", "shroud");
        assert_ne!(a, b);
    }

    #[test]
    fn test_stream_key_case_insensitive() {
        let a = UniqueStreamKey::new("twitchtv", "Shroud");
        let b = UniqueStreamKey::new("twitchtv", "shroud");
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn test_stream_key_provider_sensitive() {
        let a = UniqueStreamKey::new("twitchtv", "shroud");
        let b = UniqueStreamKey::new("youtube", "shroud");
        assert_ne!(a, b);
    }

    #[test]
    fn test_display_name_or_id_fallback() {
        let plain = ChannelIdentifier::new("twitchtv", "shroud");
        assert_eq!(plain.display_name_or_id(), "shroud");

        let named = plain.clone().with_display_name("Shroud");
        assert_eq!(named.display_name_or_id(), "Shroud");
    }
}
