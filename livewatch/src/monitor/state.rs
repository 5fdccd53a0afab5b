//! Per-channel monitoring state.

use serde::{Deserialize, Serialize};

/// Monitoring state of one channel.
///
/// A channel starts `Unknown` and moves to `Online`, `Offline` or
/// `QueryFailed` with each query outcome. `QueryFailed` never affects
/// roster membership; the channel keeps its last displayed field values
/// and is retried on the next cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChannelState {
    /// Not yet queried.
    #[default]
    Unknown,
    /// At least one of the channel's streams is live.
    Online,
    /// The channel exists and is not broadcasting.
    Offline,
    /// The last query for this channel failed.
    QueryFailed,
}

impl ChannelState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "UNKNOWN",
            Self::Online => "ONLINE",
            Self::Offline => "OFFLINE",
            Self::QueryFailed => "QUERY_FAILED",
        }
    }

    /// Whether the last query for this channel succeeded.
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Online | Self::Offline)
    }
}

impl std::fmt::Display for ChannelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_unknown() {
        assert_eq!(ChannelState::default(), ChannelState::Unknown);
    }

    #[test]
    fn test_is_resolved() {
        assert!(ChannelState::Online.is_resolved());
        assert!(ChannelState::Offline.is_resolved());
        assert!(!ChannelState::Unknown.is_resolved());
        assert!(!ChannelState::QueryFailed.is_resolved());
    }
}
