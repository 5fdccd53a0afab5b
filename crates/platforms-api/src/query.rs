//! Per-channel query result type.

use crate::error::ApiError;
use crate::identity::ChannelIdentifier;
use crate::livestream::LivestreamModel;

/// A failed query for one channel: identity plus cause.
#[derive(Debug)]
pub struct FailedQuery {
    pub channel: ChannelIdentifier,
    pub error: ApiError,
}

/// Outcome of querying one channel.
///
/// Exactly one of the two: a successful query carries the freshly
/// constructed model, a failed one carries the channel identity and the
/// cause. Never both, never neither.
#[derive(Debug)]
pub enum LivestreamQueryResult {
    Success(LivestreamModel),
    Failed(FailedQuery),
}

impl LivestreamQueryResult {
    pub fn success(model: LivestreamModel) -> Self {
        Self::Success(model)
    }

    pub fn failed(channel: ChannelIdentifier, error: ApiError) -> Self {
        Self::Failed(FailedQuery { channel, error })
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// The channel this result belongs to, regardless of outcome.
    pub fn channel(&self) -> &ChannelIdentifier {
        match self {
            Self::Success(model) => model.channel(),
            Self::Failed(failed) => &failed.channel,
        }
    }

    pub fn model(&self) -> Option<&LivestreamModel> {
        match self {
            Self::Success(model) => Some(model),
            Self::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&ApiError> {
        match self {
            Self::Success(_) => None,
            Self::Failed(failed) => Some(&failed.error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_accessors() {
        let channel = ChannelIdentifier::new("twitchtv", "shroud");
        let ok = LivestreamQueryResult::success(LivestreamModel::new("shroud", channel.clone()));
        assert!(ok.is_success());
        assert!(ok.model().is_some());
        assert!(ok.error().is_none());
        assert_eq!(ok.channel(), &channel);

        let failed =
            LivestreamQueryResult::failed(channel.clone(), ApiError::network("connection reset"));
        assert!(!failed.is_success());
        assert!(failed.model().is_none());
        assert!(failed.error().is_some());
        assert_eq!(failed.channel(), &channel);
    }
}
