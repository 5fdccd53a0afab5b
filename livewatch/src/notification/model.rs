//! Notification records.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use platforms_api::UniqueStreamKey;

/// Default auto-dismiss duration for a notification.
pub const DEFAULT_DISPLAY_DURATION: Duration = Duration::from_secs(8);

/// Maximum auto-dismiss duration; popular-stream alerts use this.
pub const MAX_DISPLAY_DURATION: Duration = Duration::from_secs(60);

/// Clamp a display duration to the allowed `[0s, 60s]` range.
pub fn clamp_display_duration(duration: Duration) -> Duration {
    duration.min(MAX_DISPLAY_DURATION)
}

/// What clicking a notification does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationAction {
    /// Select an already-monitored stream in the main list.
    SelectStream(UniqueStreamKey),
    /// Navigate to the provider's top-streams browse context.
    BrowseTopStreams { provider: String },
}

/// A notification before the handler assigns it an id.
#[derive(Debug, Clone)]
pub struct NotificationDraft {
    pub title: String,
    pub message: String,
    pub image_url: Option<String>,
    pub duration: Duration,
    pub action: Option<NotificationAction>,
}

impl NotificationDraft {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            image_url: None,
            duration: DEFAULT_DISPLAY_DURATION,
            action: None,
        }
    }

    pub fn with_image_url(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_action(mut self, action: NotificationAction) -> Self {
        self.action = Some(action);
        self
    }
}

/// A scheduled notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LivestreamNotification {
    /// Monotonically increasing id, assigned by the handler.
    pub id: u64,
    pub title: String,
    pub message: String,
    pub image_url: Option<String>,
    /// Auto-dismiss duration, already clamped to `[0s, 60s]`.
    pub duration: Duration,
    pub action: Option<NotificationAction>,
}

/// Format a viewer count with thousands separators, e.g. `15,000`.
pub fn format_viewer_count(viewers: u64) -> String {
    let digits = viewers.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_display_duration() {
        assert_eq!(
            clamp_display_duration(Duration::from_secs(120)),
            MAX_DISPLAY_DURATION
        );
        assert_eq!(
            clamp_display_duration(Duration::from_secs(8)),
            Duration::from_secs(8)
        );
        assert_eq!(clamp_display_duration(Duration::ZERO), Duration::ZERO);
    }

    #[test]
    fn test_format_viewer_count() {
        assert_eq!(format_viewer_count(0), "0");
        assert_eq!(format_viewer_count(999), "999");
        assert_eq!(format_viewer_count(1_000), "1,000");
        assert_eq!(format_viewer_count(15_000), "15,000");
        assert_eq!(format_viewer_count(1_234_567), "1,234,567");
    }

    #[test]
    fn test_draft_builder() {
        let draft = NotificationDraft::new("title", "message")
            .with_duration(Duration::from_secs(60))
            .with_action(NotificationAction::BrowseTopStreams {
                provider: "twitchtv".to_string(),
            });
        assert_eq!(draft.duration, Duration::from_secs(60));
        assert!(draft.action.is_some());
        assert!(draft.image_url.is_none());
    }
}
