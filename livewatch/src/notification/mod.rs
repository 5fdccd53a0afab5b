//! On-screen notification scheduling.

mod dispatcher;
mod events;
mod handler;
mod model;

pub use dispatcher::NotificationDispatcher;
pub use events::{NotificationEventBroadcaster, NotificationViewEvent};
pub use handler::{MAX_ACTIVE_NOTIFICATIONS, NotificationHandler, NotificationHandlerConfig, slot_offset};
pub use model::{
    DEFAULT_DISPLAY_DURATION, LivestreamNotification, MAX_DISPLAY_DURATION, NotificationAction,
    NotificationDraft, clamp_display_duration, format_viewer_count,
};
