//! Notification view events.
//!
//! The handler describes every visible change (activation, buffering,
//! dismissal, repositioning) as an event so presentation stays a dumb
//! renderer of slots and offsets.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use super::model::LivestreamNotification;

/// Events describing visible notification state changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum NotificationViewEvent {
    /// A notification took an on-screen slot.
    Activated {
        notification: LivestreamNotification,
        slot: usize,
        /// Offset from the anchor corner, in logical pixels.
        offset: f64,
    },
    /// No slot was free; the notification waits in the FIFO buffer.
    Buffered { id: u64 },
    /// A notification left the screen (or the buffer).
    Dismissed { id: u64 },
    /// An active notification moved to close a gap.
    Moved { id: u64, slot: usize, offset: f64 },
}

/// Default channel capacity for view events.
const DEFAULT_CHANNEL_CAPACITY: usize = 128;

/// Broadcaster for notification view events.
pub struct NotificationEventBroadcaster {
    sender: broadcast::Sender<NotificationViewEvent>,
}

impl NotificationEventBroadcaster {
    /// Create a new broadcaster with default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new broadcaster with specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to view events.
    pub fn subscribe(&self) -> broadcast::Receiver<NotificationViewEvent> {
        self.sender.subscribe()
    }

    /// Publish a view event. Returns the number of receivers.
    pub fn publish(&self, event: NotificationViewEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Get the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for NotificationEventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for NotificationEventBroadcaster {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}
