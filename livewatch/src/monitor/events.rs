//! Monitor events.
//!
//! State changes leave the monitor as explicit messages on a broadcast
//! channel; presentation and notification dispatch subscribe instead of
//! hooking re-entrant callbacks into the reconciliation path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use platforms_api::{ChannelIdentifier, LivestreamModel, UniqueStreamKey};

use super::state::ChannelState;

/// Events emitted by the channel monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MonitorEvent {
    /// A channel was added to the monitored set.
    ChannelAdded {
        channel: ChannelIdentifier,
        state: ChannelState,
        timestamp: DateTime<Utc>,
    },
    /// A channel was removed from the monitored set.
    ChannelRemoved {
        channel: ChannelIdentifier,
        timestamp: DateTime<Utc>,
    },
    /// A monitored stream transitioned from offline to live.
    ChannelWentOnline {
        /// Snapshot of the stream at the moment of the transition.
        stream: LivestreamModel,
        timestamp: DateTime<Utc>,
    },
    /// A monitored stream transitioned from live to offline.
    ChannelWentOffline {
        channel: ChannelIdentifier,
        stream_key: UniqueStreamKey,
        timestamp: DateTime<Utc>,
    },
    /// A channel query failed this cycle; prior display state is retained.
    ChannelQueryFailed {
        channel: ChannelIdentifier,
        error: String,
        timestamp: DateTime<Utc>,
    },
    /// A full refresh cycle finished and its batch is now visible.
    RefreshCompleted {
        online: usize,
        offline: usize,
        failed: usize,
        timestamp: DateTime<Utc>,
    },
}

impl MonitorEvent {
    /// Get a human-readable description of the event.
    pub fn description(&self) -> String {
        match self {
            Self::ChannelAdded { channel, state, .. } => {
                format!("{} added ({})", channel, state)
            }
            Self::ChannelRemoved { channel, .. } => format!("{} removed", channel),
            Self::ChannelWentOnline { stream, .. } => {
                format!("{} is now live: {}", stream.display_name, stream.description)
            }
            Self::ChannelWentOffline { channel, .. } => format!("{} went offline", channel),
            Self::ChannelQueryFailed { channel, error, .. } => {
                format!("{} query failed: {}", channel, error)
            }
            Self::RefreshCompleted {
                online,
                offline,
                failed,
                ..
            } => {
                format!(
                    "refresh completed: {} online, {} offline, {} failed",
                    online, offline, failed
                )
            }
        }
    }

    /// Check if this event should trigger an on-screen notification.
    pub fn should_notify(&self) -> bool {
        match self {
            Self::ChannelWentOnline { stream, .. } => !stream.dont_notify,
            _ => false,
        }
    }
}

/// Broadcaster for monitor events.
pub struct MonitorEventBroadcaster {
    sender: broadcast::Sender<MonitorEvent>,
}

impl MonitorEventBroadcaster {
    /// Create a new broadcaster with default capacity (256).
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    /// Create a new broadcaster with specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to monitor events.
    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.sender.subscribe()
    }

    /// Publish a monitor event. Returns the number of receivers.
    pub fn publish(&self, event: MonitorEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Get the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for MonitorEventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MonitorEventBroadcaster {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}
