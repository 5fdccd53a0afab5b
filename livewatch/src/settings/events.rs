//! Settings change events.
//!
//! Broadcast whenever a setting the runtime reacts to changes, so the
//! popular-stream watcher and notification dispatch can adjust without
//! re-entrant callbacks.

use tokio::sync::broadcast;

/// Events broadcast when settings change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsEvent {
    /// The popular-stream viewer threshold changed. `0` disables the
    /// watcher entirely.
    MinimumEventViewersChanged { old: u32, new: u32 },
    /// Notifications were globally disabled or re-enabled.
    DisableNotificationsChanged { disabled: bool },
    /// The set of streams excluded from notifying changed.
    ExclusionsChanged,
}

impl SettingsEvent {
    /// Get a description of the event for logging.
    pub fn description(&self) -> String {
        match self {
            Self::MinimumEventViewersChanged { old, new } => {
                format!("Minimum event viewers changed: {} -> {}", old, new)
            }
            Self::DisableNotificationsChanged { disabled } => {
                format!("Notifications {}", if *disabled { "disabled" } else { "enabled" })
            }
            Self::ExclusionsChanged => "Notification exclusions changed".to_string(),
        }
    }
}

/// Default channel capacity for settings events.
const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Broadcaster for settings change events.
///
/// Uses tokio's broadcast channel to distribute events to multiple subscribers.
pub struct SettingsEventBroadcaster {
    sender: broadcast::Sender<SettingsEvent>,
}

impl SettingsEventBroadcaster {
    /// Create a new broadcaster with default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new broadcaster with specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to settings change events.
    pub fn subscribe(&self) -> broadcast::Receiver<SettingsEvent> {
        self.sender.subscribe()
    }

    /// Publish a settings change event.
    ///
    /// Returns the number of receivers that received the event.
    pub fn publish(&self, event: SettingsEvent) -> usize {
        tracing::debug!("Publishing settings event: {}", event.description());
        self.sender.send(event).unwrap_or(0)
    }

    /// Get the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for SettingsEventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for SettingsEventBroadcaster {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}
