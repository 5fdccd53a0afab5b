//! Settings service implementation.
//!
//! Owns the user settings snapshot and broadcasts change events when a
//! setting the runtime reacts to is mutated. All mutation goes through
//! this service; subscribers never see a half-applied change.

use std::collections::HashSet;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use platforms_api::UniqueStreamKey;

use super::events::{SettingsEvent, SettingsEventBroadcaster};

/// Default viewer threshold for popular-stream alerts.
const DEFAULT_MINIMUM_EVENT_VIEWERS: u32 = 30_000;

/// User settings the monitoring core reacts to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Viewer threshold for popular-stream alerts; `0` disables the
    /// popular-stream watcher entirely.
    pub minimum_event_viewers: u32,
    /// Globally suppress all notifications.
    pub disable_notifications: bool,
    /// Streams the user never wants popular-stream alerts for.
    pub exclude_from_notifying: HashSet<UniqueStreamKey>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            minimum_event_viewers: DEFAULT_MINIMUM_EVENT_VIEWERS,
            disable_notifications: false,
            exclude_from_notifying: HashSet::new(),
        }
    }
}

/// Service owning the settings snapshot, with change broadcasting.
pub struct SettingsService {
    inner: RwLock<Settings>,
    broadcaster: SettingsEventBroadcaster,
}

impl SettingsService {
    /// Create a service with the given initial settings.
    pub fn new(settings: Settings) -> Self {
        Self {
            inner: RwLock::new(settings),
            broadcaster: SettingsEventBroadcaster::new(),
        }
    }

    /// Subscribe to settings change events.
    pub fn subscribe(&self) -> broadcast::Receiver<SettingsEvent> {
        self.broadcaster.subscribe()
    }

    /// Get a consistent snapshot of all settings.
    pub fn snapshot(&self) -> Settings {
        self.inner.read().clone()
    }

    pub fn minimum_event_viewers(&self) -> u32 {
        self.inner.read().minimum_event_viewers
    }

    pub fn notifications_disabled(&self) -> bool {
        self.inner.read().disable_notifications
    }

    pub fn is_excluded(&self, key: &UniqueStreamKey) -> bool {
        self.inner.read().exclude_from_notifying.contains(key)
    }

    /// Update the popular-stream viewer threshold.
    pub fn set_minimum_event_viewers(&self, viewers: u32) {
        let old = {
            let mut settings = self.inner.write();
            let old = settings.minimum_event_viewers;
            settings.minimum_event_viewers = viewers;
            old
        };
        if old != viewers {
            self.broadcaster
                .publish(SettingsEvent::MinimumEventViewersChanged { old, new: viewers });
        }
    }

    /// Globally disable or re-enable notifications.
    pub fn set_disable_notifications(&self, disabled: bool) {
        let changed = {
            let mut settings = self.inner.write();
            let changed = settings.disable_notifications != disabled;
            settings.disable_notifications = disabled;
            changed
        };
        if changed {
            self.broadcaster
                .publish(SettingsEvent::DisableNotificationsChanged { disabled });
        }
    }

    /// Add a stream to the notification exclusion set.
    pub fn exclude_from_notifying(&self, key: UniqueStreamKey) {
        let inserted = self.inner.write().exclude_from_notifying.insert(key);
        if inserted {
            self.broadcaster.publish(SettingsEvent::ExclusionsChanged);
        }
    }

    /// Remove a stream from the notification exclusion set.
    pub fn remove_exclusion(&self, key: &UniqueStreamKey) {
        let removed = self.inner.write().exclude_from_notifying.remove(key);
        if removed {
            self.broadcaster.publish(SettingsEvent::ExclusionsChanged);
        }
    }
}

impl Default for SettingsService {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}
