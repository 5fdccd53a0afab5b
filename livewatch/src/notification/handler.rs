//! Bounded notification display scheduling.
//!
//! Structurally a fixed-capacity work queue with FIFO overflow: the
//! "workers" are screen-estate slots. At most [`MAX_ACTIVE_NOTIFICATIONS`]
//! notifications are displayed; the rest wait in a FIFO buffer. Dismissal
//! compacts the remaining actives toward the anchor corner and promotes
//! the oldest buffered notification into the freed slot.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::events::{NotificationEventBroadcaster, NotificationViewEvent};
use super::model::{LivestreamNotification, NotificationDraft, clamp_display_duration};

/// Number of on-screen notification slots.
pub const MAX_ACTIVE_NOTIFICATIONS: usize = 4;

/// Height of one notification slot, in logical pixels.
const SLOT_HEIGHT: f64 = 96.0;

/// Vertical gap between stacked notifications.
const SLOT_MARGIN: f64 = 8.0;

/// Distance of the stack from the anchor corner.
const CORNER_MARGIN: f64 = 12.0;

/// Offset of a slot from the anchor corner.
///
/// Notifications stack from a fixed screen corner; slot 0 sits closest to
/// it.
pub fn slot_offset(slot: usize) -> f64 {
    CORNER_MARGIN + slot as f64 * (SLOT_HEIGHT + SLOT_MARGIN)
}

/// Notification handler configuration.
#[derive(Debug, Clone)]
pub struct NotificationHandlerConfig {
    /// Number of on-screen slots.
    pub capacity: usize,
    /// Whether activated notifications auto-dismiss after their duration.
    pub auto_dismiss: bool,
}

impl Default for NotificationHandlerConfig {
    fn default() -> Self {
        Self {
            capacity: MAX_ACTIVE_NOTIFICATIONS,
            auto_dismiss: true,
        }
    }
}

struct ActiveNotification {
    notification: LivestreamNotification,
    slot: usize,
}

#[derive(Default)]
struct HandlerState {
    active: Vec<ActiveNotification>,
    pending: VecDeque<LivestreamNotification>,
}

/// Fixed-capacity active/buffered notification queue.
///
/// Cheap to clone; clones share the same queue. Invariant: active slots
/// are always exactly `0..active.len()` after every operation;
/// compaction happens inside the same critical section as the removal
/// that opened the gap, so observers never see a sparse stack.
pub struct NotificationHandler {
    inner: Arc<HandlerInner>,
}

struct HandlerInner {
    config: NotificationHandlerConfig,
    state: Mutex<HandlerState>,
    next_id: AtomicU64,
    broadcaster: NotificationEventBroadcaster,
    /// Cancels outstanding auto-dismiss timers on shutdown.
    cancellation_token: CancellationToken,
}

impl NotificationHandler {
    /// Create a handler with default configuration.
    pub fn new() -> Self {
        Self::with_config(NotificationHandlerConfig::default())
    }

    /// Create a handler with custom configuration.
    pub fn with_config(config: NotificationHandlerConfig) -> Self {
        Self {
            inner: Arc::new(HandlerInner {
                config,
                state: Mutex::new(HandlerState::default()),
                next_id: AtomicU64::new(1),
                broadcaster: NotificationEventBroadcaster::new(),
                cancellation_token: CancellationToken::new(),
            }),
        }
    }

    /// Subscribe to view events.
    pub fn subscribe(&self) -> broadcast::Receiver<NotificationViewEvent> {
        self.inner.broadcaster.subscribe()
    }

    /// Schedule a notification. Returns its assigned id.
    ///
    /// Activates immediately when a slot is free, otherwise appends to the
    /// FIFO buffer.
    pub fn add_notification(&self, draft: NotificationDraft) -> u64 {
        HandlerInner::add_notification(&self.inner, draft)
    }

    /// Dismiss a notification (explicitly or from its timer).
    ///
    /// Removes it from the active stack, compacts the remaining actives to
    /// close the visual gap (reordered by their current on-screen offset)
    /// and promotes the oldest buffered notification into the freed slot.
    /// Dismissing a buffered notification just drops it from the buffer.
    /// Idempotent: unknown ids return `false`.
    pub fn dismiss(&self, id: u64) -> bool {
        HandlerInner::dismiss(&self.inner, id)
    }

    /// Snapshot of the displayed notifications, in slot order.
    pub fn active(&self) -> Vec<LivestreamNotification> {
        let state = self.inner.state.lock();
        let mut active: Vec<_> = state
            .active
            .iter()
            .map(|a| (a.slot, a.notification.clone()))
            .collect();
        active.sort_by_key(|(slot, _)| *slot);
        active.into_iter().map(|(_, n)| n).collect()
    }

    /// Snapshot of the buffered notifications, oldest first.
    pub fn pending(&self) -> Vec<LivestreamNotification> {
        self.inner.state.lock().pending.iter().cloned().collect()
    }

    pub fn active_count(&self) -> usize {
        self.inner.state.lock().active.len()
    }

    pub fn pending_count(&self) -> usize {
        self.inner.state.lock().pending.len()
    }

    /// Cancel all outstanding auto-dismiss timers.
    pub fn stop(&self) {
        self.inner.cancellation_token.cancel();
    }
}

impl Default for NotificationHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for NotificationHandler {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl HandlerInner {
    fn add_notification(inner: &Arc<Self>, draft: NotificationDraft) -> u64 {
        let id = inner.next_id.fetch_add(1, Ordering::SeqCst);
        let notification = LivestreamNotification {
            id,
            title: draft.title,
            message: draft.message,
            image_url: draft.image_url,
            duration: clamp_display_duration(draft.duration),
            action: draft.action,
        };

        let event = {
            let mut state = inner.state.lock();
            if state.active.len() < inner.config.capacity {
                let slot = state.active.len();
                let event = NotificationViewEvent::Activated {
                    notification: notification.clone(),
                    slot,
                    offset: slot_offset(slot),
                };
                let duration = notification.duration;
                state.active.push(ActiveNotification { notification, slot });
                Self::spawn_auto_dismiss(inner, id, duration);
                event
            } else {
                debug!(id, "notification slots full, buffering");
                state.pending.push_back(notification);
                NotificationViewEvent::Buffered { id }
            }
        };
        inner.broadcaster.publish(event);
        id
    }

    fn dismiss(inner: &Arc<Self>, id: u64) -> bool {
        let mut events = Vec::new();
        {
            let mut state = inner.state.lock();
            if let Some(pos) = state.active.iter().position(|a| a.notification.id == id) {
                state.active.remove(pos);
                events.push(NotificationViewEvent::Dismissed { id });

                state.active.sort_by_key(|a| a.slot);
                for (slot, entry) in state.active.iter_mut().enumerate() {
                    if entry.slot != slot {
                        entry.slot = slot;
                        events.push(NotificationViewEvent::Moved {
                            id: entry.notification.id,
                            slot,
                            offset: slot_offset(slot),
                        });
                    }
                }

                if let Some(promoted) = state.pending.pop_front() {
                    let slot = state.active.len();
                    events.push(NotificationViewEvent::Activated {
                        notification: promoted.clone(),
                        slot,
                        offset: slot_offset(slot),
                    });
                    let duration = promoted.duration;
                    let promoted_id = promoted.id;
                    state.active.push(ActiveNotification {
                        notification: promoted,
                        slot,
                    });
                    Self::spawn_auto_dismiss(inner, promoted_id, duration);
                }
            } else if let Some(pos) = state.pending.iter().position(|n| n.id == id) {
                state.pending.remove(pos);
                events.push(NotificationViewEvent::Dismissed { id });
            } else {
                return false;
            }
        }
        for event in events {
            inner.broadcaster.publish(event);
        }
        true
    }

    fn spawn_auto_dismiss(inner: &Arc<Self>, id: u64, duration: Duration) {
        if !inner.config.auto_dismiss {
            return;
        }
        let inner = inner.clone();
        tokio::spawn(async move {
            let token = inner.cancellation_token.clone();
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(duration) => {
                    Self::dismiss(&inner, id);
                }
            }
        });
    }
}
