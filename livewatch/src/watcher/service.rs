//! Popular livestream watcher implementation.
//!
//! An independent poll loop that queries every top-streams-capable,
//! authorized provider, filters the merged results against the viewer
//! threshold, the TTL dedup cache and the user exclusion set, and emits
//! one maximum-duration notification per newly qualifying stream.
//!
//! The loop is settings-driven: a threshold of `0` means it must not run
//! at all, toggling the threshold from `0` to a value (re)starts it, and
//! re-enabling notifications clears the dedup cache so a fresh round of
//! alerts can occur. Provider errors are swallowed at cycle scope: the
//! loop never terminates because a platform misbehaved.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use platforms_api::{
    ApiRegistry, LivestreamModel, PlatformApi, Result as ApiResult, TopStreamsQuery,
    UniqueStreamKey,
};

use crate::clock::Clock;
use crate::monitor::ChannelMonitor;
use crate::notification::{
    MAX_DISPLAY_DURATION, NotificationAction, NotificationDraft, NotificationHandler,
    format_viewer_count,
};
use crate::settings::{SettingsEvent, SettingsService};

use super::dedup::ExpiringKeyCache;

/// Default poll interval (60 seconds).
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Default maximum pages fetched per provider per cycle.
const DEFAULT_MAX_PAGES: usize = 3;

/// Default results per page.
const DEFAULT_PAGE_SIZE: usize = 5;

/// Popular watcher configuration.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Interval between poll cycles.
    pub poll_interval: Duration,
    /// Maximum pages fetched per provider per cycle.
    pub max_pages: usize,
    /// Results requested per page.
    pub page_size: usize,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_pages: DEFAULT_MAX_PAGES,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Cross-provider popular livestream watcher.
pub struct PopularLivestreamWatcher {
    registry: Arc<ApiRegistry>,
    settings: Arc<SettingsService>,
    monitor: Arc<ChannelMonitor>,
    notifications: Arc<NotificationHandler>,
    /// Streams already notified within the TTL window.
    dedup: ExpiringKeyCache,
    config: WatcherConfig,
    /// Cancels the control task (and through it, the poll loop).
    cancellation_token: CancellationToken,
    /// Token of the currently running poll loop, if any.
    poll_cancel: Mutex<Option<CancellationToken>>,
}

impl PopularLivestreamWatcher {
    /// Create a watcher with default configuration.
    pub fn new(
        registry: Arc<ApiRegistry>,
        settings: Arc<SettingsService>,
        monitor: Arc<ChannelMonitor>,
        notifications: Arc<NotificationHandler>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::with_config(
            registry,
            settings,
            monitor,
            notifications,
            clock,
            WatcherConfig::default(),
        )
    }

    /// Create a watcher with custom configuration.
    pub fn with_config(
        registry: Arc<ApiRegistry>,
        settings: Arc<SettingsService>,
        monitor: Arc<ChannelMonitor>,
        notifications: Arc<NotificationHandler>,
        clock: Arc<dyn Clock>,
        config: WatcherConfig,
    ) -> Self {
        Self {
            registry,
            settings,
            monitor,
            notifications,
            dedup: ExpiringKeyCache::new(clock),
            config,
            cancellation_token: CancellationToken::new(),
            poll_cancel: Mutex::new(None),
        }
    }

    /// Whether the poll loop is currently running.
    pub fn is_polling(&self) -> bool {
        self.poll_cancel
            .lock()
            .as_ref()
            .is_some_and(|token| !token.is_cancelled())
    }

    /// Start the watcher control task.
    ///
    /// The control task owns the poll loop: it starts it when the viewer
    /// threshold is non-zero, stops it when the threshold becomes `0`,
    /// and clears the dedup cache when notifications are re-enabled.
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        let watcher = self;
        tokio::spawn(async move {
            let mut settings_events = watcher.settings.subscribe();
            if watcher.settings.minimum_event_viewers() > 0 {
                Self::start_poll_loop(&watcher);
            } else {
                info!("popular stream watching disabled (threshold is 0)");
            }

            loop {
                tokio::select! {
                    _ = watcher.cancellation_token.cancelled() => {
                        watcher.stop_poll_loop();
                        break;
                    }
                    event = settings_events.recv() => match event {
                        Ok(SettingsEvent::MinimumEventViewersChanged { new, .. }) => {
                            if new == 0 {
                                info!("viewer threshold set to 0, stopping popular stream watcher");
                                watcher.stop_poll_loop();
                            } else {
                                Self::start_poll_loop(&watcher);
                            }
                        }
                        Ok(SettingsEvent::DisableNotificationsChanged { disabled: false }) => {
                            info!("notifications re-enabled, clearing popular stream dedup cache");
                            watcher.dedup.clear();
                        }
                        Ok(_) => {}
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!("popular watcher lagged {} settings events", n);
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            watcher.stop_poll_loop();
                            break;
                        }
                    }
                }
            }
            debug!("popular watcher control task stopped");
        })
    }

    /// Stop the watcher and its poll loop.
    pub fn stop(&self) {
        self.cancellation_token.cancel();
    }

    fn start_poll_loop(watcher: &Arc<Self>) {
        let mut slot = watcher.poll_cancel.lock();
        if slot.as_ref().is_some_and(|token| !token.is_cancelled()) {
            return;
        }
        let token = watcher.cancellation_token.child_token();
        *slot = Some(token.clone());

        let watcher = watcher.clone();
        tokio::spawn(async move {
            info!(interval = ?watcher.config.poll_interval, "popular stream poll loop started");
            loop {
                if token.is_cancelled() {
                    break;
                }
                watcher.poll_once().await;
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(watcher.config.poll_interval) => {}
                }
            }
            debug!("popular stream poll loop stopped");
        });
    }

    fn stop_poll_loop(&self) {
        if let Some(token) = self.poll_cancel.lock().take() {
            token.cancel();
        }
    }

    /// Run one poll cycle immediately.
    ///
    /// Provider failures are logged and skipped; the cycle always runs to
    /// completion for the remaining providers.
    pub async fn poll_once(&self) {
        let settings = self.settings.snapshot();
        let threshold = u64::from(settings.minimum_event_viewers);
        if threshold == 0 || settings.disable_notifications {
            return;
        }

        // Merge all providers' pages by stream key to drop in-cycle
        // duplicates before filtering.
        let mut candidates: HashMap<UniqueStreamKey, LivestreamModel> = HashMap::new();
        for api in self.registry.all() {
            if !api.has_top_streams_support() || !api.is_authorized() {
                continue;
            }
            match self.fetch_top_streams(api.as_ref(), threshold).await {
                Ok(streams) => {
                    for stream in streams {
                        candidates.entry(stream.stream_key()).or_insert(stream);
                    }
                }
                Err(error) => {
                    warn!(
                        provider = api.name(),
                        %error,
                        "popular stream poll failed for provider, skipping this cycle"
                    );
                }
            }
        }

        for (key, stream) in candidates {
            if stream.viewers < threshold {
                continue;
            }
            if self.dedup.contains(&key) || settings.exclude_from_notifying.contains(&key) {
                continue;
            }
            self.dedup.insert(key.clone());
            debug!(stream = %key, viewers = stream.viewers, "popular stream crossed threshold");

            let action = if self.monitor.is_monitored_stream(&key) {
                NotificationAction::SelectStream(key.clone())
            } else {
                NotificationAction::BrowseTopStreams {
                    provider: key.provider().to_string(),
                }
            };
            let message = if stream.game.is_empty() {
                format!("{} viewers", format_viewer_count(stream.viewers))
            } else {
                format!(
                    "{} viewers watching {}",
                    format_viewer_count(stream.viewers),
                    stream.game
                )
            };
            let mut draft =
                NotificationDraft::new(format!("Popular livestream: {}", stream.display_name), message)
                    .with_duration(MAX_DISPLAY_DURATION)
                    .with_action(action);
            if let Some(url) = stream.thumbnail_urls.small.clone() {
                draft = draft.with_image_url(url);
            }
            self.notifications.add_notification(draft);
        }
    }

    /// Fetch up to `max_pages` pages of top streams from one provider.
    ///
    /// Paging stops early once an entire page falls below the threshold.
    /// That relies on providers returning results in descending viewer
    /// order. This is a performance heuristic, not a correctness requirement:
    /// a provider that violates the ordering only costs us qualifying
    /// streams on the pages we skipped.
    async fn fetch_top_streams(
        &self,
        api: &dyn PlatformApi,
        threshold: u64,
    ) -> ApiResult<Vec<LivestreamModel>> {
        let mut collected = Vec::new();
        for page_index in 0..self.config.max_pages {
            let query = TopStreamsQuery::page(page_index, self.config.page_size);
            let page = api.get_top_streams(&query).await?;
            if page.streams.is_empty() {
                break;
            }
            let whole_page_below = page.streams.iter().all(|s| s.viewers < threshold);
            collected.extend(page.streams);
            if whole_page_below || !page.has_next_page {
                break;
            }
        }
        Ok(collected)
    }
}
