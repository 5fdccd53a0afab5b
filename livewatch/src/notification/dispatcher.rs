//! Monitor event to notification bridge.
//!
//! A small cancellable task that turns `ChannelWentOnline` monitor events
//! into on-screen notifications, honoring the per-stream `dont_notify`
//! flag and the global notification kill switch.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use platforms_api::LivestreamModel;

use crate::monitor::MonitorEvent;
use crate::settings::SettingsService;

use super::handler::NotificationHandler;
use super::model::{NotificationAction, NotificationDraft, format_viewer_count};

/// Bridges monitor events into the notification handler.
pub struct NotificationDispatcher {
    settings: Arc<SettingsService>,
    handler: Arc<NotificationHandler>,
    cancellation_token: CancellationToken,
}

impl NotificationDispatcher {
    pub fn new(settings: Arc<SettingsService>, handler: Arc<NotificationHandler>) -> Self {
        Self {
            settings,
            handler,
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Start consuming monitor events until stopped.
    pub fn start(
        &self,
        mut events: broadcast::Receiver<MonitorEvent>,
    ) -> tokio::task::JoinHandle<()> {
        let settings = self.settings.clone();
        let handler = self.handler.clone();
        let token = self.cancellation_token.clone();

        tokio::spawn(async move {
            info!("notification dispatcher started");
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    event = events.recv() => match event {
                        Ok(event) => {
                            if !event.should_notify() || settings.notifications_disabled() {
                                continue;
                            }
                            if let MonitorEvent::ChannelWentOnline { stream, .. } = event {
                                debug!(stream = %stream, "dispatching went-live notification");
                                handler.add_notification(live_notification(&stream));
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!("notification dispatcher lagged {} monitor events", n);
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
            info!("notification dispatcher stopped");
        })
    }

    /// Stop consuming monitor events.
    pub fn stop(&self) {
        self.cancellation_token.cancel();
    }
}

fn live_notification(stream: &LivestreamModel) -> NotificationDraft {
    let viewers = format_viewer_count(stream.viewers);
    let message = if stream.description.is_empty() {
        format!("{viewers} viewers")
    } else {
        format!("{} ({viewers} viewers)", stream.description)
    };
    let mut draft = NotificationDraft::new(format!("{} is live", stream.display_name), message)
        .with_action(NotificationAction::SelectStream(stream.stream_key()));
    if let Some(url) = stream.thumbnail_urls.small.clone() {
        draft = draft.with_image_url(url);
    }
    draft
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;

    use platforms_api::ChannelIdentifier;

    use super::*;
    use crate::monitor::MonitorEventBroadcaster;
    use crate::notification::handler::NotificationHandlerConfig;

    fn online_event(dont_notify: bool) -> MonitorEvent {
        let mut stream =
            LivestreamModel::new("shroud", ChannelIdentifier::new("twitchtv", "shroud"));
        stream.live = true;
        stream.viewers = 15_000;
        stream.display_name = "shroud".to_string();
        stream.description = "ranked grind".to_string();
        stream.dont_notify = dont_notify;
        MonitorEvent::ChannelWentOnline {
            stream,
            timestamp: Utc::now(),
        }
    }

    fn quiet_handler() -> Arc<NotificationHandler> {
        Arc::new(NotificationHandler::with_config(NotificationHandlerConfig {
            capacity: 4,
            auto_dismiss: false,
        }))
    }

    #[tokio::test]
    async fn test_went_online_produces_notification() {
        let settings = Arc::new(SettingsService::default());
        let handler = quiet_handler();
        let broadcaster = MonitorEventBroadcaster::new();
        let dispatcher = NotificationDispatcher::new(settings, handler.clone());
        let task = dispatcher.start(broadcaster.subscribe());

        broadcaster.publish(online_event(false));
        tokio::time::sleep(Duration::from_millis(50)).await;

        let active = handler.active();
        assert_eq!(active.len(), 1);
        assert!(active[0].title.contains("shroud"));
        assert!(active[0].message.contains("15,000"));
        assert!(matches!(
            active[0].action,
            Some(NotificationAction::SelectStream(_))
        ));

        dispatcher.stop();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_dont_notify_flag_suppresses() {
        let settings = Arc::new(SettingsService::default());
        let handler = quiet_handler();
        let broadcaster = MonitorEventBroadcaster::new();
        let dispatcher = NotificationDispatcher::new(settings, handler.clone());
        let task = dispatcher.start(broadcaster.subscribe());

        broadcaster.publish(online_event(true));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(handler.active_count(), 0);

        dispatcher.stop();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_global_disable_suppresses() {
        let settings = Arc::new(SettingsService::default());
        settings.set_disable_notifications(true);
        let handler = quiet_handler();
        let broadcaster = MonitorEventBroadcaster::new();
        let dispatcher = NotificationDispatcher::new(settings, handler.clone());
        let task = dispatcher.start(broadcaster.subscribe());

        broadcaster.publish(online_event(false));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(handler.active_count(), 0);

        dispatcher.stop();
        task.await.unwrap();
    }
}
