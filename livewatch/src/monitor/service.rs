//! Channel monitor service implementation.
//!
//! The ChannelMonitor owns the canonical monitored-channel roster and the
//! livestream display list, drives the periodic refresh using the
//! [`ParallelQueryExecutor`] and the registered providers, and applies the
//! online/offline reconciliation rules.
//!
//! # Consistency
//!
//! - Refresh cycles are serialized by a single in-flight guard; a new
//!   cycle never starts while one is running and results from two cycles
//!   are never interleaved.
//! - User-driven add/remove proceeds concurrently against the live
//!   collection and is reconciled on the next cycle.
//! - All display-list mutation (including the atomic `offline()`
//!   transition) happens under the list's write lock; readers only ever
//!   observe fully pre- or fully post-transition state.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use platforms_api::{
    ApiError, ApiRegistry, ChannelIdentifier, LivestreamModel, LivestreamQueryResult,
    ParallelQueryExecutor, PlatformApi, QueryExecutorConfig, UniqueStreamKey,
};

use crate::Result;
use crate::error::Error;
use crate::persistence::ChannelListStore;

use super::events::{MonitorEvent, MonitorEventBroadcaster};
use super::state::ChannelState;

/// Default refresh interval (60 seconds).
const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// Default shared timeout for one cycle's queries against one provider.
const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Channel monitor configuration.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Interval between periodic refresh cycles.
    pub refresh_interval: Duration,
    /// Shared wall-clock timeout for a provider's query fan-out.
    pub query_timeout: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }
}

/// The channel monitor service.
pub struct ChannelMonitor {
    /// Registered platform integrations.
    registry: Arc<ApiRegistry>,
    /// Fan-out executor shared by every provider query path.
    executor: ParallelQueryExecutor,
    /// Channel-list persistence collaborator.
    store: Arc<dyn ChannelListStore>,
    /// Monitored channel roster.
    roster: RwLock<Vec<ChannelIdentifier>>,
    /// Livestream display list, set semantics by stream key.
    streams: RwLock<Vec<LivestreamModel>>,
    /// Per-channel monitoring state.
    channel_states: DashMap<ChannelIdentifier, ChannelState>,
    /// Event broadcaster for state changes.
    broadcaster: MonitorEventBroadcaster,
    /// Serializes refresh cycles; `try_lock` failure means a cycle is in
    /// flight and the new request is skipped.
    refresh_guard: tokio::sync::Mutex<()>,
    /// Cancellation token for the periodic loop.
    cancellation_token: CancellationToken,
    /// Configuration.
    config: MonitorConfig,
}

impl ChannelMonitor {
    /// Create a new monitor with default configuration.
    pub fn new(registry: Arc<ApiRegistry>, store: Arc<dyn ChannelListStore>) -> Self {
        Self::with_config(registry, store, MonitorConfig::default())
    }

    /// Create a new monitor with custom configuration.
    pub fn with_config(
        registry: Arc<ApiRegistry>,
        store: Arc<dyn ChannelListStore>,
        config: MonitorConfig,
    ) -> Self {
        Self::with_full_config(registry, store, config, CancellationToken::new())
    }

    /// Create a new monitor with custom configuration and a shared
    /// cancellation token, so a parent can cancel the refresh loop
    /// directly.
    pub fn with_full_config(
        registry: Arc<ApiRegistry>,
        store: Arc<dyn ChannelListStore>,
        config: MonitorConfig,
        cancellation_token: CancellationToken,
    ) -> Self {
        let executor = ParallelQueryExecutor::with_config(QueryExecutorConfig {
            timeout: config.query_timeout,
        });

        Self {
            registry,
            executor,
            store,
            roster: RwLock::new(Vec::new()),
            streams: RwLock::new(Vec::new()),
            channel_states: DashMap::new(),
            broadcaster: MonitorEventBroadcaster::new(),
            refresh_guard: tokio::sync::Mutex::new(()),
            cancellation_token,
            config,
        }
    }

    /// Subscribe to monitor events.
    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.broadcaster.subscribe()
    }

    /// Get the event broadcaster for external use.
    pub fn event_broadcaster(&self) -> &MonitorEventBroadcaster {
        &self.broadcaster
    }

    /// Get the cancellation token for this monitor.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// Snapshot of the monitored channel roster.
    pub fn channels(&self) -> Vec<ChannelIdentifier> {
        self.roster.read().clone()
    }

    /// Snapshot of the livestream display list.
    pub fn livestreams(&self) -> Vec<LivestreamModel> {
        self.streams.read().clone()
    }

    /// Current monitoring state of a channel, if it is monitored.
    pub fn channel_state(&self, channel: &ChannelIdentifier) -> Option<ChannelState> {
        self.channel_states.get(channel).map(|state| *state)
    }

    /// Whether a produced livestream belongs to the monitored set.
    pub fn is_monitored_stream(&self, key: &UniqueStreamKey) -> bool {
        if self.streams.read().iter().any(|s| s.stream_key() == *key) {
            return true;
        }
        // Streams of channels we monitor but have not resolved yet: most
        // providers reuse the channel id as the stream id.
        self.roster.read().iter().any(|c| {
            c.provider() == key.provider() && c.channel_id().eq_ignore_ascii_case(key.stream_id())
        })
    }

    /// Hydrate the roster from the persistence collaborator and run one
    /// initial refresh. Returns the number of channels loaded.
    pub async fn load_channels(&self) -> Result<usize> {
        let stored = self.store.load().await?;
        let loaded = {
            let mut roster = self.roster.write();
            let mut loaded = 0;
            for channel in stored {
                if !roster.contains(&channel) {
                    self.channel_states
                        .insert(channel.clone(), ChannelState::Unknown);
                    roster.push(channel);
                    loaded += 1;
                }
            }
            loaded
        };
        info!(count = loaded, "hydrated monitored channel list");

        self.refresh().await;
        Ok(loaded)
    }

    /// Add a channel to the monitored set.
    ///
    /// Issues one immediate query: success sets the channel Online or
    /// Offline per the returned live flag, failure sets QueryFailed; in
    /// every case the channel is added and tracked from now on. Errors
    /// from validation and the provider-side add hook surface to the
    /// caller; the query outcome never does.
    pub async fn add_channel(&self, mut channel: ChannelIdentifier) -> Result<ChannelState> {
        if channel.provider().trim().is_empty() || channel.channel_id().trim().is_empty() {
            return Err(Error::validation(
                "provider and channel id must be non-empty",
            ));
        }
        let api = self
            .registry
            .get(channel.provider())
            .ok_or_else(|| Error::unknown_provider(channel.provider()))?;
        if self.roster.read().contains(&channel) {
            return Err(Error::validation(format!(
                "channel {channel} is already monitored"
            )));
        }

        api.add_channel(&channel).await?;

        let result = match tokio::time::timeout(
            self.executor.timeout(),
            api.query_channel(&channel),
        )
        .await
        {
            Ok(Ok(model)) => {
                channel.display_name = Some(model.display_name.clone());
                LivestreamQueryResult::success(model)
            }
            Ok(Err(error)) => LivestreamQueryResult::failed(channel.clone(), error),
            Err(_) => LivestreamQueryResult::failed(
                channel.clone(),
                ApiError::Timeout {
                    timeout: self.executor.timeout(),
                },
            ),
        };

        self.channel_states
            .insert(channel.clone(), ChannelState::Unknown);
        self.roster.write().push(channel.clone());

        let now = Utc::now();
        let events = self.apply_results(vec![result], now);
        for event in events {
            self.broadcaster.publish(event);
        }

        let state = self
            .channel_state(&channel)
            .unwrap_or(ChannelState::Unknown);
        self.persist_roster().await?;
        self.broadcaster.publish(MonitorEvent::ChannelAdded {
            channel: channel.clone(),
            state,
            timestamp: now,
        });
        info!(%channel, %state, "channel added");
        Ok(state)
    }

    /// Remove a channel from the monitored set, dropping its streams.
    pub async fn remove_channel(&self, channel: &ChannelIdentifier) -> Result<()> {
        let existed = {
            let mut roster = self.roster.write();
            let before = roster.len();
            roster.retain(|c| c != channel);
            roster.len() != before
        };
        if !existed {
            return Err(Error::validation(format!(
                "channel {channel} is not monitored"
            )));
        }

        if let Some(api) = self.registry.get(channel.provider())
            && let Err(error) = api.remove_channel(channel).await
        {
            // Local removal still proceeds; the provider-side hook is
            // best-effort bookkeeping.
            warn!(%channel, %error, "provider remove hook failed");
        }

        self.streams.write().retain(|s| s.channel() != channel);
        self.channel_states.remove(channel);
        self.persist_roster().await?;
        self.broadcaster.publish(MonitorEvent::ChannelRemoved {
            channel: channel.clone(),
            timestamp: Utc::now(),
        });
        info!(%channel, "channel removed");
        Ok(())
    }

    /// Import the channels followed by `user_name` on `provider`.
    ///
    /// Channels already monitored are skipped; the rest are added tagged
    /// with `imported_by` and queried as one batch. Returns how many
    /// channels were imported.
    pub async fn import_channels(&self, provider: &str, user_name: &str) -> Result<usize> {
        if user_name.trim().is_empty() {
            return Err(Error::validation("user name must be non-empty"));
        }
        let api = self
            .registry
            .get(provider)
            .ok_or_else(|| Error::unknown_provider(provider))?;

        let followed = api.get_followed_channels(user_name).await?;
        let fresh: Vec<ChannelIdentifier> = {
            let roster = self.roster.read();
            let mut fresh: Vec<ChannelIdentifier> = Vec::new();
            for channel in followed {
                if !roster.contains(&channel) && !fresh.contains(&channel) {
                    fresh.push(channel.with_imported_by(user_name));
                }
            }
            fresh
        };
        if fresh.is_empty() {
            return Ok(0);
        }

        for channel in &fresh {
            self.channel_states
                .insert(channel.clone(), ChannelState::Unknown);
        }
        self.roster.write().extend(fresh.iter().cloned());

        let results = fan_out(api, &self.executor, fresh.clone()).await;
        let now = Utc::now();
        let events = self.apply_results(results, now);
        for event in events {
            self.broadcaster.publish(event);
        }
        self.persist_roster().await?;

        for channel in &fresh {
            let state = self
                .channel_state(channel)
                .unwrap_or(ChannelState::Unknown);
            self.broadcaster.publish(MonitorEvent::ChannelAdded {
                channel: channel.clone(),
                state,
                timestamp: now,
            });
        }
        info!(provider, user_name, count = fresh.len(), "channels imported");
        Ok(fresh.len())
    }

    /// Start the periodic refresh loop.
    ///
    /// The loop runs until the cancellation token is triggered. The first
    /// cycle fires after one full interval; callers wanting an immediate
    /// cycle use [`load_channels`] or [`refresh`] directly.
    ///
    /// [`load_channels`]: ChannelMonitor::load_channels
    /// [`refresh`]: ChannelMonitor::refresh
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        let monitor = self;
        info!(interval = ?monitor.config.refresh_interval, "starting channel refresh loop");
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = monitor.cancellation_token.cancelled() => {
                        info!("channel refresh loop stopped");
                        break;
                    }
                    _ = tokio::time::sleep(monitor.config.refresh_interval) => {}
                }
                if monitor.cancellation_token.is_cancelled() {
                    break;
                }
                monitor.refresh().await;
            }
        })
    }

    /// Stop the periodic refresh loop.
    pub fn stop(&self) {
        self.cancellation_token.cancel();
    }

    /// Run one refresh cycle.
    ///
    /// If a cycle is already in flight this returns immediately without
    /// queuing; the single in-flight guard is what serializes cycles.
    /// Every provider is queried concurrently and isolated from the
    /// others; the merged batch becomes visible atomically, followed by
    /// the cycle's events and a closing `RefreshCompleted`.
    pub async fn refresh(&self) {
        let Ok(_guard) = self.refresh_guard.try_lock() else {
            debug!("refresh already in flight, skipping");
            return;
        };

        let roster = self.roster.read().clone();
        if roster.is_empty() {
            return;
        }

        let mut by_provider: BTreeMap<String, Vec<ChannelIdentifier>> = BTreeMap::new();
        for channel in roster {
            by_provider
                .entry(channel.provider().to_string())
                .or_default()
                .push(channel);
        }

        let mut all_results = Vec::new();
        let mut tasks = JoinSet::new();
        for (provider, channels) in by_provider {
            match self.registry.get(&provider) {
                Some(api) => {
                    let executor = self.executor.clone();
                    tasks.spawn(
                        async move { query_provider(api, &executor, channels).await },
                    );
                }
                None => {
                    warn!(provider, "monitored channels reference an unregistered provider");
                    for channel in channels {
                        all_results.push(LivestreamQueryResult::failed(
                            channel,
                            ApiError::Other(format!("no registered provider {provider}")),
                        ));
                    }
                }
            }
        }
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(results) => all_results.extend(results),
                // The affected channels keep their previous state and are
                // retried next cycle.
                Err(error) => warn!(%error, "provider query task failed"),
            }
        }

        let now = Utc::now();
        let events = self.apply_results(all_results, now);
        for event in events {
            self.broadcaster.publish(event);
        }

        let (online, offline, failed) = self.state_counts();
        debug!(online, offline, failed, "refresh cycle completed");
        self.broadcaster.publish(MonitorEvent::RefreshCompleted {
            online,
            offline,
            failed,
            timestamp: now,
        });
    }

    /// Merge one batch of query results into the display list.
    ///
    /// Runs entirely under the display-list write lock so observers see
    /// the cycle as one consistent batch; returns the transition events to
    /// publish after the lock is released.
    fn apply_results(
        &self,
        results: Vec<LivestreamQueryResult>,
        now: chrono::DateTime<Utc>,
    ) -> Vec<MonitorEvent> {
        let mut events = Vec::new();
        let mut streams = self.streams.write();
        let roster: HashSet<ChannelIdentifier> = self.roster.read().iter().cloned().collect();

        let mut queried_ok: HashSet<ChannelIdentifier> = HashSet::new();
        let mut live_keys: HashSet<UniqueStreamKey> = HashSet::new();
        let mut live_channels: HashSet<ChannelIdentifier> = HashSet::new();

        for result in results {
            // A channel removed while the cycle was in flight: its late
            // result is discarded and reconciled membership stands.
            if !roster.contains(result.channel()) {
                debug!(channel = %result.channel(), "dropping result for unmonitored channel");
                continue;
            }
            match result {
                LivestreamQueryResult::Success(model) => {
                    let channel = model.channel().clone();
                    let key = model.stream_key();
                    queried_ok.insert(channel.clone());

                    let existing_pos = streams.iter().position(|s| s.stream_key() == key);
                    if model.live {
                        live_keys.insert(key.clone());
                        live_channels.insert(channel);
                        match existing_pos {
                            Some(pos) => {
                                let existing = &mut streams[pos];
                                let was_live = existing.live;
                                existing.refresh_from(&model);
                                existing.last_live_time = Some(now);
                                if !was_live {
                                    events.push(MonitorEvent::ChannelWentOnline {
                                        stream: existing.clone(),
                                        timestamp: now,
                                    });
                                }
                            }
                            None => {
                                let mut fresh = model;
                                fresh.last_live_time = Some(now);
                                streams.push(fresh);
                                // First resolution of a new channel is
                                // listed, not notified.
                            }
                        }
                    } else {
                        match existing_pos {
                            Some(pos) => {
                                let existing = &mut streams[pos];
                                if existing.live {
                                    existing.offline();
                                    events.push(MonitorEvent::ChannelWentOffline {
                                        channel: existing.channel().clone(),
                                        stream_key: key,
                                        timestamp: now,
                                    });
                                }
                                existing.display_name = model.display_name.clone();
                            }
                            None => streams.push(model),
                        }
                    }
                }
                LivestreamQueryResult::Failed(failed) => {
                    debug!(
                        channel = %failed.channel,
                        error = %failed.error,
                        "channel query failed, keeping last displayed state"
                    );
                    self.channel_states
                        .insert(failed.channel.clone(), ChannelState::QueryFailed);
                    events.push(MonitorEvent::ChannelQueryFailed {
                        channel: failed.channel,
                        error: failed.error.to_string(),
                        timestamp: now,
                    });
                }
            }
        }

        // Reconciliation: a stream that was live but is absent from its
        // (successfully queried) channel's online results this cycle goes
        // offline explicitly, never silently dropped from the list.
        for stream in streams.iter_mut() {
            if stream.live
                && queried_ok.contains(stream.channel())
                && !live_keys.contains(&stream.stream_key())
            {
                stream.offline();
                events.push(MonitorEvent::ChannelWentOffline {
                    channel: stream.channel().clone(),
                    stream_key: stream.stream_key(),
                    timestamp: now,
                });
            }
        }

        for channel in queried_ok {
            let state = if live_channels.contains(&channel) {
                ChannelState::Online
            } else {
                ChannelState::Offline
            };
            self.channel_states.insert(channel, state);
        }

        events
    }

    fn state_counts(&self) -> (usize, usize, usize) {
        let roster = self.roster.read();
        let mut online = 0;
        let mut offline = 0;
        let mut failed = 0;
        for channel in roster.iter() {
            match self.channel_state(channel) {
                Some(ChannelState::Online) => online += 1,
                Some(ChannelState::Offline) => offline += 1,
                Some(ChannelState::QueryFailed) => failed += 1,
                _ => {}
            }
        }
        (online, offline, failed)
    }

    async fn persist_roster(&self) -> Result<()> {
        let roster = self.roster.read().clone();
        self.store.save(&roster).await
    }
}

/// Query the full channel set of one provider for one cycle.
///
/// Bulk-capable providers are asked for their online channels first and
/// only the channels absent from that answer are fanned out individually;
/// a bulk failure degrades to the pure fan-out path instead of failing
/// every channel.
async fn query_provider(
    api: Arc<dyn PlatformApi>,
    executor: &ParallelQueryExecutor,
    channels: Vec<ChannelIdentifier>,
) -> Vec<LivestreamQueryResult> {
    if api.has_bulk_online_lookup() {
        match api.query_online_channels(&channels).await {
            Ok(online) => {
                let mut results = Vec::with_capacity(channels.len());
                let mut covered: HashSet<ChannelIdentifier> = HashSet::new();
                for model in online {
                    if channels.contains(model.channel()) {
                        covered.insert(model.channel().clone());
                        results.push(LivestreamQueryResult::success(model));
                    } else {
                        debug!(
                            provider = api.name(),
                            channel = %model.channel(),
                            "bulk lookup returned a channel that was not asked for"
                        );
                    }
                }
                let missing: Vec<ChannelIdentifier> = channels
                    .iter()
                    .filter(|c| !covered.contains(c))
                    .cloned()
                    .collect();
                results.extend(fan_out(api, executor, missing).await);
                return results;
            }
            Err(error) => {
                warn!(
                    provider = api.name(),
                    %error,
                    "bulk online lookup failed, falling back to per-channel queries"
                );
            }
        }
    }
    fan_out(api, executor, channels).await
}

/// Fan out per-channel queries through the shared executor.
async fn fan_out(
    api: Arc<dyn PlatformApi>,
    executor: &ParallelQueryExecutor,
    channels: Vec<ChannelIdentifier>,
) -> Vec<LivestreamQueryResult> {
    executor
        .query_all(channels, move |channel, token| {
            let api = api.clone();
            async move {
                tokio::select! {
                    _ = token.cancelled() => Err(ApiError::Cancelled),
                    result = api.query_channel(&channel) => result,
                }
            }
        })
        .await
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use platforms_api::Result as ApiResult;

    use super::*;
    use crate::persistence::MemoryStore;

    /// Scriptable platform stub: per-channel responses, optional bulk
    /// online lookup, call counting.
    #[derive(Default)]
    struct StubApi {
        name: String,
        bulk: bool,
        /// channel id -> (live, viewers); absent means the query fails.
        responses: DashMap<String, (bool, u64)>,
        query_calls: AtomicUsize,
        delay: Option<Duration>,
    }

    impl StubApi {
        fn named(name: &str) -> Self {
            Self {
                name: name.to_string(),
                ..Default::default()
            }
        }

        fn set_live(&self, channel_id: &str, viewers: u64) {
            self.responses
                .insert(channel_id.to_string(), (true, viewers));
        }

        fn set_offline(&self, channel_id: &str) {
            self.responses.insert(channel_id.to_string(), (false, 0));
        }

        fn set_failing(&self, channel_id: &str) {
            self.responses.remove(channel_id);
        }

        fn model_for(&self, channel: &ChannelIdentifier) -> ApiResult<LivestreamModel> {
            match self.responses.get(channel.channel_id()) {
                Some(entry) => {
                    let (live, viewers) = *entry;
                    let mut model =
                        LivestreamModel::new(channel.channel_id().to_string(), channel.clone());
                    model.live = live;
                    model.viewers = viewers;
                    if live {
                        model.start_time = Some(Utc::now());
                    }
                    Ok(model)
                }
                None => Err(ApiError::network("stubbed failure")),
            }
        }
    }

    #[async_trait]
    impl PlatformApi for StubApi {
        fn name(&self) -> &str {
            &self.name
        }

        fn has_bulk_online_lookup(&self) -> bool {
            self.bulk
        }

        fn is_authorized(&self) -> bool {
            true
        }

        async fn authorize(&self) -> ApiResult<bool> {
            Ok(true)
        }

        async fn query_channel(&self, channel: &ChannelIdentifier) -> ApiResult<LivestreamModel> {
            self.query_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.model_for(channel)
        }

        async fn query_online_channels(
            &self,
            channels: &[ChannelIdentifier],
        ) -> ApiResult<Vec<LivestreamModel>> {
            let mut online = Vec::new();
            for channel in channels {
                if let Ok(model) = self.model_for(channel)
                    && model.live
                {
                    online.push(model);
                }
            }
            Ok(online)
        }
    }

    fn monitor_with(api: Arc<StubApi>) -> Arc<ChannelMonitor> {
        let mut registry = ApiRegistry::new();
        registry.register(api);
        Arc::new(ChannelMonitor::new(
            Arc::new(registry),
            Arc::new(MemoryStore::new()),
        ))
    }

    fn channel(id: &str) -> ChannelIdentifier {
        ChannelIdentifier::new("twitchtv", id)
    }

    #[tokio::test]
    async fn test_add_channel_online() {
        let api = Arc::new(StubApi::named("twitchtv"));
        api.set_live("shroud", 15_000);
        let monitor = monitor_with(api);

        let state = monitor.add_channel(channel("shroud")).await.unwrap();
        assert_eq!(state, ChannelState::Online);
        assert_eq!(monitor.channels().len(), 1);
        assert_eq!(monitor.livestreams().len(), 1);
        assert!(monitor.livestreams()[0].live);
    }

    #[tokio::test]
    async fn test_add_channel_offline() {
        let api = Arc::new(StubApi::named("twitchtv"));
        api.set_offline("lirik");
        let monitor = monitor_with(api);

        let state = monitor.add_channel(channel("lirik")).await.unwrap();
        assert_eq!(state, ChannelState::Offline);
        assert_eq!(monitor.channels().len(), 1);
    }

    #[tokio::test]
    async fn test_add_channel_query_failure_still_added() {
        let api = Arc::new(StubApi::named("twitchtv"));
        let monitor = monitor_with(api);

        let state = monitor.add_channel(channel("foo")).await.unwrap();
        assert_eq!(state, ChannelState::QueryFailed);
        assert_eq!(monitor.channels().len(), 1);
    }

    #[tokio::test]
    async fn test_add_channel_validation() {
        let api = Arc::new(StubApi::named("twitchtv"));
        api.set_live("shroud", 100);
        let monitor = monitor_with(api);

        assert!(matches!(
            monitor
                .add_channel(ChannelIdentifier::new("twitchtv", ""))
                .await,
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            monitor
                .add_channel(ChannelIdentifier::new("hitbox", "someone"))
                .await,
            Err(Error::UnknownProvider(_))
        ));

        monitor.add_channel(channel("shroud")).await.unwrap();
        assert!(matches!(
            monitor.add_channel(channel("shroud")).await,
            Err(Error::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_refresh_transitions_and_idempotence() {
        let api = Arc::new(StubApi::named("twitchtv"));
        api.set_offline("shroud");
        let monitor = monitor_with(api.clone());
        monitor.add_channel(channel("shroud")).await.unwrap();

        let mut events = monitor.subscribe();

        // Goes live.
        api.set_live("shroud", 15_000);
        monitor.refresh().await;
        let mut saw_online = false;
        while let Ok(event) = events.try_recv() {
            if matches!(event, MonitorEvent::ChannelWentOnline { .. }) {
                saw_online = true;
            }
        }
        assert!(saw_online);
        assert_eq!(
            monitor.channel_state(&channel("shroud")),
            Some(ChannelState::Online)
        );

        // Second cycle with unchanged responses: no transition events,
        // fields unchanged.
        let before = monitor.livestreams();
        monitor.refresh().await;
        while let Ok(event) = events.try_recv() {
            assert!(
                matches!(event, MonitorEvent::RefreshCompleted { .. }),
                "unexpected event on idempotent refresh: {}",
                event.description()
            );
        }
        let after = monitor.livestreams();
        assert_eq!(before.len(), after.len());
        assert_eq!(before[0].viewers, after[0].viewers);
        assert_eq!(before[0].live, after[0].live);
    }

    #[tokio::test]
    async fn test_offline_transition_is_atomic() {
        let api = Arc::new(StubApi::named("twitchtv"));
        api.set_live("shroud", 15_000);
        let monitor = monitor_with(api.clone());
        monitor.add_channel(channel("shroud")).await.unwrap();

        api.set_offline("shroud");
        monitor.refresh().await;

        let stream = &monitor.livestreams()[0];
        // Fully post-transition: all three fields cleared together.
        assert!(!stream.live);
        assert_eq!(stream.viewers, 0);
        assert!(stream.start_time.is_none());
        assert_eq!(
            monitor.channel_state(&channel("shroud")),
            Some(ChannelState::Offline)
        );
    }

    #[tokio::test]
    async fn test_query_failure_retains_last_displayed_state() {
        let api = Arc::new(StubApi::named("twitchtv"));
        api.set_live("foo", 4_200);
        let monitor = monitor_with(api.clone());
        monitor.add_channel(channel("foo")).await.unwrap();

        api.set_failing("foo");
        monitor.refresh().await;

        // Still monitored, prior live/viewers unchanged.
        assert_eq!(monitor.channels().len(), 1);
        let stream = &monitor.livestreams()[0];
        assert!(stream.live);
        assert_eq!(stream.viewers, 4_200);
        assert_eq!(
            monitor.channel_state(&channel("foo")),
            Some(ChannelState::QueryFailed)
        );

        // Recovery next cycle notifies again only if it had gone offline
        // in between; unchanged live state stays quiet.
        api.set_live("foo", 4_300);
        let mut events = monitor.subscribe();
        monitor.refresh().await;
        while let Ok(event) = events.try_recv() {
            assert!(!matches!(event, MonitorEvent::ChannelWentOnline { .. }));
        }
        assert_eq!(
            monitor.channel_state(&channel("foo")),
            Some(ChannelState::Online)
        );
    }

    #[tokio::test]
    async fn test_bulk_provider_reconciles_absent_streams_to_offline() {
        let api = Arc::new(StubApi {
            name: "twitchtv".to_string(),
            bulk: true,
            ..Default::default()
        });
        api.set_live("shroud", 10_000);
        api.set_offline("lirik");
        let monitor = monitor_with(api.clone());
        monitor.add_channel(channel("shroud")).await.unwrap();
        monitor.add_channel(channel("lirik")).await.unwrap();

        // Next cycle the bulk lookup no longer lists shroud.
        api.set_offline("shroud");
        let mut events = monitor.subscribe();
        monitor.refresh().await;

        let mut saw_offline = false;
        while let Ok(event) = events.try_recv() {
            if let MonitorEvent::ChannelWentOffline { stream_key, .. } = event {
                assert_eq!(stream_key, UniqueStreamKey::new("twitchtv", "shroud"));
                saw_offline = true;
            }
        }
        assert!(saw_offline);
        // Never silently dropped.
        assert_eq!(monitor.livestreams().len(), 2);
        assert!(monitor.livestreams().iter().all(|s| !s.live));
    }

    #[tokio::test]
    async fn test_refresh_in_flight_guard_skips_overlapping_cycle() {
        let api = Arc::new(StubApi {
            name: "twitchtv".to_string(),
            delay: Some(Duration::from_millis(200)),
            ..Default::default()
        });
        api.set_live("shroud", 100);
        let monitor = monitor_with(api.clone());
        monitor.add_channel(channel("shroud")).await.unwrap();

        let calls_before = api.query_calls.load(Ordering::SeqCst);
        let slow = {
            let monitor = monitor.clone();
            tokio::spawn(async move { monitor.refresh().await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        // Overlapping request returns immediately without querying.
        monitor.refresh().await;
        slow.await.unwrap();

        assert_eq!(api.query_calls.load(Ordering::SeqCst), calls_before + 1);
    }

    #[tokio::test]
    async fn test_remove_channel_drops_streams() {
        let api = Arc::new(StubApi::named("twitchtv"));
        api.set_live("shroud", 100);
        let monitor = monitor_with(api);
        monitor.add_channel(channel("shroud")).await.unwrap();

        monitor.remove_channel(&channel("shroud")).await.unwrap();
        assert!(monitor.channels().is_empty());
        assert!(monitor.livestreams().is_empty());

        assert!(matches!(
            monitor.remove_channel(&channel("shroud")).await,
            Err(Error::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_load_channels_hydrates_and_refreshes() {
        let api = Arc::new(StubApi::named("twitchtv"));
        api.set_live("shroud", 100);
        api.set_offline("lirik");

        let mut registry = ApiRegistry::new();
        registry.register(api);
        let store = Arc::new(MemoryStore::with_channels(vec![
            channel("shroud"),
            channel("lirik"),
        ]));
        let monitor = ChannelMonitor::new(Arc::new(registry), store);

        let loaded = monitor.load_channels().await.unwrap();
        assert_eq!(loaded, 2);
        assert_eq!(
            monitor.channel_state(&channel("shroud")),
            Some(ChannelState::Online)
        );
        assert_eq!(
            monitor.channel_state(&channel("lirik")),
            Some(ChannelState::Offline)
        );
    }

    #[tokio::test]
    async fn test_import_skips_already_monitored() {
        struct ImportApi(StubApi);

        #[async_trait]
        impl PlatformApi for ImportApi {
            fn name(&self) -> &str {
                self.0.name()
            }
            fn has_follow_import(&self) -> bool {
                true
            }
            fn is_authorized(&self) -> bool {
                true
            }
            async fn authorize(&self) -> ApiResult<bool> {
                Ok(true)
            }
            async fn query_channel(
                &self,
                channel: &ChannelIdentifier,
            ) -> ApiResult<LivestreamModel> {
                self.0.query_channel(channel).await
            }
            async fn get_followed_channels(
                &self,
                _user_name: &str,
            ) -> ApiResult<Vec<ChannelIdentifier>> {
                Ok(vec![
                    ChannelIdentifier::new("twitchtv", "shroud"),
                    ChannelIdentifier::new("twitchtv", "lirik"),
                ])
            }
        }

        let stub = StubApi::named("twitchtv");
        stub.set_live("shroud", 100);
        stub.set_offline("lirik");
        let mut registry = ApiRegistry::new();
        registry.register(Arc::new(ImportApi(stub)));
        let monitor = Arc::new(ChannelMonitor::new(
            Arc::new(registry),
            Arc::new(MemoryStore::new()),
        ));

        monitor.add_channel(channel("shroud")).await.unwrap();
        let imported = monitor.import_channels("twitchtv", "someone").await.unwrap();
        assert_eq!(imported, 1);

        let channels = monitor.channels();
        assert_eq!(channels.len(), 2);
        let lirik = channels.iter().find(|c| c.channel_id() == "lirik").unwrap();
        assert_eq!(lirik.imported_by.as_deref(), Some("someone"));
    }
}
