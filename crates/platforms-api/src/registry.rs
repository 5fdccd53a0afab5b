//! Name-keyed provider registry.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::provider::PlatformApi;

/// Runtime registry of platform integrations, keyed by provider name.
///
/// Heterogeneous platforms sit behind the one [`PlatformApi`] contract and
/// are selected by name at runtime. Iteration order is deterministic
/// (sorted by name) so refresh cycles and logs are stable.
#[derive(Default)]
pub struct ApiRegistry {
    providers: BTreeMap<String, Arc<dyn PlatformApi>>,
}

impl ApiRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a platform under its own name. Replaces any previous
    /// registration with the same name.
    pub fn register(&mut self, api: Arc<dyn PlatformApi>) {
        self.providers.insert(api.name().to_string(), api);
    }

    /// Look up a platform by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn PlatformApi>> {
        self.providers.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    /// All registered platforms in name order.
    pub fn all(&self) -> Vec<Arc<dyn PlatformApi>> {
        self.providers.values().cloned().collect()
    }

    /// Registered provider names in order.
    pub fn names(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::error::Result;
    use crate::identity::ChannelIdentifier;
    use crate::livestream::LivestreamModel;

    struct NamedApi(&'static str);

    #[async_trait]
    impl PlatformApi for NamedApi {
        fn name(&self) -> &str {
            self.0
        }

        fn is_authorized(&self) -> bool {
            true
        }

        async fn authorize(&self) -> Result<bool> {
            Ok(true)
        }

        async fn query_channel(&self, channel: &ChannelIdentifier) -> Result<LivestreamModel> {
            Ok(LivestreamModel::new(
                channel.channel_id().to_string(),
                channel.clone(),
            ))
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = ApiRegistry::new();
        registry.register(Arc::new(NamedApi("twitchtv")));
        registry.register(Arc::new(NamedApi("youtube")));

        assert_eq!(registry.len(), 2);
        assert!(registry.contains("twitchtv"));
        assert!(registry.get("hitbox").is_none());
        assert_eq!(registry.get("youtube").unwrap().name(), "youtube");
    }

    #[test]
    fn test_deterministic_order() {
        let mut registry = ApiRegistry::new();
        registry.register(Arc::new(NamedApi("youtube")));
        registry.register(Arc::new(NamedApi("beam")));
        registry.register(Arc::new(NamedApi("twitchtv")));

        assert_eq!(registry.names(), vec!["beam", "twitchtv", "youtube"]);
    }

    #[test]
    fn test_reregister_replaces() {
        let mut registry = ApiRegistry::new();
        registry.register(Arc::new(NamedApi("twitchtv")));
        registry.register(Arc::new(NamedApi("twitchtv")));
        assert_eq!(registry.len(), 1);
    }
}
