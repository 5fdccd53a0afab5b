//! Channel-list persistence.
//!
//! The monitored-channel roster is round-tripped through an opaque
//! [`ChannelListStore`] at startup and on every add/remove. The store is
//! a collaborator seam: the default implementation is a JSON file, tests
//! use the in-memory store.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use platforms_api::ChannelIdentifier;

use crate::error::Result;

/// Opaque load/save of the monitored channel list.
#[async_trait]
pub trait ChannelListStore: Send + Sync {
    async fn load(&self) -> Result<Vec<ChannelIdentifier>>;
    async fn save(&self, channels: &[ChannelIdentifier]) -> Result<()>;
}

/// JSON file backed store.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

#[async_trait]
impl ChannelListStore for JsonFileStore {
    async fn load(&self) -> Result<Vec<ChannelIdentifier>> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no channel list file yet, starting empty");
            return Ok(Vec::new());
        }
        let contents = tokio::fs::read_to_string(&self.path).await?;
        let channels = serde_json::from_str(&contents)?;
        Ok(channels)
    }

    async fn save(&self, channels: &[ChannelIdentifier]) -> Result<()> {
        let contents = serde_json::to_string_pretty(channels)?;
        // Write-then-rename keeps the list intact if we die mid-write.
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, contents).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!(
            path = %self.path.display(),
            count = channels.len(),
            "saved channel list"
        );
        Ok(())
    }
}

/// In-memory store for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryStore {
    channels: parking_lot::Mutex<Vec<ChannelIdentifier>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_channels(channels: Vec<ChannelIdentifier>) -> Self {
        Self {
            channels: parking_lot::Mutex::new(channels),
        }
    }
}

#[async_trait]
impl ChannelListStore for MemoryStore {
    async fn load(&self) -> Result<Vec<ChannelIdentifier>> {
        Ok(self.channels.lock().clone())
    }

    async fn save(&self, channels: &[ChannelIdentifier]) -> Result<()> {
        *self.channels.lock() = channels.to_vec();
        Ok(())
    }
}
