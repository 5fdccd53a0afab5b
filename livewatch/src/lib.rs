//! livewatch core library.
//!
//! Tracks the live/offline state of user-selected broadcast channels
//! across independent streaming platforms and raises transient on-screen
//! alerts when a channel (monitored or merely popular) crosses a viewer
//! threshold.
//!
//! # Architecture
//!
//! - [`monitor::ChannelMonitor`] owns the monitored roster and drives the
//!   periodic reconciliation cycle over the providers registered in a
//!   [`platforms_api::ApiRegistry`].
//! - [`watcher::PopularLivestreamWatcher`] independently polls top
//!   streams, deduplicating alerts through a TTL cache.
//! - [`notification::NotificationHandler`] schedules at most four
//!   on-screen notifications with a FIFO overflow buffer.
//! - State changes travel as broadcast events
//!   ([`monitor::MonitorEvent`], [`notification::NotificationViewEvent`],
//!   [`settings::SettingsEvent`]); presentation subscribes, it is never
//!   called back into.

pub mod clock;
pub mod error;
pub mod monitor;
pub mod notification;
pub mod persistence;
pub mod settings;
pub mod watcher;

pub use error::{Error, Result};
