//! User settings and change notification.

mod events;
mod service;

pub use events::{SettingsEvent, SettingsEventBroadcaster};
pub use service::{Settings, SettingsService};
