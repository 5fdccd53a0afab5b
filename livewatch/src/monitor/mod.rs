//! Channel monitoring and reconciliation.

mod events;
mod service;
mod state;

pub use events::{MonitorEvent, MonitorEventBroadcaster};
pub use service::{ChannelMonitor, MonitorConfig};
pub use state::ChannelState;
