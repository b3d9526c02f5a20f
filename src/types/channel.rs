//! Channel addressing and connection lifecycle types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies which logical stream to subscribe to.
///
/// Field names on the config surface are `server` and `channel`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Endpoint base, e.g. `ws://127.0.0.1:8000`
    #[serde(rename = "server")]
    pub base_url: String,

    /// Logical stream number
    #[serde(rename = "channel")]
    pub channel_id: u32,
}

impl ChannelConfig {
    pub fn new(base_url: impl Into<String>, channel_id: u32) -> Self {
        Self { base_url: base_url.into(), channel_id }
    }

    /// Connection URI: `{base_url}/down/{channel_id}`.
    pub fn uri(&self) -> String {
        format!("{}/down/{}", self.base_url.trim_end_matches('/'), self.channel_id)
    }
}

impl fmt::Display for ChannelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri())
    }
}

/// Lifecycle state of one connection instance.
///
/// ```text
/// Connecting ──► Open ──► Closing ──► Closed
///     │            │
///     └──► Failed ◄┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelState {
    /// Connection attempt in flight
    Connecting,
    /// Handshake sent, updates flowing
    Open,
    /// Superseded or shut down, tearing down
    Closing,
    /// Ended (by us or by the remote)
    Closed,
    /// Open failed, was rejected, or broke with a protocol error
    Failed,
}

impl ChannelState {
    /// `Closed` and `Failed` are terminal for a connection instance.
    pub fn is_terminal(self) -> bool {
        matches!(self, ChannelState::Closed | ChannelState::Failed)
    }
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChannelState::Connecting => "connecting",
            ChannelState::Open => "open",
            ChannelState::Closing => "closing",
            ChannelState::Closed => "closed",
            ChannelState::Failed => "failed",
        };
        f.write_str(name)
    }
}
