//! Connection status reported by the transport layer

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Transport state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No transport running
    Idle,
    /// Waiting for the first fetch or subscribe acknowledgement
    Connecting,
    /// Receiving data
    Connected,
    /// Last attempt failed, a retry is scheduled
    Error,
    /// Remote closed the stream, a reconnect is scheduled
    Disconnected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Error => "error",
            ConnectionState::Disconnected => "disconnected",
        };
        write!(f, "{}", s)
    }
}

/// State plus a human-readable reason
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    pub reason: String,
    pub since: DateTime<Utc>,
}

impl ConnectionStatus {
    pub fn new(state: ConnectionState, reason: impl Into<String>) -> Self {
        Self {
            state,
            reason: reason.into(),
            since: Utc::now(),
        }
    }

    pub fn idle(reason: impl Into<String>) -> Self {
        Self::new(ConnectionState::Idle, reason)
    }

    pub fn connecting(reason: impl Into<String>) -> Self {
        Self::new(ConnectionState::Connecting, reason)
    }

    pub fn connected(reason: impl Into<String>) -> Self {
        Self::new(ConnectionState::Connected, reason)
    }

    pub fn error(reason: impl Into<String>) -> Self {
        Self::new(ConnectionState::Error, reason)
    }

    pub fn disconnected(reason: impl Into<String>) -> Self {
        Self::new(ConnectionState::Disconnected, reason)
    }

    pub fn is_error(&self) -> bool {
        self.state == ConnectionState::Error
    }
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        Self::idle("not started")
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.state, self.reason)
    }
}
