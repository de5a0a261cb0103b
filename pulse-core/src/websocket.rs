//! WebSocket message types for the dashboard push channel
//!
//! These types define the protocol between the server and browser clients.

use serde::{Deserialize, Serialize};

use crate::{Configuration, ConnectionStatus, Snapshot};

// ============================================================================
// Client -> Server Messages
// ============================================================================

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Request an out-of-cycle fetch
    Refresh,
    /// Ping to keep connection alive
    Ping {
        /// Client timestamp
        timestamp: i64,
    },
}

// ============================================================================
// Server -> Client Messages
// ============================================================================

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Latest published snapshot
    Snapshot { snapshot: Snapshot },
    /// Configuration after a successful mutation
    Configuration { configuration: Configuration },
    /// Transport status change
    ConnectionStatus { status: ConnectionStatus },
    /// Error message
    Error { code: ErrorCode, message: String },
    /// Pong response to client ping
    Pong {
        /// Echo back client timestamp
        client_timestamp: i64,
        /// Server timestamp
        server_timestamp: i64,
    },
}

/// Error codes for WebSocket errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Invalid message format
    InvalidMessage,
    /// Client fell behind the broadcast and missed updates
    Lagged,
    /// Internal server error
    InternalError,
}
