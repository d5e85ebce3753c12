/*
 * Copyright 2025 Security Union LLC
 *
 * Licensed under either of
 *
 * * Apache License, Version 2.0
 *   (http://www.apache.org/licenses/LICENSE-2.0)
 * * MIT license
 *   (http://opensource.org/licenses/MIT)
 *
 * at your option.
 *
 * Unless you explicitly state otherwise, any contribution intentionally
 * submitted for inclusion in the work by you, as defined in the Apache-2.0
 * license, shall be dual licensed as above, without any additional terms or
 * conditions.
 */

//! Error types for the mesh engine.
//!
//! None of these is fatal to a session. Per-peer errors fail a single
//! lifecycle; bootstrap errors degrade the session to chat-only participation.

use roomcall_types::ConnectionId;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MeshError {
    /// Local camera / microphone could not be acquired.
    #[error("Local media unavailable: {0}")]
    MediaAcquisition(String),

    /// A roster entry without a usable display name. Dropped.
    #[error("Malformed roster entry at index {index}: {reason}")]
    MalformedRosterEntry { index: usize, reason: String },

    /// Call setup with one remote failed.
    #[error("Call negotiation with {remote} failed: {reason}")]
    CallNegotiation { remote: ConnectionId, reason: String },

    /// An inbound call that cannot be answered right now.
    #[error("Ignoring inbound call from {remote}: {reason}")]
    UnexpectedInboundCall { remote: ConnectionId, reason: String },

    /// A lifecycle was handed an input its current state does not accept.
    #[error("Lifecycle for {remote} in state {state} cannot accept {input}")]
    InvalidTransition {
        remote: ConnectionId,
        state: &'static str,
        input: &'static str,
    },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Room channel error: {0}")]
    Channel(String),

    /// The session is already handling another event.
    #[error("Mesh session is busy handling another event")]
    Busy,
}

/// Failure reported by a [`MediaTransport`](crate::MediaTransport) primitive.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Peer {0} is unreachable")]
    Unreachable(ConnectionId),

    #[error("Call was already closed")]
    CallClosed,

    #[error("{0}")]
    Other(String),
}

impl From<TransportError> for MeshError {
    fn from(e: TransportError) -> Self {
        MeshError::Transport(e.to_string())
    }
}
