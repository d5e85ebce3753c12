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

//! Seams to the external collaborators: the point-to-point media transport
//! and the room channel.
//!
//! Both are driven from the single event context that owns the session. The
//! transport reports call progress back through
//! [`MeshSession::handle_transport_event`](crate::MeshSession::handle_transport_event).

use crate::error::TransportError;
use roomcall_types::{ConnectionId, JoinRequest};
use std::fmt;

/// Transport-assigned identifier of one call attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallId(pub u64);

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "call#{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Audio,
    Video,
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackKind::Audio => write!(f, "audio"),
            TrackKind::Video => write!(f, "video"),
        }
    }
}

/// A call offered by a remote peer, not yet answered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IncomingCall {
    pub call: CallId,
    pub remote: ConnectionId,
}

#[derive(Clone, Debug, PartialEq)]
pub enum CallEventKind<S> {
    /// The remote media stream arrived.
    Stream(S),
    Closed,
    Error(String),
}

/// One callback fired by the transport for an outbound or answered call.
#[derive(Clone, Debug, PartialEq)]
pub struct TransportEvent<S> {
    pub call: CallId,
    pub remote: ConnectionId,
    pub kind: CallEventKind<S>,
}

impl<S> TransportEvent<S> {
    pub fn stream(call: CallId, remote: impl Into<ConnectionId>, stream: S) -> Self {
        Self {
            call,
            remote: remote.into(),
            kind: CallEventKind::Stream(stream),
        }
    }

    pub fn closed(call: CallId, remote: impl Into<ConnectionId>) -> Self {
        Self {
            call,
            remote: remote.into(),
            kind: CallEventKind::Closed,
        }
    }

    pub fn error(call: CallId, remote: impl Into<ConnectionId>, reason: impl Into<String>) -> Self {
        Self {
            call,
            remote: remote.into(),
            kind: CallEventKind::Error(reason.into()),
        }
    }
}

/// Point-to-point media transport with NAT traversal already solved.
///
/// Callbacks may be delivered synchronously from inside `place_call` or
/// `answer` when they go through a [`MeshClient`](crate::MeshClient); the
/// client queues them until the current event is done.
pub trait MediaTransport {
    /// Opaque handle to a live audio/video source.
    type Stream: Clone + fmt::Debug;

    /// Places an outbound call carrying the local stream.
    fn place_call(
        &mut self,
        remote: &ConnectionId,
        local: &Self::Stream,
    ) -> Result<CallId, TransportError>;

    /// Answers an inbound call with the local stream.
    fn answer(&mut self, call: &IncomingCall, local: &Self::Stream) -> Result<(), TransportError>;

    /// Declines an inbound call. The remote is expected to retry on its own.
    fn reject(&mut self, _call: &IncomingCall) {}

    /// Closes a call and releases its resources. Must tolerate calls that
    /// are already closed.
    fn hang_up(&mut self, call: CallId);

    /// Enables or disables one track of the local stream.
    fn set_track_enabled(&mut self, _local: &Self::Stream, _track: TrackKind, _enabled: bool) {}
}

/// Outbound half of the room channel.
pub trait RoomChannel {
    fn send_join(&mut self, join: &JoinRequest) -> anyhow::Result<()>;
}
