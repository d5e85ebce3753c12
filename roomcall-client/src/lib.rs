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

//! This crate is the peer mesh coordination engine of the roomcall browser
//! client. Given the roster pushed by the room channel it decides which side
//! of every pair of participants places the call, tracks one call lifecycle
//! per remote participant, keeps the registry of live media streams and
//! projects all of it into a render-ready participant grid.
//!
//! The crate makes no assumptions about the UI or the media transport. Both
//! sit behind traits: [`MediaTransport`] for point-to-point calls and
//! [`RoomChannel`] for the outbound `join`. Everything else arrives as events
//! handed to a [`MeshSession`] (or to a cloneable [`MeshClient`] handle).
//!
//! # Outline of usage
//!
//! ```ignore
//! let options = MeshClientOptions {...}; // names, config and callbacks
//! let client = MeshClient::new(options, transport, channel);
//!
//! // Transport assigned our identity, then the camera request resolved.
//! client.local_identity(my_id)?;
//! client.local_media(Ok(camera_stream))?;
//!
//! // Room channel pushed the roster; calls are placed as needed.
//! client.roster_update_json(payload)?;
//!
//! // Transport callbacks.
//! client.incoming_call(IncomingCall { call, remote })?;
//! client.transport_event(TransportEvent::stream(call, remote, stream))?;
//! ```

mod client;
mod coordinator;
mod error;
mod event_bus;
mod events;
mod lifecycle;
mod projector;
mod registry;
mod roster;
mod session;
mod transport;

#[cfg(test)]
mod tests;

pub use client::{MeshClient, MeshClientOptions};
pub use coordinator::{
    should_initiate, CallAction, CallCoordinator, LifecycleTable, MeshView, NoOpReason,
};
pub use error::{MeshError, TransportError};
pub use event_bus::EventBus;
pub use events::MeshEvent;
pub use lifecycle::{ConnectionLifecycle, LifecycleState, Transition};
pub use projector::{project, project_with_palette, ParticipantView};
pub use registry::{StreamKey, StreamRegistry};
pub use roomcall_types::{ConnectionId, JoinRequest, MeshConfig, RosterEntry, WireRosterEntry};
pub use roster::{RosterDiff, RosterStore};
pub use session::{LocalMedia, MeshSession};
pub use transport::{
    CallEventKind, CallId, IncomingCall, MediaTransport, RoomChannel, TrackKind, TransportEvent,
};
