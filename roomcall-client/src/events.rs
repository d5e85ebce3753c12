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

//! Framework-agnostic events emitted by a mesh session.
//!
//! These are broadcast on the session's [`EventBus`](crate::EventBus) and can
//! be consumed by any frontend (Yew, Dioxus, Leptos, plain JS via
//! wasm-bindgen, ...).

use crate::projector::ParticipantView;
use crate::roster::RosterDiff;
use crate::transport::TrackKind;
use roomcall_types::ConnectionId;

#[derive(Clone, Debug)]
pub enum MeshEvent<S> {
    // === Rendering ===
    /// Fresh projection after any roster or registry change.
    ViewChanged(Vec<ParticipantView<S>>),

    // === Roster ===
    /// A roster push was applied.
    RosterChanged(RosterDiff),

    // === Peer Events ===
    /// First remote stream arrived from a peer.
    PeerConnected(ConnectionId),

    /// A connected peer's call closed or the peer left the roster.
    PeerDisconnected(ConnectionId),

    /// A single peer's call failed. Other peers are unaffected.
    LifecycleFailed {
        remote: ConnectionId,
        reason: String,
    },

    // === Session Events ===
    /// Local camera / microphone could not be acquired. Emitted once.
    MediaUnavailable(String),

    /// The join request went out on the room channel.
    Joined {
        connection_id: Option<ConnectionId>,
    },

    /// A local track was switched on or off.
    LocalTrackToggled { track: TrackKind, enabled: bool },
}
