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

//! The explicit session object that owns all mesh state.
//!
//! Every externally delivered event (roster push, identity assignment, media
//! bootstrap result, inbound call, transport callback, user toggle) enters
//! through one `handle_*` method taking `&mut self`, so each event's state
//! mutation is applied completely before the next one starts.

use crate::coordinator::{
    should_initiate, CallAction, CallCoordinator, LifecycleTable, MeshView,
};
use crate::error::MeshError;
use crate::event_bus::EventBus;
use crate::events::MeshEvent;
use crate::lifecycle::{ConnectionLifecycle, LifecycleState, Transition};
use crate::projector::{project_with_palette, ParticipantView};
use crate::registry::{StreamKey, StreamRegistry};
use crate::roster::{RosterDiff, RosterStore};
use crate::transport::{
    CallEventKind, IncomingCall, MediaTransport, RoomChannel, TrackKind, TransportEvent,
};
use async_broadcast::Receiver;
use log::{debug, error, info, warn};
use roomcall_types::{ConnectionId, JoinRequest, MeshConfig, RosterEntry, WireRosterEntry};
use std::fmt;
use web_time::Instant;

/// Progress of the one-time local camera / microphone request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LocalMedia {
    Pending,
    Ready,
    Unavailable(String),
}

pub struct MeshSession<T: MediaTransport, C: RoomChannel> {
    config: MeshConfig,
    display_name: String,
    room_name: String,
    local: Option<ConnectionId>,
    media: LocalMedia,
    joined: bool,
    camera_enabled: bool,
    microphone_enabled: bool,
    roster: RosterStore,
    registry: StreamRegistry<T::Stream>,
    lifecycles: LifecycleTable,
    transport: T,
    channel: C,
    bus: EventBus<T::Stream>,
    pending_view: Option<Vec<ParticipantView<T::Stream>>>,
}

impl<T: MediaTransport, C: RoomChannel> fmt::Debug for MeshSession<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MeshSession")
            .field("room_name", &self.room_name)
            .field("local", &self.local)
            .field("media", &self.media)
            .field("joined", &self.joined)
            .field("peers", &self.lifecycles.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<T: MediaTransport, C: RoomChannel> MeshSession<T, C> {
    pub fn new(
        display_name: impl Into<String>,
        room_name: impl Into<String>,
        transport: T,
        channel: C,
        config: MeshConfig,
    ) -> Self {
        let bus = EventBus::new(config.event_bus_capacity);
        Self {
            config,
            display_name: display_name.into(),
            room_name: room_name.into(),
            local: None,
            media: LocalMedia::Pending,
            joined: false,
            camera_enabled: true,
            microphone_enabled: true,
            roster: RosterStore::new(),
            registry: StreamRegistry::new(),
            lifecycles: LifecycleTable::new(),
            transport,
            channel,
            bus,
            pending_view: None,
        }
    }

    // === Accessors ===

    pub fn subscribe(&self) -> Receiver<MeshEvent<T::Stream>> {
        self.bus.subscribe()
    }

    pub fn local_id(&self) -> Option<&ConnectionId> {
        self.local.as_ref()
    }

    pub fn local_media(&self) -> &LocalMedia {
        &self.media
    }

    pub fn is_joined(&self) -> bool {
        self.joined
    }

    pub fn roster(&self) -> &[RosterEntry] {
        self.roster.entries()
    }

    pub fn registry(&self) -> &StreamRegistry<T::Stream> {
        &self.registry
    }

    pub fn lifecycle(&self, remote: &ConnectionId) -> Option<&ConnectionLifecycle> {
        self.lifecycles.get(remote)
    }

    /// Remotes with an `Initiating`, `AwaitingAnswer` or `Connected` lifecycle.
    pub fn live_peers(&self) -> Vec<ConnectionId> {
        self.lifecycles
            .iter()
            .filter(|(_, lc)| lc.state().is_live())
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn camera_enabled(&self) -> bool {
        self.camera_enabled
    }

    pub fn microphone_enabled(&self) -> bool {
        self.microphone_enabled
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    /// Projects the current state without emitting anything.
    pub fn view(&self) -> Vec<ParticipantView<T::Stream>> {
        project_with_palette(
            self.roster.entries(),
            &self.registry,
            self.local.as_ref(),
            self.config.tile_palette,
        )
    }

    /// The projection produced by the most recent change, if not taken yet.
    pub fn take_pending_view(&mut self) -> Option<Vec<ParticipantView<T::Stream>>> {
        self.pending_view.take()
    }

    // === Bootstrap ===

    /// Records this session's own connection id. Delivered once by the
    /// transport; a later, different id is ignored.
    pub fn handle_local_identity(&mut self, id: ConnectionId) {
        match &self.local {
            Some(existing) if *existing == id => return,
            Some(existing) => {
                warn!("Ignoring second local identity {id}, already assigned {existing}");
                return;
            }
            None => {}
        }
        info!("Local connection id assigned: {id}");
        self.local = Some(id.clone());
        self.roster.set_local(Some(id));
        self.try_send_join();
        self.reconcile();
        self.reproject();
    }

    /// Resolves the one-time local media request.
    ///
    /// On failure the session carries on without audio/video: `join` goes out
    /// with no connection id and no call is ever placed or answered.
    pub fn handle_local_media(&mut self, result: Result<T::Stream, String>) {
        if self.media != LocalMedia::Pending {
            warn!("Local media already resolved, ignoring another result");
            return;
        }
        match result {
            Ok(stream) => {
                info!("Local media ready");
                self.registry.set(StreamKey::Local, stream);
                self.media = LocalMedia::Ready;
                self.try_send_join();
                self.reconcile();
                self.reproject();
            }
            Err(reason) => {
                error!("{}", MeshError::MediaAcquisition(reason.clone()));
                self.media = LocalMedia::Unavailable(reason.clone());
                self.bus.emit(MeshEvent::MediaUnavailable(reason));
                self.try_send_join();
            }
        }
    }

    fn try_send_join(&mut self) {
        if self.joined {
            return;
        }
        let connection_id = match (&self.media, &self.local) {
            (LocalMedia::Pending, _) => return,
            (LocalMedia::Ready, None) => return,
            (LocalMedia::Ready, Some(id)) => Some(id.clone()),
            (LocalMedia::Unavailable(_), _) => None,
        };
        let join = JoinRequest {
            display_name: self.display_name.clone(),
            room_name: self.room_name.clone(),
            connection_id,
        };
        match self.channel.send_join(&join) {
            Ok(()) => {
                info!(
                    "Joined room {} as {} (connection id: {:?})",
                    join.room_name, join.display_name, join.connection_id
                );
                self.joined = true;
                self.bus.emit(MeshEvent::Joined {
                    connection_id: join.connection_id,
                });
            }
            Err(e) => error!("Failed to send join: {e}"),
        }
    }

    // === Roster ===

    /// Applies one wholesale roster push: stores it, tears down departed
    /// peers, places the calls this side is responsible for and re-projects.
    ///
    /// A push proves the channel is up again, so a `join` that failed earlier
    /// is retried first.
    pub fn handle_roster_update(&mut self, entries: Vec<WireRosterEntry>) -> RosterDiff {
        self.try_send_join();
        let diff = self.roster.replace(entries);
        debug!(
            "Roster update: +{:?} -{:?} ={:?}",
            diff.added, diff.removed, diff.unchanged
        );
        self.reconcile();
        self.bus.emit(MeshEvent::RosterChanged(diff.clone()));
        self.reproject();
        diff
    }

    fn reconcile(&mut self) {
        let actions = CallCoordinator::plan(&MeshView {
            roster: self.roster.remote_ids(),
            local: self.local.as_ref(),
            local_media_ready: self.media == LocalMedia::Ready,
            lifecycles: &self.lifecycles,
            registry: &self.registry,
        });
        for action in actions {
            match action {
                CallAction::Teardown(remote) => self.teardown(&remote),
                CallAction::Initiate(remote) => self.initiate(remote),
                CallAction::NoOp { .. } => {}
            }
        }
    }

    fn teardown(&mut self, remote: &ConnectionId) {
        debug!("Tearing down {remote}: no longer in roster");
        let had_stream = self.registry.remote(remote).is_some();
        if let Some(lifecycle) = self.lifecycles.remove(remote) {
            if let Some(call) = lifecycle.teardown(&mut self.registry) {
                self.transport.hang_up(call);
            }
        }
        self.registry.remove(&StreamKey::Remote(remote.clone()));
        if had_stream {
            self.bus.emit(MeshEvent::PeerDisconnected(remote.clone()));
        }
    }

    fn initiate(&mut self, remote: ConnectionId) {
        let Some(local_stream) = self.registry.local().cloned() else {
            return;
        };
        let mut lifecycle = ConnectionLifecycle::new(remote.clone());
        info!("Calling {remote}");
        match self.transport.place_call(&remote, &local_stream) {
            Ok(call) => {
                if let Err(e) = lifecycle.initiate(call) {
                    error!("{e}");
                }
            }
            Err(e) => {
                let reason = e.to_string();
                error!("Error calling {remote}: {reason}");
                lifecycle.fail(&reason, &mut self.registry);
                self.bus.emit(MeshEvent::LifecycleFailed {
                    remote: remote.clone(),
                    reason,
                });
            }
        }
        self.lifecycles.insert(remote, lifecycle);
    }

    // === Calls ===

    /// Answers an inbound call when we can.
    ///
    /// Calls are declined while local media is missing, while another call
    /// with the same peer is live, and (in strict mode) when the tie-break
    /// says we should have been the caller. A declined call creates no
    /// lifecycle and schedules no retry.
    pub fn handle_incoming_call(&mut self, incoming: IncomingCall) -> Result<(), MeshError> {
        let remote = incoming.remote.clone();
        info!("Incoming call from {remote}");

        let decline = match (&self.media, self.registry.local()) {
            (LocalMedia::Ready, Some(_)) => None,
            _ => Some("local media not available yet"),
        }
        .or_else(|| {
            self.lifecycles
                .get(&remote)
                .filter(|lc| lc.state().is_live())
                .map(|_| "a call with this peer is already in progress")
        })
        .or_else(|| match &self.local {
            Some(local) if self.config.strict_tie_break && should_initiate(local, &remote) => {
                Some("tie-break says we place this call")
            }
            _ => None,
        });

        if let Some(reason) = decline {
            warn!("Ignoring inbound call from {remote}: {reason}");
            self.transport.reject(&incoming);
            return Err(MeshError::UnexpectedInboundCall {
                remote,
                reason: reason.to_string(),
            });
        }

        let Some(local_stream) = self.registry.local().cloned() else {
            return Ok(());
        };
        let mut lifecycle = ConnectionLifecycle::new(remote.clone());
        let result = match self.transport.answer(&incoming, &local_stream) {
            Ok(()) => lifecycle.accept(incoming.call),
            Err(e) => {
                let reason = e.to_string();
                error!("Error answering call from {remote}: {reason}");
                lifecycle.fail(&reason, &mut self.registry);
                self.bus.emit(MeshEvent::LifecycleFailed {
                    remote: remote.clone(),
                    reason: reason.clone(),
                });
                Err(MeshError::CallNegotiation {
                    remote: remote.clone(),
                    reason,
                })
            }
        };
        self.lifecycles.insert(remote, lifecycle);
        result
    }

    /// Applies a stream / close / error callback from the transport.
    ///
    /// Events for a call that is no longer the peer's current call (the peer
    /// left, or a newer attempt replaced it) are ignored.
    pub fn handle_transport_event(&mut self, event: TransportEvent<T::Stream>) {
        let TransportEvent { call, remote, kind } = event;
        let Some(lifecycle) = self.lifecycles.get_mut(&remote) else {
            debug!("Ignoring {call} event from {remote}: no lifecycle");
            return;
        };
        if lifecycle.call() != Some(call) {
            debug!(
                "Ignoring stale {call} event from {remote} in state {}",
                lifecycle.state().name()
            );
            return;
        }

        let was_connected = matches!(lifecycle.state(), LifecycleState::Connected { .. });
        let outcome = match kind {
            CallEventKind::Stream(stream) => {
                info!("Remote stream received from {remote}");
                lifecycle.on_stream(stream, &mut self.registry)
            }
            CallEventKind::Closed => {
                info!("Call closed with {remote}");
                lifecycle.on_close(&mut self.registry)
            }
            CallEventKind::Error(reason) => {
                error!("Error in call with {remote}: {reason}");
                let outcome = lifecycle.on_error(&reason, &mut self.registry);
                self.transport.hang_up(call);
                outcome
            }
        };

        match outcome {
            Ok(Transition::Connected) => {
                self.bus.emit(MeshEvent::PeerConnected(remote));
            }
            Ok(Transition::StreamReplaced) => {}
            Ok(Transition::Closed) => {
                self.bus.emit(MeshEvent::PeerDisconnected(remote));
            }
            Ok(Transition::Failed(reason)) => {
                if was_connected {
                    self.bus.emit(MeshEvent::PeerDisconnected(remote.clone()));
                }
                self.bus.emit(MeshEvent::LifecycleFailed { remote, reason });
            }
            Err(e) => {
                debug!("{e}");
                return;
            }
        }
        self.reproject();
    }

    /// Fails lifecycles that have been negotiating for longer than the
    /// configured timeout. Returns how many were failed.
    pub fn expire_stalled(&mut self, now: Instant) -> usize {
        let Some(timeout) = self.config.negotiation_timeout else {
            return 0;
        };
        let stalled: Vec<ConnectionId> = self
            .lifecycles
            .iter()
            .filter(|(_, lc)| lc.is_stalled(now, timeout))
            .map(|(id, _)| id.clone())
            .collect();

        for remote in &stalled {
            if let Some(lifecycle) = self.lifecycles.get_mut(remote) {
                let call = lifecycle.call();
                let reason = format!("negotiation timed out after {timeout:?}");
                warn!("Call with {remote} stalled: {reason}");
                lifecycle.fail(&reason, &mut self.registry);
                if let Some(call) = call {
                    self.transport.hang_up(call);
                }
                self.bus.emit(MeshEvent::LifecycleFailed {
                    remote: remote.clone(),
                    reason,
                });
            }
        }
        if !stalled.is_empty() {
            self.reproject();
        }
        stalled.len()
    }

    // === Local controls ===

    /// Flips the local video track. `None` when there is no local stream.
    pub fn toggle_camera(&mut self) -> Option<bool> {
        let stream = self.registry.local()?.clone();
        self.camera_enabled = !self.camera_enabled;
        self.set_track(&stream, TrackKind::Video, self.camera_enabled);
        Some(self.camera_enabled)
    }

    /// Flips the local audio track. `None` when there is no local stream.
    pub fn toggle_microphone(&mut self) -> Option<bool> {
        let stream = self.registry.local()?.clone();
        self.microphone_enabled = !self.microphone_enabled;
        self.set_track(&stream, TrackKind::Audio, self.microphone_enabled);
        Some(self.microphone_enabled)
    }

    fn set_track(&mut self, stream: &T::Stream, track: TrackKind, enabled: bool) {
        debug!("Setting local {track} track enabled={enabled}");
        self.transport.set_track_enabled(stream, track, enabled);
        self.bus.emit(MeshEvent::LocalTrackToggled { track, enabled });
    }

    /// Hangs up every call and forgets all remote state. The local stream is
    /// kept for the rest of the session.
    pub fn leave(&mut self) {
        info!("Leaving room {}", self.room_name);
        let lifecycles = std::mem::take(&mut self.lifecycles);
        for (remote, lifecycle) in lifecycles {
            let connected = matches!(lifecycle.state(), LifecycleState::Connected { .. });
            if let Some(call) = lifecycle.teardown(&mut self.registry) {
                self.transport.hang_up(call);
            }
            if connected {
                self.bus.emit(MeshEvent::PeerDisconnected(remote));
            }
        }
        self.registry.clear_remote();
        self.roster.clear();
        self.reproject();
    }

    fn reproject(&mut self) {
        let views = self.view();
        self.pending_view = Some(views.clone());
        self.bus.emit(MeshEvent::ViewChanged(views));
    }
}
