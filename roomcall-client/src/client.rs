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

use crate::error::MeshError;
use crate::events::MeshEvent;
use crate::projector::ParticipantView;
use crate::roster::RosterDiff;
use crate::session::{LocalMedia, MeshSession};
use crate::transport::{IncomingCall, MediaTransport, RoomChannel, TransportEvent};
use async_broadcast::Receiver;
use log::{debug, error, warn};
use roomcall_types::{Callback, ConnectionId, MeshConfig, RosterUpdate, WireRosterEntry};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;
use web_time::Instant;

/// Options struct for constructing a client via [MeshClient::new(options)][MeshClient::new]
pub struct MeshClientOptions<S> {
    /// Name shown to the other participants. Not required to be unique.
    pub display_name: String,

    /// Room to join.
    pub room_name: String,

    pub config: MeshConfig,

    /// Callback will be called as `callback(views)` after every roster or stream change
    pub on_view_changed: Callback<Vec<ParticipantView<S>>>,

    /// Callback will be called once as `callback(reason)` if the camera / microphone
    /// could not be acquired
    pub on_media_unavailable: Callback<String>,
}

impl<S> Clone for MeshClientOptions<S> {
    fn clone(&self) -> Self {
        Self {
            display_name: self.display_name.clone(),
            room_name: self.room_name.clone(),
            config: self.config.clone(),
            on_view_changed: self.on_view_changed.clone(),
            on_media_unavailable: self.on_media_unavailable.clone(),
        }
    }
}

/// Transport callbacks that arrived while the session was borrowed.
enum Deferred<S> {
    Transport(TransportEvent<S>),
    Incoming(IncomingCall),
}

/// Cloneable handle to a [`MeshSession`] for UI and transport glue.
///
/// The browser delivers roster pushes, transport callbacks and button clicks
/// from independent closures; each of them holds a clone of this handle and
/// forwards its event here. Events are applied one at a time, and the option
/// callbacks only run after the session has been released, so a callback may
/// call back into the client.
///
/// A transport may fire its callbacks synchronously, from inside
/// `place_call` or `answer`. Such events find the session borrowed; they are
/// queued and applied by the dispatch that holds the borrow before it returns.
pub struct MeshClient<T: MediaTransport, C: RoomChannel> {
    inner: Rc<RefCell<MeshSession<T, C>>>,
    deferred: Rc<RefCell<VecDeque<Deferred<T::Stream>>>>,
    on_view_changed: Callback<Vec<ParticipantView<T::Stream>>>,
    on_media_unavailable: Callback<String>,
}

impl<T: MediaTransport, C: RoomChannel> Clone for MeshClient<T, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
            deferred: Rc::clone(&self.deferred),
            on_view_changed: self.on_view_changed.clone(),
            on_media_unavailable: self.on_media_unavailable.clone(),
        }
    }
}

impl<T: MediaTransport, C: RoomChannel> PartialEq for MeshClient<T, C> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T: MediaTransport, C: RoomChannel> fmt::Debug for MeshClient<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.try_borrow() {
            Ok(session) => write!(f, "MeshClient({session:?})"),
            Err(_) => write!(f, "MeshClient(<busy>)"),
        }
    }
}

impl<T: MediaTransport, C: RoomChannel> MeshClient<T, C> {
    pub fn new(options: MeshClientOptions<T::Stream>, transport: T, channel: C) -> Self {
        let session = MeshSession::new(
            options.display_name,
            options.room_name,
            transport,
            channel,
            options.config,
        );
        Self {
            inner: Rc::new(RefCell::new(session)),
            deferred: Rc::new(RefCell::new(VecDeque::new())),
            on_view_changed: options.on_view_changed,
            on_media_unavailable: options.on_media_unavailable,
        }
    }

    /// Subscribe to every [`MeshEvent`] of this session.
    pub fn subscribe(&self) -> Result<Receiver<MeshEvent<T::Stream>>, MeshError> {
        self.with_session(|session| session.subscribe())
    }

    /// Runs `f` against a shared borrow of the session.
    pub fn with_session<R>(&self, f: impl FnOnce(&MeshSession<T, C>) -> R) -> Result<R, MeshError> {
        let session = self.inner.try_borrow().map_err(|_| MeshError::Busy)?;
        Ok(f(&session))
    }

    fn dispatch<R>(&self, f: impl FnOnce(&mut MeshSession<T, C>) -> R) -> Result<R, MeshError> {
        let (result, view, media_notice) = {
            let mut session = self.inner.try_borrow_mut().map_err(|_| {
                error!("Unable to borrow mesh session -- dropping event");
                MeshError::Busy
            })?;
            let was_pending = *session.local_media() == LocalMedia::Pending;
            let result = f(&mut session);
            self.drain_deferred(&mut session);
            let media_notice = match session.local_media() {
                LocalMedia::Unavailable(reason) if was_pending => Some(reason.clone()),
                _ => None,
            };
            (result, session.take_pending_view(), media_notice)
        };
        if let Some(reason) = media_notice {
            self.on_media_unavailable.emit(reason);
        }
        if let Some(view) = view {
            self.on_view_changed.emit(view);
        }
        Ok(result)
    }

    fn drain_deferred(&self, session: &mut MeshSession<T, C>) {
        loop {
            let next = self.deferred.borrow_mut().pop_front();
            match next {
                Some(Deferred::Transport(event)) => session.handle_transport_event(event),
                Some(Deferred::Incoming(call)) => {
                    if let Err(e) = session.handle_incoming_call(call) {
                        warn!("{e}");
                    }
                }
                None => break,
            }
        }
    }

    /// `true` when an event must be queued instead of applied right away.
    fn is_busy(&self) -> bool {
        self.inner.try_borrow_mut().is_err()
    }

    fn defer(&self, event: Deferred<T::Stream>) {
        debug!("Mesh session busy, queueing transport callback");
        self.deferred.borrow_mut().push_back(event);
    }

    pub fn local_identity(&self, id: ConnectionId) -> Result<(), MeshError> {
        self.dispatch(|session| session.handle_local_identity(id))
    }

    pub fn local_media(&self, result: Result<T::Stream, String>) -> Result<(), MeshError> {
        self.dispatch(|session| session.handle_local_media(result))
    }

    pub fn roster_update(&self, entries: Vec<WireRosterEntry>) -> Result<RosterDiff, MeshError> {
        self.dispatch(|session| session.handle_roster_update(entries))
    }

    /// Same as [`roster_update`](Self::roster_update) for a raw JSON push.
    pub fn roster_update_json(&self, text: &str) -> Result<RosterDiff, MeshError> {
        let update = RosterUpdate::from_json(text).map_err(|e| {
            error!("Discarding unparsable roster push: {e}");
            MeshError::Channel(e.to_string())
        })?;
        self.roster_update(update.into_entries())
    }

    /// Offers an inbound call. When the session is busy the call is queued and
    /// `Ok` is returned; a later refusal is only logged.
    pub fn incoming_call(&self, call: IncomingCall) -> Result<(), MeshError> {
        if self.is_busy() {
            self.defer(Deferred::Incoming(call));
            return Ok(());
        }
        self.dispatch(|session| session.handle_incoming_call(call))?
    }

    /// Applies a transport callback, queueing it if the session is busy.
    pub fn transport_event(&self, event: TransportEvent<T::Stream>) -> Result<(), MeshError> {
        if self.is_busy() {
            self.defer(Deferred::Transport(event));
            return Ok(());
        }
        self.dispatch(|session| session.handle_transport_event(event))
    }

    pub fn expire_stalled(&self, now: Instant) -> Result<usize, MeshError> {
        self.dispatch(|session| session.expire_stalled(now))
    }

    pub fn toggle_camera(&self) -> Result<Option<bool>, MeshError> {
        self.dispatch(|session| session.toggle_camera())
    }

    pub fn toggle_microphone(&self) -> Result<Option<bool>, MeshError> {
        self.dispatch(|session| session.toggle_microphone())
    }

    pub fn leave(&self) -> Result<(), MeshError> {
        self.dispatch(|session| session.leave())
    }

    pub fn view(&self) -> Result<Vec<ParticipantView<T::Stream>>, MeshError> {
        self.with_session(|session| session.view())
    }
}
