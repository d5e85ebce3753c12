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

//! Per-peer call state machine.
//!
//! ```text
//!  Idle ──initiate──▶ Initiating ──┐
//!   │                              ├──stream──▶ Connected ──close──▶ Closed
//!   └───accept────▶ AwaitingAnswer ┘                │
//!                       │ close / error / timeout   │ error
//!                       └──────────▶ Failed ◀───────┘
//! ```
//!
//! Entering `Connected` registers the remote stream; entering `Closed` or
//! `Failed` evicts it. Terminal states accept nothing further; the session
//! discards them when the peer leaves the roster or a new attempt replaces
//! them.

use crate::error::MeshError;
use crate::registry::{StreamKey, StreamRegistry};
use crate::transport::CallId;
use roomcall_types::ConnectionId;
use std::time::Duration;
use web_time::Instant;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LifecycleState {
    Idle,
    /// Outbound call placed, waiting for the remote stream.
    Initiating { call: CallId },
    /// Inbound call answered, waiting for the remote stream.
    AwaitingAnswer { call: CallId },
    Connected { call: CallId },
    Closed,
    Failed { reason: String },
}

impl LifecycleState {
    pub fn name(&self) -> &'static str {
        match self {
            LifecycleState::Idle => "Idle",
            LifecycleState::Initiating { .. } => "Initiating",
            LifecycleState::AwaitingAnswer { .. } => "AwaitingAnswer",
            LifecycleState::Connected { .. } => "Connected",
            LifecycleState::Closed => "Closed",
            LifecycleState::Failed { .. } => "Failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, LifecycleState::Closed | LifecycleState::Failed { .. })
    }

    /// `Initiating`, `AwaitingAnswer` or `Connected`.
    pub fn is_live(&self) -> bool {
        self.call().is_some()
    }

    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            LifecycleState::Initiating { .. } | LifecycleState::AwaitingAnswer { .. }
        )
    }

    pub fn call(&self) -> Option<CallId> {
        match self {
            LifecycleState::Initiating { call }
            | LifecycleState::AwaitingAnswer { call }
            | LifecycleState::Connected { call } => Some(*call),
            _ => None,
        }
    }
}

/// What a stream / close / error input did to the lifecycle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Transition {
    Connected,
    /// A further stream event on an already connected call.
    StreamReplaced,
    Closed,
    Failed(String),
}

#[derive(Debug)]
pub struct ConnectionLifecycle {
    remote: ConnectionId,
    state: LifecycleState,
    since: Instant,
}

impl ConnectionLifecycle {
    pub fn new(remote: ConnectionId) -> Self {
        Self {
            remote,
            state: LifecycleState::Idle,
            since: Instant::now(),
        }
    }

    pub fn remote(&self) -> &ConnectionId {
        &self.remote
    }

    pub fn state(&self) -> &LifecycleState {
        &self.state
    }

    /// When the current state was entered.
    pub fn since(&self) -> Instant {
        self.since
    }

    pub fn call(&self) -> Option<CallId> {
        self.state.call()
    }

    fn enter(&mut self, state: LifecycleState) {
        self.state = state;
        self.since = Instant::now();
    }

    fn invalid(&self, input: &'static str) -> MeshError {
        MeshError::InvalidTransition {
            remote: self.remote.clone(),
            state: self.state.name(),
            input,
        }
    }

    /// `Idle -> Initiating` once the outbound call has been placed.
    pub fn initiate(&mut self, call: CallId) -> Result<(), MeshError> {
        match self.state {
            LifecycleState::Idle => {
                self.enter(LifecycleState::Initiating { call });
                Ok(())
            }
            _ => Err(self.invalid("initiate")),
        }
    }

    /// `Idle -> AwaitingAnswer` once an inbound call has been answered.
    pub fn accept(&mut self, call: CallId) -> Result<(), MeshError> {
        match self.state {
            LifecycleState::Idle => {
                self.enter(LifecycleState::AwaitingAnswer { call });
                Ok(())
            }
            _ => Err(self.invalid("accept")),
        }
    }

    pub fn on_stream<S: Clone>(
        &mut self,
        stream: S,
        registry: &mut StreamRegistry<S>,
    ) -> Result<Transition, MeshError> {
        match self.state {
            LifecycleState::Initiating { call } | LifecycleState::AwaitingAnswer { call } => {
                registry.set(StreamKey::Remote(self.remote.clone()), stream);
                self.enter(LifecycleState::Connected { call });
                Ok(Transition::Connected)
            }
            LifecycleState::Connected { .. } => {
                // Some transports fire once per track.
                registry.set(StreamKey::Remote(self.remote.clone()), stream);
                Ok(Transition::StreamReplaced)
            }
            _ => Err(self.invalid("stream")),
        }
    }

    pub fn on_close<S: Clone>(
        &mut self,
        registry: &mut StreamRegistry<S>,
    ) -> Result<Transition, MeshError> {
        match self.state {
            LifecycleState::Connected { .. } => {
                self.evict(registry);
                self.enter(LifecycleState::Closed);
                Ok(Transition::Closed)
            }
            LifecycleState::Initiating { .. } | LifecycleState::AwaitingAnswer { .. } => {
                Ok(self.fail("closed before a stream arrived", registry))
            }
            _ => Err(self.invalid("close")),
        }
    }

    pub fn on_error<S: Clone>(
        &mut self,
        reason: &str,
        registry: &mut StreamRegistry<S>,
    ) -> Result<Transition, MeshError> {
        if self.state.is_live() {
            Ok(self.fail(reason, registry))
        } else {
            Err(self.invalid("error"))
        }
    }

    /// Moves any non-terminal state to `Failed`. Terminal states are left
    /// alone and report their current failure, if any.
    pub fn fail<S: Clone>(&mut self, reason: &str, registry: &mut StreamRegistry<S>) -> Transition {
        if let LifecycleState::Failed { reason } = &self.state {
            return Transition::Failed(reason.clone());
        }
        if self.state == LifecycleState::Closed {
            return Transition::Closed;
        }
        self.evict(registry);
        self.enter(LifecycleState::Failed {
            reason: reason.to_string(),
        });
        Transition::Failed(reason.to_string())
    }

    /// `true` when the lifecycle has been pending for longer than `timeout`.
    pub fn is_stalled(&self, now: Instant, timeout: Duration) -> bool {
        self.state.is_pending() && now.saturating_duration_since(self.since) > timeout
    }

    /// Discards the lifecycle regardless of state, evicting its stream.
    /// Returns the call that still needs hanging up, if any.
    pub fn teardown<S: Clone>(mut self, registry: &mut StreamRegistry<S>) -> Option<CallId> {
        self.evict(registry);
        self.state.call()
    }

    fn evict<S: Clone>(&mut self, registry: &mut StreamRegistry<S>) {
        registry.remove(&StreamKey::Remote(self.remote.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lifecycle() -> (ConnectionLifecycle, StreamRegistry<&'static str>) {
        (
            ConnectionLifecycle::new(ConnectionId::new("p1")),
            StreamRegistry::new(),
        )
    }

    fn key() -> StreamKey {
        StreamKey::Remote(ConnectionId::new("p1"))
    }

    #[test]
    fn test_outbound_happy_path() {
        let (mut lc, mut registry) = lifecycle();
        lc.initiate(CallId(1)).unwrap();
        assert_eq!(lc.state(), &LifecycleState::Initiating { call: CallId(1) });

        assert_eq!(lc.on_stream("s1", &mut registry), Ok(Transition::Connected));
        assert_eq!(lc.state(), &LifecycleState::Connected { call: CallId(1) });
        assert_eq!(registry.get(&key()), Some(&"s1"));

        assert_eq!(lc.on_close(&mut registry), Ok(Transition::Closed));
        assert_eq!(lc.state(), &LifecycleState::Closed);
        assert_eq!(registry.get(&key()), None);
    }

    #[test]
    fn test_inbound_happy_path() {
        let (mut lc, mut registry) = lifecycle();
        lc.accept(CallId(7)).unwrap();
        assert_eq!(lc.state().name(), "AwaitingAnswer");
        assert_eq!(lc.on_stream("s1", &mut registry), Ok(Transition::Connected));
        assert_eq!(lc.call(), Some(CallId(7)));
    }

    #[test]
    fn test_second_stream_event_replaces_handle() {
        let (mut lc, mut registry) = lifecycle();
        lc.initiate(CallId(1)).unwrap();
        lc.on_stream("audio-only", &mut registry).unwrap();
        assert_eq!(
            lc.on_stream("audio+video", &mut registry),
            Ok(Transition::StreamReplaced)
        );
        assert_eq!(registry.get(&key()), Some(&"audio+video"));
    }

    #[test]
    fn test_close_or_error_while_pending_fails() {
        let (mut lc, mut registry) = lifecycle();
        lc.initiate(CallId(1)).unwrap();
        assert!(matches!(lc.on_close(&mut registry), Ok(Transition::Failed(_))));
        assert!(lc.state().is_terminal());

        let (mut lc, mut registry) = lifecycle();
        lc.accept(CallId(2)).unwrap();
        assert_eq!(
            lc.on_error("ice failed", &mut registry),
            Ok(Transition::Failed("ice failed".to_string()))
        );
        assert_eq!(
            lc.state(),
            &LifecycleState::Failed {
                reason: "ice failed".to_string()
            }
        );
    }

    #[test]
    fn test_error_while_connected_evicts_stream() {
        let (mut lc, mut registry) = lifecycle();
        lc.initiate(CallId(1)).unwrap();
        lc.on_stream("s1", &mut registry).unwrap();
        assert!(matches!(lc.on_error("dtls", &mut registry), Ok(Transition::Failed(_))));
        assert_eq!(registry.get(&key()), None);
    }

    #[test]
    fn test_terminal_states_reject_inputs() {
        let (mut lc, mut registry) = lifecycle();
        lc.initiate(CallId(1)).unwrap();
        lc.on_error("boom", &mut registry).unwrap();

        assert!(lc.on_stream("late", &mut registry).is_err());
        assert!(lc.on_close(&mut registry).is_err());
        assert!(lc.on_error("again", &mut registry).is_err());
        assert!(lc.initiate(CallId(2)).is_err());
        assert_eq!(registry.get(&key()), None);
    }

    #[test]
    fn test_idle_rejects_stream_and_close() {
        let (mut lc, mut registry) = lifecycle();
        assert_eq!(
            lc.on_stream("s", &mut registry),
            Err(MeshError::InvalidTransition {
                remote: ConnectionId::new("p1"),
                state: "Idle",
                input: "stream",
            })
        );
        assert!(lc.on_close(&mut registry).is_err());
        assert!(registry.get(&key()).is_none());
    }

    #[test]
    fn test_initiate_twice_is_rejected() {
        let (mut lc, _) = lifecycle();
        lc.initiate(CallId(1)).unwrap();
        assert!(lc.initiate(CallId(2)).is_err());
        assert!(lc.accept(CallId(3)).is_err());
        assert_eq!(lc.call(), Some(CallId(1)));
    }

    #[test]
    fn test_stalled_only_while_pending() {
        let (mut lc, mut registry) = lifecycle();
        let later = lc.since() + Duration::from_secs(30);
        assert!(!lc.is_stalled(later, Duration::from_secs(10)));

        lc.initiate(CallId(1)).unwrap();
        let later = lc.since() + Duration::from_secs(30);
        assert!(lc.is_stalled(later, Duration::from_secs(10)));
        assert!(!lc.is_stalled(later, Duration::from_secs(60)));

        lc.on_stream("s1", &mut registry).unwrap();
        let later = lc.since() + Duration::from_secs(30);
        assert!(!lc.is_stalled(later, Duration::from_secs(10)));
    }

    #[test]
    fn test_teardown_evicts_and_returns_live_call() {
        let (mut lc, mut registry) = lifecycle();
        lc.accept(CallId(4)).unwrap();
        lc.on_stream("s1", &mut registry).unwrap();
        assert_eq!(lc.teardown(&mut registry), Some(CallId(4)));
        assert_eq!(registry.get(&key()), None);

        let (lc, mut registry) = lifecycle();
        assert_eq!(lc.teardown(&mut registry), None);
    }
}
