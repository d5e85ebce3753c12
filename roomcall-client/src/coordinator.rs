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

//! Glare-free call initiation for a full mesh.
//!
//! For every pair of peers exactly one side places the call: the one whose
//! [`ConnectionId`] sorts strictly greater. The rule needs nothing beyond the
//! roster push itself, and re-running it is harmless because peers with a live
//! lifecycle or a registered stream are skipped.

use crate::lifecycle::ConnectionLifecycle;
use crate::registry::StreamRegistry;
use roomcall_types::ConnectionId;
use std::collections::{BTreeMap, BTreeSet};

/// Per-peer lifecycles, iterated in identifier order.
pub type LifecycleTable = BTreeMap<ConnectionId, ConnectionLifecycle>;

/// Tie-break between two distinct peers: `true` when `local` must call
/// `remote`, `false` when it must wait for `remote` to call.
pub fn should_initiate(local: &ConnectionId, remote: &ConnectionId) -> bool {
    local > remote
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoOpReason {
    /// A lifecycle is already attempting or connected, or a stream is registered.
    AlreadyActive,
    /// The remote sorts greater and will call us.
    AwaitingInbound,
    /// No local identity or no local stream, so we can neither call nor answer.
    NoLocalMedia,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallAction {
    Initiate(ConnectionId),
    NoOp {
        remote: ConnectionId,
        reason: NoOpReason,
    },
    /// The peer left the roster; discard its lifecycle and stream.
    Teardown(ConnectionId),
}

impl CallAction {
    pub fn remote(&self) -> &ConnectionId {
        match self {
            CallAction::Initiate(id) | CallAction::Teardown(id) => id,
            CallAction::NoOp { remote, .. } => remote,
        }
    }
}

/// Everything the coordinator looks at. Borrowed from the session.
pub struct MeshView<'a, S> {
    pub roster: &'a BTreeSet<ConnectionId>,
    pub local: Option<&'a ConnectionId>,
    pub local_media_ready: bool,
    pub lifecycles: &'a LifecycleTable,
    pub registry: &'a StreamRegistry<S>,
}

#[derive(Debug, Default)]
pub struct CallCoordinator;

impl CallCoordinator {
    /// Computes one action per affected remote. Teardowns come first, then
    /// the roster's remotes in identifier order.
    pub fn plan<S: Clone>(view: &MeshView<'_, S>) -> Vec<CallAction> {
        let mut actions = Vec::new();

        let stale_lifecycles = view
            .lifecycles
            .keys()
            .filter(|id| !view.roster.contains(*id));
        let orphan_streams = view
            .registry
            .remote_ids()
            .filter(|id| !view.roster.contains(*id) && !view.lifecycles.contains_key(*id));
        let gone: BTreeSet<&ConnectionId> = stale_lifecycles.chain(orphan_streams).collect();
        actions.extend(gone.into_iter().cloned().map(CallAction::Teardown));

        for remote in view.roster {
            if view.local == Some(remote) {
                continue;
            }
            actions.push(Self::decide(view, remote));
        }
        actions
    }

    fn decide<S: Clone>(view: &MeshView<'_, S>, remote: &ConnectionId) -> CallAction {
        let no_op = |reason| CallAction::NoOp {
            remote: remote.clone(),
            reason,
        };

        let live = view
            .lifecycles
            .get(remote)
            .is_some_and(|lc| lc.state().is_live());
        if live || view.registry.remote(remote).is_some() {
            return no_op(NoOpReason::AlreadyActive);
        }

        let local = match view.local {
            Some(local) if view.local_media_ready => local,
            _ => return no_op(NoOpReason::NoLocalMedia),
        };

        if should_initiate(local, remote) {
            CallAction::Initiate(remote.clone())
        } else {
            no_op(NoOpReason::AwaitingInbound)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::StreamKey;
    use crate::transport::CallId;

    fn id(s: &str) -> ConnectionId {
        ConnectionId::new(s)
    }

    fn roster(ids: &[&str]) -> BTreeSet<ConnectionId> {
        ids.iter().map(|s| id(s)).collect()
    }

    fn plan(
        roster: &BTreeSet<ConnectionId>,
        local: Option<&ConnectionId>,
        ready: bool,
        lifecycles: &LifecycleTable,
        registry: &StreamRegistry<&'static str>,
    ) -> Vec<CallAction> {
        CallCoordinator::plan(&MeshView {
            roster,
            local,
            local_media_ready: ready,
            lifecycles,
            registry,
        })
    }

    #[test]
    fn test_tie_break_is_antisymmetric() {
        let ids = ["a", "b", "p1", "p2", "p10", "Z", "zz", ""];
        for a in ids {
            for b in ids {
                if a == b {
                    continue;
                }
                let (a, b) = (id(a), id(b));
                assert_ne!(
                    should_initiate(&a, &b),
                    should_initiate(&b, &a),
                    "exactly one of {a} / {b} must initiate"
                );
            }
        }
    }

    #[test]
    fn test_greater_side_initiates() {
        let lifecycles = LifecycleTable::new();
        let registry = StreamRegistry::new();
        let roster = roster(&["p1", "p2"]);

        let from_p2 = plan(&roster, Some(&id("p2")), true, &lifecycles, &registry);
        assert_eq!(from_p2, vec![CallAction::Initiate(id("p1"))]);

        let from_p1 = plan(&roster, Some(&id("p1")), true, &lifecycles, &registry);
        assert_eq!(
            from_p1,
            vec![CallAction::NoOp {
                remote: id("p2"),
                reason: NoOpReason::AwaitingInbound
            }]
        );
    }

    #[test]
    fn test_no_local_media_never_initiates() {
        let lifecycles = LifecycleTable::new();
        let registry = StreamRegistry::new();
        let roster = roster(&["p1", "p9"]);

        let actions = plan(&roster, Some(&id("p5")), false, &lifecycles, &registry);
        assert!(actions.iter().all(|a| matches!(
            a,
            CallAction::NoOp {
                reason: NoOpReason::NoLocalMedia,
                ..
            }
        )));

        let actions = plan(&roster, None, true, &lifecycles, &registry);
        assert!(!actions.iter().any(|a| matches!(a, CallAction::Initiate(_))));
    }

    #[test]
    fn test_live_lifecycle_or_stream_short_circuits() {
        let mut lifecycles = LifecycleTable::new();
        let mut lc = ConnectionLifecycle::new(id("p1"));
        lc.initiate(CallId(1)).unwrap();
        lifecycles.insert(id("p1"), lc);

        let mut registry = StreamRegistry::new();
        registry.set(StreamKey::Remote(id("p2")), "s2");
        lifecycles.insert(id("p2"), {
            let mut lc = ConnectionLifecycle::new(id("p2"));
            lc.accept(CallId(2)).unwrap();
            lc.on_stream("s2", &mut registry).unwrap();
            lc
        });

        let actions = plan(&roster(&["p1", "p2"]), Some(&id("p9")), true, &lifecycles, &registry);
        assert!(actions.iter().all(|a| matches!(
            a,
            CallAction::NoOp {
                reason: NoOpReason::AlreadyActive,
                ..
            }
        )));
    }

    #[test]
    fn test_failed_lifecycle_is_retried() {
        let mut lifecycles = LifecycleTable::new();
        let mut registry = StreamRegistry::new();
        let mut lc = ConnectionLifecycle::new(id("p1"));
        lc.initiate(CallId(1)).unwrap();
        lc.on_error("timeout", &mut registry).unwrap();
        lifecycles.insert(id("p1"), lc);

        let actions = plan(&roster(&["p1"]), Some(&id("p2")), true, &lifecycles, &registry);
        assert_eq!(actions, vec![CallAction::Initiate(id("p1"))]);
    }

    #[test]
    fn test_removed_peers_are_torn_down_regardless_of_role() {
        let mut lifecycles = LifecycleTable::new();
        let mut registry = StreamRegistry::new();
        for (peer, call) in [("p1", 1), ("p9", 9)] {
            let mut lc = ConnectionLifecycle::new(id(peer));
            lc.accept(CallId(call)).unwrap();
            lifecycles.insert(id(peer), lc);
        }
        registry.set(StreamKey::Remote(id("p3")), "orphan");

        let actions = plan(&roster(&[]), Some(&id("p5")), true, &lifecycles, &registry);
        assert_eq!(
            actions,
            vec![
                CallAction::Teardown(id("p1")),
                CallAction::Teardown(id("p3")),
                CallAction::Teardown(id("p9")),
            ]
        );
    }

    #[test]
    fn test_self_is_skipped() {
        let lifecycles = LifecycleTable::new();
        let registry = StreamRegistry::new();
        let actions = plan(&roster(&["p2"]), Some(&id("p2")), true, &lifecycles, &registry);
        assert!(actions.is_empty());
    }
}
