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

//! Holder for the latest authoritative roster.

use crate::error::MeshError;
use log::warn;
use roomcall_types::{ConnectionId, RosterEntry, WireRosterEntry};
use std::collections::BTreeSet;

/// Remote membership change between two consecutive roster pushes.
///
/// Only remote identifiers appear here: the local identity is never reported
/// as added, removed or unchanged.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RosterDiff {
    pub added: BTreeSet<ConnectionId>,
    pub removed: BTreeSet<ConnectionId>,
    pub unchanged: BTreeSet<ConnectionId>,
    /// Malformed entries that were dropped from this push.
    pub rejected: Vec<MeshError>,
}

impl RosterDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct RosterStore {
    entries: Vec<RosterEntry>,
    remote_ids: BTreeSet<ConnectionId>,
    local: Option<ConnectionId>,
}

impl RosterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the identity treated as "self" when diffing.
    ///
    /// A changed local identity is a reconnect: the old identifier becomes an
    /// ordinary remote on the next push if it is still listed.
    pub fn set_local(&mut self, local: Option<ConnectionId>) {
        self.local = local;
    }

    pub fn local(&self) -> Option<&ConnectionId> {
        self.local.as_ref()
    }

    /// Replaces the stored roster wholesale and diffs it against the previous
    /// snapshot. Malformed entries are dropped and reported in the diff.
    pub fn replace(&mut self, entries: Vec<WireRosterEntry>) -> RosterDiff {
        let mut rejected = Vec::new();
        let mut valid = Vec::with_capacity(entries.len());
        for (index, entry) in entries.into_iter().enumerate() {
            match entry.validate() {
                Ok(entry) => valid.push(entry),
                Err(reason) => {
                    warn!("Dropping roster entry {index}: {reason}");
                    rejected.push(MeshError::MalformedRosterEntry {
                        index,
                        reason: reason.to_string(),
                    });
                }
            }
        }

        let remote_ids: BTreeSet<ConnectionId> = valid
            .iter()
            .filter_map(|e| e.connection_id.clone())
            .filter(|id| Some(id) != self.local.as_ref())
            .collect();

        let diff = RosterDiff {
            added: remote_ids.difference(&self.remote_ids).cloned().collect(),
            removed: self
                .remote_ids
                .difference(&remote_ids)
                .filter(|id| Some(*id) != self.local.as_ref())
                .cloned()
                .collect(),
            unchanged: remote_ids.intersection(&self.remote_ids).cloned().collect(),
            rejected,
        };

        self.entries = valid;
        self.remote_ids = remote_ids;
        diff
    }

    /// Current roster in push order.
    pub fn entries(&self) -> &[RosterEntry] {
        &self.entries
    }

    /// Remote identifiers in the current roster, sorted.
    pub fn remote_ids(&self) -> &BTreeSet<ConnectionId> {
        &self.remote_ids
    }

    pub fn contains_remote(&self, id: &ConnectionId) -> bool {
        self.remote_ids.contains(id)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.remote_ids.clear();
    }
}
