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

//! Live media streams keyed by participant.
//!
//! The local capture stream lives under [`StreamKey::Local`] for the whole
//! session. Every remote key belongs to a lifecycle in the `Connected` state;
//! only lifecycle transitions insert or evict remote streams.

use roomcall_types::ConnectionId;
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StreamKey {
    /// The local capture device.
    Local,
    Remote(ConnectionId),
}

impl From<ConnectionId> for StreamKey {
    fn from(id: ConnectionId) -> Self {
        StreamKey::Remote(id)
    }
}

#[derive(Debug)]
pub struct StreamRegistry<S> {
    local: Option<S>,
    remote: BTreeMap<ConnectionId, S>,
}

impl<S> Default for StreamRegistry<S> {
    fn default() -> Self {
        Self {
            local: None,
            remote: BTreeMap::new(),
        }
    }
}

impl<S: Clone> StreamRegistry<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `handle`, returning whatever it replaced.
    pub fn set(&mut self, key: StreamKey, handle: S) -> Option<S> {
        match key {
            StreamKey::Local => self.local.replace(handle),
            StreamKey::Remote(id) => self.remote.insert(id, handle),
        }
    }

    pub fn remove(&mut self, key: &StreamKey) -> Option<S> {
        match key {
            StreamKey::Local => self.local.take(),
            StreamKey::Remote(id) => self.remote.remove(id),
        }
    }

    pub fn get(&self, key: &StreamKey) -> Option<&S> {
        match key {
            StreamKey::Local => self.local.as_ref(),
            StreamKey::Remote(id) => self.remote.get(id),
        }
    }

    pub fn local(&self) -> Option<&S> {
        self.local.as_ref()
    }

    pub fn remote(&self, id: &ConnectionId) -> Option<&S> {
        self.remote.get(id)
    }

    pub fn remote_ids(&self) -> impl Iterator<Item = &ConnectionId> {
        self.remote.keys()
    }

    /// Owned copy of every entry, local first then remotes in id order.
    pub fn snapshot(&self) -> BTreeMap<StreamKey, S> {
        self.local
            .iter()
            .map(|s| (StreamKey::Local, s.clone()))
            .chain(
                self.remote
                    .iter()
                    .map(|(id, s)| (StreamKey::Remote(id.clone()), s.clone())),
            )
            .collect()
    }

    /// Drops every remote stream. The local stream is kept.
    pub fn clear_remote(&mut self) -> usize {
        let n = self.remote.len();
        self.remote.clear();
        n
    }
}
