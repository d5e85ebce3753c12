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

//! Roster and join payloads exchanged with the room channel.
//!
//! The channel pushes the whole participant list on every membership change.
//! Entries arrive as [`WireRosterEntry`] and are validated into
//! [`RosterEntry`] by the client. Both the camelCase keys and the legacy
//! `usuario` / `peerId` keys are accepted on the way in.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque per-session identifier used for media-transport addressing.
///
/// Ordering is plain lexicographic string ordering, which is what the call
/// coordinator uses to break symmetry between two peers.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConnectionId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ConnectionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A validated participant as held by the roster store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    pub display_name: String,
    /// Absent when the participant joined without media.
    pub connection_id: Option<ConnectionId>,
}

impl RosterEntry {
    pub fn new(display_name: impl Into<String>, connection_id: Option<&str>) -> Self {
        Self {
            display_name: display_name.into(),
            connection_id: connection_id.map(ConnectionId::new),
        }
    }
}

/// A roster entry exactly as the channel delivered it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireRosterEntry {
    #[serde(default, alias = "usuario")]
    pub display_name: Option<String>,
    #[serde(default, alias = "peerId")]
    pub connection_id: Option<String>,
}

impl WireRosterEntry {
    pub fn new(display_name: Option<&str>, connection_id: Option<&str>) -> Self {
        Self {
            display_name: display_name.map(str::to_owned),
            connection_id: connection_id.map(str::to_owned),
        }
    }

    /// Validates the entry. A missing or blank display name is the only
    /// hard failure; an empty connection id counts as no connection id.
    pub fn validate(&self) -> Result<RosterEntry, &'static str> {
        let display_name = match self.display_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_owned(),
            Some(_) => return Err("blank displayName"),
            None => return Err("missing displayName"),
        };
        let connection_id = self
            .connection_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .map(ConnectionId::new);
        Ok(RosterEntry {
            display_name,
            connection_id,
        })
    }
}

impl From<RosterEntry> for WireRosterEntry {
    fn from(entry: RosterEntry) -> Self {
        Self {
            display_name: Some(entry.display_name),
            connection_id: entry.connection_id.map(|id| id.0),
        }
    }
}

/// One wholesale roster push.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RosterUpdate(pub Vec<WireRosterEntry>);

impl RosterUpdate {
    /// Parses a roster push encoded as a JSON array.
    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn entries(&self) -> &[WireRosterEntry] {
        &self.0
    }

    pub fn into_entries(self) -> Vec<WireRosterEntry> {
        self.0
    }
}

impl From<Vec<RosterEntry>> for RosterUpdate {
    fn from(entries: Vec<RosterEntry>) -> Self {
        Self(entries.into_iter().map(WireRosterEntry::from).collect())
    }
}

/// Sent once to the room channel after local media acquisition resolves.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    pub display_name: String,
    pub room_name: String,
    /// `None` when local media could not be acquired.
    pub connection_id: Option<ConnectionId>,
}

impl JoinRequest {
    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
