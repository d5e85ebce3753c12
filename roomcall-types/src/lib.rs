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

//! Types shared between the roomcall mesh client and the room channel that
//! carries roster pushes and join requests.

pub mod callback;
pub mod config;
pub mod roster;

pub use callback::Callback;
pub use config::MeshConfig;
pub use roster::{ConnectionId, JoinRequest, RosterEntry, RosterUpdate, WireRosterEntry};

/// Returns `true` for the usual truthy spellings of an environment value.
pub fn truthy(s: Option<&str>) -> bool {
    if let Some(s) = s {
        matches!(s.trim().to_lowercase().as_str(), "true" | "1" | "yes")
    } else {
        false
    }
}
