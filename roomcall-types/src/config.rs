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

//! Runtime configuration for a mesh session.
//!
//! Values are read from `ROOMCALL_`-prefixed environment variables by
//! [`MeshConfig::from_env`]. A session receives its config by value; nothing
//! here is global.

use std::time::Duration;

/// Environment variable prefix for mesh settings
const ENV_PREFIX: &str = "ROOMCALL_";

pub const DEFAULT_EVENT_BUS_CAPACITY: usize = 256;
pub const DEFAULT_TILE_PALETTE: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeshConfig {
    /// How long an `Initiating` / `AwaitingAnswer` lifecycle may stay pending
    /// before it is failed. `None` leaves stalled negotiations pending until the
    /// transport or the roster resolves them.
    /// Env: ROOMCALL_NEGOTIATION_TIMEOUT_MS (0 disables)
    pub negotiation_timeout: Option<Duration>,

    /// Capacity of the per-session event bus.
    /// Env: ROOMCALL_EVENT_BUS_CAPACITY
    pub event_bus_capacity: usize,

    /// Number of tile colours the projector cycles through.
    /// Env: ROOMCALL_TILE_PALETTE
    pub tile_palette: usize,

    /// Reject inbound calls from peers whose identifier says they should have
    /// waited for us to call instead.
    /// Env: ROOMCALL_STRICT_TIE_BREAK=true
    pub strict_tie_break: bool,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            negotiation_timeout: None,
            event_bus_capacity: DEFAULT_EVENT_BUS_CAPACITY,
            tile_palette: DEFAULT_TILE_PALETTE,
            strict_tie_break: false,
        }
    }
}

impl MeshConfig {
    /// Load the config from environment variables, falling back to defaults for
    /// anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            negotiation_timeout: read_u64_env("NEGOTIATION_TIMEOUT_MS")
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis),
            event_bus_capacity: read_u64_env("EVENT_BUS_CAPACITY")
                .and_then(|v| usize::try_from(v).ok())
                .filter(|v| *v > 0)
                .unwrap_or(defaults.event_bus_capacity),
            tile_palette: read_u64_env("TILE_PALETTE")
                .and_then(|v| usize::try_from(v).ok())
                .filter(|v| *v > 0)
                .unwrap_or(defaults.tile_palette),
            strict_tie_break: crate::truthy(read_env("STRICT_TIE_BREAK").as_deref()),
        }
    }

    pub fn with_negotiation_timeout(mut self, timeout: Duration) -> Self {
        self.negotiation_timeout = Some(timeout);
        self
    }

    pub fn with_strict_tie_break(mut self, strict: bool) -> Self {
        self.strict_tie_break = strict;
        self
    }
}

fn read_env(name: &str) -> Option<String> {
    std::env::var(format!("{ENV_PREFIX}{name}")).ok()
}

fn read_u64_env(name: &str) -> Option<u64> {
    read_env(name).and_then(|v| v.trim().parse().ok())
}
