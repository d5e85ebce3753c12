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

//! Pure projection from roster + streams to what the UI should render.

use crate::registry::{StreamKey, StreamRegistry};
use roomcall_types::config::DEFAULT_TILE_PALETTE;
use roomcall_types::{ConnectionId, RosterEntry};

/// One tile of the participant grid.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParticipantView<S> {
    pub display_name: String,
    pub is_self: bool,
    pub stream: Option<S>,
    pub has_video: bool,
    /// Colour slot, the roster position modulo the palette size.
    pub tile: usize,
    /// Local preview is shown mirrored.
    pub mirrored: bool,
    /// Local audio is never played back.
    pub muted: bool,
}

/// Projects with the default palette. See [`project_with_palette`].
pub fn project<S: Clone>(
    roster: &[RosterEntry],
    registry: &StreamRegistry<S>,
    local: Option<&ConnectionId>,
) -> Vec<ParticipantView<S>> {
    project_with_palette(roster, registry, local, DEFAULT_TILE_PALETTE)
}

/// One view per roster entry, in roster order.
///
/// An entry is "self" only when it carries the local connection id, so a
/// participant that joined without media is never matched by display name.
pub fn project_with_palette<S: Clone>(
    roster: &[RosterEntry],
    registry: &StreamRegistry<S>,
    local: Option<&ConnectionId>,
    palette: usize,
) -> Vec<ParticipantView<S>> {
    let palette = palette.max(1);
    roster
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let is_self = local.is_some() && entry.connection_id.as_ref() == local;
            let stream = match (&entry.connection_id, is_self) {
                (Some(_), true) => registry.get(&StreamKey::Local).cloned(),
                (Some(id), false) => registry.remote(id).cloned(),
                (None, _) => None,
            };
            let has_video = stream.is_some();
            ParticipantView {
                display_name: entry.display_name.clone(),
                is_self,
                stream,
                has_video,
                tile: index % palette,
                mirrored: is_self && has_video,
                muted: is_self,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Vec<RosterEntry>, StreamRegistry<&'static str>) {
        let roster = vec![
            RosterEntry::new("Ana", Some("p1")),
            RosterEntry::new("Luis", Some("p2")),
            RosterEntry::new("Eva", None),
            RosterEntry::new("Ana", Some("p3")),
            RosterEntry::new("Tom", Some("p4")),
        ];
        let mut registry = StreamRegistry::new();
        registry.set(StreamKey::Local, "camera");
        registry.set(StreamKey::Remote(ConnectionId::new("p1")), "s1");
        (roster, registry)
    }

    #[test]
    fn test_resolves_self_and_remote_streams() {
        let (roster, registry) = setup();
        let local = ConnectionId::new("p2");
        let views = project(&roster, &registry, Some(&local));

        assert_eq!(views.len(), 5);
        assert_eq!(views[0].stream, Some("s1"));
        assert!(views[0].has_video && !views[0].is_self);

        assert!(views[1].is_self);
        assert_eq!(views[1].stream, Some("camera"));
        assert!(views[1].mirrored && views[1].muted);

        assert_eq!(views[2].stream, None);
        assert!(!views[2].has_video);
        assert!(!views[3].has_video);
    }

    #[test]
    fn test_tiles_cycle_through_palette() {
        let (roster, registry) = setup();
        let tiles: Vec<_> = project(&roster, &registry, None)
            .iter()
            .map(|v| v.tile)
            .collect();
        assert_eq!(tiles, vec![0, 1, 2, 3, 0]);

        let tiles: Vec<_> = project_with_palette(&roster, &registry, None, 0)
            .iter()
            .map(|v| v.tile)
            .collect();
        assert_eq!(tiles, vec![0; 5]);
    }

    #[test]
    fn test_without_local_identity_nobody_is_self() {
        let (roster, registry) = setup();
        let views = project(&roster, &registry, None);
        assert!(views.iter().all(|v| !v.is_self && !v.muted));
    }

    #[test]
    fn test_projection_is_deterministic() {
        let (roster, registry) = setup();
        let local = ConnectionId::new("p4");
        assert_eq!(
            project(&roster, &registry, Some(&local)),
            project(&roster, &registry, Some(&local))
        );
    }
}
