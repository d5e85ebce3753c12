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

//! Per-session broadcast bus for [`MeshEvent`]s.
//!
//! Each session owns its own bus; there is no global channel. Any number of
//! subscribers can listen and each receives every event emitted after it
//! subscribed.
//!
//! # Example
//!
//! ```ignore
//! let mut rx = session.subscribe();
//! wasm_bindgen_futures::spawn_local(async move {
//!     while let Ok(event) = rx.recv().await {
//!         if let MeshEvent::ViewChanged(views) = event {
//!             render(views);
//!         }
//!     }
//! });
//! ```

use crate::events::MeshEvent;
use async_broadcast::{broadcast, InactiveReceiver, Receiver, Sender};
use log::debug;
use std::fmt;

pub struct EventBus<S> {
    sender: Sender<MeshEvent<S>>,
    // Keeps the channel open while nobody is subscribed.
    _keep_alive: InactiveReceiver<MeshEvent<S>>,
}

impl<S> fmt::Debug for EventBus<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("receivers", &self.sender.receiver_count())
            .finish()
    }
}

impl<S: Clone> EventBus<S> {
    pub fn new(capacity: usize) -> Self {
        let (mut sender, receiver) = broadcast(capacity.max(1));
        // When full, drop the oldest event instead of refusing the new one.
        sender.set_overflow(true);
        Self {
            sender,
            _keep_alive: receiver.deactivate(),
        }
    }

    /// Subscribe to all future events.
    pub fn subscribe(&self) -> Receiver<MeshEvent<S>> {
        self.sender.new_receiver()
    }

    /// Non-blocking emit. Events are dropped when nobody is listening.
    pub fn emit(&self, event: MeshEvent<S>) {
        if let Ok(Some(_)) = self.sender.try_broadcast(event) {
            debug!("Event bus full, oldest event dropped");
        }
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
