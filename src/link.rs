//! The seam between game logic and the relay connection.
//!
//! Game code depends on [`RelayLink`] only.  The networked build plugs in
//! [`crate::transport::TransportSession`]; tests and offline runs use
//! [`MemoryLink`], which records everything published and lets the caller
//! inject relay events.

use bytes::Bytes;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;

use crate::events::RelayEvent;

pub trait RelayLink: Send {
    fn is_connected(&self) -> bool;

    /// Counter of the live connection, bumped every time the relay accepts a
    /// session.  `None` while down.
    ///
    /// Unlike the `Connected` and `Disconnected` events, never dropped.
    fn connection_generation(&self) -> Option<u64>;

    /// Fire-and-forget.  Silently dropped while disconnected.
    fn publish(&self, destination: &str, body: Bytes);

    /// Drain up to `limit` pending events without blocking.
    fn poll_events(&self, limit: usize) -> Vec<RelayEvent>;

    /// Close the link and stop reconnecting.  Safe to call repeatedly.
    fn disconnect(&self);
}

/// Lets a caller keep its own handle (for stats or a bounded close) while the
/// session owns another.
impl<L: RelayLink + Sync + ?Sized> RelayLink for Arc<L> {
    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn connection_generation(&self) -> Option<u64> {
        (**self).connection_generation()
    }

    fn publish(&self, destination: &str, body: Bytes) {
        (**self).publish(destination, body)
    }

    fn poll_events(&self, limit: usize) -> Vec<RelayEvent> {
        (**self).poll_events(limit)
    }

    fn disconnect(&self) {
        (**self).disconnect()
    }
}

// ---------------------------------------------------------------------------
// Publish helper
// ---------------------------------------------------------------------------

/// Serialise `body` and publish it on `destination`.
///
/// A no-op while disconnected.  Serialisation errors are logged and
/// swallowed; a single failed publish should not stop the tick.
pub fn publish_json<T: Serialize + ?Sized>(link: &dyn RelayLink, destination: &str, body: &T) {
    if !link.is_connected() {
        return;
    }
    match serde_json::to_vec(body) {
        Ok(payload) => link.publish(destination, Bytes::from(payload)),
        Err(e) => log::warn!("Failed to serialise body for {}: {}", destination, e),
    }
}

// ---------------------------------------------------------------------------
// In-process link
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Published {
    pub destination: String,
    pub body: Bytes,
}

impl Published {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap_or(serde_json::Value::Null)
    }
}

#[derive(Debug, Default)]
struct MemoryLinkState {
    connected: bool,
    closed: bool,
    generation: u64,
    inbox: VecDeque<RelayEvent>,
    outbox: Vec<Published>,
}

/// Loopback link.  Clones share state, so a test can keep one handle while
/// the session owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryLink {
    state: Arc<Mutex<MemoryLinkState>>,
}

impl MemoryLink {
    /// Starts disconnected; call [`MemoryLink::connect`] to simulate the
    /// relay accepting the session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark connected and queue a `Connected` event.
    pub fn connect(&self) {
        let mut st = self.state.lock();
        if st.closed {
            return;
        }
        st.connected = true;
        st.generation += 1;
        st.inbox.push_back(RelayEvent::Connected { session: None });
    }

    /// Simulate the relay dropping us.
    pub fn drop_connection(&self, reason: &str) {
        let mut st = self.state.lock();
        if !st.connected {
            return;
        }
        st.connected = false;
        st.inbox.push_back(RelayEvent::Disconnected {
            reason: reason.to_string(),
        });
    }

    pub fn inject(&self, event: RelayEvent) {
        self.state.lock().inbox.push_back(event);
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn published(&self) -> Vec<Published> {
        self.state.lock().outbox.clone()
    }

    pub fn published_to(&self, destination: &str) -> Vec<Published> {
        self.state
            .lock()
            .outbox
            .iter()
            .filter(|p| p.destination == destination)
            .cloned()
            .collect()
    }

    pub fn clear_published(&self) {
        self.state.lock().outbox.clear();
    }
}

impl RelayLink for MemoryLink {
    fn is_connected(&self) -> bool {
        self.state.lock().connected
    }

    fn connection_generation(&self) -> Option<u64> {
        let st = self.state.lock();
        st.connected.then_some(st.generation)
    }

    fn publish(&self, destination: &str, body: Bytes) {
        let mut st = self.state.lock();
        if !st.connected {
            return;
        }
        st.outbox.push(Published {
            destination: destination.to_string(),
            body,
        });
    }

    fn poll_events(&self, limit: usize) -> Vec<RelayEvent> {
        let mut st = self.state.lock();
        let n = limit.min(st.inbox.len());
        st.inbox.drain(..n).collect()
    }

    fn disconnect(&self) {
        let mut st = self.state.lock();
        st.connected = false;
        st.closed = true;
    }
}
