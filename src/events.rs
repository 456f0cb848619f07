//! Semantic events delivered from the relay to the game tick.
//!
//! Each variant maps to one topic (or a connection change).  The tick
//! applies them as plain data updates.

use crate::protocol::{topics, CombatEvent, PlayerSnapshot, SceneObjectUpdate};

#[derive(Debug, Clone, PartialEq)]
pub enum RelayEvent {
    /// STOMP session established and topics subscribed.
    Connected { session: Option<String> },
    /// Link lost or closed.  A reconnect may follow.
    Disconnected { reason: String },
    /// Full roster broadcast (`/topic/playerLocations`).
    PlayerLocations(Vec<PlayerSnapshot>),
    /// Prop updates (`/topic/sceneObjects`).
    SceneObjects(Vec<SceneObjectUpdate>),
    /// A punch landed somewhere (`/topic/playerHit`).
    PlayerHit(CombatEvent),
}

impl RelayEvent {
    /// Decode a `MESSAGE` body by destination.
    ///
    /// Unknown destinations yield `Ok(None)`; a malformed body is an error so
    /// the caller can log and drop just that message.
    pub fn decode(destination: &str, body: &str) -> Result<Option<RelayEvent>, serde_json::Error> {
        let event = match destination {
            topics::PLAYER_LOCATIONS => Some(RelayEvent::PlayerLocations(serde_json::from_str(body)?)),
            topics::SCENE_OBJECTS => Some(RelayEvent::SceneObjects(serde_json::from_str(body)?)),
            topics::PLAYER_HIT => Some(RelayEvent::PlayerHit(serde_json::from_str(body)?)),
            _ => None,
        };
        Ok(event)
    }
}
