//! Relay wire protocol.
//!
//! This module owns **every JSON body that crosses the relay boundary**.
//! Bodies travel inside STOMP `SEND` / `MESSAGE` frames (see [`crate::stomp`]).
//!
//! ## Destinations
//!
//! | Destination             | Direction       | Body                      |
//! |-------------------------|-----------------|---------------------------|
//! | `/app/registerPlayer`   | client → relay  | [`PlayerSnapshot`]        |
//! | `/app/playerMove`       | client → relay  | [`PlayerSnapshot`]        |
//! | `/app/unregisterPlayer` | client → relay  | [`UnregisterPlayer`]      |
//! | `/app/sceneObjects`     | client → relay  | `[ObjectPosition]`        |
//! | `/app/playerHit`        | client → relay  | [`CombatEvent`]           |
//! | `/app/playerRespawn`    | client → relay  | [`RespawnNotice`]         |
//! | `/topic/playerLocations`| relay → clients | `[PlayerSnapshot]` (full) |
//! | `/topic/sceneObjects`   | relay → clients | `[SceneObjectUpdate]`     |
//! | `/topic/playerHit`      | relay → clients | [`CombatEvent`]           |
//!
//! ## Rules
//!
//! 1. Field names are camelCase on the wire.
//! 2. Unknown fields are ignored (the relay adds e.g. `sessionId`).
//! 3. Missing animation flags read as `false`.

use serde::{Deserialize, Deserializer, Serialize};

use crate::animation::AnimationState;
use crate::types::{PlayerId, Vec3};

// ---------------------------------------------------------------------------
// Player state  (registerPlayer, playerMove, playerLocations)
// ---------------------------------------------------------------------------

/// Full state of one player as published by its owner every tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub id: PlayerId,
    #[serde(default)]
    pub position: Vec3,
    /// Model yaw; the sender already added PI to its camera yaw.
    #[serde(default)]
    pub rotation_y: f32,
    #[serde(
        default,
        deserialize_with = "empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub nickname: Option<String>,
    #[serde(default)]
    pub animation_state: AnimationState,
}

impl PlayerSnapshot {
    /// Label shown above the character.
    pub fn display_name(&self) -> &str {
        match &self.nickname {
            Some(n) => n,
            None => self.id.short(),
        }
    }
}

/// Body of `/app/unregisterPlayer`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnregisterPlayer {
    pub id: PlayerId,
}

// ---------------------------------------------------------------------------
// Combat  (playerHit, playerRespawn)
// ---------------------------------------------------------------------------

/// "`from_id` landed a punch on `target_id`".  No ack, no sequence number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombatEvent {
    pub from_id: PlayerId,
    pub target_id: PlayerId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RespawnNotice {
    pub id: PlayerId,
    pub position: Vec3,
    pub health: i32,
}

// ---------------------------------------------------------------------------
// Scene props  (sceneObjects)
// ---------------------------------------------------------------------------

/// Outbound prop position, one per tracked object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectPosition {
    pub id: String,
    pub position: Vec3,
}

/// Inbound prop record.  Only `id` and `position` are guaranteed; the
/// descriptor fields appear when the relay knows them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneObjectUpdate {
    pub id: String,
    pub position: Vec3,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<Vec3>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collider: Option<String>,
}

// ---------------------------------------------------------------------------
// Destination helpers
// ---------------------------------------------------------------------------

/// Client → relay application destinations.
pub mod destinations {
    pub const REGISTER_PLAYER: &str = "/app/registerPlayer";
    pub const PLAYER_MOVE: &str = "/app/playerMove";
    pub const UNREGISTER_PLAYER: &str = "/app/unregisterPlayer";
    pub const SCENE_OBJECTS: &str = "/app/sceneObjects";
    pub const PLAYER_HIT: &str = "/app/playerHit";
    pub const PLAYER_RESPAWN: &str = "/app/playerRespawn";
}

/// Relay → client broadcast topics.
pub mod topics {
    pub const PLAYER_LOCATIONS: &str = "/topic/playerLocations";
    pub const SCENE_OBJECTS: &str = "/topic/sceneObjects";
    pub const PLAYER_HIT: &str = "/topic/playerHit";

    /// Every topic a session subscribes to on (re)connect.
    pub const ALL: [&str; 3] = [PLAYER_LOCATIONS, SCENE_OBJECTS, PLAYER_HIT];
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.filter(|s| !s.is_empty()))
}
