//! Tunable constants, grouped by concern.
//!
//! Every number the sync layer depends on lives here so a deployment can
//! override it from a TOML file or `ARENA_*` environment variables
//! (nested keys use `__`, e.g. `ARENA_RELAY__URL`).

use serde::{Deserialize, Serialize};
use std::f32::consts::PI;
use std::path::Path;

use crate::error::Result;
use crate::types::Vec3;

// ---------------------------------------------------------------------------
// Relay
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// WebSocket endpoint of the STOMP broker.
    pub url: String,
    /// Delay before every reconnect attempt.
    pub reconnect_delay_ms: u64,
    /// Heart-beat we can send (`cx` in the STOMP 1.2 negotiation).
    pub heartbeat_outgoing_ms: u64,
    /// Heart-beat we want to receive (`cy`).
    pub heartbeat_incoming_ms: u64,
    /// How long to wait for `CONNECTED` after the socket opens.
    pub handshake_timeout_ms: u64,
    /// Inbound events buffered between bridge thread and game tick.
    pub event_buffer: usize,
    /// Outbound publishes buffered towards the bridge thread.
    pub command_buffer: usize,
    /// Upper bound on relay events applied per tick.
    pub max_events_per_tick: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:8080/ws/websocket".into(),
            reconnect_delay_ms: 5000,
            heartbeat_outgoing_ms: 4000,
            heartbeat_incoming_ms: 4000,
            handshake_timeout_ms: 10_000,
            event_buffer: 1024,
            command_buffer: 256,
            max_events_per_tick: 256,
        }
    }
}

// ---------------------------------------------------------------------------
// Movement
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MovementConfig {
    /// Base walking speed (m/s).
    pub base_speed: f32,
    /// Sitting speed is `max(base * sit_factor, sit_min)`.
    pub sit_factor: f32,
    pub sit_min_speed: f32,
    /// Lying speed is `max(base * lie_factor, lie_min)`.
    pub lie_factor: f32,
    pub lie_min_speed: f32,
    /// Added to the base speed while running.
    pub run_bonus: f32,
    /// Upward impulse applied on jump.
    pub jump_impulse: f32,
    /// Jump is refused while vertical velocity exceeds this.
    pub jump_max_vertical_speed: f32,
    /// Pointer-to-radian factor.
    pub pointer_sensitivity: f32,
    /// Pitch is clamped to `±(PI/2 - pitch_margin)`.
    pub pitch_margin: f32,
    pub spawn_point: Vec3,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            base_speed: 5.0,
            sit_factor: 0.5,
            sit_min_speed: 1.5,
            lie_factor: 0.15,
            lie_min_speed: 1.2,
            run_bonus: 2.0,
            jump_impulse: 3.0,
            jump_max_vertical_speed: 0.1,
            pointer_sensitivity: 0.002,
            pitch_margin: 0.1,
            spawn_point: Vec3::new(0.0, 1.1, 0.0),
        }
    }
}

impl MovementConfig {
    pub fn pitch_limit(&self) -> f32 {
        PI / 2.0 - self.pitch_margin
    }
}

// ---------------------------------------------------------------------------
// Camera
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// First-person eye height above the body origin.
    pub head_offset: f32,
    /// Third-person orbit radius.
    pub orbit_distance: f32,
    /// Third-person look-at height above the body origin.
    pub orbit_target_height: f32,
    /// Death camera settles this far above the body.
    pub death_height: f32,
    pub death_roll: f32,
    /// Per-tick lerp factor of the death camera.
    pub death_lerp: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            head_offset: 0.3,
            orbit_distance: 5.0,
            orbit_target_height: 1.0,
            death_height: 0.1,
            death_roll: PI / 4.0,
            death_lerp: 0.05,
        }
    }
}

// ---------------------------------------------------------------------------
// Combat
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatConfig {
    pub max_health: i32,
    pub damage_per_hit: i32,
    /// Maximum planar distance of a punch.
    pub hit_range: f32,
    /// Half-angle of the punch cone (radians).
    pub hit_half_angle: f32,
    /// Below this distance the direction is undefined and no hit counts.
    pub min_hit_distance: f32,
    pub punch_duration_ms: u64,
    pub punch_cooldown_ms: u64,
    /// How long the "hit" flag stays raised on self and on remotes.
    pub hit_flag_ms: u64,
    pub respawn_delay_ms: u64,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            max_health: 100,
            damage_per_hit: 10,
            hit_range: 1.2,
            hit_half_angle: PI / 6.0,
            min_hit_distance: 0.001,
            punch_duration_ms: 500,
            punch_cooldown_ms: 500,
            hit_flag_ms: 500,
            respawn_delay_ms: 5000,
        }
    }
}

// ---------------------------------------------------------------------------
// Remote interpolation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpolationConfig {
    /// Per-tick blend factor towards the latest snapshot.  Framerate
    /// dependent on purpose; higher render rates converge faster.
    pub smoothing: f32,
    /// Entries not refreshed for this long are evicted.  `0` disables.
    pub stale_after_ms: u64,
}

impl Default for InterpolationConfig {
    fn default() -> Self {
        Self {
            smoothing: 0.2,
            stale_after_ms: 10_000,
        }
    }
}

// ---------------------------------------------------------------------------
// Top level
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub relay: RelayConfig,
    pub movement: MovementConfig,
    pub camera: CameraConfig,
    pub combat: CombatConfig,
    pub interpolation: InterpolationConfig,
}

impl SyncConfig {
    /// Layer an optional file under `ARENA_*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        let settings = builder
            .add_source(
                config::Environment::with_prefix("ARENA")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        Ok(settings.try_deserialize()?)
    }
}
