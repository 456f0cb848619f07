//! `GameSession`: owns all client-side state and runs the tick.
//!
//! The session is the only mutator of the registry, combat state, scene and
//! controller.  Relay traffic arrives as [`RelayEvent`]s drained from the
//! link at the start of each tick; everything outbound goes through
//! [`publish_json`], which drops messages while the link is down.

use crate::animation::{AnimationClip, AnimationDriver, CharacterVariant};
use crate::combat::{CombatOutcome, CombatState};
use crate::config::SyncConfig;
use crate::controller::{CameraPose, ControlContext, InputState, LocalPlayerController, ViewMode};
use crate::events::RelayEvent;
use crate::identity::Identity;
use crate::link::{publish_json, RelayLink};
use crate::physics::PhysicsBody;
use crate::protocol::{destinations, ObjectPosition, UnregisterPlayer};
use crate::registry::RemotePlayerRegistry;
use crate::scene::{publish_object_positions, SceneObjectSync};
use crate::types::{PlayerId, Vec3};

// ---------------------------------------------------------------------------
// Tick I/O
// ---------------------------------------------------------------------------

/// Everything the host feeds into one tick.
#[derive(Debug, Clone, Default)]
pub struct TickInput {
    /// Seconds since the previous tick.
    pub dt: f32,
    pub input: InputState,
    /// Positions of the props this client simulates.  Published as a whole
    /// set when non-empty.
    pub props: Vec<ObjectPosition>,
}

/// What the HUD shows.
#[derive(Debug, Clone, PartialEq)]
pub struct HudState {
    pub display_name: String,
    pub health: i32,
    pub is_hit: bool,
    pub is_dead: bool,
    /// `[0, 1]` while the respawn countdown runs.
    pub respawn_progress: f32,
    pub respawn_remaining: f32,
    pub view_mode: ViewMode,
    pub grounded: bool,
    pub position: Vec3,
    pub velocity: Vec3,
    pub remote_players: usize,
    pub connected: bool,
}

#[derive(Debug, Clone)]
pub struct Frame {
    pub camera: CameraPose,
    pub local_clip: AnimationClip,
    pub hud: HudState,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

pub struct GameSession {
    config: SyncConfig,
    identity: Identity,
    link: Box<dyn RelayLink>,
    controller: LocalPlayerController,
    registry: RemotePlayerRegistry,
    combat: CombatState,
    scene: SceneObjectSync,
    animation: AnimationDriver,
    /// Connection generation `registerPlayer` last went out on.
    registered_on: Option<u64>,
    shut_down: bool,
}

impl GameSession {
    pub fn new(
        config: SyncConfig,
        identity: Identity,
        link: Box<dyn RelayLink>,
        body: Box<dyn PhysicsBody>,
    ) -> Self {
        let id = identity.id.clone();
        let controller = LocalPlayerController::new(
            id.clone(),
            identity.nickname.clone(),
            config.movement.clone(),
            config.camera.clone(),
            config.combat.clone(),
            body,
        );
        let registry = RemotePlayerRegistry::new(id.clone(), &config.interpolation);
        let combat = CombatState::new(id, config.combat.clone(), config.movement.spawn_point);
        let hit_seconds = config.combat.hit_flag_ms as f32 / 1000.0;

        log::info!(
            "[session] Created for {} ({})",
            identity.nickname.as_deref().unwrap_or("-"),
            identity.id
        );

        Self {
            config,
            identity,
            link,
            controller,
            registry,
            combat,
            scene: SceneObjectSync::new(),
            animation: AnimationDriver::new(CharacterVariant::default(), hit_seconds),
            registered_on: None,
            shut_down: false,
        }
    }

    pub fn id(&self) -> &PlayerId {
        &self.identity.id
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_connected()
    }

    /// `registerPlayer` went out on the live connection.
    pub fn is_registered(&self) -> bool {
        self.registered_on.is_some() && self.registered_on == self.link.connection_generation()
    }

    pub fn registry(&self) -> &RemotePlayerRegistry {
        &self.registry
    }

    pub fn combat(&self) -> &CombatState {
        &self.combat
    }

    pub fn scene(&self) -> &SceneObjectSync {
        &self.scene
    }

    pub fn controller(&self) -> &LocalPlayerController {
        &self.controller
    }

    // ------------------------------------------------------------------
    // Tick
    // ------------------------------------------------------------------

    pub fn tick(&mut self, tick: TickInput) -> Frame {
        let dt = tick.dt.max(0.0);

        for event in self.link.poll_events(self.config.relay.max_events_per_tick) {
            self.apply_event(event);
        }
        self.register();

        if let Some(notice) = self.combat.tick(dt) {
            self.controller.respawn(notice.position);
            publish_json(self.link.as_ref(), destinations::PLAYER_RESPAWN, &notice);
        }

        self.registry.tick(dt);

        let output = self.controller.tick(
            &tick.input,
            dt,
            ControlContext {
                registry: &self.registry,
                dead: self.combat.is_dead(),
                hit: self.combat.is_hit(),
            },
        );

        if self.is_registered() {
            publish_json(self.link.as_ref(), destinations::PLAYER_MOVE, &output.snapshot);
        }
        for hit in &output.hits {
            publish_json(self.link.as_ref(), destinations::PLAYER_HIT, hit);
        }
        if let Some(props) = publish_object_positions(&tick.props) {
            publish_json(self.link.as_ref(), destinations::SCENE_OBJECTS, &props);
        }

        let (local_clip, changed) = self.animation.update(&output.snapshot.animation_state, dt);
        if changed {
            log::trace!("[session] Local clip -> {}", local_clip.name());
        }

        Frame {
            camera: output.camera,
            local_clip,
            hud: self.hud(),
        }
    }

    fn apply_event(&mut self, event: RelayEvent) {
        match event {
            RelayEvent::Connected { session } => {
                log::info!(
                    "[session] Connected (session {})",
                    session.as_deref().unwrap_or("?")
                );
            }
            RelayEvent::Disconnected { reason } => {
                log::warn!("[session] Disconnected: {}", reason);
            }
            RelayEvent::PlayerLocations(list) => self.registry.apply_player_list(list),
            RelayEvent::SceneObjects(updates) => self.scene.on_object_update(updates),
            RelayEvent::PlayerHit(event) => {
                match self.combat.on_combat_event(&event, &mut self.registry) {
                    CombatOutcome::SelfHit { health, died: true } => {
                        log::info!("[session] Killed by {} (health {})", event.from_id, health)
                    }
                    CombatOutcome::SelfHit { health, .. } => {
                        log::debug!("[session] Hit by {} (health {})", event.from_id, health)
                    }
                    CombatOutcome::RemoteHit(_) | CombatOutcome::Ignored => {}
                }
            }
        }
    }

    /// Publish `registerPlayer` once per connection generation.
    fn register(&mut self) {
        let Some(generation) = self.link.connection_generation() else {
            return;
        };
        if self.registered_on == Some(generation) {
            return;
        }
        let snapshot = self.controller.registration_snapshot();
        publish_json(self.link.as_ref(), destinations::REGISTER_PLAYER, &snapshot);
        self.registered_on = Some(generation);
        log::info!("[session] Registered as {}", snapshot.display_name());
    }

    fn hud(&self) -> HudState {
        HudState {
            display_name: self
                .identity
                .nickname
                .clone()
                .unwrap_or_else(|| self.identity.id.short().to_string()),
            health: self.combat.health(),
            is_hit: self.combat.is_hit(),
            is_dead: self.combat.is_dead(),
            respawn_progress: self.combat.respawn_progress(),
            respawn_remaining: self.combat.respawn_remaining(),
            view_mode: self.controller.view_mode(),
            grounded: self.controller.is_grounded(),
            position: self.controller.position(),
            velocity: self.controller.velocity(),
            remote_players: self.registry.len(),
            connected: self.link.is_connected(),
        }
    }

    // ------------------------------------------------------------------
    // Teardown
    // ------------------------------------------------------------------

    /// Cancel timers, unregister, close the link.  Only the first call does
    /// anything.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;

        self.controller.cancel_timers();
        self.combat.cancel_timers();

        if self.is_registered() {
            let body = UnregisterPlayer {
                id: self.identity.id.clone(),
            };
            publish_json(self.link.as_ref(), destinations::UNREGISTER_PLAYER, &body);
        }
        self.registered_on = None;
        self.link.disconnect();
        log::info!("[session] Shut down");
    }
}

impl Drop for GameSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}
