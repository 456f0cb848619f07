//! Local player controller: input → physics → camera → snapshot.
//!
//! The local client is authoritative for its own body.  Every tick the
//! controller turns the held keys and pointer motion into a horizontal
//! velocity on the physics body, places the camera, resolves punches against
//! the remote registry and assembles the snapshot that gets published.

use std::f32::consts::PI;

use crate::animation::AnimationState;
use crate::combat::hit_cone;
use crate::config::{CameraConfig, CombatConfig, MovementConfig};
use crate::physics::{ContactEvent, PhysicsBody};
use crate::protocol::{CombatEvent, PlayerSnapshot};
use crate::registry::RemotePlayerRegistry;
use crate::timer::Countdown;
use crate::types::{lerp, wrap_angle, PlayerId, Vec3};

// ---------------------------------------------------------------------------
// Input / output
// ---------------------------------------------------------------------------

/// Held keys and pointer motion for one tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputState {
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
    pub jump: bool,
    pub run: bool,
    /// Toggles sitting on press.
    pub sit: bool,
    /// Toggles lying down on press.
    pub lie: bool,
    pub punch: bool,
    pub toggle_view: bool,
    /// Pointer motion in pixels since the last tick.
    pub pointer_delta: (f32, f32),
    /// Look input is ignored unless the pointer is captured.
    pub pointer_locked: bool,
}

impl InputState {
    pub fn is_moving(&self) -> bool {
        self.forward || self.backward || self.left || self.right
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewMode {
    #[default]
    FirstPerson,
    ThirdPerson,
}

impl ViewMode {
    fn toggled(self) -> Self {
        match self {
            ViewMode::FirstPerson => ViewMode::ThirdPerson,
            ViewMode::ThirdPerson => ViewMode::FirstPerson,
        }
    }
}

/// Where the camera sits this tick.  Euler angles are (pitch, yaw, roll);
/// third-person also carries the point it orbits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPose {
    pub position: Vec3,
    pub pitch: f32,
    pub yaw: f32,
    pub roll: f32,
    pub look_at: Option<Vec3>,
}

/// Read-only game state the controller consults.
pub struct ControlContext<'a> {
    pub registry: &'a RemotePlayerRegistry,
    pub dead: bool,
    pub hit: bool,
}

#[derive(Debug, Clone)]
pub struct ControllerOutput {
    pub snapshot: PlayerSnapshot,
    /// One event per remote player our punch reached this tick.
    pub hits: Vec<CombatEvent>,
    pub camera: CameraPose,
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

pub struct LocalPlayerController {
    id: PlayerId,
    nickname: Option<String>,
    movement: MovementConfig,
    camera: CameraConfig,
    combat: CombatConfig,
    body: Box<dyn PhysicsBody>,

    view: ViewMode,
    yaw: f32,
    pitch: f32,
    roll: f32,
    /// Death camera height, eased towards the floor.
    camera_y: f32,
    grounded: bool,
    sitting: bool,
    lying: bool,
    prev: InputState,

    punch_anim: Countdown,
    punch_cooldown: Countdown,
    was_dead: bool,
}

impl LocalPlayerController {
    pub fn new(
        id: PlayerId,
        nickname: Option<String>,
        movement: MovementConfig,
        camera: CameraConfig,
        combat: CombatConfig,
        body: Box<dyn PhysicsBody>,
    ) -> Self {
        let camera_y = body.translation().y + camera.head_offset;
        Self {
            id,
            nickname,
            movement,
            camera,
            combat,
            body,
            view: ViewMode::FirstPerson,
            yaw: 0.0,
            pitch: 0.0,
            roll: 0.0,
            camera_y,
            grounded: false,
            sitting: false,
            lying: false,
            prev: InputState::default(),
            punch_anim: Countdown::idle(),
            punch_cooldown: Countdown::idle(),
            was_dead: false,
        }
    }

    pub fn id(&self) -> &PlayerId {
        &self.id
    }

    pub fn nickname(&self) -> Option<&str> {
        self.nickname.as_deref()
    }

    pub fn view_mode(&self) -> ViewMode {
        self.view
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn position(&self) -> Vec3 {
        self.body.translation()
    }

    pub fn velocity(&self) -> Vec3 {
        self.body.linvel()
    }

    pub fn is_grounded(&self) -> bool {
        self.grounded
    }

    pub fn is_sitting(&self) -> bool {
        self.sitting
    }

    pub fn is_lying(&self) -> bool {
        self.lying
    }

    pub fn is_punching(&self) -> bool {
        self.punch_anim.is_active()
    }

    /// Horizontal basis from yaw only; pitch never tilts movement.
    pub fn basis(&self) -> (Vec3, Vec3) {
        let forward = Vec3::new(self.yaw.sin(), 0.0, self.yaw.cos());
        let right = forward.cross(Vec3::UP);
        (forward, right)
    }

    /// Snapshot sent once on registration.
    pub fn registration_snapshot(&self) -> PlayerSnapshot {
        self.snapshot(AnimationState::idle())
    }

    /// Advance one tick.
    pub fn tick(&mut self, input: &InputState, dt: f32, ctx: ControlContext<'_>) -> ControllerOutput {
        self.punch_anim.tick(dt);
        self.punch_cooldown.tick(dt);

        let output = if ctx.dead {
            self.tick_dead(dt)
        } else {
            self.tick_alive(input, dt, &ctx)
        };

        self.was_dead = ctx.dead;
        self.prev = input.clone();
        output
    }

    fn pressed(&self, now: bool, before: bool) -> bool {
        now && !before
    }

    fn tick_alive(&mut self, input: &InputState, dt: f32, ctx: &ControlContext<'_>) -> ControllerOutput {
        self.look(input);

        if self.pressed(input.toggle_view, self.prev.toggle_view) {
            self.view = self.view.toggled();
            if self.view == ViewMode::FirstPerson {
                self.pitch = 0.0;
            }
            log::debug!("[controller] View mode {:?}", self.view);
        }
        if self.pressed(input.sit, self.prev.sit) {
            self.sitting = !self.sitting;
            if self.sitting {
                self.lying = false;
            }
        }
        if self.pressed(input.lie, self.prev.lie) {
            self.lying = !self.lying;
            if self.lying {
                self.sitting = false;
            }
        }

        // Horizontal velocity replaces whatever physics left; vertical is kept.
        let (forward, right) = self.basis();
        let mut dir = Vec3::zero();
        if input.forward {
            dir += forward;
        }
        if input.backward {
            dir = dir - forward;
        }
        if input.right {
            dir += right;
        }
        if input.left {
            dir = dir - right;
        }
        let horizontal = dir * self.speed(input);
        let vy = self.body.linvel().y;
        self.body.set_linvel(Vec3::new(horizontal.x, vy, horizontal.z));

        if self.pressed(input.jump, self.prev.jump)
            && self.grounded
            && self.body.linvel().y <= self.movement.jump_max_vertical_speed
        {
            self.body
                .apply_impulse(Vec3::new(0.0, self.movement.jump_impulse, 0.0));
            self.grounded = false;
        }

        let contacts = self.body.step(dt);
        self.apply_contacts(&contacts);

        let hits = if self.pressed(input.punch, self.prev.punch) {
            self.punch(ctx.registry)
        } else {
            Vec::new()
        };

        let camera = match self.view {
            ViewMode::FirstPerson => self.first_person_camera(),
            ViewMode::ThirdPerson => self.third_person_camera(),
        };
        self.camera_y = self.body.translation().y + self.camera.head_offset;

        let state = self.animation_state(input, ctx.hit);
        ControllerOutput {
            snapshot: self.snapshot(state),
            hits,
            camera,
        }
    }

    fn tick_dead(&mut self, dt: f32) -> ControllerOutput {
        if !self.was_dead {
            self.view = ViewMode::FirstPerson;
            self.sitting = false;
            self.lying = false;
            self.punch_anim.cancel();
        }

        self.body.set_linvel(Vec3::zero());
        let contacts = self.body.step(dt);
        self.apply_contacts(&contacts);

        let body = self.body.translation();
        let l = self.camera.death_lerp;
        self.camera_y = lerp(self.camera_y, body.y + self.camera.death_height, l);
        self.pitch = lerp(self.pitch, 0.0, l);
        self.roll = lerp(self.roll, self.camera.death_roll, l);

        let camera = CameraPose {
            position: Vec3::new(body.x, self.camera_y, body.z),
            pitch: self.pitch,
            yaw: self.yaw + PI,
            roll: self.roll,
            look_at: None,
        };

        ControllerOutput {
            snapshot: self.snapshot(AnimationState::dead()),
            hits: Vec::new(),
            camera,
        }
    }

    fn look(&mut self, input: &InputState) {
        if !input.pointer_locked {
            return;
        }
        let (dx, dy) = input.pointer_delta;
        let sens = self.movement.pointer_sensitivity;
        self.yaw = wrap_angle(self.yaw - dx * sens);
        // Orbit pitch runs the other way round.
        match self.view {
            ViewMode::FirstPerson => self.pitch -= dy * sens,
            ViewMode::ThirdPerson => self.pitch += dy * sens,
        }
        let limit = self.movement.pitch_limit();
        self.pitch = self.pitch.clamp(-limit, limit);
    }

    fn speed(&self, input: &InputState) -> f32 {
        let m = &self.movement;
        let moving = input.is_moving();
        if self.sitting && moving {
            (m.base_speed * m.sit_factor).max(m.sit_min_speed)
        } else if self.lying && moving {
            (m.base_speed * m.lie_factor).max(m.lie_min_speed)
        } else if input.run && moving {
            m.base_speed + m.run_bonus
        } else {
            m.base_speed
        }
    }

    fn apply_contacts(&mut self, contacts: &[ContactEvent]) {
        for contact in contacts {
            self.grounded = matches!(contact, ContactEvent::Enter);
        }
    }

    fn punch(&mut self, registry: &RemotePlayerRegistry) -> Vec<CombatEvent> {
        if self.punch_cooldown.is_active() {
            return Vec::new();
        }
        self.punch_anim.start_ms(self.combat.punch_duration_ms);

        let origin = self.body.translation();
        let c = &self.combat;
        let hits: Vec<CombatEvent> = registry
            .target_positions()
            .filter(|(_, pos)| {
                hit_cone(
                    origin,
                    self.yaw,
                    *pos,
                    c.hit_range,
                    c.hit_half_angle,
                    c.min_hit_distance,
                )
            })
            .map(|(id, _)| CombatEvent {
                from_id: self.id.clone(),
                target_id: id.clone(),
            })
            .collect();

        if !hits.is_empty() {
            log::debug!("[controller] Punch reached {} player(s)", hits.len());
            self.punch_cooldown.start_ms(self.combat.punch_cooldown_ms);
        }
        hits
    }

    fn first_person_camera(&self) -> CameraPose {
        let body = self.body.translation();
        CameraPose {
            position: body + Vec3::new(0.0, self.camera.head_offset, 0.0),
            pitch: self.pitch,
            yaw: self.yaw + PI,
            roll: 0.0,
            look_at: None,
        }
    }

    fn third_person_camera(&self) -> CameraPose {
        let body = self.body.translation();
        let target = body + Vec3::new(0.0, self.camera.orbit_target_height, 0.0);
        let d = self.camera.orbit_distance;
        let phi = PI / 2.0 - self.pitch;
        let theta = self.yaw + PI;
        let offset = Vec3::new(
            d * phi.sin() * theta.sin(),
            d * phi.cos(),
            d * phi.sin() * theta.cos(),
        );
        CameraPose {
            position: target + offset,
            pitch: self.pitch,
            yaw: theta,
            roll: 0.0,
            look_at: Some(target),
        }
    }

    fn animation_state(&self, input: &InputState, hit: bool) -> AnimationState {
        let moving = input.is_moving();
        let punching = self.punch_anim.is_active();
        let busy = moving || input.jump || input.run || punching || hit;
        AnimationState {
            is_walking: input.forward,
            is_backward: input.backward,
            is_left: input.left,
            is_right: input.right,
            is_jumping: input.jump,
            is_running: input.run && moving,
            is_sitted: self.sitting,
            is_sitted_and_walk: self.sitting && moving,
            is_lying_down: self.lying,
            is_lying_down_and_walk: self.lying && moving,
            is_punching: punching,
            is_hitted: hit,
            is_idle: !busy && !self.sitting && !self.lying,
            is_dead: false,
        }
    }

    fn snapshot(&self, animation_state: AnimationState) -> PlayerSnapshot {
        PlayerSnapshot {
            id: self.id.clone(),
            position: self.body.translation(),
            rotation_y: self.yaw + PI,
            nickname: self.nickname.clone(),
            animation_state,
        }
    }

    /// Teleport to `spawn` after death.
    pub fn respawn(&mut self, spawn: Vec3) {
        self.body.set_translation(spawn);
        self.body.set_linvel(Vec3::zero());
        self.roll = 0.0;
        self.pitch = 0.0;
        self.view = ViewMode::FirstPerson;
        self.camera_y = spawn.y + self.camera.head_offset;
        self.grounded = false;
        log::info!("[controller] Respawned at {}", spawn);
    }

    pub fn cancel_timers(&mut self) {
        self.punch_anim.cancel();
        self.punch_cooldown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InterpolationConfig;
    use crate::physics::KinematicBody;

    const DT: f32 = 1.0 / 60.0;

    fn controller() -> LocalPlayerController {
        let movement = MovementConfig::default();
        let body = KinematicBody::new(Vec3::new(0.0, KinematicBody::CAPSULE_REST_HEIGHT, 0.0));
        LocalPlayerController::new(
            PlayerId::new("me"),
            Some("tester".into()),
            movement,
            CameraConfig::default(),
            CombatConfig::default(),
            Box::new(body),
        )
    }

    fn registry() -> RemotePlayerRegistry {
        RemotePlayerRegistry::new(PlayerId::new("me"), &InterpolationConfig::default())
    }

    fn ctx(registry: &RemotePlayerRegistry) -> ControlContext<'_> {
        ControlContext {
            registry,
            dead: false,
            hit: false,
        }
    }

    fn remote(id: &str, position: Vec3) -> PlayerSnapshot {
        PlayerSnapshot {
            id: PlayerId::new(id),
            position,
            rotation_y: 0.0,
            nickname: None,
            animation_state: AnimationState::idle(),
        }
    }

    #[test]
    fn walking_forward_at_base_speed() {
        let reg = registry();
        let mut c = controller();
        let input = InputState {
            forward: true,
            ..Default::default()
        };
        let out = c.tick(&input, DT, ctx(&reg));
        assert!((c.velocity().z - 5.0).abs() < 1e-5);
        assert!(out.snapshot.animation_state.is_walking);
        assert!(!out.snapshot.animation_state.is_idle);
    }

    #[test]
    fn speed_depends_on_posture() {
        let reg = registry();
        let mut c = controller();

        let run = InputState {
            forward: true,
            run: true,
            ..Default::default()
        };
        let out = c.tick(&run, DT, ctx(&reg));
        assert!((c.velocity().z - 7.0).abs() < 1e-5);
        assert!(out.snapshot.animation_state.is_running);

        // Sit toggles on the press edge and beats running.
        let sit = InputState {
            sit: true,
            ..run.clone()
        };
        let out = c.tick(&sit, DT, ctx(&reg));
        assert!((c.velocity().z - 2.5).abs() < 1e-5);
        assert!(out.snapshot.animation_state.is_sitted_and_walk);

        // Lying clears sitting.
        let lie = InputState {
            lie: true,
            ..run.clone()
        };
        c.tick(&lie, DT, ctx(&reg));
        assert!(c.is_lying());
        assert!(!c.is_sitting());
        assert!((c.velocity().z - 1.2).abs() < 1e-5);
    }

    #[test]
    fn strafing_uses_the_right_vector() {
        let reg = registry();
        let mut c = controller();
        let input = InputState {
            right: true,
            ..Default::default()
        };
        c.tick(&input, DT, ctx(&reg));
        // yaw 0: right = forward x up = (-1, 0, 0)
        assert!((c.velocity().x + 5.0).abs() < 1e-5);
    }

    #[test]
    fn look_requires_pointer_lock() {
        let reg = registry();
        let mut c = controller();
        let unlocked = InputState {
            pointer_delta: (100.0, 50.0),
            ..Default::default()
        };
        c.tick(&unlocked, DT, ctx(&reg));
        assert_eq!(c.yaw(), 0.0);

        let locked = InputState {
            pointer_locked: true,
            ..unlocked
        };
        c.tick(&locked, DT, ctx(&reg));
        assert!((c.yaw() + 0.2).abs() < 1e-5);
        assert!((c.pitch() + 0.1).abs() < 1e-5);
    }

    #[test]
    fn pitch_is_clamped() {
        let reg = registry();
        let mut c = controller();
        let input = InputState {
            pointer_locked: true,
            pointer_delta: (0.0, -10_000.0),
            ..Default::default()
        };
        c.tick(&input, DT, ctx(&reg));
        assert!((c.pitch() - (PI / 2.0 - 0.1)).abs() < 1e-5);
    }

    #[test]
    fn view_toggles_on_press_edge_and_resets_pitch() {
        let reg = registry();
        let mut c = controller();
        let press = InputState {
            toggle_view: true,
            ..Default::default()
        };
        let out = c.tick(&press, DT, ctx(&reg));
        assert_eq!(c.view_mode(), ViewMode::ThirdPerson);
        assert!(out.camera.look_at.is_some());

        // Held: no second toggle.
        c.tick(&press, DT, ctx(&reg));
        assert_eq!(c.view_mode(), ViewMode::ThirdPerson);

        let look = InputState {
            pointer_locked: true,
            pointer_delta: (0.0, 100.0),
            ..Default::default()
        };
        c.tick(&look, DT, ctx(&reg));
        assert!(c.pitch() > 0.0);

        c.tick(&press, DT, ctx(&reg));
        assert_eq!(c.view_mode(), ViewMode::FirstPerson);
        assert_eq!(c.pitch(), 0.0);
    }

    #[test]
    fn third_person_camera_orbits_behind() {
        let reg = registry();
        let mut c = controller();
        let press = InputState {
            toggle_view: true,
            ..Default::default()
        };
        let out = c.tick(&press, DT, ctx(&reg));
        let body = c.position();
        // pitch 0, yaw 0: camera sits 5 m behind on -z at target height.
        assert!((out.camera.position.z - (body.z - 5.0)).abs() < 1e-4);
        assert!((out.camera.position.y - (body.y + 1.0)).abs() < 1e-4);
    }

    #[test]
    fn jump_only_on_press_while_grounded() {
        let reg = registry();
        let mut c = controller();
        c.tick(&InputState::default(), DT, ctx(&reg));
        assert!(c.is_grounded());

        let jump = InputState {
            jump: true,
            ..Default::default()
        };
        let out = c.tick(&jump, DT, ctx(&reg));
        assert!(!c.is_grounded());
        assert!(c.velocity().y > 2.0);
        assert!(out.snapshot.animation_state.is_jumping);

        // Holding the key does not re-fire mid-air.
        let vy = c.velocity().y;
        c.tick(&jump, DT, ctx(&reg));
        assert!(c.velocity().y < vy);
    }

    #[test]
    fn punch_hits_players_in_front_only() {
        let mut reg = registry();
        reg.on_snapshot(remote("front", Vec3::new(0.0, 0.75, 1.0)));
        reg.on_snapshot(remote("behind", Vec3::new(0.0, 0.75, -1.0)));
        let mut c = controller();

        let punch = InputState {
            punch: true,
            ..Default::default()
        };
        let out = c.tick(&punch, DT, ctx(&reg));
        assert_eq!(out.hits.len(), 1);
        assert_eq!(out.hits[0].target_id, PlayerId::new("front"));
        assert_eq!(out.hits[0].from_id, PlayerId::new("me"));
        assert!(out.snapshot.animation_state.is_punching);

        // Cooldown blocks an immediate second punch.
        c.tick(&InputState::default(), DT, ctx(&reg));
        let out = c.tick(&punch, DT, ctx(&reg));
        assert!(out.hits.is_empty());
    }

    #[test]
    fn missed_punch_does_not_start_cooldown() {
        let reg = registry();
        let mut c = controller();
        let punch = InputState {
            punch: true,
            ..Default::default()
        };
        c.tick(&punch, DT, ctx(&reg));
        c.tick(&InputState::default(), DT, ctx(&reg));

        let mut reg = registry();
        reg.on_snapshot(remote("front", Vec3::new(0.0, 0.75, 1.0)));
        let out = c.tick(&punch, DT, ctx(&reg));
        assert_eq!(out.hits.len(), 1);
    }

    #[test]
    fn dead_player_is_frozen() {
        let reg = registry();
        let mut c = controller();
        let toggle = InputState {
            toggle_view: true,
            ..Default::default()
        };
        c.tick(&toggle, DT, ctx(&reg));

        let input = InputState {
            forward: true,
            punch: true,
            pointer_locked: true,
            pointer_delta: (100.0, 0.0),
            ..Default::default()
        };
        let dead = ControlContext {
            registry: &reg,
            dead: true,
            hit: false,
        };
        let out = c.tick(&input, DT, dead);
        assert_eq!(out.snapshot.animation_state, AnimationState::dead());
        assert_eq!(c.view_mode(), ViewMode::FirstPerson);
        assert_eq!(c.velocity().x, 0.0);
        assert_eq!(c.velocity().z, 0.0);
        assert_eq!(c.yaw(), 0.0);
        assert!(out.hits.is_empty());
        assert!(out.camera.roll > 0.0);
    }

    #[test]
    fn respawn_teleports_and_resets_roll() {
        let reg = registry();
        let mut c = controller();
        for _ in 0..10 {
            c.tick(
                &InputState::default(),
                DT,
                ControlContext {
                    registry: &reg,
                    dead: true,
                    hit: false,
                },
            );
        }
        let spawn = Vec3::new(0.0, 1.1, 0.0);
        c.respawn(spawn);
        assert_eq!(c.position(), spawn);
        assert_eq!(c.velocity(), Vec3::zero());

        let out = c.tick(&InputState::default(), DT, ctx(&reg));
        assert_eq!(out.camera.roll, 0.0);
        assert!(out.snapshot.animation_state.is_idle);
    }

    #[test]
    fn snapshot_carries_hit_flag_and_model_yaw() {
        let reg = registry();
        let mut c = controller();
        let out = c.tick(
            &InputState::default(),
            DT,
            ControlContext {
                registry: &reg,
                dead: false,
                hit: true,
            },
        );
        assert!(out.snapshot.animation_state.is_hitted);
        assert!(!out.snapshot.animation_state.is_idle);
        assert!((out.snapshot.rotation_y - PI).abs() < 1e-6);
        assert_eq!(out.snapshot.nickname.as_deref(), Some("tester"));
    }
}
