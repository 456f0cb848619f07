//! Combat: hit detection, health, death and respawn.
//!
//! Punches are resolved by the attacker and broadcast as [`CombatEvent`]s.
//! Every client applies the broadcast: the target loses health, everyone
//! else shows a short hit reaction on the target's model.

use crate::config::CombatConfig;
use crate::protocol::{CombatEvent, RespawnNotice};
use crate::registry::RemotePlayerRegistry;
use crate::timer::Countdown;
use crate::types::{PlayerId, Vec3};

/// Does a punch from `attacker` facing `yaw` reach `target`?
///
/// Range and angle are measured on the ground plane.  Coincident positions
/// never hit since there is no direction to test.
pub fn hit_cone(
    attacker: Vec3,
    yaw: f32,
    target: Vec3,
    range: f32,
    half_angle: f32,
    min_distance: f32,
) -> bool {
    let to_target = Vec3::new(target.x - attacker.x, 0.0, target.z - attacker.z);
    let distance = to_target.planar_length();
    if distance < min_distance || distance >= range {
        return false;
    }
    let forward = Vec3::new(yaw.sin(), 0.0, yaw.cos());
    let cos_angle = (forward.dot(to_target) / distance).clamp(-1.0, 1.0);
    cos_angle.acos() < half_angle
}

/// What applying a combat event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CombatOutcome {
    /// We were hit.  `died` is true only on the hit that killed us.
    SelfHit { health: i32, died: bool },
    /// A known remote player was hit.
    RemoteHit(PlayerId),
    /// Target unknown (left, or never seen).
    Ignored,
}

#[derive(Debug, Clone)]
pub struct CombatState {
    self_id: PlayerId,
    config: CombatConfig,
    spawn_point: Vec3,
    health: i32,
    dead: bool,
    hit_flag: Countdown,
    respawn: Countdown,
}

impl CombatState {
    pub fn new(self_id: PlayerId, config: CombatConfig, spawn_point: Vec3) -> Self {
        Self {
            self_id,
            health: config.max_health,
            config,
            spawn_point,
            dead: false,
            hit_flag: Countdown::idle(),
            respawn: Countdown::idle(),
        }
    }

    pub fn health(&self) -> i32 {
        self.health
    }

    pub fn is_dead(&self) -> bool {
        self.dead
    }

    pub fn is_hit(&self) -> bool {
        self.hit_flag.is_active()
    }

    /// Respawn countdown progress in `[0, 1]`; `0` while alive.
    pub fn respawn_progress(&self) -> f32 {
        self.respawn.progress()
    }

    /// Seconds until respawn; `0` while alive.
    pub fn respawn_remaining(&self) -> f32 {
        self.respawn.remaining()
    }

    fn hit_seconds(&self) -> f32 {
        self.config.hit_flag_ms as f32 / 1000.0
    }

    /// Apply one broadcast combat event.
    pub fn on_combat_event(
        &mut self,
        event: &CombatEvent,
        registry: &mut RemotePlayerRegistry,
    ) -> CombatOutcome {
        if event.from_id == self.self_id {
            log::debug!("[combat] Our punch landed on {}", event.target_id);
        }

        if event.target_id == self.self_id {
            return self.take_hit();
        }

        if registry.mark_hit(&event.target_id, self.hit_seconds()) {
            CombatOutcome::RemoteHit(event.target_id.clone())
        } else {
            log::debug!("[combat] Hit on unknown player {} ignored", event.target_id);
            CombatOutcome::Ignored
        }
    }

    fn take_hit(&mut self) -> CombatOutcome {
        self.health = (self.health - self.config.damage_per_hit).max(0);

        let died = self.health == 0 && !self.dead;
        if died {
            self.dead = true;
            self.hit_flag.cancel();
            self.respawn.start_ms(self.config.respawn_delay_ms);
            log::info!(
                "[combat] Died; respawning in {} ms",
                self.config.respawn_delay_ms
            );
        } else if !self.dead {
            self.hit_flag.start_ms(self.config.hit_flag_ms);
        }

        CombatOutcome::SelfHit {
            health: self.health,
            died,
        }
    }

    /// Advance timers.  Returns the notice to publish when we respawn.
    pub fn tick(&mut self, dt: f32) -> Option<RespawnNotice> {
        self.hit_flag.tick(dt);
        if !self.respawn.tick(dt) {
            return None;
        }

        self.dead = false;
        self.health = self.config.max_health;
        log::info!("[combat] Respawned at {}", self.spawn_point);
        Some(RespawnNotice {
            id: self.self_id.clone(),
            position: self.spawn_point,
            health: self.health,
        })
    }

    pub fn cancel_timers(&mut self) {
        self.hit_flag.cancel();
        self.respawn.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    const RANGE: f32 = 1.2;
    const HALF: f32 = PI / 6.0;
    const MIN: f32 = 0.001;

    fn cone(yaw: f32, target: Vec3) -> bool {
        hit_cone(Vec3::zero(), yaw, target, RANGE, HALF, MIN)
    }

    #[test]
    fn straight_ahead_within_range_hits() {
        assert!(cone(0.0, Vec3::new(0.0, 0.0, 1.0)));
    }

    #[test]
    fn out_of_range_misses() {
        assert!(!cone(0.0, Vec3::new(0.0, 0.0, 1.3)));
    }

    #[test]
    fn outside_half_angle_misses() {
        // 45 degrees off-axis
        assert!(!cone(0.0, Vec3::new(0.7, 0.0, 0.7)));
        // ~20 degrees off-axis
        assert!(cone(0.0, Vec3::new(0.34, 0.0, 0.94)));
    }

    #[test]
    fn coincident_position_never_hits() {
        assert!(!cone(0.0, Vec3::new(0.0, 0.0, 0.0005)));
    }

    #[test]
    fn yaw_rotates_the_cone() {
        // Facing +x
        assert!(cone(PI / 2.0, Vec3::new(1.0, 0.0, 0.0)));
        assert!(!cone(PI / 2.0, Vec3::new(0.0, 0.0, 1.0)));
    }

    #[test]
    fn height_difference_is_ignored() {
        assert!(cone(0.0, Vec3::new(0.0, 0.8, 1.0)));
    }

    // -----------------------------------------------------------------------
    // Health and respawn
    // -----------------------------------------------------------------------

    fn state() -> (CombatState, RemotePlayerRegistry) {
        let me = PlayerId::new("me");
        let reg = RemotePlayerRegistry::new(me.clone(), &crate::config::InterpolationConfig::default());
        let spawn = Vec3::new(0.0, 1.1, 0.0);
        (CombatState::new(me, CombatConfig::default(), spawn), reg)
    }

    fn hit_on(target: &str) -> CombatEvent {
        CombatEvent {
            from_id: PlayerId::new("them"),
            target_id: PlayerId::new(target),
        }
    }

    #[test]
    fn self_hit_costs_health_and_raises_flag() {
        let (mut combat, mut reg) = state();
        let outcome = combat.on_combat_event(&hit_on("me"), &mut reg);
        assert_eq!(outcome, CombatOutcome::SelfHit { health: 90, died: false });
        assert!(combat.is_hit());

        combat.tick(0.6);
        assert!(!combat.is_hit());
    }

    #[test]
    fn death_is_entered_once_and_respawn_fires_once() {
        let (mut combat, mut reg) = state();
        let mut deaths = 0;
        for _ in 0..12 {
            if let CombatOutcome::SelfHit { died: true, .. } = combat.on_combat_event(&hit_on("me"), &mut reg) {
                deaths += 1;
            }
        }
        assert_eq!(deaths, 1);
        assert_eq!(combat.health(), 0);
        assert!(combat.is_dead());
        assert!(!combat.is_hit());

        assert!(combat.tick(2.5).is_none());
        assert!((combat.respawn_progress() - 0.5).abs() < 1e-5);

        let notice = combat.tick(2.6).unwrap();
        assert_eq!(notice.health, 100);
        assert_eq!(notice.position, Vec3::new(0.0, 1.1, 0.0));
        assert!(!combat.is_dead());
        assert!(combat.tick(10.0).is_none());
    }

    #[test]
    fn unknown_target_is_ignored() {
        let (mut combat, mut reg) = state();
        assert_eq!(combat.on_combat_event(&hit_on("ghost"), &mut reg), CombatOutcome::Ignored);
        assert_eq!(combat.health(), 100);
    }

    #[test]
    fn cancelled_respawn_never_fires() {
        let (mut combat, mut reg) = state();
        for _ in 0..10 {
            combat.on_combat_event(&hit_on("me"), &mut reg);
        }
        combat.cancel_timers();
        assert!(combat.tick(10.0).is_none());
    }
}
