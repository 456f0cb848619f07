//! `RemotePlayerRegistry`: local mirror of every other player.
//!
//! Owned by the game session and only touched from the tick, so no locking
//! is needed.  Each entry keeps the latest snapshot (the target) and a
//! rendered pose that is eased towards it every tick.

use std::collections::HashMap;
use std::f32::consts::PI;

use crate::animation::{select_clip, AnimationClip, AnimationState};
use crate::config::InterpolationConfig;
use crate::protocol::PlayerSnapshot;
use crate::timer::Countdown;
use crate::types::{lerp, PlayerId, Vec3};

// ---------------------------------------------------------------------------
// Entry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RemotePlayerEntry {
    /// Latest snapshot received; replaced wholesale on every update.
    pub snapshot: PlayerSnapshot,
    pub rendered_position: Vec3,
    /// Model yaw actually drawn.
    pub rendered_yaw: f32,
    hit_overlay: Countdown,
    /// Seconds since the last snapshot for this id.
    unseen_for: f32,
}

impl RemotePlayerEntry {
    fn new(snapshot: PlayerSnapshot) -> Self {
        Self {
            rendered_position: snapshot.position,
            rendered_yaw: model_yaw(&snapshot),
            snapshot,
            hit_overlay: Countdown::idle(),
            unseen_for: 0.0,
        }
    }

    pub fn id(&self) -> &PlayerId {
        &self.snapshot.id
    }

    pub fn target_position(&self) -> Vec3 {
        self.snapshot.position
    }

    pub fn target_yaw(&self) -> f32 {
        model_yaw(&self.snapshot)
    }

    pub fn is_hit(&self) -> bool {
        self.hit_overlay.is_active()
    }

    /// Published flags with the local hit overlay applied.
    pub fn animation_state(&self) -> AnimationState {
        let mut state = self.snapshot.animation_state;
        if self.is_hit() {
            state.is_hitted = true;
        }
        state
    }

    pub fn clip(&self) -> AnimationClip {
        select_clip(&self.animation_state())
    }

    pub fn display_name(&self) -> &str {
        self.snapshot.display_name()
    }
}

/// Wire yaw carries a half-turn so model-forward matches camera-forward.
fn model_yaw(snapshot: &PlayerSnapshot) -> f32 {
    snapshot.rotation_y + PI
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct RemotePlayerRegistry {
    self_id: PlayerId,
    entries: HashMap<PlayerId, RemotePlayerEntry>,
    smoothing: f32,
    /// `None` disables eviction.
    stale_after: Option<f32>,
}

impl RemotePlayerRegistry {
    pub fn new(self_id: PlayerId, config: &InterpolationConfig) -> Self {
        let stale_after = match config.stale_after_ms {
            0 => None,
            ms => Some(ms as f32 / 1000.0),
        };
        Self {
            self_id,
            entries: HashMap::new(),
            smoothing: config.smoothing.clamp(0.0, 1.0),
            stale_after,
        }
    }

    // ------------------------------------------------------------------
    // Updates
    // ------------------------------------------------------------------

    /// Upsert one snapshot.  First sight snaps the rendered pose to the
    /// snapshot; later ones only move the target.  Returns `false` for our
    /// own id.
    pub fn on_snapshot(&mut self, snapshot: PlayerSnapshot) -> bool {
        if snapshot.id == self.self_id {
            return false;
        }
        match self.entries.get_mut(&snapshot.id) {
            Some(entry) => {
                entry.snapshot = snapshot;
                entry.unseen_for = 0.0;
            }
            None => {
                log::debug!(
                    "[registry] Player {} joined at {}",
                    snapshot.display_name(),
                    snapshot.position
                );
                self.entries
                    .insert(snapshot.id.clone(), RemotePlayerEntry::new(snapshot));
            }
        }
        true
    }

    /// Apply a full roster broadcast: upsert everyone listed and drop
    /// everyone who is not.
    pub fn apply_player_list(&mut self, list: Vec<PlayerSnapshot>) {
        let listed: std::collections::HashSet<PlayerId> =
            list.iter().map(|s| s.id.clone()).collect();
        self.entries.retain(|id, _| {
            let keep = listed.contains(id);
            if !keep {
                log::debug!("[registry] Player {} left the roster", id);
            }
            keep
        });
        for snapshot in list {
            self.on_snapshot(snapshot);
        }
    }

    pub fn on_unregister(&mut self, id: &PlayerId) -> bool {
        self.entries.remove(id).is_some()
    }

    /// Raise the hit overlay on a known player.  Unknown ids are ignored.
    pub fn mark_hit(&mut self, id: &PlayerId, seconds: f32) -> bool {
        match self.entries.get_mut(id) {
            Some(entry) => {
                entry.hit_overlay.start(seconds);
                true
            }
            None => false,
        }
    }

    /// Ease rendered poses, expire overlays, evict stale entries.
    /// Returns the evicted ids.
    pub fn tick(&mut self, dt: f32) -> Vec<PlayerId> {
        let s = self.smoothing;
        for entry in self.entries.values_mut() {
            entry.rendered_position = entry.rendered_position.lerp(entry.target_position(), s);
            entry.rendered_yaw = lerp(entry.rendered_yaw, entry.target_yaw(), s);
            entry.hit_overlay.tick(dt);
            entry.unseen_for += dt;
        }

        let Some(limit) = self.stale_after else {
            return Vec::new();
        };
        let stale: Vec<PlayerId> = self
            .entries
            .values()
            .filter(|e| e.unseen_for > limit)
            .map(|e| e.id().clone())
            .collect();
        for id in &stale {
            log::info!("[registry] Evicting stale player {}", id);
            self.entries.remove(id);
        }
        stale
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn get(&self, id: &PlayerId) -> Option<&RemotePlayerEntry> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &PlayerId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RemotePlayerEntry> {
        self.entries.values()
    }

    /// Latest known position of every remote player, for hit tests.
    pub fn target_positions(&self) -> impl Iterator<Item = (&PlayerId, Vec3)> {
        self.entries.iter().map(|(id, e)| (id, e.target_position()))
    }
}
