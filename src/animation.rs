//! Animation flags and clip selection.
//!
//! Senders publish a bag of boolean flags; receivers pick exactly one clip
//! from [`CLIP_PRIORITY`].  The same table drives every character skin.

use serde::{Deserialize, Serialize};

use crate::timer::Countdown;

// ---------------------------------------------------------------------------
// Wire flags
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationState {
    #[serde(rename = "isWalking")]
    pub is_walking: bool,
    #[serde(rename = "isBackward")]
    pub is_backward: bool,
    #[serde(rename = "isLeft")]
    pub is_left: bool,
    #[serde(rename = "isRight")]
    pub is_right: bool,
    #[serde(rename = "isJumping")]
    pub is_jumping: bool,
    #[serde(rename = "isRunning")]
    pub is_running: bool,
    #[serde(rename = "isSitted")]
    pub is_sitted: bool,
    #[serde(rename = "isSittedAndWalk")]
    pub is_sitted_and_walk: bool,
    #[serde(rename = "isLyingDown")]
    pub is_lying_down: bool,
    #[serde(rename = "isLyingDownAndWalk")]
    pub is_lying_down_and_walk: bool,
    #[serde(rename = "isPunching")]
    pub is_punching: bool,
    #[serde(rename = "isHitted")]
    pub is_hitted: bool,
    #[serde(rename = "isIdle")]
    pub is_idle: bool,
    #[serde(rename = "isDead")]
    pub is_dead: bool,
}

impl AnimationState {
    /// The only state a dead player ever publishes.
    pub fn dead() -> Self {
        Self {
            is_dead: true,
            ..Default::default()
        }
    }

    pub fn idle() -> Self {
        Self {
            is_idle: true,
            ..Default::default()
        }
    }

    pub fn is_moving(&self) -> bool {
        self.is_walking || self.is_backward || self.is_left || self.is_right
    }
}

// ---------------------------------------------------------------------------
// Clips
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnimationClip {
    Dead,
    Hit,
    Punching,
    Jump,
    Run,
    SneakWalk,
    Crawl,
    WalkForward,
    Crouch,
    LieDown,
    Idle,
}

impl AnimationClip {
    /// Clip name inside the character asset.
    pub fn name(self) -> &'static str {
        match self {
            AnimationClip::Dead => "Death",
            AnimationClip::Hit => "Hit",
            AnimationClip::Punching => "Punching",
            AnimationClip::Jump => "Jump",
            AnimationClip::Run => "Run",
            AnimationClip::SneakWalk => "SneakWalk",
            AnimationClip::Crawl => "Crawl",
            AnimationClip::WalkForward => "WalkForward",
            AnimationClip::Crouch => "Crouch",
            AnimationClip::LieDown => "LieDown",
            AnimationClip::Idle => "Idle",
        }
    }

    /// One-shot clips play once and hand back to the selected loop.
    pub fn is_one_shot(self) -> bool {
        matches!(self, AnimationClip::Hit)
    }
}

type ClipRule = (fn(&AnimationState) -> bool, AnimationClip);

/// First matching predicate wins.  `Idle` is the fallback.
pub const CLIP_PRIORITY: &[ClipRule] = &[
    (|s: &AnimationState| s.is_dead, AnimationClip::Dead),
    (|s: &AnimationState| s.is_hitted, AnimationClip::Hit),
    (|s: &AnimationState| s.is_punching, AnimationClip::Punching),
    (|s: &AnimationState| s.is_jumping, AnimationClip::Jump),
    (|s: &AnimationState| s.is_running, AnimationClip::Run),
    (|s: &AnimationState| s.is_sitted_and_walk, AnimationClip::SneakWalk),
    (|s: &AnimationState| s.is_lying_down_and_walk, AnimationClip::Crawl),
    (|s: &AnimationState| s.is_moving(), AnimationClip::WalkForward),
    (|s: &AnimationState| s.is_sitted, AnimationClip::Crouch),
    (|s: &AnimationState| s.is_lying_down, AnimationClip::LieDown),
];

pub fn select_clip(state: &AnimationState) -> AnimationClip {
    CLIP_PRIORITY
        .iter()
        .find(|(matches, _)| matches(state))
        .map(|(_, clip)| *clip)
        .unwrap_or(AnimationClip::Idle)
}

// ---------------------------------------------------------------------------
// Character variants
// ---------------------------------------------------------------------------

/// Skins differ only by asset; clip logic is shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacterVariant {
    pub asset_path: String,
}

impl CharacterVariant {
    pub fn new(asset_path: impl Into<String>) -> Self {
        Self {
            asset_path: asset_path.into(),
        }
    }
}

impl Default for CharacterVariant {
    fn default() -> Self {
        Self::new("models/character.glb")
    }
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

/// Tracks which clip a character is playing.
///
/// The hit reaction is a timed one-shot: once entered it plays for
/// `hit_duration` seconds regardless of the flags, then control returns to
/// whatever the table selects.
#[derive(Debug, Clone)]
pub struct AnimationDriver {
    variant: CharacterVariant,
    current: AnimationClip,
    one_shot: Countdown,
    hit_duration: f32,
    hit_consumed: bool,
}

impl AnimationDriver {
    pub fn new(variant: CharacterVariant, hit_duration: f32) -> Self {
        Self {
            variant,
            current: AnimationClip::Idle,
            one_shot: Countdown::idle(),
            hit_duration,
            hit_consumed: false,
        }
    }

    pub fn variant(&self) -> &CharacterVariant {
        &self.variant
    }

    pub fn current(&self) -> AnimationClip {
        self.current
    }

    /// Advance by `dt` and return the clip to show, plus whether it changed.
    pub fn update(&mut self, state: &AnimationState, dt: f32) -> (AnimationClip, bool) {
        self.one_shot.tick(dt);

        // A raised hit flag plays the reaction once, not once per tick.
        if !state.is_hitted {
            self.hit_consumed = false;
        }
        let mut effective = *state;
        if self.hit_consumed {
            effective.is_hitted = false;
        }
        let wanted = select_clip(&effective);

        // Death always interrupts.
        if self.one_shot.is_active() && wanted != AnimationClip::Dead {
            return (self.current, false);
        }

        let changed = wanted != self.current;
        if changed {
            self.current = wanted;
            if wanted.is_one_shot() {
                self.one_shot.start(self.hit_duration);
                self.hit_consumed = true;
            } else {
                self.one_shot.cancel();
            }
        }
        (self.current, changed)
    }
}
