//! Tick-driven countdowns.
//!
//! Gameplay timers (punch animation, cooldowns, hit flags, respawn) are
//! advanced by the frame `dt` instead of wall-clock callbacks, so they only
//! ever fire inside a tick and die with their owner.

use std::time::Duration;

/// A one-shot countdown in seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Countdown {
    remaining: Option<f32>,
    total: f32,
}

impl Countdown {
    pub fn idle() -> Self {
        Self::default()
    }

    pub fn running(seconds: f32) -> Self {
        let mut c = Self::idle();
        c.start(seconds);
        c
    }

    /// (Re)start from the full duration.
    pub fn start(&mut self, seconds: f32) {
        self.total = seconds.max(0.0);
        self.remaining = Some(self.total);
    }

    pub fn start_ms(&mut self, ms: u64) {
        self.start(Duration::from_millis(ms).as_secs_f32());
    }

    pub fn cancel(&mut self) {
        self.remaining = None;
    }

    pub fn is_active(&self) -> bool {
        self.remaining.is_some()
    }

    /// Advance by `dt`.  Returns `true` exactly once, on the tick the
    /// countdown reaches zero.
    pub fn tick(&mut self, dt: f32) -> bool {
        match self.remaining {
            Some(left) => {
                let left = left - dt.max(0.0);
                if left <= 0.0 {
                    self.remaining = None;
                    true
                } else {
                    self.remaining = Some(left);
                    false
                }
            }
            None => false,
        }
    }

    /// Fraction elapsed in `[0, 1]`; `0` when idle.
    pub fn progress(&self) -> f32 {
        match self.remaining {
            Some(_) if self.total <= 0.0 => 1.0,
            Some(left) => (1.0 - left / self.total).clamp(0.0, 1.0),
            None => 0.0,
        }
    }

    /// Seconds left, `0` when idle.
    pub fn remaining(&self) -> f32 {
        self.remaining.unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_once_at_expiry() {
        let mut c = Countdown::running(0.5);
        assert!(!c.tick(0.2));
        assert!(!c.tick(0.2));
        assert!(c.tick(0.2));
        assert!(!c.is_active());
        assert!(!c.tick(0.2));
    }

    #[test]
    fn restart_extends_deadline() {
        let mut c = Countdown::running(0.5);
        c.tick(0.4);
        c.start(0.5);
        assert!(!c.tick(0.4));
        assert!(c.tick(0.2));
    }

    #[test]
    fn cancelled_countdown_never_fires() {
        let mut c = Countdown::idle();
        c.start_ms(100);
        c.cancel();
        assert!(!c.tick(1.0));
        assert_eq!(c.progress(), 0.0);
    }

    #[test]
    fn progress_tracks_elapsed_fraction() {
        let mut c = Countdown::running(5.0);
        c.tick(2.5);
        assert!((c.progress() - 0.5).abs() < 1e-5);
        assert!((c.remaining() - 2.5).abs() < 1e-5);
    }
}
