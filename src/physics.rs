//! Physics seam for the local player body.
//!
//! The controller only needs to read/write the body's translation and linear
//! velocity, apply an impulse, and learn about ground contacts.  A real
//! engine implements [`PhysicsBody`]; [`KinematicBody`] is a minimal
//! stand-in (gravity plus a flat floor) for headless clients and tests.

use crate::types::Vec3;

/// Contact transitions reported after a physics step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactEvent {
    Enter,
    Exit,
}

pub trait PhysicsBody: Send {
    fn translation(&self) -> Vec3;
    fn set_translation(&mut self, position: Vec3);
    fn linvel(&self) -> Vec3;
    fn set_linvel(&mut self, velocity: Vec3);
    /// Instantaneous velocity change scaled by the body's mass.
    fn apply_impulse(&mut self, impulse: Vec3);
    /// Integrate `dt` seconds and return contact transitions.
    fn step(&mut self, dt: f32) -> Vec<ContactEvent>;
}

// ---------------------------------------------------------------------------
// KinematicBody
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct KinematicBody {
    position: Vec3,
    velocity: Vec3,
    mass: f32,
    gravity: f32,
    /// Body origin height when resting on the floor.
    rest_height: f32,
    in_contact: bool,
}

impl KinematicBody {
    /// Capsule of half-height 0.35 + radius 0.4 resting on `y = 0`.
    pub const CAPSULE_REST_HEIGHT: f32 = 0.75;

    pub fn new(position: Vec3) -> Self {
        Self {
            position,
            velocity: Vec3::zero(),
            mass: 1.0,
            gravity: 9.81,
            rest_height: Self::CAPSULE_REST_HEIGHT,
            in_contact: false,
        }
    }

    pub fn is_in_contact(&self) -> bool {
        self.in_contact
    }
}

impl PhysicsBody for KinematicBody {
    fn translation(&self) -> Vec3 {
        self.position
    }

    fn set_translation(&mut self, position: Vec3) {
        self.position = position;
    }

    fn linvel(&self) -> Vec3 {
        self.velocity
    }

    fn set_linvel(&mut self, velocity: Vec3) {
        self.velocity = velocity;
    }

    fn apply_impulse(&mut self, impulse: Vec3) {
        self.velocity += impulse * (1.0 / self.mass);
    }

    fn step(&mut self, dt: f32) -> Vec<ContactEvent> {
        let mut events = Vec::new();

        self.velocity.y -= self.gravity * dt;
        self.position += self.velocity * dt;

        if self.position.y <= self.rest_height {
            self.position.y = self.rest_height;
            if self.velocity.y < 0.0 {
                self.velocity.y = 0.0;
            }
            if !self.in_contact {
                self.in_contact = true;
                events.push(ContactEvent::Enter);
            }
        } else if self.in_contact && self.velocity.y > 0.0 {
            self.in_contact = false;
            events.push(ContactEvent::Exit);
        }

        events
    }
}
