//! Arena Sync
//!
//! Client-side state synchronisation for a browser-style 3D multiplayer
//! brawler.  Each client owns its own body, publishes a snapshot every tick
//! to a STOMP relay, and mirrors everyone else from the relay's broadcasts.
//!
//! ## Architecture
//!
//! ```text
//! GameSession  (session.rs)            ← the tick; only mutator of game state
//!   ├── LocalPlayerController  (controller.rs)
//!   │     ├── PhysicsBody      (physics.rs)
//!   │     └── hit_cone         (combat.rs)
//!   ├── RemotePlayerRegistry   (registry.rs)
//!   ├── CombatState            (combat.rs)
//!   ├── SceneObjectSync        (scene.rs)
//!   ├── AnimationDriver        (animation.rs)
//!   └── dyn RelayLink          (link.rs)
//!         ├── TransportSession (transport.rs, `net`) ← bridge thread, STOMP over WebSocket
//!         └── MemoryLink       (link.rs)             ← in-process loopback
//! ```
//!
//! `IdentityStore` (identity.rs) supplies the persistent player id and
//! nickname before a session starts.

// Protocol, simulation and identity are always available.
pub mod animation;
pub mod combat;
pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod identity;
pub mod link;
pub mod physics;
pub mod protocol;
pub mod registry;
pub mod scene;
pub mod session;
pub mod stomp;
pub mod timer;
pub mod types;

// The WebSocket transport requires the `net` feature.
#[cfg(feature = "net")]
pub mod transport;

pub use animation::{AnimationClip, AnimationDriver, AnimationState, CharacterVariant};
pub use combat::{hit_cone, CombatOutcome, CombatState};
pub use crate::config::SyncConfig;
pub use controller::{CameraPose, InputState, LocalPlayerController, ViewMode};
pub use error::{NicknameError, Result, SyncError};
pub use events::RelayEvent;
pub use identity::{Identity, IdentityStore};
pub use link::{MemoryLink, RelayLink};
pub use physics::{KinematicBody, PhysicsBody};
pub use protocol::{CombatEvent, ObjectPosition, PlayerSnapshot};
pub use registry::RemotePlayerRegistry;
pub use scene::SceneObjectSync;
pub use session::{Frame, GameSession, HudState, TickInput};
#[cfg(feature = "net")]
pub use transport::{TransportConfig, TransportSession};
pub use types::{PlayerId, Vec3};
