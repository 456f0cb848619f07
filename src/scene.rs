//! Shared scene props (balls, crates).
//!
//! Any client may publish prop positions; the last write wins.  Inbound
//! updates are merged by id: a known prop only takes the new position, an
//! unseen one is created with defaults for whatever the update omits.

use std::collections::BTreeMap;

use crate::protocol::{ObjectPosition, SceneObjectUpdate};
use crate::types::Vec3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropShape {
    Sphere,
    Box,
}

impl PropShape {
    fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("box") => PropShape::Box,
            Some("sphere") | None => PropShape::Sphere,
            Some(other) => {
                log::debug!("[scene] Unknown prop type '{}', using sphere", other);
                PropShape::Sphere
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropCollider {
    Ball,
    Cuboid,
}

impl PropCollider {
    fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("cuboid") => PropCollider::Cuboid,
            _ => PropCollider::Ball,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneObject {
    pub id: String,
    pub position: Vec3,
    pub shape: PropShape,
    /// Box extents; only meaningful for [`PropShape::Box`].
    pub size: Option<Vec3>,
    pub radius: f32,
    pub color: String,
    pub collider: PropCollider,
}

impl SceneObject {
    pub const DEFAULT_RADIUS: f32 = 1.0;
    pub const DEFAULT_COLOR: &'static str = "gray";

    fn from_update(update: SceneObjectUpdate) -> Self {
        Self {
            shape: PropShape::parse(update.kind.as_deref()),
            collider: PropCollider::parse(update.collider.as_deref()),
            radius: update
                .radius
                .filter(|r| *r > 0.0)
                .unwrap_or(Self::DEFAULT_RADIUS),
            color: update
                .color
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| Self::DEFAULT_COLOR.to_string()),
            size: update.size,
            position: update.position,
            id: update.id,
        }
    }
}

/// Outbound body for `/app/sceneObjects`; `None` when there is nothing to
/// send.
pub fn publish_object_positions(objects: &[ObjectPosition]) -> Option<Vec<ObjectPosition>> {
    if objects.is_empty() {
        None
    } else {
        Some(objects.to_vec())
    }
}

#[derive(Debug, Default)]
pub struct SceneObjectSync {
    objects: BTreeMap<String, SceneObject>,
}

impl SceneObjectSync {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a batch from `/topic/sceneObjects`.
    pub fn on_object_update(&mut self, updates: Vec<SceneObjectUpdate>) {
        for update in updates {
            match self.objects.get_mut(&update.id) {
                Some(existing) => existing.position = update.position,
                None => {
                    let obj = SceneObject::from_update(update);
                    log::debug!("[scene] New prop {} at {}", obj.id, obj.position);
                    self.objects.insert(obj.id.clone(), obj);
                }
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&SceneObject> {
        self.objects.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SceneObject> {
        self.objects.values()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(id: &str, x: f32) -> SceneObjectUpdate {
        SceneObjectUpdate {
            id: id.into(),
            position: Vec3::new(x, 0.0, 0.0),
            kind: None,
            size: None,
            radius: None,
            color: None,
            collider: None,
        }
    }

    #[test]
    fn unseen_prop_gets_defaults() {
        let mut sync = SceneObjectSync::new();
        sync.on_object_update(vec![update("ball", 1.0)]);
        let obj = sync.get("ball").unwrap();
        assert_eq!(obj.shape, PropShape::Sphere);
        assert_eq!(obj.radius, 1.0);
        assert_eq!(obj.color, "gray");
        assert_eq!(obj.collider, PropCollider::Ball);
    }

    #[test]
    fn known_prop_only_moves() {
        let mut sync = SceneObjectSync::new();
        sync.on_object_update(vec![SceneObjectUpdate {
            kind: Some("box".into()),
            color: Some("red".into()),
            collider: Some("cuboid".into()),
            size: Some(Vec3::new(1.0, 2.0, 1.0)),
            ..update("crate", 0.0)
        }]);
        sync.on_object_update(vec![SceneObjectUpdate {
            color: Some("blue".into()),
            ..update("crate", 4.0)
        }]);

        let obj = sync.get("crate").unwrap();
        assert_eq!(obj.position.x, 4.0);
        assert_eq!(obj.color, "red");
        assert_eq!(obj.shape, PropShape::Box);
        assert_eq!(obj.collider, PropCollider::Cuboid);
    }

    #[test]
    fn last_write_wins_within_a_batch() {
        let mut sync = SceneObjectSync::new();
        sync.on_object_update(vec![update("ball", 1.0), update("ball", 2.0)]);
        assert_eq!(sync.get("ball").unwrap().position.x, 2.0);
        assert_eq!(sync.len(), 1);
    }

    #[test]
    fn nothing_to_publish_when_empty() {
        assert!(publish_object_positions(&[]).is_none());
        let one = [ObjectPosition {
            id: "ball".into(),
            position: Vec3::zero(),
        }];
        assert_eq!(publish_object_positions(&one).unwrap().len(), 1);
    }
}
