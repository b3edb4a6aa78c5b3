//! The visualization object trait.
//!
//! A [`VisbrainObject`] is a first-class thing in a scene: a brain mesh, a
//! set of sources, a colorbar... Objects own an [`ObjectNode`] (name,
//! visibility, transform, parent) and expose a small capability set:
//! rendering, a preferred camera, a color state for colorbars, and a JSON
//! description.

use std::any::Any;

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

use crate::color_state::SharedColorState;
use crate::error::{Result, VisbrainError};
use crate::primitive::RenderContext;
use crate::view::ViewPreset;

/// Identifier of a node owned by a scene. Objects only keep the id of their
/// parent, never the parent itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

/// Scene-graph state every object carries.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectNode {
    name: String,
    visible: bool,
    transform: Mat4,
    parent: Option<NodeId>,
}

impl ObjectNode {
    /// Creates a visible, unparented node. The name must be non-empty.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(VisbrainError::invalid("object name must be non-empty"));
        }
        Ok(Self {
            name,
            visible: true,
            transform: Mat4::IDENTITY,
            parent: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub fn transform(&self) -> Mat4 {
        self.transform
    }

    pub fn set_transform(&mut self, transform: Mat4) {
        self.transform = transform;
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn set_parent(&mut self, parent: Option<NodeId>) {
        self.parent = parent;
    }
}

/// A visualization object that can be placed in a scene.
pub trait VisbrainObject: Any {
    /// Returns a reference to self as `Any` for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Returns a mutable reference to self as `Any` for downcasting.
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// The scene-graph node of this object.
    fn node(&self) -> &ObjectNode;

    /// Mutable access to the scene-graph node.
    fn node_mut(&mut self) -> &mut ObjectNode;

    /// Returns the type name of this object (e.g. "`BrainObj`").
    fn type_name(&self) -> &'static str;

    /// Axis-aligned bounding box in object coordinates (before transform).
    fn bounding_box(&self) -> Option<(Vec3, Vec3)>;

    /// Emits this object's primitives.
    fn render(&self, ctx: &mut dyn RenderContext);

    /// The camera this object prefers.
    fn preferred_view(&self) -> ViewPreset {
        ViewPreset::default()
    }

    /// The color state a colorbar should mirror, if the object has one.
    fn color_state(&self) -> Option<SharedColorState> {
        None
    }

    /// Returns the unique name of this object.
    fn name(&self) -> &str {
        self.node().name()
    }

    /// Returns whether this object is currently visible.
    fn visible_obj(&self) -> bool {
        self.node().visible()
    }

    /// Sets the visibility of this object.
    fn set_visible_obj(&mut self, visible: bool) {
        self.node_mut().set_visible(visible);
    }

    /// Returns the parent node, if attached to a scene.
    fn parent(&self) -> Option<NodeId> {
        self.node().parent()
    }

    /// Attaches the object under `parent` (or detaches it).
    fn set_parent(&mut self, parent: Option<NodeId>) {
        self.node_mut().set_parent(parent);
    }

    /// Returns the current model transform matrix.
    fn transform(&self) -> Mat4 {
        self.node().transform()
    }

    /// Sets the model transform matrix.
    fn set_transform(&mut self, transform: Mat4) {
        self.node_mut().set_transform(transform);
    }

    /// Bounding box after applying the object transform.
    fn world_bounding_box(&self) -> Option<(Vec3, Vec3)> {
        let (min, max) = self.bounding_box()?;
        Some(transform_box(self.transform(), min, max))
    }

    /// JSON description: name, type, visibility and color attributes.
    fn describe(&self) -> serde_json::Value {
        let color = self
            .color_state()
            .and_then(|state| serde_json::to_value(&*state.borrow()).ok());
        serde_json::json!({
            "name": self.name(),
            "type": self.type_name(),
            "visible": self.visible_obj(),
            "color": color,
        })
    }
}

/// Transforms the 8 corners of a box and returns their bounds.
pub fn transform_box(transform: Mat4, min: Vec3, max: Vec3) -> (Vec3, Vec3) {
    let mut world_min = Vec3::splat(f32::MAX);
    let mut world_max = Vec3::splat(f32::MIN);
    for i in 0..8 {
        let corner = Vec3::new(
            if i & 1 == 0 { min.x } else { max.x },
            if i & 2 == 0 { min.y } else { max.y },
            if i & 4 == 0 { min.z } else { max.z },
        );
        let p = transform.transform_point3(corner);
        world_min = world_min.min(p);
        world_max = world_max.max(p);
    }
    (world_min, world_max)
}

/// Downcasts a boxed object to a concrete type.
pub fn downcast_ref<T: VisbrainObject>(obj: &dyn VisbrainObject) -> Option<&T> {
    obj.as_any().downcast_ref::<T>()
}

/// Mutable version of [`downcast_ref`].
pub fn downcast_mut<T: VisbrainObject>(obj: &mut dyn VisbrainObject) -> Option<&mut T> {
    obj.as_any_mut().downcast_mut::<T>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_requires_name() {
        assert!(ObjectNode::new("").is_err());
        assert!(ObjectNode::new("   ").is_err());
        let node = ObjectNode::new("brain").unwrap();
        assert!(node.visible());
        assert_eq!(node.parent(), None);
        assert_eq!(node.transform(), Mat4::IDENTITY);
    }

    #[test]
    fn test_transform_box() {
        let t = Mat4::from_scale(Vec3::splat(2.0));
        let (min, max) = transform_box(t, Vec3::splat(-1.0), Vec3::ONE);
        assert_eq!(min, Vec3::splat(-2.0));
        assert_eq!(max, Vec3::splat(2.0));
    }
}
