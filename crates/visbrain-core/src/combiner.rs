//! Ordered, name-indexed collections of objects of one type.
//!
//! A [`Combiner`] keeps objects in insertion order, rejects duplicate names,
//! tracks a "current" member and forwards uniform operations (visibility,
//! parent, camera) to its members. It is itself an object, so a whole
//! combiner can be placed in a subplot.

use std::fmt;
use std::ops::Index;

use glam::{Mat4, Vec3};

use crate::color_state::SharedColorState;
use crate::error::{Result, VisbrainError};
use crate::object::{NodeId, ObjectNode, VisbrainObject};
use crate::primitive::{Primitive, RenderContext};
use crate::view::ViewPreset;

/// Lookup key for a combiner member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectKey<'a> {
    Index(usize),
    Name(&'a str),
}

impl From<usize> for ObjectKey<'_> {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl<'a> From<&'a str> for ObjectKey<'a> {
    fn from(name: &'a str) -> Self {
        Self::Name(name)
    }
}

/// An ordered mapping `name -> object` restricted to one object type.
pub struct Combiner<T: VisbrainObject> {
    node: ObjectNode,
    objects: Vec<T>,
    selected: Option<usize>,
}

impl<T: VisbrainObject> Combiner<T> {
    /// Creates an empty combiner.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        Ok(Self {
            node: ObjectNode::new(name)?,
            objects: Vec::new(),
            selected: None,
        })
    }

    /// Creates a combiner from objects, in order.
    pub fn from_objects(name: impl Into<String>, objects: impl IntoIterator<Item = T>) -> Result<Self> {
        let mut combiner = Self::new(name)?;
        for obj in objects {
            combiner.append(obj)?;
        }
        Ok(combiner)
    }

    /// Appends an object. Returns an error if the name is already taken.
    pub fn append(&mut self, obj: T) -> Result<()> {
        if self.position(obj.name()).is_some() {
            return Err(VisbrainError::ObjectExists(obj.name().to_string()));
        }
        log::debug!("combiner '{}': append '{}'", self.node.name(), obj.name());
        self.objects.push(obj);
        if self.selected.is_none() {
            self.selected = Some(0);
        }
        Ok(())
    }

    /// Removes an object by name, keeping the order of the others.
    pub fn remove(&mut self, name: &str) -> Option<T> {
        let idx = self.position(name)?;
        let removed = self.objects.remove(idx);
        self.selected = match self.selected {
            Some(s) if s == idx => (!self.objects.is_empty()).then_some(0),
            Some(s) if s > idx => Some(s - 1),
            other => other,
        };
        Some(removed)
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.objects.iter().position(|o| o.name() == name)
    }

    fn resolve(&self, key: &ObjectKey<'_>) -> Option<usize> {
        match key {
            ObjectKey::Index(i) => (*i < self.objects.len()).then_some(*i),
            ObjectKey::Name(name) => self.position(name),
        }
    }

    /// Looks up an object by index or name.
    pub fn get<'k>(&self, key: impl Into<ObjectKey<'k>>) -> Option<&T> {
        self.resolve(&key.into()).map(|i| &self.objects[i])
    }

    /// Mutable lookup by index or name.
    pub fn get_mut<'k>(&mut self, key: impl Into<ObjectKey<'k>>) -> Option<&mut T> {
        self.resolve(&key.into()).map(move |i| &mut self.objects[i])
    }

    /// Makes `name` the current object.
    pub fn select(&mut self, name: &str) -> Result<()> {
        let idx = self
            .position(name)
            .ok_or_else(|| VisbrainError::ObjectNotFound(name.to_string()))?;
        self.selected = Some(idx);
        Ok(())
    }

    /// The current object.
    pub fn get_selected_object(&self) -> Option<&T> {
        self.selected.map(|i| &self.objects[i])
    }

    /// Mutable access to the current object.
    pub fn get_selected_object_mut(&mut self) -> Option<&mut T> {
        self.selected.map(move |i| &mut self.objects[i])
    }

    /// Names in insertion order.
    pub fn get_list_of_objects(&self) -> Vec<&str> {
        self.objects.iter().map(VisbrainObject::name).collect()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.objects.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.objects.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

/// # Panics
///
/// Panics when `index` is out of range. Use [`Combiner::get`] to get an
/// `Option` instead.
impl<T: VisbrainObject> Index<usize> for Combiner<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        &self.objects[index]
    }
}

/// # Panics
///
/// Panics when no object is named `name`. Use [`Combiner::get`] to get an
/// `Option` instead.
impl<T: VisbrainObject> Index<&str> for Combiner<T> {
    type Output = T;

    fn index(&self, name: &str) -> &T {
        match self.get(name) {
            Some(obj) => obj,
            None => panic!("no object named '{name}' in combiner '{}'", self.node.name()),
        }
    }
}

impl<'a, T: VisbrainObject> IntoIterator for &'a Combiner<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.objects.iter()
    }
}

impl<T: VisbrainObject> fmt::Display for Combiner<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get_list_of_objects().join(" + "))
    }
}

/// Applies a parent transform before forwarding to another context.
struct ParentTransform<'a> {
    inner: &'a mut dyn RenderContext,
    parent: Mat4,
}

impl RenderContext for ParentTransform<'_> {
    fn submit(&mut self, primitive: Primitive<'_>, model: Mat4) {
        self.inner.submit(primitive, self.parent * model);
    }
}

impl<T: VisbrainObject> VisbrainObject for Combiner<T> {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }

    fn node(&self) -> &ObjectNode {
        &self.node
    }

    fn node_mut(&mut self) -> &mut ObjectNode {
        &mut self.node
    }

    fn type_name(&self) -> &'static str {
        "Combiner"
    }

    fn bounding_box(&self) -> Option<(Vec3, Vec3)> {
        self.objects
            .iter()
            .filter_map(VisbrainObject::world_bounding_box)
            .reduce(|(amin, amax), (bmin, bmax)| (amin.min(bmin), amax.max(bmax)))
    }

    fn render(&self, ctx: &mut dyn RenderContext) {
        if !self.node.visible() {
            return;
        }
        let mut chained = ParentTransform {
            inner: ctx,
            parent: self.node.transform(),
        };
        for obj in self.objects.iter().filter(|o| o.visible_obj()) {
            obj.render(&mut chained);
        }
    }

    fn preferred_view(&self) -> ViewPreset {
        self.objects
            .first()
            .map(VisbrainObject::preferred_view)
            .unwrap_or_default()
    }

    fn color_state(&self) -> Option<SharedColorState> {
        self.get_selected_object().and_then(VisbrainObject::color_state)
    }

    fn set_visible_obj(&mut self, visible: bool) {
        self.node.set_visible(visible);
        for obj in &mut self.objects {
            obj.set_visible_obj(visible);
        }
    }

    fn set_parent(&mut self, parent: Option<NodeId>) {
        self.node.set_parent(parent);
        for obj in &mut self.objects {
            obj.set_parent(parent);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitive::RecordingContext;
    use proptest::prelude::*;

    struct Dummy {
        node: ObjectNode,
    }

    impl Dummy {
        fn new(name: &str) -> Self {
            Self {
                node: ObjectNode::new(name).unwrap(),
            }
        }
    }

    impl VisbrainObject for Dummy {
        fn as_any(&self) -> &dyn std::any::Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
            self
        }
        fn node(&self) -> &ObjectNode {
            &self.node
        }
        fn node_mut(&mut self) -> &mut ObjectNode {
            &mut self.node
        }
        fn type_name(&self) -> &'static str {
            "Dummy"
        }
        fn bounding_box(&self) -> Option<(Vec3, Vec3)> {
            Some((Vec3::ZERO, Vec3::ONE))
        }
        fn render(&self, ctx: &mut dyn RenderContext) {
            ctx.submit(
                Primitive::Text {
                    position: Vec3::ZERO,
                    text: self.name().into(),
                    color: glam::Vec4::ONE,
                    size: 1.0,
                    bold: false,
                },
                self.transform(),
            );
        }
    }

    #[test]
    fn test_append_rejects_duplicates() {
        let mut c = Combiner::new("sources").unwrap();
        c.append(Dummy::new("a")).unwrap();
        assert!(matches!(
            c.append(Dummy::new("a")),
            Err(VisbrainError::ObjectExists(name)) if name == "a"
        ));
        assert_eq!(c.len(), 1);
    }

    #[test]
    fn test_lookup_by_index_and_name() {
        let c = Combiner::from_objects("c", [Dummy::new("a"), Dummy::new("b")]).unwrap();
        assert_eq!(c.get(1).unwrap().name(), "b");
        assert_eq!(c.get("a").unwrap().name(), "a");
        assert!(c.get(5).is_none());
        assert!(c.get("zzz").is_none());
        assert_eq!(c[0].name(), "a");
        assert_eq!(c["b"].name(), "b");
    }

    #[test]
    #[should_panic(expected = "no object named 'zzz'")]
    fn test_index_unknown_name_panics() {
        let c = Combiner::from_objects("c", [Dummy::new("a")]).unwrap();
        let _ = &c["zzz"];
    }

    #[test]
    fn test_select() {
        let mut c = Combiner::from_objects("c", [Dummy::new("a"), Dummy::new("b")]).unwrap();
        assert_eq!(c.get_selected_object().unwrap().name(), "a");
        c.select("b").unwrap();
        assert_eq!(c.get_selected_object().unwrap().name(), "b");
        assert!(c.select("nope").is_err());
        c.remove("b");
        assert_eq!(c.get_selected_object().unwrap().name(), "a");
    }

    #[test]
    fn test_display_joins_names() {
        let c = Combiner::from_objects("c", [Dummy::new("a"), Dummy::new("b"), Dummy::new("c")]).unwrap();
        assert_eq!(c.to_string(), "a + b + c");
    }

    #[test]
    fn test_forwarding() {
        let mut c = Combiner::from_objects("c", [Dummy::new("a"), Dummy::new("b")]).unwrap();
        c.set_parent(Some(NodeId(7)));
        c.set_visible_obj(false);
        assert!(c.iter().all(|o| o.parent() == Some(NodeId(7)) && !o.visible_obj()));

        c.set_visible_obj(true);
        c.set_transform(Mat4::from_scale(Vec3::splat(3.0)));
        let mut ctx = RecordingContext::default();
        c.render(&mut ctx);
        assert_eq!(ctx.submitted.len(), 2);
        assert_eq!(ctx.submitted[0].1, Mat4::from_scale(Vec3::splat(3.0)));
    }

    proptest! {
        #[test]
        fn prop_iteration_follows_insertion(names in proptest::collection::hash_set("[a-z]{1,6}", 1..12)) {
            let names: Vec<String> = names.into_iter().collect();
            let mut c = Combiner::new("c").unwrap();
            for name in &names {
                c.append(Dummy::new(name)).unwrap();
            }
            let iterated: Vec<&str> = c.iter().map(VisbrainObject::name).collect();
            prop_assert_eq!(&iterated, &c.get_list_of_objects());
            prop_assert_eq!(iterated, names.iter().map(String::as_str).collect::<Vec<_>>());
        }
    }
}
