// Copyright 2026 the Softmask Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Auxiliary masking shapes.
//!
//! A shape is an extra clip region drawn into its owning mask's channel after
//! the mask's own graphic. Additive shapes widen the mask, subtractive shapes
//! punch holes into it.

use alloc::vec::Vec;
use core::cmp::Ordering;

use hashbrown::HashMap;
use kurbo::{Point, Rect};

use super::config::SoftnessRange;
use super::id::{MaskId, ShapeId};
use crate::hierarchy::{ElementId, Hierarchy, compare_hierarchy_order};
use crate::mesh::{Vertex, mesh_bounds};
use crate::resource::TextureId;

/// How a shape combines with its mask's channel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ShapeMethod {
    /// Writes coverage into the channel.
    #[default]
    Additive,
    /// Writes inverted coverage into the channel.
    Subtract,
}

/// An auxiliary shape registered with a mask node.
#[derive(Clone, Debug, PartialEq)]
pub struct MaskingShape {
    /// Host element providing the shape's graphic.
    pub element: ElementId,
    /// Combination method.
    pub method: ShapeMethod,
    /// Shape-local softness override.
    pub softness: SoftnessRange,
    /// Whether raycasts also require the shape texture's alpha.
    pub alpha_hit_test: bool,
    /// Whether the shape's source graphic stays visible.
    pub show_source_graphic: bool,
    /// Explicit draw depth from the host, if it has one.
    pub draw_depth: Option<i32>,
    /// Screen-space bounds.
    pub bounds: Rect,
    /// Captured mesh.
    pub mesh: Vec<Vertex>,
    /// Source texture.
    pub texture: Option<TextureId>,
}

impl MaskingShape {
    /// Creates an additive shape with default overrides and no geometry.
    #[must_use]
    pub fn new(element: ElementId, method: ShapeMethod) -> Self {
        Self {
            element,
            method,
            softness: SoftnessRange::FULL,
            alpha_hit_test: false,
            show_source_graphic: false,
            draw_depth: None,
            bounds: Rect::ZERO,
            mesh: Vec::new(),
            texture: None,
        }
    }

    /// Replaces the captured mesh. A non-empty mesh also replaces the bounds
    /// with the vertices' bounding box.
    pub fn set_mesh(&mut self, vertices: &[Vertex]) {
        self.mesh.clear();
        self.mesh.extend_from_slice(vertices);
        if let Some(bounds) = mesh_bounds(vertices) {
            self.bounds = bounds;
        }
    }

    /// Geometric inside test against the screen-space bounds.
    #[must_use]
    pub fn contains(&self, point: Point) -> bool {
        self.bounds.contains(point)
    }
}

#[derive(Debug)]
struct ShapeSlot {
    generation: u32,
    owner: Option<MaskId>,
    shape: Option<MaskingShape>,
}

/// Per-mask ordered collections of [`MaskingShape`]s.
#[derive(Debug, Default)]
pub struct ShapeRegistry {
    slots: Vec<ShapeSlot>,
    free_list: Vec<u32>,
    by_mask: HashMap<MaskId, Vec<ShapeId>>,
    by_element: HashMap<ElementId, ShapeId>,
}

impl ShapeRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `shape` with `owner` and returns its handle. The shape is
    /// appended; call [`sort`](Self::sort) to restore compositing order. An
    /// unowned shape is kept until [`reassign`](Self::reassign) gives it a
    /// mask.
    ///
    /// # Panics
    ///
    /// Panics if the shape's element already has a registered shape.
    pub fn register(&mut self, owner: Option<MaskId>, shape: MaskingShape) -> ShapeId {
        assert!(
            !self.by_element.contains_key(&shape.element),
            "element {:?} already has a masking shape",
            shape.element
        );
        let element = shape.element;
        let id = if let Some(idx) = self.free_list.pop() {
            let slot = &mut self.slots[idx as usize];
            slot.generation += 1;
            slot.owner = owner;
            slot.shape = Some(shape);
            ShapeId {
                idx,
                generation: slot.generation,
            }
        } else {
            let idx = u32::try_from(self.slots.len()).unwrap_or(u32::MAX - 1);
            self.slots.push(ShapeSlot {
                generation: 0,
                owner,
                shape: Some(shape),
            });
            ShapeId { idx, generation: 0 }
        };
        if let Some(mask) = owner {
            self.by_mask.entry(mask).or_default().push(id);
        }
        self.by_element.insert(element, id);
        id
    }

    /// Removes a shape, returning its former owner and data. Returns `None`
    /// for a stale handle.
    pub fn unregister(&mut self, id: ShapeId) -> Option<(Option<MaskId>, MaskingShape)> {
        let slot = self.slot_mut(id)?;
        let shape = slot.shape.take()?;
        let owner = slot.owner.take();
        slot.generation += 1;
        self.free_list.push(id.idx);
        if let Some(owner) = owner {
            self.detach(owner, id);
        }
        self.by_element.remove(&shape.element);
        Some((owner, shape))
    }

    /// Moves a shape to `new_owner` (or leaves it unowned with `None`),
    /// returning the previous owner. A no-op when the owner is unchanged.
    pub fn reassign(&mut self, id: ShapeId, new_owner: Option<MaskId>) -> Option<MaskId> {
        let slot = self.slot_mut(id)?;
        let old = slot.owner;
        if old == new_owner {
            return old;
        }
        slot.owner = new_owner;
        if let Some(old) = old {
            self.detach(old, id);
        }
        if let Some(new) = new_owner {
            self.by_mask.entry(new).or_default().push(id);
        }
        old
    }

    /// Detaches every shape from `mask` (when the mask is destroyed),
    /// returning them so the caller can re-register them elsewhere.
    pub fn detach_all(&mut self, mask: MaskId) -> Vec<ShapeId> {
        let ids = self.by_mask.remove(&mask).unwrap_or_default();
        for id in &ids {
            if let Some(slot) = self.slot_mut(*id) {
                slot.owner = None;
            }
        }
        ids
    }

    /// Returns the shapes registered with `mask` in compositing order.
    #[must_use]
    pub fn shapes_for(&self, mask: MaskId) -> &[ShapeId] {
        self.by_mask.get(&mask).map_or(&[], Vec::as_slice)
    }

    /// Returns the owner of a shape.
    #[must_use]
    pub fn owner(&self, id: ShapeId) -> Option<MaskId> {
        self.slot(id)?.owner
    }

    /// Returns the shape registered for `element`.
    #[must_use]
    pub fn find(&self, element: ElementId) -> Option<ShapeId> {
        self.by_element.get(&element).copied()
    }

    /// Returns the shape data.
    #[must_use]
    pub fn get(&self, id: ShapeId) -> Option<&MaskingShape> {
        self.slot(id)?.shape.as_ref()
    }

    /// Returns the shape data mutably.
    pub fn get_mut(&mut self, id: ShapeId) -> Option<&mut MaskingShape> {
        self.slot_mut(id)?.shape.as_mut()
    }

    /// Number of live shapes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_element.len()
    }

    /// Returns whether no shapes are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_element.is_empty()
    }

    /// Re-orders `mask`'s shapes: by draw depth when both shapes have one,
    /// otherwise by hierarchy order.
    pub fn sort<H: Hierarchy + ?Sized>(&mut self, mask: MaskId, hierarchy: &H) {
        let Some(mut ids) = self.by_mask.remove(&mask) else {
            return;
        };
        // The mixed comparator is not transitive, so `sort_by` could panic on
        // it. A stable insertion sort over these short lists cannot.
        for i in 1..ids.len() {
            let mut j = i;
            while j > 0 && self.compare(hierarchy, ids[j - 1], ids[j]) == Ordering::Greater {
                ids.swap(j - 1, j);
                j -= 1;
            }
        }
        self.by_mask.insert(mask, ids);
    }

    /// Returns every live shape handle in slot order.
    #[must_use]
    pub fn ids(&self) -> Vec<ShapeId> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.shape.is_some())
            .filter_map(|(i, s)| {
                Some(ShapeId {
                    idx: u32::try_from(i).ok()?,
                    generation: s.generation,
                })
            })
            .collect()
    }

    /// Drops every shape.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free_list.clear();
        self.by_mask.clear();
        self.by_element.clear();
    }

    fn compare<H: Hierarchy + ?Sized>(&self, hierarchy: &H, a: ShapeId, b: ShapeId) -> Ordering {
        let (Some(sa), Some(sb)) = (self.get(a), self.get(b)) else {
            return Ordering::Equal;
        };
        match (sa.draw_depth, sb.draw_depth) {
            (Some(da), Some(db)) if da != db => da.cmp(&db),
            _ => compare_hierarchy_order(hierarchy, sa.element, sb.element),
        }
    }

    fn detach(&mut self, owner: MaskId, id: ShapeId) {
        if let Some(list) = self.by_mask.get_mut(&owner) {
            list.retain(|&s| s != id);
            if list.is_empty() {
                self.by_mask.remove(&owner);
            }
        }
    }

    fn slot(&self, id: ShapeId) -> Option<&ShapeSlot> {
        self.slots
            .get(id.idx as usize)
            .filter(|s| s.generation == id.generation && s.shape.is_some())
    }

    fn slot_mut(&mut self, id: ShapeId) -> Option<&mut ShapeSlot> {
        self.slots
            .get_mut(id.idx as usize)
            .filter(|s| s.generation == id.generation && s.shape.is_some())
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use super::*;
    use crate::hierarchy::ElementTree;

    fn mask(idx: u32) -> MaskId {
        MaskId { idx, generation: 0 }
    }

    #[test]
    fn register_and_unregister() {
        let mut reg = ShapeRegistry::new();
        let id = reg.register(
            Some(mask(0)),
            MaskingShape::new(ElementId(5), ShapeMethod::Subtract),
        );
        assert_eq!(reg.shapes_for(mask(0)), &[id]);
        assert_eq!(reg.find(ElementId(5)), Some(id));
        let (owner, shape) = reg.unregister(id).expect("live shape");
        assert_eq!(owner, Some(mask(0)));
        assert_eq!(shape.method, ShapeMethod::Subtract);
        assert!(reg.shapes_for(mask(0)).is_empty());
        assert!(reg.get(id).is_none(), "stale handle must not resolve");
        assert!(reg.is_empty());
    }

    #[test]
    fn reassign_moves_between_masks() {
        let mut reg = ShapeRegistry::new();
        let id = reg.register(
            Some(mask(0)),
            MaskingShape::new(ElementId(1), ShapeMethod::Additive),
        );
        assert_eq!(reg.reassign(id, Some(mask(1))), Some(mask(0)));
        assert!(reg.shapes_for(mask(0)).is_empty());
        assert_eq!(reg.shapes_for(mask(1)), &[id]);
        assert_eq!(reg.owner(id), Some(mask(1)));
    }

    #[test]
    fn detach_all_leaves_shapes_unowned() {
        let mut reg = ShapeRegistry::new();
        let a = reg.register(Some(mask(0)), MaskingShape::new(ElementId(1), ShapeMethod::Additive));
        let b = reg.register(Some(mask(0)), MaskingShape::new(ElementId(2), ShapeMethod::Additive));
        assert_eq!(reg.detach_all(mask(0)), vec![a, b]);
        assert_eq!(reg.owner(a), None);
        assert!(reg.get(b).is_some());
    }

    #[test]
    fn sort_prefers_draw_depth_then_hierarchy() {
        let mut tree = ElementTree::new();
        let root = tree.insert(None);
        let e1 = tree.insert(Some(root));
        let e2 = tree.insert(Some(root));
        let e3 = tree.insert(Some(root));

        let mut reg = ShapeRegistry::new();
        let mut s3 = MaskingShape::new(e3, ShapeMethod::Additive);
        s3.draw_depth = Some(1);
        let mut s1 = MaskingShape::new(e1, ShapeMethod::Additive);
        s1.draw_depth = Some(5);
        let s2 = MaskingShape::new(e2, ShapeMethod::Subtract);
        let id3 = reg.register(Some(mask(0)), s3);
        let id1 = reg.register(Some(mask(0)), s1);
        let id2 = reg.register(Some(mask(0)), s2);

        reg.sort(mask(0), &tree);
        // s3 (depth 1) before s1 (depth 5); s2 has no depth and falls back to
        // hierarchy order against both.
        let order = reg.shapes_for(mask(0));
        let pos = |id| order.iter().position(|&s| s == id).expect("registered");
        assert!(pos(id3) < pos(id1));
        assert!(pos(id1) < pos(id2));
    }

    #[test]
    fn contains_uses_bounds() {
        let mut shape = MaskingShape::new(ElementId(0), ShapeMethod::Additive);
        shape.bounds = Rect::new(0.0, 0.0, 10.0, 10.0);
        assert!(shape.contains(Point::new(5.0, 5.0)));
        assert!(!shape.contains(Point::new(15.0, 5.0)));
    }
}
