// Copyright 2026 the Softmask Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Struct-of-arrays mask node storage with allocation, topology, and property
//! management.

use alloc::vec::Vec;

use hashbrown::HashMap;
use kurbo::{Affine, Rect};
use understory_dirty::{CycleHandling, DirtyTracker, EagerPolicy};

use super::config::{DownSamplingRate, MaskConfig, MaskingMode, SoftnessRange};
use super::id::{INVALID, MaskId};
use super::traverse::Children;
use crate::MAX_SOFT_MASK_DEPTH;
use crate::dirty;
use crate::hierarchy::{ElementId, Hierarchy, ancestors};
use crate::mesh::{Vertex, mesh_bounds};
use crate::resource::{BufferId, TextureId};

/// Struct-of-arrays storage for all mask nodes of one UI context.
///
/// Nodes are addressed by [`MaskId`] handles. Parent links only ever point at
/// soft-masking-capable nodes, so the nodes form a forest whose roots own the
/// off-screen buffers. Children are kept in insertion order, which fixes the
/// compositing draw order.
#[derive(Debug)]
pub struct MaskStore {
    // -- Topology --
    pub(crate) parent: Vec<u32>,
    pub(crate) first_child: Vec<u32>,
    pub(crate) next_sibling: Vec<u32>,
    pub(crate) prev_sibling: Vec<u32>,

    // -- Configuration and host data --
    pub(crate) element: Vec<ElementId>,
    pub(crate) config: Vec<MaskConfig>,
    pub(crate) bounds: Vec<Rect>,
    pub(crate) mesh: Vec<Vec<Vertex>>,
    pub(crate) texture: Vec<Option<TextureId>>,
    pub(crate) world_transform: Vec<Affine>,

    // -- Frame state --
    pub(crate) enabled: Vec<bool>,
    pub(crate) is_dirty: Vec<bool>,
    pub(crate) drawn: Vec<bool>,
    pub(crate) base_depth: Vec<u8>,
    pub(crate) buffer: Vec<Option<BufferId>>,
    pub(crate) released_buffers: Vec<BufferId>,

    // -- Allocation --
    pub(crate) generation: Vec<u32>,
    pub(crate) free_list: Vec<u32>,
    pub(crate) len: u32,
    pub(crate) by_element: HashMap<ElementId, MaskId>,

    // -- Dirty tracking --
    pub(crate) dirty: DirtyTracker<u32>,
}

impl Default for MaskStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MaskStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            parent: Vec::new(),
            first_child: Vec::new(),
            next_sibling: Vec::new(),
            prev_sibling: Vec::new(),
            element: Vec::new(),
            config: Vec::new(),
            bounds: Vec::new(),
            mesh: Vec::new(),
            texture: Vec::new(),
            world_transform: Vec::new(),
            enabled: Vec::new(),
            is_dirty: Vec::new(),
            drawn: Vec::new(),
            base_depth: Vec::new(),
            buffer: Vec::new(),
            released_buffers: Vec::new(),
            generation: Vec::new(),
            free_list: Vec::new(),
            len: 0,
            by_element: HashMap::new(),
            dirty: DirtyTracker::with_cycle_handling(CycleHandling::Error),
        }
    }

    // -- Allocation API --

    /// Creates a disabled mask node for `element` and returns its handle.
    ///
    /// Call [`enable`](Self::enable) once the element is active.
    ///
    /// # Panics
    ///
    /// Panics if `element` already has a mask node.
    pub fn create_mask(&mut self, element: ElementId, config: MaskConfig) -> MaskId {
        assert!(
            !self.by_element.contains_key(&element),
            "element {element:?} already has a mask node"
        );
        let idx = if let Some(idx) = self.free_list.pop() {
            // Reuse a freed slot.
            let i = idx as usize;
            self.generation[i] += 1;
            self.parent[i] = INVALID;
            self.first_child[i] = INVALID;
            self.next_sibling[i] = INVALID;
            self.prev_sibling[i] = INVALID;
            self.element[i] = element;
            self.config[i] = config;
            self.bounds[i] = Rect::ZERO;
            self.mesh[i].clear();
            self.texture[i] = None;
            self.world_transform[i] = Affine::IDENTITY;
            self.enabled[i] = false;
            self.is_dirty[i] = true;
            self.drawn[i] = false;
            self.base_depth[i] = 0;
            self.buffer[i] = None;
            idx
        } else {
            let idx = self.len;
            self.len += 1;
            self.parent.push(INVALID);
            self.first_child.push(INVALID);
            self.next_sibling.push(INVALID);
            self.prev_sibling.push(INVALID);
            self.element.push(element);
            self.config.push(config);
            self.bounds.push(Rect::ZERO);
            self.mesh.push(Vec::new());
            self.texture.push(None);
            self.world_transform.push(Affine::IDENTITY);
            self.enabled.push(false);
            self.is_dirty.push(true);
            self.drawn.push(false);
            self.base_depth.push(0);
            self.buffer.push(None);
            self.generation.push(0);
            idx
        };

        let id = MaskId {
            idx,
            generation: self.generation[idx as usize],
        };
        self.by_element.insert(element, id);
        self.dirty.mark(idx, dirty::TOPOLOGY);
        id
    }

    /// Destroys a node, freeing its slot for reuse.
    ///
    /// An enabled node is disabled first, so its children move to its former
    /// parent and its buffer is queued for release.
    pub fn destroy_mask(&mut self, id: MaskId) {
        self.validate(id);
        self.disable(id);
        let idx = id.idx;

        self.by_element.remove(&self.element[idx as usize]);
        self.dirty.remove_key(idx);
        self.mesh[idx as usize].clear();

        // Bump generation so old handles immediately fail validation.
        self.generation[idx as usize] += 1;
        self.free_list.push(idx);
    }

    /// Returns whether the given handle refers to a live node.
    #[must_use]
    pub fn is_alive(&self, id: MaskId) -> bool {
        (id.idx < self.len)
            && self.generation[id.idx as usize] == id.generation
            && !self.free_list.contains(&id.idx)
    }

    /// Returns the node attached to `element`, if any.
    #[must_use]
    pub fn find(&self, element: ElementId) -> Option<MaskId> {
        self.by_element.get(&element).copied()
    }

    /// Returns the handles of all live nodes in slot order.
    #[must_use]
    pub fn ids(&self) -> Vec<MaskId> {
        (0..self.len)
            .filter(|idx| !self.free_list.contains(idx))
            .map(|idx| self.id_at(idx))
            .collect()
    }

    // -- Lifecycle API --

    /// Enables a node and attaches it to the nearest enclosing soft mask.
    ///
    /// Enabled nodes that sit below this node's element and were attached to
    /// this node's new parent are adopted, so a mask inserted between two
    /// existing levels takes its place in the tree.
    pub fn enable<H: Hierarchy + ?Sized>(&mut self, id: MaskId, hierarchy: &H) {
        self.validate(id);
        let idx = id.idx as usize;
        if self.enabled[idx] {
            return;
        }
        self.enabled[idx] = true;
        self.dirty.mark(id.idx, dirty::TOPOLOGY);

        let new_parent = self.desired_parent(hierarchy, id);
        self.set_parent(id, new_parent);
        self.mark_dirty(id);

        if !self.config[idx].mode.composites_soft_mask() {
            return;
        }
        let element = self.element[idx];
        let new_parent_idx = new_parent.map_or(INVALID, |p| p.idx);
        let adoptees: Vec<MaskId> = self
            .ids()
            .into_iter()
            .filter(|&other| {
                let o = other.idx as usize;
                other != id
                    && self.enabled[o]
                    && !self.config[o].ignore_parent
                    && self.parent[o] == new_parent_idx
                    && ancestors(hierarchy, self.element[o], false).any(|e| e == element)
            })
            .collect();
        for other in adoptees {
            self.set_parent(other, Some(id));
        }
    }

    /// Disables a node.
    ///
    /// Its children are re-parented to its former parent (one level is
    /// flattened, not the whole subtree), it is detached from its own parent,
    /// and its buffer is queued for release.
    pub fn disable(&mut self, id: MaskId) {
        self.validate(id);
        let idx = id.idx as usize;
        if !self.enabled[idx] {
            return;
        }
        let former_parent = self.parent(id);
        let children: Vec<MaskId> = self.children(id).collect();
        for child in children {
            self.set_parent(child, former_parent);
        }
        self.set_parent(id, None);

        self.enabled[idx] = false;
        self.is_dirty[idx] = true;
        self.drawn[idx] = false;
        if let Some(buffer) = self.buffer[idx].take() {
            self.released_buffers.push(buffer);
        }
        self.dirty.mark(id.idx, dirty::TOPOLOGY);
    }

    /// Returns whether the node is enabled.
    #[must_use]
    pub fn is_enabled(&self, id: MaskId) -> bool {
        self.validate(id);
        self.enabled[id.idx as usize]
    }

    // -- Topology API --

    /// Moves `id` under `new_parent` (or makes it a root with `None`).
    ///
    /// This is a no-op when the parent is unchanged, when `new_parent` is the
    /// node itself, or when `new_parent` is one of its descendants. Both the
    /// old and the new subtree are marked dirty.
    pub fn set_parent(&mut self, id: MaskId, new_parent: Option<MaskId>) {
        self.validate(id);
        let c = id.idx;
        let p = match new_parent {
            Some(p) => {
                self.validate(p);
                if p == id || self.is_ancestor_idx(c, p.idx) {
                    return;
                }
                p.idx
            }
            None => INVALID,
        };
        let old_p = self.parent[c as usize];
        if old_p == p {
            return;
        }

        if old_p != INVALID {
            self.unlink_from_parent(c);
            self.dirty.remove_dependency(c, old_p, dirty::COMPOSITE);
            self.dirty.mark(old_p, dirty::TOPOLOGY);
            self.mark_dirty_idx(old_p);
        }

        if p != INVALID {
            self.parent[c as usize] = p;
            self.prev_sibling[c as usize] = INVALID;
            self.next_sibling[c as usize] = INVALID;
            if self.first_child[p as usize] == INVALID {
                self.first_child[p as usize] = c;
            } else {
                let mut last = self.first_child[p as usize];
                while self.next_sibling[last as usize] != INVALID {
                    last = self.next_sibling[last as usize];
                }
                self.next_sibling[last as usize] = c;
                self.prev_sibling[c as usize] = last;
            }
            let _ = self.dirty.add_dependency(c, p, dirty::COMPOSITE);
            self.dirty.mark(p, dirty::TOPOLOGY);

            // A node under a soft-masking parent draws into the root's buffer.
            if self.config[p as usize].mode.composites_soft_mask() {
                if let Some(buffer) = self.buffer[c as usize].take() {
                    self.released_buffers.push(buffer);
                }
            }
        }

        self.mark_dirty_idx(c);
    }

    /// Returns the parent of a node, if any.
    #[must_use]
    pub fn parent(&self, id: MaskId) -> Option<MaskId> {
        self.validate(id);
        let p = self.parent[id.idx as usize];
        (p != INVALID).then(|| self.id_at(p))
    }

    /// Returns an iterator over the direct children of a node in insertion
    /// order.
    #[must_use]
    pub fn children(&self, id: MaskId) -> Children<'_> {
        self.validate(id);
        Children::new(self, self.first_child[id.idx as usize])
    }

    /// Returns whether the node roots a compositing subtree: it has no parent
    /// or its parent does not soft-mask.
    #[must_use]
    pub fn is_root(&self, id: MaskId) -> bool {
        self.validate(id);
        let p = self.parent[id.idx as usize];
        p == INVALID || !self.config[p as usize].mode.composites_soft_mask()
    }

    /// Returns the enabled roots in slot order.
    #[must_use]
    pub fn roots(&self) -> Vec<MaskId> {
        self.ids()
            .into_iter()
            .filter(|&id| self.enabled[id.idx as usize] && self.is_root(id))
            .collect()
    }

    /// Walks up to the root of the node's compositing subtree.
    #[must_use]
    pub fn soft_mask_root(&self, id: MaskId) -> MaskId {
        self.validate(id);
        let mut idx = id.idx;
        for _ in 0..self.len {
            let p = self.parent[idx as usize];
            if p == INVALID || !self.config[p as usize].mode.composites_soft_mask() {
                break;
            }
            idx = p;
        }
        self.id_at(idx)
    }

    /// Returns the compositing level of a node inside its subtree.
    ///
    /// The root is level 0; each parent step adds one, except for nodes
    /// configured as [`part_of_parent`](MaskConfig::part_of_parent). The
    /// walk is bounded, so the result saturates at the node count.
    #[must_use]
    pub fn depth_in_tree(&self, id: MaskId) -> u8 {
        self.validate(id);
        let mut level: u8 = 0;
        let mut idx = id.idx;
        for _ in 0..self.len {
            let p = self.parent[idx as usize];
            if p == INVALID || !self.config[p as usize].mode.composites_soft_mask() {
                break;
            }
            if !self.config[idx as usize].part_of_parent {
                level = level.saturating_add(1);
            }
            idx = p;
        }
        level
    }

    /// Absolute soft-mask depth of a node: its root's base stencil depth plus
    /// its level. This is also the RGBA component its level writes.
    #[must_use]
    pub fn absolute_depth(&self, id: MaskId) -> u8 {
        let root = self.soft_mask_root(id);
        self.base_depth[root.idx as usize].saturating_add(self.depth_in_tree(id))
    }

    /// Whether the node's level fits in the buffer's channels.
    #[must_use]
    pub fn within_depth_cap(&self, id: MaskId) -> bool {
        self.absolute_depth(id) < MAX_SOFT_MASK_DEPTH
    }

    /// Finds the nearest enabled soft-masking node on `element` or its
    /// ancestors (up to the sort-override boundary).
    #[must_use]
    pub fn nearest_soft_mask<H: Hierarchy + ?Sized>(
        &self,
        hierarchy: &H,
        element: ElementId,
        include_self: bool,
    ) -> Option<MaskId> {
        ancestors(hierarchy, element, include_self).find_map(|e| {
            let id = self.find(e)?;
            let i = id.idx as usize;
            (self.enabled[i] && self.config[i].mode.composites_soft_mask()).then_some(id)
        })
    }

    // -- Dirty API --

    /// Marks the node and its subtree as needing recompositing.
    ///
    /// Recursion stops at children that are already dirty.
    pub fn mark_dirty(&mut self, id: MaskId) {
        self.validate(id);
        self.mark_dirty_idx(id.idx);
    }

    /// Returns whether the node's buffer content is stale.
    #[must_use]
    pub fn is_dirty(&self, id: MaskId) -> bool {
        self.validate(id);
        self.is_dirty[id.idx as usize]
    }

    /// Clears the dirty flag after compositing.
    pub fn clear_dirty(&mut self, id: MaskId) {
        self.validate(id);
        self.is_dirty[id.idx as usize] = false;
    }

    /// Returns whether the root's buffer currently holds drawn content.
    #[must_use]
    pub fn has_drawn(&self, id: MaskId) -> bool {
        self.validate(id);
        self.drawn[id.idx as usize]
    }

    /// Records whether the root's buffer holds drawn content.
    pub fn set_drawn(&mut self, id: MaskId, drawn: bool) {
        self.validate(id);
        self.drawn[id.idx as usize] = drawn;
    }

    // -- Buffer API --

    /// Returns the buffer owned by this node (roots only).
    #[must_use]
    pub fn buffer(&self, id: MaskId) -> Option<BufferId> {
        self.validate(id);
        self.buffer[id.idx as usize]
    }

    /// Returns the buffer this node draws into: its root's buffer.
    #[must_use]
    pub fn root_buffer(&self, id: MaskId) -> Option<BufferId> {
        self.buffer(self.soft_mask_root(id))
    }

    /// Assigns a root's buffer. The previous buffer, if different, is queued
    /// for release.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not a root.
    pub fn set_buffer(&mut self, id: MaskId, buffer: Option<BufferId>) {
        assert!(self.is_root(id), "only a root may own a mask buffer");
        let slot = &mut self.buffer[id.idx as usize];
        if *slot == buffer {
            return;
        }
        if let Some(previous) = core::mem::replace(slot, buffer) {
            self.released_buffers.push(previous);
        }
        self.drawn[id.idx as usize] = false;
    }

    /// Drops every buffer reference without queueing releases, for use after
    /// the pool has destroyed all buffers (viewport resize, teardown).
    pub fn forget_buffers(&mut self) {
        for idx in 0..self.len as usize {
            self.buffer[idx] = None;
            self.drawn[idx] = false;
            self.is_dirty[idx] = true;
        }
        self.released_buffers.clear();
    }

    /// Takes the buffers queued for release since the last call.
    ///
    /// Every buffer a node stops owning (disable, destroy, re-parenting under
    /// a soft mask, replacement) ends up here exactly once.
    pub fn take_released_buffers(&mut self) -> Vec<BufferId> {
        core::mem::take(&mut self.released_buffers)
    }

    /// Returns the base stencil depth recorded for a root.
    #[must_use]
    pub fn base_depth(&self, id: MaskId) -> u8 {
        self.validate(id);
        self.base_depth[id.idx as usize]
    }

    /// Records a root's base stencil depth (masks enclosing it that are not
    /// part of its subtree). A change marks the subtree dirty.
    pub fn set_base_depth(&mut self, id: MaskId, depth: u8) {
        self.validate(id);
        if self.base_depth[id.idx as usize] != depth {
            self.base_depth[id.idx as usize] = depth;
            self.mark_dirty_idx(id.idx);
        }
    }

    // -- Property getters --

    /// Returns the host element owning the node.
    #[must_use]
    pub fn element(&self, id: MaskId) -> ElementId {
        self.validate(id);
        self.element[id.idx as usize]
    }

    /// Returns the node's configuration.
    #[must_use]
    pub fn config(&self, id: MaskId) -> MaskConfig {
        self.validate(id);
        self.config[id.idx as usize]
    }

    /// Returns the masking mode.
    #[must_use]
    pub fn mode(&self, id: MaskId) -> MaskingMode {
        self.config(id).mode
    }

    /// Returns the softness range.
    #[must_use]
    pub fn softness(&self, id: MaskId) -> SoftnessRange {
        self.config(id).softness
    }

    /// Returns the screen-space bounds of the mask graphic.
    #[must_use]
    pub fn bounds(&self, id: MaskId) -> Rect {
        self.validate(id);
        self.bounds[id.idx as usize]
    }

    /// Returns the captured mesh of the mask graphic.
    #[must_use]
    pub fn mesh(&self, id: MaskId) -> &[Vertex] {
        self.validate(id);
        &self.mesh[id.idx as usize]
    }

    /// Returns the mask graphic's source texture.
    #[must_use]
    pub fn texture(&self, id: MaskId) -> Option<TextureId> {
        self.validate(id);
        self.texture[id.idx as usize]
    }

    // -- Mutation API (auto-marks dirty) --

    /// Sets the masking mode.
    ///
    /// Marks the COMPOSITE channel with eager propagation, since the subtree
    /// changes buffer layout.
    pub fn set_mode(&mut self, id: MaskId, mode: MaskingMode) {
        self.validate(id);
        self.config[id.idx as usize].mode = mode;
        self.dirty.mark(id.idx, dirty::TOPOLOGY);
        self.dirty.mark_with(id.idx, dirty::COMPOSITE, &EagerPolicy);
    }

    /// Sets the down-sampling rate.
    pub fn set_down_sampling(&mut self, id: MaskId, rate: DownSamplingRate) {
        self.validate(id);
        self.config[id.idx as usize].down_sampling = rate;
        self.dirty.mark_with(id.idx, dirty::COMPOSITE, &EagerPolicy);
    }

    /// Sets the softness range.
    pub fn set_softness(&mut self, id: MaskId, softness: SoftnessRange) {
        self.validate(id);
        self.config[id.idx as usize].softness = softness;
        self.dirty.mark(id.idx, dirty::COMPOSITE);
    }

    /// Sets whether raycasts also require source-texture alpha.
    pub fn set_alpha_hit_test(&mut self, id: MaskId, enabled: bool) {
        self.validate(id);
        self.config[id.idx as usize].alpha_hit_test = enabled;
    }

    /// Sets whether the mask graphic stays visible.
    pub fn set_show_graphic(&mut self, id: MaskId, show: bool) {
        self.validate(id);
        self.config[id.idx as usize].show_graphic = show;
    }

    /// Sets whether the node ignores enclosing soft masks. Takes effect at the
    /// next [`refresh_parents`](Self::refresh_parents).
    pub fn set_ignore_parent(&mut self, id: MaskId, ignore: bool) {
        self.validate(id);
        self.config[id.idx as usize].ignore_parent = ignore;
        self.dirty.mark(id.idx, dirty::TOPOLOGY);
    }

    /// Sets whether the node shares its parent's compositing level.
    pub fn set_part_of_parent(&mut self, id: MaskId, part_of_parent: bool) {
        self.validate(id);
        self.config[id.idx as usize].part_of_parent = part_of_parent;
        self.dirty.mark_with(id.idx, dirty::COMPOSITE, &EagerPolicy);
    }

    /// Sets the screen-space bounds of the mask graphic.
    ///
    /// [`set_mesh`](Self::set_mesh) derives bounds from the captured vertices,
    /// so this is only needed for graphics that never pass through the mesh
    /// hook.
    pub fn set_bounds(&mut self, id: MaskId, bounds: Rect) {
        self.validate(id);
        if self.bounds[id.idx as usize] != bounds {
            self.bounds[id.idx as usize] = bounds;
            self.dirty.mark(id.idx, dirty::COMPOSITE);
        }
    }

    /// Replaces the captured mesh of the mask graphic. A non-empty mesh also
    /// replaces the bounds with the vertices' bounding box.
    pub fn set_mesh(&mut self, id: MaskId, vertices: &[Vertex]) {
        self.validate(id);
        let mesh = &mut self.mesh[id.idx as usize];
        mesh.clear();
        mesh.extend_from_slice(vertices);
        if let Some(bounds) = mesh_bounds(vertices) {
            self.bounds[id.idx as usize] = bounds;
        }
        self.dirty.mark(id.idx, dirty::COMPOSITE);
    }

    /// Sets the mask graphic's source texture.
    pub fn set_texture(&mut self, id: MaskId, texture: Option<TextureId>) {
        self.validate(id);
        if self.texture[id.idx as usize] != texture {
            self.texture[id.idx as usize] = texture;
            self.dirty.mark(id.idx, dirty::COMPOSITE);
        }
    }

    /// Records that the node's auxiliary shapes changed.
    pub fn mark_shapes_changed(&mut self, id: MaskId) {
        self.validate(id);
        self.dirty.mark(id.idx, dirty::SHAPES);
    }

    // -- Internal helpers --

    pub(crate) fn id_at(&self, idx: u32) -> MaskId {
        MaskId {
            idx,
            generation: self.generation[idx as usize],
        }
    }

    /// Panics if the handle is stale.
    pub(crate) fn validate(&self, id: MaskId) {
        assert!(
            id.idx < self.len && self.generation[id.idx as usize] == id.generation,
            "stale MaskId: {id:?} (current gen: {})",
            if id.idx < self.len {
                self.generation[id.idx as usize]
            } else {
                u32::MAX
            }
        );
    }

    /// Returns whether `ancestor` is on `idx`'s parent chain.
    fn is_ancestor_idx(&self, ancestor: u32, idx: u32) -> bool {
        let mut current = self.parent[idx as usize];
        for _ in 0..self.len {
            if current == INVALID {
                return false;
            }
            if current == ancestor {
                return true;
            }
            current = self.parent[current as usize];
        }
        false
    }

    /// Removes `idx` from its parent's child list without touching dirty state.
    fn unlink_from_parent(&mut self, idx: u32) {
        let p = self.parent[idx as usize];
        let prev = self.prev_sibling[idx as usize];
        let next = self.next_sibling[idx as usize];

        if prev != INVALID {
            self.next_sibling[prev as usize] = next;
        } else {
            self.first_child[p as usize] = next;
        }
        if next != INVALID {
            self.prev_sibling[next as usize] = prev;
        }

        self.parent[idx as usize] = INVALID;
        self.prev_sibling[idx as usize] = INVALID;
        self.next_sibling[idx as usize] = INVALID;
    }

    /// Sets the dirty flag on `idx` and, iteratively, on every descendant
    /// that is not dirty yet.
    pub(crate) fn mark_dirty_idx(&mut self, idx: u32) {
        self.is_dirty[idx as usize] = true;
        let mut stack = Vec::new();
        stack.push(idx);
        while let Some(current) = stack.pop() {
            let mut child = self.first_child[current as usize];
            while child != INVALID {
                if !self.is_dirty[child as usize] {
                    self.is_dirty[child as usize] = true;
                    stack.push(child);
                }
                child = self.next_sibling[child as usize];
            }
        }
    }

    /// The parent `id` should have given the current host hierarchy.
    pub(crate) fn desired_parent<H: Hierarchy + ?Sized>(
        &self,
        hierarchy: &H,
        id: MaskId,
    ) -> Option<MaskId> {
        let i = id.idx as usize;
        if self.config[i].ignore_parent {
            return None;
        }
        self.nearest_soft_mask(hierarchy, self.element[i], false)
    }
}
