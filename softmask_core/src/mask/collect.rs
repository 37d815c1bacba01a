// Copyright 2026 the Softmask Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-frame change collection.
//!
//! Collection follows a drain-then-fold pattern for each dirty channel:
//!
//! 1. **COMPOSITE**: drain affected indices (dependents included) and set
//!    `is_dirty` on each node and its subtree.
//! 2. **SHAPES**: drain the owning nodes and mark them the same way.
//! 3. **TOPOLOGY**: drain and report whether anything structural happened.
//!
//! The compositor then asks for [`dirty_roots`](MaskStore::dirty_roots): the
//! enabled roots with at least one dirty node in their subtree.

use alloc::vec::Vec;

use kurbo::Affine;

use super::id::{INVALID, MaskId};
use super::store::MaskStore;
use crate::dirty;
use crate::hierarchy::Hierarchy;

/// The changes folded in by a single [`MaskStore::collect_dirty`] call.
///
/// Fields hold raw slot indices.
#[derive(Clone, Debug, Default)]
pub struct MaskChanges {
    /// Nodes whose geometry or parameters changed.
    pub composite: Vec<u32>,
    /// Nodes whose auxiliary shapes changed.
    pub shapes: Vec<u32>,
    /// Whether any enable, disable, re-parent, or destroy happened.
    pub topology_changed: bool,
}

impl MaskChanges {
    /// Clears all change lists.
    pub fn clear(&mut self) {
        self.composite.clear();
        self.shapes.clear();
        self.topology_changed = false;
    }

    /// Returns whether nothing changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.composite.is_empty() && self.shapes.is_empty() && !self.topology_changed
    }
}

impl MaskStore {
    /// Drains every dirty channel and folds the result into the per-node
    /// dirty flags.
    pub fn collect_dirty(&mut self) -> MaskChanges {
        let mut changes = MaskChanges::default();
        self.collect_dirty_into(&mut changes);
        changes
    }

    /// Like [`collect_dirty`](Self::collect_dirty), but reuses a
    /// caller-provided buffer.
    pub fn collect_dirty_into(&mut self, changes: &mut MaskChanges) {
        changes.clear();

        changes.composite = self
            .dirty
            .drain(dirty::COMPOSITE)
            .affected()
            .deterministic()
            .run()
            .collect();
        for i in 0..changes.composite.len() {
            let idx = changes.composite[i];
            if self.is_live_idx(idx) {
                self.mark_dirty_idx(idx);
            }
        }

        changes.shapes = self
            .dirty
            .drain(dirty::SHAPES)
            .deterministic()
            .run()
            .collect();
        for i in 0..changes.shapes.len() {
            let idx = changes.shapes[i];
            if self.is_live_idx(idx) {
                self.mark_dirty_idx(idx);
            }
        }

        let topology: Vec<u32> = self
            .dirty
            .drain(dirty::TOPOLOGY)
            .deterministic()
            .run()
            .collect();
        changes.topology_changed = !topology.is_empty();
    }

    /// Returns the enabled soft-masking roots whose subtree holds at least
    /// one dirty node, in slot order.
    #[must_use]
    pub fn dirty_roots(&self) -> Vec<MaskId> {
        let mut roots: Vec<MaskId> = Vec::new();
        for idx in 0..self.len {
            let i = idx as usize;
            if !self.is_dirty[i] || !self.enabled[i] || !self.is_live_idx(idx) {
                continue;
            }
            let root = self.soft_mask_root(self.id_at(idx));
            if self.config[root.idx as usize].mode.composites_soft_mask() && !roots.contains(&root)
            {
                roots.push(root);
            }
        }
        roots.sort_unstable_by_key(|r| r.idx);
        roots
    }

    /// Re-derives every enabled node's parent from the host hierarchy.
    ///
    /// Call after the host reports a hierarchy change (re-parenting or
    /// activation). Returns whether any link moved.
    pub fn refresh_parents<H: Hierarchy + ?Sized>(&mut self, hierarchy: &H) -> bool {
        let mut changed = false;
        for id in self.ids() {
            if !self.enabled[id.idx as usize] {
                continue;
            }
            let desired = self.desired_parent(hierarchy, id);
            if self.parent(id) != desired {
                let before = self.parent[id.idx as usize];
                self.set_parent(id, desired);
                changed |= self.parent[id.idx as usize] != before;
            }
        }
        changed
    }

    /// Records the world transform of the mask graphic.
    ///
    /// The node is marked dirty only when a coefficient moved by more than
    /// `threshold`, so sub-threshold jitter does not recomposite. Returns
    /// whether the change was accepted.
    pub fn set_world_transform(&mut self, id: MaskId, transform: Affine, threshold: f64) -> bool {
        self.validate(id);
        let current = self.world_transform[id.idx as usize];
        let moved = current
            .as_coeffs()
            .iter()
            .zip(transform.as_coeffs())
            .any(|(a, b)| (a - b).abs() > threshold);
        if moved {
            self.world_transform[id.idx as usize] = transform;
            self.dirty.mark(id.idx, dirty::COMPOSITE);
        }
        moved
    }

    /// Returns the last accepted world transform of the mask graphic.
    #[must_use]
    pub fn world_transform(&self, id: MaskId) -> Affine {
        self.validate(id);
        self.world_transform[id.idx as usize]
    }

    fn is_live_idx(&self, idx: u32) -> bool {
        idx != INVALID && idx < self.len && !self.free_list.contains(&idx)
    }
}
