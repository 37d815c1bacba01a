// Copyright 2026 the Softmask Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tree traversal utilities.

use alloc::vec::Vec;

use super::id::{INVALID, MaskId};
use super::store::MaskStore;

/// An iterator over the direct children of a mask node, in insertion order.
///
/// Created by [`MaskStore::children`].
#[derive(Debug)]
pub struct Children<'a> {
    store: &'a MaskStore,
    current: u32,
}

impl<'a> Children<'a> {
    pub(crate) fn new(store: &'a MaskStore, first: u32) -> Self {
        Self {
            store,
            current: first,
        }
    }
}

impl Iterator for Children<'_> {
    type Item = MaskId;

    fn next(&mut self) -> Option<MaskId> {
        if self.current == INVALID {
            return None;
        }
        let idx = self.current;
        self.current = self.store.next_sibling[idx as usize];
        Some(self.store.id_at(idx))
    }
}

impl MaskStore {
    /// Returns the subtree under `root` in depth-first pre-order, `root`
    /// first. Siblings appear in insertion order, which is the compositing
    /// draw order.
    #[must_use]
    pub fn subtree(&self, root: MaskId) -> Vec<MaskId> {
        self.validate(root);
        let mut out = Vec::new();
        let mut stack = Vec::new();
        stack.push(root.idx);
        while let Some(idx) = stack.pop() {
            out.push(self.id_at(idx));
            // Push children in reverse so the first child is visited first.
            let start = stack.len();
            let mut child = self.first_child[idx as usize];
            while child != INVALID {
                stack.push(child);
                child = self.next_sibling[child as usize];
            }
            stack[start..].reverse();
        }
        out
    }
}
