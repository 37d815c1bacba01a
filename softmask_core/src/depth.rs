// Copyright 2026 the Softmask Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Stencil depth resolution.
//!
//! The stencil depth of an element is the number of effective masks (of any
//! mode) enclosing it, counted up to but excluding the sort-override
//! boundary. The nearest one is recorded alongside. Both the depth query and
//! the nearest-soft-mask query are memoized per frame in an explicit cache
//! keyed by `(element, query)`; the cache is cleared by
//! [`invalidate_frame`](StencilDepthResolver::invalidate_frame) at the start
//! of each frame and by
//! [`on_hierarchy_changed`](StencilDepthResolver::on_hierarchy_changed).

use hashbrown::HashMap;

use crate::hierarchy::{ElementId, Hierarchy, ancestors};
use crate::mask::{MaskId, MaskStore};

/// Result of a stencil depth query.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StencilDepth {
    /// Number of effective enclosing masks.
    pub depth: u32,
    /// The nearest of them, if any.
    pub nearest_mask: Option<ElementId>,
}

impl StencilDepth {
    /// Stencil reference bits for this depth: one bit per enclosing mask,
    /// saturating at eight bits.
    #[must_use]
    pub const fn stencil_bits(self) -> u8 {
        if self.depth >= 8 {
            u8::MAX
        } else {
            (1_u8 << self.depth) - 1
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum Query {
    Depth { include_self: bool },
    NearestSoftMask,
}

#[derive(Clone, Copy, Debug)]
enum Cached {
    Depth(StencilDepth),
    SoftMask(Option<MaskId>),
}

/// Per-frame memoizing resolver for stencil depth and nearest soft mask.
#[derive(Debug, Default)]
pub struct StencilDepthResolver {
    cache: HashMap<(ElementId, Query), Cached>,
}

impl StencilDepthResolver {
    /// Creates a resolver with an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts effective masks on the ancestor chain of `element` (and
    /// `element` itself when `include_self`), stopping before the
    /// sort-override boundary.
    ///
    /// A boundary element resolves to depth 0 with no nearest mask.
    pub fn resolve<H: Hierarchy + ?Sized>(
        &mut self,
        hierarchy: &H,
        element: ElementId,
        include_self: bool,
    ) -> StencilDepth {
        let key = (element, Query::Depth { include_self });
        if let Some(Cached::Depth(hit)) = self.cache.get(&key) {
            return *hit;
        }
        let result = compute_depth(hierarchy, element, include_self);
        self.cache.insert(key, Cached::Depth(result));
        result
    }

    /// Returns the nearest enabled soft-masking node enclosing `element`
    /// (its own node excluded).
    pub fn nearest_soft_mask<H: Hierarchy + ?Sized>(
        &mut self,
        hierarchy: &H,
        store: &MaskStore,
        element: ElementId,
    ) -> Option<MaskId> {
        let key = (element, Query::NearestSoftMask);
        if let Some(Cached::SoftMask(hit)) = self.cache.get(&key) {
            // A node destroyed mid-frame degrades to recomputation.
            if hit.is_none_or(|id| store.is_alive(id)) {
                return *hit;
            }
        }
        let result = store.nearest_soft_mask(hierarchy, element, false);
        self.cache.insert(key, Cached::SoftMask(result));
        result
    }

    /// Drops all memoized results. Call at the start of each frame.
    pub fn invalidate_frame(&mut self) {
        self.cache.clear();
    }

    /// Drops all memoized results after the host reports a re-parent,
    /// activation, or mask enable change.
    pub fn on_hierarchy_changed(&mut self) {
        self.cache.clear();
    }

    /// Number of memoized results.
    #[must_use]
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }
}

fn compute_depth<H: Hierarchy + ?Sized>(
    hierarchy: &H,
    element: ElementId,
    include_self: bool,
) -> StencilDepth {
    if hierarchy.is_sort_override_root(element) {
        return StencilDepth::default();
    }
    let mut result = StencilDepth::default();
    for e in ancestors(hierarchy, element, include_self) {
        let effective = hierarchy
            .mask_state(e)
            .is_some_and(|m| m.is_effective() && hierarchy.is_active(e));
        if effective {
            result.depth += 1;
            result.nearest_mask.get_or_insert(e);
        }
    }
    result
}
