// Copyright 2026 the Softmask Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Host scene-graph contract.
//!
//! The masking core never owns UI elements. It reads the host's transform
//! hierarchy through the [`Hierarchy`] trait: parent links, sibling order,
//! active state, the sort-override boundary marker, and the enabled state of
//! any mask component attached to an element.
//!
//! [`ElementTree`] is a small arena implementation of the trait for hosts
//! that do not have their own scene graph.

use alloc::vec::Vec;
use core::cmp::Ordering;
use core::fmt;

/// Upper bound on the number of steps any ancestor walk takes.
///
/// A well-formed host hierarchy cannot cycle, but walks stop here regardless.
pub const MAX_HIERARCHY_DEPTH: usize = 4096;

/// An opaque reference to a host UI element.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ElementId(pub u32);

impl fmt::Debug for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ElementId({})", self.0)
    }
}

/// State of a host mask component attached to an element.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct MaskState {
    /// Whether the mask component itself is enabled.
    pub enabled: bool,
    /// Whether the mask's source graphic is active and visible.
    pub graphic_active: bool,
}

impl MaskState {
    /// Returns `true` if this mask participates in stencil depth counting.
    #[inline]
    #[must_use]
    pub const fn is_effective(self) -> bool {
        self.enabled && self.graphic_active
    }
}

/// Read-only view of the host's UI hierarchy.
pub trait Hierarchy {
    /// Returns the parent of `element`, or `None` for a root.
    fn parent(&self, element: ElementId) -> Option<ElementId>;

    /// Returns the position of `element` among its siblings.
    fn sibling_index(&self, element: ElementId) -> u32;

    /// Returns whether `element` is active in the hierarchy.
    fn is_active(&self, element: ElementId) -> bool;

    /// Returns whether `element` is a sort-override boundary (e.g. a nested
    /// canvas that overrides sorting). Ancestor walks stop before it.
    fn is_sort_override_root(&self, element: ElementId) -> bool;

    /// Returns the mask component attached to `element`, if any.
    fn mask_state(&self, element: ElementId) -> Option<MaskState>;
}

/// Iterator over an element's ancestors, bounded by the sort-override root.
///
/// The boundary element itself is never yielded. Created by [`ancestors`].
#[derive(Debug)]
pub struct Ancestors<'a, H: ?Sized> {
    hierarchy: &'a H,
    current: Option<ElementId>,
    steps: usize,
}

impl<H: Hierarchy + ?Sized> Iterator for Ancestors<'_, H> {
    type Item = ElementId;

    fn next(&mut self) -> Option<ElementId> {
        let current = self.current?;
        if self.steps >= MAX_HIERARCHY_DEPTH || self.hierarchy.is_sort_override_root(current) {
            self.current = None;
            return None;
        }
        self.steps += 1;
        self.current = self.hierarchy.parent(current);
        Some(current)
    }
}

/// Walks from `element` towards the root, stopping before the first
/// sort-override boundary.
///
/// When `include_self` is `false` the walk starts at the parent.
pub fn ancestors<H: Hierarchy + ?Sized>(
    hierarchy: &H,
    element: ElementId,
    include_self: bool,
) -> Ancestors<'_, H> {
    let current = if include_self {
        Some(element)
    } else if hierarchy.is_sort_override_root(element) {
        None
    } else {
        hierarchy.parent(element)
    };
    Ancestors {
        hierarchy,
        current,
        steps: 0,
    }
}

/// Compares two elements by depth-first pre-order position.
///
/// An ancestor orders before its descendants; otherwise the sibling indices
/// of the first diverging ancestors decide.
pub fn compare_hierarchy_order<H: Hierarchy + ?Sized>(
    hierarchy: &H,
    a: ElementId,
    b: ElementId,
) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }
    let path_a = sibling_path(hierarchy, a);
    let path_b = sibling_path(hierarchy, b);
    path_a.cmp(&path_b)
}

/// Sibling indices from the root down to `element`.
fn sibling_path<H: Hierarchy + ?Sized>(hierarchy: &H, element: ElementId) -> Vec<u32> {
    let mut path = Vec::new();
    let mut current = Some(element);
    while let Some(e) = current {
        if path.len() >= MAX_HIERARCHY_DEPTH {
            break;
        }
        path.push(hierarchy.sibling_index(e));
        current = hierarchy.parent(e);
    }
    path.reverse();
    path
}

#[derive(Clone, Debug, Default)]
struct ElementSlot {
    parent: Option<ElementId>,
    children: Vec<ElementId>,
    active: bool,
    sort_override: bool,
    mask: Option<MaskState>,
}

/// A minimal arena-backed scene graph implementing [`Hierarchy`].
#[derive(Clone, Debug, Default)]
pub struct ElementTree {
    slots: Vec<ElementSlot>,
}

impl ElementTree {
    /// Creates an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an active element as the last child of `parent`.
    ///
    /// # Panics
    ///
    /// Panics if `parent` does not belong to this tree.
    pub fn insert(&mut self, parent: Option<ElementId>) -> ElementId {
        #[expect(
            clippy::cast_possible_truncation,
            reason = "element count fits in u32 for any practical tree"
        )]
        let id = ElementId(self.slots.len() as u32);
        self.slots.push(ElementSlot {
            parent,
            active: true,
            ..ElementSlot::default()
        });
        if let Some(p) = parent {
            self.slots[p.0 as usize].children.push(id);
        }
        id
    }

    /// Moves `element` to the end of `new_parent`'s children.
    pub fn reparent(&mut self, element: ElementId, new_parent: Option<ElementId>) {
        if let Some(old) = self.slots[element.0 as usize].parent {
            self.slots[old.0 as usize].children.retain(|&c| c != element);
        }
        self.slots[element.0 as usize].parent = new_parent;
        if let Some(p) = new_parent {
            self.slots[p.0 as usize].children.push(element);
        }
    }

    /// Sets the element's own active flag.
    pub fn set_active(&mut self, element: ElementId, active: bool) {
        self.slots[element.0 as usize].active = active;
    }

    /// Marks the element as a sort-override boundary.
    pub fn set_sort_override_root(&mut self, element: ElementId, boundary: bool) {
        self.slots[element.0 as usize].sort_override = boundary;
    }

    /// Attaches, updates, or removes (`None`) a mask component.
    pub fn set_mask_state(&mut self, element: ElementId, mask: Option<MaskState>) {
        self.slots[element.0 as usize].mask = mask;
    }

    /// Returns the direct children of an element in sibling order.
    #[must_use]
    pub fn children(&self, element: ElementId) -> &[ElementId] {
        &self.slots[element.0 as usize].children
    }
}

impl Hierarchy for ElementTree {
    fn parent(&self, element: ElementId) -> Option<ElementId> {
        self.slots.get(element.0 as usize).and_then(|s| s.parent)
    }

    fn sibling_index(&self, element: ElementId) -> u32 {
        let Some(parent) = self.parent(element) else {
            return element.0;
        };
        let siblings = &self.slots[parent.0 as usize].children;
        siblings
            .iter()
            .position(|&c| c == element)
            .and_then(|i| u32::try_from(i).ok())
            .unwrap_or(u32::MAX)
    }

    fn is_active(&self, element: ElementId) -> bool {
        let mut current = Some(element);
        let mut steps = 0;
        while let Some(e) = current {
            let Some(slot) = self.slots.get(e.0 as usize) else {
                return false;
            };
            if !slot.active {
                return false;
            }
            steps += 1;
            if steps >= MAX_HIERARCHY_DEPTH {
                break;
            }
            current = slot.parent;
        }
        true
    }

    fn is_sort_override_root(&self, element: ElementId) -> bool {
        self.slots
            .get(element.0 as usize)
            .is_some_and(|s| s.sort_override)
    }

    fn mask_state(&self, element: ElementId) -> Option<MaskState> {
        self.slots.get(element.0 as usize).and_then(|s| s.mask)
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use super::*;

    #[test]
    fn ancestors_exclude_boundary() {
        let mut tree = ElementTree::new();
        let canvas = tree.insert(None);
        let a = tree.insert(Some(canvas));
        let b = tree.insert(Some(a));
        tree.set_sort_override_root(canvas, true);

        let walk: Vec<_> = ancestors(&tree, b, true).collect();
        assert_eq!(walk, vec![b, a]);

        let walk: Vec<_> = ancestors(&tree, b, false).collect();
        assert_eq!(walk, vec![a]);
    }

    #[test]
    fn ancestors_of_boundary_is_empty() {
        let mut tree = ElementTree::new();
        let canvas = tree.insert(None);
        tree.set_sort_override_root(canvas, true);
        assert_eq!(ancestors(&tree, canvas, true).count(), 0);
        assert_eq!(ancestors(&tree, canvas, false).count(), 0);
    }

    #[test]
    fn cyclic_host_walk_terminates() {
        struct Loop;
        impl Hierarchy for Loop {
            fn parent(&self, element: ElementId) -> Option<ElementId> {
                Some(ElementId(1 - element.0))
            }
            fn sibling_index(&self, _: ElementId) -> u32 {
                0
            }
            fn is_active(&self, _: ElementId) -> bool {
                true
            }
            fn is_sort_override_root(&self, _: ElementId) -> bool {
                false
            }
            fn mask_state(&self, _: ElementId) -> Option<MaskState> {
                None
            }
        }
        assert_eq!(
            ancestors(&Loop, ElementId(0), true).count(),
            MAX_HIERARCHY_DEPTH
        );
    }

    #[test]
    fn hierarchy_order_is_preorder() {
        let mut tree = ElementTree::new();
        let root = tree.insert(None);
        let a = tree.insert(Some(root));
        let a1 = tree.insert(Some(a));
        let b = tree.insert(Some(root));

        assert_eq!(compare_hierarchy_order(&tree, root, a), Ordering::Less);
        assert_eq!(compare_hierarchy_order(&tree, a1, b), Ordering::Less);
        assert_eq!(compare_hierarchy_order(&tree, b, a), Ordering::Greater);
        assert_eq!(compare_hierarchy_order(&tree, a1, a1), Ordering::Equal);
    }

    #[test]
    fn inactive_ancestor_deactivates_subtree() {
        let mut tree = ElementTree::new();
        let root = tree.insert(None);
        let child = tree.insert(Some(root));
        assert!(tree.is_active(child));
        tree.set_active(root, false);
        assert!(!tree.is_active(child));
    }

    #[test]
    fn reparent_updates_sibling_index() {
        let mut tree = ElementTree::new();
        let root = tree.insert(None);
        let a = tree.insert(Some(root));
        let b = tree.insert(Some(root));
        assert_eq!(tree.sibling_index(b), 1);
        tree.reparent(a, None);
        assert_eq!(tree.sibling_index(b), 0);
        assert_eq!(tree.children(root), &[b]);
    }
}
