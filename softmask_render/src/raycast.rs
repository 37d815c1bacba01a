// Copyright 2026 the Softmask Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Raycast validation through the mask chain.
//!
//! A hit on a masked element only counts where the masks enclosing it let the
//! element show. Each enclosing mask contributes a factor in `[0, 1]`:
//!
//! - Soft masks read their level's component from the composited buffer, so
//!   softness and the shapes drawn into the channel are already included.
//! - Stencil masks (normal and anti-aliased) test geometrically: inside the
//!   mask bounds, widened by additive shapes and cut by subtractive ones.
//!
//! The hit is valid when the product of all factors exceeds
//! [`SoftMaskSettings::hit_alpha_threshold`]. Tests that cannot be performed
//! (unreadable buffer or texture, level past the last channel, buffer not yet
//! composited) pass.

use hashbrown::HashMap;
use kurbo::{Point, Rect};
use softmask_core::MAX_SOFT_MASK_DEPTH;
use softmask_core::hierarchy::{ElementId, Hierarchy, ancestors};
use softmask_core::mask::{MaskId, MaskStore, ShapeMethod, ShapeRegistry};
use softmask_core::resource::{BufferId, BufferSize, TextureId};
use softmask_core::settings::{BufferOrigin, SoftMaskSettings};

use crate::device::GraphicsDevice;
use crate::plan::CanvasView;

/// An element being hit-tested.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RaycastTarget {
    /// The element receiving the raycast.
    pub element: ElementId,
    /// Its screen-space rectangle in canvas coordinates.
    pub rect: Rect,
}

/// Decides whether a raycast hit on a masked element is valid.
///
/// Results are memoized per frame by element and exact point; call
/// [`invalidate_frame`](Self::invalidate_frame) once per frame.
#[derive(Debug, Default)]
pub struct RaycastValidator {
    cache: HashMap<(ElementId, u64, u64), bool>,
}

impl RaycastValidator {
    /// Creates a validator with an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops all memoized results.
    pub fn invalidate_frame(&mut self) {
        self.cache.clear();
    }

    /// Number of memoized results.
    #[must_use]
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    /// Returns whether a hit at `point` (canvas coordinates, top-left origin)
    /// on `target` is valid.
    ///
    /// A point outside the element's rect is never valid. Inside it, inactive
    /// elements, disabled masking and elements without an enclosing mask are
    /// always valid.
    pub fn is_valid<H: Hierarchy + ?Sized, D: GraphicsDevice + ?Sized>(
        &mut self,
        settings: &SoftMaskSettings,
        hierarchy: &H,
        store: &MaskStore,
        shapes: &ShapeRegistry,
        device: &D,
        view: &CanvasView,
        target: RaycastTarget,
        point: Point,
    ) -> bool {
        if !target.rect.contains(point) {
            return false;
        }
        if !settings.enabled || !hierarchy.is_active(target.element) {
            return true;
        }
        let mut enclosing = ancestors(hierarchy, target.element, false)
            .filter_map(|e| store.find(e))
            .filter(|&m| store.is_enabled(m))
            .peekable();
        if enclosing.peek().is_none() {
            return true;
        }

        let key = (target.element, point.x.to_bits(), point.y.to_bits());
        if let Some(&hit) = self.cache.get(&key) {
            return hit;
        }
        let mut alpha = 1.0_f32;
        for mask in enclosing {
            alpha *= mask_alpha(settings, store, shapes, device, view, mask, point);
            if alpha <= 0.0 {
                break;
            }
        }
        let hit = alpha > settings.hit_alpha_threshold;
        self.cache.insert(key, hit);
        hit
    }
}

/// How much of the element `mask` lets through at `point`.
fn mask_alpha<D: GraphicsDevice + ?Sized>(
    settings: &SoftMaskSettings,
    store: &MaskStore,
    shapes: &ShapeRegistry,
    device: &D,
    view: &CanvasView,
    mask: MaskId,
    point: Point,
) -> f32 {
    let config = store.config(mask);
    let bounds = store.bounds(mask);
    let texture_ok = || {
        !config.alpha_hit_test
            || texture_alpha_passes(settings, device, store.texture(mask), bounds, point)
    };

    if config.mode.samples_buffer_for_raycast() {
        let depth = store.absolute_depth(mask);
        if depth >= MAX_SOFT_MASK_DEPTH {
            // Rendered unmasked.
            return 1.0;
        }
        let Some(buffer) = store.root_buffer(mask) else {
            return 1.0;
        };
        let px = view.pixel_size();
        let size = store
            .config(store.soft_mask_root(mask))
            .down_sampling
            .buffer_size(px.width, px.height);
        let sampled = sample_buffer(settings, device, view, buffer, size, point, depth);
        return if texture_ok() { sampled } else { 0.0 };
    }

    let mut inside = bounds.contains(point) && texture_ok();
    for &id in shapes.shapes_for(mask) {
        let Some(shape) = shapes.get(id) else {
            continue;
        };
        let covered = shape.contains(point)
            && (!shape.alpha_hit_test
                || texture_alpha_passes(settings, device, shape.texture, shape.bounds, point));
        match shape.method {
            ShapeMethod::Additive => inside |= covered,
            ShapeMethod::Subtract => inside &= !covered,
        }
    }
    if inside { 1.0 } else { 0.0 }
}

/// Reads component `depth` of the buffer pixel under `point`.
///
/// Points mapping outside the buffer read as 0; an unreadable buffer reads
/// as 1.
fn sample_buffer<D: GraphicsDevice + ?Sized>(
    settings: &SoftMaskSettings,
    device: &D,
    view: &CanvasView,
    buffer: BufferId,
    size: BufferSize,
    point: Point,
    depth: u8,
) -> f32 {
    let Some((x, y)) = buffer_pixel(settings.buffer_origin, view, size, point) else {
        return 0.0;
    };
    device
        .read_buffer_pixel(buffer, x, y)
        .map_or(1.0, |rgba| rgba[usize::from(depth)])
}

/// Maps a canvas point to buffer pixel coordinates.
#[expect(
    clippy::cast_possible_truncation,
    reason = "coordinates are range-checked against the buffer size first"
)]
fn buffer_pixel(
    origin: BufferOrigin,
    view: &CanvasView,
    size: BufferSize,
    point: Point,
) -> Option<(u32, u32)> {
    let (vw, vh) = (view.viewport.width, view.viewport.height);
    let (bw, bh) = (f64::from(size.width), f64::from(size.height));
    if !(vw > 0.0 && vh > 0.0) {
        return None;
    }
    let fx = (point.x * bw / vw).floor();
    let fy = (point.y * bh / vh).floor();
    if !(0.0..bw).contains(&fx) || !(0.0..bh).contains(&fy) {
        return None;
    }
    let row = match origin {
        BufferOrigin::TopLeft => fy,
        BufferOrigin::BottomLeft => bh - 1.0 - fy,
    };
    Some((fx as u32, row as u32))
}

/// Whether `texture`'s alpha at the point's UV within `bounds` exceeds the
/// hit threshold. Missing or unreadable textures pass.
fn texture_alpha_passes<D: GraphicsDevice + ?Sized>(
    settings: &SoftMaskSettings,
    device: &D,
    texture: Option<TextureId>,
    bounds: Rect,
    point: Point,
) -> bool {
    let Some(texture) = texture else {
        return true;
    };
    if bounds.width() <= 0.0 || bounds.height() <= 0.0 {
        return true;
    }
    let uv = Point::new(
        (point.x - bounds.x0) / bounds.width(),
        (point.y - bounds.y0) / bounds.height(),
    );
    device
        .sample_texture_alpha(texture, uv)
        .is_none_or(|a| a > settings.hit_alpha_threshold)
}

#[cfg(test)]
mod tests {
    use alloc::vec;
    use alloc::vec::Vec;

    use kurbo::Size;
    use softmask_core::hierarchy::ElementTree;
    use softmask_core::mask::{MaskConfig, MaskingMode, MaskingShape};
    use softmask_core::mesh::Vertex;
    use softmask_core::trace::Tracer;

    use super::*;
    use crate::compositor::BufferCompositor;
    use crate::pool::BufferPool;
    use crate::testing::FakeDevice;

    #[expect(clippy::cast_possible_truncation, reason = "test geometry is small")]
    fn quad(r: Rect) -> Vec<Vertex> {
        let (x0, y0, x1, y1) = (r.x0 as f32, r.y0 as f32, r.x1 as f32, r.y1 as f32);
        vec![
            Vertex::new(x0, y0, 0.0, 0.0),
            Vertex::new(x1, y0, 1.0, 0.0),
            Vertex::new(x1, y1, 1.0, 1.0),
            Vertex::new(x0, y1, 0.0, 1.0),
        ]
    }

    struct Scene {
        settings: SoftMaskSettings,
        tree: ElementTree,
        canvas: ElementId,
        store: MaskStore,
        shapes: ShapeRegistry,
        pool: BufferPool,
        device: FakeDevice,
        view: CanvasView,
        validator: RaycastValidator,
    }

    impl Scene {
        fn new() -> Self {
            let mut tree = ElementTree::new();
            let canvas = tree.insert(None);
            tree.set_sort_override_root(canvas, true);
            Self {
                settings: SoftMaskSettings::new(),
                tree,
                canvas,
                store: MaskStore::new(),
                shapes: ShapeRegistry::new(),
                pool: BufferPool::new(),
                device: FakeDevice::new(),
                view: CanvasView::overlay(Size::new(100.0, 100.0)),
                validator: RaycastValidator::new(),
            }
        }

        fn mask(
            &mut self,
            parent: ElementId,
            rect: Rect,
            mode: MaskingMode,
        ) -> (ElementId, MaskId) {
            let e = self.tree.insert(Some(parent));
            let config = MaskConfig {
                mode,
                ..MaskConfig::default()
            };
            let id = self.store.create_mask(e, config);
            self.store.enable(id, &self.tree);
            self.store.set_bounds(id, rect);
            self.store.set_mesh(id, &quad(rect));
            (e, id)
        }

        fn composite(&mut self) {
            let _ = self.store.collect_dirty();
            let _ = BufferCompositor::new().composite_dirty_roots(
                &mut self.store,
                &self.shapes,
                &mut self.pool,
                &mut self.device,
                &self.view,
                &mut Tracer::none(),
                0,
            );
        }

        fn hit(&mut self, element: ElementId, rect: Rect, x: f64, y: f64) -> bool {
            self.validator.is_valid(
                &self.settings,
                &self.tree,
                &self.store,
                &self.shapes,
                &self.device,
                &self.view,
                RaycastTarget { element, rect },
                Point::new(x, y),
            )
        }
    }

    const FULL: Rect = Rect::new(0.0, 0.0, 100.0, 100.0);

    #[test]
    fn unmasked_element_is_valid_inside_its_rect_only() {
        let mut s = Scene::new();
        let e = s.tree.insert(Some(s.canvas));
        let rect = Rect::new(0.0, 0.0, 10.0, 10.0);
        assert!(s.hit(e, rect, 5.0, 5.0));
        assert!(!s.hit(e, rect, 50.0, 50.0), "outside the rect");
    }

    #[test]
    fn point_outside_rect_is_invalid_whatever_the_mask_state() {
        let mut s = Scene::new();
        let (m, _) = s.mask(s.canvas, FULL, MaskingMode::SoftMasking);
        let e = s.tree.insert(Some(m));
        s.composite();
        let rect = Rect::new(0.0, 0.0, 10.0, 10.0);

        s.settings.enabled = false;
        assert!(!s.hit(e, rect, 50.0, 50.0), "masking disabled");

        s.settings.enabled = true;
        s.tree.set_active(e, false);
        assert!(!s.hit(e, rect, 50.0, 50.0), "inactive element");
    }

    #[test]
    fn point_outside_rect_is_invalid_under_a_mask() {
        let mut s = Scene::new();
        let (m, _) = s.mask(s.canvas, FULL, MaskingMode::SoftMasking);
        let e = s.tree.insert(Some(m));
        s.composite();
        assert!(!s.hit(e, Rect::new(0.0, 0.0, 10.0, 10.0), 20.0, 5.0));
    }

    #[test]
    fn inactive_or_disabled_masking_is_valid() {
        let mut s = Scene::new();
        let (m, _) = s.mask(s.canvas, Rect::new(0.0, 0.0, 10.0, 10.0), MaskingMode::SoftMasking);
        let e = s.tree.insert(Some(m));
        s.composite();
        assert!(!s.hit(e, FULL, 50.0, 50.0), "outside the mask");

        s.validator.invalidate_frame();
        s.settings.enabled = false;
        assert!(s.hit(e, FULL, 50.0, 50.0), "masking disabled");

        s.settings.enabled = true;
        s.tree.set_active(e, false);
        assert!(s.hit(e, FULL, 50.0, 50.0), "inactive element");
    }

    #[test]
    fn soft_mask_samples_its_channel() {
        let mut s = Scene::new();
        let (m, _) = s.mask(s.canvas, Rect::new(0.0, 0.0, 40.0, 40.0), MaskingMode::SoftMasking);
        let e = s.tree.insert(Some(m));
        s.composite();
        assert!(s.hit(e, FULL, 10.0, 10.0), "inside the mask");
        assert!(!s.hit(e, FULL, 70.0, 70.0), "outside the mask");
    }

    #[test]
    fn nested_levels_multiply() {
        let mut s = Scene::new();
        let (m0, _) = s.mask(s.canvas, Rect::new(0.0, 0.0, 80.0, 80.0), MaskingMode::SoftMasking);
        let (m1, _) = s.mask(m0, Rect::new(10.0, 10.0, 70.0, 70.0), MaskingMode::SoftMasking);
        let (m2, _) = s.mask(m1, Rect::new(20.0, 20.0, 60.0, 60.0), MaskingMode::SoftMasking);
        let e = s.tree.insert(Some(m2));
        s.composite();
        assert!(s.hit(e, FULL, 40.0, 40.0), "inside every level");
        assert!(!s.hit(e, FULL, 15.0, 15.0), "inside M0 and M1 only");
        assert!(!s.hit(e, FULL, 75.0, 5.0), "inside M0 only");
    }

    #[test]
    fn buffer_origin_policy_flips_rows() {
        let mut s = Scene::new();
        s.settings.buffer_origin = BufferOrigin::TopLeft;
        s.device.origin = BufferOrigin::TopLeft;
        let (m, _) = s.mask(s.canvas, Rect::new(0.0, 0.0, 100.0, 20.0), MaskingMode::SoftMasking);
        let e = s.tree.insert(Some(m));
        s.composite();
        assert!(s.hit(e, FULL, 50.0, 10.0));
        assert!(!s.hit(e, FULL, 50.0, 90.0));
    }

    #[test]
    fn unreadable_buffer_passes() {
        let mut s = Scene::new();
        let (m, _) = s.mask(s.canvas, Rect::new(0.0, 0.0, 10.0, 10.0), MaskingMode::SoftMasking);
        let e = s.tree.insert(Some(m));
        s.composite();
        s.device.unreadable = true;
        assert!(s.hit(e, FULL, 50.0, 50.0), "the test cannot be performed");
    }

    #[test]
    fn stencil_mask_tests_geometry_and_shapes() {
        let mut s = Scene::new();
        let (m, id) = s.mask(s.canvas, Rect::new(0.0, 0.0, 50.0, 50.0), MaskingMode::Normal);
        let e = s.tree.insert(Some(m));

        let hole_element = s.tree.insert(Some(m));
        let mut hole = MaskingShape::new(hole_element, ShapeMethod::Subtract);
        hole.bounds = Rect::new(10.0, 10.0, 20.0, 20.0);
        let _ = s.shapes.register(Some(id), hole);

        let extra_element = s.tree.insert(Some(m));
        let mut extra = MaskingShape::new(extra_element, ShapeMethod::Additive);
        extra.bounds = Rect::new(60.0, 60.0, 70.0, 70.0);
        let _ = s.shapes.register(Some(id), extra);

        assert!(s.hit(e, FULL, 30.0, 30.0), "inside bounds");
        assert!(!s.hit(e, FULL, 15.0, 15.0), "inside the subtracted hole");
        assert!(s.hit(e, FULL, 65.0, 65.0), "inside the additive shape");
        assert!(!s.hit(e, FULL, 90.0, 90.0), "outside everything");
    }

    #[test]
    fn alpha_hit_test_samples_source_texture() {
        let mut s = Scene::new();
        let (m, id) = s.mask(s.canvas, Rect::new(0.0, 0.0, 50.0, 50.0), MaskingMode::Normal);
        let e = s.tree.insert(Some(m));
        s.store.set_alpha_hit_test(id, true);
        s.store.set_texture(id, Some(TextureId(5)));

        assert!(s.hit(e, FULL, 25.0, 25.0), "unreadable texture passes");

        s.validator.invalidate_frame();
        s.device.texture_alpha.insert(TextureId(5), 0.0);
        assert!(!s.hit(e, FULL, 25.0, 25.0), "transparent pixel");

        s.validator.invalidate_frame();
        s.device.texture_alpha.insert(TextureId(5), 0.5);
        assert!(s.hit(e, FULL, 25.0, 25.0), "opaque pixel");
    }

    #[test]
    fn results_are_cached_until_invalidated() {
        let mut s = Scene::new();
        let (m, _) = s.mask(s.canvas, Rect::new(0.0, 0.0, 40.0, 40.0), MaskingMode::SoftMasking);
        let e = s.tree.insert(Some(m));
        s.composite();
        assert!(!s.hit(e, FULL, 70.0, 70.0));
        assert_eq!(s.validator.cached_len(), 1);

        s.device.unreadable = true;
        assert!(!s.hit(e, FULL, 70.0, 70.0), "same frame, same answer");
        s.validator.invalidate_frame();
        assert!(s.hit(e, FULL, 70.0, 70.0), "recomputed after invalidation");
    }
}
