// Copyright 2026 the Softmask Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dirty-root compositing into the channels of one buffer per root.
//!
//! For each dirty root the compositor:
//!
//! 1. Sizes the buffer from the viewport and the root's down-sampling rate.
//! 2. Buckets the subtree breadth-first by level: the root is level 0, each
//!    child one deeper unless it is part of its parent's level. Levels that
//!    would reach past the last channel (`base_depth + level >= 4`) are
//!    dropped and render unmasked.
//! 3. Clears to the colour for the root's base stencil depth.
//! 4. Emits one draw per node graphic and per registered shape, level by
//!    level, each writing channel `3 - base_depth - level`.
//! 5. Submits the batch and clears `is_dirty` across the subtree.
//!
//! Roots whose graphic lies entirely outside the viewport are not drawn and
//! stay dirty. A buffer that still holds a previous drawing gets one
//! clear-only batch.

use alloc::vec::Vec;

use kurbo::{Point, Rect};
use softmask_core::MAX_SOFT_MASK_DEPTH;
use softmask_core::mask::{MaskId, MaskStore, ShapeMethod, ShapeRegistry};
use softmask_core::resource::{BufferId, BufferSize};
use softmask_core::trace::{
    CompositeEvent, CompositeOutcome, FallbackEvent, FallbackReason, Tracer,
};

use crate::device::GraphicsDevice;
use crate::plan::{
    CanvasView, CompositePlan, CompositeUniforms, DrawCommand, clear_color_for_base_depth,
};
use crate::pool::BufferPool;

/// Counters for one compositing pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CompositeStats {
    /// Dirty roots visited.
    pub roots: u32,
    /// Roots drawn.
    pub drawn: u32,
    /// Off-screen roots whose stale buffer was cleared.
    pub cleared: u32,
    /// Off-screen roots left untouched.
    pub skipped: u32,
    /// Roots whose buffer could not be allocated.
    pub failed: u32,
    /// Nodes dropped for exceeding the channel count.
    pub depth_exceeded: u32,
    /// Draw commands submitted.
    pub commands: u32,
}

/// Composites dirty mask subtrees into their roots' buffers.
#[derive(Debug, Default)]
pub struct BufferCompositor {
    viewport: Option<BufferSize>,
}

impl BufferCompositor {
    /// Creates a compositor that has not seen a viewport yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The viewport pixel size of the previous pass.
    #[must_use]
    pub fn viewport(&self) -> Option<BufferSize> {
        self.viewport
    }

    /// Detects a viewport resize.
    ///
    /// On a size change every pooled buffer is destroyed, every node forgets
    /// its buffer and is marked dirty, and the destroyed handles are returned
    /// so derived materials bound to them can be retired. The first call only
    /// records the size.
    pub fn handle_resize<D: GraphicsDevice + ?Sized>(
        &mut self,
        view: &CanvasView,
        store: &mut MaskStore,
        pool: &mut BufferPool,
        device: &mut D,
        tracer: &mut Tracer<'_>,
    ) -> Vec<BufferId> {
        let size = view.pixel_size();
        let previous = self.viewport.replace(size);
        if previous.is_none_or(|p| p == size) {
            return Vec::new();
        }
        let destroyed = pool.invalidate_all(device, tracer);
        store.forget_buffers();
        destroyed
    }

    /// Composites every dirty root.
    pub fn composite_dirty_roots<D: GraphicsDevice + ?Sized>(
        &mut self,
        store: &mut MaskStore,
        shapes: &ShapeRegistry,
        pool: &mut BufferPool,
        device: &mut D,
        view: &CanvasView,
        tracer: &mut Tracer<'_>,
        frame_index: u64,
    ) -> CompositeStats {
        let mut stats = CompositeStats::default();
        release_queued(store, pool, tracer);

        for root in store.dirty_roots() {
            stats.roots += 1;
            Self::composite_root(
                root,
                store,
                shapes,
                pool,
                device,
                view,
                tracer,
                frame_index,
                &mut stats,
            );
        }
        stats
    }

    fn composite_root<D: GraphicsDevice + ?Sized>(
        root: MaskId,
        store: &mut MaskStore,
        shapes: &ShapeRegistry,
        pool: &mut BufferPool,
        device: &mut D,
        view: &CanvasView,
        tracer: &mut Tracer<'_>,
        frame_index: u64,
        stats: &mut CompositeStats,
    ) {
        let base = store.base_depth(root);
        let mut event = CompositeEvent {
            frame_index,
            root,
            buffer: store.buffer(root),
            outcome: CompositeOutcome::Skipped,
            levels: 0,
            commands: 0,
        };

        if base >= MAX_SOFT_MASK_DEPTH {
            // The whole subtree renders unmasked.
            tracer.fallback(&FallbackEvent {
                reason: FallbackReason::DepthExceeded { depth: base },
                element: Some(store.element(root)),
                mask: Some(root),
            });
            stats.depth_exceeded += 1;
            stats.skipped += 1;
            clear_subtree(store, root);
            if store.buffer(root).is_some() {
                store.set_buffer(root, None);
                release_queued(store, pool, tracer);
                event.buffer = None;
            }
            tracer.composite(&event);
            return;
        }

        let viewport = Rect::from_origin_size(Point::ORIGIN, view.viewport);
        let visible = store.bounds(root).intersect(viewport);
        if visible.width() <= 0.0 || visible.height() <= 0.0 {
            match store.buffer(root) {
                Some(buffer) if store.has_drawn(root) => {
                    let size = pool
                        .size_of(buffer)
                        .unwrap_or_else(|| buffer_size(store, root, view));
                    let mut plan = CompositePlan::new(root, buffer, size, view);
                    plan.clear_color = clear_color_for_base_depth(base);
                    device.submit(&plan);
                    store.set_drawn(root, false);
                    event.outcome = CompositeOutcome::Cleared;
                    stats.cleared += 1;
                }
                _ => stats.skipped += 1,
            }
            tracer.composite(&event);
            return;
        }

        let size = buffer_size(store, root, view);
        if let Some(current) = store.buffer(root) {
            if pool.size_of(current) != Some(size) {
                store.set_buffer(root, None);
                release_queued(store, pool, tracer);
            }
        }
        let buffer = match store.buffer(root) {
            Some(buffer) => buffer,
            None => match pool.acquire(device, size, tracer) {
                Ok(buffer) => {
                    store.set_buffer(root, Some(buffer));
                    buffer
                }
                Err(err) => {
                    // Stays dirty; the next frame retries.
                    tracer.fallback(&FallbackEvent {
                        reason: FallbackReason::Resource(err),
                        element: Some(store.element(root)),
                        mask: Some(root),
                    });
                    stats.failed += 1;
                    event.buffer = None;
                    tracer.composite(&event);
                    return;
                }
            },
        };

        let (levels, excluded) = collect_levels(store, root, base);
        for &(node, level) in &excluded {
            tracer.fallback(&FallbackEvent {
                reason: FallbackReason::DepthExceeded {
                    depth: base.saturating_add(level),
                },
                element: Some(store.element(node)),
                mask: Some(node),
            });
            stats.depth_exceeded += 1;
        }

        let mut plan = CompositePlan::new(root, buffer, size, view);
        plan.clear_color = clear_color_for_base_depth(base);
        for &(node, level) in &levels {
            let channel = MAX_SOFT_MASK_DEPTH - 1 - base - level;
            let mesh = store.mesh(node);
            if !mesh.is_empty() {
                let texture = store.texture(node);
                plan.commands.push(DrawCommand {
                    mask: node,
                    shape: None,
                    level,
                    channel,
                    method: ShapeMethod::Additive,
                    texture,
                    vertices: mesh.to_vec(),
                    uniforms: uniforms(
                        store.softness(node).to_array(),
                        ShapeMethod::Additive,
                        texture.is_some(),
                        channel,
                    ),
                });
            }
            for &shape_id in shapes.shapes_for(node) {
                let Some(shape) = shapes.get(shape_id) else {
                    continue;
                };
                if shape.mesh.is_empty() {
                    continue;
                }
                plan.commands.push(DrawCommand {
                    mask: node,
                    shape: Some(shape_id),
                    level,
                    channel,
                    method: shape.method,
                    texture: shape.texture,
                    vertices: shape.mesh.clone(),
                    uniforms: uniforms(
                        shape.softness.to_array(),
                        shape.method,
                        shape.texture.is_some(),
                        channel,
                    ),
                });
            }
        }

        device.submit(&plan);
        store.set_drawn(root, true);
        clear_subtree(store, root);

        let commands = u32::try_from(plan.commands.len()).unwrap_or(u32::MAX);
        stats.drawn += 1;
        stats.commands += commands;
        event.buffer = Some(buffer);
        event.outcome = CompositeOutcome::Drawn;
        event.levels = levels.iter().map(|&(_, l)| l + 1).max().unwrap_or(0);
        event.commands = commands;
        tracer.composite(&event);
    }
}

fn buffer_size(store: &MaskStore, root: MaskId, view: &CanvasView) -> BufferSize {
    let px = view.pixel_size();
    store
        .config(root)
        .down_sampling
        .buffer_size(px.width, px.height)
}

/// Breadth-first level assignment below `root`.
///
/// Returns the drawable `(node, level)` pairs sorted by level (stable, so
/// insertion order holds within a level) and the nodes dropped for exceeding
/// the channel count. Children of dropped nodes are not visited.
fn collect_levels(
    store: &MaskStore,
    root: MaskId,
    base: u8,
) -> (Vec<(MaskId, u8)>, Vec<(MaskId, u8)>) {
    let mut levels = Vec::new();
    let mut excluded = Vec::new();
    levels.push((root, 0_u8));
    let mut head = 0;
    while head < levels.len() {
        let (node, level) = levels[head];
        head += 1;
        for child in store.children(node) {
            if !store.is_enabled(child) || !store.mode(child).composites_soft_mask() {
                continue;
            }
            let child_level = if store.config(child).part_of_parent {
                level
            } else {
                level.saturating_add(1)
            };
            if base.saturating_add(child_level) < MAX_SOFT_MASK_DEPTH {
                levels.push((child, child_level));
            } else {
                excluded.push((child, child_level));
            }
        }
    }
    levels.sort_by_key(|&(_, level)| level);
    (levels, excluded)
}

fn uniforms(
    softness: [f32; 2],
    method: ShapeMethod,
    textured: bool,
    channel: u8,
) -> CompositeUniforms {
    let mut channel_selector = [0.0; 4];
    channel_selector[usize::from(MAX_SOFT_MASK_DEPTH - 1 - channel)] = 1.0;
    CompositeUniforms {
        softness,
        subtract: u32::from(method == ShapeMethod::Subtract),
        has_texture: u32::from(textured),
        channel_selector,
    }
}

fn clear_subtree(store: &mut MaskStore, root: MaskId) {
    for id in store.subtree(root) {
        store.clear_dirty(id);
    }
}

fn release_queued(store: &mut MaskStore, pool: &mut BufferPool, tracer: &mut Tracer<'_>) {
    for buffer in store.take_released_buffers() {
        pool.release(buffer, tracer);
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use kurbo::Size;
    use softmask_core::hierarchy::{ElementId, ElementTree};
    use softmask_core::mask::{DownSamplingRate, MaskConfig, MaskingShape};
    use softmask_core::mesh::Vertex;

    use super::*;
    use crate::testing::FakeDevice;

    fn quad(x0: f32, y0: f32, x1: f32, y1: f32) -> Vec<Vertex> {
        vec![
            Vertex::new(x0, y0, 0.0, 0.0),
            Vertex::new(x1, y0, 1.0, 0.0),
            Vertex::new(x1, y1, 1.0, 1.0),
            Vertex::new(x0, y1, 0.0, 1.0),
        ]
    }

    struct Fixture {
        tree: ElementTree,
        store: MaskStore,
        shapes: ShapeRegistry,
        pool: BufferPool,
        device: FakeDevice,
        compositor: BufferCompositor,
        view: CanvasView,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                tree: ElementTree::new(),
                store: MaskStore::new(),
                shapes: ShapeRegistry::new(),
                pool: BufferPool::new(),
                device: FakeDevice::new(),
                compositor: BufferCompositor::new(),
                view: CanvasView::overlay(Size::new(100.0, 100.0)),
            }
        }

        /// Adds an enabled soft mask under `parent` covering `rect`.
        fn mask(
            &mut self,
            parent: Option<ElementId>,
            rect: Rect,
            config: MaskConfig,
        ) -> (ElementId, MaskId) {
            let e = self.tree.insert(parent);
            let id = self.store.create_mask(e, config);
            self.store.enable(id, &self.tree);
            self.store.set_bounds(id, rect);
            #[expect(clippy::cast_possible_truncation, reason = "test geometry is small")]
            let mesh = quad(rect.x0 as f32, rect.y0 as f32, rect.x1 as f32, rect.y1 as f32);
            self.store.set_mesh(id, &mesh);
            (e, id)
        }

        fn composite(&mut self) -> CompositeStats {
            let _ = self.compositor.handle_resize(
                &self.view,
                &mut self.store,
                &mut self.pool,
                &mut self.device,
                &mut Tracer::none(),
            );
            let _ = self.store.collect_dirty();
            self.compositor.composite_dirty_roots(
                &mut self.store,
                &self.shapes,
                &mut self.pool,
                &mut self.device,
                &self.view,
                &mut Tracer::none(),
                0,
            )
        }
    }

    fn nested_three(f: &mut Fixture) -> [MaskId; 3] {
        let (e0, m0) = f.mask(None, Rect::new(0.0, 0.0, 80.0, 80.0), MaskConfig::default());
        let (e1, m1) = f.mask(Some(e0), Rect::new(10.0, 10.0, 70.0, 70.0), MaskConfig::default());
        let (_, m2) = f.mask(Some(e1), Rect::new(20.0, 20.0, 60.0, 60.0), MaskConfig::default());
        [m0, m1, m2]
    }

    #[test]
    fn three_levels_write_channels_three_two_one() {
        let mut f = Fixture::new();
        let [m0, m1, m2] = nested_three(&mut f);
        let stats = f.composite();
        assert_eq!(stats.drawn, 1, "one root, one batch");

        let buffer = f.store.buffer(m0).expect("root owns a buffer");
        assert_eq!(f.store.buffer(m1), None, "non-roots never own buffers");
        let plan = f.device.last_plan(buffer).expect("submitted");
        let channels: Vec<(MaskId, u8)> =
            plan.commands.iter().map(|c| (c.mask, c.channel)).collect();
        assert_eq!(channels, vec![(m0, 3), (m1, 2), (m2, 1)]);
        assert_eq!(plan.populated_channels(), 0b1110, "D + 1 populated channels");
        assert_eq!(plan.clear_color, [0.0; 4]);

        // A pixel covered by all three levels is inside in R, G and B.
        let px = f.device.read_buffer_pixel(buffer, 40, 50).expect("readable");
        assert_eq!(px[0] * px[1] * px[2], 1.0);
        assert!([m0, m1, m2].iter().all(|&m| !f.store.is_dirty(m)));
    }

    #[test]
    fn clean_roots_are_not_redrawn() {
        let mut f = Fixture::new();
        let _ = nested_three(&mut f);
        let _ = f.composite();
        let stats = f.composite();
        assert_eq!(stats.roots, 0);
        assert_eq!(f.device.plans.len(), 1);
    }

    #[test]
    fn child_change_redraws_whole_root() {
        let mut f = Fixture::new();
        let [m0, _, m2] = nested_three(&mut f);
        let _ = f.composite();
        f.store.set_bounds(m2, Rect::new(25.0, 25.0, 55.0, 55.0));
        let stats = f.composite();
        assert_eq!(stats.drawn, 1);
        let plan = f.device.plans.last().expect("submitted");
        assert_eq!(plan.root, m0);
        assert_eq!(plan.commands.len(), 3);
    }

    #[test]
    fn base_depth_shifts_channels_and_clear_color() {
        let mut f = Fixture::new();
        let [m0, m1, m2] = nested_three(&mut f);
        f.store.set_base_depth(m0, 1);
        let stats = f.composite();
        let plan = f.device.plans.last().expect("submitted");
        assert_eq!(plan.clear_color, [1.0, 0.0, 0.0, 0.0]);
        let channels: Vec<(MaskId, u8)> =
            plan.commands.iter().map(|c| (c.mask, c.channel)).collect();
        assert_eq!(channels, vec![(m0, 2), (m1, 1), (m2, 0)]);
        assert_eq!(stats.depth_exceeded, 0);
    }

    #[test]
    fn levels_past_the_last_channel_are_dropped() {
        let mut f = Fixture::new();
        let [m0, _, m2] = nested_three(&mut f);
        let e2 = f.store.element(m2);
        let (_, m3) = f.mask(Some(e2), Rect::new(30.0, 30.0, 50.0, 50.0), MaskConfig::default());
        f.store.set_base_depth(m0, 1);
        let stats = f.composite();
        assert_eq!(stats.depth_exceeded, 1);
        let plan = f.device.plans.last().expect("submitted");
        assert!(plan.commands.iter().all(|c| c.mask != m3), "m3 renders unmasked");
        assert!(plan.commands.iter().all(|c| c.channel < 4));
        assert!(!f.store.is_dirty(m3), "dropped nodes do not keep the root dirty");
    }

    #[test]
    fn root_pushed_past_the_last_channel_returns_its_buffer() {
        let mut f = Fixture::new();
        let (_, m0) = f.mask(None, Rect::new(0.0, 0.0, 50.0, 50.0), MaskConfig::default());
        assert_eq!(f.composite().drawn, 1);
        assert!(f.store.buffer(m0).is_some());

        f.store.set_base_depth(m0, MAX_SOFT_MASK_DEPTH);
        let stats = f.composite();
        assert_eq!(stats.depth_exceeded, 1);
        assert_eq!(f.store.buffer(m0), None, "unmasked roots hold no buffer");
        assert_eq!((f.pool.live_count(), f.pool.idle_count()), (0, 1));

        f.store.set_base_depth(m0, 0);
        assert_eq!(f.composite().drawn, 1);
        assert_eq!(f.device.created_buffers, 1, "the pooled buffer is reused");
    }

    #[test]
    fn part_of_parent_shares_channel() {
        let mut f = Fixture::new();
        let (e0, m0) = f.mask(None, Rect::new(0.0, 0.0, 50.0, 50.0), MaskConfig::default());
        let (_, m1) = f.mask(
            Some(e0),
            Rect::new(10.0, 10.0, 40.0, 40.0),
            MaskConfig {
                part_of_parent: true,
                ..MaskConfig::default()
            },
        );
        let _ = f.composite();
        let plan = f.device.last_plan(f.store.buffer(m0).expect("buffer")).expect("submitted");
        let channels: Vec<(MaskId, u8)> =
            plan.commands.iter().map(|c| (c.mask, c.channel)).collect();
        assert_eq!(channels, vec![(m0, 3), (m1, 3)]);
    }

    #[test]
    fn shapes_follow_their_node_in_order() {
        let mut f = Fixture::new();
        let (e0, m0) = f.mask(None, Rect::new(0.0, 0.0, 50.0, 50.0), MaskConfig::default());
        let hole_element = f.tree.insert(Some(e0));
        let mut hole = MaskingShape::new(hole_element, ShapeMethod::Subtract);
        hole.mesh = quad(10.0, 10.0, 20.0, 20.0);
        hole.bounds = Rect::new(10.0, 10.0, 20.0, 20.0);
        let hole_id = f.shapes.register(Some(m0), hole);
        f.store.mark_shapes_changed(m0);
        let _ = f.composite();

        let buffer = f.store.buffer(m0).expect("buffer");
        let plan = f.device.last_plan(buffer).expect("submitted");
        assert_eq!(plan.commands.len(), 2);
        assert_eq!(plan.commands[1].shape, Some(hole_id));
        assert_eq!(plan.commands[1].channel, 3);
        assert_eq!(plan.commands[1].uniforms.subtract, 1);

        f.device.origin = softmask_core::settings::BufferOrigin::TopLeft;
        let inside_hole = f.device.read_buffer_pixel(buffer, 15, 15).expect("readable");
        let outside_hole = f.device.read_buffer_pixel(buffer, 30, 30).expect("readable");
        assert_eq!(inside_hole[0], 0.0);
        assert_eq!(outside_hole[0], 1.0);
    }

    #[test]
    fn off_screen_root_is_cleared_once_then_skipped() {
        let mut f = Fixture::new();
        let (_, m0) = f.mask(None, Rect::new(0.0, 0.0, 50.0, 50.0), MaskConfig::default());
        let _ = f.composite();
        let buffer = f.store.buffer(m0).expect("buffer");

        f.store.set_bounds(m0, Rect::new(200.0, 200.0, 250.0, 250.0));
        let stats = f.composite();
        assert_eq!(stats.cleared, 1);
        let plan = f.device.plans.last().expect("clear submitted");
        assert_eq!(plan.target, buffer);
        assert!(plan.is_clear_only());
        assert!(f.store.is_dirty(m0), "off-screen roots stay dirty");

        let stats = f.composite();
        assert_eq!((stats.cleared, stats.skipped), (0, 1));
        assert_eq!(f.device.plans.len(), 2);
    }

    #[test]
    fn buffer_is_sized_by_down_sampling() {
        let mut f = Fixture::new();
        let (_, m0) = f.mask(
            None,
            Rect::new(0.0, 0.0, 50.0, 50.0),
            MaskConfig {
                down_sampling: DownSamplingRate::X4,
                ..MaskConfig::default()
            },
        );
        let _ = f.composite();
        let buffer = f.store.buffer(m0).expect("buffer");
        assert_eq!(f.pool.size_of(buffer), Some(BufferSize::new(25, 25)));
    }

    #[test]
    fn resize_recreates_buffers() {
        let mut f = Fixture::new();
        let (_, m0) = f.mask(None, Rect::new(0.0, 0.0, 50.0, 50.0), MaskConfig::default());
        let _ = f.composite();
        let old = f.store.buffer(m0).expect("buffer");

        f.view = CanvasView::overlay(Size::new(200.0, 100.0));
        let destroyed = f.compositor.handle_resize(
            &f.view,
            &mut f.store,
            &mut f.pool,
            &mut f.device,
            &mut Tracer::none(),
        );
        assert_eq!(destroyed, vec![old]);
        assert_eq!(f.store.buffer(m0), None);

        let stats = f.composite();
        assert_eq!(stats.drawn, 1);
        let new = f.store.buffer(m0).expect("buffer");
        assert_ne!(new, old);
        assert_eq!(f.pool.size_of(new), Some(BufferSize::new(200, 100)));
    }

    #[test]
    fn allocation_failure_keeps_root_dirty() {
        let mut f = Fixture::new();
        let (_, m0) = f.mask(None, Rect::new(0.0, 0.0, 50.0, 50.0), MaskConfig::default());
        f.device.fail_buffers = true;
        let stats = f.composite();
        assert_eq!(stats.failed, 1);
        assert!(f.store.is_dirty(m0));
        f.device.fail_buffers = false;
        assert_eq!(f.composite().drawn, 1);
    }

    #[test]
    fn disabled_root_buffer_returns_to_pool() {
        let mut f = Fixture::new();
        let (_, m0) = f.mask(None, Rect::new(0.0, 0.0, 50.0, 50.0), MaskConfig::default());
        let _ = f.composite();
        f.store.disable(m0);
        let _ = f.composite();
        assert_eq!((f.pool.live_count(), f.pool.idle_count()), (0, 1));
    }
}
