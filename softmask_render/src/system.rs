// Copyright 2026 the Softmask Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Host integration facade.
//!
//! [`SoftMaskSystem`] owns every registry of one UI context (mask tree,
//! shapes, depth cache, buffer pool, material cache, raycast cache) and maps
//! the host's callbacks onto them. Create one per UI context and call
//! [`teardown`](SoftMaskSystem::teardown) when the context goes away.
//!
//! # Frame loop
//!
//! ```rust,ignore
//! fn on_frame(host: &mut Host) {
//!     system.on_before_rebuild(&host.tree, &mut tracer);
//!
//!     // The host regenerates meshes; mask and shape graphics pass through
//!     // the mesh hook so the system can capture their geometry.
//!     for (element, vertices) in host.rebuilt_meshes() {
//!         system.modify_mesh(element, vertices);
//!     }
//!
//!     system.on_after_rebuild(&mut host.device, host.canvas_view(), &mut tracer);
//!
//!     // Drawing: every element asks for its material.
//!     for element in host.draw_list() {
//!         let material = system.modify_material(
//!             &host.tree, &mut host.device, &mut tracer, element, host.material(element),
//!         );
//!         host.draw(element, material);
//!     }
//! }
//! ```

use alloc::vec::Vec;

use kurbo::{Affine, Point, Size};
use softmask_core::depth::StencilDepthResolver;
use softmask_core::hierarchy::{ElementId, Hierarchy, ancestors};
use softmask_core::mask::{
    MaskChanges, MaskConfig, MaskId, MaskStore, MaskingShape, ShapeId, ShapeRegistry,
};
use softmask_core::mesh::Vertex;
use softmask_core::resource::MaterialId;
use softmask_core::settings::SoftMaskSettings;
use softmask_core::trace::{PhaseBeginEvent, PhaseEndEvent, PhaseKind, Tracer};

use crate::compositor::{BufferCompositor, CompositeStats};
use crate::device::GraphicsDevice;
use crate::material::MaterialResolver;
use crate::plan::CanvasView;
use crate::pool::BufferPool;
use crate::raycast::{RaycastTarget, RaycastValidator};

/// Soft masking for one UI context.
#[derive(Debug)]
pub struct SoftMaskSystem {
    settings: SoftMaskSettings,
    store: MaskStore,
    shapes: ShapeRegistry,
    depths: StencilDepthResolver,
    pool: BufferPool,
    compositor: BufferCompositor,
    materials: MaterialResolver,
    raycast: RaycastValidator,
    changes: MaskChanges,
    view: CanvasView,
    frame_index: u64,
    hierarchy_changed: bool,
    stale_materials: Vec<ElementId>,
}

impl Default for SoftMaskSystem {
    fn default() -> Self {
        Self::new(SoftMaskSettings::new())
    }
}

impl SoftMaskSystem {
    /// Creates an empty system.
    #[must_use]
    pub fn new(settings: SoftMaskSettings) -> Self {
        Self {
            settings,
            store: MaskStore::new(),
            shapes: ShapeRegistry::new(),
            depths: StencilDepthResolver::new(),
            pool: BufferPool::new(),
            compositor: BufferCompositor::new(),
            materials: MaterialResolver::new(),
            raycast: RaycastValidator::new(),
            changes: MaskChanges::default(),
            view: CanvasView::overlay(Size::ZERO),
            frame_index: 0,
            hierarchy_changed: false,
            stale_materials: Vec::new(),
        }
    }

    /// The global settings.
    #[must_use]
    pub fn settings(&self) -> &SoftMaskSettings {
        &self.settings
    }

    /// Replaces the global settings. Elements pick up the change the next
    /// time their material is resolved.
    pub fn set_settings(&mut self, settings: SoftMaskSettings) {
        self.settings = settings;
    }

    /// A mask configuration carrying the default down-sampling rate.
    #[must_use]
    pub fn default_mask_config(&self) -> MaskConfig {
        MaskConfig {
            down_sampling: self.settings.default_down_sampling,
            ..MaskConfig::default()
        }
    }

    /// The mask tree.
    #[must_use]
    pub fn store(&self) -> &MaskStore {
        &self.store
    }

    /// The mask tree, for property updates (bounds, softness, mode, ...).
    pub fn store_mut(&mut self) -> &mut MaskStore {
        &mut self.store
    }

    /// The shape registry.
    #[must_use]
    pub fn shapes(&self) -> &ShapeRegistry {
        &self.shapes
    }

    /// The derived material cache.
    #[must_use]
    pub fn materials(&self) -> &MaterialResolver {
        &self.materials
    }

    /// The buffer pool.
    #[must_use]
    pub fn pool(&self) -> &BufferPool {
        &self.pool
    }

    /// Mask graphics whose anti-aliasing threshold changed since their
    /// material was resolved, as of the last
    /// [`on_before_rebuild`](Self::on_before_rebuild). The host runs the
    /// material hook for each of them again.
    #[must_use]
    pub fn stale_materials(&self) -> &[ElementId] {
        &self.stale_materials
    }

    /// Number of [`on_before_rebuild`](Self::on_before_rebuild) calls so far.
    #[must_use]
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    // -- Masks and shapes --

    /// Creates a mask node for `element`, enabling it right away when the
    /// element is active.
    pub fn add_mask<H: Hierarchy + ?Sized>(
        &mut self,
        hierarchy: &H,
        element: ElementId,
        config: MaskConfig,
    ) -> MaskId {
        let id = self.store.create_mask(element, config);
        if hierarchy.is_active(element) {
            self.store.enable(id, hierarchy);
        }
        self.hierarchy_changed = true;
        id
    }

    /// Destroys a mask node. Its shapes stay registered and are re-homed at
    /// the next [`on_before_rebuild`](Self::on_before_rebuild).
    pub fn remove_mask(&mut self, id: MaskId) {
        let _ = self.shapes.detach_all(id);
        self.store.destroy_mask(id);
        self.hierarchy_changed = true;
    }

    /// Enables a mask node (its element became active).
    pub fn enable_mask<H: Hierarchy + ?Sized>(&mut self, hierarchy: &H, id: MaskId) {
        self.store.enable(id, hierarchy);
        self.hierarchy_changed = true;
    }

    /// Disables a mask node (its element became inactive).
    pub fn disable_mask(&mut self, id: MaskId) {
        self.store.disable(id);
        self.hierarchy_changed = true;
    }

    /// Registers a masking shape with the nearest enabled mask above its
    /// element.
    pub fn add_shape<H: Hierarchy + ?Sized>(
        &mut self,
        hierarchy: &H,
        shape: MaskingShape,
    ) -> ShapeId {
        let owner = self.owner_for(hierarchy, shape.element);
        let id = self.shapes.register(owner, shape);
        if let Some(owner) = owner {
            self.shapes.sort(owner, hierarchy);
            self.store.mark_shapes_changed(owner);
        }
        id
    }

    /// Unregisters a shape, returning its data.
    pub fn remove_shape(&mut self, id: ShapeId) -> Option<MaskingShape> {
        let (owner, shape) = self.shapes.unregister(id)?;
        self.mark_shapes_changed(owner);
        Some(shape)
    }

    /// Edits a shape in place and schedules its mask for recompositing.
    /// Returns `false` for a stale handle.
    pub fn update_shape(&mut self, id: ShapeId, edit: impl FnOnce(&mut MaskingShape)) -> bool {
        let Some(shape) = self.shapes.get_mut(id) else {
            return false;
        };
        edit(shape);
        self.mark_shapes_changed(self.shapes.owner(id));
        true
    }

    /// Records that the host re-parented, activated or deactivated elements,
    /// or toggled a mask component.
    pub fn notify_hierarchy_changed(&mut self) {
        self.hierarchy_changed = true;
    }

    // -- Frame callbacks --

    /// Runs before the host rebuilds meshes.
    ///
    /// Drops last frame's caches, re-derives the tree after a hierarchy
    /// change, and folds pending changes into the per-node dirty flags.
    /// Anti-aliased graphics whose threshold moved are listed in
    /// [`stale_materials`](Self::stale_materials).
    pub fn on_before_rebuild<H: Hierarchy + ?Sized>(
        &mut self,
        hierarchy: &H,
        tracer: &mut Tracer<'_>,
    ) {
        self.frame_index += 1;
        let frame_index = self.frame_index;
        tracer.phase_begin(&PhaseBeginEvent {
            frame_index,
            phase: PhaseKind::BeforeRebuild,
        });

        self.depths.invalidate_frame();
        self.raycast.invalidate_frame();

        let hierarchy_changed = core::mem::take(&mut self.hierarchy_changed);
        if hierarchy_changed {
            self.depths.on_hierarchy_changed();
            let _ = self.store.refresh_parents(hierarchy);
            self.reassign_shapes(hierarchy);
        }
        self.store.collect_dirty_into(&mut self.changes);
        self.stale_materials = self.materials.stale_alpha_clips(&self.store);
        if hierarchy_changed || self.changes.topology_changed {
            self.refresh_base_depths(hierarchy);
            for id in self.store.ids() {
                self.shapes.sort(id, hierarchy);
            }
        }

        #[cfg(feature = "trace-rich")]
        {
            let dirty: Vec<MaskId> = self
                .store
                .ids()
                .into_iter()
                .filter(|&id| self.store.is_dirty(id))
                .collect();
            tracer.dirty_masks(frame_index, &dirty);
        }

        tracer.phase_end(&PhaseEndEvent {
            frame_index,
            phase: PhaseKind::BeforeRebuild,
        });
    }

    /// Runs after the host rebuilt meshes: handles viewport resizes and
    /// composites every dirty root.
    pub fn on_after_rebuild<D: GraphicsDevice + ?Sized>(
        &mut self,
        device: &mut D,
        view: CanvasView,
        tracer: &mut Tracer<'_>,
    ) -> CompositeStats {
        let frame_index = self.frame_index;
        tracer.phase_begin(&PhaseBeginEvent {
            frame_index,
            phase: PhaseKind::AfterRebuild,
        });

        self.view = view;
        let destroyed =
            self.compositor
                .handle_resize(&view, &mut self.store, &mut self.pool, device, tracer);
        if !destroyed.is_empty() {
            self.materials.retire_buffers(&destroyed, tracer);
        }

        let stats = if self.settings.enabled {
            self.compositor.composite_dirty_roots(
                &mut self.store,
                &self.shapes,
                &mut self.pool,
                device,
                &view,
                tracer,
                frame_index,
            )
        } else {
            for buffer in self.store.take_released_buffers() {
                self.pool.release(buffer, tracer);
            }
            CompositeStats::default()
        };

        let trimmed = self.pool.trim(device, tracer);
        if !trimmed.is_empty() {
            self.materials.retire_buffers(&trimmed, tracer);
        }

        tracer.phase_end(&PhaseEndEvent {
            frame_index,
            phase: PhaseKind::AfterRebuild,
        });
        stats
    }

    // -- Per-element hooks --

    /// Mesh hook for mask and shape graphics.
    ///
    /// Captures the vertices for compositing. When the graphic is configured
    /// hidden, `vertices` is cleared so the host draws nothing for it. Other
    /// elements are left untouched.
    pub fn modify_mesh(&mut self, element: ElementId, vertices: &mut Vec<Vertex>) {
        if let Some(id) = self.store.find(element) {
            self.store.set_mesh(id, vertices);
            if !self.store.config(id).show_graphic {
                vertices.clear();
            }
            return;
        }
        let Some(id) = self.shapes.find(element) else {
            return;
        };
        let Some(shape) = self.shapes.get_mut(id) else {
            return;
        };
        shape.set_mesh(vertices);
        let hide = !shape.show_source_graphic;
        self.mark_shapes_changed(self.shapes.owner(id));
        if hide {
            vertices.clear();
        }
    }

    /// Reports the world transform of a mask graphic. Returns whether the
    /// move exceeded the transform sensitivity and scheduled a recomposite.
    pub fn set_world_transform(&mut self, element: ElementId, transform: Affine) -> bool {
        let Some(id) = self.store.find(element) else {
            return false;
        };
        let threshold = self.settings.transform_sensitivity.threshold();
        self.store.set_world_transform(id, transform, threshold)
    }

    /// Material hook: returns the material `element` should draw with.
    pub fn modify_material<H: Hierarchy + ?Sized, D: GraphicsDevice + ?Sized>(
        &mut self,
        hierarchy: &H,
        device: &mut D,
        tracer: &mut Tracer<'_>,
        element: ElementId,
        base: MaterialId,
    ) -> MaterialId {
        self.materials.resolve(
            &self.settings,
            hierarchy,
            &self.store,
            &mut self.depths,
            device,
            tracer,
            element,
            base,
        )
    }

    /// Raycast hook: returns whether a hit at `point` on `target` is valid,
    /// using the canvas view of the last [`on_after_rebuild`](Self::on_after_rebuild).
    pub fn is_raycast_valid<H: Hierarchy + ?Sized, D: GraphicsDevice + ?Sized>(
        &mut self,
        hierarchy: &H,
        device: &D,
        target: RaycastTarget,
        point: Point,
    ) -> bool {
        self.raycast.is_valid(
            &self.settings,
            hierarchy,
            &self.store,
            &self.shapes,
            device,
            &self.view,
            target,
            point,
        )
    }

    /// Drops the derived material held by `element`. Call when the element is
    /// destroyed or stops drawing.
    pub fn release_element<D: GraphicsDevice + ?Sized>(
        &mut self,
        device: &mut D,
        tracer: &mut Tracer<'_>,
        element: ElementId,
    ) {
        self.materials.release_element(element, device, tracer);
    }

    /// Destroys every material and buffer and forgets all masks and shapes.
    pub fn teardown<D: GraphicsDevice + ?Sized>(
        &mut self,
        device: &mut D,
        tracer: &mut Tracer<'_>,
    ) {
        self.materials.clear(device, tracer);
        let _ = self.pool.invalidate_all(device, tracer);
        self.store = MaskStore::new();
        self.shapes.clear();
        self.depths.invalidate_frame();
        self.raycast.invalidate_frame();
        self.compositor = BufferCompositor::new();
        self.changes.clear();
        self.hierarchy_changed = false;
        self.stale_materials.clear();
    }

    // -- Internals --

    fn owner_for<H: Hierarchy + ?Sized>(
        &self,
        hierarchy: &H,
        element: ElementId,
    ) -> Option<MaskId> {
        ancestors(hierarchy, element, false)
            .find_map(|e| self.store.find(e).filter(|&m| self.store.is_enabled(m)))
    }

    fn mark_shapes_changed(&mut self, owner: Option<MaskId>) {
        if let Some(owner) = owner.filter(|&o| self.store.is_alive(o)) {
            self.store.mark_shapes_changed(owner);
        }
    }

    fn reassign_shapes<H: Hierarchy + ?Sized>(&mut self, hierarchy: &H) {
        for id in self.shapes.ids() {
            let Some(element) = self.shapes.get(id).map(|s| s.element) else {
                continue;
            };
            let owner = self.owner_for(hierarchy, element);
            let previous = self.shapes.reassign(id, owner);
            if previous != owner {
                self.mark_shapes_changed(previous);
                self.mark_shapes_changed(owner);
            }
        }
    }

    fn refresh_base_depths<H: Hierarchy + ?Sized>(&mut self, hierarchy: &H) {
        for root in self.store.roots() {
            let element = self.store.element(root);
            let depth = self.depths.resolve(hierarchy, element, false).depth;
            self.store
                .set_base_depth(root, u8::try_from(depth).unwrap_or(u8::MAX));
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use kurbo::Rect;
    use softmask_core::hierarchy::{ElementTree, MaskState};
    use softmask_core::mask::MaskingMode::{self, Normal, SoftMasking};
    use softmask_core::mask::{ShapeMethod, SoftnessRange};
    use softmask_core::resource::BufferSize;

    use super::*;
    use crate::testing::FakeDevice;

    const ON: Option<MaskState> = Some(MaskState {
        enabled: true,
        graphic_active: true,
    });

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

    struct Host {
        tree: ElementTree,
        canvas: ElementId,
        device: FakeDevice,
        system: SoftMaskSystem,
        view: CanvasView,
    }

    impl Host {
        fn new() -> Self {
            let mut tree = ElementTree::new();
            let canvas = tree.insert(None);
            tree.set_sort_override_root(canvas, true);
            Self {
                tree,
                canvas,
                device: FakeDevice::new(),
                system: SoftMaskSystem::default(),
                view: CanvasView::overlay(Size::new(100.0, 100.0)),
            }
        }

        /// Adds a mask element under `parent` whose graphic covers `rect`.
        fn mask(
            &mut self,
            parent: ElementId,
            rect: Rect,
            mode: MaskingMode,
        ) -> (ElementId, MaskId) {
            let e = self.tree.insert(Some(parent));
            self.tree.set_mask_state(e, ON);
            let config = MaskConfig {
                mode,
                ..self.system.default_mask_config()
            };
            let id = self.system.add_mask(&self.tree, e, config);
            self.system.store_mut().set_bounds(id, rect);
            let mut mesh = quad(rect);
            self.system.modify_mesh(e, &mut mesh);
            (e, id)
        }

        fn frame(&mut self) -> CompositeStats {
            self.system.on_before_rebuild(&self.tree, &mut Tracer::none());
            self.system
                .on_after_rebuild(&mut self.device, self.view, &mut Tracer::none())
        }

        fn material(&mut self, element: ElementId, base: MaterialId) -> MaterialId {
            self.system.modify_material(
                &self.tree,
                &mut self.device,
                &mut Tracer::none(),
                element,
                base,
            )
        }

        fn hit(&mut self, element: ElementId, x: f64, y: f64) -> bool {
            let target = RaycastTarget {
                element,
                rect: Rect::new(0.0, 0.0, 100.0, 100.0),
            };
            self.system
                .is_raycast_valid(&self.tree, &self.device, target, Point::new(x, y))
        }
    }

    #[test]
    fn frame_composites_and_binds_materials() {
        let mut host = Host::new();
        let (m, id) = host.mask(host.canvas, Rect::new(0.0, 0.0, 50.0, 50.0), SoftMasking);
        let e = host.tree.insert(Some(m));

        let stats = host.frame();
        assert_eq!(stats.drawn, 1);
        let buffer = host.system.store().buffer(id).expect("root buffer");

        let material = host.material(e, MaterialId(3));
        assert_ne!(material, MaterialId(3));
        assert_eq!(host.device.derived[0].buffer, Some(buffer));

        assert!(host.hit(e, 10.0, 10.0), "inside the mask");
        assert!(!host.hit(e, 80.0, 80.0), "outside the mask");

        assert_eq!(host.frame().roots, 0, "nothing changed");
    }

    #[test]
    fn mesh_hook_alone_provides_mask_and_shape_geometry() {
        let mut host = Host::new();
        let m = host.tree.insert(Some(host.canvas));
        host.tree.set_mask_state(m, ON);
        let config = host.system.default_mask_config();
        let id = host.system.add_mask(&host.tree, m, config);
        let mut mesh = quad(Rect::new(0.0, 0.0, 50.0, 50.0));
        host.system.modify_mesh(m, &mut mesh);
        assert_eq!(host.system.store().bounds(id), Rect::new(0.0, 0.0, 50.0, 50.0));

        let se = host.tree.insert(Some(m));
        let sid = host
            .system
            .add_shape(&host.tree, MaskingShape::new(se, ShapeMethod::Subtract));
        let mut mesh = quad(Rect::new(10.0, 10.0, 20.0, 20.0));
        host.system.modify_mesh(se, &mut mesh);
        let shape = host.system.shapes().get(sid).expect("live shape");
        assert_eq!(shape.bounds, Rect::new(10.0, 10.0, 20.0, 20.0));

        let e = host.tree.insert(Some(m));
        assert_eq!(host.frame().drawn, 1);
        assert_ne!(host.material(e, MaterialId(3)), MaterialId(3));
        assert!(host.hit(e, 30.0, 30.0), "inside the mask");
        assert!(!host.hit(e, 15.0, 15.0), "inside the subtracted shape");
        assert!(!host.hit(e, 80.0, 80.0), "outside the mask");
    }

    #[test]
    fn hidden_mask_graphic_is_captured_then_cleared() {
        let mut host = Host::new();
        let (m, id) = host.mask(host.canvas, Rect::new(0.0, 0.0, 50.0, 50.0), SoftMasking);

        let mut mesh = quad(Rect::new(0.0, 0.0, 10.0, 10.0));
        host.system.modify_mesh(m, &mut mesh);
        assert!(mesh.is_empty(), "hidden graphic draws nothing");
        assert_eq!(host.system.store().mesh(id).len(), 4);

        host.system.store_mut().set_show_graphic(id, true);
        let mut mesh = quad(Rect::new(0.0, 0.0, 10.0, 10.0));
        host.system.modify_mesh(m, &mut mesh);
        assert_eq!(mesh.len(), 4);

        let other = host.tree.insert(Some(host.canvas));
        let mut mesh = quad(Rect::new(0.0, 0.0, 10.0, 10.0));
        host.system.modify_mesh(other, &mut mesh);
        assert_eq!(mesh.len(), 4, "unrelated elements are untouched");
    }

    #[test]
    fn disabled_masking_passes_everything_through() {
        let mut host = Host::new();
        let (m, _) = host.mask(host.canvas, Rect::new(0.0, 0.0, 50.0, 50.0), SoftMasking);
        let e = host.tree.insert(Some(m));
        host.system.set_settings(SoftMaskSettings {
            enabled: false,
            ..SoftMaskSettings::new()
        });

        let stats = host.frame();
        assert_eq!(stats, CompositeStats::default());
        assert!(host.device.plans.is_empty());
        assert_eq!(host.material(e, MaterialId(3)), MaterialId(3));
        assert!(host.hit(e, 80.0, 80.0));
    }

    #[test]
    fn reparenting_out_of_a_mask_unmasks_the_element() {
        let mut host = Host::new();
        let (m0, id0) = host.mask(host.canvas, Rect::new(0.0, 0.0, 80.0, 80.0), SoftMasking);
        let (m1, id1) = host.mask(m0, Rect::new(10.0, 10.0, 60.0, 60.0), SoftMasking);
        let e = host.tree.insert(Some(m1));
        let _ = host.frame();
        assert_eq!(host.system.store().parent(id1), Some(id0));
        assert_ne!(host.material(e, MaterialId(3)), MaterialId(3));

        host.tree.reparent(m1, Some(host.canvas));
        host.system.notify_hierarchy_changed();
        let stats = host.frame();
        assert_eq!(host.system.store().parent(id1), None);
        assert_eq!(stats.drawn, 2, "both roots redraw");

        host.tree.reparent(e, Some(host.canvas));
        host.system.notify_hierarchy_changed();
        let _ = host.frame();
        assert_eq!(host.material(e, MaterialId(3)), MaterialId(3));
        assert_eq!(host.device.destroyed_materials.len(), 1, "old derivation released");
    }

    #[test]
    fn root_under_a_stencil_mask_starts_one_channel_lower() {
        let mut host = Host::new();
        let (outer, _) = host.mask(host.canvas, Rect::new(0.0, 0.0, 90.0, 90.0), Normal);
        let (_, soft) = host.mask(outer, Rect::new(0.0, 0.0, 50.0, 50.0), SoftMasking);
        let _ = host.frame();

        assert_eq!(host.system.store().base_depth(soft), 1);
        let buffer = host.system.store().buffer(soft).expect("soft root buffer");
        let plan = host.device.last_plan(buffer).expect("submitted");
        assert_eq!(plan.clear_color, [1.0, 0.0, 0.0, 0.0]);
        assert_eq!(plan.commands[0].channel, 2);
    }

    #[test]
    fn resize_retires_materials_bound_to_old_buffers() {
        let mut host = Host::new();
        let (m, id) = host.mask(host.canvas, Rect::new(0.0, 0.0, 50.0, 50.0), SoftMasking);
        let e = host.tree.insert(Some(m));
        let _ = host.frame();
        let before = host.material(e, MaterialId(3));
        let old_buffer = host.system.store().buffer(id).expect("buffer");

        host.view = CanvasView::overlay(Size::new(200.0, 200.0));
        let _ = host.frame();
        let new_buffer = host.system.store().buffer(id).expect("buffer");
        assert_ne!(new_buffer, old_buffer);
        assert_eq!(
            host.system.pool().size_of(new_buffer),
            Some(BufferSize::new(200, 200))
        );
        assert_eq!(host.system.materials().repository().retired_len(), 1);

        let after = host.material(e, MaterialId(3));
        assert_ne!(after, before, "the retired entry is never returned");
        assert_eq!(host.device.destroyed_materials, [before]);
    }

    #[test]
    fn recycled_buffer_id_after_resize_derives_fresh_material() {
        let mut host = Host::new();
        host.device.reuse_buffer_ids = true;
        let (m, id) = host.mask(host.canvas, Rect::new(0.0, 0.0, 50.0, 50.0), SoftMasking);
        let e = host.tree.insert(Some(m));
        let _ = host.frame();
        let before = host.material(e, MaterialId(3));
        let old_buffer = host.system.store().buffer(id).expect("buffer");

        host.view = CanvasView::overlay(Size::new(200.0, 200.0));
        let _ = host.frame();
        assert_eq!(
            host.system.store().buffer(id),
            Some(old_buffer),
            "the device handed the destroyed id back"
        );

        let after = host.material(e, MaterialId(3));
        assert_ne!(after, before, "the retired entry is never returned");
        assert_eq!(host.device.derived.len(), 2);
        assert_eq!(host.device.destroyed_materials, [before]);
    }

    #[test]
    fn anti_aliasing_threshold_change_marks_graphic_stale() {
        let mut host = Host::new();
        let (m, id) = host.mask(
            host.canvas,
            Rect::new(0.0, 0.0, 50.0, 50.0),
            MaskingMode::AntiAliasing,
        );
        let _ = host.frame();
        let first = host.material(m, MaterialId(3));
        assert_ne!(first, MaterialId(3), "anti-aliased graphics clip their edge");
        assert_eq!(host.device.derived[0].buffer, None);
        let _ = host.frame();
        assert!(host.system.stale_materials().is_empty());

        host.system
            .store_mut()
            .set_softness(id, SoftnessRange::new(0.5, 1.0));
        let _ = host.frame();
        assert_eq!(host.system.stale_materials(), [m]);

        let second = host.material(m, MaterialId(3));
        assert_ne!(second, first);
        assert_eq!(host.device.derived[1].uniforms.alpha_clip, 128.0 / 255.0);
        let _ = host.frame();
        assert!(host.system.stale_materials().is_empty());

        let (n, _) = host.mask(host.canvas, Rect::new(50.0, 50.0, 90.0, 90.0), Normal);
        let _ = host.frame();
        assert_eq!(
            host.material(n, MaterialId(3)),
            MaterialId(3),
            "plain stencil graphics keep their base material"
        );
    }

    #[test]
    fn shapes_attach_to_the_nearest_mask() {
        let mut host = Host::new();
        let (m, id) = host.mask(host.canvas, Rect::new(0.0, 0.0, 50.0, 50.0), SoftMasking);
        let se = host.tree.insert(Some(m));
        let mut shape = MaskingShape::new(se, ShapeMethod::Subtract);
        shape.bounds = Rect::new(10.0, 10.0, 20.0, 20.0);
        let sid = host.system.add_shape(&host.tree, shape);
        assert_eq!(host.system.shapes().owner(sid), Some(id));

        let mut mesh = quad(Rect::new(10.0, 10.0, 20.0, 20.0));
        host.system.modify_mesh(se, &mut mesh);
        assert!(mesh.is_empty(), "shape source graphic hidden by default");

        let _ = host.frame();
        let buffer = host.system.store().buffer(id).expect("buffer");
        let plan = host.device.last_plan(buffer).expect("submitted");
        assert_eq!(plan.commands.len(), 2);
        assert_eq!(plan.commands[1].shape, Some(sid));

        assert!(host.system.update_shape(sid, |s| s.method = ShapeMethod::Additive));
        assert_eq!(host.frame().drawn, 1, "shape edits recomposite the owner");

        host.system.remove_mask(id);
        let _ = host.frame();
        assert_eq!(host.system.shapes().owner(sid), None);
        assert!(host.system.remove_shape(sid).is_some());
    }

    #[test]
    fn removed_mask_buffer_is_destroyed_at_frame_end() {
        let mut host = Host::new();
        let (_, id) = host.mask(host.canvas, Rect::new(0.0, 0.0, 50.0, 50.0), SoftMasking);
        let _ = host.frame();
        let buffer = host.system.store().buffer(id).expect("buffer");

        host.system.remove_mask(id);
        let _ = host.frame();
        assert_eq!(host.device.destroyed_buffers, [buffer]);
        assert_eq!(host.system.pool().live_count(), 0);
    }

    #[test]
    fn small_moves_do_not_recomposite() {
        let mut host = Host::new();
        let (m, _) = host.mask(host.canvas, Rect::new(0.0, 0.0, 50.0, 50.0), SoftMasking);
        let _ = host.frame();
        assert!(!host.system.set_world_transform(m, Affine::translate((1e-6, 0.0))));
        assert_eq!(host.frame().roots, 0);
        assert!(host.system.set_world_transform(m, Affine::translate((5.0, 0.0))));
        assert_eq!(host.frame().drawn, 1);
    }

    #[test]
    fn teardown_destroys_everything() {
        let mut host = Host::new();
        let (m, _) = host.mask(host.canvas, Rect::new(0.0, 0.0, 50.0, 50.0), SoftMasking);
        let e = host.tree.insert(Some(m));
        let _ = host.frame();
        let material = host.material(e, MaterialId(3));

        host.system.teardown(&mut host.device, &mut Tracer::none());
        assert_eq!(host.device.destroyed_materials, [material]);
        assert_eq!(host.device.destroyed_buffers.len(), 1);
        assert!(host.system.store().ids().is_empty());
        assert_eq!(host.system.pool().live_count(), 0);
    }
}
