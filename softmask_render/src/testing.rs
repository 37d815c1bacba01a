// Copyright 2026 the Softmask Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! In-memory [`GraphicsDevice`] test double.

use alloc::vec::Vec;

use hashbrown::HashMap;
use kurbo::{Point, Rect};
use softmask_core::error::ResourceError;
use softmask_core::mask::ShapeMethod;
use softmask_core::resource::{BufferId, BufferSize, MaterialId, TextureId};
use softmask_core::settings::BufferOrigin;

use crate::device::GraphicsDevice;
use crate::material::DerivedMaterialDesc;
use crate::plan::CompositePlan;

/// Records every call and rasterizes submitted plans by vertex bounding box:
/// a pixel inside a command's box gets 1.0 (additive) or 0.0 (subtractive)
/// in the command's component.
///
/// With `reuse_buffer_ids` set, new buffers take the most recently destroyed
/// id first, the way real drivers recycle handles.
#[derive(Debug, Default)]
pub(crate) struct FakeDevice {
    next_id: u32,
    pub(crate) created_buffers: u32,
    pub(crate) destroyed_buffers: Vec<BufferId>,
    free_buffers: Vec<BufferId>,
    pub(crate) reuse_buffer_ids: bool,
    pub(crate) fail_buffers: bool,
    pub(crate) derived: Vec<DerivedMaterialDesc>,
    pub(crate) destroyed_materials: Vec<MaterialId>,
    pub(crate) missing_variants: Vec<MaterialId>,
    pub(crate) plans: Vec<CompositePlan>,
    pub(crate) unreadable: bool,
    pub(crate) texture_alpha: HashMap<TextureId, f32>,
    pub(crate) origin: BufferOrigin,
}

impl FakeDevice {
    pub(crate) fn new() -> Self {
        Self {
            next_id: 1,
            ..Self::default()
        }
    }

    /// The most recent plan submitted for `buffer`.
    pub(crate) fn last_plan(&self, buffer: BufferId) -> Option<&CompositePlan> {
        self.plans.iter().rev().find(|p| p.target == buffer)
    }

    fn next(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

impl GraphicsDevice for FakeDevice {
    fn create_buffer(&mut self, size: BufferSize) -> Result<BufferId, ResourceError> {
        if self.fail_buffers {
            return Err(ResourceError::BufferAllocation(size));
        }
        self.created_buffers += 1;
        let recycled = if self.reuse_buffer_ids {
            self.free_buffers.pop()
        } else {
            None
        };
        Ok(recycled.unwrap_or_else(|| BufferId(self.next())))
    }

    fn destroy_buffer(&mut self, buffer: BufferId) {
        self.destroyed_buffers.push(buffer);
        self.free_buffers.push(buffer);
    }

    fn create_derived_material(
        &mut self,
        desc: &DerivedMaterialDesc,
    ) -> Result<MaterialId, ResourceError> {
        if self.missing_variants.contains(&desc.base) {
            return Err(ResourceError::MissingShaderVariant(desc.base));
        }
        self.derived.push(*desc);
        Ok(MaterialId(1000 + self.next()))
    }

    fn destroy_material(&mut self, material: MaterialId) {
        self.destroyed_materials.push(material);
    }

    fn submit(&mut self, plan: &CompositePlan) {
        self.plans.push(plan.clone());
    }

    fn read_buffer_pixel(&self, buffer: BufferId, x: u32, y: u32) -> Option<[f32; 4]> {
        if self.unreadable || self.free_buffers.contains(&buffer) {
            return None;
        }
        let Some(plan) = self.last_plan(buffer) else {
            return Some([0.0; 4]);
        };
        let (bw, bh) = (f64::from(plan.size.width), f64::from(plan.size.height));
        let row = match self.origin {
            BufferOrigin::TopLeft => f64::from(y) + 0.5,
            BufferOrigin::BottomLeft => bh - f64::from(y) - 0.5,
        };
        let p = Point::new(
            (f64::from(x) + 0.5) * plan.viewport.width / bw,
            row * plan.viewport.height / bh,
        );
        let mut rgba = plan.clear_color;
        for cmd in &plan.commands {
            let bbox = cmd
                .vertices
                .iter()
                .map(|v| {
                    let [x, y, _] = v.position;
                    Rect::from_points((f64::from(x), f64::from(y)), (f64::from(x), f64::from(y)))
                })
                .reduce(|a, b| a.union(b));
            if bbox.is_some_and(|b| b.contains(p)) {
                rgba[cmd.component()] = match cmd.method {
                    ShapeMethod::Additive => 1.0,
                    ShapeMethod::Subtract => 0.0,
                };
            }
        }
        Some(rgba)
    }

    fn sample_texture_alpha(&self, texture: TextureId, _uv: Point) -> Option<f32> {
        self.texture_alpha.get(&texture).copied()
    }
}
