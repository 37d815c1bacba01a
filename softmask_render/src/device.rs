// Copyright 2026 the Softmask Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Host graphics contract.

use kurbo::Point;
use softmask_core::error::ResourceError;
use softmask_core::resource::{BufferId, BufferSize, MaterialId, TextureId};

use crate::material::DerivedMaterialDesc;
use crate::plan::CompositePlan;

/// Resource primitives the host graphics layer provides.
///
/// Every handle returned by a `create_*` method is eventually passed back to
/// the matching `destroy_*` method exactly once. Failures are reported as
/// [`ResourceError`]s and absorbed by the caller (pass-through rendering plus
/// a fallback trace event).
///
/// A recording implementation makes a convenient test double.
pub trait GraphicsDevice {
    /// Creates an RGBA off-screen buffer of the given size.
    fn create_buffer(&mut self, size: BufferSize) -> Result<BufferId, ResourceError>;

    /// Destroys a buffer created by [`create_buffer`](Self::create_buffer).
    fn destroy_buffer(&mut self, buffer: BufferId);

    /// Clones `desc.base` into a soft-maskable material bound to the mask
    /// buffer, or into a stencil-writing material with alpha clipping when
    /// `desc.buffer` is `None`.
    fn create_derived_material(
        &mut self,
        desc: &DerivedMaterialDesc,
    ) -> Result<MaterialId, ResourceError>;

    /// Destroys a derived material.
    fn destroy_material(&mut self, material: MaterialId);

    /// Clears `plan.target` to `plan.clear_color` and executes its draw
    /// commands in order as one batch.
    fn submit(&mut self, plan: &CompositePlan);

    /// Reads back one RGBA pixel of a buffer, or `None` when the buffer is not
    /// CPU-readable.
    fn read_buffer_pixel(&self, buffer: BufferId, x: u32, y: u32) -> Option<[f32; 4]>;

    /// Samples a texture's alpha at `uv` (`[0, 1]²`, top-left origin), or
    /// `None` when the texture is not CPU-readable.
    fn sample_texture_alpha(&self, texture: TextureId, uv: Point) -> Option<f32>;
}
