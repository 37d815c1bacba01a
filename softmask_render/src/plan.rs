// Copyright 2026 the Softmask Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Composite plan: the ordered draw batch for one mask buffer.

use alloc::vec::Vec;

use bytemuck::{Pod, Zeroable};
use kurbo::Size;
use softmask_core::MAX_SOFT_MASK_DEPTH;
use softmask_core::mask::{MaskId, ShapeId, ShapeMethod};
use softmask_core::mesh::Vertex;
use softmask_core::resource::{BufferId, BufferSize, TextureId};
use softmask_core::transform::Transform3d;

/// Per-draw shader parameters.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct CompositeUniforms {
    /// Softness window `[min, max]`.
    pub softness: [f32; 2],
    /// 1 for subtractive draws (write inverted coverage), 0 otherwise.
    pub subtract: u32,
    /// 1 when a source texture is bound.
    pub has_texture: u32,
    /// One-hot RGBA write selector matching the colour mask.
    pub channel_selector: [f32; 4],
}

/// A single draw into one colour channel of a mask buffer.
///
/// Commands are produced level by level, root first; within a level a node's
/// own graphic precedes its shapes.
#[derive(Clone, Debug)]
pub struct DrawCommand {
    /// The mask node this command belongs to.
    pub mask: MaskId,
    /// The shape being drawn, or `None` for the node's own graphic.
    pub shape: Option<ShapeId>,
    /// Bucket depth inside the root's subtree.
    pub level: u8,
    /// Channel index `3 - base_depth - level`; writes colour-mask bit
    /// `1 << channel`.
    pub channel: u8,
    /// Additive or subtractive write.
    pub method: ShapeMethod,
    /// Source texture for alpha.
    pub texture: Option<TextureId>,
    /// Geometry in canvas space.
    pub vertices: Vec<Vertex>,
    /// Shader parameters.
    pub uniforms: CompositeUniforms,
}

impl DrawCommand {
    /// The colour write mask (`1 << channel`; bit 3 is red, bit 0 alpha).
    #[inline]
    #[must_use]
    pub const fn color_mask(&self) -> u8 {
        1 << self.channel
    }

    /// The RGBA component index written (0 = red).
    #[inline]
    #[must_use]
    pub const fn component(&self) -> usize {
        (MAX_SOFT_MASK_DEPTH - 1 - self.channel) as usize
    }
}

/// Viewport and camera of the canvas being composited.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CanvasView {
    /// Viewport size in pixels.
    pub viewport: Size,
    /// The canvas camera's view/projection, or `None` for overlay canvases.
    pub camera: Option<Transform3d>,
}

impl CanvasView {
    /// An overlay canvas of the given size.
    #[must_use]
    pub const fn overlay(viewport: Size) -> Self {
        Self {
            viewport,
            camera: None,
        }
    }

    /// View/projection for compositing draws: the camera's, or an
    /// orthographic projection of the viewport.
    #[must_use]
    pub fn view_projection(&self) -> Transform3d {
        self.camera
            .unwrap_or_else(|| Transform3d::viewport_orthographic(self.viewport))
    }

    /// Viewport size in whole pixels. Degenerate or non-finite dimensions
    /// map to 0 before [`BufferSize::new`] clamps them to 1.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "viewport dimensions are clamped to the u32 range first"
    )]
    #[must_use]
    pub fn pixel_size(&self) -> BufferSize {
        let to_px = |v: f64| {
            if v.is_finite() && v > 0.0 {
                v.min(f64::from(u32::MAX)) as u32
            } else {
                0
            }
        };
        BufferSize::new(to_px(self.viewport.width), to_px(self.viewport.height))
    }
}

/// Clear colour for a buffer whose root starts at `base_depth`.
///
/// Components already claimed by enclosing stencil levels (`< base_depth`)
/// are pre-filled with 1.0 so reading them back multiplies as "inside".
#[must_use]
pub fn clear_color_for_base_depth(base_depth: u8) -> [f32; 4] {
    let mut c = [0.0; 4];
    for (i, v) in c.iter_mut().enumerate() {
        if i < usize::from(base_depth) {
            *v = 1.0;
        }
    }
    c
}

/// The draw batch for one dirty root.
#[derive(Clone, Debug)]
pub struct CompositePlan {
    /// Root of the composited subtree.
    pub root: MaskId,
    /// Target buffer.
    pub target: BufferId,
    /// Target buffer size.
    pub size: BufferSize,
    /// Viewport the buffer covers.
    pub viewport: Size,
    /// Clear colour applied before drawing.
    pub clear_color: [f32; 4],
    /// View/projection for every command.
    pub view_projection: Transform3d,
    /// Draw commands in execution order. Empty for a clear-only plan.
    pub commands: Vec<DrawCommand>,
}

impl CompositePlan {
    /// Creates an empty plan.
    #[must_use]
    pub fn new(root: MaskId, target: BufferId, size: BufferSize, view: &CanvasView) -> Self {
        Self {
            root,
            target,
            size,
            viewport: view.viewport,
            clear_color: [0.0; 4],
            view_projection: view.view_projection(),
            commands: Vec::new(),
        }
    }

    /// Returns whether the plan only clears the buffer.
    #[must_use]
    pub fn is_clear_only(&self) -> bool {
        self.commands.is_empty()
    }

    /// Bitmask of channels written by at least one command.
    #[must_use]
    pub fn populated_channels(&self) -> u8 {
        self.commands.iter().fold(0, |acc, c| acc | c.color_mask())
    }
}
