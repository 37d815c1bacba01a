// Copyright 2026 the Softmask Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Vertex data captured from mask graphics.

use bytemuck::{Pod, Zeroable};
use kurbo::Rect;

/// A single UI vertex as produced by the host's mesh generation.
///
/// Positions are in canvas space; the compositor transforms them with the
/// canvas view/projection.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    /// Canvas-space position.
    pub position: [f32; 3],
    /// Texture coordinate into the graphic's source texture.
    pub uv: [f32; 2],
    /// Vertex colour (RGBA8).
    pub color: [u8; 4],
}

impl Vertex {
    /// Creates a white vertex at `(x, y)` with the given texture coordinate.
    #[inline]
    #[must_use]
    pub const fn new(x: f32, y: f32, u: f32, v: f32) -> Self {
        Self {
            position: [x, y, 0.0],
            uv: [u, v],
            color: [255; 4],
        }
    }
}

/// Axis-aligned canvas-space bounds of `vertices`, or `None` for an empty
/// mesh.
#[must_use]
pub fn mesh_bounds(vertices: &[Vertex]) -> Option<Rect> {
    vertices
        .iter()
        .map(|v| {
            let [x, y, _] = v.position;
            let p = (f64::from(x), f64::from(y));
            Rect::from_points(p, p)
        })
        .reduce(|a, b| a.union(b))
}
