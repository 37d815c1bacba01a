// Copyright 2026 the Softmask Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Buffer compositing, derived materials and raycast validation for soft
//! masks.
//!
//! This crate sits between [`softmask_core`]'s mask tree and the host's GPU
//! layer. It defines:
//!
//! - [`GraphicsDevice`]: the resource primitives a host provides
//! - [`BufferPool`]: reuse of off-screen mask buffers
//! - [`CompositePlan`] / [`DrawCommand`]: the per-root draw batch
//! - [`BufferCompositor`]: dirty-root compositing into colour channels
//! - [`MaterialResolver`] / [`MaterialRepository`]: shared derived materials
//! - [`RaycastValidator`]: hit validity through the mask chain
//! - [`SoftMaskSystem`]: the facade wiring all of the above to host callbacks

#![no_std]
#![cfg_attr(docsrs, feature(doc_cfg))]

extern crate alloc;

mod compositor;
mod device;
mod material;
mod plan;
mod pool;
mod raycast;
mod system;

#[cfg(test)]
mod testing;

pub use compositor::{BufferCompositor, CompositeStats};
pub use device::GraphicsDevice;
pub use material::{
    DerivedMaterialDesc, MaskUniforms, MaterialKey, MaterialRepository, MaterialResolver,
};
pub use plan::{
    CanvasView, CompositePlan, CompositeUniforms, DrawCommand, clear_color_for_base_depth,
};
pub use pool::BufferPool;
pub use raycast::{RaycastTarget, RaycastValidator};
pub use system::SoftMaskSystem;
