// Copyright 2026 the Softmask Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Mask tree and stencil depth resolution for soft-edged UI masking.
//!
//! `softmask_core` holds the host-independent data model behind soft masks:
//! alpha-gradient clipping regions that composite up to four nested levels
//! into the colour channels of a single off-screen buffer. It is `no_std`
//! compatible (with `alloc`) and stores mask nodes in struct-of-arrays
//! layout with generational index handles.
//!
//! # Architecture
//!
//! The host UI framework drives two callbacks per frame. Everything in this
//! crate is synchronous and runs inside those two points:
//!
//! ```text
//!   host hierarchy change ──► StencilDepthResolver (per-frame cache)
//!                                    │
//!                                    ▼
//!   on_before_rebuild ──► MaskStore::collect_dirty() ──► is_dirty flags
//!                                    │
//!                                    ▼
//!   on_after_rebuild ──► BufferCompositor (softmask_render) ──► buffers
//!                                    │
//!                                    ▼
//!   material hook / raycast hook ──► MaterialResolver / RaycastValidator
//! ```
//!
//! **[`hierarchy`]**: The [`Hierarchy`](hierarchy::Hierarchy) trait the host
//! scene graph implements, a bounded ancestor walk, and a small reference
//! scene graph ([`ElementTree`](hierarchy::ElementTree)).
//!
//! **[`depth`]**: [`StencilDepthResolver`](depth::StencilDepthResolver)
//! counts enclosing masks up to the sort-override boundary, cached per frame.
//!
//! **[`mask`]**: The mask node arena ([`MaskStore`](mask::MaskStore)), its
//! configuration types, and the auxiliary shape registry.
//!
//! **[`dirty`]**: Dirty channels tracked via `understory_dirty`.
//!
//! **[`settings`]**: Global configuration.
//!
//! **[`trace`]**: [`TraceSink`](trace::TraceSink) trait and event types with
//! a zero-overhead [`Tracer`](trace::Tracer) wrapper.
//!
//! **[`resource`]** / **[`error`]**: Opaque handles for host GPU resources
//! and the errors a host may report when creating them.
//!
//! **[`transform`]**: 4×4 transform used for compositing view/projection.
//!
//! **[`mesh`]**: Vertex data captured from mask graphics and shapes.
//!
//! # Crate features
//!
//! - `std` (disabled by default): Enables `std` support in dependencies.
//! - `trace` (disabled by default): Enables `Tracer` method bodies (one branch
//!   per call site).
//! - `trace-rich` (disabled by default, implies `trace`): Gates per-frame
//!   dirty-mask events.

#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

extern crate alloc;

pub mod depth;
pub mod dirty;
pub mod error;
pub mod hierarchy;
pub mod mask;
pub mod mesh;
pub mod resource;
pub mod settings;
pub mod trace;
pub mod transform;

/// Number of nesting levels a single soft-mask buffer can represent (one per
/// colour channel).
pub const MAX_SOFT_MASK_DEPTH: u8 = 4;
