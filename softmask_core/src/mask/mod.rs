// Copyright 2026 the Softmask Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Mask tree data model.
//!
//! A *mask node* mirrors one masking component attached to a host element.
//! Each node has:
//!
//! - An identity ([`MaskId`]): a generational handle that becomes stale when
//!   the node is destroyed.
//! - Topology: a parent link to the nearest enclosing soft mask, plus ordered
//!   child links. Roots own the off-screen buffer their whole subtree
//!   composites into.
//! - **Configuration** ([`MaskConfig`]): mode, down-sampling, softness and
//!   the hierarchy flags.
//! - **Captured geometry**: bounds, mesh and source texture, supplied by the
//!   host whenever the mask graphic rebuilds.
//! - **Frame state**: `is_dirty`, the base stencil depth of a root, and the
//!   buffer handle.
//!
//! Nodes are stored in struct-of-arrays layout with index-based handles.
//! Auxiliary shapes live next to the tree in a [`ShapeRegistry`].
//!
//! # Dirty tracking
//!
//! Property mutations mark a dirty channel (see [`dirty`](crate::dirty));
//! [`MaskStore::collect_dirty`] folds them into the per-node flag once per
//! frame.

mod collect;
mod config;
mod id;
mod shape;
mod store;
mod traverse;

pub use collect::MaskChanges;
pub use config::{DownSamplingRate, MaskConfig, MaskingMode, SoftnessRange};
pub use id::{INVALID, MaskId, ShapeId};
pub use shape::{MaskingShape, ShapeMethod, ShapeRegistry};
pub use store::MaskStore;
pub use traverse::Children;
