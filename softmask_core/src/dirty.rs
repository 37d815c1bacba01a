// Copyright 2026 the Softmask Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dirty-tracking channel constants.
//!
//! Mask nodes use multi-channel dirty tracking (via [`understory_dirty`]) to
//! decide which off-screen buffers are stale.
//!
//! # Propagation semantics
//!
//! - **Propagating**: [`COMPOSITE`] uses
//!   [`EagerPolicy`](understory_dirty::EagerPolicy) with dependency edges from
//!   child to parent. Changing a mask's geometry, softness, or mode marks its
//!   whole mask subtree, because descendants write into the same buffer.
//!
//! - **Local-only**: [`SHAPES`] is marked when an auxiliary shape is
//!   registered, removed, or changed. Only the owning node is affected.
//!
//! - **Structural**: [`TOPOLOGY`] is marked on re-parenting, enable,
//!   disable, and destroy. It does not propagate.
//!
//! # Consumption
//!
//! [`MaskStore::collect_dirty`](crate::mask::MaskStore::collect_dirty) drains
//! every channel once per frame and folds the result into the per-node
//! `is_dirty` flag that the compositor reads.

use understory_dirty::Channel;

/// Mask geometry or parameters changed; the subtree's buffer is stale.
pub const COMPOSITE: Channel = Channel::new(0);

/// Auxiliary shapes of a node changed.
pub const SHAPES: Channel = Channel::new(1);

/// Mask tree topology changed.
pub const TOPOLOGY: Channel = Channel::new(2);
