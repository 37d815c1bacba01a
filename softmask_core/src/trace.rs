// Copyright 2026 the Softmask Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tracing and diagnostics for the masking frame loop.
//!
//! This module provides a [`TraceSink`] trait with per-event methods that the
//! masking core calls at each stage. All method bodies default to no-ops, so
//! implementing only the events you care about is fine.
//!
//! [`Tracer`] wraps an optional `&mut dyn TraceSink`. When the `trace` feature
//! is **off**, every `Tracer` method compiles to nothing (zero overhead). When
//! **on**, each method performs a single `Option` branch before dispatching.
//!
//! Failures that the core absorbs (allocation errors, missing shader
//! variants, depth overflow) surface here as [`FallbackEvent`]s; nothing else
//! reports them.
//!
//! # Crate features
//!
//! - `trace`: enables the `Tracer` method bodies (one branch per call).
//! - `trace-rich` (implies `trace`): gates the per-frame dirty mask list.

use crate::error::ResourceError;
use crate::hierarchy::ElementId;
use crate::mask::MaskId;
use crate::resource::{BufferId, BufferSize, MaterialId};

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Which host callback is running.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PhaseKind {
    /// Dirty collection, parent refresh, depth cache reset.
    BeforeRebuild,
    /// Buffer compositing.
    AfterRebuild,
}

/// What the compositor did with a dirty root.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CompositeOutcome {
    /// Draw commands were submitted.
    Drawn,
    /// The root was off-screen; a previously drawn buffer was cleared.
    Cleared,
    /// The root was off-screen and its buffer was already empty.
    Skipped,
}

/// Buffer lifecycle transitions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BufferEventKind {
    /// A new buffer was created on the device.
    Allocated,
    /// An idle pooled buffer was handed out again.
    Reused,
    /// A buffer was returned to the pool.
    Released,
    /// A buffer was destroyed on the device.
    Destroyed,
}

/// Derived-material lifecycle transitions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MaterialEventKind {
    /// A new derived material was created.
    Derived,
    /// An existing derived material gained a reference.
    Shared,
    /// A reference was dropped.
    Released,
    /// The reference count reached zero and the material was destroyed.
    Destroyed,
    /// The material's buffer went away; it can no longer be looked up.
    Retired,
}

/// Why the core fell back to unmasked rendering.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FallbackReason {
    /// The host failed to create a resource.
    Resource(ResourceError),
    /// The element is nested deeper than the buffer has channels.
    DepthExceeded {
        /// Absolute soft-mask depth the element would need.
        depth: u8,
    },
    /// The base material handle was [`MaterialId::NONE`].
    InvalidBaseMaterial,
}

// ---------------------------------------------------------------------------
// Event structs
// ---------------------------------------------------------------------------

/// Marks the beginning of a host callback.
#[derive(Clone, Copy, Debug)]
pub struct PhaseBeginEvent {
    /// Frame counter.
    pub frame_index: u64,
    /// Which phase is starting.
    pub phase: PhaseKind,
}

/// Marks the end of a host callback.
#[derive(Clone, Copy, Debug)]
pub struct PhaseEndEvent {
    /// Frame counter.
    pub frame_index: u64,
    /// Which phase is ending.
    pub phase: PhaseKind,
}

/// Emitted once per dirty root visited by the compositor.
#[derive(Clone, Copy, Debug)]
pub struct CompositeEvent {
    /// Frame counter.
    pub frame_index: u64,
    /// Root of the composited mask subtree.
    pub root: MaskId,
    /// Target buffer, if one could be allocated.
    pub buffer: Option<BufferId>,
    /// What happened.
    pub outcome: CompositeOutcome,
    /// Number of populated depth levels.
    pub levels: u8,
    /// Number of draw commands submitted.
    pub commands: u32,
}

/// Emitted on buffer pool transitions.
#[derive(Clone, Copy, Debug)]
pub struct BufferEvent {
    /// Transition kind.
    pub kind: BufferEventKind,
    /// Affected buffer.
    pub buffer: BufferId,
    /// Buffer dimensions.
    pub size: BufferSize,
}

/// Emitted on derived-material cache transitions.
#[derive(Clone, Copy, Debug)]
pub struct MaterialEvent {
    /// Transition kind.
    pub kind: MaterialEventKind,
    /// Packed cache key.
    pub key: u128,
    /// Derived material handle.
    pub material: MaterialId,
    /// Reference count after the transition.
    pub ref_count: u32,
}

/// Emitted whenever the core degrades to unmasked rendering.
#[derive(Clone, Copy, Debug)]
pub struct FallbackEvent {
    /// Why.
    pub reason: FallbackReason,
    /// The element being resolved, if any.
    pub element: Option<ElementId>,
    /// The mask involved, if any.
    pub mask: Option<MaskId>,
}

// ---------------------------------------------------------------------------
// TraceSink trait
// ---------------------------------------------------------------------------

/// Receives trace events from the masking core.
///
/// All methods have default no-op implementations, so you only need to
/// override the events you care about.
pub trait TraceSink {
    /// Called at the beginning of a host callback.
    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        _ = e;
    }

    /// Called at the end of a host callback.
    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        _ = e;
    }

    /// Called for every dirty root the compositor visits.
    fn on_composite(&mut self, e: &CompositeEvent) {
        _ = e;
    }

    /// Called on buffer pool transitions.
    fn on_buffer(&mut self, e: &BufferEvent) {
        _ = e;
    }

    /// Called on derived-material cache transitions.
    fn on_material(&mut self, e: &MaterialEvent) {
        _ = e;
    }

    /// Called when the core falls back to unmasked rendering.
    fn on_fallback(&mut self, e: &FallbackEvent) {
        _ = e;
    }

    /// Called with the masks found dirty this frame (requires `trace-rich`).
    #[cfg(feature = "trace-rich")]
    fn on_dirty_masks(&mut self, frame_index: u64, masks: &[MaskId]) {
        _ = (frame_index, masks);
    }
}

// ---------------------------------------------------------------------------
// NoopSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that discards all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl TraceSink for NoopSink {}

// ---------------------------------------------------------------------------
// Tracer wrapper
// ---------------------------------------------------------------------------

/// Thin wrapper around an optional [`TraceSink`].
///
/// When the `trace` feature is **off**, every method compiles to nothing. When
/// **on**, each method checks the inner `Option` (one branch) before
/// dispatching to the sink.
pub struct Tracer<'a> {
    #[cfg(feature = "trace")]
    sink: Option<&'a mut dyn TraceSink>,
    #[cfg(not(feature = "trace"))]
    _marker: core::marker::PhantomData<&'a mut dyn TraceSink>,
}

impl core::fmt::Debug for Tracer<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tracer").finish_non_exhaustive()
    }
}

impl<'a> Tracer<'a> {
    /// Creates a tracer that dispatches to the given sink.
    #[inline]
    #[must_use]
    pub fn new(sink: &'a mut dyn TraceSink) -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: Some(sink) }
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = sink;
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Creates a tracer that discards all events.
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: None }
        }
        #[cfg(not(feature = "trace"))]
        {
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Emits a [`PhaseBeginEvent`].
    #[inline]
    pub fn phase_begin(&mut self, e: &PhaseBeginEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_phase_begin(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`PhaseEndEvent`].
    #[inline]
    pub fn phase_end(&mut self, e: &PhaseEndEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_phase_end(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`CompositeEvent`].
    #[inline]
    pub fn composite(&mut self, e: &CompositeEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_composite(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`BufferEvent`].
    #[inline]
    pub fn buffer(&mut self, e: &BufferEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_buffer(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`MaterialEvent`].
    #[inline]
    pub fn material(&mut self, e: &MaterialEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_material(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`FallbackEvent`].
    #[inline]
    pub fn fallback(&mut self, e: &FallbackEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_fallback(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits the dirty mask list (requires `trace-rich` feature).
    #[cfg(feature = "trace-rich")]
    #[inline]
    pub fn dirty_masks(&mut self, frame_index: u64, masks: &[MaskId]) {
        if let Some(s) = &mut self.sink {
            s.on_dirty_masks(frame_index, masks);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
