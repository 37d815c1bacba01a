// Copyright 2026 the Softmask Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compact binary event recording and decoding.
//!
//! [`RecorderSink`] implements [`TraceSink`] and encodes events into a
//! `Vec<u8>` as fixed-size little-endian records. [`decode`] reads them back
//! as an iterator of [`RecordedEvent`].
//!
//! Mask handles are recorded as their raw `(index, generation)` pair and come
//! back as [`MaskRef`], since a decoded handle no longer refers to a live
//! store. [`on_dirty_masks`](TraceSink::on_dirty_masks) stores only the count.

use softmask_core::error::ResourceError;
use softmask_core::hierarchy::ElementId;
use softmask_core::mask::MaskId;
use softmask_core::resource::{BufferId, BufferSize, MaterialId};
use softmask_core::trace::{
    BufferEvent, BufferEventKind, CompositeEvent, CompositeOutcome, FallbackEvent, FallbackReason,
    MaterialEvent, MaterialEventKind, PhaseBeginEvent, PhaseEndEvent, PhaseKind, TraceSink,
};

// ---------------------------------------------------------------------------
// Event type discriminants
// ---------------------------------------------------------------------------

const TAG_PHASE_BEGIN: u8 = 1;
const TAG_PHASE_END: u8 = 2;
const TAG_COMPOSITE: u8 = 3;
const TAG_BUFFER: u8 = 4;
const TAG_MATERIAL: u8 = 5;
const TAG_FALLBACK: u8 = 6;
const TAG_DIRTY_MASKS_COUNT: u8 = 7;

const REASON_BUFFER_ALLOCATION: u8 = 0;
const REASON_MISSING_VARIANT: u8 = 1;
const REASON_DEPTH_EXCEEDED: u8 = 2;
const REASON_INVALID_BASE: u8 = 3;

// ---------------------------------------------------------------------------
// Decoded types
// ---------------------------------------------------------------------------

/// A mask handle as it was recorded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MaskRef {
    /// Slot index at recording time.
    pub index: u32,
    /// Generation at recording time.
    pub generation: u32,
}

impl From<MaskId> for MaskRef {
    fn from(id: MaskId) -> Self {
        Self {
            index: id.index(),
            generation: id.generation(),
        }
    }
}

/// A decoded [`CompositeEvent`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecordedComposite {
    /// Frame counter.
    pub frame_index: u64,
    /// Root mask that was composited.
    pub root: MaskRef,
    /// Target buffer, if one was bound.
    pub buffer: Option<BufferId>,
    /// What the compositor did.
    pub outcome: CompositeOutcome,
    /// Number of channel levels written.
    pub levels: u8,
    /// Number of draw commands submitted.
    pub commands: u32,
}

/// A decoded [`FallbackEvent`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecordedFallback {
    /// Why rendering fell back.
    pub reason: FallbackReason,
    /// Affected element, if any.
    pub element: Option<ElementId>,
    /// Affected mask, if any.
    pub mask: Option<MaskRef>,
}

/// A decoded event from a binary recording.
#[derive(Clone, Debug)]
pub enum RecordedEvent {
    /// A [`PhaseBeginEvent`].
    PhaseBegin(PhaseBeginEvent),
    /// A [`PhaseEndEvent`].
    PhaseEnd(PhaseEndEvent),
    /// A [`CompositeEvent`].
    Composite(RecordedComposite),
    /// A [`BufferEvent`].
    Buffer(BufferEvent),
    /// A [`MaterialEvent`].
    Material(MaterialEvent),
    /// A [`FallbackEvent`].
    Fallback(RecordedFallback),
    /// Dirty-mask count for a frame.
    DirtyMasksCount {
        /// Frame counter.
        frame_index: u64,
        /// Number of dirty masks.
        count: u32,
    },
}

impl RecordedEvent {
    /// The frame this event belongs to, when the event carries one.
    #[must_use]
    pub fn frame_index(&self) -> Option<u64> {
        match self {
            Self::PhaseBegin(e) => Some(e.frame_index),
            Self::PhaseEnd(e) => Some(e.frame_index),
            Self::Composite(e) => Some(e.frame_index),
            Self::DirtyMasksCount { frame_index, .. } => Some(*frame_index),
            Self::Buffer(_) | Self::Material(_) | Self::Fallback(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// RecorderSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that encodes events into a compact binary buffer.
#[derive(Debug, Default)]
pub struct RecorderSink {
    buf: Vec<u8>,
}

impl RecorderSink {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a view of the recorded bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consumes the recorder and returns the recorded bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    // -- encoding helpers --------------------------------------------------

    fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_u128(&mut self, v: u128) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_option_u32(&mut self, v: Option<u32>) {
        match v {
            Some(val) => {
                self.write_u8(1);
                self.write_u32(val);
            }
            None => {
                self.write_u8(0);
                self.write_u32(0);
            }
        }
    }

    fn write_mask(&mut self, m: MaskId) {
        self.write_u32(m.index());
        self.write_u32(m.generation());
    }

    fn write_option_mask(&mut self, m: Option<MaskId>) {
        match m {
            Some(m) => {
                self.write_u8(1);
                self.write_mask(m);
            }
            None => {
                self.write_u8(0);
                self.write_u32(0);
                self.write_u32(0);
            }
        }
    }

    fn write_phase(&mut self, p: PhaseKind) {
        self.write_u8(match p {
            PhaseKind::BeforeRebuild => 0,
            PhaseKind::AfterRebuild => 1,
        });
    }

    fn write_reason(&mut self, r: FallbackReason) {
        let (code, a, b) = match r {
            FallbackReason::Resource(ResourceError::BufferAllocation(size)) => {
                (REASON_BUFFER_ALLOCATION, size.width, size.height)
            }
            FallbackReason::Resource(ResourceError::MissingShaderVariant(m)) => {
                (REASON_MISSING_VARIANT, m.0, 0)
            }
            FallbackReason::DepthExceeded { depth } => (REASON_DEPTH_EXCEEDED, u32::from(depth), 0),
            FallbackReason::InvalidBaseMaterial => (REASON_INVALID_BASE, 0, 0),
        };
        self.write_u8(code);
        self.write_u32(a);
        self.write_u32(b);
    }
}

impl TraceSink for RecorderSink {
    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        self.write_u8(TAG_PHASE_BEGIN);
        self.write_u64(e.frame_index);
        self.write_phase(e.phase);
    }

    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        self.write_u8(TAG_PHASE_END);
        self.write_u64(e.frame_index);
        self.write_phase(e.phase);
    }

    fn on_composite(&mut self, e: &CompositeEvent) {
        self.write_u8(TAG_COMPOSITE);
        self.write_u64(e.frame_index);
        self.write_mask(e.root);
        self.write_option_u32(e.buffer.map(|b| b.0));
        self.write_u8(match e.outcome {
            CompositeOutcome::Drawn => 0,
            CompositeOutcome::Cleared => 1,
            CompositeOutcome::Skipped => 2,
        });
        self.write_u8(e.levels);
        self.write_u32(e.commands);
    }

    fn on_buffer(&mut self, e: &BufferEvent) {
        self.write_u8(TAG_BUFFER);
        self.write_u8(match e.kind {
            BufferEventKind::Allocated => 0,
            BufferEventKind::Reused => 1,
            BufferEventKind::Released => 2,
            BufferEventKind::Destroyed => 3,
        });
        self.write_u32(e.buffer.0);
        self.write_u32(e.size.width);
        self.write_u32(e.size.height);
    }

    fn on_material(&mut self, e: &MaterialEvent) {
        self.write_u8(TAG_MATERIAL);
        self.write_u8(match e.kind {
            MaterialEventKind::Derived => 0,
            MaterialEventKind::Shared => 1,
            MaterialEventKind::Released => 2,
            MaterialEventKind::Destroyed => 3,
            MaterialEventKind::Retired => 4,
        });
        self.write_u128(e.key);
        self.write_u32(e.material.0);
        self.write_u32(e.ref_count);
    }

    fn on_fallback(&mut self, e: &FallbackEvent) {
        self.write_u8(TAG_FALLBACK);
        self.write_reason(e.reason);
        self.write_option_u32(e.element.map(|el| el.0));
        self.write_option_mask(e.mask);
    }

    fn on_dirty_masks(&mut self, frame_index: u64, masks: &[MaskId]) {
        self.write_u8(TAG_DIRTY_MASKS_COUNT);
        self.write_u64(frame_index);
        #[expect(
            clippy::cast_possible_truncation,
            reason = "dirty mask count capped at u32::MAX for recording"
        )]
        self.write_u32(masks.len().min(u32::MAX as usize) as u32);
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// Decodes a byte slice produced by [`RecorderSink`] into an iterator of
/// [`RecordedEvent`].
///
/// Iteration stops at the first unknown tag or truncated record.
pub fn decode(bytes: &[u8]) -> DecodeIter<'_> {
    DecodeIter {
        data: bytes,
        pos: 0,
    }
}

/// Iterator over decoded events.
#[derive(Debug)]
pub struct DecodeIter<'a> {
    data: &'a [u8],
    pos: usize,
}

impl DecodeIter<'_> {
    fn take<const N: usize>(&mut self) -> Option<[u8; N]> {
        let bytes = self.data.get(self.pos..self.pos + N)?.try_into().ok()?;
        self.pos += N;
        Some(bytes)
    }

    fn read_u8(&mut self) -> Option<u8> {
        self.take::<1>().map(|[v]| v)
    }

    fn read_u32(&mut self) -> Option<u32> {
        self.take().map(u32::from_le_bytes)
    }

    fn read_u64(&mut self) -> Option<u64> {
        self.take().map(u64::from_le_bytes)
    }

    fn read_u128(&mut self) -> Option<u128> {
        self.take().map(u128::from_le_bytes)
    }

    fn read_option_u32(&mut self) -> Option<Option<u32>> {
        let present = self.read_u8()?;
        let val = self.read_u32()?;
        Some((present != 0).then_some(val))
    }

    fn read_mask(&mut self) -> Option<MaskRef> {
        Some(MaskRef {
            index: self.read_u32()?,
            generation: self.read_u32()?,
        })
    }

    fn read_option_mask(&mut self) -> Option<Option<MaskRef>> {
        let present = self.read_u8()?;
        let mask = self.read_mask()?;
        Some((present != 0).then_some(mask))
    }

    fn read_phase(&mut self) -> Option<PhaseKind> {
        Some(match self.read_u8()? {
            0 => PhaseKind::BeforeRebuild,
            _ => PhaseKind::AfterRebuild,
        })
    }

    fn read_reason(&mut self) -> Option<FallbackReason> {
        let code = self.read_u8()?;
        let a = self.read_u32()?;
        let b = self.read_u32()?;
        Some(match code {
            REASON_BUFFER_ALLOCATION => {
                FallbackReason::Resource(ResourceError::BufferAllocation(BufferSize::new(a, b)))
            }
            REASON_MISSING_VARIANT => {
                FallbackReason::Resource(ResourceError::MissingShaderVariant(MaterialId(a)))
            }
            REASON_DEPTH_EXCEEDED => FallbackReason::DepthExceeded {
                depth: u8::try_from(a).unwrap_or(u8::MAX),
            },
            REASON_INVALID_BASE => FallbackReason::InvalidBaseMaterial,
            _ => return None,
        })
    }

    fn decode_phase_begin(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::PhaseBegin(PhaseBeginEvent {
            frame_index: self.read_u64()?,
            phase: self.read_phase()?,
        }))
    }

    fn decode_phase_end(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::PhaseEnd(PhaseEndEvent {
            frame_index: self.read_u64()?,
            phase: self.read_phase()?,
        }))
    }

    fn decode_composite(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Composite(RecordedComposite {
            frame_index: self.read_u64()?,
            root: self.read_mask()?,
            buffer: self.read_option_u32()?.map(BufferId),
            outcome: match self.read_u8()? {
                0 => CompositeOutcome::Drawn,
                1 => CompositeOutcome::Cleared,
                _ => CompositeOutcome::Skipped,
            },
            levels: self.read_u8()?,
            commands: self.read_u32()?,
        }))
    }

    fn decode_buffer(&mut self) -> Option<RecordedEvent> {
        let kind = match self.read_u8()? {
            0 => BufferEventKind::Allocated,
            1 => BufferEventKind::Reused,
            2 => BufferEventKind::Released,
            _ => BufferEventKind::Destroyed,
        };
        let buffer = BufferId(self.read_u32()?);
        let width = self.read_u32()?;
        let height = self.read_u32()?;
        Some(RecordedEvent::Buffer(BufferEvent {
            kind,
            buffer,
            size: BufferSize::new(width, height),
        }))
    }

    fn decode_material(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Material(MaterialEvent {
            kind: match self.read_u8()? {
                0 => MaterialEventKind::Derived,
                1 => MaterialEventKind::Shared,
                2 => MaterialEventKind::Released,
                3 => MaterialEventKind::Destroyed,
                _ => MaterialEventKind::Retired,
            },
            key: self.read_u128()?,
            material: MaterialId(self.read_u32()?),
            ref_count: self.read_u32()?,
        }))
    }

    fn decode_fallback(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Fallback(RecordedFallback {
            reason: self.read_reason()?,
            element: self.read_option_u32()?.map(ElementId),
            mask: self.read_option_mask()?,
        }))
    }

    fn decode_dirty_masks_count(&mut self) -> Option<RecordedEvent> {
        let frame_index = self.read_u64()?;
        let count = self.read_u32()?;
        Some(RecordedEvent::DirtyMasksCount { frame_index, count })
    }
}

impl Iterator for DecodeIter<'_> {
    type Item = RecordedEvent;

    fn next(&mut self) -> Option<Self::Item> {
        let tag = self.read_u8()?;
        match tag {
            TAG_PHASE_BEGIN => self.decode_phase_begin(),
            TAG_PHASE_END => self.decode_phase_end(),
            TAG_COMPOSITE => self.decode_composite(),
            TAG_BUFFER => self.decode_buffer(),
            TAG_MATERIAL => self.decode_material(),
            TAG_FALLBACK => self.decode_fallback(),
            TAG_DIRTY_MASKS_COUNT => self.decode_dirty_masks_count(),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
