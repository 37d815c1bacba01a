// Copyright 2026 the Softmask Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Human-readable trace output.
//!
//! [`PrettyPrintSink`] implements [`TraceSink`] and writes one line per event
//! to a [`Write`](std::io::Write) destination (default: stderr).

use std::io::Write;

use softmask_core::mask::MaskId;
use softmask_core::trace::{
    BufferEvent, BufferEventKind, CompositeEvent, CompositeOutcome, FallbackEvent, FallbackReason,
    MaterialEvent, MaterialEventKind, PhaseBeginEvent, PhaseEndEvent, PhaseKind, TraceSink,
};

/// Writes human-readable trace lines to a [`Write`](std::io::Write) destination.
pub struct PrettyPrintSink<W: Write = Box<dyn Write>> {
    writer: W,
}

impl<W: Write> std::fmt::Debug for PrettyPrintSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrettyPrintSink").finish_non_exhaustive()
    }
}

impl PrettyPrintSink {
    /// Creates a sink that writes to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self {
            writer: Box::new(std::io::stderr()),
        }
    }

    /// Creates a sink that writes to a boxed writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write>) -> Self {
        Self { writer }
    }
}

impl<W: Write> PrettyPrintSink<W> {
    /// Creates a sink that writes to the given destination.
    #[must_use]
    pub fn with_writer(writer: W) -> Self {
        Self { writer }
    }

    /// Consumes the sink and returns its writer.
    #[must_use]
    pub fn into_inner(self) -> W {
        self.writer
    }
}

fn phase_name(phase: PhaseKind) -> &'static str {
    match phase {
        PhaseKind::BeforeRebuild => "before-rebuild",
        PhaseKind::AfterRebuild => "after-rebuild",
    }
}

fn outcome_name(outcome: CompositeOutcome) -> &'static str {
    match outcome {
        CompositeOutcome::Drawn => "drawn",
        CompositeOutcome::Cleared => "cleared",
        CompositeOutcome::Skipped => "skipped",
    }
}

fn buffer_kind_name(kind: BufferEventKind) -> &'static str {
    match kind {
        BufferEventKind::Allocated => "alloc",
        BufferEventKind::Reused => "reuse",
        BufferEventKind::Released => "release",
        BufferEventKind::Destroyed => "destroy",
    }
}

fn material_kind_name(kind: MaterialEventKind) -> &'static str {
    match kind {
        MaterialEventKind::Derived => "derive",
        MaterialEventKind::Shared => "share",
        MaterialEventKind::Released => "release",
        MaterialEventKind::Destroyed => "destroy",
        MaterialEventKind::Retired => "retire",
    }
}

impl<W: Write> TraceSink for PrettyPrintSink<W> {
    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        let _ = writeln!(
            self.writer,
            "[phase:begin] frame={} {}",
            e.frame_index,
            phase_name(e.phase),
        );
    }

    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        let _ = writeln!(
            self.writer,
            "[phase:end] frame={} {}",
            e.frame_index,
            phase_name(e.phase),
        );
    }

    fn on_composite(&mut self, e: &CompositeEvent) {
        let buffer = e.buffer.map_or_else(|| "-".to_owned(), |b| b.0.to_string());
        let _ = writeln!(
            self.writer,
            "[composite] frame={} root={}@{} buffer={buffer} {} levels={} commands={}",
            e.frame_index,
            e.root.index(),
            e.root.generation(),
            outcome_name(e.outcome),
            e.levels,
            e.commands,
        );
    }

    fn on_buffer(&mut self, e: &BufferEvent) {
        let _ = writeln!(
            self.writer,
            "[buffer:{}] id={} {}x{}",
            buffer_kind_name(e.kind),
            e.buffer.0,
            e.size.width,
            e.size.height,
        );
    }

    fn on_material(&mut self, e: &MaterialEvent) {
        let _ = writeln!(
            self.writer,
            "[material:{}] id={} key={:#034x} refs={}",
            material_kind_name(e.kind),
            e.material.0,
            e.key,
            e.ref_count,
        );
    }

    fn on_fallback(&mut self, e: &FallbackEvent) {
        let reason = match e.reason {
            FallbackReason::Resource(err) => format!("resource: {err}"),
            FallbackReason::DepthExceeded { depth } => format!("depth {depth} exceeds channels"),
            FallbackReason::InvalidBaseMaterial => "invalid base material".to_owned(),
        };
        let element = e
            .element
            .map_or_else(|| "-".to_owned(), |el| el.0.to_string());
        let mask = e
            .mask
            .map_or_else(|| "-".to_owned(), |m| format!("{}@{}", m.index(), m.generation()));
        let _ = writeln!(
            self.writer,
            "[fallback] element={element} mask={mask} {reason}",
        );
    }

    fn on_dirty_masks(&mut self, frame_index: u64, masks: &[MaskId]) {
        let _ = writeln!(
            self.writer,
            "[dirty] frame={frame_index} masks={}",
            masks.len(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use softmask_core::error::ResourceError;
    use softmask_core::hierarchy::ElementId;
    use softmask_core::resource::{BufferId, BufferSize};

    fn output(sink: PrettyPrintSink<Vec<u8>>) -> String {
        String::from_utf8(sink.into_inner()).unwrap()
    }

    #[test]
    fn pretty_print_phase() {
        let mut sink = PrettyPrintSink::with_writer(Vec::<u8>::new());
        sink.on_phase_begin(&PhaseBeginEvent {
            frame_index: 3,
            phase: PhaseKind::AfterRebuild,
        });
        let output = output(sink);
        assert!(output.contains("[phase:begin]"), "got: {output}");
        assert!(output.contains("frame=3 after-rebuild"), "got: {output}");
    }

    #[test]
    fn pretty_print_buffer_and_fallback() {
        let mut sink = PrettyPrintSink::with_writer(Vec::<u8>::new());
        sink.on_buffer(&BufferEvent {
            kind: BufferEventKind::Allocated,
            buffer: BufferId(4),
            size: BufferSize::new(64, 32),
        });
        sink.on_fallback(&FallbackEvent {
            reason: FallbackReason::Resource(ResourceError::BufferAllocation(BufferSize::new(
                64, 32,
            ))),
            element: Some(ElementId(9)),
            mask: None,
        });
        let output = output(sink);
        assert!(output.contains("[buffer:alloc] id=4 64x32"), "got: {output}");
        assert!(output.contains("element=9 mask=-"), "got: {output}");
        assert!(output.contains("failed to allocate 64x32"), "got: {output}");
    }
}
