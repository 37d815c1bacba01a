// Copyright 2026 the Softmask Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! JSON export of recorded traces.
//!
//! [`export`] reads bytes from a [`RecorderSink`](super::recorder::RecorderSink)
//! and writes a JSON array with one object per event. Events that carry no
//! frame index of their own are attributed to the frame of the most recent
//! phase marker.
//!
//! [`summarize`] folds the same recording into per-run totals, which is
//! usually what you want when checking buffer churn or material sharing.

use std::io::{self, Write};

use serde_json::{Map, Value, json};
use softmask_core::trace::{FallbackReason, PhaseKind};

use crate::recorder::{MaskRef, RecordedEvent, decode};

/// Exports recorded events as a JSON array.
pub fn export(bytes: &[u8], writer: &mut dyn Write) -> io::Result<()> {
    let mut events: Vec<Value> = Vec::new();
    let mut frame: Option<u64> = None;

    for recorded in decode(bytes) {
        if let Some(index) = recorded.frame_index() {
            frame = Some(index);
        }
        events.push(event_json(&recorded, frame));
    }

    serde_json::to_writer_pretty(writer, &events)?;
    Ok(())
}

/// Folds a recording into totals per event kind.
#[must_use]
pub fn summarize(bytes: &[u8]) -> Value {
    let mut frames = 0_u64;
    let mut counts = Map::new();
    let mut commands = 0_u64;
    let mut fallbacks = Map::new();

    for recorded in decode(bytes) {
        let name = match &recorded {
            RecordedEvent::PhaseBegin(e) => {
                if e.phase == PhaseKind::BeforeRebuild {
                    frames += 1;
                }
                continue;
            }
            RecordedEvent::PhaseEnd(_) => continue,
            RecordedEvent::Composite(c) => {
                commands += u64::from(c.commands);
                format!("composite:{:?}", c.outcome)
            }
            RecordedEvent::Buffer(e) => format!("buffer:{:?}", e.kind),
            RecordedEvent::Material(e) => format!("material:{:?}", e.kind),
            RecordedEvent::Fallback(f) => {
                bump(&mut fallbacks, reason_name(f.reason));
                continue;
            }
            RecordedEvent::DirtyMasksCount { .. } => continue,
        };
        bump(&mut counts, &name);
    }

    json!({
        "frames": frames,
        "commands": commands,
        "events": counts,
        "fallbacks": fallbacks,
    })
}

fn bump(map: &mut Map<String, Value>, key: &str) {
    let entry = map.entry(key).or_insert(Value::from(0_u64));
    let n = entry.as_u64().unwrap_or(0);
    *entry = Value::from(n + 1);
}

fn mask_json(mask: MaskRef) -> Value {
    json!({ "index": mask.index, "generation": mask.generation })
}

fn reason_name(reason: FallbackReason) -> &'static str {
    match reason {
        FallbackReason::Resource(_) => "resource",
        FallbackReason::DepthExceeded { .. } => "depth_exceeded",
        FallbackReason::InvalidBaseMaterial => "invalid_base_material",
    }
}

fn event_json(recorded: &RecordedEvent, frame: Option<u64>) -> Value {
    match recorded {
        RecordedEvent::PhaseBegin(e) => json!({
            "event": "phase_begin",
            "frame": frame,
            "phase": format!("{:?}", e.phase),
        }),
        RecordedEvent::PhaseEnd(e) => json!({
            "event": "phase_end",
            "frame": frame,
            "phase": format!("{:?}", e.phase),
        }),
        RecordedEvent::Composite(c) => json!({
            "event": "composite",
            "frame": frame,
            "root": mask_json(c.root),
            "buffer": c.buffer.map(|b| b.0),
            "outcome": format!("{:?}", c.outcome),
            "levels": c.levels,
            "commands": c.commands,
        }),
        RecordedEvent::Buffer(e) => json!({
            "event": "buffer",
            "frame": frame,
            "kind": format!("{:?}", e.kind),
            "buffer": e.buffer.0,
            "width": e.size.width,
            "height": e.size.height,
        }),
        RecordedEvent::Material(e) => json!({
            "event": "material",
            "frame": frame,
            "kind": format!("{:?}", e.kind),
            "key": format!("{:032x}", e.key),
            "material": e.material.0,
            "ref_count": e.ref_count,
        }),
        RecordedEvent::Fallback(f) => {
            let detail = match f.reason {
                FallbackReason::Resource(err) => Value::from(err.to_string()),
                FallbackReason::DepthExceeded { depth } => Value::from(depth),
                FallbackReason::InvalidBaseMaterial => Value::Null,
            };
            json!({
                "event": "fallback",
                "frame": frame,
                "reason": reason_name(f.reason),
                "detail": detail,
                "element": f.element.map(|el| el.0),
                "mask": f.mask.map(mask_json),
            })
        }
        RecordedEvent::DirtyMasksCount { count, .. } => json!({
            "event": "dirty_masks",
            "frame": frame,
            "count": count,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::RecorderSink;
    use softmask_core::error::ResourceError;
    use softmask_core::hierarchy::ElementId;
    use softmask_core::resource::{BufferId, BufferSize, MaterialId};
    use softmask_core::trace::{
        BufferEvent, BufferEventKind, FallbackEvent, MaterialEvent, MaterialEventKind,
        PhaseBeginEvent, PhaseEndEvent, TraceSink,
    };

    fn sample_recording() -> Vec<u8> {
        let mut rec = RecorderSink::new();
        rec.on_phase_begin(&PhaseBeginEvent {
            frame_index: 1,
            phase: PhaseKind::BeforeRebuild,
        });
        rec.on_phase_end(&PhaseEndEvent {
            frame_index: 1,
            phase: PhaseKind::BeforeRebuild,
        });
        rec.on_phase_begin(&PhaseBeginEvent {
            frame_index: 1,
            phase: PhaseKind::AfterRebuild,
        });
        rec.on_buffer(&BufferEvent {
            kind: BufferEventKind::Allocated,
            buffer: BufferId(1),
            size: BufferSize::new(100, 50),
        });
        rec.on_material(&MaterialEvent {
            kind: MaterialEventKind::Derived,
            key: 0xABCD,
            material: MaterialId(1001),
            ref_count: 1,
        });
        rec.on_material(&MaterialEvent {
            kind: MaterialEventKind::Shared,
            key: 0xABCD,
            material: MaterialId(1001),
            ref_count: 2,
        });
        rec.on_fallback(&FallbackEvent {
            reason: FallbackReason::Resource(ResourceError::MissingShaderVariant(MaterialId(4))),
            element: Some(ElementId(6)),
            mask: None,
        });
        rec.on_phase_end(&PhaseEndEvent {
            frame_index: 1,
            phase: PhaseKind::AfterRebuild,
        });
        rec.into_bytes()
    }

    #[test]
    fn export_produces_one_object_per_event() {
        let mut out = Vec::new();
        export(&sample_recording(), &mut out).unwrap();
        let parsed: Vec<Value> = serde_json::from_slice(&out).unwrap();
        assert_eq!(parsed.len(), 8);

        assert_eq!(parsed[0]["event"], "phase_begin");
        assert_eq!(parsed[0]["phase"], "BeforeRebuild");

        assert_eq!(parsed[3]["event"], "buffer");
        assert_eq!(parsed[3]["frame"], 1);
        assert_eq!(parsed[3]["width"], 100);

        assert_eq!(parsed[4]["key"], "0000000000000000000000000000abcd");

        assert_eq!(parsed[6]["event"], "fallback");
        assert_eq!(parsed[6]["reason"], "resource");
        assert_eq!(parsed[6]["element"], 6);
        assert!(parsed[6]["mask"].is_null());
    }

    #[test]
    fn events_before_any_phase_have_no_frame() {
        let mut rec = RecorderSink::new();
        rec.on_buffer(&BufferEvent {
            kind: BufferEventKind::Destroyed,
            buffer: BufferId(3),
            size: BufferSize::new(1, 1),
        });
        let mut out = Vec::new();
        export(rec.as_bytes(), &mut out).unwrap();
        let parsed: Vec<Value> = serde_json::from_slice(&out).unwrap();
        assert!(parsed[0]["frame"].is_null());
    }

    #[test]
    fn export_empty_recording() {
        let mut out = Vec::new();
        export(&[], &mut out).unwrap();
        let parsed: Vec<Value> = serde_json::from_slice(&out).unwrap();
        assert!(parsed.is_empty());
    }

    #[test]
    fn summary_counts_frames_and_kinds() {
        let summary = summarize(&sample_recording());
        assert_eq!(summary["frames"], 1);
        assert_eq!(summary["events"]["buffer:Allocated"], 1);
        assert_eq!(summary["events"]["material:Derived"], 1);
        assert_eq!(summary["events"]["material:Shared"], 1);
        assert_eq!(summary["fallbacks"]["resource"], 1);
    }
}
