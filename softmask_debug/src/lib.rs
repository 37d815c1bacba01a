// Copyright 2026 the Softmask Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Recording, pretty-printing, and JSON export for softmask diagnostics.
//!
//! This crate provides [`TraceSink`](softmask_core::trace::TraceSink)
//! implementations for development and post-mortem analysis:
//!
//! - [`pretty::PrettyPrintSink`]: human-readable one-line-per-event output.
//! - [`recorder::RecorderSink`]: compact binary recording with
//!   [`recorder::decode`] for playback.
//! - [`json::export`] and [`json::summarize`]: JSON views of recorded bytes.

pub mod json;
pub mod pretty;
pub mod recorder;
