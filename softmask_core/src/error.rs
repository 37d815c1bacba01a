// Copyright 2026 the Softmask Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Errors reported by the host when creating masking resources.
//!
//! None of these abort a frame. Callers fall back to unmasked rendering and
//! emit a [`FallbackEvent`](crate::trace::FallbackEvent).

use core::fmt;

use crate::resource::{BufferSize, MaterialId};

/// Failure to create or bind a GPU resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResourceError {
    /// The off-screen buffer could not be allocated.
    BufferAllocation(BufferSize),
    /// The base material's shader has no soft-maskable variant.
    MissingShaderVariant(MaterialId),
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BufferAllocation(size) => write!(
                f,
                "failed to allocate {}x{} mask buffer",
                size.width, size.height
            ),
            Self::MissingShaderVariant(m) => {
                write!(f, "no soft-maskable shader variant for {m:?}")
            }
        }
    }
}

impl core::error::Error for ResourceError {}
