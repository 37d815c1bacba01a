// Copyright 2026 the Softmask Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Global soft-masking configuration.

use crate::mask::DownSamplingRate;
use crate::resource::MaterialId;

/// How far a mask's world transform must move before its buffer is redrawn.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TransformSensitivity {
    /// Ignore changes smaller than one world unit.
    Low,
    /// Ignore changes smaller than a tenth of a world unit.
    #[default]
    Medium,
    /// Ignore changes smaller than a hundredth of a world unit.
    High,
}

impl TransformSensitivity {
    /// Returns the per-coefficient change threshold in world units.
    #[must_use]
    pub const fn threshold(self) -> f64 {
        match self {
            Self::Low => 1.0,
            Self::Medium => 0.1,
            Self::High => 0.01,
        }
    }
}

/// What to do when a base material has no soft-maskable shader variant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ShaderFallback {
    /// Render with the base material, unmasked.
    #[default]
    PassThrough,
    /// Derive the masked material from this default soft-maskable material
    /// instead.
    DefaultVariant(MaterialId),
}

/// Row order of the off-screen buffer relative to screen space.
///
/// Screen points handed to the core are always top-left origin; this selects
/// how they map onto buffer rows when sampling for raycasts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum BufferOrigin {
    /// Buffer row 0 is the top of the screen.
    TopLeft,
    /// Buffer row 0 is the bottom of the screen (GL-style).
    #[default]
    BottomLeft,
}

/// Configuration shared by every mask in a soft-mask context.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SoftMaskSettings {
    /// Master switch. When off, every element renders with its base material.
    pub enabled: bool,
    /// Whether derived materials are built for single-pass stereo rendering.
    pub stereo: bool,
    /// Down-sampling rate given to newly created masks.
    pub default_down_sampling: DownSamplingRate,
    /// World-transform change threshold for redrawing a mask.
    pub transform_sensitivity: TransformSensitivity,
    /// Behaviour when no soft-maskable shader variant exists.
    pub shader_fallback: ShaderFallback,
    /// Minimum alpha for a raycast to count as inside a mask.
    pub hit_alpha_threshold: f32,
    /// Row order used when sampling the buffer.
    pub buffer_origin: BufferOrigin,
}

impl SoftMaskSettings {
    /// Default settings for mono rendering.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            enabled: true,
            stereo: false,
            default_down_sampling: DownSamplingRate::None,
            transform_sensitivity: TransformSensitivity::Medium,
            shader_fallback: ShaderFallback::PassThrough,
            hit_alpha_threshold: 0.01,
            buffer_origin: BufferOrigin::BottomLeft,
        }
    }

    /// Default settings with stereo rendering enabled.
    #[must_use]
    pub const fn stereo() -> Self {
        let mut settings = Self::new();
        settings.stereo = true;
        settings
    }
}

impl Default for SoftMaskSettings {
    fn default() -> Self {
        Self::new()
    }
}
