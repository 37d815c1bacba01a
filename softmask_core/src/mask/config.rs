// Copyright 2026 the Softmask Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-mask configuration types.

use crate::resource::BufferSize;

/// How a mask clips its descendants.
///
/// Each mode answers the same three capability queries; callers dispatch on
/// the answers instead of on the variant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum MaskingMode {
    /// Alpha-gradient masking through a composited off-screen buffer.
    #[default]
    SoftMasking,
    /// Stencil masking with an alpha-clipped, anti-aliased edge.
    AntiAliasing,
    /// Plain binary stencil masking.
    Normal,
}

impl MaskingMode {
    /// Whether the mask writes its graphic into the stencil buffer.
    #[inline]
    #[must_use]
    pub const fn applies_stencil(self) -> bool {
        matches!(self, Self::AntiAliasing | Self::Normal)
    }

    /// Whether the mask renders into a soft-mask buffer channel.
    #[inline]
    #[must_use]
    pub const fn composites_soft_mask(self) -> bool {
        matches!(self, Self::SoftMasking)
    }

    /// Whether raycast validation samples the composited buffer (as opposed
    /// to a geometric inside test).
    #[inline]
    #[must_use]
    pub const fn samples_buffer_for_raycast(self) -> bool {
        matches!(self, Self::SoftMasking)
    }
}

/// Divisor applied to the viewport size when allocating a mask buffer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DownSamplingRate {
    /// Full resolution.
    #[default]
    None,
    /// Full resolution.
    X1,
    /// Half resolution.
    X2,
    /// Quarter resolution.
    X4,
    /// Eighth resolution.
    X8,
}

impl DownSamplingRate {
    /// Returns the resolution divisor.
    #[inline]
    #[must_use]
    pub const fn divisor(self) -> u32 {
        match self {
            Self::None | Self::X1 => 1,
            Self::X2 => 2,
            Self::X4 => 4,
            Self::X8 => 8,
        }
    }

    /// Buffer size for a viewport of `width`×`height` pixels.
    #[inline]
    #[must_use]
    pub const fn buffer_size(self, width: u32, height: u32) -> BufferSize {
        BufferSize::new(width / self.divisor(), height / self.divisor())
    }
}

/// Alpha remapping window `[min, max]` for a soft edge.
///
/// Construction normalizes the pair: values are clamped to `[0, 1]` and an
/// inverted pair is swapped.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SoftnessRange {
    min: f32,
    max: f32,
}

impl SoftnessRange {
    /// The full `[0, 1]` window.
    pub const FULL: Self = Self { min: 0.0, max: 1.0 };

    /// Creates a normalized range.
    #[must_use]
    pub fn new(a: f32, b: f32) -> Self {
        let a = clamp_unit(a);
        let b = clamp_unit(b);
        if a <= b {
            Self { min: a, max: b }
        } else {
            Self { min: b, max: a }
        }
    }

    /// Lower bound.
    #[inline]
    #[must_use]
    pub const fn min(self) -> f32 {
        self.min
    }

    /// Upper bound.
    #[inline]
    #[must_use]
    pub const fn max(self) -> f32 {
        self.max
    }

    /// Returns `[min, max]`.
    #[inline]
    #[must_use]
    pub const fn to_array(self) -> [f32; 2] {
        [self.min, self.max]
    }
}

impl Default for SoftnessRange {
    fn default() -> Self {
        Self::FULL
    }
}

/// NaN maps to 0.
fn clamp_unit(v: f32) -> f32 {
    if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) }
}

/// Creation-time configuration of a mask node.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MaskConfig {
    /// Masking mode.
    pub mode: MaskingMode,
    /// Buffer resolution divisor (used when this node is a root).
    pub down_sampling: DownSamplingRate,
    /// Soft-edge window.
    pub softness: SoftnessRange,
    /// Whether raycasts also require source-texture alpha.
    pub alpha_hit_test: bool,
    /// Whether the mask's own graphic stays visible.
    pub show_graphic: bool,
    /// Never attach to an enclosing soft mask; always act as a root.
    pub ignore_parent: bool,
    /// Share the parent's compositing level instead of nesting one deeper.
    pub part_of_parent: bool,
}

impl Default for MaskConfig {
    fn default() -> Self {
        Self {
            mode: MaskingMode::SoftMasking,
            down_sampling: DownSamplingRate::None,
            softness: SoftnessRange::FULL,
            alpha_hit_test: false,
            show_graphic: false,
            ignore_parent: false,
            part_of_parent: false,
        }
    }
}
