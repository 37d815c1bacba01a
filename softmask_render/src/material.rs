// Copyright 2026 the Softmask Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Derived soft-maskable materials.
//!
//! Every masked element draws with a material cloned from its base material
//! and bound to the mask buffer of its nearest soft mask. Identical
//! derivations are shared through a reference-counted [`MaterialRepository`]
//! keyed by a packed [`MaterialKey`], so at most one derived material exists
//! per distinct parameter set.

use alloc::vec::Vec;

use bytemuck::{Pod, Zeroable};
use hashbrown::HashMap;
use softmask_core::MAX_SOFT_MASK_DEPTH;
use softmask_core::depth::StencilDepthResolver;
use softmask_core::error::ResourceError;
use softmask_core::hierarchy::{ElementId, Hierarchy};
use softmask_core::mask::{MaskId, MaskStore, MaskingMode, SoftnessRange};
use softmask_core::resource::{BufferId, MaterialId};
use softmask_core::settings::{ShaderFallback, SoftMaskSettings};
use softmask_core::trace::{
    FallbackEvent, FallbackReason, MaterialEvent, MaterialEventKind, Tracer,
};

use crate::device::GraphicsDevice;

/// Packed cache key of a derived material.
///
/// Layout, most significant first: no-buffer flag (1), alpha-clip threshold
/// (8), base material id (32), buffer id (32), stencil bits (8), depth (8),
/// stereo (1), local-id present (1), local shape id (16). Distinct parameter
/// sets never collide.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MaterialKey(pub u128);

const NO_BUFFER: u128 = 1 << 106;
const BASE_MASK: u128 = (u32::MAX as u128) << 66;

impl MaterialKey {
    /// Packs the derivation parameters.
    #[must_use]
    pub const fn new(
        base: MaterialId,
        buffer: BufferId,
        stencil_bits: u8,
        depth: u8,
        stereo: bool,
        local_id: Option<u16>,
    ) -> Self {
        let (has_local, local) = match local_id {
            Some(id) => (1_u128, id as u128),
            None => (0, 0),
        };
        Self(
            (base.0 as u128) << 66
                | (buffer.0 as u128) << 34
                | (stencil_bits as u128) << 26
                | (depth as u128) << 18
                | (stereo as u128) << 17
                | has_local << 16
                | local,
        )
    }

    /// Key of a stencil-writing material for an anti-aliased mask graphic.
    /// It binds no mask buffer.
    #[must_use]
    pub const fn stencil_writer(
        base: MaterialId,
        stencil_bits: u8,
        stereo: bool,
        alpha_clip: u8,
    ) -> Self {
        let key = Self::new(base, BufferId(0), stencil_bits, 0, stereo, None);
        Self(key.0 | NO_BUFFER).with_alpha_clip(alpha_clip)
    }

    /// Returns this key with the alpha-clip threshold replaced.
    #[must_use]
    pub const fn with_alpha_clip(self, alpha_clip: u8) -> Self {
        Self(self.0 & !(0xff << 98) | (alpha_clip as u128) << 98)
    }

    /// Returns this key with the base material replaced.
    #[must_use]
    pub const fn with_base(self, base: MaterialId) -> Self {
        Self(self.0 & !BASE_MASK | (base.0 as u128) << 66)
    }

    /// The base material id packed into this key.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "the field is exactly 32 bits wide"
    )]
    #[must_use]
    pub const fn base(self) -> MaterialId {
        MaterialId((self.0 >> 66) as u32)
    }

    /// The buffer id packed into this key, `None` for stencil writers.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "the field is exactly 32 bits wide"
    )]
    #[must_use]
    pub const fn buffer(self) -> Option<BufferId> {
        if self.0 & NO_BUFFER != 0 {
            None
        } else {
            Some(BufferId((self.0 >> 34) as u32))
        }
    }

    /// The alpha-clip threshold packed into this key.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "the field is exactly 8 bits wide"
    )]
    #[must_use]
    pub const fn alpha_clip(self) -> u8 {
        (self.0 >> 98) as u8
    }
}

/// Shader parameters of a derived material.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct MaskUniforms {
    /// One-hot selector of the RGBA component holding the element's level.
    pub channel_selector: [f32; 4],
    /// Stencil reference bits.
    pub stencil_bits: u32,
    /// 1 when rendering in stereo.
    pub stereo: u32,
    /// Fragments with alpha at or below this are discarded. 0 disables
    /// clipping.
    pub alpha_clip: f32,
    /// Padding to a 16-byte multiple.
    pub _pad: u32,
}

impl MaskUniforms {
    /// Parameters for an element whose nearest soft mask sits at `depth`.
    /// Depths beyond the channel count yield an all-zero selector.
    #[must_use]
    pub fn new(depth: u8, stencil_bits: u8, stereo: bool) -> Self {
        let mut channel_selector = [0.0; 4];
        if let Some(slot) = channel_selector.get_mut(usize::from(depth)) {
            *slot = 1.0;
        }
        Self {
            channel_selector,
            stencil_bits: u32::from(stencil_bits),
            stereo: u32::from(stereo),
            alpha_clip: 0.0,
            _pad: 0,
        }
    }

    /// Sets the alpha-clip threshold from its 8-bit key form.
    #[must_use]
    pub fn with_alpha_clip(mut self, alpha_clip: u8) -> Self {
        self.alpha_clip = f32::from(alpha_clip) / 255.0;
        self
    }
}

/// Alpha-clip threshold of an anti-aliased mask with the given softness
/// floor, in the 8-bit form stored in [`MaterialKey`].
#[expect(
    clippy::cast_possible_truncation,
    reason = "the value is clamped to the u8 range first"
)]
#[must_use]
pub fn alpha_clip_threshold(softness: SoftnessRange) -> u8 {
    (softness.min().clamp(0.0, 1.0) * 255.0 + 0.5) as u8
}

/// Everything a device needs to derive a soft-maskable material.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DerivedMaterialDesc {
    /// Material to clone.
    pub base: MaterialId,
    /// Mask buffer to bind as the soft-mask texture. `None` for stencil
    /// writers of anti-aliased masks.
    pub buffer: Option<BufferId>,
    /// Shader parameters.
    pub uniforms: MaskUniforms,
}

#[derive(Clone, Copy, Debug)]
struct Entry {
    material: MaterialId,
    ref_count: u32,
}

/// Reference-counted store of derived materials.
///
/// Entries whose buffer was destroyed are *retired*: lookups no longer find
/// them, but outstanding releases still count down and destroy them at zero.
#[derive(Debug, Default)]
pub struct MaterialRepository {
    live: HashMap<MaterialKey, Entry>,
    retired: Vec<(MaterialKey, Entry)>,
}

impl MaterialRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the material for `key`, deriving it on a miss, and takes one
    /// reference.
    pub fn acquire<D: GraphicsDevice + ?Sized>(
        &mut self,
        key: MaterialKey,
        desc: &DerivedMaterialDesc,
        device: &mut D,
        tracer: &mut Tracer<'_>,
    ) -> Result<MaterialId, ResourceError> {
        let (entry, kind) = if let Some(entry) = self.live.get_mut(&key) {
            entry.ref_count += 1;
            (*entry, MaterialEventKind::Shared)
        } else {
            let material = device.create_derived_material(desc)?;
            let entry = Entry {
                material,
                ref_count: 1,
            };
            self.live.insert(key, entry);
            (entry, MaterialEventKind::Derived)
        };
        tracer.material(&MaterialEvent {
            kind,
            key: key.0,
            material: entry.material,
            ref_count: entry.ref_count,
        });
        Ok(entry.material)
    }

    /// Drops one reference to `material` under `key`, destroying it at zero.
    /// Unknown pairs are ignored.
    pub fn release<D: GraphicsDevice + ?Sized>(
        &mut self,
        key: MaterialKey,
        material: MaterialId,
        device: &mut D,
        tracer: &mut Tracer<'_>,
    ) {
        let live = self
            .live
            .get_mut(&key)
            .filter(|e| e.material == material);
        let remaining = if let Some(entry) = live {
            entry.ref_count -= 1;
            let n = entry.ref_count;
            if n == 0 {
                self.live.remove(&key);
            }
            n
        } else if let Some(pos) = self
            .retired
            .iter()
            .position(|(k, e)| *k == key && e.material == material)
        {
            let entry = &mut self.retired[pos].1;
            entry.ref_count -= 1;
            let n = entry.ref_count;
            if n == 0 {
                self.retired.swap_remove(pos);
            }
            n
        } else {
            return;
        };

        tracer.material(&MaterialEvent {
            kind: MaterialEventKind::Released,
            key: key.0,
            material,
            ref_count: remaining,
        });
        if remaining == 0 {
            device.destroy_material(material);
            tracer.material(&MaterialEvent {
                kind: MaterialEventKind::Destroyed,
                key: key.0,
                material,
                ref_count: 0,
            });
        }
    }

    /// Retires every entry bound to one of `buffers`.
    pub fn retire_buffers(&mut self, buffers: &[BufferId], tracer: &mut Tracer<'_>) {
        let mut keys: Vec<MaterialKey> = self
            .live
            .keys()
            .copied()
            .filter(|k| k.buffer().is_some_and(|b| buffers.contains(&b)))
            .collect();
        keys.sort_unstable();
        for key in keys {
            if let Some(entry) = self.live.remove(&key) {
                tracer.material(&MaterialEvent {
                    kind: MaterialEventKind::Retired,
                    key: key.0,
                    material: entry.material,
                    ref_count: entry.ref_count,
                });
                self.retired.push((key, entry));
            }
        }
    }

    /// Looks up a live entry, returning its material and reference count.
    #[must_use]
    pub fn get(&self, key: MaterialKey) -> Option<(MaterialId, u32)> {
        self.live.get(&key).map(|e| (e.material, e.ref_count))
    }

    /// Number of live entries.
    #[must_use]
    pub fn live_len(&self) -> usize {
        self.live.len()
    }

    /// Number of retired entries still referenced.
    #[must_use]
    pub fn retired_len(&self) -> usize {
        self.retired.len()
    }

    /// Destroys every material regardless of reference counts.
    pub fn clear<D: GraphicsDevice + ?Sized>(&mut self, device: &mut D, tracer: &mut Tracer<'_>) {
        let mut all: Vec<(MaterialKey, Entry)> = self.live.drain().collect();
        all.sort_unstable_by_key(|&(k, _)| k);
        all.append(&mut self.retired);
        for (key, entry) in all {
            device.destroy_material(entry.material);
            tracer.material(&MaterialEvent {
                kind: MaterialEventKind::Destroyed,
                key: key.0,
                material: entry.material,
                ref_count: 0,
            });
        }
    }
}

/// Per-element material resolution on top of a [`MaterialRepository`].
///
/// Each element holds at most one reference: resolving again with the same
/// key is free, resolving with a new key acquires the new entry before
/// releasing the old one.
#[derive(Debug, Default)]
pub struct MaterialResolver {
    repository: MaterialRepository,
    per_element: HashMap<ElementId, (MaterialKey, MaterialId)>,
}

impl MaterialResolver {
    /// Creates an empty resolver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the material `element` should draw with: a derived material
    /// bound to its nearest soft mask's buffer, or `base` unchanged when no
    /// masking applies or derivation fails.
    ///
    /// The graphic of an anti-aliased mask also carries an alpha-clip
    /// threshold taken from its softness floor. Without an enclosing soft
    /// mask it gets a stencil-writing material that binds no buffer.
    pub fn resolve<H: Hierarchy + ?Sized, D: GraphicsDevice + ?Sized>(
        &mut self,
        settings: &SoftMaskSettings,
        hierarchy: &H,
        store: &MaskStore,
        depths: &mut StencilDepthResolver,
        device: &mut D,
        tracer: &mut Tracer<'_>,
        element: ElementId,
        base: MaterialId,
    ) -> MaterialId {
        if !base.is_valid() {
            tracer.fallback(&FallbackEvent {
                reason: FallbackReason::InvalidBaseMaterial,
                element: Some(element),
                mask: None,
            });
            self.release_element(element, device, tracer);
            return base;
        }
        if !settings.enabled || !hierarchy.is_active(element) {
            self.release_element(element, device, tracer);
            return base;
        }
        let alpha_clip = anti_aliased_graphic(store, element);
        let Some(mask) = depths.nearest_soft_mask(hierarchy, store, element) else {
            let Some(alpha_clip) = alpha_clip else {
                self.release_element(element, device, tracer);
                return base;
            };
            let stencil_bits = depths.resolve(hierarchy, element, true).stencil_bits();
            let key = MaterialKey::stencil_writer(base, stencil_bits, settings.stereo, alpha_clip);
            let uniforms =
                MaskUniforms::new(u8::MAX, stencil_bits, settings.stereo).with_alpha_clip(alpha_clip);
            return self.bind(settings, element, None, key, None, uniforms, device, tracer);
        };
        let depth = store.absolute_depth(mask);
        if depth >= MAX_SOFT_MASK_DEPTH {
            tracer.fallback(&FallbackEvent {
                reason: FallbackReason::DepthExceeded { depth },
                element: Some(element),
                mask: Some(mask),
            });
            self.release_element(element, device, tracer);
            return base;
        }
        let Some(buffer) = store.root_buffer(mask) else {
            // Not composited yet; the next rebuild picks it up.
            self.release_element(element, device, tracer);
            return base;
        };

        let alpha_clip = alpha_clip.unwrap_or(0);
        let stencil_bits = depths.resolve(hierarchy, element, false).stencil_bits();
        let key = MaterialKey::new(base, buffer, stencil_bits, depth, settings.stereo, None)
            .with_alpha_clip(alpha_clip);
        let uniforms =
            MaskUniforms::new(depth, stencil_bits, settings.stereo).with_alpha_clip(alpha_clip);
        self.bind(
            settings,
            element,
            Some(mask),
            key,
            Some(buffer),
            uniforms,
            device,
            tracer,
        )
    }

    /// Drops `element`'s reference, if it holds one.
    pub fn release_element<D: GraphicsDevice + ?Sized>(
        &mut self,
        element: ElementId,
        device: &mut D,
        tracer: &mut Tracer<'_>,
    ) {
        if let Some((key, material)) = self.per_element.remove(&element) {
            self.repository.release(key, material, device, tracer);
        }
    }

    /// Retires cached materials bound to destroyed buffers, so subsequent
    /// resolves derive fresh ones.
    pub fn retire_buffers(&mut self, buffers: &[BufferId], tracer: &mut Tracer<'_>) {
        self.repository.retire_buffers(buffers, tracer);
    }

    /// Elements whose held material no longer matches the anti-aliasing
    /// threshold their mask graphic asks for, in mask order.
    #[must_use]
    pub fn stale_alpha_clips(&self, store: &MaskStore) -> Vec<ElementId> {
        store
            .ids()
            .into_iter()
            .filter_map(|id| {
                let element = store.element(id);
                let (key, _) = self.per_element.get(&element)?;
                let wanted = anti_aliased_graphic(store, element);
                let stale = match wanted {
                    Some(clip) => key.alpha_clip() != clip,
                    None => key.buffer().is_none() || key.alpha_clip() != 0,
                };
                stale.then_some(element)
            })
            .collect()
    }

    /// The key and material `element` currently holds.
    #[must_use]
    pub fn current(&self, element: ElementId) -> Option<(MaterialKey, MaterialId)> {
        self.per_element.get(&element).copied()
    }

    /// The shared repository.
    #[must_use]
    pub fn repository(&self) -> &MaterialRepository {
        &self.repository
    }

    /// Destroys every derived material and forgets all elements.
    pub fn clear<D: GraphicsDevice + ?Sized>(&mut self, device: &mut D, tracer: &mut Tracer<'_>) {
        self.per_element.clear();
        self.repository.clear(device, tracer);
    }

    /// Points `element` at the material for `key`, deriving or sharing it.
    ///
    /// The held material is reused only while its entry is still live: an
    /// entry retired with its buffer is never handed out again, even when
    /// the device recycles the buffer id into an identical key.
    fn bind<D: GraphicsDevice + ?Sized>(
        &mut self,
        settings: &SoftMaskSettings,
        element: ElementId,
        mask: Option<MaskId>,
        key: MaterialKey,
        buffer: Option<BufferId>,
        uniforms: MaskUniforms,
        device: &mut D,
        tracer: &mut Tracer<'_>,
    ) -> MaterialId {
        if let Some(&(current, material)) = self.per_element.get(&element) {
            let live = self.repository.get(key).map(|(m, _)| m);
            if current == key && live == Some(material) {
                return material;
            }
        }

        let base = key.base();
        let acquired = self
            .acquire(key, buffer, uniforms, device, tracer)
            .or_else(|err| match (err, settings.shader_fallback) {
                (ResourceError::MissingShaderVariant(_), ShaderFallback::DefaultVariant(v))
                    if v.is_valid() && v != base =>
                {
                    tracer.fallback(&FallbackEvent {
                        reason: FallbackReason::Resource(err),
                        element: Some(element),
                        mask,
                    });
                    self.acquire(key.with_base(v), buffer, uniforms, device, tracer)
                }
                _ => Err(err),
            });

        match acquired {
            Ok((key, material)) => {
                if let Some((old_key, old)) = self.per_element.insert(element, (key, material)) {
                    self.repository.release(old_key, old, device, tracer);
                }
                material
            }
            Err(err) => {
                tracer.fallback(&FallbackEvent {
                    reason: FallbackReason::Resource(err),
                    element: Some(element),
                    mask,
                });
                self.release_element(element, device, tracer);
                base
            }
        }
    }

    fn acquire<D: GraphicsDevice + ?Sized>(
        &mut self,
        key: MaterialKey,
        buffer: Option<BufferId>,
        uniforms: MaskUniforms,
        device: &mut D,
        tracer: &mut Tracer<'_>,
    ) -> Result<(MaterialKey, MaterialId), ResourceError> {
        let desc = DerivedMaterialDesc {
            base: key.base(),
            buffer,
            uniforms,
        };
        self.repository
            .acquire(key, &desc, device, tracer)
            .map(|m| (key, m))
    }
}

/// Alpha-clip threshold for `element` when it is the graphic of an enabled
/// anti-aliased mask.
fn anti_aliased_graphic(store: &MaskStore, element: ElementId) -> Option<u8> {
    let mask = store.find(element).filter(|&m| store.is_enabled(m))?;
    let config = store.config(mask);
    (config.mode == MaskingMode::AntiAliasing).then(|| alpha_clip_threshold(config.softness))
}
