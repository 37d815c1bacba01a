// Copyright 2026 the Softmask Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Off-screen mask buffer pool.

use alloc::vec::Vec;

use hashbrown::HashMap;
use softmask_core::error::ResourceError;
use softmask_core::resource::{BufferId, BufferSize};
use softmask_core::trace::{BufferEvent, BufferEventKind, Tracer};

use crate::device::GraphicsDevice;

/// Reuses released mask buffers of matching size.
///
/// Every buffer the pool hands out is either *live* (owned by one root) or
/// *idle* (released, awaiting reuse or [`trim`](Self::trim)).
#[derive(Debug, Default)]
pub struct BufferPool {
    live: HashMap<BufferId, BufferSize>,
    idle: Vec<(BufferId, BufferSize)>,
}

impl BufferPool {
    /// Creates an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Hands out a buffer of `size`, reusing an idle one when possible.
    pub fn acquire<D: GraphicsDevice + ?Sized>(
        &mut self,
        device: &mut D,
        size: BufferSize,
        tracer: &mut Tracer<'_>,
    ) -> Result<BufferId, ResourceError> {
        let (buffer, kind) = if let Some(pos) = self.idle.iter().position(|&(_, s)| s == size) {
            (self.idle.swap_remove(pos).0, BufferEventKind::Reused)
        } else {
            (device.create_buffer(size)?, BufferEventKind::Allocated)
        };
        self.live.insert(buffer, size);
        tracer.buffer(&BufferEvent { kind, buffer, size });
        Ok(buffer)
    }

    /// Returns a live buffer to the idle list. Unknown buffers are ignored.
    pub fn release(&mut self, buffer: BufferId, tracer: &mut Tracer<'_>) {
        if let Some(size) = self.live.remove(&buffer) {
            self.idle.push((buffer, size));
            tracer.buffer(&BufferEvent {
                kind: BufferEventKind::Released,
                buffer,
                size,
            });
        }
    }

    /// Destroys every idle buffer, returning the destroyed handles.
    pub fn trim<D: GraphicsDevice + ?Sized>(
        &mut self,
        device: &mut D,
        tracer: &mut Tracer<'_>,
    ) -> Vec<BufferId> {
        let mut destroyed = Vec::with_capacity(self.idle.len());
        for (buffer, size) in self.idle.drain(..) {
            device.destroy_buffer(buffer);
            tracer.buffer(&BufferEvent {
                kind: BufferEventKind::Destroyed,
                buffer,
                size,
            });
            destroyed.push(buffer);
        }
        destroyed
    }

    /// Destroys every buffer, live and idle, returning the destroyed handles
    /// so dependents can drop references to them.
    pub fn invalidate_all<D: GraphicsDevice + ?Sized>(
        &mut self,
        device: &mut D,
        tracer: &mut Tracer<'_>,
    ) -> Vec<BufferId> {
        let mut all: Vec<(BufferId, BufferSize)> = self.live.drain().collect();
        all.sort_unstable_by_key(|&(b, _)| b);
        all.append(&mut self.idle);
        let mut destroyed = Vec::with_capacity(all.len());
        for (buffer, size) in all {
            device.destroy_buffer(buffer);
            tracer.buffer(&BufferEvent {
                kind: BufferEventKind::Destroyed,
                buffer,
                size,
            });
            destroyed.push(buffer);
        }
        destroyed
    }

    /// Size of a live buffer.
    #[must_use]
    pub fn size_of(&self, buffer: BufferId) -> Option<BufferSize> {
        self.live.get(&buffer).copied()
    }

    /// Number of buffers owned by roots.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Number of released buffers awaiting reuse.
    #[must_use]
    pub fn idle_count(&self) -> usize {
        self.idle.len()
    }
}
