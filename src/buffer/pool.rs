//! Buffer Pool: allocates decode buffers and hands out opaque integer handles.
//!
//! Handles pack a slab index with a per-allocation generation, so a handle
//! that outlives its buffer (use-after-free) or is freed twice never
//! resolves to a reused slot. Such lookups are reported as
//! [`BufferError::StaleHandle`]; debug builds panic on them by default.

use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use parking_lot::Mutex;
use slab::Slab;

use crate::buffer::buffer::{BufferError, DecodeBuffer};
use crate::buffer::layout::FrameLayout;

/// Opaque, non-zero handle to a pooled buffer. `0` is the null handle at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(NonZeroU64);

impl BufferHandle {
    fn new(index: usize, generation: u32) -> Self {
        let raw = ((generation as u64) << 32) | (index as u64 + 1);
        // index + 1 keeps the low half non-zero
        Self(NonZeroU64::new(raw).unwrap_or(NonZeroU64::MIN))
    }

    /// Parse a boundary value; `0` is the null handle
    pub fn from_raw(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Self)
    }

    pub fn into_raw(self) -> u64 {
        self.0.get()
    }

    fn index(self) -> usize {
        (self.0.get() & 0xFFFF_FFFF).wrapping_sub(1) as usize
    }

    fn generation(self) -> u32 {
        (self.0.get() >> 32) as u32
    }
}

/// What to do when a stale handle is presented
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StalePolicy {
    /// Log and return [`BufferError::StaleHandle`]
    Report,
    /// Panic after logging
    Panic,
}

impl Default for StalePolicy {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            StalePolicy::Panic
        } else {
            StalePolicy::Report
        }
    }
}

/// Allocation counters, for leak checks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub live: usize,
    pub allocated: u64,
    pub freed: u64,
    pub stale_lookups: u64,
}

struct Slot {
    generation: u32,
    buffer: DecodeBuffer,
}

/// Thread-safe buffer allocator.
///
/// Allocation and free may be called from any thread. A single buffer has
/// exactly one user at a time: [`BufferPool::with_buffer_mut`] holds the pool
/// lock for the duration of the closure.
pub struct BufferPool {
    slots: Mutex<Slab<Slot>>,
    next_generation: AtomicU32,
    stale_policy: StalePolicy,
    allocated: AtomicU64,
    freed: AtomicU64,
    stale_lookups: AtomicU64,
}

impl BufferPool {
    pub fn new() -> Self {
        Self::with_stale_policy(StalePolicy::default())
    }

    pub fn with_stale_policy(stale_policy: StalePolicy) -> Self {
        Self {
            slots: Mutex::new(Slab::new()),
            next_generation: AtomicU32::new(1),
            stale_policy,
            allocated: AtomicU64::new(0),
            freed: AtomicU64::new(0),
            stale_lookups: AtomicU64::new(0),
        }
    }

    fn insert(&self, buffer: DecodeBuffer) -> BufferHandle {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let index = self.slots.lock().insert(Slot { generation, buffer });
        self.allocated.fetch_add(1, Ordering::Relaxed);
        let handle = BufferHandle::new(index, generation);
        log::trace!("allocated decode buffer {:#x}", handle.into_raw());
        handle
    }

    /// Empty, kind-less buffer
    pub fn alloc(&self) -> BufferHandle {
        self.insert(DecodeBuffer::generic())
    }

    /// Video buffer pre-sized for `layout`
    pub fn alloc_video(&self, layout: &FrameLayout) -> BufferHandle {
        self.insert(DecodeBuffer::video(layout))
    }

    /// Audio buffer with `capacity` bytes of PCM reserved
    pub fn alloc_audio(&self, capacity: usize) -> BufferHandle {
        self.insert(DecodeBuffer::audio(capacity))
    }

    fn stale(&self, handle: BufferHandle) -> BufferError {
        self.stale_lookups.fetch_add(1, Ordering::Relaxed);
        log::error!("stale decode buffer handle {:#x} (freed or foreign)", handle.into_raw());
        if self.stale_policy == StalePolicy::Panic {
            panic!("stale decode buffer handle {:#x}", handle.into_raw());
        }
        BufferError::StaleHandle(handle.into_raw())
    }

    fn resolve<'a>(slots: &'a mut Slab<Slot>, handle: BufferHandle) -> Option<&'a mut Slot> {
        slots
            .get_mut(handle.index())
            .filter(|slot| slot.generation == handle.generation())
    }

    /// Release a buffer and its storage. The handle is invalid afterwards.
    pub fn free(&self, handle: BufferHandle) -> Result<(), BufferError> {
        let mut slots = self.slots.lock();
        if Self::resolve(&mut slots, handle).is_none() {
            drop(slots);
            return Err(self.stale(handle));
        }
        slots.remove(handle.index());
        self.freed.fetch_add(1, Ordering::Relaxed);
        log::trace!("freed decode buffer {:#x}", handle.into_raw());
        Ok(())
    }

    /// Read a buffer
    pub fn with_buffer<R>(&self, handle: BufferHandle, f: impl FnOnce(&DecodeBuffer) -> R) -> Result<R, BufferError> {
        self.with_buffer_mut(handle, |buffer| f(buffer))
    }

    /// Write into a buffer
    pub fn with_buffer_mut<R>(
        &self,
        handle: BufferHandle,
        f: impl FnOnce(&mut DecodeBuffer) -> R,
    ) -> Result<R, BufferError> {
        let mut slots = self.slots.lock();
        match Self::resolve(&mut slots, handle) {
            Some(slot) => Ok(f(&mut slot.buffer)),
            None => {
                drop(slots);
                Err(self.stale(handle))
            }
        }
    }

    pub fn contains(&self, handle: BufferHandle) -> bool {
        Self::resolve(&mut self.slots.lock(), handle).is_some()
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            live: self.slots.lock().len(),
            allocated: self.allocated.load(Ordering::Relaxed),
            freed: self.freed.load(Ordering::Relaxed),
            stale_lookups: self.stale_lookups.load(Ordering::Relaxed),
        }
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}
