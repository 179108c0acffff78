//! Grow-only scratch buffers
//!
//! The encode path needs a planar staging buffer before the engine and a
//! bitstream assembly buffer after it. Both are reused across frames and only
//! ever grow, so a steady-state stream allocates nothing per frame.

use crate::error::{Error, Result};

/// Which scratch buffer a request is for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferKind {
    /// I420 staging before compression
    Planar,
    /// Concatenated NAL units after compression
    Bitstream,
}

/// A reusable byte region whose capacity never shrinks
#[derive(Debug, Default)]
pub struct ScratchBuffer {
    data: Vec<u8>,
    reallocations: u64,
}

impl ScratchBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Borrow `size` bytes, growing to exactly `size` if the current region is smaller.
    ///
    /// Reused regions keep stale contents. On allocation failure the old region
    /// is already released, capacity drops to zero and `None` is returned.
    pub fn acquire(&mut self, size: usize) -> Option<&mut [u8]> {
        if self.data.len() >= size {
            return Some(&mut self.data[..size]);
        }

        self.data = Vec::new();
        let mut fresh = Vec::new();
        if fresh.try_reserve_exact(size).is_err() {
            tracing::warn!(size, "Scratch buffer allocation failed");
            return None;
        }
        fresh.resize(size, 0);
        self.data = fresh;
        self.reallocations += 1;

        tracing::trace!(size, "Scratch buffer grown");
        Some(&mut self.data[..])
    }

    /// Like `acquire`, reporting failure as an error
    pub fn try_acquire(&mut self, size: usize) -> Result<&mut [u8]> {
        self.acquire(size).ok_or(Error::Allocation(size))
    }

    /// Bytes currently allocated
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Number of times the region was (re)allocated
    pub fn reallocations(&self) -> u64 {
        self.reallocations
    }

    /// Start of the current region (for identity checks)
    pub fn as_ptr(&self) -> *const u8 {
        self.data.as_ptr()
    }

    /// Borrow the first `len` bytes without resizing
    pub fn get(&self, len: usize) -> &[u8] {
        &self.data[..len.min(self.data.len())]
    }
}

/// The two process-lifetime scratch regions used by a bridge
#[derive(Debug, Default)]
pub struct ScratchBufferPool {
    planar: ScratchBuffer,
    bitstream: ScratchBuffer,
}

impl ScratchBufferPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a pool with both regions pre-sized
    pub fn with_capacity(planar: usize, bitstream: usize) -> Self {
        let mut pool = Self::new();
        if planar > 0 && pool.planar.acquire(planar).is_none() {
            tracing::warn!(planar, "Could not pre-size planar buffer");
        }
        if bitstream > 0 && pool.bitstream.acquire(bitstream).is_none() {
            tracing::warn!(bitstream, "Could not pre-size bitstream buffer");
        }
        pool
    }

    /// Borrow `size` bytes of the given kind
    pub fn acquire(&mut self, kind: BufferKind, size: usize) -> Option<&mut [u8]> {
        self.buffer_mut(kind).acquire(size)
    }

    pub fn buffer(&self, kind: BufferKind) -> &ScratchBuffer {
        match kind {
            BufferKind::Planar => &self.planar,
            BufferKind::Bitstream => &self.bitstream,
        }
    }

    pub fn buffer_mut(&mut self, kind: BufferKind) -> &mut ScratchBuffer {
        match kind {
            BufferKind::Planar => &mut self.planar,
            BufferKind::Bitstream => &mut self.bitstream,
        }
    }

    pub fn capacity(&self, kind: BufferKind) -> usize {
        self.buffer(kind).capacity()
    }

    /// Both regions at once, for the encode path
    pub fn split_mut(&mut self) -> (&mut ScratchBuffer, &mut ScratchBuffer) {
        (&mut self.planar, &mut self.bitstream)
    }
}

/// Concatenates encoder output into a scratch buffer.
///
/// NAL units are written layer by layer, unit by unit, into a region sized to
/// the exact payload total. Nothing is touched until `assemble` is called.
pub struct BitstreamAssembler<'a> {
    buffer: &'a mut ScratchBuffer,
    written: usize,
}

impl<'a> BitstreamAssembler<'a> {
    pub fn new(buffer: &'a mut ScratchBuffer) -> Self {
        Self { buffer, written: 0 }
    }

    /// Write every unit of every layer contiguously. Returns the total size.
    pub fn assemble(&mut self, layers: &[Vec<&[u8]>]) -> Result<usize> {
        let total: usize = layers
            .iter()
            .flat_map(|layer| layer.iter())
            .map(|nal| nal.len())
            .sum();

        self.written = 0;
        if total == 0 {
            return Ok(0);
        }

        let dst = self.buffer.try_acquire(total)?;
        let mut pos = 0;
        for nal in layers.iter().flat_map(|layer| layer.iter()) {
            dst[pos..pos + nal.len()].copy_from_slice(nal);
            pos += nal.len();
        }

        self.written = total;
        Ok(total)
    }

    /// Bytes produced by the last `assemble`
    pub fn written(&self) -> usize {
        self.written
    }
}
