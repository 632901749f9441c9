// Licensed under the Apache-2.0 license

//! DMA staging memory.
//!
//! The HACE masters the bus itself, so every byte it reads or writes has to
//! live in memory the CPU does not cache (on the AST1060 this is the
//! `.ram_nc` section). A [`DmaPool`] hands out fixed regions from one such
//! window at bring-up; each engine then owns its regions for the life of
//! the device and lends them to whichever request is in flight.

use crate::HaceError;

/// Required alignment of every region handed to the engine.
pub const DMA_ALIGN: usize = 8;

/// A fixed, contiguous piece of DMA memory with the address the engine
/// uses to reach it.
pub struct DmaRegion<'a> {
    buf: &'a mut [u8],
    dev_addr: u32,
}

impl<'a> DmaRegion<'a> {
    /// Wraps memory the caller already reserved for DMA.
    ///
    /// Fails with `DmaExhausted` when the region is empty, its device
    /// address is not 8-byte aligned, or it would run past the end of the
    /// 32-bit device address space.
    pub fn new(buf: &'a mut [u8], dev_addr: u32) -> Result<Self, HaceError> {
        if buf.is_empty() || dev_addr as usize % DMA_ALIGN != 0 {
            return Err(HaceError::DmaExhausted);
        }
        u32::try_from(buf.len())
            .ok()
            .and_then(|len| dev_addr.checked_add(len))
            .ok_or(HaceError::DmaExhausted)?;
        Ok(Self { buf, dev_addr })
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn dev_addr(&self) -> u32 {
        self.dev_addr
    }

    /// Device address of the byte at `offset`, which must lie inside the
    /// region.
    pub fn dev_addr_at(&self, offset: usize) -> u32 {
        debug_assert!(offset <= self.buf.len());
        self.dev_addr.wrapping_add(offset as u32)
    }

    pub fn as_slice(&self) -> &[u8] {
        self.buf
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        self.buf
    }
}

/// Bump allocator over a DMA-capable memory window.
///
/// Regions are never returned; the pool only serves device bring-up.
pub struct DmaPool<'a> {
    free: &'a mut [u8],
    dev_next: u32,
}

impl<'a> DmaPool<'a> {
    /// `dev_base` is the address the engine sees for `mem[0]`.
    pub fn new(mem: &'a mut [u8], dev_base: u32) -> Self {
        Self {
            free: mem,
            dev_next: dev_base,
        }
    }

    /// Bytes still available, ignoring alignment padding.
    pub fn remaining(&self) -> usize {
        self.free.len()
    }

    pub fn alloc(&mut self, len: usize) -> Result<DmaRegion<'a>, HaceError> {
        let pad = (DMA_ALIGN - self.dev_next as usize % DMA_ALIGN) % DMA_ALIGN;
        let needed = pad.checked_add(len).ok_or(HaceError::DmaExhausted)?;
        if len == 0 || needed > self.free.len() {
            return Err(HaceError::DmaExhausted);
        }
        let dev_addr = u32::try_from(pad)
            .ok()
            .and_then(|pad| self.dev_next.checked_add(pad))
            .ok_or(HaceError::DmaExhausted)?;
        let dev_next = u32::try_from(len)
            .ok()
            .and_then(|len| dev_addr.checked_add(len))
            .ok_or(HaceError::DmaExhausted)?;

        let free = core::mem::take(&mut self.free);
        let (region, rest) = free[pad..].split_at_mut(len);
        self.free = rest;
        self.dev_next = dev_next;

        Ok(DmaRegion {
            buf: region,
            dev_addr,
        })
    }
}
