// Licensed under the Apache-2.0 license

//! HACE register map and the accessor seam.
//!
//! The cipher and hash engines have disjoint control registers. The status
//! register at `STS` is shared: both engines' busy and interrupt bits live
//! there, and interrupt bits are cleared by writing them back.

use bitflags::bitflags;
use core::ptr::{read_volatile, write_volatile};

/// HACE base address on AST2500/AST2600 parts.
pub const HACE_BASE: usize = 0x1e6d_0000;

// Cipher engine registers
pub const CRYPTO_SRC: u32 = 0x00;
pub const CRYPTO_DEST: u32 = 0x04;
pub const CRYPTO_CONTEXT: u32 = 0x08; // 8 byte aligned
pub const CRYPTO_DATA_LEN: u32 = 0x0c;
pub const CRYPTO_CMD: u32 = 0x10;

pub const STS: u32 = 0x1c;

// Hash engine registers
pub const HASH_SRC: u32 = 0x20;
pub const HASH_DIGEST: u32 = 0x24;
pub const HASH_KEY: u32 = 0x28;
pub const HASH_DATA_LEN: u32 = 0x2c;
pub const HASH_CMD: u32 = 0x30;

/// CRYPTO_CMD: raise `CRYPTO_ISR` on completion.
pub const CRYPTO_CMD_ISR_EN: u32 = 1 << 12;

/// HASH_CMD bits
pub const HASH_CMD_SHA_BE_EN: u32 = 1 << 3;
pub const HASH_CMD_ACC_MODE: u32 = 1 << 8;
pub const HASH_CMD_INT_EN: u32 = 1 << 9;

bitflags! {
    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    pub struct HaceStatus: u32 {
        const HASH_BUSY = 1 << 0;
        const CRYPTO_BUSY = 1 << 1;
        const RSA_BUSY = 1 << 2;
        /// Hash engine finished a command.
        const HASH_ISR = 1 << 9;
        /// Cipher engine finished a command.
        const CRYPTO_ISR = 1 << 12;
        /// RSA engine finished a command. Not serviced here.
        const RSA_ISR = 1 << 13;
    }
}

/// Access to the HACE register block.
///
/// Offsets are byte offsets from the block base.
pub trait HaceRegs {
    fn read(&self, offset: u32) -> u32;
    fn write(&self, offset: u32, value: u32);

    fn status(&self) -> HaceStatus {
        HaceStatus::from_bits_retain(self.read(STS))
    }
}

impl<T: HaceRegs + ?Sized> HaceRegs for &T {
    fn read(&self, offset: u32) -> u32 {
        (**self).read(offset)
    }

    fn write(&self, offset: u32, value: u32) {
        (**self).write(offset, value)
    }
}

/// Memory-mapped register block.
pub struct Mmio {
    base: usize,
}

impl Mmio {
    /// # Safety
    ///
    /// `base` must point at the HACE register block, and the caller must
    /// ensure only one `Mmio` for it is handed to a device.
    pub const unsafe fn new(base: usize) -> Self {
        Self { base }
    }

    pub const fn base(&self) -> usize {
        self.base
    }
}

impl HaceRegs for Mmio {
    fn read(&self, offset: u32) -> u32 {
        unsafe { read_volatile((self.base + offset as usize) as *const u32) }
    }

    fn write(&self, offset: u32, value: u32) {
        unsafe {
            write_volatile((self.base + offset as usize) as *mut u32, value)
        }
    }
}

/// Orders the CPU's writes to a DMA region before the command write that
/// starts the engine reading it.
#[inline(always)]
pub(crate) fn dma_barrier() {
    core::sync::atomic::fence(core::sync::atomic::Ordering::SeqCst);
    #[cfg(target_arch = "arm")]
    cortex_m::asm::dsb();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mmio_accesses_word_offsets() {
        let mut block = [0u32; 16];
        let regs = unsafe { Mmio::new(block.as_mut_ptr() as usize) };

        regs.write(HASH_CMD, 0x1234);
        regs.write(STS, (HaceStatus::HASH_ISR | HaceStatus::CRYPTO_BUSY).bits());
        assert_eq!(regs.read(HASH_CMD), 0x1234);
        assert_eq!(
            regs.status(),
            HaceStatus::HASH_ISR | HaceStatus::CRYPTO_BUSY
        );

        // Bits without a name survive the conversion.
        regs.write(STS, 1 << 20);
        assert_eq!(regs.status().bits(), 1 << 20);

        assert_eq!(block[(HASH_CMD / 4) as usize], 0x1234);
    }
}
