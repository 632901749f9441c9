// Licensed under the Apache-2.0 license

//! Simulated HACE register block for host tests.
//!
//! Writes latch into a register file and are logged in order. `STS` is
//! write-one-to-clear, as on the real part. Tests play the engine by
//! raising status bits and running the interrupt path; the DMA memory is
//! never touched, so an in-place cipher returns its input and a hash
//! returns whatever digest it was loaded with.

#![allow(dead_code)]

use lib_aspeed_hace::regs::STS;
use lib_aspeed_hace::{HaceDevice, HaceRegs, HaceStatus, IrqStatus};
use std::sync::Mutex;

/// Device address of the test DMA window.
pub const DEV_BASE: u32 = 0x8000_0000;

/// Big enough for the three default regions of an AST2600.
pub const WINDOW_LEN: usize = 0x20000;

pub fn window() -> Vec<u8> {
    vec![0; WINDOW_LEN]
}

#[derive(Debug, Default)]
pub struct SimRegs {
    file: Mutex<[u32; 16]>,
    writes: Mutex<Vec<(u32, u32)>>,
}

impl SimRegs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, offset: u32) -> u32 {
        self.file.lock().unwrap()[(offset / 4) as usize]
    }

    pub fn raise(&self, bits: HaceStatus) {
        self.file.lock().unwrap()[(STS / 4) as usize] |= bits.bits();
    }

    pub fn lower(&self, bits: HaceStatus) {
        self.file.lock().unwrap()[(STS / 4) as usize] &= !bits.bits();
    }

    pub fn writes(&self) -> Vec<(u32, u32)> {
        self.writes.lock().unwrap().clone()
    }

    /// Every value written to `offset`, oldest first.
    pub fn writes_to(&self, offset: u32) -> Vec<u32> {
        self.writes
            .lock()
            .unwrap()
            .iter()
            .filter(|(o, _)| *o == offset)
            .map(|&(_, v)| v)
            .collect()
    }
}

impl HaceRegs for SimRegs {
    fn read(&self, offset: u32) -> u32 {
        self.get(offset)
    }

    fn write(&self, offset: u32, value: u32) {
        self.writes.lock().unwrap().push((offset, value));
        let mut file = self.file.lock().unwrap();
        let reg = &mut file[(offset / 4) as usize];
        if offset == STS {
            *reg &= !value;
        } else {
            *reg = value;
        }
    }
}

/// Raises `bits`, takes the interrupt and runs the deferred work.
/// Returns how many resumes ran.
pub fn interrupt<R: HaceRegs>(
    regs: &SimRegs,
    hace: &HaceDevice<'_, R>,
    bits: HaceStatus,
) -> usize {
    regs.raise(bits);
    assert_eq!(hace.handle_irq(), IrqStatus::Handled);
    hace.run_deferred()
}
