// Licensed under the Apache-2.0 license

//! Top half of the shared HACE interrupt.
//!
//! Reads the status register once, writes back the completion bits it
//! recognizes, and schedules the matching engines' completion tasks. It
//! never touches request state, never takes an engine lock, and never
//! allocates.

use log::trace;

use crate::deferred::CompletionTask;
use crate::regs::{HaceRegs, HaceStatus, STS};

/// Whether this handler claimed the interrupt.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum IrqStatus {
    /// No bit we service was set; the line may belong to someone else.
    NotHandled,
    Handled,
}

pub fn top_half<R: HaceRegs + ?Sized>(
    regs: &R,
    cipher: &CompletionTask,
    hash: &CompletionTask,
) -> IrqStatus {
    let sts = regs.status();
    let ours = sts & (HaceStatus::CRYPTO_ISR | HaceStatus::HASH_ISR);
    if ours.is_empty() {
        trace!("HACE irq not ours, status {:#x}", sts.bits());
        return IrqStatus::NotHandled;
    }

    regs.write(STS, ours.bits());

    if ours.contains(HaceStatus::CRYPTO_ISR) {
        cipher.schedule();
    }
    if ours.contains(HaceStatus::HASH_ISR) {
        hash.schedule();
    }
    IrqStatus::Handled
}
