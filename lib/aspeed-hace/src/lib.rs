// Licensed under the Apache-2.0 license

#![cfg_attr(not(test), no_std)]

//! ASPEED Hash and Crypto Engine (HACE) dispatch core
//!
//! The HACE has two independent engines, cipher and hash, sharing one
//! register block and one interrupt line. This crate schedules requests
//! onto them:
//!
//! - [`Engine::submit`] programs the hardware right away when the engine
//!   is idle, queues the request (up to [`QUEUE_DEPTH`]) when it is busy,
//!   and rejects it with [`HaceError::EngineBusyOverflow`] beyond that.
//! - [`HaceDevice::handle_irq`] is the interrupt top half. It only
//!   acknowledges the completion bits and schedules the engines'
//!   [`CompletionTask`]s.
//! - [`HaceDevice::run_deferred`] is the bottom half. It calls
//!   [`Engine::resume`], which finishes the request in flight (or advances
//!   a chained hash to its next step) and dispatches the next queued one.
//!   A completion that still shows the engine busy leaves the request in
//!   flight.
//!
//! Results are delivered through each request's [`CompletionSink`].
//!
//! ## Usage
//!
//! ```no_run
//! use lib_aspeed_hace::*;
//!
//! // Must be placed in non-cacheable memory by the linker script.
//! static mut DMA_MEM: [u8; 0x14000] = [0; 0x14000];
//!
//! let slot: CompletionSlot<HashRequest<'_>> = CompletionSlot::new();
//! let mut state = HashState::new(HashAlgo::Sha256);
//! let mut digest = [0u8; 32];
//!
//! let regs = unsafe { Mmio::new(HACE_BASE) };
//! let mem = unsafe { &mut *core::ptr::addr_of_mut!(DMA_MEM) };
//! let base = mem.as_ptr() as u32;
//! let mut pool = DmaPool::new(mem, base);
//! let config = HaceConfig::new(HaceVersion::Ast2500);
//! let hace = HaceDevice::new(regs, config, &mut pool).unwrap();
//!
//! let req = HashRequest::new(RequestId(1), HashOp::Oneshot, b"abc", &mut state, &slot)
//!     .with_output(&mut digest);
//! hace.submit_hash(req).unwrap();
//!
//! // From the interrupt:   hace.handle_irq();
//! // From the driver task: hace.run_deferred();
//! let done = slot.wait(|| {
//!     hace.run_deferred();
//! });
//! assert_eq!(done.outcome, Ok(32));
//! let sha256 = &done.request.output().unwrap()[..32];
//! # let _ = sha256;
//! ```

mod cipher;
mod completion;
mod config;
mod deferred;
mod device;
mod dma;
mod engine;
mod error;
mod hash;
mod irq;
pub mod regs;

pub use cipher::{CipherDma, CipherOps, CipherRequest, CONTEXT_LEN};
pub use completion::{Completed, CompletionSink, CompletionSlot, Outcome, RequestId};
pub use config::{HaceConfig, HaceVersion, DEFAULT_DMA_LEN};
pub use deferred::CompletionTask;
pub use device::{Engines, HaceDevice, HaceRequest};
pub use dma::{DmaPool, DmaRegion, DMA_ALIGN};
pub use engine::{
    Accepted, Engine, EngineKind, EngineOps, Prepared, Request, Resumed, Step, BUSY_POLLS,
    QUEUE_DEPTH,
};
pub use error::{HaceError, Rejected};
pub use hash::{HashAlgo, HashOp, HashOps, HashRequest, HashState, DIGEST_LEN};
pub use irq::{top_half, IrqStatus};
pub use regs::{HaceRegs, HaceStatus, Mmio, HACE_BASE};
