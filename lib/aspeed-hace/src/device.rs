// Licensed under the Apache-2.0 license

use bitflags::bitflags;
use log::{error, info, warn};

use crate::cipher::{CipherDma, CipherOps, CipherRequest};
use crate::config::HaceConfig;
use crate::dma::DmaPool;
use crate::engine::{Accepted, Engine};
use crate::hash::{HashOps, HashRequest};
use crate::irq::{self, IrqStatus};
use crate::regs::HaceRegs;
use crate::{HaceError, Rejected};

bitflags! {
    /// A set of engines.
    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    pub struct Engines: u8 {
        const CIPHER = 1 << 0;
        const HASH = 1 << 1;
    }
}

/// A request together with the engine it is meant for.
pub enum HaceRequest<'a> {
    Cipher(CipherRequest<'a>),
    Hash(HashRequest<'a>),
}

/// One HACE block: a cipher engine and a hash engine behind one register
/// block and one interrupt line.
pub struct HaceDevice<'a, R: HaceRegs> {
    regs: R,
    config: HaceConfig,
    cipher: Engine<'a, CipherOps>,
    hash: Engine<'a, HashOps>,
}

impl<'a, R: HaceRegs> HaceDevice<'a, R> {
    /// Carves the engines' DMA regions out of `pool` and builds both
    /// engines idle.
    ///
    /// Fails, constructing nothing, if the pool cannot hold the regions or
    /// a region is too small to be useful.
    pub fn new<'p: 'a>(
        regs: R,
        config: HaceConfig,
        pool: &mut DmaPool<'p>,
    ) -> Result<Self, HaceError> {
        let result = Self::bring_up(regs, config, pool);
        match &result {
            Ok(_) => info!(
                "HACE gen {} up: {} bytes DMA",
                config.version.generation(),
                config.dma_footprint()
            ),
            Err(e) => error!("HACE bring-up failed: {}", e),
        }
        result
    }

    fn bring_up<'p: 'a>(
        regs: R,
        config: HaceConfig,
        pool: &mut DmaPool<'p>,
    ) -> Result<Self, HaceError> {
        let io = pool.alloc(config.cipher_dma_len)?;
        let hash_dma = pool.alloc(config.hash_dma_len)?;
        let dst = if config.version.has_dst_region() {
            Some(pool.alloc(config.dst_dma_len)?)
        } else {
            None
        };

        let cipher_dma = CipherDma::new(io, dst);
        let cipher_ops = CipherOps::new(&cipher_dma)?;
        let hash_ops = HashOps::new(&hash_dma)?;

        Ok(Self {
            regs,
            config,
            cipher: Engine::new(cipher_ops, cipher_dma),
            hash: Engine::new(hash_ops, hash_dma),
        })
    }

    pub fn config(&self) -> &HaceConfig {
        &self.config
    }

    pub fn regs(&self) -> &R {
        &self.regs
    }

    pub fn cipher(&self) -> &Engine<'a, CipherOps> {
        &self.cipher
    }

    pub fn hash(&self) -> &Engine<'a, HashOps> {
        &self.hash
    }

    /// Routes `req` to its engine. See [`Engine::submit`].
    pub fn submit(
        &self,
        req: HaceRequest<'a>,
    ) -> Result<Accepted, Rejected<HaceRequest<'a>>> {
        match req {
            HaceRequest::Cipher(r) => {
                self.submit_cipher(r).map_err(|rej| Rejected {
                    error: rej.error,
                    request: HaceRequest::Cipher(rej.request),
                })
            }
            HaceRequest::Hash(r) => {
                self.submit_hash(r).map_err(|rej| Rejected {
                    error: rej.error,
                    request: HaceRequest::Hash(rej.request),
                })
            }
        }
    }

    pub fn submit_cipher(
        &self,
        req: CipherRequest<'a>,
    ) -> Result<Accepted, Rejected<CipherRequest<'a>>> {
        self.cipher.submit(&self.regs, req)
    }

    pub fn submit_hash(
        &self,
        req: HashRequest<'a>,
    ) -> Result<Accepted, Rejected<HashRequest<'a>>> {
        self.hash.submit(&self.regs, req)
    }

    /// Interrupt entry point. Safe to call from interrupt context.
    pub fn handle_irq(&self) -> IrqStatus {
        irq::top_half(&self.regs, self.cipher.task(), self.hash.task())
    }

    /// Engines whose completion work the top half has scheduled.
    pub fn pending(&self) -> Engines {
        let mut set = Engines::empty();
        set.set(Engines::CIPHER, self.cipher.task().is_pending());
        set.set(Engines::HASH, self.hash.task().is_pending());
        set
    }

    /// Runs all scheduled completion work. Must be called from a context
    /// that may block, never from the interrupt handler.
    ///
    /// Returns the number of completions processed.
    pub fn run_deferred(&self) -> usize {
        self.cipher.run_deferred(&self.regs) + self.hash.run_deferred(&self.regs)
    }

    /// Tears the device down, giving back the register block.
    ///
    /// Refused while either engine has a request in flight or queued; the
    /// device is handed back unchanged.
    pub fn detach(self) -> Result<R, Self> {
        if !(self.cipher.is_idle() && self.hash.is_idle()) {
            warn!("HACE detach refused: {}", HaceError::Busy);
            return Err(self);
        }
        info!("HACE detached");
        Ok(self.regs)
    }
}
