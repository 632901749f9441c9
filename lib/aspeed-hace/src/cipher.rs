// Licensed under the Apache-2.0 license

//! Symmetric cipher engine.
//!
//! The cipher region starts with the 64-byte context the engine loads the
//! key and IV from, followed by the data area. On AST2600 parts the result
//! goes to a separate destination region; older parts encrypt in place.

use crate::completion::{CompletionSink, RequestId};
use crate::dma::DmaRegion;
use crate::engine::{EngineKind, EngineOps, Prepared, Request, Step};
use crate::regs::{self, HaceRegs, HaceStatus};
use crate::HaceError;

/// Bytes of key + IV context at the head of the cipher region.
pub const CONTEXT_LEN: usize = 64;

/// Smallest data area a region may leave after its header.
pub const MIN_DATA_AREA: usize = 512;

static_assertions::const_assert_eq!(CONTEXT_LEN % crate::dma::DMA_ALIGN, 0);

pub struct CipherRequest<'a> {
    id: RequestId,
    cmd: u32,
    context: &'a [u8],
    src: &'a [u8],
    dst: &'a mut [u8],
    sink: &'a dyn CompletionSink<CipherRequest<'a>>,
}

impl<'a> CipherRequest<'a> {
    /// `cmd` is the `CRYPTO_CMD` word (algorithm, mode, key size,
    /// direction) chosen by the algorithm glue; the interrupt enable is
    /// added here. `context` is the key and IV as the engine expects them.
    pub fn new(
        id: RequestId,
        cmd: u32,
        context: &'a [u8],
        src: &'a [u8],
        dst: &'a mut [u8],
        sink: &'a dyn CompletionSink<CipherRequest<'a>>,
    ) -> Self {
        Self {
            id,
            cmd,
            context,
            src,
            dst,
            sink,
        }
    }

    pub fn src(&self) -> &[u8] {
        self.src
    }

    /// The output buffer. Holds the result once the request completed
    /// with `Ok(n)`, in its first `n` bytes.
    pub fn dst(&self) -> &[u8] {
        self.dst
    }

    /// Gives back the output buffer, e.g. after a rejection.
    pub fn into_dst(self) -> &'a mut [u8] {
        self.dst
    }
}

impl<'a> Request<'a> for CipherRequest<'a> {
    fn id(&self) -> RequestId {
        self.id
    }

    fn sink(&self) -> &'a dyn CompletionSink<Self> {
        self.sink
    }
}

pub struct CipherDma<'a> {
    io: DmaRegion<'a>,
    dst: Option<DmaRegion<'a>>,
}

impl<'a> CipherDma<'a> {
    /// `dst` is `Some` on parts that write results to a separate region.
    pub fn new(io: DmaRegion<'a>, dst: Option<DmaRegion<'a>>) -> Self {
        Self { io, dst }
    }

    /// Largest request the regions can carry.
    pub fn capacity(&self) -> usize {
        let data = self.io.len().saturating_sub(CONTEXT_LEN);
        match &self.dst {
            Some(dst) => data.min(dst.len()),
            None => data,
        }
    }
}

pub struct CipherOps {
    capacity: usize,
}

impl CipherOps {
    pub fn new(dma: &CipherDma<'_>) -> Result<Self, HaceError> {
        let capacity = dma.capacity();
        if capacity < MIN_DATA_AREA {
            return Err(HaceError::InvalidConfig);
        }
        Ok(Self { capacity })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<'a> EngineOps<'a> for CipherOps {
    type Request = CipherRequest<'a>;
    type Dma = CipherDma<'a>;

    const KIND: EngineKind = EngineKind::Cipher;
    const BUSY: HaceStatus = HaceStatus::CRYPTO_BUSY;

    fn prepare(&self, req: &mut CipherRequest<'a>) -> Result<Prepared, HaceError> {
        let len = req.src.len();
        if len == 0
            || len > self.capacity
            || req.dst.len() < len
            || req.context.len() > CONTEXT_LEN
        {
            return Err(HaceError::InvalidLength);
        }
        Ok(Prepared::NeedsHardware)
    }

    fn dispatch<R: HaceRegs + ?Sized>(
        &self,
        regs: &R,
        dma: &mut CipherDma<'a>,
        req: &mut CipherRequest<'a>,
    ) {
        let len = req.src.len();
        let buf = dma.io.as_mut_slice();
        let (ctx, data) = buf.split_at_mut(CONTEXT_LEN);
        ctx.fill(0);
        ctx[..req.context.len()].copy_from_slice(req.context);
        data[..len].copy_from_slice(req.src);

        let src = dma.io.dev_addr_at(CONTEXT_LEN);
        let dst = dma.dst.as_ref().map_or(src, |d| d.dev_addr());

        regs.write(regs::CRYPTO_SRC, src);
        regs.write(regs::CRYPTO_DEST, dst);
        regs.write(regs::CRYPTO_CONTEXT, dma.io.dev_addr());
        regs.write(regs::CRYPTO_DATA_LEN, len as u32);
        regs::dma_barrier();
        regs.write(regs::CRYPTO_CMD, req.cmd | regs::CRYPTO_CMD_ISR_EN);
    }

    fn advance<R: HaceRegs + ?Sized>(
        &self,
        _regs: &R,
        dma: &mut CipherDma<'a>,
        req: &mut CipherRequest<'a>,
    ) -> Step {
        regs::dma_barrier();
        // Key material does not outlive the request.
        dma.io.as_mut_slice()[..CONTEXT_LEN].fill(0);

        let len = req.src.len();
        let out = match &dma.dst {
            Some(dst) => &dst.as_slice()[..len],
            None => &dma.io.as_slice()[CONTEXT_LEN..CONTEXT_LEN + len],
        };
        req.dst[..len].copy_from_slice(out);
        Step::Done(Ok(len))
    }
}
