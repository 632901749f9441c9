// Licensed under the Apache-2.0 license

//! Hash engine.
//!
//! The engine runs in accumulative mode: it hashes whole blocks from the
//! data area into the intermediate digest held at the head of the hash
//! region, and software supplies the message padding on the final step.
//! A request whose input is larger than the data area is split into
//! several chained hardware steps that all run in the same engine slot.
//!
//! The intermediate digest travels with the caller's [`HashState`]: it is
//! loaded into the region when a request is dispatched and saved back when
//! the request completes, so unrelated sessions can share the queue.

use crate::completion::{CompletionSink, RequestId};
use crate::dma::DmaRegion;
use crate::engine::{EngineKind, EngineOps, Prepared, Request, Step};
use crate::regs::{self, HaceRegs, HaceStatus};
use crate::HaceError;

/// Bytes reserved for the intermediate digest at the head of the region.
pub const DIGEST_LEN: usize = 64;

/// Largest block size of any supported algorithm.
pub const MAX_BLOCK: usize = 128;

/// Smallest data area a region may leave after its header.
pub const MIN_DATA_AREA: usize = 512;

static_assertions::const_assert!(MIN_DATA_AREA >= MAX_BLOCK + MAX_BLOCK + 16);

const SHA1_IV: [u32; 5] = [
    0x0123_4567,
    0x89ab_cdef,
    0xfedc_ba98,
    0x7654_3210,
    0xf0e1_d2c3,
];

const SHA224_IV: [u32; 8] = [
    0xd89e_05c1,
    0x07d5_7c36,
    0x17dd_7030,
    0x3959_0ef7,
    0x310b_c0ff,
    0x1115_5868,
    0xa78f_f964,
    0xa44f_fabe,
];

const SHA256_IV: [u32; 8] = [
    0x67e6_096a,
    0x85ae_67bb,
    0x72f3_6e3c,
    0x3af5_4fa5,
    0x7f52_0e51,
    0x8c68_059b,
    0xabd9_831f,
    0x19cd_e05b,
];

const SHA384_IV: [u32; 16] = [
    0x5d9d_bbcb,
    0xd89e_05c1,
    0x2a29_9a62,
    0x07d5_7c36,
    0x5a01_5991,
    0x17dd_7030,
    0xd8ec_2f15,
    0x3959_0ef7,
    0x6726_3367,
    0x310b_c0ff,
    0x874a_b48e,
    0x1115_5868,
    0x0d2e_0cdb,
    0xa78f_f964,
    0x1d48_b547,
    0xa44f_fabe,
];

const SHA512_IV: [u32; 16] = [
    0x67e6_096a,
    0x08c9_bcf3,
    0x85ae_67bb,
    0x3ba7_ca84,
    0x72f3_6e3c,
    0x2bf8_94fe,
    0x3af5_4fa5,
    0xf136_1d5f,
    0x7f52_0e51,
    0xd182_e6ad,
    0x8c68_059b,
    0x1f6c_3e2b,
    0xabd9_831f,
    0x6bbd_41fb,
    0x19cd_e05b,
    0x7921_7e13,
];

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum HashAlgo {
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgo {
    pub const fn digest_size(self) -> usize {
        match self {
            HashAlgo::Sha1 => 20,
            HashAlgo::Sha224 => 28,
            HashAlgo::Sha256 => 32,
            HashAlgo::Sha384 => 48,
            HashAlgo::Sha512 => 64,
        }
    }

    pub const fn block_size(self) -> usize {
        match self {
            HashAlgo::Sha1 | HashAlgo::Sha224 | HashAlgo::Sha256 => 64,
            HashAlgo::Sha384 | HashAlgo::Sha512 => 128,
        }
    }

    /// Bytes of big-endian bit count closing the padding.
    const fn length_field(self) -> usize {
        self.block_size() / 8
    }

    const fn iv(self) -> &'static [u32] {
        match self {
            HashAlgo::Sha1 => &SHA1_IV,
            HashAlgo::Sha224 => &SHA224_IV,
            HashAlgo::Sha256 => &SHA256_IV,
            HashAlgo::Sha384 => &SHA384_IV,
            HashAlgo::Sha512 => &SHA512_IV,
        }
    }

    const fn cmd(self) -> u32 {
        let algo = match self {
            HashAlgo::Sha1 => 1 << 5,
            HashAlgo::Sha224 => 1 << 6,
            HashAlgo::Sha256 => (1 << 4) | (1 << 6),
            HashAlgo::Sha384 => (1 << 5) | (1 << 6) | (1 << 10),
            HashAlgo::Sha512 => (1 << 5) | (1 << 6),
        };
        algo | regs::HASH_CMD_ACC_MODE
            | regs::HASH_CMD_SHA_BE_EN
            | regs::HASH_CMD_INT_EN
    }

    /// Padding bytes that close a message of `total` bytes.
    fn padding_len(self, total: u64) -> usize {
        let block = self.block_size();
        let pos = (total % block as u64) as usize;
        if pos + 1 + self.length_field() <= block {
            block - pos
        } else {
            2 * block - pos
        }
    }

    fn write_padding(self, buf: &mut [u8], total: u64) {
        let lf = self.length_field();
        let bits = (total as u128 * 8).to_be_bytes();
        buf.fill(0);
        buf[0] = 0x80;
        let at = buf.len() - lf;
        buf[at..].copy_from_slice(&bits[bits.len() - lf..]);
    }
}

/// Which part of a streamed digest a request carries.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum HashOp {
    /// Starts a new digest (resets the state).
    First,
    Continue,
    /// Ends the digest and produces the output.
    Final,
    /// First and final at once.
    Oneshot,
}

impl HashOp {
    fn starts(self) -> bool {
        matches!(self, HashOp::First | HashOp::Oneshot)
    }

    fn ends(self) -> bool {
        matches!(self, HashOp::Final | HashOp::Oneshot)
    }
}

/// Caller-owned state of one streamed digest.
pub struct HashState {
    algo: HashAlgo,
    digest: [u8; DIGEST_LEN],
    buffer: [u8; MAX_BLOCK],
    buffered: usize,
    total: u64,
    active: bool,
}

impl HashState {
    pub const fn new(algo: HashAlgo) -> Self {
        Self {
            algo,
            digest: [0; DIGEST_LEN],
            buffer: [0; MAX_BLOCK],
            buffered: 0,
            total: 0,
            active: false,
        }
    }

    pub fn algo(&self) -> HashAlgo {
        self.algo
    }

    /// True between a started request and the final one.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Message bytes taken in so far.
    pub fn total_len(&self) -> u64 {
        self.total
    }

    /// Bytes held back until a whole block is available.
    pub fn buffered(&self) -> usize {
        self.buffered
    }

    fn reset(&mut self) {
        for (chunk, word) in self.digest.chunks_exact_mut(4).zip(
            self.algo.iv().iter().chain(core::iter::repeat(&0)),
        ) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        self.buffer.fill(0);
        self.buffered = 0;
        self.total = 0;
        self.active = true;
    }

    fn absorb(&mut self, data: &[u8]) {
        self.buffer[self.buffered..self.buffered + data.len()].copy_from_slice(data);
        self.buffered += data.len();
        self.total += data.len() as u64;
    }
}

pub struct HashRequest<'a> {
    id: RequestId,
    op: HashOp,
    data: &'a [u8],
    consumed: usize,
    state: &'a mut HashState,
    out: Option<&'a mut [u8]>,
    sink: &'a dyn CompletionSink<HashRequest<'a>>,
    last_step: bool,
}

impl<'a> HashRequest<'a> {
    pub fn new(
        id: RequestId,
        op: HashOp,
        data: &'a [u8],
        state: &'a mut HashState,
        sink: &'a dyn CompletionSink<HashRequest<'a>>,
    ) -> Self {
        Self {
            id,
            op,
            data,
            consumed: 0,
            state,
            out: None,
            sink,
            last_step: false,
        }
    }

    /// Where the digest goes. Required for `Final` and `Oneshot`.
    pub fn with_output(mut self, out: &'a mut [u8]) -> Self {
        self.out = Some(out);
        self
    }

    pub fn op(&self) -> HashOp {
        self.op
    }

    pub fn state(&self) -> &HashState {
        self.state
    }

    /// The digest, once a `Final` or `Oneshot` request completed.
    pub fn output(&self) -> Option<&[u8]> {
        self.out.as_deref()
    }

    /// Gives back the session state so the next request can borrow it.
    pub fn into_state(self) -> &'a mut HashState {
        self.state
    }
}

impl<'a> Request<'a> for HashRequest<'a> {
    fn id(&self) -> RequestId {
        self.id
    }

    fn sink(&self) -> &'a dyn CompletionSink<Self> {
        self.sink
    }
}

pub struct HashOps {
    capacity: usize,
}

impl HashOps {
    pub fn new(dma: &DmaRegion<'_>) -> Result<Self, HaceError> {
        let capacity = dma.len().saturating_sub(DIGEST_LEN) / MAX_BLOCK * MAX_BLOCK;
        if capacity < MIN_DATA_AREA {
            return Err(HaceError::InvalidConfig);
        }
        Ok(Self { capacity })
    }

    /// Bytes hashed per hardware step at most.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Fills the data area with the next step of `req`. Returns how many
    /// bytes the hardware should hash and records whether this is the
    /// request's last step.
    fn stage(&self, req: &mut HashRequest<'_>, area: &mut [u8]) -> usize {
        let state = &mut *req.state;
        let algo = state.algo;
        let block = algo.block_size();
        let area = &mut area[..self.capacity];

        let mut n = state.buffered;
        area[..n].copy_from_slice(&state.buffer[..n]);
        state.buffered = 0;

        let rest = &req.data[req.consumed..];
        let take = rest.len().min(self.capacity - n);
        area[n..n + take].copy_from_slice(&rest[..take]);
        n += take;
        req.consumed += take;
        state.total += take as u64;
        let left = req.data.len() - req.consumed;

        if req.op.ends() && left == 0 {
            let pad = algo.padding_len(state.total);
            if n + pad <= self.capacity {
                algo.write_padding(&mut area[n..n + pad], state.total);
                req.last_step = true;
                return n + pad;
            }
        }

        // Only whole blocks go to the hardware before the final step.
        let whole = n - n % block;
        let tail = n - whole;
        state.buffer[..tail].copy_from_slice(&area[whole..n]);
        state.buffered = tail;

        req.last_step = !req.op.ends() && left < block;
        if req.last_step && left > 0 {
            state.absorb(&req.data[req.consumed..]);
            req.consumed = req.data.len();
        }
        whole
    }

    fn program<R: HaceRegs + ?Sized>(
        &self,
        regs: &R,
        dma: &DmaRegion<'_>,
        algo: HashAlgo,
        len: usize,
    ) {
        regs.write(regs::HASH_SRC, dma.dev_addr_at(DIGEST_LEN));
        regs.write(regs::HASH_DIGEST, dma.dev_addr());
        regs.write(regs::HASH_KEY, dma.dev_addr());
        regs.write(regs::HASH_DATA_LEN, len as u32);
        regs::dma_barrier();
        regs.write(regs::HASH_CMD, algo.cmd());
    }

    fn step<R: HaceRegs + ?Sized>(
        &self,
        regs: &R,
        dma: &mut DmaRegion<'_>,
        req: &mut HashRequest<'_>,
    ) {
        let len = self.stage(req, &mut dma.as_mut_slice()[DIGEST_LEN..]);
        self.program(regs, dma, req.state.algo, len);
    }
}

impl<'a> EngineOps<'a> for HashOps {
    type Request = HashRequest<'a>;
    type Dma = DmaRegion<'a>;

    const KIND: EngineKind = EngineKind::Hash;
    const BUSY: HaceStatus = HaceStatus::HASH_BUSY;

    fn prepare(&self, req: &mut HashRequest<'a>) -> Result<Prepared, HaceError> {
        let algo = req.state.algo;
        if req.op.ends()
            && req.out.as_ref().map_or(true, |o| o.len() < algo.digest_size())
        {
            return Err(HaceError::InvalidLength);
        }
        if !req.op.starts() && !req.state.active {
            return Err(HaceError::InvalidState);
        }

        let buffered = if req.op.starts() { 0 } else { req.state.buffered };
        if !req.op.ends() && buffered + req.data.len() < algo.block_size() {
            if req.op.starts() {
                req.state.reset();
            }
            req.state.absorb(req.data);
            req.consumed = req.data.len();
            return Ok(Prepared::Absorbed(0));
        }
        Ok(Prepared::NeedsHardware)
    }

    fn dispatch<R: HaceRegs + ?Sized>(
        &self,
        regs: &R,
        dma: &mut DmaRegion<'a>,
        req: &mut HashRequest<'a>,
    ) {
        // Rejected requests leave the session untouched; only the engine
        // starts a new digest.
        if req.op.starts() {
            req.state.reset();
        }
        dma.as_mut_slice()[..DIGEST_LEN].copy_from_slice(&req.state.digest);
        self.step(regs, dma, req);
    }

    fn advance<R: HaceRegs + ?Sized>(
        &self,
        regs: &R,
        dma: &mut DmaRegion<'a>,
        req: &mut HashRequest<'a>,
    ) -> Step {
        regs::dma_barrier();
        if !req.last_step {
            self.step(regs, dma, req);
            return Step::Chained;
        }

        req.state.digest.copy_from_slice(&dma.as_slice()[..DIGEST_LEN]);
        if !req.op.ends() {
            return Step::Done(Ok(0));
        }

        req.state.active = false;
        let n = req.state.algo.digest_size();
        match req.out.as_deref_mut() {
            Some(out) => {
                out[..n].copy_from_slice(&req.state.digest[..n]);
                Step::Done(Ok(n))
            }
            None => Step::Done(Err(HaceError::InvalidLength)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn padding_closes_on_block_boundary() {
        for algo in [HashAlgo::Sha256, HashAlgo::Sha512] {
            let block = algo.block_size() as u64;
            for total in [0u64, 1, 55, 56, 63, 64, 111, 112, 127, 200] {
                let pad = algo.padding_len(total) as u64;
                assert_eq!((total + pad) % block, 0, "{algo:?} {total}");
                assert!(pad as usize >= 1 + algo.length_field());
            }
        }
    }

    #[test]
    fn padding_carries_bit_length() {
        let mut buf = [0xffu8; 64];
        HashAlgo::Sha256.write_padding(&mut buf[..61], 3);
        assert_eq!(buf[0], 0x80);
        assert!(buf[1..53].iter().all(|&b| b == 0));
        assert_eq!(&buf[53..61], &24u64.to_be_bytes());
        assert_eq!(buf[61], 0xff);
    }

    #[test]
    fn reset_loads_iv_words() {
        let mut state = HashState::new(HashAlgo::Sha256);
        state.reset();
        assert!(state.is_active());
        // SHA-256 H0 = 0x6a09e667, stored big-endian.
        assert_eq!(&state.digest[..4], &[0x6a, 0x09, 0xe6, 0x67]);
        assert!(state.digest[32..].iter().all(|&b| b == 0));
    }
}
