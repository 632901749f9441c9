// Licensed under the Apache-2.0 license

mod common;

use common::{window, SimRegs, DEV_BASE};
use lib_aspeed_hace::regs::CRYPTO_CMD;
use lib_aspeed_hace::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

const ROUNDS: u32 = 200;
static KEY: [u8; 32] = [0x77; 32];
static SRC: [u8; 48] = [0x19; 48];
static BLOCK: [u8; 64] = [0x33; 64];

#[test]
fn engines_progress_independently() {
    let regs = SimRegs::new();
    let cipher_slot: CompletionSlot<CipherRequest<'_>> = CompletionSlot::new();
    let hash_slot: CompletionSlot<HashRequest<'_>> = CompletionSlot::new();
    let mut out = [0u8; 48];
    let mut state = HashState::new(HashAlgo::Sha512);
    let mut mem = window();
    let mut pool = DmaPool::new(&mut mem, DEV_BASE);
    let hace = HaceDevice::new(&regs, HaceConfig::new(HaceVersion::Ast2600), &mut pool).unwrap();

    let (hace, regs) = (&hace, &regs);
    let (cipher_slot, hash_slot) = (&cipher_slot, &hash_slot);
    let (out, state) = (&mut out, &mut state);

    thread::scope(|s| {
        s.spawn(move || {
            let mut out: &mut [u8] = out;
            for i in 0..ROUNDS {
                let req = CipherRequest::new(RequestId(i), 0, &KEY, &SRC, out, cipher_slot);
                assert_eq!(hace.submit_cipher(req).unwrap(), Accepted::Dispatched);
                regs.raise(HaceStatus::CRYPTO_ISR);
                hace.handle_irq();

                let done = cipher_slot.wait(|| {
                    hace.run_deferred();
                });
                assert_eq!(done.outcome, Ok(SRC.len()));
                assert_eq!(done.request.id(), RequestId(i));
                out = done.request.into_dst();
            }
        });

        s.spawn(move || {
            let mut state: &mut HashState = state;
            for i in 0..ROUNDS {
                let req = HashRequest::new(RequestId(i), HashOp::First, &BLOCK, state, hash_slot);
                assert_eq!(hace.submit_hash(req).unwrap(), Accepted::Dispatched);
                regs.raise(HaceStatus::HASH_ISR);
                hace.handle_irq();

                let done = hash_slot.wait(|| {
                    hace.run_deferred();
                });
                assert_eq!(done.outcome, Ok(0));
                assert_eq!(done.request.id(), RequestId(i));
                state = done.request.into_state();
            }
        });
    });

    assert_eq!(cipher_slot.delivered(), ROUNDS);
    assert_eq!(hash_slot.delivered(), ROUNDS);
    assert!(hace.cipher().is_idle() && hace.hash().is_idle());
}

#[test]
fn concurrent_submitters_each_complete_once() {
    const SUBMITTERS: usize = 8;

    let regs = SimRegs::new();
    let log = Mutex::new(Vec::new());
    let sink = |req: CipherRequest<'_>, outcome: Outcome| {
        assert_eq!(outcome, Ok(SRC.len()));
        log.lock().unwrap().push(req.id().0);
    };
    let mut outs = vec![[0u8; 48]; SUBMITTERS];
    let mut mem = window();
    let mut pool = DmaPool::new(&mut mem, DEV_BASE);
    let hace = HaceDevice::new(&regs, HaceConfig::new(HaceVersion::Ast2500), &mut pool).unwrap();

    let (hace_ref, sink_ref) = (&hace, &sink);
    thread::scope(|s| {
        for (i, out) in outs.iter_mut().enumerate() {
            s.spawn(move || {
                let req = CipherRequest::new(RequestId(i as u32), 0, &KEY, &SRC, out, sink_ref);
                hace_ref.submit_cipher(req).unwrap();
            });
        }
    });

    assert!(hace.cipher().is_busy());
    assert_eq!(hace.cipher().queued(), SUBMITTERS - 1);

    for _ in 0..SUBMITTERS {
        common::interrupt(&regs, &hace, HaceStatus::CRYPTO_ISR);
    }
    assert!(hace.cipher().is_idle());

    let mut ids = log.lock().unwrap().clone();
    ids.sort_unstable();
    assert_eq!(ids, (0..SUBMITTERS as u32).collect::<Vec<_>>());
}

/// Holds the cipher command write until `open` is set, or for two seconds.
struct GatedRegs<'r> {
    inner: &'r SimRegs,
    entered: AtomicBool,
    open: AtomicBool,
    timed_out: AtomicBool,
}

impl<'r> GatedRegs<'r> {
    fn new(inner: &'r SimRegs) -> Self {
        Self {
            inner,
            entered: AtomicBool::new(false),
            open: AtomicBool::new(false),
            timed_out: AtomicBool::new(false),
        }
    }
}

impl HaceRegs for GatedRegs<'_> {
    fn read(&self, offset: u32) -> u32 {
        self.inner.read(offset)
    }

    fn write(&self, offset: u32, value: u32) {
        if offset == CRYPTO_CMD {
            self.entered.store(true, Ordering::SeqCst);
            let start = Instant::now();
            while !self.open.load(Ordering::SeqCst) {
                if start.elapsed() > Duration::from_secs(2) {
                    self.timed_out.store(true, Ordering::SeqCst);
                    break;
                }
                thread::yield_now();
            }
        }
        self.inner.write(offset, value)
    }
}

#[test]
fn hash_submit_proceeds_while_cipher_is_programming() {
    let sim = SimRegs::new();
    let gated = GatedRegs::new(&sim);
    let cipher_slot: CompletionSlot<CipherRequest<'_>> = CompletionSlot::new();
    let hash_slot: CompletionSlot<HashRequest<'_>> = CompletionSlot::new();
    let mut out = [0u8; 48];
    let mut state = HashState::new(HashAlgo::Sha256);
    let mut mem = window();
    let mut pool = DmaPool::new(&mut mem, DEV_BASE);
    let hace = HaceDevice::new(&gated, HaceConfig::new(HaceVersion::Ast2500), &mut pool).unwrap();

    let (hace, gated) = (&hace, &gated);
    let (cipher_slot, hash_slot) = (&cipher_slot, &hash_slot);
    let (out, state) = (&mut out, &mut state);
    thread::scope(move |s| {
        let cipher = s.spawn(move || {
            let req = CipherRequest::new(RequestId(1), 0, &KEY, &SRC, out, cipher_slot);
            hace.submit_cipher(req).unwrap()
        });
        while !gated.entered.load(Ordering::SeqCst) {
            thread::yield_now();
        }

        let req = HashRequest::new(RequestId(2), HashOp::First, &BLOCK, state, hash_slot);
        assert_eq!(hace.submit_hash(req).unwrap(), Accepted::Dispatched);
        assert!(!gated.timed_out.load(Ordering::SeqCst));
        assert!(hace.hash().is_busy());

        gated.open.store(true, Ordering::SeqCst);
        assert_eq!(cipher.join().unwrap(), Accepted::Dispatched);
    });

    assert!(hace.cipher().is_busy());
    assert_eq!(sim.writes_to(CRYPTO_CMD).len(), 1);
}
