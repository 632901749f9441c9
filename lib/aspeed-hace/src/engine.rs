// Licensed under the Apache-2.0 license

//! Per-engine dispatch state machine.
//!
//! An engine is either idle or has exactly one request programmed into the
//! hardware. Requests that arrive while it is busy wait in a bounded FIFO;
//! when the hardware signals completion the deferred task calls
//! [`Engine::resume`], which either reprograms the hardware for the next
//! step of a chained request or finishes it and starts the next queued one.
//!
//! ```text
//!          submit, idle                      resume, chained
//!   Idle ----------------> Dispatched <------------------+
//!    ^                     |   |   ^                     |
//!    |  resume, terminal,  |   |   +---------------------+
//!    +---------------------+   |   resume, terminal, queue non-empty
//!       queue empty            |   (next request dispatched)
//!                              +--> submit: enqueue or EngineBusyOverflow
//! ```
//!
//! Only the busy claim and the queue live under the lock. Whoever claims
//! the engine takes the DMA region out of the shared state, stages and
//! programs the hardware with the lock released, then puts the region back
//! together with the request in flight. The lock is `critical_section`,
//! which is global, so nothing proportional to the request size may run
//! inside it.

use core::cell::RefCell;
use critical_section::Mutex;
use heapless::Deque;
use log::{debug, error, trace, warn};

use crate::completion::{CompletionSink, Outcome, RequestId};
use crate::deferred::CompletionTask;
use crate::regs::{HaceRegs, HaceStatus};
use crate::{HaceError, Rejected};

/// Requests an engine will hold while busy. One more than this is
/// rejected with [`HaceError::EngineBusyOverflow`].
pub const QUEUE_DEPTH: usize = 50;

/// Status reads [`Engine::resume`] spends waiting for the engine's busy bit
/// to drop after a completion interrupt.
pub const BUSY_POLLS: u32 = 1000;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum EngineKind {
    Cipher,
    Hash,
}

/// How a submission was taken on.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Accepted {
    /// Programmed into the hardware right away.
    Dispatched,
    /// Waiting behind the request in flight.
    Queued,
    /// Needed no hardware; its sink has already been called.
    Absorbed,
}

/// What [`Engine::resume`] did.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Resumed {
    /// Nothing was in flight. Nothing changed and no sink was called.
    Spurious,
    /// The engine still reported busy. The request stays in flight and
    /// keeps the DMA region; the next completion interrupt finishes it.
    StillBusy,
    /// The completion raced a submit that was still programming the
    /// hardware. The submitter reschedules the completion task when it is
    /// done.
    Staging,
    /// The request in flight was advanced to its next hardware step.
    Chained,
    /// The request in flight finished; `next` is true when a queued request
    /// was dispatched in its place.
    Completed { next: bool },
}

/// Result of preparing a request before it reaches the queue.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Prepared {
    NeedsHardware,
    /// Fully handled in software; completes with the given byte count.
    Absorbed(usize),
}

/// Result of one hardware completion for the request in flight.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Step {
    /// Hardware was reprogrammed for another step of the same request.
    Chained,
    Done(Outcome),
}

/// A unit of work an engine can carry.
pub trait Request<'a>: Send + Sized + 'a {
    fn id(&self) -> RequestId;

    /// Where the request goes back to once it is finished.
    fn sink(&self) -> &'a dyn CompletionSink<Self>;
}

/// The engine-specific half of the state machine: how a request is staged
/// into DMA memory and programmed, and how a completion is interpreted.
///
/// Implemented by [`crate::CipherOps`] and [`crate::HashOps`].
pub trait EngineOps<'a> {
    type Request: Request<'a>;
    type Dma: Send;

    const KIND: EngineKind;

    /// Status bit that stays set while this engine is running.
    const BUSY: HaceStatus;

    /// Validates a request and does whatever can be done without the
    /// hardware. Must not modify the request when returning an error.
    fn prepare(&self, req: &mut Self::Request) -> Result<Prepared, HaceError>;

    /// Stages the request into `dma` and starts the hardware.
    fn dispatch<R: HaceRegs + ?Sized>(
        &self,
        regs: &R,
        dma: &mut Self::Dma,
        req: &mut Self::Request,
    );

    /// Interprets a completion for the request in flight, with the engine
    /// known to be idle. Either finishes it (copying results out of `dma`)
    /// or reprograms the next step.
    fn advance<R: HaceRegs + ?Sized>(
        &self,
        regs: &R,
        dma: &mut Self::Dma,
        req: &mut Self::Request,
    ) -> Step;
}

struct EngineState<'a, O: EngineOps<'a>> {
    busy: bool,
    in_flight: Option<O::Request>,
    queue: Deque<O::Request, QUEUE_DEPTH>,
    /// `None` while a claimant is staging or finishing a request.
    dma: Option<O::Dma>,
    /// A completion arrived while the region was out.
    missed: bool,
}

enum Claim<T, D> {
    Spurious,
    StillBusy,
    Staging,
    Owned(T, D),
}

pub struct Engine<'a, O: EngineOps<'a>> {
    ops: O,
    state: Mutex<RefCell<EngineState<'a, O>>>,
    task: CompletionTask,
}

impl<'a, O: EngineOps<'a>> Engine<'a, O> {
    pub fn new(ops: O, dma: O::Dma) -> Self {
        Self {
            ops,
            state: Mutex::new(RefCell::new(EngineState {
                busy: false,
                in_flight: None,
                queue: Deque::new(),
                dma: Some(dma),
                missed: false,
            })),
            task: CompletionTask::new(),
        }
    }

    pub fn kind(&self) -> EngineKind {
        O::KIND
    }

    pub fn ops(&self) -> &O {
        &self.ops
    }

    /// The deferred completion task serving this engine.
    pub fn task(&self) -> &CompletionTask {
        &self.task
    }

    pub fn is_busy(&self) -> bool {
        critical_section::with(|cs| self.state.borrow(cs).borrow().busy)
    }

    /// Number of requests waiting behind the one in flight.
    pub fn queued(&self) -> usize {
        critical_section::with(|cs| self.state.borrow(cs).borrow().queue.len())
    }

    pub fn is_idle(&self) -> bool {
        critical_section::with(|cs| {
            let state = self.state.borrow(cs).borrow();
            !state.busy && state.queue.is_empty()
        })
    }

    /// Starts `req` if the engine is idle, queues it otherwise.
    ///
    /// Never waits for the hardware. A full queue hands the request back
    /// with [`HaceError::EngineBusyOverflow`].
    pub fn submit<R: HaceRegs + ?Sized>(
        &self,
        regs: &R,
        mut req: O::Request,
    ) -> Result<Accepted, Rejected<O::Request>> {
        match self.ops.prepare(&mut req) {
            Err(error) => return Err(Rejected { error, request: req }),
            Ok(Prepared::Absorbed(n)) => {
                trace!("{:?}: request {} absorbed", O::KIND, req.id().0);
                let sink = req.sink();
                sink.complete(req, Ok(n));
                return Ok(Accepted::Absorbed);
            }
            Ok(Prepared::NeedsHardware) => {}
        }

        let id = req.id();
        let claim = critical_section::with(|cs| {
            let mut state = self.state.borrow(cs).borrow_mut();
            if !state.busy {
                if let Some(dma) = state.dma.take() {
                    state.busy = true;
                    return Ok((req, dma));
                }
            }
            match state.queue.push_back(req) {
                Ok(()) => Err(Ok(Accepted::Queued)),
                Err(request) => Err(Err(Rejected {
                    error: HaceError::EngineBusyOverflow,
                    request,
                })),
            }
        });

        let result = match claim {
            Ok((mut req, mut dma)) => {
                self.ops.dispatch(regs, &mut dma, &mut req);
                self.install(req, dma);
                Ok(Accepted::Dispatched)
            }
            Err(result) => result,
        };
        match &result {
            Ok(a) => debug!("{:?}: request {} {:?}", O::KIND, id.0, a),
            Err(_) => warn!("{:?}: queue full, request {} rejected", O::KIND, id.0),
        }
        result
    }

    /// Puts a programmed request and its region back into the shared
    /// state.
    fn install(&self, req: O::Request, dma: O::Dma) {
        let missed = critical_section::with(|cs| {
            let mut state = self.state.borrow(cs).borrow_mut();
            state.in_flight = Some(req);
            state.dma = Some(dma);
            core::mem::take(&mut state.missed)
        });
        if missed {
            debug!("{:?}: completion raced dispatch, rescheduled", O::KIND);
            self.task.schedule();
        }
    }

    /// Reads the status register until this engine's busy bit drops, at
    /// most [`BUSY_POLLS`] times.
    fn settled<R: HaceRegs + ?Sized>(&self, regs: &R) -> HaceStatus {
        let mut status = regs.status();
        for _ in 0..BUSY_POLLS {
            if !status.intersects(O::BUSY) {
                break;
            }
            status = regs.status();
        }
        status
    }

    /// Handles one hardware completion. Only the deferred completion task
    /// calls this.
    ///
    /// A call with nothing in flight is logged and otherwise ignored. So is
    /// a call while the engine still reports busy: the hardware may still be
    /// using the DMA region, so the request is neither finished nor failed.
    pub fn resume<R: HaceRegs + ?Sized>(&self, regs: &R) -> Resumed {
        let status = self.settled(regs);
        let claim = critical_section::with(|cs| {
            let mut state = self.state.borrow(cs).borrow_mut();
            if !state.busy {
                return Claim::Spurious;
            }
            if state.in_flight.is_none() || state.dma.is_none() {
                state.missed = true;
                return Claim::Staging;
            }
            if status.intersects(O::BUSY) {
                return Claim::StillBusy;
            }
            match (state.in_flight.take(), state.dma.take()) {
                (Some(req), Some(dma)) => Claim::Owned(req, dma),
                _ => Claim::Staging,
            }
        });

        let (mut req, mut dma) = match claim {
            Claim::Owned(req, dma) => (req, dma),
            Claim::Spurious => {
                warn!(
                    "{:?}: {}, status {:#x}",
                    O::KIND,
                    HaceError::SpuriousCompletion,
                    status.bits()
                );
                return Resumed::Spurious;
            }
            Claim::StillBusy => {
                warn!(
                    "{:?}: completion while busy, status {:#x}",
                    O::KIND,
                    status.bits()
                );
                return Resumed::StillBusy;
            }
            Claim::Staging => {
                debug!("{:?}: completion during dispatch", O::KIND);
                return Resumed::Staging;
            }
        };

        let outcome = match self.ops.advance(regs, &mut dma, &mut req) {
            Step::Chained => {
                trace!("{:?}: chained step", O::KIND);
                self.install(req, dma);
                return Resumed::Chained;
            }
            Step::Done(outcome) => outcome,
        };

        let mut dma = Some(dma);
        let next = critical_section::with(|cs| {
            let mut state = self.state.borrow(cs).borrow_mut();
            let next = state.queue.pop_front();
            if next.is_none() {
                state.busy = false;
                state.dma = dma.take();
            }
            next
        });
        let dispatched = match (next, dma) {
            (Some(mut next), Some(mut dma)) => {
                trace!("{:?}: request {} popped", O::KIND, next.id().0);
                self.ops.dispatch(regs, &mut dma, &mut next);
                self.install(next, dma);
                true
            }
            _ => false,
        };

        if let Err(e) = outcome {
            error!("{:?}: request {} failed: {}", O::KIND, req.id().0, e);
        }
        let sink = req.sink();
        sink.complete(req, outcome);
        Resumed::Completed { next: dispatched }
    }

    /// Runs the completion task if the top half scheduled it.
    pub fn run_deferred<R: HaceRegs + ?Sized>(&self, regs: &R) -> usize {
        self.task.run(|| {
            self.resume(regs);
        })
    }
}
