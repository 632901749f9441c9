// Licensed under the Apache-2.0 license

//! How results get back to the submitter.
//!
//! A request borrows the caller's buffers (and, for hashes, the session
//! state) for as long as the engine holds it. Completion hands the whole
//! request back, so the caller regains those borrows together with the
//! outcome and can read the output or chain the next request.

use crate::HaceError;
use core::cell::RefCell;
use core::sync::atomic::{AtomicU32, Ordering};
use critical_section::Mutex;

/// Caller-chosen tag carried through to the completion.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct RequestId(pub u32);

/// Terminal outcome of one request.
///
/// `Ok(n)` is the number of bytes written to the request's output buffer;
/// intermediate hash steps report `Ok(0)`.
pub type Outcome = Result<usize, HaceError>;

/// Receives each accepted request back, exactly once, with its outcome.
///
/// Called from the deferred completion context (or from `submit` itself
/// when a request needs no hardware), never with an engine lock held.
pub trait CompletionSink<T>: Sync {
    fn complete(&self, request: T, outcome: Outcome);
}

impl<T, F> CompletionSink<T> for F
where
    F: Fn(T, Outcome) + Sync,
{
    fn complete(&self, request: T, outcome: Outcome) {
        self(request, outcome)
    }
}

pub struct Completed<T> {
    pub request: T,
    pub outcome: Outcome,
}

/// Single-result mailbox for callers that want to block on a request.
///
/// Holds one completion. Each slot serves one outstanding request at a
/// time: take the result before submitting the next request through it.
pub struct CompletionSlot<T> {
    last: Mutex<RefCell<Option<Completed<T>>>>,
    delivered: AtomicU32,
}

impl<T> CompletionSlot<T> {
    pub const fn new() -> Self {
        Self {
            last: Mutex::new(RefCell::new(None)),
            delivered: AtomicU32::new(0),
        }
    }

    /// Takes the stored completion, if any.
    pub fn take(&self) -> Option<Completed<T>> {
        critical_section::with(|cs| self.last.borrow(cs).borrow_mut().take())
    }

    /// Number of completions delivered to this slot so far.
    pub fn delivered(&self) -> u32 {
        self.delivered.load(Ordering::Acquire)
    }

    /// Spins until a completion arrives, calling `idle` between polls.
    ///
    /// `idle` is where the caller makes progress happen: run the deferred
    /// completion work, or sleep until the next notification.
    pub fn wait(&self, mut idle: impl FnMut()) -> Completed<T> {
        loop {
            if let Some(c) = self.take() {
                return c;
            }
            idle();
        }
    }
}

impl<T> Default for CompletionSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send> CompletionSink<T> for CompletionSlot<T> {
    fn complete(&self, request: T, outcome: Outcome) {
        let prev = critical_section::with(|cs| {
            self.last
                .borrow(cs)
                .replace(Some(Completed { request, outcome }))
        });
        self.delivered.fetch_add(1, Ordering::AcqRel);
        debug_assert!(prev.is_none(), "completion slot overwritten");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_hands_back_request_and_counts() {
        let slot = CompletionSlot::new();
        assert!(slot.take().is_none());

        slot.complete(7u32, Ok(3));
        assert_eq!(slot.delivered(), 1);
        let c = slot.take().unwrap();
        assert_eq!((c.request, c.outcome), (7, Ok(3)));

        slot.complete(8u32, Err(HaceError::InvalidLength));
        let c = slot.wait(|| panic!("already delivered"));
        assert_eq!(c.outcome, Err(HaceError::InvalidLength));
        assert_eq!(slot.delivered(), 2);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "completion slot overwritten")]
    fn second_unread_completion_is_caught() {
        let slot = CompletionSlot::new();
        slot.complete(1u32, Ok(0));
        slot.complete(2u32, Ok(0));
    }
}
