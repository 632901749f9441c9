// Licensed under the Apache-2.0 license

use core::fmt;
use num_derive::FromPrimitive;

/// Errors produced by the HACE dispatch core.
///
/// The discriminants are stable so that an error can travel as an IPC
/// response code and be decoded back with [`num_traits::FromPrimitive`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, FromPrimitive)]
#[repr(u32)]
pub enum HaceError {
    /// The engine is busy and its queue is full. The caller must retry or
    /// fail the operation upward.
    EngineBusyOverflow = 1,

    /// A completion arrived while no request was in flight.
    SpuriousCompletion = 2,

    /// Reserved for engine-level failures. The HACE reports no error
    /// status, so the dispatch core never produces this; the code stays
    /// fixed for callers that map it.
    HardwareFault = 3,

    /// The DMA window cannot hold the regions requested at bring-up.
    DmaExhausted = 4,

    /// A buffer length does not fit the engine or the algorithm.
    InvalidLength = 5,

    /// A chained hash operation was continued on a session that was never
    /// started or has already been finalized.
    InvalidState = 6,

    /// The configuration cannot be honored (e.g. a region too small to
    /// hold a useful data area).
    InvalidConfig = 7,

    /// The device still has requests outstanding.
    Busy = 8,
}

impl From<HaceError> for u32 {
    fn from(e: HaceError) -> u32 {
        e as u32
    }
}

impl fmt::Display for HaceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HaceError::EngineBusyOverflow => "engine queue full",
            HaceError::SpuriousCompletion => "completion with no request in flight",
            HaceError::HardwareFault => "hardware fault",
            HaceError::DmaExhausted => "DMA window exhausted",
            HaceError::InvalidLength => "invalid length",
            HaceError::InvalidState => "invalid session state",
            HaceError::InvalidConfig => "invalid configuration",
            HaceError::Busy => "requests outstanding",
        };
        f.write_str(s)
    }
}

/// A submission that was not accepted.
///
/// The request is handed back untouched so the caller can retry it later.
pub struct Rejected<T> {
    pub error: HaceError,
    pub request: T,
}

impl<T> Rejected<T> {
    pub fn into_request(self) -> T {
        self.request
    }
}

impl<T> fmt::Debug for Rejected<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rejected")
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}
