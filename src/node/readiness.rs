//! The readiness word: blocked-pin count plus control bits.
//!
//! Layout of the `u64`:
//!
//! ```text
//! bit 0      CONTROL_BLOCKED  node is created, firing, purging or terminated
//! bit 1      STOP_REQUESTED   terminate at the next re-arm
//! bit 2      TERMINATED       never fire again
//! bits 8..   blocked pins     number of user pins currently blocked
//! ```
//!
//! The control bit is the node's internal pin. Firing is claimed by the one
//! compare-and-swap that moves the word to "no blocked pins, control open";
//! that same CAS closes the control bit, so no other thread can observe the
//! zero-crossing. Turning a pin off while the node fires only bumps the
//! count, and the firing thread re-checks everything when it reopens the
//! control bit at re-arm.

use std::sync::atomic::{AtomicU64, Ordering};

const CONTROL_BLOCKED: u64 = 1;
const STOP_REQUESTED: u64 = 1 << 1;
const TERMINATED: u64 = 1 << 2;
const PIN_SHIFT: u32 = 8;
const PIN_ONE: u64 = 1 << PIN_SHIFT;

/// Outcome of a transition that may claim the firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub(crate) enum Ignition {
    /// Nothing to do.
    Idle,
    /// The caller owns the firing and must submit an activation.
    Fire,
}

impl Ignition {
    pub(crate) const fn is_fire(self) -> bool {
        matches!(self, Self::Fire)
    }
}

/// Outcome of reopening the control pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub(crate) enum Arm {
    /// Armed; waiting for pins.
    Waiting,
    /// Every pin was already on; the caller owns the next firing.
    Fire,
    /// A stop was pending; the word is now terminated.
    Stopped,
    /// Already terminated.
    Terminated,
}

/// Outcome of a stop request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub(crate) enum StopRequest {
    /// No firing in flight; the word is now terminated.
    Immediate,
    /// A firing is in flight; it terminates at re-arm.
    Deferred,
    /// Already terminated.
    AlreadyTerminated,
}

#[derive(Debug)]
pub(crate) struct Readiness {
    word: AtomicU64,
}

impl Readiness {
    /// A fresh word: control blocked, no pins.
    pub(crate) const fn new() -> Self {
        Self {
            word: AtomicU64::new(CONTROL_BLOCKED),
        }
    }

    /// Accounts for a newly registered pin that starts blocked.
    ///
    /// Only called while the control bit is closed (node not started).
    pub(crate) fn register_blocked(&self) {
        self.word.fetch_add(PIN_ONE, Ordering::AcqRel);
    }

    /// A pin went blocked → unblocked.
    pub(crate) fn pin_on(&self) -> Ignition {
        let mut current = self.word.load(Ordering::Acquire);
        loop {
            debug_assert!(current >> PIN_SHIFT > 0, "pin_on without a blocked pin");
            let mut next = current.wrapping_sub(PIN_ONE);
            let fire = next >> PIN_SHIFT == 0 && next & (CONTROL_BLOCKED | TERMINATED) == 0;
            if fire {
                next |= CONTROL_BLOCKED;
            }
            match self
                .word
                .compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return if fire { Ignition::Fire } else { Ignition::Idle },
                Err(actual) => current = actual,
            }
        }
    }

    /// A pin went unblocked → blocked.
    pub(crate) fn pin_off(&self) {
        self.word.fetch_add(PIN_ONE, Ordering::AcqRel);
    }

    /// Opens the control pin (start or re-arm).
    pub(crate) fn arm(&self) -> Arm {
        let mut current = self.word.load(Ordering::Acquire);
        loop {
            if current & TERMINATED != 0 {
                return Arm::Terminated;
            }
            let (next, outcome) = if current & STOP_REQUESTED != 0 {
                (current | TERMINATED | CONTROL_BLOCKED, Arm::Stopped)
            } else if current >> PIN_SHIFT == 0 {
                (current | CONTROL_BLOCKED, Arm::Fire)
            } else {
                (current & !CONTROL_BLOCKED, Arm::Waiting)
            };
            match self
                .word
                .compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return outcome,
                Err(actual) => current = actual,
            }
        }
    }

    /// Asks the node to stop.
    pub(crate) fn request_stop(&self) -> StopRequest {
        let mut current = self.word.load(Ordering::Acquire);
        loop {
            if current & TERMINATED != 0 {
                return StopRequest::AlreadyTerminated;
            }
            let (next, outcome) = if current & CONTROL_BLOCKED == 0 {
                (current | CONTROL_BLOCKED | TERMINATED, StopRequest::Immediate)
            } else {
                (current | STOP_REQUESTED, StopRequest::Deferred)
            };
            match self
                .word
                .compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return outcome,
                Err(actual) => current = actual,
            }
        }
    }

    /// Unconditionally terminates. Returns false if it already was.
    pub(crate) fn terminate(&self) -> bool {
        let prev = self
            .word
            .fetch_or(CONTROL_BLOCKED | TERMINATED, Ordering::AcqRel);
        prev & TERMINATED == 0
    }

    pub(crate) fn is_terminated(&self) -> bool {
        self.word.load(Ordering::Acquire) & TERMINATED != 0
    }

    pub(crate) fn is_stop_requested(&self) -> bool {
        self.word.load(Ordering::Acquire) & STOP_REQUESTED != 0
    }

    pub(crate) fn blocked_pins(&self) -> u64 {
        self.word.load(Ordering::Acquire) >> PIN_SHIFT
    }
}
