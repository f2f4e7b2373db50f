//! Counting pin for backpressure.
//!
//! A semafor holds an integer permit count and is unblocked while the count
//! is positive. Producers (usually the downstream consumer freeing capacity)
//! call [`SemaforPort::release`]; each firing of the owning node acquires one
//! permit during purge.
//!
//! # Example
//!
//! ```ignore
//! let (_permits, permits_port) = producer.semafor(0)?;
//! let (_tick, tick_port) = producer.signal(true)?;
//! producer.start(move |_| { /* emit one item */ Ok(()) })?;
//!
//! // downstream has room for four items
//! permits_port.release(4)?;
//! ```
//!
//! # Closing
//!
//! [`SemaforPort::close`] forces the count to zero and turns the pin off for
//! good; later releases fail with `Closed`.

use std::fmt;
use std::sync::Arc;

use super::{AfterPurge, Gate, Storage};
use crate::error::{ErrorKind, Result};
use crate::node::NodeCore;
use crate::types::{NodeId, PinIndex, PinKind};

pub(crate) struct PermitCounter {
    permits: i64,
    closed: bool,
}

impl PermitCounter {
    pub(crate) const fn new(initial: i64) -> Self {
        Self {
            permits: initial,
            closed: false,
        }
    }

    pub(crate) const fn is_blocked(&self) -> bool {
        self.closed || self.permits <= 0
    }

    /// Adds permits. Returns true on a ≤0 → >0 crossing.
    fn release(&mut self, n: i64) -> core::result::Result<bool, ErrorKind> {
        if n < 0 {
            return Err(ErrorKind::InvalidArgument);
        }
        if self.closed {
            return Err(ErrorKind::Closed);
        }
        let before = self.permits;
        self.permits = self.permits.saturating_add(n);
        Ok(before <= 0 && self.permits > 0)
    }
}

impl Storage for PermitCounter {
    fn kind(&self) -> PinKind {
        PinKind::Semafor
    }

    /// Acquires one permit; never drives the count below zero by itself.
    fn purge(&mut self) -> AfterPurge {
        if self.permits > 0 {
            self.permits -= 1;
        }
        if self.is_blocked() {
            AfterPurge::Off
        } else {
            AfterPurge::Keep
        }
    }
}

/// Body-side handle of a semafor pin.
///
/// The body rarely needs it: the permit is acquired automatically on purge.
pub struct SemaforPin {
    gate: Arc<Gate<PermitCounter>>,
}

impl SemaforPin {
    pub(crate) fn new(gate: Arc<Gate<PermitCounter>>) -> Self {
        Self { gate }
    }

    /// Declaration index of this pin.
    #[must_use]
    pub fn index(&self) -> PinIndex {
        self.gate.index
    }

    /// Current permit count, including the one this firing will consume.
    #[must_use]
    pub fn permits(&self) -> i64 {
        self.gate.lock().storage.permits
    }
}

impl fmt::Debug for SemaforPin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SemaforPin")
            .field("node", &self.gate.node)
            .field("index", &self.gate.index)
            .field("permits", &self.permits())
            .finish()
    }
}

/// Producer-side handle of a semafor pin.
#[derive(Clone)]
pub struct SemaforPort {
    gate: Arc<Gate<PermitCounter>>,
    node: Arc<NodeCore>,
}

impl SemaforPort {
    pub(crate) fn new(gate: Arc<Gate<PermitCounter>>, node: Arc<NodeCore>) -> Self {
        Self { gate, node }
    }

    /// Node this port feeds.
    #[must_use]
    pub fn node_id(&self) -> NodeId {
        self.gate.node()
    }

    /// Adds `n` permits.
    ///
    /// Fails with `InvalidArgument` for a negative `n` and with `Closed` once
    /// the semafor or its node is closed. A release crossing from ≤0 to >0
    /// unblocks the pin.
    pub fn release(&self, n: i64) -> Result<()> {
        let ignition = {
            let mut cell = self.gate.lock_open()?;
            let crossed = cell.storage.release(n).map_err(|kind| {
                let err = self.gate.error(kind);
                if kind == ErrorKind::InvalidArgument {
                    err.with_message(format!("negative permit delta {n}"))
                } else {
                    err
                }
            })?;
            if crossed {
                self.gate.turn_on(&mut cell)
            } else {
                return Ok(());
            }
        };
        self.node.ignite(ignition);
        Ok(())
    }

    /// Forces permits to zero and blocks the pin permanently. Idempotent.
    pub fn close(&self) {
        let mut cell = self.gate.lock();
        cell.storage.closed = true;
        cell.storage.permits = 0;
        self.gate.turn_off(&mut cell);
    }

    /// Returns true once closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.gate.lock().storage.closed
    }

    /// Current permit count.
    #[must_use]
    pub fn permits(&self) -> i64 {
        self.gate.lock().storage.permits
    }
}

impl fmt::Debug for SemaforPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SemaforPort")
            .field("node", &self.gate.node)
            .field("index", &self.gate.index)
            .field("permits", &self.permits())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::DirectExecutor;
    use crate::node::Node;
    use crate::test_utils::init_test_logging;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn init_test(name: &str) {
        init_test_logging();
        crate::test_phase!(name);
    }

    #[test]
    fn counter_crossings() {
        init_test("counter_crossings");
        let mut counter = PermitCounter::new(0);
        assert!(counter.is_blocked());
        assert_eq!(counter.release(0), Ok(false));
        assert_eq!(counter.release(2), Ok(true));
        assert_eq!(counter.release(1), Ok(false));
        assert_eq!(counter.purge(), AfterPurge::Keep);
        assert_eq!(counter.purge(), AfterPurge::Keep);
        assert_eq!(counter.purge(), AfterPurge::Off);
        assert_eq!(counter.permits, 0);
        // acquire alone never goes negative
        assert_eq!(counter.purge(), AfterPurge::Off);
        assert_eq!(counter.permits, 0);
        assert_eq!(counter.release(-1), Err(ErrorKind::InvalidArgument));
        crate::test_complete!("counter_crossings");
    }

    #[test]
    fn negative_initial_needs_catch_up() {
        init_test("negative_initial_needs_catch_up");
        let mut counter = PermitCounter::new(-2);
        assert_eq!(counter.release(2), Ok(false));
        assert!(counter.is_blocked());
        assert_eq!(counter.release(1), Ok(true));
        crate::test_complete!("negative_initial_needs_catch_up");
    }

    #[test]
    fn one_release_one_firing() {
        init_test("one_release_one_firing");
        let node = Node::builder("gated")
            .executor(DirectExecutor)
            .actor()
            .build();
        let (permits, port) = node.semafor(0).expect("register");
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        node.start(move |_| {
            assert!(permits.permits() > 0);
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .expect("start");

        assert_eq!(fired.load(Ordering::SeqCst), 0);
        port.release(1).expect("release");
        crate::assert_with_log!(
            fired.load(Ordering::SeqCst) == 1,
            "one firing per permit",
            1,
            fired.load(Ordering::SeqCst)
        );
        assert_eq!(port.permits(), 0);
        port.release(3).expect("release");
        assert_eq!(fired.load(Ordering::SeqCst), 4);
        assert_eq!(port.permits(), 0);
        crate::test_complete!("one_release_one_firing");
    }

    #[test]
    fn close_is_terminal() {
        init_test("close_is_terminal");
        let node = Node::builder("gated").executor(DirectExecutor).build();
        let (_permits, port) = node.semafor(3).expect("register");
        port.close();
        port.close();
        assert!(port.is_closed());
        assert_eq!(port.permits(), 0);
        assert_eq!(port.release(1).expect_err("closed").kind(), ErrorKind::Closed);
        assert_eq!(
            port.release(-1).expect_err("negative").kind(),
            ErrorKind::InvalidArgument
        );
        crate::test_complete!("close_is_terminal");
    }
}
