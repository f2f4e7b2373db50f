//! Payload-free pins switched by a producer.
//!
//! A signal pin carries no token and is left untouched by purge: it stays in
//! whatever position its producer last put it. Use it as a lock (turn off to
//! pause a node, on to resume) or as a one-time trigger.

use std::fmt;
use std::sync::Arc;

use super::{AfterPurge, Gate, Storage};
use crate::error::Result;
use crate::node::NodeCore;
use crate::types::{NodeId, PinIndex, PinKind};

pub(crate) struct SignalState;

impl Storage for SignalState {
    fn kind(&self) -> PinKind {
        PinKind::Signal
    }

    fn purge(&mut self) -> AfterPurge {
        AfterPurge::Keep
    }
}

/// Body-side handle of a signal pin.
pub struct SignalPin {
    gate: Arc<Gate<SignalState>>,
}

impl SignalPin {
    pub(crate) fn new(gate: Arc<Gate<SignalState>>) -> Self {
        Self { gate }
    }

    /// Declaration index of this pin.
    #[must_use]
    pub fn index(&self) -> PinIndex {
        self.gate.index
    }

    /// Returns true while the signal is off.
    #[must_use]
    pub fn is_blocked(&self) -> bool {
        self.gate.lock().blocked
    }
}

impl fmt::Debug for SignalPin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalPin")
            .field("node", &self.gate.node)
            .field("index", &self.gate.index)
            .finish_non_exhaustive()
    }
}

/// Producer-side handle of a signal pin.
#[derive(Clone)]
pub struct SignalPort {
    gate: Arc<Gate<SignalState>>,
    node: Arc<NodeCore>,
}

impl SignalPort {
    pub(crate) fn new(gate: Arc<Gate<SignalState>>, node: Arc<NodeCore>) -> Self {
        Self { gate, node }
    }

    /// Node this port feeds.
    #[must_use]
    pub fn node_id(&self) -> NodeId {
        self.gate.node()
    }

    /// Unblocks the pin. Idempotent.
    pub fn turn_on(&self) -> Result<()> {
        let ignition = {
            let mut cell = self.gate.lock_open()?;
            self.gate.turn_on(&mut cell)
        };
        self.node.ignite(ignition);
        Ok(())
    }

    /// Blocks the pin. Idempotent; never interrupts a firing in flight.
    pub fn turn_off(&self) -> Result<()> {
        let mut cell = self.gate.lock_open()?;
        self.gate.turn_off(&mut cell);
        Ok(())
    }

    /// Returns true while the signal is off.
    #[must_use]
    pub fn is_blocked(&self) -> bool {
        self.gate.lock().blocked
    }
}

impl fmt::Debug for SignalPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalPort")
            .field("node", &self.gate.node)
            .field("index", &self.gate.index)
            .field("blocked", &self.is_blocked())
            .finish()
    }
}
