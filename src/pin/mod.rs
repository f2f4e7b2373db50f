//! Pins: the input gates of a node.
//!
//! A pin is a binary gate (blocked or unblocked) combined with a storage
//! strategy. The node fires once every pin is unblocked; after the body
//! returns each pin is purged in declaration order, which either keeps it on
//! (more data queued, pushback, permits left, constant) or turns it off.
//!
//! | Kind | Body handle | Producer handle | Blocked while |
//! |------|-------------|-----------------|---------------|
//! | signal | [`SignalPin`] | [`SignalPort`] | producer turned it off |
//! | scalar | [`ScalarPin`] | [`ScalarPort`] | slot empty |
//! | constant | [`ConstPin`] | [`ScalarPort`] | never posted |
//! | stream | [`StreamPin`] | [`StreamPort`] | nothing exposed |
//! | semafor | [`SemaforPin`] | [`SemaforPort`] | permits <= 0 |
//!
//! Pins are created through the owning [`Node`](crate::Node) before it is
//! started. Each constructor returns a `(pin, port)` pair: the pin is moved
//! into the body, the port is handed to producers.
//!
//! # Locking
//!
//! Each gate owns a short mutex over its blocked flag and storage. Producers
//! and the purging thread take it briefly; it is never held while a body runs
//! or while an activation is submitted to an executor. The only state shared
//! between pins is the node's atomic readiness word.

mod scalar;
mod semafor;
mod signal;
mod stream;

pub use scalar::{ConstPin, ScalarPin, ScalarPort};
pub use semafor::{SemaforPin, SemaforPort};
pub use signal::{SignalPin, SignalPort};
pub use stream::{StreamPin, StreamPort};

pub(crate) use scalar::ScalarSlot;
pub(crate) use semafor::PermitCounter;
pub(crate) use signal::SignalState;
pub(crate) use stream::StreamQueue;

use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use crate::error::{Error, ErrorContext, ErrorKind};
use crate::node::readiness::{Ignition, Readiness};
use crate::types::{NodeId, PinIndex, PinKind};

/// What a pin does when purged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AfterPurge {
    /// Leave the gate as it is.
    Keep,
    /// Turn the gate off.
    Off,
}

/// Storage strategy behind a gate.
pub(crate) trait Storage: Send + 'static {
    fn kind(&self) -> PinKind;

    /// Consumes what the last firing saw.
    fn purge(&mut self) -> AfterPurge;

    /// Drops buffered tokens once the node terminated.
    fn discard(&mut self) {}
}

/// Object-safe view of a gate, held in the node's pin table.
pub(crate) trait PinSlot: Send + Sync {
    fn index(&self) -> PinIndex;
    fn kind(&self) -> PinKind;
    fn is_blocked(&self) -> bool;
    fn purge(&self);
    fn discard(&self);
}

pub(crate) struct Cell<S> {
    blocked: bool,
    pub(crate) storage: S,
}

/// Generic gate: blocked flag plus storage, bound to a node's readiness word.
pub(crate) struct Gate<S> {
    node: NodeId,
    index: PinIndex,
    readiness: Arc<Readiness>,
    cell: Mutex<Cell<S>>,
}

impl<S: Storage> Gate<S> {
    /// Creates a gate and accounts for it in the readiness word.
    ///
    /// Must only be called while the node is not started.
    pub(crate) fn new(
        node: NodeId,
        index: PinIndex,
        readiness: Arc<Readiness>,
        storage: S,
        blocked: bool,
    ) -> Self {
        if blocked {
            readiness.register_blocked();
        }
        Self {
            node,
            index,
            readiness,
            cell: Mutex::new(Cell { blocked, storage }),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Cell<S>> {
        self.cell.lock()
    }

    /// Locks the gate for a producer, refusing if the node terminated.
    pub(crate) fn lock_open(&self) -> Result<MutexGuard<'_, Cell<S>>, Error> {
        let cell = self.cell.lock();
        self.ensure_open()?;
        Ok(cell)
    }

    /// Refuses with `Closed` once the node terminated.
    pub(crate) fn ensure_open(&self) -> Result<(), Error> {
        if self.readiness.is_terminated() {
            return Err(self.error(ErrorKind::Closed).with_message("node terminated"));
        }
        Ok(())
    }

    /// blocked → unblocked. The caller must act on `Fire` after unlocking.
    pub(crate) fn turn_on(&self, cell: &mut Cell<S>) -> Ignition {
        if !cell.blocked {
            return Ignition::Idle;
        }
        cell.blocked = false;
        self.readiness.pin_on()
    }

    /// unblocked → blocked.
    pub(crate) fn turn_off(&self, cell: &mut Cell<S>) {
        if cell.blocked {
            return;
        }
        cell.blocked = true;
        self.readiness.pin_off();
    }

    pub(crate) fn error(&self, kind: ErrorKind) -> Error {
        Error::new(kind).with_context(ErrorContext::pin(self.node, self.index))
    }

    pub(crate) const fn node(&self) -> NodeId {
        self.node
    }
}

impl<S: Storage> PinSlot for Gate<S> {
    fn index(&self) -> PinIndex {
        self.index
    }

    fn kind(&self) -> PinKind {
        self.cell.lock().storage.kind()
    }

    fn is_blocked(&self) -> bool {
        self.cell.lock().blocked
    }

    fn purge(&self) {
        let mut cell = self.cell.lock();
        if cell.storage.purge() == AfterPurge::Off {
            self.turn_off(&mut cell);
        }
    }

    fn discard(&self) {
        self.cell.lock().storage.discard();
    }
}
