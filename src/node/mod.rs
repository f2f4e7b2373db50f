//! Nodes: procedures that fire once every pin is unblocked.
//!
//! A node owns an ordered table of pins, one atomic readiness word and a
//! body. Its lifecycle:
//!
//! 1. **Created**: pins are registered through [`Node::scalar`],
//!    [`Node::stream`], [`Node::semafor`] and friends. Tokens may already be
//!    posted.
//! 2. **Armed**: [`Node::start`] installs the body and opens the internal
//!    control pin. Registering pins from now on fails with
//!    `RegistrationAfterStart`.
//! 3. **Firing**: the thread whose pin transition brings the blocked count to
//!    zero claims the firing with a single compare-and-swap and hands an
//!    [`Activation`] to the node's executor.
//! 4. **Purging**: after the body returns (or fails, or panics) every pin is
//!    purged in declaration order on the firing thread.
//! 5. One-shot nodes terminate. Actor nodes re-arm and fire again at once if
//!    every pin is still unblocked.
//!
//! # Example
//!
//! ```
//! use pinflow::{DirectExecutor, Node, Post};
//! use std::sync::mpsc;
//!
//! let node = Node::builder("adder").executor(DirectExecutor).build();
//! let (x, x_port) = node.scalar::<i32>()?;
//! let (y, y_port) = node.scalar::<i32>()?;
//! let (tx, rx) = mpsc::channel();
//! node.start(move |_| {
//!     tx.send(x.take()? + y.take()?)?;
//!     Ok(())
//! })?;
//!
//! x_port.post(3)?;
//! y_port.post(4)?;
//! assert_eq!(rx.recv()?, 7);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod activation;
mod builder;
mod inner;
pub(crate) mod readiness;

pub use activation::Activation;
pub use builder::NodeBuilder;
pub(crate) use inner::NodeCore;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{BoxError, Result};
use crate::pin::{
    ConstPin, PermitCounter, ScalarPin, ScalarPort, ScalarSlot, SemaforPin, SemaforPort,
    SignalPin, SignalPort, SignalState, StreamPin, StreamPort, StreamQueue,
};
use crate::types::{Lifecycle, NodeId, NodeState};

/// What a body returns. Errors are reported as `BodyFailure`.
pub type BodyResult = core::result::Result<(), BoxError>;

/// Context passed to the body on each firing.
pub struct Firing<'a> {
    node: &'a NodeCore,
    cycle: u64,
    stop: bool,
}

impl<'a> Firing<'a> {
    pub(crate) fn new(node: &'a NodeCore, cycle: u64) -> Self {
        Self {
            node,
            cycle,
            stop: false,
        }
    }

    /// Node being fired.
    #[must_use]
    pub fn node_id(&self) -> NodeId {
        self.node.id
    }

    /// Node name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.node.name
    }

    /// 1-based firing counter.
    #[must_use]
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Terminates the node after this firing's purge instead of re-arming.
    pub fn stop(&mut self) {
        self.stop = true;
    }

    /// Returns true if [`stop`](Self::stop) was called in this firing.
    #[must_use]
    pub fn is_stopping(&self) -> bool {
        self.stop
    }
}

impl fmt::Debug for Firing<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Firing")
            .field("node", &self.node.id)
            .field("cycle", &self.cycle)
            .field("stop", &self.stop)
            .finish()
    }
}

/// Handle to a node. Cheap to clone.
#[derive(Clone)]
pub struct Node {
    core: Arc<NodeCore>,
}

impl Node {
    /// Starts building a node.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> NodeBuilder {
        NodeBuilder::new(name)
    }

    /// A one-shot node on the default trampoline executor.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        NodeBuilder::new(name).build()
    }

    /// An actor node on the default trampoline executor.
    #[must_use]
    pub fn actor(name: impl Into<String>) -> Self {
        NodeBuilder::new(name).actor().build()
    }

    pub(crate) fn from_core(core: Arc<NodeCore>) -> Self {
        Self { core }
    }

    /// Unique id.
    #[must_use]
    pub fn id(&self) -> NodeId {
        self.core.id
    }

    /// Name given at construction.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.core.name
    }

    /// One-shot or actor.
    #[must_use]
    pub fn lifecycle(&self) -> Lifecycle {
        self.core.lifecycle
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> NodeState {
        self.core.state()
    }

    /// Number of firings so far.
    #[must_use]
    pub fn firings(&self) -> u64 {
        self.core.firings()
    }

    /// Number of firings whose body failed or panicked.
    #[must_use]
    pub fn failures(&self) -> u64 {
        self.core.failures()
    }

    /// Number of pins currently blocked.
    #[must_use]
    pub fn blocked_pins(&self) -> u64 {
        self.core.blocked_pins()
    }

    /// Number of registered pins.
    #[must_use]
    pub fn pin_count(&self) -> usize {
        self.core.pin_count()
    }

    /// Returns true once the node can no longer fire.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.core.is_terminated()
    }

    /// Registers a payload-free pin, initially on or off.
    pub fn signal(&self, initially_on: bool) -> Result<(SignalPin, SignalPort)> {
        let gate = self.core.register(SignalState, !initially_on)?;
        Ok((
            SignalPin::new(Arc::clone(&gate)),
            SignalPort::new(gate, Arc::clone(&self.core)),
        ))
    }

    /// Registers a single-slot pin.
    pub fn scalar<T: Send + 'static>(&self) -> Result<(ScalarPin<T>, ScalarPort<T>)> {
        let gate = self.core.register(ScalarSlot::new(false), true)?;
        Ok((
            ScalarPin::new(Arc::clone(&gate)),
            ScalarPort::new(gate, Arc::clone(&self.core)),
        ))
    }

    /// Registers a pin whose first token is kept for every firing.
    pub fn constant<T: Send + 'static>(&self) -> Result<(ConstPin<T>, ScalarPort<T>)> {
        let gate = self.core.register(ScalarSlot::new(true), true)?;
        Ok((
            ConstPin::new(Arc::clone(&gate)),
            ScalarPort::new(gate, Arc::clone(&self.core)),
        ))
    }

    /// Registers an unbounded FIFO pin with end-of-stream.
    pub fn stream<T: Send + 'static>(&self) -> Result<(StreamPin<T>, StreamPort<T>)> {
        let gate = self.core.register(StreamQueue::new(), true)?;
        Ok((
            StreamPin::new(Arc::clone(&gate)),
            StreamPort::new(gate, Arc::clone(&self.core)),
        ))
    }

    /// Registers a permit-counting pin.
    pub fn semafor(&self, initial_permits: i64) -> Result<(SemaforPin, SemaforPort)> {
        let counter = PermitCounter::new(initial_permits);
        let blocked = counter.is_blocked();
        let gate = self.core.register(counter, blocked)?;
        Ok((
            SemaforPin::new(Arc::clone(&gate)),
            SemaforPort::new(gate, Arc::clone(&self.core)),
        ))
    }

    /// Installs the body and arms the node.
    ///
    /// Fires immediately if every pin already holds a token. A second call
    /// fails with `InvalidStateTransition`; a call after [`stop`](Self::stop)
    /// fails with `Closed`.
    pub fn start<F>(&self, body: F) -> Result<()>
    where
        F: FnMut(&mut Firing<'_>) -> BodyResult + Send + 'static,
    {
        self.core.start(Box::new(body))
    }

    /// Terminates the node.
    ///
    /// Immediate when no firing is in flight; otherwise the in-flight firing
    /// finishes its body and purge first. Posting afterwards fails with
    /// `Closed`.
    pub fn stop(&self) {
        self.core.stop();
    }

    /// Waits until the node terminates. Returns false on timeout.
    #[must_use]
    pub fn await_termination(&self, timeout: Duration) -> bool {
        self.core.await_termination(timeout)
    }

    /// Blocks until the node terminates.
    pub fn join(&self) {
        self.core.join();
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.core, f)
    }
}
