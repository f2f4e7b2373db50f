//! Shared node state and the firing cycle.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use parking_lot::Mutex;

use super::readiness::{Arm, Ignition, Readiness, StopRequest};
use super::{Activation, Firing};
use crate::error::{BoxError, Error, ErrorContext, ErrorKind, Result};
use crate::executor::Executor;
use crate::pin::{Gate, PinSlot, Storage};
use crate::tracing_compat::{debug, debug_span, error, trace};
use crate::types::{Lifecycle, NodeId, NodeState, PinIndex};
use crate::util::Completion;

pub(crate) type Body = Box<dyn FnMut(&mut Firing<'_>) -> core::result::Result<(), BoxError> + Send>;
pub(crate) type FailureHandler = Arc<dyn Fn(&Error) + Send + Sync>;

/// What the activation does after one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Cycle {
    /// Nothing more to run on this activation.
    Done,
    /// Re-arm claimed another firing.
    Again,
}

pub(crate) struct NodeSettings {
    pub(crate) name: Arc<str>,
    pub(crate) lifecycle: Lifecycle,
    pub(crate) firing_budget: u32,
    pub(crate) executor: Arc<dyn Executor>,
    pub(crate) failure_handler: Option<FailureHandler>,
}

pub(crate) struct NodeCore {
    pub(crate) id: NodeId,
    pub(crate) name: Arc<str>,
    pub(crate) lifecycle: Lifecycle,
    pub(crate) firing_budget: u32,
    executor: Arc<dyn Executor>,
    failure_handler: Option<FailureHandler>,
    readiness: Arc<Readiness>,
    state: AtomicU8,
    /// Pins in declaration order; frozen into `pins` at start.
    registry: Mutex<Vec<Arc<dyn PinSlot>>>,
    pins: OnceLock<Box<[Arc<dyn PinSlot>]>>,
    body: Mutex<Option<Body>>,
    firings: AtomicU64,
    failures: AtomicU64,
    termination: Completion,
}

impl NodeCore {
    pub(crate) fn new(settings: NodeSettings) -> Arc<Self> {
        Arc::new(Self {
            id: NodeId::next(),
            name: settings.name,
            lifecycle: settings.lifecycle,
            firing_budget: settings.firing_budget.max(1),
            executor: settings.executor,
            failure_handler: settings.failure_handler,
            readiness: Arc::new(Readiness::new()),
            state: AtomicU8::new(NodeState::Created as u8),
            registry: Mutex::new(Vec::new()),
            pins: OnceLock::new(),
            body: Mutex::new(None),
            firings: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            termination: Completion::new(),
        })
    }

    pub(crate) fn state(&self) -> NodeState {
        NodeState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: NodeState) {
        self.state.store(state as u8, Ordering::Release);
    }

    pub(crate) fn firings(&self) -> u64 {
        self.firings.load(Ordering::Acquire)
    }

    pub(crate) fn failures(&self) -> u64 {
        self.failures.load(Ordering::Acquire)
    }

    pub(crate) fn blocked_pins(&self) -> u64 {
        self.readiness.blocked_pins()
    }

    pub(crate) fn pin_count(&self) -> usize {
        self.pins
            .get()
            .map_or_else(|| self.registry.lock().len(), |pins| pins.len())
    }

    fn error(&self, kind: ErrorKind) -> Error {
        Error::new(kind).with_context(ErrorContext::node(self.id))
    }

    /// Adds a pin. Only allowed before start.
    pub(crate) fn register<S: Storage>(&self, storage: S, blocked: bool) -> Result<Arc<Gate<S>>> {
        let mut registry = self.registry.lock();
        if self.state() != NodeState::Created {
            return Err(self
                .error(ErrorKind::RegistrationAfterStart)
                .with_message(format!("node '{}' is {}", self.name, self.state())));
        }
        let index = u32::try_from(registry.len())
            .map_err(|_| self.error(ErrorKind::InvalidArgument).with_message("too many pins"))?;
        let gate = Arc::new(Gate::new(
            self.id,
            PinIndex::new(index),
            Arc::clone(&self.readiness),
            storage,
            blocked,
        ));
        let slot: Arc<dyn PinSlot> = gate.clone();
        registry.push(slot);
        trace!(node = %self.id, pin = index, blocked, "pin registered");
        Ok(gate)
    }

    /// Installs the body and opens the control pin.
    pub(crate) fn start(self: &Arc<Self>, body: Body) -> Result<()> {
        {
            let mut registry = self.registry.lock();
            match self.state() {
                NodeState::Created => {}
                NodeState::Terminated => {
                    return Err(self
                        .error(ErrorKind::Closed)
                        .with_message("node stopped before start"));
                }
                state => {
                    return Err(self
                        .error(ErrorKind::InvalidStateTransition)
                        .with_message(format!("start on {state} node")));
                }
            }
            *self.body.lock() = Some(body);
            let pins = std::mem::take(&mut *registry).into_boxed_slice();
            if self.pins.set(pins).is_err() {
                return Err(Error::internal("pin table frozen twice"));
            }
            self.set_state(NodeState::Armed);
        }
        debug!(
            node = %self.id,
            name = %self.name,
            pins = self.pin_count(),
            lifecycle = ?self.lifecycle,
            "node started"
        );
        self.rearm();
        Ok(())
    }

    /// Acts on the outcome of a pin transition made by a producer.
    pub(crate) fn ignite(self: &Arc<Self>, ignition: Ignition) {
        if ignition.is_fire() {
            self.dispatch();
        }
    }

    fn dispatch(self: &Arc<Self>) {
        self.set_state(NodeState::Firing);
        trace!(node = %self.id, "firing claimed");
        self.executor.execute(Activation::new(Arc::clone(self)));
    }

    /// Opens the control pin and dispatches if every pin is already on.
    fn rearm(self: &Arc<Self>) {
        if self.arm() == Cycle::Again {
            self.dispatch();
        }
    }

    fn arm(&self) -> Cycle {
        self.set_state(NodeState::Armed);
        match self.readiness.arm() {
            Arm::Waiting => Cycle::Done,
            Arm::Fire => {
                self.set_state(NodeState::Firing);
                Cycle::Again
            }
            Arm::Stopped => {
                self.finish("stop requested");
                Cycle::Done
            }
            Arm::Terminated => Cycle::Done,
        }
    }

    /// Runs one firing: body, purge, then terminate or re-arm.
    pub(crate) fn fire_once(&self) -> Cycle {
        let cycle = self.firings.fetch_add(1, Ordering::AcqRel) + 1;
        self.set_state(NodeState::Firing);
        let span = debug_span!("firing", node = %self.id, name = %self.name, cycle);
        let _guard = span.enter();

        let (outcome, stop) = {
            let mut guard = self.body.lock();
            match guard.as_mut() {
                Some(body) => {
                    let mut firing = Firing::new(self, cycle);
                    let outcome = panic::catch_unwind(AssertUnwindSafe(|| body(&mut firing)));
                    (Some(outcome), firing.is_stopping())
                }
                None => (None, false),
            }
        };
        let Some(outcome) = outcome else {
            error!(node = %self.id, "activation without a body");
            self.finish("missing body");
            return Cycle::Done;
        };

        match outcome {
            Ok(Ok(())) => trace!(node = %self.id, cycle, "body returned"),
            Ok(Err(err)) => self.report_failure(&Error::body_failure(self.id, err)),
            Err(payload) => self.report_failure(&Error::body_panic(self.id, payload.as_ref())),
        }

        self.set_state(NodeState::Purging);
        if let Some(pins) = self.pins.get() {
            for pin in pins.iter() {
                pin.purge();
            }
        }

        if stop || self.lifecycle == Lifecycle::OneShot {
            self.finish(if stop { "body stopped" } else { "one-shot complete" });
            return Cycle::Done;
        }
        self.arm()
    }

    /// Hands the node back to its executor once the firing budget is spent.
    pub(crate) fn yield_to_executor(self: &Arc<Self>) {
        trace!(node = %self.id, budget = self.firing_budget, "firing budget spent");
        self.executor.execute(Activation::new(Arc::clone(self)));
    }

    fn report_failure(&self, err: &Error) {
        self.failures.fetch_add(1, Ordering::AcqRel);
        error!(node = %self.id, name = %self.name, error = %err, "node body failed");
        if let Some(handler) = &self.failure_handler {
            if panic::catch_unwind(AssertUnwindSafe(|| handler(err))).is_err() {
                error!(node = %self.id, name = %self.name, "failure handler panicked");
            }
        }
    }

    /// Requests termination; never interrupts a running body.
    pub(crate) fn stop(&self) {
        let unstarted = {
            let _registry = self.registry.lock();
            let unstarted = self.state() == NodeState::Created;
            if unstarted {
                self.readiness.terminate();
                self.set_state(NodeState::Terminated);
            }
            unstarted
        };
        if unstarted {
            self.finish("stopped before start");
            return;
        }
        match self.readiness.request_stop() {
            StopRequest::Immediate => self.finish("stopped"),
            StopRequest::Deferred => debug!(node = %self.id, "stop deferred to end of firing"),
            StopRequest::AlreadyTerminated => {}
        }
    }

    /// Final transition to `Terminated`.
    fn finish(&self, reason: &'static str) {
        self.readiness.terminate();
        self.set_state(NodeState::Terminated);
        let body = self.body.lock().take();
        drop(body);
        let pins = self
            .pins
            .get()
            .map_or_else(|| self.registry.lock().clone(), |pins| pins.to_vec());
        for pin in &pins {
            pin.discard();
        }
        debug!(
            node = %self.id,
            name = %self.name,
            firings = self.firings(),
            failures = self.failures(),
            reason,
            "node terminated"
        );
        self.termination.signal_done();
    }

    pub(crate) fn is_terminated(&self) -> bool {
        self.readiness.is_terminated()
    }

    pub(crate) fn await_termination(&self, timeout: Duration) -> bool {
        self.termination.wait_timeout(timeout)
    }

    pub(crate) fn join(&self) {
        self.termination.wait();
    }
}

impl std::fmt::Debug for NodeCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeCore")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("lifecycle", &self.lifecycle)
            .field("state", &self.state())
            .field("blocked_pins", &self.blocked_pins())
            .field("firings", &self.firings())
            .finish_non_exhaustive()
    }
}
