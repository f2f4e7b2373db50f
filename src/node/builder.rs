//! Builder for [`Node`].

use std::fmt;
use std::sync::Arc;

use super::inner::{FailureHandler, NodeCore, NodeSettings};
use super::Node;
use crate::config::KernelConfig;
use crate::error::Error;
use crate::executor::{Executor, Trampoline};
use crate::types::Lifecycle;

/// Configures a node before any pin is registered.
///
/// ```
/// use pinflow::{Node, WorkerPool};
///
/// let pool = WorkerPool::new(1, 4);
/// let node = Node::builder("resizer")
///     .actor()
///     .executor(pool.handle())
///     .firing_budget(16)
///     .build();
/// assert_eq!(node.name(), "resizer");
/// ```
#[must_use]
pub struct NodeBuilder {
    name: String,
    lifecycle: Lifecycle,
    executor: Option<Arc<dyn Executor>>,
    firing_budget: u32,
    failure_handler: Option<FailureHandler>,
}

impl NodeBuilder {
    /// Creates a one-shot builder with default settings.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lifecycle: Lifecycle::OneShot,
            executor: None,
            firing_budget: KernelConfig::DEFAULT_FIRING_BUDGET,
            failure_handler: None,
        }
    }

    /// Sets the lifecycle.
    pub fn lifecycle(mut self, lifecycle: Lifecycle) -> Self {
        self.lifecycle = lifecycle;
        self
    }

    /// Re-arm after every firing until stopped.
    pub fn actor(self) -> Self {
        self.lifecycle(Lifecycle::Actor)
    }

    /// Terminate after the first firing.
    pub fn one_shot(self) -> Self {
        self.lifecycle(Lifecycle::OneShot)
    }

    /// Runs activations on `executor`.
    pub fn executor<E: Executor + 'static>(self, executor: E) -> Self {
        self.shared_executor(Arc::new(executor))
    }

    /// Runs activations on an executor shared with other nodes.
    pub fn shared_executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Maximum consecutive in-place firings before yielding to the executor.
    ///
    /// Zero is treated as one.
    pub fn firing_budget(mut self, budget: u32) -> Self {
        self.firing_budget = budget;
        self
    }

    /// Applies kernel-wide settings.
    pub fn config(mut self, config: &KernelConfig) -> Self {
        self.firing_budget = config.firing_budget;
        self
    }

    /// Called with every body failure or panic, on the firing thread.
    pub fn on_failure<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Error) + Send + Sync + 'static,
    {
        self.failure_handler = Some(Arc::new(handler));
        self
    }

    /// Creates the node in the `Created` state.
    pub fn build(self) -> Node {
        let executor = self
            .executor
            .unwrap_or_else(|| Arc::new(Trampoline) as Arc<dyn Executor>);
        Node::from_core(NodeCore::new(NodeSettings {
            name: Arc::from(self.name),
            lifecycle: self.lifecycle,
            firing_budget: self.firing_budget,
            executor,
            failure_handler: self.failure_handler,
        }))
    }
}

impl fmt::Debug for NodeBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeBuilder")
            .field("name", &self.name)
            .field("lifecycle", &self.lifecycle)
            .field("firing_budget", &self.firing_budget)
            .field("has_executor", &self.executor.is_some())
            .field("has_failure_handler", &self.failure_handler.is_some())
            .finish()
    }
}
