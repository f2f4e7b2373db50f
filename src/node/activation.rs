//! The unit of work handed to an executor.

use std::fmt;
use std::sync::Arc;

use super::inner::{Cycle, NodeCore};
use crate::types::NodeId;

/// One claimed firing of a node.
///
/// Created by the thread that observed the last pin turning on (or by the
/// re-arm after purge) and passed to the node's [`Executor`](crate::Executor).
/// [`run`](Self::run) executes the body, purges every pin in declaration
/// order, then terminates the node or re-arms it. When re-arming finds every
/// pin still on, the activation fires again in place, up to the node's firing
/// budget, after which it resubmits itself to the executor.
#[must_use = "an activation that is dropped without running leaves its node firing forever"]
pub struct Activation {
    node: Arc<NodeCore>,
}

impl Activation {
    pub(crate) fn new(node: Arc<NodeCore>) -> Self {
        Self { node }
    }

    /// Node this activation belongs to.
    #[must_use]
    pub fn node_id(&self) -> NodeId {
        self.node.id
    }

    /// Name of the node.
    #[must_use]
    pub fn node_name(&self) -> &str {
        &self.node.name
    }

    /// Runs the firing to completion on the calling thread.
    pub fn run(self) {
        let mut budget = self.node.firing_budget;
        loop {
            if self.node.fire_once() == Cycle::Done {
                return;
            }
            budget -= 1;
            if budget == 0 {
                self.node.yield_to_executor();
                return;
            }
        }
    }
}

impl fmt::Debug for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Activation")
            .field("node", &self.node.id)
            .field("name", &self.node.name)
            .finish()
    }
}
