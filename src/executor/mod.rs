//! Executors run node activations.
//!
//! The kernel never spawns threads on its own: whenever a firing is claimed,
//! the resulting [`Activation`] is handed to the node's [`Executor`]. Three
//! are provided:
//!
//! - [`DirectExecutor`] runs the activation on the posting thread, nested
//!   inside the `post` call.
//! - [`Trampoline`] also runs on the posting thread, but queues activations
//!   produced while another one is running, so chains of nodes do not grow
//!   the stack. This is the default.
//! - [`WorkerPool`] runs activations on a bounded set of OS threads.
//!
//! Any `Fn(Activation) + Send + Sync` closure is an executor too, which is
//! how nodes are wired into foreign runtimes.

mod direct;
mod pool;

pub use direct::{DirectExecutor, Trampoline};
pub use pool::{JobHandle, WorkerPool, WorkerPoolHandle};

use crate::node::Activation;

/// Runs activations to completion.
///
/// Implementations must eventually call [`Activation::run`] exactly once for
/// every activation they accept. Dropping one leaves its node stuck in the
/// firing state.
pub trait Executor: Send + Sync {
    /// Schedules `activation`.
    fn execute(&self, activation: Activation);
}

impl<F> Executor for F
where
    F: Fn(Activation) + Send + Sync,
{
    fn execute(&self, activation: Activation) {
        self(activation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Node;
    use crate::test_utils::init_test_logging;
    use crate::Post;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn closure_executor() {
        init_test_logging();
        crate::test_phase!("closure_executor");
        let scheduled = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&scheduled);
        let node = Node::builder("closure")
            .executor(move |activation: Activation| {
                seen.fetch_add(1, Ordering::SeqCst);
                activation.run();
            })
            .build();
        let (x, x_port) = node.scalar::<u8>().expect("x");
        node.start(move |_| {
            x.take()?;
            Ok(())
        })
        .expect("start");
        x_port.post(1).expect("post");
        assert_eq!(scheduled.load(Ordering::SeqCst), 1);
        assert!(node.is_terminated());
        crate::test_complete!("closure_executor");
    }
}
