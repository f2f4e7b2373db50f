//! Executors that run on the calling thread.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};

use super::Executor;
use crate::node::Activation;
use crate::tracing_compat::{error, trace};

/// Runs each activation immediately, nested inside the call that claimed it.
///
/// Long chains of nodes recurse once per hop. Prefer [`Trampoline`] unless
/// the nesting is wanted, e.g. to observe a firing's effects right after a
/// post returns even when the post happens inside another body.
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectExecutor;

impl Executor for DirectExecutor {
    fn execute(&self, activation: Activation) {
        activation.run();
    }
}

thread_local! {
    static PENDING: RefCell<Option<VecDeque<Activation>>> = const { RefCell::new(None) };
}

/// Runs activations on the calling thread without nesting.
///
/// The outermost `execute` on a thread runs its activation and then drains
/// everything queued by bodies it triggered, in FIFO order. A post made
/// outside any body therefore returns only after all downstream firings on
/// this executor are done.
#[derive(Debug, Default, Clone, Copy)]
pub struct Trampoline;

impl Trampoline {
    /// Returns true if the current thread is draining a trampoline.
    #[must_use]
    pub fn is_draining() -> bool {
        PENDING.with(|pending| pending.borrow().is_some())
    }
}

fn drain(first: Activation) {
    first.run();
    while let Some(next) =
        PENDING.with(|pending| pending.borrow_mut().as_mut().and_then(VecDeque::pop_front))
    {
        next.run();
    }
}

impl Executor for Trampoline {
    fn execute(&self, activation: Activation) {
        let first = PENDING.with(|pending| {
            let mut pending = pending.borrow_mut();
            if let Some(queue) = pending.as_mut() {
                trace!(node = %activation.node_id(), depth = queue.len(), "activation queued");
                queue.push_back(activation);
                None
            } else {
                *pending = Some(VecDeque::new());
                Some(activation)
            }
        });
        let Some(first) = first else {
            return;
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| drain(first)));
        let leftover = PENDING
            .with(|pending| pending.borrow_mut().take())
            .unwrap_or_default();
        if let Err(payload) = outcome {
            // claimed firings still run, each on a fresh trampoline
            error!(queued = leftover.len(), "trampoline drain panicked");
            for activation in leftover {
                if panic::catch_unwind(AssertUnwindSafe(|| self.execute(activation))).is_err() {
                    error!("queued activation panicked after drain failure");
                }
            }
            panic::resume_unwind(payload);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Node;
    use crate::pin::ScalarPort;
    use crate::test_utils::init_test_logging;
    use crate::Post;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Builds a chain of `len` forwarding nodes ending in a recorder.
    fn chain<E: Executor + Copy + 'static>(
        executor: E,
        len: usize,
        log: &Arc<Mutex<Vec<(usize, bool)>>>,
    ) -> ScalarPort<u32> {
        let sink = Node::builder("sink").executor(executor).build();
        let (input, mut head) = sink.scalar::<u32>().expect("sink pin");
        let record = Arc::clone(log);
        sink.start(move |_| {
            input.take()?;
            record.lock().push((usize::MAX, Trampoline::is_draining()));
            Ok(())
        })
        .expect("start sink");

        for hop in 0..len {
            let node = Node::builder(format!("hop-{hop}")).executor(executor).build();
            let (input, port) = node.scalar::<u32>().expect("hop pin");
            let next = head;
            let record = Arc::clone(log);
            node.start(move |_| {
                let value = input.take()?;
                next.post(value + 1)?;
                record.lock().push((hop, Trampoline::is_draining()));
                Ok(())
            })
            .expect("start hop");
            head = port;
        }
        head
    }

    #[test]
    fn direct_executor_nests() {
        init_test_logging();
        crate::test_phase!("direct_executor_nests");
        let log = Arc::new(Mutex::new(Vec::new()));
        let head = chain(DirectExecutor, 3, &log);
        head.post(0).expect("post");
        let order: Vec<usize> = log.lock().iter().map(|(hop, _)| *hop).collect();
        // the sink records first because each hop posts before recording
        assert_eq!(order, vec![usize::MAX, 0, 1, 2]);
        assert!(!Trampoline::is_draining());
        crate::test_complete!("direct_executor_nests");
    }

    #[test]
    fn trampoline_flattens() {
        init_test_logging();
        crate::test_phase!("trampoline_flattens");
        let log = Arc::new(Mutex::new(Vec::new()));
        let head = chain(Trampoline, 3, &log);
        head.post(0).expect("post");
        let entries = log.lock().clone();
        let order: Vec<usize> = entries.iter().map(|(hop, _)| *hop).collect();
        assert_eq!(order, vec![2, 1, 0, usize::MAX]);
        assert!(entries.iter().all(|(_, draining)| *draining));
        assert!(!Trampoline::is_draining());
        crate::test_complete!("trampoline_flattens");
    }

    #[test]
    fn trampoline_survives_deep_chains() {
        init_test_logging();
        let log = Arc::new(Mutex::new(Vec::new()));
        let head = chain(Trampoline, 10_000, &log);
        head.post(0).expect("post");
        assert_eq!(log.lock().len(), 10_001);
    }

    static ARMED: std::sync::atomic::AtomicBool = std::sync::atomic::AtomicBool::new(true);

    /// Panics the first time it is dropped.
    struct Volatile;

    impl Drop for Volatile {
        fn drop(&mut self) {
            if ARMED.swap(false, std::sync::atomic::Ordering::SeqCst) {
                panic!("token drop panicked");
            }
        }
    }

    #[test]
    fn trampoline_runs_queued_firings_after_panic() {
        init_test_logging();
        crate::test_phase!("trampoline_runs_queued_firings_after_panic");
        let downstream = Node::builder("downstream").executor(Trampoline).build();
        let (input, input_port) = downstream.scalar::<u8>().expect("pin");
        downstream
            .start(move |_| {
                input.take()?;
                Ok(())
            })
            .expect("start downstream");

        let upstream = Node::builder("upstream").executor(Trampoline).build();
        let (_volatile, volatile_port) = upstream.scalar::<Volatile>().expect("pin");
        upstream
            .start(move |_| {
                // queued behind the running activation
                input_port.post(1)?;
                Ok(())
            })
            .expect("start upstream");

        // purging the untouched token drops it and panics outside the body
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| volatile_port.post(Volatile)));
        assert!(outcome.is_err(), "panic resumed to the caller");
        crate::assert_with_log!(
            downstream.firings() == 1,
            "queued firing still ran",
            1,
            downstream.firings()
        );
        assert!(downstream.is_terminated());
        assert!(!Trampoline::is_draining());
        crate::test_complete!("trampoline_runs_queued_firings_after_panic");
    }
}
