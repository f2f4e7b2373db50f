//! One-shot completion flag with blocking waiters.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// A latch that flips once from pending to done.
#[derive(Debug, Default)]
pub(crate) struct Completion {
    done: AtomicBool,
    condvar: Condvar,
    mutex: Mutex<()>,
}

impl Completion {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn signal_done(&self) {
        self.done.store(true, Ordering::Release);
        let _guard = self.mutex.lock();
        self.condvar.notify_all();
    }

    pub(crate) fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    pub(crate) fn wait(&self) {
        if self.is_done() {
            return;
        }
        let mut guard = self.mutex.lock();
        while !self.is_done() {
            self.condvar.wait(&mut guard);
        }
    }

    /// Returns `true` if done before the timeout elapsed.
    pub(crate) fn wait_timeout(&self, timeout: Duration) -> bool {
        if self.is_done() {
            return true;
        }
        let deadline = Instant::now() + timeout;
        let mut guard = self.mutex.lock();
        while !self.is_done() {
            if self.condvar.wait_until(&mut guard, deadline).timed_out() {
                return self.is_done();
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn wait_returns_after_signal() {
        let completion = Arc::new(Completion::new());
        let signaller = Arc::clone(&completion);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            signaller.signal_done();
        });
        completion.wait();
        assert!(completion.is_done());
        handle.join().expect("signaller panicked");
    }

    #[test]
    fn wait_timeout_expires() {
        let completion = Completion::new();
        assert!(!completion.wait_timeout(Duration::from_millis(10)));
        completion.signal_done();
        assert!(completion.wait_timeout(Duration::from_millis(10)));
    }
}
