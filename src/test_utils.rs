//! Test utilities for pinflow.
//!
//! This module provides shared helpers for unit tests:
//! - Consistent tracing-based logging initialization
//! - Phase/section macros for readable test output
//! - A [`Collector`] port that records whatever is posted to it
//!
//! # Example
//! ```ignore
//! use pinflow::test_utils::{init_test_logging, Collector};
//! use pinflow::Post;
//!
//! init_test_logging();
//! let sink = Collector::new();
//! sink.post(7)?;
//! assert_eq!(sink.items(), vec![7]);
//! # Ok::<(), pinflow::Error>(())
//! ```

use std::sync::{Arc, Once};
use std::time::{Duration, Instant};

use parking_lot::{const_mutex, Condvar, Mutex, MutexGuard};
use tracing_subscriber::fmt::format::FmtSpan;

use crate::error::{BoxError, Result};
use crate::port::Post;

static INIT_LOGGING: Once = Once::new();
static ENV_LOCK: Mutex<()> = const_mutex(());

/// Initialize test logging with trace-level output.
///
/// Safe to call multiple times; only initializes once.
pub fn init_test_logging() {
    init_test_logging_with_level(tracing::Level::TRACE);
}

/// Initialize test logging with a custom level.
///
/// The first call wins; later calls are no-ops.
pub fn init_test_logging_with_level(level: tracing::Level) {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_test_writer()
            .with_file(true)
            .with_line_number(true)
            .with_target(true)
            .with_thread_ids(true)
            .with_span_events(FmtSpan::CLOSE)
            .with_ansi(false)
            .try_init();
    });
}

/// Acquire the global environment lock for tests that mutate env vars.
pub fn env_lock() -> MutexGuard<'static, ()> {
    ENV_LOCK.lock()
}

#[derive(Debug)]
struct Recorded<T> {
    items: Vec<T>,
    failures: Vec<String>,
}

/// A port that records every token and failure posted to it.
///
/// Clones share the same record, so one clone can be moved into a body while
/// the test keeps another.
#[derive(Debug)]
pub struct Collector<T> {
    record: Arc<(Mutex<Recorded<T>>, Condvar)>,
}

impl<T> Clone for Collector<T> {
    fn clone(&self) -> Self {
        Self {
            record: Arc::clone(&self.record),
        }
    }
}

impl<T> Default for Collector<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Collector<T> {
    /// Creates an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self {
            record: Arc::new((
                Mutex::new(Recorded {
                    items: Vec::new(),
                    failures: Vec::new(),
                }),
                Condvar::new(),
            )),
        }
    }

    /// Number of tokens received.
    #[must_use]
    pub fn len(&self) -> usize {
        self.record.0.lock().items.len()
    }

    /// Returns true if no token was received.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rendered failures received.
    #[must_use]
    pub fn failures(&self) -> Vec<String> {
        self.record.0.lock().failures.clone()
    }

    /// Blocks until at least `count` tokens arrived. Returns false on timeout.
    #[must_use]
    pub fn wait_for(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let (lock, condvar) = &*self.record;
        let mut record = lock.lock();
        while record.items.len() < count {
            if condvar.wait_until(&mut record, deadline).timed_out() {
                return record.items.len() >= count;
            }
        }
        true
    }
}

impl<T: Clone> Collector<T> {
    /// Tokens received so far, in arrival order.
    #[must_use]
    pub fn items(&self) -> Vec<T> {
        self.record.0.lock().items.clone()
    }
}

impl<T: Send> Post<T> for Collector<T> {
    fn post(&self, token: T) -> Result<()> {
        let (lock, condvar) = &*self.record;
        lock.lock().items.push(token);
        condvar.notify_all();
        Ok(())
    }

    fn post_failure(&self, failure: BoxError) -> Result<()> {
        let (lock, condvar) = &*self.record;
        lock.lock().failures.push(failure.to_string());
        condvar.notify_all();
        Ok(())
    }
}

/// Log a test phase transition with a visual separator.
#[macro_export]
macro_rules! test_phase {
    ($name:expr) => {
        tracing::info!(phase = %$name, "========================================");
        tracing::info!(phase = %$name, "TEST PHASE: {}", $name);
        tracing::info!(phase = %$name, "========================================");
    };
}

/// Log a section within a test phase.
#[macro_export]
macro_rules! test_section {
    ($name:expr) => {
        tracing::debug!(section = %$name, "--- {} ---", $name);
    };
}

/// Log test completion with summary.
#[macro_export]
macro_rules! test_complete {
    ($name:expr) => {
        tracing::info!(test = %$name, "test completed successfully: {}", $name);
    };
    ($name:expr, $($key:ident = $value:expr),* $(,)?) => {
        tracing::info!(
            test = %$name,
            $($key = %$value,)*
            "test completed successfully: {}",
            $name
        );
    };
}

/// Log before assertions for context.
#[macro_export]
macro_rules! assert_with_log {
    ($cond:expr, $msg:expr, $expected:expr, $actual:expr) => {
        tracing::debug!(
            expected = ?$expected,
            actual = ?$actual,
            "Asserting: {}",
            $msg
        );
        assert!($cond, "{}: expected {:?}, got {:?}", $msg, $expected, $actual);
    };
}
