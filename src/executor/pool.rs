//! Worker pool for running activations on OS threads.
//!
//! # Design
//!
//! Threads are spawned lazily up to `max_threads`: a submission spawns a new
//! worker when every live worker is busy and work is pending. Workers above
//! `min_threads` retire after sitting idle for `idle_timeout`.
//!
//! Jobs are FIFO. A job that panics is caught and logged; the worker keeps
//! going. Body panics never get this far since the firing cycle catches them
//! itself.
//!
//! Once shut down the pool accepts no new threads. Work submitted after that
//! runs on the submitting thread so nodes and job handles still complete.
//! A worker only exits on shutdown after it found the queue empty, and a
//! submitter that sees the shutdown flag after pushing drains the queue
//! itself, so no job is stranded between the two.
//!
//! # Example
//!
//! ```
//! use pinflow::{Node, Post, WorkerPool};
//! use std::time::Duration;
//!
//! let pool = WorkerPool::new(1, 4);
//! let node = Node::builder("square").executor(pool.handle()).build();
//! let (x, x_port) = node.scalar::<u64>()?;
//! node.start(move |_| {
//!     let x = x.take()?;
//!     assert_eq!(x * x, 81);
//!     Ok(())
//! })?;
//! x_port.post(9)?;
//! assert!(node.await_termination(Duration::from_secs(5)));
//! # Ok::<(), pinflow::Error>(())
//! ```

use crossbeam_queue::SegQueue;
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle as ThreadJoinHandle};
use std::time::{Duration, Instant};

use super::Executor;
use crate::config::PoolConfig;
use crate::node::Activation;
use crate::tracing_compat::{debug, error, trace, warn};
use crate::util::Completion;

type ThreadHook = Arc<dyn Fn() + Send + Sync>;

/// A cloneable handle to a [`WorkerPool`]. This is what nodes hold.
#[derive(Clone)]
pub struct WorkerPoolHandle {
    inner: Arc<PoolInner>,
}

impl fmt::Debug for WorkerPoolHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPoolHandle")
            .field(
                "active_threads",
                &self.inner.active_threads.load(Ordering::Relaxed),
            )
            .field("pending_jobs", &self.inner.pending_count.load(Ordering::Relaxed))
            .finish()
    }
}

/// A pool of worker threads.
///
/// Dropping the pool shuts it down and waits up to five seconds for workers
/// to drain the queue.
pub struct WorkerPool {
    inner: Arc<PoolInner>,
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("min_threads", &self.inner.min_threads)
            .field("max_threads", &self.inner.max_threads)
            .field(
                "active_threads",
                &self.inner.active_threads.load(Ordering::Relaxed),
            )
            .field("pending_jobs", &self.inner.pending_count.load(Ordering::Relaxed))
            .field("thread_handles", &self.inner.thread_handles.lock().len())
            .finish()
    }
}

struct PoolInner {
    min_threads: usize,
    max_threads: usize,
    /// Live worker threads.
    active_threads: AtomicUsize,
    /// Workers currently running a job.
    busy_threads: AtomicUsize,
    /// Jobs queued but not yet picked up.
    pending_count: AtomicUsize,
    /// Used only to number threads.
    spawned_total: AtomicU64,
    queue: SegQueue<Job>,
    shutdown: AtomicBool,
    condvar: Condvar,
    mutex: Mutex<()>,
    idle_timeout: Duration,
    thread_name_prefix: String,
    on_thread_start: Option<ThreadHook>,
    on_thread_stop: Option<ThreadHook>,
    thread_handles: Mutex<Vec<ThreadJoinHandle<()>>>,
}

enum Work {
    Activation(Activation),
    Task(Box<dyn FnOnce() + Send + 'static>),
}

struct Job {
    work: Work,
    completion: Option<Arc<Completion>>,
}

impl Job {
    fn run(self) {
        match self.work {
            Work::Activation(activation) => activation.run(),
            Work::Task(task) => task(),
        }
    }
}

/// Completion handle for a closure submitted with [`WorkerPool::spawn`].
pub struct JobHandle {
    completion: Arc<Completion>,
}

impl JobHandle {
    /// Returns true once the job ran (or panicked).
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.completion.is_done()
    }

    /// Blocks until the job ran.
    pub fn wait(&self) {
        self.completion.wait();
    }

    /// Blocks until the job ran or the timeout elapsed. Returns `true` if
    /// the job ran.
    #[must_use]
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.completion.wait_timeout(timeout)
    }
}

impl fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobHandle")
            .field("done", &self.is_done())
            .finish()
    }
}

impl WorkerPool {
    /// Creates a pool with the given thread limits and default options.
    ///
    /// `max_threads` is raised to at least one and to at least `min_threads`.
    #[must_use]
    pub fn new(min_threads: usize, max_threads: usize) -> Self {
        Self::with_config(&PoolConfig {
            min_threads,
            max_threads,
            ..PoolConfig::default()
        })
    }

    /// Creates a pool from configuration.
    #[must_use]
    pub fn with_config(config: &PoolConfig) -> Self {
        Self::build(config, None, None)
    }

    /// Creates a pool whose workers run `on_start` and `on_stop` on their
    /// own thread when they start and exit.
    #[must_use]
    pub fn with_hooks<S, T>(config: &PoolConfig, on_start: S, on_stop: T) -> Self
    where
        S: Fn() + Send + Sync + 'static,
        T: Fn() + Send + Sync + 'static,
    {
        Self::build(config, Some(Arc::new(on_start)), Some(Arc::new(on_stop)))
    }

    fn build(
        config: &PoolConfig,
        on_thread_start: Option<ThreadHook>,
        on_thread_stop: Option<ThreadHook>,
    ) -> Self {
        let config = config.clone().normalized();
        let inner = Arc::new(PoolInner {
            min_threads: config.min_threads,
            max_threads: config.max_threads,
            active_threads: AtomicUsize::new(0),
            busy_threads: AtomicUsize::new(0),
            pending_count: AtomicUsize::new(0),
            spawned_total: AtomicU64::new(0),
            queue: SegQueue::new(),
            shutdown: AtomicBool::new(false),
            condvar: Condvar::new(),
            mutex: Mutex::new(()),
            idle_timeout: config.idle_timeout,
            thread_name_prefix: config.thread_name_prefix,
            on_thread_start,
            on_thread_stop,
            thread_handles: Mutex::new(Vec::with_capacity(config.max_threads)),
        });

        for _ in 0..inner.min_threads {
            spawn_thread_on_inner(&inner);
        }
        debug!(
            min_threads = inner.min_threads,
            max_threads = inner.max_threads,
            "worker pool created"
        );

        Self { inner }
    }

    /// Returns a cloneable handle, usable as a node executor.
    #[must_use]
    pub fn handle(&self) -> WorkerPoolHandle {
        WorkerPoolHandle {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Runs a closure on a worker.
    pub fn spawn<F>(&self, f: F) -> JobHandle
    where
        F: FnOnce() + Send + 'static,
    {
        spawn_task_on_inner(&self.inner, Box::new(f))
    }

    /// Jobs waiting for a worker.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.pending_count.load(Ordering::Relaxed)
    }

    /// Live worker threads.
    #[must_use]
    pub fn active_threads(&self) -> usize {
        self.inner.active_threads.load(Ordering::Relaxed)
    }

    /// Workers currently running a job.
    #[must_use]
    pub fn busy_threads(&self) -> usize {
        self.inner.busy_threads.load(Ordering::Relaxed)
    }

    /// Waits until the queue is empty and no worker is busy.
    ///
    /// Returns `false` if the timeout elapsed first. Work submitted
    /// concurrently may keep the pool from ever going idle.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.inner.pending_count.load(Ordering::SeqCst) == 0
                && self.inner.busy_threads.load(Ordering::SeqCst) == 0
                && self.inner.queue.is_empty()
            {
                return true;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            thread::sleep(Duration::from_millis(1).min(remaining));
        }
    }

    /// Returns `true` once [`shutdown`](Self::shutdown) was called.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.inner.shutdown.load(Ordering::Acquire)
    }

    /// Stops spawning threads. Queued jobs still run.
    pub fn shutdown(&self) {
        if !self.inner.shutdown.swap(true, Ordering::SeqCst) {
            debug!("worker pool shutting down");
        }
        notify_all(&self.inner);
    }

    /// Shuts down and waits for every worker to exit.
    ///
    /// Returns `false` if the timeout elapsed first.
    pub fn shutdown_and_wait(&self, timeout: Duration) -> bool {
        self.shutdown();

        let deadline = Instant::now() + timeout;
        while self.inner.active_threads.load(Ordering::Acquire) > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            notify_all(&self.inner);
            thread::sleep(Duration::from_millis(10).min(remaining));
        }

        let handles: Vec<_> = self.inner.thread_handles.lock().drain(..).collect();
        for handle in handles {
            if handle.join().is_err() {
                warn!("worker thread exited by panic");
            }
        }
        true
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if !self.shutdown_and_wait(Duration::from_secs(5)) {
            warn!(
                active_threads = self.active_threads(),
                "worker pool dropped with threads still running"
            );
        }
    }
}

impl WorkerPoolHandle {
    /// Runs a closure on a worker.
    pub fn spawn<F>(&self, f: F) -> JobHandle
    where
        F: FnOnce() + Send + 'static,
    {
        spawn_task_on_inner(&self.inner, Box::new(f))
    }

    /// Jobs waiting for a worker.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.pending_count.load(Ordering::Relaxed)
    }

    /// Live worker threads.
    #[must_use]
    pub fn active_threads(&self) -> usize {
        self.inner.active_threads.load(Ordering::Relaxed)
    }

    /// Returns `true` once the pool was shut down.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.inner.shutdown.load(Ordering::Acquire)
    }
}

impl Executor for WorkerPoolHandle {
    fn execute(&self, activation: Activation) {
        if self.inner.shutdown.load(Ordering::SeqCst) {
            trace!(node = %activation.node_id(), "pool shut down, running inline");
            activation.run();
            return;
        }
        submit(
            &self.inner,
            Job {
                work: Work::Activation(activation),
                completion: None,
            },
        );
    }
}

fn spawn_task_on_inner(
    inner: &Arc<PoolInner>,
    task: Box<dyn FnOnce() + Send + 'static>,
) -> JobHandle {
    let completion = Arc::new(Completion::new());
    submit(
        inner,
        Job {
            work: Work::Task(task),
            completion: Some(Arc::clone(&completion)),
        },
    );
    JobHandle { completion }
}

fn submit(inner: &Arc<PoolInner>, job: Job) {
    inner.pending_count.fetch_add(1, Ordering::SeqCst);
    inner.queue.push(job);
    if inner.shutdown.load(Ordering::SeqCst) {
        drain_inline(inner);
        return;
    }
    maybe_spawn_thread_on_inner(inner);
    let _guard = inner.mutex.lock();
    inner.condvar.notify_one();
}

/// Runs queued jobs on the calling thread once no new workers can start.
fn drain_inline(inner: &PoolInner) {
    while let Some(job) = inner.queue.pop() {
        trace!("pool shut down, running queued job inline");
        run_job(inner, job);
    }
}

fn run_job(inner: &PoolInner, job: Job) {
    inner.busy_threads.fetch_add(1, Ordering::SeqCst);
    inner.pending_count.fetch_sub(1, Ordering::SeqCst);
    let completion = job.completion.clone();
    if panic::catch_unwind(AssertUnwindSafe(|| job.run())).is_err() {
        error!("worker pool job panicked");
    }
    inner.busy_threads.fetch_sub(1, Ordering::SeqCst);
    if let Some(completion) = completion {
        completion.signal_done();
    }
}

fn notify_all(inner: &PoolInner) {
    let _guard = inner.mutex.lock();
    inner.condvar.notify_all();
}

fn spawn_thread_on_inner(inner: &Arc<PoolInner>) {
    if inner.shutdown.load(Ordering::Acquire) {
        return;
    }
    let worker = Arc::clone(inner);
    inner.active_threads.fetch_add(1, Ordering::Relaxed);
    let thread_id = inner.spawned_total.fetch_add(1, Ordering::Relaxed);
    let name = format!("{}-worker-{}", inner.thread_name_prefix, thread_id);

    let spawned = thread::Builder::new().name(name).spawn(move || {
        if let Some(callback) = &worker.on_thread_start {
            callback();
        }
        worker_loop(&worker);
        if let Some(callback) = &worker.on_thread_stop {
            callback();
        }
        worker.active_threads.fetch_sub(1, Ordering::AcqRel);
        // a job may have been queued while this worker was retiring
        if !worker.queue.is_empty() {
            if worker.shutdown.load(Ordering::SeqCst) {
                drain_inline(&worker);
            } else {
                maybe_spawn_thread_on_inner(&worker);
            }
        }
    });

    match spawned {
        Ok(handle) => inner.thread_handles.lock().push(handle),
        Err(err) => {
            inner.active_threads.fetch_sub(1, Ordering::AcqRel);
            error!(error = %err, "failed to spawn worker thread");
        }
    }
}

fn maybe_spawn_thread_on_inner(inner: &Arc<PoolInner>) {
    let active = inner.active_threads.load(Ordering::Relaxed);
    let busy = inner.busy_threads.load(Ordering::Relaxed);
    let pending = inner.pending_count.load(Ordering::Relaxed);

    if active < inner.max_threads && busy >= active && pending > 0 {
        spawn_thread_on_inner(inner);
    }
}

fn worker_loop(inner: &PoolInner) {
    loop {
        if let Some(job) = inner.queue.pop() {
            run_job(inner, job);
            continue;
        }

        // exit only after seeing the flag and then an empty queue
        if inner.shutdown.load(Ordering::SeqCst) {
            if inner.queue.is_empty() {
                break;
            }
            continue;
        }

        let mut guard = inner.mutex.lock();
        if !inner.queue.is_empty() || inner.shutdown.load(Ordering::Acquire) {
            continue;
        }
        if inner.active_threads.load(Ordering::Relaxed) > inner.min_threads {
            let timed_out = inner
                .condvar
                .wait_for(&mut guard, inner.idle_timeout)
                .timed_out();
            if timed_out
                && inner.queue.is_empty()
                && inner.active_threads.load(Ordering::Relaxed) > inner.min_threads
            {
                trace!("idle worker retiring");
                break;
            }
        } else {
            inner.condvar.wait(&mut guard);
        }
    }
}
