//! End-to-end actor scenarios.
//!
//! - a counting actor fed [1, 2, 3] then closed reports 3, completes once,
//!   and rejects later posts with `Closed`
//! - an actor pipeline across a worker pool preserves per-producer order
//! - pushback redelivers the identical token without a new post

#[macro_use]
mod common;

use common::*;
use pinflow::{
    spawn_actor, Actor, BoxError, ErrorKind, Node, Post, Trampoline, WorkerPool,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(10);

struct Counting {
    count: usize,
    completions: Arc<AtomicUsize>,
}

impl Actor for Counting {
    type Message = u32;

    fn handle(&mut self, _msg: u32) -> Result<(), BoxError> {
        self.count += 1;
        Ok(())
    }

    fn on_completed(&mut self) {
        self.completions.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn counting_actor_completes_once() {
    init_test_logging();
    test_phase!("counting_actor_completes_once");
    let completions = Arc::new(AtomicUsize::new(0));
    let handle = spawn_actor(
        Counting {
            count: 0,
            completions: Arc::clone(&completions),
        },
        Node::builder("counting").executor(Trampoline),
    )
    .expect("spawn");

    for msg in [1, 2, 3] {
        handle.post(msg).expect("post");
    }
    handle.close().expect("close");

    let actor = handle.join(TIMEOUT).expect("actor terminated");
    assert_with_log!(actor.count == 3, "final count", 3, actor.count);
    assert_eq!(completions.load(Ordering::SeqCst), 1);

    let err = handle.post(4).expect_err("post after completion");
    assert_eq!(err.kind(), ErrorKind::Closed);
    assert_eq!(completions.load(Ordering::SeqCst), 1);
    test_complete!("counting_actor_completes_once");
}

struct Doubler<P> {
    next: P,
}

impl<P: Post<u64> + 'static> Actor for Doubler<P> {
    type Message = u64;

    fn handle(&mut self, msg: u64) -> Result<(), BoxError> {
        self.next.post(msg * 2)?;
        Ok(())
    }
}

#[test]
fn pipeline_across_pool_preserves_producer_order() {
    init_test_logging();
    test_phase!("pipeline_across_pool_preserves_producer_order");
    let pool = WorkerPool::new(2, 4);
    let sink = Sink::new();

    let last = spawn_actor(
        Doubler { next: sink.clone() },
        Node::builder("stage-2").executor(pool.handle()),
    )
    .expect("spawn stage 2");
    let first = spawn_actor(
        Doubler {
            next: last.sender(),
        },
        Node::builder("stage-1").executor(pool.handle()),
    )
    .expect("spawn stage 1");

    let producers: Vec<_> = (0..3u64)
        .map(|p| {
            let sender = first.sender();
            thread::spawn(move || {
                for i in 0..100 {
                    sender.post(p * 1000 + i).expect("post");
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().expect("producer panicked");
    }

    assert!(sink.wait_for(300, TIMEOUT));
    first.close().expect("close stage 1");
    assert!(first.join(TIMEOUT).is_some());
    last.close().expect("close stage 2");
    assert!(last.join(TIMEOUT).is_some());

    let items = sink.items();
    for p in 0..3u64 {
        let ours: Vec<u64> = items
            .iter()
            .copied()
            .filter(|v| v / 4000 == p)
            .collect();
        let expected: Vec<u64> = (0..100).map(|i| (p * 1000 + i) * 4).collect();
        assert_eq!(ours, expected, "producer {p} order");
    }
    test_complete!("pipeline_across_pool_preserves_producer_order", items = 300);
}

#[test]
fn pushback_redelivers_identical_token() {
    init_test_logging();
    test_phase!("pushback_redelivers_identical_token");
    let node = Node::builder("retry").executor(Trampoline).actor().build();
    let (job, job_port) = node.scalar::<String>().expect("job");
    let (_tick, tick_port) = node.semafor(0).expect("tick");
    let attempts = Sink::new();
    let seen = attempts.clone();
    node.start(move |_| {
        let current = job.get()?;
        seen.post(current)?;
        if seen.items().len() < 3 {
            job.pushback()?;
        }
        Ok(())
    })
    .expect("start");

    job_port.post("payload".to_string()).expect("post");
    tick_port.release(5).expect("release");

    assert_eq!(attempts.items(), vec!["payload"; 3]);
    assert!(!job_port.is_occupied(), "slot cleared after last attempt");
    test_complete!("pushback_redelivers_identical_token");
}
