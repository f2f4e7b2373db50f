//! Property-based tests for the firing protocol.
//!
//! # Post-order independence
//! - A node with N scalar pins fires once all N are filled, in any order
//! - Before the last post it has not fired
//!
//! # Stream ordering
//! - Tokens posted to a stream are observed in FIFO order
//! - Pushbacks redeliver the same token; the end marker is seen once
//!
//! # Semafor accounting
//! - Total firings equal total released permits

#[macro_use]
mod common;

use common::*;
use pinflow::{DirectExecutor, Node, Post};
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn arb_order() -> impl Strategy<Value = Vec<usize>> {
    (1usize..10).prop_flat_map(|n| Just((0..n).collect::<Vec<_>>()).prop_shuffle())
}

proptest! {
    #![proptest_config(test_proptest_config(200))]

    #[test]
    fn fires_once_after_last_post(order in arb_order()) {
        init_test_logging();
        let node = Node::builder("fan-in").executor(DirectExecutor).build();
        let mut pins = Vec::new();
        let mut ports = Vec::new();
        for _ in 0..order.len() {
            let (pin, port) = node.scalar::<usize>().expect("pin");
            pins.push(pin);
            ports.push(port);
        }
        let sink = Sink::new();
        let out = sink.clone();
        node.start(move |_| {
            let values = pins
                .iter()
                .map(|pin| pin.take())
                .collect::<Result<Vec<_>, _>>()?;
            out.post(values)?;
            Ok(())
        })
        .expect("start");

        for (posted, &index) in order.iter().enumerate() {
            prop_assert_eq!(node.firings(), 0);
            prop_assert_eq!(node.blocked_pins(), (order.len() - posted) as u64);
            ports[index].post(index * 10).expect("post");
        }

        prop_assert_eq!(node.firings(), 1);
        prop_assert!(node.is_terminated());
        let expected: Vec<usize> = (0..order.len()).map(|i| i * 10).collect();
        prop_assert_eq!(sink.items(), vec![expected]);
    }

    #[test]
    fn stream_is_fifo_with_pushbacks(
        tokens in prop::collection::vec(any::<u16>(), 0..40),
        pushback_mask in prop::collection::vec(any::<bool>(), 40),
    ) {
        init_test_logging();
        let node = Node::builder("reader").executor(DirectExecutor).actor().build();
        let (input, port) = node.stream::<u16>().expect("stream");
        let observed = Sink::new();
        let out = observed.clone();
        let firing = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&firing);
        // bound every run of pushbacks
        let mut pushback_mask = pushback_mask;
        pushback_mask[39] = false;
        let mask = pushback_mask.clone();
        node.start(move |fire| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            let token = input.get()?;
            out.post(token)?;
            match token {
                Some(_) if mask[n % mask.len()] => input.pushback()?,
                Some(_) => {}
                None => fire.stop(),
            }
            Ok(())
        })
        .expect("start");

        for &token in &tokens {
            port.post(token).expect("post");
        }
        port.close().expect("close");

        let observed = observed.items();
        let delivered: Vec<u16> = {
            let mut deduped = Vec::new();
            let mut n = 0;
            while n < observed.len() {
                if let Some(token) = observed[n] {
                    deduped.push(token);
                    // skip the redeliveries caused by pushback
                    while pushback_mask[n % pushback_mask.len()] {
                        n += 1;
                        prop_assert_eq!(observed[n], Some(token));
                    }
                }
                n += 1;
            }
            deduped
        };
        prop_assert_eq!(delivered, tokens);
        prop_assert_eq!(observed.iter().filter(|t| t.is_none()).count(), 1);
        prop_assert_eq!(observed.last().copied(), Some(None));
        prop_assert!(node.is_terminated());
    }

    #[test]
    fn firings_match_released_permits(releases in prop::collection::vec(0i64..5, 1..20)) {
        init_test_logging();
        let node = Node::builder("metered").executor(DirectExecutor).actor().build();
        let (permits, permits_port) = node.semafor(0).expect("semafor");
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        node.start(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .expect("start");

        for &n in &releases {
            permits_port.release(n).expect("release");
            prop_assert_eq!(permits.permits(), 0);
        }
        let total: i64 = releases.iter().sum();
        prop_assert_eq!(fired.load(Ordering::SeqCst) as i64, total);
    }
}
