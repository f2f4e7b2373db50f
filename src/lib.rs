//! Pinflow: a dataflow concurrency kernel built from pins and nodes.
//!
//! # Overview
//!
//! A [`Node`] is a procedure with a fixed, ordered set of input pins. Each pin
//! is a binary gate: blocked until a producer delivers a token, unblocked
//! after. When every pin of an armed node is unblocked the node fires exactly
//! once: its body runs on the node's [`Executor`], then every pin is purged.
//! One-shot nodes terminate after that; actor nodes re-arm and wait for the
//! next round of tokens.
//!
//! # Core Guarantees
//!
//! - **Exactly-once firing**: one atomic compare-and-swap per node claims
//!   each firing, however many producers race
//! - **No self-overlap**: a node's body never runs concurrently with itself
//! - **Post-order independence**: the firing does not depend on the order in
//!   which pins are filled
//! - **No silent drops**: posting to a full scalar pin or a terminated node
//!   fails synchronously
//! - **Panic isolation**: a failing or panicking body is reported and the
//!   cycle proceeds to purge
//!
//! # Module Structure
//!
//! - [`pin`]: pin kinds (signal, scalar, constant, stream, semafor) and their
//!   producer ports
//! - [`node`]: nodes, the firing cycle, builders
//! - [`executor`]: direct, trampoline and worker pool executors
//! - [`port`]: the [`Post`] contract producers use
//! - [`actor`]: message-driven actors over a single stream pin
//! - [`config`]: kernel configuration from code, environment and TOML
//! - [`error`]: error types
//! - [`types`]: identifiers and state enums
//!
//! # Example
//!
//! ```
//! use pinflow::{Node, Post, Trampoline};
//! use std::sync::mpsc;
//!
//! // x + y, reported once both arrive
//! let node = Node::builder("adder").executor(Trampoline).build();
//! let (x, x_port) = node.scalar::<i64>()?;
//! let (y, y_port) = node.scalar::<i64>()?;
//! let (tx, rx) = mpsc::channel();
//! node.start(move |_| {
//!     tx.send(x.take()? + y.take()?)?;
//!     Ok(())
//! })?;
//!
//! let producer = std::thread::spawn(move || y_port.post(4));
//! x_port.post(3)?;
//! producer.join().expect("producer")?;
//! assert_eq!(rx.recv()?, 7);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::module_inception)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]

pub mod actor;
pub mod config;
pub mod error;
pub mod executor;
pub mod node;
pub mod pin;
pub mod port;
#[cfg(any(test, feature = "test-internals"))]
pub mod test_utils;
pub mod tracing_compat;
pub mod types;
mod util;

pub use actor::{spawn_actor, Actor, ActorHandle};
pub use config::{ConfigError, KernelConfig, PoolConfig};
pub use error::{BoxError, Error, ErrorCategory, ErrorContext, ErrorKind, Result, ResultExt};
pub use executor::{DirectExecutor, Executor, JobHandle, Trampoline, WorkerPool, WorkerPoolHandle};
pub use node::{Activation, BodyResult, Firing, Node, NodeBuilder};
pub use pin::{
    ConstPin, ScalarPin, ScalarPort, SemaforPin, SemaforPort, SignalPin, SignalPort, StreamPin,
    StreamPort,
};
pub use port::Post;
pub use types::{Lifecycle, NodeId, NodeState, PinIndex, PinKind};
