//! Message-driven actors built on a single stream pin.
//!
//! An actor is an actor-lifecycle node with one stream pin as its mailbox.
//! Each firing takes one message and hands it to [`Actor::handle`]; the body
//! never runs concurrently with itself, so the actor owns its state without
//! locking. Closing the mailbox delivers the end marker, which calls
//! [`Actor::on_completed`] exactly once and terminates the node.
//!
//! # Example
//!
//! ```
//! use pinflow::{spawn_actor, Actor, BoxError, DirectExecutor, Node, Post};
//! use std::time::Duration;
//!
//! struct Counter {
//!     count: u64,
//! }
//!
//! impl Actor for Counter {
//!     type Message = u64;
//!
//!     fn handle(&mut self, msg: u64) -> Result<(), BoxError> {
//!         self.count += msg;
//!         Ok(())
//!     }
//! }
//!
//! let handle = spawn_actor(
//!     Counter { count: 0 },
//!     Node::builder("counter").executor(DirectExecutor),
//! )?;
//! handle.post(5)?;
//! handle.post(10)?;
//! handle.close()?;
//! let counter = handle.join(Duration::from_secs(1)).expect("terminated");
//! assert_eq!(counter.count, 15);
//! # Ok::<(), pinflow::Error>(())
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::{BoxError, ErrorKind, Result};
use crate::node::{Node, NodeBuilder};
use crate::pin::StreamPort;
use crate::port::Post;
use crate::tracing_compat::debug;

/// A message-driven actor.
///
/// Each actor:
/// - Owns mutable state (`self`)
/// - Receives messages sequentially, in mailbox order
/// - Completes once its mailbox is closed and drained
pub trait Actor: Send + 'static {
    /// The type of messages this actor can receive.
    type Message: Send + 'static;

    /// Called once by [`spawn_actor`], before any message.
    fn on_start(&mut self) {}

    /// Handles one message. An error is reported as a body failure; the
    /// actor keeps processing.
    fn handle(&mut self, msg: Self::Message) -> core::result::Result<(), BoxError>;

    /// Called once when the mailbox is closed and drained, or failed.
    fn on_completed(&mut self) {}
}

/// Starts `actor` on a node configured by `builder`.
///
/// The builder's lifecycle is forced to actor.
pub fn spawn_actor<A: Actor>(mut actor: A, builder: NodeBuilder) -> Result<ActorHandle<A>> {
    let node = builder.actor().build();
    let (mailbox, port) = node.stream::<A::Message>()?;
    actor.on_start();
    let state = Arc::new(Mutex::new(Some(actor)));

    let cell = Arc::clone(&state);
    node.start(move |fire| {
        let mut guard = cell.lock();
        let Some(actor) = guard.as_mut() else {
            fire.stop();
            return Ok(());
        };
        match mailbox.take() {
            Ok(Some(msg)) => actor.handle(msg),
            Ok(None) => {
                actor.on_completed();
                fire.stop();
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::UpstreamFailure => {
                actor.on_completed();
                fire.stop();
                Err(err.into())
            }
            Err(err) => Err(err.into()),
        }
    })?;
    debug!(node = %node.id(), name = node.name(), "actor spawned");

    Ok(ActorHandle { node, port, state })
}

/// Handle to a spawned actor.
///
/// Dropping the handle does not close the mailbox; call
/// [`close`](Self::close) to let the actor complete.
pub struct ActorHandle<A: Actor> {
    node: Node,
    port: StreamPort<A::Message>,
    state: Arc<Mutex<Option<A>>>,
}

impl<A: Actor> ActorHandle<A> {
    /// The underlying node.
    #[must_use]
    pub fn node(&self) -> &Node {
        &self.node
    }

    /// A cloneable sender for the mailbox.
    #[must_use]
    pub fn sender(&self) -> StreamPort<A::Message> {
        self.port.clone()
    }

    /// Closes the mailbox. Queued messages are still handled first.
    pub fn close(&self) -> Result<()> {
        self.port.close()
    }

    /// Terminates without draining the mailbox or calling `on_completed`.
    pub fn stop(&self) {
        self.node.stop();
    }

    /// Returns true once the node terminated.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.node.is_terminated()
    }

    /// Waits for termination and takes back the actor state.
    ///
    /// Returns `None` on timeout, or if the state was already taken.
    pub fn join(&self, timeout: Duration) -> Option<A> {
        if !self.node.await_termination(timeout) {
            return None;
        }
        self.state.lock().take()
    }
}

impl<A: Actor> Post<A::Message> for ActorHandle<A> {
    fn post(&self, msg: A::Message) -> Result<()> {
        self.port.post(msg)
    }

    fn post_failure(&self, failure: BoxError) -> Result<()> {
        self.port.post_failure(failure)
    }
}

impl<A: Actor> fmt::Debug for ActorHandle<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorHandle")
            .field("node", &self.node.id())
            .field("name", &self.node.name())
            .field("finished", &self.is_finished())
            .field("pending", &self.port.pending())
            .finish()
    }
}
