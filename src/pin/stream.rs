//! Stream pins: unbounded FIFO with an end-of-stream marker.
//!
//! The gate exposes one token at a time (the head). Posts behind the head are
//! queued. After `close()` the end marker is exposed once the queue and any
//! pushback have drained; the firing that sees it is the last one for this
//! pin, and its purge leaves the pin permanently closed and blocked.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use super::scalar::SharedError;
use super::{AfterPurge, Gate, Storage};
use crate::error::{BoxError, ErrorKind, Result};
use crate::node::NodeCore;
use crate::port::Post;
use crate::types::{NodeId, PinIndex, PinKind};

enum Head<T> {
    Empty,
    Ready(T),
    Taken,
    End,
    Failed(SharedError),
}

pub(crate) struct StreamQueue<T> {
    head: Head<T>,
    queue: VecDeque<T>,
    close_requested: bool,
    failure: Option<SharedError>,
    finished: bool,
    pushback: bool,
}

impl<T> StreamQueue<T> {
    pub(crate) const fn new() -> Self {
        Self {
            head: Head::Empty,
            queue: VecDeque::new(),
            close_requested: false,
            failure: None,
            finished: false,
            pushback: false,
        }
    }

    fn offer(&mut self, value: T) -> core::result::Result<(), ErrorKind> {
        if self.close_requested {
            return Err(ErrorKind::Closed);
        }
        if matches!(self.head, Head::Empty) {
            self.head = Head::Ready(value);
        } else {
            self.queue.push_back(value);
        }
        Ok(())
    }

    /// Marks end of stream. Returns true if the marker became the head.
    fn close(&mut self, failure: Option<SharedError>) -> bool {
        self.close_requested = true;
        self.failure = failure;
        if matches!(self.head, Head::Empty) {
            self.head = self.end_marker();
            true
        } else {
            false
        }
    }

    fn end_marker(&self) -> Head<T> {
        self.failure
            .as_ref()
            .map_or(Head::End, |failure| Head::Failed(Arc::clone(failure)))
    }

    fn pending(&self) -> usize {
        self.queue.len() + usize::from(matches!(self.head, Head::Ready(_)))
    }
}

impl<T: Send + 'static> Storage for StreamQueue<T> {
    fn kind(&self) -> PinKind {
        PinKind::Stream
    }

    fn purge(&mut self) -> AfterPurge {
        if self.pushback {
            self.pushback = false;
            return AfterPurge::Keep;
        }
        if matches!(self.head, Head::End | Head::Failed(_)) {
            self.head = Head::Empty;
            self.finished = true;
            return AfterPurge::Off;
        }
        if let Some(next) = self.queue.pop_front() {
            self.head = Head::Ready(next);
            AfterPurge::Keep
        } else if self.close_requested {
            self.head = self.end_marker();
            AfterPurge::Keep
        } else {
            self.head = Head::Empty;
            AfterPurge::Off
        }
    }

    fn discard(&mut self) {
        self.head = Head::Empty;
        self.queue.clear();
        self.pushback = false;
    }
}

/// Body-side handle of a stream pin.
pub struct StreamPin<T> {
    gate: Arc<Gate<StreamQueue<T>>>,
}

impl<T: Send + 'static> StreamPin<T> {
    pub(crate) fn new(gate: Arc<Gate<StreamQueue<T>>>) -> Self {
        Self { gate }
    }

    /// Declaration index of this pin.
    #[must_use]
    pub fn index(&self) -> PinIndex {
        self.gate.index
    }

    /// Moves the current token out.
    ///
    /// Returns `Ok(None)` for the end-of-stream marker, which is delivered
    /// exactly once. A stream closed with a failure yields `UpstreamFailure`
    /// in its place.
    pub fn take(&self) -> Result<Option<T>> {
        let mut guard = self.gate.lock();
        let cell = &mut *guard;
        match std::mem::replace(&mut cell.storage.head, Head::Taken) {
            Head::Ready(value) => Ok(Some(value)),
            Head::End => {
                cell.storage.head = Head::End;
                Ok(None)
            }
            Head::Failed(failure) => {
                let err = self
                    .gate
                    .error(ErrorKind::UpstreamFailure)
                    .with_shared_source(Arc::clone(&failure));
                cell.storage.head = Head::Failed(failure);
                Err(err)
            }
            other => {
                cell.storage.head = other;
                Err(self.gate.error(ErrorKind::Empty))
            }
        }
    }

    /// Clones the current token; `Ok(None)` for the end marker.
    pub fn get(&self) -> Result<Option<T>>
    where
        T: Clone,
    {
        let cell = self.gate.lock();
        match &cell.storage.head {
            Head::Ready(value) => Ok(Some(value.clone())),
            Head::End => Ok(None),
            Head::Failed(failure) => Err(self
                .gate
                .error(ErrorKind::UpstreamFailure)
                .with_shared_source(Arc::clone(failure))),
            Head::Empty | Head::Taken => Err(self.gate.error(ErrorKind::Empty)),
        }
    }

    /// Borrows the current token for the duration of `f`; `f` sees `None`
    /// for the end marker.
    pub fn with<R>(&self, f: impl FnOnce(Option<&T>) -> R) -> Result<R> {
        let cell = self.gate.lock();
        match &cell.storage.head {
            Head::Ready(value) => Ok(f(Some(value))),
            Head::End => Ok(f(None)),
            Head::Failed(failure) => Err(self
                .gate
                .error(ErrorKind::UpstreamFailure)
                .with_shared_source(Arc::clone(failure))),
            Head::Empty | Head::Taken => Err(self.gate.error(ErrorKind::Empty)),
        }
    }

    /// Keeps the current token for the next firing.
    ///
    /// The end marker cannot be pushed back.
    pub fn pushback(&self) -> Result<()> {
        let mut guard = self.gate.lock();
        let cell = &mut *guard;
        Self::check_pushback(&self.gate, &cell.storage)?;
        match cell.storage.head {
            Head::Ready(_) => {
                cell.storage.pushback = true;
                Ok(())
            }
            Head::Taken => Err(self
                .gate
                .error(ErrorKind::InvalidStateTransition)
                .with_message("token was taken; use pushback_with")),
            _ => Err(self.gate.error(ErrorKind::Empty)),
        }
    }

    /// Puts `token` back at the head and keeps it for the next firing.
    pub fn pushback_with(&self, token: T) -> Result<()> {
        let mut guard = self.gate.lock();
        let cell = &mut *guard;
        Self::check_pushback(&self.gate, &cell.storage)?;
        match cell.storage.head {
            Head::Ready(_) | Head::Taken => {
                cell.storage.head = Head::Ready(token);
                cell.storage.pushback = true;
                Ok(())
            }
            _ => Err(self.gate.error(ErrorKind::Empty)),
        }
    }

    fn check_pushback(gate: &Gate<StreamQueue<T>>, storage: &StreamQueue<T>) -> Result<()> {
        if storage.pushback {
            return Err(gate
                .error(ErrorKind::InvalidStateTransition)
                .with_message("pushback already requested"));
        }
        if matches!(storage.head, Head::End | Head::Failed(_)) {
            return Err(gate
                .error(ErrorKind::InvalidToken)
                .with_message("end-of-stream marker cannot be pushed back"));
        }
        Ok(())
    }

    /// Returns true once the end marker has been delivered and purged.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.gate.lock().storage.finished
    }
}

impl<T> fmt::Debug for StreamPin<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamPin")
            .field("node", &self.gate.node)
            .field("index", &self.gate.index)
            .finish_non_exhaustive()
    }
}

/// Producer-side handle of a stream pin.
pub struct StreamPort<T> {
    gate: Arc<Gate<StreamQueue<T>>>,
    node: Arc<NodeCore>,
}

impl<T: Send + 'static> StreamPort<T> {
    pub(crate) fn new(gate: Arc<Gate<StreamQueue<T>>>, node: Arc<NodeCore>) -> Self {
        Self { gate, node }
    }

    /// Node this port feeds.
    #[must_use]
    pub fn node_id(&self) -> NodeId {
        self.gate.node()
    }

    /// Marks end of stream. Idempotent.
    ///
    /// Tokens already posted are still delivered; the body then sees the end
    /// marker exactly once. Closing again succeeds even after the node
    /// terminated; closing a stream that was never closed fails with
    /// `Closed` once its node is gone.
    pub fn close(&self) -> Result<()> {
        let ignition = {
            let mut cell = self.gate.lock();
            if cell.storage.close_requested {
                return Ok(());
            }
            self.gate.ensure_open()?;
            if cell.storage.close(None) {
                self.gate.turn_on(&mut cell)
            } else {
                return Ok(());
            }
        };
        self.node.ignite(ignition);
        Ok(())
    }

    /// Returns true once `close` (or `post_failure`) was called.
    #[must_use]
    pub fn is_close_requested(&self) -> bool {
        self.gate.lock().storage.close_requested
    }

    /// Returns true once the end marker has been delivered and purged.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.gate.lock().storage.finished
    }

    /// Number of tokens posted but not yet delivered.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.gate.lock().storage.pending()
    }
}

impl<T: Send + 'static> Post<T> for StreamPort<T> {
    fn post(&self, token: T) -> Result<()> {
        let ignition = {
            let mut cell = self.gate.lock_open()?;
            cell.storage
                .offer(token)
                .map_err(|kind| self.gate.error(kind))?;
            self.gate.turn_on(&mut cell)
        };
        self.node.ignite(ignition);
        Ok(())
    }

    /// Closes the stream with a failure delivered in place of the end marker.
    fn post_failure(&self, failure: BoxError) -> Result<()> {
        let ignition = {
            let mut cell = self.gate.lock_open()?;
            if cell.storage.close_requested {
                return Err(self.gate.error(ErrorKind::Closed));
            }
            if cell.storage.close(Some(Arc::from(failure))) {
                self.gate.turn_on(&mut cell)
            } else {
                return Ok(());
            }
        };
        self.node.ignite(ignition);
        Ok(())
    }
}

impl<T> Clone for StreamPort<T> {
    fn clone(&self) -> Self {
        Self {
            gate: Arc::clone(&self.gate),
            node: Arc::clone(&self.node),
        }
    }
}

impl<T> fmt::Debug for StreamPort<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamPort")
            .field("node", &self.gate.node)
            .field("index", &self.gate.index)
            .finish_non_exhaustive()
    }
}
