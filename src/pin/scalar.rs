//! Single-slot pins: scalar and constant.

use std::fmt;
use std::sync::Arc;

use super::{AfterPurge, Gate, Storage};
use crate::error::{BoxError, Error, ErrorKind, Result};
use crate::node::NodeCore;
use crate::port::Post;
use crate::types::{NodeId, PinIndex, PinKind};

pub(crate) type SharedError = Arc<dyn std::error::Error + Send + Sync>;

enum Token<T> {
    Empty,
    Ready(T),
    Taken,
    Failed(SharedError),
}

/// Single-capacity storage. A constant slot survives purge.
pub(crate) struct ScalarSlot<T> {
    token: Token<T>,
    pushback: bool,
    constant: bool,
}

impl<T> ScalarSlot<T> {
    pub(crate) const fn new(constant: bool) -> Self {
        Self {
            token: Token::Empty,
            pushback: false,
            constant,
        }
    }

    fn offer(&mut self, token: Token<T>) -> core::result::Result<(), ErrorKind> {
        if !matches!(self.token, Token::Empty) {
            return Err(ErrorKind::AlreadyOccupied);
        }
        self.token = token;
        Ok(())
    }

    const fn is_occupied(&self) -> bool {
        !matches!(self.token, Token::Empty)
    }
}

impl<T: Send + 'static> Storage for ScalarSlot<T> {
    fn kind(&self) -> PinKind {
        if self.constant {
            PinKind::Constant
        } else {
            PinKind::Scalar
        }
    }

    fn purge(&mut self) -> AfterPurge {
        if self.constant {
            return AfterPurge::Keep;
        }
        if self.pushback {
            self.pushback = false;
            return AfterPurge::Keep;
        }
        self.token = Token::Empty;
        AfterPurge::Off
    }

    fn discard(&mut self) {
        self.token = Token::Empty;
        self.pushback = false;
    }
}

fn upstream(gate: &Gate<impl Storage>, failure: &SharedError) -> Error {
    gate.error(ErrorKind::UpstreamFailure)
        .with_shared_source(Arc::clone(failure))
}

/// Body-side handle of a scalar pin.
///
/// Holds at most one token. The body moves it out with [`take`](Self::take)
/// or clones it with [`get`](Self::get); either way the slot is cleared at
/// purge unless the body asked for a pushback.
pub struct ScalarPin<T> {
    gate: Arc<Gate<ScalarSlot<T>>>,
}

impl<T: Send + 'static> ScalarPin<T> {
    pub(crate) fn new(gate: Arc<Gate<ScalarSlot<T>>>) -> Self {
        Self { gate }
    }

    /// Declaration index of this pin.
    #[must_use]
    pub fn index(&self) -> PinIndex {
        self.gate.index
    }

    /// Returns true while the pin holds no token.
    #[must_use]
    pub fn is_blocked(&self) -> bool {
        self.gate.lock().blocked
    }

    /// Moves the token out.
    ///
    /// Fails with `Empty` if there is none (or it was already taken) and with
    /// `UpstreamFailure` if the producer posted a failure.
    pub fn take(&self) -> Result<T> {
        let mut guard = self.gate.lock();
        let cell = &mut *guard;
        match std::mem::replace(&mut cell.storage.token, Token::Taken) {
            Token::Ready(value) => Ok(value),
            Token::Failed(failure) => {
                let err = upstream(&self.gate, &failure);
                cell.storage.token = Token::Failed(failure);
                Err(err)
            }
            other => {
                cell.storage.token = other;
                Err(self.gate.error(ErrorKind::Empty))
            }
        }
    }

    /// Clones the token, leaving it in place.
    pub fn get(&self) -> Result<T>
    where
        T: Clone,
    {
        let cell = self.gate.lock();
        match &cell.storage.token {
            Token::Ready(value) => Ok(value.clone()),
            Token::Failed(failure) => Err(upstream(&self.gate, failure)),
            Token::Empty | Token::Taken => Err(self.gate.error(ErrorKind::Empty)),
        }
    }

    /// Borrows the token for the duration of `f`.
    ///
    /// The pin stays locked while `f` runs; producers posting to it wait.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> Result<R> {
        let cell = self.gate.lock();
        match &cell.storage.token {
            Token::Ready(value) => Ok(f(value)),
            Token::Failed(failure) => Err(upstream(&self.gate, failure)),
            Token::Empty | Token::Taken => Err(self.gate.error(ErrorKind::Empty)),
        }
    }

    /// Keeps the current token for the next firing.
    pub fn pushback(&self) -> Result<()> {
        let mut guard = self.gate.lock();
        let cell = &mut *guard;
        if cell.storage.pushback {
            return Err(self
                .gate
                .error(ErrorKind::InvalidStateTransition)
                .with_message("pushback already requested"));
        }
        match cell.storage.token {
            Token::Ready(_) | Token::Failed(_) => {
                cell.storage.pushback = true;
                Ok(())
            }
            Token::Taken => Err(self
                .gate
                .error(ErrorKind::InvalidStateTransition)
                .with_message("token was taken; use pushback_with")),
            Token::Empty => Err(self.gate.error(ErrorKind::Empty)),
        }
    }

    /// Puts `token` back in the slot and keeps it for the next firing.
    pub fn pushback_with(&self, token: T) -> Result<()> {
        let mut guard = self.gate.lock();
        let cell = &mut *guard;
        if cell.storage.pushback {
            return Err(self
                .gate
                .error(ErrorKind::InvalidStateTransition)
                .with_message("pushback already requested"));
        }
        if matches!(cell.storage.token, Token::Empty) {
            return Err(self.gate.error(ErrorKind::Empty));
        }
        cell.storage.token = Token::Ready(token);
        cell.storage.pushback = true;
        Ok(())
    }
}

impl<T> fmt::Debug for ScalarPin<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScalarPin")
            .field("node", &self.gate.node)
            .field("index", &self.gate.index)
            .finish_non_exhaustive()
    }
}

/// Body-side handle of a constant pin.
///
/// The first posted token stays for the lifetime of the node: the pin is
/// never purged and a second post fails with `AlreadyOccupied`.
pub struct ConstPin<T> {
    gate: Arc<Gate<ScalarSlot<T>>>,
}

impl<T: Send + 'static> ConstPin<T> {
    pub(crate) fn new(gate: Arc<Gate<ScalarSlot<T>>>) -> Self {
        Self { gate }
    }

    /// Declaration index of this pin.
    #[must_use]
    pub fn index(&self) -> PinIndex {
        self.gate.index
    }

    /// Returns true once a value (or failure) has been posted.
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.gate.lock().storage.is_occupied()
    }

    /// Clones the constant.
    pub fn get(&self) -> Result<T>
    where
        T: Clone,
    {
        let cell = self.gate.lock();
        match &cell.storage.token {
            Token::Ready(value) => Ok(value.clone()),
            Token::Failed(failure) => Err(upstream(&self.gate, failure)),
            Token::Empty | Token::Taken => Err(self.gate.error(ErrorKind::Empty)),
        }
    }

    /// Borrows the constant for the duration of `f`.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> Result<R> {
        let cell = self.gate.lock();
        match &cell.storage.token {
            Token::Ready(value) => Ok(f(value)),
            Token::Failed(failure) => Err(upstream(&self.gate, failure)),
            Token::Empty | Token::Taken => Err(self.gate.error(ErrorKind::Empty)),
        }
    }
}

impl<T> fmt::Debug for ConstPin<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstPin")
            .field("node", &self.gate.node)
            .field("index", &self.gate.index)
            .finish_non_exhaustive()
    }
}

/// Producer-side handle of a scalar or constant pin.
pub struct ScalarPort<T> {
    gate: Arc<Gate<ScalarSlot<T>>>,
    node: Arc<NodeCore>,
}

impl<T: Send + 'static> ScalarPort<T> {
    pub(crate) fn new(gate: Arc<Gate<ScalarSlot<T>>>, node: Arc<NodeCore>) -> Self {
        Self { gate, node }
    }

    /// Node this port feeds.
    #[must_use]
    pub fn node_id(&self) -> NodeId {
        self.gate.node()
    }

    /// Returns true while a token sits in the slot.
    #[must_use]
    pub fn is_occupied(&self) -> bool {
        self.gate.lock().storage.is_occupied()
    }

    fn deliver(&self, token: Token<T>) -> Result<()> {
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
}

impl<T: Send + 'static> Post<T> for ScalarPort<T> {
    fn post(&self, token: T) -> Result<()> {
        self.deliver(Token::Ready(token))
    }

    fn post_failure(&self, failure: BoxError) -> Result<()> {
        self.deliver(Token::Failed(Arc::from(failure)))
    }
}

impl<T> Clone for ScalarPort<T> {
    fn clone(&self) -> Self {
        Self {
            gate: Arc::clone(&self.gate),
            node: Arc::clone(&self.node),
        }
    }
}

impl<T> fmt::Debug for ScalarPort<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScalarPort")
            .field("node", &self.gate.node)
            .field("index", &self.gate.index)
            .finish_non_exhaustive()
    }
}
