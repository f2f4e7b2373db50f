//! Error types and error handling strategy for pinflow.
//!
//! Errors fall into three groups:
//!
//! - **Contract violations** are raised synchronously to whoever called
//!   `post`, `release`, `close` or registered a pin. They are programmer
//!   errors: posting twice into an occupied slot, registering a pin on a
//!   started node, releasing a negative number of permits.
//! - **Runtime conditions** are produced while a node fires: the body failed
//!   or panicked, a pin carried an upstream failure, a pin was read twice.
//!   A body failure never escapes the executor thread; it is logged, counted
//!   and handed to the node's failure handler, and the cycle still purges.
//! - **Internal** errors indicate a kernel bug.
//!
//! Every error carries an optional [`ErrorContext`] naming the node and pin
//! involved.

use core::fmt;
use std::sync::Arc;

use crate::types::{NodeId, PinIndex};

/// Boxed error returned by node bodies and passed to `post_failure`.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The kind of error that occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    // === Contract violations ===
    /// A pin was registered after the node was started.
    RegistrationAfterStart,
    /// A single-slot pin already holds an unconsumed token.
    AlreadyOccupied,
    /// The "absent" token was posted, or the end marker was pushed back.
    InvalidToken,
    /// The pin or its node has been closed or terminated.
    Closed,
    /// Negative permit delta on a semafor.
    InvalidArgument,
    /// Operation not valid in the current state (double start, double pushback).
    InvalidStateTransition,

    // === Runtime conditions ===
    /// The node body returned an error or panicked.
    BodyFailure,
    /// The pin carries a failure posted by its producer.
    UpstreamFailure,
    /// The pin exposes no token (already taken, or read outside a firing).
    Empty,

    // === Internal ===
    /// Kernel invariant broken.
    Internal,
}

impl ErrorKind {
    /// Returns the error category for this kind.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::RegistrationAfterStart
            | Self::AlreadyOccupied
            | Self::InvalidToken
            | Self::Closed
            | Self::InvalidArgument
            | Self::InvalidStateTransition => ErrorCategory::Contract,
            Self::BodyFailure | Self::UpstreamFailure | Self::Empty => ErrorCategory::Runtime,
            Self::Internal => ErrorCategory::Internal,
        }
    }

    /// Returns a short description of this error kind.
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::RegistrationAfterStart => "pin registered after node start",
            Self::AlreadyOccupied => "pin already holds a token",
            Self::InvalidToken => "invalid token",
            Self::Closed => "pin closed",
            Self::InvalidArgument => "invalid argument",
            Self::InvalidStateTransition => "invalid state transition",
            Self::BodyFailure => "node body failed",
            Self::UpstreamFailure => "upstream failure",
            Self::Empty => "no token available",
            Self::Internal => "internal error",
        }
    }
}

/// High-level grouping of error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Misuse surfaced synchronously to the caller.
    Contract,
    /// Conditions observed while a node fires.
    Runtime,
    /// Kernel bugs.
    Internal,
}

/// Diagnostic context for an error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ErrorContext {
    /// The node where the error originated.
    pub node: Option<NodeId>,
    /// The pin involved.
    pub pin: Option<PinIndex>,
}

impl ErrorContext {
    /// Context naming a node.
    #[must_use]
    pub const fn node(node: NodeId) -> Self {
        Self {
            node: Some(node),
            pin: None,
        }
    }

    /// Context naming a node and one of its pins.
    #[must_use]
    pub const fn pin(node: NodeId, pin: PinIndex) -> Self {
        Self {
            node: Some(node),
            pin: Some(pin),
        }
    }
}

/// The main error type for pinflow operations.
#[derive(Debug, Clone)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    source: Option<Arc<dyn std::error::Error + Send + Sync>>,
    context: ErrorContext,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub const fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            source: None,
            context: ErrorContext {
                node: None,
                pin: None,
            },
        }
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        self.kind.category()
    }

    /// Returns true for synchronous contract violations.
    #[must_use]
    pub const fn is_contract_violation(&self) -> bool {
        matches!(self.kind.category(), ErrorCategory::Contract)
    }

    /// Returns true if the pin or node was closed.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        matches!(self.kind, ErrorKind::Closed)
    }

    /// Adds a message description to the error.
    #[must_use]
    pub fn with_message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }

    /// Adds structured context to the error.
    #[must_use]
    pub fn with_context(mut self, ctx: ErrorContext) -> Self {
        self.context = ctx;
        self
    }

    /// Adds a source error to the chain.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    /// Adds an already shared source error to the chain.
    #[must_use]
    pub fn with_shared_source(mut self, source: Arc<dyn std::error::Error + Send + Sync>) -> Self {
        self.source = Some(source);
        self
    }

    /// Returns the error message, if any.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Returns the error context.
    #[must_use]
    pub fn context(&self) -> &ErrorContext {
        &self.context
    }

    /// Wraps an error returned by a node body.
    #[must_use]
    pub fn body_failure(node: NodeId, source: BoxError) -> Self {
        Self::new(ErrorKind::BodyFailure)
            .with_context(ErrorContext::node(node))
            .with_shared_source(Arc::from(source))
    }

    /// Describes a panic caught while running a node body.
    #[must_use]
    pub fn body_panic(node: NodeId, payload: &(dyn std::any::Any + Send)) -> Self {
        let detail = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        Self::new(ErrorKind::BodyFailure)
            .with_context(ErrorContext::node(node))
            .with_message(format!("body panicked: {detail}"))
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal).with_message(detail)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(msg) = &self.message {
            write!(f, ": {msg}")?;
        }
        if let Some(node) = self.context.node {
            write!(f, " (node {node}")?;
            if let Some(pin) = self.context.pin {
                write!(f, ", pin {pin}")?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as _)
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Attach a context message on error.
    fn context(self, msg: impl Into<String>) -> Result<T>;
    /// Attach context message computed lazily on error.
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for core::result::Result<T, E> {
    fn context(self, msg: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().with_message(msg))
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| e.into().with_message(f()))
    }
}

/// A specialized Result type for pinflow operations.
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[derive(Debug)]
    struct Underlying;

    impl fmt::Display for Underlying {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "underlying")
        }
    }

    impl std::error::Error for Underlying {}

    #[test]
    fn display_without_message() {
        let err = Error::new(ErrorKind::Internal);
        assert_eq!(err.to_string(), "Internal");
    }

    #[test]
    fn display_with_message_and_context() {
        let err = Error::new(ErrorKind::AlreadyOccupied)
            .with_message("x")
            .with_context(ErrorContext::pin(NodeId::new_for_test(3), PinIndex::new(1)));
        assert_eq!(err.to_string(), "AlreadyOccupied: x (node N3, pin #1)");
    }

    #[test]
    fn source_chain_is_exposed() {
        let err = Error::new(ErrorKind::UpstreamFailure)
            .with_message("outer")
            .with_source(Underlying);
        let source = err.source().expect("source missing");
        assert_eq!(source.to_string(), "underlying");
    }

    #[test]
    fn categories() {
        for kind in [
            ErrorKind::RegistrationAfterStart,
            ErrorKind::AlreadyOccupied,
            ErrorKind::InvalidToken,
            ErrorKind::Closed,
            ErrorKind::InvalidArgument,
        ] {
            assert_eq!(kind.category(), ErrorCategory::Contract, "{kind:?}");
        }
        assert_eq!(ErrorKind::BodyFailure.category(), ErrorCategory::Runtime);
        assert_eq!(ErrorKind::Internal.category(), ErrorCategory::Internal);
        assert!(Error::new(ErrorKind::Closed).is_closed());
        assert!(Error::new(ErrorKind::Closed).is_contract_violation());
    }

    #[test]
    fn body_failure_keeps_source() {
        let boxed: BoxError = Box::new(Underlying);
        let err = Error::body_failure(NodeId::new_for_test(9), boxed);
        assert_eq!(err.kind(), ErrorKind::BodyFailure);
        assert_eq!(err.context().node, Some(NodeId::new_for_test(9)));
        assert_eq!(err.source().map(ToString::to_string).as_deref(), Some("underlying"));
    }

    #[test]
    fn body_panic_extracts_message() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        let err = Error::body_panic(NodeId::new_for_test(1), payload.as_ref());
        assert_eq!(err.message(), Some("body panicked: boom"));

        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        let err = Error::body_panic(NodeId::new_for_test(1), payload.as_ref());
        assert_eq!(err.message(), Some("body panicked: bang"));
    }

    #[test]
    fn result_ext_adds_message() {
        let res: core::result::Result<(), ErrorKind> = Err(ErrorKind::Empty);
        let err = res.context("take failed").expect_err("expected err");
        assert_eq!(err.kind(), ErrorKind::Empty);
        assert_eq!(err.to_string(), "Empty: take failed");
    }
}
