//! The token-post contract.
//!
//! Everything that feeds a node (another node's body, an I/O reader, a test
//! harness) does so through [`Post`]. A post either succeeds, is queued, or
//! fails synchronously with a contract error; it never blocks waiting for the
//! node to become ready.

use std::sync::Arc;

use crate::error::{BoxError, Error, ErrorKind, Result};

/// Producer side of a pin that carries tokens of type `T`.
pub trait Post<T>: Send + Sync {
    /// Delivers a token.
    fn post(&self, token: T) -> Result<()>;

    /// Delivers a failure instead of a value.
    fn post_failure(&self, failure: BoxError) -> Result<()>;

    /// Delivers `Some(token)`; `None` is the absent token and fails with
    /// `InvalidToken`.
    fn post_option(&self, token: Option<T>) -> Result<()> {
        match token {
            Some(token) => self.post(token),
            None => Err(Error::new(ErrorKind::InvalidToken).with_message("absent token posted")),
        }
    }

    /// Forwards `Ok` as a token and `Err` as a failure.
    fn post_result<E>(&self, result: core::result::Result<T, E>) -> Result<()>
    where
        E: Into<BoxError>,
        Self: Sized,
    {
        match result {
            Ok(token) => self.post(token),
            Err(err) => self.post_failure(err.into()),
        }
    }
}

impl<T, P: Post<T> + ?Sized> Post<T> for Arc<P> {
    fn post(&self, token: T) -> Result<()> {
        (**self).post(token)
    }

    fn post_failure(&self, failure: BoxError) -> Result<()> {
        (**self).post_failure(failure)
    }
}

impl<T, P: Post<T> + ?Sized> Post<T> for Box<P> {
    fn post(&self, token: T) -> Result<()> {
        (**self).post(token)
    }

    fn post_failure(&self, failure: BoxError) -> Result<()> {
        (**self).post_failure(failure)
    }
}
