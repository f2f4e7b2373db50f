//! Internal utilities.

pub(crate) mod completion;

pub(crate) use completion::Completion;
