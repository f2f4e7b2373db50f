//! Core types shared by pins, nodes and executors.
//!
//! - [`id`]: identifiers (`NodeId`, `PinIndex`)
//! - [`state`]: node lifecycle and state enums, pin kinds

pub mod id;
pub mod state;

pub use id::{NodeId, PinIndex};
pub use state::{Lifecycle, NodeState, PinKind};
