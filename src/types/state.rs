//! Node lifecycle and state enums.

use core::fmt;

/// What a node does after its pins are purged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Lifecycle {
    /// Fire once, then terminate.
    #[default]
    OneShot,
    /// Re-arm after every firing until stopped.
    Actor,
}

/// Observable state of a node.
///
/// ```text
/// Created ──start──► Armed ──all pins on──► Firing ──body done──► Purging
///                      ▲                                            │
///                      └────────────── actor re-arm ────────────────┤
///                                                                   ▼
///                                                              Terminated
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum NodeState {
    /// Accepting pin registrations, not yet started.
    Created = 0,
    /// Waiting for every pin to be unblocked.
    Armed = 1,
    /// An activation owns the node; the body is queued or running.
    Firing = 2,
    /// The body returned; pins are being purged.
    Purging = 3,
    /// The node will never fire again.
    Terminated = 4,
}

impl NodeState {
    pub(crate) const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Created,
            1 => Self::Armed,
            2 => Self::Firing,
            3 => Self::Purging,
            _ => Self::Terminated,
        }
    }

    /// Returns true once the node can no longer fire.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Terminated)
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::Armed => "armed",
            Self::Firing => "firing",
            Self::Purging => "purging",
            Self::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// Storage strategy of a pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PinKind {
    /// Payload-free gate switched by a producer.
    Signal,
    /// Single-slot token.
    Scalar,
    /// Single-slot token that survives purge.
    Constant,
    /// FIFO queue with end-of-stream marker.
    Stream,
    /// Permit counter.
    Semafor,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_round_trips_through_u8() {
        for state in [
            NodeState::Created,
            NodeState::Armed,
            NodeState::Firing,
            NodeState::Purging,
            NodeState::Terminated,
        ] {
            assert_eq!(NodeState::from_u8(state as u8), state);
        }
        assert!(NodeState::Terminated.is_terminal());
        assert!(!NodeState::Purging.is_terminal());
        assert_eq!(NodeState::Armed.to_string(), "armed");
    }

    #[test]
    fn default_lifecycle_is_one_shot() {
        assert_eq!(Lifecycle::default(), Lifecycle::OneShot);
    }
}
