//! Client lifecycle state machine.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a [`LiveClient`](crate::live::LiveClient).
///
/// One explicit state replaces the overlapping started/running/stopping
/// flags a naive implementation would carry; transitions are validated by
/// [`ClientState::can_transition_to`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientState {
    /// Not started, or fully stopped.
    Idle,
    /// Initial connection attempt in progress.
    Starting,
    /// Connected; receive loop live.
    Running,
    /// Connection lost or torn down; a reconnection is pending or running.
    Reconnecting,
    /// Close handshake in progress.
    Stopping,
    /// Terminal; no further operations possible.
    Disposed,
}

impl ClientState {
    /// Returns true if the client has been started and not yet stopped.
    #[must_use]
    pub fn is_started(&self) -> bool {
        matches!(
            self,
            Self::Starting | Self::Running | Self::Reconnecting | Self::Stopping
        )
    }

    /// Returns true if a connection is live.
    #[must_use]
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    /// Returns true if the client has been disposed.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        matches!(self, Self::Disposed)
    }

    /// Returns true if a teardown is underway that should suppress
    /// internally triggered reconnections.
    #[must_use]
    pub fn suppresses_reconnect(&self) -> bool {
        matches!(self, Self::Reconnecting | Self::Stopping | Self::Disposed)
    }

    /// Returns whether moving to `next` is a valid transition.
    ///
    /// Re-entering the current state is always allowed, as is disposing
    /// from any state.
    #[must_use]
    pub fn can_transition_to(&self, next: ClientState) -> bool {
        if *self == next || next == Self::Disposed {
            return true;
        }
        match self {
            Self::Idle => matches!(next, Self::Starting),
            Self::Starting => matches!(next, Self::Running | Self::Reconnecting | Self::Idle),
            Self::Running => matches!(next, Self::Reconnecting | Self::Stopping | Self::Idle),
            Self::Reconnecting => matches!(next, Self::Running | Self::Stopping | Self::Idle),
            Self::Stopping => matches!(next, Self::Reconnecting | Self::Idle),
            Self::Disposed => false,
        }
    }
}

impl std::fmt::Display for ClientState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Starting => write!(f, "Starting"),
            Self::Running => write!(f, "Running"),
            Self::Reconnecting => write!(f, "Reconnecting"),
            Self::Stopping => write!(f, "Stopping"),
            Self::Disposed => write!(f, "Disposed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predicates() {
        assert!(!ClientState::Idle.is_started());
        assert!(ClientState::Starting.is_started());
        assert!(ClientState::Running.is_started());
        assert!(ClientState::Reconnecting.is_started());
        assert!(ClientState::Stopping.is_started());
        assert!(!ClientState::Disposed.is_started());

        assert!(ClientState::Running.is_running());
        assert!(!ClientState::Reconnecting.is_running());

        assert!(ClientState::Reconnecting.suppresses_reconnect());
        assert!(ClientState::Stopping.suppresses_reconnect());
        assert!(ClientState::Disposed.suppresses_reconnect());
        assert!(!ClientState::Running.suppresses_reconnect());
    }

    #[test]
    fn test_valid_transitions() {
        assert!(ClientState::Idle.can_transition_to(ClientState::Starting));
        assert!(ClientState::Starting.can_transition_to(ClientState::Running));
        assert!(ClientState::Starting.can_transition_to(ClientState::Reconnecting));
        assert!(ClientState::Running.can_transition_to(ClientState::Stopping));
        assert!(ClientState::Running.can_transition_to(ClientState::Reconnecting));
        assert!(ClientState::Reconnecting.can_transition_to(ClientState::Running));
        assert!(ClientState::Stopping.can_transition_to(ClientState::Reconnecting));
        assert!(ClientState::Stopping.can_transition_to(ClientState::Idle));
    }

    #[test]
    fn test_invalid_transitions() {
        assert!(!ClientState::Idle.can_transition_to(ClientState::Running));
        assert!(!ClientState::Idle.can_transition_to(ClientState::Stopping));
        assert!(!ClientState::Disposed.can_transition_to(ClientState::Starting));
        assert!(!ClientState::Disposed.can_transition_to(ClientState::Idle));
    }

    #[test]
    fn test_dispose_always_allowed() {
        for state in [
            ClientState::Idle,
            ClientState::Starting,
            ClientState::Running,
            ClientState::Reconnecting,
            ClientState::Stopping,
            ClientState::Disposed,
        ] {
            assert!(state.can_transition_to(ClientState::Disposed));
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(ClientState::Idle.to_string(), "Idle");
        assert_eq!(ClientState::Reconnecting.to_string(), "Reconnecting");
    }
}
