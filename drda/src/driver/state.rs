//! Connection state machine.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Initializing,
    Connecting,
    Authenticating,
    Connected,
    Disconnecting,
    Error,
    Reconnecting,
    AuthFailed,
}

impl ConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "DISCONNECTED",
            Self::Initializing => "INITIALIZING",
            Self::Connecting => "CONNECTING",
            Self::Authenticating => "AUTHENTICATING",
            Self::Connected => "CONNECTED",
            Self::Disconnecting => "DISCONNECTING",
            Self::Error => "ERROR",
            Self::Reconnecting => "RECONNECTING",
            Self::AuthFailed => "AUTH_FAILED",
        }
    }

    /// Allowed successors. RECONNECTING and AUTH_FAILED have none.
    pub fn successors(self) -> &'static [ConnectionState] {
        use ConnectionState::*;
        match self {
            Disconnected => &[Initializing, Connecting, Authenticating, Error],
            Initializing => &[Connecting, Authenticating, Error],
            Connecting => &[Authenticating, Connected, Error],
            Authenticating => &[Connected, AuthFailed, Error],
            Connected => &[Disconnecting, Error],
            Disconnecting => &[Disconnected],
            Error => &[Reconnecting, Disconnected],
            Reconnecting | AuthFailed => &[],
        }
    }

    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        self.successors().contains(&next)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current state plus the transition table. Rejected transitions are
/// logged and leave the state unchanged.
#[derive(Debug, Clone)]
pub struct StateMachine {
    name: &'static str,
    state: ConnectionState,
}

impl StateMachine {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: ConnectionState::Disconnected,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Returns whether the transition was applied.
    pub fn transition(&mut self, next: ConnectionState) -> bool {
        if !self.state.can_transition_to(next) {
            tracing::warn!(
                target: "drda::state",
                machine = self.name,
                from = %self.state,
                to = %next,
                "rejected state transition"
            );
            return false;
        }
        tracing::debug!(target: "drda::state", machine = self.name, from = %self.state, to = %next, "state transition");
        self.state = next;
        true
    }

    /// Walk a path of transitions, stopping at the first rejection.
    pub fn transition_path(&mut self, path: &[ConnectionState]) -> bool {
        path.iter().all(|&next| self.transition(next))
    }

    /// Move to ERROR if the table allows it from here.
    pub fn fail(&mut self) {
        if self.state != ConnectionState::Error && self.state.can_transition_to(ConnectionState::Error) {
            self.transition(ConnectionState::Error);
        }
    }
}
