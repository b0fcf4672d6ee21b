// src/circuit_state.rs
//! The per-circuit state machine: version handshake, then free-flowing
//! traffic, then disconnect. One instance per [`crate::circuit::VirtualCircuit`];
//! channel-level bookkeeping lives in [`crate::channel_state`] instead, so
//! this table only needs to know about the handshake and teardown.

use crate::command::CommandId;
use crate::error::LocalProtocolError;
use crate::types::{Direction, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CircuitState {
    /// Nothing sent or received yet.
    Idle,
    /// `VersionRequest` sent/received; waiting for the peer's own
    /// `VersionRequest`/`VersionResponse` to complete the handshake.
    AwaitVersion,
    /// Handshake complete; channel and data commands may flow freely.
    Connected,
    /// Circuit torn down, by either `ServerDisconnResponse` or a local
    /// close. No further commands may be sent or parsed.
    Disconnected,
}

impl CircuitState {
    pub const fn name(self) -> &'static str {
        match self {
            CircuitState::Idle => "Idle",
            CircuitState::AwaitVersion => "AwaitVersion",
            CircuitState::Connected => "Connected",
            CircuitState::Disconnected => "Disconnected",
        }
    }

    pub fn is_connected(self) -> bool {
        matches!(self, CircuitState::Connected)
    }
}

/// Commands legal at the circuit level once `Connected` — everything
/// except a second handshake. Channel-specific legality (e.g. can't read a
/// channel that isn't connected yet) is `channel_state`'s job, not this
/// one's.
fn is_post_handshake_command(command: CommandId) -> bool {
    !matches!(command, CommandId::Version)
}

pub fn transition(
    state: CircuitState,
    command: CommandId,
    direction: Direction,
    role: Role,
) -> Result<CircuitState, LocalProtocolError> {
    use CircuitState::*;

    let next = match (state, command, direction, role) {
        (Idle, CommandId::Version, Direction::Sending, Role::Client) => AwaitVersion,
        (Idle, CommandId::Version, Direction::Receiving, Role::Server) => AwaitVersion,

        (AwaitVersion, CommandId::Version, Direction::Receiving, Role::Client) => Connected,
        (AwaitVersion, CommandId::Version, Direction::Sending, Role::Server) => Connected,

        (Connected, CommandId::ServerDisconn, Direction::Receiving, Role::Client) => Disconnected,
        (Connected, CommandId::ServerDisconn, Direction::Sending, Role::Server) => Disconnected,
        (Connected, command, _, _) if is_post_handshake_command(command) => Connected,

        _ => {
            return Err(LocalProtocolError::CircuitNotInState {
                expected: "a state permitting this command",
                actual: state.name(),
            })
        }
    };
    Ok(next)
}

/// A local close is always legal except when already disconnected; it
/// isn't triggered by any command so it has its own entry point rather
/// than going through [`transition`].
pub fn close(state: CircuitState) -> Result<CircuitState, LocalProtocolError> {
    if state == CircuitState::Disconnected {
        return Err(LocalProtocolError::Disconnected);
    }
    Ok(CircuitState::Disconnected)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_handshake_reaches_connected() {
        let s = transition(CircuitState::Idle, CommandId::Version, Direction::Sending, Role::Client).unwrap();
        assert_eq!(s, CircuitState::AwaitVersion);
        let s = transition(s, CommandId::Version, Direction::Receiving, Role::Client).unwrap();
        assert_eq!(s, CircuitState::Connected);
    }

    #[test]
    fn server_handshake_reaches_connected() {
        let s = transition(CircuitState::Idle, CommandId::Version, Direction::Receiving, Role::Server).unwrap();
        let s = transition(s, CommandId::Version, Direction::Sending, Role::Server).unwrap();
        assert_eq!(s, CircuitState::Connected);
    }

    #[test]
    fn data_traffic_stays_connected() {
        let s = transition(CircuitState::Connected, CommandId::CreateChan, Direction::Sending, Role::Client).unwrap();
        assert_eq!(s, CircuitState::Connected);
    }

    #[test]
    fn second_version_request_rejected_once_connected() {
        let err = transition(CircuitState::Connected, CommandId::Version, Direction::Sending, Role::Client)
            .unwrap_err();
        assert!(matches!(err, LocalProtocolError::CircuitNotInState { .. }));
    }

    #[test]
    fn server_disconn_moves_to_disconnected() {
        let s = transition(CircuitState::Connected, CommandId::ServerDisconn, Direction::Receiving, Role::Client).unwrap();
        assert_eq!(s, CircuitState::Disconnected);
    }

    #[test]
    fn close_from_disconnected_is_rejected() {
        let err = close(CircuitState::Disconnected).unwrap_err();
        assert_eq!(err, LocalProtocolError::Disconnected);
    }

    #[test]
    fn close_from_connected_succeeds() {
        assert_eq!(close(CircuitState::Connected).unwrap(), CircuitState::Disconnected);
    }
}
