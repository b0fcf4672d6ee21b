// src/channel_state.rs
//! The per-channel state machine (one instance per `cid`), driven by the
//! commands in [`crate::command`]. Transitions are expressed as a table
//! keyed by `(state, command)`, checked independently for each [`Role`] —
//! this mirrors the command-permission tables in [`crate::circuit_state`]
//! rather than scattering the same logic across per-command handlers.

use crate::command::CommandId;
use crate::error::LocalProtocolError;
use crate::types::{Direction, Role};

/// Lifecycle state of one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelState {
    /// Client has allocated a `cid` but not yet sent `CreateChanRequest`
    /// (or, on the server, not yet received one).
    AllocatedCid,
    /// `CreateChanRequest` sent/received; waiting for `CreateChanResponse`
    /// or `CreateChFailResponse`.
    AwaitCreateChanResponse,
    /// Channel created; reads, writes, and subscriptions are permitted.
    Connected,
    /// `ClearChannelRequest` sent/received; waiting for
    /// `ClearChannelResponse` before the channel is fully gone.
    AwaitClearChannelResponse,
    /// Channel closed by mutual agreement.
    Closed,
    /// Peer violated the protocol or the circuit disconnected out from
    /// under this channel; no further transitions are possible.
    Failed,
}

impl ChannelState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ChannelState::Closed | ChannelState::Failed)
    }

    pub const fn name(self) -> &'static str {
        match self {
            ChannelState::AllocatedCid => "AllocatedCid",
            ChannelState::AwaitCreateChanResponse => "AwaitCreateChanResponse",
            ChannelState::Connected => "Connected",
            ChannelState::AwaitClearChannelResponse => "AwaitClearChannelResponse",
            ChannelState::Closed => "Closed",
            ChannelState::Failed => "Failed",
        }
    }
}

/// Commands which read/write/subscribe operations are built from; permitted
/// only in [`ChannelState::Connected`].
fn is_data_command(command: CommandId) -> bool {
    matches!(
        command,
        CommandId::Read
            | CommandId::ReadNotify
            | CommandId::Write
            | CommandId::WriteNotify
            | CommandId::EventAdd
            | CommandId::EventCancel
            | CommandId::AccessRights
    )
}

/// Advance a channel's state machine for `command` travelling in
/// `direction`, as observed by `role` (the role *we* are playing on this
/// circuit, not the sender).
pub fn transition(
    state: ChannelState,
    command: CommandId,
    direction: Direction,
    role: Role,
) -> Result<ChannelState, LocalProtocolError> {
    use ChannelState::*;
    use CommandId::*;

    if state.is_terminal() {
        return Err(LocalProtocolError::ChannelNotInState {
            cid: 0,
            expected: "non-terminal",
            actual: state.name(),
        });
    }

    let next = match (state, command, direction, role) {
        (AllocatedCid, CreateChan, Direction::Sending, Role::Client) => AwaitCreateChanResponse,
        (AllocatedCid, CreateChan, Direction::Receiving, Role::Server) => AwaitCreateChanResponse,

        (AwaitCreateChanResponse, CreateChan, Direction::Receiving, Role::Client) => Connected,
        (AwaitCreateChanResponse, CreateChan, Direction::Sending, Role::Server) => Connected,
        (AwaitCreateChanResponse, CreateChFail, Direction::Receiving, Role::Client) => Failed,
        (AwaitCreateChanResponse, CreateChFail, Direction::Sending, Role::Server) => Failed,

        (Connected, ClearChannel, Direction::Sending, Role::Client) => AwaitClearChannelResponse,
        (Connected, ClearChannel, Direction::Receiving, Role::Server) => AwaitClearChannelResponse,
        (Connected, command, _, _) if is_data_command(command) => Connected,

        (AwaitClearChannelResponse, ClearChannel, Direction::Receiving, Role::Client) => Closed,
        (AwaitClearChannelResponse, ClearChannel, Direction::Sending, Role::Server) => Closed,

        (_, ServerDisconn, Direction::Receiving, Role::Client) => Closed,

        _ => {
            return Err(LocalProtocolError::ChannelNotInState {
                cid: 0,
                expected: "a state permitting this command",
                actual: state.name(),
            })
        }
    };
    Ok(next)
}
