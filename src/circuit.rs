// src/circuit.rs
//! `VirtualCircuit`: the TCP-oriented state machine pairing one circuit's
//! worth of channels, in-flight requests, and subscriptions with the
//! header/command codec.
//!
//! Like the rest of this crate, a circuit never touches a socket. Callers
//! feed it bytes they read themselves and get back commands plus a byte
//! count consumed; they feed it commands to send and get back bytes to
//! write themselves. See [`crate::command::Command::decode`] for why
//! decoded commands borrow the caller's buffer rather than an internal one.

use std::collections::HashMap;

use crate::access::AccessRights;
use crate::channel::Channel;
use crate::channel_state::{self, ChannelState};
use crate::circuit_state::{self, CircuitState};
use crate::command::{Command, CommandId};
use crate::config::CircuitConfig;
use crate::dbr::DbrType;
use crate::error::{LocalProtocolError, RemoteProtocolError};
use crate::header::Header;
use crate::types::{default_starting_offset, Direction, IdAllocator, Role};

/// One in-flight request keyed by `ioid`: which channel it was issued
/// against, so the response can be matched back up without the caller
/// having to track it separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingTransfer {
    cid: u32,
}

/// One active subscription keyed by `subscriptionid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingSubscription {
    cid: u32,
    data_type: DbrType,
    /// Set once an `EventCancelRequest` has been seen for this
    /// subscription. A zero-length `EventAddResponse` that arrives while
    /// this is set is the cancel acknowledgement, not a data update (§9) —
    /// see `reclassify_cancel_ack`.
    cancelling: bool,
}

#[derive(Debug)]
pub struct VirtualCircuit {
    pub our_role: Role,
    their_role: Role,
    config: CircuitConfig,
    state: CircuitState,
    /// Protocol version we sent in our own `VersionRequest`/`VersionResponse`.
    our_version: u8,
    /// Protocol version the peer reported. `None` until their half of the
    /// handshake has been observed.
    their_version: Option<u8>,

    channels_by_cid: HashMap<u32, Channel>,
    cid_by_sid: HashMap<u32, u32>,
    cid_by_name: HashMap<String, u32>,

    cid_allocator: IdAllocator,
    ioid_allocator: IdAllocator,
    subscriptionid_allocator: IdAllocator,

    pending_transfers: HashMap<u32, PendingTransfer>,
    pending_subscriptions: HashMap<u32, PendingSubscription>,
}

impl VirtualCircuit {
    /// Construct a new circuit. `peer_address` seeds the id allocators'
    /// starting offsets deterministically (§9); pass the same value again
    /// after a reconnect only if avoiding id reuse across reconnects
    /// doesn't matter for your use case.
    pub fn new(our_role: Role, peer_address: &str, config: CircuitConfig) -> Self {
        let base = default_starting_offset(peer_address, our_role);
        VirtualCircuit {
            our_role,
            their_role: our_role.peer(),
            our_version: config.protocol_version,
            their_version: None,
            state: CircuitState::Idle,
            config,
            channels_by_cid: HashMap::new(),
            cid_by_sid: HashMap::new(),
            cid_by_name: HashMap::new(),
            cid_allocator: IdAllocator::new(base),
            ioid_allocator: IdAllocator::new(base.wrapping_add(1)),
            subscriptionid_allocator: IdAllocator::new(base.wrapping_add(2)),
        }
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }

    pub fn channel(&self, cid: u32) -> Option<&Channel> {
        self.channels_by_cid.get(&cid)
    }

    /// Negotiated protocol version: the lower of what we offered and what
    /// the peer offered, once both are known.
    pub fn negotiated_version(&self) -> Option<u8> {
        self.their_version.map(|theirs| self.our_version.min(theirs))
    }

    /// Allocate a new channel, returning its `cid`. Does not send anything;
    /// the caller still needs to `send` a `CreateChanRequest`.
    pub fn new_channel(&mut self, name: impl Into<String>) -> u32 {
        let cid = self.cid_allocator.next();
        let name = name.into();
        self.cid_by_name.insert(name.clone(), cid);
        self.channels_by_cid.insert(cid, Channel::new(name, cid));
        cid
    }

    pub fn new_ioid(&mut self) -> u32 {
        self.ioid_allocator.next()
    }

    pub fn new_subscriptionid(&mut self) -> u32 {
        self.subscriptionid_allocator.next()
    }

    /// Encode `command` for sending, updating all local state as if it had
    /// gone out on the wire (circuit state, channel state, pending-request
    /// bookkeeping).
    pub fn send(&mut self, command: &Command<'_>) -> Result<Vec<u8>, LocalProtocolError> {
        if command.sender_role() != self.our_role {
            return Err(LocalProtocolError::WrongRole {
                command: command.command_id().name(),
                role: self.our_role,
            });
        }
        self.apply_local(command, Direction::Sending)?;
        let version = self.negotiated_version().unwrap_or(self.our_version);
        command.encode(version)
    }

    /// Try to decode one command from the front of `bytes`. Returns
    /// `Ok(None)` when more bytes are needed (mirrors [`Header::decode`]'s
    /// `NEED_DATA` contract); otherwise returns the command plus how many
    /// bytes of `bytes` it consumed, which the caller must discard before
    /// the next call.
    pub fn next_command<'a>(
        &mut self,
        bytes: &'a [u8],
    ) -> Result<Option<(Command<'a>, usize)>, RemoteProtocolError> {
        let extended = Header::wire_form_is_extended(bytes);
        let (header, header_len) = match Header::decode(bytes)? {
            Some(parsed) => parsed,
            None => return Ok(None),
        };
        let payload_end = header_len + header.payload_size as usize;
        if bytes.len() < payload_end {
            return Ok(None);
        }
        let payload = &bytes[header_len..payload_end];
        let negotiated = self.negotiated_version().unwrap_or(self.our_version);
        let command = Command::decode(&header, payload, self.their_role, negotiated, extended)?;
        let command = self.reclassify_cancel_ack(command);
        self.apply_remote(&command)
            .map_err(|e| RemoteProtocolError::CommandNotPermitted {
                command: command.command_id().name(),
                state: match e {
                    LocalProtocolError::CircuitNotInState { actual, .. } => actual,
                    LocalProtocolError::ChannelNotInState { actual, .. } => actual,
                    _ => "unknown",
                },
            })?;
        Ok(Some((command, payload_end)))
    }

    fn apply_local(&mut self, command: &Command<'_>, direction: Direction) -> Result<(), LocalProtocolError> {
        self.state = circuit_state::transition(self.state, command.command_id(), direction, self.our_role)?;
        if self.state == CircuitState::Disconnected {
            self.force_all_channels_closed();
        }
        self.update_bookkeeping(command, direction)
    }

    fn apply_remote(&mut self, command: &Command<'_>) -> Result<(), LocalProtocolError> {
        self.state =
            circuit_state::transition(self.state, command.command_id(), Direction::Receiving, self.our_role)?;
        if self.state == CircuitState::Disconnected {
            self.force_all_channels_closed();
        }
        if let Command::VersionResponse { version } = command {
            self.note_their_version(*version as u8);
        }
        if let Command::VersionRequest { version, .. } = command {
            if self.our_role == Role::Server {
                self.note_their_version(*version as u8);
            }
        }
        self.update_bookkeeping(command, Direction::Receiving)
    }

    /// `Command::decode` has no subscription context and always decodes
    /// wire id 1 from a server as `EventAddResponse`, even when its payload
    /// is empty. Reinterpret it as the terminal `EventCancelResponse` when
    /// it's a zero-length response for a subscription we already marked
    /// cancelling — the only distinguishing signal the wire gives us (§9).
    fn reclassify_cancel_ack<'a>(&self, command: Command<'a>) -> Command<'a> {
        if let Command::EventAddResponse { sid, subscriptionid, payload } = &command {
            if crate::command::value_count(&payload.value) == 0 {
                if let Some(pending) = self.pending_subscriptions.get(subscriptionid) {
                    if pending.cancelling {
                        return Command::EventCancelResponse {
                            data_type: pending.data_type,
                            sid: *sid,
                            subscriptionid: *subscriptionid,
                        };
                    }
                }
            }
        }
        command
    }

    fn note_their_version(&mut self, version: u8) {
        self.their_version = Some(version);
        if version < self.our_version {
            tracing::warn!(
                their_version = version,
                our_version = self.our_version,
                "peer negotiated down to an older protocol version"
            );
        }
        if version < self.config.minimum_protocol_version {
            tracing::warn!(
                their_version = version,
                minimum = self.config.minimum_protocol_version,
                "peer version below the circuit's minimum; disconnecting"
            );
            self.state = CircuitState::Disconnected;
            self.force_all_channels_closed();
        }
    }

    /// Move every owned channel to `Closed`, per §4.4: "On
    /// DISCONNECTED, all owned channels are forced to CLOSED." Channels
    /// already in a terminal state (`Closed`/`Failed`) are left alone.
    fn force_all_channels_closed(&mut self) {
        for channel in self.channels_by_cid.values_mut() {
            if !channel.state.is_terminal() {
                channel.state = ChannelState::Closed;
            }
        }
    }

    /// Tear the circuit down locally, as the caller electing to drop the
    /// connection rather than in response to any particular command
    /// (§4.4, §5: "the caller may discard a `VirtualCircuit` at any time").
    /// Forces every owned channel to `Closed` and moves the circuit to
    /// `Disconnected`; a circuit already disconnected rejects this with
    /// `LocalProtocolError::Disconnected`.
    pub fn close(&mut self) -> Result<(), LocalProtocolError> {
        self.state = circuit_state::close(self.state)?;
        self.force_all_channels_closed();
        Ok(())
    }

    fn channel_mut_by_cid(&mut self, cid: u32) -> Result<&mut Channel, LocalProtocolError> {
        self.channels_by_cid
            .get_mut(&cid)
            .ok_or(LocalProtocolError::UnknownChannel(cid))
    }

    fn transition_channel(
        &mut self,
        cid: u32,
        command: CommandId,
        direction: Direction,
    ) -> Result<(), LocalProtocolError> {
        let role = self.our_role;
        let channel = self.channel_mut_by_cid(cid)?;
        channel.state = channel_state::transition(channel.state, command, direction, role)
            .map_err(|e| match e {
                LocalProtocolError::ChannelNotInState { expected, actual, .. } => {
                    LocalProtocolError::ChannelNotInState { cid, expected, actual }
                }
                other => other,
            })?;
        Ok(())
    }

    fn update_bookkeeping(&mut self, command: &Command<'_>, direction: Direction) -> Result<(), LocalProtocolError> {
        use Command::*;
        match command {
            CreateChanRequest { cid, name, .. } => {
                // The server doesn't pre-allocate `cid`s itself; the first
                // time it sees one is in this request, so it opens the
                // channel's bookkeeping entry here rather than requiring a
                // separate `new_channel` call on that side.
                self.channels_by_cid
                    .entry(*cid)
                    .or_insert_with(|| Channel::new(*name, *cid));
                self.transition_channel(*cid, CommandId::CreateChan, direction)?;
            }
            CreateChanResponse { cid, sid, native_data_type, native_data_count } => {
                self.transition_channel(*cid, CommandId::CreateChan, direction)?;
                self.cid_by_sid.insert(*sid, *cid);
                let channel = self.channel_mut_by_cid(*cid)?;
                channel.sid = Some(*sid);
                channel.native_data_type = Some(*native_data_type);
                channel.native_data_count = Some(*native_data_count);
            }
            CreateChFailResponse { cid } => {
                self.transition_channel(*cid, CommandId::CreateChFail, direction)?;
            }
            ClearChannelRequest { cid, .. } | ClearChannelResponse { cid, .. } => {
                self.transition_channel(*cid, CommandId::ClearChannel, direction)?;
            }
            AccessRightsResponse { cid, access_rights } => {
                let channel = self.channel_mut_by_cid(*cid)?;
                channel.access_rights = Some(AccessRights::from_bits_truncate(*access_rights));
            }
            ReadNotifyRequest { sid, ioid, .. } | WriteNotifyRequest { sid, ioid, .. } => {
                let cid = *self
                    .cid_by_sid
                    .get(sid)
                    .ok_or(LocalProtocolError::SidMismatch { expected: 0, actual: *sid })?;
                self.transition_channel(cid, command.command_id(), direction)?;
                self.pending_transfers.insert(*ioid, PendingTransfer { cid });
            }
            ReadNotifyResponse { ioid, .. } | WriteNotifyResponse { ioid, .. } => {
                let cid = self
                    .pending_transfers
                    .remove(ioid)
                    .ok_or(LocalProtocolError::UnknownIoid(*ioid))?
                    .cid;
                self.transition_channel(cid, command.command_id(), direction)?;
            }
            EventAddRequest { data_type, sid, subscriptionid, .. } => {
                let cid = *self
                    .cid_by_sid
                    .get(sid)
                    .ok_or(LocalProtocolError::SidMismatch { expected: 0, actual: *sid })?;
                self.transition_channel(cid, CommandId::EventAdd, direction)?;
                self.pending_subscriptions.insert(
                    *subscriptionid,
                    PendingSubscription { cid, data_type: *data_type, cancelling: false },
                );
            }
            EventAddResponse { subscriptionid, .. } => {
                let cid = self
                    .pending_subscriptions
                    .get(subscriptionid)
                    .ok_or(LocalProtocolError::UnknownSubscriptionId(*subscriptionid))?
                    .cid;
                self.transition_channel(cid, CommandId::EventAdd, direction)?;
            }
            EventCancelRequest { subscriptionid, .. } => {
                let pending = self
                    .pending_subscriptions
                    .get_mut(subscriptionid)
                    .ok_or(LocalProtocolError::UnknownSubscriptionId(*subscriptionid))?;
                let cid = pending.cid;
                pending.cancelling = true;
                self.transition_channel(cid, CommandId::EventCancel, direction)?;
            }
            EventCancelResponse { subscriptionid, .. } => {
                let cid = self
                    .pending_subscriptions
                    .remove(subscriptionid)
                    .ok_or(LocalProtocolError::UnknownSubscriptionId(*subscriptionid))?
                    .cid;
                self.transition_channel(cid, CommandId::EventCancel, direction)?;
            }
            // A ServerDisconnResponse always disconnects the whole circuit
            // (circuit_state::transition already moved `self.state` to
            // `Disconnected` above, which forced every channel, including
            // the one named here, to `Closed`); there's no separate
            // per-channel transition to apply.
            ServerDisconnResponse { .. } => {}
            // §4.3/§7: an ErrorResponse scoped to a channel moves that
            // channel to FAILED without disconnecting the circuit. It can
            // arrive while the channel is in any non-terminal state, so
            // this sets the state directly rather than going through
            // `channel_state::transition`'s table (mirroring
            // `force_all_channels_closed`'s wildcard-from-any-state shape).
            // When the replayed request header names an ioid- or
            // subscriptionid-bearing command, the matching in-flight entry
            // is dropped too, since the operation it was tracking will
            // never get its own response now.
            ErrorResponse { cid, request_header, .. } => {
                let channel = self.channel_mut_by_cid(*cid)?;
                if !channel.state.is_terminal() {
                    channel.state = ChannelState::Failed;
                }
                match CommandId::from_wire(request_header.command) {
                    Ok(CommandId::ReadNotify) | Ok(CommandId::WriteNotify) | Ok(CommandId::Read) | Ok(CommandId::Write) => {
                        self.pending_transfers.remove(&request_header.parameter2);
                    }
                    Ok(CommandId::EventAdd) | Ok(CommandId::EventCancel) => {
                        self.pending_subscriptions.remove(&request_header.parameter2);
                    }
                    _ => {}
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// Look up which channel a native DBR type belongs to, handy when building
/// a `ReadNotifyRequest`/`WriteNotifyRequest` for a channel the caller only
/// has the `cid` for.
pub fn native_type_of(circuit: &VirtualCircuit, cid: u32) -> Option<DbrType> {
    circuit.channel(cid).and_then(|c| c.native_data_type)
}
