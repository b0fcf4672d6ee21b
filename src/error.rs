// src/error.rs
//! The two error taxonomies of the protocol engine.
//!
//! `LocalProtocolError` is raised synchronously by anything on the send
//! side: the caller asked for a transition the local state machine
//! rejects. `RemoteProtocolError` is raised while parsing bytes off the
//! wire: the peer sent something the protocol does not allow. Neither
//! type retries or logs on its own behalf; both carry enough of the
//! offending message to let the caller report something useful.

use std::fmt;

use crate::header::Header;

/// Rejected locally, before anything was sent. State is left unchanged.
#[derive(Debug, Clone, PartialEq)]
pub enum LocalProtocolError {
    /// The command is not legal for `our_role` (e.g. a server trying to send
    /// a `CreateChanRequest`).
    WrongRole { command: &'static str, role: crate::types::Role },
    /// The channel is not in a state that permits this command.
    ChannelNotInState { cid: u32, expected: &'static str, actual: &'static str },
    /// The circuit is not in a state that permits this command.
    CircuitNotInState { expected: &'static str, actual: &'static str },
    /// An operation referenced an `ioid` with no matching in-flight entry.
    UnknownIoid(u32),
    /// An operation referenced a `subscriptionid` with no matching entry.
    UnknownSubscriptionId(u32),
    /// An operation addressed a channel by `sid`, but the `sid` doesn't
    /// match the one assigned by `CreateChanResponse`.
    SidMismatch { expected: u32, actual: u32 },
    /// An operation referenced a `cid` with no matching channel on this
    /// circuit.
    UnknownChannel(u32),
    /// Extended (24-byte) header requested on a circuit whose negotiated
    /// protocol version doesn't support it, or for a command that never
    /// allows extended form.
    ExtendedHeaderNotPermitted { version: u8, command: &'static str },
    /// A value didn't fit the wire encoding it was assigned to (e.g. a
    /// channel name longer than 40 bytes in a `SearchRequest`).
    ValueOutOfRange(&'static str),
    /// An outgoing datagram would exceed the broadcaster's configured MTU.
    DatagramTooLarge { size: usize, limit: usize },
    /// An enum-valued field (DBR type code, command id, ...) was given a
    /// value with no defined meaning.
    UnknownEnumValue { field: &'static str, value: u32 },
    /// The circuit has already moved to a terminal state; no further sends
    /// are possible.
    Disconnected,
}

impl fmt::Display for LocalProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocalProtocolError::WrongRole { command, role } => {
                write!(f, "{command} is not legal to send as {role:?}")
            }
            LocalProtocolError::ChannelNotInState { cid, expected, actual } => write!(
                f,
                "channel cid={cid} is in state {actual}, expected {expected}"
            ),
            LocalProtocolError::CircuitNotInState { expected, actual } => write!(
                f,
                "circuit is in state {actual}, expected {expected}"
            ),
            LocalProtocolError::UnknownIoid(ioid) => write!(f, "unknown ioid {ioid}"),
            LocalProtocolError::UnknownSubscriptionId(id) => {
                write!(f, "unknown subscriptionid {id}")
            }
            LocalProtocolError::SidMismatch { expected, actual } => write!(
                f,
                "sid mismatch: channel's sid is {expected}, command referenced {actual}"
            ),
            LocalProtocolError::UnknownChannel(cid) => write!(f, "unknown cid {cid}"),
            LocalProtocolError::ExtendedHeaderNotPermitted { version, command } => write!(
                f,
                "extended header not permitted for {command} at protocol version {version}"
            ),
            LocalProtocolError::ValueOutOfRange(what) => write!(f, "value out of range: {what}"),
            LocalProtocolError::DatagramTooLarge { size, limit } => write!(
                f,
                "datagram of {size} bytes exceeds configured limit of {limit} bytes"
            ),
            LocalProtocolError::UnknownEnumValue { field, value } => {
                write!(f, "unknown value {value} for {field}")
            }
            LocalProtocolError::Disconnected => write!(f, "circuit is disconnected"),
        }
    }
}

impl std::error::Error for LocalProtocolError {}

/// Rejected after parsing bytes from the peer. Moves the relevant state
/// machine to `FAILED`/`DISCONNECTED`; the caller must close the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteProtocolError {
    /// Header bytes didn't parse (e.g. extended-header sentinel without the
    /// trailing 8 bytes actually present).
    MalformedHeader(String),
    /// The declared payload length disagreed with what followed it.
    PayloadLengthMismatch { expected: usize, actual: usize },
    /// The peer used an extended header where the command or negotiated
    /// version doesn't allow it.
    ExtendedHeaderNotPermitted { header: Header },
    /// `command` field didn't match any known command id.
    UnknownCommand(u16),
    /// The command is well-formed but illegal in the current state.
    CommandNotPermitted { command: &'static str, state: &'static str },
    /// The command is not legal for the peer's role.
    RoleMismatch { command: &'static str },
    /// A name field (channel name, host name, ...) was not NUL-padded to an
    /// 8-byte boundary.
    BadNamePadding,
    /// A DBR or command enum field carried a value with no defined meaning.
    UnknownEnumValue { field: &'static str, value: u32 },
}

impl fmt::Display for RemoteProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteProtocolError::MalformedHeader(msg) => write!(f, "malformed header: {msg}"),
            RemoteProtocolError::PayloadLengthMismatch { expected, actual } => write!(
                f,
                "payload length mismatch: expected {expected} bytes, got {actual}"
            ),
            RemoteProtocolError::ExtendedHeaderNotPermitted { header } => write!(
                f,
                "extended header not permitted for command {}",
                header.command
            ),
            RemoteProtocolError::UnknownCommand(id) => write!(f, "unknown command id {id}"),
            RemoteProtocolError::CommandNotPermitted { command, state } => write!(
                f,
                "{command} is not permitted in state {state}"
            ),
            RemoteProtocolError::RoleMismatch { command } => {
                write!(f, "{command} is not legal from this peer's role")
            }
            RemoteProtocolError::BadNamePadding => {
                write!(f, "name field is not NUL-padded to an 8-byte boundary")
            }
            RemoteProtocolError::UnknownEnumValue { field, value } => {
                write!(f, "unknown value {value} for {field}")
            }
        }
    }
}

impl std::error::Error for RemoteProtocolError {}
