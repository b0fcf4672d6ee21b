// src/command.rs
//! The ~28 CA commands: typed wrappers around [`Header`] plus whatever
//! payload each one carries.
//!
//! Command ids 5, 7, 16, and 25 were assigned in early protocol revisions
//! and have never been used; they decode as [`RemoteProtocolError::UnknownCommand`]
//! like any other unrecognized id.

use std::fmt;

use crate::dbr::{self, DbrType, Metadata, Payload, Value};
use crate::error::{LocalProtocolError, RemoteProtocolError};
use crate::header::{Header, HEADER_SIZE, MIN_VERSION_FOR_EXTENDED_HEADER};
use crate::types::Role;

/// NUL-pad `s` to a multiple of 8 bytes, with at least one terminating NUL.
fn encode_padded_string(s: &str) -> Vec<u8> {
    let mut bytes = s.as_bytes().to_vec();
    bytes.push(0);
    let pad = dbr::pad_len(bytes.len());
    bytes.extend(std::iter::repeat(0u8).take(pad));
    bytes
}

/// Decode a NUL-padded string field, trimming at the first NUL.
fn decode_padded_string(bytes: &[u8]) -> Result<&str, RemoteProtocolError> {
    if bytes.is_empty() || bytes.len() % 8 != 0 {
        return Err(RemoteProtocolError::BadNamePadding);
    }
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    std::str::from_utf8(&bytes[..end]).map_err(|_| RemoteProtocolError::BadNamePadding)
}

/// Every CA command id in use. Named after the request/response pair it
/// identifies rather than the direction, since most ids are shared between
/// the two (the direction is determined by who is allowed to send it, not
/// by a distinct id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandId {
    Version = 0,
    EventAdd = 1,
    EventCancel = 2,
    Read = 3,
    Write = 4,
    Search = 6,
    EventsOff = 8,
    EventsOn = 9,
    ReadSync = 10,
    Error = 11,
    ClearChannel = 12,
    RsrvIsUp = 13,
    NotFound = 14,
    ReadNotify = 15,
    RepeaterConfirm = 17,
    CreateChan = 18,
    WriteNotify = 19,
    ClientName = 20,
    HostName = 21,
    AccessRights = 22,
    Echo = 23,
    RepeaterRegister = 24,
    CreateChFail = 26,
    ServerDisconn = 27,
}

impl CommandId {
    pub fn from_wire(id: u16) -> Result<CommandId, RemoteProtocolError> {
        use CommandId::*;
        Ok(match id {
            0 => Version,
            1 => EventAdd,
            2 => EventCancel,
            3 => Read,
            4 => Write,
            6 => Search,
            8 => EventsOff,
            9 => EventsOn,
            10 => ReadSync,
            11 => Error,
            12 => ClearChannel,
            13 => RsrvIsUp,
            14 => NotFound,
            15 => ReadNotify,
            17 => RepeaterConfirm,
            18 => CreateChan,
            19 => WriteNotify,
            20 => ClientName,
            21 => HostName,
            22 => AccessRights,
            23 => Echo,
            24 => RepeaterRegister,
            26 => CreateChFail,
            27 => ServerDisconn,
            other => return Err(RemoteProtocolError::UnknownCommand(other)),
        })
    }

    /// Commands the protocol allows to use the extended (24-byte) header
    /// when the payload or element count overflows 16 bits. Practically
    /// this is only the bulk-transfer commands.
    fn allows_extended_header(self) -> bool {
        matches!(
            self,
            CommandId::EventAdd | CommandId::Read | CommandId::Write
                | CommandId::ReadNotify | CommandId::WriteNotify
        )
    }

    pub fn name(self) -> &'static str {
        use CommandId::*;
        match self {
            Version => "Version",
            EventAdd => "EventAdd",
            EventCancel => "EventCancel",
            Read => "Read",
            Write => "Write",
            Search => "Search",
            EventsOff => "EventsOff",
            EventsOn => "EventsOn",
            ReadSync => "ReadSync",
            Error => "Error",
            ClearChannel => "ClearChannel",
            RsrvIsUp => "RsrvIsUp",
            NotFound => "NotFound",
            ReadNotify => "ReadNotify",
            RepeaterConfirm => "RepeaterConfirm",
            CreateChan => "CreateChan",
            WriteNotify => "WriteNotify",
            ClientName => "ClientName",
            HostName => "HostName",
            AccessRights => "AccessRights",
            Echo => "Echo",
            RepeaterRegister => "RepeaterRegister",
            CreateChFail => "CreateChFail",
            ServerDisconn => "ServerDisconn",
        }
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One fully decoded/to-be-encoded CA command, still borrowing its wire
/// buffer where it carries DBR data.
#[derive(Debug, Clone, PartialEq)]
pub enum Command<'a> {
    VersionRequest { priority: u16, version: u16 },
    VersionResponse { version: u16 },
    EventAddRequest { data_type: DbrType, data_count: u32, sid: u32, subscriptionid: u32, mask: u16 },
    EventAddResponse { sid: u32, subscriptionid: u32, payload: Payload<'a> },
    EventCancelRequest { data_type: DbrType, sid: u32, subscriptionid: u32 },
    EventCancelResponse { data_type: DbrType, sid: u32, subscriptionid: u32 },
    ReadRequest { data_type: DbrType, data_count: u32, sid: u32, ioid: u32 },
    ReadResponse { data_type: DbrType, sid_or_status: u32, ioid: u32, payload: Payload<'a> },
    WriteRequest { sid: u32, payload: Payload<'a> },
    SearchRequest { reply_required: bool, minor_version: u16, cid: u32, name: &'a str },
    SearchResponse { tcp_port: u16, cid: u32, minor_version: Option<u16> },
    EventsOffRequest,
    EventsOnRequest,
    ReadSyncRequest,
    ErrorResponse { cid: u32, status: u32, request_header: Header, message: &'a str },
    ClearChannelRequest { sid: u32, cid: u32 },
    ClearChannelResponse { sid: u32, cid: u32 },
    RsrvIsUpResponse { server_minor_version: u16, beacon_id: u32, server_port: u16 },
    NotFoundResponse { reply_required: bool, cid: u32 },
    ReadNotifyRequest { data_type: DbrType, data_count: u32, sid: u32, ioid: u32 },
    ReadNotifyResponse { data_type: DbrType, status: u32, ioid: u32, payload: Payload<'a> },
    RepeaterConfirmResponse { repeater_address: u32 },
    CreateChanRequest { cid: u32, client_minor_version: u16, name: &'a str },
    CreateChanResponse { native_data_type: DbrType, native_data_count: u32, cid: u32, sid: u32 },
    WriteNotifyRequest { data_type: DbrType, data_count: u32, sid: u32, ioid: u32, payload: Payload<'a> },
    WriteNotifyResponse { data_type: DbrType, status: u32, ioid: u32 },
    ClientNameRequest { name: &'a str },
    HostNameRequest { name: &'a str },
    AccessRightsResponse { cid: u32, access_rights: u32 },
    EchoRequest,
    EchoResponse,
    RepeaterRegisterRequest { client_listening_port: u16 },
    CreateChFailResponse { cid: u32 },
    ServerDisconnResponse { cid: u32 },
}

impl<'a> Command<'a> {
    pub fn command_id(&self) -> CommandId {
        use Command::*;
        match self {
            VersionRequest { .. } | VersionResponse { .. } => CommandId::Version,
            // A cancel acknowledgement reuses EventAdd's wire id with a
            // zero-length payload; only the request has its own id.
            EventAddRequest { .. } | EventAddResponse { .. } | EventCancelResponse { .. } => {
                CommandId::EventAdd
            }
            EventCancelRequest { .. } => CommandId::EventCancel,
            ReadRequest { .. } | ReadResponse { .. } => CommandId::Read,
            WriteRequest { .. } => CommandId::Write,
            SearchRequest { .. } | SearchResponse { .. } => CommandId::Search,
            EventsOffRequest => CommandId::EventsOff,
            EventsOnRequest => CommandId::EventsOn,
            ReadSyncRequest => CommandId::ReadSync,
            ErrorResponse { .. } => CommandId::Error,
            ClearChannelRequest { .. } | ClearChannelResponse { .. } => CommandId::ClearChannel,
            RsrvIsUpResponse { .. } => CommandId::RsrvIsUp,
            NotFoundResponse { .. } => CommandId::NotFound,
            ReadNotifyRequest { .. } | ReadNotifyResponse { .. } => CommandId::ReadNotify,
            RepeaterConfirmResponse { .. } => CommandId::RepeaterConfirm,
            CreateChanRequest { .. } | CreateChanResponse { .. } => CommandId::CreateChan,
            WriteNotifyRequest { .. } | WriteNotifyResponse { .. } => CommandId::WriteNotify,
            ClientNameRequest { .. } => CommandId::ClientName,
            HostNameRequest { .. } => CommandId::HostName,
            AccessRightsResponse { .. } => CommandId::AccessRights,
            EchoRequest | EchoResponse => CommandId::Echo,
            RepeaterRegisterRequest { .. } => CommandId::RepeaterRegister,
            CreateChFailResponse { .. } => CommandId::CreateChFail,
            ServerDisconnResponse { .. } => CommandId::ServerDisconn,
        }
    }

    /// Which role is allowed to send this particular command.
    pub fn sender_role(&self) -> Role {
        use Command::*;
        match self {
            VersionRequest { .. } | EventAddRequest { .. } | EventCancelRequest { .. }
            | ReadRequest { .. } | WriteRequest { .. } | SearchRequest { .. }
            | EventsOffRequest | EventsOnRequest | ReadSyncRequest
            | ClearChannelRequest { .. } | ReadNotifyRequest { .. } | CreateChanRequest { .. }
            | WriteNotifyRequest { .. } | ClientNameRequest { .. } | HostNameRequest { .. }
            | EchoRequest | RepeaterRegisterRequest { .. } => Role::Client,

            VersionResponse { .. } | EventAddResponse { .. } | EventCancelResponse { .. }
            | ReadResponse { .. } | SearchResponse { .. } | ErrorResponse { .. }
            | ClearChannelResponse { .. } | RsrvIsUpResponse { .. } | NotFoundResponse { .. }
            | ReadNotifyResponse { .. } | RepeaterConfirmResponse { .. }
            | CreateChanResponse { .. } | WriteNotifyResponse { .. }
            | AccessRightsResponse { .. } | EchoResponse | CreateChFailResponse { .. }
            | ServerDisconnResponse { .. } => Role::Server,
        }
    }

    /// Encode this command to its wire header + payload bytes.
    ///
    /// `negotiated_version` gates whether an oversized payload is allowed
    /// to escape into the extended header form at all; if it isn't and the
    /// payload is too large, this returns `LocalProtocolError::ExtendedHeaderNotPermitted`
    /// rather than silently producing bytes the peer would reject.
    pub fn encode(&self, negotiated_version: u8) -> Result<Vec<u8>, LocalProtocolError> {
        let (header, payload) = self.to_header_and_payload()?;
        if header.needs_extended_form() {
            let id = self.command_id();
            if negotiated_version < MIN_VERSION_FOR_EXTENDED_HEADER || !id.allows_extended_header() {
                return Err(LocalProtocolError::ExtendedHeaderNotPermitted {
                    version: negotiated_version,
                    command: id.name(),
                });
            }
        }
        let mut out = header.encode();
        out.extend_from_slice(&payload);
        Ok(out)
    }

    fn to_header_and_payload(&self) -> Result<(Header, Vec<u8>), LocalProtocolError> {
        use Command::*;
        let h = |command: u16, data_type: u32, data_count: u32, p1: u32, p2: u32, payload: Vec<u8>| {
            (
                Header { command, payload_size: payload.len() as u32, data_type: data_type as u16, data_count, parameter1: p1, parameter2: p2 },
                payload,
            )
        };
        Ok(match self {
            VersionRequest { priority, version } => {
                h(0, *priority as u32, *version as u32, 0, 0, Vec::new())
            }
            VersionResponse { version } => h(0, 0, *version as u32, 0, 0, Vec::new()),
            EventAddRequest { data_type, data_count, sid, subscriptionid, mask } => {
                let mut payload = vec![0u8; 12];
                payload.extend_from_slice(&mask.to_be_bytes());
                payload.extend_from_slice(&0u16.to_be_bytes());
                h(1, data_type.code() as u32, *data_count, *sid, *subscriptionid, payload)
            }
            EventAddResponse { sid, subscriptionid, payload } => {
                let dbr_type = payload_dbr_type(payload);
                let bytes = dbr::encode(dbr_type, payload)?;
                let count = value_count(&payload.value);
                h(1, dbr_type.code() as u32, count, *sid, *subscriptionid, bytes)
            }
            EventCancelRequest { data_type, sid, subscriptionid } => {
                h(2, data_type.code() as u32, 0, *sid, *subscriptionid, Vec::new())
            }
            EventCancelResponse { data_type, sid, subscriptionid } => {
                h(1, data_type.code() as u32, 0, *sid, *subscriptionid, Vec::new())
            }
            ReadRequest { data_type, data_count, sid, ioid } => {
                h(3, data_type.code() as u32, *data_count, *sid, *ioid, Vec::new())
            }
            ReadResponse { data_type, sid_or_status, ioid, payload } => {
                let bytes = dbr::encode(*data_type, payload)?;
                let count = value_count(&payload.value);
                h(3, data_type.code() as u32, count, *sid_or_status, *ioid, bytes)
            }
            WriteRequest { sid, payload } => {
                let dbr_type = payload_dbr_type(payload);
                let bytes = dbr::encode(dbr_type, payload)?;
                let count = value_count(&payload.value);
                h(4, dbr_type.code() as u32, count, *sid, 0, bytes)
            }
            SearchRequest { reply_required, minor_version, cid, name } => {
                let reply_flag = if *reply_required { 10 } else { 5 };
                h(6, reply_flag, *minor_version as u32, *cid, *cid, encode_padded_string(name))
            }
            SearchResponse { tcp_port, cid, minor_version } => {
                let payload = match minor_version {
                    Some(v) => {
                        let mut p = v.to_be_bytes().to_vec();
                        p.extend_from_slice(&[0, 0]);
                        p
                    }
                    None => Vec::new(),
                };
                h(6, *tcp_port as u32, 0, 0xFFFF_FFFF, *cid, payload)
            }
            EventsOffRequest => h(8, 0, 0, 0, 0, Vec::new()),
            EventsOnRequest => h(9, 0, 0, 0, 0, Vec::new()),
            ReadSyncRequest => h(10, 0, 0, 0, 0, Vec::new()),
            ErrorResponse { cid, status, request_header, message } => {
                let mut payload = request_header.encode();
                // ErrorResponse always replays the *standard-form* request
                // header regardless of how the original was framed.
                payload.truncate(HEADER_SIZE);
                payload.extend_from_slice(&encode_padded_string(message));
                h(11, 0, 0, *cid, *status, payload)
            }
            ClearChannelRequest { sid, cid } => h(12, 0, 0, *sid, *cid, Vec::new()),
            ClearChannelResponse { sid, cid } => h(12, 0, 0, *sid, *cid, Vec::new()),
            RsrvIsUpResponse { server_minor_version, beacon_id, server_port } => {
                h(13, *server_minor_version as u32, *server_port as u32, *beacon_id, 0, Vec::new())
            }
            NotFoundResponse { reply_required, cid } => {
                let reply_flag = if *reply_required { 10 } else { 5 };
                h(14, reply_flag, 0, *cid, 0xFFFF_FFFF, Vec::new())
            }
            ReadNotifyRequest { data_type, data_count, sid, ioid } => {
                h(15, data_type.code() as u32, *data_count, *sid, *ioid, Vec::new())
            }
            ReadNotifyResponse { data_type, status, ioid, payload } => {
                let bytes = dbr::encode(*data_type, payload)?;
                let count = value_count(&payload.value);
                h(15, data_type.code() as u32, count, *status, *ioid, bytes)
            }
            RepeaterConfirmResponse { repeater_address } => h(17, 0, 0, *repeater_address, 0, Vec::new()),
            CreateChanRequest { cid, client_minor_version, name } => {
                h(18, 0, *client_minor_version as u32, *cid, *client_minor_version as u32, encode_padded_string(name))
            }
            CreateChanResponse { native_data_type, native_data_count, cid, sid } => h(
                18,
                native_data_type.code() as u32,
                *native_data_count,
                *cid,
                *sid,
                Vec::new(),
            ),
            WriteNotifyRequest { data_type, data_count, sid, ioid, payload } => {
                let bytes = dbr::encode(*data_type, payload)?;
                h(19, data_type.code() as u32, *data_count, *sid, *ioid, bytes)
            }
            WriteNotifyResponse { data_type, status, ioid } => {
                h(19, data_type.code() as u32, 0, *status, *ioid, Vec::new())
            }
            ClientNameRequest { name } => h(20, 0, 0, 0, 0, encode_padded_string(name)),
            HostNameRequest { name } => h(21, 0, 0, 0, 0, encode_padded_string(name)),
            AccessRightsResponse { cid, access_rights } => h(22, 0, 0, *cid, *access_rights, Vec::new()),
            EchoRequest => h(23, 0, 0, 0, 0, Vec::new()),
            EchoResponse => h(23, 0, 0, 0, 0, Vec::new()),
            RepeaterRegisterRequest { client_listening_port } => {
                h(24, 0, 0, *client_listening_port as u32, 0, Vec::new())
            }
            CreateChFailResponse { cid } => h(26, 0, 0, *cid, 0, Vec::new()),
            ServerDisconnResponse { cid } => h(27, 0, 0, *cid, 0, Vec::new()),
        })
    }

    /// Decode a command given its already-parsed header, the payload bytes
    /// that follow it (exactly `header.payload_size` bytes, already sliced
    /// by the caller), which role sent it, and the circuit's negotiated
    /// protocol version (used only to validate extended-header eligibility).
    pub fn decode(
        header: &Header,
        payload: &'a [u8],
        sender: Role,
        negotiated_version: u8,
        used_extended_wire_form: bool,
    ) -> Result<Command<'a>, RemoteProtocolError> {
        let id = CommandId::from_wire(header.command)?;
        if used_extended_wire_form
            && (negotiated_version < MIN_VERSION_FOR_EXTENDED_HEADER || !id.allows_extended_header())
        {
            return Err(RemoteProtocolError::ExtendedHeaderNotPermitted { header: *header });
        }

        Ok(match (id, sender) {
            (CommandId::Version, Role::Client) => Command::VersionRequest {
                priority: header.data_type,
                version: header.data_count as u16,
            },
            (CommandId::Version, Role::Server) => Command::VersionResponse {
                version: header.data_count as u16,
            },
            (CommandId::EventAdd, Role::Client) => {
                let data_type = DbrType::from_code(header.data_type)?;
                let mask = if payload.len() >= 14 {
                    u16::from_be_bytes([payload[12], payload[13]])
                } else {
                    0
                };
                Command::EventAddRequest {
                    data_type,
                    data_count: header.data_count,
                    sid: header.parameter1,
                    subscriptionid: header.parameter2,
                    mask,
                }
            }
            (CommandId::EventAdd, Role::Server) => {
                let data_type = DbrType::from_code(header.data_type)?;
                let decoded = dbr::decode(data_type, header.data_count, payload)?;
                Command::EventAddResponse {
                    sid: header.parameter1,
                    subscriptionid: header.parameter2,
                    payload: decoded,
                }
            }
            (CommandId::EventCancel, Role::Client) => Command::EventCancelRequest {
                data_type: DbrType::from_code(header.data_type)?,
                sid: header.parameter1,
                subscriptionid: header.parameter2,
            },
            // Servers never send command id 2 — the cancel acknowledgement
            // is wire-identical to a zero-length EventAddResponse (id 1).
            // See `VirtualCircuit::reclassify_cancel_ack`.
            (CommandId::EventCancel, Role::Server) => {
                return Err(RemoteProtocolError::RoleMismatch { command: id.name() })
            }
            (CommandId::Read, Role::Client) => Command::ReadRequest {
                data_type: DbrType::from_code(header.data_type)?,
                data_count: header.data_count,
                sid: header.parameter1,
                ioid: header.parameter2,
            },
            (CommandId::Read, Role::Server) => {
                let data_type = DbrType::from_code(header.data_type)?;
                let decoded = dbr::decode(data_type, header.data_count, payload)?;
                Command::ReadResponse {
                    data_type,
                    sid_or_status: header.parameter1,
                    ioid: header.parameter2,
                    payload: decoded,
                }
            }
            (CommandId::Write, Role::Client) => {
                let data_type = DbrType::from_code(header.data_type)?;
                let decoded = dbr::decode(data_type, header.data_count, payload)?;
                Command::WriteRequest { sid: header.parameter1, payload: decoded }
            }
            (CommandId::Write, Role::Server) => {
                return Err(RemoteProtocolError::RoleMismatch { command: id.name() })
            }
            (CommandId::Search, Role::Client) => {
                let name = decode_padded_string(payload)?;
                Command::SearchRequest {
                    reply_required: header.data_type == 10,
                    minor_version: header.data_count as u16,
                    cid: header.parameter1,
                    name,
                }
            }
            (CommandId::Search, Role::Server) => {
                let minor_version = if payload.len() >= 2 {
                    Some(u16::from_be_bytes([payload[0], payload[1]]))
                } else {
                    None
                };
                Command::SearchResponse {
                    tcp_port: header.data_type,
                    cid: header.parameter2,
                    minor_version,
                }
            }
            (CommandId::EventsOff, Role::Client) => Command::EventsOffRequest,
            (CommandId::EventsOff, Role::Server) => {
                return Err(RemoteProtocolError::RoleMismatch { command: id.name() })
            }
            (CommandId::EventsOn, Role::Client) => Command::EventsOnRequest,
            (CommandId::EventsOn, Role::Server) => {
                return Err(RemoteProtocolError::RoleMismatch { command: id.name() })
            }
            (CommandId::ReadSync, Role::Client) => Command::ReadSyncRequest,
            (CommandId::ReadSync, Role::Server) => {
                return Err(RemoteProtocolError::RoleMismatch { command: id.name() })
            }
            (CommandId::Error, Role::Server) => {
                if payload.len() < HEADER_SIZE {
                    return Err(RemoteProtocolError::PayloadLengthMismatch {
                        expected: HEADER_SIZE,
                        actual: payload.len(),
                    });
                }
                let (request_header, _) = Header::decode(&payload[..HEADER_SIZE])?
                    .ok_or_else(|| RemoteProtocolError::MalformedHeader("truncated replayed request header in ErrorResponse".into()))?;
                let message = decode_padded_string(&payload[HEADER_SIZE..])?;
                Command::ErrorResponse {
                    cid: header.parameter1,
                    status: header.parameter2,
                    request_header,
                    message,
                }
            }
            (CommandId::Error, Role::Client) => {
                return Err(RemoteProtocolError::RoleMismatch { command: id.name() })
            }
            (CommandId::ClearChannel, Role::Client) => Command::ClearChannelRequest {
                sid: header.parameter1,
                cid: header.parameter2,
            },
            (CommandId::ClearChannel, Role::Server) => Command::ClearChannelResponse {
                sid: header.parameter1,
                cid: header.parameter2,
            },
            (CommandId::RsrvIsUp, Role::Server) => Command::RsrvIsUpResponse {
                server_minor_version: header.data_type,
                beacon_id: header.parameter1,
                server_port: header.data_count as u16,
            },
            (CommandId::RsrvIsUp, Role::Client) => {
                return Err(RemoteProtocolError::RoleMismatch { command: id.name() })
            }
            (CommandId::NotFound, Role::Server) => Command::NotFoundResponse {
                reply_required: header.data_type == 10,
                cid: header.parameter1,
            },
            (CommandId::NotFound, Role::Client) => {
                return Err(RemoteProtocolError::RoleMismatch { command: id.name() })
            }
            (CommandId::ReadNotify, Role::Client) => Command::ReadNotifyRequest {
                data_type: DbrType::from_code(header.data_type)?,
                data_count: header.data_count,
                sid: header.parameter1,
                ioid: header.parameter2,
            },
            (CommandId::ReadNotify, Role::Server) => {
                let data_type = DbrType::from_code(header.data_type)?;
                let decoded = dbr::decode(data_type, header.data_count, payload)?;
                Command::ReadNotifyResponse {
                    data_type,
                    status: header.parameter1,
                    ioid: header.parameter2,
                    payload: decoded,
                }
            }
            (CommandId::RepeaterConfirm, Role::Server) => {
                Command::RepeaterConfirmResponse { repeater_address: header.parameter1 }
            }
            (CommandId::RepeaterConfirm, Role::Client) => {
                return Err(RemoteProtocolError::RoleMismatch { command: id.name() })
            }
            (CommandId::CreateChan, Role::Client) => {
                let name = decode_padded_string(payload)?;
                Command::CreateChanRequest {
                    cid: header.parameter1,
                    client_minor_version: header.parameter2 as u16,
                    name,
                }
            }
            (CommandId::CreateChan, Role::Server) => Command::CreateChanResponse {
                native_data_type: DbrType::from_code(header.data_type)?,
                native_data_count: header.data_count,
                cid: header.parameter1,
                sid: header.parameter2,
            },
            (CommandId::WriteNotify, Role::Client) => {
                let data_type = DbrType::from_code(header.data_type)?;
                let decoded = dbr::decode(data_type, header.data_count, payload)?;
                Command::WriteNotifyRequest {
                    data_type,
                    data_count: header.data_count,
                    sid: header.parameter1,
                    ioid: header.parameter2,
                    payload: decoded,
                }
            }
            (CommandId::WriteNotify, Role::Server) => Command::WriteNotifyResponse {
                data_type: DbrType::from_code(header.data_type)?,
                status: header.parameter1,
                ioid: header.parameter2,
            },
            (CommandId::ClientName, Role::Client) => {
                Command::ClientNameRequest { name: decode_padded_string(payload)? }
            }
            (CommandId::ClientName, Role::Server) => {
                return Err(RemoteProtocolError::RoleMismatch { command: id.name() })
            }
            (CommandId::HostName, Role::Client) => {
                Command::HostNameRequest { name: decode_padded_string(payload)? }
            }
            (CommandId::HostName, Role::Server) => {
                return Err(RemoteProtocolError::RoleMismatch { command: id.name() })
            }
            (CommandId::AccessRights, Role::Server) => Command::AccessRightsResponse {
                cid: header.parameter1,
                access_rights: header.parameter2,
            },
            (CommandId::AccessRights, Role::Client) => {
                return Err(RemoteProtocolError::RoleMismatch { command: id.name() })
            }
            (CommandId::Echo, Role::Client) => Command::EchoRequest,
            (CommandId::Echo, Role::Server) => Command::EchoResponse,
            (CommandId::RepeaterRegister, Role::Client) => Command::RepeaterRegisterRequest {
                client_listening_port: header.parameter1 as u16,
            },
            (CommandId::RepeaterRegister, Role::Server) => {
                return Err(RemoteProtocolError::RoleMismatch { command: id.name() })
            }
            (CommandId::CreateChFail, Role::Server) => {
                Command::CreateChFailResponse { cid: header.parameter1 }
            }
            (CommandId::CreateChFail, Role::Client) => {
                return Err(RemoteProtocolError::RoleMismatch { command: id.name() })
            }
            (CommandId::ServerDisconn, Role::Server) => {
                Command::ServerDisconnResponse { cid: header.parameter1 }
            }
            (CommandId::ServerDisconn, Role::Client) => {
                return Err(RemoteProtocolError::RoleMismatch { command: id.name() })
            }
        })
    }
}

fn payload_dbr_type(payload: &Payload<'_>) -> DbrType {
    match payload.metadata {
        Metadata::None => match payload.value {
            Value::String(_) => DbrType::String,
            Value::Int16(_) => DbrType::Int,
            Value::Float32(_) => DbrType::Float,
            Value::Enum16(_) => DbrType::Enum,
            Value::Char(_) => DbrType::Char,
            Value::Int32(_) => DbrType::Long,
            Value::Float64(_) => DbrType::Double,
            Value::None => DbrType::String,
        },
        _ => DbrType::Double, // callers constructing augmented payloads pass data_type explicitly
    }
}

pub(crate) fn value_count(value: &Value<'_>) -> u32 {
    match value {
        Value::String(a) => a.len(),
        Value::Int16(a) => a.len(),
        Value::Float32(a) => a.len(),
        Value::Enum16(a) => a.len(),
        Value::Char(bytes) => bytes.len() as u32,
        Value::Int32(a) => a.len(),
        Value::Float64(a) => a.len(),
        Value::None => 0,
    }
}
