// src/broadcaster.rs
//! `Broadcaster`: the UDP-layer peer for name search, beacons, version
//! negotiation, and repeater registration (§4.2).
//!
//! Unlike [`crate::circuit::VirtualCircuit`], a broadcaster does not
//! maintain channel or circuit state machines of its own — UDP commands
//! are framed and role-checked, not state-transitioned. What it does own
//! is the outgoing-datagram framing rules (one or more commands packed
//! into a datagram, `VersionRequest` first whenever a `SearchRequest` is
//! present, an MTU ceiling) and the `search_id -> name` table a caller
//! needs to match a `SearchResponse`/`NotFoundResponse` back to the name
//! it originally searched for.

use std::collections::HashMap;

use crate::command::{Command, CommandId};
use crate::config::BroadcasterConfig;
use crate::error::{LocalProtocolError, RemoteProtocolError};
use crate::header::Header;
use crate::types::Role;

/// Whether a command id is legal to appear in a UDP datagram at all
/// (§4.2: "only certain command variants... may appear on UDP").
fn is_udp_legal(id: CommandId) -> bool {
    matches!(
        id,
        CommandId::Version
            | CommandId::Search
            | CommandId::NotFound
            | CommandId::Echo
            | CommandId::RsrvIsUp
            | CommandId::RepeaterRegister
            | CommandId::RepeaterConfirm
    )
}

/// Whether `command` is legal for a broadcaster playing `our_role` to
/// originate. Client broadcasters send REQUEST variants and the register
/// exchange; server broadcasters send RESPONSE variants and beacons.
fn is_legal_to_send(command: &Command<'_>, our_role: Role) -> bool {
    use Command::*;
    match command {
        VersionRequest { .. } | SearchRequest { .. } | EchoRequest | RepeaterRegisterRequest { .. } => {
            our_role == Role::Client
        }
        VersionResponse { .. }
        | SearchResponse { .. }
        | NotFoundResponse { .. }
        | EchoResponse
        | RsrvIsUpResponse { .. }
        | RepeaterConfirmResponse { .. } => our_role == Role::Server,
        _ => false,
    }
}

/// One command plus the sender address it arrived from, as delivered by
/// [`Broadcaster::recv`].
#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedCommand<'a> {
    pub command: Command<'a>,
    pub address: (String, u16),
}

/// The UDP-layer peer. Holds no channel/circuit state; see module docs.
#[derive(Debug)]
pub struct Broadcaster {
    our_role: Role,
    config: BroadcasterConfig,
    search_id_by_name: HashMap<u32, String>,
}

impl Broadcaster {
    pub fn new(our_role: Role, config: BroadcasterConfig) -> Self {
        Broadcaster { our_role, config, search_id_by_name: HashMap::new() }
    }

    pub fn our_role(&self) -> Role {
        self.our_role
    }

    /// Record that `search_id` (the `cid` field of an outgoing
    /// `SearchRequest`) is searching for `name`, so a later
    /// `SearchResponse`/`NotFoundResponse` can be matched back to it.
    pub fn note_pending_search(&mut self, search_id: u32, name: impl Into<String>) {
        self.search_id_by_name.insert(search_id, name.into());
    }

    /// The name a pending search by `search_id` was looking for, if any is
    /// still outstanding.
    pub fn pending_search_name(&self, search_id: u32) -> Option<&str> {
        self.search_id_by_name.get(&search_id).map(String::as_str)
    }

    /// Forget a pending search once it has been answered (by either a
    /// `SearchResponse` or a `NotFoundResponse`).
    pub fn complete_search(&mut self, search_id: u32) -> Option<String> {
        self.search_id_by_name.remove(&search_id)
    }

    /// Frame `commands` into one or more outgoing datagrams.
    ///
    /// Each returned `Vec<u8>` is one datagram, ready to hand to a UDP
    /// socket as-is. Commands are packed in order, starting a new datagram
    /// whenever the next command wouldn't fit under
    /// `config.max_datagram_size`, or whenever starting a fresh datagram
    /// that is about to carry a `SearchRequest` but hasn't yet been given a
    /// `VersionRequest` of its own (§4.2: "a datagram containing any
    /// `SearchRequest` begins with a `VersionRequest`" — enforced on every
    /// split, not just the first datagram).
    pub fn send(&mut self, commands: &[Command<'_>]) -> Result<Vec<Vec<u8>>, LocalProtocolError> {
        for command in commands {
            let id = command.command_id();
            if !is_udp_legal(id) {
                return Err(LocalProtocolError::WrongRole { command: id.name(), role: self.our_role });
            }
            if !is_legal_to_send(command, self.our_role) {
                return Err(LocalProtocolError::WrongRole { command: id.name(), role: self.our_role });
            }
        }

        let leading_version = Command::VersionRequest {
            priority: 0,
            version: self.config.protocol_version as u16,
        }
        .encode(self.config.protocol_version)?;

        let mut datagrams: Vec<Vec<u8>> = Vec::new();
        let mut current: Vec<u8> = Vec::new();
        let mut current_has_version = false;

        for command in commands {
            let encoded = command.encode(self.config.protocol_version)?;
            if encoded.len() > self.config.max_datagram_size {
                return Err(LocalProtocolError::DatagramTooLarge {
                    size: encoded.len(),
                    limit: self.config.max_datagram_size,
                });
            }
            let is_search = matches!(command, Command::SearchRequest { .. });
            let is_version = matches!(command, Command::VersionRequest { .. });

            // Space this command would need in the current datagram,
            // including a leading VersionRequest the current datagram
            // doesn't have yet but would need to gain before a SearchRequest.
            let needs_leading_version = is_search && !current_has_version;
            let version_cost = if needs_leading_version { leading_version.len() } else { 0 };
            let projected = current.len() + version_cost + encoded.len();

            let must_flush_for_room = !current.is_empty() && projected > self.config.max_datagram_size;
            // A SearchRequest must open its datagram with a VersionRequest;
            // if the current datagram already has other content but no
            // version of its own, it cannot gain one in the middle, so it
            // must be flushed first even though there was room left in it.
            let must_flush_for_ordering = needs_leading_version && !current.is_empty();
            if must_flush_for_room || must_flush_for_ordering {
                datagrams.push(std::mem::take(&mut current));
                current_has_version = false;
            }

            if is_search && !current_has_version {
                current.extend_from_slice(&leading_version);
                current_has_version = true;
            }
            if is_version {
                current_has_version = true;
            }
            current.extend_from_slice(&encoded);
        }
        if !current.is_empty() {
            datagrams.push(current);
        }
        Ok(datagrams)
    }

    /// Parse one incoming datagram into its ordered list of commands,
    /// tagging each with `address` (§4.2: "deliver them to the user
    /// annotated with the `(sender_host, sender_port)` address").
    ///
    /// Unlike [`crate::circuit::VirtualCircuit::next_command`], a whole
    /// datagram is parsed at once: UDP delivers whole datagrams or nothing,
    /// so there is no partial-read / `NEED_DATA` case here.
    pub fn recv<'a>(
        &self,
        datagram: &'a [u8],
        address: (String, u16),
    ) -> Result<Vec<ReceivedCommand<'a>>, RemoteProtocolError> {
        let mut out = Vec::new();
        let mut offset = 0;
        while offset < datagram.len() {
            let remaining = &datagram[offset..];
            let extended = Header::wire_form_is_extended(remaining);
            let (header, header_len) = match Header::decode(remaining)? {
                Some(parsed) => parsed,
                None => {
                    return Err(RemoteProtocolError::MalformedHeader(
                        "truncated header in UDP datagram".into(),
                    ))
                }
            };
            let id = CommandId::from_wire(header.command)?;
            if !is_udp_legal(id) {
                return Err(RemoteProtocolError::RoleMismatch { command: id.name() });
            }
            let payload_end = header_len + header.payload_size as usize;
            if remaining.len() < payload_end {
                return Err(RemoteProtocolError::PayloadLengthMismatch {
                    expected: payload_end,
                    actual: remaining.len(),
                });
            }
            let payload = &remaining[header_len..payload_end];
            let sender = self.our_role.peer();
            let command = Command::decode(&header, payload, sender, self.config.protocol_version, extended)?;
            if !is_legal_to_send(&command, sender) {
                return Err(RemoteProtocolError::RoleMismatch { command: id.name() });
            }
            out.push(ReceivedCommand { command, address: address.clone() });
            offset += payload_end;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> Broadcaster {
        Broadcaster::new(Role::Client, BroadcasterConfig::default())
    }

    fn server() -> Broadcaster {
        Broadcaster::new(Role::Server, BroadcasterConfig::default())
    }

    #[test]
    fn search_datagram_is_prefixed_with_version_request() {
        let mut bc = client();
        let commands = vec![
            Command::VersionRequest { priority: 0, version: 13 },
            Command::SearchRequest { reply_required: true, minor_version: 13, cid: 1, name: "pv" },
        ];
        let datagrams = bc.send(&commands).unwrap();
        assert_eq!(datagrams.len(), 1);
        assert_eq!(&datagrams[0][0..2], &0u16.to_be_bytes()); // VersionRequest command id
    }

    #[test]
    fn bare_search_request_gets_implicit_version_request() {
        let mut bc = client();
        let commands = vec![Command::SearchRequest {
            reply_required: true,
            minor_version: 13,
            cid: 1,
            name: "pv",
        }];
        let datagrams = bc.send(&commands).unwrap();
        assert_eq!(datagrams.len(), 1);
        assert_eq!(&datagrams[0][0..2], &0u16.to_be_bytes());
    }

    #[test]
    fn search_request_matches_spec_scenario_2_header_fields() {
        let mut bc = client();
        let commands = vec![
            Command::VersionRequest { priority: 0, version: 13 },
            Command::SearchRequest { reply_required: true, minor_version: 13, cid: 1, name: "pv" },
        ];
        let datagrams = bc.send(&commands).unwrap();
        let version_bytes_len = 16;
        let search_header = &datagrams[0][version_bytes_len..version_bytes_len + 16];
        let payload_size = u16::from_be_bytes([search_header[2], search_header[3]]);
        let data_type = u16::from_be_bytes([search_header[4], search_header[5]]);
        let data_count = u16::from_be_bytes([search_header[6], search_header[7]]);
        let p1 = u32::from_be_bytes(search_header[8..12].try_into().unwrap());
        let p2 = u32::from_be_bytes(search_header[12..16].try_into().unwrap());
        assert_eq!(payload_size, 8);
        assert_eq!(data_type, 10);
        assert_eq!(data_count, 13);
        assert_eq!(p1, 1);
        assert_eq!(p2, 1);
    }

    #[test]
    fn server_rejects_sending_a_request_variant() {
        let mut bc = server();
        let err = bc
            .send(&[Command::SearchRequest { reply_required: true, minor_version: 13, cid: 1, name: "pv" }])
            .unwrap_err();
        assert!(matches!(err, LocalProtocolError::WrongRole { .. }));
    }

    #[test]
    fn non_udp_legal_command_is_rejected() {
        let mut bc = client();
        let err = bc
            .send(&[Command::CreateChanRequest { cid: 0, client_minor_version: 13, name: "pv" }])
            .unwrap_err();
        assert!(matches!(err, LocalProtocolError::WrongRole { .. }));
    }

    #[test]
    fn oversized_single_command_is_rejected() {
        let mut bc = Broadcaster::new(Role::Client, BroadcasterConfig { max_datagram_size: 8, ..Default::default() });
        let err = bc
            .send(&[Command::SearchRequest { reply_required: true, minor_version: 13, cid: 1, name: "pv" }])
            .unwrap_err();
        assert!(matches!(err, LocalProtocolError::DatagramTooLarge { .. }));
    }

    #[test]
    fn overflowing_batch_splits_into_multiple_datagrams_each_version_first() {
        let mut bc = Broadcaster::new(
            Role::Client,
            BroadcasterConfig { max_datagram_size: 40, ..Default::default() },
        );
        let commands = vec![
            Command::VersionRequest { priority: 0, version: 13 },
            Command::SearchRequest { reply_required: true, minor_version: 13, cid: 1, name: "a" },
            Command::SearchRequest { reply_required: true, minor_version: 13, cid: 2, name: "b" },
        ];
        let datagrams = bc.send(&commands).unwrap();
        assert!(datagrams.len() >= 2);
        for datagram in &datagrams {
            assert_eq!(&datagram[0..2], &0u16.to_be_bytes(), "every split datagram starts with VersionRequest");
        }
    }

    #[test]
    fn recv_parses_multiple_commands_from_one_datagram_and_tags_address() {
        let mut client_bc = client();
        let commands = vec![
            Command::VersionRequest { priority: 0, version: 13 },
            Command::SearchRequest { reply_required: true, minor_version: 13, cid: 1, name: "pv" },
        ];
        let datagrams = client_bc.send(&commands).unwrap();

        let server_bc = server();
        let received = server_bc.recv(&datagrams[0], ("192.168.1.5".into(), 5064)).unwrap();
        assert_eq!(received.len(), 2);
        assert!(matches!(received[0].command, Command::VersionRequest { .. }));
        assert!(matches!(received[1].command, Command::SearchRequest { .. }));
        assert_eq!(received[0].address, ("192.168.1.5".to_string(), 5064));
    }

    #[test]
    fn recv_rejects_truncated_datagram() {
        let bc = server();
        let req = Command::VersionRequest { priority: 0, version: 13 };
        let bytes = req.encode(13).unwrap();
        let err = bc.recv(&bytes[..10], ("h".into(), 1)).unwrap_err();
        assert!(matches!(err, RemoteProtocolError::MalformedHeader(_)));
    }

    #[test]
    fn recv_rejects_non_udp_legal_command() {
        let bc = server();
        let req = Command::CreateChanRequest { cid: 0, client_minor_version: 13, name: "pv" };
        let bytes = req.encode(13).unwrap();
        let err = bc.recv(&bytes, ("h".into(), 1)).unwrap_err();
        assert!(matches!(err, RemoteProtocolError::RoleMismatch { .. }));
    }

    #[test]
    fn pending_search_table_round_trips() {
        let mut bc = client();
        bc.note_pending_search(7, "pv:x");
        assert_eq!(bc.pending_search_name(7), Some("pv:x"));
        assert_eq!(bc.complete_search(7), Some("pv:x".to_string()));
        assert_eq!(bc.pending_search_name(7), None);
    }
}
