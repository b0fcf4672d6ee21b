// src/channel.rs
//! `Channel`: the client- or server-side view of one named PV on a circuit.

use crate::access::AccessRights;
use crate::channel_state::ChannelState;
use crate::dbr::DbrType;

/// One channel (a named PV bound to a circuit via `cid`/`sid`).
#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    pub name: String,
    pub cid: u32,
    /// Server-assigned channel id, known only once `CreateChanResponse` has
    /// arrived.
    pub sid: Option<u32>,
    pub native_data_type: Option<DbrType>,
    pub native_data_count: Option<u32>,
    pub access_rights: Option<AccessRights>,
    pub state: ChannelState,
}

impl Channel {
    pub fn new(name: impl Into<String>, cid: u32) -> Self {
        Channel {
            name: name.into(),
            cid,
            sid: None,
            native_data_type: None,
            native_data_count: None,
            access_rights: None,
            state: ChannelState::AllocatedCid,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state == ChannelState::Connected
    }
}
