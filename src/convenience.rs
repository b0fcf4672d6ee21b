// src/convenience.rs
//! Thin per-[`Channel`] builders (§4.6).
//!
//! These fill in `cid`/`sid`/`ioid`/`subscriptionid` and the channel's
//! current `native_data_type`/`native_data_count` as defaults so a caller
//! doesn't have to repeat them at every call site. They read the channel's
//! state to decide whether a command is even buildable (e.g. no `sid` yet)
//! but never mutate it — only handing the resulting [`Command`] to
//! [`crate::circuit::VirtualCircuit::send`] advances any state machine.

use crate::channel::Channel;
use crate::command::Command;
use crate::dbr::Payload;
use crate::error::LocalProtocolError;

impl Channel {
    /// The `sid` this channel was assigned, or a `LocalProtocolError` if
    /// `CreateChanResponse` hasn't arrived yet (§3: "operations
    /// referencing `sid` before that are local protocol errors").
    fn require_sid(&self) -> Result<u32, LocalProtocolError> {
        self.sid.ok_or(LocalProtocolError::ChannelNotInState {
            cid: self.cid,
            expected: "Connected (sid assigned)",
            actual: self.state.name(),
        })
    }

    /// A `CreateChanRequest` for this channel, not yet sent.
    pub fn create_chan_request(&self, client_minor_version: u16) -> Command<'_> {
        Command::CreateChanRequest { cid: self.cid, client_minor_version, name: &self.name }
    }

    /// A `ClearChannelRequest` tearing this channel down. Requires a `sid`.
    pub fn clear_channel_request(&self) -> Result<Command<'_>, LocalProtocolError> {
        let sid = self.require_sid()?;
        Ok(Command::ClearChannelRequest { sid, cid: self.cid })
    }

    /// A `ReadNotifyRequest` for this channel's native type/count, unless
    /// overridden.
    pub fn read_notify_request(&self, ioid: u32) -> Result<Command<'_>, LocalProtocolError> {
        let sid = self.require_sid()?;
        let data_type = self.native_data_type.ok_or(LocalProtocolError::ChannelNotInState {
            cid: self.cid,
            expected: "Connected (native type known)",
            actual: self.state.name(),
        })?;
        let data_count = self.native_data_count.unwrap_or(1);
        Ok(Command::ReadNotifyRequest { data_type, data_count, sid, ioid })
    }

    /// A `WriteNotifyRequest` carrying `payload`. The payload's DBR type
    /// must already agree with the channel's native type; this helper does
    /// not convert values, only fills in identifiers.
    pub fn write_notify_request<'a>(
        &self,
        ioid: u32,
        data_count: u32,
        payload: Payload<'a>,
    ) -> Result<Command<'a>, LocalProtocolError> {
        let sid = self.require_sid()?;
        let data_type = self.native_data_type.ok_or(LocalProtocolError::ChannelNotInState {
            cid: self.cid,
            expected: "Connected (native type known)",
            actual: self.state.name(),
        })?;
        Ok(Command::WriteNotifyRequest { data_type, data_count, sid, ioid, payload })
    }

    /// An `EventAddRequest` subscribing to this channel with alarm mask
    /// `mask` (the usual value is `1`, DBE_VALUE).
    pub fn event_add_request(&self, subscriptionid: u32, mask: u16) -> Result<Command<'_>, LocalProtocolError> {
        let sid = self.require_sid()?;
        let data_type = self.native_data_type.ok_or(LocalProtocolError::ChannelNotInState {
            cid: self.cid,
            expected: "Connected (native type known)",
            actual: self.state.name(),
        })?;
        let data_count = self.native_data_count.unwrap_or(1);
        Ok(Command::EventAddRequest { data_type, data_count, sid, subscriptionid, mask })
    }

    /// An `EventCancelRequest` for a subscription previously created with
    /// [`Channel::event_add_request`].
    pub fn event_cancel_request(&self, subscriptionid: u32) -> Result<Command<'_>, LocalProtocolError> {
        let sid = self.require_sid()?;
        let data_type = self.native_data_type.ok_or(LocalProtocolError::ChannelNotInState {
            cid: self.cid,
            expected: "Connected (native type known)",
            actual: self.state.name(),
        })?;
        Ok(Command::EventCancelRequest { data_type, sid, subscriptionid })
    }
}
