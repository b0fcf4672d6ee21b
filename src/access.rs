// src/access.rs
//! Channel access-rights bitfield carried by `AccessRightsResponse`.

use bitflags::bitflags;

bitflags! {
    /// Read/write permission bits for a channel, as reported by the server
    /// in `AccessRightsResponse`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AccessRights: u32 {
        const READ = 0b01;
        const WRITE = 0b10;
    }
}

impl AccessRights {
    pub const NONE: AccessRights = AccessRights::empty();
    pub const READ_WRITE: AccessRights = AccessRights::READ.union(AccessRights::WRITE);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_write_combine() {
        let rw = AccessRights::READ | AccessRights::WRITE;
        assert!(rw.contains(AccessRights::READ));
        assert!(rw.contains(AccessRights::WRITE));
        assert_eq!(rw.bits(), 0b11);
        assert_eq!(rw, AccessRights::READ_WRITE);
    }

    #[test]
    fn none_has_neither_bit() {
        assert!(!AccessRights::NONE.contains(AccessRights::READ));
        assert!(!AccessRights::NONE.contains(AccessRights::WRITE));
    }

    #[test]
    fn from_wire_value_3_is_read_and_write() {
        let rights = AccessRights::from_bits_truncate(3);
        assert_eq!(rights, AccessRights::READ_WRITE);
    }
}
