// src/types.rs
//! Small value types shared across the codec, the state machines, and the
//! circuit: the role a peer plays on a circuit, and the per-circuit
//! identifier allocators for `cid`/`sid`/`ioid`/`subscriptionid`.

use std::fmt;

/// Which side of a circuit or broadcaster we are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Client,
    Server,
}

impl Role {
    /// The role the peer on the other end of the same circuit must be
    /// playing.
    pub fn peer(self) -> Role {
        match self {
            Role::Client => Role::Server,
            Role::Server => Role::Client,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Client => write!(f, "client"),
            Role::Server => write!(f, "server"),
        }
    }
}

/// Which direction a command is travelling relative to `our_role`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Sending,
    Receiving,
}

/// Monotonically increasing allocator for a per-circuit correlation
/// identifier (`cid`, `sid`, `ioid`, `subscriptionid`).
///
/// §9 calls for starting each sequence at a random offset to reduce the
/// chance of collision across reconnects. The core takes no clock or RNG
/// reads of its own (§5), so the offset is instead derived deterministically
/// from the circuit's peer address and role — see `default_starting_offset`.
#[derive(Debug, Clone)]
pub struct IdAllocator {
    next: u32,
}

impl IdAllocator {
    pub fn new(starting_offset: u32) -> Self {
        IdAllocator { next: starting_offset }
    }

    /// Returns the next id and advances the counter, wrapping on overflow.
    /// Wrapping is safe here: colliding with a long-since-retired id after
    /// a full `u32` of allocations is the same class of risk the random
    /// starting offset is already accepting.
    pub fn next(&mut self) -> u32 {
        let id = self.next;
        self.next = self.next.wrapping_add(1);
        id
    }
}

/// Derives a deterministic starting offset from a peer address string and
/// role, used when the caller doesn't supply an explicit seed. Not a
/// security measure (per §9) — only a best-effort spread across repeated
/// connections from the same process.
pub fn default_starting_offset(peer: &str, role: Role) -> u32 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    peer.hash(&mut hasher);
    role.hash(&mut hasher);
    let hash = hasher.finish();
    (hash ^ (hash >> 32)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_peer_is_involution() {
        assert_eq!(Role::Client.peer(), Role::Server);
        assert_eq!(Role::Server.peer(), Role::Client);
        assert_eq!(Role::Client.peer().peer(), Role::Client);
    }

    #[test]
    fn id_allocator_increments() {
        let mut alloc = IdAllocator::new(10);
        assert_eq!(alloc.next(), 10);
        assert_eq!(alloc.next(), 11);
        assert_eq!(alloc.next(), 12);
    }

    #[test]
    fn id_allocator_wraps_on_overflow() {
        let mut alloc = IdAllocator::new(u32::MAX);
        assert_eq!(alloc.next(), u32::MAX);
        assert_eq!(alloc.next(), 0);
    }

    #[test]
    fn id_allocator_values_are_pairwise_distinct_over_a_run() {
        let mut alloc = IdAllocator::new(0);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..10_000 {
            assert!(seen.insert(alloc.next()));
        }
    }

    #[test]
    fn default_starting_offset_is_deterministic() {
        let a = default_starting_offset("127.0.0.1:5064", Role::Client);
        let b = default_starting_offset("127.0.0.1:5064", Role::Client);
        assert_eq!(a, b);
    }

    #[test]
    fn default_starting_offset_varies_by_role() {
        let a = default_starting_offset("127.0.0.1:5064", Role::Client);
        let b = default_starting_offset("127.0.0.1:5064", Role::Server);
        assert_ne!(a, b);
    }
}
