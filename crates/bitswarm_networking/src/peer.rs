//! # Peer Identity
//!
//! Session-scoped peer IDs and message origins.

use std::fmt;

/// Peer identifier allocated by the server, in `[0, max_peers)`.
///
/// IDs are dense: the server always hands out the lowest free one and
/// reclaims it on disconnect.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(pub u16);

impl PeerId {
    /// ID reserved for the local peer of a listen server.
    pub const LOCAL_HOST: Self = Self(0);

    /// Returns the raw index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Who originated a received message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Origin {
    /// A connected peer (possibly relayed by the server).
    Peer(PeerId),
    /// The server itself, on a dedicated server with no peer identity.
    Server,
}

impl Origin {
    /// Returns the peer ID, if the origin is a peer.
    #[inline]
    #[must_use]
    pub const fn peer(self) -> Option<PeerId> {
        match self {
            Self::Peer(id) => Some(id),
            Self::Server => None,
        }
    }
}

/// A decoded message together with the identity stamped on it.
#[derive(Clone, Debug, PartialEq)]
pub struct Envelope<M> {
    /// Sender of the message.
    pub origin: Origin,
    /// The decoded message.
    pub message: M,
}
