//! # Transport Layer
//!
//! The boundary to whatever actually moves bytes between machines.
//!
//! ## Design
//!
//! - The session layer only needs connect/accept/send/poll
//! - Two delivery qualities: latest-wins sequenced and reliable-ordered
//! - `poll` returns already-buffered events and never blocks
//! - [`MemoryNetwork`] provides an in-process backend for tests and demos

mod memory;

use crate::error::NetResult;

pub use memory::{MemoryNetwork, MemoryTransport};

/// Opaque connection handle issued by a transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerHandle(pub u64);

/// Delivery quality requested for a send.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DeliveryMethod {
    /// Unreliable, ordered; stale frames may be dropped.
    Sequenced,
    /// Every frame arrives, in order.
    #[default]
    ReliableOrdered,
}

/// Why a connection ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DisconnectReason {
    /// This side asked to disconnect.
    Requested,
    /// The listener refused the connection.
    Rejected,
    /// The other side went away.
    RemoteClosed,
}

/// Something that happened on the transport since the last poll.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportEvent {
    /// A remote endpoint wants to connect; answer with accept or reject.
    ConnectionRequest(PeerHandle),
    /// A connection is open.
    Connected(PeerHandle),
    /// A connection closed.
    Disconnected {
        /// Connection that closed.
        handle: PeerHandle,
        /// Why.
        reason: DisconnectReason,
    },
    /// A frame arrived.
    Data {
        /// Sending connection.
        handle: PeerHandle,
        /// Frame bytes.
        bytes: Vec<u8>,
        /// Quality it was sent with.
        delivery: DeliveryMethod,
    },
}

/// Transport statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TransportStats {
    /// Packets sent.
    pub packets_sent: u64,
    /// Packets received.
    pub packets_received: u64,
    /// Bytes sent.
    pub bytes_sent: u64,
    /// Bytes received.
    pub bytes_received: u64,
    /// Send errors.
    pub send_errors: u64,
    /// Receive errors.
    pub recv_errors: u64,
}

/// A connection-oriented frame transport.
pub trait Transport {
    /// Starts accepting connections on `port`.
    ///
    /// # Errors
    ///
    /// Backend failure, e.g. the port is taken.
    fn listen(&mut self, port: u16) -> NetResult<()>;

    /// Requests a connection; a `Connected` or `Disconnected` event follows.
    ///
    /// # Errors
    ///
    /// Backend failure, e.g. nothing listens at the address.
    fn connect(&mut self, address: &str, port: u16) -> NetResult<PeerHandle>;

    /// Accepts a pending connection request.
    ///
    /// # Errors
    ///
    /// Unknown or already answered request.
    fn accept(&mut self, handle: PeerHandle) -> NetResult<()>;

    /// Refuses a pending connection request.
    ///
    /// # Errors
    ///
    /// Unknown or already answered request.
    fn reject(&mut self, handle: PeerHandle) -> NetResult<()>;

    /// Sends one frame.
    ///
    /// # Errors
    ///
    /// The connection is not open.
    fn send(&mut self, handle: PeerHandle, bytes: &[u8], delivery: DeliveryMethod) -> NetResult<()>;

    /// Closes a connection.
    ///
    /// # Errors
    ///
    /// Unknown connection.
    fn disconnect(&mut self, handle: PeerHandle) -> NetResult<()>;

    /// Drains buffered events.
    fn poll(&mut self) -> Vec<TransportEvent>;

    /// Counters since creation.
    fn stats(&self) -> TransportStats;
}
