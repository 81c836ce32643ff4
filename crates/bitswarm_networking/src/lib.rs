//! # BITSWARM Networking - The Swarm Protocol
//!
//! Typed, bit-packed messages between one authoritative server and up to
//! 256 peers.
//!
//! ## Architecture
//!
//! - **Protocol**: schemas compile into codec plans; a registry assigns dense
//!   ranged tags per sending side
//! - **Server**: peer-ID allocation, join handshake, initial-state streaming,
//!   hook dispatch and relay
//! - **Client**: the mirror of the join, then typed send/receive
//! - **Files**: content-addressed sync; identical files never cross the wire
//! - **Transport**: any connect/send/poll backend
//!
//! ## Join Sequence
//!
//! ```text
//! CLIENT                                   SERVER
//!   |--- connect ----------------------------->|  capacity check, ID
//!   |<-- handshake (ID, presence) -------------|
//!   |<-- initial item ... ---------------------|
//!   |<-- file offer (names + hashes) ----------|
//!   |--- ack (identical?) -------------------->|
//!   |<-- resolution (only differing bytes) ----|
//!   |<-- last item ----------------------------|
//!   |--- ready ------------------------------->|  PeerJoin to the others
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use bitswarm_networking::{MemoryNetwork, NetServer, Registry, ServerConfig};
//!
//! let registry = Registry::builder().register::<Chat>().build()?.shared();
//! let network = MemoryNetwork::new();
//! let mut server = NetServer::new(ServerConfig::default(), registry, network.endpoint())?;
//! server.on_receive::<Chat, _>(|env| println!("{}: {}", env.origin, env.message.text))?;
//! loop {
//!     server.tick();
//! }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod client;
pub mod config;
pub mod error;
pub mod files;
pub mod hooks;
pub mod peer;
pub mod protocol;
pub mod server;
pub mod transport;

// Re-exports for convenience
pub use client::{ClientEvent, ClientState, NetClient};
pub use config::{ClientConfig, ServerConfig, DEFAULT_PORT, MAX_PEERS};
pub use error::{NetError, NetResult, SchemaError};
pub use files::{content_hash, ContentHash, DirectoryFileStore, FileStatus, FileStore, MemoryFileStore};
pub use peer::{Envelope, Origin, PeerId};
pub use protocol::{
    ArrayValue, EnumDef, FieldDef, FieldKind, FromValue, MessageDescriptor, NetFile, NetMessage, Record,
    Registry, RegistryBuilder, Schema, Value, Visibility,
};
pub use server::{NetServer, ServerEvent};
pub use transport::{
    DeliveryMethod, DisconnectReason, MemoryNetwork, MemoryTransport, PeerHandle, Transport, TransportEvent,
    TransportStats,
};

/// Writers kept warm per endpoint for outgoing frames.
///
/// One frame per peer per tick fits without allocating at 64 peers.
pub const WRITER_POOL_SIZE: usize = 64;
