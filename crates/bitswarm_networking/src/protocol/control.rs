//! # Control Frames
//!
//! Frames whose ordinary tag is the control sentinel 0.
//!
//! ## Layout
//!
//! ```text
//! server → client
//!   [tag=0][kind: ranged 0..=2]
//!     InitialData, handshake: [item=0][last][max_index u8][self id][presence bit per other slot]
//!     InitialData, item:      [item tag][last]([index varint][offer])? [fields...]
//!     PeerJoin / PeerQuit:    [peer id: ranged 0..=max_index]
//!
//! client → server
//!   [tag=0][item tag: ranged over initial space]
//!     item tag 0: ready
//!     otherwise:  [index varint][verdict bit per file field]
//! ```

use bitswarm_core::{BitReader, BitWriter};

use crate::error::{NetError, NetResult};
use crate::peer::PeerId;

use super::registry::{Registry, TagSpace};

/// Secondary tag of a server control frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ControlKind {
    /// Handshake or initial-state item.
    InitialData = 0,
    /// Another peer finished joining.
    PeerJoin = 1,
    /// Another peer left.
    PeerQuit = 2,
}

impl ControlKind {
    const MAX: i64 = 2;

    fn from_code(code: i64) -> NetResult<Self> {
        match code {
            0 => Ok(Self::InitialData),
            1 => Ok(Self::PeerJoin),
            2 => Ok(Self::PeerQuit),
            other => Err(NetError::Protocol(format!("unknown control kind {other}"))),
        }
    }
}

/// First frame a joining peer receives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Handshake {
    /// Highest assignable peer ID in the session.
    pub max_peer_index: u8,
    /// ID assigned to the receiving peer.
    pub self_id: PeerId,
    /// Occupancy of every slot, indexed by peer ID. The own slot is false.
    pub presence: Vec<bool>,
    /// No initial-state items follow.
    pub is_last: bool,
}

impl Handshake {
    /// Connected peers other than the receiver.
    pub fn present_peers(&self) -> impl Iterator<Item = PeerId> + '_ {
        self.presence
            .iter()
            .enumerate()
            .filter(|&(_, &present)| present)
            .map(|(i, _)| PeerId(i as u16))
    }

    /// Number of presence bits on the wire.
    #[must_use]
    pub fn other_slot_count(&self) -> usize {
        self.presence.len().saturating_sub(1)
    }

    /// Writes the full handshake frame body.
    pub fn write(&self, registry: &Registry, writer: &mut BitWriter) {
        write_server_header(registry, ControlKind::InitialData, writer);
        registry.write_tag(TagSpace::Initial, 0, writer);
        writer.write_bool(self.is_last);
        writer.write_u8(self.max_peer_index);
        writer.write_ranged(0, i64::from(self.max_peer_index), i64::from(self.self_id.0));
        for (slot, &present) in self.presence.iter().enumerate() {
            if slot != self.self_id.index() {
                writer.write_bool(present);
            }
        }
    }

    fn read_body(reader: &mut BitReader<'_>) -> NetResult<Self> {
        let is_last = reader.try_read_bool()?;
        let max_peer_index = reader.try_read_u8()?;
        let self_id = PeerId(reader.try_read_ranged(0, i64::from(max_peer_index))? as u16);
        let mut presence = vec![false; usize::from(max_peer_index) + 1];
        for (slot, present) in presence.iter_mut().enumerate() {
            if slot != self_id.index() {
                *present = reader.try_read_bool()?;
            }
        }
        Ok(Self {
            max_peer_index,
            self_id,
            presence,
            is_last,
        })
    }
}

/// Header of one streamed initial-state item.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ItemHeader {
    /// Tag in the initial space.
    pub tag: u64,
    /// Last item of the stream.
    pub is_last: bool,
    /// File-sync round, for file-bearing types.
    pub sync: Option<FileRound>,
}

/// Which half of a file-sync round an item frame carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FileRound {
    /// Position of the item in the stream, echoed by the ack.
    pub index: u64,
    /// True for the hash offer, false for the resolution.
    pub offer: bool,
}

impl ItemHeader {
    /// Writes the item header; fields follow.
    pub fn write(&self, registry: &Registry, writer: &mut BitWriter) {
        write_server_header(registry, ControlKind::InitialData, writer);
        registry.write_tag(TagSpace::Initial, self.tag, writer);
        writer.write_bool(self.is_last);
        if let Some(round) = self.sync {
            writer.write_var_u64(round.index);
            writer.write_bool(round.offer);
        }
    }
}

/// A decoded server control frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ServerControl {
    /// Join handshake.
    Handshake(Handshake),
    /// Initial-state item; the reader is left at its first field.
    Item(ItemHeader),
    /// Another peer joined.
    PeerJoin(PeerId),
    /// Another peer left.
    PeerQuit(PeerId),
}

impl ServerControl {
    /// Reads a control frame after its ordinary tag 0.
    ///
    /// `max_peer_index` is the session's peer domain, known once the
    /// handshake has been read.
    ///
    /// # Errors
    ///
    /// Truncated frames, unknown tags or kinds, and peer events that arrive
    /// before the handshake.
    pub fn read(registry: &Registry, reader: &mut BitReader<'_>, max_peer_index: Option<u8>) -> NetResult<Self> {
        let kind = ControlKind::from_code(reader.try_read_ranged(0, ControlKind::MAX)?)?;
        match kind {
            ControlKind::InitialData => {
                let tag = registry.read_tag(TagSpace::Initial, reader)?;
                if tag == 0 {
                    return Ok(Self::Handshake(Handshake::read_body(reader)?));
                }
                let entry = registry.resolve(TagSpace::Initial, tag)?;
                let is_last = reader.try_read_bool()?;
                let sync = if entry.has_file_sync() {
                    Some(FileRound {
                        index: reader.try_read_var_u64()?,
                        offer: reader.try_read_bool()?,
                    })
                } else {
                    None
                };
                Ok(Self::Item(ItemHeader { tag, is_last, sync }))
            }
            ControlKind::PeerJoin | ControlKind::PeerQuit => {
                let max = max_peer_index.ok_or(NetError::NotConnected)?;
                let id = PeerId(reader.try_read_ranged(0, i64::from(max))? as u16);
                Ok(if kind == ControlKind::PeerJoin {
                    Self::PeerJoin(id)
                } else {
                    Self::PeerQuit(id)
                })
            }
        }
    }
}

/// Writes `[tag=0][kind]`.
pub fn write_server_header(registry: &Registry, kind: ControlKind, writer: &mut BitWriter) {
    registry.write_tag(TagSpace::ServerOrigin, 0, writer);
    writer.write_ranged(0, ControlKind::MAX, kind as i64);
}

/// Writes a peer join or quit notification.
pub fn write_peer_event(registry: &Registry, kind: ControlKind, peer: PeerId, max_peer_index: u8, writer: &mut BitWriter) {
    debug_assert!(kind != ControlKind::InitialData);
    write_server_header(registry, kind, writer);
    writer.write_ranged(0, i64::from(max_peer_index), i64::from(peer.0));
}

/// A decoded client control frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClientControl {
    /// The client consumed the whole initial stream.
    Ready,
    /// Verdicts for a file-bearing item's offer.
    Ack {
        /// Initial tag of the item.
        tag: u64,
        /// Stream index from the offer.
        index: u64,
        /// One verdict per file field, true for IDENTICAL.
        verdicts: Vec<bool>,
    },
}

impl ClientControl {
    /// Writes the frame, including the client-space tag 0.
    pub fn write(&self, registry: &Registry, writer: &mut BitWriter) {
        registry.write_tag(TagSpace::ClientOrigin, 0, writer);
        match self {
            Self::Ready => registry.write_tag(TagSpace::Initial, 0, writer),
            Self::Ack { tag, index, verdicts } => {
                registry.write_tag(TagSpace::Initial, *tag, writer);
                writer.write_var_u64(*index);
                for &identical in verdicts {
                    writer.write_bool(identical);
                }
            }
        }
    }

    /// Reads a control frame after its client-space tag 0.
    ///
    /// # Errors
    ///
    /// Truncation, or an ack for a type without file sync.
    pub fn read(registry: &Registry, reader: &mut BitReader<'_>) -> NetResult<Self> {
        let tag = registry.read_tag(TagSpace::Initial, reader)?;
        if tag == 0 {
            return Ok(Self::Ready);
        }
        let entry = registry.resolve(TagSpace::Initial, tag)?;
        let files = entry
            .file_plan
            .as_ref()
            .ok_or_else(|| NetError::Protocol(format!("ack for '{}' which has no files", entry.name())))?
            .file_count();
        let index = reader.try_read_var_u64()?;
        let verdicts = (0..files).map(|_| reader.try_read_bool()).collect::<Result<_, _>>()?;
        Ok(Self::Ack { tag, index, verdicts })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::registry::NetMessage;
    use crate::protocol::schema::{FieldDef, FieldKind, MessageDescriptor, Schema};
    use crate::protocol::value::{Record, Value};
    use crate::error::SchemaError;

    struct Asset;

    impl NetMessage for Asset {
        fn descriptor() -> MessageDescriptor {
            MessageDescriptor::new(
                Schema::new("Asset")
                    .field(FieldDef::new("a", FieldKind::File))
                    .field(FieldDef::new("b", FieldKind::File)),
            )
            .initial_state()
        }
        fn to_record(&self) -> Record {
            Record::new(vec![Value::File(Default::default()), Value::File(Default::default())])
        }
        fn from_record(_: &Record) -> Result<Self, SchemaError> {
            Ok(Self)
        }
    }

    fn reader_for(writer: &BitWriter) -> BitReader<'_> {
        BitReader::with_bit_len(writer.as_bytes(), writer.bit_len())
    }

    #[test]
    fn test_handshake_four_slots() {
        let registry = Registry::builder().build().unwrap();
        let handshake = Handshake {
            max_peer_index: 3,
            self_id: PeerId(0),
            presence: vec![false; 4],
            is_last: true,
        };
        let mut writer = BitWriter::new();
        handshake.write(&registry, &mut writer);
        // tag(1) + kind(2) + item(1) + last(1) + max(8) + id(2) + 3 presence bits
        assert_eq!(writer.bit_len(), 18);

        let mut reader = reader_for(&writer);
        assert_eq!(registry.read_tag(TagSpace::ServerOrigin, &mut reader).unwrap(), 0);
        let ServerControl::Handshake(decoded) = ServerControl::read(&registry, &mut reader, None).unwrap() else {
            panic!("expected handshake");
        };
        assert_eq!(decoded, handshake);
        assert_eq!(decoded.other_slot_count(), 3);
        assert!(reader.is_at_end());
    }

    #[test]
    fn test_handshake_presence_skips_self() {
        let registry = Registry::builder().build().unwrap();
        let handshake = Handshake {
            max_peer_index: 3,
            self_id: PeerId(2),
            presence: vec![true, false, false, true],
            is_last: false,
        };
        let mut writer = BitWriter::new();
        handshake.write(&registry, &mut writer);

        let mut reader = reader_for(&writer);
        registry.read_tag(TagSpace::ServerOrigin, &mut reader).unwrap();
        let ServerControl::Handshake(decoded) = ServerControl::read(&registry, &mut reader, None).unwrap() else {
            panic!("expected handshake");
        };
        assert_eq!(decoded.present_peers().collect::<Vec<_>>(), vec![PeerId(0), PeerId(3)]);
    }

    #[test]
    fn test_peer_event_needs_handshake() {
        let registry = Registry::builder().build().unwrap();
        let mut writer = BitWriter::new();
        write_peer_event(&registry, ControlKind::PeerQuit, PeerId(5), 7, &mut writer);

        let mut reader = reader_for(&writer);
        registry.read_tag(TagSpace::ServerOrigin, &mut reader).unwrap();
        assert!(matches!(
            ServerControl::read(&registry, &mut reader, None),
            Err(NetError::NotConnected)
        ));

        let mut reader = reader_for(&writer);
        registry.read_tag(TagSpace::ServerOrigin, &mut reader).unwrap();
        assert_eq!(
            ServerControl::read(&registry, &mut reader, Some(7)).unwrap(),
            ServerControl::PeerQuit(PeerId(5))
        );
    }

    #[test]
    fn test_file_item_header_and_ack() {
        let registry = Registry::builder().register::<Asset>().build().unwrap();
        let header = ItemHeader {
            tag: 1,
            is_last: true,
            sync: Some(FileRound { index: 0, offer: true }),
        };
        let mut writer = BitWriter::new();
        header.write(&registry, &mut writer);
        let mut reader = reader_for(&writer);
        registry.read_tag(TagSpace::ServerOrigin, &mut reader).unwrap();
        assert_eq!(
            ServerControl::read(&registry, &mut reader, Some(3)).unwrap(),
            ServerControl::Item(header)
        );

        let ack = ClientControl::Ack {
            tag: 1,
            index: 0,
            verdicts: vec![true, false],
        };
        let mut writer = BitWriter::new();
        ack.write(&registry, &mut writer);
        let mut reader = reader_for(&writer);
        assert_eq!(registry.read_tag(TagSpace::ClientOrigin, &mut reader).unwrap(), 0);
        assert_eq!(ClientControl::read(&registry, &mut reader).unwrap(), ack);
        assert!(reader.is_at_end());
    }

    #[test]
    fn test_ready_frame() {
        let registry = Registry::builder().register::<Asset>().build().unwrap();
        let mut writer = BitWriter::new();
        ClientControl::Ready.write(&registry, &mut writer);
        let mut reader = reader_for(&writer);
        registry.read_tag(TagSpace::ClientOrigin, &mut reader).unwrap();
        assert_eq!(ClientControl::read(&registry, &mut reader).unwrap(), ClientControl::Ready);
    }
}
