//! # Message Registry
//!
//! Every message type is registered once at startup. The registry assigns
//! dense tags, builds the per-side plans, and is then shared read-only by
//! the server and clients as an `Arc<Registry>`.
//!
//! ## Tag Spaces
//!
//! ```text
//!                      server-origin   client-origin   initial
//! Chat (Both)               1               1             -
//! Move (ClientOnly)         -               2             -
//! Score (ServerOnly)        2               -             -
//! Level (initial)           -               -             1
//!                     ──────────────────────────────────────────
//! tag width           ranged(0, 2)    ranged(0, 2)   ranged(0, 1)
//! ```
//!
//! Tag 0 in every space is the control sentinel. Tags follow registration
//! order, so both ends must register the same types in the same order.

use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use bitswarm_core::{BitReader, BitWriter};

use crate::error::{NetError, NetResult, SchemaError};

use super::plan::Plan;
use super::schema::{MessageDescriptor, Side, Visibility};
use super::value::Record;

/// A typed message that converts to and from a [`Record`].
pub trait NetMessage: Sized + 'static {
    /// Schema and annotations of this type.
    fn descriptor() -> MessageDescriptor;

    /// Field values in schema order.
    fn to_record(&self) -> Record;

    /// Rebuilds the message from decoded values.
    ///
    /// # Errors
    ///
    /// [`SchemaError`] when a slot is missing or has the wrong kind.
    fn from_record(record: &Record) -> Result<Self, SchemaError>;
}

/// One of the three independent tag spaces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TagSpace {
    /// Ordinary frames written by the server.
    ServerOrigin,
    /// Ordinary frames written by clients.
    ClientOrigin,
    /// Initial-state items streamed during the join.
    Initial,
}

impl TagSpace {
    const ALL: [Self; 3] = [Self::ServerOrigin, Self::ClientOrigin, Self::Initial];

    /// Space name, for errors and logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ServerOrigin => "server-origin",
            Self::ClientOrigin => "client-origin",
            Self::Initial => "initial",
        }
    }

    const fn slot(self) -> usize {
        match self {
            Self::ServerOrigin => 0,
            Self::ClientOrigin => 1,
            Self::Initial => 2,
        }
    }
}

/// Everything the session needs about one registered type.
#[derive(Debug)]
pub struct RegistryEntry {
    /// Position in registration order.
    pub index: usize,
    /// Schema and annotations.
    pub descriptor: MessageDescriptor,
    /// Tag in the server-origin space.
    pub server_tag: Option<u64>,
    /// Tag in the client-origin space.
    pub client_tag: Option<u64>,
    /// Tag in the initial-state space.
    pub initial_tag: Option<u64>,
    /// Plan for frames the server writes.
    pub server_plan: Option<Plan>,
    /// Plan for frames clients write.
    pub client_plan: Option<Plan>,
    /// File steps of the server plan, for file-bearing initial types.
    pub file_plan: Option<Plan>,
    /// The server rebroadcasts client-sent instances.
    pub relay: bool,
}

impl RegistryEntry {
    /// Message name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.descriptor.name()
    }

    /// Tag in `space`.
    #[must_use]
    pub const fn tag(&self, space: TagSpace) -> Option<u64> {
        match space {
            TagSpace::ServerOrigin => self.server_tag,
            TagSpace::ClientOrigin => self.client_tag,
            TagSpace::Initial => self.initial_tag,
        }
    }

    /// Plan for frames sent in `space`.
    #[must_use]
    pub const fn plan(&self, space: TagSpace) -> Option<&Plan> {
        match space {
            TagSpace::ServerOrigin | TagSpace::Initial => self.server_plan.as_ref(),
            TagSpace::ClientOrigin => self.client_plan.as_ref(),
        }
    }

    /// Returns true if initial items of this type go through file sync.
    #[must_use]
    pub const fn has_file_sync(&self) -> bool {
        self.file_plan.is_some()
    }
}

/// Collects message types in registration order.
#[derive(Default)]
pub struct RegistryBuilder {
    types: Vec<(TypeId, &'static str, MessageDescriptor)>,
}

impl RegistryBuilder {
    /// Starts an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `M`. Registration order decides tags.
    #[must_use]
    pub fn register<M: NetMessage>(mut self) -> Self {
        self.types.push((TypeId::of::<M>(), type_name::<M>(), M::descriptor()));
        self
    }

    /// Assigns tags and builds every plan.
    ///
    /// # Errors
    ///
    /// [`SchemaError::DuplicateType`] for a type registered twice, or any
    /// plan-building error.
    pub fn build(self) -> Result<Registry, SchemaError> {
        let mut by_type = HashMap::with_capacity(self.types.len());
        let mut entries = Vec::with_capacity(self.types.len());
        let mut spaces: [Vec<usize>; 3] = Default::default();

        for (index, (type_id, _, descriptor)) in self.types.into_iter().enumerate() {
            if by_type.insert(type_id, index).is_some() {
                return Err(SchemaError::DuplicateType { name: descriptor.name() });
            }

            let mut next_tag = |space: TagSpace| {
                let members = &mut spaces[space.slot()];
                members.push(index);
                members.len() as u64
            };

            let schema = &descriptor.schema;
            let entry = if descriptor.initial_state {
                let server_plan = Plan::build(schema, Side::ServerOrigin)?;
                let file_plan = schema.has_files().then(|| Plan::file_plan(&server_plan));
                RegistryEntry {
                    index,
                    server_tag: None,
                    client_tag: None,
                    initial_tag: Some(next_tag(TagSpace::Initial)),
                    server_plan: Some(server_plan),
                    client_plan: None,
                    file_plan,
                    relay: false,
                    descriptor,
                }
            } else {
                let server = descriptor.visibility != Visibility::ClientOnly;
                let client = descriptor.visibility != Visibility::ServerOnly;
                RegistryEntry {
                    index,
                    server_tag: server.then(|| next_tag(TagSpace::ServerOrigin)),
                    client_tag: client.then(|| next_tag(TagSpace::ClientOrigin)),
                    initial_tag: None,
                    server_plan: server.then(|| Plan::build(schema, Side::ServerOrigin)).transpose()?,
                    client_plan: client.then(|| Plan::build(schema, Side::ClientOrigin)).transpose()?,
                    file_plan: None,
                    relay: !descriptor.no_relay && descriptor.visibility == Visibility::Both,
                    descriptor,
                }
            };
            entries.push(entry);
        }

        tracing::debug!(
            "Registry built: {} types ({} server, {} client, {} initial)",
            entries.len(),
            spaces[0].len(),
            spaces[1].len(),
            spaces[2].len()
        );

        Ok(Registry {
            entries,
            by_type,
            spaces,
        })
    }
}

/// Immutable type table shared by every session.
#[derive(Debug)]
pub struct Registry {
    entries: Vec<RegistryEntry>,
    by_type: HashMap<TypeId, usize>,
    spaces: [Vec<usize>; 3],
}

impl Registry {
    /// Starts a [`RegistryBuilder`].
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Wraps the registry for sharing.
    #[must_use]
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Entries in registration order.
    #[inline]
    #[must_use]
    pub fn entries(&self) -> &[RegistryEntry] {
        &self.entries
    }

    /// Entry at a registration index.
    #[inline]
    #[must_use]
    pub fn entry_at(&self, index: usize) -> Option<&RegistryEntry> {
        self.entries.get(index)
    }

    /// Entry for `M`.
    ///
    /// # Errors
    ///
    /// [`SchemaError::UnknownType`] if `M` was never registered.
    pub fn entry<M: NetMessage>(&self) -> Result<&RegistryEntry, SchemaError> {
        self.by_type
            .get(&TypeId::of::<M>())
            .map(|&i| &self.entries[i])
            .ok_or(SchemaError::UnknownType { name: type_name::<M>() })
    }

    /// Number of types in `space`.
    #[must_use]
    pub fn tag_count(&self, space: TagSpace) -> u64 {
        self.spaces[space.slot()].len() as u64
    }

    /// Entry carrying `tag` in `space`.
    ///
    /// # Errors
    ///
    /// [`NetError::UnknownTag`] for tag 0 or a tag past the space.
    pub fn resolve(&self, space: TagSpace, tag: u64) -> NetResult<&RegistryEntry> {
        tag.checked_sub(1)
            .and_then(|i| usize::try_from(i).ok())
            .and_then(|i| self.spaces[space.slot()].get(i))
            .map(|&index| &self.entries[index])
            .ok_or(NetError::UnknownTag {
                tag,
                space: space.name(),
            })
    }

    /// Writes `tag` as a ranged integer over `[0, tag_count(space)]`.
    pub fn write_tag(&self, space: TagSpace, tag: u64, writer: &mut BitWriter) {
        writer.write_ranged(0, self.tag_count(space) as i64, tag as i64);
    }

    /// Reads a tag written by [`Registry::write_tag`].
    ///
    /// # Errors
    ///
    /// Truncation, or a tag code past the space.
    pub fn read_tag(&self, space: TagSpace, reader: &mut BitReader<'_>) -> NetResult<u64> {
        let tag = reader.try_read_ranged(0, self.tag_count(space) as i64)?;
        Ok(tag as u64)
    }

    /// Initial-state entries in tag order.
    pub fn initial_entries(&self) -> impl Iterator<Item = &RegistryEntry> {
        self.spaces[TagSpace::Initial.slot()].iter().map(|&i| &self.entries[i])
    }

    /// Iterates all spaces with their tag counts, for diagnostics.
    pub fn space_sizes(&self) -> impl Iterator<Item = (TagSpace, u64)> + '_ {
        TagSpace::ALL.into_iter().map(|s| (s, self.tag_count(s)))
    }
}
