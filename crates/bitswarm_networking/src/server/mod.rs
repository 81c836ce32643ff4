//! # Swarm Server
//!
//! The authoritative end of a session: allocates peer IDs, streams the
//! initial state to joining peers, runs behavior hooks and relays traffic.
//!
//! ## Lifecycle
//!
//! ```text
//! LISTENING ──request──► capacity? ──no──► reject
//!                            │ yes
//!                            ▼
//!                     ALLOCATING_ID ──► handshake
//!                            │
//!                            ▼
//!              STREAMING_INITIAL_STATE ◄──┐ per item; file items wait
//!                            │            │ for the client's verdicts
//!                            ├────────────┘
//!                            ▼ ready
//!                         ACTIVE ──► PeerJoin to the others
//!                            │
//!                            ▼ disconnect
//!                      RELEASING_ID ──► PeerQuit to the others
//! ```
//!
//! ## Design
//!
//! - Single-threaded: all state is touched only from [`NetServer::tick`]
//! - A fault while handling one frame is logged and the frame dropped
//! - Outgoing frames are built in pooled writers, returned every tick

mod roster;

pub use roster::{PeerRoster, Slot, SlotState};

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use bitswarm_core::{BitReader, BitWriter, ScratchPool};

use crate::config::ServerConfig;
use crate::error::{NetError, NetResult};
use crate::files::{FileStatus, FileSyncCache, InlineFiles, OfferWriter, ResolutionWriter};
use crate::hooks::HookTable;
use crate::peer::{Envelope, Origin, PeerId};
use crate::protocol::control::{
    write_peer_event, ClientControl, ControlKind, FileRound, Handshake, ItemHeader,
};
use crate::protocol::{CodecContext, NetMessage, Plan, Record, Registry, RegistryEntry, TagSpace, Value};
use crate::transport::{DeliveryMethod, DisconnectReason, PeerHandle, Transport, TransportEvent, TransportStats};
use crate::WRITER_POOL_SIZE;

/// Something the application should know about after a tick.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ServerEvent {
    /// The listen server's own peer connected.
    SelfJoined(PeerId),
    /// A remote peer finished joining.
    PeerJoined(PeerId),
    /// An active peer left.
    PeerQuit(PeerId),
    /// A connection was refused for lack of capacity.
    Rejected(PeerHandle),
    /// A synced file reached its verdict.
    FileResolved {
        /// Receiving peer.
        peer: PeerId,
        /// Logical file name.
        name: String,
        /// Final verdict.
        status: FileStatus,
        /// Payload bytes sent; zero when identical.
        payload_bytes: usize,
    },
}

/// A registered initial-state instance.
struct InitialItem {
    entry: usize,
    record: Record,
}

/// Join progress of one streaming peer.
struct JoinStream {
    /// Items in this peer's stream, fixed when its handshake is sent.
    length: usize,
    /// Next initial item to send.
    cursor: usize,
    /// Item whose file verdicts are outstanding.
    awaiting: Option<u64>,
    files: FileSyncCache,
}

impl JoinStream {
    fn new(length: usize) -> Self {
        Self {
            length,
            cursor: 0,
            awaiting: None,
            files: FileSyncCache::new(),
        }
    }

    fn is_done(&self) -> bool {
        self.awaiting.is_none() && self.cursor >= self.length
    }
}

/// Session server over any [`Transport`].
pub struct NetServer<T: Transport> {
    config: ServerConfig,
    registry: Arc<Registry>,
    transport: T,
    roster: PeerRoster,
    streams: HashMap<PeerId, JoinStream>,
    pending: HashSet<PeerHandle>,
    local_claimed: bool,
    initial: Vec<InitialItem>,
    hooks: HookTable,
    writers: ScratchPool<BitWriter>,
    events: Vec<ServerEvent>,
}

impl<T: Transport> NetServer<T> {
    /// Validates `config` and starts listening.
    ///
    /// # Errors
    ///
    /// [`NetError::Config`] for invalid capacity, or a transport failure.
    pub fn new(config: ServerConfig, registry: Arc<Registry>, mut transport: T) -> NetResult<Self> {
        config.validate()?;
        transport.listen(config.port)?;
        tracing::info!(
            "Server listening on port {} ({} peers, listen={})",
            config.port,
            config.max_peers,
            config.listen
        );

        Ok(Self {
            roster: PeerRoster::new(config.max_peers),
            hooks: HookTable::new(registry.entries().len()),
            config,
            registry,
            transport,
            streams: HashMap::new(),
            pending: HashSet::new(),
            local_claimed: false,
            initial: Vec::new(),
            writers: ScratchPool::new(WRITER_POOL_SIZE, BitWriter::framed),
            events: Vec::new(),
        })
    }

    /// Configuration in use.
    #[inline]
    #[must_use]
    pub const fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Shared registry.
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Highest assignable peer ID.
    #[inline]
    #[must_use]
    pub const fn max_peer_index(&self) -> u8 {
        self.config.max_peer_index()
    }

    /// The listen server's own peer, once connected.
    #[must_use]
    pub fn self_id(&self) -> Option<PeerId> {
        self.roster.local()
    }

    /// Active peers, local peer included.
    #[must_use]
    pub fn peer_ids(&self) -> Vec<PeerId> {
        self.roster.all_peers()
    }

    /// Active remote peers.
    #[must_use]
    pub fn remote_peer_ids(&self) -> Vec<PeerId> {
        self.roster.active_remote().into_iter().map(|(id, _)| id).collect()
    }

    /// Peer slots.
    #[inline]
    #[must_use]
    pub const fn roster(&self) -> &PeerRoster {
        &self.roster
    }

    /// Transport counters.
    #[must_use]
    pub fn stats(&self) -> TransportStats {
        self.transport.stats()
    }

    /// Underlying transport.
    #[inline]
    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Runs `hook` for every `M` received from a remote peer.
    ///
    /// # Errors
    ///
    /// [`crate::SchemaError::UnknownType`] if `M` is not registered.
    pub fn on_receive<M, F>(&mut self, hook: F) -> NetResult<()>
    where
        M: NetMessage,
        F: FnMut(Envelope<M>) + 'static,
    {
        let index = self.registry.entry::<M>()?.index;
        self.hooks.set::<M, F>(index, hook);
        Ok(())
    }

    /// Adds an instance to the initial state streamed to peers that join
    /// from now on.
    ///
    /// Peers already streaming keep the item count of their handshake.
    ///
    /// # Errors
    ///
    /// `M` is unregistered or not an initial-state type.
    pub fn push_initial_data<M: NetMessage>(&mut self, message: &M) -> NetResult<()> {
        let entry = self.registry.entry::<M>()?;
        if entry.initial_tag.is_none() {
            return Err(NetError::Protocol(format!("'{}' is not an initial-state type", entry.name())));
        }
        self.initial.push(InitialItem {
            entry: entry.index,
            record: message.to_record(),
        });
        Ok(())
    }

    /// Sends `message` to one active remote peer.
    ///
    /// # Errors
    ///
    /// Direction violations, unknown peers, encode and transport failures.
    pub fn send_to<M: NetMessage>(&mut self, peer: PeerId, message: &M, delivery: DeliveryMethod) -> NetResult<()> {
        let handle = self
            .roster
            .active_remote()
            .into_iter()
            .find_map(|(id, handle)| (id == peer).then_some(handle))
            .ok_or(NetError::UnknownPeer(peer.0))?;

        let registry = Arc::clone(&self.registry);
        let (tag, plan) = server_side(registry.entry::<M>()?)?;
        let sender = self.origin_code();
        let max_peers = self.config.max_peers;
        let max_index = self.max_peer_index();

        let writer = self.writers.spawn();
        registry.write_tag(TagSpace::ServerOrigin, tag, writer);
        write_instance(plan, &message.to_record(), sender, max_peers, max_index, writer)?;
        self.transport.send(handle, writer.finish(), delivery)
    }

    /// Sends `message` to every active remote peer except `exclude`.
    ///
    /// Returns the number of recipients.
    ///
    /// # Errors
    ///
    /// Direction violations and encode failures. Per-peer send failures
    /// are logged.
    pub fn broadcast<M: NetMessage>(
        &mut self,
        message: &M,
        delivery: DeliveryMethod,
        exclude: Option<PeerId>,
    ) -> NetResult<usize> {
        let registry = Arc::clone(&self.registry);
        let (tag, plan) = server_side(registry.entry::<M>()?)?;
        let sender = self.origin_code();
        let max_peers = self.config.max_peers;
        let max_index = self.max_peer_index();
        let recipients = self.roster.active_remote();

        let writer = self.writers.spawn();
        registry.write_tag(TagSpace::ServerOrigin, tag, writer);
        write_instance(plan, &message.to_record(), sender, max_peers, max_index, writer)?;
        let frame = writer.finish();
        Ok(send_all(&mut self.transport, &recipients, exclude, frame, delivery))
    }

    /// Sends each active remote peer one frame holding the `M` of every
    /// other active peer, as produced by `state_of`.
    ///
    /// Peers with nothing to receive get no frame. Returns frames sent.
    ///
    /// # Errors
    ///
    /// Direction violations and encode failures.
    pub fn sync_each_peer<M, F>(&mut self, delivery: DeliveryMethod, mut state_of: F) -> NetResult<usize>
    where
        M: NetMessage,
        F: FnMut(PeerId) -> Option<M>,
    {
        let registry = Arc::clone(&self.registry);
        let (tag, plan) = server_side(registry.entry::<M>()?)?;
        let max_peers = self.config.max_peers;
        let max_index = self.max_peer_index();

        let instances: Vec<(PeerId, Record)> = self
            .roster
            .all_peers()
            .into_iter()
            .filter_map(|id| state_of(id).map(|m| (id, m.to_record())))
            .collect();

        let mut frames = 0;
        for (recipient, handle) in self.roster.active_remote() {
            let mut others = instances.iter().filter(|(id, _)| *id != recipient).peekable();
            if others.peek().is_none() {
                continue;
            }
            let writer = self.writers.spawn();
            registry.write_tag(TagSpace::ServerOrigin, tag, writer);
            for (id, record) in others {
                write_instance(plan, record, i64::from(id.0), max_peers, max_index, writer)?;
            }
            match self.transport.send(handle, writer.finish(), delivery) {
                Ok(()) => frames += 1,
                Err(e) => tracing::warn!("Sync to peer {} failed: {}", recipient, e),
            }
        }
        Ok(frames)
    }

    /// Disconnects a peer.
    ///
    /// # Errors
    ///
    /// [`NetError::UnknownPeer`] if `peer` holds no slot.
    pub fn kick(&mut self, peer: PeerId) -> NetResult<()> {
        let handle = self.roster.handle_of(peer).ok_or(NetError::UnknownPeer(peer.0))?;
        self.transport.disconnect(handle)
    }

    /// Drains transport events, then returns pooled writers.
    pub fn tick(&mut self) -> Vec<ServerEvent> {
        for event in self.transport.poll() {
            match event {
                TransportEvent::ConnectionRequest(handle) => self.handle_request(handle),
                TransportEvent::Connected(handle) => {
                    if let Err(e) = self.handle_connected(handle) {
                        tracing::warn!("Join of connection {} failed: {}", handle.0, e);
                    }
                }
                TransportEvent::Disconnected { handle, reason } => self.handle_disconnected(handle, reason),
                TransportEvent::Data { handle, bytes, delivery } => {
                    if let Err(e) = self.handle_data(handle, &bytes, delivery) {
                        tracing::warn!("Dropped frame from connection {}: {}", handle.0, e);
                    }
                }
            }
        }
        self.writers.drain();
        std::mem::take(&mut self.events)
    }

    /// Sender code stamped on frames the server originates.
    fn origin_code(&self) -> i64 {
        self.roster
            .local()
            .map_or(i64::from(self.config.max_peers), |id| i64::from(id.0))
    }

    fn handle_request(&mut self, handle: PeerHandle) {
        if self.roster.len() + self.pending.len() >= usize::from(self.config.max_peers) {
            tracing::info!("Rejecting connection {}: server full", handle.0);
            if let Err(e) = self.transport.reject(handle) {
                tracing::warn!("Reject of connection {} failed: {}", handle.0, e);
            }
            self.events.push(ServerEvent::Rejected(handle));
            return;
        }
        match self.transport.accept(handle) {
            Ok(()) => {
                self.pending.insert(handle);
            }
            Err(e) => tracing::warn!("Accept of connection {} failed: {}", handle.0, e),
        }
    }

    fn handle_connected(&mut self, handle: PeerHandle) -> NetResult<()> {
        self.pending.remove(&handle);

        if self.config.listen && !self.local_claimed {
            if let Some(id) = self.roster.reserve_local(handle) {
                self.local_claimed = true;
                tracing::info!("Local peer joined as {}", id);
                self.events.push(ServerEvent::SelfJoined(id));
                return Ok(());
            }
        }

        let Some(id) = self.roster.allocate(handle) else {
            self.transport.disconnect(handle)?;
            return Err(NetError::Protocol("no free peer slot".to_string()));
        };
        tracing::info!("Connection {} assigned peer {}", handle.0, id);

        let handshake = Handshake {
            max_peer_index: self.max_peer_index(),
            self_id: id,
            presence: self.roster.presence(),
            is_last: self.initial.is_empty(),
        };
        let writer = self.writers.spawn();
        handshake.write(&self.registry, writer);
        self.transport.send(handle, writer.finish(), DeliveryMethod::ReliableOrdered)?;
        tracing::debug!("Handshake sent to {} ({} initial items)", id, self.initial.len());

        self.streams.insert(id, JoinStream::new(self.initial.len()));
        self.advance_stream(id, handle)
    }

    /// Streams items until the end or the next file-bearing item.
    fn advance_stream(&mut self, id: PeerId, handle: PeerHandle) -> NetResult<()> {
        let registry = Arc::clone(&self.registry);
        let max_index = self.max_peer_index();
        let Some(stream) = self.streams.get_mut(&id) else {
            return Ok(());
        };

        while stream.awaiting.is_none() && stream.cursor < stream.length {
            let index = stream.cursor;
            let item = &self.initial[index];
            let entry = initial_entry(&registry, item.entry)?;
            let (tag, plan) = initial_side(entry)?;
            let is_last = index + 1 == stream.length;

            let writer = self.writers.spawn();
            if let Some(file_plan) = &entry.file_plan {
                let header = ItemHeader {
                    tag,
                    is_last,
                    sync: Some(FileRound {
                        index: index as u64,
                        offer: true,
                    }),
                };
                header.write(&registry, writer);
                let mut files = OfferWriter::new(&mut stream.files);
                file_plan.encode(&item.record, writer, &mut CodecContext::new(max_index, &mut files))?;
                stream.awaiting = Some(index as u64);
                tracing::debug!("Offered files of '{}' to {}", entry.name(), id);
            } else {
                ItemHeader { tag, is_last, sync: None }.write(&registry, writer);
                plan.encode(&item.record, writer, &mut CodecContext::new(max_index, &mut InlineFiles))?;
                stream.cursor += 1;
            }
            self.transport.send(handle, writer.finish(), DeliveryMethod::ReliableOrdered)?;
        }
        Ok(())
    }

    fn handle_disconnected(&mut self, handle: PeerHandle, reason: DisconnectReason) {
        if self.pending.remove(&handle) {
            return;
        }
        let Some(id) = self.roster.id_of(handle) else {
            return;
        };
        let Some(slot) = self.roster.release(id) else {
            return;
        };
        self.streams.remove(&id);
        tracing::info!("Peer {} disconnected ({:?}), ID released", id, reason);

        if slot.state == SlotState::Active {
            self.notify_peers(ControlKind::PeerQuit, id);
            self.events.push(ServerEvent::PeerQuit(id));
        }
    }

    /// Sends a join or quit notice about `about` to every other remote peer.
    fn notify_peers(&mut self, kind: ControlKind, about: PeerId) {
        let recipients: Vec<(PeerId, PeerHandle)> = self
            .roster
            .remote_peers()
            .filter(|(id, _)| *id != about)
            .map(|(id, slot)| (id, slot.handle))
            .collect();
        let max_index = self.max_peer_index();

        let writer = self.writers.spawn();
        write_peer_event(&self.registry, kind, about, max_index, writer);
        let frame = writer.finish();
        send_all(&mut self.transport, &recipients, None, frame, DeliveryMethod::ReliableOrdered);
    }

    fn handle_data(&mut self, handle: PeerHandle, bytes: &[u8], delivery: DeliveryMethod) -> NetResult<()> {
        let id = self
            .roster
            .id_of(handle)
            .ok_or_else(|| NetError::Protocol("data from an unbound connection".to_string()))?;
        let registry = Arc::clone(&self.registry);
        let mut reader = BitReader::from_frame(bytes)?;

        let tag = registry.read_tag(TagSpace::ClientOrigin, &mut reader)?;
        if tag == 0 {
            return match ClientControl::read(&registry, &mut reader)? {
                ClientControl::Ready => self.handle_ready(id),
                ClientControl::Ack { tag, index, verdicts } => self.handle_ack(id, handle, tag, index, &verdicts),
            };
        }

        if !self.roster.is_active(id) {
            return Err(NetError::Protocol(format!("peer {id} sent traffic before joining")));
        }
        let entry = registry.resolve(TagSpace::ClientOrigin, tag)?;
        let plan = entry
            .client_plan
            .as_ref()
            .ok_or(NetError::DirectionViolation { name: entry.name() })?;
        let record = plan.decode(&mut reader, &mut CodecContext::new(self.max_peer_index(), &mut InlineFiles))?;

        if self.roster.local() != Some(id) {
            self.hooks.dispatch(entry.index, Origin::Peer(id), &record)?;
        }
        if entry.relay {
            self.relay(&registry, entry, id, &record, delivery)?;
        }
        Ok(())
    }

    /// Forwards a peer's message to every other active remote peer with the
    /// sender's delivery method.
    fn relay(
        &mut self,
        registry: &Registry,
        entry: &RegistryEntry,
        from: PeerId,
        record: &Record,
        delivery: DeliveryMethod,
    ) -> NetResult<()> {
        let (tag, plan) = server_side(entry)?;
        let max_peers = self.config.max_peers;
        let max_index = self.max_peer_index();
        let recipients = self.roster.active_remote();

        let writer = self.writers.spawn();
        registry.write_tag(TagSpace::ServerOrigin, tag, writer);
        write_instance(plan, record, i64::from(from.0), max_peers, max_index, writer)?;
        let sent = send_all(&mut self.transport, &recipients, Some(from), writer.finish(), delivery);
        tracing::debug!("Relayed '{}' from {} to {} peers", entry.name(), from, sent);
        Ok(())
    }

    fn handle_ready(&mut self, id: PeerId) -> NetResult<()> {
        if !self.streams.get(&id).is_some_and(JoinStream::is_done) {
            return Err(NetError::Protocol(format!("peer {id} signalled ready mid-stream")));
        }
        self.streams.remove(&id);
        self.roster.mark_active(id);
        tracing::info!("Peer {} joined", id);

        self.notify_peers(ControlKind::PeerJoin, id);
        self.events.push(ServerEvent::PeerJoined(id));
        Ok(())
    }

    fn handle_ack(&mut self, id: PeerId, handle: PeerHandle, tag: u64, index: u64, verdicts: &[bool]) -> NetResult<()> {
        let registry = Arc::clone(&self.registry);
        let max_index = self.max_peer_index();
        let stream = self
            .streams
            .get_mut(&id)
            .filter(|s| s.awaiting == Some(index))
            .ok_or_else(|| NetError::Protocol(format!("unexpected file ack {index} from {id}")))?;

        let item = usize::try_from(index)
            .ok()
            .filter(|&i| i < stream.length)
            .and_then(|i| self.initial.get(i))
            .ok_or_else(|| NetError::Protocol(format!("file ack for missing item {index}")))?;
        let entry = initial_entry(&registry, item.entry)?;
        let (item_tag, plan) = initial_side(entry)?;
        let file_plan = entry
            .file_plan
            .as_ref()
            .ok_or_else(|| NetError::FileSync(format!("'{}' carries no files", entry.name())))?;
        if item_tag != tag || verdicts.len() != file_plan.file_count() {
            return Err(NetError::Protocol(format!("file ack {index} does not match its offer")));
        }

        for (step, &identical) in file_plan.steps().iter().zip(verdicts) {
            if let Some(Value::File(file)) = item.record.get_path(&step.path) {
                stream.files.set_verdict(&file.name, identical);
                tracing::debug!("Peer {} verdict for '{}': identical={}", id, file.name, identical);
            }
        }

        let header = ItemHeader {
            tag,
            is_last: index as usize + 1 == stream.length,
            sync: Some(FileRound { index, offer: false }),
        };
        let writer = self.writers.spawn();
        header.write(&registry, writer);
        let mut files = ResolutionWriter::new(&mut stream.files);
        plan.encode(&item.record, writer, &mut CodecContext::new(max_index, &mut files))?;
        let resolved = files.into_resolved();
        self.transport.send(handle, writer.finish(), DeliveryMethod::ReliableOrdered)?;

        for file in resolved {
            tracing::info!(
                "File '{}' for peer {}: {:?}, {} payload bytes",
                file.name,
                id,
                file.status,
                file.payload_bytes
            );
            self.events.push(ServerEvent::FileResolved {
                peer: id,
                name: file.name,
                status: file.status,
                payload_bytes: file.payload_bytes,
            });
        }
        stream.awaiting = None;
        stream.cursor += 1;
        self.advance_stream(id, handle)
    }
}

fn server_side(entry: &RegistryEntry) -> NetResult<(u64, &Plan)> {
    match (entry.server_tag, entry.server_plan.as_ref()) {
        (Some(tag), Some(plan)) => Ok((tag, plan)),
        _ => Err(NetError::DirectionViolation { name: entry.name() }),
    }
}

fn initial_side(entry: &RegistryEntry) -> NetResult<(u64, &Plan)> {
    match (entry.initial_tag, entry.server_plan.as_ref()) {
        (Some(tag), Some(plan)) => Ok((tag, plan)),
        _ => Err(NetError::Protocol(format!("'{}' is not an initial-state type", entry.name()))),
    }
}

fn initial_entry(registry: &Registry, index: usize) -> NetResult<&RegistryEntry> {
    registry
        .entry_at(index)
        .ok_or_else(|| NetError::Protocol(format!("no registry entry {index}")))
}

/// Writes `[sender][fields]` for one instance.
fn write_instance(
    plan: &Plan,
    record: &Record,
    sender: i64,
    max_peers: u16,
    max_peer_index: u8,
    writer: &mut BitWriter,
) -> NetResult<()> {
    writer.write_ranged(0, i64::from(max_peers), sender);
    plan.encode(record, writer, &mut CodecContext::new(max_peer_index, &mut InlineFiles))
}

/// Sends `frame` to each recipient except `exclude`; returns successful sends.
fn send_all<T: Transport>(
    transport: &mut T,
    recipients: &[(PeerId, PeerHandle)],
    exclude: Option<PeerId>,
    frame: &[u8],
    delivery: DeliveryMethod,
) -> usize {
    let mut sent = 0;
    for &(id, handle) in recipients {
        if Some(id) == exclude {
            continue;
        }
        match transport.send(handle, frame, delivery) {
            Ok(()) => sent += 1,
            Err(e) => tracing::warn!("Send to peer {} failed: {}", id, e),
        }
    }
    sent
}
