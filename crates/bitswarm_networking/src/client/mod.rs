//! # Swarm Client
//!
//! The joining end of a session.
//!
//! ## Lifecycle
//!
//! ```text
//! CONNECTING ──handshake──► AWAITING_INITIAL_STATE ──last item──► ACTIVE
//!                              │            ▲
//!                              │ file offer │ resolution
//!                              └── ack ─────┘
//! ```
//!
//! The local peer of a listen server skips all of this: the server reports
//! its ID and the application hands it over with
//! [`NetClient::adopt_host_identity`].

use std::collections::BTreeSet;
use std::sync::Arc;

use bitswarm_core::{BitReader, BitWriter, ScratchPool};

use crate::config::ClientConfig;
use crate::error::{NetError, NetResult};
use crate::files::{DirectoryFileStore, FileStore, InlineFiles, MemoryFileStore, OfferReader, ResolutionReader};
use crate::hooks::HookTable;
use crate::peer::{Envelope, Origin, PeerId};
use crate::protocol::control::{ClientControl, FileRound, Handshake, ItemHeader, ServerControl};
use crate::protocol::{CodecContext, NetMessage, Registry, TagSpace};
use crate::transport::{DeliveryMethod, DisconnectReason, PeerHandle, Transport, TransportEvent, TransportStats};
use crate::WRITER_POOL_SIZE;

/// Connection state of a client.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClientState {
    /// No connection.
    Disconnected,
    /// Waiting for the transport and the handshake.
    Connecting,
    /// Handshake received; initial state streaming.
    AwaitingInitialState,
    /// Joined; ordinary traffic flows.
    Active,
}

/// Something the application should know about after a tick.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClientEvent {
    /// This client joined with the given ID.
    SelfJoined(PeerId),
    /// Another peer joined.
    PeerJoined(PeerId),
    /// Another peer left.
    PeerQuit(PeerId),
    /// The connection closed.
    Disconnected(DisconnectReason),
}

/// Session client over any [`Transport`].
pub struct NetClient<T: Transport> {
    config: ClientConfig,
    registry: Arc<Registry>,
    transport: T,
    handle: Option<PeerHandle>,
    state: ClientState,
    self_id: Option<PeerId>,
    max_peer_index: Option<u8>,
    peers: BTreeSet<PeerId>,
    host: bool,
    store: Box<dyn FileStore>,
    hooks: HookTable,
    writers: ScratchPool<BitWriter>,
    events: Vec<ClientEvent>,
}

impl<T: Transport> NetClient<T> {
    /// Opens the connection described by `config`.
    ///
    /// Synced files go to `config.file_root` when set, else stay in memory.
    ///
    /// # Errors
    ///
    /// The file root cannot be created, or the transport refuses.
    pub fn connect(config: ClientConfig, registry: Arc<Registry>, mut transport: T) -> NetResult<Self> {
        let store: Box<dyn FileStore> = match &config.file_root {
            Some(root) => Box::new(DirectoryFileStore::open(root)?),
            None => Box::new(MemoryFileStore::new()),
        };
        let handle = transport.connect(&config.address, config.port)?;
        tracing::info!("Connecting to {}:{}", config.address, config.port);

        Ok(Self {
            hooks: HookTable::new(registry.entries().len()),
            config,
            registry,
            transport,
            handle: Some(handle),
            state: ClientState::Connecting,
            self_id: None,
            max_peer_index: None,
            peers: BTreeSet::new(),
            host: false,
            store,
            writers: ScratchPool::new(WRITER_POOL_SIZE, BitWriter::framed),
            events: Vec::new(),
        })
    }

    /// Replaces the file store.
    #[must_use]
    pub fn with_file_store(mut self, store: impl FileStore + 'static) -> Self {
        self.store = Box::new(store);
        self
    }

    /// Configuration in use.
    #[inline]
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Current state.
    #[inline]
    #[must_use]
    pub const fn state(&self) -> ClientState {
        self.state
    }

    /// ID assigned by the server, once known.
    #[inline]
    #[must_use]
    pub const fn self_id(&self) -> Option<PeerId> {
        self.self_id
    }

    /// Session capacity, once known.
    #[must_use]
    pub fn max_peers(&self) -> Option<u16> {
        self.max_peer_index.map(|m| u16::from(m) + 1)
    }

    /// Other peers currently in the session.
    #[must_use]
    pub fn peers(&self) -> Vec<PeerId> {
        self.peers.iter().copied().collect()
    }

    /// Synced file storage.
    #[must_use]
    pub fn file_store(&self) -> &dyn FileStore {
        self.store.as_ref()
    }

    /// Transport counters.
    #[must_use]
    pub fn stats(&self) -> TransportStats {
        self.transport.stats()
    }

    /// Runs `hook` for every `M` received.
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

    /// Makes this client the local peer of a listen server.
    ///
    /// `id` and `max_peers` come from the server's
    /// [`crate::ServerEvent::SelfJoined`]; no handshake takes place.
    pub fn adopt_host_identity(&mut self, id: PeerId, max_peers: u16) {
        self.host = true;
        self.self_id = Some(id);
        self.max_peer_index = Some(u8::try_from(max_peers.saturating_sub(1)).unwrap_or(u8::MAX));
        self.state = ClientState::Active;
        self.events.push(ClientEvent::SelfJoined(id));
        tracing::info!("Adopted host identity {}", id);
    }

    /// Sends `message` to the server.
    ///
    /// # Errors
    ///
    /// [`NetError::NotConnected`] before joining,
    /// [`NetError::DirectionViolation`] for server-only types, encode and
    /// transport failures.
    pub fn send<M: NetMessage>(&mut self, message: &M, delivery: DeliveryMethod) -> NetResult<()> {
        let (Some(handle), Some(max_index), ClientState::Active) = (self.handle, self.max_peer_index, self.state)
        else {
            return Err(NetError::NotConnected);
        };
        let registry = Arc::clone(&self.registry);
        let entry = registry.entry::<M>()?;
        let (Some(tag), Some(plan)) = (entry.client_tag, entry.client_plan.as_ref()) else {
            return Err(NetError::DirectionViolation { name: entry.name() });
        };

        let writer = self.writers.spawn();
        registry.write_tag(TagSpace::ClientOrigin, tag, writer);
        plan.encode(&message.to_record(), writer, &mut CodecContext::new(max_index, &mut InlineFiles))?;
        self.transport.send(handle, writer.finish(), delivery)
    }

    /// Closes the connection.
    ///
    /// # Errors
    ///
    /// [`NetError::NotConnected`] without a connection.
    pub fn disconnect(&mut self) -> NetResult<()> {
        let handle = self.handle.ok_or(NetError::NotConnected)?;
        self.transport.disconnect(handle)
    }

    /// Drains transport events, then returns pooled writers.
    pub fn tick(&mut self) -> Vec<ClientEvent> {
        for event in self.transport.poll() {
            match event {
                TransportEvent::Connected(handle) if Some(handle) == self.handle => {
                    if !self.host {
                        self.state = ClientState::AwaitingInitialState;
                    }
                    tracing::debug!("Transport connected");
                }
                TransportEvent::Disconnected { handle, reason } if Some(handle) == self.handle => {
                    tracing::info!("Disconnected: {:?}", reason);
                    self.handle = None;
                    self.state = ClientState::Disconnected;
                    self.peers.clear();
                    self.events.push(ClientEvent::Disconnected(reason));
                }
                TransportEvent::Data { bytes, .. } => {
                    if let Err(e) = self.handle_frame(&bytes) {
                        tracing::warn!("Dropped server frame: {}", e);
                    }
                }
                _ => {}
            }
        }
        self.writers.drain();
        std::mem::take(&mut self.events)
    }

    fn handle_frame(&mut self, bytes: &[u8]) -> NetResult<()> {
        let registry = Arc::clone(&self.registry);
        let mut reader = BitReader::from_frame(bytes)?;
        let tag = registry.read_tag(TagSpace::ServerOrigin, &mut reader)?;
        if tag == 0 {
            return match ServerControl::read(&registry, &mut reader, self.max_peer_index)? {
                ServerControl::Handshake(handshake) => self.handle_handshake(handshake),
                ServerControl::Item(header) => self.handle_item(&registry, header, &mut reader),
                ServerControl::PeerJoin(id) => {
                    if Some(id) != self.self_id && self.peers.insert(id) {
                        tracing::info!("Peer {} joined", id);
                        self.events.push(ClientEvent::PeerJoined(id));
                    }
                    Ok(())
                }
                ServerControl::PeerQuit(id) => {
                    if self.peers.remove(&id) {
                        tracing::info!("Peer {} left", id);
                        self.events.push(ClientEvent::PeerQuit(id));
                    }
                    Ok(())
                }
            };
        }

        let max_index = match (self.state, self.max_peer_index) {
            (ClientState::Active, Some(max_index)) => max_index,
            _ => return Err(NetError::Protocol("ordinary frame before joining".to_string())),
        };
        let entry = registry.resolve(TagSpace::ServerOrigin, tag)?;
        let plan = entry
            .server_plan
            .as_ref()
            .ok_or(NetError::DirectionViolation { name: entry.name() })?;
        let server_code = i64::from(max_index) + 1;

        // batched frames carry several [sender][fields] instances
        loop {
            let sender = reader.try_read_ranged(0, server_code)?;
            let origin = if sender == server_code {
                Origin::Server
            } else {
                Origin::Peer(PeerId(sender as u16))
            };
            let record = plan.decode(&mut reader, &mut CodecContext::new(max_index, &mut InlineFiles))?;
            self.hooks.dispatch(entry.index, origin, &record)?;
            if reader.is_at_end() {
                return Ok(());
            }
        }
    }

    fn handle_handshake(&mut self, handshake: Handshake) -> NetResult<()> {
        if self.host || self.state == ClientState::Active {
            return Err(NetError::Protocol("handshake after joining".to_string()));
        }
        tracing::info!(
            "Handshake: assigned {} of {} slots, {} peers present",
            handshake.self_id,
            u16::from(handshake.max_peer_index) + 1,
            handshake.present_peers().count()
        );
        self.self_id = Some(handshake.self_id);
        self.max_peer_index = Some(handshake.max_peer_index);
        self.peers = handshake.present_peers().collect();
        self.state = ClientState::AwaitingInitialState;
        if handshake.is_last {
            self.finish_join()?;
        }
        Ok(())
    }

    fn handle_item(&mut self, registry: &Registry, header: ItemHeader, reader: &mut BitReader<'_>) -> NetResult<()> {
        let (ClientState::AwaitingInitialState, Some(max_index), Some(handle)) =
            (self.state, self.max_peer_index, self.handle)
        else {
            return Err(NetError::Protocol("initial item outside the join".to_string()));
        };
        let entry = registry.resolve(TagSpace::Initial, header.tag)?;
        let plan = entry
            .server_plan
            .as_ref()
            .ok_or(NetError::DirectionViolation { name: entry.name() })?;

        let record = match header.sync {
            None => plan.decode(reader, &mut CodecContext::new(max_index, &mut InlineFiles))?,
            Some(FileRound { index, offer: true }) => {
                let file_plan = entry
                    .file_plan
                    .as_ref()
                    .ok_or_else(|| NetError::FileSync(format!("'{}' carries no files", entry.name())))?;
                let mut offer = OfferReader::new(self.store.as_mut());
                file_plan.decode(reader, &mut CodecContext::new(max_index, &mut offer))?;
                let ack = ClientControl::Ack {
                    tag: header.tag,
                    index,
                    verdicts: offer.into_verdicts(),
                };
                tracing::debug!("File offer {} for '{}' answered", index, entry.name());

                let writer = self.writers.spawn();
                ack.write(registry, writer);
                return self.transport.send(handle, writer.finish(), DeliveryMethod::ReliableOrdered);
            }
            Some(FileRound { offer: false, .. }) => {
                let mut files = ResolutionReader::new(self.store.as_mut());
                plan.decode(reader, &mut CodecContext::new(max_index, &mut files))?
            }
        };

        self.hooks.dispatch(entry.index, Origin::Server, &record)?;
        if header.is_last {
            self.finish_join()?;
        }
        Ok(())
    }

    fn finish_join(&mut self) -> NetResult<()> {
        let (Some(handle), Some(id)) = (self.handle, self.self_id) else {
            return Err(NetError::NotConnected);
        };
        let writer = self.writers.spawn();
        ClientControl::Ready.write(&self.registry, writer);
        self.transport.send(handle, writer.finish(), DeliveryMethod::ReliableOrdered)?;

        self.state = ClientState::Active;
        self.events.push(ClientEvent::SelfJoined(id));
        tracing::info!("Joined as {}", id);
        Ok(())
    }
}
