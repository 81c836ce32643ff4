//! In-process transport.
//!
//! Endpoints created from one [`MemoryNetwork`] reach each other by port.
//! Routing tables live behind a `parking_lot::Mutex`; each endpoint drains
//! its own `crossbeam_channel` inbox on `poll`.

use std::collections::HashMap;
use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;

use crate::error::{NetError, NetResult};

use super::{DeliveryMethod, DisconnectReason, PeerHandle, Transport, TransportEvent, TransportStats};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LinkState {
    Pending,
    Open,
}

#[derive(Debug)]
struct Link {
    client: u64,
    server: u64,
    state: LinkState,
}

impl Link {
    const fn other(&self, endpoint: u64) -> Option<u64> {
        if endpoint == self.client {
            Some(self.server)
        } else if endpoint == self.server {
            Some(self.client)
        } else {
            None
        }
    }
}

#[derive(Default)]
struct HubState {
    inboxes: HashMap<u64, Sender<TransportEvent>>,
    listeners: HashMap<u16, u64>,
    links: HashMap<u64, Link>,
    next_endpoint: u64,
    next_link: u64,
}

impl HubState {
    fn deliver(&self, endpoint: u64, event: TransportEvent) {
        if let Some(inbox) = self.inboxes.get(&endpoint) {
            // a dropped endpoint has already left the table
            let _ = inbox.send(event);
        }
    }
}

/// Shared routing hub for [`MemoryTransport`] endpoints.
#[derive(Clone, Default)]
pub struct MemoryNetwork {
    state: Arc<Mutex<HubState>>,
}

impl MemoryNetwork {
    /// Creates an empty network.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an endpoint attached to this network.
    #[must_use]
    pub fn endpoint(&self) -> MemoryTransport {
        let (sender, inbox) = unbounded();
        let mut state = self.state.lock();
        state.next_endpoint += 1;
        let id = state.next_endpoint;
        state.inboxes.insert(id, sender);
        MemoryTransport {
            id,
            network: self.clone(),
            inbox,
            stats: TransportStats::default(),
        }
    }

    /// Number of open or pending connections.
    #[must_use]
    pub fn link_count(&self) -> usize {
        self.state.lock().links.len()
    }
}

/// One endpoint of a [`MemoryNetwork`].
///
/// Both ends of a connection refer to it by the same [`PeerHandle`].
pub struct MemoryTransport {
    id: u64,
    network: MemoryNetwork,
    inbox: Receiver<TransportEvent>,
    stats: TransportStats,
}

impl MemoryTransport {
    /// Endpoint identifier within its network.
    #[inline]
    #[must_use]
    pub const fn endpoint_id(&self) -> u64 {
        self.id
    }

    fn answer(&mut self, handle: PeerHandle, accept: bool) -> NetResult<()> {
        let mut state = self.network.state.lock();
        let link = state
            .links
            .get_mut(&handle.0)
            .filter(|l| l.server == self.id && l.state == LinkState::Pending)
            .ok_or_else(|| NetError::Transport(format!("no pending request {}", handle.0)))?;

        let client = link.client;
        if accept {
            link.state = LinkState::Open;
            state.deliver(client, TransportEvent::Connected(handle));
            state.deliver(self.id, TransportEvent::Connected(handle));
        } else {
            state.links.remove(&handle.0);
            state.deliver(
                client,
                TransportEvent::Disconnected {
                    handle,
                    reason: DisconnectReason::Rejected,
                },
            );
        }
        Ok(())
    }
}

impl Transport for MemoryTransport {
    fn listen(&mut self, port: u16) -> NetResult<()> {
        let mut state = self.network.state.lock();
        if state.listeners.contains_key(&port) {
            return Err(NetError::Transport(format!("port {port} already in use")));
        }
        state.listeners.insert(port, self.id);
        tracing::debug!("Endpoint {} listening on port {}", self.id, port);
        Ok(())
    }

    fn connect(&mut self, address: &str, port: u16) -> NetResult<PeerHandle> {
        let mut state = self.network.state.lock();
        let server = *state
            .listeners
            .get(&port)
            .ok_or_else(|| NetError::Transport(format!("connection refused: {address}:{port}")))?;

        state.next_link += 1;
        let handle = PeerHandle(state.next_link);
        state.links.insert(
            handle.0,
            Link {
                client: self.id,
                server,
                state: LinkState::Pending,
            },
        );
        state.deliver(server, TransportEvent::ConnectionRequest(handle));
        Ok(handle)
    }

    fn accept(&mut self, handle: PeerHandle) -> NetResult<()> {
        self.answer(handle, true)
    }

    fn reject(&mut self, handle: PeerHandle) -> NetResult<()> {
        self.answer(handle, false)
    }

    fn send(&mut self, handle: PeerHandle, bytes: &[u8], delivery: DeliveryMethod) -> NetResult<()> {
        let state = self.network.state.lock();
        let target = state
            .links
            .get(&handle.0)
            .filter(|l| l.state == LinkState::Open)
            .and_then(|l| l.other(self.id));
        let Some(target) = target else {
            self.stats.send_errors += 1;
            return Err(NetError::Transport(format!("connection {} is not open", handle.0)));
        };

        state.deliver(
            target,
            TransportEvent::Data {
                handle,
                bytes: bytes.to_vec(),
                delivery,
            },
        );
        self.stats.packets_sent += 1;
        self.stats.bytes_sent += bytes.len() as u64;
        Ok(())
    }

    fn disconnect(&mut self, handle: PeerHandle) -> NetResult<()> {
        let mut state = self.network.state.lock();
        let other = state
            .links
            .get(&handle.0)
            .and_then(|l| l.other(self.id))
            .ok_or_else(|| NetError::Transport(format!("unknown connection {}", handle.0)))?;
        state.links.remove(&handle.0);

        state.deliver(
            other,
            TransportEvent::Disconnected {
                handle,
                reason: DisconnectReason::RemoteClosed,
            },
        );
        state.deliver(
            self.id,
            TransportEvent::Disconnected {
                handle,
                reason: DisconnectReason::Requested,
            },
        );
        Ok(())
    }

    fn poll(&mut self) -> Vec<TransportEvent> {
        let events: Vec<_> = self.inbox.try_iter().collect();
        for event in &events {
            if let TransportEvent::Data { bytes, .. } = event {
                self.stats.packets_received += 1;
                self.stats.bytes_received += bytes.len() as u64;
            }
        }
        events
    }

    fn stats(&self) -> TransportStats {
        self.stats
    }
}

impl Drop for MemoryTransport {
    fn drop(&mut self) {
        let mut state = self.network.state.lock();
        state.inboxes.remove(&self.id);
        state.listeners.retain(|_, &mut endpoint| endpoint != self.id);

        let id = self.id;
        let closed: Vec<(u64, u64)> = state
            .links
            .iter()
            .filter_map(|(&link, l)| l.other(id).map(|other| (link, other)))
            .collect();
        for (link, other) in closed {
            state.links.remove(&link);
            state.deliver(
                other,
                TransportEvent::Disconnected {
                    handle: PeerHandle(link),
                    reason: DisconnectReason::RemoteClosed,
                },
            );
        }
    }
}
