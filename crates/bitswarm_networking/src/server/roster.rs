//! # Peer Roster
//!
//! Fixed-size peer slots indexed by [`PeerId`].
//!
//! ## Design
//!
//! - One slot per assignable ID, allocated lowest-free first
//! - Released IDs are reused by the next connection
//! - The local peer of a listen server occupies slot 0 but is not remote

use std::collections::HashMap;

use crate::peer::PeerId;
use crate::transport::PeerHandle;

/// Lifecycle of an occupied slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotState {
    /// Handshake sent; initial state still streaming.
    Streaming,
    /// The peer signalled ready and receives ordinary traffic.
    Active,
}

/// One occupied slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Slot {
    /// Transport connection of the peer.
    pub handle: PeerHandle,
    /// Lifecycle state.
    pub state: SlotState,
    /// The listen server's own peer.
    pub local: bool,
}

/// Peer-ID allocation table.
#[derive(Debug)]
pub struct PeerRoster {
    slots: Vec<Option<Slot>>,
    by_handle: HashMap<PeerHandle, PeerId>,
}

impl PeerRoster {
    /// Creates `max_peers` empty slots.
    #[must_use]
    pub fn new(max_peers: u16) -> Self {
        Self {
            slots: vec![None; usize::from(max_peers)],
            by_handle: HashMap::with_capacity(usize::from(max_peers)),
        }
    }

    /// Total slots.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Occupied slots.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_handle.len()
    }

    /// Returns true if no slot is occupied.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_handle.is_empty()
    }

    /// Assigns the lowest free ID to a remote peer.
    pub fn allocate(&mut self, handle: PeerHandle) -> Option<PeerId> {
        let index = self.slots.iter().position(Option::is_none)?;
        Some(self.occupy(index, handle, SlotState::Streaming, false))
    }

    /// Assigns [`PeerId::LOCAL_HOST`] to the listen server's own peer.
    ///
    /// The local peer skips the handshake and is active at once.
    pub fn reserve_local(&mut self, handle: PeerHandle) -> Option<PeerId> {
        let index = PeerId::LOCAL_HOST.index();
        if self.slots.get(index)?.is_some() {
            return None;
        }
        Some(self.occupy(index, handle, SlotState::Active, true))
    }

    fn occupy(&mut self, index: usize, handle: PeerHandle, state: SlotState, local: bool) -> PeerId {
        let id = PeerId(index as u16);
        self.slots[index] = Some(Slot { handle, state, local });
        self.by_handle.insert(handle, id);
        id
    }

    /// Frees `id`, returning what occupied it.
    pub fn release(&mut self, id: PeerId) -> Option<Slot> {
        let slot = self.slots.get_mut(id.index())?.take()?;
        self.by_handle.remove(&slot.handle);
        Some(slot)
    }

    /// Slot of `id`.
    #[must_use]
    pub fn slot(&self, id: PeerId) -> Option<&Slot> {
        self.slots.get(id.index())?.as_ref()
    }

    /// ID bound to a connection.
    #[must_use]
    pub fn id_of(&self, handle: PeerHandle) -> Option<PeerId> {
        self.by_handle.get(&handle).copied()
    }

    /// Connection of `id`.
    #[must_use]
    pub fn handle_of(&self, id: PeerId) -> Option<PeerHandle> {
        self.slot(id).map(|s| s.handle)
    }

    /// Moves `id` to [`SlotState::Active`]. Returns false if unoccupied.
    pub fn mark_active(&mut self, id: PeerId) -> bool {
        match self.slots.get_mut(id.index()).and_then(Option::as_mut) {
            Some(slot) => {
                slot.state = SlotState::Active;
                true
            }
            None => false,
        }
    }

    /// Returns true if `id` is occupied and active.
    #[must_use]
    pub fn is_active(&self, id: PeerId) -> bool {
        self.slot(id).is_some_and(|s| s.state == SlotState::Active)
    }

    /// The listen server's own peer, if reserved.
    #[must_use]
    pub fn local(&self) -> Option<PeerId> {
        self.slot(PeerId::LOCAL_HOST)
            .filter(|s| s.local)
            .map(|_| PeerId::LOCAL_HOST)
    }

    /// Occupied slots in ID order.
    pub fn iter(&self) -> impl Iterator<Item = (PeerId, &Slot)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|s| (PeerId(i as u16), s)))
    }

    /// Remote peers in any state.
    pub fn remote_peers(&self) -> impl Iterator<Item = (PeerId, &Slot)> {
        self.iter().filter(|(_, s)| !s.local)
    }

    /// Active peers, local peer included.
    #[must_use]
    pub fn all_peers(&self) -> Vec<PeerId> {
        self.iter()
            .filter(|(_, s)| s.state == SlotState::Active)
            .map(|(id, _)| id)
            .collect()
    }

    /// Active remote peers and their connections.
    #[must_use]
    pub fn active_remote(&self) -> Vec<(PeerId, PeerHandle)> {
        self.remote_peers()
            .filter(|(_, s)| s.state == SlotState::Active)
            .map(|(id, s)| (id, s.handle))
            .collect()
    }

    /// Active-peer bitmap over every slot.
    #[must_use]
    pub fn presence(&self) -> Vec<bool> {
        self.slots
            .iter()
            .map(|s| s.is_some_and(|s| s.state == SlotState::Active))
            .collect()
    }
}
