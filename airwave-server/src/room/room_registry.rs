use crate::room::EndpointId;
use crate::signaling::RelayOutput;
use airwave_core::RoomSummary;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// In-memory mapping of room identifier to the endpoints currently joined.
///
/// A room exists only while it has members. Every mutation is a short update
/// under the map's shard lock; nothing here waits on network I/O.
#[derive(Clone)]
pub struct RoomRegistry {
    rooms: Arc<DashMap<String, HashSet<EndpointId>>>,
    memberships: Arc<DashMap<EndpointId, String>>,
    output: Arc<dyn RelayOutput>,
}

impl RoomRegistry {
    pub fn new(output: Arc<dyn RelayOutput>) -> Self {
        Self {
            rooms: Arc::new(DashMap::new()),
            memberships: Arc::new(DashMap::new()),
            output,
        }
    }

    /// Move `endpoint` into `room_id`, creating the room if needed.
    ///
    /// Returns the member count of the room after the join.
    pub fn join(&self, endpoint: &EndpointId, room_id: &str) -> usize {
        if let Some(previous) = self
            .memberships
            .insert(endpoint.clone(), room_id.to_owned())
        {
            self.remove_member(&previous, endpoint);
        }

        let mut members = self.rooms.entry(room_id.to_owned()).or_default();
        members.insert(endpoint.clone());
        let count = members.len();
        drop(members);

        info!(room = room_id, %endpoint, total = count, "Endpoint joined room");
        count
    }

    /// Remove `endpoint` from its room, if any. Returns the room it left.
    pub fn leave(&self, endpoint: &EndpointId) -> Option<String> {
        let (_, room_id) = self.memberships.remove(endpoint)?;
        self.remove_member(&room_id, endpoint);
        info!(room = %room_id, %endpoint, "Endpoint left room");
        Some(room_id)
    }

    pub fn room_of(&self, endpoint: &EndpointId) -> Option<String> {
        self.memberships.get(endpoint).map(|room| room.clone())
    }

    pub fn member_count(&self, room_id: &str) -> usize {
        self.rooms.get(room_id).map(|m| m.len()).unwrap_or(0)
    }

    /// Snapshot of every non-empty room, sorted by identifier.
    pub fn list_rooms(&self) -> Vec<RoomSummary> {
        let mut rooms: Vec<RoomSummary> = self
            .rooms
            .iter()
            .filter(|entry| !entry.value().is_empty())
            .map(|entry| RoomSummary::new(entry.key().clone(), entry.value().len()))
            .collect();
        rooms.sort_by(|a, b| a.id.cmp(&b.id));
        rooms
    }

    /// Forward `payload` to every other member of the sender's room.
    ///
    /// Best-effort: a failed delivery is logged and the fan-out continues.
    /// Returns how many members the payload was queued for.
    pub fn broadcast(&self, endpoint: &EndpointId, payload: &str) -> usize {
        let Some(room_id) = self.room_of(endpoint) else {
            debug!(%endpoint, "Broadcast from roomless endpoint dropped");
            return 0;
        };

        // Collect first so the shard lock is released before delivering.
        let recipients: Vec<EndpointId> = match self.rooms.get(&room_id) {
            Some(members) => members.iter().filter(|m| *m != endpoint).cloned().collect(),
            None => return 0,
        };

        let mut delivered = 0;
        for recipient in recipients {
            match self.output.deliver(&recipient, payload) {
                Ok(()) => delivered += 1,
                Err(e) => warn!(room = %room_id, %recipient, "Broadcast delivery failed: {}", e),
            }
        }
        delivered
    }

    fn remove_member(&self, room_id: &str, endpoint: &EndpointId) {
        if let Some(mut members) = self.rooms.get_mut(room_id) {
            members.remove(endpoint);
        }
        if self
            .rooms
            .remove_if(room_id, |_, members| members.is_empty())
            .is_some()
        {
            debug!(room = room_id, "Room is empty, removed");
        }
    }
}
