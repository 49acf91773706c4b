use std::collections::{HashMap, HashSet};

/// Transient broadcast rooms, one per group.
///
/// Room membership is connection-scoped: it tracks which live sockets
/// receive a group's traffic, and is distinct from the persisted member
/// list on the group itself. Rooms vanish when their last occupant leaves.
pub struct RoomRegistry {
    rooms: HashMap<String, HashSet<String>>,
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self {
            rooms: HashMap::new(),
        }
    }

    /// Join a connection to a group's room. Returns false if it was
    /// already there.
    pub fn join(&mut self, group_id: &str, conn_id: &str) -> bool {
        self.rooms
            .entry(group_id.to_string())
            .or_default()
            .insert(conn_id.to_string())
    }

    /// Remove a connection from one room. Always succeeds.
    pub fn leave(&mut self, group_id: &str, conn_id: &str) {
        if let Some(room) = self.rooms.get_mut(group_id) {
            room.remove(conn_id);
            if room.is_empty() {
                self.rooms.remove(group_id);
            }
        }
    }

    /// Drop a connection from every room it occupies (disconnect path).
    pub fn leave_all(&mut self, conn_id: &str) {
        self.rooms.retain(|_, room| {
            room.remove(conn_id);
            !room.is_empty()
        });
    }

    pub fn occupies(&self, group_id: &str, conn_id: &str) -> bool {
        self.rooms
            .get(group_id)
            .is_some_and(|room| room.contains(conn_id))
    }

    /// Snapshot of the connections currently in a group's room.
    pub fn members(&self, group_id: &str) -> Vec<String> {
        self.rooms
            .get(group_id)
            .map(|room| room.iter().cloned().collect())
            .unwrap_or_default()
    }
}
