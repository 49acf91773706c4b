use std::collections::{HashMap, HashSet};

/// conn_id ↔ user bindings for identified connections.
///
/// A user may hold any number of concurrent connections (multi-device);
/// a binding lives exactly as long as the underlying connection, with no
/// expiry of its own.
pub struct SessionRegistry {
    /// conn_id → user_id
    by_conn: HashMap<String, String>,
    /// user_id → conn_ids (reverse lookup for cleanup on disconnect)
    by_user: HashMap<String, HashSet<String>>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            by_conn: HashMap::new(),
            by_user: HashMap::new(),
        }
    }

    /// Record that a live connection represents the given user. Rebinding
    /// a connection replaces its previous user.
    pub fn bind(&mut self, conn_id: &str, user_id: &str) {
        if let Some(prev) = self
            .by_conn
            .insert(conn_id.to_string(), user_id.to_string())
        {
            self.drop_reverse(&prev, conn_id);
        }
        self.by_user
            .entry(user_id.to_string())
            .or_default()
            .insert(conn_id.to_string());
    }

    pub fn lookup(&self, conn_id: &str) -> Option<&str> {
        self.by_conn.get(conn_id).map(String::as_str)
    }

    /// All live connections bound to a user.
    pub fn connections_of(&self, user_id: &str) -> Vec<String> {
        self.by_user
            .get(user_id)
            .map(|conns| conns.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Drop a connection's binding. Returns the user it represented.
    pub fn unbind(&mut self, conn_id: &str) -> Option<String> {
        let user_id = self.by_conn.remove(conn_id)?;
        self.drop_reverse(&user_id, conn_id);
        Some(user_id)
    }

    pub fn count(&self) -> usize {
        self.by_conn.len()
    }

    fn drop_reverse(&mut self, user_id: &str, conn_id: &str) {
        if let Some(conns) = self.by_user.get_mut(user_id) {
            conns.remove(conn_id);
            if conns.is_empty() {
                self.by_user.remove(user_id);
            }
        }
    }
}
