//! JSON-file-backed [`Store`].
//!
//! The document is loaded once at startup and held in memory; every
//! mutation rewrites the whole file. Concurrent server processes sharing
//! one file would clobber each other — this store is single-process by
//! contract.

use std::{
    path::PathBuf,
    time::{SystemTime, UNIX_EPOCH},
};

use {
    async_trait::async_trait,
    tokio::sync::RwLock,
    tracing::{debug, error},
    uuid::Uuid,
};

use crate::{
    Store, credentials,
    error::StoreError,
    records::{Group, Message, StoreDocument, User},
};

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[derive(Debug)]
pub struct JsonStore {
    path: PathBuf,
    doc: RwLock<StoreDocument>,
}

impl JsonStore {
    /// Load the document from disk, or start empty when the file is absent.
    /// An unreadable or corrupt file is an error: refusing to start beats
    /// silently clobbering it on the next flush.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let doc = match tokio::fs::read_to_string(&path).await {
            Ok(data) => serde_json::from_str(&data).map_err(|e| {
                StoreError::Persistence(format!("corrupt store file {}: {e}", path.display()))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoreDocument::default(),
            Err(e) => {
                return Err(StoreError::Persistence(format!(
                    "failed to read {}: {e}",
                    path.display()
                )));
            },
        };
        debug!(path = %path.display(), "store loaded");
        Ok(Self {
            path,
            doc: RwLock::new(doc),
        })
    }

    /// Rewrite the whole document. A failed flush is logged and swallowed:
    /// the service keeps running on in-memory state rather than dropping
    /// the caller's write.
    async fn flush(&self, doc: &StoreDocument) {
        let data = match serde_json::to_string_pretty(doc) {
            Ok(data) => data,
            Err(e) => {
                error!(error = %e, "failed to serialize store document");
                return;
            },
        };
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                if let Err(e) = tokio::fs::create_dir_all(parent).await {
                    error!(path = %self.path.display(), error = %e, "failed to create store directory");
                    return;
                }
            }
        }
        if let Err(e) = tokio::fs::write(&self.path, data).await {
            error!(path = %self.path.display(), error = %e, "failed to write store file");
        }
    }
}

#[async_trait]
impl Store for JsonStore {
    async fn authenticate(&self, username: &str, password: &str) -> Result<User, StoreError> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Err(StoreError::Validation(
                "username and password are required".into(),
            ));
        }

        let mut doc = self.doc.write().await;
        if let Some(user) = doc.users.iter().find(|u| u.username == username) {
            if credentials::verify(password, &user.password_hash) {
                return Ok(user.clone());
            }
            return Err(StoreError::AuthFailed);
        }

        // First-seen username registers on the fly.
        let user = User {
            user_id: Uuid::new_v4().to_string(),
            username: username.to_string(),
            password_hash: credentials::hash(password)?,
            created_at: now_ms(),
        };
        doc.users.push(user.clone());
        self.flush(&doc).await;
        Ok(user)
    }

    async fn user(&self, user_id: &str) -> Option<User> {
        self.doc
            .read()
            .await
            .users
            .iter()
            .find(|u| u.user_id == user_id)
            .cloned()
    }

    async fn create_group(&self, name: &str, creator_user_id: &str) -> Result<Group, StoreError> {
        let name = name.trim();
        if name.is_empty() || creator_user_id.is_empty() {
            return Err(StoreError::Validation(
                "groupName and userId are required".into(),
            ));
        }

        let mut doc = self.doc.write().await;
        if !doc.users.iter().any(|u| u.user_id == creator_user_id) {
            return Err(StoreError::NotFound(format!(
                "unknown user: {creator_user_id}"
            )));
        }

        let group = Group {
            group_id: Uuid::new_v4().to_string(),
            group_name: name.to_string(),
            members: vec![creator_user_id.to_string()],
            created_at: now_ms(),
        };
        doc.groups.push(group.clone());
        self.flush(&doc).await;
        Ok(group)
    }

    async fn group(&self, group_id: &str) -> Option<Group> {
        self.doc
            .read()
            .await
            .groups
            .iter()
            .find(|g| g.group_id == group_id)
            .cloned()
    }

    async fn list_groups(&self) -> Vec<Group> {
        self.doc.read().await.groups.clone()
    }

    async fn is_member(&self, group_id: &str, user_id: &str) -> bool {
        self.doc
            .read()
            .await
            .groups
            .iter()
            .any(|g| g.group_id == group_id && g.members.iter().any(|m| m == user_id))
    }

    async fn groups_for_user(&self, user_id: &str) -> Vec<Group> {
        self.doc
            .read()
            .await
            .groups
            .iter()
            .filter(|g| g.members.iter().any(|m| m == user_id))
            .cloned()
            .collect()
    }

    async fn append_message(
        &self,
        group_id: &str,
        sender_id: &str,
        text: &str,
    ) -> Result<Message, StoreError> {
        if text.is_empty() {
            return Err(StoreError::Validation("messageText is required".into()));
        }

        let mut doc = self.doc.write().await;
        if !doc.groups.iter().any(|g| g.group_id == group_id) {
            return Err(StoreError::NotFound(format!("unknown group: {group_id}")));
        }

        // Strictly increasing per insertion even when the clock stalls.
        let last = doc.messages.last().map(|m| m.timestamp).unwrap_or(0);
        let message = Message {
            message_id: Uuid::new_v4().to_string(),
            group_id: group_id.to_string(),
            sender_id: sender_id.to_string(),
            text: text.to_string(),
            timestamp: now_ms().max(last + 1),
        };
        doc.messages.push(message.clone());
        self.flush(&doc).await;
        Ok(message)
    }

    async fn history(&self, group_id: &str) -> Vec<Message> {
        let mut messages: Vec<Message> = self
            .doc
            .read()
            .await
            .messages
            .iter()
            .filter(|m| m.group_id == group_id)
            .cloned()
            .collect();
        messages.sort_by_key(|m| m.timestamp);
        messages
    }
}
