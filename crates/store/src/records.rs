//! Persisted record types. Field names match the wire (camelCase) so the
//! store file doubles as the document layout clients were written against.

use serde::{Deserialize, Serialize};

/// A registered account. The password is stored as an argon2 hash string,
/// never plaintext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub user_id: String,
    pub username: String,
    pub password_hash: String,
    pub created_at: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub group_id: String,
    pub group_name: String,
    /// Member userIds. Insertion-ordered, treated as a set.
    pub members: Vec<String>,
    pub created_at: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub message_id: String,
    pub group_id: String,
    pub sender_id: String,
    pub text: String,
    /// Epoch milliseconds, strictly increasing per insertion.
    pub timestamp: u64,
}

/// The whole persisted state: three ordered collections, rewritten
/// wholesale on every mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StoreDocument {
    pub users: Vec<User>,
    pub groups: Vec<Group>,
    pub messages: Vec<Message>,
}
