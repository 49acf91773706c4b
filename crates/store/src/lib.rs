//! Persistence for users, groups and messages.
//!
//! The backing layout is a single JSON document with three ordered
//! collections, read fully at startup and rewritten wholesale after every
//! mutation. That is fine for one process and one file; [`Store`] is the
//! seam that lets the file be swapped for a real engine without touching
//! relay logic.

pub mod credentials;
pub mod error;
pub mod json;
pub mod records;

pub use error::StoreError;
pub use json::JsonStore;
pub use records::{Group, Message, StoreDocument, User};

use async_trait::async_trait;

/// Typed persistence operations used by the gateway.
#[async_trait]
pub trait Store: Send + Sync {
    /// Check credentials for `username`, registering the account on first
    /// sight. Exactly one user exists per username no matter how many
    /// logins occur.
    async fn authenticate(&self, username: &str, password: &str) -> Result<User, StoreError>;

    async fn user(&self, user_id: &str) -> Option<User>;

    /// Create a group with the creator as its sole initial member.
    async fn create_group(&self, name: &str, creator_user_id: &str) -> Result<Group, StoreError>;

    async fn group(&self, group_id: &str) -> Option<Group>;

    async fn list_groups(&self) -> Vec<Group>;

    async fn is_member(&self, group_id: &str, user_id: &str) -> bool;

    /// Groups whose persisted member list contains `user_id`.
    async fn groups_for_user(&self, user_id: &str) -> Vec<Group>;

    /// Append a message, assigning its id and timestamp.
    async fn append_message(
        &self,
        group_id: &str,
        sender_id: &str,
        text: &str,
    ) -> Result<Message, StoreError>;

    /// Messages of a group, ascending by timestamp.
    async fn history(&self, group_id: &str) -> Vec<Message>;
}
