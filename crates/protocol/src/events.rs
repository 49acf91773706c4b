//! WebSocket event envelopes, framed as `{ "type": ..., "payload": ... }`.
//!
//! Signaling payloads (`offer` / `answer` / `ice-candidate`) are opaque
//! JSON blobs: the gateway stamps them with the sender and fans them out
//! without inspecting SDP or ICE structure.

use {
    serde::{Deserialize, Serialize},
    serde_json::Value,
};

use crate::error::{ErrorShape, ProtocolError};

// ── Client → server ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ClientEvent {
    /// Announce which authenticated user this connection represents.
    #[serde(rename = "login")]
    Login(LoginEvent),
    #[serde(rename = "chatMessage")]
    ChatMessage(ChatMessageEvent),
    #[serde(rename = "joinGroup")]
    JoinGroup(JoinGroupEvent),
    #[serde(rename = "leaveGroup")]
    LeaveGroup(LeaveGroupEvent),
    #[serde(rename = "offer")]
    Offer(SignalEvent),
    #[serde(rename = "answer")]
    Answer(SignalEvent),
    #[serde(rename = "ice-candidate")]
    IceCandidate(SignalEvent),
}

impl ClientEvent {
    /// Decode a raw text frame.
    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(raw)?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginEvent {
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessageEvent {
    pub group_id: String,
    pub message_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinGroupEvent {
    pub group_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveGroupEvent {
    pub group_id: String,
}

/// Outgoing signaling payload. `to` appears on `answer` / `ice-candidate`
/// and is carried through verbatim; the gateway never routes on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalEvent {
    pub group_id: String,
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
}

// ── Server → client ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ServerEvent {
    #[serde(rename = "message")]
    Message(MessageEvent),
    #[serde(rename = "userJoinedGroup")]
    UserJoinedGroup(UserJoinedGroupEvent),
    #[serde(rename = "userLeftGroup")]
    UserLeftGroup(UserLeftGroupEvent),
    #[serde(rename = "offer")]
    Offer(RelayedSignal),
    #[serde(rename = "answer")]
    Answer(RelayedSignal),
    #[serde(rename = "ice-candidate")]
    IceCandidate(RelayedSignal),
    #[serde(rename = "error")]
    Error(ErrorShape),
}

/// A persisted chat message, enriched with the sender's username.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageEvent {
    pub message_id: String,
    pub group_id: String,
    pub sender_id: String,
    pub sender_username: String,
    pub message_text: String,
    pub timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserJoinedGroupEvent {
    pub group_id: String,
    pub user_id: String,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserLeftGroupEvent {
    pub group_id: String,
    pub user_id: String,
}

/// A relayed signaling payload, stamped with the sender so recipients can
/// self-filter. Multi-party correctness is a client responsibility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayedSignal {
    pub group_id: String,
    pub sender_id: String,
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
}
