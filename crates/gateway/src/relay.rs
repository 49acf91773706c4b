//! Event dispatch for one connection: identification, room membership,
//! chat fan-out and signaling pass-through.
//!
//! Nothing here returns an error to the socket's read loop. The original
//! wire contract has no acknowledgment channel, so refusals surface as
//! out-of-band `error` events and the triggering event is dropped.

use std::sync::Arc;

use tracing::{debug, info, warn};

use {
    huddle_protocol::{
        ClientEvent, ErrorShape, ServerEvent, error_codes,
        events::{
            ChatMessageEvent, LoginEvent, MessageEvent, RelayedSignal, SignalEvent,
            UserJoinedGroupEvent, UserLeftGroupEvent,
        },
    },
    huddle_store::{StoreError, User},
};

use crate::{broadcast, state::GatewayState};

/// Fallback when a message's sender no longer resolves to a user.
pub const UNKNOWN_USER: &str = "Unknown User";

/// Handle one parsed client event.
pub async fn handle_event(state: &Arc<GatewayState>, conn_id: &str, event: ClientEvent) {
    match event {
        ClientEvent::Login(ev) => handle_login(state, conn_id, ev).await,
        ClientEvent::ChatMessage(ev) => handle_chat_message(state, conn_id, ev).await,
        ClientEvent::JoinGroup(ev) => handle_join(state, conn_id, &ev.group_id).await,
        ClientEvent::LeaveGroup(ev) => handle_leave(state, conn_id, &ev.group_id).await,
        ClientEvent::Offer(ev) => relay_signal(state, conn_id, ev, ServerEvent::Offer).await,
        ClientEvent::Answer(ev) => relay_signal(state, conn_id, ev, ServerEvent::Answer).await,
        ClientEvent::IceCandidate(ev) => {
            relay_signal(state, conn_id, ev, ServerEvent::IceCandidate).await
        },
    }
}

/// Tear down a closed connection: drop its room subscriptions and session
/// binding, then notify the room of every group the user belongs to —
/// whether or not the socket actually occupied those rooms.
pub async fn handle_disconnect(state: &Arc<GatewayState>, conn_id: &str) {
    state.rooms.write().await.leave_all(conn_id);
    let Some(user_id) = state.sessions.write().await.unbind(conn_id) else {
        return;
    };
    info!(conn_id, user_id = %user_id, "identified connection closed");

    for group in state.store.groups_for_user(&user_id).await {
        let event = ServerEvent::UserLeftGroup(UserLeftGroupEvent {
            group_id: group.group_id.clone(),
            user_id: user_id.clone(),
        });
        broadcast::to_room(state, &group.group_id, &event, None).await;
    }
}

// ── Identification ───────────────────────────────────────────────────────────

async fn handle_login(state: &Arc<GatewayState>, conn_id: &str, ev: LoginEvent) {
    let Some(user) = state.store.user(&ev.user_id).await else {
        warn!(conn_id, user_id = %ev.user_id, "login for unknown user");
        deny(state, conn_id, error_codes::NOT_FOUND, "unknown user").await;
        return;
    };

    state.sessions.write().await.bind(conn_id, &user.user_id);
    info!(conn_id, user_id = %user.user_id, username = %user.username, "connection identified");

    // Bulk-subscribe to every group the user already belongs to.
    for group in state.store.groups_for_user(&user.user_id).await {
        subscribe(state, conn_id, &group.group_id, &user).await;
    }
}

async fn identified_user(state: &Arc<GatewayState>, conn_id: &str) -> Option<User> {
    let user_id = state.sessions.read().await.lookup(conn_id)?.to_string();
    state.store.user(&user_id).await
}

// ── Room membership ──────────────────────────────────────────────────────────

/// Join the connection to the group's room and announce it. The caller
/// has already established persisted membership.
async fn subscribe(state: &Arc<GatewayState>, conn_id: &str, group_id: &str, user: &User) {
    let newly_joined = state.rooms.write().await.join(group_id, conn_id);
    if !newly_joined {
        return;
    }
    debug!(conn_id, group_id, "joined room");

    let event = ServerEvent::UserJoinedGroup(UserJoinedGroupEvent {
        group_id: group_id.to_string(),
        user_id: user.user_id.clone(),
        username: user.username.clone(),
    });
    broadcast::to_room(state, group_id, &event, None).await;
}

async fn handle_join(state: &Arc<GatewayState>, conn_id: &str, group_id: &str) {
    let Some(user) = identified_user(state, conn_id).await else {
        deny(state, conn_id, error_codes::NOT_IDENTIFIED, "login required").await;
        return;
    };
    if !state.store.is_member(group_id, &user.user_id).await {
        warn!(conn_id, group_id, user_id = %user.user_id, "join refused: not a member");
        deny(
            state,
            conn_id,
            error_codes::PERMISSION_DENIED,
            "not a member of this group",
        )
        .await;
        return;
    }
    subscribe(state, conn_id, group_id, &user).await;
}

async fn handle_leave(state: &Arc<GatewayState>, conn_id: &str, group_id: &str) {
    // Always succeeds, member or not.
    state.rooms.write().await.leave(group_id, conn_id);
    debug!(conn_id, group_id, "left room");
}

// ── Chat relay ───────────────────────────────────────────────────────────────

async fn handle_chat_message(state: &Arc<GatewayState>, conn_id: &str, ev: ChatMessageEvent) {
    let Some(user) = identified_user(state, conn_id).await else {
        deny(state, conn_id, error_codes::NOT_IDENTIFIED, "login required").await;
        return;
    };
    if !state.store.is_member(&ev.group_id, &user.user_id).await {
        warn!(conn_id, group_id = %ev.group_id, user_id = %user.user_id, "chat refused: not a member");
        deny(
            state,
            conn_id,
            error_codes::PERMISSION_DENIED,
            "not a member of this group",
        )
        .await;
        return;
    }

    let message = match state
        .store
        .append_message(&ev.group_id, &user.user_id, &ev.message_text)
        .await
    {
        Ok(message) => message,
        Err(e) => {
            warn!(conn_id, group_id = %ev.group_id, error = %e, "chat message rejected");
            deny(state, conn_id, code_for(&e), e.to_string()).await;
            return;
        },
    };

    let event = ServerEvent::Message(MessageEvent {
        message_id: message.message_id,
        group_id: message.group_id,
        sender_id: message.sender_id,
        sender_username: user.username,
        message_text: message.text,
        timestamp: message.timestamp,
    });
    // The whole room hears it, sender included — clients de-duplicate by
    // messageId if they also echo locally.
    broadcast::to_room(state, &ev.group_id, &event, None).await;
}

// ── Signaling relay ──────────────────────────────────────────────────────────

async fn relay_signal(
    state: &Arc<GatewayState>,
    conn_id: &str,
    ev: SignalEvent,
    wrap: fn(RelayedSignal) -> ServerEvent,
) {
    let Some(user) = identified_user(state, conn_id).await else {
        deny(state, conn_id, error_codes::NOT_IDENTIFIED, "login required").await;
        return;
    };
    if !state.rooms.read().await.occupies(&ev.group_id, conn_id) {
        deny(
            state,
            conn_id,
            error_codes::PERMISSION_DENIED,
            "not in this group's room",
        )
        .await;
        return;
    }

    // Dumb pipe: the payload is an opaque SDP/ICE blob and `to` is carried
    // verbatim without routing on it — recipients self-filter by senderId.
    let event = wrap(RelayedSignal {
        group_id: ev.group_id.clone(),
        sender_id: user.user_id,
        payload: ev.payload,
        to: ev.to,
    });
    broadcast::to_room(state, &ev.group_id, &event, Some(conn_id)).await;
}

// ── Shared helpers ───────────────────────────────────────────────────────────

async fn deny(state: &Arc<GatewayState>, conn_id: &str, code: &str, message: impl Into<String>) {
    let event = ServerEvent::Error(ErrorShape::new(code, message));
    broadcast::to_conn(state, conn_id, &event).await;
}

fn code_for(err: &StoreError) -> &'static str {
    match err {
        StoreError::Validation(_) => error_codes::VALIDATION_ERROR,
        StoreError::NotFound(_) => error_codes::NOT_FOUND,
        StoreError::AuthFailed => error_codes::AUTH_FAILED,
        StoreError::Persistence(_) => error_codes::PERSISTENCE_ERROR,
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::time::Instant;

    use tokio::sync::mpsc;

    use {
        huddle_protocol::events::{JoinGroupEvent, LeaveGroupEvent},
        huddle_store::JsonStore,
    };

    use super::*;
    use crate::state::ConnectedClient;

    /// A fake connection: registered like a real client, but we hold the
    /// receiving end of its outbound queue.
    struct TestConn {
        conn_id: String,
        rx: mpsc::UnboundedReceiver<String>,
    }

    impl TestConn {
        /// Everything queued for this connection since the last drain.
        fn drain(&mut self) -> Vec<ServerEvent> {
            let mut events = Vec::new();
            while let Ok(frame) = self.rx.try_recv() {
                events.push(serde_json::from_str(&frame).unwrap());
            }
            events
        }
    }

    async fn gateway() -> (tempfile::TempDir, Arc<GatewayState>) {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::open(dir.path().join("store.json")).await.unwrap();
        let state = GatewayState::new(Arc::new(store));
        (dir, state)
    }

    async fn connect(state: &Arc<GatewayState>, conn_id: &str) -> TestConn {
        let (tx, rx) = mpsc::unbounded_channel();
        state
            .register_client(ConnectedClient {
                conn_id: conn_id.to_string(),
                sender: tx,
                connected_at: Instant::now(),
            })
            .await;
        TestConn {
            conn_id: conn_id.to_string(),
            rx,
        }
    }

    async fn login(state: &Arc<GatewayState>, conn: &TestConn, user_id: &str) {
        handle_event(
            state,
            &conn.conn_id,
            ClientEvent::Login(LoginEvent {
                user_id: user_id.to_string(),
            }),
        )
        .await;
    }

    async fn send_chat(state: &Arc<GatewayState>, conn: &TestConn, group_id: &str, text: &str) {
        handle_event(
            state,
            &conn.conn_id,
            ClientEvent::ChatMessage(ChatMessageEvent {
                group_id: group_id.to_string(),
                message_text: text.to_string(),
            }),
        )
        .await;
    }

    fn signal(group_id: &str) -> SignalEvent {
        SignalEvent {
            group_id: group_id.to_string(),
            payload: serde_json::json!({"sdp": "v=0"}),
            to: None,
        }
    }

    #[tokio::test]
    async fn unidentified_connection_triggers_no_broadcast() {
        let (_dir, state) = gateway().await;
        let ada = state.store.authenticate("ada", "pw").await.unwrap();
        let group = state.store.create_group("Team", &ada.user_id).await.unwrap();

        let mut member = connect(&state, "c-ada").await;
        login(&state, &member, &ada.user_id).await;
        member.drain();

        let mut stranger = connect(&state, "c-stranger").await;
        send_chat(&state, &stranger, &group.group_id, "hi").await;
        handle_event(
            &state,
            &stranger.conn_id,
            ClientEvent::Offer(signal(&group.group_id)),
        )
        .await;
        handle_event(
            &state,
            &stranger.conn_id,
            ClientEvent::Answer(signal(&group.group_id)),
        )
        .await;
        handle_event(
            &state,
            &stranger.conn_id,
            ClientEvent::IceCandidate(signal(&group.group_id)),
        )
        .await;

        // The room member heard nothing; nothing was persisted.
        assert!(member.drain().is_empty());
        assert!(state.store.history(&group.group_id).await.is_empty());

        // The stranger got one refusal per attempt, nothing else.
        let refusals = stranger.drain();
        assert_eq!(refusals.len(), 4);
        for event in refusals {
            let ServerEvent::Error(shape) = event else {
                panic!("expected error event, got {event:?}");
            };
            assert_eq!(shape.code, error_codes::NOT_IDENTIFIED);
        }
    }

    #[tokio::test]
    async fn unauthorized_join_leaves_the_room_unchanged() {
        let (_dir, state) = gateway().await;
        let ada = state.store.authenticate("ada", "pw").await.unwrap();
        let grace = state.store.authenticate("grace", "pw").await.unwrap();
        let group = state.store.create_group("Team", &ada.user_id).await.unwrap();

        let mut a = connect(&state, "c-ada").await;
        login(&state, &a, &ada.user_id).await;
        a.drain();

        let mut g = connect(&state, "c-grace").await;
        login(&state, &g, &grace.user_id).await;
        handle_event(
            &state,
            &g.conn_id,
            ClientEvent::JoinGroup(JoinGroupEvent {
                group_id: group.group_id.clone(),
            }),
        )
        .await;

        assert!(!state.rooms.read().await.occupies(&group.group_id, &g.conn_id));
        let refusals = g.drain();
        assert_eq!(refusals.len(), 1);
        assert!(matches!(
            &refusals[0],
            ServerEvent::Error(shape) if shape.code == error_codes::PERMISSION_DENIED
        ));
        // The existing occupant saw no join announcement.
        assert!(a.drain().is_empty());
    }

    #[tokio::test]
    async fn chat_reaches_only_the_group_room() {
        let (_dir, state) = gateway().await;
        let ada = state.store.authenticate("ada", "pw").await.unwrap();
        let grace = state.store.authenticate("grace", "pw").await.unwrap();
        let group = state.store.create_group("Team", &ada.user_id).await.unwrap();

        let mut a = connect(&state, "c-ada").await;
        login(&state, &a, &ada.user_id).await;
        // Auto-subscribed on login: the room hears the join, sender included.
        let joined = a.drain();
        assert!(matches!(
            &joined[..],
            [ServerEvent::UserJoinedGroup(ev)] if ev.group_id == group.group_id
        ));

        // Grace is not a member of "Team" and is not auto-joined.
        let mut g = connect(&state, "c-grace").await;
        login(&state, &g, &grace.user_id).await;
        g.drain();
        assert!(!state.rooms.read().await.occupies(&group.group_id, &g.conn_id));

        send_chat(&state, &a, &group.group_id, "hi").await;

        let received = a.drain();
        assert_eq!(received.len(), 1);
        let ServerEvent::Message(message) = &received[0] else {
            panic!("expected message event, got {:?}", received[0]);
        };
        assert_eq!(message.sender_username, "ada");
        assert_eq!(message.message_text, "hi");
        assert!(g.drain().is_empty());

        let history = state.store.history(&group.group_id).await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].text, "hi");
    }

    #[tokio::test]
    async fn nonmember_chat_is_refused() {
        let (_dir, state) = gateway().await;
        let ada = state.store.authenticate("ada", "pw").await.unwrap();
        let grace = state.store.authenticate("grace", "pw").await.unwrap();
        let group = state.store.create_group("Team", &ada.user_id).await.unwrap();

        let mut g = connect(&state, "c-grace").await;
        login(&state, &g, &grace.user_id).await;
        g.drain();

        send_chat(&state, &g, &group.group_id, "let me in").await;

        let refusals = g.drain();
        assert!(matches!(
            &refusals[..],
            [ServerEvent::Error(shape)] if shape.code == error_codes::PERMISSION_DENIED
        ));
        assert!(state.store.history(&group.group_id).await.is_empty());
    }

    #[tokio::test]
    async fn disconnect_notifies_every_membership() {
        let (_dir, state) = gateway().await;
        let ada = state.store.authenticate("ada", "pw").await.unwrap();
        let team = state.store.create_group("Team", &ada.user_id).await.unwrap();
        let misc = state.store.create_group("Misc", &ada.user_id).await.unwrap();

        // Two devices, both identified as ada and auto-subscribed to both
        // rooms.
        let phone = connect(&state, "c-phone").await;
        login(&state, &phone, &ada.user_id).await;
        let mut laptop = connect(&state, "c-laptop").await;
        login(&state, &laptop, &ada.user_id).await;

        // The phone backs out of one room before dropping; the departure
        // notifications must still cover both memberships.
        handle_event(
            &state,
            &phone.conn_id,
            ClientEvent::LeaveGroup(LeaveGroupEvent {
                group_id: team.group_id.clone(),
            }),
        )
        .await;
        laptop.drain();

        handle_disconnect(&state, &phone.conn_id).await;
        state.remove_client(&phone.conn_id).await;

        let mut left_groups: Vec<String> = laptop
            .drain()
            .into_iter()
            .map(|event| match event {
                ServerEvent::UserLeftGroup(ev) => {
                    assert_eq!(ev.user_id, ada.user_id);
                    ev.group_id
                },
                other => panic!("expected userLeftGroup, got {other:?}"),
            })
            .collect();
        left_groups.sort();
        let mut expected = vec![team.group_id.clone(), misc.group_id.clone()];
        expected.sort();
        assert_eq!(left_groups, expected);

        // An anonymous connection drops silently.
        let anon = connect(&state, "c-anon").await;
        handle_disconnect(&state, &anon.conn_id).await;
        assert!(laptop.drain().is_empty());
    }

    #[tokio::test]
    async fn signaling_excludes_the_sender_and_stamps_identity() {
        let (_dir, state) = gateway().await;
        let ada = state.store.authenticate("ada", "pw").await.unwrap();
        let group = state.store.create_group("Team", &ada.user_id).await.unwrap();

        let mut phone = connect(&state, "c-phone").await;
        login(&state, &phone, &ada.user_id).await;
        let mut laptop = connect(&state, "c-laptop").await;
        login(&state, &laptop, &ada.user_id).await;
        phone.drain();
        laptop.drain();

        handle_event(
            &state,
            &phone.conn_id,
            ClientEvent::Offer(SignalEvent {
                group_id: group.group_id.clone(),
                payload: serde_json::json!({"sdp": "v=0", "type": "offer"}),
                to: None,
            }),
        )
        .await;

        // The sender never hears its own offer.
        assert!(phone.drain().is_empty());
        let received = laptop.drain();
        assert_eq!(received.len(), 1);
        let ServerEvent::Offer(relayed) = &received[0] else {
            panic!("expected offer, got {:?}", received[0]);
        };
        assert_eq!(relayed.sender_id, ada.user_id);
        assert_eq!(relayed.payload["sdp"], "v=0");

        // `to` is carried through verbatim, not routed on.
        handle_event(
            &state,
            &phone.conn_id,
            ClientEvent::Answer(SignalEvent {
                group_id: group.group_id.clone(),
                payload: serde_json::json!({"sdp": "v=0"}),
                to: Some("someone-else".into()),
            }),
        )
        .await;
        let received = laptop.drain();
        assert_eq!(received.len(), 1);
        let ServerEvent::Answer(relayed) = &received[0] else {
            panic!("expected answer, got {:?}", received[0]);
        };
        assert_eq!(relayed.to.as_deref(), Some("someone-else"));
    }

    #[tokio::test]
    async fn signaling_requires_room_occupancy() {
        let (_dir, state) = gateway().await;
        let ada = state.store.authenticate("ada", "pw").await.unwrap();
        let group = state.store.create_group("Team", &ada.user_id).await.unwrap();

        let mut phone = connect(&state, "c-phone").await;
        login(&state, &phone, &ada.user_id).await;
        let mut laptop = connect(&state, "c-laptop").await;
        login(&state, &laptop, &ada.user_id).await;
        phone.drain();
        laptop.drain();

        // A member who stepped out of the room cannot signal into it.
        handle_event(
            &state,
            &phone.conn_id,
            ClientEvent::LeaveGroup(LeaveGroupEvent {
                group_id: group.group_id.clone(),
            }),
        )
        .await;
        handle_event(
            &state,
            &phone.conn_id,
            ClientEvent::Offer(signal(&group.group_id)),
        )
        .await;

        let refusals = phone.drain();
        assert!(matches!(
            &refusals[..],
            [ServerEvent::Error(shape)] if shape.code == error_codes::PERMISSION_DENIED
        ));
        assert!(laptop.drain().is_empty());
    }

    #[tokio::test]
    async fn login_for_unknown_user_is_refused() {
        let (_dir, state) = gateway().await;
        let mut conn = connect(&state, "c1").await;
        login(&state, &conn, "no-such-user").await;

        let refusals = conn.drain();
        assert!(matches!(
            &refusals[..],
            [ServerEvent::Error(shape)] if shape.code == error_codes::NOT_FOUND
        ));
        assert!(state.sessions.read().await.lookup("c1").is_none());
    }
}
