//! HTTP endpoints: login, group creation/listing, history, health.

use std::{collections::HashMap, sync::Arc};

use {
    axum::{
        Json,
        extract::{Path, State},
        http::StatusCode,
        response::{IntoResponse, Response},
    },
    tracing::info,
};

use {
    huddle_protocol::{
        ErrorShape, error_codes,
        http::{CreateGroupRequest, GroupView, LoginRequest, LoginResponse, MessageView},
    },
    huddle_store::{Group, StoreError},
};

use crate::{relay::UNKNOWN_USER, state::GatewayState};

// ── Error mapping ────────────────────────────────────────────────────────────

/// An HTTP-facing failure: a status code plus the wire error shape.
pub struct ApiError {
    status: StatusCode,
    shape: ErrorShape,
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        let (status, code) = match &err {
            StoreError::Validation(_) => (StatusCode::BAD_REQUEST, error_codes::VALIDATION_ERROR),
            StoreError::NotFound(_) => (StatusCode::NOT_FOUND, error_codes::NOT_FOUND),
            StoreError::AuthFailed => (StatusCode::UNAUTHORIZED, error_codes::AUTH_FAILED),
            StoreError::Persistence(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_codes::PERSISTENCE_ERROR,
            ),
        };
        Self {
            status,
            shape: ErrorShape::new(code, err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.shape)).into_response()
    }
}

// ── Handlers ─────────────────────────────────────────────────────────────────

pub async fn login(
    State(state): State<Arc<GatewayState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let user = state.store.authenticate(&req.username, &req.password).await?;
    info!(user_id = %user.user_id, username = %user.username, "login ok");
    Ok(Json(LoginResponse {
        user_id: user.user_id,
        username: user.username,
    }))
}

pub async fn create_group(
    State(state): State<Arc<GatewayState>>,
    Json(req): Json<CreateGroupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let group = state.store.create_group(&req.group_name, &req.user_id).await?;
    info!(group_id = %group.group_id, group_name = %group.group_name, "group created");
    let view = group_view(&state, group).await;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn list_groups(State(state): State<Arc<GatewayState>>) -> Json<Vec<GroupView>> {
    let groups = state.store.list_groups().await;
    let mut views = Vec::with_capacity(groups.len());
    for group in groups {
        views.push(group_view(&state, group).await);
    }
    Json(views)
}

pub async fn history(
    State(state): State<Arc<GatewayState>>,
    Path(group_id): Path<String>,
) -> Json<Vec<MessageView>> {
    let messages = state.store.history(&group_id).await;
    let mut names: HashMap<String, String> = HashMap::new();
    let mut views = Vec::with_capacity(messages.len());
    for message in messages {
        let sender_username = match names.get(&message.sender_id) {
            Some(name) => name.clone(),
            None => {
                let name = resolve_username(&state, &message.sender_id).await;
                names.insert(message.sender_id.clone(), name.clone());
                name
            },
        };
        views.push(MessageView {
            message_id: message.message_id,
            group_id: message.group_id,
            sender_id: message.sender_id,
            sender_username,
            message_text: message.text,
            timestamp: message.timestamp,
        });
    }
    Json(views)
}

pub async fn health(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    let count = state.client_count().await;
    Json(serde_json::json!({
        "status": "ok",
        "version": state.version,
        "connections": count,
    }))
}

// ── View assembly ────────────────────────────────────────────────────────────

async fn resolve_username(state: &Arc<GatewayState>, user_id: &str) -> String {
    state
        .store
        .user(user_id)
        .await
        .map(|u| u.username)
        .unwrap_or_else(|| UNKNOWN_USER.to_string())
}

async fn group_view(state: &Arc<GatewayState>, group: Group) -> GroupView {
    let mut member_usernames = Vec::with_capacity(group.members.len());
    for user_id in &group.members {
        member_usernames.push(resolve_username(state, user_id).await);
    }
    GroupView {
        group_id: group.group_id,
        group_name: group.group_name,
        member_usernames,
        created_at: group.created_at,
    }
}
