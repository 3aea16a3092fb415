//! HTTP handlers for the message endpoint and the admin surface.

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use samovar_types::conversation::{ConversationKey, GroupId, UserId};
use samovar_types::event::InboundMessage;
use samovar_types::history::HistoryEntry;

use crate::http::error::AppError;
use crate::state::AppState;

fn parse_key(raw: &str) -> Result<ConversationKey, AppError> {
    raw.parse()
        .map_err(|_| AppError::Validation(format!("invalid conversation key: {raw}")))
}

fn group_of(key: &ConversationKey) -> Result<GroupId, AppError> {
    key.as_group()
        .ok_or_else(|| AppError::Validation("this operation applies to group chats".to_string()))
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    /// `null` when the bot decided to stay silent.
    pub reply: Option<String>,
}

/// POST /api/v1/messages
pub async fn post_message(
    State(app): State<AppState>,
    Json(msg): Json<InboundMessage>,
) -> Result<Json<MessageResponse>, AppError> {
    let reply = app.engine.handle_message(&msg).await?;
    Ok(Json(MessageResponse { reply }))
}

/// GET /api/v1/conversations/{key}/history
pub async fn get_history(
    State(app): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<Vec<HistoryEntry>>, AppError> {
    let key = parse_key(&key)?;
    Ok(Json(app.engine.state().history().get(&key)))
}

/// DELETE /api/v1/conversations/{key}/history
pub async fn delete_history(
    State(app): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let key = parse_key(&key)?;
    app.engine.state().history().remove(&key);
    Ok(Json(serde_json::json!({ "cleared": true })))
}

#[derive(Debug, Deserialize)]
pub struct StyleBody {
    pub style: String,
}

/// PUT /api/v1/settings/style
pub async fn put_default_style(
    State(app): State<AppState>,
    Json(body): Json<StyleBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    if body.style.trim().is_empty() {
        return Err(AppError::Validation("style must not be empty".to_string()));
    }
    app.engine.state().set_default_style(body.style);
    Ok(Json(serde_json::json!({ "updated": true })))
}

/// DELETE /api/v1/settings/style -- restore the config-file default.
pub async fn delete_default_style(
    State(app): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    app.engine.state().set_default_style(app.initial_style.clone());
    Ok(Json(serde_json::json!({ "updated": true })))
}

/// PUT /api/v1/conversations/{key}/style-overrides/{user_id}
pub async fn put_style_override(
    State(app): State<AppState>,
    Path((key, user_id)): Path<(String, i64)>,
    Json(body): Json<StyleBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let group = group_of(&parse_key(&key)?)?;
    if body.style.trim().is_empty() {
        return Err(AppError::Validation("style must not be empty".to_string()));
    }
    app.engine
        .state()
        .set_style_override(group, UserId(user_id), body.style);
    Ok(Json(serde_json::json!({ "updated": true })))
}

/// DELETE /api/v1/conversations/{key}/style-overrides/{user_id}
pub async fn delete_style_override(
    State(app): State<AppState>,
    Path((key, user_id)): Path<(String, i64)>,
) -> Result<Json<serde_json::Value>, AppError> {
    let group = group_of(&parse_key(&key)?)?;
    let removed = app
        .engine
        .state()
        .remove_style_override(group, UserId(user_id));
    if !removed {
        return Err(AppError::NotFound(format!(
            "no style override for user {user_id} in {key}"
        )));
    }
    Ok(Json(serde_json::json!({ "removed": true })))
}

/// DELETE /api/v1/conversations/{key}/mutes/{user_id} -- administrator
/// override clearing a mute without the trigger phrase.
pub async fn delete_mute(
    State(app): State<AppState>,
    Path((key, user_id)): Path<(String, i64)>,
) -> Result<Json<serde_json::Value>, AppError> {
    let group = group_of(&parse_key(&key)?)?;
    let changed = app.engine.state().set_muted(group, UserId(user_id), false);
    if !changed {
        return Err(AppError::NotFound(format!(
            "user {user_id} is not muted in {key}"
        )));
    }
    Ok(Json(serde_json::json!({ "unmuted": true })))
}

#[derive(Debug, Deserialize)]
pub struct ProbabilityBody {
    pub probability: f64,
}

/// PUT /api/v1/conversations/{key}/proactive
pub async fn put_proactive(
    State(app): State<AppState>,
    Path(key): Path<String>,
    Json(body): Json<ProbabilityBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let key = parse_key(&key)?;
    if !(0.0..=1.0).contains(&body.probability) {
        return Err(AppError::Validation(
            "probability must be within [0, 1]".to_string(),
        ));
    }
    app.engine
        .state()
        .set_proactive_probability(key, body.probability);
    Ok(Json(serde_json::json!({ "updated": true })))
}

/// POST /api/v1/users/{id}/relationship/reset
pub async fn reset_relationship(
    State(app): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<serde_json::Value>, AppError> {
    if !app.engine.state().reset_relationship(UserId(user_id)) {
        return Err(AppError::NotFound(format!("unknown user {user_id}")));
    }
    Ok(Json(serde_json::json!({ "reset": true })))
}

#[derive(Debug, Deserialize)]
pub struct PreferredNameBody {
    /// `null` clears the preferred name.
    pub name: Option<String>,
}

/// PUT /api/v1/users/{id}/preferred-name
pub async fn put_preferred_name(
    State(app): State<AppState>,
    Path(user_id): Path<i64>,
    Json(body): Json<PreferredNameBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let name = body.name.filter(|n| !n.trim().is_empty());
    if !app.engine.state().set_preferred_name(UserId(user_id), name) {
        return Err(AppError::NotFound(format!("unknown user {user_id}")));
    }
    Ok(Json(serde_json::json!({ "updated": true })))
}

/// GET /api/v1/health
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
