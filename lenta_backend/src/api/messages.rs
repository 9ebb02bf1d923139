use super::{ApiError, ApiResult, AppState, CurrentUser};
use crate::conversations::MessageView;
use crate::messages::{ConversationView, InboxView, MessageService};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub(crate) struct SendMessageRequest {
    body: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct UnreadCountResponse {
    count: usize,
}

pub(crate) async fn inbox_handler(
    State(state): State<AppState>,
    current: CurrentUser,
) -> ApiResult<InboxView> {
    let service = MessageService::new(state.database.clone());
    Ok(Json(service.inbox(&current.user.id)?))
}

pub(crate) async fn open_conversation_handler(
    State(state): State<AppState>,
    Path(username): Path<String>,
    current: CurrentUser,
) -> ApiResult<ConversationView> {
    let service = MessageService::new(state.database.clone());
    Ok(Json(service.open_conversation(&current.user.id, &username)?))
}

pub(crate) async fn send_message_handler(
    State(state): State<AppState>,
    Path(username): Path<String>,
    current: CurrentUser,
    Json(payload): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<MessageView>), ApiError> {
    let service = MessageService::new(state.database.clone());
    let message = service.send_message(&current.user.id, &username, &payload.body)?;
    Ok((StatusCode::CREATED, Json(message)))
}

pub(crate) async fn count_unread_handler(
    State(state): State<AppState>,
    current: CurrentUser,
) -> ApiResult<UnreadCountResponse> {
    let service = MessageService::new(state.database.clone());
    let count = service.unread_count(&current.user.id)?;
    Ok(Json(UnreadCountResponse { count }))
}
