use super::{ApiError, ApiResult, AppState, CurrentUser, MaybeUser};
use crate::comments::{AddCommentInput, CommentService, CommentView};
use crate::posts::{PostDetails, PostInput, PostService, PostView, ToggleOutcome};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub(crate) struct AddCommentRequest {
    body: String,
    #[serde(default)]
    parent_id: Option<String>,
}

pub(crate) async fn list_posts(State(state): State<AppState>) -> ApiResult<Vec<PostView>> {
    let service = PostService::new(state.database.clone());
    let posts = service.list_all()?;
    Ok(Json(posts))
}

pub(crate) async fn create_post(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(payload): Json<PostInput>,
) -> Result<(StatusCode, Json<PostView>), ApiError> {
    let service = PostService::new(state.database.clone());
    let post = service.create(&current.user.id, payload)?;
    Ok((StatusCode::CREATED, Json(post)))
}

pub(crate) async fn list_my_posts(
    State(state): State<AppState>,
    current: CurrentUser,
) -> ApiResult<Vec<PostView>> {
    let service = PostService::new(state.database.clone());
    Ok(Json(service.list_by_author(&current.user.id)?))
}

pub(crate) async fn list_favorite_posts(
    State(state): State<AppState>,
    current: CurrentUser,
) -> ApiResult<Vec<PostView>> {
    let service = PostService::new(state.database.clone());
    Ok(Json(service.list_favorites(&current.user.id)?))
}

pub(crate) async fn get_post(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    MaybeUser(viewer): MaybeUser,
) -> ApiResult<PostDetails> {
    let service = PostService::new(state.database.clone());
    let details = service.detail(&post_id, viewer.as_ref().map(|user| user.id.as_str()))?;
    Ok(Json(details))
}

pub(crate) async fn edit_post(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    current: CurrentUser,
    Json(payload): Json<PostInput>,
) -> ApiResult<PostView> {
    let service = PostService::new(state.database.clone());
    Ok(Json(service.edit(&current.user.id, &post_id, payload)?))
}

pub(crate) async fn delete_post(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    current: CurrentUser,
) -> Result<StatusCode, ApiError> {
    let service = PostService::new(state.database.clone());
    service.delete(&current.user.id, &post_id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn toggle_like(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    current: CurrentUser,
) -> ApiResult<ToggleOutcome> {
    let service = PostService::new(state.database.clone());
    Ok(Json(service.toggle_like(&current.user.id, &post_id)?))
}

pub(crate) async fn toggle_favorite(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    current: CurrentUser,
) -> ApiResult<ToggleOutcome> {
    let service = PostService::new(state.database.clone());
    Ok(Json(service.toggle_favorite(&current.user.id, &post_id)?))
}

pub(crate) async fn add_comment(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    current: CurrentUser,
    Json(payload): Json<AddCommentRequest>,
) -> Result<(StatusCode, Json<CommentView>), ApiError> {
    let service = CommentService::new(state.database.clone());
    let comment = service.add_comment(AddCommentInput {
        post_id,
        author_id: current.user.id,
        body: payload.body,
        parent_id: payload.parent_id.filter(|id| !id.trim().is_empty()),
    })?;
    Ok((StatusCode::CREATED, Json(comment)))
}
