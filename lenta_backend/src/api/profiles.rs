use super::{ApiResult, AppState, CurrentUser};
use crate::profiles::{ProfileService, ProfileView, UpdateProfileInput};
use axum::extract::{Path, State};
use axum::Json;

pub(crate) async fn get_profile(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> ApiResult<ProfileView> {
    let service = ProfileService::new(state.database.clone());
    Ok(Json(service.view_profile(&username)?))
}

pub(crate) async fn update_profile(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(payload): Json<UpdateProfileInput>,
) -> ApiResult<ProfileView> {
    let service = ProfileService::new(state.database.clone());
    Ok(Json(service.update_profile(&current.user.id, payload)?))
}
