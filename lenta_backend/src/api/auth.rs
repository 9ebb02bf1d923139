use super::{ApiError, ApiResult, AppState};
use crate::users::{LoginInput, RegisterInput, SessionView, UserService, UserView};
use axum::extract::{FromRequestParts, State};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::Json;

/// The authenticated caller, resolved from `Authorization: Bearer <token>`.
/// Rejects the request with 401 when the token is missing or stale.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: UserView,
    pub token: String,
}

/// Like [`CurrentUser`] but optional: anonymous or stale tokens yield `None`.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<UserView>);

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

fn user_service(state: &AppState) -> UserService {
    UserService::new(state.database.clone(), state.config.auth.clone())
}

#[axum::async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(ApiError::Unauthorized)?;
        let user = user_service(state).authenticate(token)?;
        Ok(Self {
            user,
            token: token.to_string(),
        })
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(token) = bearer_token(parts) else {
            return Ok(Self(None));
        };
        match user_service(state).authenticate(token) {
            Ok(user) => Ok(Self(Some(user))),
            Err(crate::error::ServiceError::Unauthorized) => Ok(Self(None)),
            Err(err) => Err(err.into()),
        }
    }
}

pub(crate) async fn register_handler(
    State(state): State<AppState>,
    Json(payload): Json<RegisterInput>,
) -> Result<(StatusCode, Json<UserView>), ApiError> {
    let user = user_service(&state).register(payload)?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub(crate) async fn login_handler(
    State(state): State<AppState>,
    Json(payload): Json<LoginInput>,
) -> ApiResult<SessionView> {
    let session = user_service(&state).login(payload)?;
    Ok(Json(session))
}

pub(crate) async fn logout_handler(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<StatusCode, ApiError> {
    user_service(&state).logout(&current.token)?;
    Ok(StatusCode::NO_CONTENT)
}
