mod auth;
mod messages;
mod posts;
mod profiles;

use crate::config::LentaConfig;
use crate::database::Database;
use crate::error::ServiceError;
use anyhow::Result;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Serialize;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use auth::{CurrentUser, MaybeUser};

#[derive(Clone)]
pub struct AppState {
    pub config: LentaConfig,
    pub database: Database,
}

pub(crate) type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized,
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    Internal(anyhow::Error),
}

impl ApiError {
    fn into_response_parts(self) -> (StatusCode, ErrorResponse) {
        match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, ErrorResponse { message: msg }),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                ErrorResponse {
                    message: "authentication required".into(),
                },
            ),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, ErrorResponse { message: msg }),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, ErrorResponse { message: msg }),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, ErrorResponse { message: msg }),
            ApiError::Internal(err) => {
                tracing::error!(error = ?err, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse {
                        message: "internal server error".into(),
                    },
                )
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = self.into_response_parts();
        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ServiceError::from(err).into()
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound(what) => ApiError::NotFound(format!("{what} not found")),
            ServiceError::Validation(msg) => ApiError::BadRequest(msg),
            ServiceError::Forbidden(msg) => ApiError::Forbidden(msg),
            ServiceError::Conflict(msg) => ApiError::Conflict(msg),
            ServiceError::Unauthorized => ApiError::Unauthorized,
            ServiceError::Internal(err) => ApiError::Internal(err),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    message: String,
}

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
    version: &'static str,
    api_port: u16,
}

async fn health_handler(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        api_port: state.config.api_port,
    })
}

/// Assembles every route on top of `state`. Exposed so the server can be
/// driven without binding a socket.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/auth/register", post(auth::register_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/logout", post(auth::logout_handler))
        .route("/posts", get(posts::list_posts).post(posts::create_post))
        .route("/posts/mine", get(posts::list_my_posts))
        .route("/posts/favorites", get(posts::list_favorite_posts))
        .route(
            "/posts/:id",
            get(posts::get_post).put(posts::edit_post).delete(posts::delete_post),
        )
        .route("/posts/:id/like", post(posts::toggle_like))
        .route("/posts/:id/favorite", post(posts::toggle_favorite))
        .route("/posts/:id/comments", post(posts::add_comment))
        .route("/users/:username/profile", get(profiles::get_profile))
        .route("/profile", put(profiles::update_profile))
        .route("/messages", get(messages::inbox_handler))
        .route("/messages/unread/count", get(messages::count_unread_handler))
        .route(
            "/messages/:username",
            get(messages::open_conversation_handler).post(messages::send_message_handler),
        )
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Tries to bind to the given port, or finds the next available port
async fn find_available_port(start_port: u16) -> Result<(TcpListener, u16)> {
    const MAX_PORT_ATTEMPTS: u16 = 100;

    for offset in 0..MAX_PORT_ATTEMPTS {
        let Some(port) = start_port.checked_add(offset) else {
            break;
        };
        let addr = SocketAddr::from(([0, 0, 0, 0], port));

        match TcpListener::bind(addr).await {
            Ok(listener) => return Ok((listener, port)),
            Err(e) => {
                if offset == 0 {
                    tracing::debug!(port, error = %e, "port in use, trying next port");
                }
                continue;
            }
        }
    }

    anyhow::bail!(
        "could not find available port in range {}-{}",
        start_port,
        start_port.saturating_add(MAX_PORT_ATTEMPTS - 1)
    )
}

pub async fn serve_http(config: LentaConfig, database: Database) -> Result<()> {
    let (listener, actual_port) = find_available_port(config.api_port).await?;
    if actual_port != config.api_port {
        tracing::warn!(
            requested_port = config.api_port,
            actual_port,
            "configured port was in use, bound to next available port"
        );
    }

    let mut config = config;
    config.api_port = actual_port;
    let router = build_router(AppState { config, database });

    let addr = SocketAddr::from(([0, 0, 0, 0], actual_port));
    tracing::info!(?addr, "HTTP server listening");
    axum::serve(listener, router.into_make_service()).await?;
    Ok(())
}
