mod feeds;
mod posts;
mod previews;
mod users;
mod votes;

use crate::config::MurmurConfig;
use crate::database::Database;
use crate::error::CoreError;
use crate::events::EventBus;
use crate::posting::PostService;
use crate::previews::{MetadataClient, PreviewService};
use crate::users::UserService;
use crate::voting::VoteService;
use anyhow::{Context, Result};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub config: MurmurConfig,
    pub database: Database,
    pub events: EventBus,
    pub http_client: reqwest::Client,
}

impl AppState {
    pub(crate) fn users(&self) -> UserService {
        UserService::new(self.database.clone(), self.config.starting_balance)
    }

    pub(crate) fn posts(&self) -> PostService {
        PostService::new(self.database.clone(), self.events.clone())
    }

    pub(crate) fn votes(&self) -> VoteService {
        VoteService::new(self.database.clone(), self.config.admin_account_id.clone())
    }

    pub(crate) fn previews(&self) -> PreviewService {
        let client = MetadataClient::new(self.http_client.clone(), self.config.metadata.clone());
        PreviewService::new(self.database.clone(), client)
    }
}

pub(crate) type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Forbidden(String),
    NotFound(String),
    Upstream { status: u16, message: String },
    Internal(anyhow::Error),
}

impl ApiError {
    fn into_response_parts(self) -> (StatusCode, ErrorResponse) {
        match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, ErrorResponse::new(message)),
            ApiError::Forbidden(message) => (StatusCode::FORBIDDEN, ErrorResponse::new(message)),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, ErrorResponse::new(message)),
            ApiError::Upstream { status, message } => (
                StatusCode::BAD_GATEWAY,
                ErrorResponse {
                    message,
                    upstream_status: Some(status),
                },
            ),
            ApiError::Internal(err) => {
                tracing::error!(error = ?err, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new("internal server error".into()),
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

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidInput(message) => ApiError::BadRequest(message),
            CoreError::NotFound(message) => ApiError::NotFound(message),
            CoreError::Forbidden(message) => ApiError::Forbidden(message),
            CoreError::Upstream { status, message } => ApiError::Upstream { status, message },
            CoreError::Internal(err) => ApiError::Internal(err),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorResponse {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    upstream_status: Option<u16>,
}

impl ErrorResponse {
    fn new(message: String) -> Self {
        Self {
            message,
            upstream_status: None,
        }
    }
}

/// Tries to bind to the given port, or finds the next available port
async fn find_available_port(start_port: u16) -> Result<(TcpListener, u16)> {
    const MAX_PORT_ATTEMPTS: u16 = 100;

    for offset in 0..MAX_PORT_ATTEMPTS {
        let port = start_port + offset;
        let addr = SocketAddr::from(([0, 0, 0, 0], port));

        match TcpListener::bind(addr).await {
            Ok(listener) => return Ok((listener, port)),
            Err(e) => {
                if offset == 0 {
                    tracing::debug!(port, error = %e, "Port in use, trying next port");
                }
                continue;
            }
        }
    }

    anyhow::bail!(
        "Could not find available port in range {}-{}",
        start_port,
        start_port + MAX_PORT_ATTEMPTS - 1
    )
}

pub async fn serve_http(config: MurmurConfig, database: Database, events: EventBus) -> Result<()> {
    let http_client = reqwest::Client::builder()
        .user_agent(concat!("Murmur/", env!("CARGO_PKG_VERSION")))
        .timeout(std::time::Duration::from_secs(30))
        .build()
        .context("failed to build shared HTTP client")?;

    let state = AppState {
        config: config.clone(),
        database,
        events,
        http_client,
    };

    let router = Router::new()
        .route("/api/health", get(posts::health_handler))
        .route("/api/users", post(users::register_user))
        .route("/api/users/:id", get(users::get_user))
        .route("/api/users/:id/stats", get(users::user_stats))
        .route("/api/users/:id/posts", get(users::user_posts))
        .route("/api/users/:id/upvoted", get(users::user_upvoted_posts))
        .route("/api/users/:id/downvoted", get(users::user_downvoted_posts))
        .route("/api/users/:id/bookmarks", get(users::user_bookmarks))
        .route("/api/users/:id/notifications", get(users::user_notifications))
        .route("/api/posts", post(posts::create_post))
        .route(
            "/api/posts/:id",
            get(posts::get_post)
                .patch(posts::edit_post)
                .delete(posts::delete_post),
        )
        .route(
            "/api/posts/:id/replies",
            get(posts::list_replies).post(posts::create_reply),
        )
        .route("/api/posts/:id/upvote", post(votes::upvote_post))
        .route("/api/posts/:id/downvote", post(votes::downvote_post))
        .route("/api/posts/:id/tip", post(votes::tip_post))
        .route("/api/posts/:id/bookmark", post(votes::toggle_bookmark))
        .route("/api/feeds/explore", get(feeds::explore))
        .route("/api/feeds/trending", get(feeds::trending))
        .route("/api/feeds/search", get(feeds::search))
        .route("/api/topics", get(feeds::all_topics))
        .route("/api/topics/popular", get(feeds::popular_topics))
        .route("/api/topics/:tag/posts", get(feeds::topic_posts))
        .route("/api/previews/resolve", post(previews::resolve_preview))
        .route("/api/previews/:id", get(previews::get_preview))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    // Try to bind to the configured port, or find the next available port
    let (listener, actual_port) = find_available_port(config.api_port).await?;
    let addr = SocketAddr::from(([0, 0, 0, 0], actual_port));

    if actual_port != config.api_port {
        tracing::warn!(
            requested_port = config.api_port,
            actual_port = actual_port,
            "Configured port was in use, bound to next available port"
        );
    }

    tracing::info!(?addr, "HTTP server listening");
    axum::serve(listener, router.into_make_service()).await?;
    Ok(())
}
