use super::{ApiResult, AppState};
use crate::posting::{CreatePostInput, CreateReplyInput, EditPostInput, Page, PostView};
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Serialize;

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
    version: &'static str,
    api_port: u16,
}

pub(crate) async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        api_port: state.config.api_port,
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DeleteResponse {
    pub removed: usize,
}

pub(crate) async fn create_post(
    State(state): State<AppState>,
    Json(input): Json<CreatePostInput>,
) -> ApiResult<PostView> {
    let post = state.posts().create_post(input)?;
    Ok(Json(post))
}

pub(crate) async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<PostView> {
    let post = state.posts().get_post(&id)?;
    Ok(Json(post))
}

pub(crate) async fn edit_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<EditPostInput>,
) -> ApiResult<PostView> {
    let post = state.posts().edit_post(&id, input)?;
    Ok(Json(post))
}

pub(crate) async fn delete_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<DeleteResponse> {
    let removed = state.posts().delete_post(&id)?;
    Ok(Json(DeleteResponse { removed }))
}

pub(crate) async fn create_reply(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<CreateReplyInput>,
) -> ApiResult<PostView> {
    let reply = state.posts().create_reply(&id, input)?;
    Ok(Json(reply))
}

pub(crate) async fn list_replies(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(page): Query<Page>,
) -> ApiResult<Vec<PostView>> {
    let replies = state.posts().list_replies(&id, page)?;
    Ok(Json(replies))
}
