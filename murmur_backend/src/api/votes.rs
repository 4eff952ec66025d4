use super::{ApiResult, AppState};
use crate::posting::PostView;
use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

/// Body for actions performed on behalf of an account. There is no session
/// layer; callers state who they are.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ActorBody {
    pub user_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BookmarkResponse {
    pub bookmarked: bool,
}

pub(crate) async fn upvote_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ActorBody>,
) -> ApiResult<PostView> {
    state.votes().upvote(&id, &body.user_id)?;
    let post = state.posts().get_post(&id)?;
    Ok(Json(post))
}

pub(crate) async fn downvote_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ActorBody>,
) -> ApiResult<PostView> {
    state.votes().downvote(&id, &body.user_id)?;
    let post = state.posts().get_post(&id)?;
    Ok(Json(post))
}

pub(crate) async fn tip_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ActorBody>,
) -> ApiResult<PostView> {
    state.votes().tip(&id, &body.user_id)?;
    let post = state.posts().get_post(&id)?;
    Ok(Json(post))
}

pub(crate) async fn toggle_bookmark(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ActorBody>,
) -> ApiResult<BookmarkResponse> {
    let bookmarked = state.votes().toggle_bookmark(&id, &body.user_id)?;
    Ok(Json(BookmarkResponse { bookmarked }))
}
