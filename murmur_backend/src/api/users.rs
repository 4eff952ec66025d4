use super::{ApiResult, AppState};
use crate::posting::{Page, PostView};
use crate::users::{NotificationGroupView, RegisterUserInput, UserStatsView, UserView};
use axum::extract::{Path, Query, State};
use axum::Json;

pub(crate) async fn register_user(
    State(state): State<AppState>,
    Json(input): Json<RegisterUserInput>,
) -> ApiResult<UserView> {
    let user = state.users().register(input)?;
    Ok(Json(user))
}

pub(crate) async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<UserView> {
    let user = state.users().get_user(&id)?;
    Ok(Json(user))
}

pub(crate) async fn user_stats(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<UserStatsView> {
    let stats = state.users().stats(&id)?;
    Ok(Json(stats))
}

pub(crate) async fn user_notifications(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<NotificationGroupView>> {
    let groups = state.users().notifications(&id)?;
    Ok(Json(groups))
}

pub(crate) async fn user_posts(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(page): Query<Page>,
) -> ApiResult<Vec<PostView>> {
    let posts = state.posts().posts_by_user(&id, page)?;
    Ok(Json(posts))
}

pub(crate) async fn user_upvoted_posts(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(page): Query<Page>,
) -> ApiResult<Vec<PostView>> {
    let posts = state.posts().upvoted_posts(&id, page)?;
    Ok(Json(posts))
}

pub(crate) async fn user_downvoted_posts(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(page): Query<Page>,
) -> ApiResult<Vec<PostView>> {
    let posts = state.posts().downvoted_posts(&id, page)?;
    Ok(Json(posts))
}

pub(crate) async fn user_bookmarks(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(page): Query<Page>,
) -> ApiResult<Vec<PostView>> {
    let posts = state.posts().bookmarked_posts(&id, page)?;
    Ok(Json(posts))
}
