use super::{ApiResult, AppState};
use crate::posting::{Page, Period, PostView, TopicView};
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SearchParams {
    #[serde(default)]
    q: Option<String>,
    #[serde(default)]
    page: Option<usize>,
    #[serde(default)]
    per_page: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TopicPostsParams {
    #[serde(default)]
    period: Option<String>,
    #[serde(default)]
    page: Option<usize>,
    #[serde(default)]
    per_page: Option<usize>,
}

pub(crate) async fn explore(
    State(state): State<AppState>,
    Query(page): Query<Page>,
) -> ApiResult<Vec<PostView>> {
    let posts = state.posts().explore(page)?;
    Ok(Json(posts))
}

pub(crate) async fn trending(
    State(state): State<AppState>,
    Query(page): Query<Page>,
) -> ApiResult<Vec<PostView>> {
    let posts = state.posts().trending(page)?;
    Ok(Json(posts))
}

pub(crate) async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Vec<PostView>> {
    let page = Page {
        page: params.page,
        per_page: params.per_page,
    };
    let posts = state.posts().search(params.q.as_deref().unwrap_or(""), page)?;
    Ok(Json(posts))
}

pub(crate) async fn all_topics(State(state): State<AppState>) -> ApiResult<Vec<String>> {
    let topics = state.posts().all_topics()?;
    Ok(Json(topics))
}

pub(crate) async fn popular_topics(State(state): State<AppState>) -> ApiResult<Vec<TopicView>> {
    let topics = state.posts().popular_topics()?;
    Ok(Json(topics))
}

pub(crate) async fn topic_posts(
    State(state): State<AppState>,
    Path(tag): Path<String>,
    Query(params): Query<TopicPostsParams>,
) -> ApiResult<Vec<PostView>> {
    let period = params.period.as_deref().map(Period::parse).transpose()?;
    let page = Page {
        page: params.page,
        per_page: params.per_page,
    };
    let posts = state.posts().posts_by_topic(&tag, period, page)?;
    Ok(Json(posts))
}
