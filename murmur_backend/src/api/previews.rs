use super::{ApiResult, AppState};
use crate::previews::{PreviewView, ResolvePreviewInput};
use axum::extract::{Path, State};
use axum::Json;

pub(crate) async fn resolve_preview(
    State(state): State<AppState>,
    Json(input): Json<ResolvePreviewInput>,
) -> ApiResult<PreviewView> {
    let preview = state.previews().resolve(&input.url).await?;
    Ok(Json(preview))
}

pub(crate) async fn get_preview(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<PreviewView> {
    let preview = state.previews().get(&id)?;
    Ok(Json(preview))
}
