// src/handlers/timeline.rs

use std::sync::Arc;

use axum::{
    Extension,
    extract::State,
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    error::AppError, models::query::TimelineParams, models::user::Viewer,
    response::ApiResponse, services::LooseService, utils::query::Params,
};

/// Home timeline (`newest`, `hots`, `following`) or, with a `query`, search results.
pub async fn get_posts(
    State(service): State<Arc<LooseService>>,
    viewer: Option<Extension<Viewer>>,
    Params(params): Params<TimelineParams>,
) -> Result<impl IntoResponse, AppError> {
    params
        .validate()
        .map_err(|e| AppError::InvalidParams(e.to_string()))?;

    let viewer = viewer.map(|Extension(viewer)| viewer);
    let page = service.timeline(viewer.as_ref(), &params).await?;

    Ok(ApiResponse::success(page))
}
