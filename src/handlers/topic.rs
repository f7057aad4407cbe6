// src/handlers/topic.rs

use std::sync::Arc;

use axum::{
    Extension,
    extract::State,
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    error::AppError, models::query::TopicParams, models::user::Viewer,
    response::ApiResponse, services::LooseService, utils::query::Params,
};

pub async fn get_tags(
    State(service): State<Arc<LooseService>>,
    viewer: Option<Extension<Viewer>>,
    Params(params): Params<TopicParams>,
) -> Result<impl IntoResponse, AppError> {
    params
        .validate()
        .map_err(|e| AppError::InvalidParams(e.to_string()))?;

    let viewer = viewer.map(|Extension(viewer)| viewer);
    let topics = service.topic_list(viewer.as_ref(), &params).await?;

    Ok(ApiResponse::success(topics))
}
