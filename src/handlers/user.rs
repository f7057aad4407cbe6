// src/handlers/user.rs

use std::sync::Arc;

use axum::{
    Extension,
    extract::State,
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        query::{ProfileParams, UserPostsParams},
        user::Viewer,
    },
    response::ApiResponse,
    services::LooseService,
    utils::query::Params,
};

/// Posts, highlights, media, commented posts or stars of one user.
pub async fn get_user_posts(
    State(service): State<Arc<LooseService>>,
    viewer: Option<Extension<Viewer>>,
    Params(params): Params<UserPostsParams>,
) -> Result<impl IntoResponse, AppError> {
    params
        .validate()
        .map_err(|e| AppError::InvalidParams(e.to_string()))?;

    let viewer = viewer.map(|Extension(viewer)| viewer);
    let page = service.user_posts(viewer.as_ref(), &params).await?;

    Ok(ApiResponse::success(page))
}

pub async fn get_user_profile(
    State(service): State<Arc<LooseService>>,
    viewer: Option<Extension<Viewer>>,
    Params(params): Params<ProfileParams>,
) -> Result<impl IntoResponse, AppError> {
    params
        .validate()
        .map_err(|e| AppError::InvalidParams(e.to_string()))?;

    let viewer = viewer.map(|Extension(viewer)| viewer);
    let profile = service
        .user_profile(viewer.as_ref(), &params.username)
        .await?;

    Ok(ApiResponse::success(profile))
}
