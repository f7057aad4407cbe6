// src/handlers/post.rs

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
        query::{CommentsParams, PostDetailParams},
        user::Viewer,
    },
    response::ApiResponse,
    services::LooseService,
    utils::query::Params,
};

/// A single post. Hidden posts answer `NoPermission`, missing ones `PostNotFound`.
pub async fn get_post(
    State(service): State<Arc<LooseService>>,
    viewer: Option<Extension<Viewer>>,
    Params(params): Params<PostDetailParams>,
) -> Result<impl IntoResponse, AppError> {
    params
        .validate()
        .map_err(|e| AppError::InvalidParams(e.to_string()))?;

    let viewer = viewer.map(|Extension(viewer)| viewer);
    let post = service.tweet_detail(viewer.as_ref(), params.id).await?;

    Ok(ApiResponse::success(post))
}

pub async fn get_comments(
    State(service): State<Arc<LooseService>>,
    viewer: Option<Extension<Viewer>>,
    Params(params): Params<CommentsParams>,
) -> Result<impl IntoResponse, AppError> {
    params
        .validate()
        .map_err(|e| AppError::InvalidParams(e.to_string()))?;

    let viewer = viewer.map(|Extension(viewer)| viewer);
    let page = service.tweet_comments(viewer.as_ref(), &params).await?;

    Ok(ApiResponse::success(page))
}
