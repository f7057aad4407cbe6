// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::get,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{post, timeline, topic, user},
    state::AppState,
    utils::jwt::loose_auth,
};

/// Assembles the main application router.
///
/// * Nests the read API under `/v1`, behind optional authentication.
/// * Applies global middleware (Trace, CORS).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        HeaderValue::from_static("http://localhost:3000"),
        HeaderValue::from_static("http://127.0.0.1:3000"),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let api_routes = Router::new()
        .route("/posts", get(timeline::get_posts))
        .route("/post", get(post::get_post))
        .route("/post/comments", get(post::get_comments))
        .route("/user/posts", get(user::get_user_posts))
        .route("/user/profile", get(user::get_user_profile))
        .route("/tags", get(topic::get_tags))
        .layer(middleware::from_fn_with_state(state.clone(), loose_auth));

    Router::new()
        .nest("/v1", api_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
