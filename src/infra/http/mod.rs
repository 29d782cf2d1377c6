mod error;
mod extract;
mod handlers;
mod middleware;
mod state;

pub use error::{ApiError, codes};
pub use extract::{RequestUser, USER_ID_HEADER};
pub use middleware::REQUEST_DURATION_METRIC;
pub use state::HttpState;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, post},
};

/// Upper bound on request bodies; images travel base64-encoded inside JSON.
pub const MAX_REQUEST_BYTES: usize = 10 * 1024 * 1024;

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/api/v1/comments", post(handlers::create_comment))
        .route(
            "/api/v1/comments/{id}",
            get(handlers::get_comment)
                .patch(handlers::update_comment)
                .delete(handlers::delete_comment),
        )
        .route(
            "/api/v1/tweets/{tweet_id}/comments",
            get(handlers::list_tweet_comments),
        )
        .route("/health", get(handlers::health))
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BYTES))
        .layer(axum_middleware::from_fn(middleware::log_responses))
        .layer(axum_middleware::from_fn(middleware::set_request_context))
}
