use axum::{routing::get, routing::post, Router};

use crate::AppState;
use crate::http::handlers;

pub fn health() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health))
}

pub fn follows() -> Router<AppState> {
    Router::new()
        .route("/users/:id", get(handlers::get_user))
        .route("/users/:id/relationship", get(handlers::relationship_status))
        .route("/users/:id/follow", post(handlers::follow_user))
        .route("/users/:id/unfollow", post(handlers::unfollow_user))
        .route("/users/:id/accept", post(handlers::accept_follower))
        .route("/users/:id/deny", post(handlers::deny_follower))
        .route("/users/:id/followed", get(handlers::list_followed))
        .route("/users/:id/followers", get(handlers::list_followers))
}
