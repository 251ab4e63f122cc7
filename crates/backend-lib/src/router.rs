// ============================
// crates/backend-lib/src/router.rs
// ============================
//! HTTP router for the account API.
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::{DefaultMakeSpan, TraceLayer};

use crate::handlers;
use crate::storage::UserStore;
use crate::AppState;

/// Base path of the account routes
pub const API_BASE: &str = "/api/user";

/// Create the application router
pub fn create_router<S: UserStore + 'static>(state: Arc<AppState<S>>) -> Router {
    let accounts = Router::new()
        .route("/create", post(handlers::create_user::<S>))
        .route("/change-password", post(handlers::change_password::<S>))
        .route("/update-user", post(handlers::update_user::<S>))
        .route("/forgot-password", post(handlers::forgot_password::<S>))
        .route("/hash-all-passwords", post(handlers::hash_all_passwords::<S>))
        .route("/authenticate", post(handlers::authenticate::<S>));

    Router::new()
        .route("/health", get(handlers::health))
        .nest(API_BASE, accounts)
        .layer(TraceLayer::new_for_http().make_span_with(DefaultMakeSpan::default()))
        .with_state(state)
}
