// ============================
// crates/backend-lib/src/handlers/mod.rs
// ============================
//! HTTP handlers for the account API.
//!
//! Each handler unwraps the JSON body, delegates to the
//! [`AccountService`](crate::service::AccountService) and lets [`AppError`]
//! render failures.
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use usermgmt_common::{
    AccountView, AuthenticateRequest, ChangePasswordRequest, CreateUserRequest,
    ForgotPasswordRequest, MessageResponse, MigrationSummary, UpdateUserRequest,
    UpdateUserResponse,
};

use crate::error::AppError;
use crate::storage::UserStore;
use crate::AppState;

type SharedState<S> = State<Arc<AppState<S>>>;

/// Malformed or mistyped JSON is a client error, reported like any other invalid input
fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| AppError::InvalidInput(rejection.body_text()))
}

pub async fn health() -> Json<Value> {
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn create_user<S: UserStore + 'static>(
    State(state): SharedState<S>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AccountView>), AppError> {
    let view = state.accounts.create_account(body(payload)?).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn change_password<S: UserStore + 'static>(
    State(state): SharedState<S>,
    payload: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    Ok(Json(state.accounts.change_password(body(payload)?).await?))
}

pub async fn update_user<S: UserStore + 'static>(
    State(state): SharedState<S>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<Json<UpdateUserResponse>, AppError> {
    Ok(Json(state.accounts.update_user(body(payload)?).await?))
}

pub async fn forgot_password<S: UserStore + 'static>(
    State(state): SharedState<S>,
    payload: Result<Json<ForgotPasswordRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    Ok(Json(state.accounts.forgot_password(body(payload)?).await?))
}

/// Administrative: hash every legacy credential in the store
pub async fn hash_all_passwords<S: UserStore + 'static>(
    State(state): SharedState<S>,
) -> Result<Json<MigrationSummary>, AppError> {
    Ok(Json(state.accounts.migrate_all().await?))
}

pub async fn authenticate<S: UserStore + 'static>(
    State(state): SharedState<S>,
    payload: Result<Json<AuthenticateRequest>, JsonRejection>,
) -> Result<Json<AccountView>, AppError> {
    Ok(Json(state.accounts.authenticate(body(payload)?).await?))
}
