// ================
// common/src/lib.rs
// ================
//! Common types and structures
//! used for communication between account-management clients and the server.
//! This module defines the JSON request and response bodies of the HTTP API.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier assigned to an account at creation time
pub type AccountId = Uuid;

/// Create a new account
/// # Fields
/// * `email` - Login email, unique across accounts
/// * `username` - Display handle, unique across accounts
/// * `password` - Initial password (hashed before it is stored)
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub email: String,
    pub username: String,
    pub password: String,
}

/// Public representation of an account. Never carries the credential.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AccountView {
    pub id: AccountId,
    pub email: String,
    pub username: String,
}

/// Change the password of an account
/// # Fields
/// * `email` - Account to change
/// * `old_password` - Current password, must verify
/// * `new_password` - Replacement password
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub email: String,
    pub old_password: String,
    pub new_password: String,
}

/// Replace the email and username of an account identified by both current values
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub current_email: String,
    pub current_username: String,
    pub new_email: String,
    pub new_username: String,
}

/// Result of a profile update
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserResponse {
    pub success: bool,
    pub message: String,
}

/// Request a reset credential for the account registered under `email`
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ForgotPasswordRequest {
    pub email: String,
}

/// Check a password against an account
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticateRequest {
    pub email: String,
    pub password: String,
}

/// Plain acknowledgement body
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Outcome of a batch credential migration
/// # Fields
/// * `total` - Records inspected
/// * `rehashed` - Legacy plaintext credentials replaced by a hash
/// * `already_current` - Records already hashed with current settings
/// * `pending_upgrade` - Hashed with an older algorithm or cost; upgraded on next login
/// * `reset_required` - Records whose stored value cannot be recovered
/// * `failed` - Records that could not be rewritten (hashing or store error)
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MigrationSummary {
    pub total: usize,
    pub rehashed: usize,
    pub already_current: usize,
    pub pending_upgrade: usize,
    pub reset_required: Vec<AccountId>,
    pub failed: Vec<AccountId>,
}
