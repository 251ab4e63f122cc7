// ============================
// crates/backend-lib/src/auth/mod.rs
// ============================
//! Credential handling: storage format, hashing, verification, reset secrets.

pub mod credential;
pub mod manager;
pub mod password;
pub mod token_generator;

pub use credential::{
    Credential, CredentialError, CredentialFormat, CredentialStatus, EncodedHash,
    VerificationOutcome,
};
pub use manager::{CredentialManager, MigrationPlan};
pub use password::{
    constant_time_eq, validate_password_strength, PasswordRequirements, MAX_PASSWORD_LENGTH,
    MIN_PASSWORD_LENGTH,
};
pub use token_generator::{generate_reset_secret, DEFAULT_RESET_LENGTH, RESET_ALPHABET};
