// ==============
// crates/backend-lib/src/metrics.rs

//! Central place for metric keys
pub const ACCOUNT_CREATED: &str = "account.created";
pub const PASSWORD_CHANGED: &str = "account.password_changed";
pub const PROFILE_UPDATED: &str = "account.profile_updated";
pub const RESET_ISSUED: &str = "account.reset_issued";
pub const AUTH_SUCCEEDED: &str = "auth.succeeded";
pub const VERIFY_FAILED: &str = "auth.verify_failed";
pub const CREDENTIAL_MALFORMED: &str = "credential.malformed";
pub const CREDENTIAL_UPGRADED: &str = "credential.upgraded";
pub const CREDENTIAL_MIGRATED: &str = "credential.migrated";
pub const STALE_RETRY: &str = "storage.stale_retry";
