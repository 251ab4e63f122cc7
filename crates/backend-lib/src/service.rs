// ============================
// crates/backend-lib/src/service.rs
// ============================
//! Account operations on top of a [`UserStore`].
//!
//! Hashing and verification are CPU-bound and run on the blocking pool. Writes
//! go through the store's versioned `update`, so a record read here is only
//! replaced if nobody else changed it in between.
use std::sync::Arc;

use ::metrics::counter;
use chrono::Utc;
use tracing::{debug, info, instrument, warn};
use usermgmt_common::{
    AccountView, AuthenticateRequest, ChangePasswordRequest, CreateUserRequest,
    ForgotPasswordRequest, MessageResponse, MigrationSummary, UpdateUserRequest,
    UpdateUserResponse,
};
use zeroize::Zeroizing;

use crate::auth::{
    generate_reset_secret, Credential, CredentialManager, PasswordRequirements,
    VerificationOutcome,
};
use crate::config::Settings;
use crate::error::AppError;
use crate::metrics as keys;
use crate::notify::{ResetNotice, ResetNotifier};
use crate::storage::{NewUser, RecordChange, UserRecord, UserStore};
use crate::validation::{
    validate_email, validate_new_password, validate_supplied_password, validate_username,
};

/// Attempts at a password change before a concurrent modification is reported
pub const MAX_CAS_ATTEMPTS: u32 = 3;

/// Orchestrates validation, credential handling, persistence and reset delivery
pub struct AccountService<S> {
    store: S,
    notifier: Arc<dyn ResetNotifier>,
    credentials: CredentialManager,
    requirements: PasswordRequirements,
    reset_length: usize,
}

impl<S: UserStore> AccountService<S> {
    pub fn new(
        store: S,
        notifier: Arc<dyn ResetNotifier>,
        settings: &Settings,
    ) -> Result<Self, AppError> {
        Ok(Self {
            store,
            notifier,
            credentials: CredentialManager::new(&settings.hashing)?,
            requirements: settings.password_requirements.clone(),
            reset_length: settings.reset.secret_length,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn credentials(&self) -> &CredentialManager {
        &self.credentials
    }

    /// Run a credential operation on the blocking pool
    async fn blocking<F, T>(&self, op: F) -> Result<T, AppError>
    where
        F: FnOnce(&CredentialManager) -> T + Send + 'static,
        T: Send + 'static,
    {
        let manager = self.credentials.clone();
        Ok(tokio::task::spawn_blocking(move || op(&manager)).await?)
    }

    async fn hash(&self, plaintext: Zeroizing<String>) -> Result<Credential, AppError> {
        Ok(self.blocking(move |m| m.hash(&plaintext)).await??)
    }

    async fn verify(
        &self,
        record: &UserRecord,
        candidate: Zeroizing<String>,
    ) -> Result<VerificationOutcome, AppError> {
        let stored = record.credential.clone();
        self.blocking(move |m| m.verify(&stored, &candidate)).await
    }

    async fn require_by_email(&self, email: &str) -> Result<UserRecord, AppError> {
        self.store
            .find_by_email(email)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("account {email}")))
    }

    #[instrument(skip_all, fields(username = %req.username))]
    pub async fn create_account(&self, req: CreateUserRequest) -> Result<AccountView, AppError> {
        let email = validate_email(&req.email)?;
        let username = validate_username(&req.username)?;
        validate_new_password(&req.password, &self.requirements)?;

        let credential = self.hash(Zeroizing::new(req.password)).await?;
        let record = self
            .store
            .insert(NewUser {
                email,
                username,
                credential,
            })
            .await?;

        counter!(keys::ACCOUNT_CREATED).increment(1);
        info!(account_id = %record.id, "account created");
        Ok(record.view())
    }

    #[instrument(skip_all)]
    pub async fn change_password(
        &self,
        req: ChangePasswordRequest,
    ) -> Result<MessageResponse, AppError> {
        let email = validate_email(&req.email)?;
        validate_supplied_password(&req.old_password)?;
        validate_new_password(&req.new_password, &self.requirements)?;

        let old_password = Zeroizing::new(req.old_password);
        let new_password = Zeroizing::new(req.new_password);
        let mut replacement: Option<Credential> = None;
        let mut attempt = 0;

        loop {
            attempt += 1;
            let record = self.require_by_email(&email).await?;

            match self.verify(&record, old_password.clone()).await? {
                VerificationOutcome::Match => {},
                VerificationOutcome::NoMatch => {
                    counter!(keys::VERIFY_FAILED).increment(1);
                    debug!(account_id = %record.id, "old password did not verify");
                    return Err(AppError::InvalidPassword);
                },
                VerificationOutcome::MalformedStoredValue => {
                    counter!(keys::CREDENTIAL_MALFORMED).increment(1);
                    warn!(account_id = %record.id, "stored credential is malformed");
                    return Err(AppError::MalformedCredential(record.id));
                },
            }

            let credential = match &replacement {
                Some(credential) => credential.clone(),
                None => {
                    let stored = record.credential.clone();
                    let secret = new_password.clone();
                    let fresh = self.blocking(move |m| m.rehash(&stored, &secret)).await??;
                    replacement = Some(fresh.clone());
                    fresh
                },
            };

            match self
                .store
                .update(record.id, record.version, RecordChange::Credential(credential))
                .await
            {
                Ok(updated) => {
                    counter!(keys::PASSWORD_CHANGED).increment(1);
                    info!(account_id = %updated.id, version = updated.version, "password changed");
                    return Ok(MessageResponse::new("Password changed successfully"));
                },
                Err(AppError::StaleRecord(id)) if attempt < MAX_CAS_ATTEMPTS => {
                    counter!(keys::STALE_RETRY).increment(1);
                    warn!(account_id = %id, attempt, "record changed during password change, retrying");
                },
                Err(e) => return Err(e),
            }
        }
    }

    #[instrument(skip_all)]
    pub async fn update_user(&self, req: UpdateUserRequest) -> Result<UpdateUserResponse, AppError> {
        let current_email = validate_email(&req.current_email)?;
        let current_username = validate_username(&req.current_username)?;
        let email = validate_email(&req.new_email)?;
        let username = validate_username(&req.new_username)?;

        let record = self
            .store
            .find_by_identity(&current_email, &current_username)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("account {current_email}")))?;

        let updated = self
            .store
            .update(record.id, record.version, RecordChange::Profile { email, username })
            .await?;

        counter!(keys::PROFILE_UPDATED).increment(1);
        info!(account_id = %updated.id, "profile updated");
        Ok(UpdateUserResponse {
            success: true,
            message: "User updated successfully".to_string(),
        })
    }

    /// Replace the credential with a generated secret and hand it to the notifier.
    /// The secret never leaves this function in the return value.
    #[instrument(skip_all)]
    pub async fn forgot_password(
        &self,
        req: ForgotPasswordRequest,
    ) -> Result<MessageResponse, AppError> {
        let email = validate_email(&req.email)?;
        let record = self.require_by_email(&email).await?;

        let secret = generate_reset_secret(self.reset_length);
        let credential = self.hash(secret.clone()).await?;
        let updated = self
            .store
            .update(record.id, record.version, RecordChange::Credential(credential))
            .await?;

        self.notifier
            .deliver(ResetNotice {
                account_id: updated.id,
                email: updated.email.clone(),
                secret,
                issued_at: Utc::now(),
            })
            .await
            .map_err(|e| AppError::Internal(format!("reset delivery failed: {e}")))?;

        counter!(keys::RESET_ISSUED).increment(1);
        info!(account_id = %updated.id, "reset credential issued");
        Ok(MessageResponse::new(
            "A temporary password has been sent to your email address",
        ))
    }

    /// Check a password, upgrading a legacy or outdated credential on success.
    #[instrument(skip_all)]
    pub async fn authenticate(&self, req: AuthenticateRequest) -> Result<AccountView, AppError> {
        let email = validate_email(&req.email)?;
        validate_supplied_password(&req.password)?;

        let Some(record) = self.store.find_by_email(&email).await? else {
            counter!(keys::VERIFY_FAILED).increment(1);
            return Err(AppError::InvalidPassword);
        };

        let password = Zeroizing::new(req.password);
        match self.verify(&record, password.clone()).await? {
            VerificationOutcome::Match => {},
            VerificationOutcome::NoMatch => {
                counter!(keys::VERIFY_FAILED).increment(1);
                return Err(AppError::InvalidPassword);
            },
            VerificationOutcome::MalformedStoredValue => {
                counter!(keys::CREDENTIAL_MALFORMED).increment(1);
                warn!(account_id = %record.id, "stored credential is malformed");
                return Err(AppError::MalformedCredential(record.id));
            },
        }
        counter!(keys::AUTH_SUCCEEDED).increment(1);

        let status = self.credentials.inspect(&record.credential);
        if status.needs_rehash() {
            self.upgrade(&record, password).await;
        }

        Ok(record.view())
    }

    async fn upgrade(&self, record: &UserRecord, verified: Zeroizing<String>) {
        let stored = record.credential.clone();
        let fresh = match self.blocking(move |m| m.rehash(&stored, &verified)).await {
            Ok(Ok(credential)) => credential,
            Ok(Err(e)) => {
                warn!(account_id = %record.id, error = %e, "credential upgrade failed");
                return;
            },
            Err(e) => {
                warn!(account_id = %record.id, error = %e, "credential upgrade failed");
                return;
            },
        };

        match self
            .store
            .update(record.id, record.version, RecordChange::Credential(fresh))
            .await
        {
            Ok(updated) => {
                counter!(keys::CREDENTIAL_UPGRADED).increment(1);
                info!(account_id = %updated.id, from = %record.credential.format(), "credential upgraded");
            },
            Err(AppError::StaleRecord(id)) => {
                debug!(account_id = %id, "credential upgrade lost a race, keeping newer record");
            },
            Err(e) => {
                warn!(account_id = %record.id, error = %e, "credential upgrade not persisted");
            },
        }
    }

    /// Hash every legacy credential in the store and report what could not be migrated.
    #[instrument(skip_all)]
    pub async fn migrate_all(&self) -> Result<MigrationSummary, AppError> {
        let records = self.store.list().await?;
        let plan = self
            .blocking(move |m| {
                m.migrate_all(
                    records
                        .iter()
                        .map(|r| ((r.id, r.version), &r.credential)),
                )
            })
            .await?;

        let mut summary = MigrationSummary {
            total: plan.total(),
            already_current: plan.already_current.len(),
            pending_upgrade: plan.pending_upgrade.len(),
            reset_required: plan.reset_required.iter().map(|(id, _)| *id).collect(),
            failed: Vec::new(),
            ..Default::default()
        };

        for (id, error) in plan.failed {
            warn!(account_id = %id.0, error = %error, "could not hash legacy credential");
            summary.failed.push(id.0);
        }

        for ((id, version), credential) in plan.upgrades {
            match self
                .store
                .update(id, version, RecordChange::Credential(credential))
                .await
            {
                Ok(_) => summary.rehashed += 1,
                Err(e) => {
                    warn!(account_id = %id, error = %e, "could not store migrated credential");
                    summary.failed.push(id);
                },
            }
        }

        for id in &summary.reset_required {
            warn!(account_id = %id, "stored credential unrecoverable, reset required");
        }

        counter!(keys::CREDENTIAL_MIGRATED).increment(summary.rehashed as u64);
        info!(
            total = summary.total,
            rehashed = summary.rehashed,
            already_current = summary.already_current,
            pending_upgrade = summary.pending_upgrade,
            reset_required = summary.reset_required.len(),
            failed = summary.failed.len(),
            "credential migration finished"
        );
        Ok(summary)
    }
}
