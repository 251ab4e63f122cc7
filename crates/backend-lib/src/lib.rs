// ============================
// crates/backend-lib/src/lib.rs
// ============================
//! Core backend-lib functionality for the user account service.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod notify;
pub mod router;
pub mod service;
pub mod storage;
pub mod validation;

use std::sync::Arc;

use crate::config::Settings;
use crate::error::AppError;
use crate::notify::{FileOutbox, ResetNotifier};
use crate::service::AccountService;
use crate::storage::{FlatFileStorage, UserStore};

/// Application state shared across all handlers
pub struct AppState<S> {
    /// Account operations over the storage backend
    pub accounts: AccountService<S>,
    /// Settings the state was built from
    pub settings: Arc<Settings>,
}

impl<S: UserStore> AppState<S> {
    /// Create a new application state
    pub fn new(
        storage: S,
        notifier: Arc<dyn ResetNotifier>,
        settings: Settings,
    ) -> Result<Self, AppError> {
        let accounts = AccountService::new(storage, notifier, &settings)?;
        Ok(Self {
            accounts,
            settings: Arc::new(settings),
        })
    }
}

impl AppState<FlatFileStorage> {
    /// Open the on-disk user store and reset outbox under `settings.storage.path`
    pub fn open(settings: Settings) -> anyhow::Result<Self> {
        let storage = FlatFileStorage::new(&settings.storage.path)?;
        let outbox = FileOutbox::new(&settings.storage.path)?;
        Ok(Self::new(storage, Arc::new(outbox), settings)?)
    }
}
