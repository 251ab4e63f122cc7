// ============================
// crates/backend-lib/src/storage.rs
// ============================
//! User record storage with in-memory and flat-file implementations.
//!
//! Every record carries a version number. Updates name the version they were
//! computed from and are rejected with [`AppError::StaleRecord`] if the record
//! moved on in the meantime, so concurrent credential rotation and profile
//! edits on one account cannot overwrite each other.
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::{fs as tokio_fs, sync::Mutex};
use tracing::{debug, info};
use usermgmt_common::AccountView;
use uuid::Uuid;

use crate::auth::Credential;
use crate::error::AppError;

/// File holding all user records inside the storage root
pub const USERS_FILE: &str = "users.json";

/// A persisted account
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserRecord {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub credential: Credential,
    /// Incremented on every update, starts at 1
    #[serde(default = "first_version")]
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn first_version() -> u64 {
    1
}

impl UserRecord {
    /// Public view without the credential
    pub fn view(&self) -> AccountView {
        AccountView {
            id: self.id,
            email: self.email.clone(),
            username: self.username.clone(),
        }
    }
}

/// Fields of an account about to be created
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub credential: Credential,
}

/// A single-record modification applied by [`UserStore::update`]
#[derive(Debug, Clone)]
pub enum RecordChange {
    Credential(Credential),
    Profile { email: String, username: String },
}

/// Trait for user record stores
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Create a record; fails with a conflict if the email or username is taken
    async fn insert(&self, user: NewUser) -> Result<UserRecord, AppError>;

    async fn get(&self, id: Uuid) -> Result<Option<UserRecord>, AppError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, AppError>;

    /// Find the record matching both identifiers
    async fn find_by_identity(
        &self,
        email: &str,
        username: &str,
    ) -> Result<Option<UserRecord>, AppError>;

    /// Apply `change` if the record is still at `expected_version`
    async fn update(
        &self,
        id: Uuid,
        expected_version: u64,
        change: RecordChange,
    ) -> Result<UserRecord, AppError>;

    /// All records, oldest first
    async fn list(&self) -> Result<Vec<UserRecord>, AppError>;
}

/// Record table shared by the store implementations.
///
/// Emails compare ASCII case-insensitively, so rows imported with mixed-case
/// addresses stay reachable through the lower-cased form callers pass in.
#[derive(Debug, Clone, Default)]
struct UserTable {
    users: HashMap<Uuid, UserRecord>,
}

impl UserTable {
    fn from_records(records: Vec<UserRecord>) -> Self {
        Self {
            users: records.into_iter().map(|r| (r.id, r)).collect(),
        }
    }

    fn ensure_unique(&self, email: &str, username: &str, except: Option<Uuid>) -> Result<(), AppError> {
        let others = self.users.values().filter(|r| Some(r.id) != except);
        for record in others {
            if record.email.eq_ignore_ascii_case(email) {
                return Err(AppError::Conflict("Email already in use".to_string()));
            }
            if record.username == username {
                return Err(AppError::Conflict("Username already in use".to_string()));
            }
        }
        Ok(())
    }

    fn insert(&mut self, user: NewUser) -> Result<UserRecord, AppError> {
        self.ensure_unique(&user.email, &user.username, None)?;

        let now = Utc::now();
        let record = UserRecord {
            id: Uuid::new_v4(),
            email: user.email,
            username: user.username,
            credential: user.credential,
            version: first_version(),
            created_at: now,
            updated_at: now,
        };
        self.users.insert(record.id, record.clone());
        Ok(record)
    }

    fn find_by_email(&self, email: &str) -> Option<UserRecord> {
        self.users
            .values()
            .find(|r| r.email.eq_ignore_ascii_case(email))
            .cloned()
    }

    fn find_by_identity(&self, email: &str, username: &str) -> Option<UserRecord> {
        self.users
            .values()
            .find(|r| r.email.eq_ignore_ascii_case(email) && r.username == username)
            .cloned()
    }

    fn update(&mut self, id: Uuid, expected_version: u64, change: RecordChange) -> Result<UserRecord, AppError> {
        let current = self
            .users
            .get(&id)
            .ok_or_else(|| AppError::NotFound(format!("account {id}")))?;

        if current.version != expected_version {
            return Err(AppError::StaleRecord(id));
        }

        let mut next = current.clone();
        match change {
            RecordChange::Credential(credential) => {
                if next.credential.is_hashed() && !credential.is_hashed() {
                    return Err(AppError::Internal(format!(
                        "refusing to replace a hashed credential with plaintext for account {id}"
                    )));
                }
                next.credential = credential;
            },
            RecordChange::Profile { email, username } => {
                self.ensure_unique(&email, &username, Some(id))?;
                next.email = email;
                next.username = username;
            },
        }
        next.version += 1;
        next.updated_at = Utc::now();

        self.users.insert(id, next.clone());
        Ok(next)
    }

    fn list(&self) -> Vec<UserRecord> {
        let mut records: Vec<UserRecord> = self.users.values().cloned().collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        records
    }
}

/// In-memory store, used by tests and ephemeral deployments
#[derive(Clone, Default)]
pub struct MemoryUserStore {
    table: Arc<RwLock<UserTable>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store with existing records, e.g. rows imported from an older system
    pub fn with_records(records: Vec<UserRecord>) -> Self {
        Self {
            table: Arc::new(RwLock::new(UserTable::from_records(records))),
        }
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn insert(&self, user: NewUser) -> Result<UserRecord, AppError> {
        self.table.write().insert(user)
    }

    async fn get(&self, id: Uuid) -> Result<Option<UserRecord>, AppError> {
        Ok(self.table.read().users.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, AppError> {
        Ok(self.table.read().find_by_email(email))
    }

    async fn find_by_identity(
        &self,
        email: &str,
        username: &str,
    ) -> Result<Option<UserRecord>, AppError> {
        Ok(self.table.read().find_by_identity(email, username))
    }

    async fn update(
        &self,
        id: Uuid,
        expected_version: u64,
        change: RecordChange,
    ) -> Result<UserRecord, AppError> {
        self.table.write().update(id, expected_version, change)
    }

    async fn list(&self) -> Result<Vec<UserRecord>, AppError> {
        Ok(self.table.read().list())
    }
}

/// Flat-file implementation of the UserStore trait.
///
/// All records live in `<root>/users.json`. Each mutation is applied to a copy
/// of the table, written to a temporary file and renamed into place before the
/// in-memory table is replaced.
#[derive(Clone)]
pub struct FlatFileStorage {
    root: PathBuf,
    table: Arc<Mutex<UserTable>>,
}

impl FlatFileStorage {
    pub fn new<P: AsRef<Path>>(root: P) -> anyhow::Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;

        let path = root.join(USERS_FILE);
        let records: Vec<UserRecord> = if path.exists() {
            serde_json::from_str(&fs::read_to_string(&path)?)?
        } else {
            Vec::new()
        };
        info!(path = %path.display(), records = records.len(), "opened user store");

        Ok(Self {
            root,
            table: Arc::new(Mutex::new(UserTable::from_records(records))),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn persist(&self, table: &UserTable) -> Result<(), AppError> {
        let path = self.root.join(USERS_FILE);
        let tmp = self.root.join(format!("{USERS_FILE}.tmp"));

        let json = serde_json::to_string_pretty(&table.list())?;
        tokio_fs::write(&tmp, json).await?;
        tokio_fs::rename(&tmp, &path).await?;

        debug!(path = %path.display(), records = table.users.len(), "persisted user store");
        Ok(())
    }
}

#[async_trait]
impl UserStore for FlatFileStorage {
    async fn insert(&self, user: NewUser) -> Result<UserRecord, AppError> {
        let mut table = self.table.lock().await;
        let mut next = table.clone();
        let record = next.insert(user)?;
        self.persist(&next).await?;
        *table = next;
        Ok(record)
    }

    async fn get(&self, id: Uuid) -> Result<Option<UserRecord>, AppError> {
        Ok(self.table.lock().await.users.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, AppError> {
        Ok(self.table.lock().await.find_by_email(email))
    }

    async fn find_by_identity(
        &self,
        email: &str,
        username: &str,
    ) -> Result<Option<UserRecord>, AppError> {
        Ok(self.table.lock().await.find_by_identity(email, username))
    }

    async fn update(
        &self,
        id: Uuid,
        expected_version: u64,
        change: RecordChange,
    ) -> Result<UserRecord, AppError> {
        let mut table = self.table.lock().await;
        let mut next = table.clone();
        let record = next.update(id, expected_version, change)?;
        self.persist(&next).await?;
        *table = next;
        Ok(record)
    }

    async fn list(&self) -> Result<Vec<UserRecord>, AppError> {
        Ok(self.table.lock().await.list())
    }
}
