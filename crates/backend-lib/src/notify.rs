// ============================
// crates/backend-lib/src/notify.rs
// ============================
//! Hand-off of freshly issued reset secrets to a delivery channel.
use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::{fs as tokio_fs, io::AsyncWriteExt};
use tracing::{debug, info};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::error::AppError;

/// Directory under the storage root where reset messages are queued
pub const OUTBOX_DIR: &str = "outbox";

/// A reset secret on its way to the account owner
#[derive(Clone)]
pub struct ResetNotice {
    pub account_id: Uuid,
    pub email: String,
    pub secret: Zeroizing<String>,
    pub issued_at: DateTime<Utc>,
}

impl std::fmt::Debug for ResetNotice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResetNotice")
            .field("account_id", &self.account_id)
            .field("email", &self.email)
            .field("secret", &"<redacted>")
            .field("issued_at", &self.issued_at)
            .finish()
    }
}

/// Delivery collaborator for reset secrets
#[async_trait]
pub trait ResetNotifier: Send + Sync {
    async fn deliver(&self, notice: ResetNotice) -> Result<(), AppError>;
}

/// Writes one JSON message per reset into `<root>/outbox/` for an external mailer.
///
/// Messages are written to a hidden temporary file and renamed into place, so a
/// mailer never picks up a partial message. On unix they are mode `0600`.
#[derive(Debug, Clone)]
pub struct FileOutbox {
    dir: PathBuf,
}

impl FileOutbox {
    pub fn new<P: AsRef<Path>>(root: P) -> anyhow::Result<Self> {
        let dir = root.as_ref().join(OUTBOX_DIR);
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl ResetNotifier for FileOutbox {
    async fn deliver(&self, notice: ResetNotice) -> Result<(), AppError> {
        let message = Zeroizing::new(serde_json::to_string_pretty(&serde_json::json!({
            "to": notice.email,
            "subject": "Password reset",
            "body": format!(
                "Your password has been reset. Your temporary password is: {}",
                notice.secret.as_str()
            ),
            "issued_at": notice.issued_at,
        }))?);

        let id = Uuid::new_v4();
        let tmp = self.dir.join(format!(".{id}.json.tmp"));
        let path = self.dir.join(format!("{id}.json"));

        if let Err(e) = write_private(&tmp, message.as_bytes()).await {
            let _ = tokio_fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        tokio_fs::rename(&tmp, &path).await?;

        info!(account_id = %notice.account_id, path = %path.display(), "queued reset message");
        Ok(())
    }
}

/// Create `path` readable by the owner only and write `bytes` to disk
async fn write_private(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut options = tokio_fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await
}

/// Keeps notices in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryOutbox {
    notices: Arc<Mutex<Vec<ResetNotice>>>,
}

impl MemoryOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent notice addressed to `email`
    pub fn last_for(&self, email: &str) -> Option<ResetNotice> {
        self.notices
            .lock()
            .iter()
            .rev()
            .find(|n| n.email == email)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.notices.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.notices.lock().is_empty()
    }
}

#[async_trait]
impl ResetNotifier for MemoryOutbox {
    async fn deliver(&self, notice: ResetNotice) -> Result<(), AppError> {
        debug!(account_id = %notice.account_id, "stored reset notice in memory");
        self.notices.lock().push(notice);
        Ok(())
    }
}
