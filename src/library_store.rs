use crate::models::{BackupCategory, BackupExtensionRepos, BackupManga, PreferenceKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Preference namespace holding application settings.
pub const APP_NAMESPACE: &str = "app";

/// App preference toggled by category restore.
pub const CATEGORIZED_DISPLAY_KEY: &str = "categorized_display";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Conflict(String),

    #[error("rejected: {0}")]
    Rejected(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub order: i64,
    pub flags: i64,
    pub content_type: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionRepo {
    pub base_url: String,
    pub name: String,
    pub short_name: Option<String>,
    pub website: String,
    pub signing_key_fingerprint: String,
}

impl From<&BackupExtensionRepos> for ExtensionRepo {
    fn from(repo: &BackupExtensionRepos) -> Self {
        Self {
            base_url: repo.base_url.clone(),
            name: repo.name.clone(),
            short_name: repo.short_name.clone(),
            website: repo.website.clone(),
            signing_key_fingerprint: repo.signing_key_fingerprint.clone(),
        }
    }
}

/// The application's persisted library. Every call is individually atomic;
/// nothing spans calls.
pub trait LibraryStore: Send + Sync {
    fn categories(&self) -> StoreResult<Vec<Category>>;

    fn insert_category(
        &self,
        name: &str,
        order: i64,
        flags: i64,
        content_type: i32,
    ) -> StoreResult<Category>;

    /// Upsert one library entry with its chapters, tracking and history.
    /// `backup_categories` resolves the entry's category orders to names.
    fn restore_manga(
        &self,
        manga: &BackupManga,
        backup_categories: &[BackupCategory],
    ) -> StoreResult<()>;

    fn extension_repos(&self) -> StoreResult<Vec<ExtensionRepo>>;

    fn insert_extension_repo(&self, repo: ExtensionRepo) -> StoreResult<()>;

    /// Recompute cached library aggregates.
    fn refresh_library(&self) -> StoreResult<()>;
}

/// Typed key/value preferences, grouped by namespace.
pub trait PreferenceStore: Send + Sync {
    fn get(&self, namespace: &str, key: &str) -> StoreResult<Option<PreferenceKind>>;

    fn set(&self, namespace: &str, key: &str, value: PreferenceKind) -> StoreResult<()>;
}
