use crate::library_store::{ExtensionRepo, LibraryStore, StoreError, StoreResult};
use crate::models::BackupExtensionRepos;
use std::sync::Arc;

pub struct ExtensionRepoRestorer {
    library: Arc<dyn LibraryStore>,
}

impl ExtensionRepoRestorer {
    pub fn new(library: Arc<dyn LibraryStore>) -> Self {
        Self { library }
    }

    /// Register one repository.
    ///
    /// A repository already registered with the same url and fingerprint is
    /// left alone. A url registered under another fingerprint, or a
    /// fingerprint owned by another repository, is a conflict.
    pub fn restore(&self, backup: &BackupExtensionRepos) -> StoreResult<()> {
        let existing = self.library.extension_repos()?;
        let same_url = existing.iter().find(|r| r.base_url == backup.base_url);
        let same_key = existing
            .iter()
            .find(|r| r.signing_key_fingerprint == backup.signing_key_fingerprint);

        match (same_url, same_key) {
            (Some(repo), _) if repo.signing_key_fingerprint == backup.signing_key_fingerprint => {
                tracing::debug!(url = %backup.base_url, "extension repo already registered");
                Ok(())
            }
            (Some(_), _) => Err(StoreError::Conflict(
                "Already Exists with different signing key fingerprint".to_string(),
            )),
            (None, Some(owner)) => Err(StoreError::Conflict(format!(
                "{} has the same signing key fingerprint",
                owner.name
            ))),
            (None, None) => self.library.insert_extension_repo(ExtensionRepo::from(backup)),
        }
    }
}
