//! Restore orchestration
//!
//! A restore makes two passes over the container:
//!
//! 1. A summary pass counts library entries and keeps every small section
//!    (categories, sources, preferences, extension repos) in memory.
//! 2. The small sections are restored by concurrent tasks. Categories finish
//!    before app preferences start, since category-set preferences are
//!    translated through the restored categories.
//! 3. A second pass re-opens the container and restores library entries one
//!    at a time, in container order. One failing entry is logged and skipped.
//!
//! Nothing spans the whole restore: every section and entry is durable as
//! soon as it is written, and cancellation keeps what already landed.

use crate::container::{open_payload, ContainerSource};
use crate::error_log::{ErrorLog, ERROR_LOG_FILE_NAME};
use crate::errors::{BackupError, BackupResult};
use crate::library_store::{LibraryStore, PreferenceStore, StoreResult};
use crate::models::{
    field, BackupCategory, BackupExtensionRepos, BackupManga, BackupPreference, BackupSource,
    BackupSourcePreferences,
};
use crate::restore_progress::{ProgressState, RestoreObserver, RestoreProgress, RestoreReport};
use crate::restorers::{CategoriesRestorer, ExtensionRepoRestorer, PreferenceRestorer};
use crate::wire::FieldReader;
use prost::Message;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

pub const CATEGORIES_LABEL: &str = "Categories";
pub const APP_SETTINGS_LABEL: &str = "App settings";
pub const SOURCE_SETTINGS_LABEL: &str = "Source settings";
pub const EXTENSION_REPOS_LABEL: &str = "Extension repos";

/// Which sections of a backup to restore.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreOptions {
    pub library_entries: bool,
    pub categories: bool,
    pub app_settings: bool,
    pub source_settings: bool,
    pub extension_repos: bool,
}

impl RestoreOptions {
    pub fn all() -> Self {
        Self {
            library_entries: true,
            categories: true,
            app_settings: true,
            source_settings: true,
            extension_repos: true,
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.library_entries
            || self.categories
            || self.app_settings
            || self.source_settings
            || self.extension_repos)
    }

    /// Library aggregates go stale when entries or categories change.
    pub fn needs_library_refresh(&self) -> bool {
        self.library_entries || self.categories
    }
}

/// Everything the summary pass keeps. Library entries are only counted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RestoreSummary {
    pub manga_count: usize,
    pub categories: Vec<BackupCategory>,
    pub sources: Vec<BackupSource>,
    pub preferences: Vec<BackupPreference>,
    pub source_preferences: Vec<BackupSourcePreferences>,
    pub extension_repos: Vec<BackupExtensionRepos>,
}

impl RestoreSummary {
    /// Run the summary pass over `source`.
    pub fn read(source: &dyn ContainerSource) -> BackupResult<Self> {
        let (_, payload) = open_payload(source)?;
        let mut summary = RestoreSummary::default();

        FieldReader::new(payload).for_each_field::<BackupError, _>(|number, data| {
            match number {
                field::MANGA => summary.manga_count += 1,
                field::CATEGORY => summary.categories.push(BackupCategory::decode(data)?),
                field::SOURCE => summary.sources.push(BackupSource::decode(data)?),
                field::PREFERENCE => summary.preferences.push(BackupPreference::decode(data)?),
                field::SOURCE_PREFERENCE => summary
                    .source_preferences
                    .push(BackupSourcePreferences::decode(data)?),
                field::EXTENSION_REPO => summary
                    .extension_repos
                    .push(BackupExtensionRepos::decode(data)?),
                _ => {}
            }
            Ok(())
        })?;

        Ok(summary)
    }

    /// Units of work a restore with `options` will report.
    pub fn total_for(&self, options: &RestoreOptions) -> usize {
        let mut total = 0;
        if options.library_entries {
            total += self.manga_count;
        }
        if options.categories {
            total += 1;
        }
        if options.app_settings {
            total += 1;
        }
        if options.source_settings {
            total += 1;
        }
        if options.extension_repos {
            total += self.extension_repos.len();
        }
        total
    }

    /// Source id -> name as recorded in the backup.
    pub fn source_names(&self) -> HashMap<i64, String> {
        self.sources
            .iter()
            .map(|s| (s.source_id, s.name.clone()))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RestoreOutcome {
    Completed(RestoreReport),
    /// Stopped by the cancellation token. Work finished before the stop is kept.
    Cancelled { progress: ProgressState, error_count: usize },
}

/// Shared handles for one restore run.
#[derive(Clone)]
struct RestoreRun {
    library: Arc<dyn LibraryStore>,
    preferences: Arc<dyn PreferenceStore>,
    summary: Arc<RestoreSummary>,
    progress: Arc<RestoreProgress>,
    errors: Arc<ErrorLog>,
    cancel: CancellationToken,
}

impl RestoreRun {
    /// Run one blocking section restore and count it. A cancelled run does not
    /// start the section.
    async fn section<F>(&self, label: &'static str, work: F) -> BackupResult<()>
    where
        F: FnOnce() -> StoreResult<()> + Send + 'static,
    {
        if self.cancel.is_cancelled() {
            tracing::debug!(section = label, "cancelled before section start");
            return Ok(());
        }
        tokio::task::spawn_blocking(work)
            .await?
            .map_err(|e| BackupError::store(format!("restoring {label}"), e))?;
        self.progress.increment_and_report(label)?;
        Ok(())
    }

    async fn restore_categories_then_app_settings(
        self,
        options: RestoreOptions,
    ) -> BackupResult<()> {
        if options.categories {
            let restorer = CategoriesRestorer::new(self.library.clone(), self.preferences.clone());
            let summary = self.summary.clone();
            self.section(CATEGORIES_LABEL, move || restorer.restore(&summary.categories))
                .await?;
        }
        if options.app_settings {
            let restorer = PreferenceRestorer::new(self.library.clone(), self.preferences.clone());
            let summary = self.summary.clone();
            let with_categories = options.categories;
            self.section(APP_SETTINGS_LABEL, move || {
                let categories = with_categories.then_some(summary.categories.as_slice());
                restorer.restore_app(&summary.preferences, categories)
            })
            .await?;
        }
        Ok(())
    }

    async fn restore_source_settings(self) -> BackupResult<()> {
        let restorer = PreferenceRestorer::new(self.library.clone(), self.preferences.clone());
        let summary = self.summary.clone();
        self.section(SOURCE_SETTINGS_LABEL, move || {
            restorer.restore_source(&summary.source_preferences)
        })
        .await
    }

    /// Repos are restored one by one; a failing repo is logged and skipped.
    async fn restore_extension_repos(self) -> BackupResult<()> {
        let run = self;
        tokio::task::spawn_blocking(move || -> BackupResult<()> {
            let restorer = ExtensionRepoRestorer::new(run.library.clone());
            for repo in &run.summary.extension_repos {
                if run.cancel.is_cancelled() {
                    break;
                }
                if let Err(e) = restorer.restore(repo) {
                    run.errors.record(format!("Error Adding Repo: {} : {}", repo.name, e));
                }
                run.progress.increment_and_report(EXTENSION_REPOS_LABEL)?;
            }
            Ok(())
        })
        .await?
    }

    /// Second pass: restore library entries in container order.
    ///
    /// Returns `true` when the pass stopped on cancellation.
    fn restore_manga_stream(
        &self,
        source: &dyn ContainerSource,
        categories: &[BackupCategory],
    ) -> BackupResult<bool> {
        let source_names = self.summary.source_names();
        let (_, payload) = open_payload(source)?;
        let mut reader = FieldReader::new(payload);
        let mut index = 0usize;

        while let Some(record) = reader.next_field()? {
            if record.number != field::MANGA {
                continue;
            }
            if self.cancel.is_cancelled() {
                tracing::info!(restored = index, "library restore cancelled");
                return Ok(true);
            }
            index += 1;

            let label = match BackupManga::decode(record.payload) {
                Ok(manga) => {
                    if let Err(e) = self.library.restore_manga(&manga, categories) {
                        let source_name = source_names
                            .get(&manga.source)
                            .cloned()
                            .unwrap_or_else(|| manga.source.to_string());
                        self.errors.record(format!("{} [{}]: {}", manga.title, source_name, e));
                    }
                    manga.title
                }
                Err(e) => {
                    let label = format!("Library entry #{index}");
                    self.errors.record(format!("{label}: {e}"));
                    label
                }
            };
            self.progress.increment_and_report(&label)?;
        }
        Ok(false)
    }

    fn cancelled(&self) -> RestoreOutcome {
        RestoreOutcome::Cancelled {
            progress: self.progress.snapshot(),
            error_count: self.errors.len(),
        }
    }
}

/// Restores backups into a library and preference store.
pub struct BackupRestorer {
    library: Arc<dyn LibraryStore>,
    preferences: Arc<dyn PreferenceStore>,
    observer: Arc<dyn RestoreObserver>,
    error_log_dir: PathBuf,
    error_log_name: String,
}

impl BackupRestorer {
    pub fn new(
        library: Arc<dyn LibraryStore>,
        preferences: Arc<dyn PreferenceStore>,
        observer: Arc<dyn RestoreObserver>,
        error_log_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            library,
            preferences,
            observer,
            error_log_dir: error_log_dir.into(),
            error_log_name: ERROR_LOG_FILE_NAME.to_string(),
        }
    }

    pub fn with_error_log_name(mut self, name: impl Into<String>) -> Self {
        self.error_log_name = name.into();
        self
    }

    /// Restore the sections selected by `options` from `source`.
    ///
    /// Container-level failures (malformed data, legacy format) and failures
    /// of the categories or preference sections are returned as errors. Per
    /// entry failures are collected in the error log instead.
    pub async fn restore(
        &self,
        source: Arc<dyn ContainerSource>,
        options: RestoreOptions,
        cancel: CancellationToken,
    ) -> BackupResult<RestoreOutcome> {
        let span = tracing::info_span!(
            "restore",
            run_id = %Uuid::new_v4(),
            container = %source.describe()
        );
        self.run(source, options, cancel).instrument(span).await
    }

    async fn run(
        &self,
        source: Arc<dyn ContainerSource>,
        options: RestoreOptions,
        cancel: CancellationToken,
    ) -> BackupResult<RestoreOutcome> {
        let started = Instant::now();
        tracing::info!(?options, "restore started");

        let summary = {
            let source = source.clone();
            tokio::task::spawn_blocking(move || RestoreSummary::read(source.as_ref())).await??
        };
        let total = summary.total_for(&options);
        tracing::info!(manga = summary.manga_count, total, "backup summary read");

        let run = RestoreRun {
            library: self.library.clone(),
            preferences: self.preferences.clone(),
            summary: Arc::new(summary),
            progress: Arc::new(RestoreProgress::new(total, self.observer.clone())),
            errors: Arc::new(ErrorLog::new()),
            cancel,
        };

        if let Err(e) = self.restore_sections(&run, options).await {
            if !run.errors.is_empty() {
                tracing::warn!(
                    errors = run.errors.len(),
                    "restore aborted, recorded item errors are not written to the error log"
                );
            }
            return Err(e);
        }
        if run.cancel.is_cancelled() {
            return Ok(run.cancelled());
        }

        if options.library_entries {
            let manga_run = run.clone();
            let categories = if options.categories {
                run.summary.categories.clone()
            } else {
                Vec::new()
            };
            let stopped = tokio::task::spawn_blocking(move || {
                manga_run.restore_manga_stream(source.as_ref(), &categories)
            })
            .await??;
            if stopped {
                return Ok(run.cancelled());
            }
        }

        if options.needs_library_refresh() {
            let library = self.library.clone();
            match tokio::task::spawn_blocking(move || library.refresh_library()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(error = %e, "library refresh failed"),
                Err(e) => tracing::warn!(error = %e, "library refresh task failed"),
            }
        }

        let elapsed = started.elapsed();
        let error_log = {
            let errors = run.errors.clone();
            let dir = self.error_log_dir.clone();
            let name = self.error_log_name.clone();
            tokio::task::spawn_blocking(move || errors.write_to(&dir, &name))
                .await
                .unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "error log task failed");
                    None
                })
        };

        let progress = run.progress.snapshot();
        let report = RestoreReport {
            elapsed,
            error_count: run.errors.len(),
            error_log,
            completed: progress.completed,
            total: progress.total,
        };
        self.observer.on_complete(&report);
        Ok(RestoreOutcome::Completed(report))
    }

    /// Restore the in-memory sections, joining every task before returning.
    /// Sibling sections keep running when one fails; the first failure is
    /// returned once all have finished.
    async fn restore_sections(
        &self,
        run: &RestoreRun,
        options: RestoreOptions,
    ) -> BackupResult<()> {
        let mut sections: JoinSet<BackupResult<()>> = JoinSet::new();

        if options.categories || options.app_settings {
            sections.spawn(run.clone().restore_categories_then_app_settings(options));
        }
        if options.source_settings {
            sections.spawn(run.clone().restore_source_settings());
        }
        if options.extension_repos {
            sections.spawn(run.clone().restore_extension_repos());
        }

        let mut first_failure = None;
        while let Some(joined) = sections.join_next().await {
            let result = joined.map_err(BackupError::from).and_then(|r| r);
            if let Err(e) = result {
                tracing::warn!(error = %e, "section restore failed");
                first_failure.get_or_insert(e);
            }
        }
        match first_failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn totals_follow_selected_sections() {
        let summary = RestoreSummary {
            manga_count: 5,
            extension_repos: vec![BackupExtensionRepos::default(), BackupExtensionRepos::default()],
            ..Default::default()
        };

        assert_eq!(summary.total_for(&RestoreOptions::default()), 0);
        assert_eq!(summary.total_for(&RestoreOptions::all()), 5 + 1 + 1 + 1 + 2);
        let library_only = RestoreOptions {
            library_entries: true,
            ..Default::default()
        };
        assert_eq!(summary.total_for(&library_only), 5);
    }

    #[test]
    fn refresh_needed_only_for_library_or_categories() {
        assert!(!RestoreOptions::default().needs_library_refresh());
        assert!(RestoreOptions::default().is_empty());
        let categories = RestoreOptions {
            categories: true,
            ..Default::default()
        };
        assert!(categories.needs_library_refresh());
        let settings = RestoreOptions {
            app_settings: true,
            ..Default::default()
        };
        assert!(!settings.needs_library_refresh());
    }
}
