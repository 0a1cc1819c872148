use crate::library_store::{
    Category, LibraryStore, PreferenceStore, StoreResult, APP_NAMESPACE, CATEGORIZED_DISPLAY_KEY,
};
use crate::models::{BackupCategory, PreferenceKind, CONTENT_TYPE_ALL};
use std::collections::BTreeSet;
use std::sync::Arc;

pub struct CategoriesRestorer {
    library: Arc<dyn LibraryStore>,
    preferences: Arc<dyn PreferenceStore>,
}

impl CategoriesRestorer {
    pub fn new(library: Arc<dyn LibraryStore>, preferences: Arc<dyn PreferenceStore>) -> Self {
        Self { library, preferences }
    }

    /// Insert the backup categories the store does not have yet.
    ///
    /// New categories are appended after the highest existing order, in
    /// backup order.
    pub fn restore(&self, backup_categories: &[BackupCategory]) -> StoreResult<()> {
        if backup_categories.is_empty() {
            return Ok(());
        }

        let mut known = self.library.categories()?;
        let mut next_order = known.iter().map(|c| c.order).max().map_or(0, |max| max + 1);

        let mut sorted: Vec<&BackupCategory> = backup_categories.iter().collect();
        sorted.sort_by_key(|c| c.order);

        let mut inserted = 0usize;
        for backup in sorted {
            if find_existing(&known, backup).is_some() {
                continue;
            }
            let category = self
                .library
                .insert_category(&backup.name, next_order, backup.flags, backup.content_type)?;
            next_order += 1;
            inserted += 1;
            known.push(category);
        }

        let distinct_flags: BTreeSet<i64> = known.iter().map(|c| c.flags).collect();
        self.preferences.set(
            APP_NAMESPACE,
            CATEGORIZED_DISPLAY_KEY,
            PreferenceKind::Boolean(distinct_flags.len() > 1),
        )?;

        tracing::debug!(inserted, total = known.len(), "categories restored");
        Ok(())
    }
}

fn find_existing<'a>(known: &'a [Category], backup: &BackupCategory) -> Option<&'a Category> {
    known.iter().find(|c| {
        c.name == backup.name
            && (backup.content_type == CONTENT_TYPE_ALL || c.content_type == backup.content_type)
    })
}
