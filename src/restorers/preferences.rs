use crate::library_store::{LibraryStore, PreferenceStore, StoreResult, APP_NAMESPACE};
use crate::models::{
    BackupCategory, BackupPreference, BackupSourcePreferences, PreferenceKind, StringSet,
};
use std::collections::HashMap;
use std::sync::Arc;

/// App preferences whose values are sets of category ids.
pub const CATEGORY_SET_KEYS: [&str; 2] =
    ["library_update_categories", "library_update_categories_exclude"];

pub struct PreferenceRestorer {
    library: Arc<dyn LibraryStore>,
    preferences: Arc<dyn PreferenceStore>,
}

/// Backup category id -> store category id, joined on category name.
struct CategoryIdMap(HashMap<String, String>);

impl CategoryIdMap {
    fn remap(&self, set: &StringSet) -> StringSet {
        let mut values: Vec<String> = set
            .values
            .iter()
            .filter_map(|backup_id| self.0.get(backup_id).cloned())
            .collect();
        values.sort();
        values.dedup();
        StringSet { values }
    }
}

impl PreferenceRestorer {
    pub fn new(library: Arc<dyn LibraryStore>, preferences: Arc<dyn PreferenceStore>) -> Self {
        Self { library, preferences }
    }

    /// Restore application preferences.
    ///
    /// `backup_categories` is `Some` only when categories were restored in the
    /// same run; category-set preferences are then translated to the ids the
    /// store assigned.
    pub fn restore_app(
        &self,
        preferences: &[BackupPreference],
        backup_categories: Option<&[BackupCategory]>,
    ) -> StoreResult<()> {
        let category_ids = match backup_categories {
            Some(backup) => Some(self.category_id_map(backup)?),
            None => None,
        };
        self.restore_into(APP_NAMESPACE, preferences, category_ids.as_ref())
    }

    /// Restore each source's preferences into its own namespace.
    pub fn restore_source(&self, preferences: &[BackupSourcePreferences]) -> StoreResult<()> {
        for source in preferences {
            self.restore_into(&source.source_key, &source.prefs, None)?;
        }
        Ok(())
    }

    fn category_id_map(&self, backup: &[BackupCategory]) -> StoreResult<CategoryIdMap> {
        let by_name: HashMap<String, i64> = self
            .library
            .categories()?
            .into_iter()
            .map(|c| (c.name, c.id))
            .collect();
        let map = backup
            .iter()
            .filter_map(|c| by_name.get(&c.name).map(|id| (c.id.to_string(), id.to_string())))
            .collect();
        Ok(CategoryIdMap(map))
    }

    fn restore_into(
        &self,
        namespace: &str,
        preferences: &[BackupPreference],
        category_ids: Option<&CategoryIdMap>,
    ) -> StoreResult<()> {
        let mut written = 0usize;
        for preference in preferences {
            let Some(kind) = preference.value.as_ref().and_then(|v| v.kind.as_ref()) else {
                tracing::debug!(
                    namespace,
                    key = %preference.key,
                    "preference without value skipped"
                );
                continue;
            };

            if matches!(kind, PreferenceKind::Float(v) if !v.is_finite()) {
                tracing::debug!(
                    namespace,
                    key = %preference.key,
                    "non-finite float preference skipped"
                );
                continue;
            }

            // Never overwrite a key that holds a different type.
            if let Some(current) = self.preferences.get(namespace, &preference.key)? {
                if !current.same_type(kind) {
                    tracing::debug!(
                        namespace,
                        key = %preference.key,
                        "preference type mismatch skipped"
                    );
                    continue;
                }
            }

            let value = match kind {
                PreferenceKind::Int(_)
                | PreferenceKind::Long(_)
                | PreferenceKind::Float(_)
                | PreferenceKind::String(_)
                | PreferenceKind::Boolean(_) => kind.clone(),
                PreferenceKind::StringSet(set) => match category_ids {
                    Some(ids) if CATEGORY_SET_KEYS.contains(&preference.key.as_str()) => {
                        PreferenceKind::StringSet(ids.remap(set))
                    }
                    _ => PreferenceKind::StringSet(set.clone()),
                },
            };
            self.preferences.set(namespace, &preference.key, value)?;
            written += 1;
        }
        tracing::debug!(namespace, written, "preferences restored");
        Ok(())
    }
}
