//! Read-only dependency check of a backup
//!
//! Walks the container once, collecting only source records and the tracker
//! ids referenced by library entries, and reports which of them this install
//! cannot serve. Nothing is written.

use crate::container::{open_payload, ContainerSource};
use crate::errors::{BackupError, BackupResult};
use crate::models::{field, BackupManga, BackupSource};
use crate::wire::FieldReader;
use prost::Message;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Sources installed in the app.
pub trait SourceRegistry: Send + Sync {
    fn contains(&self, source_id: i64) -> bool;

    /// Display name for a source that is not installed.
    fn stub_name(&self, source_id: i64) -> String {
        source_id.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerStatus {
    pub name: String,
    pub logged_in: bool,
}

/// Trackers the app knows about.
pub trait TrackerRegistry: Send + Sync {
    fn get(&self, tracker_id: i64) -> Option<TrackerStatus>;
}

/// What a backup needs that this install lacks. Both lists are sorted and
/// free of duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub missing_sources: Vec<String>,
    pub missing_trackers: Vec<String>,
}

impl ValidationReport {
    pub fn is_complete(&self) -> bool {
        self.missing_sources.is_empty() && self.missing_trackers.is_empty()
    }
}

pub struct BackupValidator<'a> {
    sources: &'a dyn SourceRegistry,
    trackers: &'a dyn TrackerRegistry,
}

impl<'a> BackupValidator<'a> {
    pub fn new(sources: &'a dyn SourceRegistry, trackers: &'a dyn TrackerRegistry) -> Self {
        Self { sources, trackers }
    }

    /// Check `source` for missing sources and trackers.
    ///
    /// Any failure to read the container is fatal and wrapped in
    /// [`BackupError::Validation`].
    pub fn validate(&self, source: &dyn ContainerSource) -> BackupResult<ValidationReport> {
        let (backup_sources, tracker_ids) =
            collect_references(source).map_err(BackupError::validation)?;
        Ok(self.report(backup_sources, tracker_ids))
    }

    fn report(
        &self,
        backup_sources: BTreeMap<i64, String>,
        tracker_ids: BTreeSet<i64>,
    ) -> ValidationReport {
        let missing_sources: BTreeSet<String> = backup_sources
            .into_iter()
            .filter(|(id, _)| !self.sources.contains(*id))
            .map(|(_, name)| match name.parse::<i64>() {
                // Sources recorded without a real name carry their id instead.
                Ok(id) => self.sources.stub_name(id),
                Err(_) => name,
            })
            .collect();

        let missing_trackers: BTreeSet<String> = tracker_ids
            .into_iter()
            .filter_map(|id| self.trackers.get(id))
            .filter(|tracker| !tracker.logged_in)
            .map(|tracker| tracker.name)
            .collect();

        ValidationReport {
            missing_sources: missing_sources.into_iter().collect(),
            missing_trackers: missing_trackers.into_iter().collect(),
        }
    }
}

type References = (BTreeMap<i64, String>, BTreeSet<i64>);

fn collect_references(source: &dyn ContainerSource) -> BackupResult<References> {
    let (_, payload) = open_payload(source)?;
    let mut backup_sources = BTreeMap::new();
    let mut tracker_ids = BTreeSet::new();

    FieldReader::new(payload).for_each_field::<BackupError, _>(|number, data| {
        match number {
            field::MANGA => {
                let manga = BackupManga::decode(data)?;
                tracker_ids.extend(manga.tracking.iter().map(|t| i64::from(t.sync_id)));
            }
            field::SOURCE => {
                let record = BackupSource::decode(data)?;
                backup_sources.insert(record.source_id, record.name);
            }
            _ => {}
        }
        Ok(())
    })?;

    tracing::debug!(
        sources = backup_sources.len(),
        trackers = tracker_ids.len(),
        "collected backup references"
    );
    Ok((backup_sources, tracker_ids))
}
