//! Source and tracker registries backed by configuration

use crate::backup_validator::{SourceRegistry, TrackerRegistry, TrackerStatus};
use crate::config_loader::{BackupConfig, TrackerConfig};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Default)]
pub struct ConfiguredSources {
    installed: HashSet<i64>,
}

impl ConfiguredSources {
    pub fn new(installed: impl IntoIterator<Item = i64>) -> Self {
        Self {
            installed: installed.into_iter().collect(),
        }
    }

    pub fn from_config(config: &BackupConfig) -> Self {
        Self::new(config.installed_sources.iter().copied())
    }
}

impl SourceRegistry for ConfiguredSources {
    fn contains(&self, source_id: i64) -> bool {
        self.installed.contains(&source_id)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConfiguredTrackers {
    trackers: HashMap<i64, TrackerStatus>,
}

impl ConfiguredTrackers {
    pub fn new(trackers: &[TrackerConfig]) -> Self {
        let trackers = trackers
            .iter()
            .map(|t| {
                (
                    t.id,
                    TrackerStatus {
                        name: t.name.clone(),
                        logged_in: t.logged_in,
                    },
                )
            })
            .collect();
        Self { trackers }
    }

    pub fn from_config(config: &BackupConfig) -> Self {
        Self::new(&config.trackers)
    }
}

impl TrackerRegistry for ConfiguredTrackers {
    fn get(&self, tracker_id: i64) -> Option<TrackerStatus> {
        self.trackers.get(&tracker_id).cloned()
    }
}
