use super::test_utils::*;
use crate::backup_restorer::{
    RestoreOptions, RestoreOutcome, APP_SETTINGS_LABEL, CATEGORIES_LABEL, EXTENSION_REPOS_LABEL,
    SOURCE_SETTINGS_LABEL,
};
use crate::container::{ContainerSource, MemoryContainer};
use crate::errors::BackupError;
use crate::library_store::{LibraryStore, PreferenceStore, APP_NAMESPACE};
use crate::models::{
    field, Backup, BackupExtensionRepos, BackupPreference, BackupSourcePreferences, PreferenceKind,
    PreferenceValue, StringSet,
};
use crate::wire::write_length_delimited;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn library_only() -> RestoreOptions {
    RestoreOptions {
        library_entries: true,
        ..Default::default()
    }
}

fn five_manga_with_broken_third() -> Backup {
    let mut broken = manga("Third", 7);
    broken.url.clear();
    Backup {
        backup_manga: vec![
            manga("First", 7),
            manga("Second", 7),
            broken,
            manga("Fourth", 7),
            manga("Fifth", 7),
        ],
        backup_sources: vec![source(7, "Foo")],
        ..Default::default()
    }
}

fn repo(url: &str, name: &str, fingerprint: &str) -> BackupExtensionRepos {
    BackupExtensionRepos {
        base_url: url.to_string(),
        name: name.to_string(),
        short_name: None,
        website: url.to_string(),
        signing_key_fingerprint: fingerprint.to_string(),
    }
}

fn pref(key: &str, kind: PreferenceKind) -> BackupPreference {
    BackupPreference {
        key: key.to_string(),
        value: Some(PreferenceValue { kind: Some(kind) }),
    }
}

#[tokio::test]
async fn failing_entry_is_logged_and_skipped() {
    let harness = Harness::new();
    let outcome = harness
        .restorer()
        .restore(
            container(&five_manga_with_broken_third(), true),
            library_only(),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    let RestoreOutcome::Completed(report) = outcome else {
        panic!("restore was not completed");
    };
    assert_eq!(report.error_count, 1);
    assert_eq!((report.completed, report.total), (5, 5));
    assert_eq!(harness.store.manga_count().unwrap(), 4);

    let log_path = report.error_log.expect("error log written");
    let log = std::fs::read_to_string(log_path).unwrap();
    assert_eq!(log.lines().count(), 1);
    assert!(log.contains("Third [Foo]:"), "unexpected log: {log}");

    assert_eq!(harness.observer.completed_counts(), vec![1, 2, 3, 4, 5]);
    assert_eq!(harness.observer.labels()[2], "Third");
    assert_eq!(harness.observer.reports.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn cancellation_stops_before_next_entry() {
    let cancel = CancellationToken::new();
    let harness = Harness::with_observer(RecordingObserver::cancelling_at(2, cancel.clone()));
    let backup = Backup {
        backup_manga: (1..=5).map(|i| manga(&format!("Entry {i}"), 7)).collect(),
        ..Default::default()
    };

    let outcome = harness
        .restorer()
        .restore(container(&backup, false), library_only(), cancel)
        .await
        .unwrap();

    match outcome {
        RestoreOutcome::Cancelled { progress, error_count } => {
            assert_eq!(progress.completed, 2);
            assert_eq!(progress.total, 5);
            assert_eq!(error_count, 0);
        }
        other => panic!("expected cancellation, got {other:?}"),
    }
    assert_eq!(harness.store.manga_count().unwrap(), 2);
    assert!(harness.observer.reports.lock().unwrap().is_empty());
    assert!(!harness.log_dir().exists());
}

#[tokio::test]
async fn full_restore_orders_categories_before_preferences() {
    let harness = Harness::new();
    let mut tagged = manga("Tagged", 7);
    tagged.categories = vec![0];
    let backup = Backup {
        backup_manga: vec![tagged, manga("Loose", 7)],
        backup_categories: vec![category("Reading", 41, 0)],
        backup_sources: vec![source(7, "Foo")],
        backup_preferences: vec![
            pref(
                "library_update_categories",
                PreferenceKind::StringSet(StringSet {
                    values: vec!["41".into()],
                }),
            ),
            pref("theme", PreferenceKind::String("dark".into())),
        ],
        backup_source_preferences: vec![BackupSourcePreferences {
            source_key: "source_7".into(),
            prefs: vec![pref("quality", PreferenceKind::Int(2))],
        }],
        backup_extension_repo: vec![
            repo("https://a.example", "Alpha", "AA"),
            repo("https://b.example", "Beta", "AA"),
        ],
    };

    let outcome = harness
        .restorer()
        .restore(container(&backup, true), RestoreOptions::all(), CancellationToken::new())
        .await
        .unwrap();
    let RestoreOutcome::Completed(report) = outcome else {
        panic!("restore was not completed");
    };

    // 2 entries + categories + app + source settings + 2 repos
    assert_eq!((report.completed, report.total), (7, 7));
    assert_eq!(report.error_count, 1);
    let log = std::fs::read_to_string(report.error_log.unwrap()).unwrap();
    assert!(log.contains("Error Adding Repo: Beta : Alpha has the same signing key fingerprint"));

    let labels = harness.observer.labels();
    let categories_at = labels.iter().position(|l| l == CATEGORIES_LABEL).unwrap();
    let app_at = labels.iter().position(|l| l == APP_SETTINGS_LABEL).unwrap();
    assert!(categories_at < app_at);
    assert_eq!(&labels[labels.len() - 2..], ["Tagged", "Loose"]);

    let reading = harness.store.categories().unwrap().remove(0);
    assert_eq!(reading.name, "Reading");
    assert_eq!(
        harness.store.get(APP_NAMESPACE, "library_update_categories").unwrap(),
        Some(PreferenceKind::StringSet(StringSet {
            values: vec![reading.id.to_string()]
        }))
    );
    assert_eq!(harness.store.get("source_7", "quality").unwrap(), Some(PreferenceKind::Int(2)));
    assert_eq!(harness.store.extension_repos().unwrap().len(), 1);

    let tagged = harness.store.manga(7, "/manga/tagged").unwrap().unwrap();
    assert_eq!(tagged.category_ids, vec![reading.id]);
    let counts = harness.store.library_counts().unwrap();
    assert_eq!(counts.get(&reading.id.to_string()), Some(&1));
}

#[tokio::test]
async fn nothing_selected_completes_empty() {
    let harness = Harness::new();
    let outcome = harness
        .restorer()
        .restore(
            container(&five_manga_with_broken_third(), true),
            RestoreOptions::default(),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    let RestoreOutcome::Completed(report) = outcome else {
        panic!("restore was not completed");
    };
    assert_eq!((report.completed, report.total, report.error_count), (0, 0, 0));
    assert!(report.error_log.is_none());
    assert_eq!(harness.store.manga_count().unwrap(), 0);
    assert!(harness.observer.progress.lock().unwrap().is_empty());
}

#[tokio::test]
async fn category_failure_aborts_before_library() {
    let harness = Harness::new();
    let flaky = Arc::new(FlakyStore {
        fail_category_inserts: true,
        ..FlakyStore::over(harness.store.clone())
    });
    let backup = Backup {
        backup_manga: vec![manga("Only", 7)],
        backup_categories: vec![category("Reading", 1, 0)],
        backup_preferences: vec![pref("theme", PreferenceKind::String("dark".into()))],
        backup_source_preferences: vec![BackupSourcePreferences {
            source_key: "source_7".into(),
            prefs: vec![pref("quality", PreferenceKind::Int(2))],
        }],
        backup_extension_repo: vec![
            repo("https://a.example", "Alpha", "AA"),
            repo("https://b.example", "Beta", "BB"),
            repo("https://c.example", "Gamma", "AA"),
        ],
        ..Default::default()
    };

    let err = harness
        .restorer_over(flaky)
        .restore(container(&backup, false), RestoreOptions::all(), CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, BackupError::Store { .. }));
    assert_eq!(harness.store.manga_count().unwrap(), 0);
    // App settings are chained after categories and never start.
    assert_eq!(harness.store.get(APP_NAMESPACE, "theme").unwrap(), None);
    assert!(harness.observer.reports.lock().unwrap().is_empty());

    // Sibling sections still run to completion.
    assert_eq!(harness.store.get("source_7", "quality").unwrap(), Some(PreferenceKind::Int(2)));
    assert_eq!(harness.store.extension_repos().unwrap().len(), 2);
    let labels = harness.observer.labels();
    assert_eq!(labels.iter().filter(|l| *l == SOURCE_SETTINGS_LABEL).count(), 1);
    assert_eq!(labels.iter().filter(|l| *l == EXTENSION_REPOS_LABEL).count(), 3);
    // The failed run keeps its item errors out of the error log.
    assert!(!harness.log_dir().exists());
    assert!(!labels.iter().any(|l| l == CATEGORIES_LABEL || l == APP_SETTINGS_LABEL));
}

#[tokio::test]
async fn refresh_failure_does_not_fail_restore() {
    let harness = Harness::new();
    let flaky = Arc::new(FlakyStore {
        fail_refresh: true,
        ..FlakyStore::over(harness.store.clone())
    });
    let backup = Backup {
        backup_manga: vec![manga("Only", 7)],
        backup_categories: vec![category("Reading", 1, 0)],
        ..Default::default()
    };

    let outcome = harness
        .restorer_over(flaky)
        .restore(container(&backup, true), RestoreOptions::all(), CancellationToken::new())
        .await
        .unwrap();

    let RestoreOutcome::Completed(report) = outcome else {
        panic!("restore was not completed");
    };
    assert_eq!(report.error_count, 0);
    assert!(report.error_log.is_none());
    assert_eq!(harness.observer.reports.lock().unwrap().as_slice(), [report]);
    assert_eq!(harness.store.manga_count().unwrap(), 1);
    assert!(harness.store.library_counts().unwrap().is_empty());
}

#[tokio::test]
async fn cancelled_before_start_applies_nothing() {
    let harness = Harness::new();
    let backup = Backup {
        backup_manga: vec![manga("Only", 7)],
        backup_categories: vec![category("Reading", 1, 0)],
        backup_preferences: vec![pref("theme", PreferenceKind::String("dark".into()))],
        backup_source_preferences: vec![BackupSourcePreferences {
            source_key: "source_7".into(),
            prefs: vec![pref("quality", PreferenceKind::Int(2))],
        }],
        backup_extension_repo: vec![repo("https://a.example", "Alpha", "AA")],
        ..Default::default()
    };
    let cancel = CancellationToken::new();
    cancel.cancel();

    let outcome = harness
        .restorer()
        .restore(container(&backup, true), RestoreOptions::all(), cancel)
        .await
        .unwrap();

    match outcome {
        RestoreOutcome::Cancelled { progress, error_count } => {
            assert_eq!(progress.completed, 0);
            assert_eq!(progress.total, 5);
            assert_eq!(error_count, 0);
        }
        other => panic!("expected cancellation, got {other:?}"),
    }
    assert!(harness.store.categories().unwrap().is_empty());
    assert_eq!(harness.store.get(APP_NAMESPACE, "theme").unwrap(), None);
    assert_eq!(harness.store.get("source_7", "quality").unwrap(), None);
    assert!(harness.store.extension_repos().unwrap().is_empty());
    assert_eq!(harness.store.manga_count().unwrap(), 0);
    assert!(harness.observer.progress.lock().unwrap().is_empty());
    assert!(harness.observer.reports.lock().unwrap().is_empty());
}

#[tokio::test]
async fn undecodable_entry_counts_as_item_error() {
    let harness = Harness::new();
    let mut bytes = Vec::new();
    write_length_delimited(&mut bytes, field::MANGA, &[0xff]);
    let good = crate::models::BackupManga {
        source: 3,
        url: "/ok".into(),
        title: "Fine".into(),
        ..Default::default()
    };
    write_length_delimited(&mut bytes, field::MANGA, &prost::Message::encode_to_vec(&good));
    let source: Arc<dyn ContainerSource> = Arc::new(MemoryContainer::new(bytes));

    let outcome = harness
        .restorer()
        .restore(source, library_only(), CancellationToken::new())
        .await
        .unwrap();

    let RestoreOutcome::Completed(report) = outcome else {
        panic!("restore was not completed");
    };
    assert_eq!(report.error_count, 1);
    assert_eq!((report.completed, report.total), (2, 2));
    assert_eq!(harness.observer.labels(), vec!["Library entry #1", "Fine"]);
    assert!(harness.store.manga(3, "/ok").unwrap().is_some());
}

#[tokio::test]
async fn legacy_json_is_rejected_before_any_work() {
    let harness = Harness::new();
    let source: Arc<dyn ContainerSource> =
        Arc::new(MemoryContainer::new(b"{\"version\": 2}".to_vec()));

    let err = harness
        .restorer()
        .restore(source, RestoreOptions::all(), CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, BackupError::LegacyJson));
    assert!(harness.observer.progress.lock().unwrap().is_empty());
}

#[tokio::test]
async fn restoring_twice_does_not_duplicate() {
    let harness = Harness::new();
    let backup = Backup {
        backup_manga: vec![manga("Once", 7)],
        backup_categories: vec![category("Reading", 1, 0)],
        ..Default::default()
    };

    for _ in 0..2 {
        harness
            .restorer()
            .restore(container(&backup, true), RestoreOptions::all(), CancellationToken::new())
            .await
            .unwrap();
    }

    assert_eq!(harness.store.manga_count().unwrap(), 1);
    assert_eq!(harness.store.categories().unwrap().len(), 1);
}
