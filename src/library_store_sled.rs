use crate::library_store::{
    Category, ExtensionRepo, LibraryStore, PreferenceStore, StoreError, StoreResult,
};
use crate::models::{BackupCategory, BackupManga, PreferenceKind};
use serde::{Deserialize, Serialize};
use sled::Db;
use std::collections::BTreeMap;
use std::path::Path;

const CATEGORIES_TREE: &str = "categories";
const MANGA_TREE: &str = "manga";
const REPOS_TREE: &str = "extension_repos";
const PREFERENCES_TREE: &str = "preferences";
const LIBRARY_CACHE_TREE: &str = "library_cache";
const LIBRARY_COUNTS_KEY: &[u8] = b"category_counts";

/// Cache key for favorites without any category.
pub const UNCATEGORIZED: &str = "uncategorized";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredChapter {
    pub url: String,
    pub name: String,
    pub scanlator: Option<String>,
    pub read: bool,
    pub bookmark: bool,
    pub last_page_read: i64,
    pub date_fetch: i64,
    pub date_upload: i64,
    pub chapter_number: f32,
    pub source_order: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredTrack {
    pub sync_id: i32,
    pub media_id: i64,
    pub title: String,
    pub tracking_url: String,
    pub status: i32,
    pub score: f32,
    pub last_chapter_read: f32,
    pub total_chapters: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredHistory {
    pub url: String,
    pub last_read: i64,
    pub read_duration: i64,
}

/// A library entry as persisted by [`SledLibraryStore`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredManga {
    pub source: i64,
    pub url: String,
    pub title: String,
    pub artist: Option<String>,
    pub author: Option<String>,
    pub description: Option<String>,
    pub genre: Vec<String>,
    pub status: i32,
    pub thumbnail_url: Option<String>,
    pub favorite: bool,
    pub date_added: i64,
    pub viewer: i32,
    pub chapter_flags: i32,
    pub notes: String,
    pub category_ids: Vec<i64>,
    pub chapters: Vec<StoredChapter>,
    pub tracking: Vec<StoredTrack>,
    pub history: Vec<StoredHistory>,
}

/// A sled-backed library, one tree per concern, values stored as JSON.
pub struct SledLibraryStore {
    db: Db,
}

impl SledLibraryStore {
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    fn tree(&self, name: &str) -> StoreResult<sled::Tree> {
        Ok(self.db.open_tree(name)?)
    }

    fn manga_key(source: i64, url: &str) -> Vec<u8> {
        let mut key = source.to_be_bytes().to_vec();
        key.extend_from_slice(url.as_bytes());
        key
    }

    fn preference_key(namespace: &str, key: &str) -> Vec<u8> {
        format!("{namespace}\u{0}{key}").into_bytes()
    }

    /// Load one stored entry.
    pub fn manga(&self, source: i64, url: &str) -> StoreResult<Option<StoredManga>> {
        match self.tree(MANGA_TREE)?.get(Self::manga_key(source, url))? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Number of stored entries.
    pub fn manga_count(&self) -> StoreResult<usize> {
        Ok(self.tree(MANGA_TREE)?.len())
    }

    /// Favorite counts per category id, as of the last refresh.
    pub fn library_counts(&self) -> StoreResult<BTreeMap<String, u64>> {
        match self.tree(LIBRARY_CACHE_TREE)?.get(LIBRARY_COUNTS_KEY)? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(BTreeMap::new()),
        }
    }

    pub fn flush(&self) -> StoreResult<()> {
        self.db.flush()?;
        Ok(())
    }

    fn resolve_category_ids(
        &self,
        manga: &BackupManga,
        backup_categories: &[BackupCategory],
    ) -> StoreResult<Vec<i64>> {
        if manga.categories.is_empty() {
            return Ok(Vec::new());
        }
        let by_name: BTreeMap<String, i64> = self
            .categories()?
            .into_iter()
            .map(|c| (c.name, c.id))
            .collect();

        let mut ids: Vec<i64> = manga
            .categories
            .iter()
            .filter_map(|order| backup_categories.iter().find(|c| c.order == *order))
            .filter_map(|c| by_name.get(&c.name).copied())
            .collect();
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }
}

fn merge_chapters(existing: &mut Vec<StoredChapter>, manga: &BackupManga) {
    for chapter in &manga.chapters {
        match existing.iter_mut().find(|c| c.url == chapter.url) {
            Some(stored) => {
                stored.read |= chapter.read;
                stored.bookmark |= chapter.bookmark;
                stored.last_page_read = stored.last_page_read.max(chapter.last_page_read);
            }
            None => existing.push(StoredChapter {
                url: chapter.url.clone(),
                name: chapter.name.clone(),
                scanlator: chapter.scanlator.clone(),
                read: chapter.read,
                bookmark: chapter.bookmark,
                last_page_read: chapter.last_page_read,
                date_fetch: chapter.date_fetch,
                date_upload: chapter.date_upload,
                chapter_number: chapter.chapter_number,
                source_order: chapter.source_order,
            }),
        }
    }
}

fn merge_tracking(existing: &mut Vec<StoredTrack>, manga: &BackupManga) {
    for track in &manga.tracking {
        let incoming = StoredTrack {
            sync_id: track.sync_id,
            media_id: track.media_id,
            title: track.title.clone(),
            tracking_url: track.tracking_url.clone(),
            status: track.status,
            score: track.score,
            last_chapter_read: track.last_chapter_read,
            total_chapters: track.total_chapters,
        };
        match existing.iter_mut().find(|t| t.sync_id == track.sync_id) {
            Some(stored) if stored.last_chapter_read < incoming.last_chapter_read => {
                *stored = incoming
            }
            Some(_) => {}
            None => existing.push(incoming),
        }
    }
}

fn merge_history(existing: &mut Vec<StoredHistory>, manga: &BackupManga) {
    for entry in &manga.history {
        match existing.iter_mut().find(|h| h.url == entry.url) {
            Some(stored) => {
                stored.last_read = stored.last_read.max(entry.last_read);
                stored.read_duration = stored.read_duration.max(entry.read_duration);
            }
            None => existing.push(StoredHistory {
                url: entry.url.clone(),
                last_read: entry.last_read,
                read_duration: entry.read_duration,
            }),
        }
    }
}

impl LibraryStore for SledLibraryStore {
    fn categories(&self) -> StoreResult<Vec<Category>> {
        let mut categories = self
            .tree(CATEGORIES_TREE)?
            .iter()
            .values()
            .map(|bytes| -> StoreResult<Category> { Ok(serde_json::from_slice(&bytes?)?) })
            .collect::<StoreResult<Vec<_>>>()?;
        categories.sort_by_key(|c| c.order);
        Ok(categories)
    }

    fn insert_category(
        &self,
        name: &str,
        order: i64,
        flags: i64,
        content_type: i32,
    ) -> StoreResult<Category> {
        let category = Category {
            id: self.db.generate_id()? as i64 + 1,
            name: name.to_string(),
            order,
            flags,
            content_type,
        };
        self.tree(CATEGORIES_TREE)?
            .insert(category.id.to_be_bytes(), serde_json::to_vec(&category)?)?;
        Ok(category)
    }

    fn restore_manga(
        &self,
        manga: &BackupManga,
        backup_categories: &[BackupCategory],
    ) -> StoreResult<()> {
        if manga.url.is_empty() {
            return Err(StoreError::Rejected(format!("'{}' has no url", manga.title)));
        }

        let category_ids = self.resolve_category_ids(manga, backup_categories)?;
        let mut stored = match self.manga(manga.source, &manga.url)? {
            Some(existing) => StoredManga {
                title: manga.title.clone(),
                artist: manga.artist.clone().or(existing.artist.clone()),
                author: manga.author.clone().or(existing.author.clone()),
                description: manga.description.clone().or(existing.description.clone()),
                thumbnail_url: manga.thumbnail_url.clone().or(existing.thumbnail_url.clone()),
                favorite: existing.favorite || manga.favorite,
                date_added: match (existing.date_added, manga.date_added) {
                    (0, added) | (added, 0) => added,
                    (a, b) => a.min(b),
                },
                ..existing
            },
            None => StoredManga {
                source: manga.source,
                url: manga.url.clone(),
                title: manga.title.clone(),
                artist: manga.artist.clone(),
                author: manga.author.clone(),
                description: manga.description.clone(),
                genre: manga.genre.clone(),
                status: manga.status,
                thumbnail_url: manga.thumbnail_url.clone(),
                favorite: manga.favorite,
                date_added: manga.date_added,
                viewer: manga.viewer,
                chapter_flags: manga.chapter_flags,
                notes: manga.notes.clone(),
                category_ids: Vec::new(),
                chapters: Vec::new(),
                tracking: Vec::new(),
                history: Vec::new(),
            },
        };

        stored.category_ids.extend(category_ids);
        stored.category_ids.sort_unstable();
        stored.category_ids.dedup();
        merge_chapters(&mut stored.chapters, manga);
        merge_tracking(&mut stored.tracking, manga);
        merge_history(&mut stored.history, manga);

        self.tree(MANGA_TREE)?
            .insert(Self::manga_key(manga.source, &manga.url), serde_json::to_vec(&stored)?)?;
        Ok(())
    }

    fn extension_repos(&self) -> StoreResult<Vec<ExtensionRepo>> {
        self.tree(REPOS_TREE)?
            .iter()
            .values()
            .map(|bytes| -> StoreResult<ExtensionRepo> { Ok(serde_json::from_slice(&bytes?)?) })
            .collect()
    }

    fn insert_extension_repo(&self, repo: ExtensionRepo) -> StoreResult<()> {
        let tree = self.tree(REPOS_TREE)?;
        let value = serde_json::to_vec(&repo)?;
        // Compare-and-swap so a concurrent insert of the same url is a conflict.
        tree.compare_and_swap(repo.base_url.as_bytes(), None as Option<&[u8]>, Some(value))?
            .map_err(|_| StoreError::Conflict(format!("{} is already registered", repo.base_url)))
    }

    fn refresh_library(&self) -> StoreResult<()> {
        let mut counts: BTreeMap<String, u64> = BTreeMap::new();
        for value in self.tree(MANGA_TREE)?.iter().values() {
            let manga: StoredManga = serde_json::from_slice(&value?)?;
            if !manga.favorite {
                continue;
            }
            if manga.category_ids.is_empty() {
                *counts.entry(UNCATEGORIZED.to_string()).or_default() += 1;
            }
            for id in &manga.category_ids {
                *counts.entry(id.to_string()).or_default() += 1;
            }
        }
        self.tree(LIBRARY_CACHE_TREE)?
            .insert(LIBRARY_COUNTS_KEY, serde_json::to_vec(&counts)?)?;
        tracing::debug!(categories = counts.len(), "library cache refreshed");
        Ok(())
    }
}

impl PreferenceStore for SledLibraryStore {
    fn get(&self, namespace: &str, key: &str) -> StoreResult<Option<PreferenceKind>> {
        match self.tree(PREFERENCES_TREE)?.get(Self::preference_key(namespace, key))? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn set(&self, namespace: &str, key: &str, value: PreferenceKind) -> StoreResult<()> {
        // JSON has no encoding for NaN or infinities; they would read back as null.
        if let PreferenceKind::Float(v) = value {
            if !v.is_finite() {
                let reason = format!("{namespace}/{key}: non-finite float {v}");
                return Err(StoreError::Rejected(reason));
            }
        }
        self.tree(PREFERENCES_TREE)?
            .insert(Self::preference_key(namespace, key), serde_json::to_vec(&value)?)?;
        Ok(())
    }
}
