//! Backup record schema
//!
//! Field numbers are an append-only contract with every backup ever written.
//! Never renumber a field; retire it and pick a new number instead.

/// Top-level field numbers of a backup container.
pub mod field {
    pub const MANGA: u64 = 1;
    pub const CATEGORY: u64 = 2;
    pub const SOURCE: u64 = 101;
    pub const PREFERENCE: u64 = 104;
    pub const SOURCE_PREFERENCE: u64 = 105;
    pub const EXTENSION_REPO: u64 = 106;
}

/// A fully decoded backup. Only produced by the bounded decoder; the restore
/// path never materializes the manga list.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Backup {
    #[prost(message, repeated, tag = "1")]
    pub backup_manga: Vec<BackupManga>,
    #[prost(message, repeated, tag = "2")]
    pub backup_categories: Vec<BackupCategory>,
    #[prost(message, repeated, tag = "101")]
    pub backup_sources: Vec<BackupSource>,
    #[prost(message, repeated, tag = "104")]
    pub backup_preferences: Vec<BackupPreference>,
    #[prost(message, repeated, tag = "105")]
    pub backup_source_preferences: Vec<BackupSourcePreferences>,
    #[prost(message, repeated, tag = "106")]
    pub backup_extension_repo: Vec<BackupExtensionRepos>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BackupManga {
    #[prost(int64, tag = "1")]
    pub source: i64,
    #[prost(string, tag = "2")]
    pub url: String,
    #[prost(string, tag = "3")]
    pub title: String,
    #[prost(string, optional, tag = "4")]
    pub artist: Option<String>,
    #[prost(string, optional, tag = "5")]
    pub author: Option<String>,
    #[prost(string, optional, tag = "6")]
    pub description: Option<String>,
    #[prost(string, repeated, tag = "7")]
    pub genre: Vec<String>,
    #[prost(int32, tag = "8")]
    pub status: i32,
    #[prost(string, optional, tag = "9")]
    pub thumbnail_url: Option<String>,
    #[prost(int64, tag = "13")]
    pub date_added: i64,
    #[prost(int32, tag = "14")]
    pub viewer: i32,
    #[prost(message, repeated, tag = "16")]
    pub chapters: Vec<BackupChapter>,
    /// Orders of the backup categories this entry belongs to.
    #[prost(int64, repeated, tag = "17")]
    pub categories: Vec<i64>,
    #[prost(message, repeated, tag = "18")]
    pub tracking: Vec<BackupTracking>,
    #[prost(bool, tag = "100")]
    pub favorite: bool,
    #[prost(int32, tag = "101")]
    pub chapter_flags: i32,
    #[prost(message, repeated, tag = "104")]
    pub history: Vec<BackupHistory>,
    #[prost(string, tag = "110")]
    pub notes: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BackupChapter {
    #[prost(string, tag = "1")]
    pub url: String,
    #[prost(string, tag = "2")]
    pub name: String,
    #[prost(string, optional, tag = "3")]
    pub scanlator: Option<String>,
    #[prost(bool, tag = "4")]
    pub read: bool,
    #[prost(bool, tag = "5")]
    pub bookmark: bool,
    #[prost(int64, tag = "6")]
    pub last_page_read: i64,
    #[prost(int64, tag = "7")]
    pub date_fetch: i64,
    #[prost(int64, tag = "8")]
    pub date_upload: i64,
    #[prost(float, tag = "9")]
    pub chapter_number: f32,
    #[prost(int64, tag = "10")]
    pub source_order: i64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BackupTracking {
    /// Tracker identifier, resolved through the tracker registry.
    #[prost(int32, tag = "1")]
    pub sync_id: i32,
    #[prost(int64, tag = "2")]
    pub library_id: i64,
    #[prost(string, tag = "4")]
    pub tracking_url: String,
    #[prost(string, tag = "5")]
    pub title: String,
    #[prost(float, tag = "6")]
    pub last_chapter_read: f32,
    #[prost(int32, tag = "7")]
    pub total_chapters: i32,
    #[prost(float, tag = "8")]
    pub score: f32,
    #[prost(int32, tag = "9")]
    pub status: i32,
    #[prost(int64, tag = "100")]
    pub media_id: i64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BackupHistory {
    #[prost(string, tag = "1")]
    pub url: String,
    #[prost(int64, tag = "2")]
    pub last_read: i64,
    #[prost(int64, tag = "3")]
    pub read_duration: i64,
}

/// Content type value matching every category kind.
pub const CONTENT_TYPE_ALL: i32 = 0;

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BackupCategory {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(int64, tag = "2")]
    pub order: i64,
    #[prost(int64, tag = "3")]
    pub id: i64,
    #[prost(int64, tag = "100")]
    pub flags: i64,
    #[prost(int32, tag = "101")]
    pub content_type: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BackupSource {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(int64, tag = "2")]
    pub source_id: i64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BackupPreference {
    #[prost(string, tag = "1")]
    pub key: String,
    #[prost(message, optional, tag = "2")]
    pub value: Option<PreferenceValue>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PreferenceValue {
    #[prost(oneof = "preference_value::Kind", tags = "1, 2, 3, 4, 5, 6")]
    pub kind: Option<preference_value::Kind>,
}

pub mod preference_value {
    /// Every preference type a backup can carry. Restorers match on this
    /// exhaustively, so a new kind fails to compile until it is handled.
    #[derive(Clone, PartialEq, ::prost::Oneof, serde::Serialize, serde::Deserialize)]
    #[serde(tag = "type", content = "value", rename_all = "snake_case")]
    pub enum Kind {
        #[prost(int32, tag = "1")]
        Int(i32),
        #[prost(int64, tag = "2")]
        Long(i64),
        #[prost(float, tag = "3")]
        Float(f32),
        #[prost(string, tag = "4")]
        String(::std::string::String),
        #[prost(bool, tag = "5")]
        Boolean(bool),
        #[prost(message, tag = "6")]
        StringSet(super::StringSet),
    }

    impl Kind {
        /// True when both values are the same preference type.
        pub fn same_type(&self, other: &Kind) -> bool {
            std::mem::discriminant(self) == std::mem::discriminant(other)
        }
    }
}

pub use preference_value::Kind as PreferenceKind;

#[derive(Clone, PartialEq, ::prost::Message, serde::Serialize, serde::Deserialize)]
pub struct StringSet {
    #[prost(string, repeated, tag = "1")]
    pub values: Vec<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BackupSourcePreferences {
    #[prost(string, tag = "1")]
    pub source_key: String,
    #[prost(message, repeated, tag = "2")]
    pub prefs: Vec<BackupPreference>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BackupExtensionRepos {
    #[prost(string, tag = "1")]
    pub base_url: String,
    #[prost(string, tag = "2")]
    pub name: String,
    #[prost(string, optional, tag = "3")]
    pub short_name: Option<String>,
    #[prost(string, tag = "4")]
    pub website: String,
    #[prost(string, tag = "5")]
    pub signing_key_fingerprint: String,
}
