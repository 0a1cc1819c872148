//! Restorers for the small, fully materialized backup sections
//!
//! Each restorer upserts one section into the store and can be run on its
//! own. Running one twice with the same input leaves the store unchanged.

pub mod categories;
pub mod extension_repos;
pub mod preferences;

pub use categories::CategoriesRestorer;
pub use extension_repos::ExtensionRepoRestorer;
pub use preferences::PreferenceRestorer;
