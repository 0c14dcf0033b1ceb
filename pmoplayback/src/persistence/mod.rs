//! Named, durable storage of queues and favorites.
//!
//! A saved queue is a map from source tag to the entries that source produced,
//! so that a restore can be narrowed to a single origin. Stores replace blobs
//! whole: a reader never sees a half-written save.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use crate::errors::{PlaybackError, Result};
use crate::model::MediaEntry;

mod json_dir;

pub use json_dir::JsonDirStore;

/// Entries grouped by source tag.
pub type PlaylistData = BTreeMap<String, Vec<MediaEntry>>;

pub trait Store: Send + Sync {
    fn save(&self, name: &str, data: &PlaylistData) -> Result<()>;

    /// Fails with [`PlaybackError::PlaylistNotFound`] when nothing was saved under `name`.
    fn load(&self, name: &str) -> Result<PlaylistData>;

    fn list(&self) -> Result<Vec<String>>;

    fn delete(&self, name: &str) -> Result<()>;
}

/// A bookmarked stream or track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Favorite {
    pub name: String,
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry: Option<MediaEntry>,
}

pub trait FavoriteStore: Send + Sync {
    fn save_favorite(&self, favorite: &Favorite) -> Result<()>;

    fn load_favorite(&self, name: &str) -> Result<Favorite>;

    fn list_favorites(&self) -> Result<Vec<String>>;

    fn delete_favorite(&self, name: &str) -> Result<()>;
}

/// Rejects names that cannot be used as a single file name.
pub(crate) fn validate_name(name: &str) -> Result<()> {
    let trimmed = name.trim();
    if trimmed.is_empty()
        || trimmed.starts_with('.')
        || trimmed
            .chars()
            .any(|c| matches!(c, '/' | '\\' | '\0') || c.is_control())
    {
        return Err(PlaybackError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Volatile store, used by tests and by sessions that do not need durability.
#[derive(Debug, Default)]
pub struct MemoryStore {
    playlists: Mutex<HashMap<String, PlaylistData>>,
    favorites: Mutex<HashMap<String, Favorite>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn sorted(mut names: Vec<String>) -> Vec<String> {
    names.sort();
    names
}

impl Store for MemoryStore {
    fn save(&self, name: &str, data: &PlaylistData) -> Result<()> {
        validate_name(name)?;
        locked(&self.playlists).insert(name.to_string(), data.clone());
        Ok(())
    }

    fn load(&self, name: &str) -> Result<PlaylistData> {
        locked(&self.playlists)
            .get(name)
            .cloned()
            .ok_or_else(|| PlaybackError::PlaylistNotFound(name.to_string()))
    }

    fn list(&self) -> Result<Vec<String>> {
        Ok(sorted(locked(&self.playlists).keys().cloned().collect()))
    }

    fn delete(&self, name: &str) -> Result<()> {
        locked(&self.playlists)
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| PlaybackError::PlaylistNotFound(name.to_string()))
    }
}

impl FavoriteStore for MemoryStore {
    fn save_favorite(&self, favorite: &Favorite) -> Result<()> {
        validate_name(&favorite.name)?;
        locked(&self.favorites).insert(favorite.name.clone(), favorite.clone());
        Ok(())
    }

    fn load_favorite(&self, name: &str) -> Result<Favorite> {
        locked(&self.favorites)
            .get(name)
            .cloned()
            .ok_or_else(|| PlaybackError::FavoriteNotFound(name.to_string()))
    }

    fn list_favorites(&self) -> Result<Vec<String>> {
        Ok(sorted(locked(&self.favorites).keys().cloned().collect()))
    }

    fn delete_favorite(&self, name: &str) -> Result<()> {
        locked(&self.favorites)
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| PlaybackError::FavoriteNotFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_with_separators_are_rejected() {
        assert!(validate_name("rock").is_ok());
        assert!(validate_name("Late night mix").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("../etc").is_err());
        assert!(validate_name("a/b").is_err());
        assert!(validate_name(".hidden").is_err());
    }

    #[test]
    fn memory_store_missing_playlist() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.load("nope"),
            Err(PlaybackError::PlaylistNotFound(name)) if name == "nope"
        ));
        assert!(store.delete("nope").is_err());
    }

    #[test]
    fn memory_store_lists_sorted() {
        let store = MemoryStore::new();
        store.save("b", &PlaylistData::new()).unwrap();
        store.save("a", &PlaylistData::new()).unwrap();
        assert_eq!(store.list().unwrap(), vec!["a", "b"]);
    }
}
