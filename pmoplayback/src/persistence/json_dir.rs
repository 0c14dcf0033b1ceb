use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Favorite, FavoriteStore, PlaylistData, Store, validate_name};
use crate::errors::{PlaybackError, Result};

const PLAYLIST_SUFFIX: &str = ".playlist.json";
const FAVORITE_SUFFIX: &str = ".favorite.json";

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Serialize, Deserialize)]
struct PlaylistFile {
    name: String,
    saved_at: DateTime<Utc>,
    sources: PlaylistData,
}

#[derive(Serialize, Deserialize)]
struct FavoriteFile {
    saved_at: DateTime<Utc>,
    #[serde(flatten)]
    favorite: Favorite,
}

/// One JSON file per saved queue (`<name>.playlist.json`) and per favorite
/// (`<name>.favorite.json`).
///
/// Writes go to a temporary file in the same directory which is then renamed
/// over the target.
#[derive(Debug, Clone)]
pub struct JsonDirStore {
    playlists_dir: PathBuf,
    favorites_dir: PathBuf,
}

impl JsonDirStore {
    /// Keeps playlists and favorites side by side in `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        Self::with_dirs(dir.clone(), dir)
    }

    pub fn with_dirs(playlists_dir: impl Into<PathBuf>, favorites_dir: impl Into<PathBuf>) -> Result<Self> {
        let store = Self {
            playlists_dir: playlists_dir.into(),
            favorites_dir: favorites_dir.into(),
        };
        fs::create_dir_all(&store.playlists_dir)?;
        fs::create_dir_all(&store.favorites_dir)?;
        Ok(store)
    }

    pub fn playlists_dir(&self) -> &Path {
        &self.playlists_dir
    }

    pub fn favorites_dir(&self) -> &Path {
        &self.favorites_dir
    }

    fn playlist_path(&self, name: &str) -> PathBuf {
        self.playlists_dir.join(format!("{name}{PLAYLIST_SUFFIX}"))
    }

    fn favorite_path(&self, name: &str) -> PathBuf {
        self.favorites_dir.join(format!("{name}{FAVORITE_SUFFIX}"))
    }
}

fn write_replace(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let tmp = dir.join(format!(
        ".{}.{}-{}.tmp",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("blob"),
        std::process::id(),
        TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));

    let written = fs::File::create(&tmp).and_then(|mut file| {
        file.write_all(bytes)?;
        file.sync_all()
    });
    if let Err(err) = written.and_then(|_| fs::rename(&tmp, path)) {
        let _ = fs::remove_file(&tmp);
        return Err(err.into());
    }
    Ok(())
}

fn list_with_suffix(dir: &Path, suffix: &str) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let file_name = entry?.file_name();
        let Some(file_name) = file_name.to_str() else {
            continue;
        };
        if file_name.starts_with('.') {
            continue;
        }
        if let Some(name) = file_name.strip_suffix(suffix) {
            names.push(name.to_string());
        }
    }
    names.sort();
    Ok(names)
}

fn read_or(path: &Path, missing: impl FnOnce() -> PlaybackError) -> Result<Vec<u8>> {
    fs::read(path).map_err(|err| match err.kind() {
        ErrorKind::NotFound => missing(),
        _ => err.into(),
    })
}

fn remove_or(path: &Path, missing: impl FnOnce() -> PlaybackError) -> Result<()> {
    fs::remove_file(path).map_err(|err| match err.kind() {
        ErrorKind::NotFound => missing(),
        _ => err.into(),
    })
}

impl Store for JsonDirStore {
    fn save(&self, name: &str, data: &PlaylistData) -> Result<()> {
        validate_name(name)?;
        let file = PlaylistFile {
            name: name.to_string(),
            saved_at: Utc::now(),
            sources: data.clone(),
        };
        let path = self.playlist_path(name);
        write_replace(&path, &serde_json::to_vec_pretty(&file)?)?;
        debug!(playlist = name, path = %path.display(), "Saved playlist");
        Ok(())
    }

    fn load(&self, name: &str) -> Result<PlaylistData> {
        validate_name(name)?;
        let bytes = read_or(&self.playlist_path(name), || {
            PlaybackError::PlaylistNotFound(name.to_string())
        })?;
        let file: PlaylistFile = serde_json::from_slice(&bytes)?;
        Ok(file.sources)
    }

    fn list(&self) -> Result<Vec<String>> {
        list_with_suffix(&self.playlists_dir, PLAYLIST_SUFFIX)
    }

    fn delete(&self, name: &str) -> Result<()> {
        validate_name(name)?;
        remove_or(&self.playlist_path(name), || {
            PlaybackError::PlaylistNotFound(name.to_string())
        })
    }
}

impl FavoriteStore for JsonDirStore {
    fn save_favorite(&self, favorite: &Favorite) -> Result<()> {
        validate_name(&favorite.name)?;
        let file = FavoriteFile {
            saved_at: Utc::now(),
            favorite: favorite.clone(),
        };
        write_replace(
            &self.favorite_path(&favorite.name),
            &serde_json::to_vec_pretty(&file)?,
        )
    }

    fn load_favorite(&self, name: &str) -> Result<Favorite> {
        validate_name(name)?;
        let bytes = read_or(&self.favorite_path(name), || {
            PlaybackError::FavoriteNotFound(name.to_string())
        })?;
        let file: FavoriteFile = serde_json::from_slice(&bytes)?;
        Ok(file.favorite)
    }

    fn list_favorites(&self) -> Result<Vec<String>> {
        list_with_suffix(&self.favorites_dir, FAVORITE_SUFFIX)
    }

    fn delete_favorite(&self, name: &str) -> Result<()> {
        validate_name(name)?;
        remove_or(&self.favorite_path(name), || {
            PlaybackError::FavoriteNotFound(name.to_string())
        })
    }
}
