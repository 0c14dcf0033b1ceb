//! Extension de pmosettings pour le lecteur

use std::time::Duration;

use crate::errors::Result;
use crate::persistence::JsonDirStore;
use crate::settings::PlaybackSettings;

/// Trait d'extension pour pmosettings::Settings
pub trait PlaybackConfigExt {
    /// Réglages de session lus dans la section `renderer`
    fn playback_settings(&self) -> Result<PlaybackSettings>;

    /// Stockage des playlists et favoris dans les répertoires gérés
    fn playback_store(&self) -> Result<JsonDirStore>;
}

impl PlaybackConfigExt for pmosettings::Settings {
    fn playback_settings(&self) -> Result<PlaybackSettings> {
        let defaults = PlaybackSettings::default();
        let instance_id = u32::try_from(self.get_avtransport_instance_id()?)
            .unwrap_or(defaults.instance_id);

        Ok(PlaybackSettings {
            response_timeout: Duration::from_millis(self.get_response_timeout_ms()?),
            // Un intervalle nul ferait tourner le rafraîchissement en boucle
            position_poll_interval: Duration::from_millis(
                self.get_position_poll_interval_ms()?.max(100),
            ),
            seek_step_secs: self.get_seek_step_secs()?,
            instance_id,
        })
    }

    fn playback_store(&self) -> Result<JsonDirStore> {
        JsonDirStore::with_dirs(self.get_playlists_dir()?, self.get_favorites_dir()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::{PlaylistData, Store};
    use tempfile::TempDir;

    #[test]
    fn settings_come_from_renderer_section() {
        let dir = TempDir::new().unwrap();
        let settings = pmosettings::Settings::load_settings(dir.path().to_str().unwrap()).unwrap();
        settings.set_seek_step_secs(30).unwrap();

        let playback = settings.playback_settings().unwrap();
        assert_eq!(playback.seek_step_secs, 30);
        assert_eq!(playback.response_timeout, Duration::from_millis(2500));
    }

    #[test]
    fn store_lives_in_managed_dirs() {
        let dir = TempDir::new().unwrap();
        let settings = pmosettings::Settings::load_settings(dir.path().to_str().unwrap()).unwrap();

        let store = settings.playback_store().unwrap();
        store.save("evening", &PlaylistData::new()).unwrap();
        assert!(dir.path().join("playlists").join("evening.playlist.json").exists());
    }
}
