//! # pmosettings
//!
//! Configuration de pmoplayback :
//! - valeurs par défaut intégrées (YAML embarqué)
//! - fusion avec un `config.yaml` utilisateur
//! - surcharge par variables d'environnement (`PMOPLAYBACK_CONFIG__RENDERER__SEEK_STEP_SECS=10`)
//! - accesseurs typés et répertoires gérés
//!
//! ```no_run
//! use pmosettings::get_settings;
//!
//! let settings = get_settings();
//! let timeout = settings.get_response_timeout_ms()?;
//! let playlists = settings.get_playlists_dir()?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::{anyhow, Result};
use dirs::home_dir;
use lazy_static::lazy_static;
use serde_yaml::{Number, Value};
use std::{
    env, fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use tracing::{debug, info};

pub mod tree;

// Configuration par défaut intégrée
const DEFAULT_SETTINGS: &str = include_str!("pmoplayback.yaml");

const ENV_CONFIG_DIR: &str = "PMOPLAYBACK_CONFIG";
const ENV_PREFIX: &str = "PMOPLAYBACK_CONFIG__";
const CONFIG_DIR_NAME: &str = ".pmoplayback";
const CONFIG_FILE_NAME: &str = "config.yaml";

const DEFAULT_RESPONSE_TIMEOUT_MS: u64 = 2500;
const DEFAULT_POSITION_POLL_INTERVAL_MS: u64 = 1000;
const DEFAULT_SEEK_STEP_SECS: u64 = 5;
const DEFAULT_AVTRANSPORT_INSTANCE_ID: u64 = 0;
const DEFAULT_LOG_MIN_LEVEL: &str = "info";

lazy_static! {
    static ref SETTINGS: Arc<Settings> = Arc::new(
        Settings::load_settings("").expect("Failed to load pmoplayback configuration")
    );
}

/// Génère un accesseur et un mutateur pour une valeur entière positive
macro_rules! impl_u64_setting {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> Result<u64> {
            match self.get_value($path) {
                Ok(Value::Number(n)) => Ok(n.as_u64().unwrap_or($default)),
                Ok(Value::String(s)) => Ok(s.trim().parse::<u64>().unwrap_or($default)),
                _ => Ok($default),
            }
        }

        pub fn $setter(&self, value: u64) -> Result<()> {
            self.set_value($path, Value::Number(Number::from(value)))
        }
    };
}

/// Génère un accesseur et un mutateur pour une chaîne
macro_rules! impl_string_setting {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> Result<String> {
            match self.get_value($path) {
                Ok(Value::String(s)) if !s.is_empty() => Ok(s),
                _ => Ok($default.to_string()),
            }
        }

        pub fn $setter(&self, value: &str) -> Result<()> {
            self.set_value($path, Value::String(value.to_string()))
        }
    };
}

/// YAML-backed configuration store.
///
/// Every mutation is written back to `config.yaml` immediately.
#[derive(Debug)]
pub struct Settings {
    config_dir: PathBuf,
    path: PathBuf,
    data: Mutex<Value>,
}

impl Settings {
    /// Cherche le répertoire de configuration dans l'ordre :
    /// argument explicite, `PMOPLAYBACK_CONFIG`, `./.pmoplayback`, `~/.pmoplayback`.
    fn find_config_dir(directory: &str) -> PathBuf {
        if !directory.is_empty() {
            return PathBuf::from(directory);
        }

        if let Ok(env_path) = env::var(ENV_CONFIG_DIR) {
            info!(env_var = ENV_CONFIG_DIR, path = %env_path, "Using config directory from env");
            return PathBuf::from(env_path);
        }

        if Path::new(CONFIG_DIR_NAME).exists() {
            return PathBuf::from(CONFIG_DIR_NAME);
        }

        if let Some(home) = home_dir() {
            let home_config = home.join(CONFIG_DIR_NAME);
            if home_config.exists() {
                return home_config;
            }
        }

        PathBuf::from(CONFIG_DIR_NAME)
    }

    fn validate_config_dir(path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path)?;
        }
        if !path.is_dir() {
            return Err(anyhow!("{} is not a directory", path.display()));
        }

        // Vérifie les droits en écriture
        let probe = path.join(".write_test");
        fs::write(&probe, b"test")?;
        fs::remove_file(&probe)?;
        Ok(())
    }

    /// Charge la configuration depuis `directory` (ou l'emplacement par défaut si vide).
    ///
    /// Le document par défaut est fusionné avec le `config.yaml` trouvé, les clés sont
    /// mises en minuscules, les surcharges d'environnement appliquées, puis le résultat
    /// est réécrit sur disque.
    pub fn load_settings(directory: &str) -> Result<Self> {
        let config_dir = Self::find_config_dir(directory);
        Self::validate_config_dir(&config_dir)?;
        info!(config_dir = %config_dir.display(), "Using config directory");

        let path = config_dir.join(CONFIG_FILE_NAME);
        let mut value: Value = serde_yaml::from_str(DEFAULT_SETTINGS)?;

        match fs::read(&path) {
            Ok(data) => {
                info!(config_file = %path.display(), "Loaded config file");
                let external: Value = serde_yaml::from_slice(&data)?;
                // Un fichier vide se lit comme `null`
                if !external.is_null() {
                    tree::merge(&mut value, &tree::lower_keys(external));
                }
            }
            Err(_) => {
                info!(config_file = %path.display(), "Config file not found, using embedded defaults");
            }
        }

        let mut value = tree::lower_keys(value);
        tree::apply_overrides(&mut value, ENV_PREFIX, env::vars());

        let settings = Settings {
            config_dir,
            path,
            data: Mutex::new(value),
        };
        settings.save()?;
        Ok(settings)
    }

    fn data(&self) -> MutexGuard<'_, Value> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn save(&self) -> Result<()> {
        let yaml = serde_yaml::to_string(&*self.data())?;
        fs::write(&self.path, yaml)?;
        Ok(())
    }

    pub fn get_value(&self, path: &[&str]) -> Result<Value> {
        tree::get(&self.data(), path)
    }

    pub fn set_value(&self, path: &[&str], value: Value) -> Result<()> {
        tree::set(&mut self.data(), path, value)?;
        self.save()
    }

    /// Retourne un répertoire géré par la configuration, créé au besoin.
    ///
    /// Un chemin relatif est résolu par rapport au répertoire de configuration.
    /// Si la clé est absente, `default` est enregistré puis utilisé.
    pub fn get_managed_dir(&self, path: &[&str], default: &str) -> Result<PathBuf> {
        let configured = match self.get_value(path) {
            Ok(Value::String(s)) if !s.is_empty() => s,
            _ => {
                self.set_value(path, Value::String(default.to_string()))?;
                default.to_string()
            }
        };

        let dir = Path::new(&configured);
        let absolute = if dir.is_absolute() {
            dir.to_path_buf()
        } else {
            self.config_dir.join(dir)
        };

        if !absolute.exists() {
            fs::create_dir_all(&absolute)?;
            debug!(directory = %absolute.display(), "Created managed directory");
        }
        Ok(absolute)
    }

    pub fn get_playlists_dir(&self) -> Result<PathBuf> {
        self.get_managed_dir(&["playlists", "directory"], "playlists")
    }

    pub fn get_favorites_dir(&self) -> Result<PathBuf> {
        self.get_managed_dir(&["favorites", "directory"], "favorites")
    }

    impl_u64_setting!(
        get_response_timeout_ms,
        set_response_timeout_ms,
        &["renderer", "response_timeout_ms"],
        DEFAULT_RESPONSE_TIMEOUT_MS
    );
    impl_u64_setting!(
        get_position_poll_interval_ms,
        set_position_poll_interval_ms,
        &["renderer", "position_poll_interval_ms"],
        DEFAULT_POSITION_POLL_INTERVAL_MS
    );
    impl_u64_setting!(
        get_seek_step_secs,
        set_seek_step_secs,
        &["renderer", "seek_step_secs"],
        DEFAULT_SEEK_STEP_SECS
    );
    impl_u64_setting!(
        get_avtransport_instance_id,
        set_avtransport_instance_id,
        &["renderer", "avtransport_instance_id"],
        DEFAULT_AVTRANSPORT_INSTANCE_ID
    );
    impl_string_setting!(
        get_log_min_level,
        set_log_min_level,
        &["logger", "min_level"],
        DEFAULT_LOG_MIN_LEVEL
    );
}

/// Instance globale, chargée au premier accès.
pub fn get_settings() -> Arc<Settings> {
    SETTINGS.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn load(dir: &TempDir) -> Settings {
        Settings::load_settings(dir.path().to_str().unwrap()).unwrap()
    }

    #[test]
    fn defaults_are_written_on_first_load() {
        let dir = TempDir::new().unwrap();
        let settings = load(&dir);

        assert_eq!(settings.get_response_timeout_ms().unwrap(), 2500);
        assert_eq!(settings.get_position_poll_interval_ms().unwrap(), 1000);
        assert_eq!(settings.get_seek_step_secs().unwrap(), 5);
        assert_eq!(settings.get_avtransport_instance_id().unwrap(), 0);
        assert!(dir.path().join("config.yaml").exists());
    }

    #[test]
    fn user_file_overrides_defaults() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("config.yaml"),
            "Renderer:\n  Seek_Step_Secs: 15\n",
        )
        .unwrap();

        let settings = load(&dir);
        assert_eq!(settings.get_seek_step_secs().unwrap(), 15);
        assert_eq!(settings.get_response_timeout_ms().unwrap(), 2500);
    }

    #[test]
    fn setters_persist_across_reload() {
        let dir = TempDir::new().unwrap();
        load(&dir).set_response_timeout_ms(800).unwrap();

        assert_eq!(load(&dir).get_response_timeout_ms().unwrap(), 800);
    }

    #[test]
    fn managed_dirs_resolve_relative_to_config_dir() {
        let dir = TempDir::new().unwrap();
        let settings = load(&dir);

        let playlists = settings.get_playlists_dir().unwrap();
        assert_eq!(playlists, dir.path().join("playlists"));
        assert!(playlists.is_dir());
    }

    #[test]
    fn invalid_number_falls_back_to_default() {
        let dir = TempDir::new().unwrap();
        let settings = load(&dir);
        settings
            .set_value(&["renderer", "seek_step_secs"], Value::String("fast".into()))
            .unwrap();

        assert_eq!(settings.get_seek_step_secs().unwrap(), 5);
    }
}
