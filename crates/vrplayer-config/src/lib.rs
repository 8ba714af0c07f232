mod types;

pub use types::*;

use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Returns the config directory, e.g. `~/.config/vrplayer/`.
pub fn config_dir() -> Result<PathBuf> {
    let dir = dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?
        .join("vrplayer");
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Returns the config file path: `<config dir>/vrplayer/config.toml`.
pub fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Directory the playback engine writes resume positions to.
pub fn watch_later_dir() -> Result<PathBuf> {
    let dir = dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?
        .join("mpv")
        .join("watch_later");
    Ok(dir)
}

/// Load and validate the config at `path`. A missing file gives defaults.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    if path.exists() {
        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        config.validate()?;
        info!(?path, "Loaded config");
        Ok(config)
    } else {
        info!(?path, "No config found, using defaults");
        Ok(AppConfig::default())
    }
}

pub fn save_config_to(path: &Path, config: &AppConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    info!(?path, "Saved config");
    Ok(())
}

/// The config in use and the file it may be written back to.
///
/// A file that failed to load is never written: the defaults used in its
/// place would replace the user's settings.
pub struct ConfigStore {
    pub config: AppConfig,
    path: Option<PathBuf>,
}

impl ConfigStore {
    /// Open the config at the platform location.
    pub fn open() -> Self {
        match config_path() {
            Ok(path) => Self::open_at(path),
            Err(e) => {
                warn!(?e, "No config location, using defaults");
                Self {
                    config: AppConfig::default(),
                    path: None,
                }
            }
        }
    }

    pub fn open_at(path: PathBuf) -> Self {
        match load_config_from(&path) {
            Ok(config) => Self {
                config,
                path: Some(path),
            },
            Err(e) => {
                warn!(?e, ?path, "Failed to load config, using defaults");
                warn!("The config file will not be overwritten on exit");
                Self {
                    config: AppConfig::default(),
                    path: None,
                }
            }
        }
    }

    /// Whether [`ConfigStore::save`] will touch the file.
    pub fn is_writable(&self) -> bool {
        self.path.is_some()
    }

    /// Write the config back. Returns false when the file was left alone.
    pub fn save(&self) -> Result<bool> {
        match &self.path {
            Some(path) => {
                save_config_to(path, &self.config)?;
                Ok(true)
            }
            None => {
                debug!("Config was not loaded from disk, not saving");
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A fresh directory under the system temp dir, removed on drop.
    struct TempDir(PathBuf);

    impl TempDir {
        fn new(name: &str) -> Self {
            let dir = std::env::temp_dir()
                .join(format!("vrplayer-config-{}-{name}", std::process::id()));
            let _ = std::fs::remove_dir_all(&dir);
            std::fs::create_dir_all(&dir).unwrap();
            Self(dir)
        }

        fn file(&self) -> PathBuf {
            self.0.join("config.toml")
        }
    }

    impl Drop for TempDir {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.0);
        }
    }

    #[test]
    fn invalid_file_is_never_overwritten() {
        let dir = TempDir::new("invalid");
        let original =
            "[tracking]\nmax_update_interval_ms = 200\n\n[playback]\nhwdec = \"vaapi\"\n";
        std::fs::write(dir.file(), original).unwrap();

        let mut store = ConfigStore::open_at(dir.file());
        assert!(!store.is_writable());
        assert_eq!(store.config, AppConfig::default());

        store.config.playback.packing = StereoPackingMode::OverUnder;
        assert!(!store.save().unwrap());
        assert_eq!(std::fs::read_to_string(dir.file()).unwrap(), original);
    }

    #[test]
    fn unparsable_file_is_never_overwritten() {
        let dir = TempDir::new("unparsable");
        std::fs::write(dir.file(), "packing = = =").unwrap();

        let store = ConfigStore::open_at(dir.file());
        assert!(!store.save().unwrap());
        assert_eq!(std::fs::read_to_string(dir.file()).unwrap(), "packing = = =");
    }

    #[test]
    fn missing_file_is_created_on_save() {
        let dir = TempDir::new("missing");
        let path = dir.0.join("nested").join("config.toml");

        let mut store = ConfigStore::open_at(path.clone());
        assert!(store.is_writable());
        store.config.playback.packing = StereoPackingMode::Monoscopic;
        store.config.playback.invert_stereo = true;
        assert!(store.save().unwrap());

        let reloaded = load_config_from(&path).unwrap();
        assert_eq!(reloaded, store.config);
    }

    #[test]
    fn valid_file_keeps_user_settings_across_save() {
        let dir = TempDir::new("valid");
        std::fs::write(
            dir.file(),
            "[playback]\nhwdec = \"vaapi\"\n\n[view]\ndefault_fov_degrees = 110.0\n",
        )
        .unwrap();

        let mut store = ConfigStore::open_at(dir.file());
        assert!(store.is_writable());
        store.config.playback.invert_stereo = true;
        assert!(store.save().unwrap());

        let reloaded = load_config_from(&dir.file()).unwrap();
        assert_eq!(reloaded.playback.hwdec, "vaapi");
        assert_eq!(reloaded.view.default_fov_degrees, 110.0);
        assert!(reloaded.playback.invert_stereo);
    }
}
