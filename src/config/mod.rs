pub mod enums;

use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, RwLock};
use std::time::Duration;
use notify::Watcher as _;
use notify::event::{AccessKind, AccessMode, EventKind};
use serde::{Deserialize, Serialize};

pub use enums::FeedFormat;

use crate::utils::filesystem::get_config_directory;

static CONFIG: LazyLock<RwLock<Config>> = LazyLock::new(|| {
    let config = read().unwrap_or_else(|err| {
        warn!(%err, path = %config_path().display(), "Failed to read configuration, using defaults");
        Config::default()
    });

    RwLock::new(config)
});

const FILE_NAME: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationsConfig {
    pub enabled: bool,
    /// How long a popup stays up after it arrives or is replaced.
    pub expiry_seconds: u64,
    /// Maximum age of a notification's own timestamp for the popup window to show.
    pub freshness_seconds: u64,
    pub time_format: String,
    #[serde(deserialize_with = "deserialize_insensitive")]
    pub feed: FeedFormat,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        NotificationsConfig {
            enabled: true,
            expiry_seconds: 10,
            freshness_seconds: 10,
            time_format: "%H:%M".to_owned(),
            feed: FeedFormat::Json,
        }
    }
}

impl NotificationsConfig {
    pub fn expiry(&self) -> Duration {
        Duration::from_secs(self.expiry_seconds)
    }

    pub fn freshness(&self) -> Duration {
        Duration::from_secs(self.freshness_seconds)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub notifications: NotificationsConfig,
}

pub fn deserialize_insensitive<'de, T, D>(deserializer: D) -> Result<T, D::Error>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    T::from_str(&s).map_err(serde::de::Error::custom)
}

fn config_path() -> PathBuf {
    Path::new(&get_config_directory()).join(FILE_NAME)
}

fn save_to(path: &Path, config: &Config) -> Result<(), Box<dyn Error>> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    std::fs::write(path, toml::to_string(config)?)?;
    Ok(())
}

/// Reads the configuration at `path`, writing the defaults there first if it is missing.
pub fn read_from(path: &Path) -> Result<Config, Box<dyn Error>> {
    if !path.exists() {
        let default = Config::default();
        save_to(path, &default)?;
        Ok(default)
    } else {
        let toml = std::fs::read_to_string(path)?;
        let config = toml::from_str(&toml)?;
        Ok(config)
    }
}

fn read() -> Result<Config, Box<dyn Error>> {
    read_from(&config_path())
}

pub fn watch() {
    std::thread::spawn(move || {
        let (tx, rx) = std::sync::mpsc::channel();

        let mut watcher = match notify::recommended_watcher(tx) {
            Ok(watcher) => watcher,
            Err(err) => {
                error!(%err, "Failed to create configuration watcher");
                return;
            }
        };

        let result = watcher.watch(
            Path::new(&get_config_directory()),
            notify::RecursiveMode::NonRecursive,
        );

        if let Err(err) = result {
            error!(%err, "Failed to watch configuration file");
            return;
        }

        info!(path = %config_path().display(), "Watching configuration file");

        for res in rx {
            match res {
                Ok(event) => if event.paths.iter().any(|p| p.file_name() == Some(FILE_NAME.as_ref()))
                    && matches!(event.kind, EventKind::Access(AccessKind::Close(AccessMode::Write)))
                {
                    match read() {
                        Ok(new_config) => {
                            if let Ok(mut config_lock) = CONFIG.write() {
                                *config_lock = new_config;
                                info!("Configuration reloaded");
                            }
                        },

                        Err(err) => {
                            warn!(%err, "Failed to reload configuration");
                        }
                    }
                },

                Err(err) => {
                    error!(%err, "Error watching configuration file");
                },
            }
        }
    });
}

/// Snapshot of the current configuration.
pub fn read_config() -> Config {
    match CONFIG.read() {
        Ok(config) => config.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}
