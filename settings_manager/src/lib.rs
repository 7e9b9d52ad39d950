//! Configuration management for mentor_room
//!
//! Settings are layered: built-in defaults, then the TOML config file, then
//! `MENTOR_ROOM_*` environment variables (nested keys use `__`, e.g.
//! `MENTOR_ROOM_VISUALIZATION__STYLE=bars`).

use config::{Config, Environment, File, FileFormat};
use log::{debug, info};
use network::{random_participant_name, SimulationTiming};
use room::{Layout, PanelNames};
use room_core::Error;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use visualization::{VisualizationConfig, VisualizationStyle};

pub const ENV_PREFIX: &str = "MENTOR_ROOM";
const CONFIG_DIR_NAME: &str = "mentor_room";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Token backend queried with `?room=..&name=..`
    pub token_endpoint: String,

    /// Room to join
    pub room_name: String,

    /// Identity to join as; blank picks a random `user-xxxx`
    pub participant_name: String,

    pub layout: Layout,

    /// Display names of the host and specialists
    pub specialist_names: PanelNames,

    /// Input device for capture builds (empty string means system default)
    pub microphone_device: String,

    pub visualization: VisualizationSettings,

    pub simulation: SimulationSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            token_endpoint: "http://localhost:8000/token".to_string(),
            room_name: "mentor-room".to_string(),
            participant_name: String::new(),
            layout: Layout::Panel,
            specialist_names: PanelNames::default(),
            microphone_device: String::new(),
            visualization: VisualizationSettings::default(),
            simulation: SimulationSettings::default(),
        }
    }
}

impl Settings {
    /// The configured participant name, or a fresh random one.
    pub fn participant_identity(&self) -> String {
        let name = self.participant_name.trim();
        if name.is_empty() {
            random_participant_name()
        } else {
            name.to_string()
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        if !self.simulation.enabled && self.token_endpoint.trim().is_empty() {
            return Err(Error::Config(
                "token_endpoint must be set unless simulation is enabled".to_string(),
            ));
        }
        if self.room_name.trim().is_empty() {
            return Err(Error::Config("room_name must not be empty".to_string()));
        }
        self.visualization.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualizationSettings {
    pub style: VisualizationStyle,
    pub frame_interval_ms: u64,
    pub ray_count: usize,
    pub width: f32,
    pub height: f32,
}

impl Default for VisualizationSettings {
    fn default() -> Self {
        let defaults = VisualizationConfig::default();
        Self {
            style: defaults.style,
            frame_interval_ms: defaults.frame_interval.as_millis() as u64,
            ray_count: defaults.ray_count,
            width: defaults.width,
            height: defaults.height,
        }
    }
}

impl VisualizationSettings {
    fn validate(&self) -> Result<(), Error> {
        if self.frame_interval_ms == 0 {
            return Err(Error::Config("frame_interval_ms must be positive".to_string()));
        }
        if self.ray_count == 0 {
            return Err(Error::Config("ray_count must be positive".to_string()));
        }
        if self.width <= 0.0 || self.height <= 0.0 {
            return Err(Error::Config("canvas size must be positive".to_string()));
        }
        Ok(())
    }

    pub fn to_config(&self) -> VisualizationConfig {
        VisualizationConfig {
            style: self.style,
            frame_interval: Duration::from_millis(self.frame_interval_ms),
            ray_count: self.ray_count,
            width: self.width,
            height: self.height,
        }
    }
}

/// Pacing of the built-in simulated room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    /// Run against the simulated room instead of the token backend
    pub enabled: bool,
    pub join_delay_ms: u64,
    pub speaker_interval_ms: u64,
    /// End the simulated session after this many seconds; 0 runs forever
    pub session_length_secs: u64,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            join_delay_ms: 400,
            speaker_interval_ms: 3000,
            session_length_secs: 0,
        }
    }
}

impl SimulationSettings {
    pub fn timing(&self) -> SimulationTiming {
        SimulationTiming {
            join_delay: Duration::from_millis(self.join_delay_ms),
            speaker_interval: Duration::from_millis(self.speaker_interval_ms.max(1)),
            session_length: (self.session_length_secs > 0)
                .then(|| Duration::from_secs(self.session_length_secs)),
        }
    }
}

/// Configuration manager
pub struct ConfigManager {
    settings: Settings,
    config_file: PathBuf,
}

impl ConfigManager {
    /// Load from the default location under the user's config directory.
    pub fn new() -> Result<Self, Error> {
        Self::with_file(Self::default_path()?)
    }

    /// `<config_dir>/mentor_room/config.toml`
    pub fn default_path() -> Result<PathBuf, Error> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| Error::Config("Failed to determine config directory".to_string()))?;
        Ok(config_dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load from a specific file. A missing file means defaults.
    pub fn with_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        Self::load(path, ENV_PREFIX)
    }

    fn load<P: AsRef<Path>>(path: P, env_prefix: &str) -> Result<Self, Error> {
        let config_file = path.as_ref().to_path_buf();
        if config_file.exists() {
            info!("Loading config from {:?}", config_file);
        } else {
            debug!("Config file {:?} not found, using defaults", config_file);
        }

        let defaults = Config::try_from(&Settings::default())
            .map_err(|e| Error::Config(format!("Failed to build default settings: {}", e)))?;
        let settings: Settings = Config::builder()
            .add_source(defaults)
            .add_source(File::from(config_file.as_path()).format(FileFormat::Toml).required(false))
            .add_source(
                Environment::with_prefix(env_prefix)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .and_then(|config| config.try_deserialize())
            .map_err(|e| Error::Config(format!("Failed to load config: {}", e)))?;
        settings.validate()?;

        Ok(Self {
            settings,
            config_file,
        })
    }

    /// Save settings to the config file
    pub fn save(&self) -> Result<(), Error> {
        let toml = toml::to_string_pretty(&self.settings)
            .map_err(|e| Error::Config(format!("Failed to serialize settings: {}", e)))?;

        if let Some(parent) = self.config_file.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| {
                    Error::Config(format!("Failed to create config directory: {}", e))
                })?;
            }
        }

        fs::write(&self.config_file, toml)
            .map_err(|e| Error::Config(format!("Failed to write config file: {}", e)))?;

        debug!("Saved config to {:?}", self.config_file);
        Ok(())
    }

    pub fn config_file(&self) -> &Path {
        &self.config_file
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn update_settings(&mut self, new_settings: Settings) {
        self.settings = new_settings;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use room_core::SlotId;
    use tempfile::tempdir;

    #[test]
    fn default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.layout, Layout::Panel);
        assert_eq!(settings.visualization.ray_count, 64);
        assert_eq!(settings.visualization.style, VisualizationStyle::Radial);
        assert!(settings.participant_name.is_empty());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn blank_name_gets_random_identity() {
        let settings = Settings::default();
        assert!(settings.participant_identity().starts_with("user-"));

        let named = Settings {
            participant_name: "  ana ".to_string(),
            ..Settings::default()
        };
        assert_eq!(named.participant_identity(), "ana");
    }

    #[test_log::test]
    fn save_and_load() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.toml");

        let mut config = ConfigManager::load(&config_path, "MENTOR_ROOM_TEST_SAVE").unwrap();
        config.settings_mut().room_name = "strategy-review".to_string();
        config.settings_mut().layout = Layout::Single;
        config.settings_mut().specialist_names.marketing = "Bianca".to_string();
        config.settings_mut().visualization.style = VisualizationStyle::Bars;
        config.save().unwrap();
        assert!(config_path.exists());

        let loaded = ConfigManager::load(&config_path, "MENTOR_ROOM_TEST_SAVE").unwrap();
        assert_eq!(loaded.settings(), config.settings());
        assert_eq!(
            loaded.settings().specialist_names.name_for(SlotId::Marketing),
            "Bianca"
        );
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(
            &config_path,
            "room_name = \"board\"\n[visualization]\nstyle = \"bars\"\n",
        )
        .unwrap();

        let config = ConfigManager::load(&config_path, "MENTOR_ROOM_TEST_PARTIAL").unwrap();
        assert_eq!(config.settings().room_name, "board");
        assert_eq!(config.settings().visualization.style, VisualizationStyle::Bars);
        assert_eq!(config.settings().visualization.ray_count, 64);
        assert_eq!(config.settings().layout, Layout::Panel);
    }

    #[test]
    fn environment_overrides_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, "room_name = \"from-file\"\n").unwrap();

        std::env::set_var("MENTOR_ROOM_TEST_ENV_ROOM_NAME", "from-env");
        std::env::set_var("MENTOR_ROOM_TEST_ENV_VISUALIZATION__RAY_COUNT", "32");
        let config = ConfigManager::load(&config_path, "MENTOR_ROOM_TEST_ENV").unwrap();
        std::env::remove_var("MENTOR_ROOM_TEST_ENV_ROOM_NAME");
        std::env::remove_var("MENTOR_ROOM_TEST_ENV_VISUALIZATION__RAY_COUNT");

        assert_eq!(config.settings().room_name, "from-env");
        assert_eq!(config.settings().visualization.ray_count, 32);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, "[visualization]\nray_count = 0\n").unwrap();

        let err = ConfigManager::load(&config_path, "MENTOR_ROOM_TEST_INVALID").err().unwrap();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn file_not_found_uses_defaults() {
        let temp_dir = tempdir().unwrap();
        let nonexistent_path = temp_dir.path().join("nonexistent.toml");

        let config = ConfigManager::load(&nonexistent_path, "MENTOR_ROOM_TEST_MISSING").unwrap();
        assert_eq!(config.settings(), &Settings::default());
    }

    #[test]
    fn simulation_timing_conversion() {
        let timing = SimulationSettings {
            session_length_secs: 0,
            ..SimulationSettings::default()
        }
        .timing();
        assert!(timing.session_length.is_none());
        assert_eq!(timing.join_delay, Duration::from_millis(400));

        let bounded = SimulationSettings {
            session_length_secs: 90,
            ..SimulationSettings::default()
        };
        assert_eq!(bounded.timing().session_length, Some(Duration::from_secs(90)));
    }
}
