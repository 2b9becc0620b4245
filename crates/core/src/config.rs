use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Settings;

/// Configuration manager for cueline settings
/// Layers a schema of valid options over the persisted values. Stored in
/// config.json in the working directory by default
pub struct ConfigManager {
    config_path: PathBuf,
    settings: Settings,
}

/// Available configuration options with validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSchema {
    pub timing: TimingConfigSchema,
    pub output: OutputConfigSchema,
    pub midi: MidiConfigSchema,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfigSchema {
    pub show_tick_hz: ConfigOption<u32>,
    pub continuous_midi_interval_ms: ConfigOption<u64>,
    pub master_intensity: ConfigOption<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfigSchema {
    pub dmx_enabled: ConfigOption<bool>,
    pub dmx_broadcast: ConfigOption<bool>,
    pub dmx_source_ip: ConfigOption<String>,
    pub dmx_dest_ip: ConfigOption<String>,
    pub dmx_port: ConfigOption<u16>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MidiConfigSchema {
    pub midi_enabled: ConfigOption<bool>,
    pub midi_input_device: ConfigOption<String>,
    pub midi_clock_bpm: ConfigOption<f64>,
    pub midi_learn_timeout_ms: ConfigOption<u64>,
}

/// Configuration option with validation and available choices
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigOption<T> {
    pub default: T,
    pub valid_range: Option<(T, T)>,
    pub valid_choices: Option<Vec<T>>,
    pub description: String,
    pub requires_restart: bool,
}

impl<T> ConfigOption<T> {
    fn new(default: T, description: &str, requires_restart: bool) -> Self {
        Self {
            default,
            valid_range: None,
            valid_choices: None,
            description: description.to_string(),
            requires_restart,
        }
    }

    fn range(mut self, min: T, max: T) -> Self {
        self.valid_range = Some((min, max));
        self
    }
}

/// Persisted configuration file format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    pub settings: Settings,
    pub created_at: String,
    pub modified_at: String,
}

fn check_range<T: PartialOrd + std::fmt::Display + Copy>(
    errors: &mut Vec<String>,
    name: &str,
    value: T,
    option: &ConfigOption<T>,
) {
    if let Some((min, max)) = option.valid_range {
        // NaN fails both comparisons, so test for being inside instead
        if !(value >= min && value <= max) {
            errors.push(format!("{} must be between {} and {}", name, min, max));
        }
    }
}

impl ConfigManager {
    /// Create a new configuration manager
    /// If no path is provided, defaults to 'config.json' in the current working directory
    pub fn new(config_path: Option<PathBuf>) -> Self {
        Self {
            config_path: config_path.unwrap_or_else(|| PathBuf::from("config.json")),
            settings: Settings::default(),
        }
    }

    /// Load settings from the configuration file, writing a default file
    /// when none exists yet
    pub fn load(&mut self) -> Result<Settings, ConfigError> {
        if !self.config_path.exists() {
            log::info!(
                "No config at {}, writing defaults",
                self.config_path.display()
            );
            self.save()?;
            return Ok(self.settings.clone());
        }

        let content = fs::read_to_string(&self.config_path)
            .map_err(|e| ConfigError::Read(e.to_string()))?;

        let config_file: ConfigFile =
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        if config_file.version != env!("CARGO_PKG_VERSION") {
            log::warn!(
                "Config file version {} doesn't match application version {}. Using defaults for new settings.",
                config_file.version,
                env!("CARGO_PKG_VERSION")
            );
        }

        Self::validate_settings(&config_file.settings).map_err(ConfigError::Validation)?;

        self.settings = config_file.settings;
        Ok(self.settings.clone())
    }

    /// Save current settings to configuration file
    pub fn save(&self) -> Result<(), ConfigError> {
        if let Some(parent) = self.config_path.parent() {
            if parent != Path::new("") && parent != Path::new(".") {
                fs::create_dir_all(parent).map_err(|e| ConfigError::Write(e.to_string()))?;
            }
        }

        let now = chrono::Utc::now().to_rfc3339();
        let created_at = self.existing_created_at().unwrap_or_else(|| now.clone());
        let config_file = ConfigFile {
            version: env!("CARGO_PKG_VERSION").to_string(),
            settings: self.settings.clone(),
            created_at,
            modified_at: now,
        };

        let content = serde_json::to_string_pretty(&config_file)
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;

        fs::write(&self.config_path, content).map_err(|e| ConfigError::Write(e.to_string()))?;
        Ok(())
    }

    fn existing_created_at(&self) -> Option<String> {
        let content = fs::read_to_string(&self.config_path).ok()?;
        serde_json::from_str::<ConfigFile>(&content)
            .ok()
            .map(|file| file.created_at)
    }

    /// Validate, update and save settings
    pub fn update_settings(&mut self, settings: Settings) -> Result<(), ConfigError> {
        Self::validate_settings(&settings).map_err(ConfigError::Validation)?;
        self.settings = settings;
        self.save()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Get configuration schema with available options
    pub fn schema() -> ConfigSchema {
        ConfigSchema {
            timing: TimingConfigSchema {
                show_tick_hz: ConfigOption::new(40, "Show tick rate in Hz", true).range(10, 100),
                continuous_midi_interval_ms: ConfigOption::new(
                    100,
                    "Repeat interval for continuous MIDI commands",
                    false,
                )
                .range(10, 10_000),
                master_intensity: ConfigOption::new(1.0, "Master DMX intensity", false)
                    .range(0.0, 1.0),
            },
            output: OutputConfigSchema {
                dmx_enabled: ConfigOption::new(true, "Enable DMX output via Art-Net", true),
                dmx_broadcast: ConfigOption::new(
                    false,
                    "Use broadcast mode for Art-Net (vs unicast)",
                    true,
                ),
                dmx_source_ip: ConfigOption::new(
                    "192.168.1.100".to_string(),
                    "Source IP address for Art-Net output",
                    true,
                ),
                dmx_dest_ip: ConfigOption::new(
                    "192.168.1.200".to_string(),
                    "Destination IP address for Art-Net unicast",
                    true,
                ),
                dmx_port: ConfigOption::new(6454, "UDP port for Art-Net output", true)
                    .range(1024, 65535),
            },
            midi: MidiConfigSchema {
                midi_enabled: ConfigOption::new(false, "Enable MIDI input and output", true),
                midi_input_device: ConfigOption::new(
                    "None".to_string(),
                    "MIDI input device",
                    true,
                ),
                midi_clock_bpm: ConfigOption::new(120.0, "MIDI clock tempo", false)
                    .range(30.0, 300.0),
                midi_learn_timeout_ms: ConfigOption::new(
                    10_000,
                    "How long MIDI learn waits for input",
                    false,
                )
                .range(100, 120_000),
            },
        }
    }

    /// Validate settings against schema, collecting every error
    pub fn validate_settings(settings: &Settings) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        let schema = Self::schema();

        check_range(&mut errors, "show_tick_hz", settings.show_tick_hz, &schema.timing.show_tick_hz);
        check_range(
            &mut errors,
            "continuous_midi_interval_ms",
            settings.continuous_midi_interval_ms,
            &schema.timing.continuous_midi_interval_ms,
        );
        check_range(
            &mut errors,
            "master_intensity",
            settings.master_intensity,
            &schema.timing.master_intensity,
        );
        check_range(&mut errors, "dmx_port", settings.dmx_port, &schema.output.dmx_port);
        check_range(
            &mut errors,
            "midi_clock_bpm",
            settings.midi_clock_bpm,
            &schema.midi.midi_clock_bpm,
        );
        check_range(
            &mut errors,
            "midi_learn_timeout_ms",
            settings.midi_learn_timeout_ms,
            &schema.midi.midi_learn_timeout_ms,
        );

        if settings.dmx_enabled {
            if settings.dmx_source_ip.parse::<std::net::IpAddr>().is_err() {
                errors.push(format!("dmx_source_ip '{}' is not an IP address", settings.dmx_source_ip));
            }
            if !settings.dmx_broadcast && settings.dmx_dest_ip.parse::<std::net::IpAddr>().is_err() {
                errors.push(format!("dmx_dest_ip '{}' is not an IP address", settings.dmx_dest_ip));
            }
        }

        for (i, binding) in settings.midi_bindings.iter().enumerate() {
            if binding.channel.is_some_and(|ch| !(1..=16).contains(&ch)) {
                errors.push(format!("midi_bindings[{}] channel must be between 1 and 16", i));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Reset settings to defaults
    pub fn reset_to_defaults(&mut self) -> Result<(), ConfigError> {
        self.settings = Settings::default();
        self.save()
    }
}

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(String),
    #[error("Failed to write config file: {0}")]
    Write(String),
    #[error("Failed to parse config file: {0}")]
    Parse(String),
    #[error("Failed to serialize config: {0}")]
    Serialize(String),
    #[error("Config validation errors: {}", .0.join(", "))]
    Validation(Vec<String>),
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::midi::midi::{MidiAction, MidiBinding, MidiMessageType};

    #[test]
    fn test_config_manager_new() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test_config.json");

        let manager = ConfigManager::new(Some(config_path.clone()));
        assert_eq!(manager.config_path(), config_path);
        assert_eq!(manager.settings(), &Settings::default());
    }

    #[test]
    fn test_load_writes_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.json");

        let mut manager = ConfigManager::new(Some(config_path.clone()));
        assert_eq!(manager.load().unwrap(), Settings::default());
        assert!(config_path.exists());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test_config.json");

        let mut manager = ConfigManager::new(Some(config_path.clone()));

        let mut settings = Settings::default();
        settings.show_tick_hz = 50;
        settings.midi_output_devices = vec!["IAC Bus 1".to_string()];
        settings
            .midi_bindings
            .push(MidiBinding::new(MidiMessageType::NoteOn, Some(60), MidiAction::Go));
        manager.update_settings(settings.clone()).unwrap();

        let mut manager2 = ConfigManager::new(Some(config_path));
        let loaded_settings = manager2.load().unwrap();
        assert_eq!(loaded_settings, settings);
    }

    #[test]
    fn test_created_at_preserved_across_saves() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");
        let manager = ConfigManager::new(Some(config_path.clone()));
        manager.save().unwrap();
        let first: ConfigFile =
            serde_json::from_str(&fs::read_to_string(&config_path).unwrap()).unwrap();
        manager.save().unwrap();
        let second: ConfigFile =
            serde_json::from_str(&fs::read_to_string(&config_path).unwrap()).unwrap();
        assert_eq!(first.created_at, second.created_at);
    }

    #[test]
    fn test_validation() {
        let mut settings = Settings::default();
        assert!(ConfigManager::validate_settings(&settings).is_ok());

        settings.show_tick_hz = 500;
        settings.midi_clock_bpm = f64::NAN;
        settings.master_intensity = 1.5;
        let errors = ConfigManager::validate_settings(&settings).unwrap_err();
        assert_eq!(errors.len(), 3);

        let mut settings = Settings::default();
        let mut binding = MidiBinding::new(MidiMessageType::ControlChange, Some(1), MidiAction::StopAll);
        binding.channel = Some(17);
        settings.midi_bindings.push(binding);
        assert!(ConfigManager::validate_settings(&settings).is_err());
    }

    #[test]
    fn test_invalid_file_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");
        fs::write(&config_path, "{ not json").unwrap();
        let mut manager = ConfigManager::new(Some(config_path));
        assert!(matches!(manager.load(), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_schema_defaults_match_settings() {
        let schema = ConfigManager::schema();
        let defaults = Settings::default();
        assert_eq!(schema.timing.show_tick_hz.default, defaults.show_tick_hz);
        assert_eq!(schema.output.dmx_port.default, defaults.dmx_port);
        assert_eq!(schema.midi.midi_clock_bpm.default, defaults.midi_clock_bpm);
        assert!(schema.output.dmx_port.valid_range.is_some());
    }
}
