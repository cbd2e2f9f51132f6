use log::warn;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use vibe_sched_core::{SchedError, SchedulerConfig};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid scheduler settings: {0}")]
    Invalid(#[from] SchedError),
}

/// Settings for the simulated frontend loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct DriverSettings {
    pub ticks: u64,
    /// Logical time units per tick.
    pub step: u64,
    /// Fixed load sample fed to the scheduler every tick.
    pub load: f32,
    /// Ramp load from 0 to 1 across the run instead of using `load`.
    pub ramp: bool,
    /// Per-tick dispatch request; 0 uses the scheduler ceiling.
    pub budget: u32,
    pub frame_interval: u64,
    pub input_interval: u64,
    pub audio_interval: u64,
    /// Bytes in each simulated audio buffer.
    pub audio_buffer: usize,
    /// Simulated time between stats reports.
    pub report_interval: u64,
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self {
            ticks: 600,
            step: 16,
            load: 0.0,
            ramp: false,
            budget: 0,
            frame_interval: 16,
            input_interval: 16,
            audio_interval: 32,
            audio_buffer: 512,
            report_interval: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DriverConfig {
    pub scheduler: SchedulerConfig,
    pub driver: DriverSettings,
}

impl DriverConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.scheduler.validate()?;
        let d = &self.driver;
        if d.step == 0 {
            return Err(SchedError::InvalidArgument("driver step must be non-zero").into());
        }
        if d.frame_interval == 0 || d.input_interval == 0 || d.audio_interval == 0 {
            return Err(SchedError::InvalidArgument("periodic intervals must be non-zero").into());
        }
        Ok(())
    }
}

pub fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return PathBuf::from(appdata).join("vibesched").join("sched.toml");
        }
    }

    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("vibesched").join("sched.toml");
    }

    if let Some(home) = std::env::var_os("HOME") {
        return PathBuf::from(home)
            .join(".config")
            .join("vibesched")
            .join("sched.toml");
    }

    PathBuf::from("sched.toml")
}

/// Reads and validates a config file.
pub fn try_load(path: &Path) -> Result<DriverConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let cfg = toml::from_str::<DriverConfig>(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    cfg.validate()?;
    Ok(cfg)
}

/// Loads `path`, falling back to defaults when it is missing or unusable.
pub fn load_from_file(path: &Path) -> DriverConfig {
    match try_load(path) {
        Ok(cfg) => cfg,
        Err(ConfigError::Io { source, .. })
            if source.kind() == std::io::ErrorKind::NotFound =>
        {
            DriverConfig::default()
        }
        Err(e) => {
            warn!("{e}; using defaults");
            DriverConfig::default()
        }
    }
}

pub fn to_toml(cfg: &DriverConfig) -> Result<String, ConfigError> {
    Ok(toml::to_string_pretty(cfg)?)
}

pub fn save_to_file(path: &Path, cfg: &DriverConfig) -> Result<(), ConfigError> {
    let io_err = |source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    std::fs::write(path, to_toml(cfg)?).map_err(io_err)
}
