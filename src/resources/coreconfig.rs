//! Core configuration resource.
//!
//! Settings loaded from an INI configuration file. Provides defaults for
//! safe startup and methods to load/save configuration.
//!
//! # Configuration File Format
//!
//! ```ini
//! [core]
//! time_scale = 1.0
//! strict_transitions = false
//!
//! [runner]
//! script = ./assets/scripts/main.lua
//! frames = 600
//! fixed_dt = 0.0166667
//! ```

use bevy_ecs::prelude::*;
use configparser::ini::Ini;
use log::info;
use std::path::PathBuf;
use thiserror::Error;

/// Default safe values for startup
const DEFAULT_TIME_SCALE: f32 = 1.0;
const DEFAULT_STRICT_TRANSITIONS: bool = false;
const DEFAULT_SCRIPT: &str = "./assets/scripts/main.lua";
const DEFAULT_FRAMES: u64 = 600;
const DEFAULT_FIXED_DT: f32 = 1.0 / 60.0;
const DEFAULT_CONFIG_PATH: &str = "./config.ini";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config file {path:?}: {reason}")]
    Load { path: PathBuf, reason: String },
    #[error("failed to save config file {path:?}: {source}")]
    Save {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Core configuration resource.
#[derive(Resource, Debug, Clone, PartialEq)]
pub struct CoreConfig {
    /// Multiplier applied to every frame delta.
    pub time_scale: f32,
    /// Log ignored triggers and state changes at `warn` level.
    pub strict_transitions: bool,
    /// Entry script run by the headless runner.
    pub script: PathBuf,
    /// Frames the runner simulates before exiting.
    pub frames: u64,
    /// Seconds per simulated frame.
    pub fixed_dt: f32,
    /// Path to the configuration file.
    pub config_path: PathBuf,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl CoreConfig {
    /// Create a new configuration with safe default values.
    pub fn new() -> Self {
        Self {
            time_scale: DEFAULT_TIME_SCALE,
            strict_transitions: DEFAULT_STRICT_TRANSITIONS,
            script: PathBuf::from(DEFAULT_SCRIPT),
            frames: DEFAULT_FRAMES,
            fixed_dt: DEFAULT_FIXED_DT,
            config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
        }
    }

    /// Create a new configuration with a custom config file path.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: path.into(),
            ..Self::new()
        }
    }

    /// Load configuration from the INI file.
    ///
    /// Missing or unparsable values retain their current values.
    pub fn load_from_file(&mut self) -> Result<(), ConfigError> {
        let mut config = Ini::new();
        config.load(&self.config_path).map_err(|reason| ConfigError::Load {
            path: self.config_path.clone(),
            reason,
        })?;

        // [core] section
        if let Some(scale) = config.getfloat("core", "time_scale").ok().flatten()
            && scale.is_finite()
            && scale >= 0.0
        {
            self.time_scale = scale as f32;
        }
        if let Some(strict) = config.getbool("core", "strict_transitions").ok().flatten() {
            self.strict_transitions = strict;
        }

        // [runner] section
        if let Some(script) = config.get("runner", "script") {
            self.script = PathBuf::from(script);
        }
        if let Some(frames) = config.getuint("runner", "frames").ok().flatten() {
            self.frames = frames;
        }
        if let Some(dt) = config.getfloat("runner", "fixed_dt").ok().flatten()
            && dt.is_finite()
            && dt >= 0.0
        {
            self.fixed_dt = dt as f32;
        }

        info!(
            "Loaded config: time_scale={}, strict_transitions={}, script={:?}, frames={}, fixed_dt={}",
            self.time_scale, self.strict_transitions, self.script, self.frames, self.fixed_dt
        );

        Ok(())
    }

    /// Save configuration to the INI file.
    ///
    /// Creates the file if it doesn't exist.
    pub fn save_to_file(&self) -> Result<(), ConfigError> {
        let mut config = Ini::new();

        // [core] section
        config.set("core", "time_scale", Some(self.time_scale.to_string()));
        config.set(
            "core",
            "strict_transitions",
            Some(self.strict_transitions.to_string()),
        );

        // [runner] section
        config.set("runner", "script", Some(self.script.display().to_string()));
        config.set("runner", "frames", Some(self.frames.to_string()));
        config.set("runner", "fixed_dt", Some(self.fixed_dt.to_string()));

        config
            .write(&self.config_path)
            .map_err(|source| ConfigError::Save {
                path: self.config_path.clone(),
                source,
            })?;

        info!("Saved config to {:?}", self.config_path);

        Ok(())
    }
}
