//! Configuration structs with sensible defaults and RON persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level client configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// World streaming settings.
    pub world: WorldConfig,
    /// Background chunk generator settings.
    pub generator: GeneratorConfig,
    /// Network/session settings.
    pub network: NetworkConfig,
    /// Login credentials used when joining a session.
    pub account: AccountConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// World streaming configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorldConfig {
    /// Number of chunks kept visible in each direction around the player.
    pub render_distance: u32,
    /// Chunk edge length in blocks.
    pub chunk_size: u32,
    /// World units per block.
    pub block_scale: f64,
    /// Player spawn position in world units `[x, y, z]`.
    pub spawn: [f64; 3],
}

/// Chunk generator configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Worker threads building chunk geometry. `0` picks a value from the CPU count.
    pub worker_threads: usize,
    /// Tallest column the terrain may produce, in blocks.
    pub max_height: u32,
}

/// Network/session configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NetworkConfig {
    /// Session server address.
    pub server_address: String,
    /// Session server port.
    pub server_port: u16,
    /// Minimum interval between position broadcasts, in milliseconds.
    pub position_interval_ms: u64,
    /// Largest inbound frame accepted from the server, in bytes.
    pub max_frame_bytes: u32,
    /// Play without a server; the generator picks the world seed.
    pub offline: bool,
}

/// Account credentials.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AccountConfig {
    /// Login name.
    pub login: String,
    /// Password.
    pub password: String,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
}

// --- Default implementations ---

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            render_distance: 8,
            chunk_size: 16,
            block_scale: 10.0,
            spawn: [80.0, 2000.0, 80.0],
        }
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            worker_threads: 0,
            max_height: 64,
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            server_address: "127.0.0.1".to_string(),
            server_port: 7777,
            position_interval_ms: 1000,
            max_frame_bytes: 65_536,
            offline: false,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Default directory holding `config.ron`, falling back to the working directory.
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("voxlink"))
        .unwrap_or_else(|| PathBuf::from("."))
}

// --- Load / Save / Reload ---

impl Config {
    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join("config.ron");

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
            let config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
            tracing::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            tracing::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::WriteError)?;

        let config_path = config_dir.join("config.ron");
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(&config_path, serialized).map_err(ConfigError::WriteError)?;
        Ok(())
    }

    /// Hot-reload: returns `Some(new_config)` if the file changed, `None` otherwise.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let config_path = config_dir.join("config.ron");
        let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
        let new_config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;

        if &new_config != self {
            tracing::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }

    /// `host:port` string for the session server.
    pub fn server_endpoint(&self) -> String {
        format!("{}:{}", self.network.server_address, self.network.server_port)
    }
}
