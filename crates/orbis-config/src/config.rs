//! Configuration structs with defaults and RON persistence.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const CONFIG_FILE: &str = "config.ron";

/// Top-level viewer configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub window: WindowConfig,
    pub render: RenderConfig,
    pub cache: CacheConfig,
    pub navigator: NavigatorConfig,
    pub debug: DebugConfig,
}

/// Render target size.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WindowConfig {
    /// Target width in pixels.
    pub width: u32,
    /// Target height in pixels.
    pub height: u32,
    pub title: String,
}

/// Frame and terrain settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RenderConfig {
    /// Background color as linear RGBA in [0, 1].
    pub clear_color: [f32; 4],
    /// Pixels a terrain cell may span before its tile is refined.
    pub detail_factor: f64,
    pub vertical_exaggeration: f64,
    /// Deepest tessellation level.
    pub max_level: usize,
    pub num_lat_cells: u32,
    pub num_lon_cells: u32,
    /// Terrain geometry worker threads. Zero builds on the render thread.
    pub worker_count: usize,
    /// Use the wgpu backend instead of the software rasterizer.
    pub use_gpu: bool,
}

/// Cache budgets in bytes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    pub gpu_resource_capacity: usize,
    pub gpu_resource_low_water: usize,
    pub terrain_tile_capacity: usize,
    pub terrain_tile_low_water: usize,
}

/// Initial camera.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NavigatorConfig {
    /// Degrees.
    pub latitude: f64,
    /// Degrees.
    pub longitude: f64,
    /// Meters from the look-at point.
    pub range: f64,
    pub heading: f64,
    pub tilt: f64,
    /// Vertical field of view in degrees.
    pub field_of_view: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Draw the terrain tessellation wireframe.
    pub show_tessellation: bool,
    /// Log frame statistics after every frame.
    pub log_frame_statistics: bool,
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            title: "Orbis".to_string(),
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            clear_color: [0.0, 0.0, 0.0, 1.0],
            detail_factor: 2.0,
            vertical_exaggeration: 1.0,
            max_level: 12,
            num_lat_cells: 16,
            num_lon_cells: 16,
            worker_count: 2,
            use_gpu: false,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            gpu_resource_capacity: 64 * 1024 * 1024,
            gpu_resource_low_water: 48 * 1024 * 1024,
            terrain_tile_capacity: 64 * 1024 * 1024,
            terrain_tile_low_water: 48 * 1024 * 1024,
        }
    }
}

impl Default for NavigatorConfig {
    fn default() -> Self {
        Self {
            latitude: 0.0,
            longitude: 0.0,
            range: 1.5e7,
            heading: 0.0,
            tilt: 0.0,
            field_of_view: 45.0,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            show_tessellation: false,
            log_frame_statistics: false,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE);

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
            let config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::WriteError)?;

        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);
        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(config_dir.join(CONFIG_FILE), serialized).map_err(ConfigError::WriteError)?;
        Ok(())
    }

    /// Re-reads the file. Returns `Some(new_config)` only when it differs from `self`.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE);
        let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
        let new_config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;

        if &new_config != self {
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }
}
