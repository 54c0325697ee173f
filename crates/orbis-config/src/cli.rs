//! Command-line argument parsing.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;

/// Command-line arguments. Values given here override `config.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "orbis", about = "Headless globe renderer")]
pub struct CliArgs {
    /// Target width in pixels.
    #[arg(long)]
    pub width: Option<u32>,

    /// Target height in pixels.
    #[arg(long)]
    pub height: Option<u32>,

    /// Look-at latitude in degrees.
    #[arg(long, allow_negative_numbers = true)]
    pub latitude: Option<f64>,

    /// Look-at longitude in degrees.
    #[arg(long, allow_negative_numbers = true)]
    pub longitude: Option<f64>,

    /// Camera range in meters.
    #[arg(long)]
    pub range: Option<f64>,

    #[arg(long)]
    pub vertical_exaggeration: Option<f64>,

    /// Deepest tessellation level.
    #[arg(long)]
    pub max_level: Option<usize>,

    /// Render with wgpu instead of the software rasterizer.
    #[arg(long)]
    pub gpu: Option<bool>,

    /// Draw the tessellation wireframe.
    #[arg(long)]
    pub show_tessellation: Option<bool>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Number of frames to render.
    #[arg(long, default_value_t = 8)]
    pub frames: u32,

    /// Where to write the final frame as PNG.
    #[arg(long)]
    pub output: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(w) = args.width {
            self.window.width = w;
        }
        if let Some(h) = args.height {
            self.window.height = h;
        }
        if let Some(lat) = args.latitude {
            self.navigator.latitude = lat;
        }
        if let Some(lon) = args.longitude {
            self.navigator.longitude = lon;
        }
        if let Some(range) = args.range {
            self.navigator.range = range;
        }
        if let Some(ve) = args.vertical_exaggeration {
            self.render.vertical_exaggeration = ve;
        }
        if let Some(level) = args.max_level {
            self.render.max_level = level;
        }
        if let Some(gpu) = args.gpu {
            self.render.use_gpu = gpu;
        }
        if let Some(show) = args.show_tessellation {
            self.debug.show_tessellation = show;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_override() {
        let mut config = Config::default();
        let args = CliArgs {
            width: Some(1920),
            latitude: Some(-33.9),
            gpu: Some(true),
            ..Default::default()
        };
        config.apply_cli_overrides(&args);
        assert_eq!(config.window.width, 1920);
        assert_eq!(config.navigator.latitude, -33.9);
        assert!(config.render.use_gpu);
        // Non-overridden fields retain defaults
        assert_eq!(config.window.height, 600);
        assert_eq!(config.navigator.range, 1.5e7);
    }

    #[test]
    fn test_cli_no_override() {
        let original = Config::default();
        let mut config = Config::default();
        config.apply_cli_overrides(&CliArgs::default());
        assert_eq!(config, original);
    }

    #[test]
    fn test_parse_flags() {
        let args = CliArgs::try_parse_from([
            "orbis",
            "--longitude",
            "-122.4",
            "--frames",
            "3",
            "--show-tessellation",
            "true",
        ])
        .unwrap();
        assert_eq!(args.longitude, Some(-122.4));
        assert_eq!(args.frames, 3);
        assert_eq!(args.show_tessellation, Some(true));
        assert!(args.output.is_none());
    }
}
