//! Headless globe demo: orbits the camera, picks the view center, and writes
//! the last frame to a PNG.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use glam::DVec2;
use orbis_config::{CliArgs, Config};
use orbis_geom::{Ellipsoid, Location, Position, Viewport};
use orbis_navigate::LookAtNavigator;
use orbis_render::{
    Color, Graphics, Placemark, RenderError, RenderableLayer, SceneController, SceneOptions,
    ShapeId, ShowTessellationLayer, SoftwareGraphics, SurfaceLayer, WgpuGraphics,
};
use orbis_terrain::{Globe, ProceduralElevationModel, TerrainError, TessellatorConfig};
use tracing::{error, info, warn};

/// Degrees of longitude the camera moves per frame.
const ORBIT_STEP: f64 = 5.0;

#[derive(Debug, thiserror::Error)]
enum DemoError {
    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Terrain(#[from] TerrainError),

    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode PNG: {0}")]
    Png(#[from] png::EncodingError),
}

fn main() {
    let args = CliArgs::parse();

    let config_dir = args
        .config
        .clone()
        .or_else(|| dirs::config_dir().map(|d| d.join("orbis")))
        .unwrap_or_else(|| PathBuf::from(".orbis"));

    let mut config = Config::load_or_create(&config_dir).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}, using defaults");
        Config::default()
    });
    config.apply_cli_overrides(&args);

    let log_dir = config_dir.join("logs");
    orbis_log::init_logging(Some(&log_dir), cfg!(debug_assertions), Some(&config));

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from("orbis-frame.png"));
    if let Err(e) = run(&config, args.frames, &output) {
        error!("Demo failed: {e}");
        std::process::exit(1);
    }
}

fn run(config: &Config, frames: u32, output: &Path) -> Result<(), DemoError> {
    let mut scene = build_scene(config)?;
    let (width, height) = (config.window.width, config.window.height);
    let viewport = Viewport::new(0, 0, width, height);

    for frame in 0..frames.max(1) {
        scene.render(viewport)?;
        let stats = scene.statistics();
        if config.debug.log_frame_statistics {
            info!(
                frame,
                tiles = stats.terrain_tile_count,
                renderables = stats.ordered_renderable_count,
                gpu_cache_used = stats.gpu_cache_used,
                "frame {:.2} ms (terrain {:.2} ms)",
                stats.frame_time_ms(),
                stats.terrain_time.as_secs_f64() * 1000.0,
            );
        }
        if frame + 1 < frames {
            let look_at = &mut scene.navigator_mut().look_at;
            look_at.longitude = wrap_longitude(look_at.longitude + ORBIT_STEP);
        }
    }

    let center = DVec2::new(f64::from(width) / 2.0, f64::from(height) / 2.0);
    let picked = scene.pick(viewport, center)?;
    match picked.top_picked_object() {
        Some(object) => info!(
            "Picked {:?} at {:?} (layer {:?})",
            object.target(),
            object.position(),
            object.layer_name()
        ),
        None => info!("Nothing under the view center"),
    }

    // The pick frame overwrote the target; draw the scene once more.
    scene.render(viewport)?;
    let pixels = scene.graphics_mut().read_frame()?;
    write_png(output, width, height, &pixels)?;
    info!("Wrote {}", output.display());

    scene.dispose()?;
    Ok(())
}

fn build_scene(config: &Config) -> Result<SceneController<LookAtNavigator>, DemoError> {
    let (width, height) = (config.window.width, config.window.height);
    let graphics = create_graphics(config.render.use_gpu, width, height)?;

    let tessellator = TessellatorConfig {
        detail_factor: config.render.detail_factor,
        max_level: config.render.max_level,
        num_lat_cells: config.render.num_lat_cells,
        num_lon_cells: config.render.num_lon_cells,
        worker_count: config.render.worker_count,
        tile_cache_capacity: config.cache.terrain_tile_capacity,
        tile_cache_low_water: config.cache.terrain_tile_low_water,
        ..Default::default()
    };
    let elevation = Arc::new(ProceduralElevationModel::new(4000.0, 20.0));
    let globe = Globe::new(Ellipsoid::WGS84, elevation, &tessellator)?;

    let nav = &config.navigator;
    let navigator = LookAtNavigator {
        look_at: Location::new(nav.latitude, nav.longitude),
        range: nav.range,
        heading: nav.heading,
        tilt: nav.tilt,
        field_of_view: nav.field_of_view,
        ..Default::default()
    };

    let [r, g, b, a] = config.render.clear_color;
    let options = SceneOptions {
        clear_color: Color::new(r, g, b, a),
        vertical_exaggeration: config.render.vertical_exaggeration,
        gpu_cache_capacity: config.cache.gpu_resource_capacity,
        gpu_cache_low_water: config.cache.gpu_resource_low_water,
    };

    let mut scene = SceneController::new(graphics, globe, navigator, &options)?;
    let layers = scene.layers_mut();
    layers.add(Box::new(SurfaceLayer::new(Color::new(0.18, 0.35, 0.22, 1.0))));
    if config.debug.show_tessellation {
        layers.add(Box::new(ShowTessellationLayer::new()));
    }
    layers.add(Box::new(city_layer()));
    Ok(scene)
}

fn create_graphics(
    use_gpu: bool,
    width: u32,
    height: u32,
) -> Result<Box<dyn Graphics>, DemoError> {
    if use_gpu {
        match WgpuGraphics::new(width, height) {
            Ok(graphics) => return Ok(Box::new(graphics)),
            Err(e) => warn!("GPU backend unavailable ({e}), falling back to software"),
        }
    }
    Ok(Box::new(SoftwareGraphics::new(width, height)?))
}

fn city_layer() -> RenderableLayer {
    let cities = [
        ("London", 51.5074, -0.1278),
        ("Lagos", 6.5244, 3.3792),
        ("Cairo", 30.0444, 31.2357),
        ("Sao Paulo", -23.5505, -46.6333),
        ("New York", 40.7128, -74.0060),
        ("Tokyo", 35.6762, 139.6503),
        ("Sydney", -33.8688, 151.2093),
    ];
    let mut layer = RenderableLayer::new("Cities");
    for (id, (name, lat, lon)) in cities.into_iter().enumerate() {
        tracing::debug!("Adding placemark {name}");
        layer.add_placemark(
            Placemark::new(ShapeId(id as u64), Position::new(lat, lon, 1.0e4))
                .with_size(10.0)
                .with_color(Color::new(1.0, 0.85, 0.2, 1.0)),
        );
    }
    layer
}

fn wrap_longitude(longitude: f64) -> f64 {
    (longitude + 180.0).rem_euclid(360.0) - 180.0
}

fn write_png(path: &Path, width: u32, height: u32, rgba: &[u8]) -> Result<(), DemoError> {
    let io_err = |source| DemoError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = std::fs::File::create(path).map_err(io_err)?;
    let mut encoder = png::Encoder::new(std::io::BufWriter::new(file), width, height);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header()?;
    writer.write_image_data(rgba)?;
    writer.finish()?;
    Ok(())
}
