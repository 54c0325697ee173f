//! Settings for the globe viewer, persisted as `config.ron`.
//!
//! Every section defaults independently, so files written by older or newer
//! builds still load. Command-line flags override the loaded values.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{CacheConfig, Config, DebugConfig, NavigatorConfig, RenderConfig, WindowConfig};
pub use error::ConfigError;
