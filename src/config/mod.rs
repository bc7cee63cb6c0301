mod settings;

use crate::config::settings::PartialSettings;
use config::{Config, ConfigError, Environment, File};

pub use settings::{LoggingSettings, ServerSettings, Settings};

/// Prefix of the environment variables read by [`load_config`], e.g.
/// `POPCAST_SERVER__SOCKET_PATH`.
pub const ENV_PREFIX: &str = "POPCAST";

/// Loads the configuration from the default file and environment variables
/// Merges the configuration with default values
/// Returns a `Settings` struct containing the server and logging configurations
pub fn load_config() -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

    let config = builder.build()?;

    // Try to deserialize what is available
    let partial: PartialSettings = config.try_deserialize()?;

    // Merge with defaults
    let default = Settings::default();
    let server = partial.server;
    let logging = partial.logging;

    Ok(Settings {
        server: ServerSettings {
            socket_path: server
                .as_ref()
                .and_then(|s| s.socket_path.clone())
                .unwrap_or(default.server.socket_path),
            route_prefix: server
                .as_ref()
                .and_then(|s| s.route_prefix.clone())
                .filter(|p| !p.trim_matches('/').is_empty())
                .or(default.server.route_prefix),
            queue_capacity: server
                .as_ref()
                .and_then(|s| s.queue_capacity)
                .unwrap_or(default.server.queue_capacity),
        },
        logging: LoggingSettings {
            level: logging
                .as_ref()
                .and_then(|l| l.level.clone())
                .unwrap_or(default.logging.level),
        },
    })
}
