use std::path::PathBuf;

use serde::Deserialize;

/// Top-level configuration settings for the application.
///
/// Includes settings for the broker server and for logging.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
}

/// Configuration settings for the broker server.
///
/// `route_prefix` restricts subscriptions to paths below it; `queue_capacity`
/// bounds the number of frames buffered per subscriber.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub socket_path: PathBuf,
    pub route_prefix: Option<String>,
    pub queue_capacity: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSettings {
    pub level: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Allows partial specification of settings. Missing values can be filled using defaults.
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub logging: Option<PartialLoggingSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialServerSettings {
    pub socket_path: Option<PathBuf>,
    pub route_prefix: Option<String>,
    pub queue_capacity: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct PartialLoggingSettings {
    pub level: Option<String>,
}

/// Provides default values for `Settings`.
impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                socket_path: PathBuf::from("/tmp/popcast/broker.sock"),
                route_prefix: None,
                queue_capacity: 256,
            },
            logging: LoggingSettings {
                level: "info".to_string(),
            },
        }
    }
}
