//! CLI for PopCast
//!
//! Subcommands:
//! - `serve`: run the broker on the configured socket, optionally publishing
//!   a tick on `local/time/tick`
//! - `subscribe`: print every event received for a topic filter

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use popcast::broker::Broker;
use popcast::client::{self, Options};
use popcast::config::load_config;
use popcast::utils::logging;
use serde::Serialize;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "popcast")]
enum Command {
    /// Start the broker
    Serve {
        /// Publish a tick on `local/time/tick` every N milliseconds (0 disables it)
        #[arg(long, default_value_t = 0)]
        tick_interval_ms: u64,
    },
    /// Subscribe to a topic filter and print the events
    Subscribe {
        /// Broker address, e.g. unix://broker/tmp/popcast/broker.sock
        #[arg(long)]
        address: String,
        /// Topic filter; empty subscribes to everything
        #[arg(long, default_value = "")]
        topic: String,
        /// Directory relative socket paths are resolved against
        #[arg(long)]
        socket_dir: Option<PathBuf>,
        /// Route prefix the broker serves subscriptions under
        #[arg(long)]
        path: Option<String>,
    },
}

#[derive(Debug, Serialize)]
struct Tick {
    tick: u64,
    time: i64,
}

#[tokio::main]
async fn main() {
    let command = Command::parse();
    let _ = dotenvy::dotenv();

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };
    logging::init(&config.logging.level);

    let result = match command {
        Command::Serve { tick_interval_ms } => run_server(config.server, tick_interval_ms).await,
        Command::Subscribe {
            address,
            topic,
            socket_dir,
            path,
        } => {
            let options = Options { socket_dir, path };
            run_subscriber(&address, &topic, &options).await
        }
    };

    if let Err(e) = result {
        error!("{e}");
        std::process::exit(1);
    }
}

async fn run_server(
    settings: popcast::config::ServerSettings,
    tick_interval_ms: u64,
) -> popcast::Result<()> {
    let broker = Broker::bind(&settings).await?;

    let ticker = async {
        if tick_interval_ms == 0 {
            return std::future::pending::<()>().await;
        }
        let mut interval = tokio::time::interval(Duration::from_millis(tick_interval_ms));
        let mut tick = 0u64;
        loop {
            interval.tick().await;
            tick += 1;
            let value = Tick {
                tick,
                time: chrono::Utc::now().timestamp_millis(),
            };
            if let Err(e) = broker.publish("local/time/tick", &value) {
                error!(error = %e, "failed to publish tick");
                return;
            }
        }
    };

    tokio::select! {
        _ = ticker => {
            error!("Ticker exited unexpectedly.");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Exiting gracefully.");
        }
    }

    broker.stop();
    Ok(())
}

async fn run_subscriber(address: &str, topic: &str, options: &Options) -> popcast::Result<()> {
    let (mut messages, mut errors) = client::subscribe(address, topic, options).await?;

    loop {
        tokio::select! {
            message = messages.recv() => match message {
                Some(message) => {
                    println!("{} {}", message.topic(), String::from_utf8_lossy(message.data()));
                }
                None => {
                    info!("Event stream ended.");
                    break;
                }
            },
            Some(e) = errors.recv() => return Err(e),
        }
    }

    // the stream may have ended because of a terminal error
    match errors.recv().await {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
