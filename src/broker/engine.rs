//! Broker engine
//!
//! The broker binds an HTTP server on a Unix domain socket and fans published
//! values out to every subscriber whose filter matches the topic.
//!
//! Concurrency and usage notes:
//! - `publish` is synchronous and never waits on subscriber I/O. It encodes
//!   the value once, takes a registry snapshot and queues the frame on each
//!   matching subscriber with `try_send`.
//! - Each subscriber queue is drained by the connection task serving that
//!   subscriber, so a slow or dead peer only ever fills its own queue. A
//!   subscriber that lets its queue fill up is evicted and its stream ends.
//! - `stop` closes the registry (ending every event stream) and signals the
//!   accept loop to shut down gracefully.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::net::UnixListener;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::broker::registry::{Delivery, Registry};
use crate::config::ServerSettings;
use crate::transport::codec;
use crate::transport::sse::{self, AppState};
use crate::utils::{BrokerError, Result};

/// Lifecycle of a broker. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Created,
    Listening,
    Stopped,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            State::Created => "created",
            State::Listening => "listening",
            State::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

pub struct Broker {
    socket_path: PathBuf,
    route_prefix: Option<String>,
    pub(crate) registry: Arc<Registry>,
    state: Mutex<State>,
    shutdown: watch::Sender<bool>,
}

impl Broker {
    /// Default number of frames buffered per subscriber.
    pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

    /// Binds the socket described by `settings` and starts serving
    /// subscriptions.
    ///
    /// Must be called from within a tokio runtime. Fails with
    /// [`BrokerError::Bind`] if the socket path exists or is not writable.
    pub async fn bind(settings: &ServerSettings) -> Result<Self> {
        let socket_path = settings.socket_path.clone();
        let route_prefix = sse::normalize_prefix(settings.route_prefix.as_deref());

        // Drop removes the socket file, so no Broker exists until bind succeeded
        let listener = UnixListener::bind(&socket_path).map_err(|source| BrokerError::Bind {
            path: socket_path.clone(),
            source,
        })?;

        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let mut broker = Self {
            socket_path,
            route_prefix,
            registry: Arc::new(Registry::new()),
            state: Mutex::new(State::Created),
            shutdown,
        };

        let app = sse::router(
            AppState {
                registry: broker.registry.clone(),
                queue_capacity: settings.queue_capacity,
            },
            broker.route_prefix.as_deref(),
        );

        let path = broker.socket_path.clone();
        tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.wait_for(|stopped| *stopped).await;
            });
            if let Err(e) = server.await {
                error!(socket = %path.display(), error = %e, "broker server failed");
            }
            debug!(socket = %path.display(), "accept loop exited");
        });

        *broker.state.get_mut() = State::Listening;
        info!(
            socket = %broker.socket_path.display(),
            route_prefix = broker.route_prefix.as_deref().unwrap_or("/"),
            "broker listening"
        );
        Ok(broker)
    }

    pub fn state(&self) -> State {
        *self.state.lock()
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// The normalized route prefix (`/events`), if any.
    pub fn route_prefix(&self) -> Option<&str> {
        self.route_prefix.as_deref()
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.len()
    }

    /// Serializes `value` once and queues it for every subscriber whose
    /// filter matches `topic`.
    ///
    /// Only encoding failures and a stopped broker are reported. A subscriber
    /// whose queue is closed or full is unregistered here and logged.
    pub fn publish<T>(&self, topic: &str, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        if self.state() == State::Stopped {
            return Err(BrokerError::Stopped);
        }

        let payload = serde_json::to_vec(value).map_err(|source| BrokerError::Encode {
            topic: topic.to_string(),
            source,
        })?;
        let frame = codec::encode(topic, &payload)?;

        for subscriber in self.registry.snapshot() {
            if !subscriber.matches(topic) {
                continue;
            }
            match subscriber.deliver(frame.clone()) {
                Delivery::Queued => {}
                Delivery::Evicted => {
                    warn!(
                        subscriber = %subscriber.id,
                        topic = %topic,
                        "subscriber queue full, evicting subscriber"
                    );
                    self.registry.unregister(&subscriber.id);
                }
                Delivery::Closed => {
                    debug!(subscriber = %subscriber.id, "subscriber gone, unregistering");
                    self.registry.unregister(&subscriber.id);
                }
            }
        }
        Ok(())
    }

    /// Stops accepting subscriptions and ends every open event stream.
    /// Calling it again has no effect.
    pub fn stop(&self) {
        {
            let mut state = self.state.lock();
            if *state == State::Stopped {
                return;
            }
            *state = State::Stopped;
        }

        let closed = self.registry.close();
        let _ = self.shutdown.send(true);

        if let Err(e) = std::fs::remove_file(&self.socket_path) {
            debug!(socket = %self.socket_path.display(), error = %e, "socket file not removed");
        }
        info!(
            socket = %self.socket_path.display(),
            subscribers = closed,
            "broker stopped"
        );
    }
}

impl Drop for Broker {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for Broker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Broker")
            .field("socket_path", &self.socket_path)
            .field("route_prefix", &self.route_prefix)
            .field("state", &self.state())
            .field("subscribers", &self.registry.len())
            .finish()
    }
}

/// Binds a broker at `socket_path` with the default queue capacity.
///
/// With a `route_prefix` such as `"/events"`, only subscriptions below that
/// path are accepted; every other request is answered with 404.
pub async fn listen_and_serve_on_socket(
    socket_path: impl AsRef<Path>,
    route_prefix: Option<&str>,
) -> Result<Broker> {
    let settings = ServerSettings {
        socket_path: socket_path.as_ref().to_path_buf(),
        route_prefix: route_prefix.map(str::to_string),
        queue_capacity: Broker::DEFAULT_QUEUE_CAPACITY,
    };
    Broker::bind(&settings).await
}
