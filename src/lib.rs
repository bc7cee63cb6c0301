//! # PopCast
//!
//! `popcast` is a lightweight, in-memory topic broker that streams events to
//! subscribers over HTTP on a Unix domain socket.
//!
//! Publishers call [`Broker::publish`] with a topic such as `local/time/tick`
//! and any serializable value. Subscribers call [`client::subscribe`] with a
//! topic filter and receive every later event whose topic falls under it.
//!
//! ## Core Modules
//!
//! - `broker`: topic matching, the subscriber registry and the engine that
//!   binds the socket and fans events out.
//! - `client`: address resolution and the event-stream subscriber.
//! - `config`: loading server and logging configuration.
//! - `transport`: the event-stream wire codec and the HTTP routes.
//! - `utils`: the shared error type and logging setup.

pub mod broker;
pub mod client;
pub mod config;
pub mod transport;
pub mod utils;

pub use broker::{Broker, listen_and_serve_on_socket};
pub use utils::{BrokerError, Result};
