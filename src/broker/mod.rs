//! The `broker` module is the server side of the event stream: topic
//! matching, the subscriber registry and the engine that binds the socket and
//! fans published values out.

pub mod engine;
pub mod registry;
pub mod topic;

pub use engine::{Broker, State, listen_and_serve_on_socket};
pub use registry::{Registry, SubscriberId};
