//! The `client` module is the subscriber side of the event stream.
//!
//! It resolves `unix://` broker addresses, opens the streaming request and
//! exposes the received events as [`Message`]s that decode on demand.

pub mod address;
pub mod message;
pub mod pubsub_client;

pub use message::Message;
pub use pubsub_client::{Errors, Messages, Options, subscribe};
