//! The `transport` module is responsible for the bytes on the wire between
//! the broker and its subscribers.
//!
//! It defines the event-stream framing shared by both sides and the HTTP
//! routes the broker serves on its Unix socket.

pub mod codec;
pub mod sse;

#[cfg(test)]
mod tests;
