//! Messages received by a subscriber.

use bytes::Bytes;
use serde::de::DeserializeOwned;

use crate::transport::codec::Frame;
use crate::utils::{BrokerError, Result};

/// One event received on a subscription: its topic and the raw payload.
///
/// Decoding does not consume the message; the same payload can be decoded
/// into different types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    topic: String,
    data: Bytes,
}

impl Message {
    pub fn new(topic: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            data: data.into(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// The payload exactly as it was received.
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Deserializes the payload into `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.data).map_err(|source| BrokerError::Decode {
            topic: self.topic.clone(),
            source,
        })
    }

    /// Deserializes the payload into `dest`. On error `dest` is left as it was.
    pub fn decode_into<T: DeserializeOwned>(&self, dest: &mut T) -> Result<()> {
        *dest = self.decode()?;
        Ok(())
    }
}

impl From<Frame> for Message {
    fn from(frame: Frame) -> Self {
        Self {
            topic: frame.topic,
            data: frame.data,
        }
    }
}
