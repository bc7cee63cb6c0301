//! Event-stream wire codec
//!
//! Every event is written as an `event: <topic>` line, one `data: <line>`
//! line per payload line, and a terminating blank line:
//!
//! ```text
//! event: local/time/tick
//! data: {"tick":1}
//!
//! ```
//!
//! The decoder is incremental: bytes arrive in arbitrary chunks from the
//! connection and complete events are handed out once their blank line has
//! been seen. Each byte is scanned for a line break once, and a single line
//! may not grow beyond [`MAX_LINE_LEN`].

use bytes::{BufMut, Bytes, BytesMut};

use crate::utils::{BrokerError, Result};

pub const CONTENT_TYPE: &str = "text/event-stream";

/// Longest line the decoder buffers before giving up on the stream.
pub const MAX_LINE_LEN: usize = 16 * 1024 * 1024;

/// One decoded event: the topic and the raw payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub topic: String,
    pub data: Bytes,
}

/// Encodes one event. Payload line breaks become separate `data:` lines.
pub fn encode(topic: &str, payload: &[u8]) -> Result<Bytes> {
    if topic.contains(['\r', '\n']) {
        return Err(BrokerError::InvalidTopic(topic.to_string()));
    }

    let mut buf = BytesMut::with_capacity(topic.len() + payload.len() + 16);
    buf.put_slice(b"event: ");
    buf.put_slice(topic.as_bytes());
    buf.put_u8(b'\n');
    for line in payload.split(|b| *b == b'\n') {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        buf.put_slice(b"data: ");
        buf.put_slice(line);
        buf.put_u8(b'\n');
    }
    buf.put_u8(b'\n');
    Ok(buf.freeze())
}

#[derive(Debug)]
pub struct Decoder {
    buf: BytesMut,
    // bytes of `buf` already known to hold no line break
    scanned: usize,
    max_line_len: usize,
    topic: Option<String>,
    data: BytesMut,
    has_data: bool,
}

impl Default for Decoder {
    fn default() -> Self {
        Self::with_max_line_len(MAX_LINE_LEN)
    }
}

impl Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_line_len(max_line_len: usize) -> Self {
        Self {
            buf: BytesMut::new(),
            scanned: 0,
            max_line_len,
            topic: None,
            data: BytesMut::new(),
            has_data: false,
        }
    }

    /// Appends bytes read from the connection.
    pub fn extend(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Returns the next complete event, or `None` until more bytes arrive.
    ///
    /// Fails with [`BrokerError::LineTooLong`] once a line exceeds the limit;
    /// the stream cannot be resynchronized after that.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        loop {
            let Some(offset) = self.buf[self.scanned..].iter().position(|b| *b == b'\n') else {
                self.scanned = self.buf.len();
                if self.scanned > self.max_line_len {
                    return Err(BrokerError::LineTooLong {
                        limit: self.max_line_len,
                    });
                }
                return Ok(None);
            };
            let pos = self.scanned + offset;
            self.scanned = 0;
            if pos > self.max_line_len {
                return Err(BrokerError::LineTooLong {
                    limit: self.max_line_len,
                });
            }

            let mut line = self.buf.split_to(pos + 1);
            line.truncate(pos);
            if line.last() == Some(&b'\r') {
                line.truncate(pos - 1);
            }

            if line.is_empty() {
                if let Some(frame) = self.dispatch() {
                    return Ok(Some(frame));
                }
                continue;
            }
            self.field(&line);
        }
    }

    /// Bytes buffered but not yet part of a complete event.
    pub fn pending(&self) -> usize {
        self.buf.len() + self.data.len()
    }

    fn field(&mut self, line: &[u8]) {
        // comment / keep-alive
        if line[0] == b':' {
            return;
        }
        let (name, value) = match line.iter().position(|b| *b == b':') {
            Some(i) => {
                let value = &line[i + 1..];
                (&line[..i], value.strip_prefix(b" ").unwrap_or(value))
            }
            None => (line, &b""[..]),
        };

        match name {
            b"event" => self.topic = Some(String::from_utf8_lossy(value).into_owned()),
            b"data" => {
                if self.has_data {
                    self.data.put_u8(b'\n');
                }
                self.data.put_slice(value);
                self.has_data = true;
            }
            _ => {}
        }
    }

    fn dispatch(&mut self) -> Option<Frame> {
        let topic = self.topic.take();
        if !self.has_data {
            return None;
        }
        self.has_data = false;
        Some(Frame {
            topic: topic.unwrap_or_default(),
            data: self.data.split().freeze(),
        })
    }
}
