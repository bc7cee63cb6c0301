use std::sync::Arc;

use bytes::Bytes;
use futures_util::StreamExt;

use super::codec::{Decoder, Frame, encode};
use super::sse::{EventStream, normalize_prefix};
use crate::broker::registry::Registry;
use crate::utils::BrokerError;

fn decode_all(bytes: &[u8]) -> Vec<Frame> {
    let mut decoder = Decoder::new();
    decoder.extend(bytes);
    std::iter::from_fn(|| decoder.next_frame().unwrap()).collect()
}

#[test]
fn test_encode_layout() {
    let frame = encode("local/time/tick", br#"{"tick":1}"#).unwrap();
    assert_eq!(frame, "event: local/time/tick\ndata: {\"tick\":1}\n\n");
}

#[test]
fn test_encode_splits_multiline_payload() {
    let frame = encode("x", b"line one\nline two").unwrap();
    assert_eq!(frame, "event: x\ndata: line one\ndata: line two\n\n");

    let decoded = decode_all(&frame);
    assert_eq!(decoded.len(), 1);
    assert_eq!(decoded[0].data, "line one\nline two");
}

#[test]
fn test_encode_rejects_line_breaks_in_topic() {
    assert!(matches!(
        encode("a\r\nb", b"1"),
        Err(BrokerError::InvalidTopic(_))
    ));
}

#[test]
fn test_decode_frames_split_across_chunks() {
    let mut stream = Vec::new();
    stream.extend_from_slice(&encode("local/a", b"1").unwrap());
    stream.extend_from_slice(&encode("local/b", b"\"two\"").unwrap());

    let mut decoder = Decoder::new();
    let mut frames = Vec::new();
    for chunk in stream.chunks(3) {
        decoder.extend(chunk);
        while let Some(frame) = decoder.next_frame().unwrap() {
            frames.push(frame);
        }
    }

    assert_eq!(
        frames,
        vec![
            Frame {
                topic: "local/a".to_string(),
                data: Bytes::from_static(b"1"),
            },
            Frame {
                topic: "local/b".to_string(),
                data: Bytes::from_static(b"\"two\""),
            },
        ]
    );
    assert_eq!(decoder.pending(), 0);
}

#[test]
fn test_decode_incomplete_frame_waits() {
    let mut decoder = Decoder::new();
    decoder.extend(b"event: x\ndata: 42\n");
    assert!(decoder.next_frame().unwrap().is_none());
    assert!(decoder.pending() > 0);

    decoder.extend(b"\n");
    assert_eq!(decoder.next_frame().unwrap().unwrap().data, "42");
}

#[test]
fn test_decode_large_payload_in_small_chunks() {
    let payload = vec![b'7'; 64 * 1024];
    let frame = encode("big", &payload).unwrap();

    let mut decoder = Decoder::new();
    let mut frames = Vec::new();
    for chunk in frame.chunks(7) {
        decoder.extend(chunk);
        while let Some(frame) = decoder.next_frame().unwrap() {
            frames.push(frame);
        }
    }

    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].data.len(), payload.len());
    assert_eq!(decoder.pending(), 0);
}

#[test]
fn test_decode_rejects_oversized_line() {
    let mut decoder = Decoder::with_max_line_len(16);
    decoder.extend(b"event: x\ndata: 12345");
    assert!(decoder.next_frame().unwrap().is_none());

    // no line break in sight and the limit is exceeded
    decoder.extend(b"678901234567890");
    assert!(matches!(
        decoder.next_frame(),
        Err(BrokerError::LineTooLong { limit: 16 })
    ));
}

#[test]
fn test_decode_rejects_oversized_complete_line() {
    let mut decoder = Decoder::with_max_line_len(8);
    decoder.extend(b"data: 1234567890\n\n");
    assert!(matches!(
        decoder.next_frame(),
        Err(BrokerError::LineTooLong { limit: 8 })
    ));
}

#[test]
fn test_decode_tolerates_crlf_comments_and_unknown_fields() {
    let raw = b": keep-alive\r\nid: 7\r\nevent: x/y\r\nretry: 100\r\ndata:42\r\n\r\n";
    let frames = decode_all(raw);
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].topic, "x/y");
    assert_eq!(frames[0].data, "42");
}

#[test]
fn test_decode_skips_blocks_without_data() {
    let frames = decode_all(b"event: lonely\n\ndata: 1\n\n");
    assert_eq!(frames.len(), 1);
    // the event name does not leak into the next block
    assert_eq!(frames[0].topic, "");
    assert_eq!(frames[0].data, "1");
}

#[test]
fn test_normalize_prefix() {
    assert_eq!(normalize_prefix(None), None);
    assert_eq!(normalize_prefix(Some("")), None);
    assert_eq!(normalize_prefix(Some("/")), None);
    assert_eq!(normalize_prefix(Some("events")), Some("/events".to_string()));
    assert_eq!(normalize_prefix(Some("/events/")), Some("/events".to_string()));
    assert_eq!(normalize_prefix(Some("api/events")), Some("/api/events".to_string()));
}

#[tokio::test]
async fn test_event_stream_yields_queued_frames_and_unregisters_on_drop() {
    let registry = Arc::new(Registry::new());
    let subscription = registry.register("local", 4).unwrap();
    let subscriber = registry.snapshot().pop().unwrap();

    let mut stream = EventStream::new(subscription, registry.clone());
    subscriber.deliver(Bytes::from_static(b"frame"));

    let next = stream.next().await.unwrap().unwrap();
    assert_eq!(next, "frame");

    drop(stream);
    assert!(registry.is_empty());
    assert!(!subscriber.is_alive());
}

#[tokio::test]
async fn test_event_stream_ends_when_registry_closes() {
    let registry = Arc::new(Registry::new());
    let subscription = registry.register("", 4).unwrap();
    let mut stream = EventStream::new(subscription, registry.clone());

    registry.close();
    assert!(stream.next().await.is_none());
}
