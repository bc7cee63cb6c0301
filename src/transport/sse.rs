//! Event-stream HTTP surface
//!
//! Builds the axum router that turns a `GET` request into a subscription:
//! - the filter comes from the `topic` query parameter when present,
//!   otherwise from the request path below the route prefix
//! - requests outside the route prefix get 404 before anything is registered
//! - an accepted request is registered and answered with an endless
//!   `text/event-stream` body fed from the subscriber's queue
//!
//! The response body is drained by the connection task hyper spawns for the
//! socket. When the connection dies or the body is dropped for any other
//! reason, the [`EventStream`] guard unregisters the subscriber.

use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::Router;
use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use bytes::Bytes;
use futures_util::Stream;
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::broker::registry::{Registry, SubscriberId, Subscription};
use crate::broker::topic::normalize_filter;
use crate::transport::codec::CONTENT_TYPE;

#[derive(Debug, Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
    pub queue_capacity: usize,
}

#[derive(Debug, Default, Deserialize)]
pub struct SubscribeParams {
    pub topic: Option<String>,
}

/// Normalizes a route prefix to the `/prefix` form, or `None` for the root.
pub fn normalize_prefix(prefix: Option<&str>) -> Option<String> {
    prefix
        .map(|p| p.trim_matches('/'))
        .filter(|p| !p.is_empty())
        .map(|p| format!("/{p}"))
}

pub fn router(state: AppState, route_prefix: Option<&str>) -> Router {
    let base = normalize_prefix(route_prefix).unwrap_or_default();
    let root = if base.is_empty() { "/".to_string() } else { base.clone() };

    Router::new()
        .route(&root, get(subscribe_root))
        .route(&format!("{base}/{{*topic}}"), get(subscribe_topic))
        .fallback(not_found)
        .with_state(state)
}

async fn subscribe_root(
    State(state): State<AppState>,
    Query(params): Query<SubscribeParams>,
) -> Response {
    let filter = params.topic.unwrap_or_default();
    open_stream(state, &filter)
}

async fn subscribe_topic(
    State(state): State<AppState>,
    Path(topic): Path<String>,
    Query(params): Query<SubscribeParams>,
) -> Response {
    // query parameter wins over the path form
    let filter = params.topic.unwrap_or(topic);
    open_stream(state, &filter)
}

async fn not_found(uri: Uri) -> Response {
    debug!(path = %uri.path(), "subscription request outside route prefix");
    (StatusCode::NOT_FOUND, "404 page not found\n").into_response()
}

fn open_stream(state: AppState, raw_filter: &str) -> Response {
    let filter = normalize_filter(raw_filter);
    let subscription = match state.registry.register(filter, state.queue_capacity) {
        Ok(subscription) => subscription,
        Err(e) => {
            warn!(error = %e, "rejecting subscription");
            return (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response();
        }
    };
    info!(
        subscriber = %subscription.id,
        filter = %subscription.filter,
        "subscriber connected"
    );

    let stream = EventStream::new(subscription, state.registry);
    (
        [
            (header::CONTENT_TYPE, CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(stream),
    )
        .into_response()
}

/// Response body of one subscriber: yields queued frames, ends when the
/// queue closes, unregisters the subscriber when dropped.
#[derive(Debug)]
pub struct EventStream {
    id: SubscriberId,
    receiver: mpsc::Receiver<Bytes>,
    registry: Arc<Registry>,
}

impl EventStream {
    pub fn new(subscription: Subscription, registry: Arc<Registry>) -> Self {
        Self {
            id: subscription.id,
            receiver: subscription.receiver,
            registry,
        }
    }
}

impl Stream for EventStream {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx).map(|frame| frame.map(Ok))
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        if self.registry.unregister(&self.id) {
            info!(subscriber = %self.id, "subscriber disconnected");
        }
    }
}
