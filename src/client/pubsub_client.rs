//! Subscriber client
//!
//! `subscribe` dials the broker socket, sends the subscription request and
//! waits for the response head, so the subscription is registered on the
//! broker by the time it returns. The body is then read by a background task
//! that decodes frames into [`Message`]s.
//!
//! Two channels come back:
//! - `Messages`: every event in the order the broker queued it; closes when
//!   the broker ends the stream
//! - `Errors`: at most one terminal error (404 for a wrong route prefix,
//!   another status, a broken connection or an oversized line); closes
//!   afterwards
//!
//! Dropping the `Messages` receiver ends the reading task and closes the
//! connection, which the broker notices on its next write.

use std::path::PathBuf;

use bytes::Bytes;
use http::{Request, StatusCode, header};
use http_body_util::{BodyExt, Empty};
use hyper::body::Incoming;
use hyper::client::conn::http1::{self, SendRequest};
use hyper_util::rt::TokioIo;
use tokio::net::UnixStream;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::client::address::Address;
use crate::client::message::Message;
use crate::transport::codec::{CONTENT_TYPE, Decoder};
use crate::utils::{BrokerError, Result};

pub type Messages = mpsc::UnboundedReceiver<Message>;
pub type Errors = mpsc::Receiver<BrokerError>;

/// Subscription options.
#[derive(Debug, Clone, Default)]
pub struct Options {
    /// Directory relative socket paths are resolved against.
    pub socket_dir: Option<PathBuf>,
    /// Route prefix the broker serves subscriptions under, e.g. `events`.
    pub path: Option<String>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_socket_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.socket_dir = Some(dir.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }
}

/// Subscribes to every topic under `topic` on the broker at `address`.
///
/// Fails immediately if the address cannot be parsed or the socket cannot
/// be dialed; anything that goes wrong afterwards arrives on `Errors`.
pub async fn subscribe(address: &str, topic: &str, options: &Options) -> Result<(Messages, Errors)> {
    let target = Address::parse(address)?.resolve(topic, options).await?;

    let stream = UnixStream::connect(&target.socket_path)
        .await
        .map_err(|source| BrokerError::Dial {
            path: target.socket_path.clone(),
            source,
        })?;
    let (mut sender, conn) = http1::handshake(TokioIo::new(stream)).await?;

    let host = target.host.clone();
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            debug!(host = %host, error = %e, "subscription connection closed with error");
        }
    });

    let host = if target.host.is_empty() {
        "localhost"
    } else {
        target.host.as_str()
    };
    let request = Request::get(target.request.as_str())
        .header(header::HOST, host)
        .header(header::ACCEPT, CONTENT_TYPE)
        .body(Empty::<Bytes>::new())?;
    let response = sender.send_request(request).await?;

    let (message_tx, message_rx) = mpsc::unbounded_channel();
    let (error_tx, error_rx) = mpsc::channel(1);

    match response.status() {
        StatusCode::OK => {
            info!(
                host = %target.host,
                socket = %target.socket_path.display(),
                request = %target.request,
                "subscribed"
            );
            tokio::spawn(read_events(
                response.into_body(),
                sender,
                message_tx,
                error_tx,
                target.request,
            ));
        }
        StatusCode::NOT_FOUND => {
            warn!(request = %target.request, "subscription route not found");
            let _ = error_tx.try_send(BrokerError::RouteNotFound {
                path: target.request,
            });
        }
        status => {
            warn!(request = %target.request, status = %status, "subscription rejected");
            let _ = error_tx.try_send(BrokerError::UnexpectedStatus(status));
        }
    }

    Ok((message_rx, error_rx))
}

async fn read_events(
    mut body: Incoming,
    // held so the connection stays open while the body streams
    _sender: SendRequest<Empty<Bytes>>,
    messages: mpsc::UnboundedSender<Message>,
    errors: mpsc::Sender<BrokerError>,
    request: String,
) {
    let mut decoder = Decoder::new();

    while let Some(frame) = body.frame().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                warn!(request = %request, error = %e, "event stream broken");
                let _ = errors.try_send(BrokerError::Http(e));
                return;
            }
        };
        let Ok(chunk) = frame.into_data() else {
            continue;
        };

        decoder.extend(&chunk);
        loop {
            let event = match decoder.next_frame() {
                Ok(Some(event)) => event,
                Ok(None) => break,
                Err(e) => {
                    warn!(request = %request, error = %e, "event stream unreadable");
                    let _ = errors.try_send(e);
                    return;
                }
            };
            if messages.send(Message::from(event)).is_err() {
                debug!(request = %request, "message receiver dropped, closing subscription");
                return;
            }
        }
    }

    debug!(request = %request, "event stream ended");
}
