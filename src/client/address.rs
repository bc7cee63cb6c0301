//! Broker addresses
//!
//! A subscriber names the broker with `unix://<host><socket-path>[/<topic>][?topic=<filter>]`:
//! - `host` is a free-form label, sent as the `Host` header and logged
//! - `socket-path` is the longest prefix of the path that is a socket file,
//!   looked up as an absolute path and then below `Options::socket_dir`;
//!   as a last resort `socket_dir/<host>` is tried with the whole path
//!   treated as topic
//! - the remaining path segments are prepended to the requested filter
//! - a `topic` query parameter replaces the filter entirely

use std::io;
use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};

use url::{Position, Url, form_urlencoded};

use crate::client::pubsub_client::Options;
use crate::utils::{BrokerError, Result};

pub const SCHEME: &str = "unix://";

const REQUEST_BASE: &str = "http://localhost/";

/// A parsed address, before the socket has been located.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    pub host: String,
    pub segments: Vec<String>,
    pub topic: Option<String>,
}

/// Where to connect and what to ask for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub host: String,
    pub socket_path: PathBuf,
    /// Path and query of the subscription request.
    pub request: String,
}

impl Address {
    pub fn parse(address: &str) -> Result<Self> {
        let invalid = |reason: &str| BrokerError::InvalidAddress {
            address: address.to_string(),
            reason: reason.to_string(),
        };

        let rest = address
            .strip_prefix(SCHEME)
            .ok_or_else(|| invalid("expected unix:// scheme"))?;
        let (rest, query) = match rest.split_once('?') {
            Some((rest, query)) => (rest, Some(query)),
            None => (rest, None),
        };
        let (host, path) = match rest.find('/') {
            Some(i) => rest.split_at(i),
            None => (rest, ""),
        };

        let segments: Vec<String> = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if segments.is_empty() && host.is_empty() {
            return Err(invalid("missing socket path"));
        }

        let topic = query.and_then(|q| {
            form_urlencoded::parse(q.as_bytes())
                .find(|(key, _)| key == "topic")
                .map(|(_, value)| value.into_owned())
        });

        Ok(Self {
            host: host.to_string(),
            segments,
            topic,
        })
    }

    /// Finds the socket file and splits the path into socket and topic parts.
    /// Returns the socket path and the number of segments it used.
    pub async fn locate_socket(&self, socket_dir: Option<&Path>) -> Result<(PathBuf, usize)> {
        for used in (1..=self.segments.len()).rev() {
            let relative = self.segments[..used].join("/");
            let absolute = PathBuf::from(format!("/{relative}"));
            if is_socket(&absolute).await {
                return Ok((absolute, used));
            }
            if let Some(dir) = socket_dir {
                let candidate = dir.join(&relative);
                if is_socket(&candidate).await {
                    return Ok((candidate, used));
                }
            }
        }

        if let Some(dir) = socket_dir.filter(|_| !self.host.is_empty()) {
            let candidate = dir.join(&self.host);
            if is_socket(&candidate).await {
                return Ok((candidate, 0));
            }
        }

        Err(BrokerError::Dial {
            path: PathBuf::from(format!("/{}", self.segments.join("/"))),
            source: io::Error::new(io::ErrorKind::NotFound, "no broker socket found on path"),
        })
    }

    /// Resolves the socket and builds the subscription request for `filter`.
    pub async fn resolve(&self, filter: &str, options: &Options) -> Result<Target> {
        let (socket_path, used) = self.locate_socket(options.socket_dir.as_deref()).await?;
        let request = request_path(
            options.path.as_deref(),
            &self.segments[used..],
            filter,
            self.topic.as_deref(),
        )?;
        Ok(Target {
            host: self.host.clone(),
            socket_path,
            request,
        })
    }
}

/// Builds the request path and query.
///
/// The filter travels as path segments below the route prefix unless it
/// comes from the address query or starts with `/`, in which case it is
/// sent as the `topic` query parameter.
pub fn request_path(
    route_prefix: Option<&str>,
    topic_segments: &[String],
    filter: &str,
    query_topic: Option<&str>,
) -> Result<String> {
    let mut url = Url::parse(REQUEST_BASE).map_err(|e| BrokerError::InvalidAddress {
        address: REQUEST_BASE.to_string(),
        reason: e.to_string(),
    })?;

    let query = query_topic.or_else(|| {
        (topic_segments.is_empty() && filter.starts_with('/')).then_some(filter)
    });

    if let Ok(mut path) = url.path_segments_mut() {
        path.clear();
        let prefix = route_prefix.unwrap_or_default();
        path.extend(prefix.split('/').filter(|s| !s.is_empty()));
        if query.is_none() {
            path.extend(topic_segments.iter().map(String::as_str));
            path.extend(filter.split('/').filter(|s| !s.is_empty()));
        }
    }
    if let Some(topic) = query {
        url.query_pairs_mut().append_pair("topic", topic);
    }

    Ok(url[Position::BeforePath..].to_string())
}

async fn is_socket(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.file_type().is_socket())
        .unwrap_or(false)
}
