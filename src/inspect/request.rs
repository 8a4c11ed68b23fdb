//! Request view construction and derived fields.

use super::url_decode;
use crate::error::{WafError, WafResult};
use bytes::Bytes;
use http::{HeaderMap, Method, Uri};
use once_cell::sync::OnceCell;
use std::net::{IpAddr, SocketAddr};

/// Default cap on how much of the body is retained for inspection.
pub const MAX_BODY_SIZE: usize = 1024 * 1024;

/// State of the request (or response) body buffer.
#[derive(Debug, Clone)]
pub enum BodyState {
    /// Body was read once and buffered; checkpoints see slices of this.
    Buffered(Bytes),
    /// The underlying stream was consumed by a prior hop.
    Unavailable,
}

impl BodyState {
    pub(crate) fn bytes(&self) -> WafResult<&Bytes> {
        match self {
            Self::Buffered(bytes) => Ok(bytes),
            Self::Unavailable => Err(WafError::BodyUnavailable),
        }
    }
}

/// Immutable view over one HTTP request.
///
/// Built by the host from its transport's request parts. All derived
/// fields are lazily computed and memoized; the view itself is never
/// mutated after construction.
#[derive(Debug)]
pub struct RequestView {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    remote_addr: Option<SocketAddr>,
    body: BodyState,

    decoded_path: OnceCell<String>,
    query_args: OnceCell<Vec<(String, String)>>,
    cookies: OnceCell<Vec<(String, String)>>,
}

impl RequestView {
    /// Create a view with an empty (unread) body.
    pub fn new(method: Method, uri: Uri, headers: HeaderMap) -> Self {
        Self {
            method,
            uri,
            headers,
            remote_addr: None,
            body: BodyState::Buffered(Bytes::new()),
            decoded_path: OnceCell::new(),
            query_args: OnceCell::new(),
            cookies: OnceCell::new(),
        }
    }

    /// Attach the peer address.
    #[must_use]
    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    /// Attach the buffered body, capped at [`MAX_BODY_SIZE`].
    #[must_use]
    pub fn with_body(mut self, body: Bytes) -> Self {
        let capped = if body.len() > MAX_BODY_SIZE {
            body.slice(..MAX_BODY_SIZE)
        } else {
            body
        };
        self.body = BodyState::Buffered(capped);
        self
    }

    /// Mark the body as already consumed by a prior hop.
    #[must_use]
    pub fn without_body(mut self) -> Self {
        self.body = BodyState::Unavailable;
        self
    }

    /// HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Raw request URI, including the query string.
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Percent-decoded URL path.
    pub fn path(&self) -> &str {
        self.decoded_path.get_or_init(|| url_decode(self.uri.path()))
    }

    /// Parsed, decoded query arguments in declared order.
    pub fn query_args(&self) -> &[(String, String)] {
        self.query_args.get_or_init(|| {
            let Some(query) = self.uri.query() else {
                return Vec::new();
            };
            query
                .split('&')
                .filter(|pair| !pair.is_empty())
                .map(|pair| match pair.split_once('=') {
                    Some((k, v)) => (url_decode(k), url_decode(v)),
                    None => (url_decode(pair), String::new()),
                })
                .collect()
        })
    }

    /// First query argument with the given name.
    pub fn arg(&self, name: &str) -> Option<&str> {
        self.query_args()
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// First value of the given header, when it is valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// All request headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Parsed cookies from every `Cookie` header, in declared order.
    pub fn cookies(&self) -> &[(String, String)] {
        self.cookies.get_or_init(|| {
            self.headers
                .get_all(http::header::COOKIE)
                .iter()
                .filter_map(|v| v.to_str().ok())
                .flat_map(|line| line.split(';'))
                .filter_map(|pair| {
                    let (k, v) = pair.split_once('=')?;
                    Some((k.trim().to_string(), v.trim().to_string()))
                })
                .collect()
        })
    }

    /// Cookie value by name.
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies()
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Peer IP address, when known.
    pub fn remote_ip(&self) -> Option<IpAddr> {
        self.remote_addr.map(|addr| addr.ip())
    }

    /// The buffered body.
    ///
    /// # Errors
    ///
    /// Returns [`WafError::BodyUnavailable`] when the underlying stream
    /// was consumed before this view was built.
    pub fn body(&self) -> WafResult<&Bytes> {
        self.body.bytes()
    }
}
