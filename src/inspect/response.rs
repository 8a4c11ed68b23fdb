//! Response view for outbound inspection.

use super::request::BodyState;
use crate::error::WafResult;
use bytes::Bytes;
use http::{HeaderMap, StatusCode};

/// Immutable view over one HTTP response.
///
/// Same contract as [`super::RequestView`]: single-transaction, never
/// mutated after construction, body buffered at most once.
#[derive(Debug)]
pub struct ResponseView {
    status: StatusCode,
    headers: HeaderMap,
    body: BodyState,
}

impl ResponseView {
    /// Create a view with an empty body.
    pub fn new(status: StatusCode, headers: HeaderMap) -> Self {
        Self {
            status,
            headers,
            body: BodyState::Buffered(Bytes::new()),
        }
    }

    /// Attach the buffered response body.
    #[must_use]
    pub fn with_body(mut self, body: Bytes) -> Self {
        self.body = BodyState::Buffered(body);
        self
    }

    /// Mark the body as already streamed downstream.
    #[must_use]
    pub fn without_body(mut self) -> Self {
        self.body = BodyState::Unavailable;
        self
    }

    /// Response status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// First value of the given header, when it is valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// All response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The buffered body.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::WafError::BodyUnavailable`] when the body
    /// was streamed before this view was built.
    pub fn body(&self) -> WafResult<&Bytes> {
        self.body.bytes()
    }
}
