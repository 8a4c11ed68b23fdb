//! The writer seam actions use to emit a response.

use http::StatusCode;

/// Sink for the response an action writes when it terminates processing.
///
/// Hosts adapt this to their transport; [`BufferedResponse`] is a ready
/// in-memory implementation for tests and buffering frontends.
pub trait ResponseWriter {
    /// Set the response status.
    fn write_status(&mut self, status: StatusCode);

    /// Append a response header.
    fn write_header(&mut self, name: &str, value: &str);

    /// Append body bytes.
    fn write_body(&mut self, body: &[u8]);
}

/// In-memory [`ResponseWriter`].
#[derive(Debug, Default)]
pub struct BufferedResponse {
    /// Status written by an action, if any.
    pub status: Option<StatusCode>,
    /// Headers in write order.
    pub headers: Vec<(String, String)>,
    /// Accumulated body bytes.
    pub body: Vec<u8>,
}

impl BufferedResponse {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether nothing was written.
    pub fn is_untouched(&self) -> bool {
        self.status.is_none() && self.headers.is_empty() && self.body.is_empty()
    }

    /// First header with the given name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

impl ResponseWriter for BufferedResponse {
    fn write_status(&mut self, status: StatusCode) {
        self.status = Some(status);
    }

    fn write_header(&mut self, name: &str, value: &str) {
        self.headers.push((name.to_string(), value.to_string()));
    }

    fn write_body(&mut self, body: &[u8]) {
        self.body.extend_from_slice(body);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffered_response_records_writes() {
        let mut w = BufferedResponse::new();
        assert!(w.is_untouched());

        w.write_status(StatusCode::FORBIDDEN);
        w.write_header("X-Waf", "blocked");
        w.write_body(b"denied");

        assert_eq!(w.status, Some(StatusCode::FORBIDDEN));
        assert_eq!(w.header("x-waf"), Some("blocked"));
        assert_eq!(w.body, b"denied");
        assert!(!w.is_untouched());
    }
}
