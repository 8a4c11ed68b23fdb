//! The standard action set.

use super::Action;
use crate::inspect::ResponseWriter;
use http::StatusCode;
use tracing::info;

/// `allow` — no-op, processing continues.
pub struct AllowAction;

impl Action for AllowAction {
    fn name(&self) -> &str {
        "allow"
    }

    fn perform(&self, _writer: &mut dyn ResponseWriter) -> bool {
        true
    }
}

/// `block` — write 403 with the configured body and terminate.
pub struct BlockAction {
    status: StatusCode,
    body: String,
}

impl BlockAction {
    /// Block with a custom status and body.
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

impl Default for BlockAction {
    fn default() -> Self {
        Self::new(StatusCode::FORBIDDEN, "request blocked")
    }
}

impl Action for BlockAction {
    fn name(&self) -> &str {
        "block"
    }

    fn perform(&self, writer: &mut dyn ResponseWriter) -> bool {
        writer.write_status(self.status);
        writer.write_header("Content-Type", "text/plain; charset=utf-8");
        writer.write_body(self.body.as_bytes());
        false
    }
}

/// `log` — emit an audit record, processing continues.
pub struct LogAction;

impl Action for LogAction {
    fn name(&self) -> &str {
        "log"
    }

    fn perform(&self, _writer: &mut dyn ResponseWriter) -> bool {
        info!(action = "log", "waf rule set matched");
        true
    }
}

/// `tag` — annotate the transaction, processing continues.
///
/// The writer is the only channel the action contract exposes, so the
/// annotation is a response header.
pub struct TagAction {
    value: String,
}

impl TagAction {
    /// Tag with a custom marker value.
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

impl Default for TagAction {
    fn default() -> Self {
        Self::new("waf")
    }
}

impl Action for TagAction {
    fn name(&self) -> &str {
        "tag"
    }

    fn perform(&self, writer: &mut dyn ResponseWriter) -> bool {
        writer.write_header("X-Waf-Tag", &self.value);
        true
    }
}

/// `redirect` — 302 to the configured URL and terminate.
pub struct RedirectAction {
    url: String,
}

impl RedirectAction {
    /// Redirect to `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl Default for RedirectAction {
    fn default() -> Self {
        Self::new("/")
    }
}

impl Action for RedirectAction {
    fn name(&self) -> &str {
        "redirect"
    }

    fn perform(&self, writer: &mut dyn ResponseWriter) -> bool {
        writer.write_status(StatusCode::FOUND);
        writer.write_header("Location", &self.url);
        false
    }
}
