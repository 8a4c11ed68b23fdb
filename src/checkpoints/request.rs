//! Request-side checkpoints.

use super::{Checkpoint, Value};
use crate::error::WafResult;
use crate::inspect::Transaction;

/// `header.<name>` — first value of a request header.
pub struct HeaderCheckpoint;

impl Checkpoint for HeaderCheckpoint {
    fn extract(&self, tx: &Transaction<'_>, param: &str) -> WafResult<Option<Value>> {
        if param.is_empty() {
            return Ok(None);
        }
        Ok(tx
            .request
            .header(param)
            .map(|v| Value::String(v.to_string())))
    }
}

/// `arg.<name>` — first query argument with the given name.
///
/// A key present with an empty value extracts as an empty string, so
/// `hasKey` and `empty` can tell presence from absence.
pub struct ArgCheckpoint;

impl Checkpoint for ArgCheckpoint {
    fn extract(&self, tx: &Transaction<'_>, param: &str) -> WafResult<Option<Value>> {
        if param.is_empty() {
            return Ok(None);
        }
        Ok(tx.request.arg(param).map(|v| Value::String(v.to_string())))
    }
}

/// `cookie.<name>` — cookie value by name.
pub struct CookieCheckpoint;

impl Checkpoint for CookieCheckpoint {
    fn extract(&self, tx: &Transaction<'_>, param: &str) -> WafResult<Option<Value>> {
        if param.is_empty() {
            return Ok(None);
        }
        Ok(tx
            .request
            .cookie(param)
            .map(|v| Value::String(v.to_string())))
    }
}

/// `requestPath` — percent-decoded URL path.
pub struct RequestPathCheckpoint;

impl Checkpoint for RequestPathCheckpoint {
    fn extract(&self, tx: &Transaction<'_>, _param: &str) -> WafResult<Option<Value>> {
        Ok(Some(Value::String(tx.request.path().to_string())))
    }
}

/// `requestUri` — raw request URI including the query string.
pub struct RequestUriCheckpoint;

impl Checkpoint for RequestUriCheckpoint {
    fn extract(&self, tx: &Transaction<'_>, _param: &str) -> WafResult<Option<Value>> {
        Ok(Some(Value::String(tx.request.uri().to_string())))
    }
}

/// `requestMethod` — the HTTP method.
pub struct RequestMethodCheckpoint;

impl Checkpoint for RequestMethodCheckpoint {
    fn extract(&self, tx: &Transaction<'_>, _param: &str) -> WafResult<Option<Value>> {
        Ok(Some(Value::String(tx.request.method().to_string())))
    }
}

/// `remoteAddr` — peer IP address, without the port.
pub struct RemoteAddrCheckpoint;

impl Checkpoint for RemoteAddrCheckpoint {
    fn extract(&self, tx: &Transaction<'_>, _param: &str) -> WafResult<Option<Value>> {
        Ok(tx
            .request
            .remote_ip()
            .map(|ip| Value::String(ip.to_string())))
    }
}

/// `requestBody` — the buffered request body.
///
/// Propagates `BodyUnavailable` when the stream was consumed upstream;
/// the rule layer treats that as Missing for the offending rule only.
pub struct RequestBodyCheckpoint;

impl Checkpoint for RequestBodyCheckpoint {
    fn extract(&self, tx: &Transaction<'_>, _param: &str) -> WafResult<Option<Value>> {
        let body = tx.request.body()?;
        Ok(Some(Value::Bytes(body.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inspect::RequestView;
    use bytes::Bytes;
    use http::{HeaderMap, Method};

    fn request() -> RequestView {
        let mut headers = HeaderMap::new();
        headers.insert("user-agent", "sqlmap/1.0".parse().unwrap());
        headers.insert("cookie", "session=abc123".parse().unwrap());
        RequestView::new(
            Method::POST,
            "/admin%20panel/login?id=42&q=".parse().unwrap(),
            headers,
        )
        .with_remote_addr("1.2.3.4:9999".parse().unwrap())
        .with_body(Bytes::from_static(b"payload"))
    }

    fn extract(cp: &dyn Checkpoint, param: &str) -> Option<Value> {
        let req = request();
        let tx = Transaction::inbound(&req);
        cp.extract(&tx, param).unwrap()
    }

    #[test]
    fn header_by_name() {
        assert_eq!(
            extract(&HeaderCheckpoint, "User-Agent"),
            Some(Value::String("sqlmap/1.0".to_string()))
        );
        assert_eq!(extract(&HeaderCheckpoint, "X-Missing"), None);
        assert_eq!(extract(&HeaderCheckpoint, ""), None);
    }

    #[test]
    fn arg_distinguishes_empty_from_missing() {
        assert_eq!(
            extract(&ArgCheckpoint, "id"),
            Some(Value::String("42".to_string()))
        );
        assert_eq!(
            extract(&ArgCheckpoint, "q"),
            Some(Value::String(String::new()))
        );
        assert_eq!(extract(&ArgCheckpoint, "nope"), None);
    }

    #[test]
    fn cookie_by_name() {
        assert_eq!(
            extract(&CookieCheckpoint, "session"),
            Some(Value::String("abc123".to_string()))
        );
        assert_eq!(extract(&CookieCheckpoint, "other"), None);
    }

    #[test]
    fn path_is_decoded() {
        assert_eq!(
            extract(&RequestPathCheckpoint, ""),
            Some(Value::String("/admin panel/login".to_string()))
        );
    }

    #[test]
    fn uri_keeps_query() {
        let Some(Value::String(uri)) = extract(&RequestUriCheckpoint, "") else {
            panic!("expected uri value");
        };
        assert!(uri.contains("id=42"));
    }

    #[test]
    fn method_and_remote_addr() {
        assert_eq!(
            extract(&RequestMethodCheckpoint, ""),
            Some(Value::String("POST".to_string()))
        );
        assert_eq!(
            extract(&RemoteAddrCheckpoint, ""),
            Some(Value::String("1.2.3.4".to_string()))
        );
    }

    #[test]
    fn body_extracts_bytes() {
        assert_eq!(
            extract(&RequestBodyCheckpoint, ""),
            Some(Value::Bytes(Bytes::from_static(b"payload")))
        );
    }

    #[test]
    fn consumed_body_propagates_error() {
        let req = RequestView::new(Method::POST, "/".parse().unwrap(), HeaderMap::new())
            .without_body();
        let tx = Transaction::inbound(&req);
        assert!(RequestBodyCheckpoint.extract(&tx, "").is_err());
    }
}
