//! Response-side checkpoints, available to outbound rules only.
//!
//! Evaluated defensively: when the transaction carries no response view
//! they extract Missing rather than failing.

use super::{Checkpoint, Value};
use crate::error::WafResult;
use crate::inspect::Transaction;

/// `responseHeader.<name>` — first value of a response header.
pub struct ResponseHeaderCheckpoint;

impl Checkpoint for ResponseHeaderCheckpoint {
    fn extract(&self, tx: &Transaction<'_>, param: &str) -> WafResult<Option<Value>> {
        if param.is_empty() {
            return Ok(None);
        }
        Ok(tx
            .response
            .and_then(|resp| resp.header(param))
            .map(|v| Value::String(v.to_string())))
    }
}

/// `responseStatus` — the response status code as an integer.
pub struct ResponseStatusCheckpoint;

impl Checkpoint for ResponseStatusCheckpoint {
    fn extract(&self, tx: &Transaction<'_>, _param: &str) -> WafResult<Option<Value>> {
        Ok(tx
            .response
            .map(|resp| Value::Int(i64::from(resp.status().as_u16()))))
    }
}

/// `responseBody` — the buffered response body.
pub struct ResponseBodyCheckpoint;

impl Checkpoint for ResponseBodyCheckpoint {
    fn extract(&self, tx: &Transaction<'_>, _param: &str) -> WafResult<Option<Value>> {
        match tx.response {
            Some(resp) => {
                let body = resp.body()?;
                Ok(Some(Value::Bytes(body.clone())))
            },
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inspect::{RequestView, ResponseView};
    use bytes::Bytes;
    use http::{HeaderMap, Method, StatusCode};

    fn request() -> RequestView {
        RequestView::new(Method::GET, "/".parse().unwrap(), HeaderMap::new())
    }

    fn response() -> ResponseView {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", "text/html".parse().unwrap());
        ResponseView::new(StatusCode::BAD_GATEWAY, headers)
            .with_body(Bytes::from_static(b"<?php echo 1;"))
    }

    #[test]
    fn outbound_extraction() {
        let req = request();
        let resp = response();
        let tx = Transaction::outbound(&req, &resp);

        assert_eq!(
            ResponseHeaderCheckpoint
                .extract(&tx, "Content-Type")
                .unwrap(),
            Some(Value::String("text/html".to_string()))
        );
        assert_eq!(
            ResponseStatusCheckpoint.extract(&tx, "").unwrap(),
            Some(Value::Int(502))
        );
        assert_eq!(
            ResponseBodyCheckpoint.extract(&tx, "").unwrap(),
            Some(Value::Bytes(Bytes::from_static(b"<?php echo 1;")))
        );
    }

    #[test]
    fn missing_response_view_extracts_missing() {
        let req = request();
        let tx = Transaction::inbound(&req);

        assert_eq!(
            ResponseHeaderCheckpoint.extract(&tx, "Server").unwrap(),
            None
        );
        assert_eq!(ResponseStatusCheckpoint.extract(&tx, "").unwrap(), None);
        assert_eq!(ResponseBodyCheckpoint.extract(&tx, "").unwrap(), None);
    }
}
