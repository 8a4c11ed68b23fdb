//! Checkpoints: named extractors over an HTTP transaction.
//!
//! A checkpoint declares a prefix (`header`, `arg`, `responseStatus`, ...),
//! the kind of value it yields, the operators it admits, and the
//! direction(s) it is available in. The process-global registry holds
//! prototype definitions; each WAF builds its own table of fresh instances
//! at init so stateful caches never bleed across configurations.

mod registry;
mod request;
mod response;

pub use registry::{
    all_checkpoints, checkpoint_def, register_checkpoint, CheckpointDef, CheckpointInstance,
    CheckpointTable, BYTES_OPERATORS, INT_OPERATORS, KEYED_STRING_OPERATORS, STRING_OPERATORS,
};
pub use request::{
    ArgCheckpoint, CookieCheckpoint, HeaderCheckpoint, RemoteAddrCheckpoint,
    RequestBodyCheckpoint, RequestMethodCheckpoint, RequestPathCheckpoint, RequestUriCheckpoint,
};
pub use response::{ResponseBodyCheckpoint, ResponseHeaderCheckpoint, ResponseStatusCheckpoint};

use crate::error::WafResult;
use crate::inspect::Transaction;
use bytes::Bytes;
use std::borrow::Cow;

/// Kind of value a checkpoint yields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// UTF-8 text.
    String,
    /// Signed integer.
    Int,
    /// List of strings.
    List,
    /// Raw bytes (coerced lossily to text for string operators).
    Bytes,
}

/// Which direction(s) a checkpoint can be evaluated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Request-side data, usable in both directions.
    Both,
    /// Only meaningful while matching a request.
    Inbound,
    /// Requires the response view.
    Outbound,
}

/// A value extracted from the transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Text value.
    String(String),
    /// Integer value.
    Int(i64),
    /// Multiple string values.
    List(Vec<String>),
    /// Raw bytes.
    Bytes(Bytes),
}

impl Value {
    /// Text form used by the string operator families.
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            Self::String(s) => Cow::Borrowed(s.as_str()),
            Self::Int(n) => Cow::Owned(n.to_string()),
            Self::List(items) => Cow::Owned(items.join("\n")),
            Self::Bytes(b) => String::from_utf8_lossy(b),
        }
    }

    /// Signed integer form used by the numeric operators.
    ///
    /// Strings parse leniently (surrounding whitespace ignored); a value
    /// that does not parse yields `None`, never an error.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            Self::String(s) => s.trim().parse().ok(),
            Self::Bytes(b) => std::str::from_utf8(b).ok()?.trim().parse().ok(),
            Self::List(_) => None,
        }
    }

    /// Whether the value is empty.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::String(s) => s.is_empty(),
            Self::Int(_) => false,
            Self::List(items) => items.is_empty(),
            Self::Bytes(b) => b.is_empty(),
        }
    }
}

/// A live extractor instance, private to one WAF.
///
/// `extract` must be deterministic for the same view. `Ok(None)` is the
/// first-class Missing result; rules decide whether Missing matches.
pub trait Checkpoint: Send + Sync {
    /// One-shot preparation per WAF instance.
    fn init(&mut self) {}

    /// Lifecycle hook invoked by `Waf::start`; must be idempotent.
    fn start(&self) {}

    /// Lifecycle hook invoked by `Waf::stop`; must be idempotent.
    fn stop(&self) {}

    /// Pull the value selected by `param` out of the transaction.
    fn extract(&self, tx: &Transaction<'_>, param: &str) -> WafResult<Option<Value>>;
}
