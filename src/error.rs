//! Engine error types.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for WAF operations.
pub type WafResult<T> = Result<T, WafError>;

/// Errors surfaced by the WAF engine.
///
/// Configuration problems (`UnknownCheckpoint`, `OperatorNotAdmitted`,
/// `InvalidPattern`, `DuplicateId`, `DirectionMismatch`,
/// `CheckpointNotAvailable`) are discovered at init and prevent the WAF
/// from serving. `RuleEval` and `UnknownAction` during a match are
/// reported fail-open: traffic keeps flowing while the fault is surfaced
/// to the caller.
#[derive(Debug, Error)]
pub enum WafError {
    /// Rule references a checkpoint prefix with no registry entry.
    #[error("unknown checkpoint prefix '{prefix}' in rule [{rule}]")]
    UnknownCheckpoint {
        /// The unresolved prefix.
        prefix: String,
        /// Summary of the offending rule.
        rule: String,
    },

    /// Rule uses an operator the checkpoint does not admit.
    #[error("checkpoint '{prefix}' does not admit operator '{operator}'")]
    OperatorNotAdmitted {
        /// Checkpoint prefix.
        prefix: String,
        /// The rejected operator.
        operator: String,
    },

    /// Checkpoint cannot be evaluated in the group's direction.
    #[error("checkpoint '{prefix}' is not available for {direction} rules")]
    CheckpointNotAvailable {
        /// Checkpoint prefix.
        prefix: String,
        /// Direction of the enclosing group.
        direction: String,
    },

    /// Regex operand failed to compile.
    #[error("invalid pattern in rule [{rule}]: {message}")]
    InvalidPattern {
        /// Summary of the offending rule.
        rule: String,
        /// Compiler diagnostic.
        message: String,
    },

    /// Two entries in the same collection share an id or code.
    #[error("duplicate {kind} '{id}'")]
    DuplicateId {
        /// What kind of identifier collided (group id, set code, ...).
        kind: &'static str,
        /// The colliding value.
        id: String,
    },

    /// A group's direction does not match the collection it lives in.
    #[error("rule group '{group}' direction does not match its collection")]
    DirectionMismatch {
        /// Group id or name.
        group: String,
    },

    /// Malformed persisted document.
    #[error("failed to parse WAF document: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// Failed to read a document from disk.
    #[error("failed to read '{path}': {source}")]
    Read {
        /// Path to the document.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to write a document to disk.
    #[error("failed to write '{path}': {source}")]
    Write {
        /// Path to the document.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Document path does not exist.
    #[error("WAF document not found: {0}")]
    NotFound(PathBuf),

    /// Body-dependent rule evaluated after the stream was consumed.
    #[error("request body is no longer available")]
    BodyUnavailable,

    /// Non-deterministic failure inside an operator.
    #[error("rule [{rule}] evaluation failed: {message}")]
    RuleEval {
        /// Summary of the offending rule.
        rule: String,
        /// What went wrong.
        message: String,
    },

    /// Matched set references an action not in the registry.
    #[error("no action called '{0}'")]
    UnknownAction(String),

    /// Group move index out of range.
    #[error("index {index} out of range for {len} rule groups")]
    IndexOutOfRange {
        /// The offending index.
        index: usize,
        /// Number of groups in the collection.
        len: usize,
    },
}

impl WafError {
    /// Whether this error is a structural configuration problem that
    /// prevents the WAF from serving.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Self::UnknownCheckpoint { .. }
                | Self::OperatorNotAdmitted { .. }
                | Self::CheckpointNotAvailable { .. }
                | Self::InvalidPattern { .. }
                | Self::DuplicateId { .. }
                | Self::DirectionMismatch { .. }
        )
    }

    /// Whether the engine fails open on this error during a match.
    pub fn is_fail_open(&self) -> bool {
        matches!(self, Self::RuleEval { .. } | Self::UnknownAction(_))
    }
}
