//! Prototype registry and per-WAF checkpoint tables.

use super::request::{
    ArgCheckpoint, CookieCheckpoint, HeaderCheckpoint, RemoteAddrCheckpoint,
    RequestBodyCheckpoint, RequestMethodCheckpoint, RequestPathCheckpoint, RequestUriCheckpoint,
};
use super::response::{ResponseBodyCheckpoint, ResponseHeaderCheckpoint, ResponseStatusCheckpoint};
use super::{Checkpoint, Flow, Value, ValueKind};
use crate::error::WafResult;
use crate::inspect::Transaction;
use crate::rules::{Direction, RuleOperator};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;

use RuleOperator::*;

/// Operators admitted by parameterized string checkpoints (`header.X`).
pub const KEYED_STRING_OPERATORS: &[RuleOperator] = &[
    Eq, Neq, Contains, NotContains, Prefix, Suffix, Match, NotMatch, Gt, Gte, Lt, Lte, In, NotIn,
    HasKey, Empty,
];

/// Operators admitted by plain string checkpoints (`requestPath`).
pub const STRING_OPERATORS: &[RuleOperator] = &[
    Eq, Neq, Contains, NotContains, Prefix, Suffix, Match, NotMatch, Gt, Gte, Lt, Lte, In, NotIn,
    Empty,
];

/// Operators admitted by integer checkpoints (`responseStatus`).
pub const INT_OPERATORS: &[RuleOperator] = &[Eq, Neq, Gt, Gte, Lt, Lte, In, NotIn, Empty];

/// Operators admitted by byte-buffer checkpoints (`requestBody`).
pub const BYTES_OPERATORS: &[RuleOperator] = &[
    Eq, Neq, Contains, NotContains, Prefix, Suffix, Match, NotMatch, Empty,
];

/// Prototype entry: everything needed to stamp out a fresh checkpoint
/// instance for one WAF.
#[derive(Clone, Copy)]
pub struct CheckpointDef {
    /// Prefix this checkpoint claims (`header`, `arg`, ...).
    pub prefix: &'static str,
    /// Kind of value it yields.
    pub kind: ValueKind,
    /// Direction(s) it is available in.
    pub flow: Flow,
    /// Operators it admits.
    pub operators: &'static [RuleOperator],
    /// Factory producing a fresh instance.
    pub factory: fn() -> Box<dyn Checkpoint>,
}

impl CheckpointDef {
    /// Whether `operator` is in the admitted set.
    pub fn admits(&self, operator: RuleOperator) -> bool {
        self.operators.contains(&operator)
    }

    /// Whether this checkpoint can be evaluated for `direction` rules.
    pub fn available_for(&self, direction: Direction) -> bool {
        match self.flow {
            Flow::Both => true,
            Flow::Inbound => direction == Direction::Inbound,
            Flow::Outbound => direction == Direction::Outbound,
        }
    }
}

impl fmt::Debug for CheckpointDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckpointDef")
            .field("prefix", &self.prefix)
            .field("kind", &self.kind)
            .field("flow", &self.flow)
            .finish_non_exhaustive()
    }
}

fn builtin_defs() -> Vec<CheckpointDef> {
    vec![
        CheckpointDef {
            prefix: "header",
            kind: ValueKind::String,
            flow: Flow::Both,
            operators: KEYED_STRING_OPERATORS,
            factory: || Box::new(HeaderCheckpoint),
        },
        CheckpointDef {
            prefix: "arg",
            kind: ValueKind::String,
            flow: Flow::Both,
            operators: KEYED_STRING_OPERATORS,
            factory: || Box::new(ArgCheckpoint),
        },
        CheckpointDef {
            prefix: "cookie",
            kind: ValueKind::String,
            flow: Flow::Both,
            operators: KEYED_STRING_OPERATORS,
            factory: || Box::new(CookieCheckpoint),
        },
        CheckpointDef {
            prefix: "requestPath",
            kind: ValueKind::String,
            flow: Flow::Both,
            operators: STRING_OPERATORS,
            factory: || Box::new(RequestPathCheckpoint),
        },
        CheckpointDef {
            prefix: "requestUri",
            kind: ValueKind::String,
            flow: Flow::Both,
            operators: STRING_OPERATORS,
            factory: || Box::new(RequestUriCheckpoint),
        },
        CheckpointDef {
            prefix: "requestMethod",
            kind: ValueKind::String,
            flow: Flow::Both,
            operators: STRING_OPERATORS,
            factory: || Box::new(RequestMethodCheckpoint),
        },
        CheckpointDef {
            prefix: "remoteAddr",
            kind: ValueKind::String,
            flow: Flow::Both,
            operators: STRING_OPERATORS,
            factory: || Box::new(RemoteAddrCheckpoint),
        },
        CheckpointDef {
            prefix: "requestBody",
            kind: ValueKind::Bytes,
            flow: Flow::Both,
            operators: BYTES_OPERATORS,
            factory: || Box::new(RequestBodyCheckpoint),
        },
        CheckpointDef {
            prefix: "responseHeader",
            kind: ValueKind::String,
            flow: Flow::Outbound,
            operators: KEYED_STRING_OPERATORS,
            factory: || Box::new(ResponseHeaderCheckpoint),
        },
        CheckpointDef {
            prefix: "responseStatus",
            kind: ValueKind::Int,
            flow: Flow::Outbound,
            operators: INT_OPERATORS,
            factory: || Box::new(ResponseStatusCheckpoint),
        },
        CheckpointDef {
            prefix: "responseBody",
            kind: ValueKind::Bytes,
            flow: Flow::Outbound,
            operators: BYTES_OPERATORS,
            factory: || Box::new(ResponseBodyCheckpoint),
        },
    ]
}

static REGISTRY: Lazy<RwLock<HashMap<&'static str, CheckpointDef>>> = Lazy::new(|| {
    let mut map = HashMap::new();
    for def in builtin_defs() {
        map.insert(def.prefix, def);
    }
    RwLock::new(map)
});

/// Register a checkpoint prototype, replacing any existing entry for the
/// same prefix. Intended for program startup, before any WAF is built.
pub fn register_checkpoint(def: CheckpointDef) {
    if let Ok(mut registry) = REGISTRY.write() {
        if registry.insert(def.prefix, def).is_some() {
            tracing::debug!(prefix = def.prefix, "replaced checkpoint prototype");
        }
    }
}

/// Look up a prototype by prefix.
pub fn checkpoint_def(prefix: &str) -> Option<CheckpointDef> {
    REGISTRY
        .read()
        .ok()
        .and_then(|registry| registry.get(prefix).copied())
}

/// Snapshot of every registered prototype.
pub fn all_checkpoints() -> Vec<CheckpointDef> {
    REGISTRY
        .read()
        .map(|registry| registry.values().copied().collect())
        .unwrap_or_default()
}

/// A live checkpoint paired with its prototype metadata.
pub struct CheckpointInstance {
    def: CheckpointDef,
    inner: Box<dyn Checkpoint>,
}

impl CheckpointInstance {
    /// Prototype metadata.
    pub fn def(&self) -> &CheckpointDef {
        &self.def
    }

    /// Delegate to the live instance.
    pub fn extract(&self, tx: &Transaction<'_>, param: &str) -> WafResult<Option<Value>> {
        self.inner.extract(tx, param)
    }

    pub(crate) fn start(&self) {
        self.inner.start();
    }

    pub(crate) fn stop(&self) {
        self.inner.stop();
    }
}

impl fmt::Debug for CheckpointInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CheckpointInstance")
            .field(&self.def.prefix)
            .finish()
    }
}

/// Per-WAF table of live checkpoint instances, one per registry entry.
///
/// Built at `Waf::init`; rules hold it through their resolver handle and
/// look prefixes up at match time.
pub struct CheckpointTable {
    entries: HashMap<&'static str, CheckpointInstance>,
}

impl CheckpointTable {
    /// Stamp out one fresh, initialized instance per registered prototype.
    pub fn build() -> Self {
        let entries = all_checkpoints()
            .into_iter()
            .map(|def| {
                let mut inner = (def.factory)();
                inner.init();
                (def.prefix, CheckpointInstance { def, inner })
            })
            .collect();
        Self { entries }
    }

    /// Resolve a prefix to its live instance.
    pub fn find(&self, prefix: &str) -> Option<&CheckpointInstance> {
        self.entries.get(prefix)
    }

    /// Fan `start` out to every instance.
    pub fn start(&self) {
        for entry in self.entries.values() {
            entry.start();
        }
    }

    /// Fan `stop` out to every instance.
    pub fn stop(&self) {
        for entry in self.entries.values() {
            entry.stop();
        }
    }

    /// Number of live instances.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for CheckpointTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut prefixes: Vec<_> = self.entries.keys().collect();
        prefixes.sort();
        f.debug_tuple("CheckpointTable").field(&prefixes).finish()
    }
}
