//! Rule groups: ordered disjunctions of sets for one direction.

use super::set::RuleSet;
use crate::checkpoints::CheckpointTable;
use crate::error::WafResult;
use crate::inspect::Transaction;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Which side of the transaction a group inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Request inspection.
    Inbound,
    /// Response inspection.
    Outbound,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Inbound => "inbound",
            Self::Outbound => "outbound",
        })
    }
}

fn default_enabled() -> bool {
    true
}

/// An ordered list of rule sets for one direction.
///
/// Groups are a disjunction of sets: the first matching set wins and no
/// matches are combined across sets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleGroup {
    /// Unique id within the enclosing collection.
    #[serde(default)]
    pub id: String,

    /// Stable identifier used by the template merger; user-authored
    /// groups carry none and are exempt from merging.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    /// Display name.
    #[serde(default)]
    pub name: String,

    /// Disabled groups are skipped by the engine walk.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Direction this group inspects; must match the collection it
    /// lives in.
    pub direction: Direction,

    /// Sets in evaluation order.
    #[serde(default)]
    pub sets: Vec<RuleSet>,
}

impl RuleGroup {
    /// Build an empty, enabled group.
    pub fn new(id: impl Into<String>, name: impl Into<String>, direction: Direction) -> Self {
        Self {
            id: id.into(),
            code: None,
            name: name.into(),
            enabled: true,
            direction,
            sets: Vec::new(),
        }
    }

    /// Builder: set the merge code.
    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Builder: append a set.
    #[must_use]
    pub fn with_set(mut self, set: RuleSet) -> Self {
        self.sets.push(set);
        self
    }

    /// Append a set (used by the template merger).
    pub fn add_rule_set(&mut self, set: RuleSet) {
        self.sets.push(set);
    }

    /// Find a set by id.
    pub fn find_rule_set(&self, id: &str) -> Option<&RuleSet> {
        if id.is_empty() {
            return None;
        }
        self.sets.iter().find(|set| set.id == id)
    }

    /// Find a set by merge code.
    pub fn find_rule_set_with_code(&self, code: &str) -> Option<&RuleSet> {
        if code.is_empty() {
            return None;
        }
        self.sets
            .iter()
            .find(|set| set.code.as_deref() == Some(code))
    }

    /// Initialize every set with the resolver handle.
    pub fn init(&mut self, resolver: &Arc<CheckpointTable>) -> WafResult<()> {
        for set in &mut self.sets {
            set.init(resolver, self.direction)?;
        }
        Ok(())
    }

    /// Evaluate sets in order; the first match wins.
    pub fn match_transaction<'a>(
        &'a self,
        tx: &Transaction<'_>,
    ) -> WafResult<Option<&'a RuleSet>> {
        for set in &self.sets {
            if set.match_transaction(tx)? {
                return Ok(Some(set));
            }
        }
        Ok(None)
    }
}
