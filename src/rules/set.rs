//! Ordered rule combinations with a Boolean connector.

use super::group::Direction;
use super::rule::Rule;
use crate::checkpoints::CheckpointTable;
use crate::error::WafResult;
use crate::inspect::Transaction;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// How a set combines its rules.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Connector {
    /// Every rule must match; the first non-match wins.
    #[default]
    And,
    /// Any rule may match; the first match wins.
    Or,
}

/// An ordered list of rules plus the action dispatched on match.
///
/// Evaluation is pure: no side effects happen until the engine dispatches
/// the named action. An empty rule list never matches.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSet {
    /// Unique id within the enclosing group.
    #[serde(default)]
    pub id: String,

    /// Stable identifier used by the template merger; user-authored sets
    /// carry none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    /// Display name.
    #[serde(default)]
    pub name: String,

    /// Boolean connector.
    #[serde(default)]
    pub connector: Connector,

    /// Name of the action dispatched when this set matches.
    pub action: String,

    /// Rules in evaluation order.
    #[serde(default)]
    pub rules: Vec<Rule>,
}

impl RuleSet {
    /// Build an empty set dispatching `action`.
    pub fn new(id: impl Into<String>, name: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            code: None,
            name: name.into(),
            connector: Connector::And,
            action: action.into(),
            rules: Vec::new(),
        }
    }

    /// Builder: set the merge code.
    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Builder: set the connector.
    #[must_use]
    pub fn with_connector(mut self, connector: Connector) -> Self {
        self.connector = connector;
        self
    }

    /// Builder: append a rule.
    #[must_use]
    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Initialize every rule with the resolver handle.
    pub fn init(&mut self, resolver: &Arc<CheckpointTable>, direction: Direction) -> WafResult<()> {
        for rule in &mut self.rules {
            rule.init(Arc::clone(resolver), direction)?;
        }
        Ok(())
    }

    /// Evaluate the set against one transaction.
    ///
    /// Rule errors abort evaluation and propagate annotated with the
    /// rule identity.
    pub fn match_transaction(&self, tx: &Transaction<'_>) -> WafResult<bool> {
        if self.rules.is_empty() {
            return Ok(false);
        }
        match self.connector {
            Connector::And => {
                for rule in &self.rules {
                    if !rule.match_transaction(tx)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            },
            Connector::Or => {
                for rule in &self.rules {
                    if rule.match_transaction(tx)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::RuleOperator;
    use http::{HeaderMap, Method};

    fn init_set(mut set: RuleSet) -> RuleSet {
        let table = Arc::new(CheckpointTable::build());
        set.init(&table, Direction::Inbound).unwrap();
        set
    }

    fn matches(set: &RuleSet, uri: &str) -> bool {
        let req = crate::inspect::RequestView::new(Method::GET, uri.parse().unwrap(), HeaderMap::new());
        let tx = Transaction::inbound(&req);
        set.match_transaction(&tx).unwrap()
    }

    #[test]
    fn empty_set_never_matches() {
        let set = init_set(RuleSet::new("s1", "empty", "block"));
        assert!(!matches(&set, "/anything"));
    }

    #[test]
    fn and_requires_every_rule() {
        let set = init_set(
            RuleSet::new("s1", "both", "log")
                .with_rule(Rule::new("arg.id", RuleOperator::Match, "^[0-9]+$"))
                .with_rule(Rule::new("arg.id", RuleOperator::Lt, "1000000")),
        );
        assert!(matches(&set, "/p?id=42"));
        assert!(!matches(&set, "/p?id=abc"));
        assert!(!matches(&set, "/p?id=2000000"));
    }

    #[test]
    fn or_takes_first_match() {
        let set = init_set(
            RuleSet::new("s1", "either", "block")
                .with_connector(Connector::Or)
                .with_rule(Rule::new("arg.a", RuleOperator::Eq, "1"))
                .with_rule(Rule::new("arg.b", RuleOperator::Eq, "2")),
        );
        assert!(matches(&set, "/p?a=1"));
        assert!(matches(&set, "/p?b=2"));
        assert!(!matches(&set, "/p?a=2&b=1"));
    }

    #[test]
    fn rule_error_propagates_with_identity() {
        // Uninitialized rule inside an initialized-looking set.
        let set = RuleSet::new("s1", "broken", "block")
            .with_rule(Rule::new("arg.id", RuleOperator::Eq, "1"));
        let req = crate::inspect::RequestView::new(
            Method::GET,
            "/p?id=1".parse().unwrap(),
            HeaderMap::new(),
        );
        let tx = Transaction::inbound(&req);
        let err = set.match_transaction(&tx).unwrap_err();
        assert!(err.to_string().contains("arg.id"));
    }
}
