//! A single predicate over one checkpoint value.

use super::group::Direction;
use super::operator::RuleOperator;
use crate::checkpoints::{CheckpointTable, Value};
use crate::error::{WafError, WafResult};
use crate::inspect::Transaction;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashSet;
use std::sync::Arc;

/// One predicate: `(checkpoint, operator, operand, options)`.
///
/// `checkpoint` is a dotted path whose prefix selects a registry entry
/// and whose suffix parameterizes it (`header.User-Agent`); the optional
/// `${...}` wrapper from hand-written documents is accepted. An explicit
/// `param` field overrides the suffix. The resolver handle mapping a
/// prefix to a live checkpoint instance is injected by `init`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    /// Dotted checkpoint path.
    pub checkpoint: String,

    /// Explicit checkpoint parameter, overriding the path suffix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,

    /// Predicate operator.
    pub operator: RuleOperator,

    /// Operand, interpreted per operator family.
    #[serde(default)]
    pub value: String,

    /// Lowercase both sides for the string operator families.
    #[serde(default, alias = "isCaseInsensitive")]
    pub case_insensitive: bool,

    #[serde(skip)]
    compiled: Option<Compiled>,

    #[serde(skip)]
    resolver: Option<Arc<CheckpointTable>>,
}

#[derive(Debug, Clone)]
struct Compiled {
    regex: Option<Regex>,
    set: Option<HashSet<String>>,
    number: Option<i64>,
}

impl Rule {
    /// Build an uninitialized rule.
    pub fn new(checkpoint: impl Into<String>, operator: RuleOperator, value: impl Into<String>) -> Self {
        Self {
            checkpoint: checkpoint.into(),
            param: None,
            operator,
            value: value.into(),
            case_insensitive: false,
            compiled: None,
            resolver: None,
        }
    }

    /// Builder: set the explicit parameter.
    #[must_use]
    pub fn with_param(mut self, param: impl Into<String>) -> Self {
        self.param = Some(param.into());
        self
    }

    /// Builder: lowercase both sides for string operators.
    #[must_use]
    pub fn with_case_insensitive(mut self) -> Self {
        self.case_insensitive = true;
        self
    }

    /// One-line identity used in error annotations.
    pub fn summary(&self) -> String {
        format!("{} {} {}", self.checkpoint, self.operator, self.value)
    }

    /// Checkpoint path without the optional `${...}` wrapper.
    fn normalized_checkpoint(&self) -> &str {
        let raw = self.checkpoint.trim();
        raw.strip_prefix("${")
            .and_then(|rest| rest.strip_suffix('}'))
            .unwrap_or(raw)
    }

    /// Registry prefix of the checkpoint path.
    pub fn prefix(&self) -> &str {
        let path = self.normalized_checkpoint();
        match path.split_once('.') {
            Some((prefix, _)) => prefix,
            None => path,
        }
    }

    /// Effective checkpoint parameter: the explicit field when set,
    /// otherwise the path suffix.
    pub fn effective_param(&self) -> &str {
        if let Some(param) = self.param.as_deref() {
            if !param.is_empty() {
                return param;
            }
        }
        match self.normalized_checkpoint().split_once('.') {
            Some((_, suffix)) => suffix,
            None => "",
        }
    }

    /// Validate against the checkpoint table and compile derived state.
    ///
    /// # Errors
    ///
    /// `UnknownCheckpoint` when the prefix has no registry entry,
    /// `CheckpointNotAvailable` when the checkpoint cannot run in the
    /// group's direction, `OperatorNotAdmitted` when the operator is
    /// outside the checkpoint's declared set, and `InvalidPattern` when
    /// a regex operand fails to compile.
    pub fn init(&mut self, resolver: Arc<CheckpointTable>, direction: Direction) -> WafResult<()> {
        let prefix = self.prefix().to_string();
        let instance = resolver
            .find(&prefix)
            .ok_or_else(|| WafError::UnknownCheckpoint {
                prefix: prefix.clone(),
                rule: self.summary(),
            })?;

        if !instance.def().available_for(direction) {
            return Err(WafError::CheckpointNotAvailable {
                prefix,
                direction: direction.to_string(),
            });
        }
        if !instance.def().admits(self.operator) {
            return Err(WafError::OperatorNotAdmitted {
                prefix,
                operator: self.operator.to_string(),
            });
        }

        let regex = if self.operator.is_regex() {
            let pattern = if self.case_insensitive {
                self.value.to_lowercase()
            } else {
                self.value.clone()
            };
            Some(
                Regex::new(&pattern).map_err(|e| WafError::InvalidPattern {
                    rule: self.summary(),
                    message: e.to_string(),
                })?,
            )
        } else {
            None
        };

        let set = if self.operator.is_set() {
            Some(
                self.value
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .map(|line| {
                        if self.case_insensitive {
                            line.to_lowercase()
                        } else {
                            line.to_string()
                        }
                    })
                    .collect(),
            )
        } else {
            None
        };

        let number = if self.operator.is_numeric() {
            self.value.trim().parse().ok()
        } else {
            None
        };

        self.compiled = Some(Compiled { regex, set, number });
        self.resolver = Some(resolver);
        Ok(())
    }

    /// Evaluate the predicate against one transaction.
    ///
    /// Missing values match only the operators that are vacuously true
    /// for absence; `BodyUnavailable` from the checkpoint is treated as
    /// Missing for this rule only.
    pub fn match_transaction(&self, tx: &Transaction<'_>) -> WafResult<bool> {
        let resolver = self
            .resolver
            .as_ref()
            .ok_or_else(|| self.eval_error("rule was not initialized"))?;
        let instance = resolver
            .find(self.prefix())
            .ok_or_else(|| self.eval_error("checkpoint vanished from table"))?;

        let extracted = match instance.extract(tx, self.effective_param()) {
            Ok(value) => value,
            Err(WafError::BodyUnavailable) => None,
            Err(e) => return Err(self.eval_error(&e.to_string())),
        };

        match extracted {
            None => Ok(self.operator.matches_missing(&self.value)),
            Some(value) => self.apply(&value),
        }
    }

    fn apply(&self, value: &Value) -> WafResult<bool> {
        use RuleOperator::*;

        let compiled = self
            .compiled
            .as_ref()
            .ok_or_else(|| self.eval_error("rule was not initialized"))?;

        Ok(match self.operator {
            Eq | Neq | Contains | NotContains | Prefix | Suffix => {
                let text = value.as_text();
                let (lhs, rhs) = self.fold_case(text);
                match self.operator {
                    Eq => lhs == rhs,
                    Neq => lhs != rhs,
                    Contains => lhs.contains(rhs.as_ref()),
                    NotContains => !lhs.contains(rhs.as_ref()),
                    Prefix => lhs.starts_with(rhs.as_ref()),
                    Suffix => lhs.ends_with(rhs.as_ref()),
                    _ => unreachable!(),
                }
            },
            Match | NotMatch => {
                let regex = compiled
                    .regex
                    .as_ref()
                    .ok_or_else(|| self.eval_error("regex was not compiled"))?;
                let text = value.as_text();
                let subject = if self.case_insensitive {
                    Cow::Owned(text.to_lowercase())
                } else {
                    text
                };
                let matched = regex.is_match(&subject);
                if self.operator == Match {
                    matched
                } else {
                    !matched
                }
            },
            Gt | Gte | Lt | Lte => match (value.as_int(), compiled.number) {
                (Some(lhs), Some(rhs)) => match self.operator {
                    Gt => lhs > rhs,
                    Gte => lhs >= rhs,
                    Lt => lhs < rhs,
                    Lte => lhs <= rhs,
                    _ => unreachable!(),
                },
                // Parse failure on either side never matches.
                _ => false,
            },
            In | NotIn => {
                let set = compiled
                    .set
                    .as_ref()
                    .ok_or_else(|| self.eval_error("membership set was not built"))?;
                let text = value.as_text();
                let needle = if self.case_insensitive {
                    Cow::Owned(text.to_lowercase())
                } else {
                    text
                };
                let member = set.contains(needle.as_ref());
                if self.operator == In {
                    member
                } else {
                    !member
                }
            },
            HasKey => true,
            Empty => value.is_empty(),
        })
    }

    fn fold_case<'a>(&'a self, text: Cow<'a, str>) -> (Cow<'a, str>, Cow<'a, str>) {
        if self.case_insensitive {
            (
                Cow::Owned(text.to_lowercase()),
                Cow::Owned(self.value.to_lowercase()),
            )
        } else {
            (text, Cow::Borrowed(self.value.as_str()))
        }
    }

    fn eval_error(&self, message: &str) -> WafError {
        WafError::RuleEval {
            rule: self.summary(),
            message: message.to_string(),
        }
    }
}
