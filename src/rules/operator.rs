//! Rule operators.

use serde::{Deserialize, Serialize};

/// Predicate operator applied to an extracted value.
///
/// Families: equality (`eq`/`neq`), substring (`contains`/`notContains`/
/// `prefix`/`suffix`), regex (`match`/`notMatch`), numeric
/// (`gt`/`gte`/`lt`/`lte`), set membership (`in`/`notIn`), presence
/// (`hasKey`/`empty`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RuleOperator {
    /// Equal to the operand.
    Eq,
    /// Not equal to the operand.
    Neq,
    /// Contains the operand as a substring.
    Contains,
    /// Does not contain the operand.
    NotContains,
    /// Starts with the operand.
    Prefix,
    /// Ends with the operand.
    Suffix,
    /// Matches the operand as a regex.
    Match,
    /// Does not match the operand as a regex.
    NotMatch,
    /// Numerically greater than the operand.
    Gt,
    /// Numerically greater than or equal to the operand.
    Gte,
    /// Numerically less than the operand.
    Lt,
    /// Numerically less than or equal to the operand.
    Lte,
    /// Member of the newline-separated operand set.
    In,
    /// Not a member of the newline-separated operand set.
    NotIn,
    /// The parameterized key is present at all.
    HasKey,
    /// The value is empty (or missing).
    Empty,
}

impl RuleOperator {
    /// Wire name, as persisted in documents.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Neq => "neq",
            Self::Contains => "contains",
            Self::NotContains => "notContains",
            Self::Prefix => "prefix",
            Self::Suffix => "suffix",
            Self::Match => "match",
            Self::NotMatch => "notMatch",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::In => "in",
            Self::NotIn => "notIn",
            Self::HasKey => "hasKey",
            Self::Empty => "empty",
        }
    }

    /// Whether the operand is compiled as a regex at init.
    pub fn is_regex(&self) -> bool {
        matches!(self, Self::Match | Self::NotMatch)
    }

    /// Whether the operand is split into a membership set at init.
    pub fn is_set(&self) -> bool {
        matches!(self, Self::In | Self::NotIn)
    }

    /// Whether both sides are parsed as signed integers.
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Gt | Self::Gte | Self::Lt | Self::Lte)
    }

    /// Whether a missing extracted value matches.
    ///
    /// Missing matches only the negative forms that are vacuously true
    /// for an absent value; everything else short-circuits to non-match.
    pub fn matches_missing(&self, operand: &str) -> bool {
        match self {
            Self::Empty | Self::NotContains | Self::NotIn => true,
            Self::Neq => !operand.is_empty(),
            _ => false,
        }
    }
}

impl std::fmt::Display for RuleOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
