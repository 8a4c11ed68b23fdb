//! The rule hierarchy: group → set → rule.
//!
//! A rule is one predicate over a checkpoint value; a set combines rules
//! with a Boolean connector and names an action; a group is an ordered
//! disjunction of sets for one direction.

mod group;
mod operator;
mod rule;
mod set;

pub use group::{Direction, RuleGroup};
pub use operator::RuleOperator;
pub use rule::Rule;
pub use set::{Connector, RuleSet};
