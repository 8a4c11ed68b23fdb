//! The built-in rule template and the additive upgrade merge.

use super::engine::{random_id, Waf, ENGINE_VERSION};
use crate::rules::{Connector, Direction, Rule, RuleGroup, RuleOperator, RuleSet};

/// The rule pack shipped with the engine.
///
/// Groups and sets carry stable codes so [`Waf::merge_template`] can
/// match them across engine upgrades; user-authored content never
/// carries a code and is exempt from merging.
pub fn template() -> Waf {
    let mut waf = Waf::new();
    waf.name = "builtin".to_string();
    waf.inbound = vec![
        sqli_group(),
        xss_group(),
        traversal_group(),
        scanner_group(),
    ];
    waf.outbound = vec![leak_group()];
    waf
}

fn sqli_group() -> RuleGroup {
    RuleGroup::new(random_id(), "SQL Injection", Direction::Inbound)
        .with_code("sqli")
        .with_set(
            RuleSet::new(random_id(), "Union probes", "block")
                .with_code("union")
                .with_connector(Connector::Or)
                .with_rule(
                    Rule::new(
                        "requestUri",
                        RuleOperator::Match,
                        r"(?i)\bunion\b.+\bselect\b",
                    ),
                )
                .with_rule(
                    Rule::new(
                        "requestBody",
                        RuleOperator::Match,
                        r"(?i)\bunion\b.+\bselect\b",
                    ),
                ),
        )
        .with_set(
            RuleSet::new(random_id(), "Boolean tautologies", "block")
                .with_code("tautology")
                .with_connector(Connector::Or)
                .with_rule(
                    Rule::new(
                        "requestUri",
                        RuleOperator::Match,
                        r#"(?i)\b(or|and)\s+['"]?\d+['"]?\s*=\s*['"]?\d+['"]?"#,
                    ),
                )
                .with_rule(
                    Rule::new(
                        "requestBody",
                        RuleOperator::Match,
                        r#"(?i)\b(or|and)\s+['"]?\d+['"]?\s*=\s*['"]?\d+['"]?"#,
                    ),
                ),
        )
}

fn xss_group() -> RuleGroup {
    RuleGroup::new(random_id(), "Cross-Site Scripting", Direction::Inbound)
        .with_code("xss")
        .with_set(
            RuleSet::new(random_id(), "Script tags", "block")
                .with_code("scriptTag")
                .with_connector(Connector::Or)
                .with_rule(Rule::new(
                    "requestUri",
                    RuleOperator::Match,
                    r"(?i)<script[^>]*>|javascript:",
                ))
                .with_rule(Rule::new(
                    "requestBody",
                    RuleOperator::Match,
                    r"(?i)<script[^>]*>[\s\S]*?</script>",
                )),
        )
        .with_set(
            RuleSet::new(random_id(), "Event handlers", "block")
                .with_code("eventHandler")
                .with_rule(Rule::new(
                    "requestUri",
                    RuleOperator::Match,
                    r"(?i)\bon(error|load|click|mouseover|focus|submit)\s*=",
                )),
        )
}

fn traversal_group() -> RuleGroup {
    RuleGroup::new(random_id(), "Path Traversal", Direction::Inbound)
        .with_code("traversal")
        .with_set(
            RuleSet::new(random_id(), "Parent escapes", "block")
                .with_code("dotdot")
                .with_rule(Rule::new(
                    "requestPath",
                    RuleOperator::Match,
                    r"(\.\.[/\\]|[/\\]\.\.)",
                )),
        )
        .with_set(
            RuleSet::new(random_id(), "Sensitive files", "block")
                .with_code("sensitiveFiles")
                .with_rule(Rule::new(
                    "requestPath",
                    RuleOperator::Match,
                    r"(?i)etc/(passwd|shadow|group)|boot\.ini|win\.ini|/proc/",
                )),
        )
}

fn scanner_group() -> RuleGroup {
    RuleGroup::new(random_id(), "Scanner Detection", Direction::Inbound)
        .with_code("scanner")
        .with_set(
            RuleSet::new(random_id(), "Known scanner agents", "block")
                .with_code("userAgent")
                .with_rule(Rule::new(
                    "header.User-Agent",
                    RuleOperator::Match,
                    r"(?i)(sqlmap|nikto|nessus|acunetix|dirbuster|masscan)",
                )),
        )
}

fn leak_group() -> RuleGroup {
    RuleGroup::new(random_id(), "Source Disclosure", Direction::Outbound)
        .with_code("leak")
        .with_set(
            RuleSet::new(random_id(), "Script source in body", "block")
                .with_code("scriptSource")
                .with_connector(Connector::Or)
                .with_rule(Rule::new("responseBody", RuleOperator::Contains, "<?php"))
                .with_rule(Rule::new(
                    "responseBody",
                    RuleOperator::Match,
                    r"(?i)<%\s*@\s*page\b",
                )),
        )
}

impl Waf {
    /// Merge the built-in template into this document.
    ///
    /// No-op when `createdVersion` already equals the engine version.
    /// Otherwise appends template groups missing by code (with a fresh
    /// id) and missing sets inside existing coded groups, never deleting
    /// or modifying user content, then advances `createdVersion`.
    /// Returns human-readable change descriptions.
    pub fn merge_template(&mut self) -> Vec<String> {
        self.merge_with_template(&template())
    }

    /// Merge an arbitrary rule pack; used by hosts shipping their own
    /// templates. Same contract as [`Waf::merge_template`].
    pub fn merge_with_template(&mut self, template: &Waf) -> Vec<String> {
        if self.created_version == ENGINE_VERSION {
            return Vec::new();
        }
        self.created_version = ENGINE_VERSION.to_string();

        let mut changed = Vec::new();
        for group in template.inbound.iter().chain(&template.outbound) {
            let Some(code) = group.code.as_deref() else {
                continue;
            };
            match self.find_rule_group_with_code_mut(code) {
                None => {
                    let mut fresh = group.clone();
                    fresh.id = random_id();
                    changed.push(format!("+group {}", fresh.name));
                    self.add_rule_group(fresh);
                },
                Some(existing) => {
                    for set in &group.sets {
                        let Some(set_code) = set.code.as_deref() else {
                            continue;
                        };
                        if existing.find_rule_set_with_code(set_code).is_none() {
                            existing.add_rule_set(set.clone());
                            changed.push(format!("+group {} rule set: {}", group.name, set.name));
                        }
                    }
                },
            }
        }

        self.log_merge(&changed);
        changed
    }
}
