//! End-to-end tests for the match pipeline and document lifecycle.

use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};
use rampart::error::WafError;
use rampart::inspect::{BufferedResponse, RequestView, ResponseView};
use rampart::rules::{Connector, Direction, Rule, RuleGroup, RuleOperator, RuleSet};
use rampart::waf::{Waf, ENGINE_VERSION};

fn get(uri: &str) -> RequestView {
    RequestView::new(Method::GET, uri.parse().unwrap(), HeaderMap::new())
}

fn get_with_header(uri: &str, name: &str, value: &str) -> RequestView {
    let mut headers = HeaderMap::new();
    headers.insert(
        http::header::HeaderName::from_bytes(name.as_bytes()).unwrap(),
        value.parse().unwrap(),
    );
    RequestView::new(Method::GET, uri.parse().unwrap(), headers)
}

fn waf_with(groups: Vec<RuleGroup>) -> Waf {
    let mut waf = Waf::new();
    for group in groups {
        waf.add_rule_group(group);
    }
    waf.init().unwrap();
    waf
}

#[test]
fn header_block_scenario() {
    let waf = waf_with(vec![RuleGroup::new("g1", "agents", Direction::Inbound)
        .with_set(
            RuleSet::new("s1", "bad agents", "block").with_rule(
                Rule::new("header", RuleOperator::Contains, "sqlmap").with_param("User-Agent"),
            ),
        )]);

    let req = get_with_header("/", "User-Agent", "sqlmap/1.0");
    let mut w = BufferedResponse::new();
    let result = waf.match_request(&req, &mut w);

    assert!(!result.go_next);
    assert_eq!(result.set.unwrap().id, "s1");
    assert_eq!(w.status, Some(StatusCode::FORBIDDEN));
    assert!(!w.body.is_empty());
}

#[test]
fn query_regex_conjunction_logs_and_continues() {
    let waf = waf_with(vec![RuleGroup::new("g1", "ids", Direction::Inbound)
        .with_set(
            RuleSet::new("s1", "numeric id", "log")
                .with_rule(Rule::new("arg.id", RuleOperator::Match, "^[0-9]+$"))
                .with_rule(Rule::new("arg.id", RuleOperator::Lt, "1000000")),
        )]);

    let mut w = BufferedResponse::new();
    let result = waf.match_request(&get("/p?id=42"), &mut w);

    assert!(result.go_next);
    assert_eq!(result.set.unwrap().id, "s1");
    assert!(result.error.is_none());

    // A non-numeric id fails the conjunction.
    let mut w = BufferedResponse::new();
    let result = waf.match_request(&get("/p?id=42x"), &mut w);
    assert!(!result.matched());
}

#[test]
fn disjunction_matches_on_remote_addr_alone() {
    let waf = waf_with(vec![RuleGroup::new("g1", "either", Direction::Inbound)
        .with_set(
            RuleSet::new("s1", "addr or header", "block")
                .with_connector(Connector::Or)
                .with_rule(Rule::new("remoteAddr", RuleOperator::In, "1.2.3.4"))
                .with_rule(
                    Rule::new("header", RuleOperator::Eq, "1").with_param("X-Attack"),
                ),
        )]);

    let req = get("/").with_remote_addr("1.2.3.4:40000".parse().unwrap());
    let mut w = BufferedResponse::new();
    let result = waf.match_request(&req, &mut w);
    assert!(result.matched());
    assert!(!result.go_next);

    // Neither side present: no match.
    let other = get("/").with_remote_addr("8.8.8.8:40000".parse().unwrap());
    let mut w = BufferedResponse::new();
    assert!(!waf.match_request(&other, &mut w).matched());
}

#[test]
fn outbound_body_tag_scenario() {
    let waf = waf_with(vec![RuleGroup::new("g1", "leaks", Direction::Outbound)
        .with_set(
            RuleSet::new("s1", "php source", "tag")
                .with_rule(Rule::new("responseBody", RuleOperator::Contains, "<?php")),
        )]);

    let req = get("/index.php");
    let resp = ResponseView::new(StatusCode::OK, HeaderMap::new())
        .with_body(Bytes::from_static(b"<?php echo 'leak'; ?>"));

    let mut w = BufferedResponse::new();
    let result = waf.match_response(&req, &resp, &mut w);

    assert!(result.go_next);
    assert_eq!(result.set.unwrap().id, "s1");
    assert_eq!(w.header("x-waf-tag"), Some("waf"));
}

#[test]
fn unknown_action_fails_open_with_writer_untouched() {
    let waf = waf_with(vec![RuleGroup::new("g1", "odd", Direction::Inbound)
        .with_set(
            RuleSet::new("s1", "quarantined", "quarantine")
                .with_rule(Rule::new("arg.x", RuleOperator::Eq, "1")),
        )]);

    let mut w = BufferedResponse::new();
    let result = waf.match_request(&get("/p?x=1"), &mut w);

    assert!(result.go_next);
    assert_eq!(result.set.unwrap().id, "s1");
    assert!(matches!(result.error, Some(WafError::UnknownAction(_))));
    assert!(w.is_untouched());
}

#[test]
fn template_merge_scenario() {
    // Loaded WAF: one group code=sqli with a user-added set code=custom.
    let mut waf = Waf::new();
    waf.add_rule_group(
        RuleGroup::new("userGroup01abcdef", "sqli", Direction::Inbound)
            .with_code("sqli")
            .with_set(RuleSet::new("userSet01", "custom", "log").with_code("custom")),
    );

    // Engine template: a new group code=xss and a new set code=union
    // inside sqli.
    let mut pack = Waf::new();
    pack.add_rule_group(
        RuleGroup::new("tplXss", "xss", Direction::Inbound)
            .with_code("xss")
            .with_set(
                RuleSet::new("tplXssSet", "scriptTag", "block").with_code("scriptTag"),
            ),
    );
    pack.add_rule_group(
        RuleGroup::new("tplSqli", "sqli", Direction::Inbound)
            .with_code("sqli")
            .with_set(
                RuleSet::new("tplUnion", "union", "block").with_code("union").with_rule(
                    Rule::new("requestUri", RuleOperator::Match, r"(?i)union.+select"),
                ),
            ),
    );

    let changed = waf.merge_with_template(&pack);

    assert_eq!(
        changed,
        vec![
            "+group xss".to_string(),
            "+group sqli rule set: union".to_string(),
        ]
    );
    assert_eq!(waf.created_version, ENGINE_VERSION);

    let sqli = waf.find_rule_group_with_code("sqli").unwrap();
    assert_eq!(sqli.id, "userGroup01abcdef");
    assert!(sqli.find_rule_set_with_code("custom").is_some());
    assert!(sqli.find_rule_set_with_code("union").is_some());
    assert!(waf.contains_group_code("xss"));
}

// -- quantified invariants ------------------------------------------------

#[test]
fn no_enabled_groups_always_pass() {
    let mut group = RuleGroup::new("g1", "off", Direction::Inbound).with_set(
        RuleSet::new("s1", "would match", "block")
            .with_rule(Rule::new("requestPath", RuleOperator::Prefix, "/")),
    );
    group.enabled = false;

    let waf = waf_with(vec![group]);
    let mut w = BufferedResponse::new();
    let result = waf.match_request(&get("/anything"), &mut w);

    assert!(result.go_next);
    assert!(!result.matched());
    assert!(result.error.is_none());
    assert!(w.is_untouched());
}

#[test]
fn earlier_match_wins_regardless_of_prepended_non_matches() {
    let non_matching = |id: &str| {
        RuleSet::new(id, "never", "block")
            .with_rule(Rule::new("arg.never", RuleOperator::Eq, "yes"))
    };
    let matching = RuleSet::new("target", "always", "log")
        .with_rule(Rule::new("requestPath", RuleOperator::Prefix, "/"));

    let waf = waf_with(vec![RuleGroup::new("g1", "ordered", Direction::Inbound)
        .with_set(non_matching("n1"))
        .with_set(non_matching("n2"))
        .with_set(non_matching("n3"))
        .with_set(matching)]);

    let mut w = BufferedResponse::new();
    let result = waf.match_request(&get("/x"), &mut w);
    assert_eq!(result.set.unwrap().id, "target");
}

#[test]
fn save_load_save_is_byte_stable() {
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("first.yaml");
    let second = dir.path().join("second.yaml");

    let mut waf = Waf::new();
    waf.name = "round trip".to_string();
    waf.add_rule_group(
        RuleGroup::new("g1", "agents", Direction::Inbound)
            .with_code("agents")
            .with_set(
                RuleSet::new("s1", "bad agents", "block")
                    .with_connector(Connector::Or)
                    .with_rule(
                        Rule::new("header.User-Agent", RuleOperator::Contains, "sqlmap"),
                    ),
            ),
    );

    waf.save(&first).unwrap();
    let mut loaded = Waf::load_from_path(&first).unwrap();
    loaded.save(&second).unwrap();

    let a = std::fs::read_to_string(&first).unwrap();
    let b = std::fs::read_to_string(&second).unwrap();
    assert_eq!(a, b);
}

#[test]
fn merge_preserves_existing_ids_and_adds_all_codes() {
    let mut waf = Waf::new();
    waf.add_rule_group(
        RuleGroup::new("keepMe0123456789", "user rules", Direction::Inbound).with_set(
            RuleSet::new("userSet", "mine", "log")
                .with_rule(Rule::new("requestPath", RuleOperator::Prefix, "/admin")),
        ),
    );

    let template = rampart::waf::template();
    let changed = waf.merge_template();
    assert!(!changed.is_empty());

    for group in template.inbound.iter().chain(&template.outbound) {
        let code = group.code.as_deref().unwrap();
        assert!(waf.contains_group_code(code), "missing template code {code}");
    }
    // The user group is untouched.
    let kept = waf.find_rule_group("keepMe0123456789").unwrap();
    assert_eq!(kept.sets.len(), 1);
    assert_eq!(kept.sets[0].id, "userSet");

    // Merged document still initializes and serves.
    waf.init().unwrap();
    let mut w = BufferedResponse::new();
    let req = get("/files/..%2F..%2Fetc/passwd");
    assert!(!waf.match_request(&req, &mut w).go_next);
}

#[test]
fn merge_is_noop_at_current_version() {
    let mut waf = Waf::new();
    waf.created_version = ENGINE_VERSION.to_string();
    let before = serde_yaml::to_string(&waf).unwrap();

    assert!(waf.merge_template().is_empty());
    assert_eq!(serde_yaml::to_string(&waf).unwrap(), before);
}

#[test]
fn case_insensitive_equals_lowercased_both_sides() {
    let cases: &[(RuleOperator, &str, &str)] = &[
        (RuleOperator::Eq, "SQLMap", "sqlmap"),
        (RuleOperator::Contains, "x SQLMap y", "sqlmap"),
        (RuleOperator::Prefix, "SQLMap/1.0", "sqlmap"),
        (RuleOperator::Suffix, "scan by SQLMap", "sqlmap"),
        (RuleOperator::Match, "SQLMap", "^sqlmap$"),
        (RuleOperator::In, "SQLMap", "sqlmap\nnikto"),
    ];

    for (operator, sent, operand) in cases {
        let ci_waf = waf_with(vec![RuleGroup::new("g1", "ci", Direction::Inbound)
            .with_set(RuleSet::new("s1", "ci", "log").with_rule(
                Rule::new("header.User-Agent", *operator, *operand).with_case_insensitive(),
            ))]);

        let lowered_waf = waf_with(vec![RuleGroup::new("g1", "lower", Direction::Inbound)
            .with_set(RuleSet::new("s1", "lower", "log").with_rule(Rule::new(
                "header.User-Agent",
                *operator,
                operand.to_lowercase(),
            )))]);

        let ci_req = get_with_header("/", "User-Agent", sent);
        let lowered_req = get_with_header("/", "User-Agent", &sent.to_lowercase());

        let mut w = BufferedResponse::new();
        let ci_matched = ci_waf.match_request(&ci_req, &mut w).matched();
        let mut w = BufferedResponse::new();
        let lowered_matched = lowered_waf.match_request(&lowered_req, &mut w).matched();

        assert!(
            ci_matched,
            "case-insensitive {operator:?} should match {sent:?}"
        );
        assert_eq!(ci_matched, lowered_matched, "operator {operator:?}");
    }
}

// -- lifecycle and concurrency shape --------------------------------------

#[test]
fn start_stop_are_idempotent() {
    let mut waf = Waf::new();
    waf.merge_template();
    waf.init().unwrap();

    waf.start();
    waf.start();
    waf.stop();
    waf.stop();
}

#[test]
fn concurrent_readers_share_one_waf() {
    let mut waf = Waf::new();
    waf.merge_template();
    waf.init().unwrap();
    let waf = std::sync::Arc::new(waf);

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let waf = std::sync::Arc::clone(&waf);
            std::thread::spawn(move || {
                let req = get(&format!("/ok/{i}?id={i}"));
                let mut w = BufferedResponse::new();
                let result = waf.match_request(&req, &mut w);
                assert!(result.go_next);
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn body_dependent_rule_with_consumed_stream_fails_like_missing() {
    let waf = waf_with(vec![RuleGroup::new("g1", "body", Direction::Inbound)
        .with_set(
            RuleSet::new("s1", "payload", "block")
                .with_rule(Rule::new("requestBody", RuleOperator::Contains, "attack")),
        )]);

    let req = RequestView::new(Method::POST, "/upload".parse().unwrap(), HeaderMap::new())
        .without_body();
    let mut w = BufferedResponse::new();
    let result = waf.match_request(&req, &mut w);

    assert!(result.go_next);
    assert!(!result.matched());
    assert!(result.error.is_none());
}
