//! The WAF document and its match loop.

use super::audit::{AuditLog, MatchRecord};
use crate::actions::find_action;
use crate::checkpoints::CheckpointTable;
use crate::error::{WafError, WafResult};
use crate::inspect::{RequestView, ResponseView, ResponseWriter, Transaction};
use crate::rules::{Direction, RuleGroup, RuleSet};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Engine version; stamped into documents and compared by the template
/// merger.
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Opaque 16-character document token.
pub(crate) fn random_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(16)
        .map(char::from)
        .collect()
}

type ActionCallback = dyn Fn(&str) -> bool + Send + Sync;

/// Outcome of one match walk.
///
/// `error` carries the fail-open faults (`RuleEval`, `UnknownAction`)
/// that are reported alongside `go_next = true` rather than breaking
/// traffic.
#[derive(Debug)]
pub struct MatchResult<'a> {
    /// Whether downstream handlers should still run.
    pub go_next: bool,
    /// The matched set, when any group matched.
    pub set: Option<&'a RuleSet>,
    /// Fault encountered during the walk or the dispatch.
    pub error: Option<WafError>,
}

impl MatchResult<'_> {
    fn pass() -> Self {
        Self {
            go_next: true,
            set: None,
            error: None,
        }
    }

    /// Whether any set matched.
    pub fn matched(&self) -> bool {
        self.set.is_some()
    }
}

fn default_enabled() -> bool {
    true
}

/// A WAF document plus the derived state built at init.
///
/// The persisted shape is `{ id, enabled, name, inbound, outbound,
/// createdVersion }`; everything else is rebuilt by [`Waf::init`].
/// Match operations are read-only and safe for concurrent callers while
/// no mutator runs; hosts that edit concurrently should build a new WAF,
/// init it, and swap an `Arc<Waf>` pointer.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Waf {
    /// Opaque 16-character token, generated at creation and immutable.
    #[serde(default)]
    pub id: String,

    /// Master switch.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Display name.
    #[serde(default)]
    pub name: String,

    /// Request-side groups in evaluation order.
    #[serde(default)]
    pub inbound: Vec<RuleGroup>,

    /// Response-side groups in evaluation order.
    #[serde(default)]
    pub outbound: Vec<RuleGroup>,

    /// Engine version that last merged templates into this document.
    #[serde(default)]
    pub created_version: String,

    #[serde(skip)]
    has_inbound: bool,

    #[serde(skip)]
    has_outbound: bool,

    #[serde(skip)]
    lenient_moves: bool,

    #[serde(skip)]
    checkpoints: Option<Arc<CheckpointTable>>,

    #[serde(skip)]
    on_action: Option<Arc<ActionCallback>>,

    #[serde(skip)]
    audit: Arc<AuditLog>,
}

impl fmt::Debug for Waf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Waf")
            .field("id", &self.id)
            .field("enabled", &self.enabled)
            .field("name", &self.name)
            .field("inbound", &self.inbound.len())
            .field("outbound", &self.outbound.len())
            .field("created_version", &self.created_version)
            .finish_non_exhaustive()
    }
}

impl Default for Waf {
    fn default() -> Self {
        Self::new()
    }
}

impl Waf {
    /// Create an empty, enabled WAF with a fresh id.
    pub fn new() -> Self {
        Self {
            id: random_id(),
            enabled: true,
            name: String::new(),
            inbound: Vec::new(),
            outbound: Vec::new(),
            created_version: String::new(),
            has_inbound: false,
            has_outbound: false,
            lenient_moves: false,
            checkpoints: None,
            on_action: None,
            audit: Arc::new(AuditLog::default()),
        }
    }

    /// Load a document from disk. Does not init.
    ///
    /// # Errors
    ///
    /// `NotFound` when the path does not exist, `Read` on IO failure,
    /// `Parse` on a malformed document. Unknown fields are ignored for
    /// forward compatibility.
    pub fn load_from_path(path: impl AsRef<Path>) -> WafResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(WafError::NotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path).map_err(|source| WafError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut waf: Self = serde_yaml::from_str(&content)?;
        if waf.id.is_empty() {
            waf.id = random_id();
        }
        Ok(waf)
    }

    /// Persist the document. Stamps `createdVersion` when empty.
    ///
    /// # Errors
    ///
    /// `Parse` on serialization failure, `Write` on IO failure.
    pub fn save(&mut self, path: impl AsRef<Path>) -> WafResult<()> {
        let path = path.as_ref();
        if self.created_version.is_empty() {
            self.created_version = ENGINE_VERSION.to_string();
        }
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content).map_err(|source| WafError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Materialize derived state: build the checkpoint table, wire every
    /// rule's resolver, validate and init the groups.
    ///
    /// # Errors
    ///
    /// The ConfigError family on the first invalid rule or structural
    /// violation (duplicate ids or codes, direction mismatch).
    pub fn init(&mut self) -> WafResult<()> {
        self.validate_document()?;

        let table = Arc::new(CheckpointTable::build());
        for group in self.inbound.iter_mut().chain(self.outbound.iter_mut()) {
            group.init(&table)?;
        }

        self.has_inbound = !self.inbound.is_empty();
        self.has_outbound = !self.outbound.is_empty();
        self.checkpoints = Some(table);

        debug!(
            waf = %self.id,
            inbound = self.inbound.len(),
            outbound = self.outbound.len(),
            "initialized waf"
        );
        Ok(())
    }

    fn validate_document(&self) -> WafResult<()> {
        Self::check_group_ids(&self.inbound)?;
        Self::check_group_ids(&self.outbound)?;

        let mut codes = HashSet::new();
        for group in self.inbound.iter().chain(&self.outbound) {
            if let Some(code) = group.code.as_deref() {
                if !code.is_empty() && !codes.insert(code) {
                    return Err(WafError::DuplicateId {
                        kind: "rule group code",
                        id: code.to_string(),
                    });
                }
            }
        }

        for (group, expected) in self
            .inbound
            .iter()
            .map(|g| (g, Direction::Inbound))
            .chain(self.outbound.iter().map(|g| (g, Direction::Outbound)))
        {
            if group.direction != expected {
                return Err(WafError::DirectionMismatch {
                    group: if group.id.is_empty() {
                        group.name.clone()
                    } else {
                        group.id.clone()
                    },
                });
            }
            Self::check_set_identifiers(group)?;
        }
        Ok(())
    }

    fn check_group_ids(groups: &[RuleGroup]) -> WafResult<()> {
        let mut ids = HashSet::new();
        for group in groups {
            if !group.id.is_empty() && !ids.insert(group.id.as_str()) {
                return Err(WafError::DuplicateId {
                    kind: "rule group id",
                    id: group.id.clone(),
                });
            }
        }
        Ok(())
    }

    fn check_set_identifiers(group: &RuleGroup) -> WafResult<()> {
        let mut ids = HashSet::new();
        let mut codes = HashSet::new();
        for set in &group.sets {
            if !set.id.is_empty() && !ids.insert(set.id.as_str()) {
                return Err(WafError::DuplicateId {
                    kind: "rule set id",
                    id: set.id.clone(),
                });
            }
            if let Some(code) = set.code.as_deref() {
                if !code.is_empty() && !codes.insert(code) {
                    return Err(WafError::DuplicateId {
                        kind: "rule set code",
                        id: code.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Invoke every checkpoint's start hook.
    pub fn start(&self) {
        if let Some(table) = &self.checkpoints {
            table.start();
        }
    }

    /// Invoke every checkpoint's stop hook.
    pub fn stop(&self) {
        if let Some(table) = &self.checkpoints {
            table.stop();
        }
    }

    /// Install an external dispatch callback.
    ///
    /// When set, the callback is authoritative: the engine bypasses the
    /// action registry entirely and writes nothing; the host owns any
    /// response.
    pub fn on_action(&mut self, callback: impl Fn(&str) -> bool + Send + Sync + 'static) {
        self.on_action = Some(Arc::new(callback));
    }

    /// Walk enabled inbound groups against one request.
    pub fn match_request<'a>(
        &'a self,
        request: &RequestView,
        writer: &mut dyn ResponseWriter,
    ) -> MatchResult<'a> {
        if !self.has_inbound {
            return MatchResult::pass();
        }
        let tx = Transaction::inbound(request);
        self.run_match(&tx, Direction::Inbound, writer)
    }

    /// Walk enabled outbound groups against one request/response pair.
    pub fn match_response<'a>(
        &'a self,
        request: &RequestView,
        response: &ResponseView,
        writer: &mut dyn ResponseWriter,
    ) -> MatchResult<'a> {
        if !self.has_outbound {
            return MatchResult::pass();
        }
        let tx = Transaction::outbound(request, response);
        self.run_match(&tx, Direction::Outbound, writer)
    }

    fn run_match<'a>(
        &'a self,
        tx: &Transaction<'_>,
        direction: Direction,
        writer: &mut dyn ResponseWriter,
    ) -> MatchResult<'a> {
        let groups = match direction {
            Direction::Inbound => &self.inbound,
            Direction::Outbound => &self.outbound,
        };

        for group in groups {
            if !group.enabled {
                continue;
            }
            match group.match_transaction(tx) {
                Ok(Some(set)) => return self.dispatch(direction, group, set, writer),
                Ok(None) => {},
                Err(error) => {
                    warn!(waf = %self.id, group = %group.id, %error, "rule evaluation failed");
                    return MatchResult {
                        go_next: true,
                        set: None,
                        error: Some(error),
                    };
                },
            }
        }
        MatchResult::pass()
    }

    fn dispatch<'a>(
        &self,
        direction: Direction,
        group: &RuleGroup,
        set: &'a RuleSet,
        writer: &mut dyn ResponseWriter,
    ) -> MatchResult<'a> {
        let (go_next, error) = if let Some(callback) = &self.on_action {
            (callback(&set.action), None)
        } else {
            match find_action(&set.action) {
                Some(action) => (action.perform(writer), None),
                None => {
                    warn!(waf = %self.id, action = %set.action, "matched set names unknown action");
                    (true, Some(WafError::UnknownAction(set.action.clone())))
                },
            }
        };

        self.audit.record(MatchRecord {
            waf_id: self.id.clone(),
            direction,
            group_id: group.id.clone(),
            group_name: group.name.clone(),
            set_id: set.id.clone(),
            set_name: set.name.clone(),
            action: set.action.clone(),
            go_next,
        });
        debug!(
            waf = %self.id,
            %direction,
            group = %group.name,
            set = %set.name,
            action = %set.action,
            go_next,
            "waf match dispatched"
        );

        MatchResult {
            go_next,
            set: Some(set),
            error,
        }
    }

    /// Append a group to the collection its direction names.
    pub fn add_rule_group(&mut self, group: RuleGroup) {
        match group.direction {
            Direction::Inbound => self.inbound.push(group),
            Direction::Outbound => self.outbound.push(group),
        }
    }

    /// Remove a group by id from either collection.
    pub fn remove_rule_group(&mut self, id: &str) {
        if id.is_empty() {
            return;
        }
        self.inbound.retain(|group| group.id != id);
        self.outbound.retain(|group| group.id != id);
    }

    /// Find a group by id in either collection.
    pub fn find_rule_group(&self, id: &str) -> Option<&RuleGroup> {
        if id.is_empty() {
            return None;
        }
        self.inbound
            .iter()
            .chain(&self.outbound)
            .find(|group| group.id == id)
    }

    /// Find a group by id for editing.
    pub fn find_rule_group_mut(&mut self, id: &str) -> Option<&mut RuleGroup> {
        if id.is_empty() {
            return None;
        }
        self.inbound
            .iter_mut()
            .chain(self.outbound.iter_mut())
            .find(|group| group.id == id)
    }

    /// Find a group by merge code in either collection.
    pub fn find_rule_group_with_code(&self, code: &str) -> Option<&RuleGroup> {
        if code.is_empty() {
            return None;
        }
        self.inbound
            .iter()
            .chain(&self.outbound)
            .find(|group| group.code.as_deref() == Some(code))
    }

    /// Find a group by merge code for editing.
    pub fn find_rule_group_with_code_mut(&mut self, code: &str) -> Option<&mut RuleGroup> {
        if code.is_empty() {
            return None;
        }
        self.inbound
            .iter_mut()
            .chain(self.outbound.iter_mut())
            .find(|group| group.code.as_deref() == Some(code))
    }

    /// Whether any group carries the given merge code.
    pub fn contains_group_code(&self, code: &str) -> bool {
        self.find_rule_group_with_code(code).is_some()
    }

    /// Reorder an inbound group.
    ///
    /// # Errors
    ///
    /// `IndexOutOfRange` on a bad index, unless lenient moves are on, in
    /// which case bad indices are a silent no-op. `from == to` is always
    /// an `Ok` no-op.
    pub fn move_inbound_rule_group(&mut self, from: usize, to: usize) -> WafResult<()> {
        Self::move_group(&mut self.inbound, from, to, self.lenient_moves)
    }

    /// Reorder an outbound group; same contract as the inbound form.
    pub fn move_outbound_rule_group(&mut self, from: usize, to: usize) -> WafResult<()> {
        Self::move_group(&mut self.outbound, from, to, self.lenient_moves)
    }

    /// Restore the legacy silent no-op on out-of-range moves.
    pub fn set_lenient_moves(&mut self, lenient: bool) {
        self.lenient_moves = lenient;
    }

    fn move_group(
        groups: &mut Vec<RuleGroup>,
        from: usize,
        to: usize,
        lenient: bool,
    ) -> WafResult<()> {
        let len = groups.len();
        for index in [from, to] {
            if index >= len {
                if lenient {
                    return Ok(());
                }
                return Err(WafError::IndexOutOfRange { index, len });
            }
        }
        if from == to {
            return Ok(());
        }
        let group = groups.remove(from);
        groups.insert(to, group);
        Ok(())
    }

    /// Total sets across inbound groups.
    pub fn count_inbound_rule_sets(&self) -> usize {
        self.inbound.iter().map(|group| group.sets.len()).sum()
    }

    /// Total sets across outbound groups.
    pub fn count_outbound_rule_sets(&self) -> usize {
        self.outbound.iter().map(|group| group.sets.len()).sum()
    }

    /// The match audit ring.
    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    pub(crate) fn log_merge(&self, changed: &[String]) {
        if !changed.is_empty() {
            info!(waf = %self.id, changes = changed.len(), "merged rule template");
        }
    }
}
