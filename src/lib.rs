//! # Rampart
//!
//! A rule-driven web application firewall evaluation engine: HTTP
//! transactions are classified against a hierarchy of ordered rule
//! groups, and a match dispatches a named action that may terminate
//! further processing.
//!
//! ## Architecture
//!
//! - [`inspect`] — immutable views over one transaction with memoized
//!   derived fields, and the writer seam actions respond through.
//! - [`checkpoints`] — named extractors resolved by prefix; a
//!   process-global prototype registry stamps out fresh instances per
//!   WAF so state never bleeds across configurations.
//! - [`rules`] — the group → set → rule hierarchy with strict ordering
//!   and short-circuit semantics.
//! - [`actions`] — the process-global action registry (block, allow,
//!   log, tag, redirect) with a uniform perform contract.
//! - [`waf`] — the persisted document, the match loop, and the additive
//!   template merger that upgrades stored configurations.
//!
//! Rules are data, not code: a [`waf::Waf`] round-trips through a YAML
//! document and is upgraded in place by [`waf::Waf::merge_template`].
//!
//! ## Concurrency
//!
//! Match operations are read-only against the document and safe for many
//! concurrent callers while no mutator runs. Hosts that edit a live WAF
//! build a new one, init it, and atomically swap the pointer used by
//! request handlers.

pub mod actions;
pub mod checkpoints;
pub mod error;
pub mod inspect;
pub mod rules;
pub mod waf;
