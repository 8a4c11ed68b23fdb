//! Process-global action registry.

use super::standard::{AllowAction, BlockAction, LogAction, RedirectAction, TagAction};
use super::Action;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

static ACTIONS: Lazy<RwLock<HashMap<String, Arc<dyn Action>>>> = Lazy::new(|| {
    let standard: [Arc<dyn Action>; 5] = [
        Arc::new(AllowAction),
        Arc::new(BlockAction::default()),
        Arc::new(LogAction),
        Arc::new(TagAction::default()),
        Arc::new(RedirectAction::default()),
    ];
    let mut map = HashMap::new();
    for action in standard {
        map.insert(action.name().to_string(), action);
    }
    RwLock::new(map)
});

/// Register an action, replacing any existing entry with the same name.
/// Intended for program startup; thereafter the table is read-only.
pub fn register_action(action: Arc<dyn Action>) {
    let name = action.name().to_string();
    if let Ok(mut actions) = ACTIONS.write() {
        if actions.insert(name.clone(), action).is_some() {
            tracing::debug!(name = %name, "replaced registered action");
        }
    }
}

/// Look an action up by name.
pub fn find_action(name: &str) -> Option<Arc<dyn Action>> {
    ACTIONS
        .read()
        .ok()
        .and_then(|actions| actions.get(name).cloned())
}
