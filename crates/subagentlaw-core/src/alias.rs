//! Process-wide model alias table.

use std::collections::HashMap;
use std::sync::RwLock;

/// The one piece of process-wide mutable state this design permits: a table
/// mapping short model aliases (e.g. "sonnet") to full identifiers
/// (e.g. "claude-sonnet-4-5"). Readers take a stable snapshot or hold the
/// read lock for the scope of one resolution; writers never see partial
/// updates.
#[derive(Default)]
pub struct ModelAliasTable {
    aliases: RwLock<HashMap<String, String>>,
}

impl ModelAliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, alias: impl Into<String>, full: impl Into<String>) {
        self.aliases.write().unwrap().insert(alias.into(), full.into());
    }

    /// Resolve an alias to its full identifier, or return the input
    /// unchanged if it isn't a registered alias (treated as already-concrete).
    pub fn expand(&self, model: &str) -> String {
        self.aliases
            .read()
            .unwrap()
            .get(model)
            .cloned()
            .unwrap_or_else(|| model.to_string())
    }

    pub fn snapshot(&self) -> HashMap<String, String> {
        self.aliases.read().unwrap().clone()
    }
}
