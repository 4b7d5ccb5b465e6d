//! Default `HookRunner` implementations.

use async_trait::async_trait;
use serde_json::Value;
use subagentlaw_core::traits::{HookDecision, HookRunner};

/// A `HookRunner` that fires nothing and allows nothing through the
/// permission-hook layer. Useful as a default when no hook commands are
/// configured, or as a stand-in in tests that don't exercise hooks.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHookRunner;

#[async_trait]
impl HookRunner for NoopHookRunner {
    async fn fire_permission_request(&self, _tool_name: &str, _input: &Value) -> Vec<HookDecision> {
        Vec::new()
    }

    async fn fire_lifecycle(&self, _event: &str, _payload: Value) {}
}
