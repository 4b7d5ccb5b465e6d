//! Pre-approved permission callback used for background agents, which have
//! no caller around to answer an `ask` prompt.

use async_trait::async_trait;
use serde_json::Value;
use subagentlaw_core::traits::{CallbackDecision, PermissionCallback};
use subagentlaw_core::types::RuleBehavior;

const PRE_APPROVED: &[&str] = &[
    "Read", "Write", "Edit", "Glob", "Grep", "Bash", "WebFetch", "WebSearch", "NotebookRead",
    "NotebookEdit", "TodoRead", "TodoWrite",
];

/// The permission callback installed for background agents: a fixed
/// pre-approved set is allowed outright; interactive tools like
/// `AskUserQuestion` are denied even if a caller tries to pre-approve them,
/// since nobody is present to answer.
pub struct BackgroundPermissionChecker {
    extra_pre_approved: Vec<String>,
}

impl BackgroundPermissionChecker {
    pub fn new(extra_pre_approved: Vec<String>) -> Self {
        Self { extra_pre_approved }
    }
}

#[async_trait]
impl PermissionCallback for BackgroundPermissionChecker {
    async fn decide(&self, tool_name: &str, _input: &Value) -> Option<CallbackDecision> {
        if tool_name == "AskUserQuestion" {
            return Some(CallbackDecision {
                behavior: RuleBehavior::Deny,
                message: Some("interactive prompts are unavailable for background agents".to_string()),
                updated_input: None,
            });
        }
        if PRE_APPROVED.contains(&tool_name) || self.extra_pre_approved.iter().any(|t| t == tool_name) {
            return Some(CallbackDecision {
                behavior: RuleBehavior::Allow,
                message: None,
                updated_input: None,
            });
        }
        None
    }
}
