//! Trait contracts at the seams between the supervisor and its external
//! collaborators: the hook runner, the permission callback/prompter, the
//! parent's tool catalog, and the run loop itself.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::risk::ToolAnnotations;
use crate::types::{HookMatcher, PermissionMode, PermissionUpdate, RuleBehavior};

/// Decision returned by a permission hook callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookDecision {
    Allow,
    Deny(String),
    Continue,
}

/// Fans permission requests out to registered hook commands.
#[async_trait]
pub trait HookRunner: Send + Sync {
    async fn fire_permission_request(&self, tool_name: &str, input: &Value) -> Vec<HookDecision>;

    /// Lifecycle notifications; failures are swallowed by the caller.
    async fn fire_lifecycle(&self, event: &str, payload: Value);

    /// Activate an agent definition's own hook matchers for the duration of
    /// that agent's run. A no-op by default; implementations that support
    /// scoped hooks override this to make `hooks` take effect only for
    /// `agent_id`.
    async fn register_scoped(&self, agent_id: &str, hooks: &HashMap<String, Vec<HookMatcher>>) {
        let _ = (agent_id, hooks);
    }

    /// Deactivate whatever `register_scoped` installed for `agent_id`. Must
    /// be called before the agent's completion is reported so scoped hooks
    /// never fire for a tool call outside their owning agent's lifetime.
    async fn unregister_scoped(&self, agent_id: &str) {
        let _ = agent_id;
    }
}

/// The caller-supplied `canUseTool` callback.
#[derive(Debug, Clone)]
pub struct CallbackDecision {
    pub behavior: RuleBehavior,
    pub message: Option<String>,
    pub updated_input: Option<Value>,
}

#[async_trait]
pub trait PermissionCallback: Send + Sync {
    async fn decide(&self, tool_name: &str, input: &Value) -> Option<CallbackDecision>;
}

/// Interactive fallback for `ask` decisions.
#[async_trait]
pub trait Prompter: Send + Sync {
    async fn prompt(
        &self,
        tool_name: &str,
        input: &Value,
        pending_updates: &[PermissionUpdate],
    ) -> RuleBehavior;
}

/// Read-only view of the parent's tool registry. The tool implementations
/// themselves are an external collaborator; only this lookup contract is
/// owned here.
pub trait ParentToolCatalog: Send + Sync {
    fn tool_names(&self) -> Vec<String>;
    fn contains(&self, name: &str) -> bool;

    /// Capability hints for an `mcp__*` tool, if the catalog has any on
    /// file. Returns `None` for built-in tools and for MCP tools the
    /// catalog doesn't have annotations for.
    fn annotations(&self, tool_name: &str) -> Option<ToolAnnotations> {
        let _ = tool_name;
        None
    }
}

/// One message out of the run loop's drain stream, modeled as a tagged sum
/// type rather than a class hierarchy.
#[derive(Debug, Clone)]
pub enum RunLoopMessage {
    AssistantText(String),
    Result {
        is_error: bool,
        error_message: Option<String>,
        turns: u32,
        input_tokens: u64,
        output_tokens: u64,
        cost_usd: f64,
    },
    Other,
}

/// Why a run loop stopped draining.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunLoopExit {
    Completed,
    Interrupted,
    Aborted,
    Error,
}

/// The external LLM/tool turn driver. Referenced by contract only — the
/// supervisor starts it, drains its messages, and interrupts it; it never
/// inspects LLM wire formats itself.
#[async_trait]
pub trait RunLoop: Send {
    /// Pull the next message, or `None` once the stream has ended.
    async fn next_message(&mut self) -> Option<RunLoopMessage>;

    /// Request cooperative interruption; the next `next_message` call should
    /// observe end-of-stream soon after.
    fn interrupt(&self);

    /// Block until the loop has fully wound down and report why.
    async fn wait(self: Box<Self>) -> RunLoopExit;
}

/// Everything the run loop needs to start a child turn.
#[derive(Debug, Clone)]
pub struct ChildRunConfig {
    pub agent_id: String,
    pub system_prompt: String,
    pub user_message: String,
    pub model: String,
    pub tools: Vec<String>,
    pub max_turns: u32,
    pub mode: PermissionMode,
}
