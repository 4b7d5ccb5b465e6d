//! `Arbiter`: the per-agent permission session. Holds the mode, the rule
//! sets, and the optional hook/callback/prompter/catalog collaborators, and
//! answers `check` by running a tool call down through the layered
//! mode-gate -> disabled -> allowed -> rules -> hook -> callback ->
//! mode-default pipeline.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;
use subagentlaw_core::error::{Error, Result};
use subagentlaw_core::risk::{default_behavior_for_tool, ToolAnnotations};
use subagentlaw_core::traits::{CallbackDecision, HookDecision, HookRunner, ParentToolCatalog, PermissionCallback, Prompter};
use subagentlaw_core::types::{PermissionRule, PermissionUpdate, PermissionMode, RuleBehavior, RuleSource, UpdateDestination};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::matcher::rule_matches;

/// Final decision returned by `Arbiter::check`.
#[derive(Debug, Clone)]
pub struct Decision {
    pub behavior: RuleBehavior,
    pub message: Option<String>,
    pub updated_input: Option<Value>,
    pub permission_updates: Vec<PermissionUpdate>,
}

impl Decision {
    fn allow() -> Self {
        Self {
            behavior: RuleBehavior::Allow,
            message: None,
            updated_input: None,
            permission_updates: Vec::new(),
        }
    }

    fn deny(message: impl Into<String>) -> Self {
        Self {
            behavior: RuleBehavior::Deny,
            message: Some(message.into()),
            updated_input: None,
            permission_updates: Vec::new(),
        }
    }
}

#[derive(Default)]
struct SessionState {
    mode: PermissionMode,
    config_rules: Vec<PermissionRule>,
    session_rules: Vec<PermissionRule>,
    disabled_tools: HashSet<String>,
    allowed_tools: HashSet<String>,
    directories: Vec<std::path::PathBuf>,
}

/// The seven-layer permission decision pipeline. Order is a contract: mode
/// gate, disabled list, allowed list, rules, permission hook, callback,
/// mode default.
pub struct Arbiter {
    state: RwLock<SessionState>,
    hook_runner: Option<Arc<dyn HookRunner>>,
    callback: Option<Arc<dyn PermissionCallback>>,
    prompter: Option<Arc<dyn Prompter>>,
    tool_catalog: Option<Arc<dyn ParentToolCatalog>>,
}

impl Arbiter {
    pub fn new(mode: PermissionMode) -> Self {
        Self {
            state: RwLock::new(SessionState {
                mode,
                ..Default::default()
            }),
            hook_runner: None,
            callback: None,
            prompter: None,
            tool_catalog: None,
        }
    }

    pub fn with_hook_runner(mut self, runner: Arc<dyn HookRunner>) -> Self {
        self.hook_runner = Some(runner);
        self
    }

    pub fn with_callback(mut self, callback: Arc<dyn PermissionCallback>) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn with_prompter(mut self, prompter: Arc<dyn Prompter>) -> Self {
        self.prompter = Some(prompter);
        self
    }

    /// Supplies the `mcp__*` capability-annotation lookup used when a caller
    /// doesn't pass annotations directly into `check`.
    pub fn with_tool_catalog(mut self, catalog: Arc<dyn ParentToolCatalog>) -> Self {
        self.tool_catalog = Some(catalog);
        self
    }

    pub async fn mode(&self) -> PermissionMode {
        self.state.read().await.mode
    }

    pub async fn check(
        &self,
        tool_name: &str,
        input: Option<&Value>,
        annotations: Option<ToolAnnotations>,
    ) -> Result<Decision> {
        let state = self.state.read().await;

        // Layer 1: mode gate.
        match state.mode {
            PermissionMode::BypassPermissions => {
                let flag = input
                    .and_then(|v| v.get("allowDangerouslySkipPermissions"))
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                if !flag {
                    return Err(Error::configuration(
                        "bypassPermissions mode requires an explicit allowDangerouslySkipPermissions flag",
                    ));
                }
                debug!(tool = tool_name, "layer=mode_gate decision=allow (bypass)");
                return Ok(Decision::allow());
            }
            PermissionMode::Plan => {
                debug!(tool = tool_name, "layer=mode_gate decision=deny (plan)");
                return Ok(Decision::deny("plan mode denies every tool"));
            }
            PermissionMode::Delegate => {
                return Ok(if tool_name == "Agent" {
                    Decision::allow()
                } else {
                    Decision::deny("delegate mode only allows the Agent tool")
                });
            }
            _ => {}
        }

        // Layer 2: disabled list.
        if state.disabled_tools.contains(tool_name) {
            info!(tool = tool_name, "layer=disabled decision=deny");
            return Ok(Decision::deny("tool is disabled"));
        }

        // Layer 3: allowed list.
        if state.allowed_tools.contains(tool_name) {
            debug!(tool = tool_name, "layer=allowed decision=allow");
            return Ok(Decision::allow());
        }

        // Layer 4: rules (config first, then session; first match wins).
        // A matched rule whose behavior is `ask` cannot itself force a
        // prompt — it falls through to later layers.
        for rule in state.config_rules.iter().chain(state.session_rules.iter()) {
            if rule_matches(rule, tool_name, input) {
                match rule.behavior {
                    RuleBehavior::Allow => return Ok(Decision::allow()),
                    RuleBehavior::Deny => return Ok(Decision::deny("denied by rule")),
                    RuleBehavior::Ask => break,
                }
            }
        }

        let mode = state.mode;
        drop(state);

        // Layer 5: permission hook.
        if let Some(runner) = &self.hook_runner {
            let payload = input.cloned().unwrap_or(Value::Null);
            for decision in runner.fire_permission_request(tool_name, &payload).await {
                match decision {
                    HookDecision::Allow => return Ok(Decision::allow()),
                    HookDecision::Deny(msg) => return Ok(Decision::deny(msg)),
                    HookDecision::Continue => continue,
                }
            }
        }

        // Layer 6: caller callback.
        if let Some(callback) = &self.callback {
            let payload = input.cloned().unwrap_or(Value::Null);
            if let Some(CallbackDecision {
                behavior,
                message,
                updated_input,
            }) = callback.decide(tool_name, &payload).await
            {
                return Ok(Decision {
                    behavior,
                    message,
                    updated_input,
                    permission_updates: Vec::new(),
                });
            }
        }

        // Layer 7: mode default.
        let annotations =
            annotations.or_else(|| self.tool_catalog.as_ref().and_then(|c| c.annotations(tool_name)));
        let default = default_behavior_for_tool(mode, tool_name, annotations);
        match default {
            RuleBehavior::Allow => Ok(Decision::allow()),
            RuleBehavior::Deny => Ok(Decision::deny("denied by mode default")),
            RuleBehavior::Ask => {
                if let Some(prompter) = &self.prompter {
                    let pending = Vec::new();
                    let payload = input.cloned().unwrap_or(Value::Null);
                    let resolved = prompter.prompt(tool_name, &payload, &pending).await;
                    Ok(match resolved {
                        RuleBehavior::Deny => Decision::deny("denied by interactive prompt"),
                        _ => Decision::allow(),
                    })
                } else {
                    Ok(Decision::deny("permission denied (no interactive prompter available)"))
                }
            }
        }
    }

    pub async fn apply_update(&self, update: PermissionUpdate) -> Result<()> {
        let mut state = self.state.write().await;
        match update {
            PermissionUpdate::AddRules { destination, rule } => {
                target_rules(&mut state, destination).push(rule);
            }
            PermissionUpdate::ReplaceRules {
                destination,
                tool_name,
                rule_content,
                behavior,
            } => {
                let rules = target_rules(&mut state, destination);
                rules.retain(|r| r.tool_name != tool_name);
                rules.push(PermissionRule::new(
                    tool_name,
                    rule_content,
                    behavior,
                    match destination {
                        UpdateDestination::Session => RuleSource::Session,
                        UpdateDestination::Config => RuleSource::Config,
                    },
                ));
            }
            PermissionUpdate::RemoveRules {
                destination,
                tool_name,
                rule_content,
            } => {
                let rules = target_rules(&mut state, destination);
                rules.retain(|r| !(r.tool_name == tool_name && r.rule_content == rule_content));
            }
            PermissionUpdate::SetMode { mode } => {
                state.mode = mode;
            }
            PermissionUpdate::AddDirectories { directories } => {
                state.directories.extend(directories);
            }
            PermissionUpdate::RemoveDirectories { directories } => {
                state.directories.retain(|d| !directories.contains(d));
            }
        }
        Ok(())
    }

    pub async fn set_disabled_tools(&self, tools: impl IntoIterator<Item = String>) {
        self.state.write().await.disabled_tools = tools.into_iter().collect();
    }

    pub async fn set_allowed_tools(&self, tools: impl IntoIterator<Item = String>) {
        self.state.write().await.allowed_tools = tools.into_iter().collect();
    }

    pub async fn directories(&self) -> Vec<std::path::PathBuf> {
        self.state.read().await.directories.clone()
    }
}

fn target_rules(state: &mut SessionState, destination: UpdateDestination) -> &mut Vec<PermissionRule> {
    match destination {
        UpdateDestination::Session => &mut state.session_rules,
        UpdateDestination::Config => &mut state.config_rules,
    }
}
