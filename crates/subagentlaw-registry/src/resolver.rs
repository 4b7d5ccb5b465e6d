//! Tool-set composition for a spawned agent.

use subagentlaw_core::types::TaskRestriction;

/// Compose a subagent's tool set from allow/deny lists and the parent's
/// available tools.
pub fn resolve_tools(allowed: &[String], disallowed: &[String], parent: &[String]) -> Vec<String> {
    let mut base: Vec<String> = if allowed.is_empty() {
        parent.to_vec()
    } else {
        parent.iter().filter(|t| allowed.contains(t)).cloned().collect()
    };
    base.retain(|t| !disallowed.contains(t));
    base.retain(|t| t != "Agent");
    base
}

/// Pull `Task`/`Task(...)` entries out of a tool list and turn them into a
/// restriction on which subagent types may be spawned. Returns the
/// restriction alongside the tool list with those entries stripped.
pub fn parse_task_restriction(tools: &[String]) -> (TaskRestriction, Vec<String>) {
    let mut allowed_types: Vec<String> = Vec::new();
    let mut unrestricted = false;
    let mut remaining = Vec::new();

    for tool in tools {
        if tool == "Task" {
            unrestricted = true;
            continue;
        }
        if let Some(stripped) = tool.strip_prefix("Task(") {
            if let Some(inner) = stripped.strip_suffix(')') {
                allowed_types.extend(inner.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()));
                continue;
            }
        }
        remaining.push(tool.clone());
    }

    let restriction = if unrestricted {
        TaskRestriction::Unrestricted
    } else if !allowed_types.is_empty() {
        TaskRestriction::AllowedTypes(allowed_types)
    } else {
        TaskRestriction::Unrestricted
    };

    (restriction, remaining)
}

/// Ensure memory-scoped agents keep file access even if not explicitly
/// listed.
pub fn ensure_memory_tools(tools: &mut Vec<String>) {
    for required in ["FileRead", "FileWrite", "FileEdit"] {
        if !tools.iter().any(|t| t == required) {
            tools.push(required.to_string());
        }
    }
}
