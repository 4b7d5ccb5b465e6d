//! Tool risk classification feeding the arbiter's mode-default layer.

use crate::types::{PermissionMode, RuleBehavior};

/// Worst-case outcome a tool invocation can cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Risk {
    None,
    Low,
    Medium,
    High,
    Critical,
}

/// Optional capability hints attached to `mcp__*` tools.
#[derive(Debug, Clone, Copy, Default)]
pub struct ToolAnnotations {
    pub read_only: bool,
    pub destructive: bool,
}

/// Classify a tool name (plus optional annotations) into a risk ordinal.
pub fn risk(tool_name: &str, annotations: Option<ToolAnnotations>) -> Risk {
    match tool_name {
        "Read" | "Glob" | "Grep" | "NotebookRead" | "TodoRead" => Risk::None,
        "WebSearch" | "WebFetch" => Risk::Low,
        "Write" | "Edit" | "NotebookEdit" | "TodoWrite" => Risk::Medium,
        "Bash" | "BashOutput" | "KillShell" => Risk::High,
        "Agent" => Risk::Critical,
        other if other.starts_with("mcp__") => match annotations {
            Some(a) if a.destructive => Risk::Critical,
            Some(a) if a.read_only => Risk::Low,
            _ => Risk::High,
        },
        _ => Risk::High,
    }
}

/// Project risk onto the mode's default behavior matrix.
pub fn default_behavior_for_tool(
    mode: PermissionMode,
    tool_name: &str,
    annotations: Option<ToolAnnotations>,
) -> RuleBehavior {
    match mode {
        PermissionMode::BypassPermissions => RuleBehavior::Allow,
        PermissionMode::Plan => RuleBehavior::Deny,
        PermissionMode::Delegate => {
            if tool_name == "Agent" {
                RuleBehavior::Allow
            } else {
                RuleBehavior::Deny
            }
        }
        PermissionMode::Default => {
            if risk(tool_name, annotations) <= Risk::Low {
                RuleBehavior::Allow
            } else {
                RuleBehavior::Ask
            }
        }
        PermissionMode::AcceptEdits => {
            if risk(tool_name, annotations) <= Risk::Medium {
                RuleBehavior::Allow
            } else {
                RuleBehavior::Ask
            }
        }
        PermissionMode::DontAsk => {
            if risk(tool_name, annotations) <= Risk::Low {
                RuleBehavior::Allow
            } else {
                RuleBehavior::Deny
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_tools_classify_as_expected() {
        assert_eq!(risk("Read", None), Risk::None);
        assert_eq!(risk("Write", None), Risk::Medium);
        assert_eq!(risk("Bash", None), Risk::High);
        assert_eq!(risk("Agent", None), Risk::Critical);
    }

    #[test]
    fn unknown_tool_defaults_high() {
        assert_eq!(risk("SomeRandomTool", None), Risk::High);
    }

    #[test]
    fn mcp_tool_without_annotations_is_high() {
        assert_eq!(risk("mcp__github__create_pr", None), Risk::High);
    }

    #[test]
    fn mcp_destructive_dominates_read_only() {
        let both = ToolAnnotations {
            read_only: true,
            destructive: true,
        };
        assert_eq!(risk("mcp__github__delete_repo", Some(both)), Risk::Critical);
    }

    #[test]
    fn mcp_read_only_is_low() {
        let ro = ToolAnnotations {
            read_only: true,
            destructive: false,
        };
        assert_eq!(risk("mcp__github__get_repo", Some(ro)), Risk::Low);
    }

    #[test]
    fn mode_matrix_matches_spec_table() {
        assert_eq!(
            default_behavior_for_tool(PermissionMode::Default, "Read", None),
            RuleBehavior::Allow
        );
        assert_eq!(
            default_behavior_for_tool(PermissionMode::Default, "Bash", None),
            RuleBehavior::Ask
        );
        assert_eq!(
            default_behavior_for_tool(PermissionMode::AcceptEdits, "Write", None),
            RuleBehavior::Allow
        );
        assert_eq!(
            default_behavior_for_tool(PermissionMode::AcceptEdits, "Bash", None),
            RuleBehavior::Ask
        );
        assert_eq!(
            default_behavior_for_tool(PermissionMode::BypassPermissions, "Bash", None),
            RuleBehavior::Allow
        );
        assert_eq!(
            default_behavior_for_tool(PermissionMode::Plan, "Read", None),
            RuleBehavior::Deny
        );
        assert_eq!(
            default_behavior_for_tool(PermissionMode::Delegate, "Agent", None),
            RuleBehavior::Allow
        );
        assert_eq!(
            default_behavior_for_tool(PermissionMode::Delegate, "Bash", None),
            RuleBehavior::Deny
        );
        assert_eq!(
            default_behavior_for_tool(PermissionMode::DontAsk, "Read", None),
            RuleBehavior::Allow
        );
        assert_eq!(
            default_behavior_for_tool(PermissionMode::DontAsk, "Bash", None),
            RuleBehavior::Deny
        );
    }
}
