//! Wire and domain types: agent definitions, spawn input/output, permission
//! rules, and the lifecycle states an agent can be in.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Where a definition or rule originated, used to resolve merge priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DefinitionSource {
    BuiltIn,
    Plugin,
    User,
    Project,
    Cli,
}

impl DefinitionSource {
    /// Lower priority is overwritten by higher; CLI always wins.
    pub fn priority(self) -> i32 {
        match self {
            DefinitionSource::BuiltIn => 0,
            DefinitionSource::Plugin => 10,
            DefinitionSource::User => 20,
            DefinitionSource::Project => 30,
            DefinitionSource::Cli => 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PermissionMode {
    Default,
    AcceptEdits,
    BypassPermissions,
    Plan,
    Delegate,
    DontAsk,
}

impl Default for PermissionMode {
    fn default() -> Self {
        PermissionMode::Default
    }
}

/// A hook event fan-out target, matched against a tool-pattern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookMatcher {
    pub matcher: String,
    pub command: String,
}

/// The blueprint for one agent type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDefinition {
    pub name: String,
    pub description: String,
    pub prompt: String,

    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default)]
    pub disallowed_tools: Vec<String>,

    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub max_turns: Option<u32>,
    #[serde(default)]
    pub permission_mode: Option<PermissionMode>,

    #[serde(default)]
    pub mcp_servers: Vec<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub memory: Option<String>,
    #[serde(default)]
    pub hooks: HashMap<String, Vec<HookMatcher>>,

    #[serde(default)]
    pub critical_reminder: Option<String>,
    #[serde(default)]
    pub color: Option<String>,

    #[serde(default = "default_source")]
    pub source: DefinitionSource,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub file_path: Option<PathBuf>,
}

fn default_source() -> DefinitionSource {
    DefinitionSource::BuiltIn
}

impl AgentDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            prompt: prompt.into(),
            tools: Vec::new(),
            disallowed_tools: Vec::new(),
            model: None,
            max_turns: None,
            permission_mode: None,
            mcp_servers: Vec::new(),
            skills: Vec::new(),
            memory: None,
            hooks: HashMap::new(),
            critical_reminder: None,
            color: None,
            source: DefinitionSource::BuiltIn,
            priority: 0,
            file_path: None,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.description.trim().is_empty() {
            return Err("description must not be empty".into());
        }
        if let Some(turns) = self.max_turns {
            if turns == 0 {
                return Err("maxTurns must be greater than zero".into());
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleBehavior {
    Allow,
    Deny,
    Ask,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleSource {
    Config,
    Session,
}

/// A pattern rule consumed by the arbiter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionRule {
    pub tool_name: String,
    /// Empty content matches every invocation of `tool_name`.
    pub rule_content: String,
    pub behavior: RuleBehavior,
    pub source: RuleSource,
}

impl PermissionRule {
    pub fn new(tool_name: impl Into<String>, rule_content: impl Into<String>, behavior: RuleBehavior, source: RuleSource) -> Self {
        Self {
            tool_name: tool_name.into(),
            rule_content: rule_content.into(),
            behavior,
            source,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateDestination {
    Session,
    Config,
}

/// A mutation applied to arbiter session state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PermissionUpdate {
    AddRules {
        destination: UpdateDestination,
        rule: PermissionRule,
    },
    ReplaceRules {
        destination: UpdateDestination,
        tool_name: String,
        rule_content: String,
        behavior: RuleBehavior,
    },
    RemoveRules {
        destination: UpdateDestination,
        tool_name: String,
        rule_content: String,
    },
    SetMode {
        mode: PermissionMode,
    },
    AddDirectories {
        directories: Vec<PathBuf>,
    },
    RemoveDirectories {
        directories: Vec<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentState {
    Running,
    Completed,
    Failed,
    Stopped,
}

/// Token/cost/turn accounting for a finished agent run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metrics {
    pub turns: u32,
    pub duration_ms: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost_usd: f64,
}

/// Terminal snapshot of a finished agent run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub agent_id: String,
    pub content: String,
    pub state: AgentState,
    pub metrics: Metrics,
    pub error_message: Option<String>,
}

/// Input accepted by `Manager::spawn`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpawnInput {
    pub description: String,
    pub prompt: String,
    pub subagent_type: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub run_in_background: bool,
    #[serde(default)]
    pub max_turns: Option<u32>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub mode: Option<PermissionMode>,
    #[serde(default)]
    pub resume: Option<String>,
}

/// Output produced by `Manager::spawn`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpawnResult {
    pub agent_id: String,
    pub output: String,
    pub error: Option<String>,
    pub metrics: Option<Metrics>,
    pub output_file: Option<PathBuf>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// Restriction on which subagent types a caller may spawn.
#[derive(Debug, Clone)]
pub enum TaskRestriction {
    Unrestricted,
    AllowedTypes(Vec<String>),
}

impl TaskRestriction {
    pub fn permits(&self, subagent_type: &str) -> bool {
        match self {
            TaskRestriction::Unrestricted => true,
            TaskRestriction::AllowedTypes(types) => types.iter().any(|t| t == subagent_type),
        }
    }
}
