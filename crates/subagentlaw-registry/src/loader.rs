//! Parses `.md` agent definition files: frontmatter extraction, field
//! validation, and directory scanning in plugin/user/project priority order.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use subagentlaw_core::error::Error;
use subagentlaw_core::types::{AgentDefinition, DefinitionSource, HookMatcher, PermissionMode};
use tracing::warn;

const RECOGNIZED_KEYS: &[&str] = &[
    "name",
    "description",
    "tools",
    "disallowedTools",
    "model",
    "mcpServers",
    "maxTurns",
    "permissionMode",
    "skills",
    "memory",
    "hooks",
    "criticalSystemReminder_EXPERIMENTAL",
    "color",
];

/// Accepts either a YAML sequence or a comma-separated scalar string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum StringListOrScalar {
    List(Vec<String>),
    Scalar(String),
}

impl StringListOrScalar {
    fn into_vec(self) -> Vec<String> {
        match self {
            StringListOrScalar::List(items) => items,
            StringListOrScalar::Scalar(s) => s
                .split(',')
                .map(|item| item.trim().to_string())
                .filter(|item| !item.is_empty())
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Frontmatter {
    #[serde(default)]
    name: Option<String>,
    description: String,
    #[serde(default)]
    tools: Option<StringListOrScalar>,
    #[serde(default)]
    #[serde(rename = "disallowedTools")]
    disallowed_tools: Option<StringListOrScalar>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    #[serde(rename = "mcpServers")]
    mcp_servers: Option<StringListOrScalar>,
    #[serde(default)]
    #[serde(rename = "maxTurns")]
    max_turns: Option<u32>,
    #[serde(default)]
    #[serde(rename = "permissionMode")]
    permission_mode: Option<String>,
    #[serde(default)]
    skills: Option<StringListOrScalar>,
    #[serde(default)]
    memory: Option<String>,
    #[serde(default)]
    hooks: HashMap<String, Vec<HookMatcher>>,
    #[serde(default)]
    #[serde(rename = "criticalSystemReminder_EXPERIMENTAL")]
    critical_reminder: Option<String>,
    #[serde(default)]
    color: Option<String>,
}

fn parse_permission_mode(raw: &str) -> Result<PermissionMode, String> {
    match raw {
        "default" => Ok(PermissionMode::Default),
        "acceptEdits" => Ok(PermissionMode::AcceptEdits),
        "bypassPermissions" => Ok(PermissionMode::BypassPermissions),
        "plan" => Ok(PermissionMode::Plan),
        "delegate" => Ok(PermissionMode::Delegate),
        "dontAsk" => Ok(PermissionMode::DontAsk),
        other => Err(format!("unrecognized permissionMode '{other}'")),
    }
}

/// Split a `.md` file into its frontmatter block (if any) and prompt body.
fn split_frontmatter(contents: &str) -> (Option<&str>, &str) {
    let mut lines = contents.lines();
    match lines.next() {
        Some(first) if first.trim() == "---" => {}
        _ => return (None, contents.trim()),
    }
    let rest = &contents[contents.find('\n').map(|i| i + 1).unwrap_or(contents.len())..];
    if let Some(end) = rest.find("\n---") {
        let frontmatter = &rest[..end];
        let after_marker = &rest[end + 4..];
        let body_start = after_marker.find('\n').map(|i| i + 1).unwrap_or(after_marker.len());
        (Some(frontmatter), after_marker[body_start..].trim())
    } else {
        (None, contents.trim())
    }
}

fn warn_unknown_keys(raw: &str, path: &Path) {
    let Ok(value) = serde_yaml::from_str::<serde_yaml::Value>(raw) else {
        return;
    };
    let Some(map) = value.as_mapping() else {
        return;
    };
    for key in map.keys() {
        if let Some(key) = key.as_str() {
            if !RECOGNIZED_KEYS.contains(&key) {
                warn!(file = %path.display(), key, "unrecognized frontmatter key");
            }
        }
    }
}

/// Parse one agent definition `.md` file into an `AgentDefinition`.
pub fn parse_definition(path: &Path, contents: &str) -> Result<AgentDefinition, Error> {
    let (frontmatter_raw, body) = split_frontmatter(contents);

    let Some(frontmatter_raw) = frontmatter_raw else {
        return Err(Error::parse(path.display().to_string(), "no frontmatter block found"));
    };

    warn_unknown_keys(frontmatter_raw, path);

    let frontmatter: Frontmatter = serde_yaml::from_str(frontmatter_raw)
        .map_err(|e| Error::parse(path.display().to_string(), e.to_string()))?;

    let name = frontmatter.name.clone().unwrap_or_else(|| {
        path.file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unnamed")
            .to_string()
    });

    if frontmatter.description.trim().is_empty() {
        return Err(Error::validation(path.display().to_string(), "description must not be empty"));
    }

    if let Some(turns) = frontmatter.max_turns {
        if turns == 0 {
            return Err(Error::validation(path.display().to_string(), "maxTurns must be greater than zero"));
        }
    }

    let permission_mode = match frontmatter.permission_mode.as_deref() {
        Some(raw) => Some(
            parse_permission_mode(raw).map_err(|reason| Error::validation(path.display().to_string(), reason))?,
        ),
        None => None,
    };

    if let Some(model) = &frontmatter.model {
        let looks_like_alias = !model.contains('-') && !model.contains('/');
        if looks_like_alias && !is_known_alias(model) {
            return Err(Error::validation(
                path.display().to_string(),
                format!("unrecognized model alias '{model}'"),
            ));
        }
    }

    Ok(AgentDefinition {
        name,
        description: frontmatter.description,
        prompt: body.to_string(),
        tools: frontmatter.tools.map(StringListOrScalar::into_vec).unwrap_or_default(),
        disallowed_tools: frontmatter
            .disallowed_tools
            .map(StringListOrScalar::into_vec)
            .unwrap_or_default(),
        model: frontmatter.model,
        max_turns: frontmatter.max_turns,
        permission_mode,
        mcp_servers: frontmatter.mcp_servers.map(StringListOrScalar::into_vec).unwrap_or_default(),
        skills: frontmatter.skills.map(StringListOrScalar::into_vec).unwrap_or_default(),
        memory: frontmatter.memory,
        hooks: frontmatter.hooks,
        critical_reminder: frontmatter.critical_reminder,
        color: frontmatter.color,
        source: DefinitionSource::BuiltIn,
        priority: 0,
        file_path: Some(path.to_path_buf()),
    })
}

/// Bare-word model names recognized as aliases at load time. Expansion to a
/// full identifier happens later against the process-wide alias table; this
/// only rejects bare words that aren't one of the known short forms.
const KNOWN_MODEL_ALIASES: &[&str] = &["sonnet", "opus", "haiku", "inherit", "default"];

fn is_known_alias(model: &str) -> bool {
    KNOWN_MODEL_ALIASES.contains(&model)
}

/// Where the loader looks for `.md` definitions, in scan order.
#[derive(Debug, Clone, Default)]
pub struct LoaderConfig {
    pub plugin_dirs: Vec<PathBuf>,
    pub user_dir: Option<PathBuf>,
    pub project_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct LoadWarning {
    pub path: PathBuf,
    pub reason: String,
}

/// Scan all configured directories and parse every `.md` file found.
/// Missing directories are silently skipped; malformed files become
/// warnings and are skipped rather than aborting the scan.
pub fn load_all(config: &LoaderConfig) -> (Vec<AgentDefinition>, Vec<LoadWarning>) {
    let mut definitions = Vec::new();
    let mut warnings = Vec::new();

    for plugin_dir in &config.plugin_dirs {
        scan_dir(plugin_dir, DefinitionSource::Plugin, &mut definitions, &mut warnings);
    }
    if let Some(user_dir) = &config.user_dir {
        scan_dir(user_dir, DefinitionSource::User, &mut definitions, &mut warnings);
    }
    let project_agents_dir = config.project_dir.join(".claude").join("agents");
    scan_dir(&project_agents_dir, DefinitionSource::Project, &mut definitions, &mut warnings);

    (definitions, warnings)
}

fn scan_dir(
    dir: &Path,
    source: DefinitionSource,
    definitions: &mut Vec<AgentDefinition>,
    warnings: &mut Vec<LoadWarning>,
) {
    if !dir.is_dir() {
        return;
    }
    for entry in walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().and_then(|e| e.to_str()) == Some("md"))
    {
        let path = entry.path();
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                warnings.push(LoadWarning {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                });
                continue;
            }
        };
        match parse_definition(path, &contents) {
            Ok(mut def) => {
                def.source = source;
                def.priority = source.priority();
                definitions.push(def);
            }
            Err(e) => warnings.push(LoadWarning {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }),
        }
    }
}
