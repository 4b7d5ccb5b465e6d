//! Skill-scoped tool gating: a skill's declared `tools:` patterns are
//! checked before the inner arbiter is even consulted.

use regex::Regex;
use serde_json::Value;
use subagentlaw_core::error::Result;
use subagentlaw_core::risk::ToolAnnotations;
use subagentlaw_core::types::RuleBehavior;

use crate::arbiter::{Arbiter, Decision};

/// One `tools:` entry from a skill definition: a bare name, a glob, or a
/// `Bash(prefix:*)`-style constraint on the first whitespace-delimited token
/// of the `command` field.
#[derive(Debug, Clone)]
enum Pattern {
    Bare(String),
    Glob(String),
    Constrained { tool: String, prefix_glob: String },
}

fn parse_pattern(raw: &str) -> Pattern {
    if let Some(open) = raw.find('(') {
        if let Some(close) = raw.rfind(')') {
            if close > open {
                let tool = raw[..open].to_string();
                let prefix_glob = raw[open + 1..close].to_string();
                return Pattern::Constrained { tool, prefix_glob };
            }
        }
    }
    if raw.contains(['*', '?', '[']) {
        Pattern::Glob(raw.to_string())
    } else {
        Pattern::Bare(raw.to_string())
    }
}

fn glob_to_regex(pattern: &str) -> Regex {
    let mut regex_str = String::from("^");
    for c in pattern.chars() {
        match c {
            '*' => regex_str.push_str(".*"),
            '?' => regex_str.push('.'),
            '.' | '^' | '$' | '+' | '{' | '}' | '[' | ']' | '|' | '(' | ')' | '\\' => {
                regex_str.push('\\');
                regex_str.push(c);
            }
            other => regex_str.push(other),
        }
    }
    regex_str.push('$');
    Regex::new(&regex_str).expect("glob-derived regex is always valid")
}

fn pattern_admits(pattern: &Pattern, tool_name: &str, input: Option<&Value>) -> bool {
    match pattern {
        Pattern::Bare(name) => name == tool_name,
        Pattern::Glob(glob) => glob_to_regex(glob).is_match(tool_name),
        Pattern::Constrained { tool, prefix_glob } => {
            if tool != tool_name {
                return false;
            }
            let Some(command) = input.and_then(|i| i.get("command")).and_then(Value::as_str) else {
                return false;
            };
            let token = command.split_whitespace().next().unwrap_or("");
            glob_to_regex(prefix_glob).is_match(token)
        }
    }
}

/// Wraps an [`Arbiter`] so that a tool call must also match one of a skill's
/// declared tool patterns before the inner arbiter is even consulted.
pub struct SkillScope<'a> {
    inner: &'a Arbiter,
    patterns: Vec<Pattern>,
}

impl<'a> SkillScope<'a> {
    pub fn new(inner: &'a Arbiter, tool_patterns: &[String]) -> Self {
        Self {
            inner,
            patterns: tool_patterns.iter().map(|p| parse_pattern(p)).collect(),
        }
    }

    pub async fn check(
        &self,
        tool_name: &str,
        input: Option<&Value>,
        annotations: Option<ToolAnnotations>,
    ) -> Result<Decision> {
        if self.patterns.iter().any(|p| pattern_admits(p, tool_name, input)) {
            return Ok(Decision {
                behavior: RuleBehavior::Allow,
                message: None,
                updated_input: None,
                permission_updates: Vec::new(),
            });
        }
        self.inner.check(tool_name, input, annotations).await
    }
}
