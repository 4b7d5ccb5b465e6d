//! Rule-content matching against a tool call's input.

use regex::Regex;
use serde_json::Value;
use subagentlaw_core::types::PermissionRule;

/// Which input field(s) a tool's rule content is matched against.
fn candidate_fields(tool_name: &str) -> &'static [&'static str] {
    match tool_name {
        "Bash" => &["command"],
        "Write" | "Edit" | "FileWrite" | "FileEdit" => &["file_path"],
        "Glob" | "Grep" => &["pattern", "path"],
        _ => &[],
    }
}

fn is_glob_pattern(pattern: &str) -> bool {
    pattern.contains(['*', '?', '[', '{'])
}

/// Translate a glob into an anchored regex. `*` matches within a path
/// segment, `**` matches across segments, `?` matches a single non-slash
/// character. Mirrors the strict-mode glob translator used for filesystem
/// and command matching elsewhere in this codebase's ancestry.
fn glob_match(pattern: &str, value: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    let mut regex_str = String::from("^");
    let chars: Vec<char> = pattern.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' => {
                if i + 1 < chars.len() && chars[i + 1] == '*' {
                    regex_str.push_str(".*");
                    i += 2;
                    continue;
                } else {
                    regex_str.push_str("[^/]*");
                }
            }
            '?' => regex_str.push_str("[^/]"),
            '.' | '^' | '$' | '+' | '{' | '}' | '[' | ']' | '|' | '(' | ')' | '\\' => {
                regex_str.push('\\');
                regex_str.push(chars[i]);
            }
            c => regex_str.push(c),
        }
        i += 1;
    }
    regex_str.push('$');
    Regex::new(&regex_str).map(|re| re.is_match(value)).unwrap_or(false)
}

fn field_value<'a>(input: &'a Value, tool_name: &str) -> Vec<&'a str> {
    let fields = candidate_fields(tool_name);
    if !fields.is_empty() {
        return fields
            .iter()
            .filter_map(|f| input.get(*f).and_then(Value::as_str))
            .collect();
    }
    // Any other tool: try every string-typed top-level field.
    match input.as_object() {
        Some(map) => map.values().filter_map(Value::as_str).collect(),
        None => Vec::new(),
    }
}

/// Does this rule match the given invocation? `input` is `None` for a call
/// with no arguments at all; empty rule content matches that too, but
/// non-empty rule content never does.
pub fn rule_matches(rule: &PermissionRule, tool_name: &str, input: Option<&Value>) -> bool {
    if rule.tool_name != tool_name {
        return false;
    }
    if rule.rule_content.is_empty() {
        return true;
    }
    let Some(input) = input else {
        return false;
    };
    let values = field_value(input, tool_name);
    if values.is_empty() {
        return false;
    }
    values.iter().any(|v| {
        if is_glob_pattern(&rule.rule_content) {
            glob_match(&rule.rule_content, v)
        } else {
            v.to_lowercase().contains(&rule.rule_content.to_lowercase())
        }
    })
}
