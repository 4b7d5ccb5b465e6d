//! Persistent per-agent memory directories.

use std::path::{Path, PathBuf};

/// Resolve a definition's `memory` scope to a directory.
/// `auto`/`user` (or no explicit scope keyword) resolves under the user's
/// home; `project` resolves under the current working directory; `local`
/// resolves to a directory that is conventionally excluded from version
/// control; anything else is treated as a literal path.
pub fn resolve_memory_dir(scope: &str, agent_name: &str, cwd: &Path) -> PathBuf {
    match scope {
        "auto" | "user" | "" => dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".claude")
            .join("agent-memory")
            .join(agent_name),
        "project" => cwd.join(".claude").join("agent-memory").join(agent_name),
        "local" => cwd.join(".claude").join("agent-memory-local").join(agent_name),
        literal => PathBuf::from(literal),
    }
}

/// Read up to the first `max_lines` lines of `MEMORY.md` under `dir`, if present.
pub fn read_memory_block(dir: &Path, max_lines: usize) -> Option<String> {
    let path = dir.join("MEMORY.md");
    let contents = std::fs::read_to_string(path).ok()?;
    let truncated: Vec<&str> = contents.lines().take(max_lines).collect();
    Some(truncated.join("\n"))
}

pub fn ensure_memory_dir(dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)
}
