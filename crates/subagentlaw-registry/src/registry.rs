//! `DefinitionRegistry`: the merged, priority-resolved view of every known
//! agent definition, built-in and file-based alike.

use std::collections::HashMap;

use subagentlaw_core::error::{Error, Result};
use subagentlaw_core::types::{AgentDefinition, DefinitionSource};

/// Merges agent definitions from built-in, file-based (plugin/user/project),
/// and CLI sources by priority. CLI always wins; among file-based sources,
/// project > user > plugin.
#[derive(Debug, Default)]
pub struct DefinitionRegistry {
    definitions: HashMap<String, AgentDefinition>,
}

impl DefinitionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&AgentDefinition> {
        self.definitions.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.definitions.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Replace the registry contents with a freshly resolved set.
    pub fn resolve(
        &mut self,
        built_in: Vec<AgentDefinition>,
        file_based: Vec<AgentDefinition>,
        cli: Vec<AgentDefinition>,
    ) {
        let mut merged: HashMap<String, AgentDefinition> = HashMap::new();
        for def in built_in {
            merged.insert(def.name.clone(), def);
        }
        for def in file_based {
            match merged.get(&def.name) {
                Some(existing) if def.priority < existing.priority => continue,
                _ => {
                    merged.insert(def.name.clone(), def);
                }
            }
        }
        for mut def in cli {
            def.source = DefinitionSource::Cli;
            def.priority = DefinitionSource::Cli.priority();
            merged.insert(def.name.clone(), def);
        }
        self.definitions = merged;
    }

    /// Parse a CLI definition-merge JSON payload.
    pub fn parse_cli_definitions(json: &str) -> Result<Vec<AgentDefinition>> {
        let raw: HashMap<String, serde_json::Value> =
            serde_json::from_str(json).map_err(Error::Json)?;
        let mut defs = Vec::new();
        for (name, value) in raw {
            let description = value
                .get("description")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            let prompt = value
                .get("prompt")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            let mut def = AgentDefinition::new(name, description, prompt);
            def.source = DefinitionSource::Cli;
            def.priority = DefinitionSource::Cli.priority();
            if let Some(tools) = value.get("tools").and_then(|v| v.as_array()) {
                def.tools = tools.iter().filter_map(|v| v.as_str()).map(String::from).collect();
            }
            if let Some(model) = value.get("model").and_then(|v| v.as_str()) {
                def.model = Some(model.to_string());
            }
            def.validate().map_err(|reason| Error::validation(def.name.clone(), reason))?;
            defs.push(def);
        }
        Ok(defs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def(name: &str, source: DefinitionSource) -> AgentDefinition {
        let mut d = AgentDefinition::new(name, "desc", "prompt");
        d.source = source;
        d.priority = source.priority();
        d
    }

    #[test]
    fn cli_always_wins() {
        let mut registry = DefinitionRegistry::new();
        registry.resolve(
            vec![def("Explore", DefinitionSource::BuiltIn)],
            vec![def("Explore", DefinitionSource::Project)],
            vec![def("Explore", DefinitionSource::Cli)],
        );
        assert_eq!(registry.get("Explore").unwrap().source, DefinitionSource::Cli);
    }

    #[test]
    fn project_overrides_builtin() {
        let mut registry = DefinitionRegistry::new();
        let mut project_def = def("Explore", DefinitionSource::Project);
        project_def.description = "Custom".to_string();
        registry.resolve(vec![def("Explore", DefinitionSource::BuiltIn)], vec![project_def], vec![]);
        let resolved = registry.get("Explore").unwrap();
        assert_eq!(resolved.description, "Custom");
        assert_eq!(resolved.source, DefinitionSource::Project);
    }

    #[test]
    fn lower_priority_file_source_never_overwrites_higher() {
        let mut registry = DefinitionRegistry::new();
        registry.resolve(
            vec![],
            vec![def("Explore", DefinitionSource::Project), def("Explore", DefinitionSource::Plugin)],
            vec![],
        );
        // whichever was inserted with the higher priority wins regardless of vec order
        assert_eq!(registry.get("Explore").unwrap().source, DefinitionSource::Project);
    }

    #[test]
    fn parses_cli_json_payload() {
        let json = r#"{"Reviewer": {"description": "reviews code", "prompt": "Review this.", "tools": ["Read", "Grep"]}}"#;
        let defs = DefinitionRegistry::parse_cli_definitions(json).unwrap();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "Reviewer");
        assert_eq!(defs[0].tools, vec!["Read", "Grep"]);
    }
}
