use serde::Serialize;

use crate::{
    error::{Error, Result},
    skill::Skill,
    types::{Tool, ToolKind},
};

/// Tool type tag understood by the host extension layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtensionToolType {
    Shell,
    Http,
    Builtin,
    Custom,
}

impl From<ToolKind> for ExtensionToolType {
    fn from(kind: ToolKind) -> Self {
        match kind {
            ToolKind::Shell => Self::Shell,
            ToolKind::Http => Self::Http,
            ToolKind::Builtin => Self::Builtin,
            ToolKind::Script | ToolKind::Custom => Self::Custom,
        }
    }
}

/// Generic tool definition handed to the host.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtensionToolDefinition {
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub tool_type: ExtensionToolType,
    pub command: String,
    /// JSON parameter schema. Always an empty object for skill tools.
    pub parameters: serde_json::Value,
}

/// The host's "register a tool definition" capability.
pub trait ExtensionApi {
    fn register_tool(&mut self, definition: ExtensionToolDefinition) -> Result<()>;
}

pub fn to_extension(tool: &Tool) -> ExtensionToolDefinition {
    ExtensionToolDefinition {
        name: tool.name.clone(),
        description: tool.description.clone(),
        tool_type: tool.tool_kind().into(),
        command: tool.command.clone(),
        parameters: serde_json::json!({}),
    }
}

/// Register every tool of a loaded skill with the host.
///
/// Stops at the first host failure; tools registered before it stay
/// registered. Returns the number of tools registered.
pub fn register_tools(skill: &Skill, host: &mut dyn ExtensionApi) -> Result<usize> {
    if !skill.loaded {
        return Err(Error::InvalidArgument(format!(
            "skill '{}' is not loaded",
            skill.name()
        )));
    }
    for tool in &skill.manifest.tools {
        host.register_tool(to_extension(tool))?;
    }
    tracing::debug!(
        skill = %skill.name(),
        count = skill.manifest.tools.len(),
        "registered skill tools"
    );
    Ok(skill.manifest.tools.len())
}

/// In-memory [`ExtensionApi`] host keyed by tool name.
#[derive(Debug, Default)]
pub struct ToolCatalog {
    tools: Vec<ExtensionToolDefinition>,
}

impl ToolCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&ExtensionToolDefinition> {
        self.tools.iter().find(|t| t.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExtensionToolDefinition> {
        self.tools.iter()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn list_schemas(&self) -> Vec<serde_json::Value> {
        self.tools
            .iter()
            .map(|t| {
                serde_json::json!({
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.parameters,
                })
            })
            .collect()
    }
}

impl ExtensionApi for ToolCatalog {
    fn register_tool(&mut self, definition: ExtensionToolDefinition) -> Result<()> {
        if self.get(&definition.name).is_some() {
            return Err(Error::tool_exists(definition.name));
        }
        self.tools.push(definition);
        Ok(())
    }
}
