use std::{fmt, path::PathBuf, str::FromStr};

use serde::{Deserialize, Serialize};

/// Version stamped on manifests that do not declare one.
pub const DEFAULT_VERSION: &str = "0.1.0";

// ── Tool kinds ──────────────────────────────────────────────────────────────

/// Execution strategy of a skill-declared tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    Shell,
    Http,
    Builtin,
    Script,
    Custom,
}

impl ToolKind {
    pub const ALL: &'static [ToolKind] = &[
        Self::Shell,
        Self::Http,
        Self::Builtin,
        Self::Script,
        Self::Custom,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Shell => "shell",
            Self::Http => "http",
            Self::Builtin => "builtin",
            Self::Script => "script",
            Self::Custom => "custom",
        }
    }

    /// Lenient mapping used for dispatch: anything unrecognized is `Custom`.
    pub fn from_declared(kind: &str) -> Self {
        kind.parse().unwrap_or(Self::Custom)
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strict parse; unknown kinds are an error.
impl FromStr for ToolKind {
    type Err = UnknownToolKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s.trim())
            .ok_or_else(|| UnknownToolKind(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownToolKind(pub String);

impl fmt::Display for UnknownToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unrecognized tool kind '{}'", self.0)
    }
}

impl std::error::Error for UnknownToolKind {}

// ── Tools ───────────────────────────────────────────────────────────────────

/// One default/templated argument declared on a tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolArg {
    pub key: String,
    pub value: String,
}

impl ToolArg {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// One capability a skill exposes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Kind exactly as declared; see [`Tool::tool_kind`].
    #[serde(default)]
    pub kind: String,
    /// Shell command line, HTTP URL, builtin identifier or script path.
    #[serde(default)]
    pub command: String,
    #[serde(default, with = "arg_map")]
    pub args: Vec<ToolArg>,
}

impl Tool {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        kind: impl Into<String>,
        command: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            kind: kind.into(),
            command: command.into(),
            args: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.args.push(ToolArg::new(key, value));
        self
    }

    pub fn tool_kind(&self) -> ToolKind {
        ToolKind::from_declared(&self.kind)
    }

    pub fn arg(&self, key: &str) -> Option<&str> {
        self.args
            .iter()
            .find(|a| a.key == key)
            .map(|a| a.value.as_str())
    }
}

/// Tool args are an ordered `key = value` table on disk and in JSON.
mod arg_map {
    use std::fmt;

    use serde::{
        Deserializer, Serializer,
        de::{MapAccess, Visitor},
        ser::SerializeMap,
    };

    use serde_json::Value;

    use super::ToolArg;

    pub fn serialize<S: Serializer>(args: &[ToolArg], serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(args.len()))?;
        for arg in args {
            map.serialize_entry(&arg.key, &arg.value)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<ToolArg>, D::Error> {
        struct ArgsVisitor;

        impl<'de> Visitor<'de> for ArgsVisitor {
            type Value = Vec<ToolArg>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a table of arguments")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut args = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((key, value)) = access.next_entry::<String, Value>()? {
                    let value = match value {
                        Value::String(s) => s,
                        other => other.to_string(),
                    };
                    args.push(ToolArg { key, value });
                }
                Ok(args)
            }
        }

        deserializer.deserialize_map(ArgsVisitor)
    }
}

// ── Manifest ────────────────────────────────────────────────────────────────

/// Declarative description of a skill.
///
/// The serde shape doubles as the JSON rendering and the `.json` manifest
/// format.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub tools: Vec<Tool>,
    #[serde(default)]
    pub prompts: Vec<String>,
    /// Where the manifest was loaded from. Required for reload.
    #[serde(default)]
    pub location: Option<PathBuf>,
}

pub(crate) fn default_version() -> String {
    DEFAULT_VERSION.to_string()
}

impl Manifest {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            version: default_version(),
            ..Self::default()
        }
    }

    /// First tool with exactly this name.
    pub fn find_tool(&self, name: &str) -> Option<&Tool> {
        self.tools.iter().find(|t| t.name == name)
    }

    pub fn tool_names(&self) -> impl Iterator<Item = &str> {
        self.tools.iter().map(|t| t.name.as_str())
    }

    /// Pretty JSON projection of every field.
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
