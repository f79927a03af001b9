//! Manifest parsing for the three on-disk skill formats.
//!
//! Parsers return a best-effort [`Manifest`]; required-field checks live in
//! [`crate::skill::validate`].

use std::path::Path;

use serde::Deserialize;

use crate::{
    error::{Error, Result},
    types::{Manifest, Tool, ToolArg, default_version},
};

/// Text whose presence marks a document as a structured manifest.
pub const SKILL_SECTION_MARKER: &str = "[skill]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestFormat {
    /// TOML with a `[skill]` table.
    Structured,
    /// Markdown, optionally with YAML frontmatter.
    Narrative,
    Json,
}

impl ManifestFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Structured => "toml",
            Self::Narrative => "markdown",
            Self::Json => "json",
        }
    }
}

/// Pick a format from the source suffix, falling back to content sniffing.
pub fn detect_format(source: &Path, content: &str) -> ManifestFormat {
    match source.extension().and_then(|e| e.to_str()) {
        Some("json") => ManifestFormat::Json,
        Some("toml") => ManifestFormat::Structured,
        _ if content.contains(SKILL_SECTION_MARKER) => ManifestFormat::Structured,
        _ => ManifestFormat::Narrative,
    }
}

/// Parse `content` read from `source`. Narrative documents take their name
/// from the source file stem.
pub fn parse_manifest(content: &str, source: &Path) -> Result<Manifest> {
    match detect_format(source, content) {
        ManifestFormat::Structured => parse_structured(content),
        ManifestFormat::Json => parse_json(content),
        ManifestFormat::Narrative => {
            let name = source
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default();
            parse_narrative(content, name)
        },
    }
}

// ── Structured (TOML) ───────────────────────────────────────────────────────

#[derive(Deserialize)]
struct StructuredDocument {
    skill: Option<RawSkill>,
    #[serde(default)]
    tools: Vec<RawTool>,
    #[serde(default)]
    prompts: Vec<String>,
}

#[derive(Deserialize)]
struct RawSkill {
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
    version: Option<String>,
    author: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    tools: Vec<RawTool>,
    #[serde(default)]
    prompts: Vec<String>,
}

#[derive(Deserialize)]
struct RawTool {
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default, alias = "type")]
    kind: String,
    #[serde(default)]
    command: String,
    #[serde(default)]
    args: toml::Table,
}

impl From<RawTool> for Tool {
    fn from(raw: RawTool) -> Self {
        let args = raw
            .args
            .into_iter()
            .map(|(key, value)| {
                let value = match value {
                    toml::Value::String(s) => s,
                    other => other.to_string(),
                };
                ToolArg { key, value }
            })
            .collect();
        Self {
            name: raw.name,
            description: raw.description,
            kind: raw.kind,
            command: raw.command,
            args,
        }
    }
}

/// Parse a TOML manifest. The `[skill]` table is required; `tools` and
/// `prompts` may sit under it or at the top level (top level first).
pub fn parse_structured(content: &str) -> Result<Manifest> {
    let doc: StructuredDocument = toml::from_str(content).map_err(|e| Error::Parse {
        format: ManifestFormat::Structured.as_str(),
        message: e.message().to_string(),
    })?;
    let skill = doc.skill.ok_or_else(|| Error::Parse {
        format: ManifestFormat::Structured.as_str(),
        message: format!("missing {SKILL_SECTION_MARKER} table"),
    })?;

    let tools = doc
        .tools
        .into_iter()
        .chain(skill.tools)
        .map(Tool::from)
        .collect();
    let mut prompts = doc.prompts;
    prompts.extend(skill.prompts);

    Ok(Manifest {
        name: skill.name,
        description: skill.description,
        version: skill.version.unwrap_or_else(default_version),
        author: skill.author.filter(|a| !a.is_empty()),
        tags: skill.tags,
        tools,
        prompts,
        location: None,
    })
}

// ── Narrative (Markdown) ────────────────────────────────────────────────────

#[derive(Default, Deserialize)]
struct Frontmatter {
    description: Option<String>,
    version: Option<String>,
    author: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
}

/// Parse a Markdown skill. `name` is supplied by the caller.
pub fn parse_narrative(content: &str, name: &str) -> Result<Manifest> {
    let (front, body) = match split_frontmatter(content)? {
        Some((yaml, body)) => {
            let front: Frontmatter = if yaml.trim().is_empty() {
                Frontmatter::default()
            } else {
                serde_yaml::from_str(yaml).map_err(|e| Error::Parse {
                    format: ManifestFormat::Narrative.as_str(),
                    message: format!("invalid frontmatter: {e}"),
                })?
            };
            (front, body)
        },
        None => (Frontmatter::default(), content),
    };

    let description = front
        .description
        .filter(|d| !d.trim().is_empty())
        .or_else(|| first_body_line(body).map(str::to_string))
        .unwrap_or_default();

    Ok(Manifest {
        name: name.to_string(),
        description,
        version: front.version.unwrap_or_else(default_version),
        author: front.author.filter(|a| !a.is_empty()),
        tags: front.tags,
        ..Manifest::default()
    })
}

/// First non-empty line that is not a heading.
fn first_body_line(body: &str) -> Option<&str> {
    body.lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with('#'))
}

/// Split `---` delimited frontmatter off the top of a document.
///
/// Returns `None` when the document has no frontmatter.
fn split_frontmatter(content: &str) -> Result<Option<(&str, &str)>> {
    let trimmed = content.trim_start();
    let Some(after_open) = trimmed.strip_prefix("---") else {
        return Ok(None);
    };
    // A horizontal rule like `----` is not a frontmatter fence.
    if !after_open.starts_with(['\n', '\r']) {
        return Ok(None);
    }
    let close = after_open.find("\n---").ok_or_else(|| Error::Parse {
        format: ManifestFormat::Narrative.as_str(),
        message: "missing closing --- for frontmatter".into(),
    })?;
    let yaml = &after_open[..close];
    let body = &after_open[close + 4..];
    Ok(Some((yaml, body)))
}

// ── JSON ────────────────────────────────────────────────────────────────────

/// Parse a JSON manifest using the same shape as [`Manifest::to_json`].
pub fn parse_json(content: &str) -> Result<Manifest> {
    serde_json::from_str(content).map_err(|e| Error::Parse {
        format: ManifestFormat::Json.as_str(),
        message: e.to_string(),
    })
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    #[rstest]
    #[case("weather.toml", "", ManifestFormat::Structured)]
    #[case("weather.json", "[skill]", ManifestFormat::Json)]
    #[case("weather.md", "# Weather\n", ManifestFormat::Narrative)]
    #[case("weather.md", "[skill]\nname = \"w\"\n", ManifestFormat::Structured)]
    #[case("README", "see [skill] docs", ManifestFormat::Structured)]
    #[case("b.md", "[skill] # main table\nname = \"b\"\n", ManifestFormat::Structured)]
    #[case("README", "# Weather\nNo tables here.\n", ManifestFormat::Narrative)]
    fn detects_format(
        #[case] source: &str,
        #[case] content: &str,
        #[case] expected: ManifestFormat,
    ) {
        assert_eq!(detect_format(Path::new(source), content), expected);
    }

    #[test]
    fn parses_structured_manifest() {
        let content = r#"
prompts = ["Answer with the forecast only."]

[skill]
name = "weather"
description = "Weather lookups"
version = "1.2.0"
author = "ops"
tags = ["net", "weather"]

[[tools]]
name = "forecast"
description = "Fetch a forecast"
kind = "shell"
command = "curl -s wttr.in"

[tools.args]
format = "3"
days = 2
metric = true

[[tools]]
name = "hello"
description = "Say hello"
type = "builtin"
command = "echo"
"#;
        let manifest = parse_structured(content).unwrap();
        assert_eq!(manifest.name, "weather");
        assert_eq!(manifest.version, "1.2.0");
        assert_eq!(manifest.author.as_deref(), Some("ops"));
        assert_eq!(manifest.tags, vec!["net", "weather"]);
        assert_eq!(manifest.tools.len(), 2);

        let forecast = &manifest.tools[0];
        assert_eq!(forecast.kind, "shell");
        let args: Vec<(&str, &str)> = forecast
            .args
            .iter()
            .map(|a| (a.key.as_str(), a.value.as_str()))
            .collect();
        assert_eq!(args, vec![("format", "3"), ("days", "2"), ("metric", "true")]);

        assert_eq!(manifest.tools[1].kind, "builtin");
        assert_eq!(manifest.prompts, vec!["Answer with the forecast only."]);
    }

    #[test]
    fn structured_tools_and_prompts_may_nest_under_skill() {
        let content = r#"
[skill]
name = "nested"
description = "Nested layout"
prompts = ["one", "two"]

[[skill.tools]]
name = "ls"
description = "List"
kind = "shell"
command = "ls"
"#;
        let manifest = parse_structured(content).unwrap();
        assert_eq!(manifest.version, "0.1.0");
        assert_eq!(manifest.tool_names().collect::<Vec<_>>(), vec!["ls"]);
        assert_eq!(manifest.prompts, vec!["one", "two"]);
    }

    #[test]
    fn structured_requires_skill_table() {
        let err = parse_structured("name = \"x\"\n").unwrap_err();
        assert!(matches!(err, Error::Parse { format: "toml", .. }));
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        let err = parse_structured("[skill\nname = ").unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }

    #[test]
    fn structured_keeps_empty_fields_for_validation() {
        let manifest = parse_structured("[skill]\n").unwrap();
        assert!(manifest.name.is_empty());
        assert!(manifest.description.is_empty());
    }

    #[test]
    fn narrative_uses_first_body_line() {
        let content = "# Git Helper\n\n## Usage\n\nHelps with commits.\nMore text.\n";
        let manifest = parse_narrative(content, "git-helper").unwrap();
        assert_eq!(manifest.name, "git-helper");
        assert_eq!(manifest.description, "Helps with commits.");
        assert_eq!(manifest.version, "0.1.0");
        assert!(manifest.tools.is_empty());
        assert!(manifest.prompts.is_empty());
    }

    #[test]
    fn narrative_reads_frontmatter() {
        let content = "---\ndescription: Create git commits\nversion: 2.0.0\nauthor: dev\ntags: [git]\n---\n\n# Commit\n\nBody line.\n";
        let manifest = parse_narrative(content, "commit").unwrap();
        assert_eq!(manifest.description, "Create git commits");
        assert_eq!(manifest.version, "2.0.0");
        assert_eq!(manifest.author.as_deref(), Some("dev"));
        assert_eq!(manifest.tags, vec!["git"]);
    }

    #[test]
    fn narrative_frontmatter_without_description_falls_back_to_body() {
        let content = "---\nversion: 1.0.0\n---\n# Title\nFirst paragraph.\n";
        let manifest = parse_narrative(content, "x").unwrap();
        assert_eq!(manifest.description, "First paragraph.");
    }

    #[test]
    fn narrative_unclosed_frontmatter_is_parse_error() {
        let err = parse_narrative("---\ndescription: x\n", "x").unwrap_err();
        assert!(matches!(err, Error::Parse { format: "markdown", .. }));
    }

    #[test]
    fn narrative_without_body_text_has_empty_description() {
        let manifest = parse_narrative("# Only a heading\n", "h").unwrap();
        assert!(manifest.description.is_empty());
    }

    #[test]
    fn parse_manifest_names_narrative_from_stem() {
        let manifest =
            parse_manifest("Summarises documents.\n", Path::new("/skills/summarize.md")).unwrap();
        assert_eq!(manifest.name, "summarize");
        assert_eq!(manifest.description, "Summarises documents.");
    }

    #[test]
    fn parses_json_manifest() {
        let content = r#"{
            "name": "jq",
            "description": "JSON helpers",
            "tools": [{"name": "pretty", "description": "Pretty print", "kind": "shell", "command": "jq .", "args": {"raw": "-r"}}]
        }"#;
        let manifest = parse_json(content).unwrap();
        assert_eq!(manifest.name, "jq");
        assert_eq!(manifest.version, "0.1.0");
        assert_eq!(manifest.tools[0].arg("raw"), Some("-r"));
    }

    #[test]
    fn json_scalar_args_render_like_toml() {
        let content = r#"{
            "name": "count",
            "description": "Counting",
            "tools": [{"name": "n", "description": "d", "kind": "shell", "command": "seq", "args": {"n": 3, "wide": true}}]
        }"#;
        let tool = &parse_json(content).unwrap().tools[0];
        assert_eq!(tool.arg("n"), Some("3"));
        assert_eq!(tool.arg("wide"), Some("true"));

        let toml_tool = &parse_structured(
            "[skill]\nname = \"count\"\ndescription = \"Counting\"\n\n[[tools]]\nname = \"n\"\ndescription = \"d\"\nkind = \"shell\"\ncommand = \"seq\"\n\n[tools.args]\nn = 3\nwide = true\n",
        )
        .unwrap()
        .tools[0];
        assert_eq!(toml_tool.args, tool.args);
    }

    #[test]
    fn commented_skill_header_in_markdown_file_is_structured() {
        let manifest = parse_manifest(
            "[skill] # main table\nname = \"beta\"\ndescription = \"Second\"\n",
            Path::new("/x/b.md"),
        )
        .unwrap();
        assert_eq!(manifest.name, "beta");
        assert_eq!(manifest.description, "Second");
    }

    #[test]
    fn malformed_json_is_parse_error() {
        assert!(matches!(
            parse_json("{").unwrap_err(),
            Error::Parse { format: "json", .. }
        ));
    }
}
