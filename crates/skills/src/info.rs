use std::fmt;

use chrono::Local;

use crate::skill::Skill;

fn or<'a>(value: &'a str, placeholder: &'a str) -> &'a str {
    if value.is_empty() { placeholder } else { value }
}

/// Human-readable dump of one skill. Empty fields render as placeholders.
pub struct SkillInfo<'a>(pub &'a Skill);

impl fmt::Display for SkillInfo<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let skill = self.0;
        let m = &skill.manifest;

        writeln!(f, "Skill: {}", or(&m.name, "(unnamed)"))?;
        writeln!(f, "  Description: {}", or(&m.description, "(none)"))?;
        writeln!(f, "  Version: {}", or(&m.version, "(none)"))?;
        if let Some(author) = m.author.as_deref().filter(|a| !a.is_empty()) {
            writeln!(f, "  Author: {author}")?;
        }
        if !m.tags.is_empty() {
            writeln!(f, "  Tags: {}", m.tags.join(", "))?;
        }

        writeln!(f, "  Tools: {}", m.tools.len())?;
        for tool in &m.tools {
            writeln!(
                f,
                "    - {} ({}): {}",
                or(&tool.name, "(unnamed)"),
                or(&tool.kind, "(unknown)"),
                or(&tool.description, "(none)")
            )?;
        }

        writeln!(f, "  Prompts: {}", m.prompts.len())?;
        let location = m
            .location
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(unknown)".into());
        writeln!(f, "  Location: {location}")?;
        writeln!(f, "  Loaded: {}", if skill.loaded { "yes" } else { "no" })?;
        if skill.loaded
            && let Some(at) = skill.load_time
        {
            writeln!(
                f,
                "  Load time: {}",
                at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
            )?;
        }
        Ok(())
    }
}

/// Dump of every skill in a registry snapshot.
pub struct RegistryInfo<'a>(pub &'a [Skill]);

impl fmt::Display for RegistryInfo<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const RULE: &str = "============================";
        writeln!(f, "{RULE}")?;
        writeln!(f, "Registered Skills ({})", self.0.len())?;
        writeln!(f, "{RULE}")?;
        for (i, skill) in self.0.iter().enumerate() {
            write!(f, "[{}] {}", i + 1, SkillInfo(skill))?;
            writeln!(f)?;
        }
        Ok(())
    }
}
