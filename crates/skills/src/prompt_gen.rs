use crate::{skill::Skill, types::Manifest};

/// Render one manifest as a Markdown prompt section.
pub fn manifest_to_prompt(manifest: &Manifest) -> String {
    let mut prompt = format!(
        "# Skill: {}\n\n{}\n\n",
        manifest.name, manifest.description
    );

    if !manifest.tools.is_empty() {
        prompt.push_str("## Available Tools\n\n");
        for tool in &manifest.tools {
            prompt.push_str(&format!("### {}\n{}\n\n", tool.name, tool.description));
        }
    }

    if !manifest.prompts.is_empty() {
        prompt.push_str("## Prompt Templates\n\n");
        for (i, template) in manifest.prompts.iter().enumerate() {
            prompt.push_str(&format!("### Prompt {}\n\n{template}\n\n", i + 1));
        }
    }

    prompt
}

/// Concatenate the prompts of every loaded skill, in the given order, under
/// a single `# Available Skills` heading.
pub fn skills_to_system_prompt<'a>(skills: impl IntoIterator<Item = &'a Skill>) -> String {
    let mut prompt = String::from("# Available Skills\n\n");
    for skill in skills.into_iter().filter(|s| s.loaded) {
        prompt.push_str(&manifest_to_prompt(&skill.manifest));
        prompt.push_str("\n---\n\n");
    }
    prompt
}
