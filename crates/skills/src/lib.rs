//! Skills system: manifest parsing, lifecycle, registry, tool dispatch,
//! prompt synthesis and catalog sync.
//!
//! A skill is a TOML manifest (`*.toml` or a directory holding `SKILL.toml`),
//! a Markdown document, or a JSON manifest. Loaded skills live in a
//! [`SkillRegistry`]; their tools can be handed to a host through
//! [`ExtensionApi`] or executed directly with [`execute_tool`].

pub mod catalog;
pub mod discover;
pub mod error;
pub mod exec;
pub mod info;
pub mod parse;
pub mod prompt_gen;
pub mod registry;
pub mod skill;
pub mod tools;
pub mod types;
#[cfg(feature = "file-watcher")]
pub mod watcher;

pub use {
    catalog::{OpenSkillsCatalog, SyncOutcome},
    discover::{DirectoryScan, SkillSource, load_all, load_from_directory},
    error::{Error, Result},
    exec::{ShellExecutor, SystemShell, ToolArgs, ToolResult, execute_tool},
    info::{RegistryInfo, SkillInfo},
    prompt_gen::{manifest_to_prompt, skills_to_system_prompt},
    registry::SkillRegistry,
    skill::{Skill, validate},
    tools::{ExtensionApi, ExtensionToolDefinition, ToolCatalog, register_tools, to_extension},
    types::{Manifest, Tool, ToolArg, ToolKind},
};
