//! Configuration loading and directory resolution for skillhost.
//!
//! Config files: `skillhost.toml`, `skillhost.yaml`, or `skillhost.json`
//! Searched in `./` then `~/.config/skillhost/`.
//!
//! Supports `${ENV_VAR}` and `${ENV_VAR:-fallback}` substitution in all
//! string values.

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;

pub use {
    error::{Error, Result},
    loader::{
        OPEN_SKILLS_DIR_ENV, clear_config_dir, clear_data_dir, config_dir, data_dir,
        discover_and_load, load_config, open_skills_dir, set_config_dir, set_data_dir,
    },
    schema::{CatalogConfig, ExecConfig, FetcherKind, SkillhostConfig, SkillsConfig},
};
