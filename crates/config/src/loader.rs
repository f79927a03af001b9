use std::{
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
};

use tracing::{debug, warn};

use crate::{
    env_subst::substitute_env,
    error::{Error, Result},
    schema::SkillhostConfig,
};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "skillhost.toml",
    "skillhost.yaml",
    "skillhost.yml",
    "skillhost.json",
];

/// Environment variable naming the catalog mirror directory.
pub const OPEN_SKILLS_DIR_ENV: &str = "SKILLHOST_OPEN_SKILLS_DIR";

static CONFIG_DIR_OVERRIDE: Mutex<Option<PathBuf>> = Mutex::new(None);
static DATA_DIR_OVERRIDE: Mutex<Option<PathBuf>> = Mutex::new(None);

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> Result<SkillhostConfig> {
    let raw = std::fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./skillhost.{toml,yaml,yml,json}` (project-local)
/// 2. `<config_dir>/skillhost.{toml,yaml,yml,json}` (user-global)
///
/// Returns `SkillhostConfig::default()` if no config file is found or the
/// file fails to parse.
pub fn discover_and_load() -> SkillhostConfig {
    if let Some(path) = find_config_file() {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(cfg) => return cfg,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            },
        }
    } else {
        debug!("no config file found, using defaults");
    }
    SkillhostConfig::default()
}

fn find_config_file() -> Option<PathBuf> {
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    let dir = config_dir()?;
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.exists())
}

/// Override the user-global config directory for this process.
pub fn set_config_dir(dir: PathBuf) {
    *CONFIG_DIR_OVERRIDE
        .lock()
        .unwrap_or_else(PoisonError::into_inner) = Some(dir);
}

pub fn clear_config_dir() {
    *CONFIG_DIR_OVERRIDE
        .lock()
        .unwrap_or_else(PoisonError::into_inner) = None;
}

/// Override the data directory for this process.
pub fn set_data_dir(dir: PathBuf) {
    *DATA_DIR_OVERRIDE
        .lock()
        .unwrap_or_else(PoisonError::into_inner) = Some(dir);
}

pub fn clear_data_dir() {
    *DATA_DIR_OVERRIDE
        .lock()
        .unwrap_or_else(PoisonError::into_inner) = None;
}

/// User-global config directory (`~/.config/skillhost/` on Linux).
pub fn config_dir() -> Option<PathBuf> {
    if let Some(dir) = CONFIG_DIR_OVERRIDE
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
    {
        return Some(dir);
    }
    directories::ProjectDirs::from("", "", "skillhost").map(|d| d.config_dir().to_path_buf())
}

/// Data directory holding personal skills and the catalog mirror.
///
/// Falls back to `./.skillhost` when no home directory can be determined.
pub fn data_dir() -> PathBuf {
    if let Some(dir) = DATA_DIR_OVERRIDE
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
    {
        return dir;
    }
    directories::ProjectDirs::from("", "", "skillhost")
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".skillhost"))
}

/// Resolve the catalog mirror directory.
///
/// Order: `SKILLHOST_OPEN_SKILLS_DIR`, then `[catalog].dir`, then
/// `<data_dir>/open-skills`.
pub fn open_skills_dir(config: &SkillhostConfig) -> PathBuf {
    resolve_open_skills_dir(
        std::env::var_os(OPEN_SKILLS_DIR_ENV).map(PathBuf::from),
        config,
    )
}

fn resolve_open_skills_dir(env_dir: Option<PathBuf>, config: &SkillhostConfig) -> PathBuf {
    if let Some(dir) = env_dir.filter(|d| !d.as_os_str().is_empty()) {
        return dir;
    }
    if let Some(dir) = config.catalog.dir.as_deref().filter(|d| !d.is_empty()) {
        return PathBuf::from(dir);
    }
    data_dir().join("open-skills")
}

fn parse_config(raw: &str, path: &Path) -> Result<SkillhostConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => Err(Error::UnsupportedFormat(ext.to_string())),
    }
}
