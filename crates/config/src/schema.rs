/// Config schema types (skills, catalog mirror, tool execution).
use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillhostConfig {
    pub skills: SkillsConfig,
    pub catalog: CatalogConfig,
    pub exec: ExecConfig,
}

/// Local skill discovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillsConfig {
    /// Whether the skills system is enabled.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Extra directories to scan after the conventional ones.
    #[serde(default)]
    pub search_paths: Vec<String>,
    /// Workspace directory, relative to the working directory. Its `skills/`
    /// subdirectory is scanned.
    #[serde(default = "default_workspace_dir")]
    pub workspace_dir: String,
}

impl Default for SkillsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            search_paths: Vec::new(),
            workspace_dir: default_workspace_dir(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_workspace_dir() -> String {
    "workspace".into()
}

/// How the remote catalog is mirrored locally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetcherKind {
    /// `git clone` / `git pull`.
    #[default]
    Git,
    /// GitHub tarball download, re-extracted on every pull.
    Tarball,
}

/// Remote community catalog settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Sync and load catalog skills. Off unless opted in.
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_repo_url")]
    pub repo_url: String,
    /// Mirror directory override. The `SKILLHOST_OPEN_SKILLS_DIR` env var
    /// still wins over this.
    #[serde(default)]
    pub dir: Option<String>,
    #[serde(default)]
    pub fetcher: FetcherKind,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            repo_url: default_repo_url(),
            dir: None,
            fetcher: FetcherKind::default(),
        }
    }
}

fn default_repo_url() -> String {
    "https://github.com/besoeasy/open-skills".into()
}

/// Shell tool execution limits applied by the host around the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecConfig {
    /// Kill shell tools running longer than this. No limit when unset.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,
    #[serde(default)]
    pub working_dir: Option<String>,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            timeout_secs: None,
            max_output_bytes: default_max_output_bytes(),
            working_dir: None,
        }
    }
}

fn default_max_output_bytes() -> usize {
    200 * 1024
}
