use std::path::{Path, PathBuf};

use skillhost_config::SkillsConfig;

use crate::{
    error::{Error, Result},
    registry::SkillRegistry,
    skill::{SKILL_MANIFEST_FILE, Skill},
};

/// File suffixes recognized as standalone skill files.
pub const SKILL_FILE_EXTENSIONS: &[&str] = &["toml", "md", "json"];

/// Where a search path comes from, in scan order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkillSource {
    /// `<cwd>/.skillhost/skills`
    Project,
    /// `<cwd>/<workspace_dir>/skills`
    Workspace,
    /// `<data_dir>/skills`
    Personal,
    /// `[skills].search_paths`
    Configured,
    /// Mirror of the remote catalog.
    Catalog,
}

/// Result of scanning one or more directories.
#[derive(Debug, Default)]
pub struct DirectoryScan {
    /// Skills that were loaded and registered, in scan order.
    pub skills: Vec<Skill>,
    /// Entries that were skipped and why.
    pub failures: Vec<(PathBuf, Error)>,
}

impl DirectoryScan {
    fn merge(&mut self, other: DirectoryScan) {
        self.skills.extend(other.skills);
        self.failures.extend(other.failures);
    }
}

/// Conventional skill directories, in priority order.
pub fn default_search_paths(
    cwd: &Path,
    data_dir: &Path,
    workspace_dir: &str,
) -> Vec<(PathBuf, SkillSource)> {
    vec![
        (cwd.join(".skillhost/skills"), SkillSource::Project),
        (
            cwd.join(workspace_dir).join("skills"),
            SkillSource::Workspace,
        ),
        (data_dir.join("skills"), SkillSource::Personal),
    ]
}

/// Conventional paths followed by the configured extras.
pub fn search_paths(config: &SkillsConfig, cwd: &Path) -> Vec<(PathBuf, SkillSource)> {
    let mut paths = default_search_paths(cwd, &skillhost_config::data_dir(), &config.workspace_dir);
    paths.extend(
        config
            .search_paths
            .iter()
            .map(|p| (PathBuf::from(p), SkillSource::Configured)),
    );
    paths
}

/// Resolve a directory entry to something [`Skill::load`] accepts.
fn skill_entry(path: &Path) -> Option<PathBuf> {
    if path.is_dir() {
        return path
            .join(SKILL_MANIFEST_FILE)
            .is_file()
            .then(|| path.to_path_buf());
    }
    let ext = path.extension().and_then(|e| e.to_str())?;
    (path.is_file() && SKILL_FILE_EXTENSIONS.contains(&ext)).then(|| path.to_path_buf())
}

/// Load every skill file or bundle directly inside `dir` and register it.
///
/// Entries are visited in file-name order. A bad entry never aborts the scan;
/// it is recorded in [`DirectoryScan::failures`]. Only allocation failure and
/// an unusable registry are fatal.
pub fn load_from_directory(registry: &SkillRegistry, dir: &Path) -> Result<DirectoryScan> {
    if !dir.is_dir() {
        return Err(Error::FileNotFound(dir.to_path_buf()));
    }
    let entries = std::fs::read_dir(dir).map_err(|source| Error::ReadFailed {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut paths: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter_map(|path| skill_entry(&path))
        .collect();
    paths.sort();

    let mut scan = DirectoryScan::default();
    let mut loaded = Vec::with_capacity(paths.len());
    for path in paths {
        match Skill::load(&path) {
            Ok(skill) => loaded.push(skill),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping skill");
                scan.failures.push((path, e));
            },
        }
    }

    let outcome = registry.register_batch(loaded)?;
    for (skill, e) in outcome.rejected {
        let path = skill
            .manifest
            .location
            .clone()
            .unwrap_or_else(|| dir.to_path_buf());
        tracing::warn!(path = %path.display(), error = %e, "skipping skill");
        scan.failures.push((path, e));
    }
    scan.skills = outcome.registered;

    tracing::debug!(
        dir = %dir.display(),
        loaded = scan.skills.len(),
        skipped = scan.failures.len(),
        "scanned skill directory"
    );
    Ok(scan)
}

/// Scan every existing directory in `paths`, in order.
///
/// Earlier paths win name collisions; later duplicates land in `failures`.
pub fn load_all(registry: &SkillRegistry, paths: &[(PathBuf, SkillSource)]) -> Result<DirectoryScan> {
    let mut scan = DirectoryScan::default();
    for (dir, source) in paths {
        if !dir.is_dir() {
            continue;
        }
        tracing::debug!(dir = %dir.display(), ?source, "scanning skills");
        scan.merge(load_from_directory(registry, dir)?);
    }
    Ok(scan)
}
