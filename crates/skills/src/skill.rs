use std::{
    any::{Any, TypeId},
    collections::{HashMap, HashSet},
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

use chrono::{DateTime, Utc};

use crate::{
    error::{Error, Result},
    parse::parse_manifest,
    types::{Manifest, ToolKind},
};

/// Fixed manifest file name that makes a directory a skill bundle.
pub const SKILL_MANIFEST_FILE: &str = "SKILL.toml";

/// Extension-owned data attached to a skill, keyed by type.
#[derive(Clone, Default)]
pub struct Extensions {
    map: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl Extensions {
    /// Attach `value`, returning whether a value of the same type was replaced.
    pub fn insert<T: Any + Send + Sync>(&mut self, value: T) -> bool {
        self.map
            .insert(TypeId::of::<T>(), Arc::new(value))
            .is_some()
    }

    pub fn get<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.map
            .get(&TypeId::of::<T>())
            .and_then(|v| v.downcast_ref::<T>())
    }

    pub fn remove<T: Any + Send + Sync>(&mut self) -> bool {
        self.map.remove(&TypeId::of::<T>()).is_some()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl fmt::Debug for Extensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extensions")
            .field("len", &self.map.len())
            .finish()
    }
}

/// A loaded, addressable instance of a [`Manifest`].
#[derive(Debug, Clone)]
pub struct Skill {
    pub manifest: Manifest,
    pub loaded: bool,
    /// Time of the most recent successful load.
    pub load_time: Option<DateTime<Utc>>,
    pub extensions: Extensions,
}

impl Skill {
    /// Wrap an in-memory manifest as a freshly loaded skill.
    pub fn from_manifest(manifest: Manifest) -> Self {
        Self {
            manifest,
            loaded: true,
            load_time: Some(Utc::now()),
            extensions: Extensions::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.manifest.name
    }

    /// Load a skill from a manifest file or a skill bundle directory.
    pub fn load(path: &Path) -> Result<Self> {
        let path = resolve_manifest_path(path)?;
        let content = std::fs::read_to_string(&path).map_err(|source| Error::ReadFailed {
            path: path.clone(),
            source,
        })?;
        let mut manifest = parse_manifest(&content, &path)?;
        manifest.location = Some(path.clone());

        tracing::debug!(name = %manifest.name, path = %path.display(), "loaded skill");
        Ok(Self::from_manifest(manifest))
    }

    /// Drop the manifest contents and mark the skill unloaded.
    pub fn unload(&mut self) {
        self.manifest = Manifest::default();
        self.loaded = false;
        self.load_time = None;
    }

    /// Unload and load again from the recorded location.
    ///
    /// A failed re-load leaves the skill unloaded.
    pub fn reload(&mut self) -> Result<()> {
        if !self.loaded {
            return Err(Error::InvalidArgument(format!(
                "skill '{}' is not loaded",
                self.name()
            )));
        }
        let Some(location) = self.manifest.location.clone() else {
            return Err(Error::InvalidArgument(format!(
                "skill '{}' has no location to reload from",
                self.name()
            )));
        };

        self.unload();
        let fresh = Self::load(&location)?;
        self.manifest = fresh.manifest;
        self.loaded = true;
        self.load_time = fresh.load_time;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        validate(&self.manifest)
    }
}

/// Resolve a skill path to the manifest file that should be read.
pub fn resolve_manifest_path(path: &Path) -> Result<PathBuf> {
    if !path.exists() {
        return Err(Error::FileNotFound(path.to_path_buf()));
    }
    if path.is_dir() {
        let manifest = path.join(SKILL_MANIFEST_FILE);
        if !manifest.is_file() {
            return Err(Error::FileNotFound(manifest));
        }
        return Ok(manifest);
    }
    Ok(path.to_path_buf())
}

/// Check required fields and per-kind tool requirements. Read-only.
pub fn validate(manifest: &Manifest) -> Result<()> {
    if manifest.name.trim().is_empty() {
        return Err(Error::validation("skill name is empty"));
    }
    if manifest.description.trim().is_empty() {
        return Err(Error::validation(format!(
            "skill '{}' has an empty description",
            manifest.name
        )));
    }

    let mut seen = HashSet::with_capacity(manifest.tools.len());
    for (index, tool) in manifest.tools.iter().enumerate() {
        if tool.name.trim().is_empty() {
            return Err(Error::validation(format!(
                "skill '{}': tool #{} has an empty name",
                manifest.name,
                index + 1
            )));
        }
        if !seen.insert(tool.name.as_str()) {
            return Err(Error::validation(format!(
                "skill '{}': duplicate tool '{}'",
                manifest.name, tool.name
            )));
        }
        if tool.description.trim().is_empty() {
            return Err(Error::validation(format!(
                "tool '{}' has an empty description",
                tool.name
            )));
        }
        if tool.kind.trim().is_empty() {
            return Err(Error::validation(format!(
                "tool '{}' has an empty kind",
                tool.name
            )));
        }
        let kind: ToolKind = tool
            .kind
            .parse()
            .map_err(|e| Error::validation(format!("tool '{}': {e}", tool.name)))?;
        if kind == ToolKind::Shell && tool.command.trim().is_empty() {
            return Err(Error::validation(format!(
                "shell tool '{}' has an empty command",
                tool.name
            )));
        }
    }
    Ok(())
}
