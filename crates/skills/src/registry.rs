use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::{
    error::{Error, Result},
    skill::Skill,
};

/// Smallest capacity the registry grows to on first insertion.
pub const MIN_CAPACITY: usize = 8;

#[derive(Debug, Default)]
struct RegistryState {
    skills: Vec<Skill>,
    initialized: bool,
}

impl RegistryState {
    fn ensure_initialized(&self) -> Result<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(Error::NotInitialized)
        }
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.skills.iter().position(|s| s.manifest.name == name)
    }

    /// Double capacity when full, never below [`MIN_CAPACITY`].
    fn reserve_slot(&mut self) -> Result<()> {
        let len = self.skills.len();
        let capacity = self.skills.capacity();
        if len < capacity {
            return Ok(());
        }
        let target = (capacity * 2).max(MIN_CAPACITY);
        self.skills
            .try_reserve_exact(target - len)
            .map_err(Error::out_of_memory("skill registry"))
    }

    fn insert(&mut self, skill: Skill) -> Result<()> {
        skill.validate()?;
        if self.position(skill.name()).is_some() {
            return Err(Error::skill_exists(skill.manifest.name));
        }
        self.reserve_slot()?;
        self.skills.push(skill);
        Ok(())
    }
}

/// Outcome of [`SkillRegistry::register_batch`].
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Copies of every skill that was inserted, in insertion order.
    pub registered: Vec<Skill>,
    pub rejected: Vec<(Skill, Error)>,
}

/// Owned store of loaded skills keyed by unique name.
///
/// Insertion order is preserved. Readers receive snapshots, never the
/// backing storage.
#[derive(Debug)]
pub struct SkillRegistry {
    state: RwLock<RegistryState>,
}

impl SkillRegistry {
    /// Create an initialized, empty registry.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(RegistryState {
                skills: Vec::new(),
                initialized: true,
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, RegistryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Re-open a registry after [`shutdown`](Self::shutdown). Idempotent.
    pub fn initialize(&self) {
        self.write().initialized = true;
    }

    pub fn is_initialized(&self) -> bool {
        self.read().initialized
    }

    /// Unload and drop every skill, then refuse operations until
    /// [`initialize`](Self::initialize) is called again.
    pub fn shutdown(&self) {
        let mut state = self.write();
        let count = state.skills.len();
        for skill in &mut state.skills {
            skill.unload();
        }
        state.skills = Vec::new();
        state.initialized = false;
        tracing::info!(count, "skill registry shut down");
    }

    /// Validate and append a skill. Duplicate names are rejected.
    pub fn register(&self, skill: Skill) -> Result<()> {
        let mut state = self.write();
        state.ensure_initialized()?;
        let name = skill.manifest.name.clone();
        state.insert(skill)?;
        tracing::info!(%name, "registered skill");
        Ok(())
    }

    /// Register many skills under a single write lock.
    ///
    /// Per-skill failures are collected in [`BatchOutcome::rejected`];
    /// allocation failure aborts the batch.
    pub fn register_batch(&self, skills: impl IntoIterator<Item = Skill>) -> Result<BatchOutcome> {
        let mut state = self.write();
        state.ensure_initialized()?;

        let mut outcome = BatchOutcome::default();
        for skill in skills {
            let copy = skill.clone();
            match state.insert(skill) {
                Ok(()) => {
                    tracing::info!(name = %copy.name(), "registered skill");
                    outcome.registered.push(copy);
                },
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => outcome.rejected.push((copy, e)),
            }
        }
        Ok(outcome)
    }

    /// Remove and drop the named skill, keeping the order of the rest.
    pub fn unregister(&self, name: &str) -> Result<()> {
        let mut state = self.write();
        state.ensure_initialized()?;
        let index = state
            .position(name)
            .ok_or_else(|| Error::skill_not_found(name))?;
        let mut removed = state.skills.remove(index);
        removed.unload();
        tracing::info!(%name, "unregistered skill");
        Ok(())
    }

    /// Exact, case-sensitive lookup returning a snapshot.
    pub fn find(&self, name: &str) -> Result<Skill> {
        let state = self.read();
        state.ensure_initialized()?;
        state
            .skills
            .iter()
            .find(|s| s.manifest.name == name)
            .cloned()
            .ok_or_else(|| Error::skill_not_found(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        let state = self.read();
        state.initialized && state.position(name).is_some()
    }

    /// Snapshot of every registered skill in registration order.
    pub fn list(&self) -> Result<Vec<Skill>> {
        self.with_skills(<[Skill]>::to_vec)
    }

    pub fn names(&self) -> Result<Vec<String>> {
        self.with_skills(|skills| skills.iter().map(|s| s.manifest.name.clone()).collect())
    }

    /// Run `f` against a read-only view of the registered skills.
    pub fn with_skills<R>(&self, f: impl FnOnce(&[Skill]) -> R) -> Result<R> {
        let state = self.read();
        state.ensure_initialized()?;
        Ok(f(&state.skills))
    }

    pub fn len(&self) -> usize {
        self.read().skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().skills.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.read().skills.capacity()
    }

    /// Reload a registered skill from its location, in place.
    ///
    /// If the reload fails, or the reloaded manifest no longer validates or
    /// collides with another entry, the skill is removed from the registry.
    pub fn reload(&self, name: &str) -> Result<()> {
        let mut state = self.write();
        state.ensure_initialized()?;
        let index = state
            .position(name)
            .ok_or_else(|| Error::skill_not_found(name))?;

        let result = state.skills[index].reload().and_then(|()| {
            let reloaded = &state.skills[index];
            reloaded.validate()?;
            let collides = state
                .skills
                .iter()
                .enumerate()
                .any(|(i, s)| i != index && s.manifest.name == reloaded.manifest.name);
            if collides {
                return Err(Error::skill_exists(reloaded.manifest.name.clone()));
            }
            Ok(())
        });

        match result {
            Ok(()) => {
                tracing::info!(%name, "reloaded skill");
                Ok(())
            },
            Err(e) => {
                let mut dropped = state.skills.remove(index);
                dropped.unload();
                tracing::warn!(%name, error = %e, "reload failed, skill removed");
                Err(e)
            },
        }
    }
}

impl Default for SkillRegistry {
    fn default() -> Self {
        Self::new()
    }
}
