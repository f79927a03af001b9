//! Filesystem watcher for skill directories.
//!
//! Debounces create/modify/remove events on skill files and reports the
//! affected paths so the host can reload or rescan.

use std::{path::{Path, PathBuf}, time::Duration};

use {
    notify_debouncer_full::{
        DebounceEventResult, Debouncer, RecommendedCache, new_debouncer,
        notify::{EventKind, RecommendedWatcher, RecursiveMode},
    },
    tokio::sync::mpsc,
    tracing::{debug, info, warn},
};

use crate::{
    discover::SKILL_FILE_EXTENSIONS,
    error::{Context, Result},
};

const DEBOUNCE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkillWatchEvent {
    /// Skill files were created, modified or removed.
    Changed { paths: Vec<PathBuf> },
}

/// Keeps the debouncer alive; events stop when this is dropped.
pub struct SkillWatcher {
    _debouncer: Debouncer<RecommendedWatcher, RecommendedCache>,
}

/// Whether a changed path can affect the set of loaded skills.
fn is_skill_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| SKILL_FILE_EXTENSIONS.contains(&ext))
}

impl SkillWatcher {
    /// Watch every existing directory in `dirs`. Missing ones are skipped.
    pub fn start(dirs: &[PathBuf]) -> Result<(Self, mpsc::UnboundedReceiver<SkillWatchEvent>)> {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut debouncer = new_debouncer(DEBOUNCE, None, move |result: DebounceEventResult| {
            match result {
                Ok(events) => {
                    let mut paths: Vec<PathBuf> = events
                        .iter()
                        .filter(|event| {
                            matches!(
                                event.kind,
                                EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
                            )
                        })
                        .flat_map(|event| event.paths.iter())
                        .filter(|path| is_skill_file(path))
                        .cloned()
                        .collect();
                    paths.sort();
                    paths.dedup();
                    if !paths.is_empty() {
                        debug!(count = paths.len(), "skill files changed");
                        let _ = tx.send(SkillWatchEvent::Changed { paths });
                    }
                },
                Err(errors) => {
                    for e in errors {
                        warn!(error = %e, "skill watcher error");
                    }
                },
            }
        })
        .context("failed to start skill watcher")?;

        for dir in dirs.iter().filter(|d| d.is_dir()) {
            debouncer
                .watch(dir, RecursiveMode::Recursive)
                .with_context(|| format!("failed to watch {}", dir.display()))?;
            info!(dir = %dir.display(), "watching skill directory");
        }

        Ok((
            Self {
                _debouncer: debouncer,
            },
            rx,
        ))
    }
}
