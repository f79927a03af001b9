//! Local mirror of the community open-skills catalog.
//!
//! The mirror is an ordinary skill directory: after a sync it is scanned with
//! [`load_from_directory`] like any other source.

use std::{
    path::{Component, Path, PathBuf},
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use {async_trait::async_trait, tokio::process::Command};

use skillhost_config::{FetcherKind, SkillhostConfig};

use crate::{
    discover::{DirectoryScan, load_from_directory},
    error::{Context, Error, Result},
    registry::SkillRegistry,
};

pub use skillhost_config::OPEN_SKILLS_DIR_ENV;

pub const OPEN_SKILLS_REPO_URL: &str = "https://github.com/besoeasy/open-skills";

/// Watermark file written inside the mirror after each successful sync.
pub const SYNC_MARKER_FILE: &str = ".skillhost-open-skills-sync";

pub const SYNC_INTERVAL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

// ── Sync policy ─────────────────────────────────────────────────────────────

/// True when the watermark is missing or older than [`SYNC_INTERVAL`].
pub fn should_sync(dir: &Path) -> bool {
    should_sync_at(dir, SystemTime::now())
}

fn should_sync_at(dir: &Path, now: SystemTime) -> bool {
    let Ok(modified) = std::fs::metadata(dir.join(SYNC_MARKER_FILE)).and_then(|m| m.modified())
    else {
        return true;
    };
    // A watermark from the future counts as fresh.
    now.duration_since(modified)
        .map(|age| age > SYNC_INTERVAL)
        .unwrap_or(false)
}

/// (Re)write the watermark with the current time.
pub fn mark_synced(dir: &Path) -> Result<()> {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    std::fs::create_dir_all(dir)?;
    std::fs::write(dir.join(SYNC_MARKER_FILE), format!("Last sync: {secs}\n"))?;
    Ok(())
}

/// A mirror counts as populated once it holds anything besides the
/// watermark. Fetchers may demand more, see [`CatalogFetcher::is_checkout`].
pub fn is_checkout(dir: &Path) -> bool {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .flatten()
                .any(|e| e.file_name() != SYNC_MARKER_FILE)
        })
        .unwrap_or(false)
}

// ── Fetchers ────────────────────────────────────────────────────────────────

/// Capability that clones or updates a remote catalog into a directory.
#[async_trait]
pub trait CatalogFetcher: Send + Sync {
    /// Populate `target` from `url`. `target` exists but may already hold
    /// the watermark or files from another fetcher.
    async fn clone_repo(&self, url: &str, target: &Path) -> Result<()>;
    /// Bring an existing checkout up to date.
    async fn pull_repo(&self, url: &str, repo_dir: &Path) -> Result<()>;

    /// Whether `dir` holds a checkout this fetcher can pull into.
    fn is_checkout(&self, dir: &Path) -> bool {
        is_checkout(dir)
    }
}

pub fn fetcher_for(kind: FetcherKind) -> Arc<dyn CatalogFetcher> {
    match kind {
        FetcherKind::Git => Arc::new(GitFetcher),
        FetcherKind::Tarball => Arc::new(TarballFetcher::default()),
    }
}

/// Uses the `git` binary. Both clone and pull shallow-fetch the remote
/// `HEAD` and hard-reset the work tree onto it, so a mirror directory that
/// already holds other files can still be turned into a checkout.
#[derive(Debug, Clone, Copy, Default)]
pub struct GitFetcher;

async fn run_git(args: &[&str], cwd: Option<&Path>) -> Result<()> {
    let mut cmd = Command::new("git");
    cmd.args(args).stdin(std::process::Stdio::null());
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    let output = cmd.output().await.context("failed to run git")?;
    if !output.status.success() {
        return Err(Error::message(format!(
            "git {} failed: {}",
            args.first().copied().unwrap_or_default(),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(())
}

#[async_trait]
impl CatalogFetcher for GitFetcher {
    async fn clone_repo(&self, url: &str, target: &Path) -> Result<()> {
        tokio::fs::create_dir_all(target).await?;
        if !self.is_checkout(target) {
            run_git(&["init", "--quiet"], Some(target)).await?;
        }
        fetch_and_reset(url, target).await
    }

    async fn pull_repo(&self, url: &str, repo_dir: &Path) -> Result<()> {
        fetch_and_reset(url, repo_dir).await
    }

    fn is_checkout(&self, dir: &Path) -> bool {
        dir.join(".git").exists()
    }
}

async fn fetch_and_reset(url: &str, repo_dir: &Path) -> Result<()> {
    run_git(&["fetch", "--quiet", "--depth", "1", url, "HEAD"], Some(repo_dir)).await?;
    run_git(&["reset", "--quiet", "--hard", "FETCH_HEAD"], Some(repo_dir)).await
}

/// Downloads the GitHub tarball and unpacks it over the mirror.
#[derive(Debug, Clone, Default)]
pub struct TarballFetcher {
    client: reqwest::Client,
}

impl TarballFetcher {
    async fn download_and_unpack(&self, url: &str, target: &Path) -> Result<()> {
        let (owner, repo) = parse_github_source(url)?;
        let tarball = format!("https://api.github.com/repos/{owner}/{repo}/tarball");
        let resp = self
            .client
            .get(&tarball)
            .header("User-Agent", "skillhost")
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(Error::message(format!(
                "failed to fetch {owner}/{repo}: HTTP {}",
                resp.status()
            )));
        }
        let bytes = resp.bytes().await?;

        tokio::fs::create_dir_all(target).await?;
        let target = target.to_path_buf();
        tokio::task::spawn_blocking(move || unpack_tarball(&bytes, &target))
            .await
            .context("tarball unpack task failed")??;

        tracing::info!(%owner, %repo, "unpacked catalog tarball");
        Ok(())
    }
}

#[async_trait]
impl CatalogFetcher for TarballFetcher {
    async fn clone_repo(&self, url: &str, target: &Path) -> Result<()> {
        self.download_and_unpack(url, target).await
    }

    async fn pull_repo(&self, url: &str, repo_dir: &Path) -> Result<()> {
        self.download_and_unpack(url, repo_dir).await
    }
}

/// Unpack a gzipped GitHub tarball into `target`, dropping the top-level
/// directory. Links are skipped; escaping paths abort the unpack.
fn unpack_tarball(bytes: &[u8], target: &Path) -> Result<()> {
    let canonical_target = std::fs::canonicalize(target)?;
    let decoder = flate2::read::GzDecoder::new(bytes);
    let mut archive = tar::Archive::new(decoder);
    for entry in archive.entries()? {
        let mut entry = entry?;
        let entry_type = entry.header().entry_type();
        if entry_type.is_symlink() || entry_type.is_hard_link() {
            tracing::warn!("skipping link entry in catalog archive");
            continue;
        }

        let path = entry.path()?.into_owned();
        let Some(stripped) = sanitize_archive_path(&path)? else {
            continue;
        };

        let dest = canonical_target.join(&stripped);
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
            if !std::fs::canonicalize(parent)?.starts_with(&canonical_target) {
                return Err(Error::message("archive entry escaped the catalog directory"));
            }
        }
        if std::fs::symlink_metadata(&dest).is_ok_and(|m| m.file_type().is_symlink()) {
            return Err(Error::message("archive entry resolves to a symlink"));
        }

        if entry_type.is_dir() {
            std::fs::create_dir_all(&dest)?;
        } else {
            entry.unpack(&dest)?;
        }
    }
    Ok(())
}

/// Strip the leading tarball directory and reject unsafe components.
fn sanitize_archive_path(path: &Path) -> Result<Option<PathBuf>> {
    let stripped: PathBuf = path.components().skip(1).collect();
    if stripped.as_os_str().is_empty() {
        return Ok(None);
    }
    for component in stripped.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {},
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(Error::message(format!(
                    "archive contains unsafe path component: {}",
                    path.display()
                )));
            },
        }
    }
    Ok(Some(stripped))
}

/// Parse `owner/repo` from `owner/repo` or a GitHub URL.
fn parse_github_source(source: &str) -> Result<(String, String)> {
    let s = source.trim().trim_end_matches('/').trim_end_matches(".git");
    let s = s
        .strip_prefix("https://github.com/")
        .or_else(|| s.strip_prefix("http://github.com/"))
        .or_else(|| s.strip_prefix("github.com/"))
        .unwrap_or(s);
    match s.split('/').collect::<Vec<_>>().as_slice() {
        [owner, repo] if !owner.is_empty() && !repo.is_empty() => {
            Ok((owner.to_string(), repo.to_string()))
        },
        _ => Err(Error::InvalidArgument(format!(
            "invalid catalog source '{source}': expected 'owner/repo' or a GitHub URL"
        ))),
    }
}

// ── Operations ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Watermark still fresh.
    Skipped,
    Cloned,
    Pulled,
}

/// Clone into `target`. An existing directory is fine; an existing checkout
/// makes this a no-op. Returns whether anything was fetched.
pub async fn clone_catalog(fetcher: &dyn CatalogFetcher, url: &str, target: &Path) -> Result<bool> {
    tokio::fs::create_dir_all(target).await?;
    if fetcher.is_checkout(target) {
        tracing::debug!(dir = %target.display(), "catalog already cloned");
        return Ok(false);
    }
    fetcher.clone_repo(url, target).await?;
    tracing::info!(%url, dir = %target.display(), "cloned skill catalog");
    Ok(true)
}

pub async fn pull_catalog(fetcher: &dyn CatalogFetcher, url: &str, repo_dir: &Path) -> Result<()> {
    if !repo_dir.is_dir() {
        return Err(Error::FileNotFound(repo_dir.to_path_buf()));
    }
    fetcher.pull_repo(url, repo_dir).await?;
    tracing::info!(%url, dir = %repo_dir.display(), "pulled skill catalog");
    Ok(())
}

/// Clone or pull when the watermark is stale (or `force`), then mark synced.
pub async fn sync_catalog(
    fetcher: &dyn CatalogFetcher,
    url: &str,
    dir: &Path,
    force: bool,
) -> Result<SyncOutcome> {
    if !force && !should_sync(dir) {
        tracing::debug!(dir = %dir.display(), "catalog sync not due");
        return Ok(SyncOutcome::Skipped);
    }
    let outcome = if fetcher.is_checkout(dir) {
        pull_catalog(fetcher, url, dir).await?;
        SyncOutcome::Pulled
    } else {
        clone_catalog(fetcher, url, dir).await?;
        SyncOutcome::Cloned
    };
    mark_synced(dir)?;
    Ok(outcome)
}

/// Scan the mirror into `registry`. A missing mirror yields an empty scan.
pub fn load_open_skills(registry: &SkillRegistry, dir: &Path) -> Result<DirectoryScan> {
    if !dir.is_dir() {
        tracing::debug!(dir = %dir.display(), "no catalog mirror to load");
        return Ok(DirectoryScan::default());
    }
    load_from_directory(registry, dir)
}

/// Catalog settings resolved from configuration.
#[derive(Clone)]
pub struct OpenSkillsCatalog {
    pub repo_url: String,
    pub dir: PathBuf,
    fetcher: Arc<dyn CatalogFetcher>,
}

impl OpenSkillsCatalog {
    pub fn new(repo_url: impl Into<String>, dir: PathBuf, fetcher: Arc<dyn CatalogFetcher>) -> Self {
        Self {
            repo_url: repo_url.into(),
            dir,
            fetcher,
        }
    }

    pub fn from_config(config: &SkillhostConfig) -> Self {
        Self::new(
            config.catalog.repo_url.clone(),
            skillhost_config::open_skills_dir(config),
            fetcher_for(config.catalog.fetcher),
        )
    }

    pub fn should_sync(&self) -> bool {
        should_sync(&self.dir)
    }

    pub async fn sync(&self, force: bool) -> Result<SyncOutcome> {
        sync_catalog(self.fetcher.as_ref(), &self.repo_url, &self.dir, force).await
    }

    pub fn load(&self, registry: &SkillRegistry) -> Result<DirectoryScan> {
        load_open_skills(registry, &self.dir)
    }
}

impl std::fmt::Debug for OpenSkillsCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenSkillsCatalog")
            .field("repo_url", &self.repo_url)
            .field("dir", &self.dir)
            .finish_non_exhaustive()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    /// Writes a fixed skill file instead of touching the network.
    #[derive(Default)]
    struct FakeFetcher {
        calls: Mutex<Vec<&'static str>>,
    }

    #[async_trait]
    impl CatalogFetcher for FakeFetcher {
        async fn clone_repo(&self, _url: &str, target: &Path) -> Result<()> {
            self.calls.lock().unwrap().push("clone");
            std::fs::write(target.join("community.md"), "A community skill.\n")?;
            Ok(())
        }

        async fn pull_repo(&self, _url: &str, repo_dir: &Path) -> Result<()> {
            self.calls.lock().unwrap().push("pull");
            std::fs::write(repo_dir.join("fresh.md"), "A fresh skill.\n")?;
            Ok(())
        }
    }

    #[test]
    fn watermark_controls_sync() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(should_sync(tmp.path()));
        mark_synced(tmp.path()).unwrap();
        assert!(!should_sync(tmp.path()));

        let marker = std::fs::read_to_string(tmp.path().join(SYNC_MARKER_FILE)).unwrap();
        assert!(marker.starts_with("Last sync: "));

        let later = SystemTime::now() + SYNC_INTERVAL + Duration::from_secs(60);
        assert!(should_sync_at(tmp.path(), later));
    }

    #[test]
    fn marker_alone_is_not_a_checkout() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(!is_checkout(tmp.path()));
        mark_synced(tmp.path()).unwrap();
        assert!(!is_checkout(tmp.path()));
        std::fs::write(tmp.path().join("x.md"), "x").unwrap();
        assert!(is_checkout(tmp.path()));
        assert!(!is_checkout(&tmp.path().join("missing")));
    }

    #[tokio::test]
    async fn clone_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("open-skills");
        let fetcher = FakeFetcher::default();

        assert!(clone_catalog(&fetcher, OPEN_SKILLS_REPO_URL, &dir).await.unwrap());
        assert!(!clone_catalog(&fetcher, OPEN_SKILLS_REPO_URL, &dir).await.unwrap());
        assert_eq!(*fetcher.calls.lock().unwrap(), vec!["clone"]);
    }

    #[tokio::test]
    async fn pull_requires_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let err = pull_catalog(&FakeFetcher::default(), "u", &tmp.path().join("nope"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn sync_clones_then_skips_then_pulls_when_forced() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("open-skills");
        let fetcher = FakeFetcher::default();

        let first = sync_catalog(&fetcher, "u", &dir, false).await.unwrap();
        assert_eq!(first, SyncOutcome::Cloned);
        assert!(!should_sync(&dir));

        let second = sync_catalog(&fetcher, "u", &dir, false).await.unwrap();
        assert_eq!(second, SyncOutcome::Skipped);

        let third = sync_catalog(&fetcher, "u", &dir, true).await.unwrap();
        assert_eq!(third, SyncOutcome::Pulled);
        assert_eq!(*fetcher.calls.lock().unwrap(), vec!["clone", "pull"]);

        let registry = SkillRegistry::new();
        let scan = load_open_skills(&registry, &dir).unwrap();
        let names: Vec<&str> = scan.skills.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["community", "fresh"]);
    }

    #[tokio::test]
    async fn catalog_handle_uses_its_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let catalog = OpenSkillsCatalog::new(
            OPEN_SKILLS_REPO_URL,
            tmp.path().join("mirror"),
            Arc::new(FakeFetcher::default()),
        );
        assert!(catalog.should_sync());
        assert_eq!(catalog.sync(false).await.unwrap(), SyncOutcome::Cloned);
        assert!(!catalog.should_sync());

        let registry = SkillRegistry::new();
        assert_eq!(catalog.load(&registry).unwrap().skills.len(), 1);
    }

    fn git_available() -> bool {
        std::process::Command::new("git")
            .arg("--version")
            .output()
            .is_ok_and(|o| o.status.success())
    }

    fn git(dir: &Path, args: &[&str]) {
        let status = std::process::Command::new("git")
            .args([
                "-c",
                "user.name=skillhost",
                "-c",
                "user.email=skillhost@example.com",
                "-c",
                "init.defaultBranch=main",
            ])
            .args(args)
            .current_dir(dir)
            .status()
            .unwrap();
        assert!(status.success(), "git {args:?} failed");
    }

    /// A local repository holding `alpha.md`, addressed by `file://` URL.
    fn local_catalog(root: &Path) -> (PathBuf, String) {
        let repo = root.join("upstream");
        std::fs::create_dir_all(&repo).unwrap();
        git(&repo, &["init", "--quiet"]);
        std::fs::write(repo.join("alpha.md"), "Alpha skill.\n").unwrap();
        git(&repo, &["add", "."]);
        git(&repo, &["commit", "--quiet", "-m", "alpha"]);
        let url = format!("file://{}", repo.display());
        (repo, url)
    }

    #[tokio::test]
    async fn git_sync_recovers_mirror_holding_only_watermark() {
        if !git_available() {
            return;
        }
        let tmp = tempfile::tempdir().unwrap();
        let (repo, url) = local_catalog(tmp.path());
        let mirror = tmp.path().join("mirror");
        mark_synced(&mirror).unwrap();
        assert!(!GitFetcher.is_checkout(&mirror));

        let first = sync_catalog(&GitFetcher, &url, &mirror, true).await.unwrap();
        assert_eq!(first, SyncOutcome::Cloned);
        assert!(mirror.join("alpha.md").is_file());
        assert!(GitFetcher.is_checkout(&mirror));

        std::fs::write(repo.join("beta.md"), "Beta skill.\n").unwrap();
        git(&repo, &["add", "."]);
        git(&repo, &["commit", "--quiet", "-m", "beta"]);

        let second = sync_catalog(&GitFetcher, &url, &mirror, true).await.unwrap();
        assert_eq!(second, SyncOutcome::Pulled);

        let registry = SkillRegistry::new();
        let scan = load_open_skills(&registry, &mirror).unwrap();
        let names: Vec<&str> = scan.skills.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["alpha", "beta"]);
    }

    #[tokio::test]
    async fn git_fetcher_takes_over_tarball_mirror() {
        if !git_available() {
            return;
        }
        let tmp = tempfile::tempdir().unwrap();
        let (_repo, url) = local_catalog(tmp.path());
        let mirror = tmp.path().join("mirror");
        std::fs::create_dir_all(&mirror).unwrap();
        std::fs::write(mirror.join("community.md"), "From a tarball.\n").unwrap();
        mark_synced(&mirror).unwrap();

        assert!(is_checkout(&mirror));
        assert!(!GitFetcher.is_checkout(&mirror));

        let outcome = sync_catalog(&GitFetcher, &url, &mirror, true).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Cloned);
        assert!(mirror.join("alpha.md").is_file());
        assert!(GitFetcher.is_checkout(&mirror));
    }

    #[test]
    fn missing_mirror_loads_nothing() {
        let registry = SkillRegistry::new();
        let scan = load_open_skills(&registry, Path::new("/nonexistent/open-skills")).unwrap();
        assert!(scan.skills.is_empty());
    }

    #[test]
    fn sanitize_rejects_parent_dir() {
        assert!(sanitize_archive_path(Path::new("root/../../etc/passwd")).is_err());
        assert_eq!(
            sanitize_archive_path(Path::new("root/skills/demo.md"))
                .unwrap()
                .unwrap(),
            PathBuf::from("skills/demo.md")
        );
        assert!(sanitize_archive_path(Path::new("root")).unwrap().is_none());
    }

    #[test]
    fn unpacks_tarball_without_top_level_dir() {
        let mut builder = tar::Builder::new(flate2::write::GzEncoder::new(
            Vec::new(),
            flate2::Compression::default(),
        ));
        let body = b"Archived skill.\n";
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Regular);
        header.set_size(body.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, "open-skills-abc123/archived.md", &body[..])
            .unwrap();
        let bytes = builder.into_inner().unwrap().finish().unwrap();

        let tmp = tempfile::tempdir().unwrap();
        unpack_tarball(&bytes, tmp.path()).unwrap();
        assert_eq!(
            std::fs::read_to_string(tmp.path().join("archived.md")).unwrap(),
            "Archived skill.\n"
        );
    }

    #[test]
    fn parses_github_sources() {
        assert_eq!(
            parse_github_source(OPEN_SKILLS_REPO_URL).unwrap(),
            ("besoeasy".to_string(), "open-skills".to_string())
        );
        assert_eq!(
            parse_github_source("owner/repo.git").unwrap(),
            ("owner".to_string(), "repo".to_string())
        );
        assert!(parse_github_source("too/many/parts").is_err());
        assert!(parse_github_source("noslash").is_err());
    }
}
