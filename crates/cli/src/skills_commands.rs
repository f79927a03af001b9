use std::path::PathBuf;

use {
    anyhow::{Context, bail},
    clap::Subcommand,
    tracing::warn,
};

use {
    skillhost_config::SkillhostConfig,
    skillhost_skills::{
        DirectoryScan, OpenSkillsCatalog, RegistryInfo, Skill, SkillInfo, SkillRegistry,
        SyncOutcome, SystemShell, ToolArgs, discover, execute_tool, exec::ExecOpts, manifest_to_prompt,
        skills_to_system_prompt, to_extension,
    },
};

#[derive(Subcommand)]
pub enum SkillAction {
    /// List all discovered skills.
    List {
        /// Print the full registry dump instead of one line per skill.
        #[arg(long)]
        verbose: bool,
        /// Print the manifests as a JSON array.
        #[arg(long, conflicts_with = "verbose")]
        json: bool,
    },
    /// Show details about a skill.
    Info {
        /// Skill name.
        name: String,
    },
    /// Load and validate a skill file or bundle directory.
    Validate { path: PathBuf },
    /// Print the combined system prompt for every loaded skill, or one skill's prompt.
    Prompt { name: Option<String> },
    /// Show a skill's tools as host tool definitions.
    Tools { name: String },
    /// Print a skill manifest as JSON.
    Json { name: String },
    /// Execute one of a skill's tools.
    Exec {
        skill: String,
        tool: String,
        /// Structured argument, `key=value` (repeatable).
        #[arg(long = "arg", value_name = "KEY=VALUE")]
        args: Vec<String>,
        /// Raw arguments appended to the command.
        #[arg(trailing_var_arg = true)]
        raw: Vec<String>,
    },
    /// Refresh the open-skills catalog mirror.
    Sync {
        /// Sync even if the last sync is recent.
        #[arg(long)]
        force: bool,
    },
    /// Watch skill directories and report changes until interrupted.
    #[cfg(feature = "file-watcher")]
    Watch,
}

fn report_failures(scan: &DirectoryScan) {
    for (path, e) in &scan.failures {
        warn!(path = %path.display(), error = %e, "skipped skill");
    }
}

/// Build a registry from every configured skill source.
fn load_registry(config: &SkillhostConfig) -> anyhow::Result<SkillRegistry> {
    let registry = SkillRegistry::new();
    if !config.skills.enabled {
        return Ok(registry);
    }
    let cwd = std::env::current_dir()?;
    let scan = discover::load_all(&registry, &discover::search_paths(&config.skills, &cwd))?;
    report_failures(&scan);

    if config.catalog.enabled {
        let scan = OpenSkillsCatalog::from_config(config).load(&registry)?;
        report_failures(&scan);
    }
    Ok(registry)
}

fn parse_structured_args(
    pairs: &[String],
) -> anyhow::Result<serde_json::Map<String, serde_json::Value>> {
    pairs
        .iter()
        .map(|pair| {
            let (key, value) = pair
                .split_once('=')
                .with_context(|| format!("invalid --arg '{pair}': expected KEY=VALUE"))?;
            Ok((key.to_string(), serde_json::Value::String(value.to_string())))
        })
        .collect()
}

fn tool_args(pairs: &[String], raw: &[String]) -> anyhow::Result<ToolArgs> {
    if !pairs.is_empty() {
        if !raw.is_empty() {
            bail!("use either --arg KEY=VALUE or raw arguments, not both");
        }
        return Ok(ToolArgs::Structured(parse_structured_args(pairs)?));
    }
    if raw.is_empty() {
        Ok(ToolArgs::None)
    } else {
        Ok(ToolArgs::Raw(raw.join(" ")))
    }
}

pub async fn handle_skills(action: SkillAction, config: &SkillhostConfig) -> anyhow::Result<()> {
    match action {
        SkillAction::List { verbose, json } => {
            let skills = load_registry(config)?.list()?;
            if json {
                let manifests: Vec<_> = skills.iter().map(|s| &s.manifest).collect();
                println!("{}", serde_json::to_string_pretty(&manifests)?);
            } else if verbose {
                print!("{}", RegistryInfo(&skills));
            } else if skills.is_empty() {
                println!("No skills found.");
            } else {
                for skill in &skills {
                    println!(
                        "  {} ({}) - {}",
                        skill.name(),
                        skill.manifest.version,
                        skill.manifest.description
                    );
                }
            }
        },
        SkillAction::Info { name } => {
            let skill = load_registry(config)?.find(&name)?;
            print!("{}", SkillInfo(&skill));
        },
        SkillAction::Validate { path } => {
            let skill = Skill::load(&path)?;
            skill.validate()?;
            println!(
                "{} is valid: skill '{}' with {} tool(s)",
                path.display(),
                skill.name(),
                skill.manifest.tools.len()
            );
        },
        SkillAction::Prompt { name } => {
            let registry = load_registry(config)?;
            match name {
                Some(name) => print!("{}", manifest_to_prompt(&registry.find(&name)?.manifest)),
                None => print!(
                    "{}",
                    registry.with_skills(|skills| skills_to_system_prompt(skills))?
                ),
            }
        },
        SkillAction::Tools { name } => {
            let skill = load_registry(config)?.find(&name)?;
            let defs: Vec<_> = skill.manifest.tools.iter().map(to_extension).collect();
            println!("{}", serde_json::to_string_pretty(&defs)?);
        },
        SkillAction::Json { name } => {
            let skill = load_registry(config)?.find(&name)?;
            println!("{}", skill.manifest.to_json()?);
        },
        SkillAction::Exec {
            skill,
            tool,
            args,
            raw,
        } => {
            let args = tool_args(&args, &raw)?;
            let skill = load_registry(config)?.find(&skill)?;
            let shell = SystemShell::new(ExecOpts::from(&config.exec));
            let result = execute_tool(&skill, &tool, &args, &shell).await?;
            print!("{}", result.output);
            if !result.output.is_empty() && !result.output.ends_with('\n') {
                println!();
            }
            if !result.success {
                bail!("tool '{tool}' failed with exit code {}", result.exit_code);
            }
        },
        SkillAction::Sync { force } => {
            let catalog = OpenSkillsCatalog::from_config(config);
            let outcome = catalog.sync(force).await?;
            println!(
                "Catalog {}: {}",
                match outcome {
                    SyncOutcome::Skipped => "up to date",
                    SyncOutcome::Cloned => "cloned",
                    SyncOutcome::Pulled => "updated",
                },
                catalog.dir.display()
            );
        },
        #[cfg(feature = "file-watcher")]
        SkillAction::Watch => {
            use skillhost_skills::watcher::{SkillWatchEvent, SkillWatcher};

            let cwd = std::env::current_dir()?;
            let mut dirs: Vec<PathBuf> = discover::search_paths(&config.skills, &cwd)
                .into_iter()
                .map(|(dir, _)| dir)
                .collect();
            if config.catalog.enabled {
                dirs.push(skillhost_config::open_skills_dir(config));
            }

            let (_watcher, mut rx) = SkillWatcher::start(&dirs)?;
            println!("Watching {} director(ies); press Ctrl-C to stop.", dirs.len());
            while let Some(SkillWatchEvent::Changed { paths }) = rx.recv().await {
                for path in paths {
                    println!("changed: {}", path.display());
                }
            }
        },
    }

    Ok(())
}
