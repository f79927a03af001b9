#![allow(clippy::unwrap_used, clippy::expect_used)]
//! End-to-end scenarios across loading, registry, dispatch and prompts.

use std::path::Path;

use skillhost_skills::{
    Manifest, Skill, SkillRegistry, SystemShell, ToolArgs, ToolCatalog,
    catalog::{mark_synced, should_sync},
    execute_tool, load_from_directory, manifest_to_prompt, register_tools,
    skills_to_system_prompt,
};

const ALPHA: &str = r#"
[skill]
name = "alpha"
description = "First skill"
tags = ["demo"]

[[tools]]
name = "greet"
description = "Print a greeting"
kind = "shell"
command = "echo hi"

[[tools]]
name = "ack"
description = "Acknowledge"
kind = "builtin"
command = "echo"
"#;

fn write(dir: &Path, name: &str, content: &str) {
    std::fs::write(dir.join(name), content).unwrap();
}

#[test]
fn directory_scan_loads_toml_and_markdown_only() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "a.toml", ALPHA);
    write(
        tmp.path(),
        "b.md",
        "[skill]\nname = \"beta\"\ndescription = \"Second skill\"\n",
    );
    write(tmp.path(), "c.txt", "ignored");

    let registry = SkillRegistry::new();
    let scan = load_from_directory(&registry, tmp.path()).unwrap();

    let mut names: Vec<&str> = scan.skills.iter().map(Skill::name).collect();
    names.sort_unstable();
    assert_eq!(names, vec!["alpha", "beta"]);
    assert!(scan.failures.is_empty());
    assert!(registry.contains("alpha"));
    assert!(registry.contains("beta"));
    assert_eq!(registry.len(), 2);
}

#[test]
fn register_and_unregister_keep_invariants() {
    let registry = SkillRegistry::new();
    for name in ["n1", "n2", "n3"] {
        registry
            .register(Skill::from_manifest(Manifest::new(name, "desc")))
            .unwrap();
    }
    let dup = registry
        .register(Skill::from_manifest(Manifest::new("n1", "again")))
        .unwrap_err();
    assert!(dup.is_already_exists());

    registry.unregister("n2").unwrap();
    assert_eq!(registry.names().unwrap(), vec!["n1", "n3"]);
    assert!(registry.unregister("n2").unwrap_err().is_not_found());
}

#[test]
fn concurrent_register_and_find_share_one_registry() {
    let registry = SkillRegistry::new();
    std::thread::scope(|scope| {
        for worker in 0..4 {
            let registry = &registry;
            scope.spawn(move || {
                for i in 0..25 {
                    let name = format!("w{worker}-s{i}");
                    registry
                        .register(Skill::from_manifest(Manifest::new(&name, "desc")))
                        .unwrap();
                    assert_eq!(registry.find(&name).unwrap().name(), name);
                    let _ = registry.list().unwrap();
                }
            });
        }
        scope.spawn(|| {
            let dup = (0..100)
                .filter(|_| {
                    registry
                        .register(Skill::from_manifest(Manifest::new("shared", "desc")))
                        .is_err()
                })
                .count();
            assert_eq!(dup, 99);
        });
    });

    assert_eq!(registry.len(), 101);
    let mut names = registry.names().unwrap();
    names.sort_unstable();
    names.dedup();
    assert_eq!(names.len(), 101);
}

#[test]
fn load_unload_reload_matches_fresh_load() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("alpha.toml");
    std::fs::write(&path, ALPHA).unwrap();

    let mut skill = Skill::load(&path).unwrap();
    skill.reload().unwrap();
    let fresh = Skill::load(&path).unwrap();
    assert_eq!(skill.manifest, fresh.manifest);
    assert!(skill.loaded);
}

#[tokio::test]
async fn loaded_skill_tools_execute() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "alpha.toml", ALPHA);
    let skill = Skill::load(&tmp.path().join("alpha.toml")).unwrap();
    let shell = SystemShell::default();

    let greet = execute_tool(&skill, "greet", &ToolArgs::None, &shell)
        .await
        .unwrap();
    assert!(greet.success);
    assert!(greet.output.contains("hi"));

    let ack = execute_tool(&skill, "ack", &ToolArgs::Raw("ok".into()), &shell)
        .await
        .unwrap();
    assert_eq!(ack.output, "Echo from skill: ok");
}

#[test]
fn tools_register_with_host_and_prompts_render() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "alpha.toml", ALPHA);
    let registry = SkillRegistry::new();
    load_from_directory(&registry, tmp.path()).unwrap();

    let skill = registry.find("alpha").unwrap();
    let mut host = ToolCatalog::new();
    assert_eq!(register_tools(&skill, &mut host).unwrap(), 2);

    let prompt = manifest_to_prompt(&skill.manifest);
    assert!(prompt.starts_with("# Skill: alpha"));
    assert!(prompt.contains("## Available Tools"));
    assert!(prompt.find("### greet").unwrap() < prompt.find("### ack").unwrap());

    let system = registry.with_skills(|skills| skills_to_system_prompt(skills)).unwrap();
    assert!(system.starts_with("# Available Skills\n\n# Skill: alpha"));
}

#[test]
fn sync_watermark_round_trip() {
    let tmp = tempfile::tempdir().unwrap();
    assert!(should_sync(tmp.path()));
    mark_synced(tmp.path()).unwrap();
    assert!(!should_sync(tmp.path()));
}
