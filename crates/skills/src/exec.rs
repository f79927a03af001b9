use std::{path::PathBuf, process::Stdio, time::Duration};

use {
    async_trait::async_trait,
    serde::{Deserialize, Serialize},
    tokio::process::Command,
    tracing::{debug, warn},
};

use skillhost_config::ExecConfig;

use crate::{
    error::{Error, Result},
    prompt_gen::manifest_to_prompt,
    registry::SkillRegistry,
    skill::Skill,
    types::{Tool, ToolKind},
};

/// Exit code reported when a command could not produce one.
pub const NO_EXIT_CODE: i32 = -1;

/// Outcome of a dispatched tool. A failed command is still a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    pub output: String,
    pub exit_code: i32,
}

impl ToolResult {
    fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            exit_code: 0,
        }
    }

    fn failed(output: impl Into<String>, exit_code: i32) -> Self {
        Self {
            success: false,
            output: output.into(),
            exit_code,
        }
    }
}

/// Arguments supplied to a tool invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ToolArgs {
    #[default]
    None,
    /// Appended verbatim after the base command.
    Raw(String),
    /// Merged over the tool's declared defaults; values are appended in
    /// declaration order, then any extra keys in supplied order.
    Structured(serde_json::Map<String, serde_json::Value>),
}

impl ToolArgs {
    /// Flatten to the space-separated argument text for `tool`.
    pub fn render(&self, tool: &Tool) -> String {
        match self {
            Self::None => String::new(),
            Self::Raw(raw) => raw.trim().to_string(),
            Self::Structured(map) => {
                let mut values: Vec<String> = tool
                    .args
                    .iter()
                    .map(|arg| {
                        map.get(&arg.key)
                            .map(value_text)
                            .unwrap_or_else(|| arg.value.clone())
                    })
                    .collect();
                values.extend(
                    map.iter()
                        .filter(|(key, _)| tool.arg(key).is_none())
                        .map(|(_, value)| value_text(value)),
                );
                values.retain(|v| !v.is_empty());
                values.join(" ")
            },
        }
    }
}

fn value_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn with_args(base: &str, args: &str) -> String {
    if args.is_empty() {
        base.to_string()
    } else {
        format!("{base} {args}")
    }
}

// ── Shell capability ────────────────────────────────────────────────────────

/// Captured output of a shell command: stdout followed by stderr.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellOutput {
    pub output: String,
    pub exit_code: i32,
}

/// The "run a shell command" capability used by shell tools.
///
/// An `Err` means the command could not be started at all.
#[async_trait]
pub trait ShellExecutor: Send + Sync {
    async fn run(&self, command: &str) -> Result<ShellOutput>;
}

/// Options for [`SystemShell`].
#[derive(Debug, Clone)]
pub struct ExecOpts {
    /// No limit when `None`.
    pub timeout: Option<Duration>,
    pub max_output_bytes: usize,
    pub working_dir: Option<PathBuf>,
}

impl Default for ExecOpts {
    fn default() -> Self {
        Self::from(&ExecConfig::default())
    }
}

impl From<&ExecConfig> for ExecOpts {
    fn from(config: &ExecConfig) -> Self {
        Self {
            timeout: config.timeout_secs.map(Duration::from_secs),
            max_output_bytes: config.max_output_bytes,
            working_dir: config.working_dir.as_ref().map(PathBuf::from),
        }
    }
}

/// Runs commands through `sh -c` on the host.
#[derive(Debug, Clone, Default)]
pub struct SystemShell {
    opts: ExecOpts,
}

impl SystemShell {
    pub fn new(opts: ExecOpts) -> Self {
        Self { opts }
    }
}

fn truncate_output(text: &mut String, max: usize) {
    if text.len() <= max {
        return;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text.truncate(end);
    text.push_str("\n... [output truncated]");
}

#[async_trait]
impl ShellExecutor for SystemShell {
    async fn run(&self, command: &str) -> Result<ShellOutput> {
        debug!(command, timeout = ?self.opts.timeout, "running shell tool");

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.opts.working_dir {
            cmd.current_dir(dir);
        }

        let child = cmd.spawn()?;
        let output = match self.opts.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
                Ok(output) => output?,
                Err(_) => {
                    warn!(command, "shell tool timed out");
                    return Ok(ShellOutput {
                        output: format!("command timed out after {}s", limit.as_secs_f64()),
                        exit_code: NO_EXIT_CODE,
                    });
                },
            },
            None => child.wait_with_output().await?,
        };

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        truncate_output(&mut text, self.opts.max_output_bytes);

        let exit_code = output.status.code().unwrap_or(NO_EXIT_CODE);
        debug!(exit_code, output_len = text.len(), "shell tool done");
        Ok(ShellOutput {
            output: text,
            exit_code,
        })
    }
}

// ── Dispatch ────────────────────────────────────────────────────────────────

/// Execute `tool_name` from a loaded skill.
///
/// Only dispatch problems are errors; a command that ran and failed comes
/// back as a result with `success == false`.
pub async fn execute_tool(
    skill: &Skill,
    tool_name: &str,
    args: &ToolArgs,
    shell: &dyn ShellExecutor,
) -> Result<ToolResult> {
    if !skill.loaded {
        return Err(Error::InvalidArgument(format!(
            "skill '{}' is not loaded",
            skill.name()
        )));
    }
    let tool = skill
        .manifest
        .find_tool(tool_name)
        .ok_or_else(|| Error::tool_not_found(tool_name))?;

    match tool.tool_kind() {
        ToolKind::Shell => {
            let command = with_args(&tool.command, &args.render(tool));
            let out = shell.run(&command).await?;
            Ok(ToolResult {
                success: out.exit_code == 0,
                output: out.output,
                exit_code: out.exit_code,
            })
        },
        ToolKind::Builtin => Ok(run_builtin(skill, tool, args)),
        kind @ (ToolKind::Http | ToolKind::Script | ToolKind::Custom) => {
            Err(Error::NotImplemented(kind))
        },
    }
}

/// Look up a registered skill and execute one of its tools.
pub async fn execute_registered(
    registry: &SkillRegistry,
    skill_name: &str,
    tool_name: &str,
    args: &ToolArgs,
    shell: &dyn ShellExecutor,
) -> Result<ToolResult> {
    let skill = registry.find(skill_name)?;
    execute_tool(&skill, tool_name, args, shell).await
}

fn run_builtin(skill: &Skill, tool: &Tool, args: &ToolArgs) -> ToolResult {
    match tool.command.trim() {
        "echo" => {
            let text = args.render(tool);
            if text.is_empty() {
                ToolResult::ok("Echo from skill")
            } else {
                ToolResult::ok(format!("Echo from skill: {text}"))
            }
        },
        "prompt" => ToolResult::ok(manifest_to_prompt(&skill.manifest)),
        other => ToolResult::failed(format!("Unknown built-in tool: {other}"), NO_EXIT_CODE),
    }
}
