//! The shell tool surface: one declarative definition table plus a handler
//! per tool, formatting results the way `docker logs`-style CLIs do.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use bgs_core::types::micro_ts;
use bgs_core::{LogEntry, ProcessStatus, ShellError};
use bgs_executor::ShellExecutor;

const DEFAULT_EXECUTE_TIMEOUT: u64 = 15;
const DEFAULT_LIMIT_LINES: usize = 500;
const DEFAULT_TIME_PREFIX_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Shell noise from the interactive controlling shell that is not command
/// output and would only confuse callers.
const STDERR_NOISE: &str = "cannot set terminal process group";

#[derive(Serialize)]
pub struct ToolDef {
    pub name: &'static str,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

pub fn tool_definitions(executor: &ShellExecutor) -> Vec<ToolDef> {
    let allowed = executor.validator().allowed_commands().join(", ");
    vec![
        ToolDef {
            name: "shell_execute",
            description: format!(
                "Execute a shell command in foreground and return its output. Allowed commands: {allowed}"
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "command": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Command and its arguments as array"
                    },
                    "directory": {
                        "type": "string",
                        "description": "Absolute path to the working directory"
                    },
                    "stdin": {
                        "type": "string",
                        "description": "Input passed to the command via stdin"
                    },
                    "timeout": {
                        "type": "integer",
                        "minimum": 1,
                        "description": "Maximum execution time in seconds (default 15)"
                    },
                    "envs": {
                        "type": "object",
                        "additionalProperties": {"type": "string"},
                        "description": "Additional environment variables"
                    },
                    "encoding": {
                        "type": "string",
                        "description": "Character encoding for command output (e.g. 'utf-8')"
                    },
                    "limit_lines": {
                        "type": "integer",
                        "minimum": 1,
                        "description": "Maximum lines shown per stream (default 500)"
                    }
                },
                "required": ["command", "directory"]
            }),
        },
        ToolDef {
            name: "shell_bg_start",
            description: format!(
                "Start a command in background and return its PID. Allowed commands: {allowed}"
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "command": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Command and its arguments as array"
                    },
                    "directory": {
                        "type": "string",
                        "description": "Absolute path to the working directory"
                    },
                    "description": {
                        "type": "string",
                        "description": "Description of the command (required)"
                    },
                    "labels": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Labels to categorize the command"
                    },
                    "stdin": {"type": "string", "description": "Input passed via stdin"},
                    "envs": {
                        "type": "object",
                        "additionalProperties": {"type": "string"},
                        "description": "Additional environment variables"
                    },
                    "encoding": {"type": "string", "description": "Output character encoding"},
                    "timeout": {
                        "type": "integer",
                        "minimum": 1,
                        "description": "Maximum execution time in seconds"
                    }
                },
                "required": ["command", "directory", "description"]
            }),
        },
        ToolDef {
            name: "shell_bg_list",
            description: "List background processes with optional label and status filtering"
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "labels": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Filter processes by labels"
                    },
                    "status": {
                        "type": "string",
                        "enum": ["running", "completed", "failed", "terminated", "error"],
                        "description": "Filter processes by status"
                    }
                }
            }),
        },
        ToolDef {
            name: "shell_bg_stop",
            description: "Stop a background process".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "pid": {"type": "integer", "description": "PID of the process to stop"},
                    "force": {
                        "type": "boolean",
                        "description": "Kill immediately instead of terminating gracefully"
                    }
                },
                "required": ["pid"]
            }),
        },
        ToolDef {
            name: "shell_bg_logs",
            description: "Get output from a background process, similar to 'docker logs'"
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "pid": {"type": "integer", "description": "PID of the process"},
                    "tail": {
                        "type": "integer",
                        "minimum": 1,
                        "description": "Number of lines to show from the end"
                    },
                    "since": {
                        "type": "string",
                        "description": "Show logs since timestamp (e.g. '2025-01-01T00:00:00')"
                    },
                    "until": {
                        "type": "string",
                        "description": "Show logs until timestamp (e.g. '2025-01-01T00:00:00')"
                    },
                    "with_stdout": {"type": "boolean", "description": "Show standard output (default true)"},
                    "with_stderr": {"type": "boolean", "description": "Show error output (default false)"},
                    "add_time_prefix": {
                        "type": "boolean",
                        "description": "Prefix each line with its capture time (default true)"
                    },
                    "time_prefix_format": {
                        "type": "string",
                        "description": "strftime format of the time prefix"
                    },
                    "follow_seconds": {
                        "type": "integer",
                        "minimum": 0,
                        "description": "Wait this long and include output arriving meanwhile"
                    },
                    "limit_lines": {
                        "type": "integer",
                        "minimum": 1,
                        "description": "Maximum lines shown per stream (default 500)"
                    }
                },
                "required": ["pid"]
            }),
        },
        ToolDef {
            name: "shell_bg_clean",
            description: "Clean up finished background processes and their logs".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "pids": {
                        "type": "array",
                        "items": {"type": "integer"},
                        "description": "PIDs of the processes to clean"
                    }
                },
                "required": ["pids"]
            }),
        },
        ToolDef {
            name: "shell_bg_detail",
            description: "Show the full record of one background process".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "pid": {"type": "integer", "description": "PID of the process"}
                },
                "required": ["pid"]
            }),
        },
    ]
}

pub async fn dispatch(executor: &ShellExecutor, name: &str, arguments: Value) -> Result<Value> {
    match name {
        "shell_execute" => shell_execute(executor, arguments).await,
        "shell_bg_start" => shell_bg_start(executor, arguments).await,
        "shell_bg_list" => shell_bg_list(executor, arguments),
        "shell_bg_stop" => shell_bg_stop(executor, arguments).await,
        "shell_bg_logs" => shell_bg_logs(executor, arguments).await,
        "shell_bg_clean" => shell_bg_clean(executor, arguments),
        "shell_bg_detail" => shell_bg_detail(executor, arguments),
        other => bail!("Unknown tool: {other}"),
    }
}

fn parse_args<T: serde::de::DeserializeOwned>(arguments: Value) -> Result<T> {
    serde_json::from_value(arguments).map_err(|e| anyhow::anyhow!("Invalid arguments: {e}"))
}

fn default_true() -> bool {
    true
}

fn default_execute_timeout() -> u64 {
    DEFAULT_EXECUTE_TIMEOUT
}

fn default_limit_lines() -> usize {
    DEFAULT_LIMIT_LINES
}

fn default_time_prefix_format() -> String {
    DEFAULT_TIME_PREFIX_FORMAT.to_string()
}

#[derive(Deserialize)]
struct ShellExecuteArgs {
    command: Vec<String>,
    directory: PathBuf,
    #[serde(default)]
    stdin: Option<String>,
    #[serde(default = "default_execute_timeout")]
    timeout: u64,
    #[serde(default)]
    envs: Option<HashMap<String, String>>,
    #[serde(default)]
    encoding: Option<String>,
    #[serde(default = "default_limit_lines")]
    limit_lines: usize,
}

async fn shell_execute(executor: &ShellExecutor, arguments: Value) -> Result<Value> {
    let args: ShellExecuteArgs = parse_args(arguments)?;
    if args.limit_lines == 0 {
        bail!("limit_lines must be at least 1");
    }

    let response = executor
        .execute(
            &args.command,
            &args.directory,
            args.stdin,
            Some(args.timeout),
            args.envs,
            args.encoding,
        )
        .await;

    if let Some(error) = response.error {
        bail!(error);
    }

    let mut contents = vec![text_content(format!("**exit with {}**", response.status))];
    if !response.stdout.is_empty() {
        let lines: Vec<String> = response.stdout.lines().map(str::to_string).collect();
        contents.push(text_content(format_section(
            "stdout",
            &lines,
            args.limit_lines,
        )));
    }
    if !response.stderr.is_empty() && !response.stderr.contains(STDERR_NOISE) {
        let lines: Vec<String> = response.stderr.lines().map(str::to_string).collect();
        contents.push(text_content(format_section(
            "stderr",
            &lines,
            args.limit_lines,
        )));
    }
    Ok(tool_result(contents))
}

#[derive(Deserialize)]
struct StartProcessArgs {
    command: Vec<String>,
    directory: PathBuf,
    description: String,
    #[serde(default)]
    labels: Vec<String>,
    #[serde(default)]
    stdin: Option<String>,
    #[serde(default)]
    envs: Option<HashMap<String, String>>,
    #[serde(default)]
    encoding: Option<String>,
    #[serde(default)]
    timeout: Option<u64>,
}

async fn shell_bg_start(executor: &ShellExecutor, arguments: Value) -> Result<Value> {
    let args: StartProcessArgs = parse_args(arguments)?;
    let pid = executor
        .async_execute(
            &args.command,
            &args.directory,
            &args.description,
            args.labels,
            args.stdin,
            args.envs,
            args.encoding,
            args.timeout,
        )
        .await?;
    Ok(tool_result(vec![text_content(format!(
        "Started background process with PID: {pid}"
    ))]))
}

#[derive(Deserialize)]
struct ListProcessesArgs {
    #[serde(default)]
    labels: Option<Vec<String>>,
    #[serde(default)]
    status: Option<String>,
}

fn shell_bg_list(executor: &ShellExecutor, arguments: Value) -> Result<Value> {
    let args: ListProcessesArgs = parse_args(arguments)?;
    let status = args
        .status
        .as_deref()
        .map(|s| s.parse::<ProcessStatus>())
        .transpose()
        .map_err(|e| anyhow::anyhow!(e))?;

    let processes = executor.list_processes(args.labels.as_deref(), status);
    if processes.is_empty() {
        return Ok(tool_result(vec![text_content(
            "No background processes found".to_string(),
        )]));
    }

    let mut lines = vec![
        "PID | STATUS | START TIME | COMMAND | DESCRIPTION | LABELS".to_string(),
        "-".repeat(100),
    ];
    for info in processes {
        lines.push(format!(
            "{} | {} | {} | {} | {} | {}",
            info.pid,
            info.status,
            info.start_time.format("%Y-%m-%d %H:%M:%S"),
            truncate_text(&info.shell_cmd, 30),
            info.description,
            info.labels.join(", "),
        ));
    }
    Ok(tool_result(vec![text_content(lines.join("\n"))]))
}

#[derive(Deserialize)]
struct StopProcessArgs {
    pid: u32,
    #[serde(default)]
    force: bool,
}

async fn shell_bg_stop(executor: &ShellExecutor, arguments: Value) -> Result<Value> {
    let args: StopProcessArgs = parse_args(arguments)?;
    let info = executor.get_process_info(args.pid)?;

    let stopped = executor.stop_process(args.pid, args.force).await?;
    let outcome = if !stopped {
        "could not be terminated".to_string()
    } else if args.force {
        "been forcefully terminated".to_string()
    } else {
        "been gracefully stopped".to_string()
    };
    Ok(tool_result(vec![text_content(format!(
        "Process {} has {}\nCommand: {}\nDescription: {}",
        args.pid,
        outcome,
        truncate_text(&info.shell_cmd, 30),
        info.description,
    ))]))
}

#[derive(Deserialize)]
struct GetProcessOutputArgs {
    pid: u32,
    #[serde(default)]
    tail: Option<usize>,
    #[serde(default)]
    since: Option<String>,
    #[serde(default)]
    until: Option<String>,
    #[serde(default = "default_true")]
    with_stdout: bool,
    #[serde(default)]
    with_stderr: bool,
    #[serde(default = "default_true")]
    add_time_prefix: bool,
    #[serde(default = "default_time_prefix_format")]
    time_prefix_format: String,
    #[serde(default)]
    follow_seconds: u64,
    #[serde(default = "default_limit_lines")]
    limit_lines: usize,
}

async fn shell_bg_logs(executor: &ShellExecutor, arguments: Value) -> Result<Value> {
    let args: GetProcessOutputArgs = parse_args(arguments)?;
    if args.limit_lines == 0 {
        bail!("limit_lines must be at least 1");
    }
    let since = parse_timestamp(args.since.as_deref(), "since")?;
    let until = parse_timestamp(args.until.as_deref(), "until")?;

    let info = executor.get_process_info(args.pid)?;

    // The follow window: wait, then read once so output that arrived in the
    // meantime is part of the answer.
    if args.follow_seconds > 0 {
        tokio::time::sleep(std::time::Duration::from_secs(args.follow_seconds)).await;
    }

    let mut status_info = format!(
        "**Process {} (status: {})**\nCommand: {}\nDescription: {}",
        args.pid,
        info.status,
        truncate_text(&info.shell_cmd, 50),
        info.description,
    );
    match info.status {
        ProcessStatus::Running => status_info.push_str("\nStatus: Process is still running"),
        ProcessStatus::Completed => status_info.push_str(&format!(
            "\nStatus: Process completed successfully with exit code {}",
            info.exit_code.unwrap_or(0)
        )),
        other => status_info.push_str(&format!(
            "\nStatus: Process {} with exit code {}",
            other,
            info.exit_code.map_or("unknown".to_string(), |c| c.to_string())
        )),
    }
    let mut contents = vec![text_content(status_info)];

    if !args.with_stdout && !args.with_stderr {
        contents.push(text_content(
            "---\nNo output requested. Set with_stdout=true or with_stderr=true to view logs.\n---"
                .to_string(),
        ));
        return Ok(tool_result(contents));
    }

    if args.with_stdout {
        let entries = executor.get_process_output(args.pid, args.tail, since, until, false)?;
        let lines = format_entries(&entries, args.add_time_prefix, &args.time_prefix_format);
        contents.push(text_content(format_section(
            "stdout",
            &lines,
            args.limit_lines,
        )));
    }
    if args.with_stderr {
        let entries = executor.get_process_output(args.pid, args.tail, since, until, true)?;
        let lines = format_entries(&entries, args.add_time_prefix, &args.time_prefix_format);
        contents.push(text_content(format_section(
            "stderr",
            &lines,
            args.limit_lines,
        )));
    }

    let mut hints = Vec::new();
    if args.follow_seconds > 0 {
        hints.push(format!(
            "- Showing logs with {}s follow time",
            args.follow_seconds
        ));
        hints.push(format!(
            "- For longer follow: `shell_bg_logs(pid={}, follow_seconds=60)`",
            args.pid
        ));
    } else {
        hints.push(format!(
            "- To follow logs: `shell_bg_logs(pid={}, follow_seconds=5)`",
            args.pid
        ));
    }
    contents.push(text_content(hints.join("\n")));

    Ok(tool_result(contents))
}

#[derive(Deserialize)]
struct CleanProcessesArgs {
    pids: Vec<u32>,
}

fn shell_bg_clean(executor: &ShellExecutor, arguments: Value) -> Result<Value> {
    let args: CleanProcessesArgs = parse_args(arguments)?;
    if args.pids.is_empty() {
        bail!("No process PIDs provided");
    }

    let mut lines = Vec::with_capacity(args.pids.len() + 1);
    let mut any_running = false;
    for pid in args.pids {
        let line = match executor.clean_completed_process(pid) {
            Ok(true) => format!("{pid}: cleaned"),
            Ok(false) => format!("{pid}: not found"),
            Err(ShellError::IllegalState(_)) => {
                any_running = true;
                format!("{pid}: still running")
            }
            Err(e) => format!("{pid}: error: {e}"),
        };
        lines.push(line);
    }
    if any_running {
        lines.push(
            "Note: Cannot clean running processes. Stop them first with `shell_bg_stop()`."
                .to_string(),
        );
    }
    Ok(tool_result(vec![text_content(lines.join("\n"))]))
}

#[derive(Deserialize)]
struct ProcessDetailArgs {
    pid: u32,
}

fn shell_bg_detail(executor: &ShellExecutor, arguments: Value) -> Result<Value> {
    let args: ProcessDetailArgs = parse_args(arguments)?;
    let info = executor.get_process_info(args.pid)?;

    let mut lines = vec![
        format!("**Process {} (status: {})**", info.pid, info.status),
        format!("Command: {}", info.shell_cmd),
        format!("Description: {}", info.description),
        format!("Directory: {}", info.directory.display()),
        format!("Labels: {}", if info.labels.is_empty() {
            "-".to_string()
        } else {
            info.labels.join(", ")
        }),
        format!("Encoding: {}", info.encoding),
        format!("Started: {}", info.start_time.format("%Y-%m-%d %H:%M:%S%.3f")),
    ];
    if let Some(end_time) = info.end_time {
        lines.push(format!("Ended: {}", end_time.format("%Y-%m-%d %H:%M:%S%.3f")));
    }
    if let Some(exit_code) = info.exit_code {
        lines.push(format!("Exit code: {exit_code}"));
    }
    if let Some(timeout) = info.timeout {
        lines.push(format!("Timeout: {timeout}s"));
    }

    lines.push(String::new());
    lines.push(format!(
        "To view standard output: `shell_bg_logs(pid={})`",
        info.pid
    ));
    lines.push(format!(
        "To view error output: `shell_bg_logs(pid={}, with_stderr=true)`",
        info.pid
    ));
    if info.status == ProcessStatus::Running {
        lines.push(format!("Stop the process: `shell_bg_stop(pid={})`", info.pid));
        lines.push(format!(
            "Force stop the process: `shell_bg_stop(pid={}, force=true)`",
            info.pid
        ));
    } else {
        lines.push(format!(
            "Clean up the process: `shell_bg_clean(pids=[{}])`",
            info.pid
        ));
    }

    Ok(tool_result(vec![text_content(lines.join("\n"))]))
}

fn parse_timestamp(raw: Option<&str>, field: &str) -> Result<Option<DateTime<Utc>>> {
    raw.map(|r| micro_ts::parse(r))
        .transpose()
        .map_err(|e| anyhow::anyhow!("'{field}' must be an ISO format timestamp: {e}"))
}

fn format_entries(entries: &[LogEntry], add_time_prefix: bool, format: &str) -> Vec<String> {
    entries
        .iter()
        .map(|entry| {
            if add_time_prefix {
                format!("[{}] {}", entry.timestamp.format(format), entry.text)
            } else {
                entry.text.clone()
            }
        })
        .collect()
}

/// Stream section with an explicit truncation notice when over the limit.
fn format_section(stream: &str, lines: &[String], limit: usize) -> String {
    let total = lines.len();
    if total == 0 {
        return format!("---\n{stream}: 0 lines\n---\n");
    }
    if total > limit {
        format!(
            "---\n{stream}: (truncated, {limit}/{total} lines shown)\n---\n{}\n... (output truncated, showing {limit} of {total} lines)\n",
            lines[..limit].join("\n"),
        )
    } else {
        format!("---\n{stream}: {total} lines\n---\n{}\n", lines.join("\n"))
    }
}

fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let kept: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{kept}...")
}

fn text_content(text: String) -> Value {
    json!({"type": "text", "text": text})
}

fn tool_result(contents: Vec<Value>) -> Value {
    json!({"content": contents})
}

#[cfg(test)]
#[path = "tools_tests.rs"]
mod tests;
