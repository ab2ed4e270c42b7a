use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::debug;

use bgs_core::env::default_encoding;
use bgs_core::{LogEntry, ProcessInfo, ProcessStatus, ShellError};
use bgs_supervisor::{
    communicate, spawn_under_shell, CreateProcessOptions, ProcessRecord, Supervisor,
};
use bgs_validate::{
    clean_command, has_pipe, parse_redirections, render_shell_string, split_pipe_commands,
    CommandValidator, Redirection,
};

use crate::response::ShellCommandResponse;

/// Executes shell commands against the allow-list: foreground to completion,
/// or in the background via the supervisor.
pub struct ShellExecutor {
    validator: CommandValidator,
    supervisor: Supervisor,
}

impl ShellExecutor {
    pub fn new(validator: CommandValidator, supervisor: Supervisor) -> Self {
        Self {
            validator,
            supervisor,
        }
    }

    /// Allow-list and retention from the environment.
    pub fn from_env() -> Self {
        Self::new(CommandValidator::from_env(), Supervisor::from_env())
    }

    pub fn validator(&self) -> &CommandValidator {
        &self.validator
    }

    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    /// Run a command to completion and return its captured output. Failures
    /// are projected into the response rather than raised.
    pub async fn execute(
        &self,
        command: &[String],
        directory: &Path,
        stdin: Option<String>,
        timeout: Option<u64>,
        envs: Option<HashMap<String, String>>,
        encoding: Option<String>,
    ) -> ShellCommandResponse {
        let started = Instant::now();
        match self
            .do_execute(command, directory, stdin, timeout, envs, encoding, started)
            .await
        {
            Ok(response) => response,
            Err(error) => {
                debug!(error = %error, "foreground execution failed");
                ShellCommandResponse::from_error(&error, started, directory)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn do_execute(
        &self,
        command: &[String],
        directory: &Path,
        stdin: Option<String>,
        timeout: Option<u64>,
        envs: Option<HashMap<String, String>>,
        // Foreground output is decoded lossily as UTF-8; the requested
        // encoding only matters for background records.
        _encoding: Option<String>,
        started: Instant,
    ) -> Result<ShellCommandResponse, ShellError> {
        validate_timeout(timeout)?;
        validate_directory(directory)?;

        let cleaned = clean_command(command);
        if cleaned.is_empty() {
            return Err(ShellError::EmptyCommand);
        }

        // Pipe form first: the whole pipeline is validated, then chained.
        if has_pipe(&cleaned) {
            self.validator.validate_pipeline(&cleaned)?;
            let rendered: Vec<String> = split_pipe_commands(&cleaned)
                .iter()
                .map(|segment| render_shell_string(segment))
                .collect();
            let (stdout, stderr, code) = self
                .supervisor
                .execute_pipeline(
                    &rendered,
                    directory,
                    stdin.map(String::into_bytes),
                    timeout,
                    envs.as_ref(),
                )
                .await?;
            return Ok(capture_response(
                &stdout, &stderr, code, started, directory,
            ));
        }

        for token in &cleaned {
            self.validator.validate_no_shell_operators(token)?;
        }

        let (cmd, redirects) = parse_redirections(&cleaned)?;
        self.validator.validate_command(&cmd)?;

        // Redirections: `<` feeds the child stdin, `>`/`>>` own its stdout.
        let mut stdin_bytes = stdin.map(String::into_bytes);
        let mut stdout_target = Stdio::piped();
        let mut stdout_captured = true;
        for redirect in &redirects {
            match redirect {
                Redirection::Input(path) => {
                    let path = directory.join(path);
                    stdin_bytes = Some(std::fs::read(&path).map_err(|e| {
                        ShellError::IoRedirection(format!(
                            "Cannot read redirected input {}: {e}",
                            path.display()
                        ))
                    })?);
                }
                Redirection::Output { path, append } => {
                    let path = directory.join(path);
                    let file = std::fs::OpenOptions::new()
                        .create(true)
                        .append(*append)
                        .write(true)
                        .truncate(!*append)
                        .open(&path)
                        .map_err(|e| {
                            ShellError::IoRedirection(format!(
                                "Cannot open redirected output {}: {e}",
                                path.display()
                            ))
                        })?;
                    stdout_target = Stdio::from(file);
                    stdout_captured = false;
                }
            }
        }

        let shell_cmd = render_shell_string(&cmd);
        let child = spawn_under_shell(&shell_cmd, directory, envs.as_ref(), stdout_target)
            .map_err(|e| ShellError::Spawn(e.to_string()))?;
        let (stdout, stderr, code) = communicate(child, stdin_bytes, timeout).await?;

        let stdout = if stdout_captured { stdout } else { Vec::new() };
        Ok(capture_response(&stdout, &stderr, code, started, directory))
    }

    /// Start a command in the background and return its pid.
    #[allow(clippy::too_many_arguments)]
    pub async fn async_execute(
        &self,
        command: &[String],
        directory: &Path,
        description: &str,
        labels: Vec<String>,
        stdin: Option<String>,
        envs: Option<HashMap<String, String>>,
        encoding: Option<String>,
        timeout: Option<u64>,
    ) -> Result<u32, ShellError> {
        validate_timeout(timeout)?;
        validate_directory(directory)?;
        if description.trim().is_empty() {
            return Err(ShellError::IllegalState(
                "Process description is required".into(),
            ));
        }

        let cleaned = clean_command(command);
        if cleaned.is_empty() {
            return Err(ShellError::EmptyCommand);
        }

        let shell_cmd = if has_pipe(&cleaned) {
            self.validator.validate_pipeline(&cleaned)?;
            split_pipe_commands(&cleaned)
                .iter()
                .map(|segment| self.render_background_segment(segment))
                .collect::<Result<Vec<_>, _>>()?
                .join(" | ")
        } else {
            for token in &cleaned {
                self.validator.validate_no_shell_operators(token)?;
            }
            self.render_background_segment(&cleaned)?
        };

        let opts = CreateProcessOptions {
            stdin: stdin.map(String::into_bytes),
            envs,
            encoding: Some(resolve_encoding(encoding)),
            timeout,
            description: description.to_string(),
            labels,
        };
        self.supervisor.start(&shell_cmd, directory, opts).await
    }

    /// Background segments never take user redirections: their stdout and
    /// stderr belong to the log store.
    fn render_background_segment(&self, segment: &[String]) -> Result<String, ShellError> {
        let (cmd, redirects) = parse_redirections(segment)?;
        if !redirects.is_empty() {
            return Err(ShellError::IoRedirection(
                "Redirections are not supported for background processes".into(),
            ));
        }
        self.validator.validate_command(&cmd)?;
        Ok(render_shell_string(&cmd))
    }

    pub fn list_processes(
        &self,
        labels: Option<&[String]>,
        status: Option<ProcessStatus>,
    ) -> Vec<ProcessInfo> {
        self.supervisor.list(labels, status)
    }

    pub fn get_process(&self, pid: u32) -> Result<Arc<ProcessRecord>, ShellError> {
        self.supervisor.get(pid).ok_or(ShellError::NotFound(pid))
    }

    pub fn get_process_info(&self, pid: u32) -> Result<ProcessInfo, ShellError> {
        Ok(self.get_process(pid)?.process_info())
    }

    pub async fn stop_process(&self, pid: u32, force: bool) -> Result<bool, ShellError> {
        self.supervisor.stop(pid, force).await
    }

    pub fn get_process_output(
        &self,
        pid: u32,
        tail: Option<usize>,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
        error: bool,
    ) -> Result<Vec<LogEntry>, ShellError> {
        self.supervisor.get_output(pid, tail, since, until, error)
    }

    pub fn follow_process_output(
        &self,
        pid: u32,
        tail: Option<usize>,
        since: Option<DateTime<Utc>>,
        error: bool,
        poll_interval: Duration,
    ) -> Result<mpsc::Receiver<LogEntry>, ShellError> {
        self.supervisor
            .follow_output(pid, tail, since, error, poll_interval)
    }

    pub fn clean_completed_process(&self, pid: u32) -> Result<bool, ShellError> {
        self.supervisor.clean_completed(pid)
    }

    pub fn status_summary(&self) -> BTreeMap<&'static str, usize> {
        self.supervisor.status_summary()
    }

    pub async fn cleanup_all(&self) -> usize {
        self.supervisor.cleanup_all().await
    }
}

fn capture_response(
    stdout: &[u8],
    stderr: &[u8],
    code: i32,
    started: Instant,
    directory: &Path,
) -> ShellCommandResponse {
    ShellCommandResponse {
        error: None,
        status: code,
        stdout: decode_trimmed(stdout),
        stderr: decode_trimmed(stderr),
        execution_time: started.elapsed().as_secs_f64(),
        directory: Some(directory.to_path_buf()),
        returncode: Some(code),
    }
}

fn decode_trimmed(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim().to_string()
}

/// A zero timeout is a mistake, not "no timeout".
fn validate_timeout(timeout: Option<u64>) -> Result<(), ShellError> {
    if timeout == Some(0) {
        return Err(ShellError::IllegalState(
            "Invalid timeout: 0 (must be at least 1 second)".into(),
        ));
    }
    Ok(())
}

fn validate_directory(directory: &Path) -> Result<(), ShellError> {
    if !directory.is_absolute() {
        return Err(ShellError::Directory(format!(
            "Directory must be an absolute path: {}",
            directory.display()
        )));
    }
    if !directory.exists() {
        return Err(ShellError::Directory(format!(
            "Directory does not exist: {}",
            directory.display()
        )));
    }
    if !directory.is_dir() {
        return Err(ShellError::Directory(format!(
            "Not a directory: {}",
            directory.display()
        )));
    }
    Ok(())
}

fn resolve_encoding(encoding: Option<String>) -> String {
    encoding
        .filter(|e| !e.trim().is_empty())
        .unwrap_or_else(default_encoding)
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
