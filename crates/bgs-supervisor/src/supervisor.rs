use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use bgs_core::env::{controlling_shell, default_encoding, retention_seconds_from_env};
use bgs_core::{LogEntry, ProcessInfo, ProcessStatus, ShellError};
use bgs_logstore::ProcessLogDir;

use crate::drain::drain_stream;
use crate::record::{CreateProcessOptions, ProcessRecord};

pub const DEFAULT_FOLLOW_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Escalation windows for timeout-triggered termination.
const TIMEOUT_TERM_GRACE: Duration = Duration::from_secs(2);
const TIMEOUT_KILL_GRACE: Duration = Duration::from_secs(1);
/// Escalation windows for client-requested stop.
const STOP_WAIT: Duration = Duration::from_secs(5);
const STOP_KILL_WAIT: Duration = Duration::from_secs(2);
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Spawns, monitors, terminates, and garbage-collects background processes.
///
/// Cheap to clone; all clones share the live map. The map is guarded by a
/// plain mutex that is never held across an await.
#[derive(Clone)]
pub struct Supervisor {
    inner: Arc<Inner>,
}

struct Inner {
    processes: Mutex<HashMap<u32, Arc<ProcessRecord>>>,
    retention_seconds: i64,
}

impl Supervisor {
    pub fn new(retention_seconds: i64) -> Self {
        Self {
            inner: Arc::new(Inner {
                processes: Mutex::new(HashMap::new()),
                retention_seconds,
            }),
        }
    }

    /// Retention from `PROCESS_RETENTION_SECONDS` (default 300 s).
    pub fn from_env() -> Self {
        Self::new(retention_seconds_from_env())
    }

    pub fn retention_seconds(&self) -> i64 {
        self.inner.retention_seconds
    }

    /// Spawn a child under the controlling shell and register its record.
    ///
    /// On failure nothing is registered and the allocated log directory is
    /// removed.
    pub async fn create(
        &self,
        shell_cmd: &str,
        directory: &Path,
        opts: CreateProcessOptions,
    ) -> Result<Arc<ProcessRecord>, ShellError> {
        info!(
            command = shell_cmd,
            directory = %directory.display(),
            description = %opts.description,
            labels = ?opts.labels,
            timeout = ?opts.timeout,
            "starting background process"
        );

        let logs = ProcessLogDir::create()
            .map_err(|e| ShellError::Internal(format!("failed to allocate log directory: {e}")))?;

        let mut child = spawn_under_shell(shell_cmd, directory, opts.envs.as_ref(), Stdio::piped())
            .map_err(|e| ShellError::Spawn(e.to_string()))?;
        let pid = child
            .id()
            .ok_or_else(|| ShellError::Spawn("child exited before its pid could be read".into()))?;

        write_stdin_once(&mut child, opts.stdin.clone());

        let encoding = opts
            .encoding
            .clone()
            .unwrap_or_else(default_encoding);
        let record = Arc::new(ProcessRecord::new(
            pid,
            shell_cmd.to_string(),
            directory.to_path_buf(),
            encoding,
            &opts,
            logs,
        ));
        self.register(record.clone())?;

        let mut drains = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            drains.push(tokio::spawn(drain_stream(
                stdout,
                record.clone(),
                false,
                record.cancel.child_token(),
            )));
        }
        if let Some(stderr) = child.stderr.take() {
            drains.push(tokio::spawn(drain_stream(
                stderr,
                record.clone(),
                true,
                record.cancel.child_token(),
            )));
        }

        let monitor = tokio::spawn(monitor_process(
            self.clone(),
            record.clone(),
            child,
            drains,
        ));
        record.tasks.lock().expect("task lock").monitor = Some(monitor);

        Ok(record)
    }

    /// Convenience wrapper over [`Supervisor::create`] returning the identity.
    pub async fn start(
        &self,
        shell_cmd: &str,
        directory: &Path,
        opts: CreateProcessOptions,
    ) -> Result<u32, ShellError> {
        Ok(self.create(shell_cmd, directory, opts).await?.pid())
    }

    /// Snapshot of the live map, filtered. A record matches `labels` when it
    /// shares at least one label with the filter.
    pub fn list(
        &self,
        labels: Option<&[String]>,
        status: Option<ProcessStatus>,
    ) -> Vec<ProcessInfo> {
        let records: Vec<Arc<ProcessRecord>> = {
            let map = self.inner.processes.lock().expect("process map lock");
            map.values().cloned().collect()
        };
        let mut infos: Vec<ProcessInfo> = records
            .iter()
            .filter(|r| r.matches(labels, status))
            .map(|r| r.process_info())
            .collect();
        infos.sort_by_key(|info| info.start_time);
        infos
    }

    pub fn get(&self, pid: u32) -> Option<Arc<ProcessRecord>> {
        self.inner
            .processes
            .lock()
            .expect("process map lock")
            .get(&pid)
            .cloned()
    }

    /// Stop a process, gracefully first unless `force`.
    ///
    /// A record that already left `running` is not mutated; cleanup is
    /// scheduled and the call reports success. Returns `false` only when the
    /// child survives the full escalation ladder.
    pub async fn stop(&self, pid: u32, force: bool) -> Result<bool, ShellError> {
        let record = self.get(pid).ok_or(ShellError::NotFound(pid))?;
        if !record.is_running() {
            debug!(pid, "stop requested for a process that already ended");
            self.schedule_delayed_cleanup(pid);
            return Ok(true);
        }

        info!(pid, force, "stopping process");
        signal_pid(pid, force);
        if wait_for_exit(&record, STOP_WAIT).await {
            record.force_terminated();
            self.schedule_delayed_cleanup(pid);
            return Ok(true);
        }

        if !force {
            warn!(pid, "process ignored graceful stop; escalating");
            signal_pid(pid, true);
            if wait_for_exit(&record, STOP_KILL_WAIT).await {
                record.force_terminated();
                self.schedule_delayed_cleanup(pid);
                return Ok(true);
            }
        }

        warn!(pid, "process survived termination escalation");
        Ok(false)
    }

    pub fn get_output(
        &self,
        pid: u32,
        tail: Option<usize>,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
        error: bool,
    ) -> Result<Vec<LogEntry>, ShellError> {
        let record = self.get(pid).ok_or(ShellError::NotFound(pid))?;
        Ok(record.get_output(error, tail, since, until))
    }

    /// Follow one output stream: the matching backlog first, then entries as
    /// they arrive. The channel closes once the record has left `running` and
    /// a further poll finds nothing new.
    pub fn follow_output(
        &self,
        pid: u32,
        tail: Option<usize>,
        since: Option<DateTime<Utc>>,
        error: bool,
        poll_interval: Duration,
    ) -> Result<mpsc::Receiver<LogEntry>, ShellError> {
        let record = self.get(pid).ok_or(ShellError::NotFound(pid))?;
        let (tx, rx) = mpsc::channel(256);

        tokio::spawn(async move {
            // One snapshot both seeds the backlog and fixes the follow
            // position, so nothing between the two can be lost.
            let all = record.get_output(error, None, None, None);
            let mut seen = all.len();
            let mut backlog: Vec<LogEntry> = all
                .into_iter()
                .filter(|e| since.is_none_or(|s| e.timestamp >= s))
                .collect();
            if let Some(tail) = tail {
                if backlog.len() > tail {
                    backlog.drain(..backlog.len() - tail);
                }
            }
            for entry in backlog {
                if tx.send(entry).await.is_err() {
                    return;
                }
            }

            loop {
                let was_running = record.is_running();
                let all = record.get_output(error, None, None, None);
                let fresh = all.len() > seen;
                for entry in all.into_iter().skip(seen) {
                    if tx.send(entry).await.is_err() {
                        return;
                    }
                    seen += 1;
                }
                if !was_running && !fresh {
                    return;
                }
                tokio::time::sleep(poll_interval).await;
            }
        });

        Ok(rx)
    }

    /// Remove a terminal record: cancel its tasks, delete its log files, drop
    /// it from the live map. `Ok(false)` when the pid is already gone.
    pub fn clean_completed(&self, pid: u32) -> Result<bool, ShellError> {
        let Some(record) = self.get(pid) else {
            return Ok(false);
        };
        if record.is_running() {
            return Err(ShellError::IllegalState(format!(
                "Process {pid} is still running and cannot be cleaned"
            )));
        }
        self.inner
            .processes
            .lock()
            .expect("process map lock")
            .remove(&pid);
        teardown(&record);
        info!(pid, "cleaned process record");
        Ok(true)
    }

    /// Terminate every running child with force and delete all records.
    /// Called on host shutdown. Returns the number of records removed.
    pub async fn cleanup_all(&self) -> usize {
        let records: Vec<Arc<ProcessRecord>> = {
            let mut map = self.inner.processes.lock().expect("process map lock");
            map.drain().map(|(_, r)| r).collect()
        };
        let count = records.len();

        for record in records {
            if record.is_running() {
                signal_pid(record.pid(), true);
            }
            record.cancel.cancel();
            let monitor = record.tasks.lock().expect("task lock").monitor.take();
            if let Some(handle) = monitor {
                if tokio::time::timeout(Duration::from_secs(5), handle)
                    .await
                    .is_err()
                {
                    warn!(pid = record.pid(), "monitor task did not wind down in time");
                }
            }
            if let Some(handle) = record.tasks.lock().expect("task lock").cleanup.take() {
                handle.abort();
            }
            record.logs().close();
        }
        info!(count, "cleaned up all process records");
        count
    }

    /// Send SIGTERM to every record still running, without waiting for the
    /// children to die. Returns how many were signalled.
    pub fn terminate_all(&self) -> usize {
        let records: Vec<Arc<ProcessRecord>> = {
            let map = self.inner.processes.lock().expect("process map lock");
            map.values().cloned().collect()
        };
        let mut signalled = 0;
        for record in records {
            if record.is_running() {
                signal_pid(record.pid(), false);
                signalled += 1;
            }
        }
        signalled
    }

    /// Install the POSIX termination handlers. On SIGINT or SIGTERM every
    /// live child receives SIGTERM, then the signal is re-raised with its
    /// default disposition restored so the parent observes a signal death
    /// rather than a clean exit.
    #[cfg(unix)]
    pub fn install_signal_handlers(&self) -> std::io::Result<()> {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;
        let supervisor = self.clone();
        tokio::spawn(async move {
            let signo = tokio::select! {
                _ = sigint.recv() => libc::SIGINT,
                _ = sigterm.recv() => libc::SIGTERM,
            };
            let signalled = supervisor.terminate_all();
            warn!(signo, signalled, "termination signal received; re-raising");
            reraise(signo);
        });
        Ok(())
    }

    #[cfg(not(unix))]
    pub fn install_signal_handlers(&self) -> std::io::Result<()> {
        Ok(())
    }

    /// Arm the retention timer for a terminal record. Idempotent: repeated
    /// calls never stack timers, and running records are left alone.
    pub fn schedule_delayed_cleanup(&self, pid: u32) {
        let Some(record) = self.get(pid) else {
            debug!(pid, "no record to schedule cleanup for");
            return;
        };
        if !record.try_schedule_cleanup() {
            return;
        }
        if let Some(handle) = record.tasks.lock().expect("task lock").cleanup.take() {
            handle.abort();
        }

        let retention = self.inner.retention_seconds;
        if retention <= 0 {
            debug!(pid, "auto-cleanup disabled; record kept until explicit cleanup");
            return;
        }

        debug!(pid, retention, "scheduling delayed cleanup");
        let supervisor = self.clone();
        let timer_record = record.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(retention as u64)).await;
            // Drop our own handle first so clean_completed does not abort the
            // task that is running it.
            timer_record.tasks.lock().expect("task lock").cleanup.take();
            match supervisor.clean_completed(pid) {
                Ok(true) => {}
                Ok(false) => debug!(pid, "record was already cleaned"),
                Err(e) => warn!(pid, error = %e, "delayed cleanup skipped"),
            }
        });
        record.tasks.lock().expect("task lock").cleanup = Some(handle);
    }

    /// Count of records per status.
    pub fn status_summary(&self) -> BTreeMap<&'static str, usize> {
        let mut summary: BTreeMap<&'static str, usize> = ProcessStatus::ALL
            .iter()
            .map(|s| (s.as_str(), 0))
            .collect();
        let map = self.inner.processes.lock().expect("process map lock");
        for record in map.values() {
            *summary.entry(record.status().as_str()).or_insert(0) += 1;
        }
        summary
    }

    /// Run a sequence of already-rendered commands as a foreground pipeline,
    /// feeding each segment's stdout to the next. Returns the final stdout,
    /// the accumulated stderr of all segments, and the first non-zero exit
    /// code (or 0).
    pub async fn execute_pipeline(
        &self,
        commands: &[String],
        directory: &Path,
        first_stdin: Option<Vec<u8>>,
        timeout: Option<u64>,
        envs: Option<&HashMap<String, String>>,
    ) -> Result<(Vec<u8>, Vec<u8>, i32), ShellError> {
        if commands.is_empty() {
            return Err(ShellError::EmptyCommand);
        }

        let mut carried: Option<Vec<u8>> = first_stdin;
        let mut stderr_all: Vec<u8> = Vec::new();

        for (index, command) in commands.iter().enumerate() {
            debug!(index, command, "running pipeline segment");
            let child = spawn_under_shell(command, directory, envs, Stdio::piped())
                .map_err(|e| ShellError::Spawn(e.to_string()))?;
            let (stdout, stderr, code) = communicate(child, carried.take(), timeout).await?;
            stderr_all.extend_from_slice(&stderr);
            if code != 0 {
                return Ok((stdout, stderr_all, code));
            }
            if index == commands.len() - 1 {
                return Ok((stdout, stderr_all, 0));
            }
            carried = Some(stdout);
        }
        unreachable!("pipeline loop returns on the last segment")
    }

    fn register(&self, record: Arc<ProcessRecord>) -> Result<(), ShellError> {
        let pid = record.pid();
        let stale = {
            let mut map = self.inner.processes.lock().expect("process map lock");
            if map.get(&pid).is_some_and(|existing| existing.is_running()) {
                return Err(ShellError::Internal(format!(
                    "pid {pid} is already registered to a running process"
                )));
            }
            map.insert(pid, record)
        };
        // The OS recycled a pid still held by a terminal record; its logs go.
        if let Some(stale) = stale {
            warn!(pid, "replacing stale terminal record for recycled pid");
            teardown(&stale);
        }
        Ok(())
    }
}

fn teardown(record: &ProcessRecord) {
    record.cancel.cancel();
    let mut tasks = record.tasks.lock().expect("task lock");
    if let Some(handle) = tasks.cleanup.take() {
        handle.abort();
    }
    if let Some(handle) = tasks.monitor.take() {
        handle.abort();
    }
    drop(tasks);
    record.logs().close();
}

/// Spawn one command string under the controlling shell with the working
/// directory and environment overlay applied. stdin/stderr are always piped;
/// the caller chooses stdout so the foreground path can redirect it.
pub fn spawn_under_shell(
    shell_cmd: &str,
    directory: &Path,
    envs: Option<&HashMap<String, String>>,
    stdout: Stdio,
) -> std::io::Result<Child> {
    let (shell, flags) = controlling_shell();
    let mut cmd = Command::new(shell);
    cmd.args(&flags)
        .arg(shell_cmd)
        .current_dir(directory)
        .stdin(Stdio::piped())
        .stdout(stdout)
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(envs) = envs {
        cmd.envs(envs);
    }
    cmd.spawn()
}

/// Wait for a foreground child, collecting its output, with an optional
/// bounded wait. On timeout the child is killed (dropping the handle sends
/// SIGKILL via `kill_on_drop`) and `Timeout` is returned.
pub async fn communicate(
    mut child: Child,
    stdin: Option<Vec<u8>>,
    timeout: Option<u64>,
) -> Result<(Vec<u8>, Vec<u8>, i32), ShellError> {
    write_stdin_once(&mut child, stdin);

    let output = match timeout {
        Some(seconds) => tokio::time::timeout(
            Duration::from_secs(seconds),
            child.wait_with_output(),
        )
        .await
        .map_err(|_| ShellError::Timeout { seconds })?,
        None => child.wait_with_output().await,
    }
    .map_err(|e| ShellError::Internal(format!("failed waiting for child: {e}")))?;

    Ok((
        output.stdout,
        output.stderr,
        exit_code_of(output.status),
    ))
}

/// Write the given bytes to the child's stdin once and close the pipe; with
/// no bytes the pipe is closed immediately so children reading stdin see EOF.
fn write_stdin_once(child: &mut Child, stdin: Option<Vec<u8>>) {
    let Some(mut handle) = child.stdin.take() else {
        return;
    };
    let Some(bytes) = stdin else {
        return; // dropping the handle closes the pipe
    };
    tokio::spawn(async move {
        use tokio::io::AsyncWriteExt;
        if let Err(e) = handle.write_all(&bytes).await {
            warn!(error = %e, "failed to write child stdin");
        }
        let _ = handle.shutdown().await;
    });
}

enum WaitOutcome {
    Exited(i32),
    TimedOut(u64),
    Cancelled,
    Errored,
}

/// Per-record monitor: awaits child exit (bounded when a timeout is set),
/// drives the termination ladder, joins the drain tasks so the log tail is
/// captured, records the terminal state, and arms delayed cleanup.
async fn monitor_process(
    supervisor: Supervisor,
    record: Arc<ProcessRecord>,
    mut child: Child,
    drains: Vec<tokio::task::JoinHandle<()>>,
) {
    let pid = record.pid();
    let cancel = record.cancel.clone();

    let outcome = tokio::select! {
        _ = cancel.cancelled() => WaitOutcome::Cancelled,
        outcome = wait_with_deadline(&mut child, record.timeout()) => outcome,
    };

    let outcome = match outcome {
        WaitOutcome::TimedOut(seconds) => {
            warn!(pid, seconds, "process hit its timeout; terminating");
            record.add_error(&format!("Process exceeded its timeout of {seconds} seconds"));
            escalate_kill(pid, &mut child, TIMEOUT_TERM_GRACE, TIMEOUT_KILL_GRACE).await;
            WaitOutcome::TimedOut(seconds)
        }
        WaitOutcome::Cancelled => {
            escalate_kill(pid, &mut child, TIMEOUT_TERM_GRACE, TIMEOUT_KILL_GRACE).await;
            WaitOutcome::Cancelled
        }
        WaitOutcome::Errored => {
            kill_now(pid, &mut child);
            let _ = tokio::time::timeout(TIMEOUT_KILL_GRACE, child.wait()).await;
            WaitOutcome::Errored
        }
        exited => exited,
    };

    // The child is gone either way, so the pipes are at EOF; joining the
    // drains guarantees the final lines are flushed before the state flips.
    for drain in drains {
        let _ = drain.await;
    }

    match outcome {
        WaitOutcome::Exited(code) => {
            record.mark_exited(code);
            info!(pid, exit_code = code, status = %record.status(), "process finished");
        }
        WaitOutcome::TimedOut(_) | WaitOutcome::Cancelled => {
            record.mark_terminated(-1);
            info!(pid, "process terminated by supervisor");
        }
        WaitOutcome::Errored => {
            record.mark_error();
            warn!(pid, "process monitoring failed; record marked as error");
        }
    }

    supervisor.schedule_delayed_cleanup(pid);
}

async fn wait_with_deadline(child: &mut Child, timeout: Option<u64>) -> WaitOutcome {
    match timeout {
        Some(seconds) => {
            match tokio::time::timeout(Duration::from_secs(seconds), child.wait()).await {
                Ok(Ok(status)) => WaitOutcome::Exited(exit_code_of(status)),
                Ok(Err(e)) => {
                    warn!(error = %e, "failed to await child exit");
                    WaitOutcome::Errored
                }
                Err(_) => WaitOutcome::TimedOut(seconds),
            }
        }
        None => match child.wait().await {
            Ok(status) => WaitOutcome::Exited(exit_code_of(status)),
            Err(e) => {
                warn!(error = %e, "failed to await child exit");
                WaitOutcome::Errored
            }
        },
    }
}

/// SIGTERM, wait `term_grace`, then SIGKILL and wait `kill_grace`.
async fn escalate_kill(pid: u32, child: &mut Child, term_grace: Duration, kill_grace: Duration) {
    terminate_now(pid, child);
    if tokio::time::timeout(term_grace, child.wait()).await.is_ok() {
        return;
    }
    kill_now(pid, child);
    let _ = tokio::time::timeout(kill_grace, child.wait()).await;
}

async fn wait_for_exit(record: &ProcessRecord, limit: Duration) -> bool {
    let deadline = Instant::now() + limit;
    while Instant::now() < deadline {
        if !record.is_running() {
            return true;
        }
        tokio::time::sleep(EXIT_POLL_INTERVAL).await;
    }
    !record.is_running()
}

fn terminate_now(pid: u32, child: &mut Child) {
    #[cfg(unix)]
    {
        let _ = child;
        // SAFETY: kill has no preconditions; a stale pid yields ESRCH.
        unsafe {
            libc::kill(pid as libc::pid_t, libc::SIGTERM);
        }
    }
    #[cfg(not(unix))]
    {
        let _ = pid;
        let _ = child.start_kill();
    }
}

fn kill_now(pid: u32, child: &mut Child) {
    #[cfg(unix)]
    {
        let _ = child;
        // SAFETY: as above.
        unsafe {
            libc::kill(pid as libc::pid_t, libc::SIGKILL);
        }
    }
    #[cfg(not(unix))]
    {
        let _ = pid;
        let _ = child.start_kill();
    }
}

/// SIGTERM (or SIGKILL when `force`) addressed by pid, for records whose
/// child handle lives inside the monitor task.
fn signal_pid(pid: u32, force: bool) {
    #[cfg(unix)]
    {
        let signal = if force { libc::SIGKILL } else { libc::SIGTERM };
        // SAFETY: as above.
        unsafe {
            libc::kill(pid as libc::pid_t, signal);
        }
    }
    #[cfg(not(unix))]
    {
        let _ = (pid, force);
    }
}

/// Restore the default disposition for `signo` and raise it again, so the
/// process dies by the signal it was sent.
#[cfg(unix)]
fn reraise(signo: libc::c_int) {
    // SAFETY: signal and raise have no preconditions here; after SIG_DFL the
    // raised signal terminates the process.
    unsafe {
        libc::signal(signo, libc::SIG_DFL);
        libc::raise(signo);
    }
}

fn exit_code_of(status: std::process::ExitStatus) -> i32 {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }
    status.code().unwrap_or(-1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_summary_starts_at_zero() {
        let supervisor = Supervisor::new(300);
        let summary = supervisor.status_summary();
        assert_eq!(summary.len(), 5);
        assert!(summary.values().all(|&count| count == 0));
    }

    #[test]
    fn test_get_unknown_pid_is_none() {
        let supervisor = Supervisor::new(300);
        assert!(supervisor.get(99_999_999).is_none());
    }

    #[test]
    fn test_clean_unknown_pid_reports_already_gone() {
        let supervisor = Supervisor::new(300);
        assert_eq!(supervisor.clean_completed(99_999_999).unwrap(), false);
    }

    #[test]
    fn test_terminate_all_with_no_records_signals_nothing() {
        let supervisor = Supervisor::new(300);
        assert_eq!(supervisor.terminate_all(), 0);
    }

    #[tokio::test]
    async fn test_stop_unknown_pid_is_not_found() {
        let supervisor = Supervisor::new(300);
        let err = supervisor.stop(99_999_999, false).await.unwrap_err();
        assert!(matches!(err, ShellError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_pipeline_rejects_empty_command_list() {
        let supervisor = Supervisor::new(300);
        let err = supervisor
            .execute_pipeline(&[], Path::new("/tmp"), None, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ShellError::EmptyCommand));
    }
}
