use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use bgs_core::{LogEntry, ProcessInfo, ProcessStatus};
use bgs_logstore::ProcessLogDir;

/// Spawn-time options for a background process.
#[derive(Debug, Default)]
pub struct CreateProcessOptions {
    /// Bytes written once to the child's stdin; the pipe is closed either way.
    pub stdin: Option<Vec<u8>>,
    /// Extra environment overlaid on the parent environment.
    pub envs: Option<HashMap<String, String>>,
    /// Recorded output encoding; `None` resolves to the configured default.
    pub encoding: Option<String>,
    /// Wall-clock bound in seconds; `None` means unbounded.
    pub timeout: Option<u64>,
    /// Human label for the process (required, non-empty).
    pub description: String,
    /// Tags for list filtering.
    pub labels: Vec<String>,
}

#[derive(Debug)]
struct RecordState {
    status: ProcessStatus,
    exit_code: Option<i32>,
    end_time: Option<DateTime<Utc>>,
    cleanup_scheduled: bool,
}

/// Supervisory task handles. The cancel token reaches the drain and monitor
/// tasks; the cleanup slot holds the armed retention timer.
#[derive(Debug, Default)]
pub(crate) struct TaskHandles {
    pub monitor: Option<JoinHandle<()>>,
    pub cleanup: Option<JoinHandle<()>>,
}

/// In-memory handle binding one child process to its logs, status, timing,
/// labels, and cleanup timer. Identity is the OS pid.
#[derive(Debug)]
pub struct ProcessRecord {
    pid: u32,
    shell_cmd: String,
    directory: PathBuf,
    envs: Option<HashMap<String, String>>,
    encoding: String,
    description: String,
    labels: Vec<String>,
    timeout: Option<u64>,
    start_time: DateTime<Utc>,
    logs: ProcessLogDir,
    state: Mutex<RecordState>,
    pub(crate) tasks: Mutex<TaskHandles>,
    pub(crate) cancel: CancellationToken,
}

impl ProcessRecord {
    pub(crate) fn new(
        pid: u32,
        shell_cmd: String,
        directory: PathBuf,
        encoding: String,
        opts: &CreateProcessOptions,
        logs: ProcessLogDir,
    ) -> Self {
        Self {
            pid,
            shell_cmd,
            directory,
            envs: opts.envs.clone(),
            encoding,
            description: opts.description.clone(),
            labels: opts.labels.clone(),
            timeout: opts.timeout,
            start_time: Utc::now(),
            logs,
            state: Mutex::new(RecordState {
                status: ProcessStatus::Running,
                exit_code: None,
                end_time: None,
                cleanup_scheduled: false,
            }),
            tasks: Mutex::new(TaskHandles::default()),
            cancel: CancellationToken::new(),
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn shell_cmd(&self) -> &str {
        &self.shell_cmd
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn timeout(&self) -> Option<u64> {
        self.timeout
    }

    pub fn status(&self) -> ProcessStatus {
        self.state.lock().expect("record state lock").status
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.state.lock().expect("record state lock").exit_code
    }

    pub fn is_running(&self) -> bool {
        self.status() == ProcessStatus::Running
    }

    pub(crate) fn logs(&self) -> &ProcessLogDir {
        &self.logs
    }

    /// Immutable snapshot for external consumption.
    pub fn process_info(&self) -> ProcessInfo {
        let state = self.state.lock().expect("record state lock");
        ProcessInfo {
            pid: self.pid,
            shell_cmd: self.shell_cmd.clone(),
            directory: self.directory.clone(),
            envs: self.envs.clone(),
            timeout: self.timeout,
            encoding: self.encoding.clone(),
            description: self.description.clone(),
            labels: self.labels.clone(),
            start_time: self.start_time,
            end_time: state.end_time,
            status: state.status,
            exit_code: state.exit_code,
        }
    }

    pub fn add_output(&self, line: &str) {
        self.logs.stdout().append(line);
    }

    pub fn add_error(&self, line: &str) {
        self.logs.stderr().append(line);
    }

    pub fn get_output(
        &self,
        error: bool,
        tail: Option<usize>,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Vec<LogEntry> {
        let stream = if error {
            self.logs.stderr()
        } else {
            self.logs.stdout()
        };
        stream.query(tail, since, until)
    }

    /// True when the record shares at least one label with the filter and
    /// matches the status filter.
    pub fn matches(&self, labels: Option<&[String]>, status: Option<ProcessStatus>) -> bool {
        if let Some(filter) = labels {
            if !self.labels.iter().any(|l| filter.contains(l)) {
                return false;
            }
        }
        status.is_none_or(|s| self.status() == s)
    }

    /// Transition out of `running` after a natural exit. Returns false when
    /// the record already left `running`.
    pub(crate) fn mark_exited(&self, exit_code: i32) -> bool {
        let status = if exit_code == 0 {
            ProcessStatus::Completed
        } else {
            ProcessStatus::Failed
        };
        self.transition(status, Some(exit_code))
    }

    /// Transition to `terminated` (supervisor- or client-initiated kill).
    pub(crate) fn mark_terminated(&self, exit_code: i32) -> bool {
        self.transition(ProcessStatus::Terminated, Some(exit_code))
    }

    /// Transition to `error` when the supervisor itself failed.
    pub(crate) fn mark_error(&self) -> bool {
        self.transition(ProcessStatus::Error, None)
    }

    fn transition(&self, status: ProcessStatus, exit_code: Option<i32>) -> bool {
        let mut state = self.state.lock().expect("record state lock");
        if state.status.is_terminal() {
            return false;
        }
        state.status = status;
        state.exit_code = exit_code.or(state.exit_code);
        state.end_time = Some(Utc::now());
        true
    }

    /// Rewrite a terminal state as `terminated`, preserving the recorded
    /// timing. Used by `stop` when the monitor observed the signalled exit
    /// first and classified it `failed`.
    pub(crate) fn force_terminated(&self) {
        let mut state = self.state.lock().expect("record state lock");
        state.status = ProcessStatus::Terminated;
        if state.end_time.is_none() {
            state.end_time = Some(Utc::now());
        }
        if state.exit_code.is_none() {
            state.exit_code = Some(-1);
        }
    }

    /// Flip `cleanup_scheduled`; returns false when cleanup was already
    /// scheduled or the record is still running, so timers never stack.
    pub(crate) fn try_schedule_cleanup(&self) -> bool {
        let mut state = self.state.lock().expect("record state lock");
        if state.cleanup_scheduled || state.status == ProcessStatus::Running {
            return false;
        }
        state.cleanup_scheduled = true;
        true
    }

    pub fn cleanup_scheduled(&self) -> bool {
        self.state.lock().expect("record state lock").cleanup_scheduled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(labels: &[&str]) -> ProcessRecord {
        ProcessRecord::new(
            4321,
            "echo hi".into(),
            PathBuf::from("/tmp"),
            "utf-8".into(),
            &CreateProcessOptions {
                description: "test".into(),
                labels: labels.iter().map(|l| l.to_string()).collect(),
                ..Default::default()
            },
            ProcessLogDir::create().unwrap(),
        )
    }

    #[test]
    fn test_new_record_is_running_without_end_time() {
        let r = record(&[]);
        assert!(r.is_running());
        let info = r.process_info();
        assert_eq!(info.status, ProcessStatus::Running);
        assert!(info.end_time.is_none());
        assert!(info.exit_code.is_none());
    }

    #[test]
    fn test_exit_code_zero_completes_nonzero_fails() {
        let r = record(&[]);
        assert!(r.mark_exited(0));
        assert_eq!(r.status(), ProcessStatus::Completed);

        let r = record(&[]);
        assert!(r.mark_exited(3));
        assert_eq!(r.status(), ProcessStatus::Failed);
        assert_eq!(r.exit_code(), Some(3));
    }

    #[test]
    fn test_transition_happens_once() {
        let r = record(&[]);
        assert!(r.mark_exited(0));
        let first_end = r.process_info().end_time;
        assert!(!r.mark_terminated(-1));
        assert_eq!(r.status(), ProcessStatus::Completed);
        assert_eq!(r.process_info().end_time, first_end);
    }

    #[test]
    fn test_force_terminated_rewrites_failed() {
        let r = record(&[]);
        r.mark_exited(143);
        r.force_terminated();
        assert_eq!(r.status(), ProcessStatus::Terminated);
        assert_eq!(r.exit_code(), Some(143));
    }

    #[test]
    fn test_label_filter_matches_any_shared_label() {
        let r = record(&["web", "prod"]);
        assert!(r.matches(Some(&["prod".into(), "db".into()]), None));
        assert!(!r.matches(Some(&["db".into()]), None));
        assert!(r.matches(None, Some(ProcessStatus::Running)));
        assert!(!r.matches(None, Some(ProcessStatus::Completed)));
    }

    #[test]
    fn test_cleanup_schedules_once_and_never_while_running() {
        let r = record(&[]);
        assert!(!r.try_schedule_cleanup());
        r.mark_exited(0);
        assert!(r.try_schedule_cleanup());
        assert!(!r.try_schedule_cleanup());
        assert!(r.cleanup_scheduled());
    }

    #[test]
    fn test_output_forwarding_reaches_the_right_stream() {
        let r = record(&[]);
        r.add_output("out line");
        r.add_error("err line");
        let out = r.get_output(false, None, None, None);
        let err = r.get_output(true, None, None, None);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].text, "out line");
        assert_eq!(err.len(), 1);
        assert_eq!(err[0].text, "err line");
    }
}
