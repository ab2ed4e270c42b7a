use super::*;
use bgs_supervisor::Supervisor;
use bgs_validate::CommandValidator;

fn executor(allowed: &[&str]) -> ShellExecutor {
    ShellExecutor::new(
        CommandValidator::new(allowed.iter().copied()),
        Supervisor::new(0),
    )
}

fn first_text(result: &Value) -> String {
    result["content"][0]["text"].as_str().unwrap().to_string()
}

fn all_text(result: &Value) -> String {
    result["content"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|c| c["text"].as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

#[test]
fn test_tool_definitions_cover_the_whole_surface() {
    let executor = executor(&["echo"]);
    let names: Vec<&str> = tool_definitions(&executor)
        .iter()
        .map(|t| t.name)
        .collect();
    assert_eq!(
        names,
        [
            "shell_execute",
            "shell_bg_start",
            "shell_bg_list",
            "shell_bg_stop",
            "shell_bg_logs",
            "shell_bg_clean",
            "shell_bg_detail",
        ]
    );
}

#[test]
fn test_execute_description_names_allowed_commands() {
    let executor = executor(&["echo", "ls"]);
    let defs = tool_definitions(&executor);
    assert!(defs[0].description.contains("echo, ls"));
}

#[tokio::test]
async fn test_dispatch_rejects_unknown_tool() {
    let executor = executor(&["echo"]);
    let err = dispatch(&executor, "shell_bg_reboot", Value::Null)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Unknown tool"));
}

#[tokio::test]
async fn test_bg_list_empty_map() {
    let executor = executor(&["echo"]);
    let result = dispatch(&executor, "shell_bg_list", json!({})).await.unwrap();
    assert_eq!(first_text(&result), "No background processes found");
}

#[tokio::test]
async fn test_bg_list_rejects_invalid_status() {
    let executor = executor(&["echo"]);
    let err = dispatch(&executor, "shell_bg_list", json!({"status": "paused"}))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Invalid status"));
}

#[tokio::test]
async fn test_bg_clean_reports_unknown_pid() {
    let executor = executor(&["echo"]);
    let result = dispatch(&executor, "shell_bg_clean", json!({"pids": [987654]}))
        .await
        .unwrap();
    assert_eq!(first_text(&result), "987654: not found");
}

#[tokio::test]
async fn test_bg_clean_requires_pids() {
    let executor = executor(&["echo"]);
    let err = dispatch(&executor, "shell_bg_clean", json!({"pids": []}))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("No process PIDs"));
}

#[test]
fn test_format_section_counts_lines() {
    let lines = vec!["a".to_string(), "b".to_string()];
    let section = format_section("stdout", &lines, 500);
    assert!(section.contains("stdout: 2 lines"));
    assert!(section.contains("a\nb"));
}

#[test]
fn test_format_section_truncates_with_notice() {
    let lines: Vec<String> = (0..10).map(|i| format!("line {i}")).collect();
    let section = format_section("stdout", &lines, 3);
    assert!(section.contains("(truncated, 3/10 lines shown)"));
    assert!(section.contains("line 2"));
    assert!(!section.contains("line 3\n"));
    assert!(section.contains("showing 3 of 10 lines"));
}

#[test]
fn test_format_section_empty_stream() {
    let section = format_section("stderr", &[], 10);
    assert!(section.contains("stderr: 0 lines"));
}

#[test]
fn test_format_entries_time_prefix() {
    let entries = vec![LogEntry::new(Utc::now(), "hello")];
    let with_prefix = format_entries(&entries, true, DEFAULT_TIME_PREFIX_FORMAT);
    assert!(with_prefix[0].starts_with('['));
    assert!(with_prefix[0].ends_with("] hello"));

    let without = format_entries(&entries, false, DEFAULT_TIME_PREFIX_FORMAT);
    assert_eq!(without[0], "hello");
}

#[cfg(unix)]
mod end_to_end {
    use super::*;
    use std::time::Duration;

    fn tmp() -> String {
        std::env::temp_dir().display().to_string()
    }

    async fn start_and_finish(executor: &ShellExecutor, text: &str) -> u32 {
        let result = dispatch(
            executor,
            "shell_bg_start",
            json!({
                "command": ["echo", text],
                "directory": tmp(),
                "description": "tool test",
                "labels": ["tools"]
            }),
        )
        .await
        .unwrap();
        let message = first_text(&result);
        let pid: u32 = message
            .rsplit(' ')
            .next()
            .unwrap()
            .parse()
            .expect("start message should end with the pid");

        let record = executor.get_process(pid).unwrap();
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while record.is_running() && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        pid
    }

    #[tokio::test]
    async fn test_shell_execute_reports_exit_and_stdout() {
        let executor = executor(&["echo"]);
        let result = dispatch(
            &executor,
            "shell_execute",
            json!({"command": ["echo", "tool hello"], "directory": tmp()}),
        )
        .await
        .unwrap();
        let text = all_text(&result);
        assert!(text.contains("**exit with 0**"), "{text}");
        assert!(text.contains("tool hello"), "{text}");
    }

    #[tokio::test]
    async fn test_shell_execute_disallowed_command_is_an_error() {
        let executor = executor(&["echo"]);
        let err = dispatch(
            &executor,
            "shell_execute",
            json!({"command": ["sudo", "reboot"], "directory": tmp()}),
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "Command not allowed: sudo");
    }

    #[tokio::test]
    async fn test_bg_lifecycle_start_logs_list_detail_clean() {
        let executor = executor(&["echo"]);
        let pid = start_and_finish(&executor, "lifecycle").await;

        let logs = dispatch(
            &executor,
            "shell_bg_logs",
            json!({"pid": pid, "add_time_prefix": false}),
        )
        .await
        .unwrap();
        let text = all_text(&logs);
        assert!(text.contains("lifecycle"), "{text}");
        assert!(text.contains("stdout: "), "{text}");

        let listed = dispatch(&executor, "shell_bg_list", json!({"labels": ["tools"]}))
            .await
            .unwrap();
        assert!(first_text(&listed).contains(&pid.to_string()));

        let detail = dispatch(&executor, "shell_bg_detail", json!({"pid": pid}))
            .await
            .unwrap();
        let detail_text = first_text(&detail);
        assert!(detail_text.contains("tool test"));
        assert!(detail_text.contains("Exit code: 0"));

        let cleaned = dispatch(&executor, "shell_bg_clean", json!({"pids": [pid]}))
            .await
            .unwrap();
        assert_eq!(first_text(&cleaned), format!("{pid}: cleaned"));

        let listed = dispatch(&executor, "shell_bg_list", json!({}))
            .await
            .unwrap();
        assert_eq!(first_text(&listed), "No background processes found");
    }

    #[tokio::test]
    async fn test_bg_stop_running_process() {
        let executor = executor(&["sleep"]);
        let result = dispatch(
            &executor,
            "shell_bg_start",
            json!({
                "command": ["sleep", "30"],
                "directory": tmp(),
                "description": "stoppable"
            }),
        )
        .await
        .unwrap();
        let pid: u32 = first_text(&result)
            .rsplit(' ')
            .next()
            .unwrap()
            .parse()
            .unwrap();

        let clean_attempt = dispatch(&executor, "shell_bg_clean", json!({"pids": [pid]}))
            .await
            .unwrap();
        let clean_text = first_text(&clean_attempt);
        assert!(clean_text.contains("still running"), "{clean_text}");

        let stopped = dispatch(&executor, "shell_bg_stop", json!({"pid": pid}))
            .await
            .unwrap();
        let stop_text = first_text(&stopped);
        assert!(stop_text.contains("gracefully stopped"), "{stop_text}");
        assert!(stop_text.contains("stoppable"), "{stop_text}");
    }

    #[tokio::test]
    async fn test_bg_logs_unknown_pid_is_an_error() {
        let executor = executor(&["echo"]);
        let err = dispatch(&executor, "shell_bg_logs", json!({"pid": 987654}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("987654"));
    }
}
